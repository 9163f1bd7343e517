// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Pull-based event streams for UI consumers.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

use super::dispatcher::{
    CallbackHandler, EventCategory, EventDispatcher, EventHandler, SessionEvent, Subscription,
};

/// How often a blocked `next` checks whether its subscription still exists.
const LIVENESS_POLL: Duration = Duration::from_millis(100);

/// Keeps a stream's dispatcher subscription and handler alive.
struct StreamGuard {
    subscription: Subscription,
    _handler: Arc<dyn EventHandler>,
}

/// A lazy, unbounded sequence of items.
///
/// `Iterator::next` blocks until the next item arrives and only returns
/// `None` once the producing side has gone away or the subscription has
/// been torn down. Items are buffered between pulls; nothing is replayed
/// from before the stream was opened.
pub struct EventStream<T> {
    rx: Receiver<T>,
    guard: Option<StreamGuard>,
}

impl<T: Send + 'static> EventStream<T> {
    /// Wraps a channel whose sender is fed elsewhere.
    pub(crate) fn from_receiver(rx: Receiver<T>) -> Self {
        EventStream { rx, guard: None }
    }

    /// Opens a stream over one dispatcher category. `map` turns events into
    /// items; returning `None` skips the event.
    pub fn subscribe<F>(dispatcher: &EventDispatcher, category: EventCategory, map: F) -> Self
    where
        F: Fn(SessionEvent) -> Option<T> + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::channel();
        let handler = Arc::new(CallbackHandler::new(move |event| {
            if let Some(item) = map(event) {
                // The stream may already be gone; nothing to do then.
                let _ = tx.send(item);
            }
        }));
        let subscription = dispatcher.subscribe(category, &handler);

        EventStream {
            rx,
            guard: Some(StreamGuard {
                subscription,
                _handler: handler,
            }),
        }
    }

    /// Returns the next buffered item without waiting.
    pub fn try_next(&self) -> Option<T> {
        match self.rx.try_recv() {
            Ok(item) => Some(item),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Waits up to `timeout` for the next item.
    pub fn next_timeout(&self, timeout: Duration) -> Option<T> {
        match self.rx.recv_timeout(timeout) {
            Ok(item) => Some(item),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Drains everything currently buffered.
    pub fn drain(&self) -> Vec<T> {
        self.rx.try_iter().collect()
    }
}

impl<T> Iterator for EventStream<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        loop {
            match self.rx.recv_timeout(LIVENESS_POLL) {
                Ok(item) => return Some(item),
                Err(RecvTimeoutError::Disconnected) => return None,
                Err(RecvTimeoutError::Timeout) => {
                    let torn_down = self
                        .guard
                        .as_ref()
                        .is_some_and(|guard| !guard.subscription.is_active());
                    if torn_down {
                        return self.rx.try_recv().ok();
                    }
                }
            }
        }
    }
}
