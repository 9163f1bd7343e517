// SPDX-FileCopyrightText: 2026 Mattia Egloff <mattia.egloff@pm.me>
//
// SPDX-License-Identifier: GPL-3.0-or-later

//! Event Dispatcher
//!
//! Fans inbound events out to subscribers without ever blocking the
//! publisher. Every subscriber owns a FIFO queue drained by its own worker
//! thread, so a slow handler only delays itself.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Weak};
use std::thread;

use parking_lot::Mutex;
use tracing::{debug, error, trace};

use crate::network::{ConnectionState, InboundEvent, InboundKind};

/// Category a subscriber listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCategory {
    /// Connection state changes.
    Connection,
    /// Chat delivery (`new_message`).
    Chat,
    /// Call signaling.
    Call,
}

/// Events delivered by the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The transport connection changed state.
    ConnectionStateChanged {
        /// The new connection state.
        state: ConnectionState,
    },

    /// A named event arrived on the socket.
    Inbound(InboundEvent),
}

impl SessionEvent {
    /// Category this event is routed to; `None` for unknown inbound names.
    pub fn category(&self) -> Option<EventCategory> {
        match self {
            SessionEvent::ConnectionStateChanged { .. } => Some(EventCategory::Connection),
            SessionEvent::Inbound(event) => match event.kind() {
                InboundKind::NewMessage => Some(EventCategory::Chat),
                InboundKind::CallMade
                | InboundKind::AnswerMade
                | InboundKind::IceCandidateReceived
                | InboundKind::CallEnded
                | InboundKind::CallDeclined => Some(EventCategory::Call),
                InboundKind::Unknown => None,
            },
        }
    }
}

/// Event handler trait.
///
/// Implement this trait to receive session events. Handlers run on the
/// subscriber's worker thread, never on the socket's receive loop.
pub trait EventHandler: Send + Sync {
    /// Called when an event occurs.
    fn on_event(&self, event: SessionEvent);
}

/// Simple callback-based event handler.
///
/// Wraps a closure for easy event handling.
pub struct CallbackHandler<F>
where
    F: Fn(SessionEvent) + Send + Sync,
{
    callback: F,
}

impl<F> CallbackHandler<F>
where
    F: Fn(SessionEvent) + Send + Sync,
{
    /// Creates a new callback handler.
    pub fn new(callback: F) -> Self {
        CallbackHandler { callback }
    }
}

impl<F> EventHandler for CallbackHandler<F>
where
    F: Fn(SessionEvent) + Send + Sync,
{
    fn on_event(&self, event: SessionEvent) {
        (self.callback)(event);
    }
}

struct Envelope {
    epoch: u64,
    event: SessionEvent,
}

struct SubscriberEntry {
    id: u64,
    categories: Vec<EventCategory>,
    queue: Sender<Envelope>,
    active: Arc<AtomicBool>,
}

impl SubscriberEntry {
    fn deactivate(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    fn listens_to(&self, category: EventCategory) -> bool {
        self.categories.contains(&category)
    }
}

struct Shared {
    subscribers: Mutex<Vec<SubscriberEntry>>,
    epoch: AtomicU64,
    next_id: AtomicU64,
}

impl Shared {
    fn remove(&self, id: u64) -> bool {
        let mut subscribers = self.subscribers.lock();
        match subscribers.iter().position(|entry| entry.id == id) {
            Some(pos) => {
                subscribers.remove(pos).deactivate();
                true
            }
            None => false,
        }
    }
}

/// Event dispatcher for managing subscribers.
///
/// Handlers are held weakly: the consumer keeps its handler alive, and a
/// handler that goes out of scope stops receiving events without keeping the
/// connection (or the dispatcher) alive.
pub struct EventDispatcher {
    shared: Arc<Shared>,
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventDispatcher {
    /// Creates a new event dispatcher.
    pub fn new() -> Self {
        EventDispatcher {
            shared: Arc::new(Shared {
                subscribers: Mutex::new(Vec::new()),
                epoch: AtomicU64::new(0),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    /// Subscribes `handler` to one category.
    ///
    /// The returned [`Subscription`] unsubscribes when dropped.
    pub fn subscribe<H>(&self, category: EventCategory, handler: &Arc<H>) -> Subscription
    where
        H: EventHandler + 'static,
    {
        self.subscribe_many(&[category], handler)
    }

    /// Subscribes `handler` to several categories through one queue.
    ///
    /// Events of all the given categories reach the handler in publish
    /// order, which separate subscriptions do not guarantee.
    pub fn subscribe_many<H>(
        &self,
        categories: &[EventCategory],
        handler: &Arc<H>,
    ) -> Subscription
    where
        H: EventHandler + 'static,
    {
        let categories = categories.to_vec();
        let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst);
        let handler: Weak<dyn EventHandler> = Arc::downgrade(handler) as Weak<dyn EventHandler>;
        let (queue, rx) = mpsc::channel();
        let active = Arc::new(AtomicBool::new(true));

        let worker_active = Arc::clone(&active);
        let shared = Arc::downgrade(&self.shared);
        let spawned = thread::Builder::new()
            .name(format!("courier-subscriber-{}", id))
            .spawn(move || run_worker(rx, handler, worker_active, shared));

        match spawned {
            Ok(_) => {
                debug!(id, ?categories, "subscriber added");
                self.shared.subscribers.lock().push(SubscriberEntry {
                    id,
                    categories: categories.clone(),
                    queue,
                    active,
                });
            }
            Err(e) => {
                error!(id, ?categories, error = %e, "failed to start subscriber worker");
            }
        }

        Subscription {
            id,
            categories,
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Dispatches an event stamped with the current epoch.
    pub fn publish(&self, event: SessionEvent) {
        let epoch = self.current_epoch();
        self.publish_from(epoch, event);
    }

    /// Dispatches an event produced under `epoch`.
    ///
    /// Events from an older epoch are dropped here, and again by the workers
    /// if the epoch advances while they are still queued.
    pub fn publish_from(&self, epoch: u64, event: SessionEvent) {
        if epoch != self.current_epoch() {
            trace!(epoch, "dropping event from stale epoch");
            return;
        }
        let category = match event.category() {
            Some(category) => category,
            None => {
                debug!(?event, "no category for event, dropping");
                return;
            }
        };

        let mut subscribers = self.shared.subscribers.lock();
        subscribers.retain(|entry| {
            if !entry.listens_to(category) {
                return true;
            }
            let delivered = entry
                .queue
                .send(Envelope {
                    epoch,
                    event: event.clone(),
                })
                .is_ok();
            if !delivered {
                // Worker exited because its handler was dropped.
                entry.deactivate();
            }
            delivered
        });
    }

    /// Current delivery epoch.
    pub fn current_epoch(&self) -> u64 {
        self.shared.epoch.load(Ordering::SeqCst)
    }

    /// Starts a new epoch; everything queued under older epochs is
    /// discarded before it reaches a handler.
    ///
    /// Does not wait for handler calls already in progress.
    pub fn advance_epoch(&self) -> u64 {
        self.shared.epoch.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Removes all subscribers.
    pub fn clear(&self) {
        let mut subscribers = self.shared.subscribers.lock();
        for entry in subscribers.drain(..) {
            entry.deactivate();
        }
    }

    /// Returns the number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.lock().len()
    }

    /// Returns the number of subscribers of one category.
    pub fn subscriber_count_for(&self, category: EventCategory) -> usize {
        self.shared
            .subscribers
            .lock()
            .iter()
            .filter(|entry| entry.listens_to(category))
            .count()
    }
}

fn run_worker(
    rx: Receiver<Envelope>,
    handler: Weak<dyn EventHandler>,
    active: Arc<AtomicBool>,
    shared: Weak<Shared>,
) {
    for envelope in rx {
        if !active.load(Ordering::SeqCst) {
            break;
        }
        let current_epoch = match shared.upgrade() {
            Some(shared) => shared.epoch.load(Ordering::SeqCst),
            None => break,
        };
        if envelope.epoch < current_epoch {
            trace!(epoch = envelope.epoch, "discarding stale event");
            continue;
        }
        let handler = match handler.upgrade() {
            Some(handler) => handler,
            None => break,
        };
        if catch_unwind(AssertUnwindSafe(|| handler.on_event(envelope.event))).is_err() {
            error!("event handler panicked");
        }
    }
    active.store(false, Ordering::SeqCst);
}

/// Cancellation token for a subscription.
///
/// Dropping it unsubscribes; events still queued for the subscriber are
/// discarded.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: u64,
    categories: Vec<EventCategory>,
    shared: Weak<Shared>,
}

impl Subscription {
    /// Subscription id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Subscribed categories.
    pub fn categories(&self) -> &[EventCategory] {
        &self.categories
    }

    /// Returns true while the dispatcher still holds this subscription.
    pub fn is_active(&self) -> bool {
        self.shared.upgrade().is_some_and(|shared| {
            shared
                .subscribers
                .lock()
                .iter()
                .any(|entry| entry.id == self.id && entry.active.load(Ordering::SeqCst))
        })
    }

    /// Unsubscribes now.
    pub fn cancel(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            if shared.remove(self.id) {
                debug!(id = self.id, "subscriber removed");
            }
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("categories", &self.categories)
            .finish()
    }
}
