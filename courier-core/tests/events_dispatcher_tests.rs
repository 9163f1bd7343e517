//! Tests for events::dispatcher and events::stream

mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use common::{init_tracing, wait_until, WAIT};
use courier_core::events::*;
use courier_core::network::{names, ConnectionState, InboundEvent};
use serde_json::json;

fn chat(n: i64) -> SessionEvent {
    SessionEvent::Inbound(InboundEvent::new(names::NEW_MESSAGE, json!({ "n": n })))
}

fn counting_handler() -> (Arc<impl EventHandler>, Arc<AtomicUsize>) {
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    let handler = Arc::new(CallbackHandler::new(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    }));
    (handler, count)
}

#[test]
fn test_callback_handler() {
    let (handler, count) = counting_handler();

    handler.on_event(chat(1));

    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_event_categories() {
    assert_eq!(chat(1).category(), Some(EventCategory::Chat));
    assert_eq!(
        SessionEvent::ConnectionStateChanged {
            state: ConnectionState::Connected
        }
        .category(),
        Some(EventCategory::Connection)
    );
    for name in [
        names::CALL_MADE,
        names::ANSWER_MADE,
        names::ICE_CANDIDATE_RECEIVED,
        names::CALL_ENDED,
        names::CALL_DECLINED,
    ] {
        let event = SessionEvent::Inbound(InboundEvent::new(name, json!({})));
        assert_eq!(event.category(), Some(EventCategory::Call), "{}", name);
    }
    let unknown = SessionEvent::Inbound(InboundEvent::new("typing", json!({})));
    assert_eq!(unknown.category(), None);
}

#[test]
fn test_delivery_is_per_category() {
    init_tracing();
    let dispatcher = EventDispatcher::new();
    let (chat_handler, chat_count) = counting_handler();
    let (call_handler, call_count) = counting_handler();
    let _chat = dispatcher.subscribe(EventCategory::Chat, &chat_handler);
    let _call = dispatcher.subscribe(EventCategory::Call, &call_handler);

    dispatcher.publish(chat(1));
    dispatcher.publish(SessionEvent::Inbound(InboundEvent::new("typing", json!({}))));

    assert!(wait_until(|| chat_count.load(Ordering::SeqCst) == 1));
    thread::sleep(Duration::from_millis(30));
    assert_eq!(call_count.load(Ordering::SeqCst), 0);
    assert_eq!(dispatcher.subscriber_count(), 2);
    assert_eq!(dispatcher.subscriber_count_for(EventCategory::Chat), 1);
}

#[test]
fn test_delivery_follows_publish_order() {
    init_tracing();
    let dispatcher = EventDispatcher::new();
    let stream = EventStream::subscribe(&dispatcher, EventCategory::Chat, |event| match event {
        SessionEvent::Inbound(inbound) => inbound.payload["n"].as_i64(),
        _ => None,
    });

    for n in 0..50 {
        dispatcher.publish(chat(n));
    }

    let received: Vec<i64> = (0..50).filter_map(|_| stream.next_timeout(WAIT)).collect();
    assert_eq!(received, (0..50).collect::<Vec<_>>());
}

#[test]
fn test_subscribe_many_keeps_order_across_categories() {
    init_tracing();
    let dispatcher = EventDispatcher::new();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&seen);
    let handler = Arc::new(CallbackHandler::new(move |event: SessionEvent| {
        log.lock().unwrap().push(event.category());
    }));
    let subscription = dispatcher.subscribe_many(
        &[EventCategory::Connection, EventCategory::Call],
        &handler,
    );
    assert_eq!(
        subscription.categories(),
        &[EventCategory::Connection, EventCategory::Call]
    );

    let mut expected = Vec::new();
    for _ in 0..25 {
        dispatcher.publish(SessionEvent::ConnectionStateChanged {
            state: ConnectionState::Disconnected,
        });
        dispatcher.publish(SessionEvent::Inbound(InboundEvent::new(
            names::CALL_ENDED,
            json!({}),
        )));
        dispatcher.publish(chat(0));
        expected.push(Some(EventCategory::Connection));
        expected.push(Some(EventCategory::Call));
    }

    assert!(wait_until(|| seen.lock().unwrap().len() == expected.len()));
    assert_eq!(*seen.lock().unwrap(), expected);
    assert_eq!(dispatcher.subscriber_count(), 1);
    assert_eq!(dispatcher.subscriber_count_for(EventCategory::Call), 1);
    assert_eq!(dispatcher.subscriber_count_for(EventCategory::Chat), 0);
}

#[test]
fn test_stuck_handler_does_not_block_others() {
    init_tracing();
    let dispatcher = EventDispatcher::new();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let release_rx = Mutex::new(release_rx);
    let stuck = Arc::new(CallbackHandler::new(move |_| {
        let _ = release_rx.lock().unwrap().recv();
    }));
    let (healthy, healthy_count) = counting_handler();
    let _stuck = dispatcher.subscribe(EventCategory::Chat, &stuck);
    let _healthy = dispatcher.subscribe(EventCategory::Chat, &healthy);

    let started = Instant::now();
    dispatcher.publish(chat(1));
    dispatcher.publish(chat(2));
    assert!(started.elapsed() < Duration::from_millis(100));

    assert!(wait_until(|| healthy_count.load(Ordering::SeqCst) == 2));
    drop(release_tx);
}

#[test]
fn test_dropped_handler_stops_receiving() {
    init_tracing();
    let dispatcher = EventDispatcher::new();
    let (handler, count) = counting_handler();
    let subscription = dispatcher.subscribe(EventCategory::Chat, &handler);

    drop(handler);
    dispatcher.publish(chat(1));

    thread::sleep(Duration::from_millis(50));
    assert_eq!(count.load(Ordering::SeqCst), 0);
    // The worker noticed and the entry is pruned on a later publish.
    dispatcher.publish(chat(2));
    assert!(wait_until(|| !subscription.is_active()));
}

#[test]
fn test_subscription_drop_unsubscribes() {
    init_tracing();
    let dispatcher = EventDispatcher::new();
    let (handler, count) = counting_handler();
    let subscription = dispatcher.subscribe(EventCategory::Chat, &handler);
    assert!(subscription.is_active());

    drop(subscription);
    dispatcher.publish(chat(1));

    thread::sleep(Duration::from_millis(50));
    assert_eq!(count.load(Ordering::SeqCst), 0);
    assert_eq!(dispatcher.subscriber_count(), 0);
}

#[test]
fn test_cancel_unsubscribes() {
    let dispatcher = EventDispatcher::new();
    let (handler, _count) = counting_handler();
    let subscription = dispatcher.subscribe(EventCategory::Call, &handler);

    subscription.cancel();

    assert_eq!(dispatcher.subscriber_count_for(EventCategory::Call), 0);
}

#[test]
fn test_panicking_handler_keeps_its_worker() {
    init_tracing();
    let dispatcher = EventDispatcher::new();
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    let handler = Arc::new(CallbackHandler::new(move |_| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("handler bug");
        }
    }));
    let _subscription = dispatcher.subscribe(EventCategory::Chat, &handler);

    dispatcher.publish(chat(1));
    dispatcher.publish(chat(2));

    assert!(wait_until(|| count.load(Ordering::SeqCst) == 2));
}

#[test]
fn test_advance_epoch_discards_stale_events() {
    init_tracing();
    let dispatcher = EventDispatcher::new();
    let (handler, count) = counting_handler();
    let _subscription = dispatcher.subscribe(EventCategory::Chat, &handler);
    let old = dispatcher.current_epoch();

    let new = dispatcher.advance_epoch();
    dispatcher.publish_from(old, chat(1));
    dispatcher.publish_from(new, chat(2));

    assert!(wait_until(|| count.load(Ordering::SeqCst) == 1));
    thread::sleep(Duration::from_millis(30));
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_advance_epoch_lets_running_handler_finish() {
    init_tracing();
    let dispatcher = EventDispatcher::new();
    let (started_tx, started_rx) = mpsc::channel::<()>();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let gate = Mutex::new((started_tx, release_rx));
    let count = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&count);
    let handler = Arc::new(CallbackHandler::new(move |_| {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            let gate = gate.lock().unwrap();
            let _ = gate.0.send(());
            let _ = gate.1.recv();
        }
    }));
    let _subscription = dispatcher.subscribe(EventCategory::Chat, &handler);

    dispatcher.publish(chat(1));
    dispatcher.publish(chat(2));
    started_rx.recv_timeout(WAIT).unwrap();

    // The call already running completes; the one still queued is dropped.
    dispatcher.advance_epoch();
    release_tx.send(()).unwrap();

    thread::sleep(Duration::from_millis(50));
    assert_eq!(count.load(Ordering::SeqCst), 1);
}

#[test]
fn test_clear_ends_open_streams() {
    init_tracing();
    let dispatcher = EventDispatcher::new();
    let mut stream =
        EventStream::subscribe(&dispatcher, EventCategory::Chat, Some);

    dispatcher.clear();

    assert_eq!(dispatcher.subscriber_count(), 0);
    assert!(stream.next().is_none());
}

#[test]
fn test_stream_try_next_and_drain() {
    init_tracing();
    let dispatcher = EventDispatcher::new();
    let stream = EventStream::subscribe(&dispatcher, EventCategory::Chat, Some);
    assert!(stream.try_next().is_none());

    dispatcher.publish(chat(1));
    dispatcher.publish(chat(2));

    let first = stream.next_timeout(WAIT);
    assert_eq!(first, Some(chat(1)));
    assert!(wait_until(|| stream.drain() == vec![chat(2)]));
}
