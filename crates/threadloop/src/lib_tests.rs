use super::*;
use std::sync::mpsc;
use std::time::Duration;

#[test]
fn test_basic_loop() {
    let event_loop = LoopThread::new();
    assert_eq!(event_loop.state(), LoopState::Ready);

    let (tx, rx) = mpsc::channel();
    let id = event_loop.schedule_idle(move || {
        tx.send(42u32).unwrap();
        SourceStatus::Remove
    });
    assert!(id.is_valid());
    assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 42);

    event_loop.close();
    assert_eq!(event_loop.state(), LoopState::Stopped);
}

#[test]
fn test_context_accessor() {
    let event_loop = LoopThread::new();
    let context = event_loop.context().clone();

    // Collaborators can attach their own sources directly.
    let (tx, rx) = mpsc::channel();
    let id = context.attach_idle(
        Priority::HIGH_IDLE,
        move || {
            tx.send(()).unwrap();
            SourceStatus::Remove
        },
        None,
    );
    assert!(id.is_valid());
    rx.recv_timeout(Duration::from_secs(5)).unwrap();

    event_loop.close();
    assert!(context.is_torn_down());
}

#[test]
fn test_default_priorities() {
    assert_eq!(Priority::default(), Priority::DEFAULT);
    assert!(Priority::DEFAULT < Priority::DEFAULT_IDLE);
}
