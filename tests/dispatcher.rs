//! Dispatcher integration tests: concurrency cap, admission order,
//! failure isolation.

mod common;

use std::sync::Arc;

use tourcast::dispatch::Dispatcher;
use tourcast::queue::{QueueHandle, QueueItemStatus};

use common::{ready_result, settle, TriggeredService};

fn dispatch_n(dispatcher: &Dispatcher, n: usize) -> Vec<uuid::Uuid> {
    (0..n)
        .map(|i| dispatcher.dispatch(Arc::new(vec![i as u8]), "en", None))
        .collect()
}

#[tokio::test]
async fn test_six_jobs_through_a_cap_of_three() {
    let queue = QueueHandle::new();
    let service = TriggeredService::new();
    let dispatcher = Dispatcher::new(queue.clone(), service.clone(), 3);

    let ids = dispatch_n(&dispatcher, 6);
    settle().await;

    // Exactly three admitted, the rest queued behind the cap
    assert_eq!(service.parked(), 3);
    assert_eq!(dispatcher.in_flight(), 3);
    assert_eq!(dispatcher.pending_len(), 3);
    assert_eq!(queue.counts().processing, 3);
    assert_eq!(queue.counts().pending, 3);

    // Each completion admits exactly one more, never exceeding the cap
    for round in 0..3 {
        service.release_next(Ok(ready_result("Site", "/a.mp3")));
        settle().await;
        assert!(dispatcher.in_flight() <= 3);
        assert_eq!(queue.counts().ready, round + 1);
    }

    assert_eq!(service.parked(), 3);
    assert_eq!(dispatcher.pending_len(), 0);

    for _ in 0..3 {
        service.release_next(Ok(ready_result("Site", "/a.mp3")));
    }
    settle().await;

    assert!(queue.is_settled());
    assert_eq!(queue.counts().ready, 6);
    for id in ids {
        assert_eq!(queue.get(id).unwrap().status, QueueItemStatus::Ready);
    }
}

#[tokio::test]
async fn test_admission_follows_dispatch_order() {
    let queue = QueueHandle::new();
    let service = TriggeredService::new();
    let dispatcher = Dispatcher::new(queue.clone(), service.clone(), 1);

    let ids = dispatch_n(&dispatcher, 3);
    settle().await;

    // Only the first is processing; completing it admits the second
    assert_eq!(queue.get(ids[0]).unwrap().status, QueueItemStatus::Processing);
    assert_eq!(queue.get(ids[1]).unwrap().status, QueueItemStatus::Pending);

    service.release_next(Ok(ready_result("First", "/1.mp3")));
    settle().await;
    assert_eq!(queue.get(ids[1]).unwrap().status, QueueItemStatus::Processing);
    assert_eq!(queue.get(ids[2]).unwrap().status, QueueItemStatus::Pending);

    service.release_next(Ok(ready_result("Second", "/2.mp3")));
    settle().await;
    assert_eq!(queue.get(ids[2]).unwrap().status, QueueItemStatus::Processing);
}

#[tokio::test]
async fn test_failure_releases_the_slot() {
    let queue = QueueHandle::new();
    let service = TriggeredService::new();
    let dispatcher = Dispatcher::new(queue.clone(), service.clone(), 2);

    let ids = dispatch_n(&dispatcher, 3);
    settle().await;

    service.release_next(Err("backend exploded".to_string()));
    settle().await;

    // The failed slot was reused for the third job
    let failed = queue.get(ids[0]).unwrap();
    assert_eq!(failed.status, QueueItemStatus::Error);
    assert_eq!(failed.error.as_deref(), Some("backend exploded"));
    assert_eq!(dispatcher.in_flight(), 2);
    assert_eq!(queue.get(ids[2]).unwrap().status, QueueItemStatus::Processing);

    service.release_next(Ok(ready_result("Two", "/2.mp3")));
    service.release_next(Ok(ready_result("Three", "/3.mp3")));
    settle().await;

    let counts = queue.counts();
    assert_eq!(counts.ready, 2);
    assert_eq!(counts.error, 1);
    assert!(queue.is_settled());
}

#[tokio::test]
async fn test_result_for_removed_item_is_dropped() {
    let queue = QueueHandle::new();
    let service = TriggeredService::new();
    let dispatcher = Dispatcher::new(queue.clone(), service.clone(), 2);

    let id = dispatcher.dispatch(Arc::new(vec![0]), "en", None);
    settle().await;

    queue.remove(id);
    service.release_next(Ok(ready_result("Late", "/late.mp3")));
    settle().await;

    assert!(queue.get(id).is_none());
    assert_eq!(queue.counts().total, 0);
    assert_eq!(dispatcher.in_flight(), 0);
}
