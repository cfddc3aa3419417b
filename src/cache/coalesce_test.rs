use std::sync::Arc;
use std::time::Duration;

use super::*;
use crate::proto::gnmi::Notification;

fn leaf(target: &str, path: &[&str], timestamp: i64) -> Arc<Leaf> {
    Arc::new(Leaf::new(
        target,
        path.iter().map(|s| s.to_string()).collect(),
        Notification {
            timestamp,
            ..Default::default()
        },
    ))
}

fn popped_path(item: &QueueItem) -> Vec<String> {
    match item {
        QueueItem::Update(leaf) => leaf.path().to_vec(),
        QueueItem::Sync => panic!("expected a leaf"),
    }
}

#[tokio::test]
async fn fifo_order_should_be_preserved() {
    let queue = CoalesceQueue::new();
    queue.insert(QueueItem::Update(leaf("r1", &["a"], 1)));
    queue.insert(QueueItem::Update(leaf("r1", &["b"], 1)));
    queue.insert(QueueItem::Sync);

    let (first, _) = queue.next().await.unwrap();
    let (second, _) = queue.next().await.unwrap();
    let (third, _) = queue.next().await.unwrap();

    assert_eq!(popped_path(&first), vec!["a"]);
    assert_eq!(popped_path(&second), vec!["b"]);
    assert!(matches!(third, QueueItem::Sync));
}

#[tokio::test]
async fn coalesced_slot_should_keep_position_and_count_duplicates() {
    let queue = CoalesceQueue::new();
    queue.insert(QueueItem::Update(leaf("r1", &["a"], 1)));
    queue.insert(QueueItem::Update(leaf("r1", &["b"], 1)));
    let (index, coalesced) = queue
        .insert(QueueItem::Update(leaf("r1", &["a"], 2)))
        .unwrap();

    assert!(coalesced);
    assert_eq!(index, 0);
    assert_eq!(queue.len(), 2);

    let (first, dup) = queue.next().await.unwrap();
    match first {
        QueueItem::Update(l) => {
            assert_eq!(l.path(), ["a"]);
            assert_eq!(l.timestamp(), 2, "payload must be the newest");
        }
        QueueItem::Sync => panic!("expected a leaf"),
    }
    assert_eq!(dup, 1);

    let (second, dup) = queue.next().await.unwrap();
    assert_eq!(popped_path(&second), vec!["b"]);
    assert_eq!(dup, 0);
}

#[tokio::test]
async fn leaves_on_different_targets_should_not_coalesce() {
    let queue = CoalesceQueue::new();
    queue.insert(QueueItem::Update(leaf("r1", &["a"], 1)));
    queue.insert(QueueItem::Update(leaf("r2", &["a"], 1)));

    assert_eq!(queue.len(), 2);
}

#[tokio::test]
async fn sync_markers_should_never_coalesce() {
    let queue = CoalesceQueue::new();
    queue.insert(QueueItem::Sync);
    queue.insert(QueueItem::Sync);

    assert_eq!(queue.len(), 2);
}

#[tokio::test]
async fn popped_key_should_be_coalescible_again() {
    let queue = CoalesceQueue::new();
    queue.insert(QueueItem::Update(leaf("r1", &["a"], 1)));
    queue.next().await.unwrap();

    let (_, coalesced) = queue
        .insert(QueueItem::Update(leaf("r1", &["a"], 2)))
        .unwrap();
    assert!(!coalesced, "a drained slot is no longer queued");
}

#[tokio::test]
async fn insert_after_close_should_be_a_noop() {
    let queue = CoalesceQueue::new();
    queue.close();

    assert!(queue.insert(QueueItem::Sync).is_none());
    assert_eq!(queue.len(), 0);
}

#[tokio::test]
async fn close_should_drain_backlog_then_signal_closed() {
    let queue = CoalesceQueue::new();
    queue.insert(QueueItem::Update(leaf("r1", &["a"], 1)));
    queue.insert(QueueItem::Sync);
    queue.close();

    assert!(queue.next().await.is_some());
    assert!(queue.next().await.is_some());
    assert!(queue.next().await.is_none());
}

#[tokio::test]
async fn next_should_block_until_an_insert_arrives() {
    let queue = Arc::new(CoalesceQueue::new());

    let producer = Arc::clone(&queue);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        producer.insert(QueueItem::Sync);
    });

    let item = tokio::time::timeout(Duration::from_secs(2), queue.next())
        .await
        .expect("next must wake on insert");
    assert!(matches!(item, Some((QueueItem::Sync, 0))));
}

#[tokio::test]
async fn next_should_wake_on_close() {
    let queue = Arc::new(CoalesceQueue::new());

    let closer = Arc::clone(&queue);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        closer.close();
    });

    let item = tokio::time::timeout(Duration::from_secs(2), queue.next())
        .await
        .expect("next must wake on close");
    assert!(item.is_none());
}
