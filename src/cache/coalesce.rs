//! Unbounded FIFO with per-key coalescing, one queue per subscriber stream.
//!
//! Successive updates to the same full path collapse into the slot already
//! queued for that path: the payload is replaced in place, the slot keeps the
//! index of its original insertion and its duplicate counter grows. Sync
//! markers never coalesce. At most one consumer may drain a queue.

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;

use super::Leaf;
use super::LeafKey;

/// One slot of a [`CoalesceQueue`].
#[derive(Debug)]
pub enum QueueItem {
    /// A cache leaf, keyed for coalescing by target plus path.
    Update(Arc<Leaf>),
    /// In-band sentinel separating initial-state data from streaming
    /// updates.
    Sync,
}

struct Entry {
    index: u64,
    dup: u32,
    item: QueueItem,
}

#[derive(Default)]
struct Inner {
    entries: VecDeque<Entry>,
    /// still-queued slot index per leaf key
    pending: HashMap<LeafKey, u64>,
    next_index: u64,
    closed: bool,
}

pub struct CoalesceQueue {
    inner: Mutex<Inner>,
    ready: Notify,
}

impl Default for CoalesceQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl CoalesceQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            ready: Notify::new(),
        }
    }

    /// Enqueues `item`, coalescing keyed leaves into their still-queued slot.
    ///
    /// Returns the slot index and whether the insert coalesced; `None` after
    /// [`CoalesceQueue::close`], where inserting is a no-op.
    pub fn insert(&self, item: QueueItem) -> Option<(u64, bool)> {
        let key = match &item {
            QueueItem::Update(leaf) => Some(leaf.key()),
            QueueItem::Sync => None,
        };

        let mut inner = self.inner.lock();
        if inner.closed {
            return None;
        }

        if let Some(key) = &key {
            if let Some(&index) = inner.pending.get(key) {
                // entries stay sorted by index, so the slot is found by
                // binary search
                let pos = inner
                    .entries
                    .binary_search_by_key(&index, |e| e.index)
                    .expect("pending slot must be queued");
                let entry = &mut inner.entries[pos];
                entry.item = item;
                entry.dup += 1;
                return Some((index, true));
            }
        }

        let index = inner.next_index;
        inner.next_index += 1;
        if let Some(key) = key {
            inner.pending.insert(key, index);
        }
        inner.entries.push_back(Entry {
            index,
            dup: 0,
            item,
        });
        drop(inner);
        self.ready.notify_one();
        Some((index, false))
    }

    /// Awaits the next item and its duplicate count.
    ///
    /// After [`CoalesceQueue::close`] the backlog is drained first; `None`
    /// signals the queue is closed and empty.
    pub async fn next(&self) -> Option<(QueueItem, u32)> {
        loop {
            {
                let mut inner = self.inner.lock();
                if let Some(entry) = inner.entries.pop_front() {
                    if let QueueItem::Update(leaf) = &entry.item {
                        let key = leaf.key();
                        if inner.pending.get(&key) == Some(&entry.index) {
                            inner.pending.remove(&key);
                        }
                    }
                    return Some((entry.item, entry.dup));
                }
                if inner.closed {
                    return None;
                }
            }
            self.ready.notified().await;
        }
    }

    pub fn close(&self) {
        let mut inner = self.inner.lock();
        inner.closed = true;
        drop(inner);
        self.ready.notify_one();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
