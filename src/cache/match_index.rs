//! Path-trie match index fanning cache updates out to subscribers.
//!
//! Patterns are string segments; `"*"` matches any one segment. An update is
//! delivered to a subscriber when its pattern and the update path agree
//! pairwise over the shorter of the two, so a pattern that is a prefix of the
//! path matches, and so does a pattern extending below the path.
//!
//! Deliveries happen inline under the index read lock: for updates issued
//! from one producer sequence, each subscriber observes them in FIFO order.

use std::collections::BTreeMap;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::RwLock;

use super::Leaf;

/// Receives every leaf accepted by a registered pattern.
pub trait MatchSubscriber: Send + Sync {
    fn on_update(&self, leaf: &Arc<Leaf>);
}

#[derive(Default)]
struct MatchNode {
    children: BTreeMap<String, MatchNode>,
    subscribers: Vec<(u64, Arc<dyn MatchSubscriber>)>,
}

impl MatchNode {
    fn is_empty(&self) -> bool {
        self.subscribers.is_empty() && self.children.is_empty()
    }

    fn deliver(&self, path: &[String], leaf: &Arc<Leaf>) {
        match path.split_first() {
            None => self.deliver_subtree(leaf),
            Some((head, rest)) => {
                // patterns ending at this node are prefixes of the path
                for (_, subscriber) in &self.subscribers {
                    subscriber.on_update(leaf);
                }
                if let Some(child) = self.children.get(head) {
                    child.deliver(rest, leaf);
                }
                if head != "*" {
                    if let Some(child) = self.children.get("*") {
                        child.deliver(rest, leaf);
                    }
                }
            }
        }
    }

    fn deliver_subtree(&self, leaf: &Arc<Leaf>) {
        for (_, subscriber) in &self.subscribers {
            subscriber.on_update(leaf);
        }
        for child in self.children.values() {
            child.deliver_subtree(leaf);
        }
    }

    fn remove(&mut self, pattern: &[String], id: u64) {
        match pattern.split_first() {
            None => self.subscribers.retain(|(sid, _)| *sid != id),
            Some((head, rest)) => {
                let now_empty = match self.children.get_mut(head) {
                    Some(child) => {
                        child.remove(rest, id);
                        child.is_empty()
                    }
                    None => false,
                };
                if now_empty {
                    self.children.remove(head);
                }
            }
        }
    }
}

/// Concurrency-safe trie mapping path patterns to subscribers.
pub struct MatchIndex {
    root: RwLock<MatchNode>,
    next_id: AtomicU64,
}

impl Default for MatchIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl MatchIndex {
    pub fn new() -> Self {
        Self {
            root: RwLock::new(MatchNode::default()),
            next_id: AtomicU64::new(0),
        }
    }

    /// Registers `subscriber` under `pattern` and returns the handle that
    /// tears the registration down.
    pub fn add_query(
        self: &Arc<Self>,
        pattern: Vec<String>,
        subscriber: Arc<dyn MatchSubscriber>,
    ) -> QueryHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut root = self.root.write();
            let mut node = &mut *root;
            for segment in &pattern {
                node = node.children.entry(segment.clone()).or_default();
            }
            node.subscribers.push((id, subscriber));
        }
        QueryHandle {
            index: Arc::clone(self),
            pattern,
            id: Some(id),
        }
    }

    /// Delivers `leaf` to every subscriber whose pattern accepts `path`.
    pub fn update(&self, leaf: &Arc<Leaf>, path: &[String]) {
        self.root.read().deliver(path, leaf);
    }

    fn remove(&self, pattern: &[String], id: u64) {
        self.root.write().remove(pattern, id);
    }
}

/// Scoped release token for one registered query.
///
/// Deregisters exactly once, on the explicit [`QueryHandle::remove`] call or
/// when dropped, whichever comes first.
pub struct QueryHandle {
    index: Arc<MatchIndex>,
    pattern: Vec<String>,
    id: Option<u64>,
}

impl QueryHandle {
    pub fn remove(mut self) {
        self.deregister();
    }

    fn deregister(&mut self) {
        if let Some(id) = self.id.take() {
            self.index.remove(&self.pattern, id);
        }
    }
}

impl Drop for QueryHandle {
    fn drop(&mut self) {
        self.deregister();
    }
}
