//! In-memory coalesced cache of last-known telemetry state.
//!
//! One leaf tree per target, keyed by rendered path segments. South-side
//! updates enter through [`Cache::update`]; every stored leaf (and every
//! applied delete) is handed to the registered client hook, which feeds the
//! [`MatchIndex`]. Queries never touch the south side.
//!
//! Callback discipline: query and update callbacks are invoked without any
//! cache lock held by the caller, and they must not re-enter the cache.

mod coalesce;
mod match_index;

pub use coalesce::*;
pub use match_index::*;

#[cfg(test)]
mod coalesce_test;

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::proto::gnmi::Notification;
use crate::utils::path::complete_path;
use crate::Error;
use crate::Result;

/// Smallest cache unit: one full path holding its latest notification.
///
/// The notification carries exactly one update (or one delete) so it can be
/// replayed on the wire as-is. Within a target there is exactly one leaf per
/// full path and its timestamp never decreases.
#[derive(Debug)]
pub struct Leaf {
    target: String,
    path: Vec<String>,
    notification: Notification,
}

impl Leaf {
    pub fn new(target: impl Into<String>, path: Vec<String>, notification: Notification) -> Self {
        Self {
            target: target.into(),
            path,
            notification,
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    pub fn notification(&self) -> &Notification {
        &self.notification
    }

    pub fn timestamp(&self) -> i64 {
        self.notification.timestamp
    }

    /// A copy of this leaf carrying a replacement payload, detached from the
    /// tree. Used by sample emissions that re-stamp timestamps.
    pub fn detached(&self, notification: Notification) -> Leaf {
        Leaf {
            target: self.target.clone(),
            path: self.path.clone(),
            notification,
        }
    }

    /// Segments the match index sees for this leaf: the target tag followed
    /// by the rendered path.
    pub(crate) fn match_path(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(self.path.len() + 1);
        out.push(self.target.clone());
        out.extend(self.path.iter().cloned());
        out
    }

    pub(crate) fn key(&self) -> LeafKey {
        (self.target.clone(), self.path.clone())
    }
}

/// Coalescing key of a leaf: target plus rendered path.
pub(crate) type LeafKey = (String, Vec<String>);

type UpdateHook = Box<dyn Fn(&Arc<Leaf>) + Send + Sync>;

#[derive(Default)]
struct TreeNode {
    children: BTreeMap<String, TreeNode>,
    leaf: Option<Arc<Leaf>>,
}

impl TreeNode {
    fn descend_mut(&mut self, path: &[String]) -> &mut TreeNode {
        let mut node = self;
        for segment in path {
            node = node.children.entry(segment.clone()).or_default();
        }
        node
    }

    fn is_empty(&self) -> bool {
        self.leaf.is_none() && self.children.is_empty()
    }

    fn remove_subtree(&mut self, path: &[String]) -> bool {
        match path.split_first() {
            None => {
                let had_content = !self.is_empty();
                self.leaf = None;
                self.children.clear();
                had_content
            }
            Some((head, rest)) if rest.is_empty() => self.children.remove(head).is_some(),
            Some((head, rest)) => {
                let (removed, now_empty) = match self.children.get_mut(head) {
                    Some(child) => (child.remove_subtree(rest), child.is_empty()),
                    None => (false, false),
                };
                if removed && now_empty {
                    self.children.remove(head);
                }
                removed
            }
        }
    }

    fn query_node<F>(&self, path: &[String], cb: &mut F) -> Result<()>
    where
        F: FnMut(&[String], &Arc<Leaf>) -> Result<()>,
    {
        match path.split_first() {
            None => self.visit_leaves(cb),
            Some((head, rest)) => {
                if head == "*" {
                    for child in self.children.values() {
                        child.query_node(rest, cb)?;
                    }
                    return Ok(());
                }
                match self.children.get(head) {
                    Some(child) => child.query_node(rest, cb),
                    None => Ok(()),
                }
            }
        }
    }

    fn visit_leaves<F>(&self, cb: &mut F) -> Result<()>
    where
        F: FnMut(&[String], &Arc<Leaf>) -> Result<()>,
    {
        if let Some(leaf) = &self.leaf {
            cb(leaf.path(), leaf)?;
        }
        for child in self.children.values() {
            child.visit_leaves(cb)?;
        }
        Ok(())
    }
}

/// Per-target tree of last-known notification leaves.
pub struct Cache {
    targets: DashMap<String, RwLock<TreeNode>>,
    client: RwLock<Option<UpdateHook>>,
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}

impl Cache {
    pub fn new() -> Self {
        Self {
            targets: DashMap::new(),
            client: RwLock::new(None),
        }
    }

    pub fn add_target(&self, name: impl Into<String>) {
        self.targets.entry(name.into()).or_default();
    }

    pub fn remove_target(&self, name: &str) {
        self.targets.remove(name);
    }

    /// `"*"` matches when at least one target is cached; `""` never matches.
    pub fn has_target(&self, name: &str) -> bool {
        match name {
            "" => false,
            "*" => !self.targets.is_empty(),
            _ => self.targets.contains_key(name),
        }
    }

    /// Registers the tree-wide update hook invoked for every stored leaf and
    /// every applied delete.
    pub fn set_client(&self, hook: impl Fn(&Arc<Leaf>) + Send + Sync + 'static) {
        *self.client.write() = Some(Box::new(hook));
    }

    /// Applies a notification to the target's tree.
    ///
    /// Every update becomes (or replaces) the leaf at prefix ⊕ update path;
    /// arrivals older than the stored leaf are dropped. Deletes remove the
    /// addressed subtree.
    pub fn update(&self, target: &str, notification: Notification) -> Result<()> {
        let mut delivered: Vec<Arc<Leaf>> = Vec::new();
        {
            let tree = self
                .targets
                .get(target)
                .ok_or_else(|| Error::TargetNotFound(target.to_string()))?;
            let mut root = tree.write();
            let timestamp = notification.timestamp;

            for update in &notification.update {
                let full = complete_path(notification.prefix.as_ref(), update.path.as_ref());
                if full.is_empty() {
                    continue;
                }
                let node = root.descend_mut(&full);
                if let Some(existing) = &node.leaf {
                    if existing.timestamp() > timestamp {
                        debug!(target_name = target, path = ?full, "dropping stale update");
                        continue;
                    }
                }
                let single = Notification {
                    timestamp,
                    prefix: notification.prefix.clone(),
                    update: vec![update.clone()],
                    delete: vec![],
                };
                let leaf = Arc::new(Leaf::new(target, full, single));
                node.leaf = Some(Arc::clone(&leaf));
                delivered.push(leaf);
            }

            for delete in &notification.delete {
                let full = complete_path(notification.prefix.as_ref(), Some(delete));
                if root.remove_subtree(&full) {
                    let removal = Notification {
                        timestamp,
                        prefix: notification.prefix.clone(),
                        update: vec![],
                        delete: vec![delete.clone()],
                    };
                    delivered.push(Arc::new(Leaf::new(target, full, removal)));
                }
            }
        }

        let client = self.client.read();
        if let Some(hook) = client.as_ref() {
            for leaf in &delivered {
                hook(leaf);
            }
        }
        Ok(())
    }

    /// Walks every leaf matching `path` under `target` (`""`/`"*"` for all
    /// targets). `"*"` segments match any one segment; a path shorter than a
    /// stored leaf selects the whole subtree below it. The first callback
    /// error aborts the walk.
    pub fn query<F>(&self, target: &str, path: &[String], mut cb: F) -> Result<()>
    where
        F: FnMut(&[String], &Arc<Leaf>) -> Result<()>,
    {
        if target.is_empty() || target == "*" {
            for entry in self.targets.iter() {
                entry.value().read().query_node(path, &mut cb)?;
            }
            return Ok(());
        }
        let tree = self
            .targets
            .get(target)
            .ok_or_else(|| Error::TargetNotFound(target.to_string()))?;
        let root = tree.read();
        root.query_node(path, &mut cb)
    }
}
