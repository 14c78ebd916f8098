// src/snapshot/hierarchy.rs

//! Persistent map from absolute paths to snapshots.
//!
//! The hierarchy is a trie keyed by path segments. A node either holds a
//! complete snapshot of its location (and then has no children), or is a
//! partial node whose children are known separately. Every update returns a
//! new hierarchy: nodes on the updated path are copied, everything else is
//! shared with the previous value through `Arc`.
//!
//! Updates report what they removed and added through a
//! [`SnapshotDiffListener`], which is how the watch registry learns which
//! locations became (un)interesting.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::snapshot::{FileSystemLocationSnapshot, FileType};

/// Receives the root snapshots removed from and added to a hierarchy.
pub trait SnapshotDiffListener {
    fn node_removed(&mut self, snapshot: &FileSystemLocationSnapshot);
    fn node_added(&mut self, snapshot: &FileSystemLocationSnapshot);
}

#[derive(Debug, Default)]
pub struct NoopDiffListener;

impl SnapshotDiffListener for NoopDiffListener {
    fn node_removed(&mut self, _snapshot: &FileSystemLocationSnapshot) {}
    fn node_added(&mut self, _snapshot: &FileSystemLocationSnapshot) {}
}

/// Collects the diff so it can be handed on after the update is published.
#[derive(Debug, Default)]
pub struct SnapshotCollectingDiffListener {
    pub removed: Vec<FileSystemLocationSnapshot>,
    pub added: Vec<FileSystemLocationSnapshot>,
}

impl SnapshotCollectingDiffListener {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.added.is_empty()
    }
}

impl SnapshotDiffListener for SnapshotCollectingDiffListener {
    fn node_removed(&mut self, snapshot: &FileSystemLocationSnapshot) {
        self.removed.push(snapshot.clone());
    }

    fn node_added(&mut self, snapshot: &FileSystemLocationSnapshot) {
        self.added.push(snapshot.clone());
    }
}

#[derive(Debug, Default)]
struct Node {
    snapshot: Option<FileSystemLocationSnapshot>,
    children: BTreeMap<String, Arc<Node>>,
}

impl Node {
    fn complete(snapshot: FileSystemLocationSnapshot) -> Self {
        Self {
            snapshot: Some(snapshot),
            children: BTreeMap::new(),
        }
    }

    fn partial(children: BTreeMap<String, Arc<Node>>) -> Option<Arc<Self>> {
        if children.is_empty() {
            None
        } else {
            Some(Arc::new(Self {
                snapshot: None,
                children,
            }))
        }
    }

    fn for_each_snapshot(&self, f: &mut dyn FnMut(&FileSystemLocationSnapshot)) {
        match &self.snapshot {
            Some(snapshot) => f(snapshot),
            None => {
                for child in self.children.values() {
                    child.for_each_snapshot(f);
                }
            }
        }
    }
}

/// Counts of what a hierarchy currently retains.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetainedStatistics {
    pub files: u64,
    pub directories: u64,
    pub missing: u64,
}

/// Immutable, structurally shared snapshot tree.
#[derive(Debug, Clone, Default)]
pub struct SnapshotHierarchy {
    root: Arc<Node>,
}

fn segments_of(path: &Path) -> Vec<String> {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect()
}

impl SnapshotHierarchy {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.root.snapshot.is_none() && self.root.children.is_empty()
    }

    /// True if both hierarchies are the very same value.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.root, &other.root)
    }

    /// Store a complete snapshot of `path`.
    ///
    /// Storing below a complete directory snapshot is a no-op, since that
    /// snapshot already describes `path`. A file or missing snapshot above
    /// `path` is replaced, and so is everything stored at or below `path`.
    pub fn store(
        &self,
        path: &Path,
        snapshot: FileSystemLocationSnapshot,
        listener: &mut dyn SnapshotDiffListener,
    ) -> Self {
        if let Some(ancestor) = self.complete_ancestor(path) {
            if ancestor.file_type() == FileType::Directory && ancestor.path() != path {
                return self.clone();
            }
        }
        let segments = segments_of(path);
        let root = store_node(Some(&self.root), &segments, snapshot, listener);
        Self { root }
    }

    /// Remove `path` and everything below it.
    ///
    /// A complete directory snapshot above `path` is broken up: its other
    /// children stay, as the same shared snapshots, and are reported as added,
    /// while the directory itself is reported as removed.
    pub fn invalidate(&self, path: &Path, listener: &mut dyn SnapshotDiffListener) -> Self {
        let segments = segments_of(path);
        match invalidate_node(&self.root, &segments, listener) {
            Some(root) => Self { root },
            None => Self::empty(),
        }
    }

    /// Drop everything, reporting every root snapshot as removed.
    pub fn clear(&self, listener: &mut dyn SnapshotDiffListener) -> Self {
        self.root.for_each_snapshot(&mut |s| listener.node_removed(s));
        Self::empty()
    }

    /// The snapshot of `path`, if the hierarchy knows it completely.
    pub fn find_snapshot(&self, path: &Path) -> Option<FileSystemLocationSnapshot> {
        self.complete_ancestor(path).and_then(|ancestor| ancestor.find(path))
    }

    /// All complete snapshots at or below `path`.
    pub fn root_snapshots_under(&self, path: &Path) -> Vec<FileSystemLocationSnapshot> {
        if let Some(snapshot) = self.find_snapshot(path) {
            return vec![snapshot];
        }
        let mut result = Vec::new();
        if let Some(node) = self.node_at(path) {
            node.for_each_snapshot(&mut |s| result.push(s.clone()));
        }
        result
    }

    /// Whether anything is known about `path` or below it.
    pub fn has_descendants_under(&self, path: &Path) -> bool {
        self.complete_ancestor(path).is_some() || self.node_at(path).is_some()
    }

    /// Every complete snapshot in the hierarchy.
    pub fn root_snapshots(&self) -> Vec<FileSystemLocationSnapshot> {
        let mut result = Vec::new();
        self.root.for_each_snapshot(&mut |s| result.push(s.clone()));
        result
    }

    pub fn statistics(&self) -> RetainedStatistics {
        let mut stats = RetainedStatistics::default();
        self.root.for_each_snapshot(&mut |root| {
            let mut count = |s: &FileSystemLocationSnapshot, _: &[String]| {
                match s.file_type() {
                    FileType::RegularFile => stats.files += 1,
                    FileType::Directory => stats.directories += 1,
                    FileType::Missing => stats.missing += 1,
                }
                crate::snapshot::SnapshotVisitResult::Continue
            };
            root.accept(&mut count);
        });
        stats
    }

    /// The closest complete snapshot at or above `path`.
    fn complete_ancestor(&self, path: &Path) -> Option<&FileSystemLocationSnapshot> {
        let mut node = &self.root;
        if let Some(snapshot) = &node.snapshot {
            return Some(snapshot);
        }
        for segment in segments_of(path) {
            node = node.children.get(&segment)?;
            if let Some(snapshot) = &node.snapshot {
                return Some(snapshot);
            }
        }
        None
    }

    fn node_at(&self, path: &Path) -> Option<&Arc<Node>> {
        let mut node = &self.root;
        for segment in segments_of(path) {
            node = node.children.get(&segment)?;
        }
        if node.snapshot.is_none() && node.children.is_empty() {
            None
        } else {
            Some(node)
        }
    }
}

fn store_node(
    node: Option<&Arc<Node>>,
    segments: &[String],
    snapshot: FileSystemLocationSnapshot,
    listener: &mut dyn SnapshotDiffListener,
) -> Arc<Node> {
    let Some((first, rest)) = segments.split_first() else {
        if let Some(existing) = node {
            existing.for_each_snapshot(&mut |s| listener.node_removed(s));
        }
        listener.node_added(&snapshot);
        return Arc::new(Node::complete(snapshot));
    };

    let mut children = BTreeMap::new();
    if let Some(existing) = node {
        match &existing.snapshot {
            // A file or missing location now has something below it.
            Some(leaf) => listener.node_removed(leaf),
            None => children = existing.children.clone(),
        }
    }
    let child = store_node(children.get(first), rest, snapshot, listener);
    children.insert(first.clone(), child);
    Arc::new(Node {
        snapshot: None,
        children,
    })
}

fn invalidate_node(
    node: &Arc<Node>,
    segments: &[String],
    listener: &mut dyn SnapshotDiffListener,
) -> Option<Arc<Node>> {
    if let Some(snapshot) = &node.snapshot {
        listener.node_removed(snapshot);
        return invalidate_below(snapshot, segments, listener);
    }
    let Some((first, rest)) = segments.split_first() else {
        node.for_each_snapshot(&mut |s| listener.node_removed(s));
        return None;
    };
    let Some(child) = node.children.get(first) else {
        return Some(Arc::clone(node));
    };

    let new_child = invalidate_node(child, rest, listener);
    if let Some(new_child) = &new_child {
        if Arc::ptr_eq(new_child, child) {
            return Some(Arc::clone(node));
        }
    }
    let mut children = node.children.clone();
    match new_child {
        Some(new_child) => children.insert(first.clone(), new_child),
        None => children.remove(first),
    };
    Node::partial(children)
}

/// Break up a complete snapshot (already reported as removed) so that only
/// the location at `segments` below it is gone.
fn invalidate_below(
    snapshot: &FileSystemLocationSnapshot,
    segments: &[String],
    listener: &mut dyn SnapshotDiffListener,
) -> Option<Arc<Node>> {
    let (first, rest) = segments.split_first()?;
    let FileSystemLocationSnapshot::Directory(directory) = snapshot else {
        // Something changed below a file or missing location.
        return None;
    };

    let mut children = BTreeMap::new();
    for child in &directory.children {
        if child.name() == first.as_str() {
            if let Some(node) = invalidate_below(child, rest, listener) {
                children.insert(first.clone(), node);
            }
        } else {
            listener.node_added(child);
            children.insert(child.name().to_string(), Arc::new(Node::complete(child.clone())));
        }
    }
    Node::partial(children)
}
