//! # Library Tree
//!
//! An arena-backed model of the music library's directory structure. Every
//! directory becomes a [`LibraryNode`]; nodes refer to their parent and children
//! by [`NodeId`] so the tree has no ownership cycles and serializes as a flat list.
//!
//! Each node carries an *identity footprint*: for every artist identity found
//! beneath it, the number of directories (the node itself included) whose own
//! tracks feature that artist. A node whose footprint holds exactly one identity
//! is *pure*, meaning everything under it is by a single artist.

use anyhow::{anyhow, ensure, Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use crate::identity::Identity;
use crate::track::{is_music, Track, TrackReader, TrackRecord};

/// Name of the marker file that suppresses track collection for a directory.
pub const IGNORE_MARKER: &str = ".ignore";

/// Index of a node in its [`LibraryTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// Location of a track: its directory node and its slot in that node's track list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrackRef {
    pub node: NodeId,
    pub slot: usize,
}

/// Identity -> count of directories featuring that identity.
pub type Footprint = BTreeMap<Identity, usize>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibraryNode {
    pub path: PathBuf,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub tracks: Vec<Track>,
    #[serde(default)]
    pub footprint: Footprint,
}

impl LibraryNode {
    fn new(path: PathBuf, parent: Option<NodeId>) -> Self {
        Self {
            path,
            parent,
            ..Self::default()
        }
    }

    /// Distinct primary-artist identities of this directory's own tracks.
    pub fn own_identities(&self) -> BTreeSet<&Identity> {
        self.tracks.iter().filter_map(|t| t.artist_id.as_ref()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryTree {
    nodes: Vec<LibraryNode>,
    root: NodeId,
}

impl LibraryTree {
    /// A tree holding only an empty root directory.
    pub fn empty(root: impl Into<PathBuf>) -> Self {
        Self {
            nodes: vec![LibraryNode::new(root.into(), None)],
            root: NodeId(0),
        }
    }

    /// Scan the directory tree rooted at `root`, reading every music file with
    /// `reader`.
    ///
    /// Directories containing an [`IGNORE_MARKER`] contribute no tracks, but their
    /// subdirectories are still scanned. Entries whose paths are not valid UTF-8
    /// are skipped, as are files whose tags cannot be read or that
    /// name no artist, are skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` is not a readable directory.
    pub fn scan(root: &Path, reader: &dyn TrackReader) -> Result<Self> {
        ensure!(root.is_dir(), "Library root `{}` is not a directory", root.display());
        fs::read_dir(root)
            .with_context(|| format!("Failed to read library root {}", root.display()))?;

        let mut tree = Self::empty(root);
        tree.grow(tree.root, reader);
        tree.sort_children();
        info!(
            "Scanned {} directories and {} tracks under {}",
            tree.len(),
            tree.track_count(),
            root.display()
        );
        Ok(tree)
    }

    fn grow(&mut self, id: NodeId, reader: &dyn TrackReader) {
        let path = self.nodes[id.0].path.clone();
        let entries = match fs::read_dir(&path) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to read directory {}: {e}", path.display());
                return;
            }
        };

        let mut files = Vec::new();
        let mut dirs = Vec::new();
        for entry in entries.flatten() {
            let Ok(file_type) = entry.file_type() else { continue };
            if entry.path().to_str().is_none() {
                warn!("Skipping {}: name is not valid UTF-8", entry.path().display());
                continue;
            }
            if file_type.is_dir() {
                dirs.push(entry.path());
            } else if file_type.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        dirs.sort();

        if path.join(IGNORE_MARKER).exists() {
            debug!("Ignoring tracks in {}", path.display());
        } else {
            debug!("{}", path.display());
            for file in files.iter().filter(|f| is_music(f)) {
                match reader.read_track(file) {
                    Ok(record) if record.is_valid() => {
                        self.nodes[id.0].tracks.push(Track::new(record));
                    }
                    Ok(_) => warn!("Track {} names no artist: skipping", file.display()),
                    Err(e) => debug!("Skipping {}: {e:#}", file.display()),
                }
            }
        }

        for dir in dirs {
            let child = self.push(LibraryNode::new(dir, Some(id)));
            self.nodes[id.0].children.push(child);
            self.grow(child, reader);
        }
    }

    /// Build a tree from records produced elsewhere, creating one node per
    /// directory between `root` and each file.
    ///
    /// # Errors
    ///
    /// Returns an error if a record's path does not lie under `root`.
    pub fn from_records(root: &Path, records: impl IntoIterator<Item = TrackRecord>) -> Result<Self> {
        let mut tree = Self::empty(root);
        let mut by_path: HashMap<PathBuf, NodeId> = HashMap::new();
        by_path.insert(root.to_path_buf(), tree.root);

        for record in records {
            if !record.is_valid() {
                warn!("Track {} names no artist: skipping", record.path.display());
                continue;
            }
            let dir = record
                .path
                .parent()
                .filter(|dir| dir.starts_with(root))
                .ok_or_else(|| {
                    anyhow!(
                        "Track {} does not lie within library root {}",
                        record.path.display(),
                        root.display()
                    )
                })?
                .to_path_buf();
            let node = tree.ensure_dir(&dir, root, &mut by_path);
            tree.nodes[node.0].tracks.push(Track::new(record));
        }

        tree.sort_children();
        Ok(tree)
    }

    fn ensure_dir(&mut self, dir: &Path, root: &Path, by_path: &mut HashMap<PathBuf, NodeId>) -> NodeId {
        if let Some(&id) = by_path.get(dir) {
            return id;
        }
        let parent_dir = dir.parent().filter(|p| p.starts_with(root)).unwrap_or(root);
        let parent = self.ensure_dir(parent_dir, root, by_path);
        let id = self.push(LibraryNode::new(dir.to_path_buf(), Some(parent)));
        self.nodes[parent.0].children.push(id);
        by_path.insert(dir.to_path_buf(), id);
        id
    }

    fn push(&mut self, node: LibraryNode) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    fn sort_children(&mut self) {
        let paths: Vec<PathBuf> = self.nodes.iter().map(|n| n.path.clone()).collect();
        for node in &mut self.nodes {
            node.children.sort_by(|a, b| paths[a.0].cmp(&paths[b.0]));
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn root_path(&self) -> &Path {
        &self.nodes[self.root.0].path
    }

    pub fn node(&self, id: NodeId) -> &LibraryNode {
        &self.nodes[id.0]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut LibraryNode {
        &mut self.nodes[id.0]
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn track(&self, r: TrackRef) -> &Track {
        &self.nodes[r.node.0].tracks[r.slot]
    }

    pub fn track_count(&self) -> usize {
        self.nodes.iter().map(|n| n.tracks.len()).sum()
    }

    /// Every track in pre-order.
    pub fn all_tracks(&self) -> Vec<TrackRef> {
        self.pre_order()
            .into_iter()
            .flat_map(|node| {
                (0..self.nodes[node.0].tracks.len()).map(move |slot| TrackRef { node, slot })
            })
            .collect()
    }

    /// Nodes ordered parent-before-children, children in path order.
    pub fn pre_order(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            order.push(id);
            stack.extend(self.nodes[id.0].children.iter().rev());
        }
        order
    }

    /// Nodes ordered children-before-parent.
    pub fn post_order(&self) -> Vec<NodeId> {
        let mut order = self.pre_order();
        order.reverse();
        order
    }

    /// Node whose path is exactly `path`.
    pub fn find(&self, path: &Path) -> Option<NodeId> {
        if !path.starts_with(self.root_path()) {
            return None;
        }
        let mut current = self.root;
        loop {
            if self.nodes[current.0].path == path {
                return Some(current);
            }
            current = *self.nodes[current.0]
                .children
                .iter()
                .find(|c| path.starts_with(&self.nodes[c.0].path))?;
        }
    }

    fn compute_footprint(&self, id: NodeId, computed: &HashMap<NodeId, Footprint>) -> Footprint {
        let node = &self.nodes[id.0];
        let mut footprint: Footprint = node
            .own_identities()
            .into_iter()
            .map(|identity| (identity.clone(), 1))
            .collect();
        for child in &node.children {
            if let Some(child_footprint) = computed.get(child) {
                for (identity, count) in child_footprint {
                    *footprint.entry(identity.clone()).or_insert(0) += count;
                }
            }
        }
        footprint
    }

    fn computed_footprints(&self) -> HashMap<NodeId, Footprint> {
        let mut computed = HashMap::with_capacity(self.nodes.len());
        for id in self.post_order() {
            let footprint = self.compute_footprint(id, &computed);
            computed.insert(id, footprint);
        }
        computed
    }

    /// Recompute every node's footprint bottom-up from the tracks' identities.
    pub fn propagate_footprints(&mut self) {
        for (id, footprint) in self.computed_footprints() {
            self.nodes[id.0].footprint = footprint;
        }
    }

    /// Whether every stored footprint equals the union of its own tracks'
    /// identities and its children's footprints.
    pub fn check_footprints(&self) -> bool {
        self.pre_order().into_iter().all(|id| {
            let node = &self.nodes[id.0];
            let mut expected: Footprint = node
                .own_identities()
                .into_iter()
                .map(|identity| (identity.clone(), 1))
                .collect();
            for child in &node.children {
                for (identity, count) in &self.nodes[child.0].footprint {
                    *expected.entry(identity.clone()).or_insert(0) += count;
                }
            }
            expected == node.footprint
        })
    }

    pub fn is_pure(&self, id: NodeId) -> bool {
        self.nodes[id.0].footprint.len() == 1
    }

    /// Pure node that is the root or whose parent is impure.
    pub fn is_maximal_pure(&self, id: NodeId) -> bool {
        self.is_pure(id) && self.parent(id).map_or(true, |p| !self.is_pure(p))
    }

    /// The single identity of a pure node.
    pub fn pure_identity(&self, id: NodeId) -> Option<&Identity> {
        if self.is_pure(id) {
            self.nodes[id.0].footprint.keys().next()
        } else {
            None
        }
    }

    /// Graft a freshly scanned `subtree` into this tree at the directory matching
    /// its root path.
    ///
    /// An existing node with the same path is replaced by the new scan; otherwise
    /// the subtree is attached below its deepest existing ancestor. Identities and
    /// footprints must be re-resolved afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the subtree does not lie within this tree's root path.
    pub fn graft(&mut self, subtree: LibraryTree) -> Result<NodeId> {
        let target = subtree.root_path().to_path_buf();
        ensure!(
            target.starts_with(self.root_path()),
            "New subtree {} must lie within the tree rooted at {}",
            target.display(),
            self.root_path().display()
        );

        if target == self.root_path() {
            *self = subtree;
            return Ok(self.root);
        }

        let mut parent = self.root;
        let mut replaced = None;
        loop {
            let next = self.nodes[parent.0]
                .children
                .iter()
                .copied()
                .find(|c| target.starts_with(&self.nodes[c.0].path));
            match next {
                Some(child) if self.nodes[child.0].path == target => {
                    replaced = Some(child);
                    break;
                }
                Some(child) => parent = child,
                None => break,
            }
        }

        let offset = self.nodes.len();
        let new_root = NodeId(offset + subtree.root.0);
        for mut node in subtree.nodes {
            node.parent = match node.parent {
                Some(p) => Some(NodeId(p.0 + offset)),
                None => Some(parent),
            };
            for child in &mut node.children {
                child.0 += offset;
            }
            self.nodes.push(node);
        }

        let children = &mut self.nodes[parent.0].children;
        match replaced {
            Some(old) => {
                debug!("Replacing subtree at {}", target.display());
                if let Some(slot) = children.iter_mut().find(|c| **c == old) {
                    *slot = new_root;
                }
            }
            None => {
                debug!("Attaching new subtree {}", target.display());
                children.push(new_root);
            }
        }

        self.compact();
        self.sort_children();
        self.find(&target)
            .ok_or_else(|| anyhow!("Grafted subtree {} not found after compaction", target.display()))
    }

    /// Drop nodes no longer reachable from the root and renumber the rest.
    fn compact(&mut self) {
        let order = self.pre_order();
        let remap: HashMap<NodeId, NodeId> = order
            .iter()
            .enumerate()
            .map(|(new, old)| (*old, NodeId(new)))
            .collect();

        let mut nodes = Vec::with_capacity(order.len());
        for old in &order {
            let mut node = std::mem::take(&mut self.nodes[old.0]);
            node.parent = node.parent.and_then(|p| remap.get(&p).copied());
            node.children = node.children.iter().filter_map(|c| remap.get(c).copied()).collect();
            nodes.push(node);
        }
        self.nodes = nodes;
        self.root = NodeId(0);
    }

    #[cfg(test)]
    pub(crate) fn nodes_mut(&mut self) -> impl Iterator<Item = &mut LibraryNode> {
        self.nodes.iter_mut()
    }
}
