//! The lazy tree-node model.
//!
//! [`NodeTree`] is an arena of nodes addressed by copyable [`NodeId`]s;
//! parents are non-owning back-references, so teardown stays acyclic. A
//! node's children exist only after [`NodeTree::expand`], and each variant
//! parses its backing bytes at most once per expansion cycle. Persistence
//! happens from the root down ([`NodeTree::save`]): interior edits mark
//! their owning document dirty, and the document (standalone NBT file or
//! region chunk) is re-serialized as a whole.
//!
//! Tag nodes address their value by path segment (member name or list
//! index) inside the owning document's parsed tree rather than by holding a
//! reference into it, which keeps the arena free of interior pointers.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{
    codec, make_unique_name, CodecError, Compound, Compression, Error, RegionFile, Result, Tag,
    TagContainer, Value, REGION_SIDE,
};

/// Handle to a node in a [`NodeTree`]. Ids are never reused, so a handle to
/// a deleted node goes stale rather than aliasing a new node.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct NodeId(usize);

/// One step of a tag path inside a parsed document.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Step {
    /// Compound member name.
    Name(String),
    /// List element index.
    Index(usize),
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Name(name) => f.write_str(name),
            Step::Index(index) => write!(f, "{index}"),
        }
    }
}

/// Structural operations a node variant supports, fixed at construction.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct Capabilities {
    pub create_tag: bool,
    pub paste_into: bool,
    pub search: bool,
    pub delete: bool,
    pub rename: bool,
    pub copy: bool,
    pub edit: bool,
}

/// The closed set of node variants.
pub enum NodeKind {
    /// Container of recognized files and subdirectories.
    Directory { path: PathBuf },
    /// Standalone NBT document; root compound parsed on first expand.
    NbtFile {
        path: PathBuf,
        compression: Compression,
        root_name: String,
        root: Option<Compound>,
    },
    /// Container of chunks; the store is opened on first expand.
    Region {
        path: PathBuf,
        file: Option<RegionFile>,
    },
    /// One chunk of a region; its document is parsed on first expand.
    Chunk {
        x: i32,
        z: i32,
        root_name: String,
        tree: Option<Compound>,
    },
    /// One tag inside a parsed document.
    Tag { step: Step, tag: Tag },
}

struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    expanded: bool,
    data_modified: bool,
    parent_modified: bool,
    kind: NodeKind,
}

impl Node {
    fn new(parent: Option<NodeId>, kind: NodeKind) -> Self {
        Self {
            parent,
            children: Vec::new(),
            expanded: false,
            data_modified: false,
            parent_modified: false,
            kind,
        }
    }
}

/// Synchronous collaborator that asks the user for a new tag's name and
/// value. The interactive front end implementing it is out of scope; tests
/// inject stubs.
pub trait TagPrompt {
    /// Returns the committed (name, value) pair, or `None` on cancel. The
    /// value's kind must match `kind`; `reserved` lists sibling names the
    /// prompt must refuse.
    fn request(&mut self, kind: Tag, reserved: &BTreeSet<String>) -> Option<(String, Value)>;
}

/// Synchronous clipboard collaborator for paste.
pub trait ClipboardSource {
    fn pending(&self) -> Option<(String, Value)>;
}

#[derive(Default)]
pub struct NodeTree {
    nodes: Vec<Option<Node>>,
}

impl NodeTree {
    pub fn new() -> Self {
        Self::default()
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        self.nodes.push(Some(node));
        NodeId(self.nodes.len() - 1)
    }

    fn node(&self, id: NodeId) -> &Node {
        self.nodes[id.0].as_ref().expect("stale node id")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes[id.0].as_mut().expect("stale node id")
    }

    fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0).and_then(Option::as_ref)
    }

    /// Whether `id` still refers to a live node.
    pub fn contains(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Open a filesystem path as a root node: a directory, a region file
    /// (`.mca`/`.mcr`), or a standalone NBT file.
    pub fn open_root(&mut self, path: &Path) -> Result<NodeId> {
        let meta = fs::metadata(path)?;
        let kind = if meta.is_dir() {
            NodeKind::Directory {
                path: path.to_path_buf(),
            }
        } else if is_region_name(path) {
            NodeKind::Region {
                path: path.to_path_buf(),
                file: None,
            }
        } else {
            NodeKind::NbtFile {
                path: path.to_path_buf(),
                compression: Compression::Gzip,
                root_name: String::new(),
                root: None,
            }
        };
        Ok(self.alloc(Node::new(None, kind)))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.get(id).map(|n| &n.kind)
    }

    pub fn is_expanded(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(|n| n.expanded)
    }

    pub fn is_data_modified(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(|n| n.data_modified)
    }

    pub fn is_parent_modified(&self, id: NodeId) -> bool {
        self.get(id).is_some_and(|n| n.parent_modified)
    }

    /// The unique ancestor with no parent. Operations persist by saving the
    /// root, never an interior node.
    pub fn root_of(&self, id: NodeId) -> NodeId {
        let mut current = id;
        while let Some(parent) = self.node(current).parent {
            current = parent;
        }
        current
    }

    /// Fixed capability set of the node's variant.
    pub fn capabilities(&self, id: NodeId) -> Capabilities {
        let Some(node) = self.get(id) else {
            return Capabilities::default();
        };
        match &node.kind {
            NodeKind::Directory { .. } | NodeKind::Region { .. } => Capabilities {
                search: true,
                ..Capabilities::default()
            },
            NodeKind::NbtFile { .. } => Capabilities {
                create_tag: true,
                paste_into: true,
                search: true,
                ..Capabilities::default()
            },
            NodeKind::Chunk { .. } => Capabilities {
                create_tag: true,
                paste_into: true,
                search: true,
                delete: true,
                ..Capabilities::default()
            },
            NodeKind::Tag { tag, .. } => {
                let rename = self.parent_is_named(id);
                if tag.is_composite() {
                    Capabilities {
                        create_tag: true,
                        paste_into: true,
                        search: true,
                        delete: true,
                        rename,
                        copy: true,
                        ..Capabilities::default()
                    }
                } else {
                    Capabilities {
                        delete: true,
                        rename,
                        copy: true,
                        edit: tag.is_primitive() || *tag == Tag::String,
                        ..Capabilities::default()
                    }
                }
            }
        }
    }

    fn parent_is_named(&self, id: NodeId) -> bool {
        let Some(parent) = self.parent(id) else {
            return false;
        };
        match &self.node(parent).kind {
            NodeKind::NbtFile { .. } | NodeKind::Chunk { .. } => true,
            NodeKind::Tag { tag, .. } => *tag == Tag::Compound,
            _ => false,
        }
    }

    /// Path segment identifying this node among its siblings: the root's
    /// given path, a file name, `"{x}.{z}"` for a chunk, a member name or
    /// list index for a tag.
    pub fn segment(&self, id: NodeId) -> String {
        let node = self.node(id);
        match &node.kind {
            NodeKind::Directory { path }
            | NodeKind::NbtFile { path, .. }
            | NodeKind::Region { path, .. } => {
                if node.parent.is_none() {
                    path.display().to_string()
                } else {
                    path.file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| path.display().to_string())
                }
            }
            NodeKind::Chunk { x, z, .. } => format!("{x}.{z}"),
            NodeKind::Tag { step, .. } => step.to_string(),
        }
    }

    /// Slash-joined segments from the root down; round-trips through the
    /// path enumerator.
    pub fn node_path(&self, id: NodeId) -> String {
        if !self.contains(id) {
            return String::new();
        }
        let mut parts = Vec::new();
        let mut current = id;
        loop {
            parts.push(self.segment(current));
            match self.node(current).parent {
                Some(parent) => current = parent,
                None => break,
            }
        }
        parts.reverse();
        parts.join("/")
    }

    /// Human-readable label for outlines and `print`.
    pub fn display_name(&self, id: NodeId) -> String {
        let Some(node) = self.get(id) else {
            return String::new();
        };
        match &node.kind {
            NodeKind::Directory { .. } | NodeKind::NbtFile { .. } | NodeKind::Region { .. } => {
                self.segment(id)
            }
            NodeKind::Chunk { x, z, .. } => {
                let region = node
                    .parent
                    .and_then(|p| self.region_file(p))
                    .and_then(RegionFile::region_coords);
                match region {
                    Some((rx, rz)) => format!(
                        "Chunk [{x}, {z}] in world at ({}, {})",
                        rx * REGION_SIDE + x,
                        rz * REGION_SIDE + z
                    ),
                    None => format!("Chunk [{x}, {z}]"),
                }
            }
            NodeKind::Tag { step, .. } => match self.value(id) {
                Some(value) => format!("{step}: {}", value.preview()),
                None => step.to_string(),
            },
        }
    }

    // ---- value resolution ----

    /// Walk tag steps up to the owning document node.
    fn doc_and_steps(&self, id: NodeId) -> Option<(NodeId, Vec<Step>)> {
        let mut steps = Vec::new();
        let mut current = id;
        loop {
            let node = self.get(current)?;
            match &node.kind {
                NodeKind::Tag { step, .. } => {
                    steps.push(step.clone());
                    current = node.parent?;
                }
                _ => break,
            }
        }
        steps.reverse();
        Some((current, steps))
    }

    /// Nearest ancestor-or-self that owns a parsed document.
    fn document_of(&self, id: NodeId) -> Option<NodeId> {
        self.doc_and_steps(id).map(|(doc, _)| doc)
    }

    pub(crate) fn root_compound(&self, doc: NodeId) -> Option<&Compound> {
        match &self.get(doc)?.kind {
            NodeKind::NbtFile { root, .. } => root.as_ref(),
            NodeKind::Chunk { tree, .. } => tree.as_ref(),
            _ => None,
        }
    }

    fn root_compound_mut(&mut self, doc: NodeId) -> Option<&mut Compound> {
        match &mut self.node_mut(doc).kind {
            NodeKind::NbtFile { root, .. } => root.as_mut(),
            NodeKind::Chunk { tree, .. } => tree.as_mut(),
            _ => None,
        }
    }

    /// The tag value a tag node addresses. `None` for non-tag nodes.
    pub fn value(&self, id: NodeId) -> Option<&Value> {
        let (doc, steps) = self.doc_and_steps(id)?;
        let (first, rest) = steps.split_first()?;
        let root = self.root_compound(doc)?;
        let Step::Name(name) = first else {
            return None;
        };
        let mut current = root.get(name)?;
        for step in rest {
            current = match (current, step) {
                (Value::Compound(c), Step::Name(name)) => c.get(name)?,
                (Value::List(l), Step::Index(index)) => l.get(*index)?,
                _ => return None,
            };
        }
        Some(current)
    }

    pub fn value_mut(&mut self, id: NodeId) -> Option<&mut Value> {
        let (doc, steps) = self.doc_and_steps(id)?;
        let (first, rest) = steps.split_first()?;
        let first = first.clone();
        let rest = rest.to_vec();
        let root = self.root_compound_mut(doc)?;
        let Step::Name(name) = &first else {
            return None;
        };
        let mut current = root.get_mut(name)?;
        for step in &rest {
            current = match (current, step) {
                (Value::Compound(c), Step::Name(name)) => c.get_mut(name)?,
                (Value::List(l), Step::Index(index)) => l.get_mut(*index)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Mutable container view of the node's children: the root compound for
    /// document nodes, the compound/list value for tag nodes.
    pub fn container_of(&mut self, id: NodeId) -> Option<TagContainer<'_>> {
        let (doc, steps) = self.doc_and_steps(id)?;
        if steps.is_empty() {
            return self.root_compound_mut(doc).map(TagContainer::Named);
        }
        TagContainer::of(self.value_mut(id)?)
    }

    /// Sibling names in use below this node. Empty for ordered and
    /// childless containers.
    pub fn names_in_use(&self, id: NodeId) -> BTreeSet<String> {
        let Some((doc, steps)) = self.doc_and_steps(id) else {
            return BTreeSet::new();
        };
        if steps.is_empty() {
            return self
                .root_compound(doc)
                .map(Compound::names)
                .unwrap_or_default();
        }
        match self.value(id) {
            Some(Value::Compound(c)) => c.names(),
            _ => BTreeSet::new(),
        }
    }

    // ---- expansion & release ----

    /// Materialize this node's children. Idempotent: an expanded node
    /// returns immediately, and document variants parse at most once (the
    /// parsed-tree `Option` is the single-flight guard).
    pub fn expand(&mut self, id: NodeId) -> Result<()> {
        let Some(node) = self.get(id) else {
            return Err(Error::Apply("node is no longer part of the tree"));
        };
        if node.expanded {
            return Ok(());
        }
        match &node.kind {
            NodeKind::Directory { .. } => self.expand_directory(id)?,
            NodeKind::NbtFile { .. } => self.expand_nbt_file(id)?,
            NodeKind::Region { .. } => self.expand_region(id)?,
            NodeKind::Chunk { .. } => self.expand_chunk(id)?,
            NodeKind::Tag { .. } => self.expand_tag(id),
        }
        self.node_mut(id).expanded = true;
        Ok(())
    }

    fn expand_directory(&mut self, id: NodeId) -> Result<()> {
        let NodeKind::Directory { path } = &self.node(id).kind else {
            unreachable!()
        };
        let path = path.clone();
        let mut entries: Vec<(String, PathBuf, bool)> = Vec::new();
        for entry in fs::read_dir(&path)? {
            let entry = entry?;
            let entry_path = entry.path();
            let is_dir = entry.file_type()?.is_dir();
            entries.push((
                entry.file_name().to_string_lossy().into_owned(),
                entry_path,
                is_dir,
            ));
        }
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        for (_, entry_path, is_dir) in entries {
            let kind = if is_dir {
                NodeKind::Directory { path: entry_path }
            } else if is_region_name(&entry_path) {
                NodeKind::Region {
                    path: entry_path,
                    file: None,
                }
            } else if is_nbt_name(&entry_path) {
                NodeKind::NbtFile {
                    path: entry_path,
                    compression: Compression::Gzip,
                    root_name: String::new(),
                    root: None,
                }
            } else {
                continue;
            };
            let child = self.alloc(Node::new(Some(id), kind));
            self.node_mut(id).children.push(child);
        }
        Ok(())
    }

    fn expand_nbt_file(&mut self, id: NodeId) -> Result<()> {
        let NodeKind::NbtFile { path, root, .. } = &self.node(id).kind else {
            unreachable!()
        };
        if root.is_none() {
            let path = path.clone();
            debug!(path = %path.display(), "parsing NBT file");
            let bytes = fs::read(&path)?;
            let (compression, name, value) = codec::decode_document(&bytes)?;
            let root_tag = value.tag();
            let Value::Compound(parsed) = value else {
                return Err(CodecError::RootNotCompound(root_tag).into());
            };
            let NodeKind::NbtFile {
                compression: slot_compression,
                root_name,
                root,
                ..
            } = &mut self.node_mut(id).kind
            else {
                unreachable!()
            };
            *slot_compression = compression;
            *root_name = name;
            *root = Some(parsed);
        }
        self.populate_compound_children(id);
        Ok(())
    }

    fn expand_region(&mut self, id: NodeId) -> Result<()> {
        let NodeKind::Region { path, file } = &self.node(id).kind else {
            unreachable!()
        };
        if file.is_none() {
            let path = path.clone();
            debug!(path = %path.display(), "opening region file");
            let opened = RegionFile::open(&path)?;
            let NodeKind::Region { file, .. } = &mut self.node_mut(id).kind else {
                unreachable!()
            };
            *file = Some(opened);
        }
        let coords = self
            .region_file(id)
            .map(RegionFile::chunk_coords)
            .unwrap_or_default();
        for (x, z) in coords {
            let child = self.alloc(Node::new(
                Some(id),
                NodeKind::Chunk {
                    x,
                    z,
                    root_name: String::new(),
                    tree: None,
                },
            ));
            self.node_mut(id).children.push(child);
        }
        Ok(())
    }

    fn expand_chunk(&mut self, id: NodeId) -> Result<()> {
        let NodeKind::Chunk { x, z, tree, .. } = &self.node(id).kind else {
            unreachable!()
        };
        if tree.is_none() {
            let (x, z) = (*x, *z);
            let parent = self.node(id).parent.ok_or(Error::Apply("orphaned chunk"))?;
            let data = self
                .region_file(parent)
                .ok_or(Error::Apply("chunk without a region store"))?
                .read_chunk(x, z)?;
            let (name, value) = codec::read_named_value(&mut &data[..])?;
            // A document without a compound root leaves the chunk empty.
            let parsed = match value {
                Value::Compound(c) => c,
                _ => Compound::default(),
            };
            let NodeKind::Chunk {
                root_name, tree, ..
            } = &mut self.node_mut(id).kind
            else {
                unreachable!()
            };
            *root_name = name;
            *tree = Some(parsed);
        }
        self.populate_compound_children(id);
        Ok(())
    }

    fn expand_tag(&mut self, id: NodeId) {
        let descriptors: Vec<(Step, Tag)> = match self.value(id) {
            Some(Value::Compound(c)) => c
                .iter()
                .map(|(name, value)| (Step::Name(name.to_string()), value.tag()))
                .collect(),
            Some(Value::List(l)) => l
                .iter()
                .enumerate()
                .map(|(index, value)| (Step::Index(index), value.tag()))
                .collect(),
            _ => Vec::new(),
        };
        self.push_tag_children(id, descriptors);
    }

    fn populate_compound_children(&mut self, id: NodeId) {
        let descriptors: Vec<(Step, Tag)> = self
            .root_compound(id)
            .map(|root| {
                root.iter()
                    .map(|(name, value)| (Step::Name(name.to_string()), value.tag()))
                    .collect()
            })
            .unwrap_or_default();
        self.push_tag_children(id, descriptors);
    }

    fn push_tag_children(&mut self, id: NodeId, descriptors: Vec<(Step, Tag)>) {
        for (step, tag) in descriptors {
            let child = self.alloc(Node::new(Some(id), NodeKind::Tag { step, tag }));
            self.node_mut(id).children.push(child);
        }
    }

    /// Collapse this node: discard children and any parsed tree, so the
    /// next expand re-reads the backing store. Releasing unsaved edits
    /// drops them; callers needing durability must save first (the drop is
    /// logged, not prevented).
    pub fn release(&mut self, id: NodeId) {
        if !self.contains(id) {
            return;
        }
        if self.subtree_dirty(id) {
            warn!(path = %self.node_path(id), "releasing a node with unsaved changes");
        }
        self.free_children(id);
        let node = self.node_mut(id);
        node.expanded = false;
        node.data_modified = false;
        match &mut node.kind {
            NodeKind::NbtFile { root, .. } => *root = None,
            NodeKind::Chunk { tree, .. } => *tree = None,
            // The region store object stays: it carries pending deletions.
            _ => {}
        }
    }

    /// Roll the owning document back to its on-disk state, discarding
    /// uncommitted in-memory edits. The next access re-parses. A document
    /// with no uncommitted edits is left untouched, so rolling back one
    /// failed sibling does not invalidate the others.
    pub fn refresh(&mut self, id: NodeId) {
        let Some(doc) = self.document_of(id) else {
            return;
        };
        if !self.subtree_dirty(doc) {
            return;
        }
        debug!(path = %self.node_path(doc), "refreshing node from backing store");
        self.free_children(doc);
        let node = self.node_mut(doc);
        node.expanded = false;
        node.data_modified = false;
        match &mut node.kind {
            NodeKind::NbtFile { root, .. } => *root = None,
            NodeKind::Chunk { tree, .. } => *tree = None,
            _ => {}
        }
    }

    fn free_children(&mut self, id: NodeId) {
        let children = std::mem::take(&mut self.node_mut(id).children);
        for child in children {
            self.free_subtree(child);
        }
    }

    fn free_subtree(&mut self, id: NodeId) {
        let children = std::mem::take(&mut self.node_mut(id).children);
        for child in children {
            self.free_subtree(child);
        }
        self.nodes[id.0] = None;
    }

    // ---- mutation ----

    /// Add a (name, value) pair through this node's container, marking the
    /// node modified and appending a child node when already expanded.
    pub fn add_tag(&mut self, id: NodeId, name: &str, value: Value) -> Result<()> {
        let tag = value.tag();
        let appended_step = {
            let mut container = self
                .container_of(id)
                .ok_or(Error::Apply("node has no container"))?;
            container.add(name, value)?;
            if container.is_named() {
                Step::Name(name.to_string())
            } else {
                Step::Index(container.count() - 1)
            }
        };
        let node = self.node_mut(id);
        node.data_modified = true;
        if node.expanded {
            self.push_tag_children(id, vec![(appended_step, tag)]);
        }
        Ok(())
    }

    /// Create a new tag below this node via the injected prompt. `false`
    /// when the node or kind does not allow it, or the prompt cancels.
    pub fn create_tag(&mut self, id: NodeId, kind: Tag, prompt: &mut dyn TagPrompt) -> bool {
        if kind == Tag::End || !self.capabilities(id).create_tag {
            return false;
        }
        if self.expand(id).is_err() {
            return false;
        }
        let reserved = self.names_in_use(id);
        let Some((name, value)) = prompt.request(kind, &reserved) else {
            return false;
        };
        if value.tag() != kind {
            return false;
        }
        self.add_tag(id, &name, value).is_ok()
    }

    /// Paste the clipboard's pending tag below this node, uniquifying its
    /// name against the siblings. `false` when the clipboard is empty or
    /// the node does not accept pastes.
    pub fn paste_into(&mut self, id: NodeId, clipboard: &dyn ClipboardSource) -> bool {
        if !self.capabilities(id).paste_into {
            return false;
        }
        if self.expand(id).is_err() {
            return false;
        }
        let Some((name, value)) = clipboard.pending() else {
            return false;
        };
        let base = if name.is_empty() {
            "UNNAMED".to_string()
        } else {
            name
        };
        let unique = make_unique_name(&base, &self.names_in_use(id));
        self.add_tag(id, &unique, value).is_ok()
    }

    /// The (name, value) pair this node would place on a clipboard.
    pub fn copy_tag(&self, id: NodeId) -> Option<(String, Value)> {
        if !self.capabilities(id).copy {
            return None;
        }
        let name = match &self.node(id).kind {
            NodeKind::Tag {
                step: Step::Name(name),
                ..
            } => name.clone(),
            _ => String::new(),
        };
        Some((name, self.value(id)?.clone()))
    }

    /// Rename a compound member, keeping its position. `false` on a sibling
    /// conflict or an unsupported node.
    pub fn rename(&mut self, id: NodeId, new_name: &str) -> bool {
        if !self.capabilities(id).rename {
            return false;
        }
        let Some(parent) = self.parent(id) else {
            return false;
        };
        let NodeKind::Tag {
            step: Step::Name(old),
            ..
        } = &self.node(id).kind
        else {
            return false;
        };
        let old = old.clone();
        if old == new_name {
            return true;
        }
        let renamed = match self.container_of(parent) {
            Some(TagContainer::Named(compound)) => compound.rename(&old, new_name),
            _ => false,
        };
        if !renamed {
            return false;
        }
        if let NodeKind::Tag { step, .. } = &mut self.node_mut(id).kind {
            *step = Step::Name(new_name.to_string());
        }
        self.node_mut(parent).data_modified = true;
        self.node_mut(id).parent_modified = true;
        true
    }

    /// Replace a node's value with one of the same kind.
    pub fn set_value(&mut self, id: NodeId, value: Value) -> Result<()> {
        let composite = value.tag().is_composite();
        {
            let current = self
                .value_mut(id)
                .ok_or(Error::Apply("node has no value"))?;
            if current.tag() != value.tag() {
                return Err(Error::Apply("replacement value has a different tag kind"));
            }
            *current = value;
        }
        let node = self.node_mut(id);
        node.data_modified = true;
        // Children of a replaced container are stale; re-expand on demand.
        if composite && node.expanded {
            self.free_children(id);
            self.node_mut(id).expanded = false;
        }
        Ok(())
    }

    /// Remove this node from the tree. Tag deletion edits the parent
    /// container in place; chunk deletion requires the coordinate to exist
    /// in the backing store and queues its physical removal for the parent
    /// region's save. `false` when nothing was deleted.
    pub fn delete_node(&mut self, id: NodeId) -> bool {
        if !self.contains(id) || !self.capabilities(id).delete {
            return false;
        }
        let Some(parent) = self.parent(id) else {
            return false;
        };
        match &self.node(id).kind {
            NodeKind::Chunk { x, z, .. } => {
                let (x, z) = (*x, *z);
                let exists = self
                    .region_file(parent)
                    .is_some_and(|file| file.has_chunk(x, z));
                if !exists {
                    return false;
                }
                let queued = self
                    .region_file_mut(parent)
                    .is_some_and(|file| file.queue_delete(x, z).is_ok());
                if !queued {
                    return false;
                }
            }
            NodeKind::Tag { step, .. } => {
                let step = step.clone();
                let removed = match self.container_of(parent) {
                    Some(mut container) => match &step {
                        Step::Name(name) => container.delete_named(name),
                        Step::Index(index) => container.delete_at(*index),
                    },
                    None => false,
                };
                if !removed {
                    return false;
                }
                if let Step::Index(deleted) = step {
                    self.resync_indices(parent, deleted);
                }
            }
            _ => return false,
        }
        self.node_mut(id).parent_modified = true;
        self.node_mut(parent).data_modified = true;
        self.detach(parent, id);
        true
    }

    /// Shift the stored indices of ordered siblings after a removal.
    fn resync_indices(&mut self, parent: NodeId, deleted: usize) {
        for child in self.node(parent).children.clone() {
            if let NodeKind::Tag {
                step: Step::Index(index),
                ..
            } = &mut self.node_mut(child).kind
            {
                if *index > deleted {
                    *index -= 1;
                }
            }
        }
    }

    fn detach(&mut self, parent: NodeId, id: NodeId) {
        self.node_mut(parent).children.retain(|c| *c != id);
        self.free_subtree(id);
    }

    // ---- persistence ----

    fn subtree_dirty(&self, id: NodeId) -> bool {
        let Some(node) = self.get(id) else {
            return false;
        };
        node.data_modified || node.children.iter().any(|c| self.subtree_dirty(*c))
    }

    fn clear_dirty(&mut self, id: NodeId) {
        let node = self.node_mut(id);
        node.data_modified = false;
        node.parent_modified = false;
        for child in self.node(id).children.clone() {
            self.clear_dirty(child);
        }
    }

    /// Persist every modified document below this node. Interior handles
    /// delegate to their root: saving can require rewriting the whole
    /// enclosing container file, which only the root coordinates.
    pub fn save(&mut self, id: NodeId) -> Result<()> {
        if !self.contains(id) {
            return Ok(());
        }
        let root = self.root_of(id);
        self.save_node(root)
    }

    fn save_node(&mut self, id: NodeId) -> Result<()> {
        match &self.node(id).kind {
            NodeKind::Directory { .. } => {
                for child in self.node(id).children.clone() {
                    self.save_node(child)?;
                }
                Ok(())
            }
            NodeKind::NbtFile { .. } => self.save_nbt_file(id),
            NodeKind::Region { .. } => self.save_region(id),
            // Reached only via an explicit root save on these variants.
            NodeKind::Chunk { .. } | NodeKind::Tag { .. } => Ok(()),
        }
    }

    fn save_nbt_file(&mut self, id: NodeId) -> Result<()> {
        if !self.subtree_dirty(id) {
            return Ok(());
        }
        let NodeKind::NbtFile {
            path,
            compression,
            root_name,
            root: Some(root),
        } = &self.node(id).kind
        else {
            return Ok(());
        };
        debug!(path = %path.display(), "saving NBT file");
        let bytes = codec::encode_compound_document(root_name, root, *compression)?;
        fs::write(path, bytes)?;
        self.clear_dirty(id);
        Ok(())
    }

    fn save_region(&mut self, id: NodeId) -> Result<()> {
        let mut staged: Vec<(i32, i32, Vec<u8>)> = Vec::new();
        for child in self.node(id).children.clone() {
            if !self.subtree_dirty(child) {
                continue;
            }
            if let NodeKind::Chunk {
                x,
                z,
                root_name,
                tree: Some(tree),
            } = &self.node(child).kind
            {
                let mut bytes = Vec::new();
                codec::write_named_compound(&mut bytes, root_name, tree)?;
                staged.push((*x, *z, bytes));
            }
        }
        let Some(file) = self.region_file_mut(id) else {
            return Ok(());
        };
        for (x, z, bytes) in staged {
            file.write_chunk(x, z, bytes)?;
        }
        if file.has_pending() {
            file.save()?;
        }
        self.clear_dirty(id);
        Ok(())
    }

    pub fn region_file(&self, id: NodeId) -> Option<&RegionFile> {
        match &self.get(id)?.kind {
            NodeKind::Region { file, .. } => file.as_ref(),
            _ => None,
        }
    }

    fn region_file_mut(&mut self, id: NodeId) -> Option<&mut RegionFile> {
        match &mut self.node_mut(id).kind {
            NodeKind::Region { file, .. } => file.as_mut(),
            _ => None,
        }
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension().map(|e| e.to_string_lossy().to_lowercase())
}

fn is_region_name(path: &Path) -> bool {
    matches!(extension_of(path).as_deref(), Some("mca" | "mcr"))
}

fn is_nbt_name(path: &Path) -> bool {
    matches!(
        extension_of(path).as_deref(),
        Some("nbt" | "dat" | "dat_old" | "schematic")
    )
}
