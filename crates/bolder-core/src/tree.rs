//! Document tree model.
//!
//! The engine scans an arena of tagged nodes: text leaves and containers that
//! carry a tag name and the subset of computed style the engine cares about.
//! Structural edits made through [`Document`] are recorded on a change feed
//! that the host drains with [`Document::take_changes`] and forwards to the
//! session, the same way a mutation observer would.

use serde::{Deserialize, Serialize};

/// Handle to a node inside a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeId(usize);

impl NodeId {
    /// Returns the arena index of this node.
    pub const fn index(self) -> usize {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Computed style and accessibility state of a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Style {
    /// `display: none`.
    pub display_none: bool,
    /// `visibility: hidden`.
    pub visibility_hidden: bool,
    /// `opacity: 0`.
    pub opacity_zero: bool,
    /// `aria-hidden="true"`.
    pub aria_hidden: bool,
    /// The container is user-editable.
    pub content_editable: bool,
    /// Computed background color (`rgb(..)`/`rgba(..)`); `None` is transparent.
    pub background: Option<String>,
}

impl Style {
    /// Style with only a background color set.
    pub fn with_background(color: impl Into<String>) -> Self {
        Self {
            background: Some(color.into()),
            ..Self::default()
        }
    }

    /// Style for a container hidden with `display: none`.
    pub fn hidden() -> Self {
        Self {
            display_none: true,
            ..Self::default()
        }
    }

    /// True when the container does not render its content.
    pub const fn is_invisible(&self) -> bool {
        self.display_none || self.visibility_hidden || self.opacity_zero
    }
}

/// What a node is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    /// A text leaf.
    Text(String),
    /// An element-like container with an uppercase tag name.
    Container {
        /// Uppercase tag name (`P`, `LI`, `CODE`, ...).
        tag: String,
        /// Computed style.
        style: Style,
    },
}

/// A structural or content change reported by the change feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    /// A subtree rooted at this node was attached.
    Added(NodeId),
    /// A subtree rooted at this node was detached.
    Removed(NodeId),
    /// A text leaf's content was edited in place.
    TextChanged(NodeId),
}

impl Mutation {
    /// The node the mutation refers to.
    pub const fn node(&self) -> NodeId {
        match *self {
            Self::Added(id) | Self::Removed(id) | Self::TextChanged(id) => id,
        }
    }
}

#[derive(Debug, Clone)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Arena-backed document with a `BODY` root.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<NodeData>,
    root: NodeId,
    changes: Vec<Mutation>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// Create an empty document containing only the `BODY` root.
    pub fn new() -> Self {
        Self::with_root_style(Style::default())
    }

    /// Create an empty document whose root carries `style`.
    pub fn with_root_style(style: Style) -> Self {
        let root = NodeData {
            kind: NodeKind::Container {
                tag: "BODY".to_string(),
                style,
            },
            parent: None,
            children: Vec::new(),
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
            changes: Vec::new(),
        }
    }

    /// The document root.
    pub const fn root(&self) -> NodeId {
        self.root
    }

    /// Number of nodes ever created, attached or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if the document holds only its root.
    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0]
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    /// Create a detached container. Tag names are stored uppercase.
    pub fn create_container(&mut self, tag: &str, style: Style) -> NodeId {
        self.push(NodeKind::Container {
            tag: tag.to_ascii_uppercase(),
            style,
        })
    }

    /// Create a detached text leaf.
    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeKind::Text(text.into()))
    }

    /// Attach `child` as the last child of `parent`.
    ///
    /// A child that is already attached elsewhere is moved. Reports
    /// [`Mutation::Added`] when the new position is connected to the root.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if self.node(child).parent.is_some() {
            self.detach(child);
        }
        self.nodes[parent.0].children.push(child);
        self.nodes[child.0].parent = Some(parent);
        if self.is_connected(child) {
            self.changes.push(Mutation::Added(child));
        }
    }

    /// Create a container and append it to `parent`.
    pub fn append_container(&mut self, parent: NodeId, tag: &str) -> NodeId {
        self.append_styled(parent, tag, Style::default())
    }

    /// Create a styled container and append it to `parent`.
    pub fn append_styled(&mut self, parent: NodeId, tag: &str, style: Style) -> NodeId {
        let id = self.create_container(tag, style);
        self.append_child(parent, id);
        id
    }

    /// Create a text leaf and append it to `parent`.
    pub fn append_text(&mut self, parent: NodeId, text: impl Into<String>) -> NodeId {
        let id = self.create_text(text);
        self.append_child(parent, id);
        id
    }

    fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent.take() {
            self.nodes[parent.0].children.retain(|&c| c != id);
        }
    }

    /// Detach `id` (and its subtree) from its parent.
    ///
    /// Returns `false` if the node was not attached.
    pub fn remove(&mut self, id: NodeId) -> bool {
        if self.node(id).parent.is_none() {
            return false;
        }
        let was_connected = self.is_connected(id);
        self.detach(id);
        if was_connected {
            self.changes.push(Mutation::Removed(id));
        }
        true
    }

    /// Replace the content of a text leaf. No-op for containers.
    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) {
        if let NodeKind::Text(content) = &mut self.nodes[id.0].kind {
            *content = text.into();
            if self.is_connected(id) {
                self.changes.push(Mutation::TextChanged(id));
            }
        }
    }

    /// Replace the computed style of a container. No-op for text leaves.
    pub fn set_style(&mut self, id: NodeId, new_style: Style) {
        if let NodeKind::Container { style, .. } = &mut self.nodes[id.0].kind {
            *style = new_style;
        }
    }

    /// Drain the pending change feed.
    pub fn take_changes(&mut self) -> Vec<Mutation> {
        std::mem::take(&mut self.changes)
    }

    /// The node's kind.
    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    /// Text content of a text leaf.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Text(t) => Some(t),
            NodeKind::Container { .. } => None,
        }
    }

    /// True for text leaves.
    pub fn is_text(&self, id: NodeId) -> bool {
        matches!(self.node(id).kind, NodeKind::Text(_))
    }

    /// Tag name of a container.
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        match &self.node(id).kind {
            NodeKind::Container { tag, .. } => Some(tag),
            NodeKind::Text(_) => None,
        }
    }

    /// Computed style of a container.
    pub fn style(&self, id: NodeId) -> Option<&Style> {
        match &self.node(id).kind {
            NodeKind::Container { style, .. } => Some(style),
            NodeKind::Text(_) => None,
        }
    }

    /// Parent of a node, if attached.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Children of a node, in order.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    /// Sibling immediately before `id`.
    pub fn previous_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let pos = siblings.iter().position(|&c| c == id)?;
        pos.checked_sub(1).map(|p| siblings[p])
    }

    /// Ancestors of `id`, nearest first, excluding `id` itself.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |&n| self.parent(n))
    }

    /// True when `id` is the root or has the root as an ancestor.
    pub fn is_connected(&self, id: NodeId) -> bool {
        id == self.root || self.ancestors(id).any(|a| a == self.root)
    }

    /// Text leaves under `root` in document order (including `root` itself).
    pub fn text_leaves(&self, root: NodeId) -> Vec<NodeId> {
        let mut leaves = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            match &self.node(id).kind {
                NodeKind::Text(_) => leaves.push(id),
                NodeKind::Container { .. } => {
                    stack.extend(self.children(id).iter().rev().copied());
                }
            }
        }
        leaves
    }

    /// Rendered text of a subtree, skipping invisible containers.
    ///
    /// `BR` containers contribute a newline.
    pub fn inner_text(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match &self.node(id).kind {
            NodeKind::Text(t) => out.push_str(t),
            NodeKind::Container { tag, style } => {
                if style.is_invisible() {
                    return;
                }
                if tag == "BR" {
                    out.push('\n');
                    return;
                }
                for &child in self.children(id) {
                    self.collect_text(child, out);
                }
            }
        }
    }

    /// Count of ASCII letters in the rendered text under `id`.
    pub fn letter_count(&self, id: NodeId) -> usize {
        self.inner_text(id)
            .bytes()
            .filter(u8::is_ascii_alphabetic)
            .count()
    }
}
