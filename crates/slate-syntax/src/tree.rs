//! Arena-backed syntax tree.
//!
//! All nodes of a parsed file live in one flat `Vec`; a node is addressed by
//! its [`NodeId`], a plain index that stays valid for the lifetime of the
//! tree. Downstream analysis keys its caches by `(file, node)` id pairs, so
//! nothing ever holds a reference into the arena across passes.

use slate_common::Span;

use crate::kind::{Field, SyntaxKind};

/// Index of a node within its file's [`SyntaxTree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// One node in the arena. Tokens are leaves; composite nodes own their
/// children in source order.
#[derive(Debug)]
pub(crate) struct NodeData {
    pub(crate) kind: SyntaxKind,
    pub(crate) span: Span,
    pub(crate) field: Option<Field>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

/// A fully parsed file: the node arena plus the source text it was built
/// from. The root is always a `SourceFile` node with id 0.
#[derive(Debug)]
pub struct SyntaxTree {
    pub(crate) nodes: Vec<NodeData>,
    text: String,
}

impl SyntaxTree {
    pub(crate) fn new(nodes: Vec<NodeData>, text: String) -> Self {
        debug_assert!(!nodes.is_empty());
        debug_assert_eq!(nodes[0].kind, SyntaxKind::SourceFile);
        Self { nodes, text }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// The full source text of the file.
    pub fn source(&self) -> &str {
        &self.text
    }

    pub fn kind(&self, id: NodeId) -> SyntaxKind {
        self.nodes[id.index()].kind
    }

    pub fn span(&self, id: NodeId) -> Span {
        self.nodes[id.index()].span
    }

    /// Source text covered by the node.
    pub fn text(&self, id: NodeId) -> &str {
        self.span(id).slice(&self.text)
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    /// All children, tokens included, in source order.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].children
    }

    /// Non-token children in source order.
    pub fn named_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(|&c| !self.kind(c).is_token())
    }

    /// Role tag of the node within its parent, if any.
    pub fn field(&self, id: NodeId) -> Option<Field> {
        self.nodes[id.index()].field
    }

    /// First child tagged with `field`.
    pub fn child_by_field(&self, id: NodeId, field: Field) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|&c| self.field(c) == Some(field))
    }

    /// All children tagged with `field`, in source order.
    pub fn children_by_field(&self, id: NodeId, field: Field) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(move |&c| self.field(c) == Some(field))
    }

    /// First child of the given kind.
    pub fn child_of_kind(&self, id: NodeId, kind: SyntaxKind) -> Option<NodeId> {
        self.children(id).iter().copied().find(|&c| self.kind(c) == kind)
    }

    /// All children of the given kind, in source order.
    pub fn children_of_kind(&self, id: NodeId, kind: SyntaxKind) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(move |&c| self.kind(c) == kind)
    }

    /// Whether the node has a token child of the given kind.
    pub fn has_token(&self, id: NodeId, kind: SyntaxKind) -> bool {
        self.child_of_kind(id, kind).is_some()
    }

    /// Walk up from `id` (inclusive of its parent, exclusive of `id` itself)
    /// until a node whose kind is in `kinds` is found.
    pub fn parent_of_kind(&self, id: NodeId, kinds: &[SyntaxKind]) -> Option<NodeId> {
        let mut cur = self.parent(id);
        while let Some(n) = cur {
            if kinds.contains(&self.kind(n)) {
                return Some(n);
            }
            cur = self.parent(n);
        }
        None
    }

    /// Index of `child` among the children of its parent.
    pub fn child_index(&self, child: NodeId) -> Option<usize> {
        let parent = self.parent(child)?;
        self.children(parent).iter().position(|&c| c == child)
    }

    /// The smallest node whose span fully contains `span`, preferring deeper
    /// nodes. Falls back to the root.
    pub fn covering_node(&self, span: Span) -> NodeId {
        let mut cur = self.root();
        'descend: loop {
            for &child in self.children(cur) {
                if self.span(child).contains(span) {
                    cur = child;
                    continue 'descend;
                }
            }
            return cur;
        }
    }

    /// The deepest token at byte position `pos`, if any.
    pub fn token_at(&self, pos: u32) -> Option<NodeId> {
        let node = self.covering_node(Span::at(pos));
        if self.kind(node).is_token() {
            Some(node)
        } else {
            None
        }
    }

    /// Total number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Render an indented dump of the tree, tokens included. Used by parser
    /// snapshot tests.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_node(self.root(), 0, &mut out);
        out
    }

    fn dump_node(&self, id: NodeId, depth: usize, out: &mut String) {
        for _ in 0..depth {
            out.push_str("  ");
        }
        let kind = self.kind(id);
        if kind.is_token() {
            out.push_str(&format!("{:?} {:?}\n", kind, self.text(id)));
        } else {
            match self.field(id) {
                Some(field) => out.push_str(&format!("{kind:?} ({field:?})\n")),
                None => out.push_str(&format!("{kind:?}\n")),
            }
            for &child in self.children(id) {
                self.dump_node(child, depth + 1, out);
            }
        }
    }
}
