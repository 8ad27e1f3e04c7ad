use std::num::NonZeroUsize;

use crate::{CollectionStyle, ScalarStyle, Span};

/// A document's node graph: tagged scalars, sequences and mappings.
///
/// Nodes live in an arena and refer to each other by [`NodeId`], so a node
/// reached through an alias is the same node, and cycles are representable.
#[derive(Clone, Debug, Default)]
pub struct NodeGraph {
    pub(crate) nodes: Vec<Node>,
    pub(crate) root: Option<NodeId>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) NonZeroUsize);

#[derive(Clone, Debug)]
pub struct Node {
    /// Fully resolved tag.
    pub tag: String,
    pub data: NodeData,
    pub span: Span,
}

#[derive(Clone, Debug)]
pub enum NodeData {
    Scalar {
        value: String,
        /// `None` leaves the choice to the emitter.
        style: Option<ScalarStyle>,
    },
    Sequence {
        items: Vec<NodeId>,
        style: CollectionStyle,
    },
    Mapping {
        pairs: Vec<(NodeId, NodeId)>,
        style: CollectionStyle,
    },
}

impl NodeData {
    pub fn kind(&self) -> &'static str {
        match self {
            NodeData::Scalar { .. } => "a scalar node",
            NodeData::Sequence { .. } => "a sequence node",
            NodeData::Mapping { .. } => "a mapping node",
        }
    }
}

impl NodeGraph {
    pub fn add(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(NonZeroUsize::MIN.saturating_add(self.nodes.len() - 1))
    }

    #[inline]
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    #[inline]
    pub fn set_root(&mut self, root: NodeId) {
        self.root = Some(root);
    }

    #[inline]
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0.get() - 1)
    }

    #[inline]
    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0.get() - 1)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Append `child` to the collection `parent`. For mappings, children
    /// alternate between key and value; `pending_key` holds a key waiting
    /// for its value.
    pub(crate) fn attach(&mut self, parent: NodeId, child: NodeId, pending_key: &mut Option<NodeId>) {
        let Some(node) = self.get_mut(parent) else {
            return;
        };
        match &mut node.data {
            NodeData::Sequence { items, .. } => items.push(child),
            NodeData::Mapping { pairs, .. } => match pending_key.take() {
                Some(key) => pairs.push((key, child)),
                None => *pending_key = Some(child),
            },
            NodeData::Scalar { .. } => {}
        }
    }
}

impl std::ops::Index<NodeId> for NodeGraph {
    type Output = Node;

    #[inline]
    fn index(&self, index: NodeId) -> &Self::Output {
        &self.nodes[index.0.get() - 1]
    }
}
