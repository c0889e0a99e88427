use crate::services::history::HistoryEntry;
use std::fmt;

/// Unique identifier for a visible row
///
/// The same part identity can appear under several parents; rows are told
/// apart by id, never by item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Node({})", self.0)
    }
}

/// One row of the flattened part tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    /// Unique identifier
    pub id: NodeId,
    /// Part identity
    pub item: String,
    /// Depth from the implicit root (level-0 rows are the roots)
    pub level: usize,
    /// Whether the hierarchy defines children for `item`
    pub expandable: bool,
    /// An expand request for this row is in flight
    pub is_loading: bool,
    /// Children of this row are currently spliced in after it
    pub is_expanded: bool,
}

impl TreeNode {
    pub fn new(id: NodeId, item: impl Into<String>, level: usize, expandable: bool) -> Self {
        Self {
            id,
            item: item.into(),
            level,
            expandable,
            is_loading: false,
            is_expanded: false,
        }
    }

    pub(crate) fn from_entry(id: NodeId, entry: HistoryEntry, level: usize) -> Self {
        Self::new(id, entry.item, level, entry.expandable)
    }

    pub fn state(&self) -> NodeState {
        if !self.expandable {
            NodeState::Leaf
        } else if self.is_loading {
            NodeState::Loading
        } else if self.is_expanded {
            NodeState::Expanded
        } else {
            NodeState::Collapsed
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.state() == NodeState::Leaf
    }

    pub fn is_collapsed(&self) -> bool {
        self.state() == NodeState::Collapsed
    }
}

impl fmt::Display for TreeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.item, self.level)
    }
}

/// Expansion state of a row, derived from its flags
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// No children defined, cannot be expanded
    Leaf,
    /// Expandable, children not shown
    Collapsed,
    /// Expand requested, waiting for the fetch
    Loading,
    /// Children shown
    Expanded,
}
