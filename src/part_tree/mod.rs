// Flattened part-history tree
//
// This module projects the lazily loaded part hierarchy onto a single
// ordered row list (pre-order over the expanded rows), suitable for a flat
// or virtualized list view.

pub mod node;
pub mod projector;
pub mod subscription;

pub use node::{NodeId, NodeState, TreeNode};
pub use projector::{is_preorder, ExpandOutcome, FlatTreeProjector, ProjectorOptions, Toggle};
pub use subscription::{Subscription, SubscriptionId, TreeEvent};
