// Part-history library - exposes the tree projector and its data layer

pub mod config;
pub mod part_tree;
pub mod services;

pub use config::Config;
pub use part_tree::{ExpandOutcome, FlatTreeProjector, NodeId, ProjectorOptions, TreeEvent, TreeNode};
pub use services::history::{HierarchySource, HistoryBackend, HistoryError, HistoryManager};
