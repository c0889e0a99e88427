use super::node::{NodeId, TreeNode};
use super::subscription::{Subscribers, Subscription, SubscriptionId, TreeEvent};
use crate::services::history::{HistoryEntry, HistoryError, HistoryManager, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::task::JoinHandle;

/// Projector behavior switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectorOptions {
    /// Publish a snapshot as soon as a row enters the loading state.
    ///
    /// Off by default: only completed expand/collapse operations publish,
    /// while [`FlatTreeProjector::snapshot`] always shows the live flag.
    pub broadcast_loading: bool,
}

/// Result of an expand request
#[derive(Debug, Clone, PartialEq)]
pub enum ExpandOutcome {
    /// Children were spliced in after the row (possibly zero of them)
    Expanded { inserted: usize },
    /// The row is absent, a leaf, already expanded, or already loading
    Ignored,
    /// The row was collapsed or removed while the fetch was pending
    Abandoned,
    /// The fetch failed; the row list is unchanged
    Failed(HistoryError),
}

/// Result of [`FlatTreeProjector::toggle`]
#[derive(Debug, Clone, PartialEq)]
pub enum Toggle {
    Collapsed,
    Expand(ExpandOutcome),
}

/// An accepted expand intent waiting for its fetch
#[derive(Debug)]
struct ExpandRequest {
    id: NodeId,
    item: String,
    ticket: u64,
}

struct ProjectorState {
    /// Visible rows in pre-order
    visible: Vec<TreeNode>,
    /// Row id -> ticket of its in-flight expand
    pending: HashMap<NodeId, u64>,
    subscribers: Subscribers,
    next_id: usize,
    next_ticket: u64,
}

impl ProjectorState {
    fn position(&self, id: NodeId) -> Option<usize> {
        self.visible.iter().position(|node| node.id == id)
    }

    fn alloc_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Index one past the last descendant of the row at `index`
    fn subtree_end(&self, index: usize) -> usize {
        let level = self.visible[index].level;
        self.visible[index + 1..]
            .iter()
            .position(|node| node.level <= level)
            .map_or(self.visible.len(), |offset| index + 1 + offset)
    }

    fn current(&self) -> Arc<[TreeNode]> {
        self.visible.as_slice().into()
    }

    fn publish(&mut self) {
        let snapshot = TreeEvent::Snapshot(self.current());
        self.subscribers.broadcast(snapshot);
    }
}

struct Inner {
    state: Mutex<ProjectorState>,
    manager: HistoryManager,
    options: ProjectorOptions,
}

/// Flattened, lazily expanded view of the part hierarchy
///
/// Holds the ordered list of visible rows and mediates every structural
/// change to it. Expanding a row fetches its children through the
/// [`HistoryManager`] and splices them in right after the row; collapsing
/// removes the row's descendant block. Every completed change is published
/// to subscribers as a full snapshot.
///
/// The state lock is never held across an await. Rows are located by id
/// after every fetch, since other operations may have shifted them.
#[derive(Clone)]
pub struct FlatTreeProjector {
    inner: Arc<Inner>,
}

impl fmt::Debug for FlatTreeProjector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("FlatTreeProjector")
            .field("visible", &state.visible.len())
            .field("pending", &state.pending.len())
            .field("subscribers", &state.subscribers.len())
            .field("options", &self.inner.options)
            .finish()
    }
}

impl FlatTreeProjector {
    /// Create a projector seeded with the level-0 rows of the hierarchy
    ///
    /// # Errors
    ///
    /// Returns an error if the roots cannot be fetched.
    pub async fn initialize(manager: HistoryManager, options: ProjectorOptions) -> Result<Self> {
        let roots = manager.roots().await?;
        Ok(Self::from_roots(manager, options, roots))
    }

    fn from_roots(
        manager: HistoryManager,
        options: ProjectorOptions,
        roots: Vec<HistoryEntry>,
    ) -> Self {
        let visible: Vec<TreeNode> = roots
            .into_iter()
            .enumerate()
            .map(|(i, entry)| TreeNode::from_entry(NodeId(i), entry, 0))
            .collect();
        tracing::debug!(roots = visible.len(), "initialized part tree");

        let state = ProjectorState {
            next_id: visible.len(),
            visible,
            pending: HashMap::new(),
            subscribers: Subscribers::default(),
            next_ticket: 0,
        };

        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(state),
                manager,
                options,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, ProjectorState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn options(&self) -> ProjectorOptions {
        self.inner.options
    }

    pub fn manager(&self) -> &HistoryManager {
        &self.inner.manager
    }

    /// Register for snapshots; the current one is delivered immediately
    pub fn subscribe(&self) -> Subscription {
        let mut state = self.state();
        let subscription = state.subscribers.add();
        let current = TreeEvent::Snapshot(state.current());
        state.subscribers.send_to(subscription.id(), current);
        subscription
    }

    /// Stop delivering events to a subscription, including queued ones
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.state().subscribers.remove(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.state().subscribers.len()
    }

    /// Copy of the visible rows
    pub fn snapshot(&self) -> Vec<TreeNode> {
        self.state().visible.clone()
    }

    /// `(item, level)` for each visible row
    pub fn outline(&self) -> Vec<(String, usize)> {
        self.state()
            .visible
            .iter()
            .map(|node| (node.item.clone(), node.level))
            .collect()
    }

    pub fn node(&self, id: NodeId) -> Option<TreeNode> {
        let state = self.state();
        state.position(id).map(|index| state.visible[index].clone())
    }

    /// First visible row showing `item`
    pub fn find(&self, item: &str) -> Option<TreeNode> {
        self.state()
            .visible
            .iter()
            .find(|node| node.item == item)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.state().visible.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state().visible.is_empty()
    }

    /// Number of rows with an expand in flight
    pub fn pending(&self) -> usize {
        self.state().pending.len()
    }

    /// Expand a row, loading its children
    ///
    /// A missing row, a leaf, an expanded row or a row that is already
    /// loading yields [`ExpandOutcome::Ignored`] without side effects.
    pub async fn expand(&self, id: NodeId) -> ExpandOutcome {
        match self.begin_expand(id) {
            Some(request) => self.finish_expand(request).await,
            None => ExpandOutcome::Ignored,
        }
    }

    /// Accept an expand intent now and run the fetch on the tokio runtime
    ///
    /// The row is marked loading before this returns, so a second intent
    /// for the same row is ignored. Returns `None` when the intent is
    /// ignored.
    pub fn spawn_expand(&self, id: NodeId) -> Option<JoinHandle<ExpandOutcome>> {
        let request = self.begin_expand(id)?;
        let projector = self.clone();
        Some(tokio::spawn(async move {
            projector.finish_expand(request).await
        }))
    }

    fn begin_expand(&self, id: NodeId) -> Option<ExpandRequest> {
        let mut state = self.state();
        let Some(index) = state.position(id) else {
            tracing::debug!(%id, "expand ignored: row not visible");
            return None;
        };

        let node = &state.visible[index];
        if !node.expandable || node.is_expanded || node.is_loading {
            tracing::debug!(%id, item = %node.item, state = ?node.state(), "expand ignored");
            return None;
        }
        let item = node.item.clone();

        let ticket = state.next_ticket;
        state.next_ticket += 1;
        state.pending.insert(id, ticket);
        state.visible[index].is_loading = true;
        tracing::debug!(%id, %item, "expanding part");

        if self.inner.options.broadcast_loading {
            state.publish();
        }

        Some(ExpandRequest { id, item, ticket })
    }

    async fn finish_expand(&self, request: ExpandRequest) -> ExpandOutcome {
        let result = self.inner.manager.children(&request.item).await;
        self.apply_children(request, result)
    }

    fn apply_children(
        &self,
        request: ExpandRequest,
        result: Result<Option<Vec<HistoryEntry>>>,
    ) -> ExpandOutcome {
        let mut state = self.state();

        // A collapse of the row (or of an ancestor) revokes the ticket
        if state.pending.get(&request.id) != Some(&request.ticket) {
            tracing::warn!(id = %request.id, item = %request.item, "expand abandoned");
            return ExpandOutcome::Abandoned;
        }
        state.pending.remove(&request.id);

        let Some(index) = state.position(request.id) else {
            unreachable!("row {} has a pending expand but is not visible", request.id);
        };

        match result {
            Ok(children) => {
                let Some(entries) = children else {
                    // The backend reports the part as a leaf after all
                    let node = &mut state.visible[index];
                    node.is_loading = false;
                    node.expandable = false;
                    tracing::debug!(id = %request.id, item = %request.item, "part has no children");
                    state.publish();
                    return ExpandOutcome::Expanded { inserted: 0 };
                };

                let level = state.visible[index].level + 1;
                let nodes: Vec<TreeNode> = entries
                    .into_iter()
                    .map(|entry| {
                        let id = state.alloc_id();
                        TreeNode::from_entry(id, entry, level)
                    })
                    .collect();
                let inserted = nodes.len();
                state.visible.splice(index + 1..index + 1, nodes);

                let node = &mut state.visible[index];
                node.is_loading = false;
                node.is_expanded = true;
                tracing::debug!(id = %request.id, item = %request.item, inserted, "expanded part");

                state.publish();
                ExpandOutcome::Expanded { inserted }
            }
            Err(error) => {
                state.visible[index].is_loading = false;
                tracing::warn!(id = %request.id, item = %request.item, %error, "expand failed");

                state.subscribers.broadcast(TreeEvent::FetchFailed {
                    id: request.id,
                    item: request.item,
                    error: error.clone(),
                });
                if self.inner.options.broadcast_loading {
                    state.publish();
                }
                ExpandOutcome::Failed(error)
            }
        }
    }

    /// Collapse a row, removing every visible descendant
    ///
    /// Also cancels an in-flight expand of the row or of any removed
    /// descendant; their late results are dropped. Returns whether anything
    /// changed (a snapshot is published only then).
    pub fn collapse(&self, id: NodeId) -> bool {
        let mut state = self.state();
        let Some(index) = state.position(id) else {
            tracing::debug!(%id, "collapse ignored: row not visible");
            return false;
        };

        let end = state.subtree_end(index);
        let removed: Vec<TreeNode> = state.visible.drain(index + 1..end).collect();
        for node in &removed {
            state.pending.remove(&node.id);
        }
        let cancelled = state.pending.remove(&id).is_some();

        let node = &mut state.visible[index];
        let was_expanded = std::mem::replace(&mut node.is_expanded, false);
        node.is_loading = false;

        let changed = !removed.is_empty() || cancelled || was_expanded;
        if changed {
            tracing::debug!(%id, item = %node.item, removed = removed.len(), cancelled, "collapsed part");
            state.publish();
        }
        changed
    }

    /// Collapse an expanded or loading row, expand anything else
    pub async fn toggle(&self, id: NodeId) -> Toggle {
        let open = self
            .node(id)
            .is_some_and(|node| node.is_expanded || node.is_loading);
        if open {
            self.collapse(id);
            Toggle::Collapsed
        } else {
            Toggle::Expand(self.expand(id).await)
        }
    }

    /// Re-fetch a row's children
    pub async fn refresh(&self, id: NodeId) -> ExpandOutcome {
        self.collapse(id);
        self.expand(id).await
    }

    /// Expand every row along `path` (root identity first) and return the
    /// id of the last one
    ///
    /// Returns `None` if a component is not found or an intermediate row
    /// cannot be expanded.
    pub async fn expand_path(&self, path: &[&str]) -> Option<NodeId> {
        let (first, rest) = path.split_first()?;
        let mut current = self
            .state()
            .visible
            .iter()
            .find(|node| node.level == 0 && node.item == *first)?
            .id;

        for component in rest {
            let node = self.node(current)?;
            if !node.is_expanded {
                match self.expand(current).await {
                    ExpandOutcome::Expanded { .. } => {}
                    outcome => {
                        tracing::warn!(item = %node.item, ?outcome, "failed to expand along path");
                        return None;
                    }
                }
            }
            current = match self.child_named(current, component) {
                Some(id) => id,
                None => {
                    tracing::warn!(component = %component, "component not found in part tree");
                    return None;
                }
            };
        }

        Some(current)
    }

    fn child_named(&self, parent: NodeId, item: &str) -> Option<NodeId> {
        let state = self.state();
        let index = state.position(parent)?;
        let level = state.visible[index].level + 1;
        let end = state.subtree_end(index);
        state.visible[index + 1..end]
            .iter()
            .find(|node| node.level == level && node.item == item)
            .map(|node| node.id)
    }
}

/// Check that `rows` is a valid pre-order listing of an expanded subset
///
/// The first row is at level 0, a row is at most one level deeper than its
/// predecessor, rows deeper than their predecessor follow an expanded row,
/// and a row that is not expanded has no deeper row right after it.
pub fn is_preorder(rows: &[TreeNode]) -> bool {
    let Some(first) = rows.first() else {
        return true;
    };
    if first.level != 0 {
        return false;
    }
    rows.windows(2).all(|pair| {
        let (prev, next) = (&pair[0], &pair[1]);
        if next.level > prev.level {
            next.level == prev.level + 1 && prev.is_expanded
        } else {
            true
        }
    })
}
