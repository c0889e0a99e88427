use super::error::Result;
use async_trait::async_trait;

/// One row of the part hierarchy as reported by a backend
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HistoryEntry {
    /// Identity of the part (serial number, name, ...)
    pub item: String,
    /// Whether the backend defines children for this part
    pub expandable: bool,
}

impl HistoryEntry {
    pub fn new(item: impl Into<String>, expandable: bool) -> Self {
        Self {
            item: item.into(),
            expandable,
        }
    }

    pub fn leaf(item: impl Into<String>) -> Self {
        Self::new(item, false)
    }

    pub fn branch(item: impl Into<String>) -> Self {
        Self::new(item, true)
    }
}

/// Asynchronous source of part-history structure
///
/// In the dashboard this is backed by the history-data HTTP endpoint; the
/// in-memory [`HierarchySource`](super::HierarchySource) implements it for
/// standalone use and tests.
#[async_trait]
pub trait HistoryBackend: Send + Sync {
    /// Identities shown at level 0, in display order
    async fn roots(&self) -> Result<Vec<HistoryEntry>>;

    /// Children of `item`, in display order
    ///
    /// `Ok(None)` means the part is not expandable. `Ok(Some(vec![]))` is a
    /// distinct state: expandable, but currently without children.
    ///
    /// # Errors
    ///
    /// `NotFound` for identities outside the hierarchy, `FetchFailed` when
    /// the backend rejects the request.
    async fn children(&self, item: &str) -> Result<Option<Vec<HistoryEntry>>>;

    /// Whether `item` has children defined; consistent with [`children`](Self::children)
    async fn is_expandable(&self, item: &str) -> Result<bool>;
}
