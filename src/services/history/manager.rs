use super::backend::{HistoryBackend, HistoryEntry};
use super::error::{HistoryError, Result};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;

type ChildrenResult = Result<Option<Vec<HistoryEntry>>>;

/// Map of identity -> channels waiting for the in-flight children fetch
type PendingChildRequests = Arc<Mutex<HashMap<String, Vec<oneshot::Sender<ChildrenResult>>>>>;

/// Manages history fetches with request deduplication and timeouts
///
/// Sits between the projector and the backend:
/// - Concurrent `children` requests for the same part share one backend call
/// - An optional timeout turns a hanging fetch into `HistoryError::Timeout`
pub struct HistoryManager {
    backend: Arc<dyn HistoryBackend>,
    pending: PendingChildRequests,
    timeout: Option<Duration>,
}

impl fmt::Debug for HistoryManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HistoryManager")
            .field("backend", &"<dyn HistoryBackend>")
            .field("pending", &"<mutex>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HistoryManager {
    pub fn new(backend: Arc<dyn HistoryBackend>) -> Self {
        Self {
            backend,
            pending: Arc::new(Mutex::new(HashMap::new())),
            timeout: None,
        }
    }

    /// Fail children fetches that take longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    fn pending(&self) -> MutexGuard<'_, HashMap<String, Vec<oneshot::Sender<ChildrenResult>>>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch the children of `item` with request deduplication
    ///
    /// If several requests for the same part are made concurrently, only one
    /// backend call is performed and every requester receives its result.
    pub async fn children(&self, item: &str) -> ChildrenResult {
        let (rx, should_execute) = {
            let mut pending = self.pending();
            let (tx, rx) = oneshot::channel();
            match pending.get_mut(item) {
                Some(senders) => {
                    senders.push(tx);
                    (rx, false)
                }
                None => {
                    pending.insert(item.to_string(), vec![tx]);
                    (rx, true)
                }
            }
        };

        if !should_execute {
            return rx
                .await
                .unwrap_or_else(|_| Err(HistoryError::fetch_failed(item, "request cancelled")));
        }

        // Removes the pending entry even if this future is dropped mid-fetch,
        // so later requests for the same part are not parked forever.
        let guard = PendingGuard {
            pending: &self.pending,
            item: Some(item),
        };

        let result = self.fetch_with_timeout(item).await;

        for sender in guard.take() {
            let _ = sender.send(result.clone());
        }
        // Our own channel was the first registered sender
        rx.await.unwrap_or(result)
    }

    async fn fetch_with_timeout(&self, item: &str) -> ChildrenResult {
        match self.timeout {
            Some(after) => tokio::time::timeout(after, self.backend.children(item))
                .await
                .unwrap_or_else(|_| {
                    Err(HistoryError::Timeout {
                        item: item.to_string(),
                        after,
                    })
                }),
            None => self.backend.children(item).await,
        }
    }

    pub async fn roots(&self) -> Result<Vec<HistoryEntry>> {
        self.backend.roots().await
    }

    pub async fn is_expandable(&self, item: &str) -> Result<bool> {
        self.backend.is_expandable(item).await
    }

    /// Number of parts with a children fetch in flight
    pub fn in_flight(&self) -> usize {
        self.pending().len()
    }
}

impl Clone for HistoryManager {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            pending: Arc::clone(&self.pending),
            timeout: self.timeout,
        }
    }
}

struct PendingGuard<'a> {
    pending: &'a PendingChildRequests,
    /// Cleared once the senders have been taken
    item: Option<&'a str>,
}

impl PendingGuard<'_> {
    fn take(mut self) -> Vec<oneshot::Sender<ChildrenResult>> {
        let Some(item) = self.item.take() else {
            return Vec::new();
        };
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(item)
            .unwrap_or_default()
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        // Only a cancelled fetch gets here armed; after `take` the entry may
        // already belong to a newer fetch for the same part
        if let Some(item) = self.item {
            self.pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(item);
        }
    }
}
