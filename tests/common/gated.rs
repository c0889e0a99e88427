//! Backend whose children fetches block until the test releases them
//!
//! Lets tests interleave expand/collapse intents with fetch resolution
//! deterministically instead of relying on sleeps.

use async_trait::async_trait;
use qwx_parthistory::services::history::{
    HierarchySource, HistoryBackend, HistoryEntry, HistoryError, Result,
};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::oneshot;

type Gate = oneshot::Sender<std::result::Result<(), String>>;

pub struct GatedBackend {
    source: HierarchySource,
    gates: Mutex<HashMap<String, Vec<Gate>>>,
}

impl GatedBackend {
    pub fn new(source: HierarchySource) -> Self {
        Self {
            source,
            gates: Mutex::new(HashMap::new()),
        }
    }

    pub fn sample() -> Self {
        Self::new(HierarchySource::sample())
    }

    fn is_waiting(&self, item: &str) -> bool {
        self.gates
            .lock()
            .unwrap()
            .get(item)
            .is_some_and(|gates| !gates.is_empty())
    }

    /// Wait until a children fetch for `item` is blocked on its gate
    pub async fn wait_for(&self, item: &str) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !self.is_waiting(item) {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("children of '{item}' were never requested"));
    }

    fn open(&self, item: &str, outcome: std::result::Result<(), String>) {
        let gates = self.gates.lock().unwrap().remove(item).unwrap_or_default();
        assert!(!gates.is_empty(), "no fetch pending for '{item}'");
        for gate in gates {
            let _ = gate.send(outcome.clone());
        }
    }

    /// Let the pending fetch for `item` resolve with the real children
    pub fn release(&self, item: &str) {
        self.open(item, Ok(()));
    }

    /// Make the pending fetch for `item` fail
    pub fn fail(&self, item: &str, reason: &str) {
        self.open(item, Err(reason.to_string()));
    }
}

#[async_trait]
impl HistoryBackend for GatedBackend {
    async fn roots(&self) -> Result<Vec<HistoryEntry>> {
        HistoryBackend::roots(&self.source).await
    }

    async fn children(&self, item: &str) -> Result<Option<Vec<HistoryEntry>>> {
        let (tx, rx) = oneshot::channel();
        self.gates
            .lock()
            .unwrap()
            .entry(item.to_string())
            .or_default()
            .push(tx);

        match rx.await {
            Ok(Ok(())) => HistoryBackend::children(&self.source, item).await,
            Ok(Err(reason)) => Err(HistoryError::fetch_failed(item, reason)),
            Err(_) => Err(HistoryError::fetch_failed(item, "gate dropped")),
        }
    }

    async fn is_expandable(&self, item: &str) -> Result<bool> {
        self.source.is_expandable(item)
    }
}
