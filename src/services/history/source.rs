use super::backend::{HistoryBackend, HistoryEntry};
use super::error::{HistoryError, Result};
use crate::config::HierarchyConfig;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

/// In-memory, read-only part hierarchy
///
/// Holds the parent -> ordered children mapping plus the ordered root
/// identities. The identity space is every root, every parent key and every
/// listed child; anything else is `NotFound`.
#[derive(Debug, Clone)]
pub struct HierarchySource {
    roots: Vec<String>,
    children: HashMap<String, Vec<String>>,
    known: HashSet<String>,
}

impl HierarchySource {
    /// Build a source from an explicit configuration
    pub fn new(config: &HierarchyConfig) -> Self {
        let mut known: HashSet<String> = config.roots.iter().cloned().collect();
        for (parent, kids) in &config.children {
            known.insert(parent.clone());
            known.extend(kids.iter().cloned());
        }

        Self {
            roots: config.roots.clone(),
            children: config
                .children
                .iter()
                .map(|(parent, kids)| (parent.clone(), kids.clone()))
                .collect(),
            known,
        }
    }

    /// The reference dataset shipped with the dashboard
    pub fn sample() -> Self {
        Self::new(&HierarchyConfig::default())
    }

    pub fn roots(&self) -> &[String] {
        &self.roots
    }

    pub fn contains(&self, item: &str) -> bool {
        self.known.contains(item)
    }

    /// Number of distinct identities
    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    /// Children of `item`, `None` when it is a leaf
    pub fn get_children(&self, item: &str) -> Result<Option<&[String]>> {
        if !self.contains(item) {
            return Err(HistoryError::not_found(item));
        }
        Ok(self.children.get(item).map(Vec::as_slice))
    }

    pub fn is_expandable(&self, item: &str) -> Result<bool> {
        self.get_children(item).map(|kids| kids.is_some())
    }

    fn entry(&self, item: &str) -> HistoryEntry {
        HistoryEntry::new(item, self.children.contains_key(item))
    }
}

#[async_trait]
impl HistoryBackend for HierarchySource {
    async fn roots(&self) -> Result<Vec<HistoryEntry>> {
        Ok(self.roots.iter().map(|root| self.entry(root)).collect())
    }

    async fn children(&self, item: &str) -> Result<Option<Vec<HistoryEntry>>> {
        Ok(self
            .get_children(item)?
            .map(|kids| kids.iter().map(|kid| self.entry(kid)).collect()))
    }

    async fn is_expandable(&self, item: &str) -> Result<bool> {
        HierarchySource::is_expandable(self, item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_sample_roots() {
        let source = HierarchySource::sample();
        assert_eq!(source.roots(), ["Fruits", "Vegetables"]);
        assert!(source.is_expandable("Fruits").unwrap());
        assert!(source.is_expandable("Onion").unwrap());
    }

    #[test]
    fn test_children_order_preserved() {
        let source = HierarchySource::sample();
        let kids = source.get_children("Fruits").unwrap().unwrap();
        assert_eq!(kids, ["Apple", "Orange", "Banana"]);
    }

    #[test]
    fn test_leaf_is_known_but_not_expandable() {
        let source = HierarchySource::sample();
        assert!(source.contains("Fuji"));
        assert_eq!(source.get_children("Fuji").unwrap(), None);
        assert!(!source.is_expandable("Fuji").unwrap());
    }

    #[test]
    fn test_unknown_identity_is_not_found() {
        let source = HierarchySource::sample();
        assert_eq!(
            source.get_children("Kiwi"),
            Err(HistoryError::not_found("Kiwi"))
        );
        assert!(source.is_expandable("Kiwi").is_err());
    }

    #[test]
    fn test_empty_children_still_expandable() {
        let mut children = BTreeMap::new();
        children.insert("Pallet-7".to_string(), Vec::new());
        let source = HierarchySource::new(&HierarchyConfig {
            roots: vec!["Pallet-7".to_string()],
            children,
        });

        assert_eq!(source.get_children("Pallet-7").unwrap(), Some(&[][..]));
        assert!(source.is_expandable("Pallet-7").unwrap());
    }

    #[test]
    fn test_identity_space() {
        let source = HierarchySource::sample();
        // 2 roots + 6 children of roots + 2 (Apple) + 3 (Onion)
        assert_eq!(source.len(), 13);
        assert!(!source.is_empty());
    }

    #[tokio::test]
    async fn test_backend_entries_carry_expandability() {
        let source = HierarchySource::sample();
        let kids = HistoryBackend::children(&source, "Fruits")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            kids,
            vec![
                HistoryEntry::branch("Apple"),
                HistoryEntry::leaf("Orange"),
                HistoryEntry::leaf("Banana"),
            ]
        );

        let roots = HistoryBackend::roots(&source).await.unwrap();
        assert!(roots.iter().all(|r| r.expandable));
    }
}
