//! Per-document metadata records.

use ahash::AHashMap;

use crate::data::{Metadata, validate_metadata};
use crate::error::Result;

/// Maps document ids to their metadata records.
#[derive(Debug, Clone, Default)]
pub struct MetadataStore {
    records: AHashMap<String, Metadata>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a record, replacing any previous one.
    ///
    /// Fails with `InvalidDocument` if the record holds an unsupported value;
    /// the store is left unchanged in that case.
    pub fn put(&mut self, id: &str, metadata: Metadata) -> Result<Option<Metadata>> {
        validate_metadata(&metadata)?;
        Ok(self.records.insert(id.to_string(), metadata))
    }

    /// Merge fields into an existing record, overwriting fields present in
    /// both. Returns the previous record.
    pub fn merge(&mut self, id: &str, fields: Metadata) -> Result<Option<Metadata>> {
        validate_metadata(&fields)?;
        let previous = self.records.get(id).cloned();
        let mut merged = previous.clone().unwrap_or_default();
        merged.extend(fields);
        self.records.insert(id.to_string(), merged);
        Ok(previous)
    }

    pub fn get(&self, id: &str) -> Option<&Metadata> {
        self.records.get(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<Metadata> {
        self.records.remove(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataValue;
    use crate::error::LexstoreError;

    fn meta(pairs: &[(&str, DataValue)]) -> Metadata {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_put_and_replace() {
        let mut store = MetadataStore::new();
        assert!(store.put("a", meta(&[("x", DataValue::Int64(1))])).unwrap().is_none());
        let old = store.put("a", meta(&[("y", DataValue::Int64(2))])).unwrap();
        assert_eq!(old, Some(meta(&[("x", DataValue::Int64(1))])));
        assert!(!store.get("a").unwrap().contains_key("x"));
    }

    #[test]
    fn test_merge_overwrites_shared_fields() {
        let mut store = MetadataStore::new();
        store
            .put("a", meta(&[("x", DataValue::Int64(1)), ("y", "old".into())]))
            .unwrap();
        store.merge("a", meta(&[("y", "new".into())])).unwrap();
        let record = store.get("a").unwrap();
        assert_eq!(record.get("x"), Some(&DataValue::Int64(1)));
        assert_eq!(record.get("y"), Some(&DataValue::from("new")));
    }

    #[test]
    fn test_invalid_record_leaves_store_unchanged() {
        let mut store = MetadataStore::new();
        store.put("a", meta(&[("x", DataValue::Int64(1))])).unwrap();
        let nested = DataValue::List(vec![DataValue::List(vec![])]);
        let err = store.put("a", meta(&[("bad", nested)])).unwrap_err();
        assert!(matches!(err, LexstoreError::InvalidDocument(_)));
        assert_eq!(store.get("a"), Some(&meta(&[("x", DataValue::Int64(1))])));
    }
}
