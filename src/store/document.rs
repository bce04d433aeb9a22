//! Document lifecycle: add, update, delete and get, single or in batches.
//!
//! Every mutation touches three structures (the inverted index, the metadata
//! store and the stored texts) and either changes all of them or none. Single
//! operations roll back their own partial writes; strict batches additionally
//! keep an undo log and revert the whole batch on the first failing item.

use std::sync::Arc;

use ahash::AHashMap;

use crate::analysis::Analyzer;
use crate::data::{Document, Metadata, validate_metadata};
use crate::error::{LexstoreError, Result};
use crate::lexical::inverted::InvertedIndex;
use crate::store::metadata::MetadataStore;

/// Changes to apply to an existing document.
///
/// Fields left as `None` are kept. Metadata replaces the whole record unless
/// `merge_metadata` is set, in which case only the given fields change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentUpdate {
    pub text: Option<String>,
    pub metadata: Option<Metadata>,
    pub merge_metadata: bool,
}

impl DocumentUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Merge the given metadata into the existing record instead of replacing it.
    pub fn merge_metadata(mut self, merge: bool) -> Self {
        self.merge_metadata = merge;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_none() && self.metadata.is_none()
    }
}

/// Per-item outcome of a non-strict batch, in input order.
#[derive(Debug)]
pub struct BatchReport<T> {
    pub results: Vec<Result<T>>,
}

impl<T> BatchReport<T> {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    /// True when every item succeeded.
    pub fn is_success(&self) -> bool {
        self.results.iter().all(|r| r.is_ok())
    }

    /// Failed items as `(position, error)`.
    pub fn errors(&self) -> impl Iterator<Item = (usize, &LexstoreError)> {
        self.results
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.as_ref().err().map(|e| (i, e)))
    }
}

/// How to revert one applied mutation.
#[derive(Debug)]
enum Undo {
    /// The document was added: remove it.
    Remove(String),
    /// The document was updated or deleted: put back its prior state.
    Restore {
        id: String,
        text: String,
        metadata: Metadata,
    },
}

/// Owns the inverted index, metadata records and document texts.
#[derive(Debug)]
pub struct DocumentStore {
    analyzer: Arc<dyn Analyzer>,
    index: InvertedIndex,
    metadata: MetadataStore,
    texts: AHashMap<String, String>,
}

impl DocumentStore {
    pub fn new(analyzer: Arc<dyn Analyzer>, store_positions: bool) -> Self {
        DocumentStore {
            analyzer,
            index: InvertedIndex::new(store_positions),
            metadata: MetadataStore::new(),
            texts: AHashMap::new(),
        }
    }

    /// Rebuild a store around a loaded index and its documents.
    ///
    /// Fails with `Serialization` when the documents and the index disagree
    /// on which ids exist.
    pub(crate) fn restore(
        analyzer: Arc<dyn Analyzer>,
        index: InvertedIndex,
        documents: impl IntoIterator<Item = (String, String, Metadata)>,
    ) -> Result<Self> {
        let mut store = DocumentStore {
            analyzer,
            index,
            metadata: MetadataStore::new(),
            texts: AHashMap::new(),
        };
        for (id, text, metadata) in documents {
            if !store.index.contains(&id) {
                return Err(LexstoreError::serialization(format!(
                    "document {id} is missing from the index"
                )));
            }
            store
                .metadata
                .put(&id, metadata)
                .map_err(|e| LexstoreError::serialization(format!("document {id}: {e}")))?;
            store.texts.insert(id, text);
        }
        if store.texts.len() != store.index.document_count() {
            return Err(LexstoreError::serialization(format!(
                "index holds {} documents but {} were stored",
                store.index.document_count(),
                store.texts.len()
            )));
        }
        Ok(store)
    }

    pub fn analyzer(&self) -> &Arc<dyn Analyzer> {
        &self.analyzer
    }

    pub fn index(&self) -> &InvertedIndex {
        &self.index
    }

    pub fn metadata(&self, id: &str) -> Option<&Metadata> {
        self.metadata.get(id)
    }

    pub fn text(&self, id: &str) -> Option<&str> {
        self.texts.get(id).map(String::as_str)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.texts.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.texts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    /// All document ids in ascending order.
    pub fn document_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.texts.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Iterate over `(id, text, metadata)` (unordered).
    pub fn documents(&self) -> impl Iterator<Item = (&str, &str, &Metadata)> {
        self.texts.iter().filter_map(|(id, text)| {
            self.metadata
                .get(id)
                .map(|metadata| (id.as_str(), text.as_str(), metadata))
        })
    }

    /// Add a document. Generates a UUID when the document has no id.
    pub fn add(&mut self, doc: Document) -> Result<String> {
        self.add_logged(doc).map(|(id, _)| id)
    }

    /// Apply changes to an existing document.
    pub fn update(&mut self, id: &str, update: DocumentUpdate) -> Result<()> {
        self.update_logged(id, update).map(|_| ())
    }

    /// Delete a document from the index and the metadata store.
    pub fn delete(&mut self, id: &str) -> Result<()> {
        self.delete_logged(id).map(|_| ())
    }

    /// Fetch a stored document.
    pub fn get(&self, id: &str) -> Result<Document> {
        let text = self
            .texts
            .get(id)
            .ok_or_else(|| LexstoreError::not_found(id))?;
        Ok(Document {
            id: Some(id.to_string()),
            text: text.clone(),
            metadata: self.metadata.get(id).cloned().unwrap_or_default(),
        })
    }

    /// Add the document, or fully replace it (text and whole metadata record)
    /// when its id is already present.
    pub fn upsert(&mut self, doc: Document) -> Result<String> {
        match doc.id.as_deref() {
            Some(id) if self.contains(id) => {
                let id = id.to_string();
                let update = DocumentUpdate::new().text(doc.text).metadata(doc.metadata);
                self.update(&id, update)?;
                Ok(id)
            }
            _ => self.add(doc),
        }
    }

    /// Remove every document.
    pub fn clear(&mut self) {
        self.index.clear();
        self.metadata.clear();
        self.texts.clear();
    }

    pub fn add_batch(&mut self, docs: Vec<Document>, strict: bool) -> Result<BatchReport<String>> {
        self.run_batch(docs, strict, |store, doc| store.add_logged(doc))
    }

    pub fn update_batch(
        &mut self,
        updates: Vec<(String, DocumentUpdate)>,
        strict: bool,
    ) -> Result<BatchReport<()>> {
        self.run_batch(updates, strict, |store, (id, update)| {
            store.update_logged(&id, update).map(|undo| ((), undo))
        })
    }

    pub fn delete_batch(&mut self, ids: Vec<String>, strict: bool) -> Result<BatchReport<()>> {
        self.run_batch(ids, strict, |store, id| {
            store.delete_logged(&id).map(|undo| ((), undo))
        })
    }

    fn run_batch<I, T>(
        &mut self,
        items: Vec<I>,
        strict: bool,
        mut apply: impl FnMut(&mut Self, I) -> Result<(T, Undo)>,
    ) -> Result<BatchReport<T>> {
        let mut results = Vec::with_capacity(items.len());
        let mut undo_log = Vec::new();

        for (position, item) in items.into_iter().enumerate() {
            match apply(self, item) {
                Ok((value, undo)) => {
                    if strict {
                        undo_log.push(undo);
                    }
                    results.push(Ok(value));
                }
                Err(err) if strict => {
                    log::warn!(
                        "strict batch failed at item {position} ({err}), rolling back {} items",
                        undo_log.len()
                    );
                    for undo in undo_log.into_iter().rev() {
                        self.revert(undo);
                    }
                    return Err(LexstoreError::BatchAborted {
                        position,
                        source: Box::new(err),
                    });
                }
                Err(err) => results.push(Err(err)),
            }
        }

        Ok(BatchReport { results })
    }

    fn add_logged(&mut self, doc: Document) -> Result<(String, Undo)> {
        let id = match doc.id {
            Some(id) if id.is_empty() => {
                return Err(LexstoreError::invalid_document("document id must not be empty"));
            }
            Some(id) => id,
            None => uuid::Uuid::new_v4().to_string(),
        };
        if self.contains(&id) {
            return Err(LexstoreError::duplicate_id(id));
        }

        self.insert(&id, doc.text, doc.metadata)?;
        log::debug!("added document {id}");
        Ok((id.clone(), Undo::Remove(id)))
    }

    fn update_logged(&mut self, id: &str, update: DocumentUpdate) -> Result<Undo> {
        let old_text = self
            .texts
            .get(id)
            .cloned()
            .ok_or_else(|| LexstoreError::not_found(id))?;
        let old_metadata = self.metadata.get(id).cloned().unwrap_or_default();

        // Checked before the text changes so a bad record never leaves a
        // half-applied update behind.
        if let Some(fields) = &update.metadata {
            validate_metadata(fields)?;
        }

        if let Some(text) = update.text {
            let tokens = self.analyzer.analyze(&text);
            self.index.remove_document(id)?;
            if let Err(err) = self.index.add_document(id, &tokens) {
                log::warn!("reindexing {id} failed ({err}), restoring previous postings");
                let previous = self.analyzer.analyze(&old_text);
                self.index.add_document(id, &previous)?;
                return Err(err);
            }
            self.texts.insert(id.to_string(), text);
        }

        match update.metadata {
            Some(fields) if update.merge_metadata => {
                self.metadata.merge(id, fields)?;
            }
            Some(record) => {
                self.metadata.put(id, record)?;
            }
            None => {}
        }
        log::debug!("updated document {id}");

        Ok(Undo::Restore {
            id: id.to_string(),
            text: old_text,
            metadata: old_metadata,
        })
    }

    fn delete_logged(&mut self, id: &str) -> Result<Undo> {
        let (text, metadata) = self.remove(id)?;
        log::debug!("deleted document {id}");
        Ok(Undo::Restore {
            id: id.to_string(),
            text,
            metadata,
        })
    }

    /// Write a document to the index, metadata store and texts as one unit.
    fn insert(&mut self, id: &str, text: String, metadata: Metadata) -> Result<()> {
        let tokens = self.analyzer.analyze(&text);
        self.index.add_document(id, &tokens)?;
        if let Err(err) = self.metadata.put(id, metadata) {
            log::warn!("metadata write for {id} failed ({err}), rolling back index entry");
            self.index.remove_document(id)?;
            return Err(err);
        }
        self.texts.insert(id.to_string(), text);
        Ok(())
    }

    /// Remove a document from all three structures.
    fn remove(&mut self, id: &str) -> Result<(String, Metadata)> {
        let text = self
            .texts
            .remove(id)
            .ok_or_else(|| LexstoreError::not_found(id))?;
        self.index.remove_document(id)?;
        let metadata = self.metadata.remove(id).unwrap_or_default();
        Ok((text, metadata))
    }

    fn revert(&mut self, undo: Undo) {
        let outcome = match undo {
            Undo::Remove(id) => self.remove(&id).map(|_| ()),
            Undo::Restore { id, text, metadata } => {
                if self.contains(&id) {
                    if let Err(err) = self.remove(&id) {
                        log::warn!("rollback could not remove {id}: {err}");
                    }
                }
                self.insert(&id, text, metadata)
            }
        };
        if let Err(err) = outcome {
            log::warn!("rollback step failed: {err}");
        }
    }
}
