pub mod config;
pub mod search;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::analysis::{Analyzer, StandardAnalyzer};
use crate::data::Document;
use crate::error::{LexstoreError, Result};
use crate::lexical::scoring::Bm25Scorer;
use crate::persistence::{self, IndexSettings, Snapshot};
use crate::store::document::{BatchReport, DocumentStore, DocumentUpdate};

use self::config::EngineConfig;
use self::search::{SearchRequest, SearchResult};

/// Corpus-level statistics reported by [`Engine::stats`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub document_count: usize,
    pub average_document_length: f64,
    pub total_length: u64,
    pub unique_terms: usize,
    pub total_postings: usize,
}

/// Keyword search engine over a single in-memory index.
///
/// The engine follows a single-writer, multi-reader discipline: mutations take
/// an exclusive lock on the document store, searches take a shared lock for
/// the whole call and therefore see a consistent snapshot. Nothing reaches
/// disk until [`flush`](Engine::flush) or [`save_to`](Engine::save_to).
#[derive(Debug)]
pub struct Engine {
    config: EngineConfig,
    scorer: Bm25Scorer,
    settings: IndexSettings,
    store: RwLock<DocumentStore>,
    flush_lock: Mutex<()>,
}

impl Engine {
    /// Create an engine.
    ///
    /// The configuration is validated first. When `index_path` names an
    /// existing snapshot it is loaded; otherwise the engine starts empty.
    /// A snapshot built with other analysis settings (stop words, positions)
    /// is rejected with [`LexstoreError::InvalidConfiguration`].
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let analyzer = Self::analyzer_for(&config);
        let settings = Self::settings_for(&config, analyzer.as_ref());

        let store = match config.index_path.as_deref() {
            Some(path) if path.exists() => persistence::load(path, analyzer, &settings)?,
            _ => DocumentStore::new(analyzer, config.store_positions),
        };

        Ok(Self::with_store(config, settings, store))
    }

    /// Open the snapshot at `path`, which becomes the engine's `index_path`.
    ///
    /// Unlike [`Engine::new`], a missing file is an error.
    pub fn open_at(path: impl AsRef<Path>, mut config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let path = path.as_ref();
        let analyzer = Self::analyzer_for(&config);
        let settings = Self::settings_for(&config, analyzer.as_ref());
        let store = persistence::load(path, analyzer, &settings)?;
        config.index_path = Some(path.to_path_buf());
        Ok(Self::with_store(config, settings, store))
    }

    fn with_store(config: EngineConfig, settings: IndexSettings, store: DocumentStore) -> Self {
        Engine {
            scorer: Bm25Scorer::new(config.bm25_params()),
            settings,
            config,
            store: RwLock::new(store),
            flush_lock: Mutex::new(()),
        }
    }

    fn analyzer_for(config: &EngineConfig) -> Arc<dyn Analyzer> {
        Arc::new(StandardAnalyzer::with_stop_words(&config.stop_words))
    }

    fn settings_for(config: &EngineConfig, analyzer: &dyn Analyzer) -> IndexSettings {
        IndexSettings::new(
            analyzer.name(),
            config.stop_words.clone(),
            config.store_positions,
        )
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Add a document and return its id (generated when the document has none).
    pub fn add(&self, doc: Document) -> Result<String> {
        self.store.write().add(doc)
    }

    /// Update an existing document's text and/or metadata.
    pub fn update(&self, id: &str, update: DocumentUpdate) -> Result<()> {
        self.store.write().update(id, update)
    }

    pub fn delete(&self, id: &str) -> Result<()> {
        self.store.write().delete(id)
    }

    pub fn get(&self, id: &str) -> Result<Document> {
        self.store.read().get(id)
    }

    /// Add the document, or replace it entirely if its id exists.
    pub fn upsert(&self, doc: Document) -> Result<String> {
        self.store.write().upsert(doc)
    }

    /// Add documents. With `strict_batch` the first failure rolls back the
    /// whole batch and is returned as [`LexstoreError::BatchAborted`].
    pub fn add_batch(&self, docs: Vec<Document>) -> Result<BatchReport<String>> {
        self.store.write().add_batch(docs, self.config.strict_batch)
    }

    pub fn update_batch(&self, updates: Vec<(String, DocumentUpdate)>) -> Result<BatchReport<()>> {
        self.store
            .write()
            .update_batch(updates, self.config.strict_batch)
    }

    pub fn delete_batch(&self, ids: Vec<String>) -> Result<BatchReport<()>> {
        self.store.write().delete_batch(ids, self.config.strict_batch)
    }

    /// Remove every document.
    pub fn clear(&self) {
        self.store.write().clear();
        log::debug!("cleared index");
    }

    /// Ranked search.
    pub fn search(&self, request: &SearchRequest) -> Result<Vec<SearchResult>> {
        let store = self.store.read();
        Ok(search::execute(
            &store,
            &self.scorer,
            request,
            self.config.top_k_default,
        ))
    }

    /// Run several searches against the same snapshot, in parallel.
    pub fn search_batch(&self, requests: &[SearchRequest]) -> Result<Vec<Vec<SearchResult>>> {
        let store = self.store.read();
        let store: &DocumentStore = &store;
        Ok(requests
            .par_iter()
            .map(|request| search::execute(store, &self.scorer, request, self.config.top_k_default))
            .collect())
    }

    pub fn len(&self) -> usize {
        self.store.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.read().is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.store.read().contains(id)
    }

    /// All document ids, sorted.
    pub fn document_ids(&self) -> Vec<String> {
        self.store.read().document_ids()
    }

    pub fn stats(&self) -> IndexStats {
        let store = self.store.read();
        let index = store.index();
        IndexStats {
            document_count: index.document_count(),
            average_document_length: index.average_document_length(),
            total_length: index.total_length(),
            unique_terms: index.unique_terms(),
            total_postings: index.total_postings(),
        }
    }

    /// Write a snapshot to the configured `index_path`.
    pub fn flush(&self) -> Result<()> {
        let path = self.index_path()?;
        self.write_snapshot(&path, None)
    }

    /// Like [`flush`](Engine::flush), but gives up with
    /// [`LexstoreError::FlushCancelled`] once `cancel` is set. The previous
    /// snapshot stays intact; calling again redoes the flush from scratch.
    pub fn flush_with_cancel(&self, cancel: &AtomicBool) -> Result<()> {
        let path = self.index_path()?;
        self.write_snapshot(&path, Some(cancel))
    }

    /// Write a snapshot to an explicit path.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        self.write_snapshot(path.as_ref(), None)
    }

    fn index_path(&self) -> Result<PathBuf> {
        self.config
            .index_path
            .clone()
            .ok_or_else(|| LexstoreError::invalid_config("no index_path configured"))
    }

    fn write_snapshot(&self, path: &Path, cancel: Option<&AtomicBool>) -> Result<()> {
        let _flush = self.flush_lock.lock();
        // Writers are blocked only while the snapshot is copied.
        let snapshot = {
            let store = self.store.read();
            Snapshot::capture(&store, &self.settings, cancel)?
        };
        snapshot.write_to(path, cancel)
    }
}
