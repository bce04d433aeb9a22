//! Snapshot persistence.
//!
//! A snapshot is a single file: a JSON payload followed by an 8-byte footer
//! `[magic "LXS1"][CRC32 of the payload, big-endian]`. Writes go to a
//! temporary file in the target directory which is then renamed over the
//! previous snapshot, so readers only ever see a complete file and a failed or
//! cancelled flush leaves the prior snapshot untouched.
//!
//! The snapshot records the analysis settings its terms were produced with.
//! Loading under different settings fails with `InvalidConfiguration`, since
//! query terms would no longer line up with the stored postings.
//!
//! A `<snapshot>.lock` file is created exclusively for the duration of a write
//! and removed on every exit path.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::analysis::{Analyzer, StopWords};
use crate::data::Metadata;
use crate::error::{LexstoreError, Result};
use crate::lexical::inverted::InvertedIndex;
use crate::lexical::posting::PostingList;
use crate::store::document::DocumentStore;

/// Identifies lexstore snapshot files.
pub const SNAPSHOT_FORMAT: &str = "lexstore-snapshot";

/// Snapshot layout version written and accepted by this build.
pub const SNAPSHOT_VERSION: u32 = 1;

const SNAPSHOT_MAGIC: &[u8; 4] = b"LXS1";
const FOOTER_LEN: usize = 8;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct StoredDocument {
    text: String,
    length: u32,
    #[serde(default)]
    metadata: Metadata,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct SnapshotStats {
    document_count: u64,
    total_length: u64,
}

/// Analysis settings an index was built with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSettings {
    /// [`Analyzer::name`] of the analyzer that produced the terms.
    pub analyzer: String,
    pub stop_words: StopWords,
    pub store_positions: bool,
}

impl IndexSettings {
    pub fn new(analyzer: impl Into<String>, stop_words: StopWords, store_positions: bool) -> Self {
        IndexSettings {
            analyzer: analyzer.into(),
            stop_words,
            store_positions,
        }
    }

    /// Whether an index built with `self` can serve an engine configured
    /// with `other`. Stop words compare as sets.
    pub fn is_compatible_with(&self, other: &IndexSettings) -> bool {
        self.analyzer == other.analyzer
            && self.store_positions == other.store_positions
            && self.stop_words.build() == other.stop_words.build()
    }
}

impl fmt::Display for IndexSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stop_words = match &self.stop_words {
            StopWords::None => "none".to_string(),
            StopWords::English => "english".to_string(),
            StopWords::Custom(words) => format!("custom ({} words)", words.len()),
        };
        write!(
            f,
            "analyzer {}, stop words {stop_words}, positions {}",
            self.analyzer,
            if self.store_positions { "on" } else { "off" }
        )
    }
}

/// Fields read before the full payload so that foreign or newer files are
/// rejected with a version error rather than a decode error.
#[derive(Debug, Deserialize)]
struct SnapshotHeader {
    #[serde(default)]
    format: serde_json::Value,
    #[serde(default)]
    version: serde_json::Value,
}

/// A point-in-time copy of a document store, ready to be written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    format: String,
    version: u32,
    created_at: DateTime<Utc>,
    settings: IndexSettings,
    stats: SnapshotStats,
    documents: BTreeMap<String, StoredDocument>,
    postings: BTreeMap<String, PostingList>,
}

fn check_cancel(cancel: Option<&AtomicBool>) -> Result<()> {
    match cancel {
        Some(flag) if flag.load(Ordering::Acquire) => Err(LexstoreError::FlushCancelled),
        _ => Ok(()),
    }
}

impl Snapshot {
    /// Copy the store's documents and postings.
    ///
    /// Checks `cancel` between sections.
    pub fn capture(
        store: &DocumentStore,
        settings: &IndexSettings,
        cancel: Option<&AtomicBool>,
    ) -> Result<Self> {
        let index = store.index();

        let mut documents = BTreeMap::new();
        for (id, text, metadata) in store.documents() {
            documents.insert(
                id.to_string(),
                StoredDocument {
                    text: text.to_string(),
                    length: index.doc_length(id).unwrap_or(0),
                    metadata: metadata.clone(),
                },
            );
        }
        check_cancel(cancel)?;

        let postings: BTreeMap<String, PostingList> = index
            .terms()
            .map(|(term, list)| (term.to_string(), list.clone()))
            .collect();
        check_cancel(cancel)?;

        Ok(Snapshot {
            format: SNAPSHOT_FORMAT.to_string(),
            version: SNAPSHOT_VERSION,
            created_at: Utc::now(),
            settings: settings.clone(),
            stats: SnapshotStats {
                document_count: index.document_count() as u64,
                total_length: index.total_length(),
            },
            documents,
            postings,
        })
    }

    pub fn document_count(&self) -> u64 {
        self.stats.document_count
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn settings(&self) -> &IndexSettings {
        &self.settings
    }

    /// Encode the payload and append the checksum footer.
    fn encode(&self) -> Result<Vec<u8>> {
        let payload = serde_json::to_vec(self)?;
        let crc = crc32fast::hash(&payload);
        let mut bytes = Vec::with_capacity(payload.len() + FOOTER_LEN);
        bytes.extend_from_slice(&payload);
        bytes.extend_from_slice(SNAPSHOT_MAGIC);
        bytes.extend_from_slice(&crc.to_be_bytes());
        Ok(bytes)
    }

    /// Atomically write the snapshot to `path`.
    pub fn write_to(&self, path: &Path, cancel: Option<&AtomicBool>) -> Result<()> {
        let bytes = self.encode()?;
        check_cancel(cancel)?;

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let _lock = LockGuard::acquire(path)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;

        // Dropping `tmp` without persisting deletes it.
        check_cancel(cancel)?;
        tmp.persist(path).map_err(|e| LexstoreError::IoFailure(e.error))?;

        log::info!(
            "saved snapshot {} ({} documents, {} terms, {} bytes)",
            path.display(),
            self.stats.document_count,
            self.postings.len(),
            bytes.len()
        );
        Ok(())
    }

    /// Read and verify a snapshot file.
    pub fn read_from(path: &Path) -> Result<Self> {
        let raw = fs::read(path)?;
        let payload = verify_footer(&raw, path)?;

        let header: SnapshotHeader = serde_json::from_slice(payload)?;
        let supported = || SNAPSHOT_VERSION.to_string();
        if header.format.as_str() != Some(SNAPSHOT_FORMAT) {
            return Err(LexstoreError::IncompatibleIndexVersion {
                found: format!("format {}", header.format),
                supported: supported(),
            });
        }
        if header.version.as_u64() != Some(SNAPSHOT_VERSION as u64) {
            return Err(LexstoreError::IncompatibleIndexVersion {
                found: header.version.to_string(),
                supported: supported(),
            });
        }

        Ok(serde_json::from_slice(payload)?)
    }

    /// Rebuild a document store, validating the snapshot's consistency.
    pub fn into_store(self, analyzer: Arc<dyn Analyzer>) -> Result<DocumentStore> {
        let store_positions = self.settings.store_positions;
        let lengths: Vec<(String, u32)> = self
            .documents
            .iter()
            .map(|(id, doc)| (id.clone(), doc.length))
            .collect();
        let index = InvertedIndex::from_parts(lengths, self.postings, store_positions)?;

        let stats = index.stats();
        if stats.document_count != self.stats.document_count
            || stats.total_length != self.stats.total_length
        {
            return Err(LexstoreError::serialization(format!(
                "snapshot statistics ({} documents, length {}) disagree with its postings \
                 ({} documents, length {})",
                self.stats.document_count,
                self.stats.total_length,
                stats.document_count,
                stats.total_length
            )));
        }

        let documents = self
            .documents
            .into_iter()
            .map(|(id, doc)| (id, doc.text, doc.metadata));
        DocumentStore::restore(analyzer, index, documents)
    }
}

fn verify_footer<'a>(raw: &'a [u8], path: &Path) -> Result<&'a [u8]> {
    if raw.len() < FOOTER_LEN || &raw[raw.len() - FOOTER_LEN..raw.len() - 4] != SNAPSHOT_MAGIC {
        return Err(LexstoreError::serialization(format!(
            "{} is not a lexstore snapshot (missing footer)",
            path.display()
        )));
    }
    let (payload, footer) = raw.split_at(raw.len() - FOOTER_LEN);
    let stored = u32::from_be_bytes([footer[4], footer[5], footer[6], footer[7]]);
    let computed = crc32fast::hash(payload);
    if stored != computed {
        return Err(LexstoreError::serialization(format!(
            "snapshot CRC32 mismatch in {}: expected {stored:#010x}, got {computed:#010x}",
            path.display()
        )));
    }
    log::debug!("snapshot CRC32 verified: {stored:#010x}");
    Ok(payload)
}

/// Capture the store and write it to `path`.
pub fn save(
    store: &DocumentStore,
    path: &Path,
    settings: &IndexSettings,
    cancel: Option<&AtomicBool>,
) -> Result<()> {
    Snapshot::capture(store, settings, cancel)?.write_to(path, cancel)
}

/// Load a document store from the snapshot at `path`.
///
/// Fails with `InvalidConfiguration` when the snapshot was built with
/// analysis settings other than `expected`.
pub fn load(
    path: &Path,
    analyzer: Arc<dyn Analyzer>,
    expected: &IndexSettings,
) -> Result<DocumentStore> {
    let snapshot = Snapshot::read_from(path)?;
    if !snapshot.settings.is_compatible_with(expected) {
        return Err(LexstoreError::invalid_config(format!(
            "index {} was built with {}, but the engine is configured with {expected}",
            path.display(),
            snapshot.settings
        )));
    }
    let created_at = snapshot.created_at;
    let store = snapshot.into_store(analyzer)?;
    log::info!(
        "loaded snapshot {} ({} documents, {}, written {})",
        path.display(),
        store.len(),
        expected,
        created_at.to_rfc3339()
    );
    Ok(store)
}

/// Path of the lock file guarding `path`.
pub fn lock_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}

/// Exclusive lock file, removed when dropped.
struct LockGuard {
    path: PathBuf,
    file: Option<File>,
}

impl LockGuard {
    fn acquire(target: &Path) -> Result<Self> {
        let path = lock_path(target);
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| {
                if e.kind() == io::ErrorKind::AlreadyExists {
                    LexstoreError::IoFailure(io::Error::new(
                        io::ErrorKind::WouldBlock,
                        format!("{} is held by another writer", path.display()),
                    ))
                } else {
                    LexstoreError::IoFailure(e)
                }
            })?;
        Ok(LockGuard {
            path,
            file: Some(file),
        })
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        // Close before removing; some platforms refuse to delete open files.
        drop(self.file.take());
        if let Err(e) = fs::remove_file(&self.path) {
            log::warn!("failed to remove lock file {}: {e}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::StandardAnalyzer;
    use crate::data::{DataValue, Document};

    fn analyzer() -> Arc<dyn Analyzer> {
        Arc::new(StandardAnalyzer::new())
    }

    fn settings() -> IndexSettings {
        IndexSettings::new("standard", StopWords::None, false)
    }

    fn sample_store() -> DocumentStore {
        let mut store = DocumentStore::new(analyzer(), false);
        store
            .add(Document::new_with_id("d1", "the cat sat").add_field("year", 2020i64))
            .unwrap();
        store
            .add(Document::new_with_id("d2", "the dog sat").add_field("tags", vec!["pet", "loyal"]))
            .unwrap();
        store.add(Document::new_with_id("empty", "")).unwrap();
        store
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.lxs");
        let store = sample_store();
        save(&store, &path, &settings(), None).unwrap();

        let loaded = load(&path, analyzer(), &settings()).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded.index().stats(), store.index().stats());
        assert_eq!(loaded.get("d1").unwrap(), store.get("d1").unwrap());
        assert_eq!(
            loaded.metadata("d2").unwrap().get("tags"),
            Some(&DataValue::from(vec!["pet", "loyal"]))
        );
        assert!(!lock_path(&path).exists());
    }

    #[test]
    fn test_corruption_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.lxs");
        save(&sample_store(), &path, &settings(), None).unwrap();

        let mut bytes = fs::read(&path).unwrap();
        bytes[10] ^= 0xff;
        fs::write(&path, &bytes).unwrap();
        let err = load(&path, analyzer(), &settings()).unwrap_err();
        assert!(matches!(err, LexstoreError::Serialization(_)));

        fs::write(&path, b"{}").unwrap();
        let err = load(&path, analyzer(), &settings()).unwrap_err();
        assert!(matches!(err, LexstoreError::Serialization(_)));
    }

    fn write_raw(path: &Path, payload: &serde_json::Value) {
        let payload = serde_json::to_vec(payload).unwrap();
        let mut bytes = payload.clone();
        bytes.extend_from_slice(SNAPSHOT_MAGIC);
        bytes.extend_from_slice(&crc32fast::hash(&payload).to_be_bytes());
        fs::write(path, bytes).unwrap();
    }

    #[test]
    fn test_incompatible_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.lxs");
        write_raw(
            &path,
            &serde_json::json!({"format": SNAPSHOT_FORMAT, "version": 99}),
        );
        match load(&path, analyzer(), &settings()) {
            Err(LexstoreError::IncompatibleIndexVersion { found, supported }) => {
                assert_eq!(found, "99");
                assert_eq!(supported, "1");
            }
            other => panic!("unexpected {other:?}"),
        }

        write_raw(&path, &serde_json::json!({"format": "something-else", "version": 1}));
        assert!(matches!(
            load(&path, analyzer(), &settings()),
            Err(LexstoreError::IncompatibleIndexVersion { .. })
        ));
    }

    #[test]
    fn test_inconsistent_snapshot_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.lxs");
        write_raw(
            &path,
            &serde_json::json!({
                "format": SNAPSHOT_FORMAT,
                "version": SNAPSHOT_VERSION,
                "created_at": "2024-01-01T00:00:00Z",
                "settings": {
                    "analyzer": "standard",
                    "stop_words": "none",
                    "store_positions": false
                },
                "stats": {"document_count": 1, "total_length": 2},
                "documents": {"a": {"text": "x y", "length": 2, "metadata": {}}},
                "postings": {"x": [{"doc_id": "a", "term_frequency": 1}]}
            }),
        );
        let err = load(&path, analyzer(), &settings()).unwrap_err();
        assert!(matches!(err, LexstoreError::Serialization(_)));
    }

    #[test]
    fn test_settings_mismatch_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.lxs");
        save(&sample_store(), &path, &settings(), None).unwrap();

        let english = IndexSettings::new("standard", StopWords::English, false);
        let err = load(&path, analyzer(), &english).unwrap_err();
        assert!(matches!(err, LexstoreError::InvalidConfiguration(_)));
        assert!(!err.is_retryable());

        let positions = IndexSettings::new("standard", StopWords::None, true);
        assert!(matches!(
            load(&path, analyzer(), &positions),
            Err(LexstoreError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn test_positions_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.lxs");
        let with_positions = IndexSettings::new("standard", StopWords::None, true);
        let mut store = DocumentStore::new(analyzer(), true);
        store.add(Document::new_with_id("d1", "a b a")).unwrap();
        save(&store, &path, &with_positions, None).unwrap();

        let loaded = load(&path, analyzer(), &with_positions).unwrap();
        assert!(loaded.index().stores_positions());
        assert_eq!(loaded.index().get_postings("a")[0].positions, Some(vec![0, 2]));
    }

    #[test]
    fn test_stop_word_sets_compare_unordered() {
        let custom = |words: &[&str]| {
            let words = words.iter().map(|w| w.to_string()).collect();
            IndexSettings::new("standard", StopWords::Custom(words), false)
        };
        assert!(custom(&["x", "y"]).is_compatible_with(&custom(&["Y", "x"])));
        assert!(!custom(&["x"]).is_compatible_with(&settings()));
        let other = IndexSettings::new("other", StopWords::None, false);
        assert!(!settings().is_compatible_with(&other));
    }

    #[test]
    fn test_cancelled_flush_keeps_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.lxs");
        let mut store = sample_store();
        save(&store, &path, &settings(), None).unwrap();
        let before = fs::read(&path).unwrap();

        store.add(Document::new_with_id("d3", "new text")).unwrap();
        let cancel = AtomicBool::new(true);
        let err = save(&store, &path, &settings(), Some(&cancel)).unwrap_err();
        assert!(matches!(err, LexstoreError::FlushCancelled));
        assert_eq!(fs::read(&path).unwrap(), before);
        assert!(!lock_path(&path).exists());

        // Retrying without the flag completes the flush.
        save(&store, &path, &settings(), None).unwrap();
        assert_eq!(load(&path, analyzer(), &settings()).unwrap().len(), 4);
    }

    #[test]
    fn test_held_lock_fails_without_touching_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.lxs");
        let store = sample_store();
        save(&store, &path, &settings(), None).unwrap();
        let before = fs::read(&path).unwrap();

        fs::write(lock_path(&path), b"").unwrap();
        let err = save(&store, &path, &settings(), None).unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(fs::read(&path).unwrap(), before);
        // Another writer's lock is left in place.
        assert!(lock_path(&path).exists());
    }
}
