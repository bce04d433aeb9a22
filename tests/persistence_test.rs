use std::fs;
use std::sync::atomic::AtomicBool;

use tempfile::TempDir;

use lexstore::{
    DataValue, Document, Engine, EngineConfig, Filter, LexstoreError, SearchRequest, StopWords,
};

fn populate(engine: &Engine) -> lexstore::Result<()> {
    engine.add(
        Document::new_with_id("d1", "rust systems programming")
            .add_field("year", 2015i64)
            .add_field("tags", vec!["lang", "systems"]),
    )?;
    engine.add(
        Document::new_with_id("d2", "python scripting programming").add_field("year", 1991i64),
    )?;
    engine.add(Document::new_with_id("d3", "rust web programming").add_field("year", 2020i64))?;
    engine.add(Document::new_with_id("d4", ""))?;
    Ok(())
}

fn requests() -> lexstore::Result<Vec<SearchRequest>> {
    Ok(vec![
        SearchRequest::new("programming"),
        SearchRequest::new("rust"),
        SearchRequest::builder("programming")
            .filter(Filter::parse(r#"{"year": {"$gt": 2000}}"#)?)
            .k(1)
            .build(),
        SearchRequest::builder("systems")
            .filter(Filter::parse(r#"{"tags": "lang"}"#)?)
            .build(),
    ])
}

#[test]
fn test_round_trip_preserves_results() -> lexstore::Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("index.lxs");

    // 1. Build and flush
    let config = EngineConfig::builder().index_path(&path).build()?;
    let engine = Engine::new(config.clone())?;
    populate(&engine)?;
    engine.flush()?;

    // 2. Reload through the configured index_path
    let reloaded = Engine::new(config)?;
    assert_eq!(reloaded.len(), 4);
    assert_eq!(reloaded.stats(), engine.stats());
    assert_eq!(reloaded.get("d1")?, engine.get("d1")?);

    // 3. Identical ranking and scores
    for request in requests()? {
        assert_eq!(reloaded.search(&request)?, engine.search(&request)?);
    }
    Ok(())
}

#[test]
fn test_open_at_and_save_to() -> lexstore::Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("nested").join("snapshot.lxs");

    let engine = Engine::new(EngineConfig::default())?;
    populate(&engine)?;
    engine.save_to(&path)?;

    let opened = Engine::open_at(&path, EngineConfig::default())?;
    assert_eq!(opened.config().index_path.as_deref(), Some(path.as_path()));
    assert_eq!(
        opened.get("d1")?.get("tags"),
        Some(&DataValue::from(vec!["lang", "systems"]))
    );

    // Mutations after reopening flush back to the same file.
    opened.delete("d2")?;
    opened.flush()?;
    let again = Engine::open_at(&path, EngineConfig::default())?;
    assert!(!again.contains("d2"));
    Ok(())
}

#[test]
fn test_open_missing_file_fails() {
    let temp_dir = TempDir::new().unwrap();
    let err = Engine::open_at(temp_dir.path().join("absent.lxs"), EngineConfig::default())
        .unwrap_err();
    assert!(matches!(err, LexstoreError::IoFailure(_)));
}

#[test]
fn test_new_with_missing_index_path_starts_empty() -> lexstore::Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let config = EngineConfig::builder()
        .index_path(temp_dir.path().join("fresh.lxs"))
        .build()?;
    let engine = Engine::new(config)?;
    assert!(engine.is_empty());
    Ok(())
}

#[test]
fn test_incompatible_version_is_rejected() -> lexstore::Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("index.lxs");

    let payload = serde_json::to_vec(&serde_json::json!({
        "format": lexstore::persistence::SNAPSHOT_FORMAT,
        "version": lexstore::persistence::SNAPSHOT_VERSION + 1,
    }))?;
    let mut bytes = payload.clone();
    bytes.extend_from_slice(b"LXS1");
    bytes.extend_from_slice(&crc32fast::hash(&payload).to_be_bytes());
    fs::write(&path, bytes)?;

    let config = EngineConfig::builder().index_path(&path).build()?;
    let err = Engine::new(config).unwrap_err();
    assert!(matches!(
        err,
        LexstoreError::IncompatibleIndexVersion { .. }
    ));
    assert!(!err.is_retryable());
    Ok(())
}

#[test]
fn test_cancelled_flush_leaves_previous_snapshot() -> lexstore::Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("index.lxs");
    let config = EngineConfig::builder().index_path(&path).build()?;

    let engine = Engine::new(config.clone())?;
    populate(&engine)?;
    engine.flush()?;
    let before = fs::read(&path)?;

    engine.add(Document::new_with_id("d5", "late arrival"))?;
    let cancel = AtomicBool::new(true);
    let err = engine.flush_with_cancel(&cancel).unwrap_err();
    assert!(matches!(err, LexstoreError::FlushCancelled));
    assert_eq!(fs::read(&path)?, before);
    assert_eq!(Engine::new(config.clone())?.len(), 4);

    // A later flush redoes the work.
    engine.flush_with_cancel(&AtomicBool::new(false))?;
    assert_eq!(Engine::new(config)?.len(), 5);
    Ok(())
}

#[test]
fn test_no_temporary_files_left_behind() -> lexstore::Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("index.lxs");
    let engine = Engine::new(EngineConfig::default())?;
    populate(&engine)?;
    engine.save_to(&path)?;
    engine.save_to(&path)?;

    let entries: Vec<String> = fs::read_dir(temp_dir.path())?
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(entries, vec!["index.lxs".to_string()]);
    Ok(())
}

#[test]
fn test_reload_with_other_analysis_settings_is_rejected() -> lexstore::Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("index.lxs");

    let config = EngineConfig::builder().index_path(&path).build()?;
    let engine = Engine::new(config.clone())?;
    engine.add(Document::new_with_id("d1", "the cat"))?;
    engine.add(Document::new_with_id("d2", "the dog"))?;
    assert_eq!(engine.search(&SearchRequest::new("the"))?.len(), 2);
    engine.flush()?;

    // Stop words would drop "the" from queries but not from stored postings.
    let english = EngineConfig::builder()
        .index_path(&path)
        .stop_words(StopWords::English)
        .build()?;
    let err = Engine::new(english).unwrap_err();
    assert!(matches!(err, LexstoreError::InvalidConfiguration(_)));

    let positions = EngineConfig::builder().store_positions(true).build()?;
    let err = Engine::open_at(&path, positions).unwrap_err();
    assert!(matches!(err, LexstoreError::InvalidConfiguration(_)));

    // Matching settings still load, and the file is unchanged by the failures.
    let reloaded = Engine::new(config)?;
    assert_eq!(reloaded.search(&SearchRequest::new("the"))?.len(), 2);
    Ok(())
}

#[test]
fn test_positions_setting_round_trips() -> lexstore::Result<()> {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("index.lxs");
    let config = EngineConfig::builder()
        .index_path(&path)
        .store_positions(true)
        .build()?;

    let engine = Engine::new(config.clone())?;
    engine.add(Document::new_with_id("d1", "a b a"))?;
    engine.flush()?;

    let reloaded = Engine::new(config)?;
    reloaded.add(Document::new_with_id("d2", "b"))?;
    reloaded.flush()?;
    assert!(matches!(
        Engine::open_at(&path, EngineConfig::default()),
        Err(LexstoreError::InvalidConfiguration(_))
    ));
    Ok(())
}
