//! Integration tests for the streaming extraction path of `copy_table`:
//! line reassembly across arbitrary stream slices, wire-format escape
//! normalization, and failure behavior of a dying source stream.

mod common;

use std::sync::Arc;

use common::{gunzip_lines, MemoryStore, ScriptedWarehouse, StaticSource};
use pgshift_common::{PgShiftError, RedshiftCredentials};
use pgshift_transfer::{CopyOptions, TransferPipeline};

fn pipeline(
    source: Arc<StaticSource>,
    warehouse: Arc<ScriptedWarehouse>,
    store: Arc<MemoryStore>,
) -> TransferPipeline {
    TransferPipeline::new(
        source,
        warehouse,
        store,
        RedshiftCredentials::iam_role("123456789012", "loader"),
    )
}

#[tokio::test]
async fn test_copy_table_reassembles_lines_and_normalizes_escapes() {
    let warehouse = Arc::new(ScriptedWarehouse::new(&["analytics.events"]));
    let store = Arc::new(MemoryStore::new());

    // Two records split mid-line across stream slices, the second carrying
    // the wire format's doubled backslash ahead of each quote.
    let source = Arc::new(StaticSource::new(vec![
        Ok(br#"{"id": 1, "note": "plain"}
{"id": 2, "no"#
            .to_vec()),
        Ok(br#"te": "say \\"hi\\""}
"#
        .to_vec()),
    ]));
    let pipeline = pipeline(source, warehouse.clone(), store.clone());

    let options = CopyOptions::new("analytics.events", "loads/events").from_table("events");
    let report = pipeline.copy_table(&options).await.unwrap();

    assert_eq!(report.records, 2);
    assert_eq!(report.chunk_files, 1);
    assert_eq!(report.batches, 1);

    let lines = gunzip_lines(&store.object("loads/events/chunk_00000.gz").unwrap());
    assert_eq!(lines[0], r#"{"id": 1, "note": "plain"}"#);
    assert_eq!(lines[1], r#"{"id": 2, "note": "say \"hi\""}"#);
    // The normalized record is valid JSON again.
    let value: serde_json::Value = serde_json::from_str(&lines[1]).unwrap();
    assert_eq!(value["note"], "say \"hi\"");

    assert_eq!(warehouse.transactions().len(), 1);
}

#[tokio::test]
async fn test_copy_table_keeps_an_unterminated_final_record() {
    let warehouse = Arc::new(ScriptedWarehouse::new(&["analytics.events"]));
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(StaticSource::new(vec![Ok(
        b"{\"a\":1}\n{\"a\":2}".to_vec()
    )]));
    let pipeline = pipeline(source, warehouse, store.clone());

    let options = CopyOptions::new("analytics.events", "loads/events").from_table("events");
    let report = pipeline.copy_table(&options).await.unwrap();

    assert_eq!(report.records, 2);
    let lines = gunzip_lines(&store.object("loads/events/chunk_00000.gz").unwrap());
    assert_eq!(lines, vec![r#"{"a":1}"#, r#"{"a":2}"#]);
}

#[tokio::test]
async fn test_copy_table_requires_exactly_one_source() {
    let warehouse = Arc::new(ScriptedWarehouse::new(&["analytics.events"]));
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(StaticSource::from_lines(&["{}"]));
    let pipeline = pipeline(source.clone(), warehouse, store.clone());

    let neither = CopyOptions::new("analytics.events", "loads/events");
    let error = pipeline.copy_table(&neither).await.unwrap_err();
    assert!(matches!(error, PgShiftError::Configuration(_)));

    let both = CopyOptions::new("analytics.events", "loads/events")
        .from_table("events")
        .from_select("SELECT 1");
    let error = pipeline.copy_table(&both).await.unwrap_err();
    assert!(matches!(error, PgShiftError::Configuration(_)));

    // Invalid options never reached the source or the store.
    assert_eq!(source.call_count(), 0);
    assert!(store.put_order().is_empty());
}

#[tokio::test]
async fn test_copy_table_missing_target_fails_before_extraction() {
    let warehouse = Arc::new(ScriptedWarehouse::new(&[]));
    let store = Arc::new(MemoryStore::new());
    let source = Arc::new(StaticSource::from_lines(&["{}"]));
    let pipeline = pipeline(source.clone(), warehouse, store.clone());

    let scratch_parent = tempfile::tempdir().unwrap();
    let options = CopyOptions::new("analytics.events", "loads/events")
        .from_table("events")
        .scratch_dir(scratch_parent.path());
    let error = pipeline.copy_table(&options).await.unwrap_err();

    assert!(matches!(error, PgShiftError::TargetNotFound(_)));
    assert_eq!(source.call_count(), 0);
    assert!(store.put_order().is_empty());
    assert_eq!(
        std::fs::read_dir(scratch_parent.path()).unwrap().count(),
        0
    );
}

#[tokio::test]
async fn test_stream_failure_cleans_uploaded_chunks() {
    let warehouse = Arc::new(ScriptedWarehouse::new(&["analytics.events"]));
    let store = Arc::new(MemoryStore::new());

    // The first chunk file fills and uploads before the stream dies.
    let source = Arc::new(StaticSource::new(vec![
        Ok(b"{\"a\":1}\n{\"a\":2}\n".to_vec()),
        Err("connection reset".to_string()),
    ]));
    let pipeline = pipeline(source, warehouse.clone(), store.clone());

    let options = CopyOptions::new("analytics.events", "loads/events")
        .from_table("events")
        .max_chunk_bytes(8);
    let error = pipeline.copy_table(&options).await.unwrap_err();

    match &error {
        PgShiftError::Extraction(message) => assert!(message.contains("connection reset")),
        other => panic!("expected extraction error, got {other:?}"),
    }

    // The finalized first chunk was uploaded, then cleaned back out; no load
    // ever ran.
    assert_eq!(store.put_order(), vec!["loads/events/chunk_00000.gz"]);
    assert_eq!(store.deleted_keys(), vec!["loads/events/chunk_00000.gz"]);
    assert!(store.stored_keys().is_empty());
    assert!(warehouse.transactions().is_empty());
}
