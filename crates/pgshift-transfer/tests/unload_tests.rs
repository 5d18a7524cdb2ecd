//! Integration tests for `unload_table`: column introspection driving the
//! generated UNLOAD statement, and the missing-table precondition.

mod common;

use std::sync::Arc;

use common::{MemoryStore, ScriptedWarehouse, StaticSource};
use pgshift_common::{PgShiftError, RedshiftCredentials};
use pgshift_transfer::{TransferPipeline, UnloadOptions};

fn pipeline(warehouse: Arc<ScriptedWarehouse>, store: Arc<MemoryStore>) -> TransferPipeline {
    TransferPipeline::new(
        Arc::new(StaticSource::from_lines(&[])),
        warehouse,
        store,
        RedshiftCredentials::keys_with_token("access_key", "secret_key", "security_token"),
    )
}

#[tokio::test]
async fn test_unload_builds_per_column_json_casing() {
    let warehouse = Arc::new(
        ScriptedWarehouse::new(&["foo_table"]).with_columns(
            "foo_table",
            &[
                ("foo", "boolean"),
                ("bar", "numeric"),
                ("baz", "character varying"),
            ],
        ),
    );
    let store = Arc::new(MemoryStore::new());
    let pipeline = pipeline(warehouse.clone(), store);

    let options = UnloadOptions::new("foo_table", "tmp/tests");
    pipeline.unload_table(&options).await.unwrap();

    let transactions = warehouse.transactions();
    assert_eq!(transactions.len(), 1);
    assert_eq!(transactions[0].len(), 1);
    let statement = &transactions[0][0];

    // Column casing in table order inside the dollar-quoted select.
    assert!(statement.starts_with(r#"UNLOAD ($$SELECT '{' || CASE WHEN "foo" IS NULL"#));
    assert!(statement.contains(r#"WHEN "foo" THEN '"foo": true'"#));
    assert!(statement.contains(r#"ELSE '"bar": ' || "bar""#));
    assert!(statement.contains(r#"REPLACE("baz", '\\', '\\\\')"#));
    assert!(statement.contains("FROM foo_table$$)"));

    // Destination, credentials, and options.
    assert!(statement.contains("TO 's3://transfer-test/tmp/tests/foo_table/'"));
    assert!(statement.contains(
        "CREDENTIALS 'aws_access_key_id=access_key;\
         aws_secret_access_key=secret_key;token=security_token'"
    ));
    assert!(statement.ends_with("MANIFEST GZIP ALLOWOVERWRITE"));
}

#[tokio::test]
async fn test_unload_missing_table_runs_nothing() {
    let warehouse = Arc::new(ScriptedWarehouse::new(&["foo_table"]));
    let store = Arc::new(MemoryStore::new());
    let pipeline = pipeline(warehouse.clone(), store);

    let options = UnloadOptions::new("other_table", "tmp/tests");
    let error = pipeline.unload_table(&options).await.unwrap_err();

    assert!(matches!(error, PgShiftError::TargetNotFound(_)));
    assert!(warehouse.transactions().is_empty());
}
