//! Common test doubles for transfer pipeline integration tests.
//!
//! The pipeline's collaborators are all trait objects, so the tests here run
//! hermetically against in-memory fakes:
//!
//! - `MemoryStore`: object store recording puts and deletes in order
//! - `ScriptedWarehouse`: canned table metadata plus recorded transactions,
//!   with optional failure injection at a chosen transaction
//! - `StaticSource`: record source replaying a fixed byte-chunk sequence

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::sync::Mutex;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;

use pgshift_common::{PgShiftError, Result};
use pgshift_transfer::source::{RecordSource, SourceQuery};
use pgshift_transfer::storage::ObjectStore;
use pgshift_transfer::warehouse::{ColumnInfo, Warehouse};

pub const TEST_BUCKET: &str = "transfer-test";

// ============================================================================
// Object Store
// ============================================================================

/// In-memory object store recording every put and delete in call order.
pub struct MemoryStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    puts: Mutex<Vec<String>>,
    deletes: Mutex<Vec<String>>,
    fail_on_put: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(BTreeMap::new()),
            puts: Mutex::new(Vec::new()),
            deletes: Mutex::new(Vec::new()),
            fail_on_put: None,
        }
    }

    /// Fail the `n`th put (1-based) with an upload error.
    pub fn failing_on_put(n: usize) -> Self {
        Self {
            fail_on_put: Some(n),
            ..Self::new()
        }
    }

    /// Current object content, if the key exists.
    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(key).cloned()
    }

    /// Keys currently present, in lexicographic order.
    pub fn stored_keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    /// Keys in the order they were put, including later-deleted ones.
    pub fn put_order(&self) -> Vec<String> {
        self.puts.lock().unwrap().clone()
    }

    /// Keys in the order they were deleted.
    pub fn deleted_keys(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn bucket(&self) -> &str {
        TEST_BUCKET
    }

    async fn put_object(&self, key: &str, data: Vec<u8>) -> Result<()> {
        let mut puts = self.puts.lock().unwrap();
        if self.fail_on_put == Some(puts.len() + 1) {
            return Err(PgShiftError::upload(key, "injected put failure"));
        }
        puts.push(key.to_string());
        self.objects.lock().unwrap().insert(key.to_string(), data);
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> Result<()> {
        self.deletes.lock().unwrap().push(key.to_string());
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }
}

// ============================================================================
// Warehouse
// ============================================================================

/// Scripted warehouse: fixed table metadata, recorded transactions, optional
/// failure injection.
pub struct ScriptedWarehouse {
    existing_tables: Vec<String>,
    columns: HashMap<String, Vec<ColumnInfo>>,
    transactions: Mutex<Vec<Vec<String>>>,
    fail_on_transaction: Option<usize>,
}

impl ScriptedWarehouse {
    pub fn new(existing_tables: &[&str]) -> Self {
        Self {
            existing_tables: existing_tables.iter().map(|t| t.to_string()).collect(),
            columns: HashMap::new(),
            transactions: Mutex::new(Vec::new()),
            fail_on_transaction: None,
        }
    }

    /// Fail the `n`th transaction (1-based) with a database error.
    pub fn failing_on_transaction(existing_tables: &[&str], n: usize) -> Self {
        Self {
            fail_on_transaction: Some(n),
            ..Self::new(existing_tables)
        }
    }

    pub fn with_columns(mut self, table: &str, columns: &[(&str, &str)]) -> Self {
        self.columns.insert(
            table.to_string(),
            columns
                .iter()
                .map(|(name, data_type)| ColumnInfo {
                    name: name.to_string(),
                    data_type: data_type.to_string(),
                })
                .collect(),
        );
        self
    }

    /// Every committed transaction, as the statement lists handed over.
    pub fn transactions(&self) -> Vec<Vec<String>> {
        self.transactions.lock().unwrap().clone()
    }
}

#[async_trait]
impl Warehouse for ScriptedWarehouse {
    async fn table_exists(&self, table: &str) -> Result<bool> {
        Ok(self.existing_tables.iter().any(|t| t == table))
    }

    async fn table_columns(&self, table: &str) -> Result<Vec<ColumnInfo>> {
        Ok(self.columns.get(table).cloned().unwrap_or_default())
    }

    async fn execute_in_transaction(&self, statements: &[String]) -> Result<()> {
        let mut transactions = self.transactions.lock().unwrap();
        if self.fail_on_transaction == Some(transactions.len() + 1) {
            return Err(PgShiftError::database("injected transaction failure"));
        }
        transactions.push(statements.to_vec());
        Ok(())
    }
}

// ============================================================================
// Record Source
// ============================================================================

/// Record source replaying a fixed sequence of byte chunks, with an optional
/// trailing error to simulate a stream dying mid-extraction.
pub struct StaticSource {
    chunks: Vec<std::result::Result<Vec<u8>, String>>,
    calls: Mutex<usize>,
}

impl StaticSource {
    pub fn new(chunks: Vec<std::result::Result<Vec<u8>, String>>) -> Self {
        Self {
            chunks,
            calls: Mutex::new(0),
        }
    }

    /// One newline-terminated record per input line, delivered as a single
    /// chunk.
    pub fn from_lines(lines: &[&str]) -> Self {
        let mut bytes = Vec::new();
        for line in lines {
            bytes.extend_from_slice(line.as_bytes());
            bytes.push(b'\n');
        }
        Self::new(vec![Ok(bytes)])
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl RecordSource for StaticSource {
    async fn stream_json_rows(
        &self,
        _query: &SourceQuery,
    ) -> Result<BoxStream<'static, Result<Vec<u8>>>> {
        *self.calls.lock().unwrap() += 1;
        let items: Vec<Result<Vec<u8>>> = self
            .chunks
            .iter()
            .map(|chunk| match chunk {
                Ok(bytes) => Ok(bytes.clone()),
                Err(message) => Err(PgShiftError::extraction(message.clone())),
            })
            .collect();
        Ok(futures::stream::iter(items).boxed())
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Decompress one gzip object into its line records.
pub fn gunzip_lines(data: &[u8]) -> Vec<String> {
    let mut decoder = flate2::read::GzDecoder::new(data);
    let mut text = String::new();
    decoder.read_to_string(&mut text).unwrap();
    text.lines().map(|line| line.to_string()).collect()
}

/// Formatting-insensitive SQL comparison key.
pub fn clean_sql(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}
