//! Load manifests: the JSON documents telling the warehouse which uploaded
//! objects each COPY batch covers.

use std::fmt;

use serde::Serialize;

/// One object reference inside a load manifest. Entries are always
/// mandatory so a missing object fails the load instead of silently
/// shrinking it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
    pub url: String,
    pub mandatory: bool,
}

/// A manifest document in the warehouse's native format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Manifest {
    pub entries: Vec<ManifestEntry>,
}

/// One load batch: the manifest document plus the key it will be stored
/// under, covering the half-open index range `start..end` of the uploaded
/// chunk keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestBatch {
    pub manifest_key: String,
    pub manifest: Manifest,
    pub start: usize,
    pub end: usize,
}

/// Token naming one copy run, embedded in manifest keys so concurrent runs
/// under the same prefix cannot collide.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunToken(String);

impl RunToken {
    pub fn generate() -> Self {
        let stamp = chrono::Utc::now().format("%Y-%m-%d_%H%M%S");
        let id = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("{stamp}_{}", &id[..8]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Partition `keys` into contiguous batches of at most `max_keys` entries,
/// preserving input order, and build a manifest for each. `None` puts
/// everything into a single batch; no keys means no batches.
pub fn build_batches(
    bucket: &str,
    key_prefix: &str,
    run: &RunToken,
    keys: &[String],
    max_keys: Option<usize>,
) -> Vec<ManifestBatch> {
    if keys.is_empty() {
        return Vec::new();
    }
    let bound = max_keys.unwrap_or(keys.len()).max(1);

    let mut batches = Vec::new();
    let mut start = 0;
    while start < keys.len() {
        let end = (start + bound).min(keys.len());
        let entries = keys[start..end]
            .iter()
            .map(|key| ManifestEntry {
                url: object_url(bucket, key),
                mandatory: true,
            })
            .collect();
        batches.push(ManifestBatch {
            manifest_key: format!("{key_prefix}{run}_{start}-{end}.manifest"),
            manifest: Manifest { entries },
            start,
            end,
        });
        start = end;
    }
    batches
}

/// `s3://` URL of an object in `bucket`.
pub fn object_url(bucket: &str, key: &str) -> String {
    format!("s3://{}/{}", bucket, key.trim_start_matches('/'))
}
