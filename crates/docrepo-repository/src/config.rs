use serde::{Deserialize, Serialize};

/// What batch operations do when handed zero items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyBatchPolicy {
    /// Complete with `Ok(true)` without touching the store.
    #[default]
    Accept,
    /// Complete with `RepositoryError::EmptyBatch`.
    Reject,
}

/// Per-repository settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Log every operation through `TracingLog`.
    pub debug: bool,
    pub empty_batch: EmptyBatchPolicy,
}
