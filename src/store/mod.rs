//! Persistence gateway: the corpus store seam, JSON snapshots, and the remote
//! object store they are synced to.
//!
//! - `remote`: object store backends and `sync_remote`.
//! - `snapshot`: JSON export/import of a corpus with sentinel conventions.
//!
//! The SQLite-backed [`CorpusStore`] lives in `crate::db`.

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{Corpus, CorpusId, DateReject, RunReport};

pub mod remote;
pub mod snapshot;

pub use remote::{sync_remote, FsBucket, HttpBucket, ObjectStore, RemoteError, SyncDirection};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("corpus {0} not found")]
    NotFound(CorpusId),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Durable home of every corpus between runs.
#[async_trait]
pub trait CorpusStore: Send + Sync {
    /// Fails with [`StoreError::NotFound`] when the corpus was never saved.
    async fn load(&self, corpus_id: &CorpusId) -> Result<Corpus, StoreError>;

    /// Replace the stored corpus with `corpus`, preserving its order.
    async fn save(&self, corpus_id: &CorpusId, corpus: &Corpus) -> Result<(), StoreError>;

    /// Keep listings whose post age could not be resolved.
    async fn record_rejects(&self, corpus_id: &CorpusId, rejects: &[DateReject]) -> Result<(), StoreError>;

    async fn record_run(&self, report: &RunReport) -> Result<(), StoreError>;
}

/// `load`, with a never-saved corpus read as empty.
pub async fn load_or_empty(store: &dyn CorpusStore, corpus_id: &CorpusId) -> Result<Corpus, StoreError> {
    match store.load(corpus_id).await {
        Ok(corpus) => Ok(corpus),
        Err(StoreError::NotFound(_)) => Ok(Corpus::new()),
        Err(err) => Err(err),
    }
}
