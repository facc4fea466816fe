use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{info, instrument};

use super::StoreError;
use crate::model::{Corpus, CorpusId, ListingRecord, ResolvedListing};

/// `{data_dir}/{corpus_id}_{MMDDYYYY}.json`
pub fn snapshot_path(data_dir: &Path, corpus_id: &CorpusId, as_of: NaiveDate) -> PathBuf {
    data_dir.join(snapshot_name(corpus_id, as_of))
}

pub fn snapshot_name(corpus_id: &CorpusId, as_of: NaiveDate) -> String {
    format!("{}_{}.json", corpus_id, as_of.format("%m%d%Y"))
}

pub fn to_json(corpus: &Corpus) -> Result<String, StoreError> {
    let records: Vec<ListingRecord> = corpus.iter().map(ListingRecord::from).collect();
    Ok(serde_json::to_string_pretty(&records)?)
}

pub fn from_json(json: &str) -> Result<Corpus, StoreError> {
    let records: Vec<ListingRecord> = serde_json::from_str(json)?;
    Ok(Corpus::from_entries(
        records.into_iter().map(ResolvedListing::from).collect(),
    ))
}

#[instrument(skip_all, fields(path = %path.display()))]
pub async fn write(path: &Path, corpus: &Corpus) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    fs::write(path, to_json(corpus)?).await?;
    info!(entries = corpus.len(), "snapshot written");
    Ok(())
}

pub async fn read(path: &Path) -> Result<Corpus, StoreError> {
    let json = fs::read_to_string(path).await?;
    from_json(&json)
}
