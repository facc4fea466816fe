//! Acquisition-and-merge pipeline: crawl, resolve dates, merge, persist, sync.
use anyhow::{Context, Result};
use chrono::NaiveDate;
use futures::future::join_all;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{info, instrument, warn};

use crate::config::Config;
use crate::crawl::{CrawlOutcome, Crawler};
use crate::dates;
use crate::fetch::PageSource;
use crate::merge::merge;
use crate::model::{CorpusId, DateReject, Listing, Query, ResolvedListing, RunIssue, RunReport};
use crate::store::{self, snapshot, sync_remote, CorpusStore, ObjectStore, SyncDirection};

/// Parameters of one run; the surface a CLI fills in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunParams {
    pub query: Query,
    /// Capture date that post ages are resolved against.
    pub as_of: NaiveDate,
    /// Overrides `crawl.max_pages` when set.
    pub max_pages: Option<u32>,
}

/// One async mutex per corpus id, so merges into the same corpus run one at
/// a time while different corpora proceed independently.
#[derive(Debug, Default)]
pub struct CorpusLocks {
    inner: Mutex<HashMap<CorpusId, Arc<tokio::sync::Mutex<()>>>>,
}

impl CorpusLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock_for(&self, corpus_id: &CorpusId) -> Arc<tokio::sync::Mutex<()>> {
        let mut map = match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        map.entry(corpus_id.clone()).or_default().clone()
    }
}

/// Resolve every listing against `as_of`. Listings whose post age cannot be
/// resolved go to the reject list instead of failing the batch.
pub fn resolve_batch(listings: Vec<Listing>, as_of: NaiveDate) -> (Vec<ResolvedListing>, Vec<DateReject>) {
    let mut resolved = Vec::with_capacity(listings.len());
    let mut rejects = Vec::new();
    for listing in listings {
        let outcome = match listing.post_age.as_deref() {
            Some(age) => dates::resolve(age, as_of).map_err(|err| err.to_string()),
            None => Err("post age missing".to_string()),
        };
        match outcome {
            Ok(date) => resolved.push(listing.resolved(date)),
            Err(reason) => {
                warn!(post_age = ?listing.post_age, %reason, "skipping listing with unresolvable date");
                rejects.push(DateReject {
                    listing,
                    captured_on: as_of,
                    reason,
                });
            }
        }
    }
    (resolved, rejects)
}

/// Remote side of the persistence gateway.
pub struct RemoteSync<'a> {
    pub store: &'a dyn ObjectStore,
    pub prefix: String,
}

pub struct Pipeline<'a> {
    cfg: &'a Config,
    source: &'a dyn PageSource,
    store: &'a dyn CorpusStore,
    locks: &'a CorpusLocks,
    snapshot_dir: Option<PathBuf>,
    remote: Option<RemoteSync<'a>>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        cfg: &'a Config,
        source: &'a dyn PageSource,
        store: &'a dyn CorpusStore,
        locks: &'a CorpusLocks,
    ) -> Self {
        Self {
            cfg,
            source,
            store,
            locks,
            snapshot_dir: None,
            remote: None,
        }
    }

    /// Write a JSON snapshot into `dir` after every merge.
    pub fn with_snapshots(mut self, dir: impl Into<PathBuf>) -> Self {
        self.snapshot_dir = Some(dir.into());
        self
    }

    /// Upload each snapshot to `remote`. Needs `with_snapshots`.
    pub fn with_remote(mut self, remote: RemoteSync<'a>) -> Self {
        self.remote = Some(remote);
        self
    }

    #[instrument(skip_all, fields(job_title = %params.query.job_title, location = %params.query.location, as_of = %params.as_of))]
    pub async fn run(&self, params: RunParams) -> Result<RunReport> {
        let mut crawler = Crawler::from_config(self.source, self.cfg)?;
        if let Some(cap) = params.max_pages {
            crawler = crawler.with_page_cap(cap);
        }
        let outcome = crawler.run(params.query.clone()).await;
        self.absorb(outcome, params.as_of).await
    }

    /// Resolve, merge and persist a finished crawl.
    pub async fn absorb(&self, outcome: CrawlOutcome, as_of: NaiveDate) -> Result<RunReport> {
        let corpus_id = outcome.query.corpus_id();
        let mut report = RunReport {
            corpus_id: corpus_id.clone(),
            as_of,
            fetched_pages: outcome.pages_fetched,
            listings_found: outcome.listings.len(),
            net_new_after_merge: 0,
            aborted: outcome.aborted().is_some(),
            errors: Vec::new(),
        };
        if let Some(err) = outcome.aborted() {
            report.errors.push(RunIssue::Fetch {
                message: err.to_string(),
            });
            if !self.cfg.crawl.persist_partial {
                warn!(corpus = %corpus_id, "run aborted; partial batch discarded");
                self.store.record_run(&report).await?;
                return Ok(report);
            }
        }

        let (resolved, rejects) = resolve_batch(outcome.listings, as_of);
        report.errors.extend(rejects.iter().map(|r| RunIssue::DateParse {
            post_age: r.listing.post_age.clone().unwrap_or_default(),
            message: r.reason.clone(),
        }));

        let lock = self.locks.lock_for(&corpus_id);
        let _guard = lock.lock().await;

        let existing = store::load_or_empty(self.store, &corpus_id)
            .await
            .with_context(|| format!("failed to load corpus {}", corpus_id))?;
        let merged = merge(existing, resolved);
        report.net_new_after_merge = merged.net_new;
        self.store
            .save(&corpus_id, &merged.corpus)
            .await
            .with_context(|| format!("failed to save corpus {}", corpus_id))?;
        self.store.record_rejects(&corpus_id, &rejects).await?;

        if let Some(dir) = &self.snapshot_dir {
            let path = snapshot::snapshot_path(dir, &corpus_id, as_of);
            snapshot::write(&path, &merged.corpus)
                .await
                .with_context(|| format!("failed to write snapshot {}", path.display()))?;
            if let Some(remote) = &self.remote {
                let key = format!("{}{}", remote.prefix, snapshot::snapshot_name(&corpus_id, as_of));
                if let Err(err) = sync_remote(remote.store, &path, &key, SyncDirection::Upload).await {
                    report.errors.push(RunIssue::Remote {
                        message: err.to_string(),
                    });
                }
            }
        }

        self.store.record_run(&report).await?;
        info!(
            corpus = %corpus_id,
            pages = report.fetched_pages,
            found = report.listings_found,
            net_new = report.net_new_after_merge,
            corpus_size = merged.corpus.len(),
            errors = report.errors.len(),
            "run complete"
        );
        Ok(report)
    }

    /// Run several queries. Sequential runs wait `run_delay` between each
    /// other; concurrent runs share nothing but the store and its locks.
    pub async fn run_all(
        &self,
        runs: Vec<RunParams>,
        concurrent: bool,
        run_delay: Duration,
    ) -> Vec<Result<RunReport>> {
        if concurrent {
            return join_all(runs.into_iter().map(|p| self.run(p))).await;
        }
        let mut reports = Vec::with_capacity(runs.len());
        let total = runs.len();
        for (i, params) in runs.into_iter().enumerate() {
            reports.push(self.run(params).await);
            if i + 1 < total && !run_delay.is_zero() {
                info!(delay_secs = run_delay.as_secs(), "waiting before next run");
                tokio::time::sleep(run_delay).await;
            }
        }
        reports
    }
}
