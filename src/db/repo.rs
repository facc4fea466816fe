use super::model::{ListingRow, RejectRow, RunRow};
use crate::model::{Corpus, CorpusId, DateReject, ListingRecord, ResolvedListing, RunReport};
use crate::model::{SENTINEL_ERROR, SENTINEL_MISSING};
use crate::store::{CorpusStore, StoreError};
use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::{info, instrument, warn};
use uuid::Uuid;

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<Pool, StoreError> {
    let normalized = prepare_sqlite_url(database_url);
    let pool = SqlitePool::connect(&normalized).await?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

/// If using a file-backed SQLite URL, expand a leading `~/`, ensure the parent
/// directory exists and ask SQLite to create the file. Leaves in-memory URLs
/// untouched.
fn prepare_sqlite_url(url: &str) -> String {
    if !url.starts_with("sqlite:") || url.starts_with("sqlite::memory") {
        return url.to_string();
    }

    let rest = &url["sqlite:".len()..];
    let path_with_query = rest.strip_prefix("//").unwrap_or(rest);
    let (path_part, query_part) = match path_with_query.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path_with_query, None),
    };
    if path_part.is_empty() {
        return url.to_string();
    }

    let expanded_path = match (path_part.strip_prefix("~/"), std::env::var("HOME")) {
        (Some(rest), Ok(home)) => format!("{}/{}", home.trim_end_matches('/'), rest),
        _ => path_part.to_string(),
    };

    if let Some(parent) = std::path::Path::new(&expanded_path).parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(err) = std::fs::create_dir_all(parent) {
                warn!(%err, dir = %parent.display(), "failed to create database directory");
            }
        }
    }

    let query = match query_part {
        Some(q) if q.contains("mode=") => q.to_string(),
        Some(q) => format!("{}&mode=rwc", q),
        None => "mode=rwc".to_string(),
    };
    format!("sqlite://{}?{}", expanded_path, query)
}

pub async fn run_migrations(pool: &Pool) -> Result<(), StoreError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// [`CorpusStore`] over SQLite. Each corpus is a set of rows in `listings`
/// ordered by `position`.
#[derive(Debug, Clone)]
pub struct SqliteCorpusStore {
    pool: Pool,
}

impl SqliteCorpusStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    /// Open the database at `database_url` and bring its schema up to date.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = init_pool(database_url).await?;
        run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

#[async_trait]
impl CorpusStore for SqliteCorpusStore {
    #[instrument(skip_all, fields(corpus = %corpus_id))]
    async fn load(&self, corpus_id: &CorpusId) -> Result<Corpus, StoreError> {
        let known: Option<String> =
            sqlx::query_scalar("SELECT corpus_id FROM corpora WHERE corpus_id = ?")
                .bind(corpus_id.as_str())
                .fetch_optional(&self.pool)
                .await?;
        if known.is_none() {
            return Err(StoreError::NotFound(corpus_id.clone()));
        }

        let rows: Vec<ListingRow> = sqlx::query_as(
            "SELECT position, date, title, location, company, company_rating, post_age, job_link, job_description \
             FROM listings WHERE corpus_id = ? ORDER BY position ASC",
        )
        .bind(corpus_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        info!(entries = rows.len(), "corpus loaded");
        Ok(Corpus::from_entries(
            rows.into_iter().map(ResolvedListing::from).collect(),
        ))
    }

    #[instrument(skip_all, fields(corpus = %corpus_id, entries = corpus.len()))]
    async fn save(&self, corpus_id: &CorpusId, corpus: &Corpus) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO corpora (corpus_id, updated_at) VALUES (?, CURRENT_TIMESTAMP) \
             ON CONFLICT(corpus_id) DO UPDATE SET updated_at = CURRENT_TIMESTAMP",
        )
        .bind(corpus_id.as_str())
        .execute(&mut *tx)
        .await?;
        sqlx::query("DELETE FROM listings WHERE corpus_id = ?")
            .bind(corpus_id.as_str())
            .execute(&mut *tx)
            .await?;
        for (position, entry) in corpus.iter().enumerate() {
            let r = ListingRecord::from(entry);
            sqlx::query(
                "INSERT INTO listings (corpus_id, position, date, title, location, company, company_rating, post_age, job_link, job_description) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(corpus_id.as_str())
            .bind(position as i64)
            .bind(r.date)
            .bind(&r.title)
            .bind(&r.location)
            .bind(&r.company)
            .bind(&r.company_rating)
            .bind(&r.post_age)
            .bind(&r.job_link)
            .bind(&r.job_description)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        info!("corpus saved");
        Ok(())
    }

    #[instrument(skip_all, fields(corpus = %corpus_id, rejects = rejects.len()))]
    async fn record_rejects(&self, corpus_id: &CorpusId, rejects: &[DateReject]) -> Result<(), StoreError> {
        if rejects.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for reject in rejects {
            let l = &reject.listing;
            let or_error = |v: &Option<String>| v.clone().unwrap_or_else(|| SENTINEL_ERROR.into());
            sqlx::query(
                "INSERT INTO date_rejects (corpus_id, captured_on, post_age, title, location, company, company_rating, job_link, job_description, reason) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(corpus_id.as_str())
            .bind(reject.captured_on)
            .bind(or_error(&l.post_age))
            .bind(or_error(&l.title))
            .bind(or_error(&l.location))
            .bind(or_error(&l.company))
            .bind(l.company_rating.clone().unwrap_or_else(|| SENTINEL_MISSING.into()))
            .bind(or_error(&l.job_link))
            .bind(or_error(&l.job_description))
            .bind(&reject.reason)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    #[instrument(skip_all, fields(corpus = %report.corpus_id))]
    async fn record_run(&self, report: &RunReport) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO runs (id, corpus_id, as_of, pages_fetched, listings_found, net_new, error_count, aborted) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(report.corpus_id.as_str())
        .bind(report.as_of)
        .bind(report.fetched_pages as i64)
        .bind(report.listings_found as i64)
        .bind(report.net_new_after_merge as i64)
        .bind(report.errors.len() as i64)
        .bind(report.aborted)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

/// Every saved corpus id, sorted.
pub async fn list_corpora(pool: &Pool) -> Result<Vec<CorpusId>, StoreError> {
    let ids: Vec<String> = sqlx::query_scalar("SELECT corpus_id FROM corpora ORDER BY corpus_id")
        .fetch_all(pool)
        .await?;
    Ok(ids.into_iter().map(CorpusId::new).collect())
}

/// Most recent runs of a corpus, newest first.
pub async fn recent_runs(pool: &Pool, corpus_id: &CorpusId, limit: i64) -> Result<Vec<RunRow>, StoreError> {
    let rows = sqlx::query_as::<_, RunRow>(
        "SELECT id, corpus_id, as_of, pages_fetched, listings_found, net_new, error_count, aborted \
         FROM runs WHERE corpus_id = ? ORDER BY created_at DESC, rowid DESC LIMIT ?",
    )
    .bind(corpus_id.as_str())
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Rejected listings of a corpus, oldest first.
pub async fn list_rejects(pool: &Pool, corpus_id: &CorpusId) -> Result<Vec<DateReject>, StoreError> {
    let rows = sqlx::query_as::<_, RejectRow>(
        "SELECT captured_on, post_age, title, location, company, company_rating, job_link, job_description, reason \
         FROM date_rejects WHERE corpus_id = ? ORDER BY id ASC",
    )
    .bind(corpus_id.as_str())
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(DateReject::from).collect())
}

pub async fn count_rejects(pool: &Pool, corpus_id: &CorpusId) -> Result<i64, StoreError> {
    let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM date_rejects WHERE corpus_id = ?")
        .bind(corpus_id.as_str())
        .fetch_one(pool)
        .await?;
    Ok(n)
}
