use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::info;

use job_harvester::config;
use job_harvester::db::{self, SqliteCorpusStore};
use job_harvester::model::{CorpusId, Query};
use job_harvester::store::{self, remote, snapshot, sync_remote, SyncDirection};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Action {
    /// Write the stored corpus to a JSON snapshot in data_dir
    Export,
    /// Export, then upload the snapshot to the remote store
    Upload,
    /// Download a snapshot from the remote store into data_dir
    Download,
    /// Print every stored corpus id with its size
    List,
}

#[derive(Debug, Parser)]
#[command(author, version, about = "Export corpus snapshots and sync them with the remote store")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[arg(value_enum)]
    action: Action,

    /// Corpus id, e.g. data-scientist_tx
    #[arg(long, conflicts_with = "job_title")]
    corpus: Option<String>,

    /// Derive the corpus id from a job title (needs --location)
    #[arg(long, requires = "location")]
    job_title: Option<String>,

    #[arg(long)]
    location: Option<String>,

    /// Snapshot date used in the file name (YYYY-MM-DD, default today)
    #[arg(long)]
    as_of: Option<NaiveDate>,
}

impl Args {
    fn corpus_id(&self) -> Result<CorpusId> {
        match (&self.corpus, &self.job_title, &self.location) {
            (Some(id), _, _) => Ok(CorpusId::new(id.clone())),
            (None, Some(title), Some(location)) => Ok(Query::new(title.clone(), location.clone()).corpus_id()),
            _ => bail!("pass --corpus or --job-title with --location"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let args = Args::parse();
    let cfg = config::load(Some(&args.config))?;
    cfg.ensure_dirs()?;
    let data_dir = PathBuf::from(cfg.app.resolved_data_dir());
    let as_of = args.as_of.unwrap_or_else(|| Local::now().date_naive());

    let store = SqliteCorpusStore::connect(&cfg.app.database_url()).await?;

    if let Action::List = args.action {
        for id in db::list_corpora(store.pool()).await? {
            let corpus = store::load_or_empty(&store, &id).await?;
            println!("{}\t{}", id, corpus.len());
        }
        return Ok(());
    }

    let corpus_id = args.corpus_id()?;
    let path = snapshot::snapshot_path(&data_dir, &corpus_id, as_of);
    let key = |prefix: &str| format!("{}{}", prefix, snapshot::snapshot_name(&corpus_id, as_of));

    match args.action {
        Action::Export | Action::Upload => {
            let corpus = store::CorpusStore::load(&store, &corpus_id)
                .await
                .with_context(|| format!("cannot export corpus {}", corpus_id))?;
            snapshot::write(&path, &corpus).await?;
            info!(path = %path.display(), entries = corpus.len(), "snapshot exported");
            if let Action::Upload = args.action {
                let Some(r) = &cfg.remote else {
                    bail!("no `remote` section in config");
                };
                let bucket = remote::from_config(r)?;
                sync_remote(bucket.as_ref(), &path, &key(&r.prefix), SyncDirection::Upload).await?;
            }
        }
        Action::Download => {
            let Some(r) = &cfg.remote else {
                bail!("no `remote` section in config");
            };
            let bucket = remote::from_config(r)?;
            sync_remote(bucket.as_ref(), &path, &key(&r.prefix), SyncDirection::Download).await?;
            let corpus = snapshot::read(&path).await?;
            info!(path = %path.display(), entries = corpus.len(), "snapshot downloaded");
        }
        Action::List => {}
    }
    Ok(())
}
