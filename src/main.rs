use anyhow::{bail, Result};
use chrono::{Local, NaiveDate};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

use job_harvester::config;
use job_harvester::db::SqliteCorpusStore;
use job_harvester::fetch::HttpFetcher;
use job_harvester::model::Query;
use job_harvester::pipeline::{CorpusLocks, Pipeline, RemoteSync, RunParams};
use job_harvester::store::remote;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Crawl job listings, resolve post dates and merge them into the stored corpus"
)]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Job title to search for; repeat for several runs
    #[arg(long = "job-title", required = true)]
    job_titles: Vec<String>,

    /// Location to search in
    #[arg(long)]
    location: String,

    /// Capture date post ages are resolved against (YYYY-MM-DD, default today)
    #[arg(long)]
    as_of: Option<NaiveDate>,

    /// Maximum number of result pages per run (overrides crawl.max_pages)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    max_pages: Option<u32>,

    /// Run all job titles at once instead of one after another
    #[arg(long)]
    concurrent: bool,

    /// Skip the remote upload even when `remote` is configured
    #[arg(long)]
    no_sync: bool,
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

    let store = SqliteCorpusStore::connect(&cfg.app.database_url()).await?;
    let fetcher = HttpFetcher::from_config(&cfg.crawl)?;
    let locks = CorpusLocks::new();

    let bucket = match (&cfg.remote, args.no_sync) {
        (Some(r), false) => Some((remote::from_config(r)?, r.prefix.clone())),
        _ => None,
    };

    let mut pipeline =
        Pipeline::new(&cfg, &fetcher, &store, &locks).with_snapshots(cfg.app.resolved_data_dir());
    if let Some((bucket, prefix)) = &bucket {
        pipeline = pipeline.with_remote(RemoteSync {
            store: bucket.as_ref(),
            prefix: prefix.clone(),
        });
    }

    let as_of = args.as_of.unwrap_or_else(|| Local::now().date_naive());
    let runs: Vec<RunParams> = args
        .job_titles
        .iter()
        .map(|title| RunParams {
            query: Query::new(title.clone(), args.location.clone()),
            as_of,
            max_pages: args.max_pages,
        })
        .collect();

    info!(runs = runs.len(), %as_of, concurrent = args.concurrent, "starting harvest");
    let run_delay = Duration::from_secs(cfg.crawl.run_delay_secs);
    let results = pipeline.run_all(runs, args.concurrent, run_delay).await;

    let mut failed = 0;
    for result in results {
        match result {
            Ok(report) => {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            Err(err) => {
                failed += 1;
                error!(?err, "run failed");
            }
        }
    }
    if failed > 0 {
        bail!("{} run(s) failed", failed);
    }
    Ok(())
}
