use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use job_harvester::config;
use job_harvester::db::SqliteCorpusStore;
use job_harvester::model::{CorpusId, Query};
use job_harvester::store::CorpusStore;
use job_harvester::terms::top_skills;

#[derive(Debug, Parser)]
#[command(author, version, about = "Rank skills by how often stored job descriptions mention them")]
struct Args {
    /// Path to YAML config file
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    #[arg(long)]
    job_title: String,

    #[arg(long)]
    location: String,

    /// File with one skill per line
    #[arg(long)]
    library: PathBuf,

    /// Number of skills to print
    #[arg(short, long, default_value = "10")]
    k: usize,
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

    let library: Vec<String> = tokio::fs::read_to_string(&args.library)
        .await
        .with_context(|| format!("failed to read {}", args.library.display()))?
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect();

    let store = SqliteCorpusStore::connect(&cfg.app.database_url()).await?;
    let corpus_id: CorpusId = Query::new(args.job_title, args.location).corpus_id();
    let corpus = store.load(&corpus_id).await?;

    println!("top{}_skills\tfrequency", args.k);
    for (skill, n) in top_skills(&corpus, &library, args.k) {
        println!("{}\t{}", skill, n);
    }
    Ok(())
}
