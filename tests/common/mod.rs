#![allow(dead_code)]

use async_trait::async_trait;
use job_harvester::config::{self, Config};
use job_harvester::db::SqliteCorpusStore;
use job_harvester::fetch::{Document, FetchError, PageSource};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const BASE: &str = "https://jobs.example.com/jobs";

/// Serves canned pages by URL and records every request.
#[derive(Clone, Default)]
pub struct FixtureSource {
    pages: Arc<Mutex<HashMap<String, Result<String, FetchError>>>>,
    fetched: Arc<Mutex<Vec<String>>>,
}

impl FixtureSource {
    pub async fn page(&self, url: &str, html: String) {
        self.pages.lock().await.insert(url.to_string(), Ok(html));
    }

    pub async fn fail(&self, url: &str, status: u16) {
        self.pages.lock().await.insert(
            url.to_string(),
            Err(FetchError::Status {
                url: url.to_string(),
                status,
            }),
        );
    }

    pub async fn fetched(&self) -> Vec<String> {
        self.fetched.lock().await.clone()
    }
}

#[async_trait]
impl PageSource for FixtureSource {
    async fn fetch(&self, url: &str) -> Result<Document, FetchError> {
        self.fetched.lock().await.push(url.to_string());
        match self.pages.lock().await.get(url).cloned() {
            Some(Ok(html)) => Document::parse(url, html),
            Some(Err(err)) => Err(err),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

/// URL of result page `n` (1-based) for data scientist / tx, given the
/// previous page reported `n - 1`.
pub fn page_url(n: u32) -> String {
    let first = format!("{BASE}?q=data+scientist&l=tx&sort=date");
    if n == 1 {
        first
    } else {
        format!("{first}&start={}", (n - 1) * 10)
    }
}

pub struct Card<'a> {
    pub title: &'a str,
    pub company: &'a str,
    pub age: &'a str,
    pub link: &'a str,
}

pub fn card(c: &Card<'_>) -> String {
    format!(
        r#"<div class="jobsearch-SerpJobCard">
             <h2 class="title"><a href="{link}">{title}</a></h2>
             <span class="company">{company}</span>
             <div class="location accessible-contrast-color-location">Austin, TX</div>
             <div class="summary">{title} at {company}</div>
             <span class="date">{age}</span>
           </div>"#,
        link = c.link,
        title = c.title,
        company = c.company,
        age = c.age,
    )
}

/// A results page reporting `reported` with `n` cards named `{prefix}-{i}`.
pub fn results_page(reported: u32, prefix: &str, n: usize, age: &str) -> String {
    let cards: String = (0..n)
        .map(|i| {
            let title = format!("{prefix}-{i}");
            let link = format!("/rc/clk?jk={prefix}{i}");
            card(&Card {
                title: &title,
                company: "Acme",
                age,
                link: &link,
            })
        })
        .collect();
    format!(
        r#"<html><head><title>Jobs</title></head><body>
           <div id="searchCountPages">Page {reported} of 500 jobs</div>
           <table><tr><td id="resultsCol">{cards}</td></tr></table>
           </body></html>"#
    )
}

pub fn detail_page(description: &str) -> String {
    format!(
        r#"<html><head><title>Job</title></head><body>
           <div id="jobDescriptionText">{description}</div></body></html>"#
    )
}

pub fn test_config(data_dir: &str) -> Config {
    let mut cfg: Config = serde_yaml::from_str(config::example()).unwrap();
    cfg.app.data_dir = data_dir.to_string();
    cfg.crawl.base_url = BASE.to_string();
    cfg.crawl.link_base = "https://jobs.example.com".to_string();
    cfg.crawl.page_delay_secs = 0;
    cfg.crawl.run_delay_secs = 0;
    cfg.crawl.fetch_descriptions = false;
    cfg.remote = None;
    cfg
}

pub async fn setup_store() -> SqliteCorpusStore {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    SqliteCorpusStore::new(pool)
}
