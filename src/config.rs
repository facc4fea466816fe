//! Configuration loader and validator for the job harvester.
use scraper::Selector;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML parse error: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Root configuration struct mirroring the YAML schema.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    pub app: App,
    #[serde(default)]
    pub crawl: Crawl,
    #[serde(default)]
    pub selectors: Selectors,
    #[serde(default)]
    pub remote: Option<Remote>,
}

/// App-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct App {
    pub data_dir: String,
    #[serde(default)]
    pub database_url: Option<String>,
}

impl App {
    /// Expand a leading `~/` in `data_dir`.
    pub fn resolved_data_dir(&self) -> String {
        match self.data_dir.strip_prefix("~/") {
            Some(rest) => match std::env::var("HOME") {
                Ok(home) => format!("{}/{}", home.trim_end_matches('/'), rest),
                Err(_) => self.data_dir.clone(),
            },
            None => self.data_dir.clone(),
        }
    }

    /// `DATABASE_URL` wins, then `app.database_url`, then a file in `data_dir`.
    pub fn database_url(&self) -> String {
        std::env::var("DATABASE_URL")
            .ok()
            .or_else(|| self.database_url.clone())
            .unwrap_or_else(|| format!("sqlite://{}/corpus.db", self.resolved_data_dir()))
    }
}

/// Which signal keeps the paginator going.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Continuation {
    /// Continue while the source's reported page count equals the local page index.
    #[default]
    ReportedCount,
    /// Continue while each page yields at least one listing not seen earlier in the run.
    NewListings,
}

/// Crawl behaviour and politeness.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Crawl {
    pub base_url: String,
    pub link_base: String,
    pub page_delay_secs: u64,
    pub run_delay_secs: u64,
    pub request_timeout_secs: u64,
    pub max_pages: u32,
    pub user_agent: String,
    pub fetch_descriptions: bool,
    pub continuation: Continuation,
    pub persist_partial: bool,
}

impl Default for Crawl {
    fn default() -> Self {
        Self {
            base_url: "https://www.indeed.com/jobs".into(),
            link_base: "https://www.indeed.com".into(),
            page_delay_secs: 5,
            run_delay_secs: 180,
            request_timeout_secs: 30,
            max_pages: 35,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) job-harvester/0.1".into(),
            fetch_descriptions: true,
            continuation: Continuation::ReportedCount,
            persist_partial: true,
        }
    }
}

/// CSS selectors for the result and detail pages. These track the source's
/// markup version and are expected to change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Selectors {
    pub page_count: String,
    pub results: String,
    pub card: String,
    pub title: String,
    pub company: String,
    pub location: String,
    pub location_fallback: String,
    pub rating: String,
    pub post_age: String,
    pub link: String,
    pub summary: String,
    pub description: String,
}

impl Default for Selectors {
    fn default() -> Self {
        Self {
            page_count: "div#searchCountPages".into(),
            results: "td#resultsCol".into(),
            card: "div.jobsearch-SerpJobCard".into(),
            title: "h2.title".into(),
            company: "span.company".into(),
            location: "div.location.accessible-contrast-color-location".into(),
            location_fallback: "span.location.accessible-contrast-color-location".into(),
            rating: "span.ratingsContent".into(),
            post_age: "span.date".into(),
            link: "a".into(),
            summary: "div.summary".into(),
            description: "div#jobDescriptionText".into(),
        }
    }
}

/// Backend of the remote object store.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RemoteKind {
    Fs,
    Http,
}

/// Remote object store settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Remote {
    pub kind: RemoteKind,
    pub location: String,
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub token: Option<String>,
}

impl Config {
    /// Ensure required directories exist (creates `app.data_dir` if missing).
    pub fn ensure_dirs(&self) -> Result<(), std::io::Error> {
        if self.app.data_dir.trim().is_empty() {
            return Ok(());
        }
        fs::create_dir_all(self.app.resolved_data_dir())
    }
}

/// Load configuration from a YAML file and validate it.
/// - If `path` is None, uses `config.yaml` in the current working directory.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new("config.yaml"));
    let content = fs::read_to_string(path)?;
    let cfg: Config = serde_yaml::from_str(&content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Validate a configuration instance.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.app.data_dir.trim().is_empty() {
        return Err(ConfigError::Invalid("app.data_dir must be non-empty"));
    }

    let c = &cfg.crawl;
    if reqwest::Url::parse(&c.base_url).is_err() {
        return Err(ConfigError::Invalid("crawl.base_url must be an absolute URL"));
    }
    if reqwest::Url::parse(&c.link_base).is_err() {
        return Err(ConfigError::Invalid("crawl.link_base must be an absolute URL"));
    }
    if c.max_pages == 0 {
        return Err(ConfigError::Invalid("crawl.max_pages must be > 0"));
    }
    if c.request_timeout_secs == 0 {
        return Err(ConfigError::Invalid("crawl.request_timeout_secs must be > 0"));
    }

    let s = &cfg.selectors;
    let checks: [(&str, &'static str); 12] = [
        (&s.page_count, "selectors.page_count is not a valid CSS selector"),
        (&s.results, "selectors.results is not a valid CSS selector"),
        (&s.card, "selectors.card is not a valid CSS selector"),
        (&s.title, "selectors.title is not a valid CSS selector"),
        (&s.company, "selectors.company is not a valid CSS selector"),
        (&s.location, "selectors.location is not a valid CSS selector"),
        (&s.location_fallback, "selectors.location_fallback is not a valid CSS selector"),
        (&s.rating, "selectors.rating is not a valid CSS selector"),
        (&s.post_age, "selectors.post_age is not a valid CSS selector"),
        (&s.link, "selectors.link is not a valid CSS selector"),
        (&s.summary, "selectors.summary is not a valid CSS selector"),
        (&s.description, "selectors.description is not a valid CSS selector"),
    ];
    for (sel, msg) in checks {
        if Selector::parse(sel).is_err() {
            return Err(ConfigError::Invalid(msg));
        }
    }

    if let Some(remote) = &cfg.remote {
        if remote.location.trim().is_empty() {
            return Err(ConfigError::Invalid("remote.location must be non-empty"));
        }
        if remote.kind == RemoteKind::Http && reqwest::Url::parse(&remote.location).is_err() {
            return Err(ConfigError::Invalid("remote.location must be a URL for kind http"));
        }
    }

    Ok(())
}

/// Example configuration shipped with the crate.
pub fn example() -> &'static str {
    r#"app:
  data_dir: "./data"

crawl:
  base_url: "https://www.indeed.com/jobs"
  link_base: "https://www.indeed.com"
  page_delay_secs: 5
  run_delay_secs: 180
  max_pages: 35
  fetch_descriptions: true
  continuation: reported_count

remote:
  kind: fs
  location: "./bucket"
  prefix: "dsrawjobpostings/"
"#
}
