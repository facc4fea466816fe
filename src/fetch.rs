//! Page fetching: one HTTP GET per call followed by a fixed politeness delay.
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::config::Crawl;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("request to {url} failed: {reason}")]
    Transport { url: String, reason: String },
    #[error("response from {url} is not an HTML document")]
    Unparseable { url: String },
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            FetchError::Status { url, .. }
            | FetchError::Timeout { url }
            | FetchError::Transport { url, .. }
            | FetchError::Unparseable { url } => url,
        }
    }
}

/// A fetched page whose markup passed the structural check.
///
/// Holds the raw body; parsing into a DOM happens on demand so the document
/// can cross await points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    url: String,
    body: String,
}

impl Document {
    /// Accept `body` only if it parses to a document with a title or at
    /// least one element under `<body>`.
    pub fn parse(url: impl Into<String>, body: impl Into<String>) -> Result<Self, FetchError> {
        let url = url.into();
        let body = body.into();
        if !has_markup(&body) {
            return Err(FetchError::Unparseable { url });
        }
        Ok(Self { url, body })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn html(&self) -> Html {
        Html::parse_document(&self.body)
    }
}

fn has_markup(body: &str) -> bool {
    if body.trim().is_empty() {
        return false;
    }
    let html = Html::parse_document(body);
    let (Ok(title), Ok(any)) = (Selector::parse("title"), Selector::parse("body *")) else {
        return false;
    };
    let has_title = html.select(&title).next().is_some();
    has_title || html.select(&any).next().is_some()
}

/// Anything that can hand back a page for a URL. The crawl controller only
/// talks to this seam.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Document, FetchError>;
}

/// `PageSource` backed by reqwest. Every call sleeps `min_delay` after the
/// response is read, before returning to the caller.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    http: Client,
    min_delay: Duration,
}

impl HttpFetcher {
    pub fn from_config(crawl: &Crawl) -> Result<Self, FetchError> {
        Self::new(
            &crawl.user_agent,
            Duration::from_secs(crawl.request_timeout_secs),
            Duration::from_secs(crawl.page_delay_secs),
        )
    }

    pub fn new(user_agent: &str, timeout: Duration, min_delay: Duration) -> Result<Self, FetchError> {
        let http = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|err| FetchError::Transport {
                url: String::new(),
                reason: err.to_string(),
            })?;
        Ok(Self { http, min_delay })
    }

    pub fn min_delay(&self) -> Duration {
        self.min_delay
    }

    async fn fetch_once(&self, url: &str) -> Result<Document, FetchError> {
        let res = self.http.get(url).send().await.map_err(|err| map_reqwest(url, err))?;
        let status = res.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!(url, "rate limited by source");
        }
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = res.text().await.map_err(|err| map_reqwest(url, err))?;
        Document::parse(url, body)
    }
}

fn map_reqwest(url: &str, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout { url: url.to_string() }
    } else {
        FetchError::Transport {
            url: url.to_string(),
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl PageSource for HttpFetcher {
    #[instrument(skip_all, fields(url = %url))]
    async fn fetch(&self, url: &str) -> Result<Document, FetchError> {
        let result = self.fetch_once(url).await;
        match &result {
            Ok(doc) => info!(url, bytes = doc.body().len(), "fetched page"),
            Err(err) => warn!(%err, "fetch failed"),
        }
        if !self.min_delay.is_zero() {
            debug!(delay_secs = self.min_delay.as_secs(), "politeness delay");
            tokio::time::sleep(self.min_delay).await;
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_accepts_html() {
        let doc = Document::parse("u", "<html><head><title>Jobs</title></head><body></body></html>")
            .unwrap();
        assert_eq!(doc.url(), "u");
        let doc = Document::parse("u", "<div><p>x</p></div>").unwrap();
        assert!(doc.body().contains("<p>"));
    }

    #[test]
    fn document_rejects_blank_and_plain_text() {
        assert_eq!(
            Document::parse("u", "   "),
            Err(FetchError::Unparseable { url: "u".into() })
        );
        assert!(Document::parse("u", "just some words").is_err());
    }

    #[test]
    fn error_exposes_url() {
        let err = FetchError::Status {
            url: "https://example.com/jobs".into(),
            status: 503,
        };
        assert_eq!(err.url(), "https://example.com/jobs");
        assert_eq!(err.to_string(), "HTTP 503 for https://example.com/jobs");
    }
}
