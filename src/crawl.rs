//! Pagination controller.
//!
//! One run walks result pages strictly in sequence: the decision to fetch
//! page k+1 depends on what page k reported.
//!
//! ```text
//! Start -> FetchingPage -> Parsing -> Accumulating -> NextPage -> FetchingPage ...
//!                |                         |
//!             Aborted                   Stopped
//! ```
use reqwest::Url;
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};

use crate::config::{Config, ConfigError, Continuation};
use crate::extract::{extract_description, parse_results_page, CompiledSelectors};
use crate::fetch::{FetchError, PageSource};
use crate::model::{Listing, Query};

/// Results per page on the source; the `start` offset advances by this much.
pub const PAGE_OFFSET: u32 = 10;

/// First result page: `q`, `l` and `sort=date` on the search endpoint.
pub fn first_page_url(base: &Url, query: &Query) -> Url {
    let mut url = base.clone();
    url.query_pairs_mut()
        .append_pair("q", &query.job_title)
        .append_pair("l", &query.location)
        .append_pair("sort", "date");
    url
}

/// Later pages append `start = reported_page_count * 10` to the first URL.
pub fn page_url(first: &Url, reported_page_count: u32) -> Url {
    let mut url = first.clone();
    let offset = reported_page_count.saturating_mul(PAGE_OFFSET);
    url.query_pairs_mut().append_pair("start", &offset.to_string());
    url
}

/// Transient state of a single run.
#[derive(Debug, Clone)]
pub struct CrawlState {
    pub query: Query,
    pub current_url: Url,
    /// 1-based index of the page at `current_url`.
    pub page_index: u32,
    pub expected_page_count: Option<u32>,
    pub accumulated_batch: Vec<Listing>,
}

impl CrawlState {
    pub fn start(query: Query, first_url: Url) -> Self {
        Self {
            query,
            current_url: first_url,
            page_index: 1,
            expected_page_count: None,
            accumulated_batch: Vec::new(),
        }
    }
}

/// What the controller knows after parsing and accumulating a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageStep {
    pub page_index: u32,
    pub reported_page_count: Option<u32>,
    pub listings_on_page: usize,
    /// Listings on this page not seen earlier in the run.
    pub new_listings: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The source's reported page count no longer equals the local page index.
    CountDiverged {
        page_index: u32,
        reported: Option<u32>,
    },
    PageCap { cap: u32 },
    NoNewListings { page_index: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Continue,
    Stop(StopReason),
}

/// Decides after each page whether the crawl goes on.
pub trait ContinuationPolicy: Send + Sync {
    fn decide(&self, step: &PageStep) -> Decision;

    /// Page count whose `start` offset addresses the page after `step`.
    fn next_offset_pages(&self, step: &PageStep) -> u32 {
        step.page_index
    }
}

/// Continue while the reported page count equals the local page index.
///
/// Any divergence stops the run, including a count that jumps ahead because
/// postings appeared mid-crawl.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReportedCountMatches;

impl ContinuationPolicy for ReportedCountMatches {
    fn decide(&self, step: &PageStep) -> Decision {
        if step.reported_page_count == Some(step.page_index) {
            Decision::Continue
        } else {
            Decision::Stop(StopReason::CountDiverged {
                page_index: step.page_index,
                reported: step.reported_page_count,
            })
        }
    }

    fn next_offset_pages(&self, step: &PageStep) -> u32 {
        step.reported_page_count.unwrap_or(step.page_index)
    }
}

/// Continue while every page contributes at least one unseen listing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NewListingsSeen;

impl ContinuationPolicy for NewListingsSeen {
    fn decide(&self, step: &PageStep) -> Decision {
        if step.new_listings > 0 {
            Decision::Continue
        } else {
            Decision::Stop(StopReason::NoNewListings {
                page_index: step.page_index,
            })
        }
    }
}

pub fn policy_for(continuation: Continuation) -> Box<dyn ContinuationPolicy> {
    match continuation {
        Continuation::ReportedCount => Box::new(ReportedCountMatches),
        Continuation::NewListings => Box::new(NewListingsSeen),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    Stopped(StopReason),
    /// A page fetch failed; listings accumulated before it are kept.
    Aborted(FetchError),
}

#[derive(Debug, Clone)]
pub struct CrawlOutcome {
    pub query: Query,
    pub pages_fetched: u32,
    pub listings: Vec<Listing>,
    pub termination: Termination,
}

impl CrawlOutcome {
    pub fn aborted(&self) -> Option<&FetchError> {
        match &self.termination {
            Termination::Aborted(err) => Some(err),
            Termination::Stopped(_) => None,
        }
    }
}

/// Drives a [`PageSource`] across the result pages of one query.
pub struct Crawler<'a> {
    source: &'a dyn PageSource,
    selectors: CompiledSelectors,
    base_url: Url,
    link_base: Url,
    page_cap: u32,
    fetch_descriptions: bool,
    policy: Box<dyn ContinuationPolicy>,
}

impl<'a> Crawler<'a> {
    pub fn new(
        source: &'a dyn PageSource,
        selectors: CompiledSelectors,
        base_url: Url,
        link_base: Url,
    ) -> Self {
        Self {
            source,
            selectors,
            base_url,
            link_base,
            page_cap: 35,
            fetch_descriptions: false,
            policy: Box::new(ReportedCountMatches),
        }
    }

    pub fn from_config(source: &'a dyn PageSource, cfg: &Config) -> Result<Self, ConfigError> {
        let selectors = CompiledSelectors::compile(&cfg.selectors)?;
        let base_url = Url::parse(&cfg.crawl.base_url)
            .map_err(|_| ConfigError::Invalid("crawl.base_url must be an absolute URL"))?;
        let link_base = Url::parse(&cfg.crawl.link_base)
            .map_err(|_| ConfigError::Invalid("crawl.link_base must be an absolute URL"))?;
        Ok(Self::new(source, selectors, base_url, link_base)
            .with_page_cap(cfg.crawl.max_pages)
            .with_descriptions(cfg.crawl.fetch_descriptions)
            .with_policy(policy_for(cfg.crawl.continuation)))
    }

    pub fn with_page_cap(mut self, cap: u32) -> Self {
        self.page_cap = cap.max(1);
        self
    }

    pub fn with_descriptions(mut self, enabled: bool) -> Self {
        self.fetch_descriptions = enabled;
        self
    }

    pub fn with_policy(mut self, policy: Box<dyn ContinuationPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Crawl every page of `query` until the policy stops, the page cap is
    /// reached, or a fetch fails.
    #[instrument(skip_all, fields(job_title = %query.job_title, location = %query.location))]
    pub async fn run(&self, query: Query) -> CrawlOutcome {
        let first = first_page_url(&self.base_url, &query);
        let mut state = CrawlState::start(query, first.clone());
        let mut seen: HashSet<Listing> = HashSet::new();
        let mut pages_fetched = 0;

        let termination = loop {
            debug!(page = state.page_index, url = %state.current_url, "fetching page");
            let doc = match self.source.fetch(state.current_url.as_str()).await {
                Ok(doc) => doc,
                Err(err) => {
                    warn!(%err, page = state.page_index, "page fetch failed; aborting run");
                    break Termination::Aborted(err);
                }
            };
            pages_fetched += 1;

            let page = parse_results_page(&doc, &self.selectors, &self.link_base);
            state.expected_page_count = page.reported_page_count;

            let mut listings = page.listings;
            if self.fetch_descriptions {
                self.fill_descriptions(&mut listings).await;
            }
            let new_listings = listings.iter().filter(|l| seen.insert((*l).clone())).count();
            let step = PageStep {
                page_index: state.page_index,
                reported_page_count: page.reported_page_count,
                listings_on_page: listings.len(),
                new_listings,
            };
            state.accumulated_batch.extend(listings);
            info!(
                page = step.page_index,
                reported = ?step.reported_page_count,
                listings = step.listings_on_page,
                new = step.new_listings,
                total = state.accumulated_batch.len(),
                "page accumulated"
            );

            if let Decision::Stop(reason) = self.policy.decide(&step) {
                break Termination::Stopped(reason);
            }
            if state.page_index >= self.page_cap {
                break Termination::Stopped(StopReason::PageCap { cap: self.page_cap });
            }

            state.current_url = page_url(&first, self.policy.next_offset_pages(&step));
            state.page_index += 1;
        };

        match &termination {
            Termination::Stopped(reason) => {
                info!(?reason, pages_fetched, listings = state.accumulated_batch.len(), "crawl stopped")
            }
            Termination::Aborted(err) => {
                warn!(%err, pages_fetched, listings = state.accumulated_batch.len(), "crawl aborted")
            }
        }

        CrawlOutcome {
            query: state.query,
            pages_fetched,
            listings: state.accumulated_batch,
            termination,
        }
    }

    /// Replace card summaries with detail-page descriptions. A failed detail
    /// fetch leaves the description empty instead of failing the page.
    async fn fill_descriptions(&self, listings: &mut [Listing]) {
        for listing in listings.iter_mut() {
            let Some(link) = listing.job_link.clone() else {
                listing.job_description = None;
                continue;
            };
            listing.job_description = match self.source.fetch(&link).await {
                Ok(doc) => extract_description(&doc, &self.selectors),
                Err(err) => {
                    warn!(%err, "detail fetch failed");
                    None
                }
            };
        }
    }
}
