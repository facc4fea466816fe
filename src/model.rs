use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Placeholder written for title, company, location, post age, link and
/// description when the markup did not carry the field.
pub const SENTINEL_ERROR: &str = "error";
/// Placeholder written for a missing company rating.
pub const SENTINEL_MISSING: &str = "missing";

/// One scraped job posting before date resolution.
///
/// Absent fields are `None` in memory and become sentinel strings only when
/// the record is serialized (see [`ListingRecord`]).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Listing {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub company_rating: Option<String>,
    pub post_age: Option<String>,
    pub job_link: Option<String>,
    pub job_description: Option<String>,
}

impl Listing {
    pub fn resolved(self, date: NaiveDate) -> ResolvedListing {
        ResolvedListing { listing: self, date }
    }
}

/// A listing with its absolute post date; the unit stored in a corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedListing {
    pub listing: Listing,
    pub date: NaiveDate,
}

/// Deduplication key of a corpus entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityKey {
    pub title: Option<String>,
    pub location: Option<String>,
    pub company: Option<String>,
    pub job_link: Option<String>,
    pub job_description: Option<String>,
}

impl ResolvedListing {
    pub fn identity(&self) -> IdentityKey {
        let l = &self.listing;
        IdentityKey {
            title: l.title.clone(),
            location: l.location.clone(),
            company: l.company.clone(),
            job_link: l.job_link.clone(),
            job_description: l.job_description.clone(),
        }
    }
}

/// Ordered, deduplicated collection of resolved listings for one partition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Corpus {
    entries: Vec<ResolvedListing>,
}

impl Corpus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap entries as-is. Callers that need the ordering and identity
    /// invariants go through [`crate::merge::merge`].
    pub fn from_entries(entries: Vec<ResolvedListing>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ResolvedListing] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolvedListing> {
        self.entries.iter()
    }

    pub fn into_entries(self) -> Vec<ResolvedListing> {
        self.entries
    }

    pub fn is_sorted_by_date_desc(&self) -> bool {
        self.entries.windows(2).all(|w| w[0].date >= w[1].date)
    }
}

/// Search parameters of one crawl run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub job_title: String,
    pub location: String,
}

impl Query {
    pub fn new(job_title: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            job_title: job_title.into(),
            location: location.into(),
        }
    }

    pub fn corpus_id(&self) -> CorpusId {
        CorpusId::for_query(self)
    }
}

/// Name of a corpus partition, derived from job title and location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CorpusId(String);

impl CorpusId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// `"data scientist" / "TX"` becomes `data-scientist_tx`.
    pub fn for_query(query: &Query) -> Self {
        Self(format!(
            "{}_{}",
            slug(&query.job_title),
            slug(&query.location)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorpusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn slug(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.trim().chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
        } else if !out.ends_with('-') && !out.is_empty() {
            out.push('-');
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Serialized shape of a corpus row: field names of downstream consumers,
/// sentinels in place of absent values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub date: NaiveDate,
    pub title: String,
    pub location: String,
    pub company: String,
    pub company_rating: String,
    pub post_age: String,
    pub job_link: String,
    pub job_description: String,
}

impl From<&ResolvedListing> for ListingRecord {
    fn from(r: &ResolvedListing) -> Self {
        let l = &r.listing;
        let or_error = |v: &Option<String>| v.clone().unwrap_or_else(|| SENTINEL_ERROR.into());
        ListingRecord {
            date: r.date,
            title: or_error(&l.title),
            location: or_error(&l.location),
            company: or_error(&l.company),
            company_rating: l
                .company_rating
                .clone()
                .unwrap_or_else(|| SENTINEL_MISSING.into()),
            post_age: or_error(&l.post_age),
            job_link: or_error(&l.job_link),
            job_description: or_error(&l.job_description),
        }
    }
}

impl From<ListingRecord> for ResolvedListing {
    fn from(r: ListingRecord) -> Self {
        let from_error = |v: String| (v != SENTINEL_ERROR).then_some(v);
        let listing = Listing {
            title: from_error(r.title),
            location: from_error(r.location),
            company: from_error(r.company),
            company_rating: (r.company_rating != SENTINEL_MISSING).then_some(r.company_rating),
            post_age: from_error(r.post_age),
            job_link: from_error(r.job_link),
            job_description: from_error(r.job_description),
        };
        ResolvedListing {
            listing,
            date: r.date,
        }
    }
}

/// A listing whose post age could not be resolved, kept for inspection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateReject {
    pub listing: Listing,
    pub captured_on: NaiveDate,
    pub reason: String,
}

/// A problem met during a run that did not stop it outright.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunIssue {
    Fetch { message: String },
    DateParse { post_age: String, message: String },
    Remote { message: String },
}

/// User-visible summary of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub corpus_id: CorpusId,
    pub as_of: NaiveDate,
    pub fetched_pages: u32,
    pub listings_found: usize,
    pub net_new_after_merge: usize,
    pub aborted: bool,
    pub errors: Vec<RunIssue>,
}
