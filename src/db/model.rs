//! Rows as read back from the database.
//!
//! Keep these structs focused on the data returned by queries. Conversion to
//! domain types goes through [`ListingRecord`], which owns the sentinel rules.

use chrono::NaiveDate;
use sqlx::FromRow;

use crate::model::{DateReject, ListingRecord, ResolvedListing};

#[derive(Debug, Clone, FromRow)]
pub struct ListingRow {
    pub position: i64,
    pub date: NaiveDate,
    pub title: String,
    pub location: String,
    pub company: String,
    pub company_rating: String,
    pub post_age: String,
    pub job_link: String,
    pub job_description: String,
}

impl From<ListingRow> for ResolvedListing {
    fn from(row: ListingRow) -> Self {
        ResolvedListing::from(ListingRecord {
            date: row.date,
            title: row.title,
            location: row.location,
            company: row.company,
            company_rating: row.company_rating,
            post_age: row.post_age,
            job_link: row.job_link,
            job_description: row.job_description,
        })
    }
}

/// A listing kept aside because its post age did not resolve.
#[derive(Debug, Clone, FromRow)]
pub struct RejectRow {
    pub captured_on: NaiveDate,
    pub post_age: String,
    pub title: String,
    pub location: String,
    pub company: String,
    pub company_rating: String,
    pub job_link: String,
    pub job_description: String,
    pub reason: String,
}

impl From<RejectRow> for DateReject {
    fn from(row: RejectRow) -> Self {
        let resolved = ResolvedListing::from(ListingRecord {
            date: row.captured_on,
            title: row.title,
            location: row.location,
            company: row.company,
            company_rating: row.company_rating,
            post_age: row.post_age,
            job_link: row.job_link,
            job_description: row.job_description,
        });
        DateReject {
            listing: resolved.listing,
            captured_on: row.captured_on,
            reason: row.reason,
        }
    }
}

/// Ledger entry of a finished run.
#[derive(Debug, Clone, FromRow)]
pub struct RunRow {
    pub id: String,
    pub corpus_id: String,
    pub as_of: NaiveDate,
    pub pages_fetched: i64,
    pub listings_found: i64,
    pub net_new: i64,
    pub error_count: i64,
    pub aborted: bool,
}
