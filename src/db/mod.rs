//! Database module: row models and the SQLite corpus repository.
//!
//! - `model`: rows as stored, with sentinel-encoded text columns.
//! - `repo`: pool setup and the [`SqliteCorpusStore`] gateway.
//!
//! External modules import from `job_harvester::db`; the repository API is
//! re-exported here.

pub mod model;
pub mod repo;

pub use repo::*;

pub use model::{ListingRow, RejectRow, RunRow};
