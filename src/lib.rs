pub mod config;
pub mod crawl;
pub mod dates;
pub mod db;
pub mod extract;
pub mod fetch;
pub mod merge;
pub mod model;
pub mod pipeline;
pub mod store;
pub mod terms;
