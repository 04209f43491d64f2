//! Issue tracker backend access.

pub mod cache;
pub mod executor;
pub mod rest;

pub use cache::SearchKey;
pub use executor::{BackendQuery, QueryExecutor};
pub use rest::{RestExecutor, DEFAULT_FIELDS};
