//! Services module containing core business logic.
//!
//! - `fetcher`: conditional download of catalog feeds into the local cache
//! - `catalog`: closed-world parsing of catalogs into release records

pub mod catalog;
pub mod fetcher;

pub use fetcher::{ConditionalFetcher, FetchOutcome};
