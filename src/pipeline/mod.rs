//! Pipeline entry points.
//!
//! - `run_crawler`: Refresh the local catalog cache from the feed list
//! - `run_publish`: Publish releases from cached catalogs to the record stores

pub mod crawl;
pub mod publish;

pub use crawl::{CrawlSummary, load_feed_list, run_crawler};
pub use publish::{PublishSummary, run_publish, select_new};
