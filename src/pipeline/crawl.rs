// src/pipeline/crawl.rs

//! Catalog crawling pipeline.

use std::path::Path;

use chrono::Utc;

use crate::error::Result;
use crate::services::{ConditionalFetcher, FetchOutcome};

/// Tally of one crawl run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CrawlSummary {
    pub updated: usize,
    pub not_modified: usize,
    pub retracted: usize,
    pub failed: usize,
}

impl CrawlSummary {
    pub fn total(&self) -> usize {
        self.updated + self.not_modified + self.retracted + self.failed
    }

    fn record(&mut self, outcome: &FetchOutcome) {
        match outcome {
            FetchOutcome::Updated { .. } => self.updated += 1,
            FetchOutcome::NotModified => self.not_modified += 1,
            FetchOutcome::Retracted { .. } => self.retracted += 1,
            FetchOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

/// Feed URLs from a feed list: one per line, `#` comments and blank lines
/// skipped.
pub fn parse_feed_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Read and parse a feed list file.
pub async fn load_feed_list(path: &Path) -> Result<Vec<String>> {
    let text = tokio::fs::read_to_string(path).await?;
    Ok(parse_feed_list(&text))
}

/// Refresh every feed, one after another.
///
/// A feed that fails is logged and skipped; it never stops the others.
pub async fn run_crawler(fetcher: &ConditionalFetcher, feeds: &[String]) -> CrawlSummary {
    let start_time = Utc::now();
    let mut summary = CrawlSummary::default();

    for url in feeds {
        log::info!("URL: {url}");
        match fetcher.fetch(url).await {
            Ok(outcome) => summary.record(&outcome),
            Err(e) => {
                log::error!("{url}: {e}");
                summary.failed += 1;
            }
        }
    }

    log::info!(
        "Crawled {} feeds in {}s: {} updated, {} not modified, {} retracted, {} failed",
        summary.total(),
        (Utc::now() - start_time).num_seconds(),
        summary.updated,
        summary.not_modified,
        summary.retracted,
        summary.failed
    );
    summary
}
