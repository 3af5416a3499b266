// src/services/fetcher.rs

//! Conditional catalog fetcher.
//!
//! Requests the gzip form of a feed with `If-Modified-Since` derived from the
//! cached copy, then updates, keeps, or removes the cached file depending on
//! the response.

use std::io::Read;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use flate2::read::GzDecoder;
use reqwest::{Client, StatusCode, header};

use crate::error::Result;
use crate::models::FetchPolicy;
use crate::storage::CatalogCache;
use crate::utils::http::{create_async_client, http_date};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// What happened to one feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// New content was written to the cache
    Updated { bytes: usize },
    /// Server reported no change since the cached `IndexDate`
    NotModified,
    /// Feed is gone upstream; `existed` tells whether a cached copy was removed
    Retracted { existed: bool },
    /// Unexpected status; cache untouched
    Failed { status: u16 },
}

/// Fetches catalog feeds into a [`CatalogCache`].
pub struct ConditionalFetcher {
    client: Client,
    policy: FetchPolicy,
    cache: CatalogCache,
}

impl ConditionalFetcher {
    /// Create a fetcher with its own HTTP client built from `policy`.
    pub fn new(policy: FetchPolicy, cache: CatalogCache) -> Result<Self> {
        let client = create_async_client(&policy)?;
        Ok(Self::with_client(client, policy, cache))
    }

    pub fn with_client(client: Client, policy: FetchPolicy, cache: CatalogCache) -> Self {
        Self {
            client,
            policy,
            cache,
        }
    }

    /// Freshness hint for a cached file: its `IndexDate` plus the skew.
    pub async fn freshness(&self, path: &Path) -> Option<DateTime<Utc>> {
        self.cache
            .index_date(path)
            .await
            .map(|date| date + Duration::seconds(self.policy.freshness_skew_secs))
    }

    /// Refresh the cached copy of one feed.
    pub async fn fetch(&self, feed_url: &str) -> Result<FetchOutcome> {
        let path = self.cache.path_for(feed_url)?;
        let since = self.freshness(&path).await;

        let url = format!("{}{}", feed_url, self.policy.compressed_suffix);
        let mut request = self.client.get(&url);
        if let Some(since) = since {
            log::debug!("If-Modified-Since: {}", http_date(since));
            request = request.header(header::IF_MODIFIED_SINCE, http_date(since));
        }

        let response = request.send().await?;
        let status = response.status();
        let body = if status == StatusCode::OK {
            response.bytes().await?.to_vec()
        } else {
            Vec::new()
        };

        apply_response(&self.cache, &path, status, &body).await
    }
}

/// Apply one response to the cached file at `path`.
pub async fn apply_response(
    cache: &CatalogCache,
    path: &Path,
    status: StatusCode,
    body: &[u8],
) -> Result<FetchOutcome> {
    match status {
        StatusCode::OK => {
            log::info!("{status}");
            let data = decompress(body)?;
            cache.write_bytes(path, &data).await?;
            Ok(FetchOutcome::Updated { bytes: data.len() })
        }
        StatusCode::NOT_MODIFIED => {
            log::info!("{status}");
            Ok(FetchOutcome::NotModified)
        }
        StatusCode::NOT_FOUND => {
            log::warn!("{status}");
            let existed = cache.remove(path).await?;
            if existed {
                log::warn!("Removed retracted catalog {}", path.display());
            }
            Ok(FetchOutcome::Retracted { existed })
        }
        other => {
            log::error!("{other}");
            Ok(FetchOutcome::Failed {
                status: other.as_u16(),
            })
        }
    }
}

/// Gunzip a response body.
///
/// A body without the gzip magic has already been decoded by the transport
/// and is returned as is.
pub fn decompress(body: &[u8]) -> Result<Vec<u8>> {
    if !body.starts_with(&GZIP_MAGIC) {
        return Ok(body.to_vec());
    }
    let mut data = Vec::new();
    GzDecoder::new(body).read_to_end(&mut data)?;
    Ok(data)
}
