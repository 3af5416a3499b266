//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::Platform;

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Catalog download behavior
    #[serde(default)]
    pub fetcher: FetchPolicy,

    /// Local file locations
    #[serde(default)]
    pub paths: PathsConfig,

    /// Record store access and commit settings
    #[serde(default)]
    pub publisher: PublisherConfig,

    /// One record store per platform
    #[serde(default = "defaults::stores")]
    pub stores: Vec<StoreConfig>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.fetcher.user_agent.trim().is_empty() {
            return Err(AppError::validation("fetcher.user_agent is empty"));
        }
        if self.fetcher.timeout_secs == 0 {
            return Err(AppError::validation("fetcher.timeout_secs must be > 0"));
        }
        if self.fetcher.store_cookies {
            return Err(AppError::validation(
                "fetcher.store_cookies is not supported; catalog requests are stateless",
            ));
        }
        if self.publisher.template_branch.trim().is_empty() {
            return Err(AppError::validation("publisher.template_branch is empty"));
        }
        if self.publisher.document_name.trim().is_empty()
            || self.publisher.document_name.contains('/')
        {
            return Err(AppError::validation(
                "publisher.document_name must be a plain file name",
            ));
        }
        if self.publisher.per_page == 0 || self.publisher.per_page > 100 {
            return Err(AppError::validation(
                "publisher.per_page must be between 1 and 100",
            ));
        }
        if self.publisher.token_env.trim().is_empty() {
            return Err(AppError::validation("publisher.token_env is empty"));
        }
        for platform in Platform::ALL {
            let count = self
                .stores
                .iter()
                .filter(|s| s.platform == platform)
                .count();
            if count != 1 {
                return Err(AppError::validation(format!(
                    "expected exactly one store for {platform}, found {count}"
                )));
            }
        }
        for store in &self.stores {
            if store.repo.split('/').filter(|p| !p.is_empty()).count() != 2 {
                return Err(AppError::validation(format!(
                    "store repo '{}' must look like owner/name",
                    store.repo
                )));
            }
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fetcher: FetchPolicy::default(),
            paths: PathsConfig::default(),
            publisher: PublisherConfig::default(),
            stores: defaults::stores(),
        }
    }
}

/// How catalog feeds are requested.
///
/// Passed explicitly to the fetcher; nothing about cookies or redirects is
/// process-global.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchPolicy {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Added to the cached `IndexDate` before it is sent as `If-Modified-Since`
    #[serde(default = "defaults::freshness_skew")]
    pub freshness_skew_secs: i64,

    /// Suffix appended to a feed URL to request its compressed form
    #[serde(default = "defaults::compressed_suffix")]
    pub compressed_suffix: String,

    #[serde(default)]
    pub follow_redirects: bool,

    #[serde(default)]
    pub store_cookies: bool,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            freshness_skew_secs: defaults::freshness_skew(),
            compressed_suffix: defaults::compressed_suffix(),
            follow_redirects: false,
            store_cookies: false,
        }
    }
}

/// Local file locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Feed URL list, one per line
    #[serde(default = "defaults::feed_list")]
    pub feed_list: PathBuf,

    /// Root under which catalogs are cached by URL path
    #[serde(default = "defaults::cache_dir")]
    pub cache_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            feed_list: defaults::feed_list(),
            cache_dir: defaults::cache_dir(),
        }
    }
}

/// Record store access and commit settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublisherConfig {
    /// REST API root used to list branches
    #[serde(default = "defaults::api_base")]
    pub api_base: String,

    /// Host that repositories are cloned from
    #[serde(default = "defaults::git_host")]
    pub git_host: String,

    /// Environment variable holding the access token
    #[serde(default = "defaults::token_env")]
    pub token_env: String,

    /// Branch every record branch is created from
    #[serde(default = "defaults::template_branch")]
    pub template_branch: String,

    /// File name of the record document inside a branch
    #[serde(default = "defaults::document_name")]
    pub document_name: String,

    #[serde(default = "defaults::commit_message")]
    pub commit_message: String,

    /// Page size for branch listing
    #[serde(default = "defaults::per_page")]
    pub per_page: u32,

    #[serde(default)]
    pub committer_name: Option<String>,

    #[serde(default)]
    pub committer_email: Option<String>,
}

impl PublisherConfig {
    /// Read the access token from the configured environment variable.
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
    }

    /// Like [`Self::token`], but missing is an error.
    pub fn require_token(&self) -> Result<String> {
        self.token().ok_or_else(|| {
            AppError::config(format!(
                "environment variable {} is not set",
                self.token_env
            ))
        })
    }
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            api_base: defaults::api_base(),
            git_host: defaults::git_host(),
            token_env: defaults::token_env(),
            template_branch: defaults::template_branch(),
            document_name: defaults::document_name(),
            commit_message: defaults::commit_message(),
            per_page: defaults::per_page(),
            committer_name: None,
            committer_email: None,
        }
    }
}

/// A repository that holds the records of one platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub platform: Platform,

    /// `owner/name`
    pub repo: String,
}

mod defaults {
    use std::path::PathBuf;

    use super::StoreConfig;
    use crate::models::Platform;

    // Fetcher defaults
    pub fn user_agent() -> String {
        concat!("sucatalog/", env!("CARGO_PKG_VERSION")).into()
    }
    pub fn timeout() -> u64 {
        60
    }
    pub fn freshness_skew() -> i64 {
        5
    }
    pub fn compressed_suffix() -> String {
        ".gz".into()
    }

    // Path defaults
    pub fn feed_list() -> PathBuf {
        PathBuf::from("url.txt")
    }
    pub fn cache_dir() -> PathBuf {
        PathBuf::from(".")
    }

    // Publisher defaults
    pub fn api_base() -> String {
        "https://api.github.com".into()
    }
    pub fn git_host() -> String {
        "github.com".into()
    }
    pub fn token_env() -> String {
        "GITHUB_PERSONAL_ACCESS_TOKEN".into()
    }
    pub fn template_branch() -> String {
        "template".into()
    }
    pub fn document_name() -> String {
        "product.json".into()
    }
    pub fn commit_message() -> String {
        "automatic commit".into()
    }
    pub fn per_page() -> u32 {
        100
    }

    // Store defaults
    pub fn stores() -> Vec<StoreConfig> {
        vec![
            StoreConfig {
                platform: Platform::MacOS,
                repo: "zhangyoufu/macOS".into(),
            },
            StoreConfig {
                platform: Platform::BridgeOS,
                repo: "zhangyoufu/bridgeOS".into(),
            },
        ]
    }
}
