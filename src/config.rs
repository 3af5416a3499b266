// src/config.rs

//! Configuration loading utilities.
//!
//! Convenience functions shared by the binaries for loading configuration
//! and wiring the configured record stores.

use std::path::Path;

use reqwest::Client;

use crate::error::Result;
use crate::models::Config;
use crate::storage::{GitHubStore, RecordStore};

/// Load configuration from a TOML file and validate it.
///
/// A missing file means defaults; a file that exists but does not parse is
/// an error.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        log::info!("Loading configuration from {}", path.display());
        Config::load(path)?
    } else {
        log::info!("{} not found, using default configuration", path.display());
        Config::default()
    };
    config.validate()?;
    Ok(config)
}

/// One record store per configured platform.
pub fn record_stores(
    config: &Config,
    client: &Client,
    token: Option<String>,
) -> Vec<Box<dyn RecordStore>> {
    config
        .stores
        .iter()
        .map(|store| {
            Box::new(GitHubStore::new(
                client.clone(),
                store,
                &config.publisher,
                token.clone(),
            )) as Box<dyn RecordStore>
        })
        .collect()
}
