// src/models/mod.rs

//! Domain models for the catalog tracker.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod catalog;
mod config;
mod release;

// Re-export all public types
pub use catalog::{
    CATALOG_VERSION, Catalog, ExtendedMetaInfo, INSTALL_INFO_IDENTIFIER,
    InstallAssistantPackageIdentifiers, Product, RawExtendedMetaInfo,
};
pub use config::{Config, FetchPolicy, PathsConfig, PublisherConfig, StoreConfig};
pub use release::{IDENTIFIER_LEN, Identifier, Platform, ReleaseRecord};

/// Release records of one catalog, split by platform.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ParsedCatalog {
    pub macos: Vec<ReleaseRecord>,
    pub bridgeos: Vec<ReleaseRecord>,
}

impl ParsedCatalog {
    pub fn is_empty(&self) -> bool {
        self.macos.is_empty() && self.bridgeos.is_empty()
    }

    pub fn len(&self) -> usize {
        self.macos.len() + self.bridgeos.len()
    }

    /// Records of one platform.
    pub fn for_platform(&self, platform: Platform) -> &[ReleaseRecord] {
        match platform {
            Platform::MacOS => &self.macos,
            Platform::BridgeOS => &self.bridgeos,
        }
    }

    pub fn push(&mut self, record: ReleaseRecord) {
        match record.platform {
            Platform::MacOS => self.macos.push(record),
            Platform::BridgeOS => self.bridgeos.push(record),
        }
    }

    /// Consume into all records, macOS first.
    pub fn into_records(self) -> impl Iterator<Item = ReleaseRecord> {
        self.macos.into_iter().chain(self.bridgeos)
    }
}
