//! Release records and their stable identifiers.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Length of every release identifier.
pub const IDENTIFIER_LEN: usize = 34;

static DOWNLOAD_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/content/downloads/\d{2}/\d{2}/[^/]*?/([0-9a-z]{34})/")
        .expect("download path pattern is valid")
});

/// Platform family a release belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Platform {
    #[serde(rename = "macOS")]
    MacOS,
    #[serde(rename = "bridgeOS")]
    BridgeOS,
}

impl Platform {
    pub const ALL: [Platform; 2] = [Platform::MacOS, Platform::BridgeOS];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::MacOS => "macOS",
            Platform::BridgeOS => "bridgeOS",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable content identifier of a release.
///
/// Always [`IDENTIFIER_LEN`] characters of `[0-9a-z]`. Doubles as the
/// branch name in the record store, so it is the dedup key across every
/// catalog and every run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Validate a bare identifier token.
    pub fn parse(token: &str) -> Result<Self> {
        let well_formed = token.len() == IDENTIFIER_LEN
            && token
                .bytes()
                .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase());
        if !well_formed {
            return Err(AppError::validation(format!(
                "'{token}' is not a {IDENTIFIER_LEN}-character lowercase alphanumeric identifier"
            )));
        }
        Ok(Self(token.to_string()))
    }

    /// Extract the identifier embedded in a distribution URL.
    ///
    /// # Examples
    /// ```
    /// use sucatalog::models::Identifier;
    ///
    /// let url = "https://swcdn.apple.com/content/downloads/11/22/041-12345/abcdefghijklmnopqrstuvwxyz01234567/English.dist";
    /// let id = Identifier::from_distribution_url(url).unwrap();
    /// assert_eq!(id.as_str(), "abcdefghijklmnopqrstuvwxyz01234567");
    /// ```
    pub fn from_distribution_url(url: &str) -> Result<Self> {
        DOWNLOAD_PATH
            .captures(url)
            .and_then(|caps| caps.get(1))
            .map(|m| Self(m.as_str().to_string()))
            .ok_or_else(|| {
                AppError::schema(
                    "distribution URL",
                    format!("no release identifier in '{url}'"),
                )
            })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Identifier {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.0
    }
}

/// A release extracted from a catalog, ready to be published.
///
/// Serializes to the branch document: the identifier and platform are not
/// part of it (the identifier is the branch name, the platform picks the
/// store).
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct ReleaseRecord {
    #[serde(skip)]
    pub identifier: Identifier,

    #[serde(skip)]
    pub platform: Platform,

    /// bridgeOS predicate ordering, absent for macOS
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// ISO-8601 UTC timestamp with a trailing `Z`
    pub post_date: String,

    #[serde(rename = "DistributionURL")]
    pub distribution_url: String,

    /// Installer packages, passed through as found in the catalog
    pub packages: serde_json::Value,
}

impl ReleaseRecord {
    /// Render the branch document.
    pub fn to_document(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
