//! Catalog document schema.
//!
//! Every structure here is closed-world: fields are enumerated explicitly and
//! anything else fails deserialization. Known-but-ignored fields are still
//! listed so that their presence is accepted.

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::{AppError, Result};

/// The only catalog format version understood.
pub const CATALOG_VERSION: u64 = 2;

/// Expected value of `InstallAssistantPackageIdentifiers.InstallInfo`.
pub const INSTALL_INFO_IDENTIFIER: &str = "com.apple.plist.InstallInfo";

/// Root of a catalog document.
///
/// Products are kept as raw dictionaries: only the ones carrying
/// `ExtendedMetaInfo` are decoded further.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Catalog {
    #[serde(rename = "CatalogVersion")]
    pub catalog_version: u64,

    #[serde(rename = "ApplePostURL")]
    pub apple_post_url: String,

    #[serde(rename = "IndexDate")]
    pub index_date: plist::Date,

    /// Taken out of the root before the header is decoded
    #[serde(skip)]
    pub products: plist::Dictionary,
}

impl Catalog {
    /// Decode a non-empty root dictionary.
    pub fn from_dictionary(mut root: plist::Dictionary) -> Result<Self> {
        let products = match root.remove("Products") {
            Some(plist::Value::Dictionary(products)) => products,
            Some(_) => return Err(AppError::schema("Products", "not a dictionary")),
            None => return Err(AppError::schema("catalog root", "missing field `Products`")),
        };

        let mut catalog: Catalog = decode(&plist::Value::Dictionary(root), "catalog root")?;
        catalog.products = products;
        Ok(catalog)
    }

    pub fn check_version(&self) -> Result<()> {
        if self.catalog_version != CATALOG_VERSION {
            return Err(AppError::schema(
                "CatalogVersion",
                format!(
                    "expected {CATALOG_VERSION}, found {}",
                    self.catalog_version
                ),
            ));
        }
        Ok(())
    }
}

/// A product that carries `ExtendedMetaInfo`.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Product {
    #[serde(rename = "PostDate")]
    pub post_date: plist::Date,

    /// Locale name to distribution document URL
    #[serde(rename = "Distributions")]
    pub distributions: HashMap<String, String>,

    #[serde(rename = "Packages")]
    pub packages: plist::Value,

    /// Taken out of the product before the other fields are decoded
    #[serde(skip)]
    pub extended_meta_info: RawExtendedMetaInfo,

    // Accepted, not used.
    #[serde(rename = "ServerMetadataURL", default)]
    pub server_metadata_url: Option<String>,

    #[serde(rename = "DeferredSUEnablementDate", default)]
    pub deferred_su_enablement_date: Option<plist::Date>,

    #[serde(rename = "State", default)]
    pub state: Option<String>,
}

impl Product {
    /// Decode a product dictionary that carries `ExtendedMetaInfo`.
    pub fn from_dictionary(mut fields: plist::Dictionary) -> Result<Self> {
        let meta = fields
            .remove("ExtendedMetaInfo")
            .ok_or_else(|| AppError::schema("product", "missing field `ExtendedMetaInfo`"))?;
        let extended_meta_info: RawExtendedMetaInfo = decode(&meta, "ExtendedMetaInfo")?;

        let mut product: Product = decode(&plist::Value::Dictionary(fields), "fields")?;
        product.extended_meta_info = extended_meta_info;
        Ok(product)
    }

    /// The English distribution document URL.
    pub fn english_distribution(&self) -> Result<&str> {
        self.distributions
            .get("English")
            .map(String::as_str)
            .ok_or_else(|| AppError::schema("Distributions", "missing English distribution"))
    }
}

/// `ExtendedMetaInfo` as it appears in the document, before classification.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawExtendedMetaInfo {
    #[serde(rename = "InstallAssistantPackageIdentifiers", default)]
    pub install_assistant: Option<InstallAssistantPackageIdentifiers>,

    #[serde(rename = "ProductType", default)]
    pub product_type: Option<String>,

    #[serde(rename = "ProductVersion", default)]
    pub product_version: Option<String>,

    #[serde(rename = "AutoUpdate", default)]
    pub auto_update: Option<plist::Value>,

    #[serde(rename = "BridgeOSPredicateProductOrdering", default)]
    pub bridge_os_ordering: Option<String>,

    #[serde(rename = "BridgeOSSoftwareUpdateEventRecordingServiceURL", default)]
    pub bridge_os_event_url: Option<String>,
}

/// Package identifiers of an install-assistant product.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "PascalCase")]
pub struct InstallAssistantPackageIdentifiers {
    pub install_info: String,
    #[serde(rename = "OSInstall", default)]
    pub os_install: Option<String>,
    #[serde(default)]
    pub shared_support: Option<String>,
    #[serde(default)]
    pub info: Option<String>,
    #[serde(default)]
    pub update_brain: Option<String>,
    #[serde(default)]
    pub build_manifest: Option<String>,
}

/// Classified `ExtendedMetaInfo`.
#[derive(Debug, PartialEq)]
pub enum ExtendedMetaInfo {
    /// Full installer, identified by its package list
    InstallAssistant,
    /// `ProductType = macOS`
    MacOS { product_version: String },
    /// `ProductType = bridgeOS`
    BridgeOS {
        ordering: String,
        product_version: String,
    },
}

impl RawExtendedMetaInfo {
    /// Names of the fields that are present.
    fn present(&self) -> Vec<&'static str> {
        [
            (
                "InstallAssistantPackageIdentifiers",
                self.install_assistant.is_some(),
            ),
            ("ProductType", self.product_type.is_some()),
            ("ProductVersion", self.product_version.is_some()),
            ("AutoUpdate", self.auto_update.is_some()),
            (
                "BridgeOSPredicateProductOrdering",
                self.bridge_os_ordering.is_some(),
            ),
            (
                "BridgeOSSoftwareUpdateEventRecordingServiceURL",
                self.bridge_os_event_url.is_some(),
            ),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect()
    }

    /// Fail if any present field is outside `allowed`.
    fn only(&self, variant: &str, allowed: &[&str]) -> Result<()> {
        let extra: Vec<_> = self
            .present()
            .into_iter()
            .filter(|name| !allowed.contains(name))
            .collect();
        if !extra.is_empty() {
            return Err(AppError::schema(
                "ExtendedMetaInfo",
                format!("unexpected field(s) for {variant}: {}", extra.join(", ")),
            ));
        }
        Ok(())
    }

    /// Decide which kind of release this is.
    pub fn classify(self) -> Result<ExtendedMetaInfo> {
        if let Some(identifiers) = &self.install_assistant {
            self.only(
                "install assistant",
                &["InstallAssistantPackageIdentifiers"],
            )?;
            if identifiers.install_info != INSTALL_INFO_IDENTIFIER {
                return Err(AppError::schema(
                    "InstallAssistantPackageIdentifiers.InstallInfo",
                    format!(
                        "expected {INSTALL_INFO_IDENTIFIER}, found {}",
                        identifiers.install_info
                    ),
                ));
            }
            return Ok(ExtendedMetaInfo::InstallAssistant);
        }

        let Some(product_type) = self.product_type.as_deref() else {
            return Err(AppError::schema(
                "ExtendedMetaInfo",
                "neither InstallAssistantPackageIdentifiers nor ProductType present",
            ));
        };

        match product_type {
            "macOS" => {
                self.only(
                    "macOS",
                    &["ProductType", "ProductVersion", "AutoUpdate"],
                )?;
                Ok(ExtendedMetaInfo::MacOS {
                    product_version: required(self.product_version, "ProductVersion")?,
                })
            }
            "bridgeOS" => {
                self.only(
                    "bridgeOS",
                    &[
                        "ProductType",
                        "ProductVersion",
                        "BridgeOSPredicateProductOrdering",
                        "BridgeOSSoftwareUpdateEventRecordingServiceURL",
                    ],
                )?;
                required(
                    self.bridge_os_event_url,
                    "BridgeOSSoftwareUpdateEventRecordingServiceURL",
                )?;
                Ok(ExtendedMetaInfo::BridgeOS {
                    ordering: required(
                        self.bridge_os_ordering,
                        "BridgeOSPredicateProductOrdering",
                    )?,
                    product_version: required(self.product_version, "ProductVersion")?,
                })
            }
            other => Err(AppError::schema(
                "ExtendedMetaInfo.ProductType",
                format!("unimplemented product type '{other}'"),
            )),
        }
    }
}

/// Deserialize `value`, reporting failures as schema violations in `context`.
fn decode<T: serde::de::DeserializeOwned>(value: &plist::Value, context: &str) -> Result<T> {
    plist::from_value(value).map_err(|e| AppError::schema(context, decode_message(&e)))
}

/// The deserializer's own message, without plist's `Serde("...")` wrapper.
fn decode_message(err: &plist::Error) -> String {
    let text = err.to_string();
    match text
        .strip_prefix("Serde(\"")
        .and_then(|rest| rest.rfind("\")").map(|end| &rest[..end]))
    {
        Some(inner) => inner.replace("\\\"", "\"").replace("\\\\", "\\"),
        None => text,
    }
}

fn required(value: Option<String>, field: &str) -> Result<String> {
    value.ok_or_else(|| AppError::schema("ExtendedMetaInfo", format!("missing {field}")))
}
