// src/services/catalog.rs

//! Catalog parser.
//!
//! Turns one catalog document into per-platform release records. Any field
//! that is not explicitly recognized aborts the whole catalog.

use std::io::Cursor;
use std::path::Path;

use crate::error::{AppError, Result};
use crate::models::{
    Catalog, ExtendedMetaInfo, Identifier, ParsedCatalog, Platform, Product, ReleaseRecord,
};
use crate::utils::{plist_date_string, plist_to_json};

/// Parse a catalog file from disk.
pub fn parse_file(path: impl AsRef<Path>) -> Result<ParsedCatalog> {
    let value = plist::Value::from_file(path.as_ref())?;
    parse_value(value)
}

/// Parse a catalog from raw (uncompressed) bytes.
pub fn parse_bytes(bytes: &[u8]) -> Result<ParsedCatalog> {
    let value = plist::Value::from_reader(Cursor::new(bytes))?;
    parse_value(value)
}

/// Parse an already decoded catalog document.
pub fn parse_value(value: plist::Value) -> Result<ParsedCatalog> {
    let plist::Value::Dictionary(root) = value else {
        return Err(AppError::schema("catalog root", "not a dictionary"));
    };

    // A retracted or placeholder feed is served as an empty dictionary.
    if root.is_empty() {
        return Ok(ParsedCatalog::default());
    }

    let catalog = Catalog::from_dictionary(root)?;
    catalog.check_version()?;

    let mut parsed = ParsedCatalog::default();
    for (code, value) in catalog.products {
        let plist::Value::Dictionary(fields) = value else {
            return Err(AppError::schema(format!("product {code}"), "not a dictionary"));
        };
        if !fields.contains_key("ExtendedMetaInfo") {
            log::debug!("Skipping product {code}: no ExtendedMetaInfo");
            continue;
        }

        let record = Product::from_dictionary(fields)
            .and_then(release_from_product)
            .map_err(|e| within_product(&code, e))?;
        log::debug!("Product {code} -> {} {}", record.platform, record.identifier);
        parsed.push(record);
    }

    Ok(parsed)
}

/// Build the release record for a product that carries `ExtendedMetaInfo`.
fn release_from_product(product: Product) -> Result<ReleaseRecord> {
    let distribution_url = product.english_distribution()?.to_string();
    let identifier = Identifier::from_distribution_url(&distribution_url)?;

    let (platform, version) = match product.extended_meta_info.classify()? {
        ExtendedMetaInfo::InstallAssistant | ExtendedMetaInfo::MacOS { .. } => {
            (Platform::MacOS, None)
        }
        ExtendedMetaInfo::BridgeOS { ordering, .. } => (Platform::BridgeOS, Some(ordering)),
    };

    Ok(ReleaseRecord {
        identifier,
        platform,
        version,
        post_date: plist_date_string(product.post_date),
        distribution_url,
        packages: plist_to_json(product.packages)?,
    })
}

fn within_product(code: &str, err: AppError) -> AppError {
    match err {
        AppError::Schema { context, message } => AppError::Schema {
            context: format!("product {code}: {context}"),
            message,
        },
        other => other,
    }
}
