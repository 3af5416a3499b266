// src/utils/url.rs

//! URL manipulation utilities.

use std::path::{Component, Path, PathBuf};

use url::Url;

use crate::error::{AppError, Result};

/// Relative cache path for a feed URL: its path without the leading `/`.
///
/// # Examples
/// ```
/// use std::path::Path;
/// use sucatalog::utils::url::cache_path;
///
/// let path = cache_path("https://swscan.apple.com/content/catalogs/others/index-10.16.sucatalog").unwrap();
/// assert_eq!(path, Path::new("content/catalogs/others/index-10.16.sucatalog"));
/// ```
pub fn cache_path(feed_url: &str) -> Result<PathBuf> {
    let parsed = Url::parse(feed_url)?;
    let relative = parsed.path().trim_start_matches('/');
    if relative.is_empty() {
        return Err(AppError::validation(format!(
            "feed URL has no path: {feed_url}"
        )));
    }

    let path = PathBuf::from(relative);
    let escapes = Path::new(relative)
        .components()
        .any(|c| !matches!(c, Component::Normal(_)));
    if escapes {
        return Err(AppError::validation(format!(
            "feed URL path is not a plain relative path: {feed_url}"
        )));
    }
    Ok(path)
}

/// Replace any userinfo in a URL with `***`, for logs and error messages.
pub fn redact_credentials(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) if !parsed.username().is_empty() || parsed.password().is_some() => {
            let _ = parsed.set_password(None);
            let _ = parsed.set_username("***");
            parsed.to_string()
        }
        _ => url.to_string(),
    }
}

/// Redact every occurrence of `secret` in free text.
pub fn redact_secret(text: &str, secret: Option<&str>) -> String {
    match secret {
        Some(secret) if !secret.is_empty() => text.replace(secret, "***"),
        _ => text.to_string(),
    }
}
