// src/utils/http.rs

//! HTTP client utilities.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::redirect::Policy;

use crate::error::Result;
use crate::models::FetchPolicy;

/// Create an HTTP client that follows the given fetch policy.
///
/// No cookie store is ever attached, so responses cannot leave state behind
/// for later requests.
pub fn create_async_client(policy: &FetchPolicy) -> Result<reqwest::Client> {
    let redirect = if policy.follow_redirects {
        Policy::default()
    } else {
        Policy::none()
    };
    let client = reqwest::Client::builder()
        .user_agent(&policy.user_agent)
        .timeout(Duration::from_secs(policy.timeout_secs))
        .redirect(redirect)
        .build()?;
    Ok(client)
}

/// Format a timestamp as an HTTP date (IMF-fixdate).
///
/// # Examples
/// ```
/// use chrono::{TimeZone, Utc};
/// use sucatalog::utils::http::http_date;
///
/// let dt = Utc.with_ymd_and_hms(1994, 11, 6, 8, 49, 37).unwrap();
/// assert_eq!(http_date(dt), "Sun, 06 Nov 1994 08:49:37 GMT");
/// ```
pub fn http_date(dt: DateTime<Utc>) -> String {
    dt.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
}

/// Find the `rel="next"` target in a `Link` header value.
pub fn next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|part| {
        let mut pieces = part.split(';');
        let target = pieces.next()?.trim();
        let target = target.strip_prefix('<')?.strip_suffix('>')?;
        pieces
            .map(str::trim)
            .any(|param| param == r#"rel="next""# || param == "rel=next")
            .then(|| target.to_string())
    })
}
