//! Utility functions and helpers.

pub mod http;
pub mod url;

use std::time::SystemTime;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Number, Value as Json};

use crate::error::{AppError, Result};

/// Convert a property-list date to a UTC timestamp.
pub fn plist_date_to_utc(date: plist::Date) -> DateTime<Utc> {
    DateTime::<Utc>::from(SystemTime::from(date))
}

/// Render a property-list date as ISO-8601 UTC with a trailing `Z`.
pub fn plist_date_string(date: plist::Date) -> String {
    plist_date_to_utc(date).to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

/// Convert a property-list value into JSON, keeping dictionary order.
///
/// Dates become ISO-8601 strings. Binary data and UIDs have no JSON form and
/// are rejected.
pub fn plist_to_json(value: plist::Value) -> Result<Json> {
    let json = match value {
        plist::Value::Array(items) => Json::Array(
            items
                .into_iter()
                .map(plist_to_json)
                .collect::<Result<Vec<_>>>()?,
        ),
        plist::Value::Dictionary(dict) => Json::Object(
            dict.into_iter()
                .map(|(k, v)| plist_to_json(v).map(|v| (k, v)))
                .collect::<Result<Map<_, _>>>()?,
        ),
        plist::Value::Boolean(b) => Json::Bool(b),
        plist::Value::String(s) => Json::String(s),
        plist::Value::Date(d) => Json::String(plist_date_string(d)),
        plist::Value::Integer(i) => match (i.as_unsigned(), i.as_signed()) {
            (Some(u), _) => Json::from(u),
            (None, Some(s)) => Json::from(s),
            (None, None) => return Err(AppError::schema("Packages", "integer out of range")),
        },
        plist::Value::Real(f) => Number::from_f64(f)
            .map(Json::Number)
            .ok_or_else(|| AppError::schema("Packages", "non-finite real number"))?,
        other => {
            return Err(AppError::schema(
                "Packages",
                format!("value has no JSON form: {other:?}"),
            ));
        }
    };
    Ok(json)
}
