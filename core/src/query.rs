//! Typed filters for listing operations.
//!
//! Filters are ordinary serde structs. They are flattened into query pairs
//! only when the request is built, so an unset field and an absent filter
//! produce the same URL.

use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;

/// A filter that can be flattened into query pairs.
///
/// Implementors must serialize to a JSON object of scalars or arrays of
/// scalars. `null` fields are dropped and arrays are joined with commas.
pub trait QueryFilter: Serialize {
    fn to_query_pairs(&self) -> Result<Vec<(String, String)>, ApiError> {
        let value = serde_json::to_value(self).map_err(|e| ApiError::Request(e.to_string()))?;
        let Value::Object(fields) = value else {
            return Err(ApiError::Request("query filter must serialize to an object".to_string()));
        };
        let mut pairs = Vec::with_capacity(fields.len());
        for (key, value) in fields {
            if let Some(rendered) = render(&key, value)? {
                pairs.push((key, rendered));
            }
        }
        Ok(pairs)
    }
}

fn render(key: &str, value: Value) -> Result<Option<String>, ApiError> {
    match value {
        Value::Null => Ok(None),
        Value::Array(items) => {
            let mut parts = Vec::with_capacity(items.len());
            for item in items {
                if let Some(part) = render_scalar(key, item)? {
                    parts.push(part);
                }
            }
            Ok((!parts.is_empty()).then(|| parts.join(",")))
        }
        other => render_scalar(key, other),
    }
}

fn render_scalar(key: &str, value: Value) -> Result<Option<String>, ApiError> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Array(_) | Value::Object(_) => Err(ApiError::Request(format!(
            "query parameter {key:?} is not a scalar"
        ))),
    }
}

/// Filters for `Session::get_products`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
}

impl QueryFilter for ProductFilter {}

/// Filters for `Session::get_orders`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderFilter {
    /// Order statuses to include; empty means all.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub status: Vec<String>,
}

impl QueryFilter for OrderFilter {}

/// Filters for `Session::get_transactions`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionFilter {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

impl QueryFilter for TransactionFilter {}

/// Query pairs for an optional filter. `None` and an empty filter agree.
pub fn pairs<F: QueryFilter>(filter: Option<&F>) -> Result<Vec<(String, String)>, ApiError> {
    filter.map_or_else(|| Ok(Vec::new()), |f| f.to_query_pairs())
}
