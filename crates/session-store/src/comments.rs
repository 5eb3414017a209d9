//! Recipe rating aggregation over stored comments
//!
//! Comments are written elsewhere as a JSON array under `comments`. Entries
//! are loosely typed (ids may be numbers or strings, ratings may be missing),
//! so fields are kept as raw JSON and interpreted on read.

use std::fmt::Display;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::ParseError;
use crate::session::is_truthy;
use crate::storage::KeyValueStore;

/// Storage key holding the comment array
pub const COMMENTS_KEY: &str = "comments";

/// One stored comment
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentRecord {
    /// `None` when the field is missing, which keys as `"undefined"`
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub recipe_id: Option<Value>,
    #[serde(default)]
    pub rating: Value,
    #[serde(default)]
    pub is_deleted: Value,
}

impl CommentRecord {
    pub fn new(recipe_id: impl Into<Value>, rating: impl Into<Value>, is_deleted: bool) -> Self {
        Self {
            recipe_id: Some(recipe_id.into()),
            rating: rating.into(),
            is_deleted: Value::Bool(is_deleted),
        }
    }

    /// Recipe id in the string form used for matching
    pub fn recipe_key(&self) -> String {
        match &self.recipe_id {
            Some(id) => stringify(id),
            None => "undefined".to_string(),
        }
    }

    /// Numeric rating; anything non-numeric counts as 0
    pub fn rating_value(&self) -> f64 {
        match &self.rating {
            Value::Number(n) => n.as_f64().unwrap_or(0.0),
            Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    pub fn is_deleted(&self) -> bool {
        is_truthy(&self.is_deleted)
    }
}

/// Keeps an explicit `null` distinct from a missing field
fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                i.to_string()
            } else if let Some(u) = n.as_u64() {
                u.to_string()
            } else {
                // f64 Display drops a trailing ".0"
                n.as_f64().map(|f| f.to_string()).unwrap_or_default()
            }
        }
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Aggregate rating for one recipe
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecipeStats {
    /// Mean rating rounded to one decimal place; 0 when there are no ratings
    pub average: f64,
    pub count: usize,
}

/// Parse the stored comments, reporting why they could not be read
pub fn try_load_comments<S: KeyValueStore>(storage: &S) -> Result<Vec<CommentRecord>, ParseError> {
    let parse_error = |reason: String| ParseError {
        key: COMMENTS_KEY,
        reason,
    };

    let Some(raw) = storage
        .get_item(COMMENTS_KEY)
        .map_err(|e| parse_error(e.to_string()))?
    else {
        return Ok(Vec::new());
    };

    match serde_json::from_str::<Value>(&raw).map_err(|e| parse_error(e.to_string()))? {
        // Non-object entries carry no fields; `null` entries are dropped
        Value::Array(items) => Ok(items
            .into_iter()
            .filter(|item| !item.is_null())
            .map(|item| serde_json::from_value(item).unwrap_or_default())
            .collect()),
        other if !is_truthy(&other) => Ok(Vec::new()),
        other => Err(parse_error(format!("expected an array, found {other}"))),
    }
}

/// Load stored comments; unreadable data yields an empty list
pub fn load_comments<S: KeyValueStore>(storage: &S) -> Vec<CommentRecord> {
    try_load_comments(storage).unwrap_or_else(|e| {
        debug!(error = %e, "Ignoring unreadable comments");
        Vec::new()
    })
}

/// Rating stats over live comments for `recipe_id`
pub fn recipe_stats(comments: &[CommentRecord], recipe_id: impl Display) -> RecipeStats {
    let wanted = recipe_id.to_string();
    let (count, total) = comments
        .iter()
        .filter(|c| !c.is_deleted() && c.recipe_key() == wanted)
        .fold((0usize, 0.0f64), |(count, total), c| {
            (count + 1, total + c.rating_value())
        });

    let average = if count == 0 {
        0.0
    } else {
        round_one_decimal(total / count as f64)
    };

    RecipeStats { average, count }
}

/// Load comments from `storage` and aggregate for `recipe_id`
pub fn stats_for<S: KeyValueStore>(storage: &S, recipe_id: impl Display) -> RecipeStats {
    recipe_stats(&load_comments(storage), recipe_id)
}

/// Half-up rounding to one decimal place
fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0 + 0.5).floor() / 10.0
}
