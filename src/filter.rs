//! Eligibility filtering of raw extracted rows.
//!
//! The extraction layer (spreadsheet reader or web client) delivers one
//! `RawRow` per source row, with the visual highlighting of the id and weight
//! cells already reduced to two booleans. This module decides which rows
//! become candidate items: rows with a mark on either field are excluded,
//! rows with a missing id or unparseable weight are dropped silently.
//!
//! Dropping is a policy, not an error. The filter never fails; it only counts
//! what it discarded.

use serde::Deserialize;
use serde_json::Value;
use utoipa::ToSchema;

use crate::model::{Item, ValidationError};

/// A weight cell as extracted from the source: either numeric or a
/// numeric-looking string.
#[derive(Clone, Debug, Deserialize)]
#[serde(untagged)]
pub enum WeightValue {
    Number(f64),
    Text(String),
}

impl WeightValue {
    /// Parses the cell into a number, trimming textual values.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            WeightValue::Number(n) => Some(*n),
            WeightValue::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }
}

/// One raw row from the extraction layer.
///
/// # Fields
/// * `category` - Arbitrary scalar from the category column, may be absent
/// * `id` - Identifier cell value
/// * `weight` - Weight cell value (number or numeric string)
/// * `id_marked` - True if the id cell carries a non-default highlight
/// * `weight_marked` - True if the weight cell carries a non-default highlight
#[derive(Clone, Debug, Deserialize, ToSchema)]
pub struct RawRow {
    #[serde(default)]
    #[schema(value_type = Option<Object>, example = "Category_A")]
    pub category: Option<Value>,
    #[serde(default)]
    #[schema(example = "WOOD_CHIP_001")]
    pub id: Option<String>,
    #[serde(default)]
    #[schema(value_type = Option<Object>, example = 123.45)]
    pub weight: Option<WeightValue>,
    #[serde(default)]
    pub id_marked: bool,
    #[serde(default)]
    pub weight_marked: bool,
}

/// Counts of silently dropped rows, by reason.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, ToSchema)]
pub struct DropStats {
    /// Rows excluded because a relevant cell was highlighted.
    pub marked: usize,
    /// Rows without a usable identifier.
    pub missing_id: usize,
    /// Rows whose weight could not be parsed as a non-negative number.
    pub bad_weight: usize,
}

impl DropStats {
    /// Total number of dropped rows.
    pub fn total(&self) -> usize {
        self.marked + self.missing_id + self.bad_weight
    }
}

/// Result of one filter pass: the candidate items plus drop diagnostics.
#[derive(Clone, Debug, Default)]
pub struct FilterOutcome {
    pub items: Vec<Item>,
    pub dropped: DropStats,
}

/// Reduces a scalar category cell to a label. Non-scalar values are treated
/// as absent.
fn category_label(value: Option<Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    }
}

/// Applies the eligibility rules to a sequence of raw rows.
///
/// A row survives only if neither relevant cell is marked, its id is
/// non-empty and its weight parses as a finite non-negative number. Weights
/// are rounded to 2 decimals here; the engine never re-derives precision.
/// This is a pure transform and never errors.
pub fn filter_rows(rows: Vec<RawRow>) -> FilterOutcome {
    let mut outcome = FilterOutcome::default();

    for row in rows {
        if row.id_marked || row.weight_marked {
            outcome.dropped.marked += 1;
            continue;
        }

        let Some(weight) = row.weight.as_ref().and_then(WeightValue::as_f64) else {
            outcome.dropped.bad_weight += 1;
            continue;
        };

        match Item::new(
            category_label(row.category),
            row.id.unwrap_or_default(),
            weight,
        ) {
            Ok(item) => outcome.items.push(item),
            Err(ValidationError::MissingId) => outcome.dropped.missing_id += 1,
            Err(_) => outcome.dropped.bad_weight += 1,
        }
    }

    outcome
}
