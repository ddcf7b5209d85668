//! Data models for weight-based combo grouping.
//!
//! This module defines the fundamental data structures of the grouping run:
//! - `Item`: a uniquely-identified unit with a measured weight
//! - `Combo`: a committed group of items whose total weight meets the target
//! - `RunResult`: the full partition of a run (combos plus leftovers)
//!
//! Items are immutable once created; combos and run results are plain value
//! types produced by a single engine invocation.

use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use utoipa::ToSchema;

/// Validation error for caller-supplied data.
#[derive(Debug, Clone)]
pub enum ValidationError {
    InvalidTarget(String),
    InvalidWeight(String),
    MissingId,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::InvalidTarget(msg) => write!(f, "Invalid target weight: {}", msg),
            ValidationError::InvalidWeight(msg) => write!(f, "Invalid weight: {}", msg),
            ValidationError::MissingId => write!(f, "Item id is missing or empty"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Rounds a weight to 2 decimal places.
///
/// Applied once at ingestion; the rounded value is authoritative for all
/// subsequent arithmetic.
#[inline]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// A single unit to be grouped.
///
/// # Fields
/// * `category` - Opaque label from the source data, may be absent
/// * `id` - Unique string identifier; the grouping key
/// * `weight` - Non-negative weight, fixed at 2-decimal precision
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Item {
    #[schema(example = json!("Category_A"))]
    pub category: Option<String>,
    #[schema(example = json!("WOOD_CHIP_001"))]
    pub id: String,
    #[schema(example = json!(123.45))]
    pub weight: f64,
}

impl Item {
    /// Creates a new item with validation.
    ///
    /// The id must be non-empty after trimming and the weight must be a
    /// finite, non-negative number. The weight is rounded to 2 decimals.
    ///
    /// # Examples
    /// ```
    /// use combo_batch::model::Item;
    ///
    /// let item = Item::new(None, "A-001", 123.456);
    /// assert_eq!(item.unwrap().weight, 123.46);
    ///
    /// assert!(Item::new(None, "  ", 10.0).is_err());
    /// assert!(Item::new(None, "A-002", -1.0).is_err());
    /// ```
    pub fn new(
        category: Option<String>,
        id: impl Into<String>,
        weight: f64,
    ) -> Result<Self, ValidationError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(ValidationError::MissingId);
        }
        if !weight.is_finite() || weight < 0.0 {
            return Err(ValidationError::InvalidWeight(format!(
                "must be a finite non-negative number, got: {}",
                weight
            )));
        }
        Ok(Self {
            category,
            id,
            weight: round2(weight),
        })
    }
}

/// A committed group of items.
///
/// A combo is a result value: once returned by the engine it is never
/// extended or mutated.
///
/// # Fields
/// * `items` - Members in the order they were added to the trial
/// * `total_weight` - Sum of member weights
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct Combo {
    pub items: Vec<Item>,
    pub total_weight: f64,
}

impl Combo {
    /// Number of members in the combo.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Ids of all members, in member order.
    pub fn item_ids(&self) -> Vec<String> {
        self.items.iter().map(|item| item.id.clone()).collect()
    }
}

/// The full outcome of one grouping invocation.
///
/// # Fields
/// * `combos` - Committed combos in commitment order
/// * `leftovers` - Candidate items never placed into any combo
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct RunResult {
    pub combos: Vec<Combo>,
    pub leftovers: Vec<Item>,
}

impl RunResult {
    /// Indicates whether every candidate item was placed.
    pub fn is_complete(&self) -> bool {
        self.leftovers.is_empty()
    }

    /// Number of committed combos.
    pub fn combo_count(&self) -> usize {
        self.combos.len()
    }

    /// Number of leftover items.
    pub fn leftover_count(&self) -> usize {
        self.leftovers.len()
    }

    /// Number of items placed into combos.
    pub fn grouped_item_count(&self) -> usize {
        self.combos.iter().map(Combo::item_count).sum()
    }

    /// Total weight across all committed combos.
    pub fn total_grouped_weight(&self) -> f64 {
        self.combos.iter().map(|c| c.total_weight).sum()
    }

    /// Items placed into combos, flattened in commitment order.
    pub fn grouped_items(&self) -> impl Iterator<Item = &Item> {
        self.combos.iter().flat_map(|c| c.items.iter())
    }
}
