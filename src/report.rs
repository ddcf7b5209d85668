//! Presentation and export of run results.
//!
//! Two consumers are served here: a plain-text summary for console-style
//! display, and a structured `ExportDocument` (one section per combo, then
//! used/unused rosters grouped by category) that downstream writers can
//! serialize into whatever document format they need. The engine itself only
//! ever hands over plain data.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Serialize;
use utoipa::ToSchema;

use crate::model::{Item, RunResult};

/// Accumulates item ids per category for the used/unused rosters.
///
/// Categories are kept in sorted order; items without a category land in a
/// trailing unlabeled group. Ids within a group are sorted.
#[derive(Clone, Debug, Default)]
pub struct CategoryTally {
    labeled: BTreeMap<String, Vec<String>>,
    unlabeled: Vec<String>,
}

impl CategoryTally {
    /// Creates an empty tally.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one item to its category bucket.
    pub fn add(&mut self, item: &Item) {
        match &item.category {
            Some(category) => self
                .labeled
                .entry(category.clone())
                .or_default()
                .push(item.id.clone()),
            None => self.unlabeled.push(item.id.clone()),
        }
    }

    /// Finishes the tally into sorted category groups.
    pub fn into_groups(self) -> Vec<CategoryGroup> {
        let mut groups: Vec<CategoryGroup> = self
            .labeled
            .into_iter()
            .map(|(category, mut ids)| {
                ids.sort();
                CategoryGroup {
                    category: Some(category),
                    ids,
                }
            })
            .collect();
        if !self.unlabeled.is_empty() {
            let mut ids = self.unlabeled;
            ids.sort();
            groups.push(CategoryGroup { category: None, ids });
        }
        groups
    }
}

/// Item ids sharing one category.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct CategoryGroup {
    pub category: Option<String>,
    pub ids: Vec<String>,
}

/// One exported member row.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct ExportRow {
    pub id: String,
    pub category: Option<String>,
    pub weight: f64,
}

/// One exported combo section: header data plus member rows.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct ComboSection {
    pub index: usize,
    pub total_weight: f64,
    pub item_count: usize,
    pub rows: Vec<ExportRow>,
}

/// Structured export of a full run: combo sections followed by the used and
/// unused rosters grouped by category.
#[derive(Clone, Debug, Serialize, ToSchema)]
pub struct ExportDocument {
    pub sections: Vec<ComboSection>,
    pub used_by_category: Vec<CategoryGroup>,
    pub unused_by_category: Vec<CategoryGroup>,
}

impl ExportDocument {
    /// Builds the export document from a run result.
    pub fn from_result(result: &RunResult) -> Self {
        let sections = result
            .combos
            .iter()
            .enumerate()
            .map(|(i, combo)| ComboSection {
                index: i + 1,
                total_weight: combo.total_weight,
                item_count: combo.item_count(),
                rows: combo
                    .items
                    .iter()
                    .map(|item| ExportRow {
                        id: item.id.clone(),
                        category: item.category.clone(),
                        weight: item.weight,
                    })
                    .collect(),
            })
            .collect();

        let mut used = CategoryTally::new();
        for item in result.grouped_items() {
            used.add(item);
        }
        let mut unused = CategoryTally::new();
        for item in &result.leftovers {
            unused.add(item);
        }

        Self {
            sections,
            used_by_category: used.into_groups(),
            unused_by_category: unused.into_groups(),
        }
    }
}

/// Renders a run result as a plain-text summary.
pub fn render_text(result: &RunResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "====== Grouping summary ======");
    let _ = writeln!(out);

    for (i, combo) in result.combos.iter().enumerate() {
        let _ = writeln!(
            out,
            "[Combo {}] total weight: {:.2} / items: {}",
            i + 1,
            combo.total_weight,
            combo.item_count()
        );
        for item in &combo.items {
            let _ = writeln!(out, " - {} ({:.2})", item.id, item.weight);
        }
        let _ = writeln!(out);
    }

    let mut used_ids: Vec<&str> = result.grouped_items().map(|it| it.id.as_str()).collect();
    used_ids.sort_unstable();
    let _ = writeln!(out, "Items grouped: {}", used_ids.join(", "));

    if result.leftovers.is_empty() {
        let _ = writeln!(out, "All items were grouped.");
    } else {
        let mut leftover_ids: Vec<&str> =
            result.leftovers.iter().map(|it| it.id.as_str()).collect();
        leftover_ids.sort_unstable();
        let _ = writeln!(out, "Items left over: {}", leftover_ids.join(", "));
    }

    out
}
