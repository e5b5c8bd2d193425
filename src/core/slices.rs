//! Turns per-holding values into a readable set of chart slices.

use super::valuation::ValuationLine;
use serde::Serialize;
use tracing::debug;

pub const DEFAULT_OTHER_THRESHOLD: f64 = 0.01;
pub const OTHER_LABEL: &str = "Other";
pub const OTHER_COLOR: &str = "#cccccc";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SliceInput {
    pub label: String,
    pub value: f64,
}

impl SliceInput {
    pub fn new(label: &str, value: f64) -> Self {
        Self {
            label: label.to_string(),
            value,
        }
    }
}

impl From<&ValuationLine> for SliceInput {
    fn from(line: &ValuationLine) -> Self {
        Self::new(&line.symbol, line.value_in_target)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Slice {
    pub label: String,
    pub value: f64,
    pub color: String,
    /// Labels merged into this slice. Only set on the "Other" slice.
    pub members: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Aggregation {
    pub slices: Vec<Slice>,
    pub other_members: Vec<String>,
}

impl Aggregation {
    pub fn total(&self) -> f64 {
        self.slices.iter().map(|slice| slice.value).sum()
    }

    /// Share of the emitted total held by `slice`, in percent.
    pub fn share_pct(&self, slice: &Slice) -> f64 {
        let total = self.total();
        if total > 0.0 {
            slice.value / total * 100.0
        } else {
            0.0
        }
    }
}

/// Buckets entries whose share of the total falls below `threshold` into a
/// single "Other" slice.
#[derive(Debug, Clone, Copy)]
pub struct SliceAggregator {
    threshold: f64,
}

impl Default for SliceAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_OTHER_THRESHOLD)
    }
}

impl SliceAggregator {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Sorts entries by value, descending, keeping input order among ties.
    /// The sum of the emitted slices equals the sum of the inputs.
    pub fn aggregate(&self, entries: &[SliceInput]) -> Aggregation {
        let grand_total: f64 = entries.iter().map(|entry| entry.value).sum();
        if entries.is_empty() || grand_total == 0.0 || !grand_total.is_finite() {
            debug!(grand_total, "Nothing to aggregate");
            return Aggregation::default();
        }

        let mut sorted: Vec<&SliceInput> = entries.iter().collect();
        sorted.sort_by(|a, b| b.value.total_cmp(&a.value));

        let mut slices = Vec::with_capacity(sorted.len() + 1);
        let mut other_members = Vec::new();
        let mut other_value = 0.0;
        for entry in sorted {
            if entry.value / grand_total < self.threshold {
                other_value += entry.value;
                other_members.push(entry.label.clone());
            } else {
                slices.push(Slice {
                    label: entry.label.clone(),
                    value: entry.value,
                    color: color_for(&entry.label),
                    members: None,
                });
            }
        }

        if other_value > 0.0 {
            slices.push(Slice {
                label: OTHER_LABEL.to_string(),
                value: other_value,
                color: OTHER_COLOR.to_string(),
                members: Some(other_members.clone()),
            });
        }
        debug!(
            retained = slices.len(),
            merged = other_members.len(),
            "Aggregated slices"
        );

        Aggregation {
            slices,
            other_members,
        }
    }
}

/// Stable display color for a label: the sum of its UTF-16 code units,
/// modulo 360, used as an HSL hue.
pub fn color_for(label: &str) -> String {
    let hue = label.encode_utf16().map(u32::from).sum::<u32>() % 360;
    format!("hsl({hue}, 65%, 55%)")
}
