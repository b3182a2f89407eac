//! Per-column aggregate statistics for numeric columns.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::Dataset;

/// Aggregates over the parseable values of one numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistic {
    pub column: String,
    pub min: f64,
    pub max: f64,
    pub sum: f64,
    pub mean: f64,
    pub median: f64,
    /// Parsed values only; never exceeds the dataset's row count.
    pub count: usize,
}

/// Statistics keyed by column name, in the order the columns were given.
pub type Statistics = IndexMap<String, Statistic>;

/// Compute a [`Statistic`] for each of `numeric_columns`.
///
/// Cells are cleaned with [`super::CellValue::as_number`]; nulls and
/// unparseable cells are excluded. A column with no parseable value, or
/// whose sum overflows, is left out of the result.
pub fn compute_statistics(dataset: &Dataset, numeric_columns: &[&str]) -> Statistics {
    let mut out = Statistics::new();
    for &column in numeric_columns {
        let mut values: Vec<f64> = dataset
            .column_values(column)
            .filter_map(|v| v.as_number())
            .collect();
        if values.is_empty() {
            continue;
        }

        let sum: f64 = values.iter().sum();
        if !sum.is_finite() {
            continue;
        }
        let count = values.len();
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        out.insert(
            column.to_string(),
            Statistic {
                column: column.to_string(),
                min,
                max,
                sum,
                mean: sum / count as f64,
                median: median(&mut values),
                count,
            },
        );
    }
    out
}

/// Median of a non-empty slice; sorts it in place.
fn median(values: &mut [f64]) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();
    if n % 2 == 0 {
        values[n / 2 - 1] / 2.0 + values[n / 2] / 2.0
    } else {
        values[n / 2]
    }
}
