//! Column type inference from a leading sample of rows.

use super::{CellValue, Column, ColumnType, Dataset};

/// Rows sampled per column.
pub const TYPE_SAMPLE_ROWS: usize = 100;

/// A column is numeric when strictly more than this share of its sampled
/// values parse as numbers.
pub const NUMERIC_THRESHOLD: f64 = 0.7;

/// A non-numeric column is a date when strictly more than this share of
/// its sampled values look like dates.
pub const DATE_THRESHOLD: f64 = 0.5;

const DATE_SEPARATORS: [char; 3] = ['-', '/', '.'];

/// Infer the type of `column` from the first [`TYPE_SAMPLE_ROWS`] rows.
///
/// Null cells are skipped; a column with no non-null sample is
/// [`ColumnType::Unknown`]. Text that fails numeric parsing but contains
/// `-`, `/` or `.` counts as a date candidate. Booleans count as neither.
pub fn infer_column_type(dataset: &Dataset, column: &str) -> ColumnType {
    let mut sampled = 0usize;
    let mut numeric = 0usize;
    let mut dates = 0usize;

    for value in dataset
        .column_values(column)
        .take(TYPE_SAMPLE_ROWS)
        .filter(|v| !v.is_null())
    {
        sampled += 1;
        match value {
            CellValue::Number(_) => numeric += 1,
            CellValue::Text(s) => {
                if value.as_number().is_some() {
                    numeric += 1;
                } else if s.contains(&DATE_SEPARATORS[..]) {
                    dates += 1;
                }
            }
            CellValue::Bool(_) | CellValue::Null => {}
        }
    }

    if sampled == 0 {
        return ColumnType::Unknown;
    }
    let n = sampled as f64;
    if numeric as f64 > n * NUMERIC_THRESHOLD {
        ColumnType::Numeric
    } else if dates as f64 > n * DATE_THRESHOLD {
        ColumnType::Date
    } else {
        ColumnType::Categorical
    }
}

/// Infer every declared column, in declaration order.
pub fn infer_column_types(dataset: &Dataset) -> Vec<Column> {
    dataset
        .columns
        .iter()
        .map(|name| Column {
            name: name.clone(),
            column_type: infer_column_type(dataset, name),
        })
        .collect()
}
