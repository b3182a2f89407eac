//! Tabular profiling: type inference, statistics, and dashboard synthesis.
//!
//! A [`Dataset`] is a declared list of column names plus positional rows
//! of [`CellValue`]s. Rows are validated once, at construction, so the
//! pipeline stages never deal with ragged input.
//!
//! # Pipeline
//!
//! 1. [`infer::infer_column_types`] samples the first rows of each column.
//! 2. [`stats::compute_statistics`] aggregates every numeric column.
//! 3. [`synth::synthesize`] derives KPIs, chart specs, insights, and a
//!    dashboard title.
//!
//! [`analyze`] runs all three in order.

pub mod infer;
pub mod naming;
pub mod stats;
pub mod synth;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub use infer::{infer_column_type, infer_column_types};
pub use stats::{compute_statistics, Statistic, Statistics};
pub use synth::{synthesize, Dashboard};

/// A single raw cell as parsed from CSV, JSON, or a workbook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum CellValue {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

static NULL_CELL: CellValue = CellValue::Null;

/// Characters removed before parsing a text cell as a number.
const NUMERIC_NOISE: [char; 3] = [',', '$', '%'];

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Null or empty text: the cell carries no data.
    pub fn is_missing(&self) -> bool {
        match self {
            CellValue::Null => true,
            CellValue::Text(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Whether the cell counts as a present value when tallying categories:
    /// null, `false`, zero, and empty text do not.
    pub fn is_truthy(&self) -> bool {
        match self {
            CellValue::Null => false,
            CellValue::Bool(b) => *b,
            CellValue::Number(n) => *n != 0.0,
            CellValue::Text(s) => !s.is_empty(),
        }
    }

    /// Clean and parse the cell as a finite number.
    ///
    /// Numbers pass through. Text has `,` `$` `%` stripped and surrounding
    /// whitespace trimmed before parsing. Everything else, and any
    /// non-finite result, yields `None`.
    pub fn as_number(&self) -> Option<f64> {
        let n = match self {
            CellValue::Number(n) => *n,
            CellValue::Text(s) => {
                let cleaned: String = s.chars().filter(|c| !NUMERIC_NOISE.contains(c)).collect();
                cleaned.trim().parse::<f64>().ok()?
            }
            CellValue::Null | CellValue::Bool(_) => return None,
        };
        n.is_finite().then_some(n)
    }

    /// Display label used for grouping and chart axes; null becomes `"Unknown"`.
    pub fn label(&self) -> String {
        match self {
            CellValue::Null => "Unknown".to_string(),
            CellValue::Bool(true) => "True".to_string(),
            CellValue::Bool(false) => "False".to_string(),
            CellValue::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            CellValue::Text(s) => s.clone(),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        CellValue::Text(s)
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

/// Inferred kind of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Numeric,
    Date,
    Categorical,
    Unknown,
}

/// A column name with its inferred type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub column_type: ColumnType,
}

/// One row, positionally aligned with [`Dataset::columns`].
pub type Row = Vec<CellValue>;

/// The active table of a session: declared columns and aligned rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Dataset {
    /// Build a dataset, padding short rows with nulls and dropping cells
    /// beyond the declared columns.
    pub fn new(columns: Vec<String>, rows: Vec<Row>) -> Self {
        let width = columns.len();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, CellValue::Null);
                row
            })
            .collect();
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of the first column with this name.
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }

    /// The cell at `row` for `column`; null when either is out of range.
    pub fn value(&self, row: usize, column: &str) -> &CellValue {
        match (self.rows.get(row), self.column_index(column)) {
            (Some(r), Some(i)) => cell(r, Some(i)),
            _ => &NULL_CELL,
        }
    }

    /// Every cell of `column` in row order (all null for an unknown column).
    pub fn column_values<'a>(&'a self, column: &str) -> impl Iterator<Item = &'a CellValue> + 'a {
        let idx = self.column_index(column);
        self.rows.iter().map(move |row| cell(row, idx))
    }

    /// The first `limit` rows as column-name → value records, for previews.
    pub fn records(&self, limit: usize) -> Vec<IndexMap<String, CellValue>> {
        self.rows
            .iter()
            .take(limit)
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }
}

fn cell(row: &Row, idx: Option<usize>) -> &CellValue {
    idx.and_then(|i| row.get(i)).unwrap_or(&NULL_CELL)
}

/// Everything derived from one dataset upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    pub columns: Vec<Column>,
    pub statistics: Statistics,
    pub dashboard: Dashboard,
}

/// Infer types, compute statistics, and synthesize the dashboard.
///
/// `label` is the uploaded file name; it feeds the dashboard title and
/// the row-count KPI description.
pub fn analyze(dataset: &Dataset, label: &str) -> Analysis {
    let columns = infer_column_types(dataset);
    let numeric: Vec<&str> = columns
        .iter()
        .filter(|c| c.column_type == ColumnType::Numeric)
        .map(|c| c.name.as_str())
        .collect();
    let statistics = compute_statistics(dataset, &numeric);
    let dashboard = synthesize(dataset, &columns, &statistics, label);

    Analysis {
        columns,
        statistics,
        dashboard,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_number_cleans_noise() {
        assert_eq!(CellValue::from("1,000").as_number(), Some(1000.0));
        assert_eq!(CellValue::from("$12.50").as_number(), Some(12.5));
        assert_eq!(CellValue::from(" 45% ").as_number(), Some(45.0));
        assert_eq!(CellValue::from(7.0).as_number(), Some(7.0));
        assert_eq!(CellValue::from("abc").as_number(), None);
        assert_eq!(CellValue::from("").as_number(), None);
        assert_eq!(CellValue::from("inf").as_number(), None);
        assert_eq!(CellValue::Null.as_number(), None);
        assert_eq!(CellValue::Bool(true).as_number(), None);
    }

    #[test]
    fn test_labels() {
        assert_eq!(CellValue::Null.label(), "Unknown");
        assert_eq!(CellValue::Number(3.0).label(), "3");
        assert_eq!(CellValue::Number(2.5).label(), "2.5");
        assert_eq!(CellValue::Bool(false).label(), "False");
        assert_eq!(CellValue::from("East").label(), "East");
    }

    #[test]
    fn test_missing_and_truthy() {
        assert!(CellValue::Null.is_missing());
        assert!(CellValue::from("").is_missing());
        assert!(!CellValue::Number(0.0).is_missing());
        assert!(!CellValue::Number(0.0).is_truthy());
        assert!(CellValue::from("x").is_truthy());
    }

    #[test]
    fn test_dataset_new_aligns_rows() {
        let ds = Dataset::new(
            vec!["a".into(), "b".into()],
            vec![
                vec![CellValue::from("1")],
                vec!["1".into(), "2".into(), "3".into()],
            ],
        );
        assert_eq!(ds.rows[0].len(), 2);
        assert!(ds.rows[0][1].is_null());
        assert_eq!(ds.rows[1].len(), 2);
        assert_eq!(ds.value(1, "b"), &CellValue::from("2"));
        assert!(ds.value(5, "a").is_null());
        assert!(ds.value(0, "missing").is_null());
    }

    #[test]
    fn test_records_preview() {
        let ds = Dataset::new(
            vec!["name".into(), "qty".into()],
            vec![
                vec!["x".into(), CellValue::Number(1.0)],
                vec!["y".into(), CellValue::Number(2.0)],
            ],
        );
        let recs = ds.records(1);
        assert_eq!(recs.len(), 1);
        let json = serde_json::to_string(&recs[0]).unwrap();
        assert_eq!(json, r#"{"name":"x","qty":1.0}"#);
    }

    #[test]
    fn test_cell_value_json_roundtrip_shapes() {
        let v: Vec<CellValue> = serde_json::from_str(r#"[null, true, 3, "t"]"#).unwrap();
        assert_eq!(
            v,
            vec![
                CellValue::Null,
                CellValue::Bool(true),
                CellValue::Number(3.0),
                CellValue::Text("t".into())
            ]
        );
    }

    #[test]
    fn test_analyze_end_to_end() {
        let rows = vec![
            vec!["East".into(), "100".into()],
            vec!["West".into(), "300".into()],
            vec!["East".into(), "200".into()],
        ];
        let ds = Dataset::new(vec!["region".into(), "sales".into()], rows);
        let analysis = analyze(&ds, "q1_sales.csv");
        assert_eq!(analysis.columns[0].column_type, ColumnType::Categorical);
        assert_eq!(analysis.columns[1].column_type, ColumnType::Numeric);
        assert_eq!(analysis.statistics["sales"].sum, 600.0);
        assert_eq!(
            analysis.dashboard.dashboard_name,
            "Q1 Sales - Sales Analytics"
        );
    }

    #[test]
    fn test_analysis_with_huge_values_survives_json() {
        let rows = vec![vec!["1e307".into()], vec!["1e307".into()]];
        let ds = Dataset::new(vec!["amount".into()], rows);
        let analysis = analyze(&ds, "big.csv");
        assert_eq!(analysis.statistics["amount"].sum, 2e307);
        assert_eq!(
            analysis.dashboard.kpis[1].value,
            synth::Metric::Amount(2e307)
        );

        let json = serde_json::to_string(&analysis).unwrap();
        let back: Analysis = serde_json::from_str(&json).unwrap();
        assert_eq!(back.statistics, analysis.statistics);
        assert_eq!(back.dashboard, analysis.dashboard);
    }
}
