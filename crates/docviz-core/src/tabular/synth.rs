//! Dashboard synthesis: KPI cards, chart specifications, and insights.
//!
//! Everything here is a pure function of the dataset, its typed columns,
//! and the computed statistics. Output depends only on input order, so
//! the same upload always yields the same dashboard.
//!
//! Numbers are rounded on their exact binary value with ties to even
//! (`0.125` → `0.12`, `2.675` → `2.67`) and printed in titles and insight
//! strings with a fractional part (`1500.0`, `12.35`).

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::naming::dashboard_name;
use super::{Column, ColumnType, Dataset, Statistic, Statistics};

/// Maximum number of KPI cards.
pub const MAX_KPIS: usize = 6;
/// Maximum number of insights.
pub const MAX_INSIGHTS: usize = 6;

/// Categories kept in the column chart.
pub const COLUMN_CHART_TOP: usize = 8;
/// Column chart label length, in characters.
pub const COLUMN_LABEL_CHARS: usize = 12;
/// Slices kept in the distribution chart.
pub const DISTRIBUTION_TOP: usize = 6;
/// Distribution and comparison label length, in characters.
pub const SERIES_LABEL_CHARS: usize = 15;

/// The trend chart needs strictly more rows than this.
pub const TREND_MIN_ROWS: usize = 5;
/// Leading rows walked by the trend chart.
pub const TREND_MAX_POINTS: usize = 30;
/// Parsed values required before a trend chart is emitted.
pub const TREND_MIN_VALUES: usize = 3;
/// Date label length on the trend chart, in characters.
pub const TREND_LABEL_CHARS: usize = 10;

/// Fewer charts than this triggers the backfill bar chart.
pub const MIN_CHARTS: usize = 3;
/// Leading rows used by the backfill bar chart.
pub const BACKFILL_ROWS: usize = 10;

/// `max > mean * HIGH_VARIANCE_FACTOR` flags a column as high variance.
pub const HIGH_VARIANCE_FACTOR: f64 = 5.0;

const STAT_LABELS: [&str; 3] = ["Average", "Maximum", "Minimum"];

/// The generated dashboard for one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    pub dashboard_name: String,
    pub kpis: Vec<Kpi>,
    pub charts: Vec<Chart>,
    pub insights: Vec<Insight>,
}

/// A KPI value: a row or distinct-value count, or a rounded amount.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Metric {
    Count(usize),
    Amount(f64),
}

/// One summary card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kpi {
    pub label: String,
    pub value: Metric,
    pub icon: String,
    pub description: String,
}

/// Stable identifiers the front end lays charts out by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChartId {
    ColumnChart,
    DistributionChart,
    ComparisonChart,
    TrendChart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Doughnut,
    Line,
}

/// A named series of a grouped chart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub label: String,
    pub data: Vec<f64>,
}

/// A chart specification. Single-series charts carry `data`; grouped
/// charts carry `datasets`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    pub id: ChartId,
    #[serde(rename = "type")]
    pub kind: ChartKind,
    pub title: String,
    pub labels: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub datasets: Vec<Series>,
    pub insight: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub full_width: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InsightKind {
    Warning,
    TrendUp,
    Info,
}

/// A short natural-language observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub icon: String,
    #[serde(rename = "type")]
    pub kind: InsightKind,
    pub title: String,
    pub description: String,
}

/// Build the full dashboard for `dataset`. `label` is the source file name.
pub fn synthesize(
    dataset: &Dataset,
    columns: &[Column],
    stats: &Statistics,
    label: &str,
) -> Dashboard {
    Dashboard {
        dashboard_name: dashboard_name(label, &dataset.columns),
        kpis: kpis(dataset, columns, stats, label),
        charts: charts(dataset, columns, stats),
        insights: insights(dataset, columns, stats),
    }
}

/// Row count, then sum and mean of the first column with statistics, then
/// the distinct count of the first categorical column.
pub fn kpis(dataset: &Dataset, columns: &[Column], stats: &Statistics, label: &str) -> Vec<Kpi> {
    let mut kpis = vec![Kpi {
        label: "Total Records".to_string(),
        value: Metric::Count(dataset.len()),
        icon: "database".to_string(),
        description: format!("Total rows in {}", label),
    }];

    if let Some(s) = first_with_stats(columns, stats) {
        kpis.push(Kpi {
            label: format!("Total {}", s.column),
            value: Metric::Amount(round_to(s.sum, 2)),
            icon: "trending-up".to_string(),
            description: format!("Sum of all {} values", s.column),
        });
        kpis.push(Kpi {
            label: format!("Avg {}", s.column),
            value: Metric::Amount(round_to(s.mean, 2)),
            icon: "bar-chart".to_string(),
            description: format!("Average {}", s.column),
        });
    }

    if let Some(col) = of_type(columns, ColumnType::Categorical).first() {
        let distinct: HashSet<String> = dataset
            .column_values(col)
            .filter(|v| v.is_truthy())
            .map(|v| v.label())
            .collect();
        kpis.push(Kpi {
            label: format!("Unique {}", col),
            value: Metric::Count(distinct.len()),
            icon: "layers".to_string(),
            description: format!("Distinct values in {}", col),
        });
    }

    kpis.truncate(MAX_KPIS);
    kpis
}

/// Column, distribution, comparison, and trend charts, each emitted only
/// when the data supports it, plus a backfill bar chart when too few
/// charts were produced.
pub fn charts(dataset: &Dataset, columns: &[Column], stats: &Statistics) -> Vec<Chart> {
    let numeric = of_type(columns, ColumnType::Numeric);
    let categorical = of_type(columns, ColumnType::Categorical);

    let mut charts = Vec::new();
    if let (Some(cat), Some(num)) = (categorical.first(), numeric.first()) {
        charts.extend(column_chart(dataset, cat, num));
    }
    // Second categorical column when there is one.
    if let Some(cat) = categorical.get(1).or_else(|| categorical.first()) {
        charts.extend(distribution_chart(dataset, cat));
    }
    charts.extend(comparison_chart(&numeric, stats));
    if let Some(num) = numeric.first() {
        let date_col = of_type(columns, ColumnType::Date).first().copied();
        charts.extend(trend_chart(dataset, num, date_col));
    }

    if charts.len() < MIN_CHARTS {
        if let Some(num) = numeric.first() {
            let has_column_chart = charts.iter().any(|c| c.id == ChartId::ColumnChart);
            if stats.contains_key(*num) && !has_column_chart {
                if let Some(chart) = backfill_chart(dataset, num) {
                    charts.insert(0, chart);
                }
            }
        }
    }

    charts
}

fn column_chart(dataset: &Dataset, cat: &str, num: &str) -> Option<Chart> {
    let mut totals: IndexMap<String, f64> = IndexMap::new();
    for (category, value) in dataset.column_values(cat).zip(dataset.column_values(num)) {
        if let Some(v) = value.as_number() {
            *totals.entry(category.label()).or_insert(0.0) += v;
        }
    }

    let mut sorted: Vec<(String, f64)> = totals.into_iter().collect();
    sorted.retain(|(_, total)| total.is_finite());
    sorted.sort_by(|a, b| b.1.total_cmp(&a.1));
    sorted.truncate(COLUMN_CHART_TOP);
    let (top_label, top_value) = sorted.first()?.clone();

    Some(Chart {
        id: ChartId::ColumnChart,
        kind: ChartKind::Bar,
        title: format!("Column: {} by {}", num, cat),
        labels: sorted
            .iter()
            .map(|(l, _)| truncate_chars(l, COLUMN_LABEL_CHARS))
            .collect(),
        data: Some(sorted.iter().map(|(_, v)| round_to(*v, 2)).collect()),
        datasets: Vec::new(),
        insight: format!("Top: {} ({})", top_label, fmt_float(round_to(top_value, 2))),
        full_width: false,
    })
}

fn distribution_chart(dataset: &Dataset, cat: &str) -> Option<Chart> {
    let mut counts: IndexMap<String, usize> = IndexMap::new();
    for value in dataset.column_values(cat) {
        *counts.entry(value.label()).or_insert(0) += 1;
    }

    let mut sorted: Vec<(String, usize)> = counts.into_iter().collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1));
    sorted.truncate(DISTRIBUTION_TOP);
    let (top_label, top_count) = sorted.first()?.clone();
    let total: usize = sorted.iter().map(|(_, n)| n).sum();

    Some(Chart {
        id: ChartId::DistributionChart,
        kind: ChartKind::Doughnut,
        title: format!("Distribution: {}", cat),
        labels: sorted
            .iter()
            .map(|(l, _)| truncate_chars(l, SERIES_LABEL_CHARS))
            .collect(),
        data: Some(sorted.iter().map(|(_, n)| *n as f64).collect()),
        datasets: Vec::new(),
        insight: format!(
            "Largest: {} ({}%)",
            top_label,
            fmt_float(percent(top_count, total))
        ),
        full_width: false,
    })
}

fn comparison_chart(numeric: &[&str], stats: &Statistics) -> Option<Chart> {
    let with_stats: Vec<&Statistic> = numeric.iter().filter_map(|c| stats.get(*c)).collect();

    match with_stats.as_slice() {
        [] => None,
        [only] => Some(Chart {
            id: ChartId::ComparisonChart,
            kind: ChartKind::Bar,
            title: format!("Statistics: {}", only.column),
            labels: stat_labels(),
            data: Some(stat_triplet(only)),
            datasets: Vec::new(),
            insight: format!(
                "Range: {} to {}",
                fmt_float(round_to(only.min, 2)),
                fmt_float(round_to(only.max, 2))
            ),
            full_width: false,
        }),
        [first, second, ..] => Some(Chart {
            id: ChartId::ComparisonChart,
            kind: ChartKind::Bar,
            title: "Comparison: Metrics".to_string(),
            labels: stat_labels(),
            data: None,
            datasets: [first, second]
                .iter()
                .map(|s| Series {
                    label: truncate_chars(&s.column, SERIES_LABEL_CHARS),
                    data: stat_triplet(s),
                })
                .collect(),
            insight: format!("Comparing {} vs {} metrics", first.column, second.column),
            full_width: false,
        }),
    }
}

fn trend_chart(dataset: &Dataset, num: &str, date_col: Option<&str>) -> Option<Chart> {
    if dataset.len() <= TREND_MIN_ROWS {
        return None;
    }

    let mut values = Vec::new();
    let mut labels = Vec::new();
    for i in 0..dataset.len().min(TREND_MAX_POINTS) {
        let Some(v) = dataset.value(i, num).as_number() else {
            continue;
        };
        values.push(v);
        labels.push(match date_col {
            Some(d) => truncate_chars(&dataset.value(i, d).label(), TREND_LABEL_CHARS),
            None => format!("P{}", i + 1),
        });
    }
    if values.len() < TREND_MIN_VALUES {
        return None;
    }

    let half = values.len() / 2;
    let first_mean = values[..half].iter().sum::<f64>() / half as f64;
    let second_mean = values[half..].iter().sum::<f64>() / (values.len() - half) as f64;
    let direction = if second_mean > first_mean {
        "Upward"
    } else if second_mean < first_mean {
        "Downward"
    } else {
        "Stable"
    };
    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    Some(Chart {
        id: ChartId::TrendChart,
        kind: ChartKind::Line,
        title: format!("Trend Analysis: {}", num),
        labels,
        data: Some(values.iter().map(|v| round_to(*v, 2)).collect()),
        datasets: Vec::new(),
        insight: format!(
            "{} trend detected. Range: {} - {}",
            direction,
            fmt_float(round_to(min, 2)),
            fmt_float(round_to(max, 2))
        ),
        full_width: true,
    })
}

fn backfill_chart(dataset: &Dataset, num: &str) -> Option<Chart> {
    let values: Vec<f64> = dataset
        .column_values(num)
        .take(BACKFILL_ROWS)
        .filter_map(|v| v.as_number())
        .collect();
    if values.is_empty() {
        return None;
    }

    Some(Chart {
        id: ChartId::ColumnChart,
        kind: ChartKind::Bar,
        title: format!("Values: {}", num),
        labels: (1..=values.len()).map(|i| format!("Row {}", i)).collect(),
        data: Some(values.iter().map(|v| round_to(*v, 2)).collect()),
        datasets: Vec::new(),
        insight: format!("Showing first {} values", values.len()),
        full_width: false,
    })
}

/// Data quality, numeric summary, top category, and dataset size, in
/// that order.
pub fn insights(dataset: &Dataset, columns: &[Column], stats: &Statistics) -> Vec<Insight> {
    let rows = dataset.len();
    let mut insights = Vec::new();

    let mut worst: Option<(&str, usize)> = None;
    for name in &dataset.columns {
        let missing = dataset.column_values(name).filter(|v| v.is_missing()).count();
        if missing > 0 && worst.map_or(true, |(_, most)| missing > most) {
            worst = Some((name.as_str(), missing));
        }
    }
    if let Some((name, missing)) = worst {
        insights.push(Insight {
            icon: "⚠️".to_string(),
            kind: InsightKind::Warning,
            title: "Data Quality Alert".to_string(),
            description: format!(
                "'{}' has {} missing values ({}% of data)",
                name,
                missing,
                fmt_float(percent(missing, rows))
            ),
        });
    }

    if let Some(s) = first_with_stats(columns, stats) {
        if s.max > s.mean * HIGH_VARIANCE_FACTOR {
            insights.push(Insight {
                icon: "📈".to_string(),
                kind: InsightKind::TrendUp,
                title: format!("High Variance in {}", s.column),
                description: format!(
                    "Maximum value ({}) is significantly higher than average ({})",
                    fmt_float(round_to(s.max, 2)),
                    fmt_float(round_to(s.mean, 2))
                ),
            });
        }
        insights.push(Insight {
            icon: "📊".to_string(),
            kind: InsightKind::Info,
            title: format!("{} Summary", s.column),
            description: format!(
                "Total: {}, Average: {}, Median: {}",
                fmt_float(round_to(s.sum, 2)),
                fmt_float(round_to(s.mean, 2)),
                fmt_float(round_to(s.median, 2))
            ),
        });
    }

    if let Some(col) = of_type(columns, ColumnType::Categorical).first() {
        let mut counts: IndexMap<String, usize> = IndexMap::new();
        for value in dataset.column_values(col).filter(|v| v.is_truthy()) {
            *counts.entry(value.label()).or_insert(0) += 1;
        }
        let mut top: Option<(&String, usize)> = None;
        for (value, &n) in &counts {
            if top.map_or(true, |(_, best)| n > best) {
                top = Some((value, n));
            }
        }
        if let Some((value, n)) = top {
            insights.push(Insight {
                icon: "🏆".to_string(),
                kind: InsightKind::TrendUp,
                title: format!("Top {}", col),
                description: format!(
                    "'{}' is most frequent with {} occurrences ({}%)",
                    value,
                    n,
                    fmt_float(percent(n, rows))
                ),
            });
        }
    }

    insights.push(Insight {
        icon: "📁".to_string(),
        kind: InsightKind::Info,
        title: "Dataset Size".to_string(),
        description: format!(
            "Your dataset contains {} records across {} columns",
            rows,
            dataset.columns.len()
        ),
    });

    insights.truncate(MAX_INSIGHTS);
    insights
}

fn of_type(columns: &[Column], column_type: ColumnType) -> Vec<&str> {
    columns
        .iter()
        .filter(|c| c.column_type == column_type)
        .map(|c| c.name.as_str())
        .collect()
}

fn first_with_stats<'a>(columns: &[Column], stats: &'a Statistics) -> Option<&'a Statistic> {
    columns.iter().find_map(|c| stats.get(&c.name))
}

fn stat_labels() -> Vec<String> {
    STAT_LABELS.iter().map(|s| s.to_string()).collect()
}

fn stat_triplet(s: &Statistic) -> Vec<f64> {
    vec![round_to(s.mean, 2), round_to(s.max, 2), round_to(s.min, 2)]
}

/// `part / whole` as a percentage with one decimal; zero when `whole` is zero.
fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    round_to(part as f64 / whole as f64 * 100.0, 1)
}

/// Magnitude from which an `f64` has no fractional digits left.
const NO_FRACTION: f64 = 4_503_599_627_370_496.0;

/// Round to `decimals` places, ties to even on the exact value. Values
/// without a fractional part come back unchanged.
fn round_to(value: f64, decimals: usize) -> f64 {
    if !value.is_finite() || value.abs() >= NO_FRACTION {
        return value;
    }
    format!("{:.*}", decimals, value).parse().unwrap_or(value)
}

/// Print a float so integral values keep a trailing `.0`.
fn fmt_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    s.chars().take(max).collect()
}
