//! Tabular dashboards.
//!
//! A session holds at most one dataset. Uploading parses the file,
//! runs [`docviz_core::tabular::analyze`], and replaces whatever was
//! stored before.

use anyhow::Result;
use chrono::Utc;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::info;

use docviz_core::store::{SessionStore, StoredDashboard};
use docviz_core::tabular::synth::{Chart, Insight, Kpi};
use docviz_core::tabular::{analyze, CellValue, ColumnType};

use crate::dociq::sanitize_filename;
use crate::extract::file_extension;
use crate::table::{parse_table, TabularError, TABLE_EXTENSIONS};

/// Rows returned with an upload.
pub const UPLOAD_PREVIEW_ROWS: usize = 100;
/// Rows returned by the data endpoint.
pub const DATA_PREVIEW_ROWS: usize = 50;

type Record = IndexMap<String, CellValue>;

#[derive(Debug, Clone, Serialize)]
pub struct UploadReply {
    pub dashboard_name: String,
    pub description: String,
    pub rows: usize,
    pub cols: usize,
    pub columns: Vec<String>,
    pub dtypes: IndexMap<String, ColumnType>,
    pub kpis: Vec<Kpi>,
    pub charts: Vec<Chart>,
    pub insights: Vec<Insight>,
    pub preview: Vec<Record>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DataReply {
    pub filename: String,
    pub columns: Vec<String>,
    pub dtypes: IndexMap<String, ColumnType>,
    pub rows: usize,
    pub preview: Vec<Record>,
    pub dashboard_name: String,
    pub kpis: Vec<Kpi>,
    pub charts: Vec<Chart>,
    pub insights: Vec<Insight>,
}

fn dtypes(stored: &StoredDashboard) -> IndexMap<String, ColumnType> {
    stored
        .analysis
        .columns
        .iter()
        .map(|c| (c.name.clone(), c.column_type))
        .collect()
}

impl From<&StoredDashboard> for UploadReply {
    fn from(stored: &StoredDashboard) -> Self {
        let dashboard = &stored.analysis.dashboard;
        Self {
            dashboard_name: dashboard.dashboard_name.clone(),
            description: format!("AI-generated analytics from {}", stored.filename),
            rows: stored.dataset.len(),
            cols: stored.dataset.columns.len(),
            columns: stored.dataset.columns.clone(),
            dtypes: dtypes(stored),
            kpis: dashboard.kpis.clone(),
            charts: dashboard.charts.clone(),
            insights: dashboard.insights.clone(),
            preview: stored.dataset.records(UPLOAD_PREVIEW_ROWS),
        }
    }
}

impl From<&StoredDashboard> for DataReply {
    fn from(stored: &StoredDashboard) -> Self {
        let dashboard = &stored.analysis.dashboard;
        Self {
            filename: stored.filename.clone(),
            columns: stored.dataset.columns.clone(),
            dtypes: dtypes(stored),
            rows: stored.dataset.len(),
            preview: stored.dataset.records(DATA_PREVIEW_ROWS),
            dashboard_name: dashboard.dashboard_name.clone(),
            kpis: dashboard.kpis.clone(),
            charts: dashboard.charts.clone(),
            insights: dashboard.insights.clone(),
        }
    }
}

/// Parse and analyze an uploaded table without touching any session.
pub fn build_dashboard(filename: &str, bytes: &[u8]) -> Result<StoredDashboard, TabularError> {
    let filename = sanitize_filename(filename);
    let extension = file_extension(&filename);
    if !TABLE_EXTENSIONS.contains(&extension.as_str()) {
        return Err(TabularError::UnsupportedFormat(extension));
    }

    let dataset = parse_table(bytes, &extension)?;
    let analysis = analyze(&dataset, &filename);

    Ok(StoredDashboard {
        filename,
        dataset,
        analysis,
        uploaded_at: Utc::now(),
    })
}

/// Make `stored` the session's active dataset.
pub async fn replace_dashboard(
    store: &dyn SessionStore,
    session: &str,
    stored: StoredDashboard,
) -> Result<()> {
    let mut state = store.get(session).await?;
    info!(
        session,
        file = %stored.filename,
        rows = stored.dataset.len(),
        charts = stored.analysis.dashboard.charts.len(),
        "dataset replaced"
    );
    state.dashboard = Some(stored);
    store.replace(session, state).await
}

/// The active dataset, if any.
pub async fn current(store: &dyn SessionStore, session: &str) -> Result<Option<DataReply>> {
    let state = store.get(session).await?;
    Ok(state.dashboard.as_ref().map(DataReply::from))
}

pub async fn clear(store: &dyn SessionStore, session: &str) -> Result<()> {
    let mut state = store.get(session).await?;
    state.dashboard = None;
    store.replace(session, state).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use docviz_core::store::memory::InMemorySessionStore;

    fn sales_csv(rows: usize) -> String {
        let mut csv = String::from("region,product,revenue\n");
        for i in 0..rows {
            let region = ["North", "South", "East"][i % 3];
            csv.push_str(&format!("{},Widget {},{}\n", region, i % 2, 100 + i * 10));
        }
        csv
    }

    #[test]
    fn test_build_dashboard_from_csv() {
        let stored = build_dashboard("q3 sales.csv", sales_csv(8).as_bytes()).unwrap();
        assert_eq!(stored.filename, "q3_sales.csv");
        let reply = UploadReply::from(&stored);
        assert_eq!(reply.dashboard_name, "Q3 Sales - Sales Analytics");
        assert_eq!(reply.description, "AI-generated analytics from q3_sales.csv");
        assert_eq!(reply.rows, 8);
        assert_eq!(reply.cols, 3);
        assert_eq!(reply.dtypes["revenue"], ColumnType::Numeric);
        assert_eq!(reply.dtypes["region"], ColumnType::Categorical);
        assert_eq!(reply.kpis[0].label, "Total Records");
        assert!(reply.charts.len() >= 3);
        assert_eq!(reply.preview.len(), 8);
    }

    #[test]
    fn test_build_dashboard_rejects_extension() {
        let err = build_dashboard("notes.txt", b"x").unwrap_err();
        assert!(matches!(err, TabularError::UnsupportedFormat(ref e) if e == "txt"));
        let err = build_dashboard("legacy.xls", b"x").unwrap_err();
        assert!(matches!(err, TabularError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_build_dashboard_header_only() {
        let err = build_dashboard("empty.csv", b"a,b\n").unwrap_err();
        assert!(matches!(err, TabularError::Empty));
    }

    #[test]
    fn test_preview_limits() {
        let stored = build_dashboard("big.csv", sales_csv(120).as_bytes()).unwrap();
        assert_eq!(UploadReply::from(&stored).preview.len(), UPLOAD_PREVIEW_ROWS);
        let data = DataReply::from(&stored);
        assert_eq!(data.preview.len(), DATA_PREVIEW_ROWS);
        assert_eq!(data.rows, 120);
    }

    #[tokio::test]
    async fn test_replace_current_and_clear() {
        let store = InMemorySessionStore::new();
        assert!(current(&store, "s").await.unwrap().is_none());

        let first = build_dashboard("first.csv", sales_csv(6).as_bytes()).unwrap();
        replace_dashboard(&store, "s", first).await.unwrap();
        let second = build_dashboard("second.json", br#"[{"a": 1}, {"a": 2}]"#).unwrap();
        replace_dashboard(&store, "s", second).await.unwrap();

        let data = current(&store, "s").await.unwrap().unwrap();
        assert_eq!(data.filename, "second.json");
        assert_eq!(data.columns, vec!["a".to_string()]);

        clear(&store, "s").await.unwrap();
        assert!(current(&store, "s").await.unwrap().is_none());
    }
}
