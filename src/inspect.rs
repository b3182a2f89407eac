//! Offline CLI commands.
//!
//! `docviz segment`, `search`, `context`, and `profile` run the pipelines
//! on local files and print to stdout. They need no server, session, or
//! database.

use anyhow::{Context, Result};
use std::path::Path;

use docviz_core::models::Document;
use docviz_core::retrieve::retrieve;
use docviz_core::segment::segment;
use docviz_core::tabular::synth::ChartKind;
use docviz_core::tabular::ColumnType;

use crate::config::Config;
use crate::dociq::{build_answer_context, ingest_document};
use crate::extract::{extract, file_extension};
use crate::viziq::{build_dashboard, UploadReply};

const EXCERPT_CHARS: usize = 160;

fn read_file(path: &Path) -> Result<(String, Vec<u8>)> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok((name, bytes))
}

fn load_documents(config: &Config, paths: &[std::path::PathBuf]) -> Result<Vec<Document>> {
    paths
        .iter()
        .map(|path| {
            let (name, bytes) = read_file(path)?;
            ingest_document(&name, &bytes, &config.chunking)
                .with_context(|| format!("Failed to ingest {}", path.display()))
        })
        .collect()
}

fn excerpt(text: &str) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= EXCERPT_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(EXCERPT_CHARS).collect();
    format!("{}...", cut)
}

/// Print the chunks of one file, using config sizes unless overridden.
pub fn run_segment(
    config: &Config,
    path: &Path,
    chunk_size: Option<usize>,
    overlap: Option<usize>,
) -> Result<()> {
    let chunk_size = chunk_size.unwrap_or(config.chunking.chunk_size);
    let overlap = overlap.unwrap_or(config.chunking.overlap);
    if chunk_size == 0 || overlap >= chunk_size {
        anyhow::bail!(
            "overlap ({}) must be smaller than chunk size ({})",
            overlap,
            chunk_size
        );
    }

    let (_, bytes) = read_file(path)?;
    let text = extract(&bytes, &file_extension(&path.to_string_lossy()))?;
    let chunks = segment(&text, chunk_size, overlap);

    println!("--- Chunks ({}) ---", chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        println!("[chunk {}] ({} chars)", i, chunk.chars().count());
        println!("{}", chunk);
        println!();
    }
    Ok(())
}

/// Rank the chunks of `paths` against `query` and print them.
pub fn run_search(
    config: &Config,
    query: &str,
    paths: &[std::path::PathBuf],
    limit: Option<usize>,
) -> Result<()> {
    let documents = load_documents(config, paths)?;
    let k = limit.unwrap_or(config.retrieval.max_results);
    let results = retrieve(query, &documents, k);

    if results.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. [{:.2}] {} #{}",
            i + 1,
            result.score,
            result.document_name,
            result.chunk.chunk_index
        );
        println!("    excerpt: \"{}\"", excerpt(&result.chunk.text));
        println!();
    }
    Ok(())
}

/// Print the context an answer to `query` would be grounded on.
pub fn run_context(config: &Config, query: &str, paths: &[std::path::PathBuf]) -> Result<()> {
    let documents = load_documents(config, paths)?;
    let context = build_answer_context(query, &documents, &config.retrieval);
    if context.is_empty() {
        println!("No document content.");
    } else {
        print!("{}", context);
    }
    Ok(())
}

fn type_name(t: ColumnType) -> &'static str {
    match t {
        ColumnType::Numeric => "numeric",
        ColumnType::Date => "date",
        ColumnType::Categorical => "categorical",
        ColumnType::Unknown => "unknown",
    }
}

fn kind_name(k: ChartKind) -> &'static str {
    match k {
        ChartKind::Bar => "bar",
        ChartKind::Doughnut => "doughnut",
        ChartKind::Line => "line",
    }
}

/// Profile a table and print the generated dashboard.
pub fn run_profile(path: &Path, json: bool) -> Result<()> {
    let (name, bytes) = read_file(path)?;
    let stored = build_dashboard(&name, &bytes)
        .with_context(|| format!("Failed to profile {}", path.display()))?;
    let reply = UploadReply::from(&stored);

    if json {
        println!("{}", serde_json::to_string_pretty(&reply)?);
        return Ok(());
    }

    println!("--- {} ---", reply.dashboard_name);
    println!("{} rows x {} columns", reply.rows, reply.cols);
    println!();

    println!("--- Columns ---");
    for (name, t) in &reply.dtypes {
        println!("{:<24} {}", name, type_name(*t));
    }
    println!();

    println!("--- KPIs ({}) ---", reply.kpis.len());
    for kpi in &reply.kpis {
        println!("{}: {}", kpi.label, serde_json::to_string(&kpi.value)?);
    }
    println!();

    println!("--- Charts ({}) ---", reply.charts.len());
    for chart in &reply.charts {
        println!(
            "{} [{}] {} point(s)",
            chart.title,
            kind_name(chart.kind),
            chart.labels.len()
        );
    }
    println!();

    println!("--- Insights ({}) ---", reply.insights.len());
    for insight in &reply.insights {
        println!("{}: {}", insight.title, insight.description);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_flattens_and_truncates() {
        assert_eq!(excerpt("a\n\nb   c"), "a b c");
        let long = "x".repeat(500);
        let e = excerpt(&long);
        assert!(e.ends_with("..."));
        assert_eq!(e.chars().count(), EXCERPT_CHARS + 3);
    }

    #[test]
    fn test_run_segment_rejects_bad_overlap() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let err = run_segment(&Config::minimal(), file.path(), Some(10), Some(10)).unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }
}
