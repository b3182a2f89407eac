//! Tabular file parsing (CSV, JSON, XLSX) into a [`Dataset`].
//!
//! | Extension | Columns | Cells |
//! |-----------|---------|-------|
//! | `csv`  | header row | text (empty field = empty text) |
//! | `json` | see [`parse_json`] | JSON scalars; nested values as JSON text |
//! | `xlsx` | first row of the first sheet (`Column_<j>` when blank) | numbers, text, booleans |
//!
//! `xls` (binary Excel) is recognised but not supported.

use std::collections::BTreeMap;

use serde_json::Value;
use thiserror::Error;

use docviz_core::tabular::{CellValue, Dataset, Row};

use crate::extract::{open_archive, read_zip_entry_bounded, MAX_XML_ENTRY_BYTES};

/// Extensions accepted by the dataset upload endpoint.
pub const TABLE_EXTENSIONS: [&str; 4] = ["csv", "xlsx", "xls", "json"];

/// Maximum cells read from one worksheet.
const XLSX_MAX_CELLS: usize = 1_000_000;

/// Excel's sheet limits: columns `A..=XFD`, rows `1..=1_048_576`.
const XLSX_MAX_COLUMNS: usize = 16_384;
const XLSX_MAX_ROWS: usize = 1_048_576;

/// Upper bound on the padded grid (rows spanned × widest row).
const XLSX_MAX_GRID_CELLS: usize = 5_000_000;

#[derive(Debug, Error)]
pub enum TabularError {
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("invalid CSV: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid workbook: {0}")]
    Workbook(String),
    #[error("no data rows found")]
    Empty,
}

/// Parse `bytes` as a table according to `extension`.
///
/// Fails with [`TabularError::Empty`] when the file has no data rows.
pub fn parse_table(bytes: &[u8], extension: &str) -> Result<Dataset, TabularError> {
    let dataset = match extension {
        "csv" => parse_csv(bytes)?,
        "json" => parse_json(bytes)?,
        "xlsx" => parse_xlsx(bytes)?,
        "xls" => {
            return Err(TabularError::UnsupportedFormat(
                "xls (legacy Excel); save the workbook as .xlsx".to_string(),
            ))
        }
        other => return Err(TabularError::UnsupportedFormat(other.to_string())),
    };
    if dataset.is_empty() {
        return Err(TabularError::Empty);
    }
    Ok(dataset)
}

fn parse_csv(bytes: &[u8]) -> Result<Dataset, TabularError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(strip_bom(bytes));

    let columns: Vec<String> = reader.headers()?.iter().map(|h| h.to_string()).collect();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(CellValue::from).collect());
    }
    Ok(Dataset::new(columns, rows))
}

fn strip_bom(bytes: &[u8]) -> &[u8] {
    bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes)
}

/// Accepted JSON shapes:
///
/// - array of objects: columns from the first object's keys, in order
/// - array of scalars: one `value` column
/// - object of arrays: one column per key, shorter arrays padded with null
/// - any other object: a single row
/// - a scalar: a single `value` row
pub fn parse_json(bytes: &[u8]) -> Result<Dataset, TabularError> {
    let raw: Value = serde_json::from_slice(strip_bom(bytes))?;

    let dataset = match raw {
        Value::Array(items) => match items.first() {
            Some(Value::Object(first)) => {
                let columns: Vec<String> = first.keys().cloned().collect();
                let rows = items
                    .iter()
                    .map(|item| match item {
                        Value::Object(obj) => columns
                            .iter()
                            .map(|c| obj.get(c).map(json_cell).unwrap_or_default())
                            .collect(),
                        _ => Row::new(),
                    })
                    .collect();
                Dataset::new(columns, rows)
            }
            _ => Dataset::new(
                vec!["value".to_string()],
                items.iter().map(|v| vec![json_cell(v)]).collect(),
            ),
        },
        Value::Object(obj) if obj.is_empty() => Dataset::default(),
        Value::Object(obj) if obj.values().all(Value::is_array) => {
            let columns: Vec<String> = obj.keys().cloned().collect();
            let longest = obj
                .values()
                .filter_map(Value::as_array)
                .map(Vec::len)
                .max()
                .unwrap_or(0);
            let rows = (0..longest)
                .map(|i| {
                    obj.values()
                        .map(|v| {
                            v.as_array()
                                .and_then(|a| a.get(i))
                                .map(json_cell)
                                .unwrap_or_default()
                        })
                        .collect()
                })
                .collect();
            Dataset::new(columns, rows)
        }
        Value::Object(obj) => {
            let columns: Vec<String> = obj.keys().cloned().collect();
            let row: Row = obj.values().map(json_cell).collect();
            Dataset::new(columns, vec![row])
        }
        scalar => Dataset::new(vec!["value".to_string()], vec![vec![json_cell(&scalar)]]),
    };
    Ok(dataset)
}

fn json_cell(value: &Value) -> CellValue {
    match value {
        Value::Null => CellValue::Null,
        Value::Bool(b) => CellValue::Bool(*b),
        Value::Number(n) => n.as_f64().map(CellValue::Number).unwrap_or_default(),
        Value::String(s) => CellValue::Text(s.clone()),
        nested => CellValue::Text(nested.to_string()),
    }
}

fn parse_xlsx(bytes: &[u8]) -> Result<Dataset, TabularError> {
    let mut archive = open_archive(bytes).map_err(TabularError::Workbook)?;
    let shared_strings = if archive.file_names().any(|n| n == "xl/sharedStrings.xml") {
        let xml = read_zip_entry_bounded(&mut archive, "xl/sharedStrings.xml", MAX_XML_ENTRY_BYTES)
            .map_err(TabularError::Workbook)?;
        read_shared_strings(&xml).map_err(TabularError::Workbook)?
    } else {
        Vec::new()
    };

    let sheet = first_worksheet(&archive)
        .ok_or_else(|| TabularError::Workbook("workbook has no worksheets".to_string()))?;
    let xml = read_zip_entry_bounded(&mut archive, &sheet, MAX_XML_ENTRY_BYTES)
        .map_err(TabularError::Workbook)?;
    let grid = read_sheet(&xml, &shared_strings).map_err(TabularError::Workbook)?;

    let mut grid_rows = grid.into_iter();
    let Some(header) = grid_rows.next() else {
        return Ok(Dataset::default());
    };
    let columns: Vec<String> = header
        .iter()
        .enumerate()
        .map(|(j, cell)| {
            if cell.is_truthy() {
                cell.label()
            } else {
                format!("Column_{}", j)
            }
        })
        .collect();
    Ok(Dataset::new(columns, grid_rows.collect()))
}

fn first_worksheet(archive: &crate::extract::Archive<'_>) -> Option<String> {
    archive
        .file_names()
        .filter(|n| n.starts_with("xl/worksheets/sheet") && n.ends_with(".xml"))
        .min_by_key(|name| {
            name.trim_start_matches("xl/worksheets/sheet")
                .trim_end_matches(".xml")
                .parse::<u32>()
                .unwrap_or(u32::MAX)
        })
        .map(|s| s.to_string())
}

fn read_shared_strings(xml: &[u8]) -> Result<Vec<String>, String> {
    use quick_xml::events::Event;

    let mut strings = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                if let Some(s) = current.as_mut() {
                    s.push_str(te.unescape().unwrap_or_default().as_ref());
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"si" => strings.extend(current.take()),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// Cell type from the `t` attribute of `<c>`.
#[derive(Clone, Copy, PartialEq)]
enum CellKind {
    Number,
    Shared,
    Inline,
    Bool,
    Str,
    Error,
}

/// Read a worksheet into positional rows. Rows and cells are placed by
/// their `r` references, so gaps become empty rows or null cells.
fn read_sheet(xml: &[u8], shared_strings: &[String]) -> Result<Vec<Row>, String> {
    use quick_xml::events::Event;

    let mut cells: BTreeMap<usize, BTreeMap<usize, CellValue>> = BTreeMap::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();

    let mut row_idx = 0usize;
    let mut next_row = 0usize;
    let mut col_idx = 0usize;
    let mut next_col = 0usize;
    let mut kind = CellKind::Number;
    let mut in_value = false;
    let mut text = String::new();
    let mut count = 0usize;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"row" => {
                    row_idx = row_position(attr(&e, b"r").as_deref(), next_row)?;
                    next_row = row_idx + 1;
                    next_col = 0;
                }
                b"c" => {
                    col_idx = column_position(attr(&e, b"r").as_deref(), next_col)?;
                    next_col = col_idx + 1;
                    kind = match attr(&e, b"t").as_deref() {
                        Some("s") => CellKind::Shared,
                        Some("inlineStr") => CellKind::Inline,
                        Some("b") => CellKind::Bool,
                        Some("str") => CellKind::Str,
                        Some("e") => CellKind::Error,
                        _ => CellKind::Number,
                    };
                    text.clear();
                }
                b"v" | b"t" => in_value = true,
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"row" => {
                next_row = row_position(attr(&e, b"r").as_deref(), next_row)? + 1;
            }
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"c" => {
                next_col = column_position(attr(&e, b"r").as_deref(), next_col)? + 1;
            }
            Ok(Event::Text(te)) if in_value => {
                text.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => {
                    let value = cell_value(kind, &text, shared_strings);
                    if !value.is_null() {
                        cells.entry(row_idx).or_default().insert(col_idx, value);
                        count += 1;
                        if count >= XLSX_MAX_CELLS {
                            break;
                        }
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }

    let Some(&last_row) = cells.keys().next_back() else {
        return Ok(Vec::new());
    };
    let width = cells
        .values()
        .filter_map(|r| r.keys().next_back())
        .max()
        .map(|c| c + 1)
        .unwrap_or(0);

    let first_row = cells.keys().next().copied().unwrap_or(0);
    let span = last_row - first_row + 1;
    if span.saturating_mul(width) > XLSX_MAX_GRID_CELLS {
        return Err(format!(
            "worksheet too large: {} rows x {} columns",
            span, width
        ));
    }
    let rows = (first_row..=last_row)
        .map(|r| {
            let mut row = vec![CellValue::Null; width];
            if let Some(found) = cells.get(&r) {
                for (&c, v) in found {
                    row[c] = v.clone();
                }
            }
            row
        })
        .collect();
    Ok(rows)
}

fn cell_value(kind: CellKind, raw: &str, shared_strings: &[String]) -> CellValue {
    if raw.is_empty() {
        return CellValue::Null;
    }
    match kind {
        CellKind::Shared => raw
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|i| shared_strings.get(i))
            .map(|s| CellValue::Text(s.clone()))
            .unwrap_or_default(),
        CellKind::Inline | CellKind::Str => CellValue::Text(raw.to_string()),
        CellKind::Bool => CellValue::Bool(raw.trim() == "1"),
        CellKind::Number => raw
            .trim()
            .parse::<f64>()
            .map(CellValue::Number)
            .unwrap_or_else(|_| CellValue::Text(raw.to_string())),
        CellKind::Error => CellValue::Null,
    }
}

fn attr(e: &quick_xml::events::BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == key)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

/// Zero-based column index from a cell reference such as `"C7"` or `"AA1"`.
/// `None` when the reference has no letters or overflows.
fn column_index(reference: &str) -> Option<usize> {
    let letters: Vec<u8> = reference
        .bytes()
        .take_while(|b| b.is_ascii_alphabetic())
        .collect();
    if letters.is_empty() {
        return None;
    }
    let n = letters.iter().try_fold(0usize, |acc, b| {
        acc.checked_mul(26)?
            .checked_add((b.to_ascii_uppercase() - b'A' + 1) as usize)
    })?;
    Some(n - 1)
}

/// Column of a `<c>` element: from its `r` reference, else `fallback`.
fn column_position(reference: Option<&str>, fallback: usize) -> Result<usize, String> {
    let col = match reference {
        Some(r) if r.starts_with(|c: char| c.is_ascii_alphabetic()) => column_index(r)
            .ok_or_else(|| format!("cell reference out of range: {}", r))?,
        _ => fallback,
    };
    if col >= XLSX_MAX_COLUMNS {
        return Err(format!("column {} exceeds the sheet limit", col + 1));
    }
    Ok(col)
}

/// Zero-based row of a `<row>` element: from its 1-based `r`, else `fallback`.
fn row_position(reference: Option<&str>, fallback: usize) -> Result<usize, String> {
    let row = match reference.map(str::trim) {
        Some(r) if !r.is_empty() && r.bytes().all(|b| b.is_ascii_digit()) => r
            .parse::<usize>()
            .map_err(|_| format!("row reference out of range: {}", r))?
            .saturating_sub(1),
        _ => fallback,
    };
    if row >= XLSX_MAX_ROWS {
        return Err(format!("row {} exceeds the sheet limit", row + 1));
    }
    Ok(row)
}
