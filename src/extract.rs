//! Text extraction for uploaded documents (PDF, Word, plain text).
//!
//! Callers pass the raw upload bytes and the lower-case file extension;
//! this module returns plain UTF-8 text or a classified [`ExtractError`].
//! The OOXML helpers are shared with workbook parsing in [`crate::table`].

use std::io::{Cursor, Read};

use thiserror::Error;

/// Extensions accepted by the document upload endpoint.
pub const DOCUMENT_EXTENSIONS: [&str; 4] = ["pdf", "doc", "docx", "txt"];

/// Maximum decompressed bytes read from a single ZIP entry.
pub(crate) const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("Word document extraction failed: {0}")]
    Ooxml(String),
}

/// Extract plain text from `bytes` according to `extension`.
///
/// `doc` is read with the `docx` reader; legacy binary Word files fail
/// with [`ExtractError::Ooxml`].
pub fn extract(bytes: &[u8], extension: &str) -> Result<String, ExtractError> {
    match extension {
        "pdf" => extract_pdf(bytes),
        "doc" | "docx" => extract_docx(bytes),
        "txt" => extract_txt(bytes),
        other => Err(ExtractError::UnsupportedFormat(other.to_string())),
    }
}

/// Lower-case extension of `filename`, or `""` when it has none.
pub fn file_extension(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default()
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    let text =
        pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;
    Ok(text.trim().to_string())
}

fn extract_txt(bytes: &[u8]) -> Result<String, ExtractError> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Ok(s.to_string()),
        // Every byte is a valid Latin-1 code point.
        Err(_) => Ok(bytes.iter().map(|&b| b as char).collect()),
    }
}

pub(crate) type Archive<'a> = zip::ZipArchive<Cursor<&'a [u8]>>;

pub(crate) fn open_archive(bytes: &[u8]) -> Result<Archive<'_>, String> {
    zip::ZipArchive::new(Cursor::new(bytes)).map_err(|e| e.to_string())
}

/// Read one archive entry, refusing entries that decompress past `max_bytes`.
pub(crate) fn read_zip_entry_bounded(
    archive: &mut Archive<'_>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, String> {
    let entry = archive.by_name(name).map_err(|e| format!("{}: {}", name, e))?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(|e| e.to_string())?;
    if out.len() as u64 >= max_bytes {
        return Err(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        ));
    }
    Ok(out)
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes).map_err(ExtractError::Ooxml)?;
    let xml = read_zip_entry_bounded(&mut archive, "word/document.xml", MAX_XML_ENTRY_BYTES)
        .map_err(ExtractError::Ooxml)?;
    let text = paragraphs_text(&xml).map_err(ExtractError::Ooxml)?;
    Ok(text.trim().to_string())
}

/// Concatenate `w:t` runs, one line per `w:p` paragraph.
fn paragraphs_text(xml: &[u8]) -> Result<String, String> {
    use quick_xml::events::Event;

    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::Text(te)) if in_text => {
                out.push_str(te.unescape().unwrap_or_default().as_ref());
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) if e.local_name().as_ref() == b"p" => out.push('\n'),
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.to_string()),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}
