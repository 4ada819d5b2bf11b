/// File input node: turns uploaded files into JSON the rest of the graph can read
///
/// Decoding is chosen by extension:
/// - `.json` is parsed
/// - `.csv` becomes one object per row, keyed by the header line
/// - `.txt` is trimmed UTF-8 text
/// - `.pdf` is page text, pages separated by a newline
/// - `.docx` is paragraph text, one paragraph per line
/// - everything else is passed on base64-encoded
///
/// Text formats that are not valid UTF-8 fall back to base64 as well.

use super::labelled_error;
use crate::runtime::{NodeProcessor, ProcessorContext};
use crate::workflow::types::{FilePayload, NodeInputBundle, NodeValues, RawValue};
use anyhow::{Context as _, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use regex::Regex;
use serde_json::{json, Map, Value};
use std::io::{Cursor, Read};

#[derive(Debug, Clone, Copy, Default)]
pub struct FileInputProcessor;

#[async_trait]
impl NodeProcessor for FileInputProcessor {
    async fn process(
        &self,
        _ctx: &ProcessorContext,
        label: &str,
        bundle: &NodeInputBundle,
        _values: &NodeValues,
    ) -> anyhow::Result<Value> {
        let files = match &bundle.input {
            RawValue::Files(files) if !files.is_empty() => files,
            RawValue::Files(_) => return Ok(no_file()),
            RawValue::Json(value) if is_blank(value) => return Ok(no_file()),
            RawValue::Json(_) => return Ok(labelled_error(label, "expected uploaded files")),
        };

        let mut decoded = Vec::with_capacity(files.len());
        for file in files {
            match decode_file(file) {
                Ok(content) => {
                    tracing::debug!("📄 Decoded {} ({} bytes)", file.name, file.bytes.len());
                    decoded.push(json!({ "file_name": file.name, "content": content }));
                }
                Err(e) => {
                    tracing::warn!("⚠️ Failed to decode {}: {:#}", file.name, e);
                    return Ok(labelled_error(label, format!("{:#}", e)));
                }
            }
        }
        Ok(Value::Array(decoded))
    }
}

fn no_file() -> Value {
    json!({ "error": "No file provided" })
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Decoded content for one file
pub fn decode_file(file: &FilePayload) -> Result<Value> {
    let extension = file.extension();
    match extension.as_deref() {
        Some("json") => match std::str::from_utf8(&file.bytes) {
            Ok(text) => serde_json::from_str(text).with_context(|| format!("invalid JSON in {}", file.name)),
            Err(_) => Ok(base64_blob(&file.bytes, None)),
        },
        Some("csv") => match std::str::from_utf8(&file.bytes) {
            Ok(text) => {
                let rows = csv_rows(text).with_context(|| format!("invalid CSV in {}", file.name))?;
                Ok(Value::Array(rows.into_iter().map(Value::Object).collect()))
            }
            Err(_) => Ok(base64_blob(&file.bytes, None)),
        },
        Some("txt") => Ok(match std::str::from_utf8(&file.bytes) {
            Ok(text) => Value::String(text.trim().to_string()),
            Err(_) => base64_blob(&file.bytes, None),
        }),
        Some("pdf") => Ok(Value::String(match pdf_text(&file.bytes) {
            Ok(text) => text,
            Err(e) => format!("Error reading PDF: {:#}", e),
        })),
        Some("docx") => Ok(Value::String(match docx_text(&file.bytes) {
            Ok(text) => text,
            Err(e) => format!("Error reading DOCX: {:#}", e),
        })),
        other => Ok(base64_blob(&file.bytes, Some(other.unwrap_or("unknown")))),
    }
}

fn base64_blob(bytes: &[u8], file_type: Option<&str>) -> Value {
    let mut blob = Map::new();
    blob.insert("content".to_string(), Value::String(BASE64.encode(bytes)));
    blob.insert("encoding".to_string(), Value::String("base64".to_string()));
    if let Some(file_type) = file_type {
        blob.insert("file_type".to_string(), Value::String(file_type.to_string()));
    }
    Value::Object(blob)
}

/// Key that collects cells beyond the header width
const OVERFLOW_KEY: &str = "null";

/// Rows keyed by the header line. Blank lines are skipped; short rows get
/// `null` for the missing columns and surplus cells are gathered into a list
/// under the `null` key.
fn csv_rows(text: &str) -> Result<Vec<Map<String, Value>>> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());
    let header = reader.headers()?.clone();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let mut row: Map<String, Value> = header
            .iter()
            .enumerate()
            .map(|(i, column)| {
                let cell = record.get(i).map(|cell| Value::String(cell.to_string())).unwrap_or(Value::Null);
                (column.to_string(), cell)
            })
            .collect();
        if record.len() > header.len() {
            let surplus = record.iter().skip(header.len()).map(|cell| Value::String(cell.to_string()));
            row.insert(OVERFLOW_KEY.to_string(), Value::Array(surplus.collect()));
        }
        rows.push(row);
    }
    Ok(rows)
}

/// Text of every page, in page order
fn pdf_text(bytes: &[u8]) -> Result<String> {
    let document = lopdf::Document::load_mem(bytes).context("not a readable PDF")?;
    let pages = document
        .get_pages()
        .into_keys()
        .map(|page| {
            document
                .extract_text(&[page])
                .with_context(|| format!("page {}", page))
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(pages.join("\n").trim().to_string())
}

/// Paragraph text of a Word document, one paragraph per line
fn docx_text(bytes: &[u8]) -> Result<String> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).context("not a zip archive")?;
    let mut document = String::new();
    archive
        .by_name("word/document.xml")
        .context("missing word/document.xml")?
        .read_to_string(&mut document)
        .context("unreadable word/document.xml")?;

    let paragraph_re = Regex::new(r"(?s)<w:p(?:\s[^>]*)?/>|<w:p(?:\s[^>]*)?>.*?</w:p>")?;
    let run_re = Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>")?;

    let paragraphs: Vec<String> = paragraph_re
        .find_iter(&document)
        .map(|paragraph| {
            run_re
                .captures_iter(paragraph.as_str())
                .filter_map(|caps| caps.get(1))
                .map(|text| unescape_xml(text.as_str()))
                .collect::<String>()
        })
        .collect();

    Ok(paragraphs.join("\n").trim().to_string())
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
