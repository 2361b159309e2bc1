//! Default file-to-text conversion.
//!
//! Picks a decoder by file extension and hands the bytes to the matching library:
//! `pdf-extract` for PDF, `zip` + `quick-xml` for the OOXML family, `regex` for HTML.
//! Plain text formats pass through; CSV is rendered as a markdown table.

use super::{panic_message, DocumentConverter};
use anyhow::{anyhow, bail, Context, Result};
use quick_xml::events::{BytesStart, Event};
use regex::Regex;
use std::io::{Cursor, Read};
use std::panic;
use std::path::Path;

/// Extensions the default converter understands.
pub const SUPPORTED_EXTENSIONS: &[&str] =
    &["pdf", "docx", "txt", "md", "xlsx", "pptx", "html", "htm", "csv"];

/// Maximum decompressed bytes to read from a single ZIP entry.
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;
const XLSX_MAX_SHEETS: usize = 100;
const XLSX_MAX_ROWS_PER_SHEET: usize = 100_000;

type Archive<'a> = zip::ZipArchive<Cursor<&'a [u8]>>;

/// Converts uploads to markdown-flavoured plain text.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkdownConverter;

impl MarkdownConverter {
    pub fn new() -> Self {
        Self
    }

    pub fn convert_bytes(&self, bytes: &[u8], extension: &str) -> Result<String> {
        match extension.to_ascii_lowercase().as_str() {
            "pdf" => extract_pdf(bytes),
            "docx" => extract_docx(bytes),
            "pptx" => extract_pptx(bytes),
            "xlsx" => extract_xlsx(bytes),
            "txt" | "md" => Ok(String::from_utf8_lossy(bytes).into_owned()),
            "csv" => Ok(csv_to_markdown(&String::from_utf8_lossy(bytes))),
            "html" | "htm" => html_to_text(&String::from_utf8_lossy(bytes)),
            other => bail!("unsupported file type: .{}", other),
        }
    }
}

impl DocumentConverter for MarkdownConverter {
    fn convert(&self, path: &Path) -> Result<String> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        self.convert_bytes(&bytes, extension)
    }
}

/// pdf-extract panics on some malformed documents (e.g. a font missing from
/// the page resources), so the panic is caught and reported as an error.
fn extract_pdf(bytes: &[u8]) -> Result<String> {
    match panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes)) {
        Ok(result) => result.map_err(|e| anyhow!("PDF extraction failed: {}", e)),
        Err(payload) => bail!("PDF extraction failed: {}", panic_message(&*payload)),
    }
}

fn open_archive(bytes: &[u8]) -> Result<Archive<'_>> {
    zip::ZipArchive::new(Cursor::new(bytes)).context("not a valid OOXML archive")
}

fn read_zip_entry_bounded(archive: &mut Archive<'_>, name: &str) -> Result<Vec<u8>> {
    let entry = archive
        .by_name(name)
        .with_context(|| format!("{} not found", name))?;
    let mut out = Vec::new();
    entry.take(MAX_XML_ENTRY_BYTES).read_to_end(&mut out)?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        bail!("ZIP entry {} exceeds size limit ({} bytes)", name, MAX_XML_ENTRY_BYTES);
    }
    Ok(out)
}

/// Entries matching `{prefix}N.xml`, ordered by N.
fn numbered_entries(archive: &Archive<'_>, prefix: &str) -> Vec<String> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with(prefix) && n.ends_with(".xml"))
        .map(|s| s.to_string())
        .collect();
    names.sort_by_key(|name| {
        name.trim_start_matches(prefix)
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
}

/// Concatenate the text of every `text_tag` element, breaking lines after each `block_tag`.
fn collect_text_runs(xml: &[u8], text_tag: &[u8], block_tag: &[u8]) -> Result<String> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) if e.local_name().as_ref() == text_tag => in_text = true,
            Event::Text(te) if in_text => out.push_str(te.unescape()?.as_ref()),
            Event::End(e) => {
                let name = e.local_name();
                if name.as_ref() == text_tag {
                    in_text = false;
                } else if name.as_ref() == block_tag && !out.ends_with('\n') && !out.is_empty() {
                    out.push('\n');
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(out.trim_end().to_string())
}

fn extract_docx(bytes: &[u8]) -> Result<String> {
    let mut archive = open_archive(bytes)?;
    let xml = read_zip_entry_bounded(&mut archive, "word/document.xml")?;
    collect_text_runs(&xml, b"t", b"p")
}

fn extract_pptx(bytes: &[u8]) -> Result<String> {
    let mut archive = open_archive(bytes)?;
    let mut out = String::new();
    for (idx, name) in numbered_entries(&archive, "ppt/slides/slide").into_iter().enumerate() {
        let xml = read_zip_entry_bounded(&mut archive, &name)?;
        let text = collect_text_runs(&xml, b"t", b"p")?;
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(&format!("<!-- Slide number: {} -->\n", idx + 1));
        out.push_str(&text);
    }
    Ok(out)
}

fn extract_xlsx(bytes: &[u8]) -> Result<String> {
    let mut archive = open_archive(bytes)?;
    let shared_strings = if archive.file_names().any(|n| n == "xl/sharedStrings.xml") {
        let xml = read_zip_entry_bounded(&mut archive, "xl/sharedStrings.xml")?;
        read_shared_strings(&xml)?
    } else {
        Vec::new()
    };

    let mut out = String::new();
    let sheets = numbered_entries(&archive, "xl/worksheets/sheet");
    for (idx, name) in sheets.into_iter().take(XLSX_MAX_SHEETS).enumerate() {
        let xml = read_zip_entry_bounded(&mut archive, &name)?;
        let rows = read_sheet_rows(&xml, &shared_strings)?;
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        out.push_str(&format!("## Sheet{}\n", idx + 1));
        out.push_str(&rows_to_markdown(&rows));
    }
    Ok(out)
}

fn read_shared_strings(xml: &[u8]) -> Result<Vec<String>> {
    let mut strings = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut current: Option<String> = None;
    let mut in_t = false;
    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_t = true,
                _ => {}
            },
            Event::Text(te) if in_t => {
                if let Some(s) = current.as_mut() {
                    s.push_str(te.unescape()?.as_ref());
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"si" => strings.extend(current.take()),
                b"t" => in_t = false,
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

#[derive(Clone, Copy, PartialEq)]
enum CellKind {
    Shared,
    Inline,
    Value,
}

/// Zero-based column of a cell reference such as `B7` or `AA12`.
fn column_index(reference: &[u8]) -> Option<usize> {
    let letters = reference.iter().take_while(|b| b.is_ascii_alphabetic());
    let mut index = 0usize;
    let mut seen = false;
    for b in letters {
        index = index * 26 + (b.to_ascii_uppercase() - b'A') as usize + 1;
        seen = true;
    }
    seen.then(|| index - 1)
}

fn cell_attributes(e: &BytesStart<'_>) -> (CellKind, Option<usize>) {
    let mut kind = CellKind::Value;
    let mut column = None;
    for attr in e.attributes().flatten() {
        match attr.key.as_ref() {
            b"t" => {
                kind = match attr.value.as_ref() {
                    b"s" => CellKind::Shared,
                    b"inlineStr" => CellKind::Inline,
                    _ => CellKind::Value,
                }
            }
            b"r" => column = column_index(attr.value.as_ref()),
            _ => {}
        }
    }
    (kind, column)
}

/// Cells may be sparse; blanks are filled up to the referenced column.
fn push_cell(row: &mut Vec<String>, column: Option<usize>, value: String) {
    if let Some(column) = column {
        if row.len() < column {
            row.resize(column, String::new());
        }
    }
    row.push(value);
}

fn read_sheet_rows(xml: &[u8], shared_strings: &[String]) -> Result<Vec<Vec<String>>> {
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut cell = String::new();
    let mut kind = CellKind::Value;
    let mut column = None;
    let mut capture = false;
    loop {
        if rows.len() >= XLSX_MAX_ROWS_PER_SHEET {
            break;
        }
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => match e.local_name().as_ref() {
                b"c" => {
                    cell.clear();
                    (kind, column) = cell_attributes(&e);
                }
                b"v" => capture = kind != CellKind::Inline,
                b"t" => capture = kind == CellKind::Inline,
                _ => {}
            },
            Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                let (_, empty_column) = cell_attributes(&e);
                push_cell(&mut row, empty_column, String::new());
            }
            Event::Text(te) if capture => {
                let value = te.unescape()?;
                if kind == CellKind::Shared {
                    if let Some(s) = value
                        .trim()
                        .parse::<usize>()
                        .ok()
                        .and_then(|i| shared_strings.get(i))
                    {
                        cell.push_str(s);
                    }
                } else {
                    cell.push_str(value.as_ref());
                }
            }
            Event::End(e) => match e.local_name().as_ref() {
                b"v" | b"t" => capture = false,
                b"c" => push_cell(&mut row, column.take(), std::mem::take(&mut cell)),
                b"row" => {
                    if row.iter().any(|c| !c.trim().is_empty()) {
                        rows.push(std::mem::take(&mut row));
                    } else {
                        row.clear();
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }
    Ok(rows)
}

/// First row becomes the header. Short rows are padded.
fn rows_to_markdown(rows: &[Vec<String>]) -> String {
    let Some(header) = rows.first() else {
        return String::new();
    };
    let width = rows.iter().map(Vec::len).max().unwrap_or(0).max(header.len());
    let render = |cells: &[String]| {
        let mut padded: Vec<String> = cells.iter().map(|c| c.trim().replace('|', "\\|")).collect();
        padded.resize(width, String::new());
        format!("| {} |", padded.join(" | "))
    };

    let mut lines = vec![render(header.as_slice()), format!("|{}", " --- |".repeat(width))];
    lines.extend(rows.iter().skip(1).map(|r| render(r.as_slice())));
    lines.join("\n")
}

fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();
    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            _ => field.push(ch),
        }
    }
    fields.push(field);
    fields
}

fn csv_to_markdown(text: &str) -> String {
    let rows: Vec<Vec<String>> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(split_csv_line)
        .collect();
    rows_to_markdown(&rows)
}

fn html_to_text(html: &str) -> Result<String> {
    let scripts = Regex::new(r"(?is)<script\b.*?</script\s*>")?;
    let styles = Regex::new(r"(?is)<style\b.*?</style\s*>")?;
    let breaks = Regex::new(r"(?i)<br\s*/?>|</(p|div|h[1-6]|li|tr|title)\s*>")?;
    let tags = Regex::new(r"(?s)<[^>]*>")?;
    let blank_runs = Regex::new(r"\n{3,}")?;

    let text = scripts.replace_all(html, "");
    let text = styles.replace_all(&text, "");
    let text = breaks.replace_all(&text, "\n");
    let text = tags.replace_all(&text, "");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    let lines: Vec<&str> = text.lines().map(str::trim).collect();
    Ok(blank_runs.replace_all(lines.join("\n").trim(), "\n\n").into_owned())
}
