//! Text extraction for the supported document formats.
//!
//! Dispatch is by file extension: PDF, DOCX, plain text (`.txt`,
//! `.md`), and RFC 822 email (`.eml`). Extraction returns plain UTF-8
//! text plus a page count; errors never panic, the ingestion pipeline
//! reports them per file and moves on.

use std::io::Read;
use std::path::Path;

use thiserror::Error;

/// Maximum decompressed bytes read from a single ZIP entry
/// (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Extraction result: the document's full text and its page count.
///
/// Only PDFs have a real page structure; for every other format the
/// count is 1.
#[derive(Debug, Clone)]
pub struct Extracted {
    pub text: String,
    pub pages: usize,
}

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("DOCX extraction failed: {0}")]
    Docx(String),
    #[error("file is not valid UTF-8")]
    NotUtf8,
    #[error("document contains no extractable text")]
    Empty,
}

/// Extract text from a document's raw bytes, dispatching on the
/// filename extension.
pub fn extract(filename: &str, bytes: &[u8]) -> Result<Extracted, ExtractError> {
    let ext = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    let extracted = match ext.as_str() {
        "pdf" => extract_pdf(bytes)?,
        "docx" => extract_docx(bytes)?,
        "txt" | "md" => extract_plain(bytes)?,
        "eml" => extract_email(bytes)?,
        other => return Err(ExtractError::UnsupportedFileType(other.to_string())),
    };

    if extracted.text.trim().is_empty() {
        return Err(ExtractError::Empty);
    }
    Ok(extracted)
}

/// `pdf-extract` joins pages with form feeds, so the page count is the
/// separator count plus one.
fn extract_pdf(bytes: &[u8]) -> Result<Extracted, ExtractError> {
    let text =
        pdf_extract::extract_text_from_mem(bytes).map_err(|e| ExtractError::Pdf(e.to_string()))?;
    let pages = text.matches('\u{c}').count() + 1;
    Ok(Extracted { text, pages })
}

fn extract_docx(bytes: &[u8]) -> Result<Extracted, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    let entry = archive
        .by_name("word/document.xml")
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    let mut doc_xml = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut doc_xml)
        .map_err(|e| ExtractError::Docx(e.to_string()))?;
    if doc_xml.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::Docx(
            "word/document.xml exceeds size limit".to_string(),
        ));
    }
    let text = extract_w_t_elements(&doc_xml)?;
    Ok(Extracted { text, pages: 1 })
}

/// Pull the text runs (`<w:t>`) out of `word/document.xml`, inserting
/// a newline at every paragraph boundary (`</w:p>`).
fn extract_w_t_elements(xml: &[u8]) -> Result<String, ExtractError> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    reader.config_mut().trim_text(true);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(quick_xml::events::Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    if let Ok(quick_xml::events::Event::Text(te)) = reader.read_event_into(&mut buf)
                    {
                        out.push_str(te.unescape().unwrap_or_default().as_ref());
                    }
                }
            }
            Ok(quick_xml::events::Event::End(e)) => {
                if e.local_name().as_ref() == b"p" && !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            Ok(quick_xml::events::Event::Eof) => break,
            Err(e) => return Err(ExtractError::Docx(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

fn extract_plain(bytes: &[u8]) -> Result<Extracted, ExtractError> {
    let text = std::str::from_utf8(bytes)
        .map_err(|_| ExtractError::NotUtf8)?
        .to_string();
    Ok(Extracted { text, pages: 1 })
}

/// RFC 822: the body starts after the first blank line. Header lines
/// carry routing metadata, not content, so they are dropped. A message
/// with no blank line is treated as all body.
fn extract_email(bytes: &[u8]) -> Result<Extracted, ExtractError> {
    let raw = std::str::from_utf8(bytes).map_err(|_| ExtractError::NotUtf8)?;
    let body = raw
        .split_once("\r\n\r\n")
        .or_else(|| raw.split_once("\n\n"))
        .map(|(_, body)| body)
        .unwrap_or(raw);
    Ok(Extracted {
        text: body.to_string(),
        pages: 1,
    })
}
