//! Plain-text extraction for uploaded documents.
//!
//! The format is picked from the declared MIME type first, then from the file
//! extension. Anything unrecognised, or any format whose parser fails, falls
//! back to reading the raw bytes as (lossy) UTF-8.

use std::io::Read;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use tracing::warn;

use crate::domain::{ports::TextExtractor, DomainError};

const MIME_PLAIN: &str = "text/plain";
const MIME_MARKDOWN: &str = "text/markdown";
const MIME_PDF: &str = "application/pdf";
const MIME_DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// Declared types accepted on upload. `application/octet-stream` is accepted
/// and resolved by extension.
pub const ALLOWED_DOC_TYPES: &[&str] = &[
    MIME_PLAIN,
    MIME_MARKDOWN,
    MIME_PDF,
    MIME_DOCX,
    "application/octet-stream",
];

pub const SUPPORTED_EXTENSIONS: &[&str] = &["txt", "md", "pdf", "docx"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    PlainText,
    Markdown,
    Pdf,
    Docx,
}

impl DocumentFormat {
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.trim().to_ascii_lowercase().as_str() {
            MIME_PLAIN => Some(Self::PlainText),
            MIME_MARKDOWN => Some(Self::Markdown),
            MIME_PDF => Some(Self::Pdf),
            MIME_DOCX => Some(Self::Docx),
            _ => None,
        }
    }

    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "txt" => Some(Self::PlainText),
            "md" => Some(Self::Markdown),
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            _ => None,
        }
    }

    pub fn detect(path: &Path, declared_mime: Option<&str>) -> Option<Self> {
        declared_mime
            .and_then(Self::from_mime)
            .or_else(|| Self::from_extension(path))
    }

    fn extractor(self) -> &'static dyn TextExtractor {
        match self {
            Self::PlainText | Self::Markdown => &PlainTextExtractor,
            Self::Pdf => &PdfExtractor,
            Self::Docx => &DocxExtractor,
        }
    }
}

/// Upload filter: accepted if either the declared type or the extension is known.
pub fn is_supported_upload(file_name: &str, declared_mime: Option<&str>) -> bool {
    let mime_ok = declared_mime
        .map(|m| ALLOWED_DOC_TYPES.contains(&m.trim().to_ascii_lowercase().as_str()))
        .unwrap_or(false);
    mime_ok || DocumentFormat::from_extension(Path::new(file_name)).is_some()
}

pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, path: &Path, _declared_mime: Option<&str>) -> Result<String, DomainError> {
        read_lossy(path)
    }
}

pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn extract(&self, path: &Path, _declared_mime: Option<&str>) -> Result<String, DomainError> {
        let bytes = std::fs::read(path)?;
        // The PDF parser panics on some malformed inputs.
        std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem(&bytes))
            .map_err(|_| DomainError::validation("PDF parser aborted"))?
            .map_err(|e| DomainError::validation(format!("unreadable PDF: {e}")))
    }
}

/// Reads paragraph text from `word/document.xml` inside the DOCX archive.
pub struct DocxExtractor;

impl TextExtractor for DocxExtractor {
    fn extract(&self, path: &Path, _declared_mime: Option<&str>) -> Result<String, DomainError> {
        let file = std::fs::File::open(path)?;
        let mut archive = zip::ZipArchive::new(file)
            .map_err(|e| DomainError::validation(format!("unreadable DOCX: {e}")))?;
        let mut entry = archive
            .by_name("word/document.xml")
            .map_err(|e| DomainError::validation(format!("DOCX without document body: {e}")))?;

        let mut xml = String::new();
        entry.read_to_string(&mut xml)?;
        Ok(docx_xml_to_text(&xml))
    }
}

fn docx_xml_to_text(xml: &str) -> String {
    static TOKENS: OnceLock<Regex> = OnceLock::new();
    let tokens = TOKENS.get_or_init(|| {
        Regex::new(r"<w:t(?:\s[^>]*)?>([^<]*)</w:t>|</w:p>|<w:tab\s*/>|<w:br\s*/>")
            .expect("DOCX token pattern is valid")
    });

    let mut paragraphs = Vec::new();
    let mut current = String::new();
    for caps in tokens.captures_iter(xml) {
        if let Some(text) = caps.get(1) {
            current.push_str(&unescape_xml(text.as_str()));
            continue;
        }
        match &caps[0] {
            "</w:p>" => paragraphs.push(std::mem::take(&mut current)),
            t if t.starts_with("<w:tab") => current.push('\t'),
            _ => current.push('\n'),
        }
    }
    if !current.is_empty() {
        paragraphs.push(current);
    }

    paragraphs.join("\n")
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn read_lossy(path: &Path) -> Result<String, DomainError> {
    let bytes = std::fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Format-dispatching extractor used by ingestion.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentExtractor;

impl TextExtractor for DocumentExtractor {
    fn extract(&self, path: &Path, declared_mime: Option<&str>) -> Result<String, DomainError> {
        if let Some(format) = DocumentFormat::detect(path, declared_mime) {
            match format.extractor().extract(path, declared_mime) {
                Ok(text) => return Ok(text),
                Err(e) => warn!(
                    path = %path.display(),
                    ?format,
                    error = %e,
                    "extraction failed, falling back to raw text"
                ),
            }
        }
        read_lossy(path)
    }
}
