//! Format-specific text extraction
//!
//! The loader is chosen by a pure function of the file extension over a
//! closed set of formats. Every loader yields one or more [`Section`]s of
//! normalized text; the chunker never sees raw bytes.

mod docx;
mod markup;
mod pdf;
mod tabular;

pub use pdf::extract_pdf_to_markdown;

use crate::error::DocumentError;
use crate::types::Metadata;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Supported document formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Pdf,
    PlainText,
    Markdown,
    Html,
    Csv,
    Docx,
}

impl DocumentFormat {
    /// Format for a known extension (case-insensitive)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" | "text" => Some(Self::PlainText),
            "md" | "markdown" => Some(Self::Markdown),
            "html" | "htm" => Some(Self::Html),
            "csv" => Some(Self::Csv),
            "docx" | "doc" => Some(Self::Docx),
            _ => None,
        }
    }

    /// Format for a path, falling back to plain text for unknown extensions
    pub fn detect(path: &Path) -> Self {
        let ext = path.extension().and_then(|e| e.to_str());
        match ext.and_then(Self::from_extension) {
            Some(format) => format,
            None => {
                tracing::warn!(
                    "Unsupported file type {:?} for {}, loading as plain text",
                    ext.unwrap_or(""),
                    path.display()
                );
                Self::PlainText
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::PlainText => "text",
            Self::Markdown => "markdown",
            Self::Html => "html",
            Self::Csv => "csv",
            Self::Docx => "docx",
        }
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A unit of extracted text with loader-specific metadata (title, row, ...)
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub text: String,
    pub metadata: Metadata,
}

impl Section {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// Text extracted from one document
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub path: PathBuf,
    pub format: DocumentFormat,
    /// Non-empty, normalized sections in document order
    pub sections: Vec<Section>,
}

impl LoadedDocument {
    /// Total characters across all sections
    pub fn char_count(&self) -> usize {
        self.sections.iter().map(|s| s.text.chars().count()).sum()
    }
}

/// Load a document, dispatching on its extension
pub fn load_document(path: &Path) -> Result<LoadedDocument, DocumentError> {
    if !path.is_file() {
        return Err(DocumentError::NotFound(path.display().to_string()));
    }

    let format = DocumentFormat::detect(path);
    let bytes = std::fs::read(path).map_err(|e| corrupt(path, e))?;

    let raw_sections = match format {
        DocumentFormat::Pdf => pdf::load(path),
        DocumentFormat::PlainText => load_plain_text(&bytes),
        DocumentFormat::Markdown => decode_utf8(&bytes).map(|text| markup::load_markdown(&text)),
        DocumentFormat::Html => decode_utf8(&bytes).and_then(|text| markup::load_html(&text)),
        DocumentFormat::Csv => tabular::load_csv(&bytes),
        DocumentFormat::Docx => docx::load(&bytes),
    }
    .map_err(|e| corrupt(path, format!("{:#}", e)))?;

    let sections: Vec<Section> = raw_sections
        .into_iter()
        .filter_map(|section| {
            let text = normalize_text(&section.text);
            (!text.is_empty()).then(|| Section {
                text,
                metadata: section.metadata,
            })
        })
        .collect();

    if sections.is_empty() {
        return Err(corrupt(path, "no extractable text"));
    }

    tracing::debug!(
        "Loaded {} ({}): {} sections",
        path.display(),
        format,
        sections.len()
    );

    Ok(LoadedDocument {
        path: path.to_path_buf(),
        format,
        sections,
    })
}

fn corrupt(path: &Path, reason: impl std::fmt::Display) -> DocumentError {
    DocumentError::UnsupportedOrCorrupt {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

fn decode_utf8(bytes: &[u8]) -> anyhow::Result<String> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let text = std::str::from_utf8(bytes)
        .map_err(|e| anyhow::anyhow!("not valid UTF-8 text: {}", e))?;
    Ok(text.to_string())
}

fn load_plain_text(bytes: &[u8]) -> anyhow::Result<Vec<Section>> {
    Ok(vec![Section::new(decode_utf8(bytes)?)])
}

/// Normalize extracted text before chunking
///
/// Line endings become `\n`, NUL bytes are dropped, form feeds become
/// paragraph breaks, trailing whitespace is stripped from every line and runs
/// of blank lines collapse into a single paragraph break.
pub fn normalize_text(raw: &str) -> String {
    let text = raw
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .replace('\0', "")
        .replace('\x0c', "\n\n");

    let mut out = String::with_capacity(text.len());
    let mut pending_blank = false;

    for line in text.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            pending_blank = true;
            continue;
        }
        if !out.is_empty() {
            out.push_str(if pending_blank { "\n\n" } else { "\n" });
        }
        out.push_str(line);
        pending_blank = false;
    }

    out
}
