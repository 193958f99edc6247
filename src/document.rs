use anyhow::{Context, Result};
use log::{debug, info, warn};
use mime_guess::from_path;
use pdf_extract::extract_text;
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Where a document's content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceType {
    /// Structured records from the site's content file.
    Website,
    /// A loose file on disk (plain text or PDF).
    File,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Website => "website",
            SourceType::File => "file",
        }
    }
}

/// A normalized unit of ingestable content.
///
/// Documents are produced by the processor, consumed once by ingestion,
/// and then discarded. Only their derived chunks are persisted.
#[derive(Debug, Clone)]
pub struct Document {
    /// Stable identifier; re-ingesting the same id replaces its chunks.
    pub id: String,
    pub source_type: SourceType,
    /// The originating record id or file name.
    pub source_id: String,
    pub title: String,
    pub raw_text: String,
    pub tags: BTreeSet<String>,
}

impl Document {
    /// Create a document from a file on disk, extracting text according to
    /// its MIME type.
    pub fn from_file<P: AsRef<Path>>(file_path: P) -> Result<Self> {
        let path = file_path.as_ref();
        let file_name = path
            .file_name()
            .context("Invalid file name")?
            .to_str()
            .context("Invalid file name encoding")?
            .to_string();

        let mime = from_path(path).first_or_octet_stream();
        let mime_type = mime.to_string();
        debug!("Detected MIME type for {}: {}", file_name, mime_type);

        let raw_text = read_document_content(path, &mime_type)?;

        Ok(Document {
            id: format!("file-{}", sanitize_id(&file_name)),
            source_type: SourceType::File,
            source_id: file_name.clone(),
            title: file_name,
            raw_text,
            tags: BTreeSet::new(),
        })
    }
}

/// Read content from a document based on its MIME type.
pub fn read_document_content<P: AsRef<Path>>(file_path: P, mime_type: &str) -> Result<String> {
    let path = file_path.as_ref();

    match mime_type {
        mime if mime.starts_with("application/pdf") => {
            info!("Extracting text from PDF: {}", path.display());
            let content = extract_text(path)
                .with_context(|| format!("Failed to extract text from PDF: {}", path.display()))?;

            // PDF extraction can include excessive whitespace
            let cleaned = normalize_whitespace(&content);
            if cleaned.is_empty() {
                warn!("Extracted PDF content is empty or contains only whitespace");
            }
            Ok(cleaned)
        }

        mime if mime.starts_with("text/") => {
            info!("Reading text file: {}", path.display());
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read text file: {}", path.display()))?;
            Ok(content)
        }

        _ => Err(anyhow::anyhow!(
            "Unsupported document format: {}. Only text and PDF files are supported.",
            mime_type
        )),
    }
}

/// Lowercase a name and replace non-alphanumeric characters so it can be
/// used as a stable document identifier.
fn sanitize_id(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .to_lowercase()
}

/// Collapse repeated spaces, drop carriage returns, and reduce runs of
/// blank lines to a single paragraph break.
pub fn normalize_whitespace(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len());
    let mut blank_run = 0usize;

    for line in text.lines() {
        let line = line.trim_end_matches('\r');

        let mut collapsed = String::with_capacity(line.len());
        let mut prev_space = false;
        for c in line.chars() {
            if c == ' ' {
                if !prev_space {
                    collapsed.push(' ');
                }
                prev_space = true;
            } else {
                collapsed.push(c);
                prev_space = false;
            }
        }

        if collapsed.trim().is_empty() {
            blank_run += 1;
            continue;
        }

        if !normalized.is_empty() {
            normalized.push_str(if blank_run > 0 { "\n\n" } else { "\n" });
        }
        blank_run = 0;
        normalized.push_str(collapsed.trim_end());
    }

    normalized.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_whitespace() {
        let text = "This  has   multiple    spaces.\n\n\nAnd multiple newlines.\r\nAnd Windows line endings.";
        let expected =
            "This has multiple spaces.\n\nAnd multiple newlines.\nAnd Windows line endings.";
        assert_eq!(normalize_whitespace(text), expected);
    }

    #[test]
    fn sanitize_id_is_lowercase_alphanumeric() {
        assert_eq!(sanitize_id("Harishraj Resume.PDF"), "harishraj-resume-pdf");
    }

    #[test]
    fn source_type_labels() {
        assert_eq!(SourceType::Website.as_str(), "website");
        assert_eq!(SourceType::File.as_str(), "file");
    }
}
