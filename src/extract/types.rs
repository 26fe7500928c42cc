use crate::document::DocumentFormat;
use serde::{Deserialize, Serialize};

/// Literal page separator embedded in extracted text. Consumers parse on this exact form.
pub fn page_marker(page_number: usize) -> String {
    format!("--- Page {page_number} ---")
}

/// Placeholder text recorded for a page whose extraction failed.
pub fn page_error_marker(page_number: usize, reason: &str) -> String {
    format!("[Page {page_number}: extraction failed: {reason}]")
}

/// Snapshot emitted while a document is being extracted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionProgress {
    /// 1-based index of the last page processed; 0 before the first page.
    pub page_index: usize,
    pub total_pages: usize,
    pub accumulated_text: String,
    pub status_message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedDocument {
    pub full_text: String,
    pub total_pages: usize,
    pub ocr_used: bool,
    pub format: DocumentFormat,
    /// 1-based numbers of pages that were replaced by an error marker.
    #[serde(default)]
    pub errored_pages: Vec<usize>,
    /// Set when the adapter could not run and the file name stands in for text.
    #[serde(default)]
    pub degraded: bool,
}

#[derive(Debug, Clone)]
pub enum ExtractionEvent {
    Progress(ExtractionProgress),
    Finished(ExtractedDocument),
}
