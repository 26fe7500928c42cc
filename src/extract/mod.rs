pub mod office;
pub mod pdf;
pub mod text;
pub mod types;

pub use pdf::{PageSource, PdfBackend, PdfiumBackend};
pub use types::{
    page_error_marker, page_marker, ExtractedDocument, ExtractionEvent, ExtractionProgress,
};

use crate::{
    config::Extraction as ExtractionConfig,
    document::{DocumentFormat, SourceDocument},
    ocr::OcrEngine,
};
use futures::{stream::LocalBoxStream, StreamExt};
use tracing::{info, warn};

pub type ExtractionStream<'a> = LocalBoxStream<'a, ExtractionEvent>;

/// Turns a `SourceDocument` into a lazy stream of progress snapshots ending
/// with the `ExtractedDocument`. Never fails: bad pages become error markers
/// and adapters that cannot run degrade to the file name.
pub struct Extractor<'a> {
    cfg: &'a ExtractionConfig,
    pdf: Option<&'a dyn PdfBackend>,
    ocr: &'a OcrEngine,
}

impl<'a> Extractor<'a> {
    /// `pdf` is `None` when no PDF engine could be loaded; PDFs then degrade to the file name.
    pub fn new(cfg: &'a ExtractionConfig, pdf: Option<&'a dyn PdfBackend>, ocr: &'a OcrEngine) -> Self {
        Self { cfg, pdf, ocr }
    }

    /// Starts extraction. The stream does no work until polled and can only be
    /// restarted by calling `extract` again.
    pub fn extract(&self, doc: &'a SourceDocument) -> ExtractionStream<'a> {
        info!(
            name = doc.name(),
            format = doc.format().as_str(),
            bytes = doc.bytes().len(),
            "extraction start"
        );
        match doc.format() {
            DocumentFormat::Pdf => match self.pdf {
                Some(backend) => pdf::stream_pdf(self.cfg, backend, self.ocr, doc),
                None => {
                    warn!(name = doc.name(), "no PDF engine available; using file name as text");
                    degraded(doc)
                }
            },
            DocumentFormat::Docx => office::stream_docx(self.cfg, doc),
            DocumentFormat::PlainText => text::stream_plain_text(self.cfg, doc),
            DocumentFormat::Opaque => {
                info!(name = doc.name(), "opaque format; using file name as text");
                degraded(doc)
            }
        }
    }

    /// Drains `extract`, handing each snapshot to `on_progress`.
    pub async fn extract_all(
        &self,
        doc: &'a SourceDocument,
        on_progress: impl FnMut(&ExtractionProgress),
    ) -> ExtractedDocument {
        drain(self.extract(doc), doc, on_progress).await
    }
}

pub async fn drain(
    mut stream: ExtractionStream<'_>,
    doc: &SourceDocument,
    mut on_progress: impl FnMut(&ExtractionProgress),
) -> ExtractedDocument {
    let mut finished = None;
    while let Some(event) = stream.next().await {
        match event {
            ExtractionEvent::Progress(p) => on_progress(&p),
            ExtractionEvent::Finished(d) => finished = Some(d),
        }
    }
    finished.unwrap_or_else(|| filename_document(doc))
}

fn filename_document(doc: &SourceDocument) -> ExtractedDocument {
    ExtractedDocument {
        full_text: doc.name().to_string(),
        total_pages: 1,
        ocr_used: false,
        format: doc.format(),
        errored_pages: Vec::new(),
        degraded: true,
    }
}

/// Single-step stream yielding the file name as the document text.
pub(crate) fn degraded<'a>(doc: &'a SourceDocument) -> ExtractionStream<'a> {
    let result = filename_document(doc);
    let progress = ExtractionProgress {
        page_index: 1,
        total_pages: 1,
        accumulated_text: result.full_text.clone(),
        status_message: format!("Text extraction unavailable for {}; using file name", doc.name()),
    };
    futures::stream::iter([
        ExtractionEvent::Progress(progress),
        ExtractionEvent::Finished(result),
    ])
    .boxed_local()
}

/// Splits text into windows of `lines_per_page` lines for formats that have no pagination.
pub(crate) fn synthesize_pages(text: &str, lines_per_page: usize) -> Vec<Vec<&str>> {
    let lines: Vec<&str> = text.lines().collect();
    if lines.is_empty() {
        return vec![Vec::new()];
    }
    lines
        .chunks(lines_per_page.max(1))
        .map(|c| c.to_vec())
        .collect()
}

/// Streams already-extracted text over synthesized pages, accumulating line by line
/// and emitting a snapshot at every window boundary.
pub(crate) fn stream_synthesized<'a>(
    cfg: &'a ExtractionConfig,
    doc: &'a SourceDocument,
    raw: String,
) -> ExtractionStream<'a> {
    let lines_per_page = cfg.lines_per_page.max(1);
    Box::pin(async_stream::stream! {
        let windows = synthesize_pages(&raw, lines_per_page);
        let total_pages = windows.len();
        let total_lines: usize = windows.iter().map(|w| w.len()).sum();

        yield ExtractionEvent::Progress(ExtractionProgress {
            page_index: 0,
            total_pages,
            accumulated_text: String::new(),
            status_message: format!("Found {total_lines} lines ({total_pages} pages)"),
        });

        let mut acc = String::new();
        let mut line_no = 0usize;
        for (i, window) in windows.iter().enumerate() {
            for line in window {
                let line = if cfg.normalize_text {
                    crate::textnorm::normalize_page(line)
                } else {
                    line.to_string()
                };
                acc.push_str(&line);
                acc.push('\n');
                line_no += 1;
            }
            yield ExtractionEvent::Progress(ExtractionProgress {
                page_index: i + 1,
                total_pages,
                accumulated_text: acc.clone(),
                status_message: format!("Processed line {line_no} of {total_lines}"),
            });
            tokio::task::yield_now().await;
        }

        info!(name = doc.name(), pages = total_pages, lines = total_lines, "extraction complete");
        yield ExtractionEvent::Finished(ExtractedDocument {
            full_text: acc,
            total_pages,
            ocr_used: false,
            format: doc.format(),
            errored_pages: Vec::new(),
            degraded: false,
        });
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthesize_pages_windows_lines() {
        let text = (1..=120).map(|i| format!("line {i}")).collect::<Vec<_>>().join("\n");
        let pages = synthesize_pages(&text, 50);
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[2].len(), 20);
        assert_eq!(synthesize_pages("", 50).len(), 1);
    }
}
