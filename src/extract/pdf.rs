use super::{
    types::{page_error_marker, page_marker, ExtractedDocument, ExtractionEvent, ExtractionProgress},
    ExtractionStream,
};
use crate::{config::Extraction as ExtractionConfig, document::SourceDocument, ocr::OcrEngine};
use anyhow::{anyhow, Result};
use pdfium_render::prelude::*;
use std::io::Cursor;
use tracing::{debug, info, warn};

/// Largest rendered side in pixels, whatever the page size and scale.
const MAX_RENDER_PX: i32 = 4096;

/// An opened, paginated document.
pub trait PageSource {
    fn page_count(&self) -> usize;
    /// Native text layer of a 0-based page.
    fn page_text(&self, index: usize) -> Result<String>;
    /// Rasterises a 0-based page to PNG at `scale` times its nominal size.
    fn render_png(&self, index: usize, scale: f32) -> Result<Vec<u8>>;
}

pub trait PdfBackend {
    fn open<'a>(&'a self, bytes: &'a [u8]) -> Result<Box<dyn PageSource + 'a>>;
}

/// PDF engine backed by a dynamically loaded PDFium library.
pub struct PdfiumBackend {
    pdfium: Pdfium,
}

impl PdfiumBackend {
    /// Discovery order: configured path, `PDFIUM_DYNAMIC_LIB_PATH`, system library.
    pub fn load(library_path: &str) -> Result<Self> {
        let explicit = if library_path.is_empty() {
            std::env::var("PDFIUM_DYNAMIC_LIB_PATH").ok()
        } else {
            Some(library_path.to_string())
        };

        let bindings = match explicit {
            Some(path) => {
                debug!(path = %path, "loading PDFium");
                Pdfium::bind_to_library(&path)
                    .map_err(|e| anyhow!("failed to load PDFium from {path}: {e}"))?
            }
            None => Pdfium::bind_to_system_library()
                .map_err(|e| anyhow!("PDFium library not found: {e}"))?,
        };
        Ok(Self {
            pdfium: Pdfium::new(bindings),
        })
    }
}

impl PdfBackend for PdfiumBackend {
    fn open<'a>(&'a self, bytes: &'a [u8]) -> Result<Box<dyn PageSource + 'a>> {
        let document = self
            .pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| anyhow!("failed to load PDF: {e}"))?;
        Ok(Box::new(PdfiumSource { document }))
    }
}

struct PdfiumSource<'a> {
    document: PdfDocument<'a>,
}

impl PdfiumSource<'_> {
    fn page(&self, index: usize) -> Result<PdfPage<'_>> {
        let idx = u16::try_from(index).map_err(|_| anyhow!("page index {index} out of range"))?;
        self.document
            .pages()
            .get(idx)
            .map_err(|e| anyhow!("page {}: {e}", index + 1))
    }
}

impl PageSource for PdfiumSource<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn page_text(&self, index: usize) -> Result<String> {
        let page = self.page(index)?;
        let text = page
            .text()
            .map_err(|e| anyhow!("page {} text layer: {e}", index + 1))?;
        Ok(text.all())
    }

    fn render_png(&self, index: usize, scale: f32) -> Result<Vec<u8>> {
        let page = self.page(index)?;
        let config = PdfRenderConfig::new()
            .scale_page_by_factor(scale)
            .set_maximum_width(MAX_RENDER_PX)
            .set_maximum_height(MAX_RENDER_PX);
        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| anyhow!("page {} render: {e}", index + 1))?;

        let mut cursor = Cursor::new(Vec::new());
        bitmap
            .as_image()
            .write_to(&mut cursor, image::ImageOutputFormat::Png)
            .map_err(|e| anyhow!("page {} PNG encode: {e}", index + 1))?;
        Ok(cursor.into_inner())
    }
}

pub(crate) fn stream_pdf<'a>(
    cfg: &'a ExtractionConfig,
    backend: &'a dyn PdfBackend,
    ocr: &'a OcrEngine,
    doc: &'a SourceDocument,
) -> ExtractionStream<'a> {
    Box::pin(async_stream::stream! {
        let source = match backend.open(doc.bytes()) {
            Ok(s) => s,
            Err(err) => {
                warn!(name = doc.name(), "PDF could not be opened; using file name: {err:#}");
                let mut fallback = super::degraded(doc);
                while let Some(ev) = futures::StreamExt::next(&mut fallback).await {
                    yield ev;
                }
                return;
            }
        };

        let total_pages = source.page_count();
        info!(name = doc.name(), pages = total_pages, "PDF opened");
        yield ExtractionEvent::Progress(ExtractionProgress {
            page_index: 0,
            total_pages,
            accumulated_text: String::new(),
            status_message: format!("Found {total_pages} pages"),
        });

        let mut acc = String::new();
        let mut ocr_used = false;
        let mut errored_pages = Vec::new();

        for index in 0..total_pages {
            let page_number = index + 1;
            let page_text = match source.page_text(index) {
                Ok(native) => {
                    if native.trim().chars().count() < cfg.min_text_chars {
                        debug!(page = page_number, chars = native.trim().len(), "sparse text layer; trying OCR");
                        yield ExtractionEvent::Progress(ExtractionProgress {
                            page_index: page_number,
                            total_pages,
                            accumulated_text: acc.clone(),
                            status_message: format!("OCR: Processing page {page_number}..."),
                        });
                        let recognised = ocr.recognize_page(source.as_ref(), index, cfg.ocr_scale).await;
                        if recognised.trim().is_empty() {
                            native
                        } else {
                            ocr_used = true;
                            recognised
                        }
                    } else {
                        native
                    }
                }
                Err(err) => {
                    warn!(page = page_number, "page extraction failed: {err:#}");
                    errored_pages.push(page_number);
                    page_error_marker(page_number, &format!("{err:#}"))
                }
            };

            let page_text = if cfg.normalize_text {
                crate::textnorm::normalize_page(&page_text)
            } else {
                page_text
            };

            acc.push_str(&page_marker(page_number));
            acc.push('\n');
            acc.push_str(&page_text);
            acc.push_str("\n\n");

            yield ExtractionEvent::Progress(ExtractionProgress {
                page_index: page_number,
                total_pages,
                accumulated_text: acc.clone(),
                status_message: format!("Extracted page {page_number} of {total_pages}"),
            });
            tokio::task::yield_now().await;
        }

        info!(
            name = doc.name(),
            pages = total_pages,
            errored = errored_pages.len(),
            ocr_used,
            "extraction complete"
        );
        yield ExtractionEvent::Finished(ExtractedDocument {
            full_text: acc,
            total_pages,
            ocr_used,
            format: doc.format(),
            errored_pages,
            degraded: false,
        });
    })
}
