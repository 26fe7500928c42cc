use crate::{
    chunk::{chunk_stats, ChunkPlan, ChunkSelection},
    config::Config,
    document::SourceDocument,
    extract::{ExtractedDocument, ExtractionProgress, Extractor, PdfBackend},
    findings::Findings,
    ocr::OcrEngine,
    orchestrator::{resolve_model, Orchestrator},
    provider::{ModelRequest, ModelTransport, Provider},
    report::{AnalysisReport, CheckReport, ChunkingSummary, DocumentSummary},
    score::{combined_score, ParsedResult, ScoreCategory},
    util::{now_rfc3339, sha256_hex_parts},
};
use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// One QC prompt run against the document content.
#[derive(Debug, Clone)]
pub struct Check {
    pub name: String,
    pub prompt: String,
}

impl Check {
    pub fn new(name: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prompt: prompt.into(),
        }
    }
}

/// Provider and model every check in a run is sent to first.
#[derive(Debug, Clone)]
pub struct Target {
    pub provider: Provider,
    pub model: String,
}

impl Target {
    pub fn resolve(
        cfg: &Config,
        api_key: &str,
        provider_override: Option<&str>,
        model_override: Option<&str>,
    ) -> Result<Self> {
        let provider = Provider::resolve(
            provider_override.unwrap_or(cfg.provider.provider.as_str()),
            api_key,
        )?;
        let requested = model_override.or(Some(cfg.provider.model.as_str()));
        Ok(Self {
            provider,
            model: resolve_model(&cfg.provider, provider, requested),
        })
    }
}

/// Content ready for the model, with the chunking decisions that produced it.
#[derive(Debug, Clone)]
pub struct PreparedContent {
    pub content: String,
    pub plan: ChunkPlan,
    pub selection: ChunkSelection,
    pub truncated: bool,
}

impl PreparedContent {
    pub fn summary(&self) -> ChunkingSummary {
        ChunkingSummary {
            strategy: self.plan.strategy,
            stats: chunk_stats(&self.plan.chunks),
            selected: self.selection.selected.iter().map(|s| s.chunk.index).collect(),
            partial: self.selection.partial,
            truncated: self.truncated,
            content_chars: self.content.chars().count(),
        }
    }
}

pub struct AnalysisOutput {
    pub text: String,
    pub report: AnalysisReport,
    /// Message of the check failure that ended the run, if any.
    pub failure: Option<String>,
}

pub struct Pipeline<T: ModelTransport> {
    cfg: Config,
    transport: T,
    pdf: Option<Box<dyn PdfBackend>>,
    ocr: OcrEngine,
}

impl<T: ModelTransport> Pipeline<T> {
    pub fn new(cfg: &Config, transport: T) -> Self {
        Self {
            cfg: cfg.clone(),
            transport,
            pdf: None,
            ocr: OcrEngine::from_config(&cfg.ocr),
        }
    }

    pub fn with_pdf_backend(mut self, backend: Box<dyn PdfBackend>) -> Self {
        self.pdf = Some(backend);
        self
    }

    pub fn with_ocr(mut self, ocr: OcrEngine) -> Self {
        self.ocr = ocr;
        self
    }

    pub fn ocr(&self) -> &OcrEngine {
        &self.ocr
    }

    pub async fn extract(
        &self,
        doc: &SourceDocument,
        on_progress: impl FnMut(&ExtractionProgress),
    ) -> ExtractedDocument {
        extract_document(&self.cfg, self.pdf.as_deref(), &self.ocr, doc, on_progress).await
    }

    pub fn prepare_content(&self, extracted: &ExtractedDocument) -> PreparedContent {
        prepare_content(&self.cfg, extracted)
    }

    /// Runs checks one after another over the same content. The first check
    /// that fails ends the run; later checks are not attempted.
    pub async fn run_checks(
        &self,
        target: &Target,
        checks: &[Check],
        content: &str,
    ) -> (Vec<CheckReport>, Option<String>) {
        let orchestrator = Orchestrator::new(&self.cfg.provider, &self.transport);
        let content: Arc<str> = Arc::from(content);
        let mut reports = Vec::with_capacity(checks.len());

        for check in checks {
            info!(check = %check.name, model = %target.model, "running check");
            let req = ModelRequest {
                prompt: Arc::from(check.prompt.as_str()),
                content: Arc::clone(&content),
                provider: target.provider,
                model: target.model.clone(),
                max_tokens: self.cfg.provider.max_tokens,
            };
            match orchestrator.run(req).await {
                Ok(done) => {
                    let parsed = ParsedResult::from_response(done.text);
                    info!(
                        check = %check.name,
                        model = %done.model,
                        score = parsed.score,
                        category = parsed.category.label(),
                        "check complete"
                    );
                    reports.push(CheckReport {
                        name: check.name.clone(),
                        provider: target.provider,
                        ok: true,
                        model: Some(done.model),
                        score: parsed.score,
                        category: parsed.category,
                        response: Some(parsed.raw_text),
                        findings: parsed.findings,
                        error: None,
                        attempts: done.attempts,
                    });
                }
                Err(err) => {
                    warn!(check = %check.name, "check failed: {}", err.message);
                    let message = format!("{}: {}", check.name, err.message);
                    reports.push(CheckReport {
                        name: check.name.clone(),
                        provider: target.provider,
                        ok: false,
                        model: None,
                        score: None,
                        category: ScoreCategory::Unscored,
                        response: None,
                        findings: Findings::default(),
                        error: Some(err.message),
                        attempts: err.attempts,
                    });
                    return (reports, Some(message));
                }
            }
        }
        (reports, None)
    }

    /// Full run: extract, prepare content, run every check, combine scores.
    pub async fn analyze(
        &self,
        doc: &SourceDocument,
        checks: &[Check],
        target: &Target,
        on_progress: impl FnMut(&ExtractionProgress),
    ) -> Result<AnalysisOutput> {
        let started = now_rfc3339();
        let run_id = run_id(doc, checks);
        info!(run_id = %run_id, name = doc.name(), checks = checks.len(), "analysis start");

        let extracted = self.extract(doc, on_progress).await;
        let prepared = self.prepare_content(&extracted);
        let (reports, failure) = self.run_checks(target, checks, &prepared.content).await;

        let scores: Vec<Option<f64>> = reports.iter().map(|r| r.score).collect();
        let combined = if failure.is_none() && reports.len() > 1 {
            combined_score(&scores, &self.cfg.scoring.check_weights)
        } else {
            None
        };

        let report = AnalysisReport {
            run_id,
            started,
            finished: now_rfc3339(),
            document: DocumentSummary {
                name: doc.name().to_string(),
                format: doc.format(),
                bytes: doc.bytes().len(),
                total_pages: extracted.total_pages,
                ocr_used: extracted.ocr_used,
                errored_pages: extracted.errored_pages.clone(),
                degraded: extracted.degraded,
                text_chars: extracted.full_text.chars().count(),
            },
            chunking: prepared.summary(),
            checks: reports,
            combined_score: combined,
        };

        Ok(AnalysisOutput {
            text: extracted.full_text,
            report,
            failure,
        })
    }
}

/// Extracts one document and releases the OCR worker afterwards.
pub async fn extract_document(
    cfg: &Config,
    pdf: Option<&dyn PdfBackend>,
    ocr: &OcrEngine,
    doc: &SourceDocument,
    on_progress: impl FnMut(&ExtractionProgress),
) -> ExtractedDocument {
    let started = Instant::now();
    let extracted = Extractor::new(&cfg.extraction, pdf, ocr)
        .extract_all(doc, on_progress)
        .await;
    ocr.terminate().await;
    info!(
        name = doc.name(),
        pages = extracted.total_pages,
        chars = extracted.full_text.len(),
        ocr_used = extracted.ocr_used,
        errored = extracted.errored_pages.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "document extracted"
    );
    extracted
}

/// Chunks the text when it is too large and builds the model content.
pub fn prepare_content(cfg: &Config, extracted: &ExtractedDocument) -> PreparedContent {
    let text = &extracted.full_text;
    let plan = ChunkPlan::build(&cfg.chunking, text, Some(extracted.total_pages));
    let selection = ChunkSelection::select(&plan.chunks, &cfg.chunking);
    debug!(
        strategy = ?plan.strategy,
        chunks = plan.chunks.len(),
        selected = selection.selected.len(),
        "chunk plan"
    );

    if plan.chunks.len() > 1 {
        if selection.partial {
            warn!(
                selected = selection.selected.len(),
                total = selection.total_chunks,
                "document too large for a full read; sending a representative sample"
            );
        }
        return PreparedContent {
            content: selection.to_content(),
            plan,
            selection,
            truncated: false,
        };
    }

    let (content, truncated) = truncate_content(text, cfg.provider.content_limit);
    if truncated {
        warn!(limit = cfg.provider.content_limit, "content truncated");
    }
    PreparedContent {
        content,
        plan,
        selection,
        truncated,
    }
}

/// Stable id of a run: the document bytes plus every prompt.
pub fn run_id(doc: &SourceDocument, checks: &[Check]) -> String {
    let parts = std::iter::once(doc.bytes()).chain(checks.iter().map(|c| c.prompt.as_bytes()));
    sha256_hex_parts(parts)
}

/// Cuts `text` to `limit` chars, appending a note when anything was dropped.
pub fn truncate_content(text: &str, limit: usize) -> (String, bool) {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => (
            format!(
                "{}\n\n[Note: Content truncated to first {limit} characters]",
                &text[..cut]
            ),
            true,
        ),
        None => (text.to_string(), false),
    }
}
