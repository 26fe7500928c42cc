use crate::{
    chunk::{ChunkStats, ChunkStrategy},
    document::DocumentFormat,
    findings::Findings,
    orchestrator::AttemptRecord,
    provider::Provider,
    score::ScoreCategory,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub run_id: String,
    pub started: String,
    pub finished: String,
    pub document: DocumentSummary,
    pub chunking: ChunkingSummary,
    pub checks: Vec<CheckReport>,
    pub combined_score: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub name: String,
    pub format: DocumentFormat,
    pub bytes: usize,
    pub total_pages: usize,
    pub ocr_used: bool,
    pub errored_pages: Vec<usize>,
    pub degraded: bool,
    pub text_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingSummary {
    pub strategy: ChunkStrategy,
    pub stats: ChunkStats,
    /// Chunks actually sent, by original 0-based index.
    pub selected: Vec<usize>,
    pub partial: bool,
    pub truncated: bool,
    pub content_chars: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckReport {
    pub name: String,
    pub provider: Provider,
    pub ok: bool,
    /// Model that produced the response, when one did.
    pub model: Option<String>,
    pub score: Option<f64>,
    pub category: ScoreCategory,
    pub response: Option<String>,
    #[serde(default, skip_serializing_if = "Findings::is_empty")]
    pub findings: Findings,
    pub error: Option<String>,
    pub attempts: Vec<AttemptRecord>,
}
