use async_trait::async_trait;
use doc_qc::{
    chunk::ChunkStrategy,
    config::Config,
    document::SourceDocument,
    findings::CheckStatus,
    ocr::OcrEngine,
    pipeline::{run_id, Check, Pipeline, Target},
    provider::{FailureKind, ModelRequest, ModelTransport, Provider, ProviderFailure},
    score::ScoreCategory,
};
use std::sync::Mutex;

/// Answers by prompt; records the content of every request.
#[derive(Default)]
struct PromptTransport {
    contents: Mutex<Vec<String>>,
}

#[async_trait]
impl ModelTransport for PromptTransport {
    async fn complete(&self, req: &ModelRequest) -> Result<String, ProviderFailure> {
        self.contents.lock().unwrap().push(req.content.to_string());
        match &*req.prompt {
            "technical" => Ok("Technical review complete. Overall Score: 90%".to_string()),
            "format" => Ok("Formatting checklist: 16/20".to_string()),
            "vague" => Ok("Looks reasonable overall.".to_string()),
            "table" => Ok("| Check Point | Status | Remarks |\n|---|---|---|\n\
                 | Title block | OK | |\n| Scale & units | Not OK | NTS |\n\nScore: 50%"
                .to_string()),
            "broken" => Err(ProviderFailure::new(FailureKind::Other, "invalid request body")),
            _ => Err(ProviderFailure::other("unexpected prompt")),
        }
    }
}

fn cfg() -> Config {
    let mut cfg = Config::default();
    cfg.ocr.enabled = false;
    cfg
}

fn target() -> Target {
    Target {
        provider: Provider::OpenRouter,
        model: "openai/gpt-4o".to_string(),
    }
}

fn text_doc(lines: usize) -> SourceDocument {
    let body: String = (1..=lines)
        .map(|i| format!("Clause {i}. Pressure test records are attached and signed.\n"))
        .collect();
    SourceDocument::new("itp.txt", Some("text/plain"), body.into_bytes())
}

#[tokio::test]
async fn two_checks_are_combined() {
    let cfg = cfg();
    let pipeline = Pipeline::new(&cfg, PromptTransport::default()).with_ocr(OcrEngine::disabled());
    let doc = text_doc(20);
    let checks = [Check::new("technical", "technical"), Check::new("format", "format")];
    let mut progress = Vec::new();
    let out = pipeline
        .analyze(&doc, &checks, &target(), |p| progress.push(p.page_index))
        .await
        .expect("analyze");

    assert!(out.failure.is_none());
    assert_eq!(progress, vec![0, 1]);
    let report = &out.report;
    assert_eq!(report.checks.len(), 2);
    assert_eq!(report.checks[0].score, Some(90.0));
    assert_eq!(report.checks[1].score, Some(80.0));
    assert_eq!(report.checks[1].category, ScoreCategory::ApprovedMinor);
    assert_eq!(report.combined_score, Some(85.0));
    assert_eq!(report.chunking.strategy, ChunkStrategy::Single);
    assert!(!report.chunking.partial);
    assert_eq!(report.run_id, run_id(&doc, &checks));
    assert_eq!(report.document.total_pages, 1);
    assert!(out.text.starts_with("Clause 1."));
}

#[tokio::test]
async fn unscored_check_leaves_combined_empty() {
    let cfg = cfg();
    let pipeline = Pipeline::new(&cfg, PromptTransport::default());
    let doc = text_doc(5);
    let checks = [Check::new("technical", "technical"), Check::new("vague", "vague")];
    let out = pipeline.analyze(&doc, &checks, &target(), |_| {}).await.expect("analyze");
    assert!(out.failure.is_none());
    assert_eq!(out.report.checks[1].category, ScoreCategory::Unscored);
    assert_eq!(out.report.combined_score, None);
}

#[tokio::test]
async fn tabulated_checks_are_reported_as_rows() {
    let cfg = cfg();
    let pipeline = Pipeline::new(&cfg, PromptTransport::default());
    let doc = text_doc(5);
    let checks = [Check::new("drawing", "table")];
    let out = pipeline.analyze(&doc, &checks, &target(), |_| {}).await.expect("analyze");
    let check = &out.report.checks[0];
    assert_eq!(check.score, Some(50.0));
    assert_eq!(check.findings.checks.len(), 2);
    assert_eq!(check.findings.checks[1].check_point, "Scale & units");
    assert_eq!(check.findings.checks[1].status, CheckStatus::NotOk);
    assert_eq!(check.findings.status_score, Some(50.0));

    let json = serde_json::to_value(&out.report).expect("json");
    assert_eq!(json["checks"][0]["findings"]["checks"][0]["status"], "ok");
}

#[tokio::test]
async fn fatal_check_stops_the_run() {
    let cfg = cfg();
    let pipeline = Pipeline::new(&cfg, PromptTransport::default());
    let doc = text_doc(5);
    let checks = [
        Check::new("broken", "broken"),
        Check::new("technical", "technical"),
    ];
    let out = pipeline.analyze(&doc, &checks, &target(), |_| {}).await.expect("analyze");
    assert_eq!(out.failure.as_deref(), Some("broken: invalid request body"));
    assert_eq!(out.report.checks.len(), 1);
    assert!(!out.report.checks[0].ok);
    assert_eq!(out.report.checks[0].attempts.len(), 1);
    assert_eq!(out.report.combined_score, None);
}

#[tokio::test]
async fn large_documents_send_a_labelled_sample() {
    let mut cfg = cfg();
    cfg.chunking.chunk_size = 2_000;
    let transport = PromptTransport::default();
    let pipeline = Pipeline::new(&cfg, transport);
    let doc = text_doc(2_000);
    let checks = [Check::new("technical", "technical")];
    let out = pipeline.analyze(&doc, &checks, &target(), |_| {}).await.expect("analyze");

    let chunking = &out.report.chunking;
    assert_eq!(chunking.strategy, ChunkStrategy::Text);
    assert!(chunking.partial);
    assert_eq!(chunking.selected.len(), 6);
    assert_eq!(chunking.selected.first(), Some(&0));
    assert_eq!(chunking.selected.last(), Some(&(chunking.stats.total_chunks - 1)));
    assert!(out.report.checks[0].ok);
}

#[tokio::test]
async fn single_content_is_truncated_at_limit() {
    let mut cfg = cfg();
    cfg.chunking.chunk_size = 1_000_000;
    cfg.provider.content_limit = 100;
    let pipeline = Pipeline::new(&cfg, PromptTransport::default());
    let doc = text_doc(50);
    let extracted = pipeline.extract(&doc, |_| {}).await;
    let prepared = pipeline.prepare_content(&extracted);
    assert!(prepared.truncated);
    assert!(prepared.content.ends_with("[Note: Content truncated to first 100 characters]"));
    assert_eq!(prepared.summary().strategy, ChunkStrategy::Single);
}

#[test]
fn target_follows_key_and_overrides() {
    let cfg = cfg();
    let t = Target::resolve(&cfg, "sk-ant-api03-abc", None, None).expect("target");
    assert_eq!(t.provider, Provider::Anthropic);
    assert_eq!(t.model, "claude-3-haiku-20240307");

    let t = Target::resolve(&cfg, "sk-or-v1-abc", None, Some("google/gemini-pro-1.5")).expect("target");
    assert_eq!(t.provider, Provider::OpenRouter);
    assert_eq!(t.model, "google/gemini-pro-1.5");

    let t = Target::resolve(&cfg, "sk-or-v1-abc", Some("openai"), None).expect("target");
    assert_eq!(t.provider, Provider::OpenAi);
    assert_eq!(t.model, "gpt-4o");
}
