use crate::{
    config::Config,
    document::SourceDocument,
    extract::{ExtractionProgress, PdfBackend, PdfiumBackend},
    ocr::{tesseract_version, OcrEngine},
    orchestrator::resolve_model,
    pipeline::{extract_document, prepare_content, Check, Pipeline, Target},
    provider::{http::test_key, HttpTransport, Provider},
    score::{format_score, ParsedResult},
    util::{ensure_dir, now_rfc3339},
};
use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

#[derive(Parser, Debug)]
#[command(name = "doc-qc")]
#[command(about = "Engineering document QC (extraction + OCR fallback + chunking + model cascade)")]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Path to config TOML. If omitted, uses ./doc-qc.toml if present.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override log level (trace/debug/info/warn/error).
    #[arg(long)]
    pub log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Report PDF engine, OCR and provider availability.
    Doctor {
        /// Send a minimal request to verify the API key.
        #[arg(long)]
        check_key: bool,
        #[arg(long)]
        api_key: Option<String>,
    },
    /// Extract text and print a summary.
    Extract {
        #[arg(long)]
        input: PathBuf,
        /// Where to write the extracted text.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Extract and print the chunk plan and selection.
    Chunk {
        #[arg(long)]
        input: PathBuf,
    },
    /// Extract, chunk and run each prompt through the model cascade.
    Analyze {
        #[arg(long)]
        input: PathBuf,
        /// QC prompt; repeat for several checks.
        #[arg(long = "prompt")]
        prompts: Vec<String>,
        /// File holding a QC prompt; repeat for several checks.
        #[arg(long = "prompt-file")]
        prompt_files: Vec<PathBuf>,
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long)]
        model: Option<String>,
        /// openrouter, openai, anthropic or auto.
        #[arg(long)]
        provider: Option<String>,
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },
    /// Parse a score out of a model response.
    Score {
        #[arg(long, conflicts_with = "file")]
        text: Option<String>,
        #[arg(long)]
        file: Option<PathBuf>,
    },
}

pub async fn dispatch(args: Args) -> Result<()> {
    let cfg = match resolve_config_path(args.config.as_deref())? {
        Some(path) => Config::load(&path)?,
        None => Config::default(),
    };
    let log_path = resolve_log_path(&cfg);
    let _guard = init_logging(&args, &cfg, log_path.as_deref())?;

    if let Err(err) = dotenvy::dotenv() {
        debug!("no .env loaded: {err}");
    }

    match &args.cmd {
        Command::Doctor { check_key, api_key } => doctor(&cfg, *check_key, api_key.as_deref()).await,
        Command::Extract { input, out } => extract(&cfg, input, out.as_deref()).await,
        Command::Chunk { input } => chunk(&cfg, input).await,
        Command::Analyze {
            input,
            prompts,
            prompt_files,
            api_key,
            model,
            provider,
            out_dir,
        } => {
            let checks = collect_checks(prompts, prompt_files)?;
            let opts = AnalyzeOpts {
                api_key: api_key.as_deref(),
                model: model.as_deref(),
                provider: provider.as_deref(),
                out_dir: out_dir.as_deref(),
            };
            analyze(&cfg, input, &checks, opts).await
        }
        Command::Score { text, file } => score(text.as_deref(), file.as_deref()),
    }
}

fn resolve_config_path(user: Option<&Path>) -> Result<Option<PathBuf>> {
    if let Some(p) = user {
        if !p.exists() {
            return Err(anyhow!("config not found: {}", p.display()));
        }
        return Ok(Some(p.to_path_buf()));
    }
    for candidate in ["doc-qc.toml", "doc-qc.example.toml"] {
        let path = PathBuf::from(candidate);
        if path.exists() {
            return Ok(Some(path));
        }
    }
    Ok(None)
}

fn init_logging(args: &Args, cfg: &Config, file_path: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let level = args
        .log_level
        .as_deref()
        .unwrap_or(cfg.logging.level.as_str());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // stdout carries command output; logs go to stderr.
    let stderr_layer = if cfg.logging.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .boxed()
    };

    let (file_layer, guard) = if let Some(path) = file_path {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        ensure_dir(parent)?;
        let file = std::fs::File::create(path)
            .with_context(|| format!("create log file: {}", path.display()))?;
        let (non_blocking, guard) = tracing_appender::non_blocking(file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .boxed();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow!("failed to init logging: {e}"))?;

    Ok(guard)
}

fn resolve_log_path(cfg: &Config) -> Option<PathBuf> {
    if !cfg.logging.write_to_file {
        return None;
    }
    if !cfg.logging.file_path.is_empty() {
        return Some(PathBuf::from(&cfg.logging.file_path));
    }
    Some(PathBuf::from(&cfg.output.out_dir).join("doc-qc.log"))
}

/// PDFium is optional: without it PDFs degrade to their file name.
fn load_pdf_backend(cfg: &Config) -> Option<Box<dyn PdfBackend>> {
    match PdfiumBackend::load(&cfg.pdfium.library_path) {
        Ok(backend) => Some(Box::new(backend)),
        Err(err) => {
            warn!("PDF engine unavailable: {err:#}");
            None
        }
    }
}

fn api_key(cfg: &Config, explicit: Option<&str>) -> Option<String> {
    explicit
        .map(str::to_string)
        .or_else(|| std::env::var(&cfg.provider.api_key_env).ok())
        .map(|k| k.trim().to_string())
        .filter(|k| !k.is_empty())
}

fn log_progress(p: &ExtractionProgress) {
    info!(page = p.page_index, total = p.total_pages, "{}", p.status_message);
}

fn load_document(cfg: &Config, input: &Path) -> Result<SourceDocument> {
    if !input.exists() {
        return Err(anyhow!("input does not exist: {}", input.display()));
    }
    SourceDocument::from_path(input, cfg.extraction.max_input_bytes)
}

async fn doctor(cfg: &Config, check_key: bool, explicit_key: Option<&str>) -> Result<()> {
    let pdfium = match PdfiumBackend::load(&cfg.pdfium.library_path) {
        Ok(_) => serde_json::json!({ "available": true }),
        Err(err) => serde_json::json!({ "available": false, "error": format!("{err:#}") }),
    };
    let tesseract = if cfg.ocr.enabled {
        match tesseract_version(&cfg.ocr.tesseract_exe).await {
            Ok(version) => serde_json::json!({ "available": true, "version": version }),
            Err(err) => serde_json::json!({ "available": false, "error": format!("{err:#}") }),
        }
    } else {
        serde_json::json!({ "available": false, "error": "disabled in config" })
    };

    let key = api_key(cfg, explicit_key);
    let provider = match key.as_deref() {
        Some(k) => {
            let target = Target::resolve(cfg, k, None, None)?;
            serde_json::json!({
                "key_present": true,
                "key_env": cfg.provider.api_key_env,
                "provider": target.provider,
                "model": target.model,
            })
        }
        None => serde_json::json!({ "key_present": false, "key_env": cfg.provider.api_key_env }),
    };

    let key_check = match (check_key, key.as_deref()) {
        (false, _) => None,
        (true, None) => return Err(anyhow!("--check-key needs an API key ({} or --api-key)", cfg.provider.api_key_env)),
        (true, Some(k)) => {
            let provider = Provider::resolve(&cfg.provider.provider, k)?;
            let model = resolve_model(&cfg.provider, provider, Some(cfg.provider.model.as_str()));
            let transport = HttpTransport::new(&cfg.provider, k)?;
            Some(test_key(&transport, provider, &model).await)
        }
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "pdfium": pdfium,
            "tesseract": tesseract,
            "provider": provider,
            "key_check": key_check,
        }))?
    );
    Ok(())
}

async fn extract(cfg: &Config, input: &Path, out: Option<&Path>) -> Result<()> {
    let doc = load_document(cfg, input)?;
    let pdf = load_pdf_backend(cfg);
    let ocr = OcrEngine::from_config(&cfg.ocr);
    let extracted = extract_document(cfg, pdf.as_deref(), &ocr, &doc, log_progress).await;

    let out_path = match out {
        Some(p) => Some(p.to_path_buf()),
        None if cfg.output.write_text => {
            Some(PathBuf::from(&cfg.output.out_dir).join(&cfg.output.text_filename))
        }
        None => None,
    };
    if let Some(path) = &out_path {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_dir(parent)?;
        }
        std::fs::write(path, &extracted.full_text)
            .with_context(|| format!("writing {}", path.display()))?;
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "input": input,
            "format": extracted.format,
            "total_pages": extracted.total_pages,
            "ocr_used": extracted.ocr_used,
            "errored_pages": extracted.errored_pages,
            "degraded": extracted.degraded,
            "chars": extracted.full_text.chars().count(),
            "text": out_path,
        }))?
    );
    Ok(())
}

async fn chunk(cfg: &Config, input: &Path) -> Result<()> {
    let doc = load_document(cfg, input)?;
    let pdf = load_pdf_backend(cfg);
    let ocr = OcrEngine::from_config(&cfg.ocr);
    let extracted = extract_document(cfg, pdf.as_deref(), &ocr, &doc, log_progress).await;
    let prepared = prepare_content(cfg, &extracted);

    let chunks: Vec<_> = prepared
        .plan
        .chunks
        .iter()
        .map(|c| {
            serde_json::json!({
                "index": c.index,
                "chars": c.text.chars().count(),
                "source_range": c.source_range,
            })
        })
        .collect();
    let labels: Vec<&str> = prepared
        .selection
        .selected
        .iter()
        .map(|s| s.label.as_str())
        .collect();

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "input": input,
            "summary": prepared.summary(),
            "chunks": chunks,
            "selected": labels,
        }))?
    );
    Ok(())
}

struct AnalyzeOpts<'a> {
    api_key: Option<&'a str>,
    model: Option<&'a str>,
    provider: Option<&'a str>,
    out_dir: Option<&'a Path>,
}

fn collect_checks(prompts: &[String], prompt_files: &[PathBuf]) -> Result<Vec<Check>> {
    let mut checks = Vec::new();
    for prompt in prompts {
        checks.push(Check::new(format!("check-{}", checks.len() + 1), prompt.clone()));
    }
    for path in prompt_files {
        let prompt = std::fs::read_to_string(path)
            .with_context(|| format!("reading prompt file: {}", path.display()))?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("check-{}", checks.len() + 1));
        checks.push(Check::new(name, prompt));
    }
    if checks.is_empty() {
        return Err(anyhow!("at least one --prompt or --prompt-file is required"));
    }
    Ok(checks)
}

async fn analyze(cfg: &Config, input: &Path, checks: &[Check], opts: AnalyzeOpts<'_>) -> Result<()> {
    let doc = load_document(cfg, input)?;
    let key = api_key(cfg, opts.api_key).ok_or_else(|| {
        anyhow!(
            "no API key: set {} or pass --api-key",
            cfg.provider.api_key_env
        )
    })?;
    let target = Target::resolve(cfg, &key, opts.provider, opts.model)?;
    info!(provider = target.provider.as_str(), model = %target.model, "model target");

    let transport = HttpTransport::new(&cfg.provider, key)?;
    let mut pipeline = Pipeline::new(cfg, transport);
    if let Some(backend) = load_pdf_backend(cfg) {
        pipeline = pipeline.with_pdf_backend(backend);
    }

    let started = now_rfc3339();
    let output = pipeline.analyze(&doc, checks, &target, log_progress).await?;

    let out_root = opts
        .out_dir
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(&cfg.output.out_dir));
    let run_dir = out_root.join(&output.report.run_id);
    ensure_dir(&run_dir)?;

    if cfg.output.write_text {
        std::fs::write(run_dir.join(&cfg.output.text_filename), &output.text)?;
    }
    if cfg.output.write_report_json {
        std::fs::write(
            run_dir.join(&cfg.output.report_filename),
            serde_json::to_string_pretty(&output.report)?,
        )?;
    }

    let checks_summary: Vec<_> = output
        .report
        .checks
        .iter()
        .map(|c| {
            serde_json::json!({
                "name": c.name,
                "ok": c.ok,
                "model": c.model,
                "score": format_score(c.score),
                "category": c.category.label(),
                "action": c.category.action(),
                "status_score": c.findings.status_score.map(|s| format_score(Some(s))),
                "risk_weighted_score": c.findings.risk_weighted_score.map(|s| format_score(Some(s))),
                "attempts": c.attempts.len(),
            })
        })
        .collect();
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "run_id": output.report.run_id,
            "run_dir": run_dir,
            "started": started,
            "checks": checks_summary,
            "combined_score": format_score(output.report.combined_score),
            "status": if output.failure.is_some() { "failed" } else { "ok" },
        }))?
    );

    match output.failure {
        Some(message) => Err(anyhow!(message)),
        None => Ok(()),
    }
}

fn score(text: Option<&str>, file: Option<&Path>) -> Result<()> {
    let raw = match (text, file) {
        (Some(t), _) => t.to_string(),
        (None, Some(path)) => std::fs::read_to_string(path)
            .with_context(|| format!("reading response: {}", path.display()))?,
        (None, None) => return Err(anyhow!("pass --text or --file")),
    };
    let parsed = ParsedResult::from_response(raw);
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "score": parsed.score,
            "formatted": format_score(parsed.score),
            "category": parsed.category,
            "label": parsed.category.label(),
            "action": parsed.category.action(),
            "findings": parsed.findings,
        }))?
    );
    Ok(())
}
