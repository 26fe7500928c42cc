use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub extraction: Extraction,
    #[serde(default)]
    pub ocr: Ocr,
    #[serde(default)]
    pub pdfium: Pdfium,
    #[serde(default)]
    pub chunking: Chunking,
    #[serde(default)]
    pub provider: Provider,
    #[serde(default)]
    pub scoring: Scoring,
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub logging: Logging,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Extraction {
    /// Pages whose native text layer is shorter than this are sent to OCR.
    pub min_text_chars: usize,
    /// Window size used to synthesize pages for formats without pagination.
    pub lines_per_page: usize,
    pub ocr_scale: f32,
    pub max_input_bytes: u64,
    pub normalize_text: bool,
}
impl Default for Extraction {
    fn default() -> Self {
        Self {
            min_text_chars: 50,
            lines_per_page: 50,
            ocr_scale: 2.0,
            max_input_bytes: 50 * 1024 * 1024,
            normalize_text: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Ocr {
    pub enabled: bool,
    pub tesseract_exe: String,
    pub languages: String,
    pub timeout_seconds: u64,
    #[serde(default)]
    pub extra_args: Vec<String>,
}
impl Default for Ocr {
    fn default() -> Self {
        Self {
            enabled: true,
            tesseract_exe: "tesseract".into(),
            languages: "eng".into(),
            timeout_seconds: 120,
            extra_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Pdfium {
    pub library_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Chunking {
    pub chunk_size: usize,
    pub overlap: usize,
    pub lookback: usize,
    pub pages_per_chunk: usize,
    pub large_document_pages: usize,
    pub max_full_read_chunks: usize,
    pub samples_per_region: usize,
}
impl Default for Chunking {
    fn default() -> Self {
        Self {
            chunk_size: 15_000,
            overlap: 500,
            lookback: 500,
            pages_per_chunk: 10,
            large_document_pages: 500,
            max_full_read_chunks: 6,
            samples_per_region: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Provider {
    pub api_key_env: String,
    /// "auto" derives the provider from the key prefix.
    pub provider: String,
    /// Empty selects the provider's default model.
    pub model: String,
    pub max_tokens: u32,
    pub fallback_max_tokens: u32,
    pub max_fallbacks: usize,
    pub cascade_on_auth_failure: bool,
    pub temperature: f32,
    pub content_limit: usize,
    pub system_prompt: String,
    pub app_title: String,
    pub referer: String,
    pub request_timeout_seconds: u64,
    #[serde(default)]
    pub base_urls: BaseUrls,
    #[serde(default)]
    pub default_models: DefaultModels,
    #[serde(default = "default_fallback_models")]
    pub fallback_models: BTreeMap<String, Vec<String>>,
}
impl Default for Provider {
    fn default() -> Self {
        Self {
            api_key_env: "OPENROUTER_API_KEY".into(),
            provider: "auto".into(),
            model: "".into(),
            max_tokens: 2000,
            fallback_max_tokens: 1500,
            max_fallbacks: 3,
            cascade_on_auth_failure: true,
            temperature: 0.3,
            content_limit: 100_000,
            system_prompt: "You are an expert QA/QC Engineer with 40+ years of experience in EPC \
                projects. Provide detailed, structured QA/QC analysis in the requested format. \
                Be concise but thorough."
                .into(),
            app_title: "doc-qc".into(),
            referer: "http://localhost".into(),
            request_timeout_seconds: 180,
            base_urls: Default::default(),
            default_models: Default::default(),
            fallback_models: default_fallback_models(),
        }
    }
}

fn default_fallback_models() -> BTreeMap<String, Vec<String>> {
    let mut m = BTreeMap::new();
    m.insert(
        "openrouter".to_string(),
        vec![
            "meta-llama/llama-3.2-3b-instruct:free".to_string(),
            "mistralai/mistral-7b-instruct:free".to_string(),
            "google/gemini-flash-1.5-8b".to_string(),
            "google/gemini-pro-1.5".to_string(),
            "openchat/openchat-7b:free".to_string(),
            "qwen/qwen-2-7b-instruct:free".to_string(),
            "gpt-3.5-turbo".to_string(),
            "anthropic/claude-3-haiku".to_string(),
        ],
    );
    m.insert(
        "openai".to_string(),
        vec!["gpt-3.5-turbo".to_string(), "gpt-4o-mini".to_string()],
    );
    m.insert(
        "anthropic".to_string(),
        vec!["claude-3-haiku-20240307".to_string()],
    );
    m
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseUrls {
    pub openrouter: String,
    pub openai: String,
    pub anthropic: String,
}
impl Default for BaseUrls {
    fn default() -> Self {
        Self {
            openrouter: "https://openrouter.ai/api/v1".into(),
            openai: "https://api.openai.com/v1".into(),
            anthropic: "https://api.anthropic.com/v1".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultModels {
    pub openrouter: String,
    pub openai: String,
    pub anthropic: String,
}
impl Default for DefaultModels {
    fn default() -> Self {
        Self {
            openrouter: "openai/gpt-4o".into(),
            openai: "gpt-4o".into(),
            anthropic: "claude-3-haiku-20240307".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Scoring {
    /// Per-check weights for the combined score; missing entries share the rest equally.
    #[serde(default)]
    pub check_weights: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Output {
    pub out_dir: String,
    pub write_text: bool,
    pub write_report_json: bool,
    pub text_filename: String,
    pub report_filename: String,
}
impl Default for Output {
    fn default() -> Self {
        Self {
            out_dir: "out".into(),
            write_text: true,
            write_report_json: true,
            text_filename: "extracted.txt".into(),
            report_filename: "report.json".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}
