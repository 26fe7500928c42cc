use crate::{config::Ocr as OcrConfig, extract::PageSource};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn recognize(&self, png: &[u8]) -> Result<String>;

    async fn terminate(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
pub trait RecognizerFactory: Send + Sync {
    async fn spawn(&self) -> Result<Arc<dyn Recognizer>>;
}

/// Owns at most one lazily started recognition worker, released by `terminate`.
/// Recognition failures are logged and come back as empty text.
pub struct OcrEngine {
    factory: Option<Box<dyn RecognizerFactory>>,
    // Held across initialisation so concurrent callers wait instead of spawning twice.
    worker: Mutex<Option<Arc<dyn Recognizer>>>,
    // Recognition is serialised even if callers share the engine.
    busy: Mutex<()>,
    spawned: AtomicUsize,
}

impl OcrEngine {
    pub fn new(factory: impl RecognizerFactory + 'static) -> Self {
        Self {
            factory: Some(Box::new(factory)),
            worker: Mutex::new(None),
            busy: Mutex::new(()),
            spawned: AtomicUsize::new(0),
        }
    }

    /// An engine that never recognises anything.
    pub fn disabled() -> Self {
        Self {
            factory: None,
            worker: Mutex::new(None),
            busy: Mutex::new(()),
            spawned: AtomicUsize::new(0),
        }
    }

    pub fn from_config(cfg: &OcrConfig) -> Self {
        if cfg.enabled {
            Self::new(TesseractFactory::new(cfg))
        } else {
            Self::disabled()
        }
    }

    /// Number of workers created over the engine's lifetime.
    pub fn workers_spawned(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }

    pub async fn is_active(&self) -> bool {
        self.worker.lock().await.is_some()
    }

    /// Returns the shared worker, creating it on first use. A failed start is
    /// retried on the next call.
    pub async fn worker(&self) -> Option<Arc<dyn Recognizer>> {
        let factory = self.factory.as_ref()?;
        let mut slot = self.worker.lock().await;
        if let Some(w) = slot.as_ref() {
            return Some(Arc::clone(w));
        }
        match factory.spawn().await {
            Ok(w) => {
                self.spawned.fetch_add(1, Ordering::SeqCst);
                info!("OCR worker initialized");
                *slot = Some(Arc::clone(&w));
                Some(w)
            }
            Err(err) => {
                warn!("failed to initialize OCR worker: {err:#}");
                None
            }
        }
    }

    /// Recognises raw PNG bytes. Empty on any failure.
    pub async fn recognize_png(&self, png: &[u8], page_number: usize) -> String {
        let Some(worker) = self.worker().await else {
            return String::new();
        };
        let _busy = self.busy.lock().await;
        match worker.recognize(png).await {
            Ok(text) => {
                debug!(page = page_number, chars = text.len(), "OCR completed");
                text
            }
            Err(err) => {
                warn!(page = page_number, "OCR error: {err:#}");
                String::new()
            }
        }
    }

    /// Renders a 0-based page at `scale` and recognises it. Empty on any failure.
    pub async fn recognize_page(&self, source: &dyn PageSource, index: usize, scale: f32) -> String {
        if self.factory.is_none() {
            return String::new();
        }
        let page_number = index + 1;
        let png = match source.render_png(index, scale) {
            Ok(png) => png,
            Err(err) => {
                warn!(page = page_number, "render for OCR failed: {err:#}");
                return String::new();
            }
        };
        self.recognize_png(&png, page_number).await
    }

    /// Releases the worker. The next recognition starts a fresh one.
    pub async fn terminate(&self) {
        let worker = self.worker.lock().await.take();
        if let Some(w) = worker {
            if let Err(err) = w.terminate().await {
                warn!("OCR worker terminate failed: {err:#}");
            }
            info!("OCR worker terminated");
        }
    }
}

/// Starts `TesseractWorker`s after checking the executable responds.
pub struct TesseractFactory {
    cfg: OcrConfig,
}

impl TesseractFactory {
    pub fn new(cfg: &OcrConfig) -> Self {
        Self { cfg: cfg.clone() }
    }
}

#[async_trait]
impl RecognizerFactory for TesseractFactory {
    async fn spawn(&self) -> Result<Arc<dyn Recognizer>> {
        let version = tesseract_version(&self.cfg.tesseract_exe).await?;
        debug!(exe = %self.cfg.tesseract_exe, %version, "tesseract available");
        Ok(Arc::new(TesseractWorker {
            exe: self.cfg.tesseract_exe.clone(),
            languages: self.cfg.languages.clone(),
            extra_args: self.cfg.extra_args.clone(),
            timeout: Duration::from_secs(self.cfg.timeout_seconds.max(1)),
        }))
    }
}

pub async fn tesseract_version(exe: &str) -> Result<String> {
    let out = tokio::time::timeout(
        Duration::from_secs(10),
        Command::new(exe).arg("--version").output(),
    )
    .await
    .map_err(|_| anyhow!("tesseract --version timed out"))?
    .with_context(|| format!("spawning {exe}"))?;
    if !out.status.success() {
        return Err(anyhow!("{exe} --version exited with {}", out.status));
    }
    // Older releases print the banner on stderr.
    let banner = if out.stdout.is_empty() { out.stderr } else { out.stdout };
    Ok(String::from_utf8_lossy(&banner)
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .to_string())
}

/// Runs the tesseract CLI once per page, streaming the PNG through stdin.
pub struct TesseractWorker {
    exe: String,
    languages: String,
    extra_args: Vec<String>,
    timeout: Duration,
}

#[async_trait]
impl Recognizer for TesseractWorker {
    async fn recognize(&self, png: &[u8]) -> Result<String> {
        let mut cmd = Command::new(&self.exe);
        cmd.args(["stdin", "stdout", "-l", &self.languages])
            .args(&self.extra_args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let run = async {
            let mut child = cmd
                .spawn()
                .with_context(|| format!("spawning {}", self.exe))?;
            let mut stdin = child.stdin.take().ok_or_else(|| anyhow!("no stdin"))?;
            let feed = async move {
                stdin.write_all(png).await?;
                stdin.shutdown().await
            };
            let (fed, output) = tokio::join!(feed, child.wait_with_output());
            let output = output.with_context(|| "waiting for tesseract")?;
            if let Err(err) = fed {
                debug!("tesseract closed stdin early: {err}");
            }
            Ok::<_, anyhow::Error>(output)
        };

        // Dropping `run` on timeout kills the child.
        let output = tokio::time::timeout(self.timeout, run)
            .await
            .map_err(|_| anyhow!("tesseract exceeded timeout ({:?})", self.timeout))??;

        if !output.status.success() {
            return Err(anyhow!(
                "tesseract failed ({}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
