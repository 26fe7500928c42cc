use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentFormat {
    Pdf,
    Docx,
    PlainText,
    /// CAD drawings, legacy binary office files and anything unrecognised.
    Opaque,
}

impl DocumentFormat {
    /// Detects by extension, then declared MIME type, then magic bytes.
    pub fn detect(name: &str, mime: Option<&str>, bytes: &[u8]) -> Self {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        if let Some(ext) = ext.as_deref() {
            match ext {
                "pdf" => return Self::Pdf,
                "docx" => return Self::Docx,
                "txt" | "text" | "md" | "csv" | "log" => return Self::PlainText,
                "dwg" | "dxf" | "doc" | "xls" | "xlsx" | "ppt" | "pptx" => return Self::Opaque,
                _ => {}
            }
        }

        if let Some(mime) = mime {
            match mime {
                "application/pdf" => return Self::Pdf,
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                    return Self::Docx;
                }
                m if m.starts_with("text/") => return Self::PlainText,
                _ => {}
            }
        }

        if bytes.starts_with(b"%PDF-") {
            Self::Pdf
        } else if bytes.starts_with(b"PK\x03\x04") {
            // Office Open XML; non-Word packages degrade inside the DOCX adapter.
            Self::Docx
        } else {
            Self::Opaque
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::PlainText => "text",
            Self::Opaque => "opaque",
        }
    }
}

/// An uploaded document. Dropped once extraction has produced text.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    name: String,
    format: DocumentFormat,
    bytes: Vec<u8>,
}

impl SourceDocument {
    pub fn new(name: impl Into<String>, mime: Option<&str>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let format = DocumentFormat::detect(&name, mime, &bytes);
        Self {
            name,
            format,
            bytes,
        }
    }

    pub fn with_format(name: impl Into<String>, format: DocumentFormat, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            format,
            bytes,
        }
    }

    pub fn from_path(path: &Path, max_bytes: u64) -> Result<Self> {
        let meta = std::fs::metadata(path).with_context(|| format!("stat {}", path.display()))?;
        if meta.len() > max_bytes {
            anyhow::bail!(
                "input exceeds max_input_bytes ({} > {}): {}",
                meta.len(),
                max_bytes,
                path.display()
            );
        }
        let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Ok(Self::new(name, None, bytes))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn format(&self) -> DocumentFormat {
        self.format
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}
