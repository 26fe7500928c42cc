use super::{stream_synthesized, ExtractionStream};
use crate::{config::Extraction as ExtractionConfig, document::SourceDocument, textnorm::unescape_xml};
use anyhow::{anyhow, Context, Result};
use regex::Regex;
use std::io::{Cursor, Read};
use std::sync::LazyLock;
use tracing::warn;

const DOCUMENT_XML: &str = "word/document.xml";

static WORD_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>|<w:tab\s*/>|<w:br\s*/>|</w:p>").expect("word token pattern")
});

pub(crate) fn stream_docx<'a>(cfg: &'a ExtractionConfig, doc: &'a SourceDocument) -> ExtractionStream<'a> {
    match docx_raw_text(doc.bytes()) {
        Ok(text) => stream_synthesized(cfg, doc, text),
        Err(err) => {
            warn!(name = doc.name(), "DOCX extraction failed; using file name: {err:#}");
            super::degraded(doc)
        }
    }
}

/// Raw text of a WordprocessingML package: one line per paragraph.
pub fn docx_raw_text(bytes: &[u8]) -> Result<String> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).with_context(|| "reading DOCX as ZIP")?;
    let mut xml = String::new();
    archive
        .by_name(DOCUMENT_XML)
        .map_err(|e| anyhow!("missing {DOCUMENT_XML}: {e}"))?
        .read_to_string(&mut xml)
        .with_context(|| format!("reading {DOCUMENT_XML}"))?;
    Ok(document_xml_to_text(&xml))
}

pub(crate) fn document_xml_to_text(xml: &str) -> String {
    let mut out = String::new();
    for caps in WORD_TOKEN.captures_iter(xml) {
        match caps.get(1) {
            Some(text) => out.push_str(&unescape_xml(text.as_str())),
            None => match &caps[0] {
                "</w:p>" => out.push('\n'),
                t if t.starts_with("<w:tab") => out.push('\t'),
                _ => out.push('\n'),
            },
        }
    }
    out.trim_end().to_string()
}
