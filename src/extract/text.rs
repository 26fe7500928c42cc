use super::{stream_synthesized, ExtractionStream};
use crate::{config::Extraction as ExtractionConfig, document::SourceDocument};
use tracing::warn;

pub(crate) fn stream_plain_text<'a>(
    cfg: &'a ExtractionConfig,
    doc: &'a SourceDocument,
) -> ExtractionStream<'a> {
    let text = match std::str::from_utf8(doc.bytes()) {
        Ok(s) => s.to_string(),
        Err(err) => {
            warn!(name = doc.name(), "text is not valid UTF-8 ({err}); decoding lossily");
            String::from_utf8_lossy(doc.bytes()).into_owned()
        }
    };
    let text = text.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(text);
    stream_synthesized(cfg, doc, text)
}
