use crate::{
    config::Chunking,
    extract::page_marker,
    util::{advance_chars, retreat_chars},
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::LazyLock;

pub const SECTION_SEPARATOR: &str = "\n\n--- Next Section ---\n\n";

static PAGE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"--- Page (\d+) ---").expect("page marker pattern"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SourceRange {
    /// Byte span `[start, end)` of the chunked text.
    Span { start: usize, end: usize },
    /// Page numbers carried by page markers.
    Pages(Vec<usize>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub index: usize,
    pub total_chunks: usize,
    pub source_range: SourceRange,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChunkStrategy {
    Single,
    Text,
    Pages { pages_per_chunk: usize },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkPlan {
    pub strategy: ChunkStrategy,
    pub chunks: Vec<Chunk>,
}

impl ChunkPlan {
    /// Picks a strategy: untouched when small, page groups when markers are
    /// present (smaller groups for very long documents), boundary-aware text
    /// windows otherwise.
    pub fn build(cfg: &Chunking, text: &str, total_pages: Option<usize>) -> Self {
        if text.chars().count() <= cfg.chunk_size {
            return Self::single(text);
        }

        let has_markers = PAGE_MARKER.is_match(text);

        if let Some(pages) = total_pages.filter(|&p| p > cfg.large_document_pages) {
            if has_markers {
                let ppc = pages_per_chunk_for(pages);
                return Self {
                    strategy: ChunkStrategy::Pages { pages_per_chunk: ppc },
                    chunks: chunk_by_pages(text, ppc, cfg),
                };
            }
        }

        if has_markers {
            return Self {
                strategy: ChunkStrategy::Pages {
                    pages_per_chunk: cfg.pages_per_chunk.max(1),
                },
                chunks: chunk_by_pages(text, cfg.pages_per_chunk, cfg),
            };
        }

        Self {
            strategy: ChunkStrategy::Text,
            chunks: chunk_text(text, cfg.chunk_size, cfg.overlap, cfg.lookback),
        }
    }

    pub fn single(text: &str) -> Self {
        Self {
            strategy: ChunkStrategy::Single,
            chunks: vec![Chunk {
                text: text.to_string(),
                index: 0,
                total_chunks: 1,
                source_range: SourceRange::Span {
                    start: 0,
                    end: text.len(),
                },
            }],
        }
    }
}

/// Pages per chunk for documents past the large-document threshold.
pub fn pages_per_chunk_for(total_pages: usize) -> usize {
    let groups = total_pages.div_ceil(50).max(1);
    (500 / groups).max(5)
}

/// Splits `text` into windows of at most `chunk_size` chars, cutting at the
/// last sentence end, paragraph break or newline found in the final
/// `lookback` chars of each window. Consecutive chunks share `overlap` chars.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize, lookback: usize) -> Vec<Chunk> {
    let chunk_size = chunk_size.max(1);
    if text.chars().count() <= chunk_size {
        return ChunkPlan::single(text).chunks;
    }

    let mut spans = Vec::new();
    let mut start = 0usize;
    loop {
        let mut end = advance_chars(text, start, chunk_size);
        if end < text.len() {
            let search_start = retreat_chars(text, end, lookback).max(start);
            if let Some(cut) = find_boundary(&text[search_start..end]) {
                end = search_start + cut;
            }
        }
        spans.push((start, end));
        if end >= text.len() {
            break;
        }
        let next = retreat_chars(text, end, overlap);
        start = if next > start { next } else { end };
    }

    let total = spans.len();
    spans
        .into_iter()
        .enumerate()
        .map(|(index, (start, end))| Chunk {
            text: text[start..end].to_string(),
            index,
            total_chunks: total,
            source_range: SourceRange::Span { start, end },
        })
        .collect()
}

/// Offset just past the preferred cut point in `window`, if any.
fn find_boundary(window: &str) -> Option<usize> {
    let sentence = window
        .char_indices()
        .zip(window.char_indices().skip(1))
        .filter(|((_, a), (_, b))| matches!(a, '.' | '!' | '?') && b.is_whitespace())
        .map(|(_, (i, b))| i + b.len_utf8())
        .last();
    if let Some(cut) = sentence {
        return Some(extend_whitespace(window, cut));
    }
    if let Some(pos) = window.rfind("\n\n") {
        return Some(pos + 2);
    }
    window.rfind('\n').map(|pos| pos + 1).filter(|&c| c > 0)
}

fn extend_whitespace(window: &str, mut cut: usize) -> usize {
    for ch in window[cut..].chars() {
        if !ch.is_whitespace() {
            break;
        }
        cut += ch.len_utf8();
    }
    cut
}

#[derive(Debug)]
struct Page<'a> {
    number: usize,
    text: &'a str,
}

fn split_pages(text: &str) -> Vec<Page<'_>> {
    let found: Vec<_> = PAGE_MARKER.captures_iter(text).collect();
    let mut pages = Vec::with_capacity(found.len());
    for (i, caps) in found.iter().enumerate() {
        let Some(whole) = caps.get(0) else { continue };
        let Ok(number) = caps[1].parse::<usize>() else { continue };
        let end = found
            .get(i + 1)
            .and_then(|c| c.get(0))
            .map(|m| m.start())
            .unwrap_or(text.len());
        pages.push(Page {
            number,
            text: text[whole.end()..end].trim(),
        });
    }
    pages
}

/// Groups whole pages, `pages_per_chunk` at a time. Falls back to
/// `chunk_text` when the text carries no page markers.
pub fn chunk_by_pages(text: &str, pages_per_chunk: usize, cfg: &Chunking) -> Vec<Chunk> {
    let pages = split_pages(text);
    if pages.is_empty() {
        return chunk_text(text, cfg.chunk_size, cfg.overlap, cfg.lookback);
    }

    let ppc = pages_per_chunk.max(1);
    let total = pages.len().div_ceil(ppc);
    pages
        .chunks(ppc)
        .enumerate()
        .map(|(index, group)| Chunk {
            text: group
                .iter()
                .map(|p| format!("{}\n\n{}", page_marker(p.number), p.text))
                .collect::<Vec<_>>()
                .join("\n\n"),
            index,
            total_chunks: total,
            source_range: SourceRange::Pages(group.iter().map(|p| p.number).collect()),
        })
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkStats {
    pub total_chunks: usize,
    pub avg_chunk_chars: f64,
    pub total_chars: usize,
    pub total_pages: usize,
}

pub fn chunk_stats(chunks: &[Chunk]) -> ChunkStats {
    let total_chars: usize = chunks.iter().map(|c| c.text.chars().count()).sum();
    let total_pages = chunks
        .iter()
        .map(|c| match &c.source_range {
            SourceRange::Pages(p) => p.len(),
            SourceRange::Span { .. } => 0,
        })
        .sum();
    ChunkStats {
        total_chunks: chunks.len(),
        avg_chunk_chars: if chunks.is_empty() {
            0.0
        } else {
            total_chars as f64 / chunks.len() as f64
        },
        total_chars,
        total_pages,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectedChunk {
    /// "Section k of N", with k the chunk's original 1-based position.
    pub label: String,
    pub chunk: Chunk,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkSelection {
    pub selected: Vec<SelectedChunk>,
    pub total_chunks: usize,
    /// True when only a representative sample is sent.
    pub partial: bool,
}

impl ChunkSelection {
    /// Keeps every chunk when there are at most `max_full_read_chunks`;
    /// otherwise the first chunk, `samples_per_region` chunks around the
    /// one-third and two-thirds marks, and the last chunk.
    pub fn select(chunks: &[Chunk], cfg: &Chunking) -> Self {
        let n = chunks.len();
        let indices: BTreeSet<usize> = if n <= cfg.max_full_read_chunks.max(1) {
            (0..n).collect()
        } else {
            let k = cfg.samples_per_region.max(1);
            let mut set = BTreeSet::new();
            set.insert(0);
            for center in [n / 3, 2 * n / 3] {
                let first = center.saturating_sub((k - 1) / 2);
                for i in first..first + k {
                    set.insert(i.min(n - 1));
                }
            }
            set.insert(n - 1);
            set
        };

        let partial = indices.len() < n;
        let selected = indices
            .into_iter()
            .map(|i| SelectedChunk {
                label: format!("Section {} of {}", i + 1, n),
                chunk: chunks[i].clone(),
            })
            .collect();
        Self {
            selected,
            total_chunks: n,
            partial,
        }
    }

    /// Text sent to the model: labelled sections joined by the section
    /// separator, preceded by a sampling note when partial.
    pub fn to_content(&self) -> String {
        let body = self
            .selected
            .iter()
            .map(|s| format!("[{}]\n{}", s.label, s.chunk.text))
            .collect::<Vec<_>>()
            .join(SECTION_SEPARATOR);
        if self.partial {
            format!(
                "[Note: Representative sample of {} of {} sections (beginning, one-third, \
                 two-thirds and end). This is not a full read of the document.]\n\n{}",
                self.selected.len(),
                self.total_chunks,
                body
            )
        } else {
            body
        }
    }
}
