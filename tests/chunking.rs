use doc_qc::{
    chunk::{
        chunk_by_pages, chunk_stats, chunk_text, Chunk, ChunkPlan, ChunkSelection, ChunkStrategy,
        SourceRange, SECTION_SEPARATOR,
    },
    config::Chunking,
    extract::page_marker,
};
use proptest::prelude::*;

fn small_cfg(chunk_size: usize) -> Chunking {
    Chunking {
        chunk_size,
        overlap: 20,
        lookback: 50,
        ..Chunking::default()
    }
}

/// Rebuilds the source from chunk spans, dropping the overlap each chunk shares with the previous one.
fn reconstruct(text: &str, chunks: &[Chunk]) -> String {
    let mut out = String::new();
    let mut covered = 0usize;
    for c in chunks {
        let SourceRange::Span { start, end } = c.source_range else {
            panic!("expected span ranges");
        };
        assert_eq!(&text[start..end], c.text);
        assert!(start <= covered, "gap before chunk {}", c.index);
        out.push_str(&text[covered..end]);
        covered = end;
    }
    out
}

fn paged_text(pages: usize) -> String {
    (1..=pages)
        .map(|n| format!("{}\nSheet {n} notes. Pipe rack loads verified.\n\n", page_marker(n)))
        .collect()
}

#[test]
fn short_text_is_one_unchanged_chunk() {
    let text = "Design basis memorandum.\n\nRev B.";
    let plan = ChunkPlan::build(&Chunking::default(), text, None);
    assert_eq!(plan.strategy, ChunkStrategy::Single);
    assert_eq!(plan.chunks.len(), 1);
    assert_eq!(plan.chunks[0].text, text);
    assert_eq!(plan.chunks[0].total_chunks, 1);
}

#[test]
fn cuts_after_sentences_not_mid_word() {
    let text = "The flange rating is verified against the design pressure. ".repeat(40);
    let chunks = chunk_text(&text, 300, 40, 120);
    assert!(chunks.len() > 1);
    for c in &chunks[..chunks.len() - 1] {
        assert!(c.text.ends_with(". "), "chunk {} ends mid-sentence: {:?}", c.index, c.text);
    }
    assert_eq!(reconstruct(&text, &chunks), text);
}

#[test]
fn falls_back_to_paragraph_then_line() {
    let para = format!("{}\n\n{}", "a".repeat(60), "b".repeat(60));
    let chunks = chunk_text(&para, 80, 0, 40);
    assert_eq!(chunks[0].text, format!("{}\n\n", "a".repeat(60)));

    let lines = format!("{}\n{}", "c".repeat(60), "d".repeat(60));
    let chunks = chunk_text(&lines, 80, 0, 40);
    assert_eq!(chunks[0].text, format!("{}\n", "c".repeat(60)));
}

#[test]
fn dense_text_uses_fixed_offset() {
    let text = "x".repeat(250);
    let chunks = chunk_text(&text, 100, 10, 50);
    assert_eq!(chunks[0].text.len(), 100);
    assert!(chunks.iter().all(|c| c.total_chunks == chunks.len()));
    assert_eq!(reconstruct(&text, &chunks), text);
}

#[test]
fn indices_are_contiguous() {
    let text = "Line of text.\n".repeat(500);
    let chunks = chunk_text(&text, 500, 50, 100);
    for (i, c) in chunks.iter().enumerate() {
        assert_eq!(c.index, i);
    }
}

#[test]
fn groups_whole_pages_when_markers_present() {
    let text = paged_text(25);
    let plan = ChunkPlan::build(&small_cfg(200), &text, Some(25));
    assert_eq!(plan.strategy, ChunkStrategy::Pages { pages_per_chunk: 10 });
    assert_eq!(plan.chunks.len(), 3);
    assert_eq!(plan.chunks[0].source_range, SourceRange::Pages((1..=10).collect()));
    assert_eq!(plan.chunks[2].source_range, SourceRange::Pages((21..=25).collect()));
    assert!(plan.chunks[1].text.starts_with("--- Page 11 ---\n\nSheet 11 notes."));
    assert!(plan.chunks[1].text.contains("\n\n--- Page 12 ---\n\n"));

    let stats = chunk_stats(&plan.chunks);
    assert_eq!(stats.total_chunks, 3);
    assert_eq!(stats.total_pages, 25);
}

#[test]
fn large_documents_get_smaller_page_groups() {
    let text = paged_text(600);
    let plan = ChunkPlan::build(&small_cfg(200), &text, Some(600));
    assert_eq!(plan.strategy, ChunkStrategy::Pages { pages_per_chunk: 41 });
    assert_eq!(plan.chunks.len(), 15);
}

#[test]
fn by_pages_without_markers_falls_back_to_text() {
    let text = "No markers here. ".repeat(30);
    let cfg = small_cfg(100);
    let chunks = chunk_by_pages(&text, 10, &cfg);
    assert!(chunks.len() > 1);
    assert!(matches!(chunks[0].source_range, SourceRange::Span { .. }));
}

fn fake_chunks(n: usize) -> Vec<Chunk> {
    (0..n)
        .map(|i| Chunk {
            text: format!("body {i}"),
            index: i,
            total_chunks: n,
            source_range: SourceRange::Span { start: i, end: i + 1 },
        })
        .collect()
}

#[test]
fn small_chunk_sets_are_sent_in_full() {
    let chunks = fake_chunks(4);
    let sel = ChunkSelection::select(&chunks, &Chunking::default());
    assert!(!sel.partial);
    assert_eq!(sel.selected.len(), 4);
    let content = sel.to_content();
    assert!(content.starts_with("[Section 1 of 4]\nbody 0"));
    assert_eq!(content.matches(SECTION_SEPARATOR).count(), 3);
    assert!(!content.contains("[Note:"));
}

#[test]
fn large_chunk_sets_are_sampled_and_labelled() {
    let chunks = fake_chunks(20);
    let sel = ChunkSelection::select(&chunks, &Chunking::default());
    assert!(sel.partial);
    let picked: Vec<usize> = sel.selected.iter().map(|s| s.chunk.index).collect();
    assert_eq!(picked, vec![0, 6, 7, 13, 14, 19]);
    assert_eq!(sel.selected[1].label, "Section 7 of 20");

    let content = sel.to_content();
    assert!(content.starts_with("[Note: Representative sample of 6 of 20 sections"));
    assert!(content.contains("not a full read"));
    assert!(content.ends_with("[Section 20 of 20]\nbody 19"));
}

proptest! {
    #[test]
    fn below_threshold_is_identity(text in "[a-z .\n]{0,200}") {
        let chunks = chunk_text(&text, 200, 20, 50);
        prop_assert_eq!(chunks.len(), 1);
        prop_assert_eq!(&chunks[0].text, &text);
    }

    #[test]
    fn round_trips_and_respects_size(
        text in "[a-zé漢 .!?\n]{0,600}",
        chunk_size in 5usize..120,
        overlap in 0usize..30,
        lookback in 0usize..60,
    ) {
        let chunks = chunk_text(&text, chunk_size, overlap, lookback);
        prop_assert!(!chunks.is_empty());
        for c in &chunks {
            prop_assert!(c.text.chars().count() <= chunk_size);
        }
        prop_assert_eq!(reconstruct(&text, &chunks), text);
    }

    #[test]
    fn cut_lands_on_boundary_when_one_is_in_reach(
        words in proptest::collection::vec("[a-z]{1,8}", 20..200),
    ) {
        let text = words.join(" ") + ".";
        let text = text.replace("e ", "e. ");
        let lookback = 40;
        let chunks = chunk_text(&text, 60, 10, lookback);
        for c in &chunks[..chunks.len() - 1] {
            let SourceRange::Span { end, .. } = c.source_range else { unreachable!() };
            let window_start = end.saturating_sub(lookback);
            let has_sentence = text[window_start..end].contains(". ");
            if has_sentence {
                // The cut follows whitespace, so no word is split.
                prop_assert!(text[..end].ends_with(' '));
            }
        }
    }
}
