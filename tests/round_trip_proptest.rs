//! Property tests: untouched documents survive parse/reconstruct byte for byte, and positional
//! paragraph reassignment never touches more blocks than it has paragraphs for.

use once_cell::sync::Lazy;
use proptest::prelude::*;
use regex::Regex;

use lt_translator::chunker::{ApproxTokenCounter, ChunkKind, Chunker};
use lt_translator::document::{
    translatable_indices, FormatProcessor, MarkdownProcessor, RstProcessor,
};
use lt_translator::pipeline::merge_chunks;
use lt_translator::pipeline::refine::reassign_paragraphs;

static SENTENCE_GAP_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]\s").expect("sentence gap regex"));

fn markdown_line() -> impl Strategy<Value = String> {
    prop_oneof![
        "[A-Za-z ,.]{0,24}",
        "#{1,6} [A-Za-z ]{1,12}",
        "( {0,4})[-*+] [a-z ]{1,10}",
        "[0-9]{1,2}\\. [a-z ]{1,10}",
        "> ?[a-z ]{0,10}",
        Just("```".to_string()),
        Just("```rust".to_string()),
        Just("---".to_string()),
        Just("***".to_string()),
        "    [a-z();]{1,10}",
    ]
}

fn rst_line() -> impl Strategy<Value = String> {
    prop_oneof![
        "[A-Za-z ,.]{0,24}",
        "[=\\-~^*]{3,12}",
        ".. [a-z]{2,8}:: ?[a-z]{0,8}",
        "   [a-z ]{1,16}",
        "[-*+] [a-z ]{1,10}",
        "\\+[-+]{3,10}\\+",
        "[A-Za-z ]{1,10}::",
        Just(String::new()),
    ]
}

fn sentence() -> impl Strategy<Value = String> {
    ("[A-Za-z]{1,8}( [A-Za-z]{1,8}){0,5}", prop_oneof![Just('.'), Just('!'), Just('?')])
        .prop_map(|(words, end)| format!("{words}{end}"))
}

fn prose() -> impl Strategy<Value = String> {
    let gap = prop_oneof![
        Just(" "),
        Just("  "),
        Just("\t"),
        Just(" \t"),
        Just("\n"),
        Just("\n\n"),
    ];
    (sentence(), prop::collection::vec((gap, sentence()), 0..12)).prop_map(|(first, rest)| {
        rest.into_iter().fold(first, |mut text, (gap, s)| {
            text.push_str(gap);
            text.push_str(&s);
            text
        })
    })
}

fn document(line: impl Strategy<Value = String>) -> impl Strategy<Value = String> {
    prop::collection::vec(line, 0..40).prop_map(|lines| lines.join("\n"))
}

proptest! {
    #[test]
    fn chunks_respect_budget_and_merge_back_to_source(text in prose(), max_tokens in 1usize..10) {
        let chunker = Chunker::new(max_tokens, Box::new(ApproxTokenCounter));
        let chunks = chunker.chunk(&text);
        for chunk in chunks.iter().filter(|c| c.kind != ChunkKind::Code) {
            prop_assert!(
                chunker.count_tokens(&chunk.content) <= max_tokens
                    || !SENTENCE_GAP_RE.is_match(&chunk.content),
                "chunk over budget: {:?}",
                chunk.content
            );
        }
        let untranslated: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        prop_assert_eq!(merge_chunks(&chunks, &untranslated), text);
    }

    #[test]
    fn markdown_round_trip_is_identity(doc in document(markdown_line())) {
        let p = MarkdownProcessor::new();
        prop_assert_eq!(p.reconstruct(&p.parse(&doc)), doc);
    }

    #[test]
    fn rst_round_trip_is_identity(doc in document(rst_line())) {
        let p = RstProcessor::new();
        prop_assert_eq!(p.reconstruct(&p.parse(&doc)), doc);
    }

    #[test]
    fn matching_paragraph_count_replaces_every_block(n in 1usize..12) {
        let p = MarkdownProcessor::new();
        let doc = (0..n).map(|k| format!("Paragraph number {k}.")).collect::<Vec<_>>().join("\n\n");
        let mut blocks = p.parse(&doc);
        let translated = (0..n).map(|k| format!("第{k}段。")).collect::<Vec<_>>().join("\n\n");

        prop_assert_eq!(reassign_paragraphs(&mut blocks, &translated), 0);
        for (pos, &bi) in translatable_indices(&blocks).iter().enumerate() {
            prop_assert_eq!(blocks[bi].inner_text(), format!("第{pos}段。"));
        }
        prop_assert_eq!(p.reconstruct(&blocks), translated);
    }

    #[test]
    fn short_translation_leaves_the_tail_untouched(n in 1usize..12, dropped in 0usize..12) {
        let m = n.saturating_sub(dropped);
        let p = RstProcessor::new();
        let doc = (0..n).map(|k| format!("Item {k} text.")).collect::<Vec<_>>().join("\n\n");
        let mut blocks = p.parse(&doc);
        let translated = (0..m).map(|k| format!("条目{k}。")).collect::<Vec<_>>().join("\n\n");

        prop_assert_eq!(reassign_paragraphs(&mut blocks, &translated), n - m);
        let targets = translatable_indices(&blocks);
        for &bi in &targets[m..] {
            prop_assert!(!blocks[bi].is_replaced());
        }
    }
}
