//! Markdown track: flatten translatable text, chunk, translate chunk by chunk, check the result
//! against the source through summaries and retranslate the chunks implicated by a reported gap.

use crate::capability::{SummaryRole, TranslationCapability};
use crate::chunker::{ChunkKind, TextChunk};
use crate::document::{DocumentBlock, FormatProcessor, Processor};
use crate::error::CapabilityResult;
use crate::pipeline::prompts::{render_template, SEGMENT_DELIMITER};
use crate::pipeline::refine::{
    compare_or_failed, focus_indices, reassign_paragraphs, segment_label, split_segments,
    summarize_or_note, EXCERPT_MAX_CHARS,
};
use crate::pipeline::stats::{RefineMode, TranslationStats};
use crate::pipeline::TrackContext;
use crate::textutil::{leading_whitespace, preview, split_blank_paragraphs};

pub(crate) fn translate_flattened(
    ctx: &TrackContext<'_>,
    processor: &Processor,
    blocks: &mut [DocumentBlock],
    stats: &mut TranslationStats,
) {
    let source = processor.extract_translatable(blocks);
    let chunks = ctx.chunker.chunk(&source);
    stats.chunk_count = chunks.len();
    ctx.progress.info(format!(
        "split into {} chunks (max {} tokens)",
        chunks.len(),
        ctx.chunker.max_tokens()
    ));

    let original_summary =
        summarize_or_note(ctx.capability, &source, SummaryRole::Original, ctx.progress);

    let mut translated: Vec<String> = Vec::with_capacity(chunks.len());
    for (i, chunk) in chunks.iter().enumerate() {
        ctx.progress.progress("translate chunk", i + 1, chunks.len());
        let text = match translate_chunk(ctx.capability, chunk) {
            Ok(t) => t,
            Err(e) => {
                ctx.progress
                    .warn(format!("chunk {} kept in source language: {e}", i + 1));
                chunk.content.clone()
            }
        };
        translated.push(text);
    }
    let mut merged = merge_chunks(&chunks, &translated);

    let mut translated_summary =
        summarize_or_note(ctx.capability, &merged, SummaryRole::Translated, ctx.progress);
    let mut comparison =
        compare_or_failed(ctx.capability, &original_summary, &translated_summary, ctx.progress);
    ctx.progress
        .info(format!("completeness score {}/10", comparison.completeness_score));

    if ctx.refine.should_refine(&comparison) {
        if comparison.has_missing() {
            ctx.progress
                .info(format!("missing: {}", preview(&comparison.missing_content, 120)));
        }
        let missing = comparison.missing_content.clone();
        let refined = match retranslate_focused(ctx, &chunks, &mut translated, &missing) {
            Some(()) => Some(RefineMode::Focused),
            None => retranslate_excerpt(ctx, &source, &chunks, &mut translated, &missing)
                .map(|()| RefineMode::Excerpt),
        };
        if let Some(mode) = refined {
            merged = merge_chunks(&chunks, &translated);
            translated_summary =
                summarize_or_note(ctx.capability, &merged, SummaryRole::Translated, ctx.progress);
            comparison = compare_or_failed(
                ctx.capability,
                &original_summary,
                &translated_summary,
                ctx.progress,
            );
            stats.refine_mode = Some(mode);
            ctx.progress.info(format!(
                "completeness score after {} refinement {}/10",
                mode.as_str(),
                comparison.completeness_score
            ));
        }
    }

    stats.untranslated_blocks = reassign_paragraphs(blocks, &merged);
    stats.original_summary = original_summary;
    stats.translated_summary = translated_summary;
    stats.set_comparison(comparison);
}

fn translate_chunk(
    cap: &dyn TranslationCapability,
    chunk: &TextChunk,
) -> CapabilityResult<String> {
    if chunk.kind == ChunkKind::Code {
        return Ok(translate_code_comments(cap, &chunk.content));
    }
    cap.translate(&chunk.content)
}

/// Translate `#` and `//` comment lines one by one, re-applying their indentation. Other lines
/// and failed comments pass through.
pub fn translate_code_comments(cap: &dyn TranslationCapability, code: &str) -> String {
    code.split('\n')
        .map(|line| {
            let trimmed = line.trim();
            if !(trimmed.starts_with('#') || trimmed.starts_with("//")) {
                return line.to_string();
            }
            match cap.translate(trimmed) {
                Ok(t) => format!("{}{}", leading_whitespace(line), t.trim()),
                Err(_) => line.to_string(),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Join translated chunks, trimmed and without empties. Sentence-split continuations rejoin
/// their predecessor with the source gap; everything else is separated by a blank line.
pub fn merge_chunks(chunks: &[TextChunk], translated: &[String]) -> String {
    let mut out = String::new();
    for (chunk, text) in chunks.iter().zip(translated) {
        let text = text.trim();
        if text.is_empty() {
            continue;
        }
        if !out.is_empty() {
            out.push_str(chunk.join_separator());
        }
        out.push_str(text);
    }
    out
}

/// Retranslate the chunks matching the gap together with their neighbours in one call and
/// splice the answer back by position. `None` when the call fails or nothing is selected.
fn retranslate_focused(
    ctx: &TrackContext<'_>,
    chunks: &[TextChunk],
    translated: &mut [String],
    missing: &str,
) -> Option<()> {
    let texts: Vec<&str> = chunks.iter().map(|c| c.content.as_str()).collect();
    let focus = focus_indices(&texts, missing);
    if focus.is_empty() {
        return None;
    }
    ctx.progress
        .info(format!("retranslating {} chunks around the gap", focus.len()));

    let segments = focus
        .iter()
        .enumerate()
        .map(|(n, &ci)| format!("{}\n{}", segment_label(n + 1), chunks[ci].content))
        .collect::<Vec<_>>()
        .join(&format!("\n\n{SEGMENT_DELIMITER}\n\n"));
    let prompt = render_template(
        &ctx.prompts.focused_retranslate,
        &[("missing", missing), ("segments", &segments)],
    );
    let raw = match ctx.capability.complete(&prompt) {
        Ok(r) => r,
        Err(e) => {
            ctx.progress.warn(format!("focused retranslation failed: {e}"));
            return None;
        }
    };

    let (parts, exact) = split_segments(&raw, focus.len());
    if parts.is_empty() {
        return None;
    }
    if !exact {
        ctx.progress.warn(format!(
            "focused retranslation returned {} segments for {}; splicing by position",
            parts.len(),
            focus.len()
        ));
    }
    for (part, &ci) in parts.into_iter().zip(&focus) {
        translated[ci] = part;
    }
    Some(())
}

/// Retranslate the leading whole chunks that fit in a quarter of the source, capped at
/// [`EXCERPT_MAX_CHARS`].
fn retranslate_excerpt(
    ctx: &TrackContext<'_>,
    source: &str,
    chunks: &[TextChunk],
    translated: &mut [String],
    missing: &str,
) -> Option<()> {
    let limit = EXCERPT_MAX_CHARS.min(source.chars().count() / 4);
    let mut covered = 0;
    let mut used = 0;
    for chunk in chunks {
        let len = chunk.content.chars().count() + if covered == 0 { 0 } else { 2 };
        if used + len > limit {
            break;
        }
        used += len;
        covered += 1;
    }
    if covered == 0 {
        return None;
    }
    let excerpt = chunks[..covered]
        .iter()
        .map(|c| c.content.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");
    ctx.progress
        .info(format!("retranslating leading excerpt ({covered} chunks)"));
    let prompt = render_template(
        &ctx.prompts.excerpt_retranslate,
        &[("missing", missing), ("text", &excerpt)],
    );
    let answer = match ctx.capability.complete(&prompt) {
        Ok(a) => a,
        Err(e) => {
            ctx.progress.warn(format!("excerpt retranslation failed: {e}"));
            return None;
        }
    };

    let parts = split_blank_paragraphs(&answer);
    if parts.len() == covered {
        for (slot, part) in translated.iter_mut().zip(parts) {
            *slot = part;
        }
        return Some(());
    }
    translated[0] = answer.trim().to_string();
    for slot in translated.iter_mut().take(covered).skip(1) {
        slot.clear();
    }
    Some(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::Comparison;
    use crate::error::CapabilityError;

    struct CommentEcho;

    impl TranslationCapability for CommentEcho {
        fn translate(&self, text: &str) -> CapabilityResult<String> {
            if text.contains("fail") {
                return Err(CapabilityError::Backend("no".into()));
            }
            Ok(format!("# 注释:{}", text.trim_start_matches(['#', '/', ' '])))
        }

        fn summarize(&self, _t: &str, _r: SummaryRole) -> CapabilityResult<String> {
            Ok(String::new())
        }

        fn compare(&self, _a: &str, _b: &str) -> CapabilityResult<Comparison> {
            Ok(Comparison::default())
        }

        fn complete(&self, _p: &str) -> CapabilityResult<String> {
            Ok(String::new())
        }
    }

    #[test]
    fn code_comments_only() {
        let code = "```python\n    # load data\nx = 1  # inline\n// fail here\n```";
        assert_eq!(
            translate_code_comments(&CommentEcho, code),
            "```python\n    # 注释:load data\nx = 1  # inline\n// fail here\n```"
        );
    }

    #[test]
    fn merge_drops_empties_and_rejoins_continuations() {
        let mut second = TextChunk::new("b".into(), ChunkKind::Paragraph, 0);
        second.lead = " ".into();
        let chunks = vec![
            TextChunk::new("a".into(), ChunkKind::Paragraph, 0),
            second,
            TextChunk::new("c".into(), ChunkKind::Paragraph, 0),
            TextChunk::new("d".into(), ChunkKind::Paragraph, 0),
        ];
        let out = merge_chunks(
            &chunks,
            &["甲 ".to_string(), "乙".to_string(), "  ".to_string(), "丁".to_string()],
        );
        assert_eq!(out, "甲 乙\n\n丁");
    }
}
