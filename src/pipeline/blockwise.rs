//! RST track: every translatable block is translated on its own. A reported gap is repaired
//! first on keyword-scored blocks, then, if that yields nothing, over the whole document.

use crate::capability::{Comparison, SummaryRole};
use crate::document::{translatable_indices, DocumentBlock};
use crate::pipeline::prompts::render_template;
use crate::pipeline::refine::{
    compare_or_failed, fallback_keywords, parse_keyword_list, parse_segments, score_targets,
    segment_label, summarize_or_note, widen,
};
use crate::pipeline::stats::{RefineMode, TranslationStats};
use crate::pipeline::TrackContext;
use crate::textutil::{preview, split_blank_paragraphs};

struct Units {
    blocks: Vec<usize>,
    originals: Vec<String>,
    currents: Vec<String>,
}

impl Units {
    fn collect(blocks: &[DocumentBlock]) -> Self {
        let indices = translatable_indices(blocks);
        let originals: Vec<String> = indices
            .iter()
            .map(|&i| blocks[i].inner_text().trim().to_string())
            .collect();
        Self {
            blocks: indices,
            currents: originals.clone(),
            originals,
        }
    }

    fn len(&self) -> usize {
        self.blocks.len()
    }

    fn unit_of_block(&self, block: usize) -> Option<usize> {
        self.blocks.binary_search(&block).ok()
    }

    fn joined_originals(&self, sep: &str) -> String {
        self.originals.join(sep)
    }

    fn joined_currents(&self, sep: &str) -> String {
        self.currents.join(sep)
    }

    /// Write changed units back into their blocks; returns how many stayed untouched.
    fn apply(&self, blocks: &mut [DocumentBlock]) -> usize {
        let mut untouched = 0;
        for ((&bi, original), current) in self.blocks.iter().zip(&self.originals).zip(&self.currents)
        {
            if current.is_empty() || current == original {
                untouched += 1;
            } else {
                blocks[bi].replace_text(current.as_str());
            }
        }
        untouched
    }
}

pub(crate) fn translate_blockwise(
    ctx: &TrackContext<'_>,
    blocks: &mut [DocumentBlock],
    stats: &mut TranslationStats,
) {
    let mut units = Units::collect(blocks);
    stats.chunk_count = units.len();

    for k in 0..units.len() {
        ctx.progress.progress("translate block", k + 1, units.len());
        match ctx.capability.translate(&units.originals[k]) {
            Ok(t) => units.currents[k] = t.trim().to_string(),
            Err(e) => ctx.progress.warn(format!(
                "block {} kept in source language: {e}",
                units.blocks[k] + 1
            )),
        }
    }

    let (mut original_summary, mut translated_summary, mut comparison) = assess(ctx, &units);
    ctx.progress
        .info(format!("completeness score {}/10", comparison.completeness_score));

    if ctx.refine.should_refine(&comparison) {
        if comparison.has_missing() {
            ctx.progress
                .info(format!("missing: {}", preview(&comparison.missing_content, 120)));
        }
        let mode = if improve_targeted(ctx, &mut units, &comparison) {
            Some(RefineMode::Targeted)
        } else {
            ctx.progress
                .info("targeted repair produced nothing; improving every block");
            improve_all(ctx, &mut units, &comparison).then_some(RefineMode::Full)
        };
        if let Some(mode) = mode {
            (original_summary, translated_summary, comparison) = assess(ctx, &units);
            stats.refine_mode = Some(mode);
            ctx.progress.info(format!(
                "completeness score after {} repair {}/10",
                mode.as_str(),
                comparison.completeness_score
            ));
        }
    }

    stats.untranslated_blocks = units.apply(blocks);
    stats.original_summary = original_summary;
    stats.translated_summary = translated_summary;
    stats.set_comparison(comparison);
}

fn assess(ctx: &TrackContext<'_>, units: &Units) -> (String, String, Comparison) {
    let original = summarize_or_note(
        ctx.capability,
        &units.joined_originals("\n"),
        SummaryRole::Original,
        ctx.progress,
    );
    let translated = summarize_or_note(
        ctx.capability,
        &units.joined_currents("\n"),
        SummaryRole::Translated,
        ctx.progress,
    );
    let comparison = compare_or_failed(ctx.capability, &original, &translated, ctx.progress);
    (original, translated, comparison)
}

/// Keywords for the gap: reverse-extracted by the model, or the description's own
/// alphanumeric words when that fails.
fn gap_keywords(ctx: &TrackContext<'_>, missing: &str) -> Vec<String> {
    let prompt = render_template(&ctx.prompts.reverse_keywords, &[("missing", missing)]);
    let keywords = match ctx.capability.complete(&prompt) {
        Ok(raw) => parse_keyword_list(&raw),
        Err(e) => {
            ctx.progress.warn(format!("keyword extraction failed: {e}"));
            Vec::new()
        }
    };
    if keywords.is_empty() {
        return fallback_keywords(missing);
    }
    keywords
}

/// Improve the best keyword matches plus neighbouring blocks in one call. The answer must split
/// into exactly one segment per submitted block; anything else leaves the units unchanged.
fn improve_targeted(ctx: &TrackContext<'_>, units: &mut Units, cmp: &Comparison) -> bool {
    if !cmp.has_missing() {
        return false;
    }
    let keywords = gap_keywords(ctx, &cmp.missing_content);
    if keywords.is_empty() {
        return false;
    }

    let scored: Vec<(usize, &str)> = units
        .blocks
        .iter()
        .zip(&units.originals)
        .map(|(&bi, text)| (bi, text.as_str()))
        .collect();
    let primary: Vec<usize> = score_targets(&scored, &keywords, ctx.refine.max_targets)
        .into_iter()
        .filter_map(|b| units.unit_of_block(b))
        .collect();
    // Neighbours are the adjacent translatable blocks, skipping blank and markup lines.
    let targets = widen(&primary, units.len(), |_| true);
    if targets.is_empty() {
        return false;
    }
    ctx.progress.info(format!(
        "targeted repair on {} blocks (keywords: {})",
        targets.len(),
        keywords.join(", ")
    ));

    let segments = targets
        .iter()
        .enumerate()
        .map(|(n, &k)| {
            format!(
                "{}\n原文:\n{}\n当前译文:\n{}",
                segment_label(n + 1),
                units.originals[k],
                units.currents[k]
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n-----\n\n");
    let prompt = render_template(
        &ctx.prompts.improve_segments,
        &[
            ("missing", cmp.missing_content.as_str()),
            ("suggestions", cmp.suggestions.as_str()),
            ("segments", &segments),
        ],
    );
    let raw = match ctx.capability.complete(&prompt) {
        Ok(r) => r,
        Err(e) => {
            ctx.progress.warn(format!("targeted repair failed: {e}"));
            return false;
        }
    };
    let parts = match parse_segments(&raw, targets.len()) {
        Ok(p) => p,
        Err(e) => {
            ctx.progress.warn(format!("targeted repair discarded: {e}"));
            return false;
        }
    };
    for (part, &k) in parts.into_iter().zip(&targets) {
        if !part.is_empty() {
            units.currents[k] = part;
        }
    }
    true
}

/// Improve every unit in one call. Paragraphs are assigned in order; units beyond the answer's
/// paragraph count keep their current translation.
fn improve_all(ctx: &TrackContext<'_>, units: &mut Units, cmp: &Comparison) -> bool {
    if units.len() == 0 {
        return false;
    }
    let original = units.joined_originals("\n\n");
    let current = units.joined_currents("\n\n");
    let prompt = render_template(
        &ctx.prompts.improve_all,
        &[
            ("missing", cmp.missing_content.as_str()),
            ("suggestions", cmp.suggestions.as_str()),
            ("original", &original),
            ("current", &current),
        ],
    );
    let raw = match ctx.capability.complete(&prompt) {
        Ok(r) => r,
        Err(e) => {
            ctx.progress.warn(format!("full repair failed: {e}"));
            return false;
        }
    };
    let paragraphs = split_blank_paragraphs(&raw);
    if paragraphs.is_empty() {
        return false;
    }
    if paragraphs.len() != units.len() {
        ctx.progress.warn(format!(
            "full repair returned {} paragraphs for {} blocks; assigning in order",
            paragraphs.len(),
            units.len()
        ));
    }
    for (slot, p) in units.currents.iter_mut().zip(paragraphs) {
        *slot = p;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{FormatProcessor, RstProcessor};

    #[test]
    fn units_map_back_to_blocks() {
        let blocks = RstProcessor::new().parse("Title\n=====\n\nBody one.\n\n.. note::\n\n   inner\n\nBody two.");
        let units = Units::collect(&blocks);
        assert_eq!(units.originals, vec!["Title", "Body one.", "Body two."]);
        assert_eq!(units.unit_of_block(3), Some(1));
        assert_eq!(units.unit_of_block(1), None);
    }

    #[test]
    fn apply_skips_unchanged_units() {
        let p = RstProcessor::new();
        let mut blocks = p.parse("Hello\n=====\n\nBody text.");
        let mut units = Units::collect(&blocks);
        units.currents[0] = "你好".to_string();
        assert_eq!(units.apply(&mut blocks), 1);
        assert_eq!(p.reconstruct(&blocks), "你好\n====\n\nBody text.");
    }
}
