use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;

use crate::capability::{Comparison, SummaryRole, TranslationCapability};
use crate::chunker::{ApproxTokenCounter, Chunker, TiktokenCounter, TokenCounter};
use crate::document::registry::normalize_extension;
use crate::document::{translatable_indices, DocumentFormat, FormatProcessor, ProcessorRegistry};
use crate::error::LtError;
use crate::progress::ConsoleProgress;

use super::blockwise::translate_blockwise;
use super::flatten::translate_flattened;
use super::refine::{compare_or_failed, summarize_or_note};
use super::stats::TranslationStats;
use super::{PipelineConfig, TrackContext};

pub const SIGNATURE: &str = "由 Qwen-plus 及 LT agent 翻译";
const RST_SIGNATURE_RULE_WIDTH: usize = 50;
pub const BATCH_REPORT_FILENAME: &str = "batch_translation_report.json";
/// Batch pattern meaning "every supported extension".
pub const ALL_SUPPORTED_PATTERN: &str = "*.*";

#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum BatchEntry {
    Translated(Box<TranslationStats>),
    Failed {
        input_file: String,
        error: String,
        completeness_score: u8,
    },
}

impl BatchEntry {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Translated(_))
    }

    #[must_use]
    pub fn completeness_score(&self) -> u8 {
        match self {
            Self::Translated(stats) => stats.completeness_score,
            Self::Failed {
                completeness_score, ..
            } => *completeness_score,
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ValidationReport {
    pub original_summary: String,
    pub translated_summary: String,
    pub comparison_result: Comparison,
    pub validation_score: u8,
}

pub struct DocumentTranslator {
    cfg: PipelineConfig,
    capability: Box<dyn TranslationCapability>,
    registry: ProcessorRegistry,
    chunker: Chunker,
    progress: ConsoleProgress,
}

impl DocumentTranslator {
    pub fn new(
        cfg: PipelineConfig,
        capability: Box<dyn TranslationCapability>,
        progress: ConsoleProgress,
    ) -> Self {
        let counter = token_counter(cfg.tokenizer_model.as_deref(), &progress);
        let chunker = Chunker::new(cfg.max_tokens, counter);
        Self {
            cfg,
            capability,
            registry: ProcessorRegistry::with_defaults(),
            chunker,
            progress,
        }
    }

    fn track_context(&self) -> TrackContext<'_> {
        TrackContext {
            capability: self.capability.as_ref(),
            chunker: &self.chunker,
            prompts: &self.cfg.prompts,
            refine: &self.cfg.refine,
            progress: &self.progress,
        }
    }

    pub fn translate_text(
        &self,
        text: &str,
        extension: &str,
    ) -> anyhow::Result<(String, TranslationStats)> {
        let processor = self.registry.create(extension)?;
        let format = processor.format();
        let (metadata, body) = processor.extract_metadata(text);
        if let Some(meta) = metadata.as_ref() {
            let keys: Vec<&str> = meta.fields().iter().map(|(k, _)| *k).collect();
            self.progress
                .info(format!("metadata fields: {}", keys.join(", ")));
        }

        let mut blocks = processor.parse(&body);
        let mut stats = TranslationStats {
            file_format: normalize_extension(extension),
            translator_id: self.cfg.translator_id.clone(),
            total_blocks: blocks.len(),
            translatable_blocks: translatable_indices(&blocks).len(),
            ..TranslationStats::default()
        };
        self.progress.info(format!(
            "parsed {} blocks ({} translatable)",
            stats.total_blocks, stats.translatable_blocks
        ));

        let ctx = self.track_context();
        match format {
            DocumentFormat::Markdown => {
                translate_flattened(&ctx, &processor, &mut blocks, &mut stats)
            }
            DocumentFormat::Rst => translate_blockwise(&ctx, &mut blocks, &mut stats),
        }

        stats.misaligned_titles = processor.misaligned_titles(&blocks);
        for title in &stats.misaligned_titles {
            self.progress
                .warn(format!("title wider than its preserved rule: {title}"));
        }

        let body_out = processor.reconstruct(&blocks);
        let document = match metadata {
            Some(mut meta) => {
                meta.mark_translated(&self.cfg.translator_id);
                processor.format_with_metadata(Some(&meta), &body_out)
            }
            None => body_out,
        };
        Ok((append_signature(&document, format), stats))
    }

    /// Translate `input` into `output` (default `{stem}_translated{ext}` beside the input) and
    /// write `{output stem}.stats.json` when stats saving is on.
    pub fn translate_file(
        &self,
        input: &Path,
        output: Option<&Path>,
    ) -> anyhow::Result<TranslationStats> {
        if !input.is_file() {
            return Err(LtError::InputNotFound(input.to_path_buf()).into());
        }
        let extension = extension_of(input);
        if !self.registry.is_supported(&extension) {
            return Err(LtError::UnsupportedFormat {
                extension,
                supported: self.registry.list_supported(),
            }
            .into());
        }
        self.progress.info(format!("translate: {}", input.display()));

        let text = std::fs::read_to_string(input)
            .with_context(|| format!("read input: {}", input.display()))?;
        let (document, mut stats) = self.translate_text(&text, &extension)?;

        let output = output.map_or_else(|| default_output_path(input), Path::to_path_buf);
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create output dir: {}", parent.display()))?;
        }
        std::fs::write(&output, document)
            .with_context(|| format!("write output: {}", output.display()))?;
        self.progress.info(format!("wrote: {}", output.display()));

        stats.input_file = input.display().to_string();
        stats.output_file = output.display().to_string();
        if self.cfg.save_stats {
            let stats_path = output.with_extension("stats.json");
            std::fs::write(&stats_path, stats.to_json_pretty()?)
                .with_context(|| format!("write stats: {}", stats_path.display()))?;
        }
        Ok(stats)
    }

    /// Translate every matching file of `input_dir` in order. Per-file failures are recorded
    /// and the run continues. A JSON report of all entries is written to the output directory.
    pub fn batch_translate(
        &self,
        input_dir: &Path,
        output_dir: Option<&Path>,
        pattern: &str,
    ) -> anyhow::Result<Vec<BatchEntry>> {
        if !input_dir.is_dir() {
            return Err(LtError::InputNotFound(input_dir.to_path_buf()).into());
        }
        let output_dir =
            output_dir.map_or_else(|| input_dir.join("translated"), Path::to_path_buf);
        std::fs::create_dir_all(&output_dir)
            .with_context(|| format!("create output dir: {}", output_dir.display()))?;

        let files = self.collect_batch_files(input_dir, pattern)?;
        if files.is_empty() {
            self.progress.info(format!(
                "no matching files in {} (supported: {})",
                input_dir.display(),
                self.registry.list_supported().join(", ")
            ));
        }

        let mut entries = Vec::with_capacity(files.len());
        for (i, file) in files.iter().enumerate() {
            self.progress.progress("batch", i + 1, files.len());
            let out = output_dir.join(translated_file_name(file));
            match self.translate_file(file, Some(&out)) {
                Ok(stats) => entries.push(BatchEntry::Translated(Box::new(stats))),
                Err(e) => {
                    self.progress
                        .warn(format!("{} failed: {e:#}", file.display()));
                    entries.push(BatchEntry::Failed {
                        input_file: file.display().to_string(),
                        error: format!("{e:#}"),
                        completeness_score: 0,
                    });
                }
            }
        }

        let report_path = output_dir.join(BATCH_REPORT_FILENAME);
        let json = serde_json::to_string_pretty(&entries).context("serialize batch report")?;
        std::fs::write(&report_path, json)
            .with_context(|| format!("write batch report: {}", report_path.display()))?;
        Ok(entries)
    }

    fn collect_batch_files(&self, input_dir: &Path, pattern: &str) -> anyhow::Result<Vec<PathBuf>> {
        let base = glob::Pattern::escape(&input_dir.to_string_lossy());
        let patterns: Vec<String> = if pattern == ALL_SUPPORTED_PATTERN {
            self.registry
                .list_supported()
                .iter()
                .map(|ext| format!("{base}/*{ext}"))
                .collect()
        } else {
            vec![format!("{base}/{pattern}")]
        };

        let mut files = Vec::new();
        for pat in &patterns {
            let paths = glob::glob(pat).with_context(|| format!("invalid pattern: {pat}"))?;
            files.extend(paths.filter_map(Result::ok).filter(|p| p.is_file()));
        }
        files.sort();
        files.dedup();
        Ok(files)
    }

    /// Summarize both documents (metadata stripped) and compare the summaries.
    pub fn validate_translation(
        &self,
        original: &Path,
        translated: &Path,
    ) -> anyhow::Result<ValidationReport> {
        let original_body = self.read_body(original)?;
        let translated_body = self.read_body(translated)?;
        let cap = self.capability.as_ref();

        let original_summary =
            summarize_or_note(cap, &original_body, SummaryRole::Original, &self.progress);
        let translated_summary =
            summarize_or_note(cap, &translated_body, SummaryRole::Translated, &self.progress);
        let comparison =
            compare_or_failed(cap, &original_summary, &translated_summary, &self.progress);
        Ok(ValidationReport {
            validation_score: comparison.completeness_score,
            original_summary,
            translated_summary,
            comparison_result: comparison,
        })
    }

    fn read_body(&self, path: &Path) -> anyhow::Result<String> {
        if !path.is_file() {
            return Err(LtError::InputNotFound(path.to_path_buf()).into());
        }
        let processor = self.registry.create(&extension_of(path))?;
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read: {}", path.display()))?;
        Ok(processor.extract_metadata(&text).1)
    }
}

fn token_counter(model: Option<&str>, progress: &ConsoleProgress) -> Box<dyn TokenCounter> {
    let Some(model) = model else {
        return Box::new(ApproxTokenCounter);
    };
    match TiktokenCounter::for_model(model) {
        Ok(counter) => Box::new(counter),
        Err(e) => {
            progress.warn(format!("tokenizer unavailable ({e:#}); estimating token counts"));
            Box::new(ApproxTokenCounter)
        }
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default()
}

fn translated_file_name(input: &Path) -> String {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    format!("{stem}_translated{}", extension_of(input))
}

#[must_use]
pub fn default_output_path(input: &Path) -> PathBuf {
    input.with_file_name(translated_file_name(input))
}

/// Trailing newlines are dropped, then a blank line and the signature follow. RST documents get
/// a rule of `=` between body and signature.
#[must_use]
pub fn append_signature(document: &str, format: DocumentFormat) -> String {
    let body = document.trim_end_matches('\n');
    match format {
        DocumentFormat::Markdown => format!("{body}\n\n{SIGNATURE}"),
        DocumentFormat::Rst => format!(
            "{body}\n\n{}\n\n{SIGNATURE}",
            "=".repeat(RST_SIGNATURE_RULE_WIDTH)
        ),
    }
}

#[must_use]
pub fn translation_report(stats: &TranslationStats) -> String {
    let rule = "=".repeat(60);
    let mut lines = vec![
        rule.clone(),
        "翻译报告".to_string(),
        rule.clone(),
        format!("输入文件: {}", stats.input_file),
        format!("输出文件: {}", stats.output_file),
        format!("文件格式: {}", stats.file_format),
        format!("翻译者: {}", stats.translator_id),
        String::new(),
        "文档统计:".to_string(),
        format!("  总块数: {}", stats.total_blocks),
        format!("  可翻译块: {}", stats.translatable_blocks),
        format!("  分块数: {}", stats.chunk_count),
        format!("  未翻译块: {}", stats.untranslated_blocks),
        String::new(),
        "质量评估:".to_string(),
        format!("  完整性评分: {}/10", stats.completeness_score),
    ];
    if let Some(mode) = stats.refine_mode {
        lines.push(format!("  改进方式: {}", mode.as_str()));
    }
    if !stats.misaligned_titles.is_empty() {
        lines.push(format!("  标题线宽不足: {}", stats.misaligned_titles.len()));
    }
    lines.extend([
        String::new(),
        "原文摘要:".to_string(),
        format!("  {}", stats.original_summary),
        String::new(),
        "译文摘要:".to_string(),
        format!("  {}", stats.translated_summary),
        String::new(),
        rule,
    ]);
    lines.join("\n")
}
