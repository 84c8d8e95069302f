use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILENAME: &str = "lt-translator.toml";
pub const CONFIG_ENV_VAR: &str = "LT_TRANSLATOR_CONFIG";

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub prompts: PromptsSection,
    #[serde(default)]
    pub model: ModelSection,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct PipelineSection {
    /// Written into the `translator` metadata field of translated documents.
    #[serde(default)]
    pub translator_id: Option<String>,

    /// Token budget per chunk (Markdown track).
    #[serde(default)]
    pub max_tokens: Option<usize>,

    /// Refinement runs when the completeness score is below this.
    #[serde(default)]
    pub refine_threshold: Option<u8>,
    #[serde(default)]
    pub enable_refine: Option<bool>,

    /// Model name used to pick the BPE encoding for token counting.
    #[serde(default)]
    pub tokenizer_model: Option<String>,

    /// Blocks picked by keyword score in targeted repair (RST track).
    #[serde(default)]
    pub max_targets: Option<usize>,

    #[serde(default)]
    pub save_stats: Option<bool>,

    #[serde(default)]
    pub trace_dir: Option<String>,
    #[serde(default)]
    pub trace_prompts: Option<bool>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct PromptsSection {
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub translate: Option<String>,
    #[serde(default)]
    pub summarize_original: Option<String>,
    #[serde(default)]
    pub summarize_translated: Option<String>,
    #[serde(default)]
    pub compare: Option<String>,
    #[serde(default)]
    pub focused_retranslate: Option<String>,
    #[serde(default)]
    pub excerpt_retranslate: Option<String>,
    #[serde(default)]
    pub reverse_keywords: Option<String>,
    #[serde(default)]
    pub improve_segments: Option<String>,
    #[serde(default)]
    pub improve_all: Option<String>,
}

/// External command that answers one prompt per invocation (prompt on stdin, answer on stdout).
#[derive(Clone, Debug, Deserialize, Default)]
pub struct ModelSection {
    #[serde(default)]
    pub command: Option<String>,
    /// `{model}` in any argument is replaced by `name`.
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub name: Option<String>,
}

pub fn find_file_upwards(start_dir: &Path, filename: &str, max_levels: usize) -> Option<PathBuf> {
    let mut dir = start_dir;
    for _ in 0..=max_levels {
        let candidate = dir.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
    None
}

pub fn find_default_config(workdir: &Path, filename: &str) -> Option<PathBuf> {
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(p) = find_file_upwards(&cwd, filename, 8) {
            return Some(p);
        }
    }
    if let Some(p) = find_file_upwards(workdir, filename, 8) {
        return Some(p);
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            if let Some(p) = find_file_upwards(dir, filename, 10) {
                return Some(p);
            }
        }
    }
    None
}

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let cfg: AppConfig = toml::from_str(&text).context("parse config toml")?;
    Ok(cfg)
}
