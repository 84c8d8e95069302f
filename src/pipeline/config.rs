use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::chunker::{DEFAULT_MAX_TOKENS, DEFAULT_TOKENIZER_MODEL};
use crate::config::{
    find_default_config, load_config, AppConfig, ModelSection, CONFIG_ENV_VAR,
    DEFAULT_CONFIG_FILENAME,
};
use crate::document::metadata::PLACEHOLDER_GITHUB_ID;
use crate::pipeline::prompts::{default_prompt_files, PromptSet, DEFAULT_PROMPTS_DIR};
use crate::pipeline::refine::{RefineSettings, DEFAULT_MAX_TARGETS, DEFAULT_REFINE_THRESHOLD};

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub translator_id: Option<String>,
    pub max_tokens: Option<usize>,
    pub threshold: Option<u8>,
    pub no_refine: bool,
    pub model: Option<String>,
}

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub config_path: PathBuf,

    pub translator_id: String,
    pub max_tokens: usize,
    pub refine: RefineSettings,
    /// `None` counts tokens with the offline estimator.
    pub tokenizer_model: Option<String>,
    pub save_stats: bool,

    pub trace_dir: PathBuf,
    pub trace_prompts: bool,

    pub model: ModelSection,
    pub model_override: Option<String>,
    pub prompts: PromptSet,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            config_path: PathBuf::from(DEFAULT_CONFIG_FILENAME),
            translator_id: PLACEHOLDER_GITHUB_ID.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            refine: RefineSettings::default(),
            tokenizer_model: None,
            save_stats: true,
            trace_dir: PathBuf::from("_trace"),
            trace_prompts: false,
            model: ModelSection::default(),
            model_override: None,
            prompts: PromptSet::default(),
        }
    }
}

impl PipelineConfig {
    /// Resolve the config file (explicit path, then `LT_TRANSLATOR_CONFIG`, then an upward
    /// search from the current and `workdir` directories) and merge it with `overrides`.
    pub fn from_overrides(workdir: &Path, overrides: ConfigOverrides) -> anyhow::Result<Self> {
        let workdir = workdir.canonicalize().unwrap_or_else(|_| workdir.to_path_buf());

        let cfg_file = overrides
            .config_path
            .clone()
            .or_else(|| std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from))
            .or_else(|| find_default_config(&workdir, DEFAULT_CONFIG_FILENAME));

        let mut file_cfg = AppConfig::default();
        if let Some(p) = cfg_file.as_ref() {
            if p.exists() {
                file_cfg = load_config(p)?;
            }
        }
        let cfg_path = cfg_file.unwrap_or_else(|| workdir.join(DEFAULT_CONFIG_FILENAME));
        let p = &file_cfg.pipeline;

        let translator_id = overrides
            .translator_id
            .or_else(|| p.translator_id.clone())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| PLACEHOLDER_GITHUB_ID.to_string());
        let max_tokens = overrides
            .max_tokens
            .or(p.max_tokens)
            .unwrap_or(DEFAULT_MAX_TOKENS)
            .max(1);
        let refine = RefineSettings {
            threshold: overrides
                .threshold
                .or(p.refine_threshold)
                .unwrap_or(DEFAULT_REFINE_THRESHOLD)
                .min(10),
            enabled: !overrides.no_refine && p.enable_refine.unwrap_or(true),
            max_targets: p.max_targets.unwrap_or(DEFAULT_MAX_TARGETS).max(1),
        };
        let tokenizer_model = Some(
            p.tokenizer_model
                .clone()
                .unwrap_or_else(|| DEFAULT_TOKENIZER_MODEL.to_string()),
        );

        let trace_dir = p.trace_dir.clone().unwrap_or_else(|| "_trace".to_string());
        let trace_dir = if Path::new(&trace_dir).is_absolute() {
            PathBuf::from(trace_dir)
        } else {
            workdir.join(trace_dir)
        };

        let prompts = PromptSet::load(&cfg_path, &file_cfg).context("load prompts")?;

        Ok(Self {
            config_path: cfg_path,
            translator_id,
            max_tokens,
            refine,
            tokenizer_model,
            save_stats: p.save_stats.unwrap_or(true),
            trace_dir,
            trace_prompts: p.trace_prompts.unwrap_or(false),
            model: file_cfg.model.clone(),
            model_override: overrides.model,
            prompts,
        })
    }
}

pub fn init_default_config(dir: &Path, force: bool) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create config dir: {}", dir.display()))?;
    let cfg_path = dir.join(DEFAULT_CONFIG_FILENAME);

    let prompts_dir = dir.join(DEFAULT_PROMPTS_DIR);
    std::fs::create_dir_all(&prompts_dir)
        .with_context(|| format!("create prompts dir: {}", prompts_dir.display()))?;

    for (fname, body) in default_prompt_files() {
        let p = prompts_dir.join(fname);
        if p.exists() && !force {
            continue;
        }
        std::fs::write(&p, body).with_context(|| format!("write prompt: {}", p.display()))?;
    }

    if cfg_path.exists() && !force {
        return Ok(cfg_path);
    }
    std::fs::write(&cfg_path, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("write config: {}", cfg_path.display()))?;
    Ok(cfg_path)
}

const DEFAULT_CONFIG_TOML: &str = r#"[pipeline]
translator_id = "FILL_YOUR_GITHUB_ID_HERE"
max_tokens = 800
refine_threshold = 8
enable_refine = true
# Targeted repair picks at most this many blocks (RST).
max_targets = 5
# BPE encoding used for chunk budgets; unknown names fall back to cl100k_base.
tokenizer_model = "gpt-3.5-turbo"
save_stats = true

trace_dir = "_trace"
trace_prompts = false

[prompts]
system = "prompts/system.txt"
translate = "prompts/translate.txt"
summarize_original = "prompts/summarize_original.txt"
summarize_translated = "prompts/summarize_translated.txt"
compare = "prompts/compare.txt"
focused_retranslate = "prompts/focused_retranslate.txt"
excerpt_retranslate = "prompts/excerpt_retranslate.txt"
reverse_keywords = "prompts/reverse_keywords.txt"
improve_segments = "prompts/improve_segments.txt"
improve_all = "prompts/improve_all.txt"

[model]
# The prompt is written to stdin; the answer is read from stdout.
command = "ollama"
args = ["run", "{model}"]
name = "qwen2.5:7b"
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_writes_config_and_prompts() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg_path = init_default_config(dir.path(), false).expect("init");
        assert!(cfg_path.ends_with(DEFAULT_CONFIG_FILENAME));
        assert!(dir.path().join("prompts").join("compare.txt").exists());

        std::fs::write(&cfg_path, "[pipeline]\nmax_tokens = 42\n").expect("write");
        init_default_config(dir.path(), false).expect("init again");
        assert_eq!(
            std::fs::read_to_string(&cfg_path).expect("read"),
            "[pipeline]\nmax_tokens = 42\n"
        );
        init_default_config(dir.path(), true).expect("force");
        assert!(std::fs::read_to_string(&cfg_path)
            .expect("read")
            .contains("max_tokens = 800"));
    }

    #[test]
    fn config_is_found_above_the_input_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join(DEFAULT_CONFIG_FILENAME),
            "[pipeline]\nmax_tokens = 42\n",
        )
        .expect("write");
        let docs = dir.path().join("docs").join("guide");
        std::fs::create_dir_all(&docs).expect("mkdir");

        let cfg = PipelineConfig::from_overrides(&docs, ConfigOverrides::default()).expect("config");
        assert_eq!(cfg.max_tokens, 42);
    }

    #[test]
    fn overrides_beat_file_values() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cfg_path = init_default_config(dir.path(), false).expect("init");
        let cfg = PipelineConfig::from_overrides(
            dir.path(),
            ConfigOverrides {
                config_path: Some(cfg_path),
                max_tokens: Some(300),
                no_refine: true,
                translator_id: Some("octocat".into()),
                ..ConfigOverrides::default()
            },
        )
        .expect("config");
        assert_eq!(cfg.max_tokens, 300);
        assert!(!cfg.refine.enabled);
        assert_eq!(cfg.refine.threshold, 8);
        assert_eq!(cfg.translator_id, "octocat");
        assert_eq!(cfg.model.command.as_deref(), Some("ollama"));
        assert_eq!(cfg.tokenizer_model.as_deref(), Some("gpt-3.5-turbo"));
    }
}
