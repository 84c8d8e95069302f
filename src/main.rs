use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args as ClapArgs, Parser, Subcommand};

use lt_translator::capability::{EchoCapability, TranslationCapability};
use lt_translator::document::{FormatProcessor, ProcessorRegistry};
use lt_translator::models::{ChatBackend, CommandBackend, PromptedModel};
use lt_translator::pipeline::{
    init_default_config, translation_report, ConfigOverrides, DocumentTranslator, PipelineConfig,
    TraceWriter, ALL_SUPPORTED_PATTERN,
};
use lt_translator::progress::ConsoleProgress;

#[derive(Parser, Debug)]
#[command(name = "lt-translator")]
#[command(about = "English to Chinese long-document translator (Markdown, reStructuredText)", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(ClapArgs, Debug)]
struct GlobalArgs {
    /// Config file path (default: search for lt-translator.toml upwards, or LT_TRANSLATOR_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Model name substituted for `{model}` in the configured command
    #[arg(long, global = true)]
    model: Option<String>,

    /// Translator id written into document metadata
    #[arg(long = "translator", global = true, value_name = "GITHUB_ID")]
    translator_id: Option<String>,

    /// Token budget per chunk
    #[arg(long, global = true)]
    max_tokens: Option<usize>,

    /// Refine when the completeness score is below this value (0-10)
    #[arg(long, global = true)]
    threshold: Option<u8>,

    /// Skip the refinement pass
    #[arg(long, global = true)]
    no_refine: bool,

    /// Run without a model: text passes through unchanged
    #[arg(long, global = true)]
    dry_run: bool,

    /// Only print warnings
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Translate one file
    Translate {
        #[arg(value_name = "FILE")]
        input: PathBuf,

        /// Output file (default: <stem>_translated<ext> beside the input)
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Translate every matching file of a directory
    Batch {
        #[arg(value_name = "DIR")]
        input_dir: PathBuf,

        /// Output directory (default: <DIR>/translated)
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Glob relative to DIR; `*.*` selects every supported extension
        #[arg(short, long, default_value = ALL_SUPPORTED_PATTERN)]
        pattern: String,
    },
    /// Compare summaries of an original and a translated file
    Validate {
        #[arg(value_name = "ORIGINAL")]
        original: PathBuf,

        #[arg(value_name = "TRANSLATED")]
        translated: PathBuf,
    },
    /// Write the default config and prompt files, then exit
    InitConfig {
        /// Target directory (default: current directory)
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,

        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },
    /// Print the parsed block list of a file as JSON (no model)
    Blocks {
        #[arg(value_name = "FILE")]
        input: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let progress = if cli.global.quiet {
        ConsoleProgress::quiet()
    } else {
        ConsoleProgress::new(true)
    };
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    match cli.command {
        Command::InitConfig { dir, force } => {
            let dir = dir.unwrap_or(cwd);
            let cfg_path = init_default_config(&dir, force).context("init default config")?;
            eprintln!("Wrote config: {}", cfg_path.display());
            Ok(())
        }
        Command::Blocks { input } => dump_blocks(&input),
        Command::Translate { input, output } => {
            let translator = build_translator(&cli.global, &parent_dir(&input, &cwd), progress)?;
            let stats = translator.translate_file(&input, output.as_deref())?;
            println!("{}", translation_report(&stats));
            Ok(())
        }
        Command::Batch {
            input_dir,
            output_dir,
            pattern,
        } => {
            let translator = build_translator(&cli.global, &input_dir, progress)?;
            let entries =
                translator.batch_translate(&input_dir, output_dir.as_deref(), &pattern)?;
            let ok: Vec<u8> = entries
                .iter()
                .filter(|e| e.is_success())
                .map(|e| e.completeness_score())
                .collect();
            println!("translated {}/{} files", ok.len(), entries.len());
            if !ok.is_empty() {
                let mean = ok.iter().map(|&s| f64::from(s)).sum::<f64>() / ok.len() as f64;
                println!("mean completeness score: {mean:.1}/10");
            }
            Ok(())
        }
        Command::Validate {
            original,
            translated,
        } => {
            let translator =
                build_translator(&cli.global, &parent_dir(&original, &cwd), progress)?;
            let report = translator.validate_translation(&original, &translated)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("serialize validation report")?
            );
            Ok(())
        }
    }
}

/// Directory holding `file`, for the upward config search.
fn parent_dir(file: &Path, cwd: &Path) -> PathBuf {
    match file.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
        _ => cwd.to_path_buf(),
    }
}

fn build_translator(
    global: &GlobalArgs,
    input_dir: &Path,
    progress: ConsoleProgress,
) -> anyhow::Result<DocumentTranslator> {
    let cfg = PipelineConfig::from_overrides(
        input_dir,
        ConfigOverrides {
            config_path: global.config.clone(),
            translator_id: global.translator_id.clone(),
            max_tokens: global.max_tokens,
            threshold: global.threshold,
            no_refine: global.no_refine,
            model: global.model.clone(),
        },
    )
    .context("build config")?;

    let capability: Box<dyn TranslationCapability> = if global.dry_run {
        progress.info("dry run: no model calls");
        Box::new(EchoCapability)
    } else {
        let backend = CommandBackend::from_section(&cfg.model, cfg.model_override.as_deref())?;
        let trace = TraceWriter::new(cfg.trace_dir.clone(), cfg.trace_prompts)?;
        progress.info(format!(
            "model: {} (config: {})",
            backend.name(),
            cfg.config_path.display()
        ));
        Box::new(PromptedModel::new(backend, cfg.prompts.clone()).with_trace(trace))
    };
    Ok(DocumentTranslator::new(cfg, capability, progress))
}

fn dump_blocks(input: &Path) -> anyhow::Result<()> {
    let registry = ProcessorRegistry::with_defaults();
    let ext = input
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default();
    let processor = registry.create(&ext)?;
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("read input: {}", input.display()))?;
    let (_, body) = processor.extract_metadata(&text);
    let blocks = processor.parse(&body);
    println!(
        "{}",
        serde_json::to_string_pretty(&blocks).context("serialize blocks")?
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_search_starts_next_to_the_input() {
        let cwd = Path::new("/work");
        assert_eq!(parent_dir(Path::new("docs/a.md"), cwd), PathBuf::from("docs"));
        assert_eq!(parent_dir(Path::new("a.md"), cwd), PathBuf::from("/work"));
    }
}
