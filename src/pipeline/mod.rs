mod blockwise;
mod config;
mod flatten;
pub mod prompts;
pub mod refine;
pub mod stats;
pub mod trace;
mod translator;

use crate::capability::TranslationCapability;
use crate::chunker::Chunker;
use crate::progress::ConsoleProgress;

pub use config::{init_default_config, ConfigOverrides, PipelineConfig};
pub use flatten::{merge_chunks, translate_code_comments};
pub use prompts::PromptSet;
pub use refine::RefineSettings;
pub use stats::{RefineMode, TranslationStats};
pub use trace::TraceWriter;
pub use translator::{
    append_signature, default_output_path, translation_report, BatchEntry, DocumentTranslator,
    ValidationReport, ALL_SUPPORTED_PATTERN, BATCH_REPORT_FILENAME, SIGNATURE,
};

pub(crate) struct TrackContext<'a> {
    pub capability: &'a dyn TranslationCapability,
    pub chunker: &'a Chunker,
    pub prompts: &'a PromptSet,
    pub refine: &'a RefineSettings,
    pub progress: &'a ConsoleProgress,
}
