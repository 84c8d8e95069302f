pub mod capability;
pub mod chunker;
pub mod config;
pub mod document;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod progress;
pub mod textutil;

pub use capability::{Comparison, EchoCapability, SummaryRole, TranslationCapability};
pub use document::{DocumentBlock, DocumentFormat, FormatProcessor, ProcessorRegistry};
pub use error::{CapabilityError, LtError};
pub use pipeline::{DocumentTranslator, PipelineConfig, TranslationStats};
