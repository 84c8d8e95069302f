use std::collections::BTreeMap;

use super::{MarkdownProcessor, Processor, RstProcessor};
use crate::error::LtError;

pub type ProcessorCtor = fn() -> Processor;

/// Extension lookup table. Keys are stored lower-case with a leading dot.
#[derive(Clone)]
pub struct ProcessorRegistry {
    ctors: BTreeMap<String, ProcessorCtor>,
}

/// Lower-case with a leading dot: `MD` and `.md` both become `.md`.
pub fn normalize_extension(ext: &str) -> String {
    let ext = ext.trim().to_ascii_lowercase();
    if ext.starts_with('.') {
        ext
    } else {
        format!(".{ext}")
    }
}

impl ProcessorRegistry {
    pub fn empty() -> Self {
        Self {
            ctors: BTreeMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut reg = Self::empty();
        reg.register(&[".md", ".markdown"], || {
            Processor::Markdown(MarkdownProcessor::new())
        });
        reg.register(&[".rst", ".rest"], || Processor::Rst(RstProcessor::new()));
        reg
    }

    pub fn register(&mut self, extensions: &[&str], ctor: ProcessorCtor) {
        for ext in extensions {
            self.ctors.insert(normalize_extension(ext), ctor);
        }
    }

    pub fn create(&self, extension: &str) -> Result<Processor, LtError> {
        let key = normalize_extension(extension);
        match self.ctors.get(&key) {
            Some(ctor) => Ok(ctor()),
            None => Err(LtError::UnsupportedFormat {
                extension: extension.to_string(),
                supported: self.list_supported(),
            }),
        }
    }

    #[must_use]
    pub fn is_supported(&self, extension: &str) -> bool {
        self.ctors.contains_key(&normalize_extension(extension))
    }

    #[must_use]
    pub fn list_supported(&self) -> Vec<String> {
        self.ctors.keys().cloned().collect()
    }
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentFormat, FormatProcessor};

    #[test]
    fn lookup_is_case_and_dot_insensitive() {
        let reg = ProcessorRegistry::with_defaults();
        assert!(reg.is_supported("MD"));
        assert!(reg.is_supported(".Rest"));
        assert!(!reg.is_supported(".txt"));
        let p = reg.create("markdown").expect("markdown processor");
        assert_eq!(p.format(), DocumentFormat::Markdown);
        assert_eq!(reg.create(".RST").expect("rst").format(), DocumentFormat::Rst);
    }

    #[test]
    fn unknown_extension_lists_supported() {
        let reg = ProcessorRegistry::with_defaults();
        let err = reg.create(".txt").expect_err("unsupported");
        match err {
            LtError::UnsupportedFormat {
                extension,
                supported,
            } => {
                assert_eq!(extension, ".txt");
                assert_eq!(supported, vec![".markdown", ".md", ".rest", ".rst"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn register_adds_format() {
        let mut reg = ProcessorRegistry::empty();
        assert!(reg.list_supported().is_empty());
        reg.register(&["txt"], || Processor::Markdown(MarkdownProcessor::new()));
        assert!(reg.is_supported(".TXT"));
    }
}
