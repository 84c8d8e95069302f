#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use lt_translator::capability::{Comparison, SummaryRole, TranslationCapability};
use lt_translator::error::{CapabilityError, CapabilityResult};
use lt_translator::pipeline::{DocumentTranslator, PipelineConfig};
use lt_translator::progress::ConsoleProgress;

type CompleteFn = Box<dyn Fn(&str) -> CapabilityResult<String>>;

#[derive(Default)]
pub struct Calls {
    pub translated: Vec<String>,
    pub completions: Vec<String>,
}

/// Deterministic capability: translates line by line from a dictionary, hands out queued
/// verdicts (then perfect scores), and answers free-form prompts through a closure.
pub struct LineMap {
    entries: HashMap<String, String>,
    verdicts: RefCell<VecDeque<Comparison>>,
    complete: CompleteFn,
    pub calls: Rc<RefCell<Calls>>,
}

impl LineMap {
    pub fn new(pairs: &[(&str, &str)]) -> Self {
        Self {
            entries: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            verdicts: RefCell::new(VecDeque::new()),
            complete: Box::new(|_| Ok(String::new())),
            calls: Rc::new(RefCell::new(Calls::default())),
        }
    }

    pub fn with_verdict(self, score: u8, missing: &str) -> Self {
        self.verdicts.borrow_mut().push_back(Comparison {
            completeness_score: score,
            missing_content: missing.to_string(),
            suggestions: "补全遗漏".to_string(),
            raw_result: String::new(),
        });
        self
    }

    pub fn with_complete(
        mut self,
        f: impl Fn(&str) -> CapabilityResult<String> + 'static,
    ) -> Self {
        self.complete = Box::new(f);
        self
    }
}

impl TranslationCapability for LineMap {
    fn translate(&self, text: &str) -> CapabilityResult<String> {
        self.calls.borrow_mut().translated.push(text.to_string());
        Ok(text
            .split('\n')
            .map(|line| {
                self.entries
                    .get(line.trim())
                    .cloned()
                    .unwrap_or_else(|| line.to_string())
            })
            .collect::<Vec<_>>()
            .join("\n"))
    }

    fn summarize(&self, text: &str, role: SummaryRole) -> CapabilityResult<String> {
        Ok(format!("{} summary: {} lines", role.as_str(), text.lines().count()))
    }

    fn compare(&self, _original: &str, _translated: &str) -> CapabilityResult<Comparison> {
        Ok(self.verdicts.borrow_mut().pop_front().unwrap_or(Comparison {
            completeness_score: 10,
            missing_content: "无".to_string(),
            suggestions: "无".to_string(),
            raw_result: String::new(),
        }))
    }

    fn complete(&self, prompt: &str) -> CapabilityResult<String> {
        self.calls.borrow_mut().completions.push(prompt.to_string());
        (self.complete)(prompt)
    }
}

/// Every call fails.
pub struct Offline;

impl TranslationCapability for Offline {
    fn translate(&self, _text: &str) -> CapabilityResult<String> {
        Err(CapabilityError::Unavailable("offline".into()))
    }

    fn summarize(&self, _text: &str, _role: SummaryRole) -> CapabilityResult<String> {
        Err(CapabilityError::Unavailable("offline".into()))
    }

    fn compare(&self, _a: &str, _b: &str) -> CapabilityResult<Comparison> {
        Err(CapabilityError::Unavailable("offline".into()))
    }

    fn complete(&self, _prompt: &str) -> CapabilityResult<String> {
        Err(CapabilityError::Unavailable("offline".into()))
    }
}

pub fn translator(capability: impl TranslationCapability + 'static) -> DocumentTranslator {
    DocumentTranslator::new(
        PipelineConfig::default(),
        Box::new(capability),
        ConsoleProgress::quiet(),
    )
}

pub fn translator_with(
    cfg: PipelineConfig,
    capability: impl TranslationCapability + 'static,
) -> DocumentTranslator {
    DocumentTranslator::new(cfg, Box::new(capability), ConsoleProgress::quiet())
}
