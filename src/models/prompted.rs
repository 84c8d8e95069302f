use std::cell::Cell;

use super::ChatBackend;
use crate::capability::{cleanup_model_text, Comparison, SummaryRole, TranslationCapability};
use crate::error::{CapabilityError, CapabilityResult};
use crate::pipeline::prompts::{render_template, PromptSet};
use crate::pipeline::trace::TraceWriter;

/// Implements the translation capability by rendering a prompt template per operation and
/// sending it to a chat backend.
pub struct PromptedModel<B: ChatBackend> {
    backend: B,
    prompts: PromptSet,
    trace: TraceWriter,
    calls: Cell<usize>,
}

impl<B: ChatBackend> PromptedModel<B> {
    pub fn new(backend: B, prompts: PromptSet) -> Self {
        Self {
            backend,
            prompts,
            trace: TraceWriter::disabled(),
            calls: Cell::new(0),
        }
    }

    #[must_use]
    pub fn with_trace(mut self, trace: TraceWriter) -> Self {
        self.trace = trace;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Calls made so far, successful or not.
    pub fn calls(&self) -> usize {
        self.calls.get()
    }

    fn call(&self, stage: &'static str, prompt: &str) -> CapabilityResult<String> {
        let index = self.calls.get() + 1;
        self.calls.set(index);
        // Trace failures never fail the call.
        let _ = self.trace.write_stage_text(stage, index, "prompt", prompt);

        let raw = self
            .backend
            .chat(Some(&self.prompts.system), prompt)
            .map_err(|e| CapabilityError::Backend(format!("{}: {e:#}", self.backend.name())))?;
        let _ = self.trace.write_stage_text(stage, index, "output", &raw);

        let text = cleanup_model_text(&raw);
        if text.is_empty() {
            return Err(CapabilityError::EmptyResponse(stage));
        }
        Ok(text)
    }
}

impl<B: ChatBackend> TranslationCapability for PromptedModel<B> {
    fn translate(&self, text: &str) -> CapabilityResult<String> {
        let prompt = render_template(&self.prompts.translate, &[("text", text)]);
        self.call("translate", &prompt)
    }

    fn summarize(&self, text: &str, role: SummaryRole) -> CapabilityResult<String> {
        let template = match role {
            SummaryRole::Original => &self.prompts.summarize_original,
            SummaryRole::Translated => &self.prompts.summarize_translated,
        };
        let prompt = render_template(template, &[("text", text)]);
        self.call("summarize", &prompt)
    }

    fn compare(
        &self,
        original_summary: &str,
        translated_summary: &str,
    ) -> CapabilityResult<Comparison> {
        let prompt = render_template(
            &self.prompts.compare,
            &[
                ("original_summary", original_summary),
                ("translated_summary", translated_summary),
            ],
        );
        let raw = self.call("compare", &prompt)?;
        Ok(Comparison::parse(&raw))
    }

    fn complete(&self, prompt: &str) -> CapabilityResult<String> {
        self.call("complete", prompt)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;

    struct Scripted {
        replies: RefCell<Vec<anyhow::Result<String>>>,
        seen: RefCell<Vec<String>>,
    }

    impl Scripted {
        fn new(replies: Vec<anyhow::Result<String>>) -> Self {
            Self {
                replies: RefCell::new(replies),
                seen: RefCell::new(Vec::new()),
            }
        }
    }

    impl ChatBackend for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn chat(&self, _system: Option<&str>, prompt: &str) -> anyhow::Result<String> {
            self.seen.borrow_mut().push(prompt.to_string());
            self.replies.borrow_mut().remove(0)
        }
    }

    #[test]
    fn translate_renders_template_and_cleans_output() {
        let prompts = PromptSet {
            translate: "T<{{text}}>".to_string(),
            ..PromptSet::default()
        };
        let model = PromptedModel::new(Scripted::new(vec![Ok("```\n你好\n```".into())]), prompts);
        assert_eq!(model.translate("hello").expect("translate"), "你好");
        assert_eq!(model.backend().seen.borrow()[0], "T<hello>");
        assert_eq!(model.calls(), 1);
    }

    #[test]
    fn compare_parses_verdict() {
        let model = PromptedModel::new(
            Scripted::new(vec![Ok("- 完整性评分：9\n- 遗漏内容：无\n- 建议：无".into())]),
            PromptSet::default(),
        );
        let cmp = model.compare("a", "b").expect("compare");
        assert_eq!(cmp.completeness_score, 9);
        assert!(!cmp.has_missing());
    }

    #[test]
    fn backend_errors_become_capability_errors() {
        let model = PromptedModel::new(
            Scripted::new(vec![Err(anyhow::anyhow!("boom")), Ok("  ".into())]),
            PromptSet::default(),
        );
        let err = model.translate("x").unwrap_err();
        assert!(matches!(err, CapabilityError::Backend(ref m) if m.contains("boom")));
        assert!(matches!(
            model.summarize("x", SummaryRole::Original),
            Err(CapabilityError::EmptyResponse("summarize"))
        ));
    }
}
