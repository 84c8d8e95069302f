use std::io::Write;
use std::process::{Command, Stdio};

use anyhow::{anyhow, Context};

use super::ChatBackend;
use crate::config::ModelSection;

/// Runs an external program per prompt: the prompt goes to stdin, the answer is read from stdout.
#[derive(Clone, Debug)]
pub struct CommandBackend {
    name: String,
    program: String,
    args: Vec<String>,
}

impl CommandBackend {
    pub fn new(program: impl Into<String>, args: Vec<String>, model: Option<&str>) -> Self {
        let model = model.unwrap_or("").to_string();
        let args = args
            .into_iter()
            .map(|a| a.replace("{model}", &model))
            .collect();
        let program = program.into();
        let name = if model.is_empty() {
            program.clone()
        } else {
            model
        };
        Self {
            name,
            program,
            args,
        }
    }

    pub fn from_section(section: &ModelSection, model_override: Option<&str>) -> anyhow::Result<Self> {
        let program = section
            .command
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| {
                anyhow!("no model command configured (set [model].command or use --dry-run)")
            })?;
        let model = model_override.or(section.name.as_deref());
        Ok(Self::new(program, section.args.clone(), model))
    }
}

impl ChatBackend for CommandBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn chat(&self, system_prompt: Option<&str>, user_prompt: &str) -> anyhow::Result<String> {
        let mut input = String::new();
        if let Some(s) = system_prompt.filter(|s| !s.trim().is_empty()) {
            input.push_str(s.trim());
            input.push_str("\n\n");
        }
        input.push_str(user_prompt);

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawn model command: {}", self.program))?;
        {
            let mut stdin = child.stdin.take().context("open model stdin")?;
            // Commands that ignore stdin may exit before the prompt is written.
            match stdin.write_all(input.as_bytes()) {
                Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
                other => other.context("write prompt to model stdin")?,
            }
        }
        let output = child.wait_with_output().context("wait for model command")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!(
                "model command exited with {}: {}",
                output.status,
                stderr.trim()
            ));
        }
        let text = String::from_utf8(output.stdout).context("model output is not UTF-8")?;
        if text.trim().is_empty() {
            return Err(anyhow!("model command produced no output"));
        }
        Ok(text)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn pipes_prompt_through_command() {
        let backend = CommandBackend::new("cat", Vec::new(), None);
        let out = backend.chat(Some("sys"), "hello").expect("chat");
        assert_eq!(out, "sys\n\nhello");
        assert_eq!(backend.name(), "cat");
    }

    #[test]
    fn substitutes_model_name_in_args() {
        let backend = CommandBackend::new("echo", vec!["-n".into(), "{model}".into()], Some("qwen"));
        assert_eq!(backend.chat(None, "ignored").expect("chat"), "qwen");
        assert_eq!(backend.name(), "qwen");
    }

    #[test]
    fn failing_command_is_an_error() {
        let backend = CommandBackend::new("false", Vec::new(), None);
        assert!(backend.chat(None, "x").is_err());
    }

    #[test]
    fn missing_command_is_reported() {
        let err = CommandBackend::from_section(&ModelSection::default(), None).unwrap_err();
        assert!(err.to_string().contains("no model command configured"));
    }
}
