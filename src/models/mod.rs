pub mod command;
pub mod prompted;

pub use command::CommandBackend;
pub use prompted::PromptedModel;

/// One request/response exchange with a chat model.
pub trait ChatBackend {
    fn name(&self) -> &str;

    fn chat(&self, system_prompt: Option<&str>, user_prompt: &str) -> anyhow::Result<String>;
}
