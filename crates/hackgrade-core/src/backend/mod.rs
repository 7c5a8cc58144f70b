//! Model backends: anything that turns a prompt into a raw text completion.

use async_trait::async_trait;

pub mod fake;
pub mod openai;

pub use fake::FakeBackend;
pub use openai::OpenAiBackend;

/// Completion endpoint of a language model.
///
/// Failures are not classified; callers retry all of them uniformly.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn complete(&self, prompt: &str, model: &str, temperature: f32)
        -> anyhow::Result<String>;

    fn provider_name(&self) -> &'static str;
}
