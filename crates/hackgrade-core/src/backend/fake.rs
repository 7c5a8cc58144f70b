use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::ModelBackend;

/// Offline backend: a fixed reply, or a script consumed in call order.
///
/// A scripted `Err` entry simulates a transport failure for that call. Once
/// the script runs out the fixed reply is used, or the call fails if none is set.
#[derive(Debug, Default)]
pub struct FakeBackend {
    fixed_response: Option<String>,
    script: Mutex<VecDeque<Result<String, String>>>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<(String, String)>>,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.fixed_response = Some(response.into());
        self
    }

    pub fn with_script<I>(self, script: I) -> Self
    where
        I: IntoIterator<Item = Result<String, String>>,
    {
        {
            let mut queue = self.script.lock().unwrap_or_else(|e| e.into_inner());
            queue.extend(script);
        }
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// `(model, prompt)` pairs in call order.
    pub fn prompts(&self) -> Vec<(String, String)> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl ModelBackend for FakeBackend {
    async fn complete(
        &self,
        prompt: &str,
        model: &str,
        _temperature: f32,
    ) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((model.to_string(), prompt.to_string()));

        let scripted = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        match scripted {
            Some(Ok(text)) => Ok(text),
            Some(Err(message)) => anyhow::bail!(message),
            None => match &self.fixed_response {
                Some(text) => Ok(text.clone()),
                None => anyhow::bail!("fake backend has no response configured"),
            },
        }
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_then_fixed() {
        let backend = FakeBackend::new()
            .with_response("fixed")
            .with_script([Err("boom".to_string()), Ok("scripted".to_string())]);

        assert!(backend.complete("p", "m", 0.0).await.is_err());
        assert_eq!(backend.complete("p", "m", 0.0).await.unwrap(), "scripted");
        assert_eq!(backend.complete("p2", "m2", 0.0).await.unwrap(), "fixed");
        assert_eq!(backend.calls(), 3);
        assert_eq!(backend.prompts()[2], ("m2".to_string(), "p2".to_string()));
    }

    #[tokio::test]
    async fn test_unconfigured_fails() {
        let err = FakeBackend::new().complete("p", "m", 0.0).await.unwrap_err();
        assert!(err.to_string().contains("no response configured"));
    }
}
