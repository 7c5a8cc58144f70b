use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde_json::json;
use tracing::debug;

use super::ModelBackend;
use crate::config::GraderConfig;
use crate::error::{GradeError, GradeResult};

const USER_AGENT_VALUE: &str = concat!("hackgrade/", env!("CARGO_PKG_VERSION"));

/// Chat-completions backend for OpenAI and API-compatible servers.
#[derive(Debug, Clone)]
pub struct OpenAiBackend {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl OpenAiBackend {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> GradeResult<Self> {
        if api_key.trim().is_empty() {
            return Err(GradeError::Config {
                message: "OPENAI_API_KEY is not set; set it or grade without the LLM".to_string(),
            });
        }

        let mut default_headers = HeaderMap::new();
        default_headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(default_headers)
            .build()
            .map_err(|e| GradeError::Config {
                message: format!("failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn from_config(config: &GraderConfig) -> GradeResult<Self> {
        Self::new(
            &config.api_base,
            config.api_key.as_deref().unwrap_or_default(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl ModelBackend for OpenAiBackend {
    async fn complete(
        &self,
        prompt: &str,
        model: &str,
        temperature: f32,
    ) -> anyhow::Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": temperature,
        });
        debug!(url = %url, model = model, "sending chat completion");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            anyhow::bail!(
                "chat API error (status {}): {}",
                status.as_u16(),
                error_text
            );
        }

        let json: serde_json::Value = resp.json().await?;
        let text = json
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("chat API response missing content"))?
            .to_string();

        Ok(text)
    }

    fn provider_name(&self) -> &'static str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_is_config_error() {
        let err = OpenAiBackend::new("https://api.openai.com/v1", "", Duration::from_secs(5))
            .unwrap_err();
        assert!(matches!(err, GradeError::Config { .. }));
    }

    #[test]
    fn test_base_url_normalized() {
        let backend =
            OpenAiBackend::new("http://localhost:8080/v1/", "k", Duration::from_secs(5)).unwrap();
        assert_eq!(backend.base_url(), "http://localhost:8080/v1");
    }
}
