use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use swarm_core::{config::InferenceConfig, traits::InferenceBackend, SwarmError, SwarmResult};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Ollama-compatible text generation over HTTP.
pub struct OllamaBackend {
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    timeout: Duration,
    http_client: reqwest::Client,
}

impl OllamaBackend {
    pub fn new(config: &InferenceConfig) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            timeout: Duration::from_secs(config.timeout_seconds),
            http_client: reqwest::Client::new(),
        }
    }

    /// Probe the model server; failures are reported but do not stop the worker.
    pub async fn check_connection(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self
            .http_client
            .get(&url)
            .timeout(Duration::from_secs(10))
            .send()
            .await
        {
            Ok(response) if response.status().is_success() => {
                info!("Inference backend reachable at {}", self.base_url);
                true
            }
            Ok(response) => {
                warn!("Inference backend returned HTTP {}", response.status());
                false
            }
            Err(e) => {
                warn!("Inference backend unreachable at {}: {}", self.base_url, e);
                false
            }
        }
    }
}

#[async_trait]
impl InferenceBackend for OllamaBackend {
    async fn generate(&self, prompt: &str) -> SwarmResult<String> {
        let request = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
                num_predict: self.max_tokens,
            },
        };

        let url = format!("{}/api/generate", self.base_url);
        let response = self
            .http_client
            .post(&url)
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| SwarmError::Inference(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SwarmError::Inference(format!("HTTP {status}: {body}")));
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| SwarmError::Inference(format!("invalid response: {e}")))?;
        debug!("Generated {} characters with {}", body.response.len(), self.model);
        Ok(body.response.trim().to_string())
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shape() {
        let request = GenerateRequest {
            model: "llama3.1:8b",
            prompt: "Card: Shock",
            stream: false,
            options: GenerateOptions {
                temperature: 0.5,
                num_predict: 256,
            },
        };
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(value["model"], "llama3.1:8b");
        assert_eq!(value["stream"], false);
        assert_eq!(value["options"]["num_predict"], 256);
        assert_eq!(value["options"]["temperature"], 0.5);
    }

    #[test]
    fn test_backend_uses_config() {
        let backend = OllamaBackend::new(&InferenceConfig {
            base_url: "http://gpu-box:11434/".into(),
            model: "qwen2.5:14b".into(),
            ..Default::default()
        });
        assert_eq!(backend.model_name(), "qwen2.5:14b");
        assert_eq!(backend.base_url, "http://gpu-box:11434");
    }
}
