//! Language-model abstraction.
//!
//! The [`LanguageModel`] trait decouples the stages from the actual backend
//! (currently Ollama's `/api/generate`). Tests use scripted models that return
//! predetermined text without touching the network.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::io::config::ModelConfig;

/// Synchronous text generation. May be slow; may fail.
pub trait LanguageModel {
    fn generate(&self, prompt: &str) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f64,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
    #[serde(default)]
    error: Option<String>,
}

/// Blocking client for a local Ollama server.
pub struct OllamaModel {
    client: Client,
    endpoint: String,
    name: String,
    temperature: f64,
}

impl OllamaModel {
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("build model http client")?;
        Ok(Self {
            client,
            endpoint: format!("{}/api/generate", config.base_url.trim_end_matches('/')),
            name: config.name.clone(),
            temperature: config.temperature,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl LanguageModel for OllamaModel {
    #[instrument(skip_all, fields(model = %self.name, prompt_chars = prompt.len()))]
    fn generate(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            model: &self.name,
            prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.temperature,
            },
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .with_context(|| format!("POST {}", self.endpoint))?;
        let status = response.status();
        let body = response.text().context("read model response body")?;
        if !status.is_success() {
            return Err(anyhow!(
                "model endpoint returned {status}: {}",
                truncate_for_error(&body)
            ));
        }
        let text = parse_generate_response(&body)?;
        debug!(output_chars = text.len(), "model responded");
        Ok(text)
    }
}

/// Extract the generated text from a non-streaming `/api/generate` body.
pub fn parse_generate_response(body: &str) -> Result<String> {
    let parsed: GenerateResponse =
        serde_json::from_str(body).context("parse model response json")?;
    if let Some(error) = parsed.error {
        return Err(anyhow!("model error: {error}"));
    }
    Ok(parsed.response.trim().to_string())
}

fn truncate_for_error(body: &str) -> String {
    const LIMIT: usize = 200;
    match body.char_indices().nth(LIMIT) {
        Some((idx, _)) => format!("{}…", &body[..idx]),
        None => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_response_text() {
        let body = r#"{"model":"llama3.1","response":"  Plan:\n- search\n","done":true}"#;
        assert_eq!(
            parse_generate_response(body).expect("parse"),
            "Plan:\n- search"
        );
    }

    #[test]
    fn surfaces_model_errors() {
        let body = r#"{"error":"model 'nope' not found"}"#;
        let err = parse_generate_response(body).expect_err("should fail");
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn rejects_non_json() {
        assert!(parse_generate_response("<html>").is_err());
    }

    #[test]
    fn endpoint_tolerates_trailing_slash() {
        let model = OllamaModel::new(&ModelConfig {
            base_url: "http://localhost:11434/".to_string(),
            ..ModelConfig::default()
        })
        .expect("client");
        assert_eq!(model.endpoint(), "http://localhost:11434/api/generate");
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let body = "x".repeat(500);
        let short = truncate_for_error(&body);
        assert_eq!(short.chars().count(), 201);
    }
}
