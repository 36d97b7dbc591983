//! Synthesis over an OpenAI-compatible chat completions endpoint.

use crate::collaborators::{RetrievedDocument, SynthesisProvider};
use crate::config_loader::CollaboratorConfig;
use crate::errors::{SafeTravelsError, SafeTravelsResult};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

const SYSTEM_PROMPT: &str = "You are a cargo security analyst writing for truck drivers. \
    Be concise and practical. Cite only the sources you are given. \
    Never invent statistics.";

pub struct ChatCompletionSynthesizer {
    http: Client,
    url: String,
    model: String,
    api_key: String,
    max_tokens: u32,
}

impl ChatCompletionSynthesizer {
    /// Returns `None` when no API key is configured.
    pub fn from_config(config: &CollaboratorConfig) -> SafeTravelsResult<Option<Self>> {
        let Some(api_key) = config.llm_api_key.clone().filter(|k| !k.trim().is_empty()) else {
            return Ok(None);
        };
        let http = Client::builder()
            .timeout(std::time::Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|e| SafeTravelsError::network("build_http_client", e))?;
        Ok(Some(Self {
            http,
            url: config.llm_url.clone(),
            model: config.llm_model.clone(),
            api_key,
            max_tokens: config.llm_max_tokens,
        }))
    }

    fn context_block(documents: &[RetrievedDocument]) -> String {
        documents
            .iter()
            .enumerate()
            .map(|(i, d)| format!("[{}] {} (source: {})", i + 1, d.text, d.source_label))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl SynthesisProvider for ChatCompletionSynthesizer {
    async fn synthesize(&self, prompt: &str, documents: &[RetrievedDocument]) -> SafeTravelsResult<String> {
        let user = if documents.is_empty() {
            prompt.to_string()
        } else {
            format!("{prompt}\n\nReference material:\n{}", Self::context_block(documents))
        };
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": user}
            ],
            "max_tokens": self.max_tokens
        });

        debug!("synthesis request to {} ({} documents)", self.url, documents.len());
        let resp = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SafeTravelsError::network("synthesis_request", e))?;

        if !resp.status().is_success() {
            return Err(SafeTravelsError::synthesis_degraded(format!(
                "backend returned {}",
                resp.status()
            )));
        }
        let json: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| SafeTravelsError::network("synthesis_response", e))?;
        let answer = json["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .trim()
            .to_string();
        if answer.is_empty() {
            return Err(SafeTravelsError::synthesis_degraded("empty completion"));
        }
        Ok(answer)
    }
}
