//! Generative model runtime gateway

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::http::{build_client, join_url, send_json};
use super::{ServiceError, ServiceResult, TextGenerator};

/// Body of one completion call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationPrompt {
    pub prompt: String,
    pub max_tokens_to_sample: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub stop_sequences: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: String,
}

/// `POST {base}/model/{model_id}/invoke`
pub struct HttpTextGenerator {
    base_url: String,
    model_id: String,
    http_client: reqwest::Client,
}

impl HttpTextGenerator {
    pub fn new(base_url: impl Into<String>, model_id: impl Into<String>, timeout: Duration) -> ServiceResult<Self> {
        Ok(Self {
            base_url: base_url.into(),
            model_id: model_id.into(),
            http_client: build_client(timeout)?,
        })
    }
}

#[async_trait]
impl TextGenerator for HttpTextGenerator {
    async fn complete(&self, prompt: &GenerationPrompt) -> ServiceResult<String> {
        let url = join_url(&self.base_url, &format!("model/{}/invoke", self.model_id));
        let response: CompletionResponse = send_json(
            self.http_client
                .post(&url)
                .header("Accept", "application/json")
                .json(prompt),
        )
        .await?;

        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ServiceError::Decode("completion response has no choices".to_string()))
    }
}
