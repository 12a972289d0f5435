use super::{ChatMessage, ChatTransport, FragmentStream, sse};
use crate::config::EndpointConfig;
use crate::core::error::LainError;
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

const MAX_ERROR_BODY: usize = 512;

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    stream: bool,
}

/// Streams chat completions from any endpoint speaking the OpenAI
/// `chat/completions` protocol (LM Studio, llama.cpp server, Ollama, ...).
#[derive(Clone)]
pub struct OpenAICompatibleTransport {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl OpenAICompatibleTransport {
    pub fn new(config: &EndpointConfig) -> Result<Self, LainError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .read_timeout(Duration::from_secs(config.read_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone().filter(|key| !key.is_empty()),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ChatTransport for OpenAICompatibleTransport {
    async fn send(&self, messages: &[ChatMessage]) -> Result<FragmentStream, LainError> {
        let payload = ChatCompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: true,
        };

        tracing::info!(
            "Sending {} messages to {} (model {})",
            messages.len(),
            self.endpoint,
            self.model
        );

        let mut request = self
            .client
            .post(&self.endpoint)
            .header("Accept", "text/event-stream")
            .json(&payload);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|i| body.is_char_boundary(*i))
                    .unwrap_or(0);
                body.truncate(cut);
            }
            tracing::debug!("Chat endpoint returned {}: {}", status, body);
            return Err(LainError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(sse::fragment_stream(response.bytes_stream()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_base_url() {
        let config = EndpointConfig {
            base_url: "http://localhost:1234/v1/".to_string(),
            ..EndpointConfig::default()
        };

        let transport = OpenAICompatibleTransport::new(&config).unwrap();

        assert_eq!(transport.endpoint(), "http://localhost:1234/v1/chat/completions");
    }

    #[test]
    fn test_request_payload_shape() {
        let messages = vec![ChatMessage::system("be brief"), ChatMessage::user("hi")];
        let payload = ChatCompletionRequest {
            model: "assistant",
            messages: &messages,
            temperature: 0.5,
            max_tokens: Some(64),
            stream: true,
        };

        let json = serde_json::to_value(&payload).unwrap();

        assert_eq!(
            json,
            serde_json::json!({
                "model": "assistant",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "hi"}
                ],
                "temperature": 0.5,
                "max_tokens": 64,
                "stream": true
            })
        );
    }
}
