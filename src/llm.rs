use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::Config;


#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("CLAUDE_API_KEY not configured. Set it in the environment or add api_key to the config file. Keys are issued at https://console.anthropic.com/")]
    MissingApiKey,
    #[error("{0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("response contained no text content")]
    EmptyResponse,
}


/// Something that turns a prompt into model text.
#[async_trait]
pub trait Completion: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, Error>;
}


#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<Message<'a>>,
}


#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}


#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}


#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: Option<String>,
}

impl MessagesResponse {
    fn into_text(self) -> Result<String, Error> {
        self.content
            .into_iter()
            .next()
            .and_then(|block| block.text)
            .ok_or(Error::EmptyResponse)
    }
}


#[derive(Clone, Debug)]
pub struct AnthropicClient {
    reqwest: reqwest::Client,
    api_url: String,
    api_key: String,
    model: String,
    max_tokens: u32,
    version: String,
}

impl AnthropicClient {
    pub fn new(config: &Config) -> Result<Self, Error> {
        let api_key = config.api_key.clone().ok_or(Error::MissingApiKey)?;
        Ok(Self {
            reqwest: reqwest::Client::new(),
            api_url: config.api_url.clone(),
            api_key,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            version: config.anthropic_version.clone(),
        })
    }
}

#[async_trait]
impl Completion for AnthropicClient {
    async fn complete(&self, prompt: &str) -> Result<String, Error> {
        let request = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: vec![Message { role: "user", content: prompt }],
        };

        tracing::debug!(model = %self.model, "sending completion request");
        let response = self.reqwest
            .post(&self.api_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.version)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let body: MessagesResponse = response.json().await?;
        body.into_text()
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_an_error() {
        let err = AnthropicClient::new(&Config::default()).unwrap_err();
        assert!(matches!(err, Error::MissingApiKey));
        assert!(err.to_string().starts_with("CLAUDE_API_KEY not configured"));
    }

    #[test]
    fn request_body_shape() {
        let request = MessagesRequest {
            model: "claude-3-haiku-20240307",
            max_tokens: 1024,
            messages: vec![Message { role: "user", content: "hello" }],
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "model": "claude-3-haiku-20240307",
                "max_tokens": 1024,
                "messages": [{"role": "user", "content": "hello"}],
            })
        );
    }

    #[test]
    fn first_text_block_is_used() {
        let body: MessagesResponse = serde_json::from_value(serde_json::json!({
            "id": "msg_1",
            "content": [{"type": "text", "text": "{\"tasks\": []}"}, {"type": "text", "text": "x"}],
        }))
        .unwrap();
        assert_eq!(body.into_text().unwrap(), "{\"tasks\": []}");
    }

    #[test]
    fn empty_content_is_an_error() {
        let body: MessagesResponse = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(matches!(body.into_text(), Err(Error::EmptyResponse)));
    }
}
