use std::time::Duration;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::backend::CompletionService;
use crate::config::CompletionConfig;
use crate::error::SqlbotError;

/// Client for an OpenAI-compatible chat completions endpoint.
pub struct OpenAiCompletion {
    base_url: String,
    api_key: SecretString,
    model: String,
    temperature: f32,
    timeout_secs: u64,
    client: Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct ApiError {
    message: Option<String>,
}

impl OpenAiCompletion {
    pub fn new(config: &CompletionConfig) -> Result<Self, SqlbotError> {
        let api_key = config.api_key.as_ref().ok_or_else(|| SqlbotError::Config {
            message: "no API key specified — use --api-key or set OPENAI_API_KEY".to_string(),
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SqlbotError::Completion {
                message: format!("cannot build HTTP client: {}", e),
            })?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: SecretString::from(api_key.expose_secret().to_string()),
            model: config.model.clone(),
            temperature: config.temperature,
            timeout_secs: config.timeout_secs,
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.api_key.expose_secret())
    }

    fn map_transport_error(&self, e: reqwest::Error) -> SqlbotError {
        if e.is_timeout() {
            SqlbotError::Timeout {
                seconds: self.timeout_secs,
            }
        } else {
            SqlbotError::Completion {
                message: format!("request to {} failed: {}", self.base_url, e),
            }
        }
    }
}

/// Map a non-success HTTP status (and its body, when it carries an API
/// error message) to an error.
pub fn map_http_error(status: u16, body: &str) -> SqlbotError {
    let detail = serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|env| env.error)
        .and_then(|err| err.message);

    match status {
        401 => SqlbotError::Auth {
            message: "invalid or expired API key".to_string(),
        },
        403 => SqlbotError::Auth {
            message: "API key lacks access to the requested model".to_string(),
        },
        429 => SqlbotError::Completion {
            message: "rate limited by the completion service".to_string(),
        },
        _ => SqlbotError::Completion {
            message: match detail {
                Some(detail) => format!("HTTP error {}: {}", status, detail),
                None => format!("HTTP error: {}", status),
            },
        },
    }
}

/// Extract the reply text from a chat completions response body.
pub fn parse_completion(body: &str) -> Result<String, SqlbotError> {
    let response: ChatResponse =
        serde_json::from_str(body).map_err(|e| SqlbotError::Completion {
            message: format!("failed to parse completion response: {}", e),
        })?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| SqlbotError::Completion {
            message: "completion response contained no text".to_string(),
        })
}

impl CompletionService for OpenAiCompletion {
    async fn complete(&self, prompt: &str) -> Result<String, SqlbotError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
        };

        let resp = self
            .client
            .post(self.endpoint())
            .header("Authorization", self.auth_header())
            .json(&request)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status_code = resp.status();
        let body = resp.text().await.map_err(|e| self.map_transport_error(e))?;

        if !status_code.is_success() {
            return Err(map_http_error(status_code.as_u16(), &body));
        }

        parse_completion(&body)
    }
}
