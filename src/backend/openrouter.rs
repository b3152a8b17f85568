use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};

use super::{Backend, CompletionRequest, Credits, Message};
use crate::config::Settings;
use crate::consts::DEFAULT_TOTAL_CREDITS;
use crate::error::BackendError;

/// Chat completions over the OpenRouter HTTP API.
pub struct OpenRouterBackend {
    client: reqwest::Client,
    base_url: String,
    has_key: bool,
}

impl OpenRouterBackend {
    /// Build the client. A missing key is allowed here; calls then fail with
    /// [`BackendError::MissingCredential`] and dispatch refuses to start.
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(key) = &settings.api_key {
            let value = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|_| anyhow::anyhow!("API key contains characters not allowed in a header"))?;
            headers.insert(AUTHORIZATION, value);
        }
        if let Ok(v) = HeaderValue::from_str(&settings.referer) {
            headers.insert("HTTP-Referer", v);
        }
        if let Ok(v) = HeaderValue::from_str(&settings.app_title) {
            headers.insert("X-Title", v);
        }

        let client = reqwest::Client::builder()
            .timeout(settings.timings.http_timeout)
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            has_key: settings.api_key.is_some(),
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    fn credits_url(&self) -> String {
        format!("{}/credits", self.base_url)
    }
}

#[async_trait]
impl Backend for OpenRouterBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, BackendError> {
        if !self.has_key {
            return Err(BackendError::MissingCredential);
        }

        let model = request.model.as_str();
        let body = ChatApiRequest {
            model,
            messages: &request.messages,
        };
        tracing::debug!(
            model,
            payload_chars = request.user_content().map(str::len).unwrap_or(0),
            "sending chat completion"
        );

        let resp = self
            .client
            .post(self.chat_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::Transport {
                model: model.to_string(),
                message: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let message = error_detail(&text)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed").to_string());
            tracing::warn!(model, status = status.as_u16(), %message, "upstream rejected call");
            return Err(BackendError::Http {
                model: model.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        let text = resp.text().await.map_err(|e| BackendError::Transport {
            model: model.to_string(),
            message: e.to_string(),
        })?;
        parse_completion(model, &text)
    }

    fn has_credential(&self) -> bool {
        self.has_key
    }

    async fn credits(&self) -> Result<Option<Credits>, BackendError> {
        if !self.has_key {
            return Err(BackendError::MissingCredential);
        }
        let resp = self
            .client
            .get(self.credits_url())
            .send()
            .await
            .map_err(|e| BackendError::Transport {
                model: "credits".to_string(),
                message: e.to_string(),
            })?;

        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(BackendError::Http {
                model: "credits".to_string(),
                status: status.as_u16(),
                message: error_detail(&text).unwrap_or(text),
            });
        }
        parse_credits(&text).map(Some)
    }

    async fn check(&self) -> bool {
        match self.credits().await {
            Ok(_) => {
                tracing::info!("API key test successful");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "API key test failed");
                false
            }
        }
    }
}

/// Pull `choices[0].message.content` out of a completion body.
fn parse_completion(model: &str, body: &str) -> Result<String, BackendError> {
    let decode = |message: String| BackendError::Decode {
        model: model.to_string(),
        message,
    };
    let parsed: ChatApiResponse =
        serde_json::from_str(body).map_err(|e| decode(format!("invalid JSON: {e}")))?;

    // Some providers return 200 with an error object instead of choices.
    if let Some(err) = parsed.error {
        return Err(decode(err.message));
    }

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| decode("response has no message content".to_string()))
}

fn parse_credits(body: &str) -> Result<Credits, BackendError> {
    let parsed: CreditsResponse = serde_json::from_str(body).map_err(|e| BackendError::Decode {
        model: "credits".to_string(),
        message: e.to_string(),
    })?;
    Ok(Credits {
        used: parsed.data.total_usage.unwrap_or(0.0),
        total: parsed
            .data
            .total_credits
            .filter(|t| *t > 0.0)
            .unwrap_or(DEFAULT_TOTAL_CREDITS),
    })
}

/// `error.message` from an upstream error body, if present.
fn error_detail(body: &str) -> Option<String> {
    serde_json::from_str::<ErrorEnvelope>(body)
        .ok()
        .and_then(|e| e.error)
        .map(|e| e.message)
        .filter(|m| !m.is_empty())
}

// --- API types ---

#[derive(Serialize)]
struct ChatApiRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
}

#[derive(Deserialize)]
struct ChatApiResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    error: Option<ApiError>,
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
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct CreditsResponse {
    data: CreditsData,
}

#[derive(Deserialize)]
struct CreditsData {
    total_usage: Option<f64>,
    total_credits: Option<f64>,
}
