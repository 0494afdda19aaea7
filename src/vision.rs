//! Visual descriptions from a hosted vision-language API.

use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};

use crate::config::VisionConfig;

#[derive(Debug, thiserror::Error)]
pub enum VisionError {
    #[error("vision request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("vision api returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("vision api response had no text content")]
    EmptyResponse,
}

/// Describes a PNG encoded screenshot.
pub trait VisionDescriber: Send + Sync {
    fn describe(&self, png: &[u8]) -> Result<String, VisionError>;

    fn name(&self) -> &'static str;
}

pub struct AnthropicVision {
    api_key: String,
    config: VisionConfig,
    client: reqwest::blocking::Client,
}

impl AnthropicVision {
    pub fn new(api_key: String, config: VisionConfig) -> Result<Self, VisionError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            api_key,
            config,
            client,
        })
    }
}

/// Vision backend for `api_key`. `None` without a key or when the HTTP
/// client cannot be built.
pub fn describer_for_key(
    config: &VisionConfig,
    api_key: Option<String>,
) -> Option<Box<dyn VisionDescriber>> {
    let api_key = api_key?;
    match AnthropicVision::new(api_key, config.clone()) {
        Ok(vision) => Some(Box::new(vision)),
        Err(err) => {
            log::warn!("vision disabled, client setup failed: {err}");
            None
        }
    }
}

/// Messages API request carrying the prompt and one base64 PNG.
pub fn build_request_body(config: &VisionConfig, png: &[u8]) -> Value {
    json!({
        "model": config.model,
        "max_tokens": config.max_tokens,
        "messages": [
            {
                "role": "user",
                "content": [
                    {
                        "type": "text",
                        "text": config.prompt,
                    },
                    {
                        "type": "image",
                        "source": {
                            "type": "base64",
                            "media_type": "image/png",
                            "data": STANDARD.encode(png),
                        }
                    }
                ]
            }
        ]
    })
}

/// First non-empty `text` block of a messages API response.
pub fn extract_description(resp: &Value) -> Option<String> {
    resp.get("content")?
        .as_array()?
        .iter()
        .filter(|block| block.get("type").and_then(|t| t.as_str()) == Some("text"))
        .filter_map(|block| block.get("text").and_then(|t| t.as_str()))
        .map(|text| text.trim())
        .find(|text| !text.is_empty())
        .map(str::to_owned)
}

fn extract_error_message(resp: &Value) -> Option<String> {
    resp.get("error")
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .map(str::to_owned)
}

impl VisionDescriber for AnthropicVision {
    fn describe(&self, png: &[u8]) -> Result<String, VisionError> {
        let body = build_request_body(&self.config, png);

        let resp = self
            .client
            .post(&self.config.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", &self.config.api_version)
            .json(&body)
            .send()?;

        let status = resp.status();
        let payload = resp.json::<Value>()?;

        if !status.is_success() {
            let message = extract_error_message(&payload).unwrap_or_else(|| payload.to_string());
            log::warn!("vision api error: status={status} message={message}");
            return Err(VisionError::Api {
                status: status.as_u16(),
                message,
            });
        }

        extract_description(&payload).ok_or(VisionError::EmptyResponse)
    }

    fn name(&self) -> &'static str {
        "anthropic"
    }
}
