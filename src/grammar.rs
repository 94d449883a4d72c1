//! Relay to an external grammar checker (LanguageTool `v2/check` by default).
//!
//! The upstream answer is passed through untouched inside a
//! `{success, data}` envelope.

use rocket::http::Status;
use rocket::serde::json::{self, Json};
use rocket::{post, State};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use std::time::Duration;

use crate::config::AppConfig;

const USER_AGENT: &str = concat!("rpractice/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum GrammarError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("API error {0}: {1}")]
    ApiError(u16, String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

#[derive(Deserialize, Debug)]
pub struct GrammarCheckRequest {
    pub text: Option<String>,
    pub language: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct GrammarCheckResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl GrammarCheckResponse {
    fn failure(message: &str) -> GrammarCheckResponse {
        GrammarCheckResponse {
            success: false,
            data: None,
            message: Some(message.to_string()),
        }
    }
}

pub struct GrammarClient {
    http_client: reqwest::Client,
    endpoint: String,
    default_language: String,
}

impl GrammarClient {
    pub fn new(endpoint: &str, default_language: &str) -> Result<GrammarClient, GrammarError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| GrammarError::NetworkError(e.to_string()))?;

        Ok(GrammarClient {
            http_client,
            endpoint: endpoint.to_string(),
            default_language: default_language.to_string(),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<GrammarClient, GrammarError> {
        GrammarClient::new(&config.grammar_url, &config.grammar_language)
    }

    pub fn default_language(&self) -> &str {
        &self.default_language
    }

    pub async fn check(&self, text: &str, language: &str) -> Result<Value, GrammarError> {
        tracing::debug!("Grammar check: {} chars, language {}", text.len(), language);

        let response = self
            .http_client
            .post(&self.endpoint)
            .form(&[("text", text), ("language", language)])
            .send()
            .await
            .map_err(|e| GrammarError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GrammarError::ApiError(status.as_u16(), body));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| GrammarError::ParseError(e.to_string()))
    }
}

#[post("/grammar-check", format = "json", data = "<request>")]
pub async fn grammar_check(
    request: Result<Json<GrammarCheckRequest>, json::Error<'_>>,
    client: &State<GrammarClient>,
) -> (Status, Json<GrammarCheckResponse>) {
    let request = match request {
        Ok(request) => request.into_inner(),
        Err(e) => {
            tracing::debug!("Undecodable grammar check request: {:?}", e);
            return (
                Status::BadRequest,
                Json(GrammarCheckResponse::failure("Text is required")),
            );
        }
    };

    let text = match request.text {
        Some(text) if !text.trim().is_empty() => text,
        _ => {
            return (
                Status::BadRequest,
                Json(GrammarCheckResponse::failure("Text is required")),
            )
        }
    };
    let language = request
        .language
        .filter(|language| !language.trim().is_empty())
        .unwrap_or_else(|| client.default_language().to_string());

    match client.check(&text, &language).await {
        Ok(data) => (
            Status::Ok,
            Json(GrammarCheckResponse {
                success: true,
                data: Some(data),
                message: None,
            }),
        ),
        Err(e) => {
            tracing::error!("Grammar check failed: {}", e);
            (
                Status::InternalServerError,
                Json(GrammarCheckResponse::failure("Grammar check failed")),
            )
        }
    }
}
