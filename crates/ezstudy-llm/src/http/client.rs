// HTTP client for the study backend (multipart over reqwest)

use async_trait::async_trait;
use reqwest::multipart::Form;
use reqwest::StatusCode;
use serde_json::Value;

use crate::config::ServiceConfig;
use crate::error::{Result, ServiceError};
use crate::request::{CompletionRequest, UploadRequest};
use crate::traits::{CompletionClient, UploadClient};
use crate::types::ChatReply;

const CHAT_PATH: &str = "/api/chat";

/// Talks to the backend's chat endpoint, which serves both completions and
/// file analysis
pub struct HttpStudyClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl HttpStudyClient {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let base_url = config.backend_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ServiceError::InvalidConfig("backend_url is required".to_string()));
        }
        if config.timeout_secs == 0 {
            return Err(ServiceError::InvalidConfig(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}{}", self.base_url, CHAT_PATH)
    }

    async fn post_form(&self, form: Form) -> Result<ChatReply> {
        let response = self
            .http_client
            .post(self.endpoint())
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(status, &body);
            tracing::warn!(status = status.as_u16(), %message, "Study service returned an error");
            return Err(ServiceError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        let raw: Value = serde_json::from_str(&body)
            .map_err(|e| ServiceError::MalformedResponse(e.to_string()))?;

        tracing::debug!(status = status.as_u16(), "Study service responded");
        Ok(ChatReply::from_body(raw))
    }
}

/// Error bodies look like `{ "error": "..." }`; anything else is reported by status
fn error_message(status: StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_string))
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| format!("Server error: {}", status.as_u16()))
}

#[async_trait]
impl CompletionClient for HttpStudyClient {
    async fn complete(&self, request: CompletionRequest) -> Result<ChatReply> {
        tracing::debug!(
            history = request.history.len(),
            files = request.files.len(),
            "Sending completion request"
        );
        self.post_form(request.into_form()?).await
    }
}

#[async_trait]
impl UploadClient for HttpStudyClient {
    async fn analyze(&self, request: UploadRequest) -> Result<ChatReply> {
        tracing::debug!(
            file = %request.file.name,
            size = request.file.size(),
            "Sending file for analysis"
        );
        self.post_form(request.into_form()?).await
    }
}
