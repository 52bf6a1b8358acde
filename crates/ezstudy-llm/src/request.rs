use ezstudy_types::Message;
use reqwest::multipart::{Form, Part};
use serde::Serialize;

use crate::config::{AiConfig, DeviceContext};
use crate::error::Result;
use crate::types::{FilePart, HistoryEntry};

/// The `config` field of a request: the console's AI settings plus free-form
/// context about the device and, optionally, the last analysed document
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestConfig {
    #[serde(flatten)]
    pub ai: AiConfig,
    pub device_context: DeviceContext,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_context: Option<String>,
}

impl RequestConfig {
    /// Settings plus a device context captured now
    pub fn new(ai: AiConfig) -> Self {
        Self {
            ai,
            device_context: DeviceContext::capture(),
            document_context: None,
        }
    }

    pub fn with_document_context(mut self, summary: impl Into<String>) -> Self {
        let summary = summary.into();
        self.document_context = (!summary.trim().is_empty()).then_some(summary);
        self
    }
}

/// A new user utterance with the transcript that precedes it
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub history: Vec<HistoryEntry>,
    pub user_message: String,
    pub config: RequestConfig,
    pub files: Vec<FilePart>,
}

impl CompletionRequest {
    /// `history` must not already contain `user_message`
    pub fn from_history(
        history: &[Message],
        user_message: impl Into<String>,
        config: RequestConfig,
    ) -> Self {
        Self {
            history: history.iter().map(HistoryEntry::from).collect(),
            user_message: user_message.into(),
            config,
            files: Vec::new(),
        }
    }

    pub fn with_files(mut self, files: Vec<FilePart>) -> Self {
        self.files = files;
        self
    }

    pub fn into_form(self) -> Result<Form> {
        let mut form = text_fields(&self.history, self.user_message, &self.config)?;
        for file in self.files {
            form = form.part("files", file_part(file)?);
        }
        Ok(form)
    }
}

/// A single file sent for analysis
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub file: FilePart,
    pub config: RequestConfig,
}

impl UploadRequest {
    pub fn new(file: FilePart, config: RequestConfig) -> Self {
        Self { file, config }
    }

    pub fn user_message(&self) -> String {
        format!("Analyze this file: {}", self.file.name)
    }

    pub fn into_form(self) -> Result<Form> {
        let user_message = self.user_message();
        let history = vec![HistoryEntry::user(user_message.clone())];
        let form = text_fields(&history, user_message, &self.config)?;
        Ok(form.part("files", file_part(self.file)?))
    }
}

fn text_fields(history: &[HistoryEntry], user_message: String, config: &RequestConfig) -> Result<Form> {
    Ok(Form::new()
        .text("messages", serde_json::to_string(history)?)
        .text("userMessage", user_message)
        .text("config", serde_json::to_string(config)?))
}

fn file_part(file: FilePart) -> Result<Part> {
    let part = Part::bytes(file.bytes).file_name(file.name);
    Ok(match file.mime_type {
        Some(mime) => part.mime_str(&mime)?,
        None => part,
    })
}
