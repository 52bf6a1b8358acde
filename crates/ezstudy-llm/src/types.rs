use ezstudy_types::{AttachmentMeta, Message};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use crate::error::Result;

/// One prior turn as the completion service expects it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
}

impl HistoryEntry {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

impl From<&Message> for HistoryEntry {
    fn from(message: &Message) -> Self {
        Self {
            role: message.sender.role().to_string(),
            content: message.text.clone(),
        }
    }
}

/// A file picked by the user, held in memory until sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePart {
    pub name: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl FilePart {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let mime_type = guess_mime_type(&name).map(str::to_string);
        Self {
            name,
            mime_type,
            bytes,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }

    /// Read a file from disk; the part is named after the file
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("file")
            .to_string();
        Ok(Self::new(name, bytes))
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }

    /// Library entry for this file, stamped now
    pub fn meta(&self) -> AttachmentMeta {
        AttachmentMeta::new(self.name.clone(), self.size(), self.mime_type.clone())
    }
}

fn guess_mime_type(name: &str) -> Option<&'static str> {
    let ext = name.rsplit_once('.')?.1.to_lowercase();
    let mime = match ext.as_str() {
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "doc" => "application/msword",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "ppt" => "application/vnd.ms-powerpoint",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => return None,
    };
    Some(mime)
}

/// Successful service response
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    /// Generated text, when the body carried any
    pub text: Option<String>,
    pub raw: Value,
}

impl ChatReply {
    /// Accepts both the chat-completions shape (`choices[0].message.content`)
    /// and the plain `{ "response": ... }` shape
    pub fn from_body(raw: Value) -> Self {
        let text = match raw.get("choices") {
            Some(choices) => choices
                .pointer("/0/message/content")
                .and_then(Value::as_str),
            None => raw.get("response").and_then(Value::as_str),
        }
        .filter(|t| !t.trim().is_empty())
        .map(str::to_string);

        Self { text, raw }
    }

    pub fn text_or(&self, fallback: &str) -> String {
        self.text.clone().unwrap_or_else(|| fallback.to_string())
    }
}
