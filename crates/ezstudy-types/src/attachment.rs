use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// Extensions whose analysis summary is kept as document context
pub const DOCUMENT_EXTENSIONS: &[&str] = &[".pdf", ".ppt", ".pptx", ".doc", ".docx", ".txt"];

/// Library entry for an uploaded file.
///
/// Belongs to the user rather than to a thread; the file body is not stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentMeta {
    pub name: String,
    pub size: u64,
    #[serde(alias = "type", default = "default_mime_type")]
    pub mime_type: String,
    pub uploaded_at: DateTime<Utc>,
}

impl AttachmentMeta {
    pub fn new(name: impl Into<String>, size: u64, mime_type: Option<String>) -> Self {
        Self {
            name: name.into(),
            size,
            mime_type: mime_type
                .filter(|m| !m.is_empty())
                .unwrap_or_else(default_mime_type),
            uploaded_at: Utc::now(),
        }
    }

    pub fn is_document(&self) -> bool {
        let name = self.name.to_lowercase();
        DOCUMENT_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
    }
}

fn default_mime_type() -> String {
    DEFAULT_MIME_TYPE.to_string()
}
