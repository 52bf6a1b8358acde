use async_trait::async_trait;

use crate::error::Result;
use crate::request::{CompletionRequest, UploadRequest};
use crate::types::ChatReply;

/// Generates the assistant's next turn for a transcript
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<ChatReply>;
}

/// Analyses an uploaded file and returns a textual summary
#[async_trait]
pub trait UploadClient: Send + Sync {
    async fn analyze(&self, request: UploadRequest) -> Result<ChatReply>;
}

/// Convenience trait for clients that serve both endpoints
pub trait StudyClient: CompletionClient + UploadClient {}

impl<T: CompletionClient + UploadClient> StudyClient for T {}
