pub mod config;
pub mod error;
pub mod http;
pub mod request;
pub mod traits;
pub mod types;

pub use config::{AiConfig, DeviceContext, Location, Mode, Personality, ServiceConfig, Tone};
pub use error::{Result, ServiceError};
pub use http::HttpStudyClient;
pub use request::{CompletionRequest, RequestConfig, UploadRequest};
pub use traits::{CompletionClient, StudyClient, UploadClient};
pub use types::{ChatReply, FilePart, HistoryEntry};
