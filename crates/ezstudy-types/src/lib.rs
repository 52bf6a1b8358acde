pub mod attachment;
pub mod message;
pub mod thread;
pub mod user;

pub use attachment::{AttachmentMeta, DEFAULT_MIME_TYPE, DOCUMENT_EXTENSIONS};
pub use message::{Message, Sender};
pub use thread::{
    derive_preview, derive_title, ellipsize, Thread, DEFAULT_PREVIEW, DEFAULT_TITLE, ELLIPSIS,
    EMPTY_PREVIEW, FALLBACK_TITLE, PREVIEW_BUDGET, TITLE_BUDGET,
};
pub use user::{UserKey, UserProfile, GUEST_KEY};
