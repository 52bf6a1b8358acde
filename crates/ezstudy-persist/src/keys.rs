use ezstudy_types::UserKey;

/// Storage keys of one user's namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageKeys {
    pub threads: String,
    pub active_thread: String,
    pub attachments: String,
}

impl StorageKeys {
    pub fn for_user(user_key: &UserKey) -> Self {
        Self {
            threads: format!("threads:{user_key}"),
            active_thread: format!("activeThread:{user_key}"),
            attachments: format!("attachments:{user_key}"),
        }
    }
}
