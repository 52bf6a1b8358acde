use ezstudy_types::{AttachmentMeta, Thread, UserKey};
use serde::de::DeserializeOwned;

use crate::error::Result;
use crate::keys::StorageKeys;
use crate::store::KeyValueStore;

/// Everything persisted for one user, written as a whole
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub user_key: UserKey,
    pub threads: Vec<Thread>,
    pub active_thread_id: Option<String>,
    pub attachments: Vec<AttachmentMeta>,
}

impl SessionSnapshot {
    pub fn empty(user_key: UserKey) -> Self {
        Self {
            user_key,
            threads: Vec::new(),
            active_thread_id: None,
            attachments: Vec::new(),
        }
    }

    /// Read a user's snapshot.
    ///
    /// Each key is read on its own: a missing, unreadable or corrupt value
    /// becomes its empty default and is logged, never returned as an error.
    pub async fn read(store: &dyn KeyValueStore, user_key: &UserKey) -> Self {
        let keys = StorageKeys::for_user(user_key);

        let threads: Vec<Thread> = read_json(store, &keys.threads).await.unwrap_or_default();
        let attachments: Vec<AttachmentMeta> =
            read_json(store, &keys.attachments).await.unwrap_or_default();
        let active_thread_id = read_active_id(store, &keys.active_thread).await;

        Self {
            user_key: user_key.clone(),
            threads,
            active_thread_id,
            attachments,
        }
    }

    /// Write every key of the snapshot
    pub async fn write(&self, store: &dyn KeyValueStore) -> Result<()> {
        let keys = StorageKeys::for_user(&self.user_key);

        store
            .set(&keys.threads, serde_json::to_string(&self.threads)?)
            .await?;

        match &self.active_thread_id {
            Some(id) => {
                store
                    .set(&keys.active_thread, serde_json::to_string(id)?)
                    .await?
            }
            None => store.remove(&keys.active_thread).await?,
        }

        store
            .set(&keys.attachments, serde_json::to_string(&self.attachments)?)
            .await?;

        tracing::debug!(
            user_key = %self.user_key,
            threads = self.threads.len(),
            attachments = self.attachments.len(),
            "Session snapshot written"
        );
        Ok(())
    }
}

async fn read_raw(store: &dyn KeyValueStore, key: &str) -> Option<String> {
    match store.get(key).await {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(key, error = %e, "Failed to read stored value, starting fresh");
            None
        }
    }
}

async fn read_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Option<T> {
    let raw = read_raw(store, key).await?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key, error = %e, "Discarding unparsable stored value");
            None
        }
    }
}

/// Active ids used to be stored as bare strings rather than JSON
async fn read_active_id(store: &dyn KeyValueStore, key: &str) -> Option<String> {
    let raw = read_raw(store, key).await?;
    let id = serde_json::from_str::<String>(&raw).unwrap_or_else(|_| raw.trim().to_string());
    (!id.is_empty()).then_some(id)
}
