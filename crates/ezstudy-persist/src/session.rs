use ezstudy_types::{AttachmentMeta, Message, Thread, UserKey, UserProfile};
use std::sync::Arc;

use crate::error::Result;
use crate::snapshot::SessionSnapshot;
use crate::store::KeyValueStore;
use crate::writer::{SnapshotWriter, WriterConfig};

#[derive(Debug, Clone, Default)]
pub struct SessionSettings {
    pub writer: WriterConfig,
}

impl SessionSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writer(mut self, writer: WriterConfig) -> Self {
        self.writer = writer;
        self
    }
}

/// In-memory threads and attachment library of one user, kept durable
/// through a debounced [`SnapshotWriter`].
///
/// Invariant: there is always at least one thread, and the active id names
/// one of them.
pub struct SessionStore {
    profile: UserProfile,
    user_key: UserKey,
    threads: Vec<Thread>,
    active_thread_id: String,
    attachments: Vec<AttachmentMeta>,
    writer: SnapshotWriter,
}

impl SessionStore {
    /// Restore a user's session, falling back to a single greeting thread
    /// when nothing usable is stored. Never fails: storage problems are
    /// logged and treated as an empty namespace.
    pub async fn load_for_user(
        store: Arc<dyn KeyValueStore>,
        profile: UserProfile,
        settings: SessionSettings,
    ) -> Self {
        let user_key = profile.key();
        let snapshot = SessionSnapshot::read(store.as_ref(), &user_key).await;
        let writer = SnapshotWriter::spawn(store, settings.writer);

        let restored = !snapshot.threads.is_empty();
        let mut threads = snapshot.threads;
        if threads.is_empty() {
            threads.push(Thread::new(profile.greeting()));
        }

        let active_thread_id = snapshot
            .active_thread_id
            .filter(|id| threads.iter().any(|t| &t.id == id))
            .unwrap_or_else(|| threads[0].id.clone());

        let session = Self {
            profile,
            user_key,
            threads,
            active_thread_id,
            attachments: snapshot.attachments,
            writer,
        };

        tracing::info!(
            user_key = %session.user_key,
            threads = session.threads.len(),
            attachments = session.attachments.len(),
            restored,
            "Session loaded"
        );

        if !restored {
            session.persist();
        }
        session
    }

    pub fn user_key(&self) -> &UserKey {
        &self.user_key
    }

    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    /// Threads, most recently created first
    pub fn threads(&self) -> &[Thread] {
        &self.threads
    }

    pub fn thread(&self, thread_id: &str) -> Option<&Thread> {
        self.threads.iter().find(|t| t.id == thread_id)
    }

    pub fn contains_thread(&self, thread_id: &str) -> bool {
        self.thread(thread_id).is_some()
    }

    pub fn active_thread_id(&self) -> &str {
        &self.active_thread_id
    }

    pub fn active_thread(&self) -> &Thread {
        self.thread(&self.active_thread_id)
            .unwrap_or(&self.threads[0])
    }

    /// Uploaded-file library, newest first
    pub fn attachments(&self) -> &[AttachmentMeta] {
        &self.attachments
    }

    pub fn attachment(&self, name: &str) -> Option<&AttachmentMeta> {
        self.attachments.iter().find(|a| a.name == name)
    }

    /// Start a new greeting thread ahead of the others and make it active
    pub fn create_thread(&mut self) -> &Thread {
        let thread = Thread::new(self.profile.greeting());
        tracing::debug!(user_key = %self.user_key, thread_id = %thread.id, "Thread created");

        self.active_thread_id = thread.id.clone();
        self.threads.insert(0, thread);
        self.persist();
        &self.threads[0]
    }

    /// Make `thread_id` active. Unknown ids are ignored and return `false`.
    pub fn switch_thread(&mut self, thread_id: &str) -> bool {
        if !self.contains_thread(thread_id) {
            tracing::debug!(thread_id, "Ignoring switch to unknown thread");
            return false;
        }

        self.active_thread_id = thread_id.to_string();
        // The snapshot carries the outgoing thread's messages too
        self.persist();
        true
    }

    /// Append to the end of a thread. Returns `false` when the thread no
    /// longer exists, in which case nothing is stored.
    pub fn append_message(&mut self, thread_id: &str, message: Message) -> bool {
        let Some(thread) = self.threads.iter_mut().find(|t| t.id == thread_id) else {
            tracing::debug!(thread_id, "Dropping message for deleted thread");
            return false;
        };

        thread.push(message);
        self.persist();
        true
    }

    /// Remove a thread, promoting the first remaining one when the active
    /// thread goes. The last thread is replaced by a fresh greeting thread.
    pub fn delete_thread(&mut self, thread_id: &str) -> bool {
        let before = self.threads.len();
        self.threads.retain(|t| t.id != thread_id);
        if self.threads.len() == before {
            return false;
        }

        if self.threads.is_empty() {
            self.threads.push(Thread::new(self.profile.greeting()));
        }
        if self.active_thread_id == thread_id {
            self.active_thread_id = self.threads[0].id.clone();
        }

        tracing::debug!(
            user_key = %self.user_key,
            thread_id,
            remaining = self.threads.len(),
            "Thread deleted"
        );
        self.persist();
        true
    }

    /// Put `meta` at the head of the library, replacing any entry with the
    /// same file name
    pub fn record_attachment(&mut self, meta: AttachmentMeta) {
        self.attachments.retain(|a| a.name != meta.name);
        self.attachments.insert(0, meta);
        self.persist();
    }

    pub fn remove_attachment(&mut self, name: &str) -> bool {
        let before = self.attachments.len();
        self.attachments.retain(|a| a.name != name);
        let removed = self.attachments.len() != before;
        if removed {
            self.persist();
        }
        removed
    }

    /// Threads whose title contains `query`, ignoring case
    pub fn search_threads(&self, query: &str) -> Vec<&Thread> {
        let query = query.trim().to_lowercase();
        self.threads
            .iter()
            .filter(|t| t.title.to_lowercase().contains(&query))
            .collect()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            user_key: self.user_key.clone(),
            threads: self.threads.clone(),
            active_thread_id: Some(self.active_thread_id.clone()),
            attachments: self.attachments.clone(),
        }
    }

    /// Hand the current state to the debounced writer
    pub fn persist(&self) {
        self.writer.schedule(self.snapshot());
    }

    /// Write the current state now
    pub async fn flush(&self) -> Result<()> {
        self.persist();
        self.writer.flush().await
    }

    /// Write the current state and stop the writer
    pub async fn close(self) -> Result<()> {
        self.persist();
        self.writer.shutdown().await
    }
}
