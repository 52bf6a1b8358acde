use ezstudy_llm::{
    AiConfig, CompletionRequest, FilePart, RequestConfig, StudyClient, UploadRequest,
};
use ezstudy_persist::{PersistError, SessionStore};
use ezstudy_types::{AttachmentMeta, Message, Thread};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;

pub const REQUEST_FAILED: &str = "Sorry, I couldn't process your request. Please try again.";
pub const UPLOAD_FAILED: &str = "Sorry, I couldn't process your file. Please try again.";
pub const EMPTY_REPLY: &str = "I'm not sure how to respond to that.";
pub const EMPTY_SUMMARY: &str = "I've analyzed your file, but couldn't generate a summary.";

/// Whether a thread is waiting on the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    Idle,
    Awaiting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    EmptyMessage,
    RequestInFlight,
}

/// What a send or upload did to the thread it targeted
#[derive(Debug, Clone, PartialEq)]
pub enum SendOutcome {
    /// The service answered; this assistant message was appended
    Completed(Message),
    /// The service failed; this error message was appended instead
    Failed(Message),
    /// Rejected before any network activity
    Ignored(IgnoreReason),
    /// The thread was deleted while the request was in flight
    Discarded,
}

impl SendOutcome {
    pub fn message(&self) -> Option<&Message> {
        match self {
            Self::Completed(message) | Self::Failed(message) => Some(message),
            Self::Ignored(_) | Self::Discarded => None,
        }
    }
}

struct ConsoleState {
    session: SessionStore,
    in_flight: HashSet<String>,
    ai_config: AiConfig,
    /// Files picked this session; re-sent with every completion request
    pending_files: Vec<FilePart>,
    document_summary: Option<String>,
    use_file_context: bool,
}

impl ConsoleState {
    /// Flip a thread to awaiting; false when it already is
    fn begin_request(&mut self, thread_id: &str) -> bool {
        self.in_flight.insert(thread_id.to_string())
    }

    fn finish_request(&mut self, thread_id: &str) {
        self.in_flight.remove(thread_id);
    }

    fn request_config(&self) -> RequestConfig {
        let config = RequestConfig::new(self.ai_config);
        match (&self.document_summary, self.use_file_context) {
            (Some(summary), true) => config.with_document_context(summary.clone()),
            _ => config,
        }
    }

    /// Append the service's answer to the thread the request was made for
    fn settle(&mut self, thread_id: &str, message: Message, succeeded: bool) -> SendOutcome {
        self.finish_request(thread_id);
        if !self.session.append_message(thread_id, message.clone()) {
            tracing::info!(thread_id, "Thread deleted while awaiting response, discarding");
            return SendOutcome::Discarded;
        }

        if succeeded {
            SendOutcome::Completed(message)
        } else {
            SendOutcome::Failed(message)
        }
    }
}

/// Keeps a thread's in-flight tag honest when the request future is dropped
/// before the service answers: the tag is cleared and the failure message
/// appended, as if the request had failed.
struct InFlight {
    state: Arc<Mutex<ConsoleState>>,
    thread_id: String,
    failure: &'static str,
    settled: bool,
}

impl InFlight {
    fn new(state: &Arc<Mutex<ConsoleState>>, thread_id: &str, failure: &'static str) -> Self {
        Self {
            state: Arc::clone(state),
            thread_id: thread_id.to_string(),
            failure,
            settled: false,
        }
    }

    fn settle(mut self, state: &mut ConsoleState, message: Message, succeeded: bool) -> SendOutcome {
        self.settled = true;
        state.settle(&self.thread_id, message, succeeded)
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.settled {
            return;
        }

        let thread_id = std::mem::take(&mut self.thread_id);
        let failure = Message::assistant(self.failure);
        tracing::warn!(%thread_id, "Request abandoned before the service answered");

        if let Ok(mut state) = self.state.try_lock() {
            state.settle(&thread_id, failure, false);
            return;
        }

        // Lock is busy; settle as soon as it frees up
        let state = Arc::clone(&self.state);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    state.lock().await.settle(&thread_id, failure, false);
                });
            }
            Err(_) => tracing::error!(%thread_id, "No runtime to release abandoned request"),
        }
    }
}

/// The learning console: session state plus the study service.
///
/// Cheap to clone; clones share state. Network calls never hold the state
/// lock, so other threads stay usable while one is awaiting a response.
#[derive(Clone)]
pub struct ChatConsole {
    state: Arc<Mutex<ConsoleState>>,
    client: Arc<dyn StudyClient>,
}

impl ChatConsole {
    pub fn new(session: SessionStore, client: Arc<dyn StudyClient>) -> Self {
        Self {
            state: Arc::new(Mutex::new(ConsoleState {
                session,
                in_flight: HashSet::new(),
                ai_config: AiConfig::default(),
                pending_files: Vec::new(),
                document_summary: None,
                use_file_context: false,
            })),
            client,
        }
    }

    pub fn with_ai_config(self, ai_config: AiConfig) -> Self {
        // Nobody else holds the state yet
        if let Ok(mut state) = self.state.try_lock() {
            state.ai_config = ai_config;
        }
        self
    }

    /// Send `text` on the active thread.
    ///
    /// The user message is appended before the request goes out; the answer,
    /// or an error message, is appended to that same thread when it arrives.
    pub async fn send_message(&self, text: &str) -> SendOutcome {
        let utterance = text.trim();
        if utterance.is_empty() {
            return SendOutcome::Ignored(IgnoreReason::EmptyMessage);
        }

        let (thread_id, request) = {
            let mut state = self.state.lock().await;
            let thread_id = state.session.active_thread_id().to_string();
            if !state.begin_request(&thread_id) {
                tracing::debug!(%thread_id, "Send ignored, request already in flight");
                return SendOutcome::Ignored(IgnoreReason::RequestInFlight);
            }

            let request = CompletionRequest::from_history(
                &state.session.active_thread().messages,
                utterance,
                state.request_config(),
            )
            .with_files(state.pending_files.clone());

            state.session.append_message(&thread_id, Message::user(utterance));
            (thread_id, request)
        };
        let in_flight = InFlight::new(&self.state, &thread_id, REQUEST_FAILED);

        let result = self.client.complete(request).await;

        let mut state = self.state.lock().await;
        match result {
            Ok(reply) => {
                let message = Message::assistant(reply.text_or(EMPTY_REPLY));
                in_flight.settle(&mut state, message, true)
            }
            Err(e) => {
                tracing::warn!(%thread_id, error = %e, "Completion request failed");
                in_flight.settle(&mut state, Message::assistant(REQUEST_FAILED), false)
            }
        }
    }

    /// Send one file for analysis on the active thread and add it to the
    /// library when the service accepts it
    pub async fn upload_file(&self, file: FilePart) -> SendOutcome {
        let (thread_id, request, meta) = {
            let mut state = self.state.lock().await;
            let thread_id = state.session.active_thread_id().to_string();
            if !state.begin_request(&thread_id) {
                tracing::debug!(%thread_id, "Upload ignored, request already in flight");
                return SendOutcome::Ignored(IgnoreReason::RequestInFlight);
            }

            state.pending_files.retain(|f| f.name != file.name);
            state.pending_files.push(file.clone());
            state.session.append_message(
                &thread_id,
                Message::user(format!("📎 **File uploaded:** {}", file.name)),
            );

            let meta = file.meta();
            let request = UploadRequest::new(file, state.request_config());
            (thread_id, request, meta)
        };
        let in_flight = InFlight::new(&self.state, &thread_id, UPLOAD_FAILED);

        let result = self.client.analyze(request).await;

        let mut state = self.state.lock().await;
        match result {
            Ok(reply) => {
                if meta.is_document() {
                    state.document_summary = reply.text.clone();
                }
                tracing::info!(file = %meta.name, size = meta.size, "File analysed");
                state.session.record_attachment(meta);

                let message = Message::assistant(reply.text_or(EMPTY_SUMMARY));
                in_flight.settle(&mut state, message, true)
            }
            Err(e) => {
                tracing::warn!(%thread_id, file = %meta.name, error = %e, "File upload failed");
                in_flight.settle(&mut state, Message::assistant(UPLOAD_FAILED), false)
            }
        }
    }

    /// Start a fresh thread; files and document context of the previous
    /// session are dropped
    pub async fn new_session(&self) -> Thread {
        let mut state = self.state.lock().await;
        state.pending_files.clear();
        state.document_summary = None;
        state.session.create_thread().clone()
    }

    /// Open a new thread focused on a library file. Returns the prompt to
    /// prefill, or `None` when the library has no such file.
    pub async fn discuss_file(&self, name: &str) -> Option<String> {
        let mut state = self.state.lock().await;
        let meta = state.session.attachment(name)?.clone();

        state.session.create_thread();
        state.session.record_attachment(meta);
        state.use_file_context = true;
        Some(format!("Please analyze and discuss this file: {name}"))
    }

    pub async fn switch_thread(&self, thread_id: &str) -> bool {
        self.state.lock().await.session.switch_thread(thread_id)
    }

    pub async fn delete_thread(&self, thread_id: &str) -> bool {
        self.state.lock().await.session.delete_thread(thread_id)
    }

    pub async fn request_state(&self, thread_id: &str) -> RequestState {
        if self.state.lock().await.in_flight.contains(thread_id) {
            RequestState::Awaiting
        } else {
            RequestState::Idle
        }
    }

    pub async fn ai_config(&self) -> AiConfig {
        self.state.lock().await.ai_config
    }

    pub async fn set_config(&self, ai_config: AiConfig) {
        self.state.lock().await.ai_config = ai_config;
    }

    pub async fn use_file_context(&self) -> bool {
        self.state.lock().await.use_file_context
    }

    pub async fn set_use_file_context(&self, enabled: bool) {
        self.state.lock().await.use_file_context = enabled;
    }

    pub async fn document_summary(&self) -> Option<String> {
        self.state.lock().await.document_summary.clone()
    }

    pub async fn active_thread(&self) -> Thread {
        self.state.lock().await.session.active_thread().clone()
    }

    pub async fn threads(&self) -> Vec<Thread> {
        self.state.lock().await.session.threads().to_vec()
    }

    pub async fn search_threads(&self, query: &str) -> Vec<Thread> {
        let state = self.state.lock().await;
        state
            .session
            .search_threads(query)
            .into_iter()
            .cloned()
            .collect()
    }

    pub async fn attachments(&self) -> Vec<AttachmentMeta> {
        self.state.lock().await.session.attachments().to_vec()
    }

    /// Write the session to storage now, e.g. before exiting
    pub async fn flush(&self) -> Result<(), PersistError> {
        self.state.lock().await.session.flush().await
    }
}
