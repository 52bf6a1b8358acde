use async_trait::async_trait;
use ezstudy_console::console::{EMPTY_REPLY, REQUEST_FAILED, UPLOAD_FAILED};
use ezstudy_console::{ChatConsole, IgnoreReason, RequestState, SendOutcome};
use ezstudy_llm::{
    ChatReply, CompletionClient, CompletionRequest, FilePart, ServiceError, UploadClient,
    UploadRequest,
};
use ezstudy_persist::{MemoryStore, SessionSettings, SessionStore};
use ezstudy_types::{Sender, UserProfile};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

/// Scripted study service. Messages and file names starting with "slow"
/// block until `release` is notified; those starting with "hang" never
/// get an answer.
#[derive(Default)]
struct FakeClient {
    fail: bool,
    completions: Mutex<Vec<CompletionRequest>>,
    uploads: Mutex<Vec<UploadRequest>>,
    started: Notify,
    release: Notify,
}

impl FakeClient {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn last_completion(&self) -> CompletionRequest {
        self.completions.lock().unwrap().last().cloned().unwrap()
    }

    fn completion_count(&self) -> usize {
        self.completions.lock().unwrap().len()
    }

    fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }

    async fn hold(&self, text: &str) {
        if text.starts_with("slow") {
            self.started.notify_one();
            self.release.notified().await;
        } else if text.starts_with("hang") {
            std::future::pending::<()>().await;
        }
    }
}

#[async_trait]
impl CompletionClient for FakeClient {
    async fn complete(&self, request: CompletionRequest) -> ezstudy_llm::Result<ChatReply> {
        let prefix = request.user_message.clone();
        let answer = format!("Answer to: {}", request.user_message);
        self.completions.lock().unwrap().push(request);

        self.hold(&prefix).await;
        if self.fail {
            return Err(ServiceError::Status {
                status: 500,
                message: "Server error: 500".to_string(),
            });
        }
        Ok(ChatReply::from_body(json!({ "response": answer })))
    }
}

#[async_trait]
impl UploadClient for FakeClient {
    async fn analyze(&self, request: UploadRequest) -> ezstudy_llm::Result<ChatReply> {
        let summary = format!("Summary of {} ({} bytes)", request.file.name, request.file.size());
        let prefix = request.file.name.clone();
        self.uploads.lock().unwrap().push(request);

        self.hold(&prefix).await;
        if self.fail {
            return Err(ServiceError::MalformedResponse("not json".to_string()));
        }
        Ok(ChatReply::from_body(json!({
            "choices": [{ "message": { "content": summary } }]
        })))
    }
}

async fn console_with(client: Arc<FakeClient>, store: &MemoryStore) -> ChatConsole {
    let session = SessionStore::load_for_user(
        Arc::new(store.clone()),
        UserProfile::signed_in("u-42", Some("Ada".to_string())),
        SessionSettings::default(),
    )
    .await;
    ChatConsole::new(session, client)
}

#[tokio::test]
async fn test_send_appends_user_and_assistant_messages() {
    let client = Arc::new(FakeClient::default());
    let console = console_with(client.clone(), &MemoryStore::new()).await;

    let outcome = console.send_message("  Explain photosynthesis  ").await;

    let reply = outcome.message().unwrap();
    assert_eq!(reply.sender, Sender::Assistant);
    assert_eq!(reply.text, "Answer to: Explain photosynthesis");

    let thread = console.active_thread().await;
    assert_eq!(thread.messages.len(), 3);
    assert_eq!(thread.messages[1].text, "Explain photosynthesis");
    assert_eq!(thread.title, "Explain photosynthesis");

    // History holds the greeting only; the utterance travels separately
    let request = client.last_completion();
    assert_eq!(request.history.len(), 1);
    assert_eq!(request.history[0].role, "assistant");
    assert_eq!(request.user_message, "Explain photosynthesis");
}

#[tokio::test]
async fn test_empty_message_is_ignored() {
    let client = Arc::new(FakeClient::default());
    let console = console_with(client.clone(), &MemoryStore::new()).await;

    let outcome = console.send_message("   \n ").await;

    assert_eq!(outcome, SendOutcome::Ignored(IgnoreReason::EmptyMessage));
    assert_eq!(client.completion_count(), 0);
    assert_eq!(console.active_thread().await.messages.len(), 1);
}

#[tokio::test]
async fn test_second_send_while_awaiting_is_ignored() {
    let client = Arc::new(FakeClient::default());
    let console = console_with(client.clone(), &MemoryStore::new()).await;
    let thread_id = console.active_thread().await.id;

    let first = {
        let console = console.clone();
        tokio::spawn(async move { console.send_message("slow question").await })
    };
    client.started.notified().await;
    assert_eq!(console.request_state(&thread_id).await, RequestState::Awaiting);

    let second = console.send_message("impatient follow-up").await;
    assert_eq!(second, SendOutcome::Ignored(IgnoreReason::RequestInFlight));
    assert_eq!(client.completion_count(), 1);

    client.release.notify_one();
    let first = first.await.unwrap();
    assert!(matches!(first, SendOutcome::Completed(_)));
    assert_eq!(console.request_state(&thread_id).await, RequestState::Idle);

    // greeting, question, answer
    assert_eq!(console.active_thread().await.messages.len(), 3);
}

#[tokio::test]
async fn test_other_threads_stay_usable_while_awaiting() {
    let client = Arc::new(FakeClient::default());
    let console = console_with(client.clone(), &MemoryStore::new()).await;
    let first_id = console.active_thread().await.id;

    let pending = {
        let console = console.clone();
        tokio::spawn(async move { console.send_message("slow question").await })
    };
    client.started.notified().await;

    let second = console.new_session().await;
    let outcome = console.send_message("quick one").await;
    assert!(matches!(outcome, SendOutcome::Completed(_)));

    client.release.notify_one();
    pending.await.unwrap();

    let threads = console.threads().await;
    let first = threads.iter().find(|t| t.id == first_id).unwrap();
    let second = threads.iter().find(|t| t.id == second.id).unwrap();
    assert_eq!(first.messages.last().unwrap().text, "Answer to: slow question");
    assert_eq!(second.messages.last().unwrap().text, "Answer to: quick one");
}

#[tokio::test]
async fn test_failure_appends_exactly_one_error_message() {
    let client = Arc::new(FakeClient::failing());
    let console = console_with(client, &MemoryStore::new()).await;

    let outcome = console.send_message("What is ATP?").await;

    assert!(matches!(outcome, SendOutcome::Failed(_)));
    let thread = console.active_thread().await;
    assert_eq!(thread.messages.len(), 3);
    assert_eq!(thread.messages[2].text, REQUEST_FAILED);
    assert_eq!(thread.messages[2].sender, Sender::Assistant);
    let errors = thread.messages.iter().filter(|m| m.text == REQUEST_FAILED).count();
    assert_eq!(errors, 1);
}

#[tokio::test]
async fn test_response_for_deleted_thread_is_discarded() {
    let client = Arc::new(FakeClient::default());
    let console = console_with(client.clone(), &MemoryStore::new()).await;
    let doomed = console.active_thread().await.id;

    let pending = {
        let console = console.clone();
        tokio::spawn(async move { console.send_message("slow question").await })
    };
    client.started.notified().await;

    let fresh = console.new_session().await;
    assert!(console.delete_thread(&doomed).await);

    client.release.notify_one();
    assert_eq!(pending.await.unwrap(), SendOutcome::Discarded);

    let threads = console.threads().await;
    assert_eq!(threads.len(), 1);
    assert_eq!(threads[0].id, fresh.id);
    assert_eq!(threads[0].messages.len(), 1);
}

#[tokio::test]
async fn test_uploading_same_name_twice_keeps_one_entry() {
    let client = Arc::new(FakeClient::default());
    let console = console_with(client.clone(), &MemoryStore::new()).await;

    console.upload_file(FilePart::new("notes.pdf", vec![0; 3])).await;
    let outcome = console.upload_file(FilePart::new("notes.pdf", vec![0; 7])).await;

    assert_eq!(
        outcome.message().unwrap().text,
        "Summary of notes.pdf (7 bytes)"
    );

    let attachments = console.attachments().await;
    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0].name, "notes.pdf");
    assert_eq!(attachments[0].size, 7);
    assert_eq!(attachments[0].mime_type, "application/pdf");

    // Completion requests carry the file once, in its latest version
    console.send_message("Quiz me").await;
    let request = client.last_completion();
    assert_eq!(request.files.len(), 1);
    assert_eq!(request.files[0].size(), 7);
}

#[tokio::test]
async fn test_upload_posts_notice_and_summary() {
    let client = Arc::new(FakeClient::default());
    let console = console_with(client.clone(), &MemoryStore::new()).await;

    console.upload_file(FilePart::new("diagram.png", vec![1, 2])).await;

    let thread = console.active_thread().await;
    let texts: Vec<_> = thread.messages.iter().map(|m| m.text.as_str()).collect();
    assert_eq!(
        texts[1..],
        ["📎 **File uploaded:** diagram.png", "Summary of diagram.png (2 bytes)"]
    );
    // Images never become document context
    assert!(console.document_summary().await.is_none());
    assert_eq!(client.uploads.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_failed_upload_is_not_recorded() {
    let client = Arc::new(FakeClient::failing());
    let console = console_with(client, &MemoryStore::new()).await;

    let outcome = console.upload_file(FilePart::new("notes.pdf", vec![0; 3])).await;

    assert_eq!(outcome.message().unwrap().text, UPLOAD_FAILED);
    assert!(console.attachments().await.is_empty());
    assert!(console.document_summary().await.is_none());
}

#[tokio::test]
async fn test_document_context_follows_toggle() {
    let client = Arc::new(FakeClient::default());
    let console = console_with(client.clone(), &MemoryStore::new()).await;

    console.upload_file(FilePart::new("chapter3.txt", b"enzymes".to_vec())).await;
    assert_eq!(
        console.document_summary().await.as_deref(),
        Some("Summary of chapter3.txt (7 bytes)")
    );

    console.send_message("What are enzymes?").await;
    assert!(client.last_completion().config.document_context.is_none());

    console.set_use_file_context(true).await;
    console.send_message("And cofactors?").await;
    assert_eq!(
        client.last_completion().config.document_context.as_deref(),
        Some("Summary of chapter3.txt (7 bytes)")
    );
}

#[tokio::test]
async fn test_new_session_drops_files_and_context() {
    let client = Arc::new(FakeClient::default());
    let console = console_with(client.clone(), &MemoryStore::new()).await;

    console.upload_file(FilePart::new("notes.pdf", vec![0; 3])).await;
    console.set_use_file_context(true).await;
    console.new_session().await;
    console.send_message("Fresh start").await;

    let request = client.last_completion();
    assert!(request.files.is_empty());
    assert!(request.config.document_context.is_none());
    // The library outlives the session
    assert_eq!(console.attachments().await.len(), 1);
}

#[tokio::test]
async fn test_discuss_file_opens_focused_thread() {
    let client = Arc::new(FakeClient::default());
    let console = console_with(client, &MemoryStore::new()).await;

    console.upload_file(FilePart::new("slides.pptx", vec![0; 5])).await;
    console.upload_file(FilePart::new("notes.pdf", vec![0; 3])).await;
    let before = console.active_thread().await.id;

    let prompt = console.discuss_file("slides.pptx").await.unwrap();

    assert_eq!(prompt, "Please analyze and discuss this file: slides.pptx");
    assert_ne!(console.active_thread().await.id, before);
    assert!(console.use_file_context().await);
    assert_eq!(console.attachments().await[0].name, "slides.pptx");
    assert!(console.discuss_file("missing.pdf").await.is_none());
}

#[tokio::test]
async fn test_settings_are_sent_with_requests() {
    let client = Arc::new(FakeClient::default());
    let console = console_with(client.clone(), &MemoryStore::new()).await;

    let ai = console.ai_config().await.tone("concise".parse().unwrap());
    console.set_config(ai).await;
    console.send_message("Define entropy").await;

    assert_eq!(client.last_completion().config.ai.tone.as_str(), "concise");
}

#[tokio::test]
async fn test_empty_reply_uses_fallback_text() {
    struct Mute;

    #[async_trait]
    impl CompletionClient for Mute {
        async fn complete(&self, _request: CompletionRequest) -> ezstudy_llm::Result<ChatReply> {
            Ok(ChatReply::from_body(json!({ "choices": [] })))
        }
    }

    #[async_trait]
    impl UploadClient for Mute {
        async fn analyze(&self, _request: UploadRequest) -> ezstudy_llm::Result<ChatReply> {
            Ok(ChatReply::from_body(json!({})))
        }
    }

    let session = SessionStore::load_for_user(
        Arc::new(MemoryStore::new()),
        UserProfile::guest(),
        SessionSettings::default(),
    )
    .await;
    let console = ChatConsole::new(session, Arc::new(Mute));

    let outcome = console.send_message("Hello?").await;
    assert!(matches!(outcome, SendOutcome::Completed(_)));
    assert_eq!(outcome.message().unwrap().text, EMPTY_REPLY);
}

#[tokio::test]
async fn test_flush_makes_conversation_durable() {
    let store = MemoryStore::new();
    let console = console_with(Arc::new(FakeClient::default()), &store).await;

    console.send_message("Explain photosynthesis").await;
    console.flush().await.unwrap();

    let reloaded = SessionStore::load_for_user(
        Arc::new(store.clone()),
        UserProfile::signed_in("u-42", None),
        SessionSettings::default(),
    )
    .await;
    assert_eq!(reloaded.active_thread().messages.len(), 3);
    assert_eq!(reloaded.active_thread().title, "Explain photosynthesis");
}

#[tokio::test]
async fn test_upload_ignored_while_send_in_flight() {
    let client = Arc::new(FakeClient::default());
    let console = console_with(client.clone(), &MemoryStore::new()).await;
    let thread_id = console.active_thread().await.id;

    let pending = {
        let console = console.clone();
        tokio::spawn(async move { console.send_message("slow question").await })
    };
    client.started.notified().await;

    let upload = console.upload_file(FilePart::new("notes.pdf", vec![0; 3])).await;
    assert_eq!(upload, SendOutcome::Ignored(IgnoreReason::RequestInFlight));
    assert_eq!(client.upload_count(), 0);
    assert!(console.attachments().await.is_empty());

    client.release.notify_one();
    assert!(matches!(pending.await.unwrap(), SendOutcome::Completed(_)));
    assert_eq!(console.request_state(&thread_id).await, RequestState::Idle);

    // No upload notice was posted: greeting, question, answer
    assert_eq!(console.active_thread().await.messages.len(), 3);
}

#[tokio::test]
async fn test_send_ignored_while_upload_in_flight() {
    let client = Arc::new(FakeClient::default());
    let console = console_with(client.clone(), &MemoryStore::new()).await;
    let thread_id = console.active_thread().await.id;

    let pending = {
        let console = console.clone();
        tokio::spawn(async move {
            console
                .upload_file(FilePart::new("slow-notes.pdf", vec![0; 3]))
                .await
        })
    };
    client.started.notified().await;
    assert_eq!(console.request_state(&thread_id).await, RequestState::Awaiting);

    let send = console.send_message("Is it done yet?").await;
    assert_eq!(send, SendOutcome::Ignored(IgnoreReason::RequestInFlight));
    assert_eq!(client.completion_count(), 0);

    client.release.notify_one();
    assert!(matches!(pending.await.unwrap(), SendOutcome::Completed(_)));
    assert_eq!(console.request_state(&thread_id).await, RequestState::Idle);
    assert_eq!(console.attachments().await.len(), 1);

    let again = console.send_message("Is it done yet?").await;
    assert!(matches!(again, SendOutcome::Completed(_)));
}

#[tokio::test]
async fn test_abandoned_send_releases_thread() {
    let client = Arc::new(FakeClient::default());
    let console = console_with(client.clone(), &MemoryStore::new()).await;
    let thread_id = console.active_thread().await.id;

    let result = tokio::time::timeout(
        Duration::from_millis(50),
        console.send_message("hang on forever"),
    )
    .await;
    assert!(result.is_err());

    assert_eq!(console.request_state(&thread_id).await, RequestState::Idle);
    let thread = console.active_thread().await;
    assert_eq!(thread.messages[1].text, "hang on forever");
    assert_eq!(thread.messages[2].text, REQUEST_FAILED);
    assert_eq!(thread.messages.len(), 3);

    let outcome = console.send_message("hello again").await;
    assert!(matches!(outcome, SendOutcome::Completed(_)));
}

#[tokio::test]
async fn test_abandoned_upload_releases_thread() {
    let client = Arc::new(FakeClient::default());
    let console = console_with(client.clone(), &MemoryStore::new()).await;
    let thread_id = console.active_thread().await.id;

    let result = tokio::time::timeout(
        Duration::from_millis(50),
        console.upload_file(FilePart::new("hang.pdf", vec![0; 3])),
    )
    .await;
    assert!(result.is_err());

    assert_eq!(console.request_state(&thread_id).await, RequestState::Idle);
    assert_eq!(
        console.active_thread().await.messages.last().unwrap().text,
        UPLOAD_FAILED
    );
    assert!(console.attachments().await.is_empty());

    let outcome = console.upload_file(FilePart::new("notes.pdf", vec![0; 3])).await;
    assert!(matches!(outcome, SendOutcome::Completed(_)));
}
