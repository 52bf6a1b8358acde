use anyhow::Context;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use ezstudy_console::{
    commands::HELP, config::Config, logging::init_logging, ChatConsole, Command, IgnoreReason,
    Input, SendOutcome,
};
use ezstudy_llm::{FilePart, HttpStudyClient, StudyClient};
use ezstudy_persist::{FileStore, KeyValueStore, SessionStore};
use ezstudy_types::{Message, Sender, Thread};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    let config = Config::load().context("Failed to load configuration")?;

    init_logging(&config.logging);

    tracing::info!("Starting EzStudy console");
    tracing::info!(backend_url = %config.service.backend_url, "Config loaded");

    let data_dir = config.storage.resolved_data_dir();
    let store: Arc<dyn KeyValueStore> = Arc::new(
        FileStore::open(&data_dir)
            .await
            .with_context(|| format!("Failed to open data directory {}", data_dir.display()))?,
    );

    let client: Arc<dyn StudyClient> = Arc::new(
        HttpStudyClient::new(&config.service).context("Failed to create study service client")?,
    );

    let session = SessionStore::load_for_user(
        store,
        config.user.clone(),
        config.storage.session_settings(),
    )
    .await;

    let console = ChatConsole::new(session, client).with_ai_config(config.ai);

    print_thread(&console.active_thread().await);
    println!("Type /help for commands.");

    let mut input = Input::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let command = match input.read(&line) {
            Some(Ok(command)) => command,
            Some(Err(e)) => {
                println!("{e}");
                continue;
            }
            None => continue,
        };

        if matches!(command, Command::Quit) {
            break;
        }
        if let Some(draft) = run_command(&console, command).await {
            println!("draft> {draft}");
            println!("(press Enter to send it, or type your own question)");
            input.set_draft(draft);
        }
    }

    console.flush().await.context("Failed to save session")?;
    tracing::info!("Session saved, bye");
    Ok(())
}

/// Returns a prompt to offer as a draft, if the command produced one
async fn run_command(console: &ChatConsole, command: Command) -> Option<String> {
    match command {
        Command::Send(text) => {
            // Replies arrive in the background so other sessions stay usable
            let console = console.clone();
            tokio::spawn(async move { report(console.send_message(&text).await) });
        }
        Command::Upload(path) => match FilePart::from_path(&path).await {
            Ok(file) => {
                println!("Uploading {} ({} bytes)...", file.name, file.size());
                let console = console.clone();
                tokio::spawn(async move { report(console.upload_file(file).await) });
            }
            Err(e) => println!("Could not read {}: {e}", path.display()),
        },
        Command::New => {
            let thread = console.new_session().await;
            print_thread(&thread);
        }
        Command::Threads => {
            let active = console.active_thread().await.id;
            for thread in console.threads().await {
                print_summary(&thread, thread.id == active);
            }
        }
        Command::Switch(id) => {
            if console.switch_thread(&id).await {
                print_thread(&console.active_thread().await);
            } else {
                println!("No session with id {id}");
            }
        }
        Command::Delete(id) => {
            if console.delete_thread(&id).await {
                println!("Deleted {id}");
            } else {
                println!("No session with id {id}");
            }
        }
        Command::Search(query) => {
            let matches = console.search_threads(&query).await;
            if matches.is_empty() {
                println!("No sessions match '{query}'");
            }
            for thread in &matches {
                print_summary(thread, false);
            }
        }
        Command::Library => {
            let attachments = console.attachments().await;
            if attachments.is_empty() {
                println!("No files uploaded yet");
            }
            for meta in attachments {
                println!(
                    "  {}  {} bytes  {}  {}",
                    meta.name,
                    meta.size,
                    meta.mime_type,
                    meta.uploaded_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        Command::Discuss(name) => match console.discuss_file(&name).await {
            Some(prompt) => {
                println!("New session about {name}");
                return Some(prompt);
            }
            None => println!("No uploaded file named {name}"),
        },
        Command::Context(enabled) => {
            console.set_use_file_context(enabled).await;
            let state = if enabled { "on" } else { "off" };
            println!("Document context {state}");
        }
        Command::Tone(tone) => {
            let ai = console.ai_config().await.tone(tone);
            console.set_config(ai).await;
            println!("Tone: {tone}");
        }
        Command::Mode(mode) => {
            let ai = console.ai_config().await.mode(mode);
            console.set_config(ai).await;
            println!("Mode: {mode}");
        }
        Command::Personality(personality) => {
            let ai = console.ai_config().await.personality(personality);
            console.set_config(ai).await;
            println!("Personality: {personality}");
        }
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
    None
}

fn report(outcome: SendOutcome) {
    match outcome {
        SendOutcome::Completed(message) | SendOutcome::Failed(message) => print_message(&message),
        SendOutcome::Ignored(IgnoreReason::RequestInFlight) => {
            println!("(still waiting for the previous answer in this session)");
        }
        SendOutcome::Ignored(IgnoreReason::EmptyMessage) => {}
        SendOutcome::Discarded => {}
    }
}

fn print_thread(thread: &Thread) {
    println!("== {} [{}]", thread.title, thread.id);
    for message in &thread.messages {
        print_message(message);
    }
}

fn print_summary(thread: &Thread, active: bool) {
    let marker = if active { "*" } else { " " };
    println!(
        "{marker} {}  {}  {}  ({})",
        thread.id,
        thread.title,
        thread.preview,
        thread.last_updated.format("%Y-%m-%d %H:%M")
    );
}

fn print_message(message: &Message) {
    let who = match message.sender {
        Sender::User => "you",
        Sender::Assistant => "assistant",
    };
    println!("{who}> {}", message.text);
}
