// Parsing of the terminal host's input lines

use ezstudy_llm::{Mode, Personality, ServiceError, Tone};
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

pub const HELP: &str = "\
Commands:
  /new                 start a new study session
  /threads             list sessions, newest first
  /switch <id>         open another session
  /delete <id>         delete a session
  /search <query>      find sessions by title
  /upload <path>       send a file for analysis
  /library             list uploaded files
  /discuss <name>      start a session about an uploaded file with a
                       drafted prompt; an empty line sends the draft
  /context on|off      send the last document summary with each message
  /tone <value>        balanced | concise | detailed
  /mode <value>        tutor | quiz | summarize | explain
  /personality <value> friendly | formal | encouraging
  /help                show this help
  /quit                save and exit
Anything else is sent to the assistant.";

/// One line of user input
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Send(String),
    New,
    Threads,
    Switch(String),
    Delete(String),
    Search(String),
    Upload(PathBuf),
    Library,
    Discuss(String),
    Context(bool),
    Tone(Tone),
    Mode(Mode),
    Personality(Personality),
    Help,
    Quit,
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Unknown command: /{0} (try /help)")]
    Unknown(String),

    #[error("/{0} needs an argument")]
    MissingArgument(&'static str),

    #[error("/context expects 'on' or 'off', got '{0}'")]
    InvalidToggle(String),

    #[error(transparent)]
    InvalidChoice(#[from] ServiceError),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Command::Send(line.to_string()));
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };

        let command = match name {
            "new" => Command::New,
            "threads" => Command::Threads,
            "library" => Command::Library,
            "help" => Command::Help,
            "quit" | "exit" => Command::Quit,
            "switch" => Command::Switch(required(arg, "switch")?.to_string()),
            "delete" => Command::Delete(required(arg, "delete")?.to_string()),
            "search" => Command::Search(required(arg, "search")?.to_string()),
            "upload" => Command::Upload(PathBuf::from(required(arg, "upload")?)),
            "discuss" => Command::Discuss(required(arg, "discuss")?.to_string()),
            "context" => match required(arg, "context")? {
                "on" => Command::Context(true),
                "off" => Command::Context(false),
                other => return Err(CommandError::InvalidToggle(other.to_string())),
            },
            "tone" => Command::Tone(required(arg, "tone")?.parse()?),
            "mode" => Command::Mode(required(arg, "mode")?.parse()?),
            "personality" => Command::Personality(required(arg, "personality")?.parse()?),
            other => return Err(CommandError::Unknown(other.to_string())),
        };
        Ok(command)
    }
}

/// Input with an optional pending draft.
///
/// An empty line sends the draft; any other line replaces it.
#[derive(Debug, Default)]
pub struct Input {
    draft: Option<String>,
}

impl Input {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_draft(&mut self, draft: impl Into<String>) {
        self.draft = Some(draft.into());
    }

    pub fn draft(&self) -> Option<&str> {
        self.draft.as_deref()
    }

    /// `None` for a blank line with nothing drafted
    pub fn read(&mut self, line: &str) -> Option<Result<Command, CommandError>> {
        let draft = self.draft.take();
        if line.trim().is_empty() {
            return draft.map(|text| Ok(Command::Send(text)));
        }
        Some(line.parse())
    }
}

fn required<'a>(arg: &'a str, command: &'static str) -> Result<&'a str, CommandError> {
    if arg.is_empty() {
        Err(CommandError::MissingArgument(command))
    } else {
        Ok(arg)
    }
}
