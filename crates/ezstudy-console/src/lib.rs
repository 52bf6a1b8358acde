pub mod commands;
pub mod config;
pub mod console;
pub mod logging;

pub use commands::{Command, CommandError, Input};
pub use config::{Config, LoggingConfig, StorageConfig};
pub use console::{ChatConsole, IgnoreReason, RequestState, SendOutcome};
