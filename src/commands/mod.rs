mod auth;
mod config_cmd;
mod course;
mod note;
mod profile;
mod topic;

pub use auth::AuthCommand;
pub use config_cmd::ConfigCommand;
pub use course::CourseCommand;
pub use note::NoteCommand;
pub use profile::ProfileCommand;
pub use topic::TopicCommand;

use clap::ValueEnum;
use coursenotes_core::{ApiError, ResourceAddress, SyncError};
use std::io::{self, Write};

use crate::config::ConfigError;
use crate::session::SessionError;

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Errors that end a command.
#[derive(Debug)]
pub enum CommandError {
    Config(ConfigError),
    Session(SessionError),
    /// A request made outside the controller (login) failed.
    Api(ApiError),
    /// A controller operation failed; the notifier has already shown why.
    Sync(SyncError),
    Io(io::Error),
    Json(serde_json::Error),
    NotLoggedIn,
    Input(String),
}

impl CommandError {
    /// True when the user has already been told about this error.
    pub fn is_reported(&self) -> bool {
        matches!(self, CommandError::Sync(_))
    }
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::Config(e) => write!(f, "{}", e),
            CommandError::Session(e) => write!(f, "{}", e),
            CommandError::Api(e) => write!(f, "{}", e.messages().join("; ")),
            CommandError::Sync(e) => write!(f, "{}", e),
            CommandError::Io(e) => write!(f, "I/O error: {}", e),
            CommandError::Json(e) => write!(f, "JSON error: {}", e),
            CommandError::NotLoggedIn => {
                write!(f, "Not logged in. Run 'notes auth login' first.")
            }
            CommandError::Input(message) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for CommandError {}

impl From<ConfigError> for CommandError {
    fn from(e: ConfigError) -> Self {
        CommandError::Config(e)
    }
}

impl From<SessionError> for CommandError {
    fn from(e: SessionError) -> Self {
        CommandError::Session(e)
    }
}

impl From<ApiError> for CommandError {
    fn from(e: ApiError) -> Self {
        CommandError::Api(e)
    }
}

impl From<SyncError> for CommandError {
    fn from(e: SyncError) -> Self {
        CommandError::Sync(e)
    }
}

impl From<io::Error> for CommandError {
    fn from(e: io::Error) -> Self {
        CommandError::Io(e)
    }
}

impl From<serde_json::Error> for CommandError {
    fn from(e: serde_json::Error) -> Self {
        CommandError::Json(e)
    }
}

/// Reads one trimmed line after printing `label`.
pub(crate) fn prompt(label: &str) -> io::Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// Prompts for a password. The terminal echoes what is typed, and the
/// label says so.
pub(crate) fn prompt_password(label: &str) -> io::Result<String> {
    prompt(&password_label(label))
}

fn password_label(label: &str) -> String {
    format!("{} (input is visible): ", label)
}

/// Asks a `[y/N]` question.
pub(crate) fn confirm(question: &str) -> io::Result<bool> {
    let answer = prompt(&format!("{} [y/N] ", question))?;
    Ok(answer.eq_ignore_ascii_case("y"))
}

/// Checks that `address` names a topic (`COURSE/TOPIC`).
pub(crate) fn expect_topic(address: ResourceAddress) -> Result<ResourceAddress, CommandError> {
    match address {
        ResourceAddress::Topic(..) => Ok(address),
        other => Err(CommandError::Input(format!(
            "Expected COURSE/TOPIC, got '{}'",
            other
        ))),
    }
}

/// Checks that `address` names a note (`COURSE/TOPIC/NOTE`).
pub(crate) fn expect_note(address: ResourceAddress) -> Result<ResourceAddress, CommandError> {
    match address {
        ResourceAddress::Note(..) => Ok(address),
        other => Err(CommandError::Input(format!(
            "Expected COURSE/TOPIC/NOTE, got '{}'",
            other
        ))),
    }
}
