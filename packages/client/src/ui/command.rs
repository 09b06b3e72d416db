//! Input line parsing.

use thiserror::Error;

use crate::domain::Flair;

/// One line of user input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputCommand {
    /// Plain text for the active conversation
    Say(String),
    PrivateMessage { recipient: String, text: String },
    Open(String),
    Global,
    Alias(String),
    Flair(Flair),
    Who,
    History(Option<String>),
    Login { username: String, password: String },
    Logout,
    Help,
    Quit,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command /{0}. Type /help for a list of commands.")]
    Unknown(String),

    #[error("Usage: {0}")]
    Usage(&'static str),

    #[error("Unknown flair '{0}'. Choose lost, found or regular.")]
    UnknownFlair(String),
}

/// Parse one input line. Lines not starting with `/` are chat text.
pub fn parse_input(line: &str) -> Result<InputCommand, CommandError> {
    let line = line.trim();
    let Some(rest) = line.strip_prefix('/') else {
        return Ok(InputCommand::Say(line.to_string()));
    };

    let (name, args) = split_word(rest);
    match name {
        "pm" | "msg" => {
            let (recipient, text) = split_word(args);
            if recipient.is_empty() || text.is_empty() {
                return Err(CommandError::Usage("/pm <user> <message>"));
            }
            Ok(InputCommand::PrivateMessage {
                recipient: recipient.to_string(),
                text: text.to_string(),
            })
        }
        "open" => match single_arg(args) {
            Some(user) => Ok(InputCommand::Open(user.to_string())),
            None => Err(CommandError::Usage("/open <user>")),
        },
        "global" => Ok(InputCommand::Global),
        "alias" => {
            if args.is_empty() {
                return Err(CommandError::Usage("/alias <display name>"));
            }
            Ok(InputCommand::Alias(args.to_string()))
        }
        "flair" => {
            let key = single_arg(args).ok_or(CommandError::Usage("/flair lost|found|regular"))?;
            Flair::parse_key(key)
                .map(InputCommand::Flair)
                .ok_or_else(|| CommandError::UnknownFlair(key.to_string()))
        }
        "who" => Ok(InputCommand::Who),
        "history" => Ok(InputCommand::History(single_arg(args).map(str::to_string))),
        "login" => {
            let (username, password) = split_word(args);
            if username.is_empty() || password.is_empty() {
                return Err(CommandError::Usage("/login <username> <password>"));
            }
            Ok(InputCommand::Login {
                username: username.to_string(),
                password: password.to_string(),
            })
        }
        "logout" => Ok(InputCommand::Logout),
        "help" | "?" => Ok(InputCommand::Help),
        "quit" | "exit" => Ok(InputCommand::Quit),
        other => Err(CommandError::Unknown(other.to_string())),
    }
}

fn split_word(input: &str) -> (&str, &str) {
    let input = input.trim();
    match input.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (input, ""),
    }
}

fn single_arg(args: &str) -> Option<&str> {
    let (word, _) = split_word(args);
    (!word.is_empty()).then_some(word)
}
