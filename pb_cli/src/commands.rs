use private_blackjack::entities::{ParticipantId, Usd};
use std::fmt;

/// A line typed at the table prompt.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Command {
    New,
    Join(ParticipantId, Usd),
    Leave(ParticipantId),
    Deal,
    Hit(ParticipantId),
    Stand(ParticipantId),
    DoubleDown(ParticipantId),
    Split(ParticipantId),
    Insure(ParticipantId),
    Decline(ParticipantId),
    /// Stand every open hand and play the dealer out
    Finish,
    Cancel,
    Show,
    Balance(ParticipantId),
    History(ParticipantId),
    Help,
    Quit,
}

/// Errors that can occur during command parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// Invalid bet amount (not a valid number).
    InvalidBet(String),
    /// Command needs a participant name.
    MissingName(String),
    /// Join needs a name and a bet.
    MissingBet,
    /// Unrecognized command.
    UnrecognizedCommand(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidBet(value) => write!(
                f,
                "Invalid bet '{value}'. Must be a positive number (e.g., 'join alice 100')"
            ),
            Self::MissingName(cmd) => {
                write!(f, "'{cmd}' needs a participant name (e.g., '{cmd} alice')")
            }
            Self::MissingBet => write!(f, "Join needs a name and a bet (e.g., 'join alice 100')"),
            Self::UnrecognizedCommand(cmd) => write!(
                f,
                "Unrecognized command '{cmd}'. Type 'help' to see available commands"
            ),
        }
    }
}

impl std::error::Error for ParseError {}

/// Parse a command string into a [`Command`].
///
/// # Examples
///
/// ```
/// use pb_cli::commands::{Command, parse_command};
/// use private_blackjack::entities::ParticipantId;
///
/// assert_eq!(parse_command("deal"), Ok(Command::Deal));
/// assert_eq!(
///     parse_command("join alice 100"),
///     Ok(Command::Join(ParticipantId::new("alice"), 100))
/// );
/// ```
pub fn parse_command(input: &str) -> Result<Command, ParseError> {
    let trimmed = input.trim();

    // Try single-word commands first
    match trimmed {
        "new" => return Ok(Command::New),
        "deal" => return Ok(Command::Deal),
        "finish" => return Ok(Command::Finish),
        "cancel" => return Ok(Command::Cancel),
        "show" => return Ok(Command::Show),
        "help" => return Ok(Command::Help),
        "quit" | "exit" => return Ok(Command::Quit),
        _ => {}
    }

    let parts: Vec<&str> = trimmed.split_ascii_whitespace().collect();
    let Some(&verb) = parts.first() else {
        return Err(ParseError::UnrecognizedCommand(String::new()));
    };
    if verb == "join" {
        return parse_join_command(&parts);
    }

    let named: fn(ParticipantId) -> Command = match verb {
        "leave" => Command::Leave,
        "hit" => Command::Hit,
        "stand" => Command::Stand,
        "double" => Command::DoubleDown,
        "split" => Command::Split,
        "insure" => Command::Insure,
        "decline" => Command::Decline,
        "balance" => Command::Balance,
        "history" => Command::History,
        _ => return Err(ParseError::UnrecognizedCommand(trimmed.to_string())),
    };
    parts
        .get(1)
        .map(|name| named(ParticipantId::new(name)))
        .ok_or_else(|| ParseError::MissingName(verb.to_string()))
}

/// Parse a join command: "join NAME BET"
fn parse_join_command(parts: &[&str]) -> Result<Command, ParseError> {
    match (parts.get(1), parts.get(2)) {
        (Some(name), Some(value)) => {
            let bet = value
                .parse::<Usd>()
                .map_err(|_| ParseError::InvalidBet((*value).to_string()))?;
            Ok(Command::Join(ParticipantId::new(name), bet))
        }
        _ => Err(ParseError::MissingBet),
    }
}
