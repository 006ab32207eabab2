//! Operator console: line commands standing in for the dashboard controls.

use std::future::Future;

use crate::errors::AegisError;
use crate::types::{Action, Mode};

pub const HELP: &str = "\
commands:
  earn | leverage          switch mode
  amount <x>               set the amount (ETH in earn, USDC in leverage)
  primary | secondary      the current mode's two buttons
  supply | withdraw        earn actions (recall = withdraw)
  borrow | repay           leverage actions (repay approves first when the
                           allowance is short; approve = unlock = repay)
  ask <scenario>           ask the advisor about a scenario
  voice                    dictate a scenario
  refresh                  re-read account, balance and allowance
  status                   print the dashboard
  help                     this text
  quit                     exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetMode(Mode),
    SetAmount(String),
    /// A button press. Named verbs carry the mode they belong to; the
    /// neutral `primary`/`secondary` carry none.
    Execute {
        action: Action,
        mode: Option<Mode>,
    },
    Ask(String),
    Voice,
    Refresh,
    Status,
    Help,
    Quit,
}

/// Parse one console line. Keywords are case-insensitive.
pub fn parse_command(line: &str) -> Result<Command, AegisError> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "" => return Err(AegisError::InvalidInput("empty command, try `help`".into())),
        "earn" => Command::SetMode(Mode::Earn),
        "leverage" => Command::SetMode(Mode::Leverage),
        "amount" => Command::SetAmount(rest.to_string()),
        "primary" => execute(Action::Primary, None),
        "secondary" => execute(Action::Secondary, None),
        "supply" => execute(Action::Primary, Some(Mode::Earn)),
        "withdraw" | "recall" => execute(Action::Secondary, Some(Mode::Earn)),
        "borrow" => execute(Action::Primary, Some(Mode::Leverage)),
        "repay" | "approve" | "unlock" => execute(Action::Secondary, Some(Mode::Leverage)),
        "ask" if rest.is_empty() => {
            return Err(AegisError::InvalidInput("usage: ask <scenario>".into()))
        }
        "ask" => Command::Ask(rest.to_string()),
        "voice" => Command::Voice,
        "refresh" => Command::Refresh,
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => {
            return Err(AegisError::InvalidInput(format!(
                "unknown command `{other}`, try `help`"
            )))
        }
    };
    Ok(command)
}

fn execute(action: Action, mode: Option<Mode>) -> Command {
    Command::Execute { action, mode }
}

/// The button a command presses in `current` mode. A named verb from the
/// other mode is refused rather than pressing that mode's button.
pub fn resolve_action(
    action: Action,
    required: Option<Mode>,
    current: Mode,
) -> Result<Action, AegisError> {
    match required {
        Some(required) if required != current => Err(AegisError::InvalidInput(format!(
            "not available in {current} mode, switch with `{}` first",
            required.to_string().to_ascii_lowercase()
        ))),
        _ => Ok(action),
    }
}

// ---------------------------------------------------------------------------
// Speech input
// ---------------------------------------------------------------------------

/// Speech-to-text source for the `voice` command.
pub trait SpeechInput: Send + Sync + 'static {
    /// Capture one utterance and return its transcript.
    fn listen(&self) -> impl Future<Output = Result<String, AegisError>> + Send;
}

/// The terminal build has no microphone backend.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSpeechInput;

impl SpeechInput for NoSpeechInput {
    async fn listen(&self) -> Result<String, AegisError> {
        Err(AegisError::VoiceUnavailable)
    }
}
