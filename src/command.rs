//! Text commands for driving a monitor from a terminal.
//!
//! The CLI reads one command per line from stdin:
//!
//! | Command              | Effect                                      |
//! |----------------------|---------------------------------------------|
//! | `grade <value>`      | [`LevelMonitor::set_grade`]                 |
//! | `session <id>`       | Set the session id (keeps teacher/course)   |
//! | `end`                | Clear the session id                        |
//! | `sensitivity <value>`| Store a new sensitivity multiplier          |
//! | `status`             | Print the current state                     |
//! | `quit`               | Stop the monitor                            |

use std::str::FromStr;

use thiserror::Error;

use crate::monitor::{LevelMonitor, MonitorState};

/// A parsed command line.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Grade(f64),
    Session(String),
    EndSession,
    Sensitivity(f64),
    Status,
    Quit,
}

/// Why a line could not be parsed.
#[derive(Debug, Error, PartialEq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0}")]
    Unknown(String),
    #[error("{0} expects an argument")]
    MissingArgument(&'static str),
    #[error("invalid number: {0}")]
    InvalidNumber(String),
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let name = parts.next().ok_or(CommandError::Empty)?;
        let arg = parts.next();

        match name.to_ascii_lowercase().as_str() {
            "grade" | "g" => number(arg, "grade").map(Command::Grade),
            "session" => arg
                .map(|id| Command::Session(id.to_string()))
                .ok_or(CommandError::MissingArgument("session")),
            "end" => Ok(Command::EndSession),
            "sensitivity" => number(arg, "sensitivity").map(Command::Sensitivity),
            "status" | "s" => Ok(Command::Status),
            "quit" | "q" | "exit" => Ok(Command::Quit),
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }
}

fn number(arg: Option<&str>, command: &'static str) -> Result<f64, CommandError> {
    let arg = arg.ok_or(CommandError::MissingArgument(command))?;
    arg.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| CommandError::InvalidNumber(arg.to_string()))
}

/// What the caller should do after a command ran.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Continue,
    /// Print this text.
    Report(String),
    Quit,
}

/// Apply a command to the monitor.
pub fn apply(monitor: &LevelMonitor, command: Command) -> Outcome {
    match command {
        Command::Grade(value) => {
            if monitor.state().session.active_id().is_none() {
                return Outcome::Report("No active session; grade not sent".to_string());
            }
            monitor.set_grade(value);
            Outcome::Continue
        }
        Command::Session(id) => {
            let mut session = monitor.state().session;
            session.session_id = Some(id);
            monitor.set_session(session);
            Outcome::Continue
        }
        Command::EndSession => {
            monitor.clear_session();
            Outcome::Continue
        }
        Command::Sensitivity(value) => {
            monitor.set_sensitivity(value);
            Outcome::Continue
        }
        Command::Status => Outcome::Report(status_line(&monitor.state())),
        Command::Quit => Outcome::Quit,
    }
}

/// One-line summary of a state snapshot.
pub fn status_line(state: &MonitorState) -> String {
    let mut line = format!(
        "{} | level {:.1} ({}) [{}] | grade {:.1} ({})",
        state.status_message(),
        state.noise_level,
        state.color,
        state.alert.symbol(),
        state.grade.current_value,
        state.grade_status_text(),
    );
    if state.alert_active() {
        line.push_str(" | ");
        line.push_str(state.alert_message());
    }
    line
}
