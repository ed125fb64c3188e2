//! Line commands for the interactive view.

use std::str::FromStr;

use ikviz::model::{Axis, Sign};
use thiserror::Error;

pub const HELP: &str = "\
commands:
  x|y|z <text>        edit a target coordinate (invalid text keeps the last value)
  nudge <axis> +|-    move an axis by one input step
  step <value>        pick the input step
  arm 1|-1            right / left arm
  elbow 1|-1          elbow up / down
  config <label>      configuration label (unit profiles)
  send                ask the solver for a solution
  show                print status and results
  scene               print the derived scene as JSON
  connect             (re)connect to the solver
  disconnect          close the connection
  help                this text
  quit                leave";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    SetAxis(Axis, String),
    Nudge(Axis, Sign),
    Step(f64),
    Arm(Sign),
    Elbow(Sign),
    Config(String),
    Send,
    Show,
    Scene,
    Connect,
    Disconnect,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '{0}' (try 'help')")]
    Unknown(String),
    #[error("'{command}' needs {expected}")]
    MissingArgument {
        command: &'static str,
        expected: &'static str,
    },
    #[error("'{command}': {reason}")]
    Invalid {
        command: &'static str,
        reason: String,
    },
}

impl FromStr for Command {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((w, r)) => (w, r.trim()),
            None => (line, ""),
        };

        match word.to_ascii_lowercase().as_str() {
            "" => Err(ParseError::Empty),
            "x" => Ok(Command::SetAxis(Axis::X, rest.to_string())),
            "y" => Ok(Command::SetAxis(Axis::Y, rest.to_string())),
            "z" => Ok(Command::SetAxis(Axis::Z, rest.to_string())),
            "nudge" => {
                let mut parts = rest.split_whitespace();
                let (Some(axis), Some(dir)) = (parts.next(), parts.next()) else {
                    return Err(ParseError::MissingArgument {
                        command: "nudge",
                        expected: "an axis and + or -",
                    });
                };
                let axis = axis.parse().map_err(|reason| invalid("nudge", reason))?;
                let dir = dir.parse().map_err(|reason| invalid("nudge", reason))?;
                Ok(Command::Nudge(axis, dir))
            }
            "step" => {
                let value = required(rest, "step", "a step size")?;
                value
                    .parse::<f64>()
                    .map(Command::Step)
                    .map_err(|e| invalid("step", e.to_string()))
            }
            "arm" => sign_arg(rest, "arm").map(Command::Arm),
            "elbow" => sign_arg(rest, "elbow").map(Command::Elbow),
            "config" => Ok(Command::Config(
                required(rest, "config", "a label")?.to_string(),
            )),
            "send" | "solve" => Ok(Command::Send),
            "show" | "status" => Ok(Command::Show),
            "scene" => Ok(Command::Scene),
            "connect" | "reconnect" => Ok(Command::Connect),
            "disconnect" => Ok(Command::Disconnect),
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" | "q" => Ok(Command::Quit),
            _ => Err(ParseError::Unknown(word.to_string())),
        }
    }
}

fn required<'a>(
    rest: &'a str,
    command: &'static str,
    expected: &'static str,
) -> Result<&'a str, ParseError> {
    if rest.is_empty() {
        Err(ParseError::MissingArgument { command, expected })
    } else {
        Ok(rest)
    }
}

fn sign_arg(rest: &str, command: &'static str) -> Result<Sign, ParseError> {
    required(rest, command, "1 or -1")?
        .parse()
        .map_err(|reason| invalid(command, reason))
}

fn invalid(command: &'static str, reason: String) -> ParseError {
    ParseError::Invalid { command, reason }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Result<Command, ParseError> {
        s.parse()
    }

    #[test]
    fn axis_edits_keep_raw_text() {
        assert_eq!(
            parse("x -149.09").unwrap(),
            Command::SetAxis(Axis::X, "-149.09".into())
        );
        assert_eq!(parse("Z  abc ").unwrap(), Command::SetAxis(Axis::Z, "abc".into()));
        assert_eq!(parse("y").unwrap(), Command::SetAxis(Axis::Y, String::new()));
    }

    #[test]
    fn nudge_and_selectors() {
        assert_eq!(
            parse("nudge x +").unwrap(),
            Command::Nudge(Axis::X, Sign::Positive)
        );
        assert_eq!(
            parse("nudge z -").unwrap(),
            Command::Nudge(Axis::Z, Sign::Negative)
        );
        assert_eq!(parse("arm -1").unwrap(), Command::Arm(Sign::Negative));
        assert_eq!(parse("elbow 1").unwrap(), Command::Elbow(Sign::Positive));
        assert_eq!(parse("step 0.1").unwrap(), Command::Step(0.1));
        assert_eq!(
            parse("config elbow_left").unwrap(),
            Command::Config("elbow_left".into())
        );
    }

    #[test]
    fn bare_words() {
        assert_eq!(parse("send").unwrap(), Command::Send);
        assert_eq!(parse("SHOW").unwrap(), Command::Show);
        assert_eq!(parse("quit").unwrap(), Command::Quit);
        assert_eq!(parse("reconnect").unwrap(), Command::Connect);
    }

    #[test]
    fn errors() {
        assert_eq!(parse("   "), Err(ParseError::Empty));
        assert!(matches!(parse("jump"), Err(ParseError::Unknown(w)) if w == "jump"));
        assert!(matches!(
            parse("nudge x"),
            Err(ParseError::MissingArgument { command: "nudge", .. })
        ));
        assert!(matches!(
            parse("nudge w +"),
            Err(ParseError::Invalid { command: "nudge", .. })
        ));
        assert!(matches!(
            parse("arm 2"),
            Err(ParseError::Invalid { command: "arm", .. })
        ));
        assert!(matches!(
            parse("step fast"),
            Err(ParseError::Invalid { command: "step", .. })
        ));
        assert!(matches!(parse("config"), Err(ParseError::MissingArgument { .. })));
    }
}
