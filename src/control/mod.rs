//! Text control surface for the voice changer.
//!
//! The binary reads one command per stdin line and turns it into a
//! [`ControlCommand`] with [`ControlCommand::parse`].  Commands map
//! one-to-one onto [`crate::pipeline::AudioPipeline`] operations, plus a few
//! informational ones.
//!
//! # Usage
//!
//! ```
//! use voice_shifter::control::ControlCommand;
//!
//! assert_eq!(ControlCommand::parse("start"), Ok(ControlCommand::Start));
//! assert_eq!(
//!     ControlCommand::parse("profile girl"),
//!     Ok(ControlCommand::Profile("girl".into()))
//! );
//! assert!(ControlCommand::parse("fly").is_err());
//! ```

use thiserror::Error;

// ---------------------------------------------------------------------------
// ControlCommand
// ---------------------------------------------------------------------------

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    Start,
    Stop,
    Toggle,
    /// Select the profile with this id.
    Profile(String),
    /// Print the registry.
    List,
    /// Print state, active profile and counters.
    Status,
    /// Print input and output device names.
    Devices,
    Help,
    Quit,
}

/// Why a line could not be parsed.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command: {0} (try `help`)")]
    Unknown(String),

    #[error("`{0}` needs a profile id, e.g. `{0} girl`")]
    MissingArgument(&'static str),

    #[error("`{command}` takes no arguments, got `{extra}`")]
    UnexpectedArgument {
        command: &'static str,
        extra: String,
    },
}

/// Help text printed for `help`.
pub const HELP: &str = "\
commands:
  start            open the microphone and speaker, begin shifting
  stop             stop and release the devices
  toggle           start if idle, stop otherwise
  profile <id>     select a voice profile (alias: use <id>)
  list             list voice profiles
  status           show state, active profile and counters
  devices          list audio input and output devices
  help             show this text
  quit             stop and exit";

impl ControlCommand {
    /// Parse a line.  Leading/trailing whitespace is ignored and the
    /// command word is case-insensitive; profile ids are lowercased.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let mut words = line.split_whitespace();
        let Some(head) = words.next() else {
            return Err(CommandError::Empty);
        };
        let head = head.to_ascii_lowercase();
        let rest: Vec<&str> = words.collect();

        let bare = |command: ControlCommand, name: &'static str| {
            if rest.is_empty() {
                Ok(command)
            } else {
                Err(CommandError::UnexpectedArgument {
                    command: name,
                    extra: rest.join(" "),
                })
            }
        };

        match head.as_str() {
            "start" => bare(ControlCommand::Start, "start"),
            "stop" => bare(ControlCommand::Stop, "stop"),
            "toggle" => bare(ControlCommand::Toggle, "toggle"),
            "list" | "ls" => bare(ControlCommand::List, "list"),
            "status" => bare(ControlCommand::Status, "status"),
            "devices" => bare(ControlCommand::Devices, "devices"),
            "help" | "?" => bare(ControlCommand::Help, "help"),
            "quit" | "exit" => bare(ControlCommand::Quit, "quit"),
            "profile" | "use" => {
                let name = if head == "use" { "use" } else { "profile" };
                match rest.as_slice() {
                    [] => Err(CommandError::MissingArgument(name)),
                    [id] => Ok(ControlCommand::Profile(id.to_ascii_lowercase())),
                    [_, extra @ ..] => Err(CommandError::UnexpectedArgument {
                        command: name,
                        extra: extra.join(" "),
                    }),
                }
            }
            _ => Err(CommandError::Unknown(head)),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bare_commands() {
        assert_eq!(ControlCommand::parse("start"), Ok(ControlCommand::Start));
        assert_eq!(ControlCommand::parse("  STOP \n"), Ok(ControlCommand::Stop));
        assert_eq!(ControlCommand::parse("toggle"), Ok(ControlCommand::Toggle));
        assert_eq!(ControlCommand::parse("ls"), Ok(ControlCommand::List));
        assert_eq!(ControlCommand::parse("status"), Ok(ControlCommand::Status));
        assert_eq!(ControlCommand::parse("devices"), Ok(ControlCommand::Devices));
        assert_eq!(ControlCommand::parse("?"), Ok(ControlCommand::Help));
        assert_eq!(ControlCommand::parse("exit"), Ok(ControlCommand::Quit));
    }

    #[test]
    fn parse_profile_and_alias() {
        assert_eq!(
            ControlCommand::parse("profile manbo"),
            Ok(ControlCommand::Profile("manbo".into()))
        );
        assert_eq!(
            ControlCommand::parse("use LOLI"),
            Ok(ControlCommand::Profile("loli".into()))
        );
    }

    #[test]
    fn profile_needs_exactly_one_id() {
        assert_eq!(
            ControlCommand::parse("profile"),
            Err(CommandError::MissingArgument("profile"))
        );
        assert_eq!(
            ControlCommand::parse("use girl loudly"),
            Err(CommandError::UnexpectedArgument {
                command: "use",
                extra: "loudly".into()
            })
        );
    }

    #[test]
    fn bare_commands_reject_arguments() {
        assert_eq!(
            ControlCommand::parse("start now please"),
            Err(CommandError::UnexpectedArgument {
                command: "start",
                extra: "now please".into()
            })
        );
    }

    #[test]
    fn parse_empty_and_unknown() {
        assert_eq!(ControlCommand::parse(""), Err(CommandError::Empty));
        assert_eq!(ControlCommand::parse("   "), Err(CommandError::Empty));
        assert_eq!(
            ControlCommand::parse("Fly"),
            Err(CommandError::Unknown("fly".into()))
        );
    }

    #[test]
    fn help_mentions_every_command() {
        for word in ["start", "stop", "toggle", "profile", "list", "status", "devices", "quit"] {
            assert!(HELP.contains(word), "help is missing {word}");
        }
    }
}
