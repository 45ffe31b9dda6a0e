//! `-v` / `VIDTUBE_LOG_LEVEL`: repeat the flag (`-vvv`) or name a level.

use clap::{Arg, ArgAction, Command, builder::ValueParser};
use tracing::Level;

pub const ARG_VERBOSITY: &str = "verbosity";

// Index is the verbosity count the name stands for.
const LEVEL_NAMES: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(|raw: &str| -> Result<u8, String> {
        let raw = raw.trim();
        if let Ok(count) = raw.parse::<u8>() {
            if usize::from(count) < LEVEL_NAMES.len() {
                return Ok(count);
            }
        }
        LEVEL_NAMES
            .iter()
            .position(|name| name.eq_ignore_ascii_case(raw))
            .and_then(|index| u8::try_from(index).ok())
            .ok_or_else(|| {
                format!(
                    "invalid log level `{raw}`, expected 0-4 or one of: {}",
                    LEVEL_NAMES.join(", ")
                )
            })
    })
}

/// Tracing level for a verbosity count; `None` keeps the errors-only default.
#[must_use]
pub const fn level(verbosity: u8) -> Option<Level> {
    match verbosity {
        0 => None,
        1 => Some(Level::WARN),
        2 => Some(Level::INFO),
        3 => Some(Level::DEBUG),
        _ => Some(Level::TRACE),
    }
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Log verbosity: -v warn, -vv info, -vvv debug, -vvvv trace (default: error)")
            .env("VIDTUBE_LOG_LEVEL")
            .global(true)
            .action(ArgAction::Count)
            .value_parser(validator_log_level()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<Option<u8>, clap::Error> {
        temp_env::with_var("VIDTUBE_LOG_LEVEL", Some(raw), || {
            with_args(Command::new("vidtube"))
                .try_get_matches_from(["vidtube"])
                .map(|matches| matches.get_one::<u8>(ARG_VERBOSITY).copied())
        })
    }

    #[test]
    fn names_and_counts_parse() {
        assert_eq!(parse("error").ok().flatten(), Some(0));
        assert_eq!(parse("DEBUG").ok().flatten(), Some(3));
        assert_eq!(parse(" trace ").ok().flatten(), Some(4));
        assert_eq!(parse("2").ok().flatten(), Some(2));
    }

    #[test]
    fn unknown_levels_are_rejected() {
        assert!(parse("loud").is_err());
        assert!(parse("5").is_err());
    }

    #[test]
    fn counts_map_to_levels() {
        assert_eq!(level(0), None);
        assert_eq!(level(1), Some(Level::WARN));
        assert_eq!(level(3), Some(Level::DEBUG));
        assert_eq!(level(9), Some(Level::TRACE));
    }
}
