//! Command-line argument parsing for Meadow.

use std::path::PathBuf;

use clap::Parser;

use crate::Config;

/// Meadow command-line arguments.
///
/// CLI values override settings loaded from `config.ron`.
#[derive(Parser, Debug, Default)]
#[command(name = "meadow", about = "Meadow shared-world simulation")]
pub struct CliArgs {
    /// Room to join.
    #[arg(long)]
    pub room: Option<String>,

    /// Name announced to other peers.
    #[arg(long)]
    pub name: Option<String>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long)]
    pub log_level: Option<String>,

    /// Enable per-tick debug diagnostics.
    #[arg(long)]
    pub debug: bool,

    /// Path to config directory (overrides default location).
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Config {
    /// Apply CLI overrides to a loaded config.
    pub fn apply_cli_overrides(&mut self, args: &CliArgs) {
        if let Some(ref room) = args.room {
            self.network.room_id = room.clone();
        }
        if let Some(ref name) = args.name {
            self.network.display_name = name.clone();
        }
        if let Some(ref level) = args.log_level {
            self.debug.log_level = level.clone();
        }
        if args.debug {
            self.debug.debug_mode = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_override() {
        let mut config = Config::default();
        let args = CliArgs {
            room: Some("hollow".to_string()),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };
        config.apply_cli_overrides(&args);
        assert_eq!(config.network.room_id, "hollow");
        assert_eq!(config.debug.log_level, "debug");
        // Non-overridden fields retain defaults
        assert_eq!(config.network.display_name, "wanderer");
        assert!(!config.debug.debug_mode);
    }

    #[test]
    fn test_cli_no_override() {
        let original = Config::default();
        let mut config = Config::default();
        config.apply_cli_overrides(&CliArgs::default());
        assert_eq!(config, original);
    }

    #[test]
    fn test_cli_parses_flags() {
        let args = CliArgs::parse_from(["meadow", "--room", "glade", "--debug"]);
        assert_eq!(args.room.as_deref(), Some("glade"));
        assert!(args.debug);
        assert!(args.config.is_none());
    }
}
