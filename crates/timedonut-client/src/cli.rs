//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// timedonut - Today's Google Calendar as a countdown
#[derive(Debug, Parser)]
#[command(name = "timedonut")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "TIMEDONUT_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    /// Log format (pretty, compact, json)
    #[arg(long, env = "TIMEDONUT_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Sign in for this run only and keep tokens in memory; the token store
    /// is not touched
    #[arg(long, global = true)]
    pub ephemeral: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in to Google Calendar in the browser
    Auth {
        /// OAuth client ID (from Google Cloud Console)
        #[arg(long, env = "GOOGLE_CLIENT_ID")]
        client_id: Option<String>,

        /// OAuth client secret (from Google Cloud Console)
        #[arg(long, env = "GOOGLE_CLIENT_SECRET")]
        client_secret: Option<String>,

        /// Path to Google Cloud Console credentials JSON file
        ///
        /// Alternative to providing client_id and client_secret separately.
        #[arg(long, env = "GOOGLE_CREDENTIALS_FILE")]
        credentials_file: Option<PathBuf>,

        /// Loopback port for the OAuth redirect
        #[arg(long)]
        callback_port: Option<u16>,

        /// Sign in again even if a session is stored
        #[arg(long, short)]
        force: bool,
    },

    /// Forget the stored session
    Signout,

    /// Show the signed-in account and token expiry
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List today's and tomorrow's events with their countdown
    Events {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the 24-hour dial: event arcs, clock hand and centre label
    Dial {
        /// Hour drawn at the top of the dial (0-23)
        #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u32).range(0..24))]
        top_hour: u32,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run the status line in the terminal until interrupted
    Watch {
        /// Title window width in characters
        #[arg(long)]
        title_width: Option<usize>,

        /// Keep ASCII titles as-is instead of full-width glyphs
        #[arg(long)]
        no_full_width: bool,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_dial() {
        let cli = Cli::try_parse_from(["timedonut", "dial", "--top-hour", "6"]).unwrap();
        assert!(matches!(cli.command, Some(Command::Dial { top_hour: 6, .. })));
        assert!(Cli::try_parse_from(["timedonut", "dial", "--top-hour", "24"]).is_err());
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["timedonut", "events", "--ephemeral", "-v"]).unwrap();
        assert!(cli.ephemeral);
        assert!(cli.debug);
    }
}
