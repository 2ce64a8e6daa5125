//! timedonut CLI entry point.

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing::Level;

use timedonut_client::cli::{Cli, Command, ConfigAction};
use timedonut_client::commands;
use timedonut_client::commands::auth::AuthOptions;
use timedonut_client::config::ClientConfig;
use timedonut_client::error::{ClientError, ClientResult};
use timedonut_core::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> ClientResult<()> {
    let config_path = cli.config.clone().unwrap_or_else(ClientConfig::default_path);
    let config = load_config(&config_path, cli.config.is_some())?;

    init_tracing(tracing_config(&cli, &config)?)?;

    match cli.command {
        Some(Command::Auth {
            client_id,
            client_secret,
            credentials_file,
            callback_port,
            force,
        }) => {
            let options = AuthOptions {
                client_id,
                client_secret,
                credentials_file,
                callback_port,
                force,
            };
            commands::auth::auth(options, &config, &config_path, cli.ephemeral).await
        }
        Some(Command::Signout) => commands::auth::signout(&config),
        Some(Command::Status { json }) => {
            commands::status::status(&config, json, cli.ephemeral).await
        }
        Some(Command::Events { json }) => {
            commands::events::events(&config, json, cli.ephemeral).await
        }
        Some(Command::Dial { top_hour, json }) => {
            commands::events::dial(&config, top_hour, json, cli.ephemeral).await
        }
        Some(Command::Watch {
            title_width,
            no_full_width,
        }) => commands::watch::watch(&config, title_width, no_full_width, cli.ephemeral).await,
        Some(Command::Config { action }) => match action {
            ConfigAction::Dump => commands::config::dump(&config, &config_path),
            ConfigAction::Validate => commands::config::validate(&config),
            ConfigAction::Path => commands::config::path(&config_path),
        },
        None => {
            println!("timedonut - Today's calendar as a countdown");
            println!();
            println!("Run 'timedonut --help' for usage information.");
            println!();
            println!("Quick start:");
            println!("  1. Sign in: timedonut auth --credentials-file <client_secret.json>");
            println!("  2. List today's events: timedonut events");
            println!("  3. Live status line: timedonut watch");
            Ok(())
        }
    }
}

/// An explicit `--config` must exist; the default file is optional.
fn load_config(path: &Path, explicit: bool) -> ClientResult<ClientConfig> {
    if explicit || path.exists() {
        ClientConfig::load_from(path).map_err(ClientError::Config)
    } else {
        Ok(ClientConfig::default())
    }
}

fn tracing_config(cli: &Cli, config: &ClientConfig) -> ClientResult<TracingConfig> {
    let mut tracing = if cli.debug || config.debug {
        TracingConfig::cli_debug()
    } else if matches!(cli.command, Some(Command::Watch { .. })) {
        // stdout carries the status line, so stay quiet on stderr by default.
        TracingConfig::watch().with_level(Level::WARN)
    } else {
        TracingConfig::default()
    };

    if let Some(format) = cli.log_format.as_ref().or(config.log_format.as_ref()) {
        tracing = tracing.with_format(format.parse().map_err(ClientError::Config)?);
    }
    Ok(tracing)
}
