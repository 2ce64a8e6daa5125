//! `status` command.

use chrono::{Local, Utc};
use tracing::debug;

use timedonut_providers::google::AuthState;

use crate::app::App;
use crate::config::ClientConfig;
use crate::display::status_lines;
use crate::error::{ClientError, ClientResult};

/// Prints the signed-in account and token expiry.
///
/// A stored session is restored first, which refreshes the access token.
pub async fn status(config: &ClientConfig, json: bool, ephemeral: bool) -> ClientResult<()> {
    let state = match App::new(config.clone(), ephemeral) {
        Ok(app) => {
            app.session().restore_session().await?;
            app.session().auth_state()
        }
        Err(ClientError::Config(message)) => {
            debug!("not configured: {}", message);
            if !json {
                println!("Google credentials are not configured (run `timedonut auth`).");
                return Ok(());
            }
            AuthState::signed_out()
        }
        Err(e) => return Err(e),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        for line in status_lines(&state, Utc::now(), &Local) {
            println!("{}", line);
        }
    }
    Ok(())
}
