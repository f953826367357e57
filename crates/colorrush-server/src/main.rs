use std::str::FromStr;

use colorrush::prelude::*;
use tracing_subscriber::EnvFilter;

// ---------------------------------------------------------------------------
// Environment configuration
// ---------------------------------------------------------------------------

const BIND_VAR: &str = "COLORRUSH_BIND";
const MAX_PLAYERS_VAR: &str = "COLORRUSH_MAX_PLAYERS";
const QUIZ_LENGTH_VAR: &str = "COLORRUSH_QUIZ_LENGTH";

/// Builds the server configuration from a variable lookup, keeping the
/// default for anything unset, unparsable, or out of range.
fn config_from(lookup: impl Fn(&str) -> Option<String>) -> ServerConfig {
    let mut config = ServerConfig::default();
    if let Some(bind) = lookup(BIND_VAR).filter(|v| !v.trim().is_empty()) {
        config.bind_addr = bind.trim().to_string();
    }
    if let Some(max) = parse_var(&lookup, MAX_PLAYERS_VAR) {
        override_room(&mut config.room, MAX_PLAYERS_VAR, |room| room.max_players = max);
    }
    if let Some(len) = parse_var(&lookup, QUIZ_LENGTH_VAR) {
        override_room(&mut config.room, QUIZ_LENGTH_VAR, |room| room.quiz_length = len);
    }
    config
}

/// Applies one override, unless the result is a config no round could
/// be played under.
fn override_room(room: &mut RoomConfig, var: &str, apply: impl FnOnce(&mut RoomConfig)) {
    let mut candidate = room.clone();
    apply(&mut candidate);
    match candidate.validate() {
        Ok(()) => *room = candidate,
        Err(error) => tracing::warn!(var, %error, "ignoring out-of-range value"),
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(var = name, value = %raw, "ignoring unparsable value");
            None
        }
    }
}

// ---------------------------------------------------------------------------
// Server bootstrap
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = config_from(|name| std::env::var(name).ok());
    tracing::info!(
        bind = %config.bind_addr,
        max_players = config.room.max_players,
        quiz_length = config.room.quiz_length,
        "starting colorrush server"
    );

    let server = ColorRushServerBuilder::new().config(config).build().await?;
    server
        .run_until(async {
            if let Err(error) = tokio::signal::ctrl_c().await {
                tracing::error!(%error, "failed to listen for shutdown signal");
            }
        })
        .await?;
    Ok(())
}
