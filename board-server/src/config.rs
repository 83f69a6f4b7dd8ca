//! Server configuration, read from `BoardGoConfig.json` next to the binary.
//! A missing file means defaults; a malformed file is a startup error.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::server::ServerError;

pub const DEFAULT_CONFIG_PATH: &str = "BoardGoConfig.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    /// Host to bind. The LAN-facing address in production, loopback in tests.
    pub host: String,
    /// Port to bind; 0 picks an ephemeral port.
    pub port: u16,
    /// Seat cap, counting disconnected seats.
    pub max_players: usize,
    /// Cards dealt to each player at game start.
    pub hand_size: usize,
    /// The game ends once the round counter passes this.
    pub max_rounds: u32,
    /// Pins the shuffle, for reproducible games and tests.
    pub deck_seed: Option<u64>,
    /// Where to keep the durable session store. None disables persistence.
    pub store_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            max_players: 8,
            hand_size: 5,
            max_rounds: 3,
            deck_seed: None,
            store_path: None,
        }
    }
}

impl ServerConfig {
    /// Loads the configuration file, falling back to defaults when it does
    /// not exist.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ServerError> {
        let path = path.as_ref();
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "No config file, using defaults.");
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(ServerError::Config(format!(
                    "failed to read {}: {e}",
                    path.display()
                )))
            }
        };
        serde_json::from_str(&content).map_err(|e| {
            ServerError::Config(format!("failed to parse {}: {e}", path.display()))
        })
    }
}
