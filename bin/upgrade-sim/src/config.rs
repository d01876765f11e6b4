use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context};
use serde::Deserialize;
use strata_upgrade_protocol::HandshakeConfig;

use crate::args::Args;

const DEFAULT_PARTICIPANTS: usize = 3;
const DEFAULT_CHANNEL_CAPACITY: usize = 16;
const DEFAULT_INITIAL_BALANCE: u64 = 1_000;

/// Logging configuration for the simulator.
#[derive(Debug, Clone, Deserialize, Default)]
pub(crate) struct LoggingConfig {
    /// Service label to append to the service name (e.g., "prod", "dev").
    pub service_label: Option<String>,

    /// Directory path for file-based logging.
    pub log_dir: Option<PathBuf>,

    /// Prefix for log file names (defaults to "upgrade-sim" if not set).
    pub log_file_prefix: Option<String>,

    /// Use JSON format for logs instead of compact format.
    pub json_format: Option<bool>,

    /// Extra filter directives, e.g. `strata_upgrade_protocol=debug`.
    #[serde(default)]
    pub directives: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SimulationConfig {
    /// Participants co-owning the state. Participant 0 instigates.
    #[serde(default = "default_participants")]
    pub participants: usize,

    /// Buffer size of each point-to-point channel.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Balance carried by the `token-v1` state being upgraded.
    #[serde(default = "default_initial_balance")]
    pub initial_balance: u64,
}

fn default_participants() -> usize {
    DEFAULT_PARTICIPANTS
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

fn default_initial_balance() -> u64 {
    DEFAULT_INITIAL_BALANCE
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            participants: DEFAULT_PARTICIPANTS,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            initial_balance: DEFAULT_INITIAL_BALANCE,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Config {
    pub handshake: HandshakeConfig,

    /// Logging configuration (optional).
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub simulation: SimulationConfig,
}

impl Config {
    pub(crate) fn from_toml_str(s: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(s).context("config: invalid TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub(crate) fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("config: cannot read {}", path.display()))?;
        Self::from_toml_str(&raw)
    }

    /// Loads the config named by the args and applies the CLI overrides.
    pub(crate) fn from_args(args: &Args) -> anyhow::Result<Self> {
        let mut config = Self::load(&args.config)?;
        if let Some(n) = args.participants {
            config.simulation.participants = n;
        }
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.simulation.participants == 0 {
            bail!("config: simulation needs at least one participant");
        }
        if self.simulation.channel_capacity == 0 {
            bail!("config: channel_capacity must be positive");
        }
        if self.handshake.peer_timeout_ms == 0 {
            bail!("config: peer_timeout_ms must be positive");
        }
        Ok(())
    }
}
