use std::{env, path::PathBuf};

use argh::FromArgs;

/// Configs overridable by environment.
#[derive(Debug, Clone)]
pub(crate) struct EnvArgs {
    /// Service label to include in service name
    pub service_label: Option<String>,
}

impl EnvArgs {
    pub(crate) fn from_env() -> Self {
        Self {
            service_label: env::var("STRATA_UPGRADE_SVC_LABEL").ok(),
        }
    }
}

#[derive(Debug, Clone, FromArgs)]
#[argh(description = "Runs a contract state upgrade handshake between in-process participants")]
pub(crate) struct Args {
    #[argh(option, short = 'c', description = "path to the TOML config")]
    pub config: PathBuf,

    #[argh(
        option,
        short = 'n',
        description = "number of participants, overriding the config"
    )]
    pub participants: Option<usize>,
}
