//! Configuration readable from a config file.
//!
//! The server supports reading its configuration from a TOML file; every
//! value can also be set or overridden on the command line.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct Rampion {
    /// socket address to listen on
    ///
    /// Example: `127.0.0.1:3333`
    #[serde(default = "default_listen")]
    pub listen: SocketAddr,

    /// identity this server announces in its HELLO
    pub server_id: String,

    /// directory holding one credential record per client identity
    pub storage_dir: PathBuf,

    /// path to the file which provided this configuration; added by
    /// [Rampion::load], not read from the TOML
    #[serde(skip)]
    pub config_file_path: PathBuf,
}

fn default_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3333))
}

impl Default for Rampion {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            server_id: String::new(),
            storage_dir: PathBuf::new(),
            config_file_path: PathBuf::new(),
        }
    }
}

impl Rampion {
    /// Loads configuration from a TOML file
    pub fn load<P: AsRef<Path>>(p: P) -> anyhow::Result<Self> {
        let p = p.as_ref();
        let raw = std::fs::read_to_string(p)
            .with_context(|| format!("could not read config file {p:?}"))?;
        let mut config: Self =
            toml::from_str(&raw).with_context(|| format!("could not parse config file {p:?}"))?;
        config.config_file_path = p.to_path_buf();
        Ok(config)
    }

    /// Checks that the configuration is complete enough to serve with
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(
            !self.server_id.is_empty(),
            "a server identity is required; set server_id in the config file or pass --id"
        );
        ensure!(
            !self.storage_dir.as_os_str().is_empty(),
            "a storage directory is required; set storage_dir in the config file or pass --storage-dir"
        );
        Ok(())
    }
}
