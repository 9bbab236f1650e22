//! Contains the code used to parse command line parameters.
//!
//! The two subcommands map to the two roles of the protocol: `serve`
//! runs the accept loop with a file-backed credential store, `connect`
//! performs one client handshake and emits the derived session key.

use std::net::{SocketAddr, TcpStream};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgGroup, Args, Parser, Subcommand};
use log::info;
use zeroize::Zeroizing;

use crate::app_server::AppServer;
use crate::config;
use crate::protocol::ClientSession;
use crate::storage::FsCredentialStore;

/// Command line arguments to the rampion binary.
///
/// Used for parsing with [clap].
#[derive(Parser, Debug)]
#[command(author, version, about, arg_required_else_help = true)]
pub struct Cli {
    /// Lowest log level to show
    #[arg(long = "log-level", value_name = "LOG_LEVEL", group = "log-level")]
    log_level: Option<log::LevelFilter>,

    /// Show verbose log output – sets log level to "debug"
    #[arg(short, long, group = "log-level")]
    verbose: bool,

    /// Show no log output – sets log level to "error"
    #[arg(short, long, group = "log-level")]
    quiet: bool,

    /// The subcommand to be invoked
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// The log level filter selected by the command line
    ///
    /// The clap argument group ensures at most one of the log level
    /// arguments is present.
    pub fn log_level(&self) -> log::LevelFilter {
        if self.verbose {
            log::LevelFilter::Debug
        } else if self.quiet {
            log::LevelFilter::Error
        } else {
            self.log_level.unwrap_or(log::LevelFilter::Info)
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Accept connections and answer handshakes
    Serve(Serve),
    /// Run one handshake against a server and emit the session key
    Connect(Connect),
}

#[derive(Args, Debug)]
pub struct Serve {
    /// Path to a TOML configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Socket address to listen on; overrides the config file
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<SocketAddr>,

    /// Identity announced to clients; overrides the config file
    #[arg(long, value_name = "ID")]
    pub id: Option<String>,

    /// Directory holding the credential records; overrides the config file
    #[arg(long, value_name = "DIR")]
    pub storage_dir: Option<PathBuf>,
}

impl Serve {
    pub fn run(self) -> Result<()> {
        let mut config = match &self.config {
            Some(path) => config::Rampion::load(path)?,
            None => config::Rampion::default(),
        };
        self.apply_to_config(&mut config);
        config.validate()?;

        let store = Arc::new(FsCredentialStore::open(&config.storage_dir)?);
        let server = AppServer::bind(config.listen, config.server_id.into_bytes(), store)?;
        server.run()
    }

    fn apply_to_config(&self, config: &mut config::Rampion) {
        if let Some(listen) = self.listen {
            config.listen = listen;
        }
        if let Some(id) = &self.id {
            config.server_id.clone_from(id);
        }
        if let Some(dir) = &self.storage_dir {
            config.storage_dir.clone_from(dir);
        }
    }
}

#[derive(Args, Debug)]
#[command(group = ArgGroup::new("password-source").required(true))]
pub struct Connect {
    /// Server address to connect to, e.g. 127.0.0.1:3333
    #[arg(value_name = "ADDR")]
    pub addr: String,

    /// Identity to announce to the server
    #[arg(long, value_name = "ID")]
    pub id: String,

    /// The password, given directly on the command line
    #[arg(long, value_name = "PASSWORD", group = "password-source")]
    pub password: Option<String>,

    /// Read the password from a file instead; a trailing newline is
    /// ignored
    #[arg(long, value_name = "FILE", group = "password-source")]
    pub password_file: Option<PathBuf>,

    /// Write the session key to this file as hex instead of printing it
    #[arg(long, value_name = "FILE")]
    pub key_out: Option<PathBuf>,
}

impl Connect {
    pub fn run(self) -> Result<()> {
        let password = self.read_password()?;

        let stream = TcpStream::connect(&self.addr)
            .with_context(|| format!("could not connect to {}", self.addr))?;
        let session = ClientSession::new(stream, self.id.clone().into_bytes(), password.as_slice());
        let key = session.handshake().context("handshake failed")?;
        info!("session key established with {}", self.addr);

        let hex_key = Zeroizing::new(hex::encode(key.secret()));
        match &self.key_out {
            Some(path) => std::fs::write(path, format!("{}\n", *hex_key))
                .with_context(|| format!("could not write session key to {path:?}"))?,
            None => println!("{}", *hex_key),
        }
        Ok(())
    }

    fn read_password(&self) -> Result<Zeroizing<Vec<u8>>> {
        if let Some(password) = &self.password {
            return Ok(Zeroizing::new(password.clone().into_bytes()));
        }
        let path = self
            .password_file
            .as_ref()
            .expect("clap guarantees one password source");
        let mut raw = std::fs::read(path)
            .with_context(|| format!("could not read password file {path:?}"))?;
        while raw.last().is_some_and(|b| *b == b'\n' || *b == b'\r') {
            raw.pop();
        }
        Ok(Zeroizing::new(raw))
    }
}
