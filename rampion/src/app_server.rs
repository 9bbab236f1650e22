//! The listening side of the application: accept loop and per-connection
//! session threads.
//!
//! Each accepted connection moves an owned stream, a copy of the server
//! identity, and a handle to the credential store into its own thread;
//! sessions share nothing else. A failed session only ends that one
//! connection, never the loop.

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::protocol::{AuthOutcome, ServerSession};
use crate::storage::CredentialStore;

#[derive(Debug)]
pub struct AppServer<C> {
    listener: TcpListener,
    server_id: Vec<u8>,
    store: Arc<C>,
}

impl<C: CredentialStore + Send + Sync + 'static> AppServer<C> {
    pub fn bind(addr: SocketAddr, server_id: Vec<u8>, store: Arc<C>) -> Result<Self> {
        let listener =
            TcpListener::bind(addr).with_context(|| format!("could not bind {addr}"))?;
        Ok(Self {
            listener,
            server_id,
            store,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accepts connections forever, one session thread per connection
    pub fn run(&self) -> Result<()> {
        info!("listening on {}", self.local_addr()?);
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    self.spawn_session(stream, peer);
                }
                Err(e) => warn!("could not accept connection: {e}"),
            }
        }
    }

    /// Accepts a single connection and handles it on its own thread
    pub fn accept_one(&self) -> Result<thread::JoinHandle<()>> {
        let (stream, peer) = self.listener.accept().context("could not accept connection")?;
        Ok(self.spawn_session(stream, peer))
    }

    fn spawn_session(&self, stream: TcpStream, peer: SocketAddr) -> thread::JoinHandle<()> {
        let server_id = self.server_id.clone();
        let store = Arc::clone(&self.store);
        thread::spawn(move || handle_connection(stream, peer, server_id, store))
    }
}

fn handle_connection<C: CredentialStore>(
    stream: TcpStream,
    peer: SocketAddr,
    server_id: Vec<u8>,
    store: Arc<C>,
) {
    info!("{peer}: connection accepted");
    match ServerSession::new(stream, server_id, store).handshake() {
        Ok((_key, AuthOutcome::Verified)) => {
            info!("{peer}: key exchange complete, credential verified");
        }
        Ok((_key, AuthOutcome::Registered)) => {
            info!("{peer}: key exchange complete, new credential registered");
        }
        Err(e) => warn!("{peer}: handshake aborted: {e}"),
    }
}
