//! The client and server handshake state machines.
//!
//! A session owns one connection and drives the four-message exchange
//! (HELLO both ways, SETUP, U, V) to a shared session key. Both sides
//! reach the same key iff they used the same password and identities:
//! the client's `t = v - b^phi0` and the server's `t = u - a^phi0` both
//! equal the peer's bare ephemeral share, so `w = g^(alpha*beta)` and
//! `d = g^(beta*phi1)` agree on both ends.
//!
//! Every failure aborts the session; secret-bearing state is wiped on
//! every exit path, success or not.

mod client;
mod server;
#[cfg(test)]
mod test;

pub use crate::kdf::SessionKey;
pub use client::{ClientSession, ClientState};
pub use server::{AuthOutcome, ServerSession, ServerState};

use crate::msgs::{MsgType, Packet};
use crate::RampionError;

pub(crate) fn expect_msg_type(packet: &Packet, expected: MsgType) -> Result<(), RampionError> {
    if packet.msg_type != expected {
        return Err(RampionError::UnexpectedType {
            expected,
            got: packet.msg_type,
        });
    }
    Ok(())
}
