use std::io::{Read, Write};

use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;
use log::debug;
use zeroize::{Zeroize, Zeroizing};

use crate::group::{
    base_mult, decode_point, encode_point, fixed_generators, mult, random_scalar, POINT_LEN,
};
use crate::kdf::{derive_phi, derive_session_key, SessionKey};
use crate::msgs::{MsgType, Packet};
use crate::protocol::expect_msg_type;
use crate::RampionError;

/// Progress of a client session through the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    Init,
    HelloSent,
    HelloReceived,
    SetupSent,
    USent,
    VReceived,
    KeyDerived,
    Aborted,
}

/// Client side of one handshake, owning the connection.
///
/// The server identity is learned from the peer's HELLO. All secret
/// state (password, the derived scalars, the ephemeral `alpha`, and the
/// held group elements) is wiped when the session is dropped, whichever
/// way it ends.
pub struct ClientSession<S> {
    stream: S,
    client_id: Vec<u8>,
    password: Zeroizing<Vec<u8>>,
    server_id: Vec<u8>,
    phi0: Scalar,
    phi1: Scalar,
    alpha: Scalar,
    u: RistrettoPoint,
    v: RistrettoPoint,
    state: ClientState,
}

impl<S: Read + Write> ClientSession<S> {
    pub fn new(stream: S, client_id: impl Into<Vec<u8>>, password: &[u8]) -> Self {
        Self {
            stream,
            client_id: client_id.into(),
            password: Zeroizing::new(password.to_vec()),
            server_id: Vec::new(),
            phi0: Scalar::ZERO,
            phi1: Scalar::ZERO,
            alpha: Scalar::ZERO,
            u: RistrettoPoint::identity(),
            v: RistrettoPoint::identity(),
            state: ClientState::Init,
        }
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    /// The server identity announced in the peer's HELLO; empty until
    /// that message arrives
    pub fn server_id(&self) -> &[u8] {
        &self.server_id
    }

    /// Runs the handshake to completion and returns the session key.
    ///
    /// Any transport, protocol, or crypto failure aborts the session at
    /// the current step; dropping the consumed session wipes all partial
    /// secrets.
    pub fn handshake(mut self) -> Result<SessionKey, RampionError> {
        let result = self.run();
        if result.is_err() {
            self.state = ClientState::Aborted;
        }
        result
    }

    fn run(&mut self) -> Result<SessionKey, RampionError> {
        self.send_hello()?;
        self.recv_hello()?;
        self.send_setup()?;
        self.send_u()?;
        self.recv_v()?;
        self.derive_key()
    }

    fn send_hello(&mut self) -> Result<(), RampionError> {
        Packet::hello(&self.client_id)?.write_to(&mut self.stream)?;
        self.state = ClientState::HelloSent;
        debug!("client: HELLO sent");
        Ok(())
    }

    fn recv_hello(&mut self) -> Result<(), RampionError> {
        let packet = Packet::read_from(&mut self.stream)?;
        expect_msg_type(&packet, MsgType::Hello)?;
        self.server_id = packet.payload;
        self.state = ClientState::HelloReceived;
        debug!("client: HELLO received");
        Ok(())
    }

    fn send_setup(&mut self) -> Result<(), RampionError> {
        let (phi0, phi1) = derive_phi(&self.password, &self.client_id, &self.server_id)?;
        self.phi0 = phi0;
        self.phi1 = phi1;

        let c = base_mult(&self.phi1)?;
        Packet::setup(self.phi0.as_bytes(), &encode_point(&c))?.write_to(&mut self.stream)?;
        self.state = ClientState::SetupSent;
        debug!("client: SETUP sent");
        Ok(())
    }

    fn send_u(&mut self) -> Result<(), RampionError> {
        let (a, _b) = fixed_generators();
        self.alpha = random_scalar();
        self.u = base_mult(&self.alpha)? + mult(&self.phi0, &a)?;

        Packet::u(&encode_point(&self.u)).write_to(&mut self.stream)?;
        self.state = ClientState::USent;
        debug!("client: U sent");
        Ok(())
    }

    fn recv_v(&mut self) -> Result<(), RampionError> {
        let packet = Packet::read_from(&mut self.stream)?;
        if packet.msg_type == MsgType::Close {
            // the server rejected the credential; distinguishable from
            // the connection simply going away
            debug!("client: CLOSE received");
            return Err(RampionError::PeerClosed);
        }
        expect_msg_type(&packet, MsgType::V)?;
        RampionError::check_buffer_size(POINT_LEN, packet.payload.len())?;

        self.v = decode_point(&packet.payload)?;
        self.state = ClientState::VReceived;
        debug!("client: V received");
        Ok(())
    }

    fn derive_key(&mut self) -> Result<SessionKey, RampionError> {
        let (_a, b) = fixed_generators();
        let t = Zeroizing::new(self.v - mult(&self.phi0, &b)?);
        let w = Zeroizing::new(mult(&self.alpha, &t)?);
        let d = Zeroizing::new(mult(&self.phi1, &t)?);

        let key = derive_session_key(
            &self.phi0,
            &self.client_id,
            &self.server_id,
            &self.u,
            &self.v,
            &w,
            &d,
        );
        self.state = ClientState::KeyDerived;
        debug!("client: session key derived");
        Ok(key)
    }
}

impl<S> Drop for ClientSession<S> {
    fn drop(&mut self) {
        self.phi0.zeroize();
        self.phi1.zeroize();
        self.alpha.zeroize();
        self.u.zeroize();
        self.v.zeroize();
    }
}
