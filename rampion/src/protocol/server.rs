use std::io::{Read, Write};

use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::Identity;
use log::debug;
use zeroize::{Zeroize, Zeroizing};

use crate::group::{
    base_mult, decode_point, encode_point, fixed_generators, mult, random_scalar, POINT_LEN,
    SCALAR_LEN,
};
use crate::kdf::{derive_session_key, SessionKey};
use crate::msgs::{parse_setup, MsgType, Packet};
use crate::protocol::expect_msg_type;
use crate::storage::{CredentialStore, VerifyOutcome};
use crate::RampionError;

/// Progress of a server session through the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Init,
    HelloReceived,
    HelloSent,
    SetupReceived,
    Verified,
    Registered,
    Rejected,
    UReceived,
    VSent,
    KeyDerived,
    Aborted,
    Closed,
}

/// How the presented credential was authenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// The presented pair matched a stored record
    Verified,
    /// No record existed; the pair was stored, trust-on-first-use
    Registered,
}

/// Server side of one handshake, owning the connection and consulting a
/// [CredentialStore].
///
/// The client identity is learned from the peer's HELLO and doubles as
/// the storage lookup key. Secret state (`phi0`, the ephemeral `beta`,
/// and the held group elements) is wiped when the session is dropped,
/// whichever way it ends.
pub struct ServerSession<S, C> {
    stream: S,
    store: C,
    server_id: Vec<u8>,
    client_id: Vec<u8>,
    phi0: Scalar,
    c: RistrettoPoint,
    u: RistrettoPoint,
    v: RistrettoPoint,
    beta: Scalar,
    state: ServerState,
}

impl<S: Read + Write, C: CredentialStore> ServerSession<S, C> {
    pub fn new(stream: S, server_id: impl Into<Vec<u8>>, store: C) -> Self {
        Self {
            stream,
            store,
            server_id: server_id.into(),
            client_id: Vec::new(),
            phi0: Scalar::ZERO,
            c: RistrettoPoint::identity(),
            u: RistrettoPoint::identity(),
            v: RistrettoPoint::identity(),
            beta: Scalar::ZERO,
            state: ServerState::Init,
        }
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    /// The client identity announced in the peer's HELLO; empty until
    /// that message arrives
    pub fn client_id(&self) -> &[u8] {
        &self.client_id
    }

    /// Runs the handshake to completion and returns the session key plus
    /// how the credential was authenticated.
    ///
    /// On a credential mismatch the session sends CLOSE before aborting,
    /// so the peer can tell rejection from network failure. Every other
    /// failure aborts without CLOSE. Dropping the consumed session wipes
    /// all partial secrets.
    pub fn handshake(mut self) -> Result<(SessionKey, AuthOutcome), RampionError> {
        let result = self.run();
        if result.is_err() && self.state != ServerState::Closed {
            self.state = ServerState::Aborted;
        }
        result
    }

    fn run(&mut self) -> Result<(SessionKey, AuthOutcome), RampionError> {
        self.recv_hello()?;
        self.send_hello()?;
        self.recv_setup()?;
        let outcome = self.authenticate()?;
        self.recv_u()?;
        self.send_v()?;
        let key = self.derive_key()?;
        Ok((key, outcome))
    }

    fn recv_hello(&mut self) -> Result<(), RampionError> {
        let packet = Packet::read_from(&mut self.stream)?;
        expect_msg_type(&packet, MsgType::Hello)?;
        self.client_id = packet.payload;
        self.state = ServerState::HelloReceived;
        debug!("server: HELLO received");
        Ok(())
    }

    fn send_hello(&mut self) -> Result<(), RampionError> {
        Packet::hello(&self.server_id)?.write_to(&mut self.stream)?;
        self.state = ServerState::HelloSent;
        debug!("server: HELLO sent");
        Ok(())
    }

    fn recv_setup(&mut self) -> Result<(), RampionError> {
        let packet = Packet::read_from(&mut self.stream)?;
        expect_msg_type(&packet, MsgType::Setup)?;

        let (phi0, c) = parse_setup(&packet.payload)?;
        if phi0.len() != SCALAR_LEN || c.len() != POINT_LEN {
            return Err(RampionError::MalformedPacket("SETUP"));
        }

        let phi0_bytes: [u8; SCALAR_LEN] = phi0.try_into().expect("length checked above");
        // only the canonical encoding of a scalar may verify against a
        // stored record
        self.phi0 = Option::from(Scalar::from_canonical_bytes(phi0_bytes))
            .ok_or(RampionError::MalformedPacket("SETUP"))?;
        self.c = decode_point(c)?;

        self.state = ServerState::SetupReceived;
        debug!("server: SETUP received");
        Ok(())
    }

    fn authenticate(&mut self) -> Result<AuthOutcome, RampionError> {
        let phi0 = self.phi0.to_bytes();
        let c = encode_point(&self.c);

        match self.store.verify(&self.client_id, &phi0, &c)? {
            VerifyOutcome::Match => {
                self.state = ServerState::Verified;
                debug!("server: credential verified");
                Ok(AuthOutcome::Verified)
            }
            VerifyOutcome::NotFound => {
                self.store.store(&self.client_id, &phi0, &c)?;
                self.state = ServerState::Registered;
                debug!("server: credential registered");
                Ok(AuthOutcome::Registered)
            }
            VerifyOutcome::Mismatch => {
                self.state = ServerState::Rejected;
                Packet::close().write_to(&mut self.stream)?;
                self.state = ServerState::Closed;
                debug!("server: credential mismatch, CLOSE sent");
                Err(RampionError::CredentialMismatch)
            }
        }
    }

    fn recv_u(&mut self) -> Result<(), RampionError> {
        let packet = Packet::read_from(&mut self.stream)?;
        expect_msg_type(&packet, MsgType::U)?;
        RampionError::check_buffer_size(POINT_LEN, packet.payload.len())?;

        self.u = decode_point(&packet.payload)?;
        self.state = ServerState::UReceived;
        debug!("server: U received");
        Ok(())
    }

    fn send_v(&mut self) -> Result<(), RampionError> {
        let (_a, b) = fixed_generators();
        self.beta = random_scalar();
        self.v = base_mult(&self.beta)? + mult(&self.phi0, &b)?;

        Packet::v(&encode_point(&self.v)).write_to(&mut self.stream)?;
        self.state = ServerState::VSent;
        debug!("server: V sent");
        Ok(())
    }

    fn derive_key(&mut self) -> Result<SessionKey, RampionError> {
        let (a, _b) = fixed_generators();
        let t = Zeroizing::new(self.u - mult(&self.phi0, &a)?);
        let w = Zeroizing::new(mult(&self.beta, &t)?);
        let d = Zeroizing::new(mult(&self.beta, &self.c)?);

        let key = derive_session_key(
            &self.phi0,
            &self.client_id,
            &self.server_id,
            &self.u,
            &self.v,
            &w,
            &d,
        );
        self.state = ServerState::KeyDerived;
        debug!("server: session key derived");
        Ok(key)
    }
}

impl<S, C> Drop for ServerSession<S, C> {
    fn drop(&mut self) {
        self.phi0.zeroize();
        self.beta.zeroize();
        self.c.zeroize();
        self.u.zeroize();
        self.v.zeroize();
    }
}
