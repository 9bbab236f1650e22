//! Wire framing for the handshake messages.
//!
//! Every message is a 3 byte header, `[length: u16 BE][type: u8]`,
//! followed by exactly `length` payload bytes:
//!
//! | Type  | Payload                                        |
//! |-------|------------------------------------------------|
//! | HELLO | identity bytes, no terminator                  |
//! | SETUP | `[phi0_len: u16 BE][phi0][c]`                  |
//! | U / V | one 32 byte point encoding                     |
//! | CLOSE | empty                                          |

use std::io::{ErrorKind, Read, Write};

use crate::group::POINT_LEN;
use crate::RampionError;

/// Size in bytes of the wire header
pub const HEADER_LEN: usize = 3;

/// Largest payload the 16 bit length field can describe
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

/// Recognized message types
#[repr(u8)]
#[derive(Hash, PartialEq, Eq, PartialOrd, Ord, Debug, Clone, Copy)]
pub enum MsgType {
    Hello = 0,
    Setup = 1,
    U = 2,
    V = 3,
    Close = 4,
}

impl TryFrom<u8> for MsgType {
    type Error = RampionError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => MsgType::Hello,
            1 => MsgType::Setup,
            2 => MsgType::U,
            3 => MsgType::V,
            4 => MsgType::Close,
            _ => return Err(RampionError::InvalidMessageType(value)),
        })
    }
}

/// One protocol message, header plus owned payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub msg_type: MsgType,
    pub payload: Vec<u8>,
}

impl Packet {
    /// Creates a packet, rejecting payloads the length field cannot
    /// describe
    pub fn new(msg_type: MsgType, payload: Vec<u8>) -> Result<Self, RampionError> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(RampionError::OversizedPayload(payload.len()));
        }
        Ok(Self { msg_type, payload })
    }

    /// HELLO carrying an identity
    pub fn hello(id: &[u8]) -> Result<Self, RampionError> {
        Self::new(MsgType::Hello, id.to_vec())
    }

    /// SETUP carrying the credential pair `(phi0, c)`
    pub fn setup(phi0: &[u8], c: &[u8]) -> Result<Self, RampionError> {
        let phi0_len =
            u16::try_from(phi0.len()).map_err(|_| RampionError::OversizedPayload(phi0.len()))?;
        let mut payload = Vec::with_capacity(2 + phi0.len() + c.len());
        payload.extend_from_slice(&phi0_len.to_be_bytes());
        payload.extend_from_slice(phi0);
        payload.extend_from_slice(c);
        Self::new(MsgType::Setup, payload)
    }

    /// U carrying the client share
    pub fn u(point: &[u8; POINT_LEN]) -> Self {
        Self {
            msg_type: MsgType::U,
            payload: point.to_vec(),
        }
    }

    /// V carrying the server share
    pub fn v(point: &[u8; POINT_LEN]) -> Self {
        Self {
            msg_type: MsgType::V,
            payload: point.to_vec(),
        }
    }

    /// CLOSE, sent by the server when it rejects a credential
    pub fn close() -> Self {
        Self {
            msg_type: MsgType::Close,
            payload: Vec::new(),
        }
    }

    /// Writes header and payload to `w` and flushes
    pub fn write_to<W: Write>(&self, w: &mut W) -> Result<(), RampionError> {
        let length = u16::try_from(self.payload.len())
            .map_err(|_| RampionError::OversizedPayload(self.payload.len()))?;
        let mut header = [0u8; HEADER_LEN];
        header[..2].copy_from_slice(&length.to_be_bytes());
        header[2] = self.msg_type as u8;
        w.write_all(&header)?;
        w.write_all(&self.payload)?;
        w.flush()?;
        Ok(())
    }

    /// Reads exactly one packet from `r`.
    ///
    /// Reads the 3 header bytes, then exactly `length` payload bytes,
    /// retrying on partial reads. A zero byte read or any I/O error is a
    /// transport failure; a short packet is never returned.
    pub fn read_from<R: Read>(r: &mut R) -> Result<Self, RampionError> {
        let mut header = [0u8; HEADER_LEN];
        read_exact_retrying(r, &mut header)?;

        let length = u16::from_be_bytes([header[0], header[1]]) as usize;
        let msg_type = MsgType::try_from(header[2])?;

        let mut payload = vec![0u8; length];
        read_exact_retrying(r, &mut payload)?;

        Ok(Self { msg_type, payload })
    }
}

fn read_exact_retrying<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<(), RampionError> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(std::io::Error::new(
                    ErrorKind::UnexpectedEof,
                    "connection closed mid-packet",
                )
                .into())
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Splits a SETUP payload into its `(phi0, c)` fields.
///
/// Fails if the payload is shorter than the 2 byte length prefix or if
/// the declared phi0 length exceeds the bytes present; never reads out of
/// bounds.
pub fn parse_setup(payload: &[u8]) -> Result<(&[u8], &[u8]), RampionError> {
    if payload.len() < 2 {
        return Err(RampionError::MalformedPacket("SETUP"));
    }
    let phi0_len = u16::from_be_bytes([payload[0], payload[1]]) as usize;
    let rest = &payload[2..];
    if phi0_len > rest.len() {
        return Err(RampionError::MalformedPacket("SETUP"));
    }
    Ok(rest.split_at(phi0_len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn round_trip(packet: Packet) -> Packet {
        let mut wire = Vec::new();
        packet.write_to(&mut wire).unwrap();
        Packet::read_from(&mut Cursor::new(wire)).unwrap()
    }

    #[test]
    fn hello_round_trips() {
        let pkt = Packet::hello(b"alice").unwrap();
        assert_eq!(round_trip(pkt.clone()), pkt);

        // identities are opaque bytes; empty is representable
        let empty = Packet::hello(b"").unwrap();
        assert_eq!(round_trip(empty).payload, b"");
    }

    #[test]
    fn setup_round_trips_and_parses() {
        let phi0 = [0x11u8; 32];
        let c = [0x22u8; 32];
        let pkt = round_trip(Packet::setup(&phi0, &c).unwrap());
        assert_eq!(pkt.msg_type, MsgType::Setup);

        let (got_phi0, got_c) = parse_setup(&pkt.payload).unwrap();
        assert_eq!(got_phi0, phi0);
        assert_eq!(got_c, c);
    }

    #[test]
    fn u_v_and_close_round_trip() {
        let point = [0x33u8; POINT_LEN];
        assert_eq!(round_trip(Packet::u(&point)).payload, point);
        assert_eq!(round_trip(Packet::v(&point)).payload, point);

        let close = round_trip(Packet::close());
        assert_eq!(close.msg_type, MsgType::Close);
        assert!(close.payload.is_empty());
    }

    #[test]
    fn maximum_payload_round_trips() {
        let pkt = Packet::new(MsgType::Hello, vec![0xaa; MAX_PAYLOAD_LEN]).unwrap();
        assert_eq!(round_trip(pkt).payload.len(), MAX_PAYLOAD_LEN);
    }

    #[test]
    fn oversized_payload_is_rejected() {
        assert!(matches!(
            Packet::new(MsgType::Hello, vec![0; MAX_PAYLOAD_LEN + 1]),
            Err(RampionError::OversizedPayload(_))
        ));
    }

    #[test]
    fn unknown_type_tag_is_rejected() {
        let wire = [0u8, 0, 9];
        assert!(matches!(
            Packet::read_from(&mut Cursor::new(wire)),
            Err(RampionError::InvalidMessageType(9))
        ));
    }

    #[test]
    fn truncated_packets_are_transport_errors() {
        // header cut short
        assert!(matches!(
            Packet::read_from(&mut Cursor::new([0u8, 5])),
            Err(RampionError::Transport(_))
        ));

        // payload shorter than the declared length
        let mut wire = Vec::new();
        Packet::hello(b"alice").unwrap().write_to(&mut wire).unwrap();
        wire.truncate(wire.len() - 2);
        assert!(matches!(
            Packet::read_from(&mut Cursor::new(wire)),
            Err(RampionError::Transport(_))
        ));
    }

    #[test]
    fn malformed_setup_payloads_are_rejected() {
        // shorter than the length prefix
        assert!(matches!(
            parse_setup(&[0x00]),
            Err(RampionError::MalformedPacket("SETUP"))
        ));

        // declared phi0 length exceeds the bytes present
        let mut payload = vec![0u8; 10];
        payload[..2].copy_from_slice(&9u16.to_be_bytes());
        assert!(matches!(
            parse_setup(&payload),
            Err(RampionError::MalformedPacket("SETUP"))
        ));

        // boundary: phi0 takes everything, c is empty
        let mut payload = vec![0u8; 10];
        payload[..2].copy_from_slice(&8u16.to_be_bytes());
        let (phi0, c) = parse_setup(&payload).unwrap();
        assert_eq!(phi0.len(), 8);
        assert!(c.is_empty());
    }
}
