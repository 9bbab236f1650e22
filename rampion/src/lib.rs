pub mod app_server;
pub mod cli;
pub mod config;
pub mod group;
pub mod kdf;
pub mod msgs;
pub mod protocol;
pub mod storage;

#[derive(thiserror::Error, Debug)]
pub enum RampionError {
    #[error("transport failure during handshake")]
    Transport(#[from] std::io::Error),

    #[error("peer closed the handshake")]
    PeerClosed,

    #[error("invalid message type {0}")]
    InvalidMessageType(u8),

    #[error("expected {expected:?} message but received {got:?}")]
    UnexpectedType {
        expected: crate::msgs::MsgType,
        got: crate::msgs::MsgType,
    },

    #[error("buffer size mismatch, required {required_size} but found {actual_size}")]
    BufferSizeMismatch {
        required_size: usize,
        actual_size: usize,
    },

    #[error("payload of {0} bytes does not fit the 16 bit length field")]
    OversizedPayload(usize),

    #[error("malformed {0} payload")]
    MalformedPacket(&'static str),

    #[error("invalid group element")]
    InvalidPoint,

    #[error("missing key derivation input: {0}")]
    MissingDerivationInput(&'static str),

    #[error("credential store failure: {0}")]
    Storage(String),

    #[error("presented credential does not match the stored record")]
    CredentialMismatch,
}

impl RampionError {
    /// Helper function to check a buffer size
    fn check_buffer_size(required_size: usize, actual_size: usize) -> Result<(), Self> {
        if required_size != actual_size {
            Err(Self::BufferSizeMismatch {
                required_size,
                actual_size,
            })
        } else {
            Ok(())
        }
    }
}
