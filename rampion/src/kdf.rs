//! The two hash based derivation functions of the handshake.
//!
//! [derive_phi] turns the password and the two identities into the scalar
//! pair `(phi0, phi1)`; [derive_session_key] turns the finished transcript
//! into the 32 byte session key. Both hash the plain concatenation of
//! their inputs with SHA-512, without length delimiters between fields;
//! that encoding is part of the credential format and must not change, or
//! every stored record and derived key changes with it.

use curve25519_dalek::ristretto::RistrettoPoint;
use curve25519_dalek::scalar::Scalar;
use rampion_secret_memory::Secret;
use sha2::{Digest, Sha512};
use zeroize::Zeroize;

use crate::group::encode_point;
use crate::RampionError;

/// Size in bytes of a derived session key
pub const KEY_LEN: usize = 32;

/// The secret session key produced by a completed handshake
pub type SessionKey = Secret<KEY_LEN>;

/// Derives the scalar pair `(phi0, phi1)` from the password and the two
/// identities.
///
/// SHA-512 over `password || client_id || server_id`, digest split into
/// two 32 byte halves, each reduced modulo the group order. Deterministic;
/// fails if any input is empty.
pub fn derive_phi(
    password: &[u8],
    client_id: &[u8],
    server_id: &[u8],
) -> Result<(Scalar, Scalar), RampionError> {
    if password.is_empty() {
        return Err(RampionError::MissingDerivationInput("password"));
    }
    if client_id.is_empty() {
        return Err(RampionError::MissingDerivationInput("client id"));
    }
    if server_id.is_empty() {
        return Err(RampionError::MissingDerivationInput("server id"));
    }

    let mut hasher = Sha512::new();
    hasher.update(password);
    hasher.update(client_id);
    hasher.update(server_id);
    let mut digest = [0u8; 64];
    digest.copy_from_slice(&hasher.finalize());

    let mut half = [0u8; 32];
    half.copy_from_slice(&digest[..32]);
    let phi0 = Scalar::from_bytes_mod_order(half);
    half.copy_from_slice(&digest[32..]);
    let phi1 = Scalar::from_bytes_mod_order(half);

    digest.zeroize();
    half.zeroize();

    Ok((phi0, phi1))
}

/// Derives the session key from the transcript.
///
/// SHA-512 over `phi0 || client_id || server_id || u || v || w || d` with
/// the group elements in their 32 byte encodings; the first 32 bytes of
/// the digest become the key.
pub fn derive_session_key(
    phi0: &Scalar,
    client_id: &[u8],
    server_id: &[u8],
    u: &RistrettoPoint,
    v: &RistrettoPoint,
    w: &RistrettoPoint,
    d: &RistrettoPoint,
) -> SessionKey {
    let mut hasher = Sha512::new();
    hasher.update(phi0.as_bytes());
    hasher.update(client_id);
    hasher.update(server_id);
    hasher.update(encode_point(u));
    hasher.update(encode_point(v));
    hasher.update(encode_point(w));
    hasher.update(encode_point(d));
    let mut digest = [0u8; 64];
    digest.copy_from_slice(&hasher.finalize());

    let key = SessionKey::from_slice(&digest[..KEY_LEN]);
    digest.zeroize();
    key
}
