//! ristretto255 group operations for the handshake.
//!
//! Everything here is pure except [random_scalar]. Points coming off the
//! wire or out of storage go through [decode_point], which rejects
//! non-canonical encodings and the identity; multiplications whose result
//! would be the identity are rejected as well, so an invalid element can
//! never silently flow into the transcript.

use curve25519_dalek::ristretto::{CompressedRistretto, RistrettoPoint};
use curve25519_dalek::scalar::Scalar;
use curve25519_dalek::traits::IsIdentity;
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use sha2::{Digest, Sha512};

use crate::RampionError;

/// Size in bytes of an encoded group element
pub const POINT_LEN: usize = 32;
/// Size in bytes of an encoded scalar
pub const SCALAR_LEN: usize = 32;

const GENERATOR_A_LABEL: &[u8] = b"pake_ristretto_a";
const GENERATOR_B_LABEL: &[u8] = b"pake_ristretto_b";

lazy_static! {
    static ref FIXED_GENERATORS: (RistrettoPoint, RistrettoPoint) = (
        generator_from_label(GENERATOR_A_LABEL),
        generator_from_label(GENERATOR_B_LABEL),
    );
}

fn generator_from_label(label: &[u8]) -> RistrettoPoint {
    let mut digest = [0u8; 64];
    digest.copy_from_slice(&Sha512::digest(label));
    RistrettoPoint::from_uniform_bytes(&digest)
}

/// The two fixed group elements `(a, b)` used to blind the ephemeral
/// shares.
///
/// Derived from distinct ASCII labels by hashing with SHA-512 and mapping
/// the digest into the group, so every process arrives at bit-identical
/// values without any exchange over the wire.
pub fn fixed_generators() -> (RistrettoPoint, RistrettoPoint) {
    *FIXED_GENERATORS
}

/// Samples a uniformly random non-zero scalar from a cryptographically
/// secure source
pub fn random_scalar() -> Scalar {
    loop {
        let s = Scalar::random(&mut OsRng);
        if s != Scalar::ZERO {
            return s;
        }
    }
}

/// Computes `g^s` for the group base point `g`
///
/// Fails if the result is the identity, i.e. if `s` is zero.
pub fn base_mult(s: &Scalar) -> Result<RistrettoPoint, RampionError> {
    let p = RistrettoPoint::mul_base(s);
    if p.is_identity() {
        return Err(RampionError::InvalidPoint);
    }
    Ok(p)
}

/// Computes `p^s`
///
/// Fails if the result is the identity. Invalid encodings never reach this
/// function; [decode_point] rejects them first.
pub fn mult(s: &Scalar, p: &RistrettoPoint) -> Result<RistrettoPoint, RampionError> {
    let r = p * s;
    if r.is_identity() {
        return Err(RampionError::InvalidPoint);
    }
    Ok(r)
}

/// Decodes a group element from its 32 byte wire encoding
///
/// Rejects anything that is not a canonical encoding of a valid
/// non-identity element.
pub fn decode_point(bytes: &[u8]) -> Result<RistrettoPoint, RampionError> {
    let compressed =
        CompressedRistretto::from_slice(bytes).map_err(|_| RampionError::InvalidPoint)?;
    let point = compressed.decompress().ok_or(RampionError::InvalidPoint)?;
    if point.is_identity() {
        return Err(RampionError::InvalidPoint);
    }
    Ok(point)
}

/// Encodes a group element into its 32 byte wire encoding
pub fn encode_point(p: &RistrettoPoint) -> [u8; POINT_LEN] {
    p.compress().to_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_generators_are_deterministic_and_distinct() {
        let (a1, b1) = fixed_generators();
        let (a2, b2) = fixed_generators();
        assert_eq!(encode_point(&a1), encode_point(&a2));
        assert_eq!(encode_point(&b1), encode_point(&b2));
        assert_ne!(encode_point(&a1), encode_point(&b1));
        assert!(!a1.is_identity());
        assert!(!b1.is_identity());

        // the derivation must not depend on memoization state
        assert_eq!(
            encode_point(&generator_from_label(GENERATOR_A_LABEL)),
            encode_point(&a1)
        );
    }

    #[test]
    fn decode_rejects_bad_encodings() {
        // wrong length
        assert!(matches!(
            decode_point(&[0u8; 31]),
            Err(RampionError::InvalidPoint)
        ));
        // the identity element
        assert!(matches!(
            decode_point(&[0u8; 32]),
            Err(RampionError::InvalidPoint)
        ));
        // not a canonical field element
        assert!(matches!(
            decode_point(&[0xff; 32]),
            Err(RampionError::InvalidPoint)
        ));
    }

    #[test]
    fn decode_round_trips_valid_points() {
        let p = base_mult(&random_scalar()).unwrap();
        let encoded = encode_point(&p);
        let decoded = decode_point(&encoded).unwrap();
        assert_eq!(encode_point(&decoded), encoded);
    }

    #[test]
    fn identity_results_are_rejected() {
        assert!(matches!(
            base_mult(&Scalar::ZERO),
            Err(RampionError::InvalidPoint)
        ));

        let p = base_mult(&random_scalar()).unwrap();
        assert!(matches!(
            mult(&Scalar::ZERO, &p),
            Err(RampionError::InvalidPoint)
        ));
    }

    #[test]
    fn add_then_sub_is_the_original_point() {
        let x = base_mult(&random_scalar()).unwrap();
        let y = base_mult(&random_scalar()).unwrap();
        let sum = x + y;
        assert_eq!(encode_point(&(sum - y)), encode_point(&x));
    }
}
