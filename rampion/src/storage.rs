//! Credential store: the server-side persistence collaborator.
//!
//! The handshake only ever branches on the [VerifyOutcome] of a stored
//! `(phi0, c)` record; everything else about persistence is the store's
//! business. [FsCredentialStore] keeps one file per client identity,
//! [MemoryCredentialStore] backs tests and embedding.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use base64ct::{Base64UrlUnpadded, Encoding};
use rampion_secret_memory::Public;
use subtle::ConstantTimeEq;

use crate::group::{POINT_LEN, SCALAR_LEN};
use crate::RampionError;

/// Result of checking a presented credential against the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    /// A record exists and matches the presented pair
    Match,
    /// No record exists for this identity
    NotFound,
    /// A record exists but differs from the presented pair
    Mismatch,
}

/// The verify/store contract the server session consumes.
///
/// `verify` followed by `store` for one identity must behave as if
/// serialized per identity; implementations resolve concurrent first-time
/// registrations themselves.
pub trait CredentialStore {
    fn verify(
        &self,
        id: &[u8],
        phi0: &[u8; SCALAR_LEN],
        c: &[u8; POINT_LEN],
    ) -> Result<VerifyOutcome, RampionError>;

    fn store(
        &self,
        id: &[u8],
        phi0: &[u8; SCALAR_LEN],
        c: &[u8; POINT_LEN],
    ) -> Result<(), RampionError>;
}

impl<T: CredentialStore + ?Sized> CredentialStore for &T {
    fn verify(
        &self,
        id: &[u8],
        phi0: &[u8; SCALAR_LEN],
        c: &[u8; POINT_LEN],
    ) -> Result<VerifyOutcome, RampionError> {
        (**self).verify(id, phi0, c)
    }

    fn store(
        &self,
        id: &[u8],
        phi0: &[u8; SCALAR_LEN],
        c: &[u8; POINT_LEN],
    ) -> Result<(), RampionError> {
        (**self).store(id, phi0, c)
    }
}

impl<T: CredentialStore + ?Sized> CredentialStore for Arc<T> {
    fn verify(
        &self,
        id: &[u8],
        phi0: &[u8; SCALAR_LEN],
        c: &[u8; POINT_LEN],
    ) -> Result<VerifyOutcome, RampionError> {
        (**self).verify(id, phi0, c)
    }

    fn store(
        &self,
        id: &[u8],
        phi0: &[u8; SCALAR_LEN],
        c: &[u8; POINT_LEN],
    ) -> Result<(), RampionError> {
        (**self).store(id, phi0, c)
    }
}

fn storage_err(context: &str, e: std::io::Error) -> RampionError {
    RampionError::Storage(format!("{context}: {e}"))
}

/// Record layout on disk: `[phi0_len u16 BE][phi0][c_len u16 BE][c]`.
/// Both length fields are big-endian, same as the wire.
fn encode_record(phi0: &[u8; SCALAR_LEN], c: &[u8; POINT_LEN]) -> Vec<u8> {
    let mut record = Vec::with_capacity(2 + SCALAR_LEN + 2 + POINT_LEN);
    record.extend_from_slice(&(SCALAR_LEN as u16).to_be_bytes());
    record.extend_from_slice(phi0);
    record.extend_from_slice(&(POINT_LEN as u16).to_be_bytes());
    record.extend_from_slice(c);
    record
}

fn decode_record(record: &[u8]) -> Result<(&[u8], &[u8]), RampionError> {
    let too_short = || RampionError::Storage("credential record is truncated".into());

    let len = |bytes: &[u8]| u16::from_be_bytes([bytes[0], bytes[1]]) as usize;
    if record.len() < 2 {
        return Err(too_short());
    }
    let phi0_len = len(record);
    let rest = &record[2..];
    if rest.len() < phi0_len + 2 {
        return Err(too_short());
    }
    let (phi0, rest) = rest.split_at(phi0_len);
    let c_len = len(rest);
    let rest = &rest[2..];
    if rest.len() != c_len {
        return Err(RampionError::Storage(
            "credential record has trailing bytes".into(),
        ));
    }
    Ok((phi0, rest))
}

fn record_matches(stored: (&[u8], &[u8]), phi0: &[u8; SCALAR_LEN], c: &[u8; POINT_LEN]) -> bool {
    let (stored_phi0, stored_c) = stored;
    if stored_phi0.len() != SCALAR_LEN || stored_c.len() != POINT_LEN {
        return false;
    }
    bool::from(stored_phi0.ct_eq(phi0) & stored_c.ct_eq(c))
}

/// File-backed credential store, one record file per client identity
/// under a root directory.
///
/// File names are the unpadded base64url encoding of the identity bytes,
/// so arbitrary identities map to path-safe names. A per-identity lock
/// map serializes verify/store per identity; records are created with
/// `create_new`, so two racing first-time registrations cannot overwrite
/// each other. The losing writer re-reads the file and accepts an
/// identical record.
#[derive(Debug)]
pub struct FsCredentialStore {
    root: PathBuf,
    locks: Mutex<HashMap<Vec<u8>, Arc<Mutex<()>>>>,
}

impl FsCredentialStore {
    /// Opens a store rooted at `root`, creating the directory if absent
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, RampionError> {
        let root = root.as_ref().to_path_buf();
        std::fs::create_dir_all(&root)
            .map_err(|e| storage_err("could not create storage directory", e))?;
        Ok(Self {
            root,
            locks: Mutex::new(HashMap::new()),
        })
    }

    fn record_path(&self, id: &[u8]) -> PathBuf {
        self.root.join(Base64UrlUnpadded::encode_string(id))
    }

    fn lock_for(&self, id: &[u8]) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        Arc::clone(locks.entry(id.to_vec()).or_default())
    }

    fn read_record(&self, id: &[u8]) -> Result<Option<Vec<u8>>, RampionError> {
        match std::fs::read(self.record_path(id)) {
            Ok(record) => Ok(Some(record)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(storage_err("could not read credential record", e)),
        }
    }
}

impl CredentialStore for FsCredentialStore {
    fn verify(
        &self,
        id: &[u8],
        phi0: &[u8; SCALAR_LEN],
        c: &[u8; POINT_LEN],
    ) -> Result<VerifyOutcome, RampionError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().unwrap();

        let Some(record) = self.read_record(id)? else {
            return Ok(VerifyOutcome::NotFound);
        };
        if record_matches(decode_record(&record)?, phi0, c) {
            Ok(VerifyOutcome::Match)
        } else {
            Ok(VerifyOutcome::Mismatch)
        }
    }

    fn store(
        &self,
        id: &[u8],
        phi0: &[u8; SCALAR_LEN],
        c: &[u8; POINT_LEN],
    ) -> Result<(), RampionError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock().unwrap();

        let path = self.record_path(id);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                // lost a registration race; an identical record is fine
                let record = self
                    .read_record(id)?
                    .ok_or_else(|| RampionError::Storage("credential record vanished".into()))?;
                if record_matches(decode_record(&record)?, phi0, c) {
                    return Ok(());
                }
                return Err(RampionError::Storage(
                    "conflicting credential record already exists".into(),
                ));
            }
            Err(e) => return Err(storage_err("could not create credential record", e)),
        };

        file.write_all(&encode_record(phi0, c))
            .and_then(|()| file.sync_all())
            .map_err(|e| storage_err("could not write credential record", e))
    }
}

/// In-memory credential store with the same contract, for tests and
/// embedding
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    records: Mutex<HashMap<Vec<u8>, (Public<SCALAR_LEN>, Public<POINT_LEN>)>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn verify(
        &self,
        id: &[u8],
        phi0: &[u8; SCALAR_LEN],
        c: &[u8; POINT_LEN],
    ) -> Result<VerifyOutcome, RampionError> {
        let records = self.records.lock().unwrap();
        match records.get(id) {
            None => Ok(VerifyOutcome::NotFound),
            Some((stored_phi0, stored_c)) => {
                if record_matches((&stored_phi0[..], &stored_c[..]), phi0, c) {
                    Ok(VerifyOutcome::Match)
                } else {
                    Ok(VerifyOutcome::Mismatch)
                }
            }
        }
    }

    fn store(
        &self,
        id: &[u8],
        phi0: &[u8; SCALAR_LEN],
        c: &[u8; POINT_LEN],
    ) -> Result<(), RampionError> {
        let mut records = self.records.lock().unwrap();
        records.insert(id.to_vec(), (Public::new(*phi0), Public::new(*c)));
        Ok(())
    }
}
