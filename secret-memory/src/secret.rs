use std::fmt;

use rand::RngCore;
use zeroize::Zeroize;

/// Store for a secret byte array of size `N`.
///
/// The storage is heap allocated so the bytes are never moved around the
/// stack by value; it is actively zeroized before the allocation is
/// released, on every exit path.
pub struct Secret<const N: usize> {
    storage: Box<[u8; N]>,
}

impl<const N: usize> Secret<N> {
    /// Returns a new [Secret] that is zero initialized
    pub fn zero() -> Self {
        Self {
            storage: Box::new([0u8; N]),
        }
    }

    /// Returns a new [Secret] that is randomized
    pub fn random() -> Self {
        let mut new = Self::zero();
        new.randomize();
        new
    }

    /// Returns a new [Secret] holding a copy of `slice`
    ///
    /// # Panics
    ///
    /// If `slice` is not exactly `N` bytes long.
    pub fn from_slice(slice: &[u8]) -> Self {
        let mut new = Self::zero();
        new.secret_mut().copy_from_slice(slice);
        new
    }

    /// Sets all data of an existing secret to null bytes
    pub fn zeroize(&mut self) {
        self.secret_mut().zeroize();
    }

    /// Sets all data of an existing secret to random bytes
    pub fn randomize(&mut self) {
        rand::rngs::OsRng.fill_bytes(self.secret_mut());
    }

    /// Borrows the data
    pub fn secret(&self) -> &[u8; N] {
        &self.storage
    }

    /// Borrows the data mutably
    pub fn secret_mut(&mut self) -> &mut [u8; N] {
        &mut self.storage
    }
}

impl<const N: usize> Clone for Secret<N> {
    fn clone(&self) -> Self {
        Self::from_slice(self.secret())
    }
}

impl<const N: usize> Drop for Secret<N> {
    fn drop(&mut self) {
        self.zeroize();
    }
}

impl<const N: usize> Zeroize for Secret<N> {
    fn zeroize(&mut self) {
        Secret::zeroize(self)
    }
}

impl<const N: usize> fmt::Debug for Secret<N> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str("<secret>")
    }
}
