//! # Encoded key
//!
//! The storage form of every key in the keyspace: a byte buffer carrying two
//! side fields, `version` and `logical_clock`, that never participate in
//! equality or hashing. The dictionary looks keys up by raw bytes; once an
//! entry is found, its stored key is the only place that side-data lives.
use bytes::Bytes;
use std::borrow::Borrow;
use std::hash::{Hash, Hasher};

/// A key's byte content plus its optimistic-concurrency version and
/// logical-clock stamp.
#[derive(Debug, Clone)]
pub struct EncodedKey {
    bytes: Bytes,
    version: u16,
    logical_clock: u16,
}

impl EncodedKey {
    /// Creates a new key with version and logical clock both zero.
    pub fn new(bytes: Bytes) -> Self {
        Self {
            bytes,
            version: 0,
            logical_clock: 0,
        }
    }

    /// Length of the key's byte content.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the key is empty.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The raw byte content.
    pub fn as_bytes(&self) -> &Bytes {
        &self.bytes
    }

    /// The current optimistic-concurrency version. `0` means "no version
    /// assigned yet".
    pub fn version(&self) -> u16 {
        self.version
    }

    /// Overwrites the version.
    pub fn set_version(&mut self, version: u16) {
        self.version = version;
    }

    /// Bumps the version by `n`, wrapping on overflow.
    pub fn add_version(&mut self, n: u16) {
        self.version = self.version.wrapping_add(n);
    }

    /// The logical-clock stamp at which this key was last written. `0` means
    /// the key is not managed by the logical clock.
    pub fn logical_clock(&self) -> u16 {
        self.logical_clock
    }

    /// Overwrites the logical-clock stamp.
    pub fn set_logical_clock(&mut self, stamp: u16) {
        self.logical_clock = stamp;
    }
}

impl PartialEq for EncodedKey {
    fn eq(&self, other: &Self) -> bool {
        self.bytes == other.bytes
    }
}

impl Eq for EncodedKey {}

impl Hash for EncodedKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

impl Borrow<[u8]> for EncodedKey {
    fn borrow(&self) -> &[u8] {
        &self.bytes
    }
}

impl From<Bytes> for EncodedKey {
    fn from(bytes: Bytes) -> Self {
        Self::new(bytes)
    }
}

impl From<&[u8]> for EncodedKey {
    fn from(bytes: &[u8]) -> Self {
        Self::new(Bytes::copy_from_slice(bytes))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn equality_ignores_version_and_stamp() {
        let mut a = EncodedKey::from(&b"foo"[..]);
        let b = EncodedKey::from(&b"foo"[..]);
        a.set_version(7);
        a.set_logical_clock(3);
        assert_eq!(a, b);
    }

    #[test]
    fn version_wraps() {
        let mut k = EncodedKey::from(&b"foo"[..]);
        k.set_version(u16::MAX);
        k.add_version(1);
        assert_eq!(k.version(), 0);
    }
}
