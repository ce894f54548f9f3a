use std::fmt;
use std::str::FromStr;

use blake2::digest::consts::U32;
use blake2::digest::Mac;
use blake2::{Blake2b, Blake2bMac, Digest};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{HoosatError, Result};

pub const HASH_SIZE: usize = 32;

/// 32-byte digest. Displays and serializes as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash([u8; HASH_SIZE]);

pub type TransactionId = Hash;

impl Hash {
    pub const ZERO: Hash = Hash([0u8; HASH_SIZE]);

    pub const fn from_bytes(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; HASH_SIZE] = bytes.try_into().map_err(|_| {
            HoosatError::MalformedEncoding(format!(
                "expected {} hash bytes, got {}",
                HASH_SIZE,
                bytes.len()
            ))
        })?;
        Ok(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}

impl FromStr for Hash {
    type Err = HoosatError;

    fn from_str(s: &str) -> Result<Self> {
        let bytes = hex::decode(s).map_err(|e| HoosatError::MalformedEncoding(e.to_string()))?;
        Self::from_slice(&bytes)
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// BLAKE2b-256.
pub fn hash(data: &[u8]) -> Hash {
    let mut hasher = Blake2b::<U32>::new();
    hasher.update(data);
    Hash(hasher.finalize().into())
}

/// `hash(hash(data))`.
pub fn double_hash(data: &[u8]) -> Hash {
    hash(hash(data).as_bytes())
}

/// BLAKE2b-256 in keyed (MAC) mode. Keys shorter than 32 bytes are
/// zero-padded on the right; longer keys are rejected.
pub fn keyed_hash(key: &[u8], data: &[u8]) -> Result<Hash> {
    let mut hasher = KeyedHasher::new(key)?;
    hasher.update(data);
    Ok(hasher.finalize())
}

/// Streaming form of [`keyed_hash`], used when a preimage is assembled from
/// many pieces.
pub struct KeyedHasher {
    mac: Blake2bMac<U32>,
}

impl KeyedHasher {
    pub fn new(key: &[u8]) -> Result<Self> {
        if key.len() > HASH_SIZE {
            return Err(HoosatError::InvalidKeyLength(key.len()));
        }
        let mut padded = [0u8; HASH_SIZE];
        padded[..key.len()].copy_from_slice(key);

        let mac = <Blake2bMac<U32> as Mac>::new_from_slice(&padded)
            .map_err(|_| HoosatError::InvalidKeyLength(key.len()))?;
        Ok(Self { mac })
    }

    pub fn update(&mut self, data: &[u8]) -> &mut Self {
        Mac::update(&mut self.mac, data);
        self
    }

    pub fn finalize(self) -> Hash {
        Hash(self.mac.finalize().into_bytes().into())
    }
}
