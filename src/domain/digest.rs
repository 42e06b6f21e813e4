use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest as _, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

/// Length of a SHA-256 digest in bytes
pub const DIGEST_LEN: usize = 32;

const READ_CHUNK: usize = 64 * 1024;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DigestError {
    #[error("Invalid digest encoding: {0}")]
    InvalidHex(String),

    #[error("Invalid digest length: expected 32 bytes, got {0}")]
    WrongLength(usize),
}

/// 256-bit content fingerprint of a file.
///
/// Equality is byte equality. At every boundary (logs, JSON, envelopes) a digest
/// is rendered as 64 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest([u8; DIGEST_LEN]);

impl Digest {
    pub const fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse a digest from 64 hex characters (either case)
    pub fn from_hex(value: &str) -> Result<Self, DigestError> {
        let bytes = hex::decode(value).map_err(|e| DigestError::InvalidHex(e.to_string()))?;
        let array: [u8; DIGEST_LEN] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| DigestError::WrongLength(bytes.len()))?;
        Ok(Self(array))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl FromStr for Digest {
    type Err = DigestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Self::from_hex(&value).map_err(serde::de::Error::custom)
    }
}

/// Fingerprint arbitrary content. Total over all inputs, including empty content.
pub fn fingerprint(content: &[u8]) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(content);
    finish(hasher)
}

/// Fingerprint a stream without holding it in memory
pub fn fingerprint_reader<R: Read>(mut reader: R) -> io::Result<Digest> {
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; READ_CHUNK];
    loop {
        let read = match reader.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buffer[..read]);
    }
    Ok(finish(hasher))
}

fn finish(hasher: Sha256) -> Digest {
    let mut bytes = [0u8; DIGEST_LEN];
    bytes.copy_from_slice(&hasher.finalize());
    Digest(bytes)
}

pub fn fingerprint_file(path: impl AsRef<Path>) -> io::Result<Digest> {
    fingerprint_reader(File::open(path)?)
}
