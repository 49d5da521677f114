use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha512};

use crate::error::TypeError;

/// Number of digest bytes kept from SHA-512.
pub const BYTE_LEN: usize = 20;

/// Length of the canonical base32 text form.
pub const STRING_LEN: usize = 32;

/// RFC 4648 "extended hex" alphabet, lowercase and unpadded:
/// `0123456789abcdefghijklmnopqrstuv`.
const ALPHABET: base32::Alphabet = base32::Alphabet::Rfc4648HexLower { padding: false };

/// Decoding side of [`ALPHABET`]; input is upper-cased after validation.
const DECODE_ALPHABET: base32::Alphabet = base32::Alphabet::Rfc4648Hex { padding: false };

/// Content hash identifying a chunk.
///
/// A `Hash` is the first 20 bytes of the SHA-512 digest of a chunk's payload.
/// Its text form is a 32 character lowercase base32 string. Changing either
/// the digest or the text encoding breaks every stored database, so both are
/// fixed for the lifetime of [`FORMAT_VERSION`](crate::FORMAT_VERSION).
///
/// The all-zero hash is reserved as the "empty" sentinel: it is what a fresh
/// store reports as its root and never collides with a real digest in
/// practice.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash([u8; BYTE_LEN]);

impl Hash {
    /// Hash raw bytes.
    pub fn of(data: &[u8]) -> Self {
        let digest = Sha512::digest(data);
        let mut bytes = [0u8; BYTE_LEN];
        bytes.copy_from_slice(&digest[..BYTE_LEN]);
        Self(bytes)
    }

    /// The empty sentinel (all zeros).
    pub const fn empty() -> Self {
        Self([0u8; BYTE_LEN])
    }

    /// Returns `true` if this is the empty sentinel.
    pub fn is_empty(&self) -> bool {
        self.0 == [0u8; BYTE_LEN]
    }

    /// Wrap pre-computed digest bytes.
    pub const fn from_bytes(bytes: [u8; BYTE_LEN]) -> Self {
        Self(bytes)
    }

    /// Build from a byte slice, checking its length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypeError> {
        let arr: [u8; BYTE_LEN] = bytes.try_into().map_err(|_| TypeError::InvalidLength {
            expected: BYTE_LEN,
            actual: bytes.len(),
        })?;
        Ok(Self(arr))
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; BYTE_LEN] {
        &self.0
    }

    /// Parse the canonical 32 character text form.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        if s.len() != STRING_LEN {
            return Err(TypeError::InvalidHash(format!(
                "expected {STRING_LEN} characters, got {}",
                s.len()
            )));
        }
        if let Some(bad) = s
            .chars()
            .find(|c| !matches!(c, '0'..='9' | 'a'..='v'))
        {
            return Err(TypeError::InvalidHash(format!(
                "invalid character {bad:?} in {s:?}"
            )));
        }
        let bytes = base32::decode(DECODE_ALPHABET, &s.to_ascii_uppercase())
            .ok_or_else(|| TypeError::InvalidHash(s.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Parse, returning `None` instead of an error.
    pub fn maybe_parse(s: &str) -> Option<Self> {
        Self::parse(s).ok()
    }

    /// Short form (first 8 characters) for logs.
    pub fn short(&self) -> String {
        let mut s = self.to_string();
        s.truncate(8);
        s
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&base32::encode(ALPHABET, &self.0))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.short())
    }
}

impl FromStr for Hash {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<[u8; BYTE_LEN]> for Hash {
    fn from(bytes: [u8; BYTE_LEN]) -> Self {
        Self(bytes)
    }
}

// Text form for JSON and other human readable formats, raw bytes otherwise.
impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.collect_str(self)
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            Hash::parse(&s).map_err(serde::de::Error::custom)
        } else {
            <[u8; BYTE_LEN]>::deserialize(deserializer).map(Self)
        }
    }
}
