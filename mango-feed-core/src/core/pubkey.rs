//! 32-byte account identifier

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::codec::{base58_decode, base58_encode};
use crate::core::errors::CodecError;

/// Length of an account key in bytes
pub const PUBKEY_LEN: usize = 32;

/// Account public key
///
/// Equality is byte-exact. Text form is base58.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct PublicKey([u8; PUBKEY_LEN]);

impl PublicKey {
    pub const fn new(bytes: [u8; PUBKEY_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse a base58 key, rejecting anything that does not decode to 32 bytes
    pub fn from_base58(text: &str) -> Result<Self, CodecError> {
        let bytes = base58_decode(text)?;
        let array: [u8; PUBKEY_LEN] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| CodecError::InvalidKeyLength {
                actual: bytes.len(),
            })?;
        Ok(Self(array))
    }

    pub fn to_base58(&self) -> String {
        base58_encode(&self.0)
    }

    pub const fn as_bytes(&self) -> &[u8; PUBKEY_LEN] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl From<[u8; PUBKEY_LEN]> for PublicKey {
    fn from(bytes: [u8; PUBKEY_LEN]) -> Self {
        Self(bytes)
    }
}

impl FromStr for PublicKey {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_base58(s)
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base58())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_base58())
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base58())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        Self::from_base58(&text).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KNOWN_KEYS: [&str; 5] = [
        "98pjRuQjK3qA6gXts96PqZT4Ze5QmnCmt3QYjhbUSPue",
        "mv3ekLzLbnVPNxjSKvqBpU3ZeZXPQdEC3bp5MDEBG68",
        "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin",
        "MangoCzJ36AjZyKwVj3VnYU4GTonjfVEnJmvvWaxLac",
        "14ivtgssEBoBjuZJtSAPKYgpUK7DmnSwuPMqJoVTSgKJ",
    ];

    #[test]
    fn test_known_keys_roundtrip() {
        for text in KNOWN_KEYS {
            let key = PublicKey::from_base58(text).unwrap();
            assert_eq!(key.to_base58(), text);
            assert_eq!(key.to_string(), text);
        }
    }

    #[test]
    fn test_leading_one_is_zero_byte() {
        let key = PublicKey::from_base58("14ivtgssEBoBjuZJtSAPKYgpUK7DmnSwuPMqJoVTSgKJ").unwrap();
        assert_eq!(key.as_bytes()[0], 0);
    }

    #[test]
    fn test_wrong_length_rejected() {
        let err = PublicKey::from_base58("2g").unwrap_err();
        assert!(matches!(err, CodecError::InvalidKeyLength { actual: 1 }));
    }

    #[test]
    fn test_invalid_alphabet_rejected() {
        assert!(PublicKey::from_str("0OIl").is_err());
    }

    #[test]
    fn test_default_is_zero() {
        let key = PublicKey::default();
        assert!(key.is_zero());
        assert_eq!(key.to_base58(), "11111111111111111111111111111111");
    }

    #[test]
    fn test_serde_as_base58_string() {
        let key = PublicKey::from_base58(KNOWN_KEYS[0]).unwrap();
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, format!("\"{}\"", KNOWN_KEYS[0]));
        let back: PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }
}
