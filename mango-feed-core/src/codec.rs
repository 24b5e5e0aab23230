//! Text codecs for moving between wire strings and raw bytes
//!
//! Base58 is the canonical text form of account keys. Base64 (standard
//! alphabet, `=` padded) carries account data inside notifications.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::core::errors::CodecError;

/// Encode bytes as base58, leading zero bytes become leading `1`s
pub fn base58_encode(bytes: &[u8]) -> String {
    bs58::encode(bytes).into_string()
}

/// Decode a base58 string
///
/// Fails on any character outside the base58 alphabet.
pub fn base58_decode(text: &str) -> Result<Vec<u8>, CodecError> {
    bs58::decode(text)
        .into_vec()
        .map_err(|e| CodecError::InvalidBase58 {
            reason: e.to_string(),
        })
}

/// Encode bytes as padded standard base64
pub fn base64_encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// Decode padded standard base64
pub fn base64_decode(text: &str) -> Result<Vec<u8>, CodecError> {
    STANDARD.decode(text).map_err(|e| CodecError::InvalidBase64 {
        reason: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_base58_leading_zeros() {
        assert_eq!(base58_encode(&[0, 0, 1]), "112");
        assert_eq!(base58_decode("112").unwrap(), vec![0, 0, 1]);
    }

    #[test]
    fn test_base58_empty() {
        assert_eq!(base58_encode(&[]), "");
        assert!(base58_decode("").unwrap().is_empty());
    }

    #[test]
    fn test_base58_rejects_out_of_alphabet() {
        // '0', 'O', 'I' and 'l' are excluded from the alphabet
        for bad in ["0abc", "abcO", "Il", "abc!"] {
            assert!(
                matches!(base58_decode(bad), Err(CodecError::InvalidBase58 { .. })),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_base58_known_key_is_32_bytes() {
        let bytes = base58_decode("MangoCzJ36AjZyKwVj3VnYU4GTonjfVEnJmvvWaxLac").unwrap();
        assert_eq!(bytes.len(), 32);
        assert_eq!(
            base58_encode(&bytes),
            "MangoCzJ36AjZyKwVj3VnYU4GTonjfVEnJmvvWaxLac"
        );
    }

    #[test]
    fn test_base64_padding() {
        assert_eq!(base64_encode(b"f"), "Zg==");
        assert_eq!(base64_encode(b"fo"), "Zm8=");
        assert_eq!(base64_encode(b"foo"), "Zm9v");
        assert_eq!(base64_decode("Zm8=").unwrap(), b"fo");
    }

    #[test]
    fn test_base64_rejects_garbage() {
        assert!(matches!(
            base64_decode("Zm9v*"),
            Err(CodecError::InvalidBase64 { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_base64_roundtrip(bytes in proptest::collection::vec(any::<u8>(), 0..512)) {
            prop_assert_eq!(base64_decode(&base64_encode(&bytes)).unwrap(), bytes);
        }

        #[test]
        fn prop_base58_roundtrip(bytes in proptest::collection::vec(any::<u8>(), 0..96)) {
            prop_assert_eq!(base58_decode(&base58_encode(&bytes)).unwrap(), bytes);
        }
    }
}
