//! Type-safe identifiers for devices and protocol fields.
//!
//! Devices are addressed by a [`Uid`]: a 32-bit number that is printed on the
//! hardware as a short base58 token (e.g. `"XYZ"`).
//!
//! # Example
//!
//! ```
//! use tfp_client::Uid;
//!
//! let uid: Uid = "XYZ".parse().expect("valid uid");
//! assert_eq!(uid.to_string(), "XYZ");
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Base58 alphabet used for device identities (no `0`, `O`, `I`, `l`).
const BASE58_ALPHABET: &[u8; 58] =
    b"123456789abcdefghijkmnopqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ";

// ============================================================================
// Uid
// ============================================================================

/// Numeric device identity.
///
/// Zero is reserved for broadcast and is never a valid device identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Uid(u32);

impl Uid {
    /// Creates a uid from its numeric value.
    ///
    /// Returns `None` for zero.
    #[inline]
    #[must_use]
    pub const fn new(value: u32) -> Option<Self> {
        if value == 0 { None } else { Some(Self(value)) }
    }

    /// Parses a base58 device token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIdentity`] if the token is empty, contains a
    /// character outside the base58 alphabet, decodes to zero or does not fit
    /// in 32 bits.
    pub fn parse(token: &str) -> Result<Self> {
        if token.is_empty() {
            return Err(Error::invalid_identity(token, "empty identity"));
        }

        let mut value: u64 = 0;
        for ch in token.chars() {
            let digit = ch
                .is_ascii()
                .then(|| BASE58_ALPHABET.iter().position(|&b| b == ch as u8))
                .flatten()
                .ok_or_else(|| {
                    Error::invalid_identity(token, format!("invalid character '{ch}'"))
                })?;

            value = value * 58 + digit as u64;
            if value > u64::from(u32::MAX) {
                return Err(Error::invalid_identity(token, "value exceeds 32 bits"));
            }
        }

        Self::new(value as u32).ok_or_else(|| Error::invalid_identity(token, "zero identity"))
    }

    /// Returns the numeric value.
    #[inline]
    #[must_use]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Uid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut digits = Vec::with_capacity(6);
        let mut value = self.0;
        while value > 0 {
            digits.push(BASE58_ALPHABET[(value % 58) as usize]);
            value /= 58;
        }

        let token: String = digits.iter().rev().map(|&b| b as char).collect();
        f.write_str(&token)
    }
}

impl FromStr for Uid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_token() {
        // X=55, Y=56, Z=57
        let uid = Uid::parse("XYZ").expect("valid uid");
        assert_eq!(uid.as_u32(), 55 * 58 * 58 + 56 * 58 + 57);
        assert_eq!(uid.to_string(), "XYZ");
    }

    #[test]
    fn test_parse_rejects_ambiguous_characters() {
        for token in ["0", "O1", "abIc", "l"] {
            let err = Uid::parse(token).unwrap_err();
            assert!(matches!(err, Error::InvalidIdentity { .. }), "{token}");
        }
    }

    #[test]
    fn test_parse_rejects_empty_and_overflow() {
        assert!(Uid::parse("").is_err());
        assert!(Uid::parse("zzzzzzzzzz").is_err());
        assert!(Uid::parse("héllo").is_err());
    }

    #[test]
    fn test_zero_is_not_a_uid() {
        assert!(Uid::new(0).is_none());
        assert!(Uid::new(1).is_some());
    }

    #[test]
    fn test_display_matches_parse() {
        for value in [1_u32, 57, 58, 4_000_000_000, u32::MAX] {
            let uid = Uid::new(value).expect("non-zero");
            let reparsed: Uid = uid.to_string().parse().expect("reparse");
            assert_eq!(reparsed, uid);
        }
    }
}
