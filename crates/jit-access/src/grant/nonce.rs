//! Rule-name nonces.
//!
//! Uses the operating system's cryptographic random source via `rand`.
//! Generated nonces are lowercase hex and therefore never contain the
//! rule-name separator.

use rand::RngCore;

/// Shortest nonce the issuer will generate (32 bits).
pub const MIN_NONCE_HEX_LEN: usize = 8;

/// Longest nonce the issuer will generate (128 bits).
pub const MAX_NONCE_HEX_LEN: usize = 32;

/// Default nonce length (48 bits).
pub const DEFAULT_NONCE_HEX_LEN: usize = 12;

/// The random component of a managed rule name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Nonce(String);

impl Nonce {
    /// Generate a fresh lowercase-hex nonce of `hex_len` characters.
    ///
    /// `hex_len` is clamped to `MIN_NONCE_HEX_LEN..=MAX_NONCE_HEX_LEN`.
    pub fn generate(hex_len: usize) -> Self {
        let hex_len = hex_len.clamp(MIN_NONCE_HEX_LEN, MAX_NONCE_HEX_LEN);
        let mut buf = [0u8; MAX_NONCE_HEX_LEN / 2];
        let bytes = &mut buf[..hex_len.div_ceil(2)];
        rand::thread_rng().fill_bytes(bytes);
        let mut encoded = hex::encode(bytes);
        encoded.truncate(hex_len);
        Self(encoded)
    }

    /// Accept a nonce read back from a rule name.
    ///
    /// Any non-empty ASCII alphanumeric string is accepted so rules written
    /// with upper-case or differently sized nonces are still recognised.
    pub fn parse(s: &str) -> Option<Self> {
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return None;
        }
        Some(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Nonce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
