//! Rule-name codec: the deadline lives in the allow-list entry's name.
//!
//! Format: `JIT_{nonce}_{deadlineTicks}`, e.g. `JIT_ab12cd34ef56_638843328000000000`.
//!
//! Decoding distinguishes three outcomes so callers never have to guess:
//! names owned by someone else ([`TokenDecode::Foreign`]), names that carry
//! our prefix but cannot be read ([`TokenDecode::Malformed`]), and names we
//! manage ([`TokenDecode::Managed`]). Only the last may ever be deleted.

use chrono::{DateTime, Utc};

use crate::time::Ticks;

use super::nonce::Nonce;

/// Prefix marking rules owned by this system.
pub const PREFIX: &str = "JIT";

/// Field separator. Never appears inside a nonce or a tick count.
pub const SEPARATOR: char = '_';

/// A decoded managed rule name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ManagedName {
    pub nonce: Nonce,
    pub deadline: Ticks,
}

impl ManagedName {
    pub fn new(nonce: Nonce, deadline: Ticks) -> Self {
        Self { nonce, deadline }
    }

    /// Render the rule name.
    pub fn encode(&self) -> String {
        encode(&self.nonce, self.deadline)
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.deadline.to_datetime()
    }

    /// Strictly past the deadline: a rule whose deadline equals `now` is
    /// still live.
    pub fn is_expired_at(&self, now: Ticks) -> bool {
        self.deadline < now
    }
}

impl std::fmt::Display for ManagedName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}

/// Why a prefixed name could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedReason {
    /// Splitting on the separator did not yield exactly three fields.
    FieldCount(usize),
    /// The nonce field is empty or contains characters outside `[A-Za-z0-9]`.
    InvalidNonce,
    /// The deadline field is not a plain base-10 integer.
    DeadlineNotInteger,
    /// The deadline does not fit the tick range.
    DeadlineOutOfRange,
}

impl std::fmt::Display for MalformedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FieldCount(n) => write!(f, "expected 3 fields, found {n}"),
            Self::InvalidNonce => f.write_str("invalid nonce"),
            Self::DeadlineNotInteger => f.write_str("deadline is not an integer"),
            Self::DeadlineOutOfRange => f.write_str("deadline out of range"),
        }
    }
}

/// Outcome of reading a rule name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenDecode {
    Managed(ManagedName),
    Foreign,
    Malformed(MalformedReason),
}

impl TokenDecode {
    pub fn managed(self) -> Option<ManagedName> {
        match self {
            Self::Managed(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_managed(&self) -> bool {
        matches!(self, Self::Managed(_))
    }
}

/// Build a rule name from a nonce and deadline.
pub fn encode(nonce: &Nonce, deadline: Ticks) -> String {
    format!("{PREFIX}{SEPARATOR}{nonce}{SEPARATOR}{deadline}")
}

/// Read a rule name. Never panics.
pub fn decode(name: &str) -> TokenDecode {
    let Some(rest) = name
        .strip_prefix(PREFIX)
        .and_then(|r| r.strip_prefix(SEPARATOR))
    else {
        return TokenDecode::Foreign;
    };

    let fields: Vec<&str> = rest.split(SEPARATOR).collect();
    if fields.len() != 2 {
        return TokenDecode::Malformed(MalformedReason::FieldCount(fields.len() + 1));
    }

    let Some(nonce) = Nonce::parse(fields[0]) else {
        return TokenDecode::Malformed(MalformedReason::InvalidNonce);
    };

    let raw = fields[1];
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return TokenDecode::Malformed(MalformedReason::DeadlineNotInteger);
    }
    let Some(deadline) = raw.parse::<u64>().ok().and_then(Ticks::new) else {
        return TokenDecode::Malformed(MalformedReason::DeadlineOutOfRange);
    };

    TokenDecode::Managed(ManagedName::new(nonce, deadline))
}
