//! Grants: time-boxed allow-list entries.
//!
//! The grant module provides:
//! - Rule-name encoding and decoding with the deadline embedded
//! - Random nonces for rule-name uniqueness
//! - Subject (address range) parsing
//! - Request body parsing with caller-address fallback
//! - The issuer that writes one rule per request

pub mod issuer;
pub mod nonce;
pub mod request;
pub mod subject;
pub mod token;

pub use issuer::{GrantIssuer, GrantResult, GrantStatus};
pub use nonce::Nonce;
pub use request::AccessRequest;
pub use subject::Subject;
pub use token::{decode, encode, ManagedName, MalformedReason, TokenDecode};
