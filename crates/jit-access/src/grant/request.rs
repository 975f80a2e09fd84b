//! Access requests as received over the wire.
//!
//! The body is a JSON object. Both `ip` and `subject` name the address to
//! admit; `ip` wins when both are present. An absent or unreadable address
//! falls back to the caller's observed address.

use std::net::IpAddr;

use serde::Deserialize;

use crate::error::{AccessError, Result};

use super::subject::Subject;

/// A parsed request body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AccessRequest {
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
}

impl AccessRequest {
    /// Parse a raw request body.
    ///
    /// Empty bodies, invalid JSON, and JSON that is not an object are
    /// rejected as `InvalidRequest`.
    pub fn from_body(body: &[u8]) -> Result<Self> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Err(AccessError::InvalidRequest("request body is empty".into()));
        }
        let value: serde_json::Value = serde_json::from_slice(body)
            .map_err(|e| AccessError::InvalidRequest(format!("request body is not JSON: {e}")))?;
        if !value.is_object() {
            return Err(AccessError::InvalidRequest(
                "request body must be a JSON object".into(),
            ));
        }
        serde_json::from_value(value)
            .map_err(|e| AccessError::InvalidRequest(format!("unexpected request shape: {e}")))
    }

    /// The address the caller asked for, if any.
    pub fn requested(&self) -> Option<&str> {
        self.ip
            .as_deref()
            .or(self.subject.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Decide which subject to admit.
    pub fn resolve_subject(&self, caller: Option<IpAddr>) -> Result<Subject> {
        if let Some(requested) = self.requested() {
            match Subject::parse(requested) {
                Ok(subject) => return Ok(subject),
                Err(e) => {
                    log::warn!("ignoring unusable subject {requested:?}: {e}");
                }
            }
        }
        caller.map(Subject::single).ok_or_else(|| {
            AccessError::InvalidRequest(
                "no usable address in request and caller address unknown".into(),
            )
        })
    }
}
