//! Subjects: the address range a grant admits.

use std::net::IpAddr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{AccessError, Result};

/// An inclusive address range. A single address has `start == end`.
/// Serialized as its display form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Subject {
    pub start: IpAddr,
    pub end: IpAddr,
}

impl Subject {
    /// A range covering exactly one address.
    pub fn single(addr: IpAddr) -> Self {
        let addr = addr.to_canonical();
        Self {
            start: addr,
            end: addr,
        }
    }

    /// Build a range, rejecting mixed families and reversed bounds.
    pub fn range(start: IpAddr, end: IpAddr) -> Result<Self> {
        let (start, end) = (start.to_canonical(), end.to_canonical());
        if start.is_ipv4() != end.is_ipv4() {
            return Err(AccessError::InvalidRequest(format!(
                "range {start}-{end} mixes address families"
            )));
        }
        if start > end {
            return Err(AccessError::InvalidRequest(format!(
                "range start {start} is after end {end}"
            )));
        }
        Ok(Self { start, end })
    }

    /// Parse `a.b.c.d` or `a.b.c.d-e.f.g.h`.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(AccessError::InvalidRequest("empty subject".into()));
        }
        match s.split_once('-') {
            Some((start, end)) => Self::range(parse_addr(start)?, parse_addr(end)?),
            None => Ok(Self::single(parse_addr(s)?)),
        }
    }

    pub fn is_single(&self) -> bool {
        self.start == self.end
    }
}

impl std::fmt::Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_single() {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

impl std::str::FromStr for Subject {
    type Err = AccessError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for Subject {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Subject {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

fn parse_addr(s: &str) -> Result<IpAddr> {
    s.trim()
        .parse::<IpAddr>()
        .map_err(|e| AccessError::InvalidRequest(format!("invalid address {:?}: {e}", s.trim())))
}
