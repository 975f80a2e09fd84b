//! Deployment configuration.
//!
//! Everything is read once at startup. The target resource identity is
//! mandatory; policy knobs fall back to defaults. Anything missing or
//! unreadable is a `MisconfiguredService` error, never a silent no-op.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AccessError, Result};
use crate::grant::nonce::{DEFAULT_NONCE_HEX_LEN, MAX_NONCE_HEX_LEN, MIN_NONCE_HEX_LEN};

pub const ENV_SUBSCRIPTION_ID: &str = "JIT_SUBSCRIPTION_ID";
pub const ENV_RESOURCE_GROUP: &str = "JIT_RESOURCE_GROUP";
pub const ENV_SERVER_NAME: &str = "JIT_SERVER_NAME";
pub const ENV_GRANT_TTL_SECS: &str = "JIT_GRANT_TTL_SECS";
pub const ENV_SCAN_INTERVAL_SECS: &str = "JIT_SCAN_INTERVAL_SECS";
pub const ENV_STORE_TIMEOUT_SECS: &str = "JIT_STORE_TIMEOUT_SECS";
pub const ENV_NONCE_HEX_LEN: &str = "JIT_NONCE_HEX_LEN";
pub const ENV_STORE_DIR: &str = "JIT_STORE_DIR";

pub const DEFAULT_GRANT_TTL: Duration = Duration::from_secs(60 * 60);
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(5 * 60);
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_STORE_DIR: &str = "jit-store";

/// Longest grant the issuer accepts (100 years).
pub const MAX_GRANT_TTL: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// The resource whose allow-list is managed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetResource {
    pub subscription_id: String,
    pub resource_group: String,
    pub server_name: String,
}

impl TargetResource {
    pub fn new(
        subscription_id: impl Into<String>,
        resource_group: impl Into<String>,
        server_name: impl Into<String>,
    ) -> Self {
        Self {
            subscription_id: subscription_id.into(),
            resource_group: resource_group.into(),
            server_name: server_name.into(),
        }
    }

    /// Reject blank identity fields. Only the field names are reported.
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("subscription_id", &self.subscription_id),
            ("resource_group", &self.resource_group),
            ("server_name", &self.server_name),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(AccessError::MisconfiguredService(format!(
                "target resource is missing {}",
                missing.join(", ")
            )))
        }
    }
}

/// Issuer policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessPolicy {
    /// Lifetime of each grant.
    pub ttl: Duration,
    /// Hex characters of randomness in each rule name.
    pub nonce_hex_len: usize,
    /// Upper bound on any single store call.
    pub store_timeout: Duration,
}

impl Default for AccessPolicy {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_GRANT_TTL,
            nonce_hex_len: DEFAULT_NONCE_HEX_LEN,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

impl AccessPolicy {
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.ttl.is_zero() {
            return Err(AccessError::MisconfiguredService(
                "grant ttl must be > 0".into(),
            ));
        }
        if self.ttl > MAX_GRANT_TTL {
            return Err(AccessError::MisconfiguredService(format!(
                "grant ttl must not exceed {} days",
                MAX_GRANT_TTL.as_secs() / 86400
            )));
        }
        if !(MIN_NONCE_HEX_LEN..=MAX_NONCE_HEX_LEN).contains(&self.nonce_hex_len) {
            return Err(AccessError::MisconfiguredService(format!(
                "nonce length must be between {MIN_NONCE_HEX_LEN} and {MAX_NONCE_HEX_LEN} hex characters"
            )));
        }
        if self.store_timeout.is_zero() {
            return Err(AccessError::MisconfiguredService(
                "store timeout must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Reclaimer policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReclaimPolicy {
    pub interval: Duration,
    pub store_timeout: Duration,
}

impl Default for ReclaimPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SCAN_INTERVAL,
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

/// Full service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub target: TargetResource,
    pub access: AccessPolicy,
    pub reclaim: ReclaimPolicy,
    pub store_dir: PathBuf,
}

impl ServiceConfig {
    /// Load from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let missing: Vec<&str> = [ENV_SUBSCRIPTION_ID, ENV_RESOURCE_GROUP, ENV_SERVER_NAME]
            .into_iter()
            .filter(|key| get(*key).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(AccessError::MisconfiguredService(format!(
                "missing required setting(s): {}",
                missing.join(", ")
            )));
        }

        let target = TargetResource::new(
            get(ENV_SUBSCRIPTION_ID).unwrap_or_default(),
            get(ENV_RESOURCE_GROUP).unwrap_or_default(),
            get(ENV_SERVER_NAME).unwrap_or_default(),
        );

        let store_timeout = secs_setting(&get, ENV_STORE_TIMEOUT_SECS, DEFAULT_STORE_TIMEOUT)?;
        let access = AccessPolicy {
            ttl: secs_setting(&get, ENV_GRANT_TTL_SECS, DEFAULT_GRANT_TTL)?,
            nonce_hex_len: match get(ENV_NONCE_HEX_LEN) {
                Some(raw) => parse_setting(ENV_NONCE_HEX_LEN, &raw)?,
                None => DEFAULT_NONCE_HEX_LEN,
            },
            store_timeout,
        };
        access.validate()?;

        let reclaim = ReclaimPolicy {
            interval: secs_setting(&get, ENV_SCAN_INTERVAL_SECS, DEFAULT_SCAN_INTERVAL)?,
            store_timeout,
        };
        if reclaim.interval.is_zero() {
            return Err(AccessError::MisconfiguredService(
                "scan interval must be > 0".into(),
            ));
        }

        let store_dir = get(ENV_STORE_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_DIR));

        Ok(Self {
            target,
            access,
            reclaim,
            store_dir,
        })
    }
}

fn secs_setting(
    get: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: Duration,
) -> Result<Duration> {
    match get(key) {
        Some(raw) => parse_setting::<u64>(key, &raw).map(Duration::from_secs),
        None => Ok(default),
    }
}

fn parse_setting<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.parse()
        .map_err(|_| AccessError::MisconfiguredService(format!("{key} is not a valid number")))
}
