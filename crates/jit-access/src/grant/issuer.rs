//! Grant issuer: turns an access request into one allow-list rule.
//!
//! The deadline is fixed at issue time and written into the rule name,
//! so the rule itself is the only record of the grant.

use std::net::IpAddr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::{AccessPolicy, TargetResource};
use crate::error::{AccessError, Result, StoreError};
use crate::store::{with_timeout, AllowListStore, FirewallRule};
use crate::time::{Clock, SystemClock, Ticks};

use super::nonce::Nonce;
use super::request::AccessRequest;
use super::subject::Subject;
use super::token::ManagedName;

/// Create attempts per request: the first try plus one retry on a name
/// collision.
pub const MAX_CREATE_ATTEMPTS: usize = 2;

/// Outcome label of a successful request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GrantStatus {
    Granted,
}

/// A granted access window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrantResult {
    pub status: GrantStatus,
    /// Name of the created rule.
    pub rule: String,
    pub subject: Subject,
    pub expires: DateTime<Utc>,
}

/// Issues grants against one target resource.
pub struct GrantIssuer {
    store: Arc<dyn AllowListStore>,
    clock: Arc<dyn Clock>,
    target: TargetResource,
    policy: AccessPolicy,
}

impl GrantIssuer {
    pub fn new(store: Arc<dyn AllowListStore>, target: TargetResource, policy: AccessPolicy) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            target,
            policy,
        }
    }

    /// Replace the time source.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Handle a raw request body from `caller`.
    ///
    /// Configuration is checked before the body, and the body before the
    /// store, so every rejection is free of side effects.
    pub async fn handle_body(&self, body: &[u8], caller: Option<IpAddr>) -> Result<GrantResult> {
        self.check_config()?;
        let request = AccessRequest::from_body(body)?;
        let subject = request.resolve_subject(caller)?;
        self.request_access(subject).await
    }

    /// Admit `subject` until now + ttl.
    pub async fn request_access(&self, subject: Subject) -> Result<GrantResult> {
        self.check_config()?;
        let deadline = self.deadline()?;

        let mut attempt = 1;
        loop {
            let name = ManagedName::new(Nonce::generate(self.policy.nonce_hex_len), deadline);
            let rule = FirewallRule::new(name.encode(), subject);

            match with_timeout(self.policy.store_timeout, self.store.create(&rule)).await {
                Ok(()) => {
                    log::info!(
                        "granted {subject} on {} as {} until {}",
                        self.target.server_name,
                        rule.name,
                        name.expires_at()
                    );
                    return Ok(GrantResult {
                        status: GrantStatus::Granted,
                        rule: rule.name,
                        subject,
                        expires: name.expires_at(),
                    });
                }
                Err(StoreError::Conflict(taken)) if attempt < MAX_CREATE_ATTEMPTS => {
                    log::warn!("rule name {taken} already taken, retrying with a new nonce");
                    attempt += 1;
                }
                Err(e) => {
                    log::error!("failed to create rule {}: {e}", rule.name);
                    return Err(AccessError::backend(
                        format!("creating rule {}", rule.name),
                        e,
                    ));
                }
            }
        }
    }

    fn check_config(&self) -> Result<()> {
        self.target.validate()?;
        self.policy.validate()
    }

    fn deadline(&self) -> Result<Ticks> {
        let ttl = chrono::Duration::from_std(self.policy.ttl).map_err(|_| {
            AccessError::MisconfiguredService("grant ttl is out of range".into())
        })?;
        self.clock
            .now()
            .checked_add_signed(ttl)
            .and_then(Ticks::from_datetime)
            .ok_or_else(|| {
                AccessError::MisconfiguredService("grant deadline is not representable".into())
            })
    }
}
