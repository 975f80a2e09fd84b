//! Filesystem-backed allow-list store.
//!
//! Stores each `FirewallRule` as a JSON file under a directory scoped to
//! the target resource:
//!
//! ```text
//! {root}/
//! └── {subscription_id}/
//!     └── {resource_group}/
//!         └── {server_name}/
//!             └── rules/
//!                 └── {rule_name}.json
//! ```
//!
//! File format:
//! ```json
//! { "version": 1, "rule": { "name": "...", "start_ip": "...", "end_ip": "..." } }
//! ```
//!
//! Creates are staged in a dot-file and published with a hard link, which
//! fails if the name already exists. A rule is therefore either fully
//! written or absent, and concurrent creates of one name cannot both win.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::TargetResource;
use crate::error::StoreError;
use crate::grant::Nonce;

use super::{validate_rule_name, AllowListStore, FirewallRule, RulePage, StoreResult};

// ── File format constants ─────────────────────────────────────────────────────

const RULE_FILE_VERSION: u32 = 1;
const RULES_DIR: &str = "rules";
const RULE_EXT: &str = ".json";

// ── On-disk structures ────────────────────────────────────────────────────────

/// Wrapper written to disk for each rule.
#[derive(Debug, Serialize, Deserialize)]
struct RuleFile {
    /// Format version number.
    version: u32,
    /// The stored rule.
    rule: FirewallRule,
}

// ── FileStore ─────────────────────────────────────────────────────────────────

/// Filesystem-backed store of firewall rules for one target resource.
#[derive(Debug, Clone)]
pub struct FileStore {
    rules_dir: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) the store for `target` under `root`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidName` if a target component is not a
    /// safe path segment, or `StoreError::Io` if the directory cannot be
    /// created.
    pub fn open(root: impl AsRef<Path>, target: &TargetResource) -> StoreResult<Self> {
        let mut dir = root.as_ref().to_path_buf();
        for segment in [
            &target.subscription_id,
            &target.resource_group,
            &target.server_name,
        ] {
            validate_rule_name(segment)?;
            dir.push(segment);
        }
        dir.push(RULES_DIR);
        std::fs::create_dir_all(&dir)?;
        Ok(Self { rules_dir: dir })
    }

    /// Directory holding the rule files.
    pub fn rules_dir(&self) -> &Path {
        &self.rules_dir
    }

    /// Build the path for a rule: `{rules_dir}/{name}.json`.
    fn rule_path(&self, name: &str) -> PathBuf {
        self.rules_dir.join(format!("{name}{RULE_EXT}"))
    }

    /// Read and deserialize one rule file.
    async fn read_rule(&self, path: &Path) -> StoreResult<FirewallRule> {
        let bytes = tokio::fs::read(path).await?;
        let file: RuleFile = serde_json::from_slice(&bytes).map_err(|e| {
            StoreError::Serialization(format!("failed to parse rule file {}: {e}", path.display()))
        })?;
        if file.version != RULE_FILE_VERSION {
            return Err(StoreError::Serialization(format!(
                "unsupported rule file version {} in {}",
                file.version,
                path.display()
            )));
        }
        Ok(file.rule)
    }
}

/// Write a staging file, removing it again if the write fails partway.
async fn write_staging(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    if let Err(e) = tokio::fs::write(path, bytes).await {
        let _ = tokio::fs::remove_file(path).await;
        return Err(e.into());
    }
    Ok(())
}

#[async_trait]
impl AllowListStore for FileStore {
    async fn create(&self, rule: &FirewallRule) -> StoreResult<()> {
        validate_rule_name(&rule.name)?;

        let file = RuleFile {
            version: RULE_FILE_VERSION,
            rule: rule.clone(),
        };
        let json = serde_json::to_vec_pretty(&file)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let staging = self
            .rules_dir
            .join(format!(".{}.{}.tmp", rule.name, Nonce::generate(16)));
        write_staging(&staging, &json).await?;

        let published = tokio::fs::hard_link(&staging, self.rule_path(&rule.name)).await;
        let _ = tokio::fs::remove_file(&staging).await;
        match published {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(StoreError::Conflict(rule.name.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Directory listings are not paged; everything comes back at once.
    async fn list_page(&self, _continuation: Option<String>) -> StoreResult<RulePage> {
        let mut rules = Vec::new();
        let mut entries = tokio::fs::read_dir(&self.rules_dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let file_name = file_name.to_string_lossy();
            if file_name.starts_with('.') || !file_name.ends_with(RULE_EXT) {
                continue;
            }

            match self.read_rule(&entry.path()).await {
                Ok(rule) => rules.push(rule),
                // Deleted between listing and reading.
                Err(StoreError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("skipping unreadable rule file {file_name}: {e}"),
            }
        }

        rules.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(RulePage {
            rules,
            continuation: None,
        })
    }

    async fn delete(&self, name: &str) -> StoreResult<()> {
        validate_rule_name(name)?;
        match tokio::fs::remove_file(self.rule_path(name)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
