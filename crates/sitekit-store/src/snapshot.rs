//! On-disk form of the gateway's store.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

use sitekit_api::{ParentId, ParentKind, SiteId, UserId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteRecord {
    pub id: SiteId,
    pub name: String,
    pub owner: UserId,
}

/// A page, post or product row. `blocks` is the JSON column: an object
/// keyed by block id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParentRecord {
    pub id: ParentId,
    pub site_id: SiteId,
    pub kind: ParentKind,
    pub title: String,
    pub slug: String,
    pub blocks: serde_json::Value,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub sites: Vec<SiteRecord>,
    #[serde(default)]
    pub parents: Vec<ParentRecord>,
}

impl Snapshot {
    pub async fn read(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        let snapshot: Snapshot = serde_json::from_str(&raw)
            .with_context(|| format!("Malformed snapshot {}", path.display()))?;
        info!(
            "[Snapshot] Read {} sites and {} parents from {}",
            snapshot.sites.len(),
            snapshot.parents.len(),
            path.display()
        );
        Ok(snapshot)
    }

    /// Write to `path` through a temporary sibling file so a crash never
    /// leaves a truncated snapshot behind.
    pub async fn write(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize snapshot")?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, path)
            .await
            .with_context(|| format!("Failed to move snapshot into {}", path.display()))?;
        info!("[Snapshot] Wrote {}", path.display());
        Ok(())
    }
}
