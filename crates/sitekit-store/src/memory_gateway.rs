//! In-memory `BlockGateway`.
//!
//! Holds sites (with their owning user) and parents (pages, posts and
//! products). Every call re-checks that the session's user owns the site
//! the parent belongs to and that this site is the session's selected one;
//! anything else fails closed with `AccessDenied`.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use sitekit_api::{
    Block, BlockContent, BlockMap, BlockType, FieldDeltas, ParentId, ParentKind, SiteId, UserId,
};
use sitekit_core::{slugify, BlockGateway, GatewayError, GatewayResult, SchemaRegistry, SessionContext};

use crate::snapshot::{ParentRecord, SiteRecord, Snapshot};

/// Listing entry for a parent, without its blocks.
#[derive(Debug, Clone, PartialEq)]
pub struct ParentSummary {
    pub id: ParentId,
    pub kind: ParentKind,
    pub title: String,
    pub slug: String,
}

#[derive(Default)]
struct StoreData {
    sites: HashMap<SiteId, SiteRecord>,
    parents: HashMap<ParentId, ParentRecord>,
}

pub struct MemoryGateway {
    registry: Arc<SchemaRegistry>,
    data: RwLock<StoreData>,
    fail_next: AtomicBool,
}

impl MemoryGateway {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        info!("[MemoryGateway] Creating empty store");
        Self::from_snapshot(registry, Snapshot::default())
    }

    pub fn from_snapshot(registry: Arc<SchemaRegistry>, snapshot: Snapshot) -> Self {
        let data = StoreData {
            sites: snapshot.sites.into_iter().map(|s| (s.id, s)).collect(),
            parents: snapshot.parents.into_iter().map(|p| (p.id, p)).collect(),
        };
        Self {
            registry,
            data: RwLock::new(data),
            fail_next: AtomicBool::new(false),
        }
    }

    pub async fn load_snapshot(registry: Arc<SchemaRegistry>, path: &Path) -> anyhow::Result<Self> {
        let snapshot = Snapshot::read(path).await?;
        Ok(Self::from_snapshot(registry, snapshot))
    }

    pub async fn snapshot(&self) -> Snapshot {
        let data = self.data.read().await;
        let mut sites: Vec<SiteRecord> = data.sites.values().cloned().collect();
        let mut parents: Vec<ParentRecord> = data.parents.values().cloned().collect();
        sites.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));
        parents.sort_by(|a, b| a.slug.cmp(&b.slug).then(a.id.cmp(&b.id)));
        Snapshot { sites, parents }
    }

    pub async fn save_snapshot(&self, path: &Path) -> anyhow::Result<()> {
        self.snapshot().await.write(path).await
    }

    /// Make the next mutating call fail with a persistence error.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub async fn create_site(&self, owner: UserId, name: &str) -> SiteId {
        let id = SiteId::new();
        let record = SiteRecord {
            id,
            name: name.to_string(),
            owner,
        };
        self.data.write().await.sites.insert(id, record);
        info!("[MemoryGateway] Created site '{}' ({})", name, id);
        id
    }

    /// Create a page, post or product on the session's site.
    ///
    /// Posts start with one default rich-text block.
    pub async fn create_parent(
        &self,
        session: &SessionContext,
        kind: ParentKind,
        title: &str,
    ) -> GatewayResult<ParentId> {
        let mut data = self.data.write().await;
        check_site(&data, session)?;

        let slug = unique_slug(&data, session.site_id, kind, title, None)?;
        let mut blocks = BlockMap::new();
        if kind == ParentKind::Post {
            let now = Utc::now();
            let mut block = Block::new(BlockContent::default_for(BlockType::RichText));
            block.created_at = Some(now);
            block.updated_at = Some(now);
            blocks.insert(block);
        }

        let id = ParentId::new();
        let record = ParentRecord {
            id,
            site_id: session.site_id,
            kind,
            title: title.to_string(),
            slug: slug.clone(),
            blocks: encode("create_parent", &blocks)?,
        };
        data.parents.insert(id, record);
        info!("[MemoryGateway] Created {} '{}' ({})", kind, slug, id);
        Ok(id)
    }

    /// Change a parent's title and return its new slug.
    pub async fn rename_parent(
        &self,
        session: &SessionContext,
        parent_id: &str,
        title: &str,
    ) -> GatewayResult<String> {
        let mut data = self.data.write().await;
        let id = authorize(&data, session, parent_id)?;
        let kind = data.parents[&id].kind;
        let slug = unique_slug(&data, session.site_id, kind, title, Some(id))?;

        if let Some(record) = data.parents.get_mut(&id) {
            debug!("[MemoryGateway] Renaming '{}' to '{}'", record.slug, slug);
            record.title = title.to_string();
            record.slug = slug.clone();
        }
        Ok(slug)
    }

    /// Parents of the session's site, ordered by slug.
    pub async fn list_parents(&self, session: &SessionContext) -> GatewayResult<Vec<ParentSummary>> {
        let data = self.data.read().await;
        check_site(&data, session)?;

        let mut parents: Vec<ParentSummary> = data
            .parents
            .values()
            .filter(|p| p.site_id == session.site_id)
            .map(|p| ParentSummary {
                id: p.id,
                kind: p.kind,
                title: p.title.clone(),
                slug: p.slug.clone(),
            })
            .collect();
        parents.sort_by(|a, b| a.slug.cmp(&b.slug));
        Ok(parents)
    }

    fn take_failure(&self, operation: &'static str) -> GatewayResult<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            error!("[MemoryGateway] Injected failure in {}", operation);
            return Err(GatewayError::persistence(operation, "injected failure"));
        }
        Ok(())
    }

    /// Every validation error of the collection, prefixed with the block id.
    fn validate_collection(&self, blocks: &BlockMap) -> Vec<String> {
        let mut errors = Vec::new();
        for block in blocks.iter() {
            let report = self.registry.validate_content(&block.content);
            errors.extend(report.errors.into_iter().map(|e| format!("{}: {}", block.id, e)));
        }
        for block_type in sitekit_api::PROTECTED_BLOCK_TYPES {
            if blocks.iter().filter(|b| b.block_type() == block_type).count() > 1 {
                errors.push(format!("Only one {} block is allowed", block_type));
            }
        }
        errors
    }
}

fn check_site(data: &StoreData, session: &SessionContext) -> GatewayResult<()> {
    let site = data
        .sites
        .get(&session.site_id)
        .ok_or(GatewayError::NotFound { kind: "site" })?;
    if site.owner != session.user_id {
        warn!(
            "[MemoryGateway] User {} does not own site {}",
            session.user_id, session.site_id
        );
        return Err(GatewayError::AccessDenied);
    }
    Ok(())
}

/// Parse `parent_id` and check that the session may touch it.
fn authorize(data: &StoreData, session: &SessionContext, parent_id: &str) -> GatewayResult<ParentId> {
    let id = ParentId::parse(parent_id)?;
    let parent = data
        .parents
        .get(&id)
        .ok_or(GatewayError::NotFound { kind: "parent" })?;

    let owner = data.sites.get(&parent.site_id).map(|s| s.owner);
    if owner != Some(session.user_id) || parent.site_id != session.site_id {
        warn!(
            "[MemoryGateway] Denied user {} access to {} {}",
            session.user_id, parent.kind, id
        );
        return Err(GatewayError::AccessDenied);
    }
    Ok(id)
}

fn unique_slug(
    data: &StoreData,
    site_id: SiteId,
    kind: ParentKind,
    title: &str,
    except: Option<ParentId>,
) -> GatewayResult<String> {
    let base = slugify(title);
    if base.is_empty() {
        return Err(GatewayError::ValidationFailed(vec![
            "Title must contain letters or digits".to_string(),
        ]));
    }
    let taken = |slug: &str| {
        data.parents.values().any(|p| {
            p.site_id == site_id && p.kind == kind && p.slug == slug && Some(p.id) != except
        })
    };

    let mut slug = base.clone();
    let mut n = 2;
    while taken(&slug) {
        slug = format!("{}-{}", base, n);
        n += 1;
    }
    Ok(slug)
}

fn decode(operation: &'static str, record: &ParentRecord) -> GatewayResult<BlockMap> {
    if record.blocks.is_null() {
        return Ok(BlockMap::new());
    }
    serde_json::from_value(record.blocks.clone()).map_err(|e| {
        error!("[MemoryGateway] Stored blocks of {} are unreadable: {}", record.id, e);
        GatewayError::persistence(operation, e.to_string())
    })
}

fn encode(operation: &'static str, blocks: &BlockMap) -> GatewayResult<serde_json::Value> {
    serde_json::to_value(blocks).map_err(|e| GatewayError::persistence(operation, e.to_string()))
}

/// Carry `created_at` over from the stored version and bump `updated_at`
/// on blocks whose content or position changed.
fn stamp(previous: &BlockMap, blocks: BlockMap) -> BlockMap {
    let now = Utc::now();
    blocks
        .into_ordered()
        .into_iter()
        .map(|mut block| {
            match previous.get(block.id.as_str()) {
                Some(old) => {
                    block.created_at = old.created_at.or(block.created_at).or(Some(now));
                    let changed =
                        old.content != block.content || old.display_order != block.display_order;
                    block.updated_at = if changed { Some(now) } else { old.updated_at };
                }
                None => {
                    block.created_at = block.created_at.or(Some(now));
                    block.updated_at = Some(now);
                }
            }
            block
        })
        .collect()
}

#[async_trait]
impl BlockGateway for MemoryGateway {
    async fn load_blocks(&self, session: &SessionContext, parent_id: &str) -> GatewayResult<BlockMap> {
        let data = self.data.read().await;
        let id = authorize(&data, session, parent_id)?;
        let blocks = decode("load_blocks", &data.parents[&id])?;
        debug!("[MemoryGateway] Loaded {} blocks of {}", blocks.len(), id);
        Ok(blocks)
    }

    async fn replace_blocks(
        &self,
        session: &SessionContext,
        parent_id: &str,
        blocks: BlockMap,
    ) -> GatewayResult<()> {
        let mut data = self.data.write().await;
        let id = authorize(&data, session, parent_id)?;

        let errors = self.validate_collection(&blocks);
        if !errors.is_empty() {
            warn!("[MemoryGateway] Rejected blocks for {}: {:?}", id, errors);
            return Err(GatewayError::ValidationFailed(errors));
        }
        self.take_failure("replace_blocks")?;

        let previous = decode("replace_blocks", &data.parents[&id])?;
        let stamped = stamp(&previous, blocks);
        let value = encode("replace_blocks", &stamped)?;
        if let Some(record) = data.parents.get_mut(&id) {
            record.blocks = value;
        }
        info!("[MemoryGateway] Replaced blocks of {}: {} stored", id, stamped.len());
        Ok(())
    }

    async fn add_block(
        &self,
        session: &SessionContext,
        parent_id: &str,
        block_type: BlockType,
        content: FieldDeltas,
    ) -> GatewayResult<Block> {
        let mut data = self.data.write().await;
        let id = authorize(&data, session, parent_id)?;

        let content = BlockContent::default_for(block_type)
            .merged(&content)
            .map_err(|e| GatewayError::ValidationFailed(vec![e.to_string()]))?;
        let mut blocks = decode("add_block", &data.parents[&id])?;
        let order = blocks
            .iter()
            .map(|b| b.display_order.saturating_add(1))
            .max()
            .unwrap_or(0);
        let block = Block::new(content).at(order);
        blocks.insert(block.clone());

        let errors = self.validate_collection(&blocks);
        if !errors.is_empty() {
            return Err(GatewayError::ValidationFailed(errors));
        }
        self.take_failure("add_block")?;

        let previous = decode("add_block", &data.parents[&id])?;
        let stamped = stamp(&previous, blocks);
        let value = encode("add_block", &stamped)?;
        if let Some(record) = data.parents.get_mut(&id) {
            record.blocks = value;
        }
        info!("[MemoryGateway] Added {} block {} to {}", block_type, block.id, id);
        stamped
            .get(block.id.as_str())
            .cloned()
            .ok_or_else(|| GatewayError::persistence("add_block", "block missing after write"))
    }

    async fn delete_block(
        &self,
        session: &SessionContext,
        parent_id: &str,
        block_id: &str,
    ) -> GatewayResult<()> {
        let mut data = self.data.write().await;
        let id = authorize(&data, session, parent_id)?;

        let mut blocks = decode("delete_block", &data.parents[&id])?;
        if blocks.remove(block_id).is_none() {
            return Err(GatewayError::NotFound { kind: "block" });
        }
        self.take_failure("delete_block")?;

        let value = encode("delete_block", &blocks)?;
        if let Some(record) = data.parents.get_mut(&id) {
            record.blocks = value;
        }
        info!("[MemoryGateway] Deleted block {} from {}", block_id, id);
        Ok(())
    }
}
