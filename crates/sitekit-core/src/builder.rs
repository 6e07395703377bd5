//! Builder state controller
//!
//! Mediates every user edit to the block lists of the parents being edited
//! before the edits are committed:
//! - selection of the block shown in the content panel
//! - shallow content edits
//! - staged deletions (hidden immediately, removed on save)
//! - drag-and-drop reordering and block insertion
//! - the single save that commits all of the above
//!
//! All methods take `&self`; state sits behind a mutex that is never held
//! across an `.await`. The only concurrency guard is the `saving` flag: a
//! save started while another one is running is rejected.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};

use sitekit_api::{Block, BlockId, BlockMap, BlockType, FieldDeltas};

use crate::config::BuilderConfig;
use crate::diff::{normalize_order, plan_save};
use crate::error::{BuilderError, BuilderResult};
use crate::gateway::{BlockGateway, SessionContext};
use crate::preview::{render_preview, PreviewNode};
use crate::schema::SchemaRegistry;
use crate::status::SaveStatus;
use crate::store::BlockStore;

/// Summary of a completed save.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveReport {
    /// Blocks created or changed by the save.
    pub written: usize,
    /// Blocks removed from the stored collection.
    pub deleted: usize,
}

impl SaveReport {
    pub fn is_noop(&self) -> bool {
        self.written == 0 && self.deleted == 0
    }
}

#[derive(Default)]
struct BuilderState {
    store: BlockStore,
    /// Last collection known to be persisted, per slug.
    committed: HashMap<String, BlockMap>,
    selected_id: Option<BlockId>,
    /// Copy of the selected block for the content panel.
    selected: Option<Block>,
    pending_deletions: BTreeSet<BlockId>,
    status: SaveStatus,
}

impl BuilderState {
    fn visible(&self, slug: &str) -> Vec<Block> {
        self.store
            .blocks_for(slug)
            .iter()
            .filter(|b| !self.pending_deletions.contains(&b.id))
            .cloned()
            .collect()
    }

    fn staged(&self, slug: &str) -> Vec<Block> {
        self.store
            .blocks_for(slug)
            .iter()
            .filter(|b| self.pending_deletions.contains(&b.id))
            .cloned()
            .collect()
    }

    /// Write a new visible order back, keeping staged blocks after it.
    fn write_visible(&mut self, slug: &str, mut visible: Vec<Block>) -> BuilderResult<()> {
        normalize_order(&mut visible);
        let offset = visible.len();
        let mut staged = self.staged(slug);
        for (i, block) in staged.iter_mut().enumerate() {
            block.display_order = (offset + i) as u32;
        }
        visible.extend(staged);
        self.store.set_blocks_for(slug, visible)?;
        self.refresh_selection();
        Ok(())
    }

    fn refresh_selection(&mut self) {
        self.selected = self
            .selected_id
            .as_ref()
            .and_then(|id| self.store.find(id.as_str()))
            .map(|(_, b)| b.clone());
    }

    fn clear_selection_if(&mut self, id: &str) {
        if self.selected_id.as_ref().is_some_and(|s| s.as_str() == id) {
            self.selected_id = None;
            self.selected = None;
        }
    }
}

/// Clears the saving flag when a save finishes, however it finishes.
struct SavingGuard<'a>(&'a AtomicBool);

impl<'a> SavingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| SavingGuard(flag))
    }
}

impl Drop for SavingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Edits the block lists of one session's parents and commits them.
pub struct BlockBuilder {
    registry: Arc<SchemaRegistry>,
    gateway: Arc<dyn BlockGateway>,
    session: SessionContext,
    config: BuilderConfig,
    state: Mutex<BuilderState>,
    saving: AtomicBool,
}

impl BlockBuilder {
    pub fn new(
        registry: Arc<SchemaRegistry>,
        gateway: Arc<dyn BlockGateway>,
        session: SessionContext,
    ) -> Self {
        Self::with_config(registry, gateway, session, BuilderConfig::default())
    }

    pub fn with_config(
        registry: Arc<SchemaRegistry>,
        gateway: Arc<dyn BlockGateway>,
        session: SessionContext,
        config: BuilderConfig,
    ) -> Self {
        Self {
            registry,
            gateway,
            session,
            config,
            state: Mutex::new(BuilderState::default()),
            saving: AtomicBool::new(false),
        }
    }

    fn state(&self) -> MutexGuard<'_, BuilderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    // -------------------------------------------------------------------------
    // Loading and store access
    // -------------------------------------------------------------------------

    /// Pull a parent's blocks from the gateway into `slug`.
    ///
    /// Replaces any local draft for the slug and forgets its staged deletions.
    /// Sparse stored orders are made dense locally; the next save writes
    /// them back.
    pub async fn load(&self, slug: &str, parent_id: &str) -> BuilderResult<Vec<Block>> {
        let map = self
            .gateway
            .load_blocks(&self.session, parent_id)
            .await
            .map_err(|e| {
                warn!("[BlockBuilder] Failed to load '{}': {}", parent_id, e);
                BuilderError::from(e)
            })?;

        let mut blocks = map.clone().into_ordered();
        normalize_order(&mut blocks);
        let mut state = self.state();
        let previous: Vec<BlockId> = state
            .store
            .blocks_for(slug)
            .iter()
            .map(|b| b.id.clone())
            .collect();
        state.store.set_blocks_for(slug, blocks.clone())?;
        for id in previous {
            state.pending_deletions.remove(&id);
        }
        state.committed.insert(slug.to_string(), map);
        state.refresh_selection();

        info!("[BlockBuilder] Loaded {} blocks into '{}'", blocks.len(), slug);
        Ok(blocks)
    }

    /// Every block of `slug`, including staged deletions.
    pub fn all_blocks(&self, slug: &str) -> Vec<Block> {
        self.state().store.blocks_for(slug).to_vec()
    }

    /// Blocks of `slug` minus staged deletions. The only list to render.
    pub fn visible_blocks(&self, slug: &str) -> Vec<Block> {
        self.state().visible(slug)
    }

    pub fn preview(&self, slug: &str) -> Vec<PreviewNode> {
        render_preview(&self.registry, &self.visible_blocks(slug))
    }

    /// Re-key a parent's draft after its slug changed.
    pub fn rename_parent(&self, old_slug: &str, new_slug: &str) -> BuilderResult<()> {
        let mut state = self.state();
        state.store.move_blocks(old_slug, new_slug)?;
        if old_slug != new_slug {
            if let Some(committed) = state.committed.remove(old_slug) {
                state.committed.insert(new_slug.to_string(), committed);
            }
        }
        debug!("[BlockBuilder] Renamed '{}' to '{}'", old_slug, new_slug);
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Selection
    // -------------------------------------------------------------------------

    /// Select a block for the content panel. A staged block may be selected
    /// even though it is not visible.
    pub fn select_block(&self, id: &str) {
        let mut state = self.state();
        state.selected_id = Some(BlockId::from(id));
        state.refresh_selection();
    }

    pub fn clear_selection(&self) {
        let mut state = self.state();
        state.selected_id = None;
        state.selected = None;
    }

    pub fn selected_id(&self) -> Option<BlockId> {
        self.state().selected_id.clone()
    }

    /// Snapshot of the selected block as of the last edit.
    pub fn selected_block(&self) -> Option<Block> {
        self.state().selected.clone()
    }

    // -------------------------------------------------------------------------
    // Local edits
    // -------------------------------------------------------------------------

    /// Shallow-merge `deltas` into a block's content.
    ///
    /// Returns `Ok(None)` without changes if the block does not exist, and a
    /// validation error if a delta does not fit the block type.
    pub fn update_content(&self, block_id: &str, deltas: &FieldDeltas) -> BuilderResult<Option<Block>> {
        let mut state = self.state();
        let Some(block) = state.store.find_mut(block_id) else {
            debug!("[BlockBuilder] update_content: '{}' not present", block_id);
            return Ok(None);
        };

        block.content = block.content.merged(deltas)?;
        let updated = block.clone();
        if state.selected_id.as_ref() == Some(&updated.id) {
            state.selected = Some(updated.clone());
        }

        debug!(
            "[BlockBuilder] Updated {} field(s) of '{}'",
            deltas.len(),
            block_id
        );
        Ok(Some(updated))
    }

    /// Hide a block now and delete it on the next save.
    pub fn stage_delete(&self, block_id: &str) -> BuilderResult<()> {
        let mut state = self.state();
        let block_type = state
            .store
            .find(block_id)
            .map(|(_, b)| b.block_type())
            .ok_or_else(|| BuilderError::BlockNotFound(BlockId::from(block_id)))?;

        if let Some(reason) = block_type.protection() {
            warn!("[BlockBuilder] Refusing to delete {} block '{}'", block_type, block_id);
            return Err(BuilderError::ProtectedBlock { block_type, reason });
        }

        state.pending_deletions.insert(BlockId::from(block_id));
        state.clear_selection_if(block_id);
        debug!("[BlockBuilder] Staged '{}' for deletion", block_id);
        Ok(())
    }

    /// Take a block back out of the pending deletions. Returns whether it was staged.
    pub fn unstage_delete(&self, block_id: &str) -> bool {
        self.state().pending_deletions.remove(block_id)
    }

    pub fn pending_deletions(&self) -> BTreeSet<BlockId> {
        self.state().pending_deletions.clone()
    }

    /// Apply a drag-and-drop result: `order` is the full new order of the
    /// visible blocks of `slug`.
    pub fn reorder(&self, slug: &str, order: &[BlockId]) -> BuilderResult<Vec<Block>> {
        let mut state = self.state();
        let visible = state.visible(slug);

        if order.len() != visible.len() {
            return Err(BuilderError::InvalidOrder(format!(
                "expected {} blocks, got {}",
                visible.len(),
                order.len()
            )));
        }

        let mut by_id: HashMap<&str, &Block> =
            visible.iter().map(|b| (b.id.as_str(), b)).collect();
        let mut reordered = Vec::with_capacity(order.len());
        for id in order {
            let block = by_id
                .remove(id.as_str())
                .ok_or_else(|| BuilderError::InvalidOrder(format!("'{}' is not a visible block", id)))?;
            reordered.push(block.clone());
        }

        for (index, block) in visible.iter().enumerate() {
            if let Some(reason) = block.block_type().protection() {
                if reordered[index].id != block.id {
                    warn!("[BlockBuilder] Refusing to move {} block '{}'", block.block_type(), block.id);
                    return Err(BuilderError::ProtectedBlock {
                        block_type: block.block_type(),
                        reason,
                    });
                }
            }
        }

        state.write_visible(slug, reordered)?;
        debug!("[BlockBuilder] Reordered {} blocks in '{}'", order.len(), slug);
        Ok(state.visible(slug))
    }

    /// Instantiate a block of type `tag`, place it and select it.
    ///
    /// Content blocks go right before the footer when there is one,
    /// otherwise at the end. A navigation block always goes first and a
    /// footer last; only one of each may exist.
    pub fn add_block(&self, slug: &str, tag: &str, overrides: &FieldDeltas) -> BuilderResult<Block> {
        let block_type =
            BlockType::parse(tag).ok_or_else(|| BuilderError::UnknownBlockType(tag.to_string()))?;

        let block = self.registry.create_instance(tag, overrides).ok_or_else(|| {
            BuilderError::Validation(vec![format!("Invalid content for '{}' block", tag)])
        })?;
        if !overrides.is_empty() {
            let report = self.registry.validate_content(&block.content);
            if !report.valid {
                return Err(BuilderError::Validation(report.errors));
            }
        }

        let mut state = self.state();
        let mut visible = state.visible(slug);

        if visible.len() >= self.config.max_blocks_per_parent {
            return Err(BuilderError::TooManyBlocks(self.config.max_blocks_per_parent));
        }
        if block_type.is_protected() && visible.iter().any(|b| b.block_type() == block_type) {
            return Err(BuilderError::DuplicateStructuralBlock(block_type));
        }

        let position = match block_type {
            BlockType::Navigation => 0,
            BlockType::Footer => visible.len(),
            _ => visible
                .iter()
                .position(|b| b.block_type() == BlockType::Footer)
                .unwrap_or(visible.len()),
        };
        visible.insert(position, block.clone());

        let id = block.id.clone();
        state.selected_id = Some(id.clone());
        state.write_visible(slug, visible)?;

        let added = state
            .store
            .find(id.as_str())
            .map(|(_, b)| b.clone())
            .ok_or_else(|| BuilderError::BlockNotFound(id.clone()))?;
        info!("[BlockBuilder] Added {} block '{}' to '{}' at {}", block_type, id, slug, position);
        Ok(added)
    }

    // -------------------------------------------------------------------------
    // Commit
    // -------------------------------------------------------------------------

    /// Commit the draft of `slug` to the parent `parent_id`.
    ///
    /// Survivors and deletions are written with one `replace_blocks` call.
    /// On failure the staged deletions are kept so the save can be retried.
    /// A save started while another is running is rejected.
    pub async fn save(&self, slug: &str, parent_id: &str) -> BuilderResult<SaveReport> {
        let Some(_guard) = SavingGuard::acquire(&self.saving) else {
            warn!("[BlockBuilder] Save of '{}' rejected: already saving", slug);
            return Err(BuilderError::SaveInProgress);
        };

        let plan = {
            let mut state = self.state();
            let visible = state.visible(slug);
            let staged: BTreeSet<BlockId> = state
                .store
                .blocks_for(slug)
                .iter()
                .filter(|b| state.pending_deletions.contains(&b.id))
                .map(|b| b.id.clone())
                .collect();
            let committed = state.committed.get(slug).cloned().unwrap_or_default();
            state.status = SaveStatus::Saving;
            plan_save(&committed, &visible, &staged)
        };

        let report = SaveReport {
            written: plan.upserts.len(),
            deleted: plan.deletions.len(),
        };

        if !plan.is_noop() {
            info!(
                "[BlockBuilder] Saving '{}': {} upserts, {} deletions",
                slug, report.written, report.deleted
            );
            if let Err(e) = self
                .gateway
                .replace_blocks(&self.session, parent_id, plan.survivors.clone())
                .await
            {
                error!("[BlockBuilder] Save of '{}' failed: {}", slug, e);
                let err = BuilderError::from(e);
                self.state().status = SaveStatus::failed(err.user_message());
                return Err(err);
            }
        } else {
            debug!("[BlockBuilder] Nothing to save for '{}'", slug);
        }

        let mut state = self.state();
        state.store.remove_ids(slug, &plan.staged);
        let visible = state.visible(slug);
        state.write_visible(slug, visible)?;
        for id in &plan.staged {
            state.pending_deletions.remove(id);
            state.clear_selection_if(id.as_str());
        }
        state.committed.insert(slug.to_string(), plan.survivors);
        state.status = SaveStatus::saved();
        Ok(report)
    }

    /// Delete a block right away instead of staging it.
    ///
    /// The block disappears locally first; if the gateway call fails it is
    /// put back where it was.
    pub async fn delete_now(&self, slug: &str, parent_id: &str, block_id: &str) -> BuilderResult<()> {
        let (removed, index, persisted) = {
            let mut state = self.state();
            let index = state
                .store
                .blocks_for(slug)
                .iter()
                .position(|b| b.id.as_str() == block_id)
                .ok_or_else(|| BuilderError::BlockNotFound(BlockId::from(block_id)))?;
            let block_type = state.store.blocks_for(slug)[index].block_type();
            if let Some(reason) = block_type.protection() {
                return Err(BuilderError::ProtectedBlock { block_type, reason });
            }

            let ids = BTreeSet::from([BlockId::from(block_id)]);
            let removed = state.store.remove_ids(slug, &ids);
            state.pending_deletions.remove(block_id);
            state.clear_selection_if(block_id);
            let persisted = state
                .committed
                .get(slug)
                .is_some_and(|c| c.contains(block_id));
            (removed, index, persisted)
        };

        if !persisted {
            debug!("[BlockBuilder] Dropped unsaved block '{}'", block_id);
            return Ok(());
        }

        match self
            .gateway
            .delete_block(&self.session, parent_id, block_id)
            .await
        {
            Ok(()) => {
                if let Some(committed) = self.state().committed.get_mut(slug) {
                    committed.remove(block_id);
                }
                info!("[BlockBuilder] Deleted '{}' from '{}'", block_id, slug);
                Ok(())
            }
            Err(e) => {
                error!("[BlockBuilder] Delete of '{}' failed, restoring: {}", block_id, e);
                let mut state = self.state();
                let mut blocks = state.store.blocks_for(slug).to_vec();
                let at = index.min(blocks.len());
                for (offset, block) in removed.into_iter().enumerate() {
                    blocks.insert(at + offset, block);
                }
                state.store.set_blocks_for(slug, blocks)?;
                Err(BuilderError::from(e))
            }
        }
    }

    // -------------------------------------------------------------------------
    // Status
    // -------------------------------------------------------------------------

    pub fn is_saving(&self) -> bool {
        self.saving.load(Ordering::Acquire)
    }

    /// "Saving...", "Saved!" or "Error: ..."; finished states expire after
    /// `BuilderConfig::status_ttl`.
    pub fn status(&self) -> Option<String> {
        self.state().status.message(self.config.status_ttl)
    }
}
