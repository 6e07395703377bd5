//! In-memory block lists keyed by parent slug.
//!
//! Several parents can be cached at once (e.g. every page of a site). Each
//! slug maps to an ordered list whose block ids are unique, and no block id
//! is held under two slugs at the same time.

use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::debug;

use sitekit_api::{Block, BlockId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Block '{id}' appears more than once in '{slug}'")]
    DuplicateBlockId { id: BlockId, slug: String },

    #[error("Block '{id}' is already held by '{other_slug}'")]
    BlockHeldElsewhere { id: BlockId, other_slug: String },

    #[error("Slug '{0}' already holds blocks")]
    SlugOccupied(String),
}

/// Ordered block lists for every parent cached on the client.
#[derive(Debug, Clone, Default)]
pub struct BlockStore {
    lists: HashMap<String, Vec<Block>>,
}

impl BlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ordered blocks for `slug`; empty if the slug was never seen.
    pub fn blocks_for(&self, slug: &str) -> &[Block] {
        self.lists.get(slug).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Replace the list for `slug` wholesale.
    pub fn set_blocks_for(&mut self, slug: &str, blocks: Vec<Block>) -> Result<(), StoreError> {
        let mut seen = HashSet::with_capacity(blocks.len());
        for block in &blocks {
            if !seen.insert(block.id.as_str()) {
                return Err(StoreError::DuplicateBlockId {
                    id: block.id.clone(),
                    slug: slug.to_string(),
                });
            }
        }

        for (other_slug, list) in &self.lists {
            if other_slug == slug {
                continue;
            }
            if let Some(clash) = list.iter().find(|b| seen.contains(b.id.as_str())) {
                return Err(StoreError::BlockHeldElsewhere {
                    id: clash.id.clone(),
                    other_slug: other_slug.clone(),
                });
            }
        }

        debug!("[BlockStore] '{}' now holds {} blocks", slug, blocks.len());
        self.lists.insert(slug.to_string(), blocks);
        Ok(())
    }

    /// Re-key a parent's list after the parent was renamed.
    ///
    /// Unseen `old_slug` and `old_slug == new_slug` are no-ops. The move is
    /// refused when `new_slug` already holds blocks.
    pub fn move_blocks(&mut self, old_slug: &str, new_slug: &str) -> Result<(), StoreError> {
        if old_slug == new_slug || !self.lists.contains_key(old_slug) {
            return Ok(());
        }
        if self.lists.get(new_slug).is_some_and(|l| !l.is_empty()) {
            return Err(StoreError::SlugOccupied(new_slug.to_string()));
        }
        if let Some(list) = self.lists.remove(old_slug) {
            debug!(
                "[BlockStore] Moved {} blocks from '{}' to '{}'",
                list.len(),
                old_slug,
                new_slug
            );
            self.lists.insert(new_slug.to_string(), list);
        }
        Ok(())
    }

    /// Drop a slug and return its blocks.
    pub fn remove_slug(&mut self, slug: &str) -> Vec<Block> {
        self.lists.remove(slug).unwrap_or_default()
    }

    /// Remove the given ids from `slug`'s list, returning the removed blocks.
    pub fn remove_ids(&mut self, slug: &str, ids: &BTreeSet<BlockId>) -> Vec<Block> {
        let Some(list) = self.lists.get_mut(slug) else {
            return Vec::new();
        };
        let (removed, kept): (Vec<Block>, Vec<Block>) =
            list.drain(..).partition(|b| ids.contains(&b.id));
        *list = kept;
        removed
    }

    /// Find a block and the slug holding it.
    pub fn find(&self, id: &str) -> Option<(&str, &Block)> {
        self.lists.iter().find_map(|(slug, list)| {
            list.iter()
                .find(|b| b.id.as_str() == id)
                .map(|b| (slug.as_str(), b))
        })
    }

    /// Mutable access for in-place content edits. Callers must not change ids.
    pub(crate) fn find_mut(&mut self, id: &str) -> Option<&mut Block> {
        self.lists
            .values_mut()
            .find_map(|list| list.iter_mut().find(|b| b.id.as_str() == id))
    }

    pub fn slugs(&self) -> impl Iterator<Item = &str> {
        self.lists.keys().map(String::as_str)
    }
}

/// Derive a URL slug from a title: lowercase ASCII alphanumerics joined by `-`.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for ch in title.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}
