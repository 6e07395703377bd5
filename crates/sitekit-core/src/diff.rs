//! Draft vs committed diff
//!
//! Computes what a save has to write by comparing the builder's draft (the
//! visible blocks plus staged deletions) with the last committed collection.

use std::collections::BTreeSet;

use sitekit_api::{Block, BlockId, BlockMap};

/// Result of comparing the draft with the committed collection.
#[derive(Debug, Clone, PartialEq)]
pub struct SavePlan {
    /// Final collection to persist, with `display_order` normalized.
    pub survivors: BlockMap,
    /// Survivors that are new or differ from their committed version.
    pub upserts: Vec<BlockId>,
    /// Committed blocks absent from the survivors.
    pub deletions: Vec<BlockId>,
    /// Staged ids covered by this plan.
    pub staged: BTreeSet<BlockId>,
}

impl SavePlan {
    /// Nothing to write.
    pub fn is_noop(&self) -> bool {
        self.upserts.is_empty() && self.deletions.is_empty()
    }
}

/// Normalize `display_order` to each block's index in `blocks`.
pub fn normalize_order(blocks: &mut [Block]) {
    for (index, block) in blocks.iter_mut().enumerate() {
        block.display_order = index as u32;
    }
}

/// Compute the save plan for one parent.
///
/// `visible` is the draft list with staged deletions already filtered out,
/// in render order. Survivors and deletions are disjoint by construction.
pub fn plan_save(committed: &BlockMap, visible: &[Block], staged: &BTreeSet<BlockId>) -> SavePlan {
    let mut survivors: Vec<Block> = visible
        .iter()
        .filter(|b| !staged.contains(&b.id))
        .cloned()
        .collect();
    normalize_order(&mut survivors);

    let upserts = survivors
        .iter()
        .filter(|b| !committed.get(b.id.as_str()).is_some_and(|c| same_block(c, b)))
        .map(|b| b.id.clone())
        .collect();

    let survivors: BlockMap = survivors.into_iter().collect();
    let deletions = committed
        .iter()
        .filter(|b| !survivors.contains(b.id.as_str()))
        .map(|b| b.id.clone())
        .collect();

    SavePlan {
        survivors,
        upserts,
        deletions,
        staged: staged.clone(),
    }
}

/// Content and position equality; timestamps are owned by the store.
fn same_block(a: &Block, b: &Block) -> bool {
    a.id == b.id && a.display_order == b.display_order && a.content == b.content
}
