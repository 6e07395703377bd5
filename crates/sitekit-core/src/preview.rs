//! Read-only preview projection of a block list (including unsaved edits).

use serde::Serialize;

use sitekit_api::{Block, BlockId, BlockType};

use crate::schema::SchemaRegistry;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreviewNode {
    pub id: BlockId,
    pub block_type: BlockType,
    pub label: String,
    pub summary: String,
    pub protected: bool,
}

/// Project blocks in render order into preview nodes.
pub fn render_preview(registry: &SchemaRegistry, blocks: &[Block]) -> Vec<PreviewNode> {
    blocks
        .iter()
        .map(|block| {
            let block_type = block.block_type();
            let label = registry
                .definition(block_type)
                .map(|d| d.label.to_string())
                .unwrap_or_else(|| block_type.to_string());
            PreviewNode {
                id: block.id.clone(),
                block_type,
                label,
                summary: block.content.summary(),
                protected: block_type.is_protected(),
            }
        })
        .collect()
}

/// Plain-text outline, one numbered line per node.
pub fn render_outline(nodes: &[PreviewNode]) -> String {
    let mut out = String::new();
    for (i, node) in nodes.iter().enumerate() {
        let lock = if node.protected { " [layout]" } else { "" };
        out.push_str(&format!("{:>3}. {}{}: {}\n", i + 1, node.label, lock, node.summary));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sitekit_api::BlockContent;

    #[test]
    fn outline_lists_blocks_in_order() {
        let registry = SchemaRegistry::builtin();
        let blocks = vec![
            Block::with_id("n", BlockContent::default_for(BlockType::Navigation)),
            Block::with_id("h", BlockContent::default_for(BlockType::Hero)),
        ];
        let nodes = render_preview(&registry, &blocks);
        assert_eq!(nodes[0].label, "Navigation");
        assert!(nodes[0].protected);

        let outline = render_outline(&nodes);
        assert_eq!(
            outline,
            "  1. Navigation [layout]: My Site (1 links)\n  2. Hero: Welcome to our site\n"
        );
    }
}
