/// Finds the embedded player a timestamp most likely belongs to
use super::PlayerHandle;
use crate::config::{MarkupConfig, PlayerConfig};
use crate::dom::{DomTree, NodeId};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct PlayerLocator {
    block_class: String,
    provider_patterns: Vec<String>,
}

impl PlayerLocator {
    pub fn new(markup: &MarkupConfig, player: &PlayerConfig) -> Self {
        Self {
            block_class: markup.block_class.clone(),
            provider_patterns: player
                .provider_patterns
                .iter()
                .filter(|p| !p.trim().is_empty())
                .cloned()
                .collect(),
        }
    }

    /// Locate the player for `container`.
    ///
    /// Walks outward from the container; at every block level the siblings of that
    /// level (previous ones nearest first, then following ones) are searched,
    /// subtrees included. The first embed found wins. Without a hit, the first
    /// embed anywhere in the document is used. When several embeds share a level
    /// the first in that order is returned, which may not be the intended one.
    pub fn locate<D: DomTree + ?Sized>(&self, tree: &D, container: NodeId) -> Option<PlayerHandle> {
        let root = tree.root();
        let mut level = Some(container);

        while let Some(current) = level {
            if current == root {
                break;
            }
            if self.is_block(tree, current) {
                let siblings = tree
                    .previous_siblings(current)
                    .into_iter()
                    .chain(tree.next_siblings(current));
                for sibling in siblings {
                    if let Some(player) = self.find_in_subtree(tree, sibling) {
                        debug!("Found player {:?} next to {:?}", player, current);
                        return self.handle(tree, player);
                    }
                }
            }
            level = tree.parent(current);
        }

        let fallback = self.find_in_subtree(tree, root);
        if let Some(player) = fallback {
            debug!("Falling back to first player in document: {:?}", player);
        }
        fallback.and_then(|player| self.handle(tree, player))
    }

    /// An `iframe` whose `src` mentions a known provider
    pub fn is_player<D: DomTree + ?Sized>(&self, tree: &D, node: NodeId) -> bool {
        if tree.tag_name(node) != Some("iframe") {
            return false;
        }
        tree.attribute(node, "src").map_or(false, |src| {
            self.provider_patterns
                .iter()
                .any(|pattern| src.contains(pattern.as_str()))
        })
    }

    fn is_block<D: DomTree + ?Sized>(&self, tree: &D, node: NodeId) -> bool {
        if tree.tag_name(node).is_none() {
            return false;
        }
        self.block_class.is_empty() || tree.has_class(node, &self.block_class)
    }

    fn find_in_subtree<D: DomTree + ?Sized>(&self, tree: &D, node: NodeId) -> Option<NodeId> {
        if self.is_player(tree, node) {
            return Some(node);
        }
        tree.descendants(node)
            .into_iter()
            .find(|n| self.is_player(tree, *n))
    }

    fn handle<D: DomTree + ?Sized>(&self, tree: &D, node: NodeId) -> Option<PlayerHandle> {
        let src = tree.attribute(node, "src")?;
        Some(PlayerHandle {
            node,
            src: src.to_string(),
        })
    }
}
