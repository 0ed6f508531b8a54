/// Scan-and-wrap pass that turns rendered timestamps into seek markers
use crate::config::Config;
use crate::dom::{DomTree, NodeId, SeekBinding};
use crate::player::{MessageChannel, PlayerHandle, PlayerLocator, SeekEmitter};
use crate::timestamps::match_timestamps;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// What one pass did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PassReport {
    /// Text containers visited
    pub containers: usize,
    /// Markers created
    pub markers: usize,
}

/// Wraps timestamp occurrences in marker elements and handles marker clicks
#[derive(Debug, Clone)]
pub struct Augmenter {
    container_class: String,
    marker_class: String,
    seconds_attribute: String,
    locator: PlayerLocator,
    emitter: SeekEmitter,
}

impl Augmenter {
    pub fn new(config: &Config, channel: Arc<dyn MessageChannel>) -> Self {
        Self {
            container_class: config.markup.container_class.clone(),
            marker_class: config.markup.marker_class.clone(),
            seconds_attribute: config.markup.seconds_attribute.clone(),
            locator: PlayerLocator::new(&config.markup, &config.player),
            emitter: SeekEmitter::new(&config.player, channel),
        }
    }

    /// Wrap every unwrapped timestamp in every text container at or below `root`.
    ///
    /// Running it again over unchanged content changes nothing.
    pub fn augment<D: DomTree + ?Sized>(&self, tree: &mut D, root: NodeId) -> PassReport {
        let containers = tree.elements_with_class(root, &self.container_class);
        let mut report = PassReport {
            containers: containers.len(),
            markers: 0,
        };

        for container in containers {
            report.markers += self.augment_container(tree, container);
        }

        if report.markers > 0 {
            debug!(
                "Wrapped {} timestamps across {} containers",
                report.markers, report.containers
            );
        }
        report
    }

    /// [`Self::augment`] over the whole tree
    pub fn augment_document<D: DomTree + ?Sized>(&self, tree: &mut D) -> PassReport {
        let root = tree.root();
        self.augment(tree, root)
    }

    fn augment_container<D: DomTree + ?Sized>(&self, tree: &mut D, container: NodeId) -> usize {
        let text = tree.text_content(container);
        let mut seen = HashSet::new();
        let literals: Vec<String> = match_timestamps(&text)
            .filter(|m| seen.insert(m.literal))
            .map(|m| m.literal.to_string())
            .collect();

        let mut wrapped = 0;
        for literal in &literals {
            // Earlier literals may have split nodes, so collect leaves afresh
            for text_node in tree.text_nodes(container) {
                let already_marked = tree
                    .parent(text_node)
                    .map_or(false, |parent| self.is_marker(&*tree, parent));
                // Leaves of a nested container are wrapped when that container is visited
                if already_marked || self.owning_container(&*tree, text_node) != Some(container) {
                    continue;
                }
                wrapped += self.wrap_occurrences(tree, text_node, literal, container);
            }
        }
        wrapped
    }

    /// Closest ancestor of `node` that is a text container
    fn owning_container<D: DomTree + ?Sized>(&self, tree: &D, node: NodeId) -> Option<NodeId> {
        let mut current = tree.parent(node);
        while let Some(candidate) = current {
            if tree.has_class(candidate, &self.container_class) {
                return Some(candidate);
            }
            current = tree.parent(candidate);
        }
        None
    }

    /// Split one text leaf around each occurrence of `literal`, last occurrence first
    fn wrap_occurrences<D: DomTree + ?Sized>(
        &self,
        tree: &mut D,
        text_node: NodeId,
        literal: &str,
        container: NodeId,
    ) -> usize {
        let Some(content) = tree.text(text_node).map(str::to_string) else {
            return 0;
        };
        let occurrences: Vec<(usize, usize, u64)> = match_timestamps(&content)
            .filter(|m| m.literal == literal)
            .map(|m| (m.start, m.end(), m.total_seconds))
            .collect();
        if occurrences.is_empty() {
            return 0;
        }

        let mut pieces = Vec::with_capacity(occurrences.len() * 2 + 1);
        let mut tail_end = content.len();
        for &(start, end, seconds) in occurrences.iter().rev() {
            if end < tail_end {
                pieces.push(tree.create_text(&content[end..tail_end]));
            }
            pieces.push(self.create_marker(tree, literal, seconds, container));
            tail_end = start;
        }
        if tail_end > 0 {
            pieces.push(tree.create_text(&content[..tail_end]));
        }
        pieces.reverse();

        tree.replace_with(text_node, &pieces);
        occurrences.len()
    }

    fn create_marker<D: DomTree + ?Sized>(
        &self,
        tree: &mut D,
        literal: &str,
        seconds: u64,
        container: NodeId,
    ) -> NodeId {
        let marker = tree.create_element("span");
        tree.set_attribute(marker, "class", &self.marker_class);
        tree.set_attribute(marker, &self.seconds_attribute, &seconds.to_string());
        let label = tree.create_text(literal);
        tree.append_child(marker, label);
        tree.bind_seek(marker, SeekBinding { seconds, container });
        marker
    }

    pub fn is_marker<D: DomTree + ?Sized>(&self, tree: &D, node: NodeId) -> bool {
        tree.has_class(node, &self.marker_class)
    }

    /// Attached markers at or below `scope`, in document order
    pub fn markers<D: DomTree + ?Sized>(&self, tree: &D, scope: NodeId) -> Vec<NodeId> {
        tree.elements_with_class(scope, &self.marker_class)
    }

    /// Click on a marker: find the player for its container and seek it.
    ///
    /// Returns the player that was commanded, `None` when the node is not a bound
    /// marker or no player could be found.
    pub fn activate<D: DomTree + ?Sized>(&self, tree: &mut D, marker: NodeId) -> Option<PlayerHandle> {
        let Some(binding) = tree.seek_binding(marker) else {
            debug!("Click on {:?} has no seek binding", marker);
            return None;
        };

        match self.locator.locate(&*tree, binding.container) {
            Some(player) => {
                debug!("⏩ Seeking {:?} to {}s", player.node, binding.seconds);
                self.emitter.seek(tree, &player, binding.seconds);
                Some(player)
            }
            None => {
                warn!(
                    "No video player found for timestamp at {}s (container {:?})",
                    binding.seconds, binding.container
                );
                None
            }
        }
    }

    /// Replace every marker at or below `scope` with a plain text node of the same text
    pub fn unwrap_markers<D: DomTree + ?Sized>(&self, tree: &mut D, scope: NodeId) -> usize {
        let markers = self.markers(&*tree, scope);
        for marker in &markers {
            let text = tree.text_content(*marker);
            tree.unbind_seek(*marker);
            let plain = tree.create_text(&text);
            tree.replace_with(*marker, &[plain]);
        }
        markers.len()
    }
}
