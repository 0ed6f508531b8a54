/// Rendered document model
///
/// The synchronization core never talks to a concrete renderer. It works through
/// [`DomTree`] (navigation and text-leaf editing) and [`MutationSource`]
/// (subtree observation). [`Document`] is the arena-backed implementation used by
/// the harness binary and the tests.

pub mod document;
pub mod mutation;

pub use document::Document;
pub use mutation::{MutationKind, MutationObserver, MutationRecord, ObserveOptions, ObserverId};

use serde::{Deserialize, Serialize};

/// Address of a node inside a tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// Click handler payload attached to a timestamp marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeekBinding {
    /// Offset to seek to, in seconds
    pub seconds: u64,
    /// Text container the marker was created in; the player search starts here
    pub container: NodeId,
}

/// Read and edit access to a rendered tree of elements and text leaves
pub trait DomTree {
    fn root(&self) -> NodeId;

    fn parent(&self, node: NodeId) -> Option<NodeId>;

    fn children(&self, node: NodeId) -> Vec<NodeId>;

    /// Lowercase tag name, `None` for text and document nodes
    fn tag_name(&self, node: NodeId) -> Option<&str>;

    /// Character data, `Some` only for text nodes
    fn text(&self, node: NodeId) -> Option<&str>;

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str>;

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str);

    /// Create a detached element
    fn create_element(&mut self, tag: &str) -> NodeId;

    /// Create a detached text node
    fn create_text(&mut self, text: &str) -> NodeId;

    fn append_child(&mut self, parent: NodeId, child: NodeId);

    /// Replace `node` in its parent with `replacements`, in order
    fn replace_with(&mut self, node: NodeId, replacements: &[NodeId]);

    fn remove(&mut self, node: NodeId);

    fn bind_seek(&mut self, node: NodeId, binding: SeekBinding);

    fn seek_binding(&self, node: NodeId) -> Option<SeekBinding>;

    fn unbind_seek(&mut self, node: NodeId) -> Option<SeekBinding>;

    /// Where document-level stylesheets live
    fn head(&self) -> Option<NodeId>;

    fn is_text(&self, node: NodeId) -> bool {
        self.text(node).is_some()
    }

    fn has_class(&self, node: NodeId, class: &str) -> bool {
        self.attribute(node, "class")
            .map_or(false, |classes| classes.split_whitespace().any(|c| c == class))
    }

    /// Concatenated text of every text leaf under `node`
    fn text_content(&self, node: NodeId) -> String {
        if let Some(text) = self.text(node) {
            return text.to_string();
        }
        let mut content = String::new();
        for leaf in self.text_nodes(node) {
            if let Some(text) = self.text(leaf) {
                content.push_str(text);
            }
        }
        content
    }

    /// Every node below `node` in document order, `node` excluded
    fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(node).into_iter().rev().collect();
        while let Some(next) = stack.pop() {
            out.push(next);
            stack.extend(self.children(next).into_iter().rev());
        }
        out
    }

    fn text_nodes(&self, node: NodeId) -> Vec<NodeId> {
        self.descendants(node)
            .into_iter()
            .filter(|n| self.is_text(*n))
            .collect()
    }

    /// Elements carrying `class` at or below `scope`, in document order
    fn elements_with_class(&self, scope: NodeId, class: &str) -> Vec<NodeId> {
        let mut found = Vec::new();
        if self.has_class(scope, class) {
            found.push(scope);
        }
        found.extend(
            self.descendants(scope)
                .into_iter()
                .filter(|n| self.has_class(*n, class)),
        );
        found
    }

    fn find_by_id(&self, id: &str) -> Option<NodeId> {
        let root = self.root();
        self.descendants(root)
            .into_iter()
            .find(|n| self.attribute(*n, "id") == Some(id))
    }

    /// Siblings before `node`, nearest first
    fn previous_siblings(&self, node: NodeId) -> Vec<NodeId> {
        let Some(parent) = self.parent(node) else {
            return Vec::new();
        };
        let siblings = self.children(parent);
        match siblings.iter().position(|s| *s == node) {
            Some(index) => siblings[..index].iter().rev().copied().collect(),
            None => Vec::new(),
        }
    }

    /// Siblings after `node`, nearest first
    fn next_siblings(&self, node: NodeId) -> Vec<NodeId> {
        let Some(parent) = self.parent(node) else {
            return Vec::new();
        };
        let siblings = self.children(parent);
        match siblings.iter().position(|s| *s == node) {
            Some(index) => siblings[index + 1..].to_vec(),
            None => Vec::new(),
        }
    }

    /// True when `ancestor` is `node` or one of its ancestors
    fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(n) = current {
            if n == ancestor {
                return true;
            }
            current = self.parent(n);
        }
        false
    }
}

/// Subtree observation in the style of a DOM mutation observer
pub trait MutationSource {
    /// Start delivering records for changes under `target`
    fn observe(&mut self, target: NodeId, options: ObserveOptions) -> MutationObserver;

    /// Stop delivering to `observer`; false when it was not registered
    fn disconnect(&mut self, observer: ObserverId) -> bool;

    fn observer_count(&self) -> usize;
}
