/// Arena-backed HTML document that records mutations for observers
use super::mutation::{MutationKind, MutationObserver, MutationRecord, ObserveOptions, ObserverId};
use super::{DomTree, MutationSource, NodeId, SeekBinding};
use scraper::{ElementRef, Html, Node};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::debug;

const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

#[derive(Debug, Clone)]
enum NodeKind {
    Document,
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct NodeData {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
}

#[derive(Debug)]
struct Registration {
    id: ObserverId,
    target: NodeId,
    options: ObserveOptions,
    sender: mpsc::UnboundedSender<MutationRecord>,
}

/// In-memory rendered document
///
/// Nodes are never freed; a removed node is only detached, so stale ids stay valid
/// to look at but are no longer reachable from the root.
#[derive(Debug)]
pub struct Document {
    nodes: Vec<NodeData>,
    root: NodeId,
    bindings: HashMap<NodeId, SeekBinding>,
    observers: Vec<Registration>,
    next_observer: u64,
}

impl Document {
    /// Create an empty document with no children
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeData {
                parent: None,
                children: Vec::new(),
                kind: NodeKind::Document,
            }],
            root: NodeId(0),
            bindings: HashMap::new(),
            observers: Vec::new(),
            next_observer: 0,
        }
    }

    /// Parse a full HTML document; missing `html`/`head`/`body` are synthesized
    pub fn parse_html(html: &str) -> Self {
        let parsed = Html::parse_document(html);
        let mut document = Self::new();
        let root = document.root;
        let html_element = parsed.root_element();
        let imported = document.import_element(html_element);
        document.attach(root, imported);
        debug!("Parsed document with {} nodes", document.nodes.len());
        document
    }

    /// Parse `html` as a fragment and append its top-level nodes to `parent`
    ///
    /// Observers see one child-list record per appended node, as a renderer
    /// inserting blocks one at a time would produce.
    pub fn append_html(&mut self, parent: NodeId, html: &str) -> Vec<NodeId> {
        let fragment = Html::parse_fragment(html);
        let wrapper = fragment.root_element();
        let mut appended = Vec::new();
        for child in wrapper.children() {
            let imported = match child.value() {
                Node::Text(text) => {
                    let text: &str = text;
                    Some(self.create_text(text))
                }
                Node::Element(_) => ElementRef::wrap(child).map(|el| self.import_element(el)),
                _ => None,
            };
            if let Some(node) = imported {
                self.append_child(parent, node);
                appended.push(node);
            }
        }
        appended
    }

    /// Replace the character data of a text node
    pub fn set_text(&mut self, node: NodeId, text: &str) {
        let changed = match self.nodes.get_mut(node.0).map(|n| &mut n.kind) {
            Some(NodeKind::Text(existing)) => {
                *existing = text.to_string();
                true
            }
            _ => false,
        };
        if changed {
            self.notify(MutationRecord {
                target: node,
                kind: MutationKind::CharacterData,
            });
        }
    }

    /// First `body` element, if the document has one
    pub fn body(&self) -> Option<NodeId> {
        self.first_with_tag("body")
    }

    pub fn first_with_tag(&self, tag: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|n| self.tag_name(*n) == Some(tag))
    }

    /// Elements with `tag` below `scope`, in document order
    pub fn elements_with_tag(&self, scope: NodeId, tag: &str) -> Vec<NodeId> {
        self.descendants(scope)
            .into_iter()
            .filter(|n| self.tag_name(*n) == Some(tag))
            .collect()
    }

    /// Serialize the whole document
    pub fn to_html(&self) -> String {
        self.inner_html(self.root)
    }

    /// Serialize `node` including its own tag
    pub fn outer_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.write_node(node, &mut out);
        out
    }

    /// Serialize the children of `node`
    pub fn inner_html(&self, node: NodeId) -> String {
        let mut out = String::new();
        for child in self.children(node) {
            self.write_node(child, &mut out);
        }
        out
    }

    fn write_node(&self, node: NodeId, out: &mut String) {
        let Some(data) = self.nodes.get(node.0) else {
            return;
        };
        match &data.kind {
            NodeKind::Document => {
                for child in &data.children {
                    self.write_node(*child, out);
                }
            }
            NodeKind::Text(text) => {
                let raw = data
                    .parent
                    .and_then(|p| self.tag_name(p))
                    .map_or(false, |tag| RAW_TEXT_ELEMENTS.contains(&tag));
                if raw {
                    out.push_str(text);
                } else {
                    out.push_str(&escape_text(text));
                }
            }
            NodeKind::Element { tag, attrs } => {
                out.push('<');
                out.push_str(tag);
                for (name, value) in attrs {
                    out.push(' ');
                    out.push_str(name);
                    out.push_str("=\"");
                    out.push_str(&escape_attribute(value));
                    out.push('"');
                }
                out.push('>');
                if VOID_ELEMENTS.contains(&tag.as_str()) {
                    return;
                }
                for child in &data.children {
                    self.write_node(*child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
    }

    fn import_element(&mut self, element: ElementRef<'_>) -> NodeId {
        let value = element.value();
        let attrs = value
            .attrs()
            .map(|(name, val)| (name.to_string(), val.to_string()))
            .collect();
        let id = self.push(NodeKind::Element {
            tag: value.name().to_string(),
            attrs,
        });

        for child in element.children() {
            match child.value() {
                Node::Text(text) => {
                    let text: &str = text;
                    let text_id = self.push(NodeKind::Text(text.to_string()));
                    self.attach(id, text_id);
                }
                Node::Element(_) => {
                    if let Some(child_element) = ElementRef::wrap(child) {
                        let child_id = self.import_element(child_element);
                        self.attach(id, child_id);
                    }
                }
                _ => {}
            }
        }
        id
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            parent: None,
            children: Vec::new(),
            kind,
        });
        id
    }

    /// Link without notifying; only used while building detached subtrees
    fn attach(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
    }

    /// Unlink `node` from its parent, returning the old parent
    fn detach(&mut self, node: NodeId) -> Option<NodeId> {
        let parent = self.nodes.get(node.0)?.parent?;
        self.nodes[parent.0].children.retain(|c| *c != node);
        self.nodes[node.0].parent = None;
        Some(parent)
    }

    fn detach_notify(&mut self, node: NodeId) {
        if let Some(old_parent) = self.detach(node) {
            self.notify(MutationRecord {
                target: old_parent,
                kind: MutationKind::ChildList {
                    added: Vec::new(),
                    removed: vec![node],
                },
            });
        }
    }

    /// Drop seek bindings of `node` and everything below it once it leaves the tree
    fn release_bindings(&mut self, node: NodeId) {
        if self.bindings.is_empty() {
            return;
        }
        self.bindings.remove(&node);
        for descendant in self.descendants(node) {
            self.bindings.remove(&descendant);
        }
    }

    fn is_valid(&self, node: NodeId) -> bool {
        node.0 < self.nodes.len()
    }

    fn notify(&mut self, record: MutationRecord) {
        if self.observers.is_empty() {
            return;
        }
        let interested: Vec<bool> = self
            .observers
            .iter()
            .map(|reg| {
                reg.options.wants(&record.kind)
                    && (reg.target == record.target
                        || (reg.options.subtree && self.contains(reg.target, record.target)))
            })
            .collect();

        let mut index = 0;
        self.observers.retain(|reg| {
            let deliver = interested[index];
            index += 1;
            // A dropped receiver unregisters itself
            !deliver || reg.sender.send(record.clone()).is_ok()
        });
    }
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl DomTree for Document {
    fn root(&self) -> NodeId {
        self.root
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0).and_then(|n| n.parent)
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .get(node.0)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    fn tag_name(&self, node: NodeId) -> Option<&str> {
        match &self.nodes.get(node.0)?.kind {
            NodeKind::Element { tag, .. } => Some(tag.as_str()),
            _ => None,
        }
    }

    fn text(&self, node: NodeId) -> Option<&str> {
        match &self.nodes.get(node.0)?.kind {
            NodeKind::Text(text) => Some(text.as_str()),
            _ => None,
        }
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.nodes.get(node.0)?.kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        let changed = match self.nodes.get_mut(node.0).map(|n| &mut n.kind) {
            Some(NodeKind::Element { attrs, .. }) => {
                match attrs.iter_mut().find(|(n, _)| n == name) {
                    Some(existing) => existing.1 = value.to_string(),
                    None => attrs.push((name.to_string(), value.to_string())),
                }
                true
            }
            _ => false,
        };
        if changed {
            self.notify(MutationRecord {
                target: node,
                kind: MutationKind::Attributes {
                    name: name.to_string(),
                },
            });
        }
    }

    fn create_element(&mut self, tag: &str) -> NodeId {
        self.push(NodeKind::Element {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
        })
    }

    fn create_text(&mut self, text: &str) -> NodeId {
        self.push(NodeKind::Text(text.to_string()))
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if !self.is_valid(parent) || !self.is_valid(child) || self.contains(child, parent) {
            return;
        }
        self.detach_notify(child);
        self.attach(parent, child);
        self.notify(MutationRecord {
            target: parent,
            kind: MutationKind::ChildList {
                added: vec![child],
                removed: Vec::new(),
            },
        });
    }

    fn replace_with(&mut self, node: NodeId, replacements: &[NodeId]) {
        let Some(parent) = self.parent(node) else {
            return;
        };
        // Unknown ids and ancestors of the insertion point are skipped
        let replacements: Vec<NodeId> = replacements
            .iter()
            .copied()
            .filter(|r| self.is_valid(*r) && !self.contains(*r, parent))
            .collect();
        let replacements = replacements.as_slice();
        for replacement in replacements {
            if *replacement != node {
                self.detach_notify(*replacement);
            }
        }
        let Some(position) = self.nodes[parent.0].children.iter().position(|c| *c == node) else {
            return;
        };
        self.nodes[node.0].parent = None;
        self.nodes[parent.0]
            .children
            .splice(position..=position, replacements.iter().copied());
        for replacement in replacements {
            self.nodes[replacement.0].parent = Some(parent);
        }
        if !replacements.contains(&node) {
            self.release_bindings(node);
        }
        self.notify(MutationRecord {
            target: parent,
            kind: MutationKind::ChildList {
                added: replacements.to_vec(),
                removed: vec![node],
            },
        });
    }

    fn remove(&mut self, node: NodeId) {
        if self.parent(node).is_some() {
            self.detach_notify(node);
            self.release_bindings(node);
        }
    }

    fn bind_seek(&mut self, node: NodeId, binding: SeekBinding) {
        self.bindings.insert(node, binding);
    }

    fn seek_binding(&self, node: NodeId) -> Option<SeekBinding> {
        self.bindings.get(&node).copied()
    }

    fn unbind_seek(&mut self, node: NodeId) -> Option<SeekBinding> {
        self.bindings.remove(&node)
    }

    fn head(&self) -> Option<NodeId> {
        self.first_with_tag("head")
    }
}

impl MutationSource for Document {
    fn observe(&mut self, target: NodeId, options: ObserveOptions) -> MutationObserver {
        let (sender, records) = mpsc::unbounded_channel();
        let id = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.push(Registration {
            id,
            target,
            options,
            sender,
        });
        debug!("Observer {:?} registered on {:?}", id, target);
        MutationObserver { id, records }
    }

    fn disconnect(&mut self, observer: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|reg| reg.id != observer);
        before != self.observers.len()
    }

    fn observer_count(&self) -> usize {
        self.observers.len()
    }
}

pub(crate) fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn escape_attribute(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}
