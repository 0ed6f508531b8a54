use super::NodeId;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Registration handle returned by [`super::MutationSource::observe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObserverId(pub u64);

/// Which changes an observer wants to hear about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObserveOptions {
    pub child_list: bool,
    pub character_data: bool,
    pub attributes: bool,
    /// Include changes below the target, not only on it
    pub subtree: bool,
}

impl ObserveOptions {
    /// Structural and text changes anywhere under the target
    pub fn content() -> Self {
        Self {
            child_list: true,
            character_data: true,
            attributes: false,
            subtree: true,
        }
    }

    pub fn wants(&self, kind: &MutationKind) -> bool {
        match kind {
            MutationKind::ChildList { .. } => self.child_list,
            MutationKind::CharacterData => self.character_data,
            MutationKind::Attributes { .. } => self.attributes,
        }
    }
}

impl Default for ObserveOptions {
    fn default() -> Self {
        Self::content()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationKind {
    ChildList {
        added: Vec<NodeId>,
        removed: Vec<NodeId>,
    },
    CharacterData,
    Attributes {
        name: String,
    },
}

/// One change notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MutationRecord {
    /// Node whose children, text or attributes changed
    pub target: NodeId,
    pub kind: MutationKind,
}

impl MutationRecord {
    /// Added nodes or changed text; removals alone never expose new timestamps
    pub fn introduces_content(&self) -> bool {
        match &self.kind {
            MutationKind::ChildList { added, .. } => !added.is_empty(),
            MutationKind::CharacterData => true,
            MutationKind::Attributes { .. } => false,
        }
    }
}

/// Receiving end of an observation
#[derive(Debug)]
pub struct MutationObserver {
    pub id: ObserverId,
    pub records: mpsc::UnboundedReceiver<MutationRecord>,
}

impl MutationObserver {
    /// Drop every queued record without waiting, returning how many there were
    pub fn take_records(&mut self) -> usize {
        let mut taken = 0;
        while self.records.try_recv().is_ok() {
            taken += 1;
        }
        taken
    }
}
