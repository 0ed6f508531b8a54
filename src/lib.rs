/// YouTube timestamp sync
///
/// Keeps timestamps in a live, externally re-rendered note clickable: every
/// `m:ss` / `h:mm:ss` occurrence inside a text container is wrapped in a marker
/// that seeks the nearest embedded player, and a debounced mutation watcher
/// re-applies the wrapping whenever the host renders new content.

pub mod augment;
pub mod config;
pub mod dom;
pub mod error;
pub mod player;
pub mod plugin;
pub mod timestamps;
pub mod transcript;
pub mod watcher;

// Re-export main types for easy access
pub use crate::augment::{Augmenter, PassReport};
pub use crate::config::{Config, ConfigBuilder};
pub use crate::dom::{Document, DomTree, MutationSource, NodeId};
pub use crate::error::{Result, SyncError};
pub use crate::player::{MessageChannel, PlayerHandle, PlayerLocator, SeekEmitter};
pub use crate::plugin::TimestampSync;
pub use crate::timestamps::{format_timestamp, match_timestamps, parse_timestamp, TimestampToken};
pub use crate::watcher::{MutationWatcher, SharedTree, WatcherPhase};
