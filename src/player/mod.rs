/// Embedded video player discovery and control
///
/// Players are third-party embeds the document happens to contain. They are
/// found by `src` substring, never owned, and only ever sent one-way messages.

pub mod channel;
pub mod emitter;
pub mod locator;

pub use channel::{MessageChannel, PostedMessage, RecordingChannel, TracingChannel};
pub use emitter::{with_api_flag, PlayerCommand, SeekEmitter};
pub use locator::PlayerLocator;

use crate::dom::NodeId;
use serde::{Deserialize, Serialize};

/// A located embed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerHandle {
    pub node: NodeId,
    /// `src` at the time the player was located
    pub src: String,
}
