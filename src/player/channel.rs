/// One-way message channels to embedded players
use super::PlayerHandle;
use crate::dom::NodeId;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc;
use tracing::{debug, info};

/// A message as it was handed to the channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedMessage {
    pub player: NodeId,
    pub payload: String,
    pub target_origin: String,
}

/// Fire-and-forget delivery into a player's execution context.
///
/// Implementations must not block and must not report failure.
pub trait MessageChannel: Send + Sync {
    fn post_message(&self, player: &PlayerHandle, payload: &str, target_origin: &str);
}

/// Keeps every posted message; clones share the same log
#[derive(Debug, Clone, Default)]
pub struct RecordingChannel {
    messages: Arc<Mutex<Vec<PostedMessage>>>,
}

impl RecordingChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<PostedMessage> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<PostedMessage>> {
        match self.messages.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl MessageChannel for RecordingChannel {
    fn post_message(&self, player: &PlayerHandle, payload: &str, target_origin: &str) {
        self.lock().push(PostedMessage {
            player: player.node,
            payload: payload.to_string(),
            target_origin: target_origin.to_string(),
        });
    }
}

impl MessageChannel for mpsc::UnboundedSender<PostedMessage> {
    fn post_message(&self, player: &PlayerHandle, payload: &str, target_origin: &str) {
        let message = PostedMessage {
            player: player.node,
            payload: payload.to_string(),
            target_origin: target_origin.to_string(),
        };
        if self.send(message).is_err() {
            debug!("Player channel closed, dropping message for {:?}", player.node);
        }
    }
}

/// Logs messages instead of delivering them
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingChannel;

impl MessageChannel for TracingChannel {
    fn post_message(&self, player: &PlayerHandle, payload: &str, target_origin: &str) {
        info!("📨 postMessage to {} ({}): {}", player.src, target_origin, payload);
    }
}
