/// Seek commands for embedded players
use super::{MessageChannel, PlayerHandle};
use crate::config::PlayerConfig;
use crate::dom::DomTree;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};
use url::Url;

/// The provider's command envelope: `{"event":"command","func":...,"args":[...]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerCommand {
    pub event: String,
    pub func: String,
    pub args: Vec<Value>,
}

impl PlayerCommand {
    pub fn new(func: &str, args: Vec<Value>) -> Self {
        Self {
            event: "command".to_string(),
            func: func.to_string(),
            args,
        }
    }

    /// Seek and allow seeking ahead of the buffered range
    pub fn seek_to(seconds: u64) -> Self {
        Self::new("seekTo", vec![json!(seconds), json!(true)])
    }

    pub fn play() -> Self {
        Self::new("playVideo", Vec::new())
    }
}

/// Set the `key=value` pair `flag` in the query of `src`, keeping any fragment.
///
/// Returns `None` when `src` already carries the pair. A different value for the
/// same key is replaced.
pub fn with_api_flag(src: &str, flag: &str) -> Option<String> {
    let (key, value) = flag.split_once('=').unwrap_or((flag, ""));

    if let Some(rest) = src.strip_prefix("//") {
        return with_api_flag(&format!("https://{}", rest), flag)
            .map(|updated| updated.trim_start_matches("https:").to_string());
    }

    let Ok(mut url) = Url::parse(src) else {
        return with_api_flag_text(src, key, flag);
    };
    let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
    if pairs.iter().any(|(k, v)| k == key && v == value) {
        return None;
    }

    if pairs.iter().any(|(k, _)| k == key) {
        let replaced = pairs
            .iter()
            .map(|(k, v)| (k.as_str(), if k == key { value } else { v.as_str() }));
        url.query_pairs_mut().clear().extend_pairs(replaced);
    } else {
        url.query_pairs_mut().append_pair(key, value);
    }
    Some(url.to_string())
}

/// Fallback for `src` values that are not absolute URLs
fn with_api_flag_text(src: &str, key: &str, flag: &str) -> Option<String> {
    let (base, fragment) = src.split_at(src.find('#').unwrap_or(src.len()));
    let query = base.split_once('?').map_or("", |(_, query)| query);
    let mut params = query.split('&').filter(|p| !p.is_empty());
    if params.any(|p| p.split('=').next() == Some(key)) {
        return None;
    }

    let separator = if base.ends_with('?') || base.ends_with('&') {
        ""
    } else if base.contains('?') {
        "&"
    } else {
        "?"
    };
    Some(format!("{}{}{}{}", base, separator, flag, fragment))
}

/// Sends seek-and-play commands through a [`MessageChannel`]
#[derive(Clone)]
pub struct SeekEmitter {
    api_flag: String,
    target_origin: String,
    channel: Arc<dyn MessageChannel>,
}

impl SeekEmitter {
    pub fn new(config: &PlayerConfig, channel: Arc<dyn MessageChannel>) -> Self {
        Self {
            api_flag: config.api_flag.clone(),
            target_origin: config.target_origin.clone(),
            channel,
        }
    }

    /// Enable the command API on `player` and ask it to jump to `seconds` and play.
    ///
    /// Nothing is reported back; a player that ignores commands simply does not move.
    pub fn seek<D: DomTree + ?Sized>(&self, tree: &mut D, player: &PlayerHandle, seconds: u64) {
        let current_src = tree
            .attribute(player.node, "src")
            .map(str::to_string)
            .unwrap_or_else(|| player.src.clone());

        let mut target = player.clone();
        if let Some(updated) = with_api_flag(&current_src, &self.api_flag) {
            debug!("Enabling command API on {:?}: {}", player.node, updated);
            tree.set_attribute(player.node, "src", &updated);
            target.src = updated;
        } else {
            target.src = current_src;
        }

        for command in [PlayerCommand::seek_to(seconds), PlayerCommand::play()] {
            match serde_json::to_string(&command) {
                Ok(payload) => self
                    .channel
                    .post_message(&target, &payload, &self.target_origin),
                Err(e) => warn!("Failed to encode {} command: {}", command.func, e),
            }
        }
    }
}

impl std::fmt::Debug for SeekEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeekEmitter")
            .field("api_flag", &self.api_flag)
            .field("target_origin", &self.target_origin)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Document;
    use crate::player::RecordingChannel;

    #[test]
    fn test_with_api_flag() {
        let flag = "enablejsapi=1";
        assert_eq!(
            with_api_flag("https://www.youtube.com/embed/abc", flag).as_deref(),
            Some("https://www.youtube.com/embed/abc?enablejsapi=1")
        );
        assert_eq!(
            with_api_flag("https://www.youtube.com/embed/abc?start=5", flag).as_deref(),
            Some("https://www.youtube.com/embed/abc?start=5&enablejsapi=1")
        );
        assert_eq!(
            with_api_flag("https://www.youtube.com/embed/abc?", flag).as_deref(),
            Some("https://www.youtube.com/embed/abc?enablejsapi=1")
        );
        assert_eq!(
            with_api_flag("https://www.youtube.com/embed/abc?enablejsapi=1", flag),
            None
        );
    }

    #[test]
    fn test_api_flag_goes_before_fragment() {
        let flag = "enablejsapi=1";
        assert_eq!(
            with_api_flag("https://www.youtube.com/embed/abc#t=30", flag).as_deref(),
            Some("https://www.youtube.com/embed/abc?enablejsapi=1#t=30")
        );
        assert_eq!(
            with_api_flag("https://www.youtube.com/embed/abc?rel=0#t=30", flag).as_deref(),
            Some("https://www.youtube.com/embed/abc?rel=0&enablejsapi=1#t=30")
        );
        assert_eq!(
            with_api_flag("/embed/abc#t=30", flag).as_deref(),
            Some("/embed/abc?enablejsapi=1#t=30")
        );
    }

    #[test]
    fn test_api_flag_matches_whole_key() {
        let flag = "enablejsapi=1";
        assert_eq!(
            with_api_flag("https://www.youtube.com/embed/abc?xenablejsapi=1", flag).as_deref(),
            Some("https://www.youtube.com/embed/abc?xenablejsapi=1&enablejsapi=1")
        );
        assert_eq!(
            with_api_flag("https://www.youtube.com/embed/abc?enablejsapi=10&rel=0", flag).as_deref(),
            Some("https://www.youtube.com/embed/abc?enablejsapi=1&rel=0")
        );
        assert_eq!(
            with_api_flag("//www.youtube.com/embed/abc", flag).as_deref(),
            Some("//www.youtube.com/embed/abc?enablejsapi=1")
        );
        assert_eq!(
            with_api_flag("//www.youtube.com/embed/abc?enablejsapi=1", flag),
            None
        );
    }

    #[test]
    fn test_command_envelope() {
        let payload = serde_json::to_string(&PlayerCommand::seek_to(130)).unwrap();
        assert_eq!(payload, r#"{"event":"command","func":"seekTo","args":[130,true]}"#);
        let payload = serde_json::to_string(&PlayerCommand::play()).unwrap();
        assert_eq!(payload, r#"{"event":"command","func":"playVideo","args":[]}"#);
    }

    #[test]
    fn test_seek_updates_src_once_and_posts_commands() {
        let mut doc = Document::parse_html(
            r#"<body><iframe id="p" src="https://www.youtube.com/embed/abc"></iframe></body>"#,
        );
        let node = doc.find_by_id("p").unwrap();
        let channel = RecordingChannel::new();
        let emitter = SeekEmitter::new(&PlayerConfig::default(), Arc::new(channel.clone()));
        let handle = PlayerHandle {
            node,
            src: doc.attribute(node, "src").unwrap().to_string(),
        };

        emitter.seek(&mut doc, &handle, 42);
        emitter.seek(&mut doc, &handle, 43);

        assert_eq!(
            doc.attribute(node, "src"),
            Some("https://www.youtube.com/embed/abc?enablejsapi=1")
        );
        let messages = channel.messages();
        assert_eq!(messages.len(), 4);
        assert!(messages[0].payload.contains("\"seekTo\""));
        assert!(messages[0].payload.contains("[42,true]"));
        assert!(messages[1].payload.contains("\"playVideo\""));
        assert!(messages[2].payload.contains("[43,true]"));
        assert!(messages.iter().all(|m| m.target_origin == "*" && m.player == node));
    }
}
