/// Host-facing hooks: load, unload, marker clicks and transcript insertion
use crate::augment::{Augmenter, PassReport};
use crate::config::Config;
use crate::dom::{Document, DomTree, NodeId};
use crate::error::{Result, SyncError};
use crate::player::{MessageChannel, PlayerHandle};
use crate::transcript::{embed_block_html, to_html_blocks, TranscriptSegment};
use crate::watcher::{MutationWatcher, SharedTree, WatcherPhase};
use std::sync::Arc;
use tracing::{info, warn};

/// Pick the subtree to watch: the element with `id` if given and present,
/// otherwise `<body>`, otherwise the whole document
pub fn resolve_root(doc: &Document, id: Option<&str>) -> NodeId {
    if let Some(id) = id {
        match doc.find_by_id(id) {
            Some(node) => return node,
            None => warn!("No element with id '{}', watching the body instead", id),
        }
    }
    doc.body().unwrap_or_else(|| doc.root())
}

/// One timestamp sync instance per host document
pub struct TimestampSync {
    config: Config,
    augmenter: Arc<Augmenter>,
    watcher: MutationWatcher<Document>,
    tree: Option<SharedTree<Document>>,
}

impl TimestampSync {
    pub fn new(config: Config, channel: Arc<dyn MessageChannel>) -> Self {
        let augmenter = Arc::new(Augmenter::new(&config, channel));
        let watcher = MutationWatcher::new(&config, augmenter.clone());
        Self {
            config,
            augmenter,
            watcher,
            tree: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn watcher(&self) -> &MutationWatcher<Document> {
        &self.watcher
    }

    pub fn is_loaded(&self) -> bool {
        self.watcher.is_running()
    }

    /// Augment `root` and keep it augmented until [`Self::unload`]
    pub async fn load(&mut self, tree: SharedTree<Document>, root: NodeId) -> Result<PassReport> {
        let report = self.watcher.start(tree.clone(), root).await?;
        self.tree = Some(tree);
        info!("✅ Timestamp sync loaded");
        Ok(report)
    }

    /// Stop watching and restore plain text. Safe to call repeatedly.
    pub async fn unload(&mut self) -> usize {
        let unwrapped = self.watcher.stop().await;
        if self.tree.take().is_some() {
            info!("Timestamp sync unloaded");
        }
        unwrapped
    }

    /// Route a click on `marker` to its player
    pub async fn click(&self, marker: NodeId) -> Result<Option<PlayerHandle>> {
        let tree = self.tree.as_ref().ok_or(SyncError::NotLoaded)?;
        let mut doc = tree.write().await;
        Ok(self.augmenter.activate(&mut *doc, marker))
    }

    /// Markers currently in the watched subtree, in document order
    pub async fn markers(&self) -> Result<Vec<NodeId>> {
        let tree = self.tree.as_ref().ok_or(SyncError::NotLoaded)?;
        let root = self.watcher.root().ok_or(SyncError::NotLoaded)?;
        let doc = tree.read().await;
        Ok(self.augmenter.markers(&*doc, root))
    }

    /// Append transcript blocks under `parent`, preceded by an embed when a
    /// video id is given.
    ///
    /// The blocks are plain text; markers appear once the watcher's next pass runs.
    pub async fn insert_transcript(
        &self,
        parent: NodeId,
        video_id: Option<&str>,
        segments: &[TranscriptSegment],
    ) -> Result<usize> {
        let tree = self.tree.as_ref().ok_or(SyncError::NotLoaded)?;
        let mut html = String::new();
        if let Some(id) = video_id {
            html.push_str(&embed_block_html(id, &self.config.markup));
        }
        html.push_str(&to_html_blocks(segments, &self.config.markup));

        let inserted = tree.write().await.append_html(parent, &html).len();
        info!("📝 Inserted {} transcript blocks", inserted);
        Ok(inserted)
    }

    pub fn phase(&self) -> WatcherPhase {
        self.watcher.phase()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::RecordingChannel;
    use tokio::sync::RwLock;

    const NOTE: &str = r#"<html><head></head><body><div id="app">
        <div class="ls-block"><iframe src="https://www.youtube.com/embed/dQw4w9WgXcQ"></iframe></div>
        <div class="ls-block"><div class="block-content">**1:30** the sweep</div></div>
    </div></body></html>"#;

    fn setup() -> (TimestampSync, RecordingChannel, SharedTree<Document>, NodeId) {
        let channel = RecordingChannel::new();
        let sync = TimestampSync::new(Config::default(), Arc::new(channel.clone()));
        let doc = Document::parse_html(NOTE);
        let root = resolve_root(&doc, Some("app"));
        (sync, channel, Arc::new(RwLock::new(doc)), root)
    }

    #[test]
    fn test_resolve_root_falls_back_to_body() {
        let doc = Document::parse_html(NOTE);
        assert_eq!(resolve_root(&doc, Some("app")), doc.find_by_id("app").unwrap());
        assert_eq!(resolve_root(&doc, Some("missing")), doc.body().unwrap());
        assert_eq!(resolve_root(&doc, None), doc.body().unwrap());
    }

    #[tokio::test(start_paused = true)]
    async fn test_click_before_load_is_an_error() {
        let (sync, _, _, _) = setup();
        assert!(!sync.is_loaded());
        assert!(matches!(sync.click(NodeId(0)).await, Err(SyncError::NotLoaded)));
        assert!(matches!(sync.markers().await, Err(SyncError::NotLoaded)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_click_unload() {
        let (mut sync, channel, tree, root) = setup();
        let report = sync.load(tree.clone(), root).await.unwrap();
        assert_eq!(report.markers, 1);
        assert!(sync.is_loaded());

        let marker = sync.markers().await.unwrap()[0];
        let player = sync.click(marker).await.unwrap().unwrap();
        assert_eq!(
            tree.read().await.attribute(player.node, "src"),
            Some("https://www.youtube.com/embed/dQw4w9WgXcQ?enablejsapi=1")
        );
        let messages = channel.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].payload.contains("[90,true]"));

        assert_eq!(sync.unload().await, 1);
        assert_eq!(sync.unload().await, 0);
        assert!(!sync.is_loaded());
        assert_eq!(sync.phase(), WatcherPhase::Stopped);
        assert!(!tree.read().await.to_html().contains("yt-timestamp"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_load_is_rejected() {
        let (mut sync, _, tree, root) = setup();
        sync.load(tree.clone(), root).await.unwrap();
        assert!(matches!(
            sync.load(tree.clone(), root).await,
            Err(SyncError::AlreadyRunning(_))
        ));
        assert!(sync.is_loaded());
    }
}
