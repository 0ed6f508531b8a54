use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::RwLock;
use tokio::time::sleep;
use yt_timestamp_sync::player::RecordingChannel;
use yt_timestamp_sync::plugin::resolve_root;
use yt_timestamp_sync::transcript::{find_video_near, TranscriptSegment};
use yt_timestamp_sync::{Config, ConfigBuilder, Document, DomTree, SharedTree, TimestampSync, WatcherPhase};

fn shared(html: &str, root_id: &str) -> (SharedTree<Document>, yt_timestamp_sync::NodeId) {
    let doc = Document::parse_html(html);
    let root = resolve_root(&doc, Some(root_id));
    (Arc::new(RwLock::new(doc)), root)
}

#[tokio::test(start_paused = true)]
async fn test_inserted_transcript_becomes_clickable() {
    let note = r#"<html><head></head><body><div id="app">
        <div class="ls-block"><div class="block-content">Watch https://youtu.be/dQw4w9WgXcQ later</div></div>
    </div></body></html>"#;
    let (tree, app) = shared(note, "app");
    let channel = RecordingChannel::new();
    let mut sync = TimestampSync::new(Config::default(), Arc::new(channel.clone()));

    let report = sync.load(tree.clone(), app).await.unwrap();
    assert_eq!(report.markers, 0);

    let video_id = {
        let doc = tree.read().await;
        find_video_near(&doc.text_content(app), 0)
    };
    assert_eq!(video_id.as_deref(), Some("dQw4w9WgXcQ"));

    let segments = vec![
        TranscriptSegment::new(0.0, 4.2, "welcome back"),
        TranscriptSegment::new(75.3, 5.0, "the first sweep"),
        TranscriptSegment::new(3601.0, 2.0, "wrap up"),
    ];
    let inserted = sync
        .insert_transcript(app, video_id.as_deref(), &segments)
        .await
        .unwrap();
    assert_eq!(inserted, 4);

    // Plain text until the debounce window closes
    sleep(Duration::from_millis(50)).await;
    assert_eq!(sync.phase(), WatcherPhase::PendingPass);
    assert!(sync.markers().await.unwrap().is_empty());

    sleep(Duration::from_millis(100)).await;
    assert_eq!(sync.phase(), WatcherPhase::Observing);
    let markers = sync.markers().await.unwrap();
    assert_eq!(markers.len(), 3);

    let player = sync.click(markers[1]).await.unwrap().unwrap();
    {
        let doc = tree.read().await;
        assert_eq!(
            doc.attribute(player.node, "src"),
            Some("https://www.youtube.com/embed/dQw4w9WgXcQ?enablejsapi=1")
        );
        assert_eq!(doc.attribute(markers[2], "data-seconds"), Some("3601"));
    }
    let messages = channel.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(
        messages[0].payload,
        r#"{"event":"command","func":"seekTo","args":[75,true]}"#
    );
    assert_eq!(
        messages[1].payload,
        r#"{"event":"command","func":"playVideo","args":[]}"#
    );

    sync.unload().await;
    let html = tree.read().await.to_html();
    assert!(html.contains("<strong>1:15</strong> the first sweep"));
    assert!(!html.contains("yt-timestamp"));
}

#[tokio::test(start_paused = true)]
async fn test_each_container_seeks_its_own_player() {
    let note = r#"<html><body><div id="app">
        <div class="ls-block">
            <div class="ls-block"><iframe id="first" src="https://www.youtube.com/embed/aaaaaaaaaaa"></iframe></div>
            <div class="ls-block"><div class="block-content">0:10 first video</div></div>
        </div>
        <div class="ls-block">
            <div class="ls-block"><iframe id="second" src="https://www.youtube-nocookie.com/embed/bbbbbbbbbbb?rel=0"></iframe></div>
            <div class="ls-block"><div class="block-content">0:20 second video</div></div>
        </div>
    </div></body></html>"#;
    let (tree, app) = shared(note, "app");
    let channel = RecordingChannel::new();
    let mut sync = TimestampSync::new(Config::default(), Arc::new(channel.clone()));
    sync.load(tree.clone(), app).await.unwrap();

    let markers = sync.markers().await.unwrap();
    assert_eq!(markers.len(), 2);
    let first = sync.click(markers[0]).await.unwrap().unwrap();
    let second = sync.click(markers[1]).await.unwrap().unwrap();

    let doc = tree.read().await;
    assert_eq!(Some(first.node), doc.find_by_id("first"));
    assert_eq!(Some(second.node), doc.find_by_id("second"));
    assert_eq!(
        doc.attribute(second.node, "src"),
        Some("https://www.youtube-nocookie.com/embed/bbbbbbbbbbb?rel=0&enablejsapi=1")
    );
}

#[tokio::test(start_paused = true)]
async fn test_lone_embed_is_used_as_fallback() {
    let note = r#"<html><body>
        <aside><iframe id="only" src="https://www.youtube.com/embed/ccccccccccc"></iframe></aside>
        <div id="app"><div class="block-content">2:00 somewhere else</div></div>
    </body></html>"#;
    let (tree, app) = shared(note, "app");
    let config = ConfigBuilder::new().with_block_class("ls-block").build();
    let channel = RecordingChannel::new();
    let mut sync = TimestampSync::new(config, Arc::new(channel.clone()));
    sync.load(tree.clone(), app).await.unwrap();

    let marker = sync.markers().await.unwrap()[0];
    let player = sync.click(marker).await.unwrap().unwrap();
    assert_eq!(Some(player.node), tree.read().await.find_by_id("only"));
    assert!(channel.messages()[0].payload.contains("[120,true]"));
}

#[tokio::test(start_paused = true)]
async fn test_host_rerender_is_reaugmented() {
    let note = r#"<html><body><div id="app"><div class="block-content" id="b">1:00 old</div></div></body></html>"#;
    let (tree, app) = shared(note, "app");
    let mut sync = TimestampSync::new(Config::default(), Arc::new(RecordingChannel::new()));
    sync.load(tree.clone(), app).await.unwrap();

    {
        // Host replaces the block with a freshly rendered copy
        let mut doc = tree.write().await;
        let old = doc.find_by_id("b").unwrap();
        doc.remove(old);
        doc.append_html(app, r#"<div class="block-content" id="b">1:00 new 2:00</div>"#);
    }
    sleep(Duration::from_millis(150)).await;

    let markers = sync.markers().await.unwrap();
    assert_eq!(markers.len(), 2);
    assert_eq!(sync.watcher().pass_count(), 2);
    let doc = tree.read().await;
    assert_eq!(doc.text_content(app), "1:00 new 2:00");
}

#[tokio::test]
async fn test_config_file_drives_markup() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("sync.toml");
    tokio::fs::write(
        &path,
        "[markup]\ncontainer_class = \"content\"\nmarker_class = \"ts\"\nseconds_attribute = \"data-t\"\n",
    )
    .await
    .unwrap();
    let config = Config::load_from(&path).unwrap();

    let note = r#"<html><body><div id="app"><p class="content">5:05 custom</p><p class="block-content">6:06 ignored</p></div></body></html>"#;
    let (tree, app) = shared(note, "app");
    let mut sync = TimestampSync::new(config, Arc::new(RecordingChannel::new()));
    let report = sync.load(tree.clone(), app).await.unwrap();
    assert_eq!(report.markers, 1);

    let doc = tree.read().await;
    assert_eq!(
        doc.inner_html(app),
        r#"<p class="content"><span class="ts" data-t="305">5:05</span> custom</p><p class="block-content">6:06 ignored</p>"#
    );
}
