use anyhow::{anyhow, Result};
use clap::{Arg, Command};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, warn};

use yt_timestamp_sync::dom::{Document, DomTree};
use yt_timestamp_sync::player::TracingChannel;
use yt_timestamp_sync::plugin::{resolve_root, TimestampSync};
use yt_timestamp_sync::transcript::{find_video_near, TranscriptSegment};
use yt_timestamp_sync::{Config, WatcherPhase};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("yt-timestamp-sync")
        .version("0.1.0")
        .author("TigreRoll")
        .about("Make video timestamps in a rendered note clickable")
        .arg(
            Arg::new("input")
                .value_name("HTML")
                .help("Rendered note to augment")
                .required(true)
        )
        .arg(
            Arg::new("root")
                .short('r')
                .long("root")
                .value_name("ID")
                .help("Element id of the subtree to watch (defaults to <body>)")
        )
        .arg(
            Arg::new("transcript")
                .short('t')
                .long("transcript")
                .value_name("JSON")
                .help("Transcript segments to insert under the root")
        )
        .arg(
            Arg::new("click")
                .short('c')
                .long("click")
                .value_name("N")
                .help("Simulate a click on the N-th timestamp marker (0-based)")
                .value_parser(clap::value_parser!(usize))
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("Configuration file (TOML)")
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue)
        )
        .get_matches();

    let verbose = matches.get_flag("verbose");
    // Logs go to stderr, stdout carries the document
    tracing_subscriber::fmt()
        .with_env_filter(if verbose {
            "yt_timestamp_sync=debug,info"
        } else {
            "yt_timestamp_sync=info,warn"
        })
        .with_writer(std::io::stderr)
        .init();

    let config = match matches.get_one::<String>("config") {
        Some(path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_else(|e| {
            warn!("Failed to load config, using defaults: {}", e);
            Config::default()
        }),
    };
    if verbose {
        info!("{}", config.summary());
    }

    let input = matches
        .get_one::<String>("input")
        .map(PathBuf::from)
        .ok_or_else(|| anyhow!("No input file given"))?;
    let html = tokio::fs::read_to_string(&input)
        .await
        .map_err(|e| anyhow!("Cannot read {}: {}", input.display(), e))?;

    let doc = Document::parse_html(&html);
    let root = resolve_root(&doc, matches.get_one::<String>("root").map(String::as_str));
    let video_id = find_video_near(&doc.text_content(doc.root()), 0).or_else(|| {
        doc.first_with_tag("iframe")
            .and_then(|frame| doc.attribute(frame, "src"))
            .and_then(|src| find_video_near(src, 0))
    });
    let tree = Arc::new(RwLock::new(doc));

    info!("🚀 Loading timestamp sync for {}", input.display());
    let debounce = config.watcher.debounce();
    let mut sync = TimestampSync::new(config, Arc::new(TracingChannel));
    let report = sync.load(tree.clone(), root).await?;
    info!(
        "📊 Initial pass: {} markers in {} containers",
        report.markers, report.containers
    );

    if let Some(path) = matches.get_one::<String>("transcript") {
        let raw = tokio::fs::read_to_string(path).await?;
        let segments: Vec<TranscriptSegment> = serde_json::from_str(&raw)?;
        // Only embed a player when the note has none yet
        let has_player = {
            let doc = tree.read().await;
            doc.first_with_tag("iframe").is_some()
        };
        let embed = if has_player { None } else { video_id.as_deref() };
        let mut phase = sync.watcher().subscribe();
        sync.insert_transcript(root, embed, &segments).await?;

        // Wait for the watcher's trailing pass to pick the new blocks up
        let settled = tokio::time::timeout(debounce * 10, async {
            phase.wait_for(|p| *p == WatcherPhase::PendingPass).await?;
            phase.wait_for(|p| *p == WatcherPhase::Observing).await?;
            Ok::<_, tokio::sync::watch::error::RecvError>(())
        })
        .await;
        if !matches!(settled, Ok(Ok(()))) {
            warn!("Watcher did not settle after inserting the transcript");
        }
    }

    if let Some(index) = matches.get_one::<usize>("click").copied() {
        let markers = sync.markers().await?;
        match markers.get(index) {
            Some(marker) => match sync.click(*marker).await? {
                Some(player) => info!("⏩ Marker {} sought player {:?}", index, player.node),
                None => warn!("Marker {} has no player to seek", index),
            },
            None => warn!("Only {} markers found, cannot click #{}", markers.len(), index),
        }
    }

    println!("{}", tree.read().await.to_html());

    let markers = sync.markers().await?.len();
    info!("🎉 Done: {} markers, {} passes", markers, sync.watcher().pass_count());
    sync.unload().await;

    Ok(())
}
