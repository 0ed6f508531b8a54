/// Transcript collaborator: finds the video a note refers to and renders
/// transcript segments as blocks the watcher will later augment
use crate::config::MarkupConfig;
use crate::dom::document::escape_text;
use crate::timestamps::format_timestamp;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

static VIDEO_LINK_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:https?://)?(?:www\.|m\.)?(?:youtube\.com|youtube-nocookie\.com|youtu\.be)/[^\s)\]}>]+")
        .expect("video link pattern is valid")
});

static VIDEO_ID_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").expect("video id pattern is valid"));

/// One captioned span of a video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Start offset in seconds
    pub start: f64,
    /// Length in seconds
    #[serde(default)]
    pub duration: f64,
    pub text: String,
}

impl TranscriptSegment {
    pub fn new(start: f64, duration: f64, text: &str) -> Self {
        Self {
            start,
            duration,
            text: text.trim().to_string(),
        }
    }

    /// Whole seconds, rounded down; negative offsets clamp to zero
    pub fn start_seconds(&self) -> u64 {
        if self.start.is_finite() && self.start > 0.0 {
            self.start.floor() as u64
        } else {
            0
        }
    }

    pub fn timestamp(&self) -> String {
        format_timestamp(self.start_seconds())
    }
}

/// Extract the 11 character video id from a YouTube URL
pub fn extract_video_id(link: &str) -> Option<String> {
    let with_scheme = if link.starts_with("http://") || link.starts_with("https://") {
        link.to_string()
    } else {
        format!("https://{}", link.trim_start_matches("//"))
    };
    let url = Url::parse(&with_scheme).ok()?;
    let host = url.host_str()?.trim_start_matches("www.").trim_start_matches("m.");
    let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();

    let candidate = match host {
        "youtu.be" => segments.first().map(|s| s.to_string()),
        "youtube.com" | "youtube-nocookie.com" => match segments.as_slice() {
            ["watch", ..] => url
                .query_pairs()
                .find(|(key, _)| key == "v")
                .map(|(_, value)| value.into_owned()),
            ["embed" | "shorts" | "live" | "v", id, ..] => Some(id.to_string()),
            _ => None,
        },
        _ => None,
    }?;

    VIDEO_ID_PATTERN.is_match(&candidate).then_some(candidate)
}

/// Find the video link closest to `cursor` (a byte offset into `text`) and return its id
pub fn find_video_near(text: &str, cursor: usize) -> Option<String> {
    VIDEO_LINK_PATTERN
        .find_iter(text)
        .filter_map(|m| {
            let distance = if cursor < m.start() {
                m.start() - cursor
            } else {
                cursor.saturating_sub(m.end())
            };
            extract_video_id(m.as_str()).map(|id| (distance, id))
        })
        .min_by_key(|(distance, _)| *distance)
        .map(|(_, id)| id)
}

pub fn embed_url(video_id: &str) -> String {
    format!("https://www.youtube.com/embed/{}", video_id)
}

/// Block source lines: `**m:ss** text`
pub fn to_markdown_lines(segments: &[TranscriptSegment]) -> Vec<String> {
    segments
        .iter()
        .filter(|s| !s.text.is_empty())
        .map(|s| format!("**{}** {}", s.timestamp(), s.text))
        .collect()
}

/// Rendered form of [`to_markdown_lines`], one block per segment
pub fn to_html_blocks(segments: &[TranscriptSegment], markup: &MarkupConfig) -> String {
    let block_class = if markup.block_class.is_empty() {
        "ls-block"
    } else {
        markup.block_class.as_str()
    };
    segments
        .iter()
        .filter(|s| !s.text.is_empty())
        .map(|s| {
            format!(
                r#"<div class="{}"><div class="{}"><strong>{}</strong> {}</div></div>"#,
                block_class,
                markup.container_class,
                s.timestamp(),
                escape_text(&s.text)
            )
        })
        .collect()
}

/// Embed block for a video, in the same block layout
pub fn embed_block_html(video_id: &str, markup: &MarkupConfig) -> String {
    let block_class = if markup.block_class.is_empty() {
        "ls-block"
    } else {
        markup.block_class.as_str()
    };
    format!(
        r#"<div class="{}"><iframe src="{}" allowfullscreen></iframe></div>"#,
        block_class,
        embed_url(video_id)
    )
}
