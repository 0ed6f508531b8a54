/// Timestamp recognition in rendered text
///
/// Recognizes `m:ss` and `h:mm:ss` tokens (seconds always two digits, the other
/// parts any number of digits), optionally wrapped in `**` emphasis, that are
/// followed by whitespace or the end of the scanned text and not preceded by a
/// digit or colon.
use once_cell::sync::Lazy;
use regex::{CaptureMatches, Regex};
use serde::{Deserialize, Serialize};

static TIMESTAMP_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\*\*)?((?:\d+:)?\d+:\d{2})(?:\*\*)?(?:\s|$)")
        .expect("timestamp pattern is valid")
});

/// A recognized timestamp with its normalized offset
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimestampToken {
    /// Exact matched text, emphasis delimiters excluded
    pub literal: String,
    pub total_seconds: u64,
}

impl TimestampToken {
    pub fn parse(literal: &str) -> Self {
        Self {
            literal: literal.to_string(),
            total_seconds: parse_timestamp(literal),
        }
    }
}

/// One match inside a scanned string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampMatch<'t> {
    pub literal: &'t str,
    /// Byte offset of `literal` in the scanned text
    pub start: usize,
    pub total_seconds: u64,
}

impl TimestampMatch<'_> {
    /// Byte offset just past `literal`
    pub fn end(&self) -> usize {
        self.start + self.literal.len()
    }

    pub fn token(&self) -> TimestampToken {
        TimestampToken {
            literal: self.literal.to_string(),
            total_seconds: self.total_seconds,
        }
    }
}

/// Lazy iterator over the timestamps of one string
pub struct TimestampMatches<'r, 't> {
    text: &'t str,
    inner: CaptureMatches<'r, 't>,
}

impl<'t> Iterator for TimestampMatches<'_, 't> {
    type Item = TimestampMatch<'t>;

    fn next(&mut self) -> Option<Self::Item> {
        for captures in self.inner.by_ref() {
            // A tail of a longer digit run such as `10:30:45:12` is not a timestamp
            let glued = captures.get(0).map_or(false, |whole| {
                self.text[..whole.start()]
                    .chars()
                    .next_back()
                    .map_or(false, |c| c.is_ascii_digit() || c == ':')
            });
            if glued {
                continue;
            }
            if let Some(group) = captures.get(1) {
                return Some(TimestampMatch {
                    literal: group.as_str(),
                    start: group.start(),
                    total_seconds: parse_timestamp(group.as_str()),
                });
            }
        }
        None
    }
}

/// Scan `text` for timestamps. Calling again restarts from the beginning.
pub fn match_timestamps(text: &str) -> TimestampMatches<'static, '_> {
    TimestampMatches {
        text,
        inner: TIMESTAMP_PATTERN.captures_iter(text),
    }
}

/// Convert `h:mm:ss` or `m:ss` to seconds.
///
/// Callers are expected to pass text recognized by [`match_timestamps`]; parts
/// that are not numbers count as zero.
pub fn parse_timestamp(literal: &str) -> u64 {
    let parts: Vec<u64> = literal
        .split(':')
        .map(|part| part.trim().parse::<u64>().unwrap_or(0))
        .collect();

    match parts.as_slice() {
        [hours, minutes, seconds] => hours
            .saturating_mul(3600)
            .saturating_add(minutes.saturating_mul(60))
            .saturating_add(*seconds),
        [minutes, seconds] => minutes.saturating_mul(60).saturating_add(*seconds),
        [seconds] => *seconds,
        _ => 0,
    }
}

/// Render seconds as `m:ss`, or `h:mm:ss` from one hour up
pub fn format_timestamp(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("1:02:03"), 3723);
        assert_eq!(parse_timestamp("02:03"), 123);
        assert_eq!(parse_timestamp("00:00"), 0);
        assert_eq!(parse_timestamp("123:45"), 7425);
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "0:00");
        assert_eq!(format_timestamp(130), "2:10");
        assert_eq!(format_timestamp(3723), "1:02:03");
    }

    #[test]
    fn test_emphasized_timestamps() {
        let text = "**02:10** hello **02:10** world";
        let matches: Vec<_> = match_timestamps(text).collect();
        assert_eq!(matches.len(), 2);
        assert_eq!(matches[0].literal, "02:10");
        assert_eq!(matches[0].start, 2);
        assert_eq!(matches[1].start, 18);
        assert!(matches.iter().all(|m| m.total_seconds == 130));
    }

    #[test]
    fn test_requires_trailing_whitespace_or_end() {
        assert_eq!(match_timestamps("at 1:30").count(), 1);
        assert_eq!(match_timestamps("at 1:30\nnext").count(), 1);
        assert_eq!(match_timestamps("ratio 1:30x").count(), 0);
        assert_eq!(match_timestamps("1:30, then").count(), 0);
    }

    #[test]
    fn test_longer_digit_runs_are_not_split() {
        assert_eq!(match_timestamps("ver10:30:45:12 x").count(), 0);
        assert_eq!(match_timestamps("12:34:56:78").count(), 0);
        let rest: Vec<_> = match_timestamps("1:00:00:00 then 0:30 end")
            .map(|m| m.literal)
            .collect();
        assert_eq!(rest, vec!["0:30"]);
        assert_eq!(match_timestamps("v2 10:30 x").count(), 1);
    }

    #[test]
    fn test_seconds_must_be_two_digits() {
        assert_eq!(match_timestamps("1:3 ").count(), 0);
        assert_eq!(match_timestamps("1:300 ").count(), 0);
        let hour: Vec<_> = match_timestamps("1:02:03 start").collect();
        assert_eq!(hour.len(), 1);
        assert_eq!(hour[0].literal, "1:02:03");
        assert_eq!(hour[0].total_seconds, 3723);
    }

    #[test]
    fn test_iteration_restarts() {
        let text = "0:05 a 0:10";
        let first: Vec<_> = match_timestamps(text).map(|m| m.total_seconds).collect();
        let second: Vec<_> = match_timestamps(text).map(|m| m.total_seconds).collect();
        assert_eq!(first, vec![5, 10]);
        assert_eq!(first, second);
    }

    #[test]
    fn test_format_parse_round_trip_on_matches() {
        let text = "00:00 0:59 10:00 59:59 1:00:00 12:34:56 **7:07**";
        for m in match_timestamps(text) {
            let normalized = format_timestamp(m.total_seconds);
            assert_eq!(parse_timestamp(&normalized), m.total_seconds, "{}", m.literal);
            assert_eq!(parse_timestamp(m.literal), m.total_seconds);
        }
    }

    #[test]
    fn test_token_from_match() {
        let m = match_timestamps("**1:00:00** intro").next().unwrap();
        assert_eq!(m.end(), 9);
        assert_eq!(m.token(), TimestampToken::parse("1:00:00"));
        assert_eq!(m.token().total_seconds, 3600);
    }
}
