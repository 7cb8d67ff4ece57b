//! # Pattern Classifier
//!
//! Maps one candidate string to at most one typed record. Everything here is
//! pure: no state, no I/O, so the rule chain can be tested without a scan.

use std::ops::Range;

use memchr::memmem;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::ScanConfig;
use crate::constants::{
    MIN_MESSAGE_CHARS, STEAMID64_BASE, STEAMID64_DIGITS, STEAMID64_MAX, UNIX_MS_DIGITS,
    UNIX_MS_MAX, UNIX_MS_MIN,
};
use crate::record::{Encoding, Record, RecordKind};

static URL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"(?i)https?://(?:steamcommunity|steampowered|store\.steampowered|help\.steampowered|shared\.steamstatic|avatars\.steamstatic|steamcdn|steamuserimages|ext2-par1\.steamserver|steambroadcast|steamloopback)[^\s"'<>]+"#,
    )
    .expect("url pattern")
});

static DIGITS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[0-9]+").expect("digit pattern"));

static MESSAGE_FIELD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)"message"\s*:\s*"([^"]+)""#).expect("message pattern"));

/// Outcome of the rule chain for one candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    NoMatch,
    Url { value: String },
    SteamId { steamid: u64 },
    Chat { unix_ts: u64, message: String },
    /// Long enough to keep as raw ground truth, matched no artifact rule.
    Plain,
}

type Rule = fn(&str) -> Option<Classification>;

// Chat is tried before the bare identifier: it only matches when message text
// is present, so an identifier without a message still falls through.
const RULES: [Rule; 3] = [match_url, match_chat, match_steamid];

/// Run the rule chain over already-normalized text.
pub fn classify(text: &str, min_len: usize) -> Classification {
    if text.chars().count() < min_len {
        return Classification::NoMatch;
    }
    RULES
        .iter()
        .find_map(|rule| rule(text))
        .unwrap_or(Classification::Plain)
}

/// Normalize a raw candidate, classify it and build the record to emit.
pub fn classify_candidate(
    text: &str,
    offset: u64,
    encoding: Encoding,
    cfg: &ScanConfig,
) -> Option<Record> {
    let normalized = normalize(text);
    let classification = classify(&normalized, cfg.min_len);

    let mut steamid = None;
    let mut unix_ts = None;
    let (kind, message, value) = match classification {
        Classification::NoMatch => return None,
        Classification::Plain if !cfg.emit_strings => return None,
        Classification::Plain => (RecordKind::String, None, None),
        Classification::Url { value } => (RecordKind::Url, None, Some(value)),
        Classification::SteamId { steamid: id } => {
            steamid = Some(id);
            (RecordKind::Steamid, None, None)
        }
        Classification::Chat { unix_ts: ts, message } => {
            unix_ts = Some(ts);
            (RecordKind::Chat, Some(message), None)
        }
    };
    let steamid = steamid.or_else(|| find_steamid(&normalized));
    let unix_ts = unix_ts.or_else(|| find_unix_ms(&normalized).map(|(ts, _)| ts));

    Some(Record {
        kind,
        offset,
        preview: normalized.chars().take(cfg.preview_len).collect(),
        steamid,
        unix_ts,
        message,
        value,
        encoding,
    })
}

/// Collapse whitespace runs to a single space and trim both ends.
pub fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn is_valid_steamid(value: u64) -> bool {
    (STEAMID64_BASE..=STEAMID64_MAX).contains(&value)
}

/// A 13-digit millisecond timestamp inside the accepted calendar window that
/// is not one of the repeated or counting digit patterns common in raw memory.
pub fn is_plausible_unix_ms(value: u64) -> bool {
    if !(UNIX_MS_MIN..UNIX_MS_MAX).contains(&value) {
        return false;
    }
    let digits = value.to_string();
    digits.len() == UNIX_MS_DIGITS && !is_degenerate(digits.as_bytes())
}

fn is_degenerate(digits: &[u8]) -> bool {
    let step = |up: bool| {
        digits.windows(2).all(|w| {
            let (a, b) = (w[0] - b'0', w[1] - b'0');
            if up { b == (a + 1) % 10 } else { a == (b + 1) % 10 }
        })
    };
    digits.windows(2).all(|w| w[0] == w[1]) || step(true) || step(false)
}

pub fn find_steamid(text: &str) -> Option<u64> {
    digit_runs(text, STEAMID64_DIGITS)
        .filter_map(|(value, _)| is_valid_steamid(value).then_some(value))
        .next()
}

pub fn find_unix_ms(text: &str) -> Option<(u64, Range<usize>)> {
    digit_runs(text, UNIX_MS_DIGITS).find(|(value, _)| is_plausible_unix_ms(*value))
}

/// Maximal ASCII digit runs of exactly `len` digits.
fn digit_runs(text: &str, len: usize) -> impl Iterator<Item = (u64, Range<usize>)> + '_ {
    DIGITS_RE
        .find_iter(text)
        .filter(move |m| m.end() - m.start() == len)
        .filter_map(|m| m.as_str().parse::<u64>().ok().map(|v| (v, m.start()..m.end())))
}

fn match_url(text: &str) -> Option<Classification> {
    memmem::find(text.as_bytes(), b"://")?;
    URL_RE.find(text).map(|m| Classification::Url {
        value: m.as_str().to_string(),
    })
}

fn match_chat(text: &str) -> Option<Classification> {
    digit_runs(text, UNIX_MS_DIGITS)
        .filter(|(value, _)| is_plausible_unix_ms(*value))
        .find_map(|(unix_ts, range)| {
            extract_message(text, range).map(|message| Classification::Chat { unix_ts, message })
        })
}

fn match_steamid(text: &str) -> Option<Classification> {
    find_steamid(text).map(|steamid| Classification::SteamId { steamid })
}

fn extract_message(text: &str, ts: Range<usize>) -> Option<String> {
    if let Some(caps) = MESSAGE_FIELD_RE.captures(text) {
        let field = caps[1].trim();
        if is_message(field) {
            return Some(field.to_string());
        }
    }
    [&text[ts.end..], &text[..ts.start]]
        .into_iter()
        .map(trim_separators)
        .find(|candidate| is_message(candidate))
        .map(str::to_string)
}

fn trim_separators(s: &str) -> &str {
    s.trim_matches(|c: char| {
        c.is_whitespace()
            || matches!(
                c,
                ':' | ',' | ';' | '|' | '-' | '=' | '"' | '\'' | '[' | ']' | '{' | '}' | '(' | ')'
            )
    })
}

fn is_message(s: &str) -> bool {
    s.chars().count() >= MIN_MESSAGE_CHARS && s.chars().any(|c| c.is_ascii_alphabetic())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> ScanConfig {
        ScanConfig {
            min_len: 6,
            ..ScanConfig::default()
        }
    }

    #[test]
    fn url_keeps_query_suffix_verbatim() {
        let text = "open https://store.steampowered.com/app/730/?snr=1_4_4__129 now";
        assert_eq!(
            classify(text, 6),
            Classification::Url {
                value: "https://store.steampowered.com/app/730/?snr=1_4_4__129".to_string()
            }
        );
    }

    #[test]
    fn url_match_is_case_insensitive_and_stops_at_quote() {
        let text = r#"src="HTTPS://avatars.steamstatic.com/ab12_full.jpg" alt"#;
        match classify(text, 6) {
            Classification::Url { value } => {
                assert_eq!(value, "HTTPS://avatars.steamstatic.com/ab12_full.jpg")
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn foreign_hosts_are_not_urls() {
        assert_eq!(
            classify("https://example.com/steamcommunity", 6),
            Classification::Plain
        );
    }

    #[test]
    fn steamid_range_bounds() {
        assert!(is_valid_steamid(STEAMID64_BASE));
        assert!(is_valid_steamid(STEAMID64_MAX));
        assert!(!is_valid_steamid(STEAMID64_BASE - 1));
        assert!(!is_valid_steamid(STEAMID64_MAX + 1));
        assert_eq!(
            classify("friend=76561198000000000;", 6),
            Classification::SteamId {
                steamid: 76_561_198_000_000_000
            }
        );
        assert_eq!(classify("765611980000000001", 6), Classification::Plain);
    }

    #[test]
    fn chat_requires_message_text() {
        assert_eq!(
            classify("1700000000000 hello world", 6),
            Classification::Chat {
                unix_ts: 1_700_000_000_000,
                message: "hello world".to_string()
            }
        );
        assert_eq!(classify("1700000000000 ::", 6), Classification::Plain);
    }

    #[test]
    fn chat_prefers_embedded_message_field() {
        let text = r#"{"ts":1700000000000,"message":"gg wp","from":"x"}"#;
        assert_eq!(
            classify(text, 6),
            Classification::Chat {
                unix_ts: 1_700_000_000_000,
                message: "gg wp".to_string()
            }
        );
    }

    #[test]
    fn chat_outranks_identifier_only_with_message() {
        let with_text = "76561198000000000 1700000000000 see you later";
        let record = classify_candidate(with_text, 10, Encoding::Ascii, &cfg()).expect("record");
        assert_eq!(record.kind, RecordKind::Chat);
        assert_eq!(record.steamid, Some(76_561_198_000_000_000));
        assert_eq!(record.unix_ts, Some(1_700_000_000_000));
        assert_eq!(record.message.as_deref(), Some("see you later"));

        let bare = "76561198000000000 1700000000000";
        let record = classify_candidate(bare, 10, Encoding::Ascii, &cfg()).expect("record");
        assert_eq!(record.kind, RecordKind::Steamid);
        assert_eq!(record.unix_ts, Some(1_700_000_000_000));
        assert!(record.message.is_none());
        assert!(record.value.is_none());
    }

    #[test]
    fn rejects_degenerate_and_out_of_range_timestamps() {
        assert!(is_plausible_unix_ms(1_700_000_000_000));
        assert!(!is_plausible_unix_ms(1_111_111_111_111));
        assert!(!is_plausible_unix_ms(1_234_567_890_123));
        assert!(!is_plausible_unix_ms(3_210_987_654_321));
        assert!(!is_plausible_unix_ms(1_000_000_000_000));
        assert!(!is_plausible_unix_ms(9_999_999_999_998));
        assert_eq!(classify("1111111111111 hello", 6), Classification::Plain);
    }

    #[test]
    fn thirteen_digits_inside_identifier_are_not_timestamps() {
        assert!(find_unix_ms("76561198000000000").is_none());
    }

    #[test]
    fn short_or_disabled_strings_yield_nothing() {
        assert!(classify_candidate("   ab   c  ", 0, Encoding::Ascii, &cfg()).is_none());
        let plain = classify_candidate("just some text", 3, Encoding::Utf16le, &cfg())
            .expect("plain record");
        assert_eq!(plain.kind, RecordKind::String);
        assert_eq!(plain.encoding, Encoding::Utf16le);

        let quiet = ScanConfig {
            emit_strings: false,
            ..cfg()
        };
        assert!(classify_candidate("just some text", 3, Encoding::Ascii, &quiet).is_none());
    }

    #[test]
    fn preview_is_normalized_and_truncated() {
        let narrow = ScanConfig {
            preview_len: 10,
            ..cfg()
        };
        let record = classify_candidate("  lots    of   space here ", 0, Encoding::Ascii, &narrow)
            .expect("record");
        assert_eq!(record.preview, "lots of sp");
    }
}
