//! The fact grammar: one atom per line, S-expression style.
//!
//! ```text
//! ; comment
//! (location LOC001 "Central Park" 40.7829 -73.9654)
//! (noise_event N001 LOC001 "2024-01-01T23:00:00+00:00" 50.0)
//! ```
//!
//! Parsing runs an ordered list of matchers (location first, then noise
//! event). Anything that matches neither, or whose numbers do not parse as
//! finite floats, is [`ParsedLine::Skip`]: readers ignore malformed lines
//! instead of failing on them.

use std::sync::LazyLock;

use echonet_core::fact::{LocationRecord, NoiseEvent};
use regex_lite::{Captures, Regex};

/// The result of parsing one ledger line.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedLine {
    Location(LocationRecord),
    Event(NoiseEvent),
    /// Blank, comment, or unrecognized
    Skip,
}

/// Every atom of a ledger blob, in ledger order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedLedger {
    pub locations: Vec<LocationRecord>,
    pub events: Vec<NoiseEvent>,
    /// Non-blank, non-comment lines that matched no atom pattern
    pub skipped: usize,
}

impl ParsedLedger {
    pub fn is_empty(&self) -> bool {
        self.locations.is_empty() && self.events.is_empty()
    }
}

struct Matcher {
    pattern: Regex,
    build: fn(&Captures<'_>) -> Option<ParsedLine>,
}

static MATCHERS: LazyLock<[Matcher; 2]> = LazyLock::new(|| {
    [
        Matcher {
            pattern: Regex::new(r#"^\(location\s+(\S+)\s+"(.*)"\s+(\S+)\s+(\S+)\)\s*(?:;.*)?$"#)
                .expect("location pattern is valid"),
            build: build_location,
        },
        Matcher {
            pattern: Regex::new(
                r#"^\(noise_event\s+(\S+)\s+(\S+)\s+"([^"]+)"\s+(\S+)\)\s*(?:;.*)?$"#,
            )
            .expect("noise_event pattern is valid"),
            build: build_event,
        },
    ]
});

fn parse_number(s: &str) -> Option<f64> {
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn build_location(caps: &Captures<'_>) -> Option<ParsedLine> {
    Some(ParsedLine::Location(LocationRecord {
        location_id: caps[1].to_string(),
        name: caps[2].to_string(),
        latitude: parse_number(&caps[3])?,
        longitude: parse_number(&caps[4])?,
    }))
}

fn build_event(caps: &Captures<'_>) -> Option<ParsedLine> {
    Some(ParsedLine::Event(NoiseEvent {
        event_id: caps[1].to_string(),
        location_id: caps[2].to_string(),
        timestamp: caps[3].to_string(),
        decibel: parse_number(&caps[4])?,
    }))
}

/// Parse a single ledger line. Never fails.
pub fn parse_line(line: &str) -> ParsedLine {
    let line = line.trim();
    if line.is_empty() || line.starts_with(';') {
        return ParsedLine::Skip;
    }

    for matcher in MATCHERS.iter() {
        if let Some(caps) = matcher.pattern.captures(line) {
            return (matcher.build)(&caps).unwrap_or(ParsedLine::Skip);
        }
    }
    ParsedLine::Skip
}

/// Parse every line of a ledger blob.
pub fn parse_ledger(content: &str) -> ParsedLedger {
    let mut parsed = ParsedLedger::default();
    for line in content.lines() {
        match parse_line(line) {
            ParsedLine::Location(loc) => parsed.locations.push(loc),
            ParsedLine::Event(ev) => parsed.events.push(ev),
            ParsedLine::Skip => {
                let trimmed = line.trim();
                if !trimmed.is_empty() && !trimmed.starts_with(';') {
                    parsed.skipped += 1;
                }
            }
        }
    }
    parsed
}

/// Render a float so it parses back to the identical value.
///
/// Integral values keep a trailing `.0` (`50.0`, not `50`).
pub fn format_number(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e16 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

/// Identifiers are single tokens in the grammar.
fn token(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join("_")
}

/// Names live inside quotes on one line.
fn single_line(s: &str) -> String {
    s.replace(['\r', '\n'], " ")
}

/// `; <text>` on a single line.
pub fn encode_comment(text: &str) -> String {
    format!("; {}", single_line(text))
}

/// `(location <id> "<name>" <lat> <lon>)`
pub fn encode_location(rec: &LocationRecord) -> String {
    format!(
        "(location {} \"{}\" {} {})",
        token(&rec.location_id),
        single_line(&rec.name),
        format_number(rec.latitude),
        format_number(rec.longitude),
    )
}

/// `(noise_event <event_id> <location_id> "<iso_timestamp>" <decibel>)`
pub fn encode_event(rec: &NoiseEvent) -> String {
    format!(
        "(noise_event {} {} \"{}\" {})",
        token(&rec.event_id),
        token(&rec.location_id),
        rec.timestamp.replace('"', ""),
        format_number(rec.decibel),
    )
}
