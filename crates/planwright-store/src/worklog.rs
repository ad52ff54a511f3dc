//! Parsing of the append-only `work.log`

use chrono::{DateTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

use planwright_utils::error::StoreError;
use planwright_utils::types::{CurrentPhase, LogCategory, LogLevel};

use crate::codec::unescape_cell;
use crate::records::LogEntry;

pub(crate) const ARTIFACT: &str = "work.log";

static LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\S+) \[(INFO|ERROR)\] \((work|script)\) \[([^\]]+)\] (.*)$")
        .expect("valid work log regex")
});

/// Parse one rendered log line back into an entry.
pub fn parse_line(line: &str, line_no: usize) -> Result<LogEntry, StoreError> {
    let err = |reason: String| StoreError::Codec {
        artifact: ARTIFACT.to_string(),
        line: line_no,
        reason,
    };

    let caps = LINE
        .captures(line)
        .ok_or_else(|| err("not a work log line".to_string()))?;

    let timestamp = DateTime::parse_from_rfc3339(&caps[1])
        .map_err(|e| err(format!("bad timestamp '{}': {e}", &caps[1])))?
        .with_timezone(&Utc);
    let level = match &caps[2] {
        "ERROR" => LogLevel::Error,
        _ => LogLevel::Info,
    };
    let category = match &caps[3] {
        "script" => LogCategory::Script,
        _ => LogCategory::Work,
    };
    let phase = CurrentPhase::try_from(caps[4].to_string()).map_err(err)?;

    Ok(LogEntry {
        timestamp,
        level,
        category,
        phase,
        message: unescape_cell(&caps[5]),
    })
}

/// Parse a whole log. Blank lines are skipped.
pub fn parse_log(text: &str) -> Result<Vec<LogEntry>, StoreError> {
    text.lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty())
        .map(|(idx, l)| parse_line(l, idx + 1))
        .collect()
}
