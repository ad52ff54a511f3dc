//! Field-level rules shared by the deliverable validator

use regex::Regex;
use std::sync::LazyLock;

/// `N` or `N. Title`; only the leading integer is kept.
static DEPENDS_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)(?:\s*\.(?:\s+.*)?)?$").expect("valid depends regex"));

/// Phrases that stand in for a file list instead of naming files.
static VAGUE_FILE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        Regex::new(r"(?i)\ball\s+(the\s+)?files\b").expect("valid regex"),
        Regex::new(r"(?i)\brelated\s+files\b").expect("valid regex"),
        Regex::new(r"(?i)\band\s+more\b").expect("valid regex"),
        Regex::new(r"(?i)^(various|tbd|etc\.?)$").expect("valid regex"),
        Regex::new(r"(?i)(^|[\s,])(various|tbd)\b").expect("valid regex"),
        Regex::new(r"(?i)[\s,]etc\.?$").expect("valid regex"),
        Regex::new(r"\.\.\.").expect("valid regex"),
    ]
});

/// Verification that defers to a human instead of a check.
static VAGUE_VERIFICATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(manual(ly)?\s+review|review\s+manually|visual(ly)?\s+inspect(ion)?|check\s+manually|manually\s+check|looks\s+good)\b",
    )
    .expect("valid vague verification regex")
});

const GLOB_CHARS: &[char] = &['*', '?', '[', ']', '{', '}'];

/// Parse a depends field into deliverable numbers.
///
/// ```rust
/// use planwright_validation::rules::parse_depends;
///
/// assert_eq!(parse_depends("none"), Ok(vec![]));
/// assert_eq!(parse_depends("2"), Ok(vec![2]));
/// assert_eq!(parse_depends("1. Create model, 3"), Ok(vec![1, 3]));
/// assert!(parse_depends("the model").is_err());
/// ```
pub fn parse_depends(raw: &str) -> Result<Vec<u32>, String> {
    let trimmed = raw.trim();
    if trimmed.eq_ignore_ascii_case("none") || trimmed == "-" {
        return Ok(Vec::new());
    }
    if trimmed.is_empty() {
        return Err("depends is empty; use 'none'".to_string());
    }

    // A title may itself contain commas, so a fragment that does not start
    // with a digit continues the previous `N. Title` item.
    let mut items: Vec<String> = Vec::new();
    for fragment in trimmed.split(',') {
        let fragment = fragment.trim();
        let starts_numeric = fragment.starts_with(|c: char| c.is_ascii_digit());
        match items.last_mut() {
            Some(prev) if !starts_numeric && prev.contains('.') => {
                prev.push_str(", ");
                prev.push_str(fragment);
            }
            _ => items.push(fragment.to_string()),
        }
    }

    let mut out = Vec::new();
    for item in &items {
        let caps = DEPENDS_ITEM
            .captures(item)
            .ok_or_else(|| format!("'{item}' is not a deliverable number"))?;
        let number: u32 = caps[1]
            .parse()
            .map_err(|_| format!("'{}' is out of range", &caps[1]))?;
        if !out.contains(&number) {
            out.push(number);
        }
    }
    Ok(out)
}

/// Reason `path` is not an explicit relative file path, if any.
///
/// ```rust
/// use planwright_validation::rules::file_reference_problem;
///
/// assert_eq!(file_reference_problem("src/main/java/App.java"), None);
/// assert!(file_reference_problem("src/**/*.java").is_some());
/// assert!(file_reference_problem("all test files").is_some());
/// ```
#[must_use]
pub fn file_reference_problem(path: &str) -> Option<String> {
    let p = path.trim();
    if p.is_empty() {
        return Some("empty file reference".to_string());
    }
    if VAGUE_FILE.iter().any(|re| re.is_match(p)) {
        return Some(format!("'{p}' is a vague reference, not a file"));
    }
    if p.starts_with('/') || p.starts_with('\\') || p.starts_with('~') || has_drive_prefix(p) {
        return Some(format!("'{p}' is not a relative path"));
    }
    if p.contains(GLOB_CHARS) {
        return Some(format!("'{p}' is a glob, not a file"));
    }
    if p.split(['/', '\\']).any(|c| c == "..") {
        return Some(format!("'{p}' escapes the repository"));
    }
    if p.ends_with('/') || p.ends_with('\\') {
        return Some(format!("'{p}' is a directory, not a file"));
    }
    if p.contains(char::is_whitespace) && !p.contains(['/', '.']) {
        return Some(format!("'{p}' describes files instead of naming them"));
    }
    None
}

fn has_drive_prefix(p: &str) -> bool {
    let bytes = p.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}

/// Whether a verification command or criterion defers to manual judgement.
#[must_use]
pub fn is_vague_verification(text: &str) -> bool {
    VAGUE_VERIFICATION.is_match(text)
}
