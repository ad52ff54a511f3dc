use anyhow::{Context, Result};
use serde::Serialize;

/// Emit a value as JCS-canonical JSON (RFC 8785).
///
/// Used for `status.json` and the compliance manifest so identical state
/// always hashes identically regardless of struct field order.
///
/// ```rust
/// use planwright_utils::canonicalization::emit_jcs;
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Entry {
///     zeta: u32,
///     alpha: &'static str,
/// }
///
/// let json = emit_jcs(&Entry { zeta: 1, alpha: "a" }).unwrap();
/// assert_eq!(json, r#"{"alpha":"a","zeta":1}"#);
/// ```
pub fn emit_jcs<T: Serialize>(value: &T) -> Result<String> {
    let json_value =
        serde_json::to_value(value).with_context(|| "Failed to serialize value to JSON")?;
    let json_bytes = serde_json_canonicalizer::to_vec(&json_value)
        .with_context(|| "Failed to canonicalize JSON using JCS")?;
    String::from_utf8(json_bytes).with_context(|| "JCS output contained invalid UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_map_order_does_not_change_output() {
        let mut a = HashMap::new();
        a.insert("tasks.tsv", "h2");
        a.insert("status.json", "h1");
        let mut b = HashMap::new();
        b.insert("status.json", "h1");
        b.insert("tasks.tsv", "h2");

        assert_eq!(emit_jcs(&a).unwrap(), emit_jcs(&b).unwrap());
        assert_eq!(
            emit_jcs(&a).unwrap(),
            r#"{"status.json":"h1","tasks.tsv":"h2"}"#
        );
    }
}
