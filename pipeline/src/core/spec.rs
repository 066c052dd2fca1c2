//! Study specification entries (`studyspec.json`, one JSON object per line).
//!
//! Rule application merges into whatever is already in the file, so before a
//! new rule run everything except the "applies-to-all" entries is dropped.
//! Those entries are needed by the converter for every acquisition.

use anyhow::{Result, anyhow};
use serde_json::Value;

/// `type` of the entry that applies to every series of an acquisition.
pub const SENTINEL_TYPE: &str = "dicomseries:all";

/// A single specification line.
///
/// The original line text is kept so a rewrite does not reorder keys or
/// otherwise touch entries that survive.
#[derive(Debug, Clone, PartialEq)]
pub struct SpecEntry {
    raw: String,
    value: Value,
}

impl SpecEntry {
    pub fn parse(line: &str) -> Result<Self> {
        let raw = line.trim();
        let value: Value =
            serde_json::from_str(raw).map_err(|err| anyhow!("invalid json: {err}"))?;
        if !value.is_object() {
            return Err(anyhow!("expected a json object"));
        }
        Ok(Self {
            raw: raw.to_string(),
            value,
        })
    }

    pub fn entry_type(&self) -> Option<&str> {
        self.value.get("type").and_then(Value::as_str)
    }

    pub fn is_sentinel(&self) -> bool {
        self.entry_type() == Some(SENTINEL_TYPE)
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// Parse a specification document. Blank lines are ignored.
pub fn parse_spec(contents: &str) -> Result<Vec<SpecEntry>> {
    let mut entries = Vec::new();
    for (idx, line) in contents.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let entry = SpecEntry::parse(line).map_err(|err| anyhow!("line {}: {err}", idx + 1))?;
        entries.push(entry);
    }
    Ok(entries)
}

/// Keep only sentinel entries, in their original relative order.
pub fn retain_sentinels(entries: Vec<SpecEntry>) -> Vec<SpecEntry> {
    entries
        .into_iter()
        .filter(SpecEntry::is_sentinel)
        .collect()
}

/// Serialize entries back to one object per line with a trailing newline.
pub fn render_spec(entries: &[SpecEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str(entry.raw());
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIXED: &str = r#"{"type": "dicomseries:all", "id": "a1", "location": "dicoms"}
{"type": "dicomseries", "id": "s1", "bids-modality": {"value": "T1w"}}

{"id": "s2", "comment": "no type at all"}
{"type": "dicomseries:all", "id": "a2"}
{"type": "events_file", "id": "e1"}
"#;

    #[test]
    fn reset_keeps_only_sentinels_in_order() {
        let entries = parse_spec(MIXED).expect("parse");
        assert_eq!(entries.len(), 5);

        let kept = retain_sentinels(entries);
        let ids: Vec<&str> = kept
            .iter()
            .map(|entry| entry.value()["id"].as_str().expect("id"))
            .collect();
        assert_eq!(ids, vec!["a1", "a2"]);
    }

    #[test]
    fn render_preserves_original_line_text() {
        let kept = retain_sentinels(parse_spec(MIXED).expect("parse"));
        assert_eq!(
            render_spec(&kept),
            "{\"type\": \"dicomseries:all\", \"id\": \"a1\", \"location\": \"dicoms\"}\n\
             {\"type\": \"dicomseries:all\", \"id\": \"a2\"}\n"
        );
    }

    #[test]
    fn empty_document_has_no_entries() {
        assert!(parse_spec("").expect("parse").is_empty());
        assert!(parse_spec("\n  \n").expect("parse").is_empty());
        assert_eq!(render_spec(&[]), "");
    }

    #[test]
    fn parse_error_names_line() {
        let err = parse_spec("{\"type\": \"x\"}\nnot json\n").unwrap_err();
        assert!(err.to_string().starts_with("line 2:"), "{err}");
    }

    #[test]
    fn non_object_lines_are_rejected() {
        let err = parse_spec("[1, 2]\n").unwrap_err();
        assert!(err.to_string().contains("expected a json object"));
    }

    #[test]
    fn entry_without_type_is_not_sentinel() {
        let entry = SpecEntry::parse(r#"{"id": "x"}"#).expect("parse");
        assert_eq!(entry.entry_type(), None);
        assert!(!entry.is_sentinel());
    }
}
