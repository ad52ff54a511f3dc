//! Line-oriented tabular encoding for bulk plan records
//!
//! ```text
//! #planwright deliverables v1
//! number	title	change_type	...
//! 1	Create A	create	...
//! ```
//!
//! Line 1 names the record kind and schema version, line 2 is the header of
//! field names, every further line is one record. Rows are matched to fields
//! by header name, so column order in the file is free. Cells escape `\`,
//! tab, newline and carriage return; list cells hold compact JSON.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::str::FromStr;

use planwright_utils::error::StoreError;

use crate::records::{Deliverable, ProfileSkills, Task, Verification};

pub const SCHEMA_VERSION: &str = "v1";
const MARKER: &str = "#planwright";

/// A record type with an explicit tabular schema.
pub trait TabularRecord: Sized {
    /// Record kind named in the marker line.
    const KIND: &'static str;
    /// Field names, in the order they are written.
    const FIELDS: &'static [&'static str];

    /// Cells in `FIELDS` order, unescaped.
    fn to_cells(&self) -> Result<Vec<String>, StoreError>;

    fn from_row(row: &Row<'_>) -> Result<Self, String>;
}

/// One parsed row, addressable by field name.
#[derive(Debug)]
pub struct Row<'a> {
    cells: HashMap<&'a str, String>,
}

impl Row<'_> {
    pub fn text(&self, field: &str) -> Result<&str, String> {
        self.cells
            .get(field)
            .map(String::as_str)
            .ok_or_else(|| format!("missing column '{field}'"))
    }

    pub fn number(&self, field: &str) -> Result<u32, String> {
        let raw = self.text(field)?;
        raw.trim()
            .parse()
            .map_err(|_| format!("'{field}' is not a number: '{raw}'"))
    }

    pub fn parse<T: FromStr>(&self, field: &str) -> Result<T, String> {
        let raw = self.text(field)?;
        raw.parse()
            .map_err(|_| format!("'{field}' has unknown value '{raw}'"))
    }

    pub fn json<T: DeserializeOwned>(&self, field: &str) -> Result<T, String> {
        let raw = self.text(field)?;
        serde_json::from_str(raw).map_err(|e| format!("'{field}' is not valid JSON: {e}"))
    }
}

pub(crate) fn json_cell<T: Serialize>(kind: &str, value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|e| StoreError::Codec {
        artifact: kind.to_string(),
        line: 0,
        reason: e.to_string(),
    })
}

/// Escape a cell so it never contains a raw tab or line break.
#[must_use]
pub fn escape_cell(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

/// Inverse of [`escape_cell`]. Unknown escapes are kept verbatim.
#[must_use]
pub fn unescape_cell(cell: &str) -> String {
    let mut out = String::with_capacity(cell.len());
    let mut chars = cell.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('t') => out.push('\t'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Encode records as a complete document.
pub fn serialize_table<R: TabularRecord>(records: &[R]) -> Result<String, StoreError> {
    let mut out = format!("{MARKER} {} {SCHEMA_VERSION}\n", R::KIND);
    out.push_str(&R::FIELDS.join("\t"));
    out.push('\n');
    for record in records {
        let cells = record.to_cells()?;
        let escaped: Vec<String> = cells.iter().map(|c| escape_cell(c)).collect();
        out.push_str(&escaped.join("\t"));
        out.push('\n');
    }
    Ok(out)
}

/// Decode a document produced by [`serialize_table`].
///
/// An empty document decodes to no records.
pub fn parse_table<R: TabularRecord>(text: &str) -> Result<Vec<R>, StoreError> {
    let codec_err = |line: usize, reason: String| StoreError::Codec {
        artifact: R::KIND.to_string(),
        line,
        reason,
    };

    let mut lines = text.lines().enumerate().map(|(i, l)| (i + 1, l));

    let Some((_, marker)) = lines.next() else {
        return Ok(Vec::new());
    };
    let expected_marker = format!("{MARKER} {} {SCHEMA_VERSION}", R::KIND);
    if marker.trim_end() != expected_marker {
        return Err(codec_err(
            1,
            format!("expected marker '{expected_marker}', found '{marker}'"),
        ));
    }

    let Some((_, header_line)) = lines.next() else {
        return Err(codec_err(2, "missing header line".to_string()));
    };
    let header: Vec<&str> = header_line.split('\t').collect();
    for field in R::FIELDS {
        if !header.contains(field) {
            return Err(codec_err(2, format!("header lacks column '{field}'")));
        }
    }
    if let Some(unknown) = header.iter().find(|h| !R::FIELDS.contains(h)) {
        return Err(codec_err(2, format!("unknown column '{unknown}'")));
    }

    let mut records = Vec::new();
    for (line_no, line) in lines {
        if line.is_empty() {
            continue;
        }
        let cells: Vec<&str> = line.split('\t').collect();
        if cells.len() != header.len() {
            return Err(codec_err(
                line_no,
                format!("expected {} cells, found {}", header.len(), cells.len()),
            ));
        }
        let row = Row {
            cells: header
                .iter()
                .zip(cells)
                .map(|(name, cell)| (*name, unescape_cell(cell)))
                .collect(),
        };
        records.push(R::from_row(&row).map_err(|reason| codec_err(line_no, reason))?);
    }
    Ok(records)
}

impl TabularRecord for Deliverable {
    const KIND: &'static str = "deliverables";
    const FIELDS: &'static [&'static str] = &[
        "number",
        "title",
        "change_type",
        "execution_mode",
        "domain",
        "module",
        "profiles",
        "depends",
        "affected_files",
        "verification_commands",
        "verification_criteria",
    ];

    fn to_cells(&self) -> Result<Vec<String>, StoreError> {
        Ok(vec![
            self.number.to_string(),
            self.title.clone(),
            self.change_type.to_string(),
            self.execution_mode.to_string(),
            self.domain.clone(),
            self.module.clone(),
            json_cell(Self::KIND, &self.profiles)?,
            json_cell(Self::KIND, &self.depends)?,
            json_cell(Self::KIND, &self.affected_files)?,
            json_cell(Self::KIND, &self.verification.commands)?,
            json_cell(Self::KIND, &self.verification.criteria)?,
        ])
    }

    fn from_row(row: &Row<'_>) -> Result<Self, String> {
        Ok(Self {
            number: row.number("number")?,
            title: row.text("title")?.to_string(),
            change_type: row.parse("change_type")?,
            execution_mode: row.parse("execution_mode")?,
            domain: row.text("domain")?.to_string(),
            module: row.text("module")?.to_string(),
            profiles: row.json::<Vec<ProfileSkills>>("profiles")?,
            depends: row.json("depends")?,
            affected_files: row.json("affected_files")?,
            verification: Verification {
                commands: row.json("verification_commands")?,
                criteria: row.json("verification_criteria")?,
            },
        })
    }
}

impl TabularRecord for Task {
    const KIND: &'static str = "tasks";
    const FIELDS: &'static [&'static str] = &[
        "id",
        "title",
        "deliverable_refs",
        "domain",
        "profile",
        "execution_mode",
        "skills",
        "depends_on",
        "steps",
        "verification_commands",
        "verification_criteria",
        "status",
    ];

    fn to_cells(&self) -> Result<Vec<String>, StoreError> {
        Ok(vec![
            self.id.to_string(),
            self.title.clone(),
            json_cell(Self::KIND, &self.deliverable_refs)?,
            self.domain.clone(),
            self.profile.clone(),
            self.execution_mode.to_string(),
            json_cell(Self::KIND, &self.skills)?,
            json_cell(Self::KIND, &self.depends_on)?,
            json_cell(Self::KIND, &self.steps)?,
            json_cell(Self::KIND, &self.verification.commands)?,
            json_cell(Self::KIND, &self.verification.criteria)?,
            self.status.to_string(),
        ])
    }

    fn from_row(row: &Row<'_>) -> Result<Self, String> {
        Ok(Self {
            id: row.number("id")?,
            title: row.text("title")?.to_string(),
            deliverable_refs: row.json("deliverable_refs")?,
            domain: row.text("domain")?.to_string(),
            profile: row.text("profile")?.to_string(),
            execution_mode: row.parse("execution_mode")?,
            skills: row.json("skills")?,
            depends_on: row.json("depends_on")?,
            steps: row.json("steps")?,
            verification: Verification {
                commands: row.json("verification_commands")?,
                criteria: row.json("verification_criteria")?,
            },
            status: row.parse("status")?,
        })
    }
}
