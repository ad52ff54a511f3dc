//! Compliance manifest (`.manifest.json`)
//!
//! The store records the blake3 hash of every file it writes. Anything in a
//! plan directory that disagrees with the manifest was touched by something
//! other than the store.

use anyhow::{Context, Result};
use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use planwright_utils::atomic_write::{file_hash, read_file_with_crlf_tolerance, write_file_atomic};
use planwright_utils::canonicalization::emit_jcs;
use planwright_utils::error::ComplianceError;

pub const MANIFEST_FILE: &str = ".manifest.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceManifest {
    pub plan_id: String,
    /// File name → blake3 hex digest
    pub files: BTreeMap<String, String>,
}

impl ComplianceManifest {
    #[must_use]
    pub fn new(plan_id: &str) -> Self {
        Self {
            plan_id: plan_id.to_string(),
            files: BTreeMap::new(),
        }
    }

    /// Load the manifest of `dir`. A missing manifest is an empty one.
    pub fn load(dir: &Utf8Path, plan_id: &str) -> Result<Self, ComplianceError> {
        let path = dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(Self::new(plan_id));
        }
        let corrupt = |reason: String| ComplianceError::ManifestCorrupt {
            plan_id: plan_id.to_string(),
            reason,
        };
        let text = read_file_with_crlf_tolerance(&path).map_err(|e| corrupt(e.to_string()))?;
        let manifest: Self = serde_json::from_str(&text).map_err(|e| corrupt(e.to_string()))?;
        if manifest.plan_id != plan_id {
            return Err(corrupt(format!(
                "manifest belongs to plan '{}'",
                manifest.plan_id
            )));
        }
        Ok(manifest)
    }

    pub fn save(&self, dir: &Utf8Path) -> Result<()> {
        let json = emit_jcs(self)?;
        write_file_atomic(&dir.join(MANIFEST_FILE), &json)
            .with_context(|| format!("Failed to write manifest for plan '{}'", self.plan_id))?;
        Ok(())
    }

    pub fn record(&mut self, file: &str, blake3_hash: String) {
        self.files.insert(file.to_string(), blake3_hash);
    }

    /// Every disagreement between the manifest and `dir`, in file-name order.
    pub fn verify(&self, dir: &Utf8Path) -> Result<Vec<ComplianceError>> {
        let mut violations = Vec::new();

        for (file, expected) in &self.files {
            let path = dir.join(file);
            if !path.exists() {
                violations.push(ComplianceError::MissingFile {
                    plan_id: self.plan_id.clone(),
                    file: file.clone(),
                });
                continue;
            }
            if &file_hash(&path)? != expected {
                violations.push(ComplianceError::HashMismatch {
                    plan_id: self.plan_id.clone(),
                    file: file.clone(),
                });
            }
        }

        if dir.exists() {
            let mut unmanaged = Vec::new();
            for entry in dir
                .read_dir_utf8()
                .with_context(|| format!("Failed to list plan directory: {dir}"))?
            {
                let entry = entry.with_context(|| format!("Failed to read entry in {dir}"))?;
                let name = entry.file_name();
                if name != MANIFEST_FILE && !self.files.contains_key(name) {
                    unmanaged.push(name.to_string());
                }
            }
            unmanaged.sort();
            violations.extend(unmanaged.into_iter().map(|file| {
                ComplianceError::UnmanagedFile {
                    plan_id: self.plan_id.clone(),
                    file,
                }
            }));
        }

        Ok(violations)
    }
}
