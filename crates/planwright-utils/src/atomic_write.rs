//! Atomic and append-only file primitives for the artifact store
//!
//! Every byte a plan persists goes through one of two paths:
//! - `write_file_atomic`: temp file in the target directory, fsync, rename
//!   (with a copy fallback when the rename crosses filesystems)
//! - `append_line`: append-mode open, one complete line, fsync
//!
//! Both normalize line endings to LF so hashes are stable across platforms.

use anyhow::{Context, Result};
use camino::Utf8Path;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;

use tempfile::NamedTempFile;

/// Outcome of an atomic write
#[derive(Debug, Clone, Default)]
pub struct AtomicWriteResult {
    /// Rename retries spent on transient locks (Windows only)
    pub rename_retry_count: u32,
    /// Whether the rename crossed filesystems and was replaced by a copy
    pub used_cross_filesystem_fallback: bool,
    /// blake3 hex digest of the bytes that landed on disk
    pub blake3_hash: String,
    pub warnings: Vec<String>,
}

/// Atomically replace `path` with `content`.
///
/// Readers observe either the previous file or the new one, never a torn
/// write. The parent directory is created when missing.
pub fn write_file_atomic(path: &Utf8Path, content: &str) -> Result<AtomicWriteResult> {
    let normalized = normalize_line_endings(content);
    let mut result = AtomicWriteResult {
        blake3_hash: content_hash(&normalized),
        ..AtomicWriteResult::default()
    };

    let dir = path.parent().unwrap_or_else(|| Utf8Path::new("."));
    fs::create_dir_all(dir).with_context(|| format!("Failed to create directory: {dir}"))?;

    let staged = stage(dir, normalized.as_bytes())?;
    match persist_with_retry(staged, path.as_std_path()) {
        Ok(0) => {}
        Ok(retries) => {
            result.rename_retry_count = retries;
            result
                .warnings
                .push(format!("{path}: rename retried {retries} time(s)"));
        }
        Err(e) if is_cross_filesystem_error(&e) => {
            result.used_cross_filesystem_fallback = true;
            result
                .warnings
                .push(format!("{path}: rename crossed filesystems, copied instead"));
            stage(dir, normalized.as_bytes())?
                .persist(path.as_std_path())
                .map_err(|e| anyhow::Error::new(e.error))
                .with_context(|| format!("Failed to replace {path}"))?;
        }
        Err(e) => return Err(e).with_context(|| format!("Failed to replace {path}")),
    }

    Ok(result)
}

/// Write `bytes` to a synced temp file in `dir`.
fn stage(dir: &Utf8Path, bytes: &[u8]) -> Result<NamedTempFile> {
    let mut staged = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {dir}"))?;
    staged
        .write_all(bytes)
        .context("Failed to write temporary file")?;
    staged
        .as_file()
        .sync_all()
        .context("Failed to fsync temporary file")?;
    Ok(staged)
}

/// Append exactly one line to `path`, creating the file if needed.
///
/// Embedded newlines must already be escaped by the caller; a trailing `\n`
/// is added here. The file is fsynced before returning.
pub fn append_line(path: &Utf8Path, line: &str) -> Result<()> {
    if line.contains('\n') || line.contains('\r') {
        anyhow::bail!("Refusing to append multi-line entry to {path}");
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create parent directory: {parent}"))?;
    }

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path.as_std_path())
        .with_context(|| format!("Failed to open for append: {path}"))?;

    let mut buf = String::with_capacity(line.len() + 1);
    buf.push_str(line);
    buf.push('\n');
    file.write_all(buf.as_bytes())
        .with_context(|| format!("Failed to append to: {path}"))?;
    file.sync_all()
        .with_context(|| format!("Failed to fsync after append: {path}"))?;

    Ok(())
}

/// blake3 hex digest of some content
#[must_use]
pub fn content_hash(content: &str) -> String {
    blake3::hash(content.as_bytes()).to_hex().to_string()
}

/// blake3 hex digest of a file on disk, read with CRLF tolerance
pub fn file_hash(path: &Utf8Path) -> Result<String> {
    Ok(content_hash(&read_file_with_crlf_tolerance(path)?))
}

fn normalize_line_endings(content: &str) -> String {
    content.replace("\r\n", "\n").replace('\r', "\n")
}

/// Rename into place, retrying permission errors on Windows with backoff.
fn persist_with_retry(mut staged: NamedTempFile, target: &Path) -> Result<u32> {
    const ATTEMPTS: u32 = if cfg!(windows) { 5 } else { 0 };
    let mut retries = 0;
    loop {
        match staged.persist(target) {
            Ok(_) => return Ok(retries),
            Err(e) if retries < ATTEMPTS && e.error.kind() == ErrorKind::PermissionDenied => {
                retries += 1;
                thread::sleep(Duration::from_millis(10 << retries));
                staged = e.file;
            }
            Err(e) => return Err(anyhow::Error::new(e.error)),
        }
    }
}

fn is_cross_filesystem_error(err: &anyhow::Error) -> bool {
    // EXDEV
    cfg!(unix)
        && err
            .downcast_ref::<std::io::Error>()
            .and_then(std::io::Error::raw_os_error)
            == Some(18)
}

/// Read a file and normalize its line endings to LF.
pub fn read_file_with_crlf_tolerance(path: &Utf8Path) -> Result<String> {
    let content = fs::read_to_string(path.as_std_path())
        .with_context(|| format!("Failed to read file: {path}"))?;

    Ok(normalize_line_endings(&content))
}
