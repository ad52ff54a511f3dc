//! Single-writer locks for plan directories
//!
//! Each plan has at most one writer. The writer holds `<locks_dir>/<plan_id>.lock`
//! for its lifetime: the file is created with `create_new` semantics, carries the
//! holder's PID as JSON, and is additionally held with an exclusive fd lock.
//! Readers never take the lock.
//!
//! Locks are advisory. They coordinate planwright processes but are not a
//! security boundary.

use camino::{Utf8Path, Utf8PathBuf};
use fd_lock::RwLock;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::process;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Default age threshold for considering a lock stale (in seconds)
pub const DEFAULT_STALE_THRESHOLD_SECS: u64 = 3600;

const MAX_ACQUIRE_ATTEMPTS: u32 = 3;

/// Lock information stored in the lock file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    /// Process ID of the writer
    pub pid: u32,
    /// Seconds since UNIX epoch when the lock was taken
    pub created_at: u64,
    pub plan_id: String,
    pub planwright_version: String,
}

/// Lock errors for file locking operations
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error(
        "Concurrent writer detected for plan '{plan_id}' (PID {pid}, created {created_ago} ago)"
    )]
    ConcurrentExecution {
        plan_id: String,
        pid: u32,
        created_ago: String,
    },

    #[error("Stale lock detected for plan '{plan_id}' (PID {pid}, age {age_secs}s)")]
    StaleLock {
        plan_id: String,
        pid: u32,
        age_secs: u64,
    },

    #[error("Lock file is corrupted or invalid: {reason}")]
    CorruptedLock { reason: String },

    #[error("Failed to acquire lock: {reason}")]
    AcquisitionFailed { reason: String },

    #[error("Failed to release lock: {reason}")]
    ReleaseFailed { reason: String },

    #[error("IO error during lock operation: {0}")]
    Io(#[from] io::Error),
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Exclusive writer lock for one plan, released on drop
pub struct FileLock {
    lock_path: Utf8PathBuf,
    _fd_lock: Option<Box<RwLock<fs::File>>>,
    lock_info: LockInfo,
}

impl FileLock {
    /// Take the writer lock for `plan_id`.
    ///
    /// An existing lock is overridden only when `force` is set, or never when
    /// its holder is alive and `force` is unset. A lock whose holder is gone is
    /// reported as [`LockError::StaleLock`] once older than `ttl_seconds`
    /// (default one hour), and as a concurrent writer before that.
    pub fn acquire(
        locks_dir: &Utf8Path,
        plan_id: &str,
        force: bool,
        ttl_seconds: Option<u64>,
    ) -> Result<Self, LockError> {
        fs::create_dir_all(locks_dir).map_err(|e| LockError::AcquisitionFailed {
            reason: format!("Failed to create lock directory {locks_dir}: {e}"),
        })?;

        let lock_path = Self::lock_path(locks_dir, plan_id);
        let ttl = ttl_seconds.unwrap_or(DEFAULT_STALE_THRESHOLD_SECS);

        for attempt in 0..MAX_ACQUIRE_ATTEMPTS {
            let lock_info = LockInfo {
                pid: process::id(),
                created_at: now_secs(),
                plan_id: plan_id.to_string(),
                planwright_version: env!("CARGO_PKG_VERSION").to_string(),
            };

            match fs::OpenOptions::new()
                .create_new(true)
                .write(true)
                .open(&lock_path)
            {
                Ok(file) => return Self::finalize(lock_path, file, lock_info),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    Self::check_existing_lock(&lock_path, plan_id, force, ttl)?;
                    Self::remove_stale_lock(&lock_path, plan_id)?;
                    // Another writer may win the race after removal; back off and retry.
                    let jitter = u64::from(process::id() % 7);
                    std::thread::sleep(Duration::from_millis(
                        (10u64 << attempt).saturating_add(jitter).min(100),
                    ));
                }
                Err(e) => {
                    return Err(LockError::AcquisitionFailed {
                        reason: format!("Failed to create lock file {lock_path}: {e}"),
                    });
                }
            }
        }

        Err(LockError::AcquisitionFailed {
            reason: format!(
                "Another writer took the lock for plan '{plan_id}' after {MAX_ACQUIRE_ATTEMPTS} attempts"
            ),
        })
    }

    fn finalize(
        lock_path: Utf8PathBuf,
        file: fs::File,
        lock_info: LockInfo,
    ) -> Result<Self, LockError> {
        let lock_json =
            serde_json::to_string_pretty(&lock_info).map_err(|e| LockError::AcquisitionFailed {
                reason: format!("Failed to serialize lock info: {e}"),
            })?;

        let mut rw_lock = Box::new(RwLock::new(file));
        {
            let guard = rw_lock
                .try_write()
                .map_err(|_| LockError::ConcurrentExecution {
                    plan_id: lock_info.plan_id.clone(),
                    pid: 0,
                    created_ago: "unknown".to_string(),
                })?;

            let mut file_ref = &*guard;
            file_ref
                .write_all(lock_json.as_bytes())
                .and_then(|()| file_ref.flush())
                .and_then(|()| file_ref.sync_all())
                .map_err(|e| LockError::AcquisitionFailed {
                    reason: format!("Failed to write lock info to {lock_path}: {e}"),
                })?;
        }

        Ok(Self {
            lock_path,
            _fd_lock: Some(rw_lock),
            lock_info,
        })
    }

    /// Rename-then-delete, so a concurrent reader never sees a half-removed lock.
    fn remove_stale_lock(lock_path: &Utf8Path, plan_id: &str) -> Result<(), LockError> {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis();
        let stale_path = lock_path.with_extension(format!("stale.{stamp}.{}", process::id()));

        match fs::rename(lock_path, &stale_path) {
            Ok(()) => {
                let _ = fs::remove_file(&stale_path);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LockError::AcquisitionFailed {
                reason: format!("Failed to rename stale lock for plan '{plan_id}': {e}"),
            }),
        }
    }

    /// Path of the lock file for `plan_id`
    #[must_use]
    pub fn lock_path(locks_dir: &Utf8Path, plan_id: &str) -> Utf8PathBuf {
        locks_dir.join(format!("{plan_id}.lock"))
    }

    #[must_use]
    pub fn exists(locks_dir: &Utf8Path, plan_id: &str) -> bool {
        Self::lock_path(locks_dir, plan_id).exists()
    }

    /// Read the current holder of a plan lock, if any
    pub fn get_lock_info(
        locks_dir: &Utf8Path,
        plan_id: &str,
    ) -> Result<Option<LockInfo>, LockError> {
        let lock_path = Self::lock_path(locks_dir, plan_id);
        let content = match fs::read_to_string(&lock_path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(LockError::CorruptedLock {
                    reason: format!("Failed to read lock file: {e}"),
                });
            }
        };

        serde_json::from_str(&content)
            .map(Some)
            .map_err(|e| LockError::CorruptedLock {
                reason: format!("Failed to parse lock file: {e}"),
            })
    }

    /// Release the lock explicitly (also done on drop)
    pub fn release(mut self) -> Result<(), LockError> {
        self._fd_lock.take();
        match fs::remove_file(&self.lock_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LockError::ReleaseFailed {
                reason: format!("Failed to remove lock file: {e}"),
            }),
        }
    }

    #[must_use]
    pub fn plan_id(&self) -> &str {
        &self.lock_info.plan_id
    }

    #[must_use]
    pub const fn lock_info(&self) -> &LockInfo {
        &self.lock_info
    }

    /// Retries briefly when the file exists but its holder has not finished writing it.
    fn check_existing_lock(
        lock_path: &Utf8Path,
        plan_id: &str,
        force: bool,
        ttl_seconds: u64,
    ) -> Result<(), LockError> {
        const MAX_READ_RETRIES: u32 = 3;
        const READ_RETRY_DELAY_MS: u64 = 10;

        let mut last_problem = String::new();
        for _ in 0..MAX_READ_RETRIES {
            let content = match fs::read_to_string(lock_path) {
                Ok(content) => content,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
                Err(e) => {
                    last_problem = format!("Failed to read existing lock for plan '{plan_id}': {e}");
                    std::thread::sleep(Duration::from_millis(READ_RETRY_DELAY_MS));
                    continue;
                }
            };

            match serde_json::from_str::<LockInfo>(&content) {
                Ok(existing) => {
                    return Self::validate_existing_lock(&existing, plan_id, force, ttl_seconds);
                }
                Err(e) => {
                    let incomplete = e.is_eof() || content.trim().is_empty();
                    last_problem = if content.is_empty() {
                        format!("Lock file for plan '{plan_id}' is empty (may be initializing)")
                    } else {
                        format!("Failed to parse existing lock for plan '{plan_id}': {e}")
                    };
                    if !incomplete {
                        break;
                    }
                    std::thread::sleep(Duration::from_millis(READ_RETRY_DELAY_MS));
                }
            }
        }

        if force {
            return Ok(());
        }
        Err(LockError::CorruptedLock {
            reason: last_problem,
        })
    }

    fn validate_existing_lock(
        existing: &LockInfo,
        plan_id: &str,
        force: bool,
        ttl_seconds: u64,
    ) -> Result<(), LockError> {
        if force {
            return Ok(());
        }

        // Future timestamps (clock skew) count as age zero.
        let age = now_secs().saturating_sub(existing.created_at);

        if !Self::is_process_running(existing.pid) && age > ttl_seconds {
            return Err(LockError::StaleLock {
                plan_id: plan_id.to_string(),
                pid: existing.pid,
                age_secs: age,
            });
        }

        Err(LockError::ConcurrentExecution {
            plan_id: plan_id.to_string(),
            pid: existing.pid,
            created_ago: format_duration_since(existing.created_at),
        })
    }

    fn is_process_running(pid: u32) -> bool {
        #[cfg(unix)]
        {
            let Ok(pid) = i32::try_from(pid) else {
                return false;
            };
            // kill(pid, 0) probes without signalling; EPERM still means alive.
            let rc = unsafe { libc::kill(pid, 0) };
            rc == 0
                || matches!(
                    io::Error::last_os_error().raw_os_error(),
                    Some(code) if code == libc::EPERM
                )
        }

        #[cfg(windows)]
        {
            use winapi::um::handleapi::CloseHandle;
            use winapi::um::minwinbase::STILL_ACTIVE;
            use winapi::um::processthreadsapi::{GetExitCodeProcess, OpenProcess};
            use winapi::um::winnt::PROCESS_QUERY_LIMITED_INFORMATION;

            unsafe {
                let handle = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, 0, pid);
                if handle.is_null() {
                    return false;
                }
                let mut exit_code: u32 = 0;
                let ok = GetExitCodeProcess(handle, &mut exit_code);
                CloseHandle(handle);
                ok != 0 && exit_code == STILL_ACTIVE
            }
        }

        #[cfg(not(any(unix, windows)))]
        {
            true
        }
    }
}

fn format_duration_since(timestamp: u64) -> String {
    let duration = now_secs().saturating_sub(timestamp);
    if duration < 60 {
        format!("{duration}s")
    } else if duration < 3600 {
        format!("{}m", duration / 60)
    } else if duration < 86400 {
        format!("{}h", duration / 3600)
    } else {
        format!("{}d", duration / 86400)
    }
}

impl std::fmt::Debug for FileLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileLock")
            .field("lock_path", &self.lock_path)
            .field("lock_info", &self.lock_info)
            .field("_fd_lock", &"<RwLock>")
            .finish()
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        self._fd_lock.take();
        let _ = fs::remove_file(&self.lock_path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn locks_dir(temp: &TempDir) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(temp.path().join("locks")).unwrap()
    }

    fn plant_lock(dir: &Utf8Path, plan_id: &str, pid: u32, created_at: u64) {
        fs::create_dir_all(dir).unwrap();
        let info = LockInfo {
            pid,
            created_at,
            plan_id: plan_id.to_string(),
            planwright_version: "0.9.0".to_string(),
        };
        fs::write(
            FileLock::lock_path(dir, plan_id),
            serde_json::to_string_pretty(&info).unwrap(),
        )
        .unwrap();
    }

    // PIDs near i32::MAX are never allocated in practice.
    const DEAD_PID: u32 = 2_000_000_000;

    #[test]
    fn test_lock_acquisition_and_release() {
        let temp = TempDir::new().unwrap();
        let dir = locks_dir(&temp);

        let lock = FileLock::acquire(&dir, "plan-a", false, None).unwrap();
        assert_eq!(lock.plan_id(), "plan-a");
        assert!(FileLock::exists(&dir, "plan-a"));

        let second = FileLock::acquire(&dir, "plan-a", false, None);
        assert!(matches!(
            second.unwrap_err(),
            LockError::ConcurrentExecution { .. }
        ));

        lock.release().unwrap();
        assert!(!FileLock::exists(&dir, "plan-a"));

        let _again = FileLock::acquire(&dir, "plan-a", false, None).unwrap();
    }

    #[test]
    fn test_locks_are_per_plan() {
        let temp = TempDir::new().unwrap();
        let dir = locks_dir(&temp);

        let _a = FileLock::acquire(&dir, "plan-a", false, None).unwrap();
        let _b = FileLock::acquire(&dir, "plan-b", false, None).unwrap();
    }

    #[test]
    fn test_lock_info_records_holder() {
        let temp = TempDir::new().unwrap();
        let dir = locks_dir(&temp);

        let _lock = FileLock::acquire(&dir, "plan-info", false, None).unwrap();
        let info = FileLock::get_lock_info(&dir, "plan-info").unwrap().unwrap();
        assert_eq!(info.plan_id, "plan-info");
        assert_eq!(info.pid, process::id());
        assert!(!info.planwright_version.is_empty());
    }

    #[test]
    fn test_drop_releases() {
        let temp = TempDir::new().unwrap();
        let dir = locks_dir(&temp);
        {
            let _lock = FileLock::acquire(&dir, "plan-drop", false, None).unwrap();
            assert!(FileLock::exists(&dir, "plan-drop"));
        }
        assert!(!FileLock::exists(&dir, "plan-drop"));
    }

    #[test]
    fn test_old_lock_from_dead_process_is_stale() {
        let temp = TempDir::new().unwrap();
        let dir = locks_dir(&temp);
        plant_lock(&dir, "plan-stale", DEAD_PID, now_secs() - 7200);

        let err = FileLock::acquire(&dir, "plan-stale", false, None).unwrap_err();
        assert!(matches!(err, LockError::StaleLock { age_secs, .. } if age_secs >= 7200));

        let lock = FileLock::acquire(&dir, "plan-stale", true, None).unwrap();
        assert_eq!(lock.lock_info().pid, process::id());
    }

    #[test]
    fn test_recent_lock_from_dead_process_needs_force() {
        let temp = TempDir::new().unwrap();
        let dir = locks_dir(&temp);
        plant_lock(&dir, "plan-recent", DEAD_PID, now_secs() - 60);

        assert!(matches!(
            FileLock::acquire(&dir, "plan-recent", false, None).unwrap_err(),
            LockError::ConcurrentExecution { .. }
        ));
        // A short TTL makes the same lock stale.
        assert!(matches!(
            FileLock::acquire(&dir, "plan-recent", false, Some(30)).unwrap_err(),
            LockError::StaleLock { .. }
        ));
        assert!(FileLock::acquire(&dir, "plan-recent", true, None).is_ok());
    }

    #[test]
    fn test_future_timestamp_is_not_stale() {
        let temp = TempDir::new().unwrap();
        let dir = locks_dir(&temp);
        plant_lock(&dir, "plan-skew", DEAD_PID, now_secs() + 86400);

        assert!(matches!(
            FileLock::acquire(&dir, "plan-skew", false, Some(1)).unwrap_err(),
            LockError::ConcurrentExecution { .. }
        ));
    }

    #[test]
    fn test_corrupted_lock_reported_unless_forced() {
        let temp = TempDir::new().unwrap();
        let dir = locks_dir(&temp);
        fs::create_dir_all(&dir).unwrap();
        fs::write(FileLock::lock_path(&dir, "plan-bad"), "not json at all").unwrap();

        let err = FileLock::acquire(&dir, "plan-bad", false, None).unwrap_err();
        match err {
            LockError::CorruptedLock { reason } => assert!(reason.contains("plan-bad")),
            other => panic!("expected CorruptedLock, got {other:?}"),
        }
        assert!(FileLock::acquire(&dir, "plan-bad", true, None).is_ok());
    }

    #[test]
    fn test_get_lock_info_missing_and_corrupted() {
        let temp = TempDir::new().unwrap();
        let dir = locks_dir(&temp);
        assert!(FileLock::get_lock_info(&dir, "nobody").unwrap().is_none());

        fs::create_dir_all(&dir).unwrap();
        fs::write(FileLock::lock_path(&dir, "broken"), "{\"pid\":").unwrap();
        assert!(matches!(
            FileLock::get_lock_info(&dir, "broken").unwrap_err(),
            LockError::CorruptedLock { .. }
        ));
    }

    #[test]
    fn test_duration_formatting() {
        let now = now_secs();
        assert!(format_duration_since(now).ends_with('s'));
        assert_eq!(format_duration_since(now - 120), "2m");
        assert_eq!(format_duration_since(now - 7200), "2h");
        assert_eq!(format_duration_since(now - 172_800), "2d");
    }
}
