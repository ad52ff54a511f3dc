use camino::{Utf8Path, Utf8PathBuf};
use std::cell::RefCell;

// Thread-local override used only in tests to avoid process-global env races.
thread_local! {
    static THREAD_HOME: RefCell<Option<Utf8PathBuf>> = const { RefCell::new(None) };
}

/// Environment variable that relocates the planwright home.
pub const HOME_ENV: &str = "PLANWRIGHT_HOME";

/// Directory name of the default home, relative to the working directory.
pub const DEFAULT_HOME: &str = ".planwright";

/// Directory under the home holding one directory per live plan.
pub const PLANS_DIR: &str = "plans";

/// Directory under the home holding plan lock files.
pub const LOCKS_DIR: &str = "locks";

/// Directory under the home holding completed plans.
pub const ARCHIVE_DIR: &str = "archive";

/// Resolve planwright home:
/// 1) thread-local override (tests use this)
/// 2) env `PLANWRIGHT_HOME` (opt-in for users/CI)
/// 3) default ".planwright"
#[must_use]
pub fn planwright_home() -> Utf8PathBuf {
    if let Some(tl) = THREAD_HOME.with(|tl| tl.borrow().clone()) {
        return tl;
    }
    if let Ok(p) = std::env::var(HOME_ENV) {
        return Utf8PathBuf::from(p);
    }
    Utf8PathBuf::from(DEFAULT_HOME)
}

/// Returns `<home>/plans`
#[must_use]
pub fn plans_root(home: &Utf8Path) -> Utf8PathBuf {
    home.join(PLANS_DIR)
}

/// Returns `<home>/plans/<plan_id>`
#[must_use]
pub fn plan_root(home: &Utf8Path, plan_id: &str) -> Utf8PathBuf {
    plans_root(home).join(plan_id)
}

/// Returns `<home>/locks`
///
/// Locks live outside the plan directory so a completed plan can be
/// archived while its writer still holds the lock.
#[must_use]
pub fn locks_dir(home: &Utf8Path) -> Utf8PathBuf {
    home.join(LOCKS_DIR)
}

/// Returns `<home>/archive`
#[must_use]
pub fn archive_dir(home: &Utf8Path) -> Utf8PathBuf {
    home.join(ARCHIVE_DIR)
}

/// mkdir -p; treat `AlreadyExists` as success (removes TOCTTOU races)
pub fn ensure_dir_all<P: AsRef<std::path::Path>>(p: P) -> std::io::Result<()> {
    match std::fs::create_dir_all(&p) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e),
    }
}

/// RAII guard for isolated home that clears thread-local state on drop
#[cfg(any(test, feature = "test-utils"))]
pub struct HomeGuard {
    inner: tempfile::TempDir,
}

#[cfg(any(test, feature = "test-utils"))]
impl HomeGuard {
    /// The isolated home as a UTF-8 path.
    #[must_use]
    pub fn home(&self) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(self.inner.path().to_path_buf())
            .unwrap_or_else(|p| Utf8PathBuf::from(p.to_string_lossy().into_owned()))
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl Drop for HomeGuard {
    fn drop(&mut self) {
        THREAD_HOME.with(|tl| *tl.borrow_mut() = None);
    }
}

#[cfg(any(test, feature = "test-utils"))]
impl std::ops::Deref for HomeGuard {
    type Target = tempfile::TempDir;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

/// Test helper: give this thread a unique home under the system temp dir.
///
/// Hold the `HomeGuard` for the test's duration so the directory stays alive.
/// The override is thread-local, so async tests must use a current-thread
/// runtime or pass the home explicitly.
#[cfg(any(test, feature = "test-utils"))]
#[cfg_attr(not(test), allow(dead_code))]
#[must_use]
pub fn with_isolated_home() -> HomeGuard {
    let td = tempfile::TempDir::new().expect("create temp home");
    let p = Utf8PathBuf::from_path_buf(td.path().to_path_buf()).expect("utf-8 temp path");
    THREAD_HOME.with(|tl| *tl.borrow_mut() = Some(p));
    HomeGuard { inner: td }
}
