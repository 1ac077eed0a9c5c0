//! Shared working directory for fit runs.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{ArcMutexGuard, Mutex, RawMutex};
use tracing::{debug, warn};

use crate::error::{PredictError, PredictResult};

/// One lock per canonical directory path, shared by every [`ScratchDir`]
/// in the process.
static DIRECTORY_LOCKS: Mutex<BTreeMap<PathBuf, Arc<Mutex<()>>>> =
    parking_lot::const_mutex(BTreeMap::new());

fn directory_lock(canonical: &Path) -> Arc<Mutex<()>> {
    let mut locks = DIRECTORY_LOCKS.lock();
    Arc::clone(locks.entry(canonical.to_path_buf()).or_default())
}

/// A directory in which input files are written, the fit program is run,
/// and its output is read back.
///
/// All instances naming the same directory, however the path is spelled,
/// serialise their write, run, and read cycles.
#[derive(Debug, Clone)]
pub struct ScratchDir {
    path: PathBuf,
}

impl ScratchDir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `$TMPDIR/tempo/$USER`, falling back to `~/tempo.tmp` when that cannot
    /// be created.
    pub fn resolve_default() -> PredictResult<Self> {
        let user = env::var("USER").unwrap_or_else(|_| "unknown".to_string());
        let primary = env::temp_dir().join("tempo").join(user);
        match fs::create_dir_all(&primary) {
            Ok(()) => return Ok(Self::new(primary)),
            Err(e) => warn!(path = %primary.display(), error = %e, "Cannot create scratch directory"),
        }

        let home = dirs::home_dir().ok_or_else(|| {
            PredictError::invalid_state(
                "ScratchDir::resolve_default",
                "cannot create a temporary working directory",
            )
        })?;
        let fallback = home.join("tempo.tmp");
        fs::create_dir_all(&fallback).map_err(|e| {
            PredictError::invalid_state(
                "ScratchDir::resolve_default",
                format!("cannot create a temporary working directory: {}", e),
            )
        })?;
        Ok(Self::new(fallback))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Take exclusive use of the directory, creating it if needed.
    pub fn lock(&self) -> PredictResult<ScratchGuard<'_>> {
        let io_error = |e| PredictError::io("ScratchDir::lock", self.path.display(), e);
        fs::create_dir_all(&self.path).map_err(io_error)?;
        let canonical = fs::canonicalize(&self.path).map_err(io_error)?;
        let guard = directory_lock(&canonical).lock_arc();
        debug!(path = %self.path.display(), "Scratch directory locked");
        Ok(ScratchGuard {
            path: &self.path,
            _guard: guard,
        })
    }
}

/// Exclusive access to a [`ScratchDir`] for the lifetime of the guard.
pub struct ScratchGuard<'a> {
    path: &'a Path,
    _guard: ArcMutexGuard<RawMutex, ()>,
}

impl ScratchGuard<'_> {
    pub fn path(&self) -> &Path {
        self.path
    }

    pub fn file(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    pub fn write_file(&self, name: &str, contents: &str) -> PredictResult<()> {
        let path = self.file(name);
        fs::write(&path, contents).map_err(|e| PredictError::io("ScratchGuard::write", path.display(), e))
    }

    /// Contents of `name`, or `None` if it does not exist.
    pub fn read_file(&self, name: &str) -> PredictResult<Option<String>> {
        let path = self.file(name);
        match fs::read_to_string(&path) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PredictError::io("ScratchGuard::read", path.display(), e)),
        }
    }

    /// Remove `name` if present.
    pub fn remove_file(&self, name: &str) -> PredictResult<()> {
        let path = self.file(name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PredictError::io("ScratchGuard::remove", path.display(), e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn test_lock_creates_directory() {
        let temp = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::new(temp.path().join("tempo").join("user"));
        let guard = scratch.lock().unwrap();
        assert!(guard.path().is_dir());
    }

    #[test]
    fn test_file_helpers() {
        let temp = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::new(temp.path());
        let guard = scratch.lock().unwrap();

        assert_eq!(guard.read_file("tz.in").unwrap(), None);
        guard.write_file("tz.in", "7 8 960 12 1400\n").unwrap();
        assert_eq!(guard.read_file("tz.in").unwrap().as_deref(), Some("7 8 960 12 1400\n"));
        guard.remove_file("tz.in").unwrap();
        guard.remove_file("tz.in").unwrap();
        assert!(!guard.file("tz.in").exists());
    }

    #[test]
    fn test_instances_on_one_directory_exclude_each_other() {
        let temp = tempfile::tempdir().unwrap();
        let first = ScratchDir::new(temp.path());
        let second = ScratchDir::new(temp.path().join("sub").join(".."));
        fs::create_dir_all(temp.path().join("sub")).unwrap();

        let held = first.lock().unwrap();
        let lock = directory_lock(&fs::canonicalize(temp.path()).unwrap());
        assert!(lock.try_lock().is_none());

        let (sender, receiver) = std::sync::mpsc::channel();
        let waiter = thread::spawn(move || {
            let _guard = second.lock().unwrap();
            sender.send(()).unwrap();
        });
        assert!(receiver
            .recv_timeout(std::time::Duration::from_millis(100))
            .is_err());

        drop(held);
        receiver
            .recv_timeout(std::time::Duration::from_secs(10))
            .unwrap();
        waiter.join().unwrap();
    }

    #[test]
    fn test_other_directories_do_not_block() {
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let _first = ScratchDir::new(a.path()).lock().unwrap();
        let _second = ScratchDir::new(b.path()).lock().unwrap();
    }

    #[test]
    fn test_clones_share_the_lock() {
        let temp = tempfile::tempdir().unwrap();
        let scratch = ScratchDir::new(temp.path());
        let inside = Arc::new(AtomicUsize::new(0));
        let overlap = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let scratch = scratch.clone();
                let inside = Arc::clone(&inside);
                let overlap = Arc::clone(&overlap);
                thread::spawn(move || {
                    for _ in 0..20 {
                        let _guard = scratch.lock().unwrap();
                        if inside.fetch_add(1, Ordering::SeqCst) > 0 {
                            overlap.fetch_add(1, Ordering::SeqCst);
                        }
                        thread::yield_now();
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(overlap.load(Ordering::SeqCst), 0);
    }
}
