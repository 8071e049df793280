//! Per-path serialization for concurrent builds.
//!
//! Distinct variants write distinct files, so generation needs no global
//! lock. Two tasks that target the *same* path (a duplicated request, or two
//! widths sharing one generated-metadata record) must not interleave their
//! check-then-write sequences. [`PathLocks`] hands out one mutex per path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// Registry of per-path mutexes.
///
/// An entry lives only while some caller holds or waits on its path, so a
/// long-lived registry stays as small as its current contention.
#[derive(Debug, Default)]
pub struct PathLocks {
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl PathLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `path`.
    ///
    /// A panic in a previous holder does not poison the path: the protected
    /// state lives on disk, not in the mutex.
    pub fn with_lock<R>(&self, path: &Path, f: impl FnOnce() -> R) -> R {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(path.to_path_buf()).or_default())
        };
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };
        self.release(path, lock);
        result
    }

    /// Drop the entry for `path` if no other caller holds a reference.
    fn release(&self, path: &Path, lock: Arc<Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // References are only cloned under the map lock: the map's and ours.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(path);
        }
    }

    /// Number of paths currently held or waited on.
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn returns_closure_result() {
        let locks = PathLocks::new();
        assert_eq!(locks.with_lock(Path::new("/a"), || 42), 42);
    }

    #[test]
    fn entries_released_after_use() {
        let locks = PathLocks::new();
        locks.with_lock(Path::new("/a"), || ());
        locks.with_lock(Path::new("/b"), || ());
        assert!(locks.is_empty());
    }

    #[test]
    fn one_entry_per_held_path() {
        let locks = PathLocks::new();
        locks.with_lock(Path::new("/a"), || {
            locks.with_lock(Path::new("/b"), || assert_eq!(locks.len(), 2));
            assert_eq!(locks.len(), 1);
        });
        assert_eq!(locks.len(), 0);
    }

    #[test]
    fn many_paths_leave_nothing_behind() {
        let locks = PathLocks::new();
        (0..256).into_par_iter().for_each(|i| {
            let path = PathBuf::from(format!("/img-{}", i % 8));
            locks.with_lock(&path, std::thread::yield_now);
        });
        assert!(locks.is_empty());
    }

    #[test]
    fn same_path_never_overlaps() {
        let locks = PathLocks::new();
        let inside = AtomicUsize::new(0);
        let max_seen = AtomicUsize::new(0);

        (0..64).into_par_iter().for_each(|_| {
            locks.with_lock(Path::new("/shared"), || {
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                std::thread::yield_now();
                inside.fetch_sub(1, Ordering::SeqCst);
            });
        });

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }
}
