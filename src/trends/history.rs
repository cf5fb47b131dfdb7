//! Append-only JSON history files with retention pruning
//!
//! ## Concurrency
//!
//! Appends run under an exclusive `<file>.lock` sibling created with
//! `create_new`. Contenders retry for a few seconds; a lock older than
//! `STALE_LOCK_AGE` is assumed abandoned and broken by exactly one
//! contender (see `break_stale_lock`). The file itself is
//! replaced atomically (write `<file>.tmp`, then rename), so readers never
//! observe a partial write and need no lock.

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, warn};

use crate::error::{HistoryError, HistoryResult};

const LOCK_ATTEMPTS: u32 = 50;
const LOCK_RETRY_DELAY: std::time::Duration = std::time::Duration::from_millis(100);
const STALE_LOCK_AGE: std::time::Duration = std::time::Duration::from_secs(30);

/// Anything stored in a history file
pub trait Timestamped {
    fn timestamp(&self) -> DateTime<Utc>;
}

/// One history file holding a chronologically sorted list of points
#[derive(Debug, Clone)]
pub struct HistoryStore<T> {
    path: PathBuf,
    retention_days: i64,
    _marker: PhantomData<T>,
}

impl<T> HistoryStore<T>
where
    T: Timestamped + Serialize + DeserializeOwned,
{
    pub fn new(path: impl Into<PathBuf>, retention_days: i64) -> Self {
        Self {
            path: path.into(),
            retention_days: retention_days.max(1),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn retention_days(&self) -> i64 {
        self.retention_days
    }

    /// Read the history; a missing file is an empty history
    pub fn load(&self) -> HistoryResult<Vec<T>> {
        let bytes = match std::fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(HistoryError::io(&self.path, e)),
        };

        if bytes.iter().all(|b| b.is_ascii_whitespace()) {
            return Ok(Vec::new());
        }

        let mut points: Vec<T> =
            serde_json::from_slice(&bytes).map_err(|source| HistoryError::Parse {
                path: self.path.clone(),
                source,
            })?;
        points.sort_by_key(|p| p.timestamp());
        Ok(points)
    }

    /// Read the history, treating any failure as an empty history
    pub fn load_or_empty(&self) -> Vec<T> {
        match self.load() {
            Ok(points) => points,
            Err(e) => {
                warn!("Ignoring unreadable history: {}", e);
                Vec::new()
            }
        }
    }

    /// Most recent point, if any
    pub fn latest(&self) -> Option<T> {
        self.load_or_empty().pop()
    }

    /// Append a point, prune by retention and persist
    ///
    /// Returns the number of points kept on disk.
    pub fn append(&self, point: T, now: DateTime<Utc>) -> HistoryResult<usize> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| HistoryError::io(parent, e))?;
            }
        }

        let _lock = HistoryLock::acquire(&self.path)?;

        let mut points = match self.load() {
            Ok(points) => points,
            Err(e @ HistoryError::Parse { .. }) => {
                warn!("Starting fresh history: {}", e);
                self.quarantine_corrupt();
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        points.push(point);
        points.sort_by_key(|p| p.timestamp());
        let pruned = prune(&mut points, now, self.retention_days);
        if pruned > 0 {
            debug!(
                "Pruned {} points older than {} days from {:?}",
                pruned, self.retention_days, self.path
            );
        }

        self.write_atomic(&points)?;
        Ok(points.len())
    }

    fn write_atomic(&self, points: &[T]) -> HistoryResult<()> {
        let tmp = self.path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(points).map_err(|source| HistoryError::Parse {
            path: self.path.clone(),
            source,
        })?;
        std::fs::write(&tmp, json).map_err(|e| HistoryError::io(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| HistoryError::io(&self.path, e))?;
        Ok(())
    }

    /// Keep a copy of an unparseable file next to the fresh one
    fn quarantine_corrupt(&self) {
        let backup = self.path.with_extension("json.corrupt");
        if let Err(e) = std::fs::rename(&self.path, &backup) {
            debug!("Could not move corrupt history aside: {}", e);
        }
    }
}

/// Drop points older than `retention_days` before `now`; returns how many
pub fn prune<T: Timestamped>(
    points: &mut Vec<T>,
    now: DateTime<Utc>,
    retention_days: i64,
) -> usize {
    let cutoff = now - Duration::days(retention_days);
    let before = points.len();
    points.retain(|p| p.timestamp() >= cutoff);
    before - points.len()
}

/// Exclusive writer lock held for the lifetime of the value
#[derive(Debug)]
struct HistoryLock {
    path: PathBuf,
    /// Written into the lock file so release never removes another holder's lock
    token: String,
}

impl HistoryLock {
    fn acquire(target: &Path) -> HistoryResult<Self> {
        let path = lock_path(target);
        let token = lock_token();

        for _ in 0..LOCK_ATTEMPTS {
            if let Some(lock) = Self::try_create(&path, &token)? {
                return Ok(lock);
            }
            if !break_stale_lock(&path, &token)? {
                std::thread::sleep(LOCK_RETRY_DELAY);
            }
        }

        Err(HistoryError::Locked {
            path: target.to_path_buf(),
        })
    }

    /// Create `path` exclusively; `None` while someone else holds it
    fn try_create(path: &Path, token: &str) -> HistoryResult<Option<Self>> {
        match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                if let Err(e) = file.write_all(token.as_bytes()) {
                    remove_if_present(path)?;
                    return Err(HistoryError::io(path, e));
                }
                Ok(Some(Self {
                    path: path.to_path_buf(),
                    token: token.to_string(),
                }))
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(HistoryError::io(path, e)),
        }
    }
}

impl Drop for HistoryLock {
    fn drop(&mut self) {
        match std::fs::read_to_string(&self.path) {
            Ok(owner) if owner == self.token => {
                if let Err(e) = std::fs::remove_file(&self.path) {
                    debug!("Failed to release history lock {:?}: {}", self.path, e);
                }
            }
            Ok(_) => warn!("History lock {:?} was broken while held", self.path),
            Err(e) => debug!("Failed to release history lock {:?}: {}", self.path, e),
        }
    }
}

/// Remove a lock older than `STALE_LOCK_AGE`; returns whether it was removed
///
/// Breakers take `<file>.lock.break` first and re-check the age while
/// holding it. Only one contender can break a given lock, and the fresh
/// lock of whoever won the previous break is never removed.
fn break_stale_lock(path: &Path, token: &str) -> HistoryResult<bool> {
    if !is_stale(path) {
        return Ok(false);
    }

    let breaker_path = with_suffix(path, ".break");
    let Some(_breaker) = HistoryLock::try_create(&breaker_path, token)? else {
        // Breakers hold this for two syscalls; an old one belongs to a dead process
        if is_stale(&breaker_path) {
            warn!("Removing abandoned lock breaker {:?}", breaker_path);
            remove_if_present(&breaker_path)?;
        }
        return Ok(false);
    };

    if !is_stale(path) {
        return Ok(false);
    }
    warn!("Breaking stale history lock {:?}", path);
    remove_if_present(path)?;
    Ok(true)
}

fn remove_if_present(path: &Path) -> HistoryResult<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(HistoryError::io(path, e)),
    }
}

fn lock_token() -> String {
    static NEXT: AtomicU64 = AtomicU64::new(0);
    format!("{}:{}", std::process::id(), NEXT.fetch_add(1, Ordering::Relaxed))
}

fn lock_path(target: &Path) -> PathBuf {
    with_suffix(target, ".lock")
}

fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

fn is_stale(path: &Path) -> bool {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| modified.elapsed().ok())
        .map(|age| age > STALE_LOCK_AGE)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Point {
        at: DateTime<Utc>,
        value: u32,
    }

    impl Timestamped for Point {
        fn timestamp(&self) -> DateTime<Utc> {
            self.at
        }
    }

    fn at(day: u32) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(&format!("2026-01-{:02}T12:00:00Z", day))
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_missing_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let store: HistoryStore<Point> = HistoryStore::new(tmp.path().join("h.json"), 30);
        assert!(store.load().unwrap().is_empty());
        assert!(store.latest().is_none());
    }

    #[test]
    fn test_append_sorts_and_persists() {
        let tmp = TempDir::new().unwrap();
        let store = HistoryStore::new(tmp.path().join("nested/h.json"), 30);

        store.append(Point { at: at(5), value: 5 }, at(6)).unwrap();
        store.append(Point { at: at(3), value: 3 }, at(6)).unwrap();
        let kept = store.append(Point { at: at(4), value: 4 }, at(6)).unwrap();

        assert_eq!(kept, 3);
        let values: Vec<u32> = store.load().unwrap().iter().map(|p| p.value).collect();
        assert_eq!(values, vec![3, 4, 5]);
        assert_eq!(store.latest().unwrap().value, 5);
        assert!(!lock_path(store.path()).exists());
    }

    #[test]
    fn test_append_prunes_old_points() {
        let tmp = TempDir::new().unwrap();
        let store = HistoryStore::new(tmp.path().join("h.json"), 7);

        store.append(Point { at: at(1), value: 1 }, at(1)).unwrap();
        store.append(Point { at: at(10), value: 10 }, at(10)).unwrap();

        let points = store.load().unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].value, 10);
    }

    #[test]
    fn test_corrupt_file_degrades() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("h.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store: HistoryStore<Point> = HistoryStore::new(&path, 30);
        assert!(matches!(store.load(), Err(HistoryError::Parse { .. })));
        assert!(store.load_or_empty().is_empty());

        store.append(Point { at: at(2), value: 2 }, at(2)).unwrap();
        assert_eq!(store.load().unwrap().len(), 1);
        assert!(path.with_extension("json.corrupt").exists());
    }

    #[test]
    fn test_held_lock_times_out() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("h.json");
        let _held = HistoryLock::acquire(&path).unwrap();

        let store: HistoryStore<Point> = HistoryStore::new(&path, 30);
        let err = store.append(Point { at: at(2), value: 2 }, at(2)).unwrap_err();
        assert!(matches!(err, HistoryError::Locked { .. }));
    }

    #[test]
    fn test_concurrent_appends_keep_every_point() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("h.json");

        let handles: Vec<_> = (0..4u32)
            .map(|i| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let store: HistoryStore<Point> = HistoryStore::new(path, 30);
                    store.append(Point { at: at(10 + i), value: i }, at(20)).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let store: HistoryStore<Point> = HistoryStore::new(&path, 30);
        assert_eq!(store.load().unwrap().len(), 4);
    }

    fn age_lock(path: &Path) {
        let file = std::fs::File::options().write(true).open(path).unwrap();
        let old = std::time::SystemTime::now() - std::time::Duration::from_secs(120);
        file.set_modified(old).unwrap();
    }

    #[test]
    fn test_stale_lock_is_broken() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("h.json");
        let lock = lock_path(&path);
        std::fs::write(&lock, "4242:0").unwrap();
        age_lock(&lock);

        let store: HistoryStore<Point> = HistoryStore::new(&path, 30);
        store.append(Point { at: at(2), value: 2 }, at(2)).unwrap();

        assert_eq!(store.load().unwrap().len(), 1);
        assert!(!lock.exists());
        assert!(!with_suffix(&lock, ".break").exists());
    }

    #[test]
    fn test_stale_lock_broken_once_under_contention() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("h.json");
        let lock = lock_path(&path);
        std::fs::write(&lock, "4242:0").unwrap();
        age_lock(&lock);

        let barrier = std::sync::Arc::new(std::sync::Barrier::new(8));
        let handles: Vec<_> = (0..8u32)
            .map(|i| {
                let path = path.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    let store: HistoryStore<Point> = HistoryStore::new(path, 30);
                    barrier.wait();
                    store.append(Point { at: at(10 + i), value: i }, at(20)).unwrap();
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let store: HistoryStore<Point> = HistoryStore::new(&path, 30);
        assert_eq!(store.load().unwrap().len(), 8);
        assert!(!lock.exists());
    }

    #[test]
    fn test_fresh_lock_is_not_broken() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("h.json");
        let lock = lock_path(&path);
        std::fs::write(&lock, "4242:0").unwrap();

        assert!(!break_stale_lock(&lock, "1:0").unwrap());
        assert_eq!(std::fs::read_to_string(&lock).unwrap(), "4242:0");
    }

    #[test]
    fn test_release_leaves_a_taken_over_lock() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("h.json");
        let held = HistoryLock::acquire(&path).unwrap();

        let lock = lock_path(&path);
        std::fs::write(&lock, "4242:7").unwrap();
        drop(held);

        assert_eq!(std::fs::read_to_string(&lock).unwrap(), "4242:7");
    }
}
