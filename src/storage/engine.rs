//! Thread-Safe Storage Engine with Passive Expiry
//!
//! This module implements the shared key-value store behind every connection.
//!
//! ## Design Decisions
//!
//! 1. **Sharded Locks**: Instead of one big lock, keys are spread over shards to reduce contention.
//! 2. **Passive Expiry**: Keys are checked for expiry only when read. Nothing sweeps in the background.
//! 3. **RwLock**: Readers of live keys share a shard; any mutation, including eviction on read, is exclusive.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Keys are distributed across shards using a hash function. Every operation
//! touches exactly one shard and holds its lock only for a map lookup, insert
//! or remove.
//!
//! ## Memory
//!
//! An expired key that is never read again stays resident until a SET
//! overwrites it. The store cannot bound its own memory by time alone.

use bytes::Bytes;
use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, Instant};

/// Number of shards for the storage engine.
/// More shards = less lock contention, but more memory overhead.
/// 64 is a good balance for most workloads.
const NUM_SHARDS: usize = 64;

/// Represents a stored value with optional expiry time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// The actual value stored
    pub value: Bytes,
    /// When this entry expires (None = never expires)
    pub expires_at: Option<Instant>,
}

impl Entry {
    /// Creates a new entry, expiring `expire_ms` milliseconds from `now`.
    ///
    /// `None` and `Some(0)` both mean the entry never expires. So does an
    /// expiry too far in the future for the platform clock to represent.
    pub fn new(value: Bytes, expire_ms: Option<u64>, now: Instant) -> Self {
        let expires_at = expire_ms
            .filter(|&ms| ms > 0)
            .and_then(|ms| now.checked_add(Duration::from_millis(ms)));

        Self { value, expires_at }
    }

    /// Checks if this entry has expired as of `now`.
    ///
    /// An entry is expired at, not only after, its deadline.
    #[inline]
    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|exp| now >= exp)
    }

    /// Checks if this entry has expired.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }
}

/// A single shard containing a portion of the key-value pairs.
#[derive(Debug, Default)]
struct Shard {
    data: RwLock<HashMap<Bytes, Entry>>,
}

impl Shard {
    // Every critical section leaves the map consistent, so a panic in
    // another holder does not invalidate the data.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<Bytes, Entry>> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<Bytes, Entry>> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The shared key-value store.
///
/// # Thread Safety
///
/// This struct is designed to be wrapped in an `Arc` and shared across
/// all client handler tasks. All operations are thread-safe and none of them
/// block on anything but a shard lock.
///
/// # Example
///
/// ```
/// use tinykv::storage::StorageEngine;
/// use bytes::Bytes;
///
/// let engine = StorageEngine::new();
///
/// // Set a key
/// engine.set(Bytes::from("name"), Bytes::from("Ariz"), None);
///
/// // Get the value
/// let value = engine.get(b"name");
/// assert_eq!(value, Some(Bytes::from("Ariz")));
///
/// // Set with a one minute expiry
/// engine.set(Bytes::from("session"), Bytes::from("abc123"), Some(60_000));
/// ```
pub struct StorageEngine {
    /// Sharded storage for reduced lock contention
    shards: Vec<Shard>,

    /// Statistics: total number of resident keys, expired ones included
    key_count: AtomicU64,

    /// Statistics: total GET operations
    get_count: AtomicU64,

    /// Statistics: total SET operations
    set_count: AtomicU64,

    /// Statistics: number of expired keys evicted on read
    expired_count: AtomicU64,
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("shards", &self.shards.len())
            .field("key_count", &self.key_count.load(Ordering::Relaxed))
            .field("get_count", &self.get_count.load(Ordering::Relaxed))
            .field("set_count", &self.set_count.load(Ordering::Relaxed))
            .field("expired_count", &self.expired_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine {
    /// Creates a new, empty storage engine.
    pub fn new() -> Self {
        let shards = (0..NUM_SHARDS).map(|_| Shard::default()).collect();

        Self {
            shards,
            key_count: AtomicU64::new(0),
            get_count: AtomicU64::new(0),
            set_count: AtomicU64::new(0),
            expired_count: AtomicU64::new(0),
        }
    }

    /// Determines which shard a key belongs to.
    #[inline]
    fn shard_index(&self, key: &[u8]) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % NUM_SHARDS
    }

    /// Gets the shard for a given key.
    #[inline]
    fn get_shard(&self, key: &[u8]) -> &Shard {
        &self.shards[self.shard_index(key)]
    }

    /// Sets a key-value pair, replacing any existing entry wholesale.
    ///
    /// With `expire_ms` present and non-zero the key expires that many
    /// milliseconds from now; otherwise it never expires. A previous expiry
    /// on the key is never inherited.
    ///
    /// # Returns
    ///
    /// Returns `true` if a new key was created, `false` if an existing key was replaced.
    pub fn set(&self, key: Bytes, value: Bytes, expire_ms: Option<u64>) -> bool {
        self.set_count.fetch_add(1, Ordering::Relaxed);

        let entry = Entry::new(value, expire_ms, Instant::now());
        let shard = self.get_shard(&key);
        let mut data = shard.write();

        let is_new = data.insert(key, entry).is_none();
        if is_new {
            self.key_count.fetch_add(1, Ordering::Relaxed);
        }

        is_new
    }

    /// Gets the value for a key.
    ///
    /// Returns `None` if the key doesn't exist or has expired. A key found
    /// expired is removed from the store by this call, so `get` may mutate.
    pub fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.get_count.fetch_add(1, Ordering::Relaxed);

        let shard = self.get_shard(key);

        // Fast path for missing and live keys under the shared lock
        {
            let data = shard.read();
            match data.get(key) {
                None => return None,
                Some(entry) if !entry.is_expired() => return Some(entry.value.clone()),
                Some(_) => {}
            }
        }

        // Key looked expired - take the write lock and check again, since a
        // SET may have replaced it in between.
        let mut data = shard.write();
        let entry = data.get(key)?;
        if !entry.is_expired() {
            return Some(entry.value.clone());
        }

        data.remove(key);
        self.key_count.fetch_sub(1, Ordering::Relaxed);
        self.expired_count.fetch_add(1, Ordering::Relaxed);
        None
    }

    /// Reports whether `key` is resident, expired or not.
    ///
    /// Unlike [`get`](Self::get) this never evicts, so it shows whether a
    /// passive expiry has happened yet.
    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.get_shard(key).read().contains_key(key)
    }

    /// Returns the number of resident keys, including expired keys that
    /// have not been read since they expired.
    ///
    /// This is an approximation under concurrent writes because it uses
    /// relaxed atomic ordering.
    pub fn len(&self) -> u64 {
        self.key_count.load(Ordering::Relaxed)
    }

    /// Returns true if no keys are resident.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns database statistics.
    pub fn stats(&self) -> StorageStats {
        StorageStats {
            keys: self.key_count.load(Ordering::Relaxed),
            get_ops: self.get_count.load(Ordering::Relaxed),
            set_ops: self.set_count.load(Ordering::Relaxed),
            expired: self.expired_count.load(Ordering::Relaxed),
        }
    }
}

/// Database statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageStats {
    /// Number of keys currently resident
    pub keys: u64,
    /// Total GET operations
    pub get_ops: u64,
    /// Total SET operations
    pub set_ops: u64,
    /// Total expired keys evicted on read
    pub expired: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_set_and_get() {
        let engine = StorageEngine::new();

        assert!(engine.set(Bytes::from("key"), Bytes::from("value"), None));
        assert_eq!(engine.get(b"key"), Some(Bytes::from("value")));
    }

    #[test]
    fn test_get_nonexistent() {
        let engine = StorageEngine::new();
        assert_eq!(engine.get(b"nonexistent"), None);
        assert!(engine.is_empty());
    }

    #[test]
    fn test_overwrite() {
        let engine = StorageEngine::new();

        assert!(engine.set(Bytes::from("key"), Bytes::from("v1"), None));
        assert!(!engine.set(Bytes::from("key"), Bytes::from("v2"), None));
        assert_eq!(engine.get(b"key"), Some(Bytes::from("v2")));
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn test_zero_expiry_never_expires() {
        let engine = StorageEngine::new();

        engine.set(Bytes::from("key"), Bytes::from("value"), Some(0));
        thread::sleep(Duration::from_millis(20));
        assert_eq!(engine.get(b"key"), Some(Bytes::from("value")));
    }

    #[test]
    fn test_expiry_evicts_on_read() {
        let engine = StorageEngine::new();

        engine.set(Bytes::from("key"), Bytes::from("value"), Some(100));

        // Still live before the deadline
        assert_eq!(engine.get(b"key"), Some(Bytes::from("value")));

        thread::sleep(Duration::from_millis(150));

        // Expired but nobody has looked yet
        assert!(engine.contains_key(b"key"));
        assert_eq!(engine.len(), 1);

        // The read evicts it
        assert_eq!(engine.get(b"key"), None);
        assert!(!engine.contains_key(b"key"));
        assert_eq!(engine.len(), 0);
        assert_eq!(engine.stats().expired, 1);
    }

    #[test]
    fn test_overwrite_clears_expiry() {
        let engine = StorageEngine::new();

        engine.set(Bytes::from("key"), Bytes::from("v1"), Some(50));
        engine.set(Bytes::from("key"), Bytes::from("v2"), None);

        thread::sleep(Duration::from_millis(80));

        assert_eq!(engine.get(b"key"), Some(Bytes::from("v2")));
    }

    #[test]
    fn test_set_revives_expired_key() {
        let engine = StorageEngine::new();

        engine.set(Bytes::from("key"), Bytes::from("old"), Some(10));
        thread::sleep(Duration::from_millis(30));

        // Overwriting an expired-but-resident key counts as a replacement
        assert!(!engine.set(Bytes::from("key"), Bytes::from("new"), None));
        assert_eq!(engine.get(b"key"), Some(Bytes::from("new")));
        assert_eq!(engine.len(), 1);
    }

    #[test]
    fn test_entry_expiry_boundary() {
        let now = Instant::now();
        let entry = Entry::new(Bytes::from("v"), Some(100), now);

        assert!(!entry.is_expired_at(now));
        assert!(!entry.is_expired_at(now + Duration::from_millis(99)));
        assert!(entry.is_expired_at(now + Duration::from_millis(100)));
        assert!(entry.is_expired_at(now + Duration::from_millis(101)));
    }

    #[test]
    fn test_entry_without_expiry() {
        let now = Instant::now();

        assert_eq!(Entry::new(Bytes::from("v"), None, now).expires_at, None);
        assert_eq!(Entry::new(Bytes::from("v"), Some(0), now).expires_at, None);
    }

    #[test]
    fn test_entry_unrepresentable_expiry() {
        let entry = Entry::new(Bytes::from("v"), Some(u64::MAX), Instant::now());
        assert!(!entry.is_expired());
    }

    #[test]
    fn test_stats() {
        let engine = StorageEngine::new();

        engine.set(Bytes::from("a"), Bytes::from("1"), None);
        engine.set(Bytes::from("b"), Bytes::from("2"), None);
        engine.get(b"a");
        engine.get(b"missing");

        assert_eq!(
            engine.stats(),
            StorageStats {
                keys: 2,
                get_ops: 2,
                set_ops: 2,
                expired: 0,
            }
        );
    }

    #[test]
    fn test_independent_instances() {
        let first = StorageEngine::new();
        let second = StorageEngine::new();

        first.set(Bytes::from("key"), Bytes::from("value"), None);
        assert_eq!(second.get(b"key"), None);
    }

    #[test]
    fn test_concurrent_access() {
        let engine = Arc::new(StorageEngine::new());
        let mut handles = vec![];

        // Spawn multiple writers on disjoint keys
        for i in 0..10 {
            let engine = Arc::clone(&engine);
            handles.push(thread::spawn(move || {
                for j in 0..100 {
                    let key = format!("key-{}-{}", i, j);
                    engine.set(Bytes::from(key.clone()), Bytes::from(format!("{}", j)), None);
                    assert_eq!(engine.get(key.as_bytes()), Some(Bytes::from(format!("{}", j))));
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(engine.len(), 1000);
        for i in 0..10 {
            for j in 0..100 {
                let key = format!("key-{}-{}", i, j);
                assert!(engine.get(key.as_bytes()).is_some());
            }
        }
    }

    #[test]
    fn test_concurrent_same_key() {
        let engine = Arc::new(StorageEngine::new());
        let mut handles = vec![];

        for i in 0..8 {
            let engine = Arc::clone(&engine);
            handles.push(thread::spawn(move || {
                for j in 0..200 {
                    let expire = if j % 2 == 0 { Some(1) } else { None };
                    engine.set(Bytes::from("shared"), Bytes::from(format!("{}", i)), expire);
                    engine.get(b"shared");
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        // Whichever write landed last, the key count stays consistent
        // with what is actually resident.
        let resident = engine.contains_key(b"shared");
        assert_eq!(engine.len(), u64::from(resident));
    }
}
