//! Group buckets.
//!
//! Two layouts are used by the engines:
//! - [`BucketStore`] is shared by all scan workers of one window. Keys are registered up front
//!   (single-threaded), after which the map itself is never mutated; workers only lock the one
//!   bucket they append to.
//! - [`LocalBuckets`] is owned by a single worker and merged into the final grouping after the
//!   scan barrier, so the dense engine never takes a lock while scanning.
use ahash::RandomState;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub struct BucketStore<'a, K, T> {
    buckets: HashMap<K, Mutex<Vec<&'a T>>, RandomState>,
}

impl<'a, K, T> BucketStore<'a, K, T>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            buckets: HashMap::default(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buckets: HashMap::with_capacity_and_hasher(capacity, RandomState::new()),
        }
    }

    /// Create an empty bucket for `key`. Returns `false` if the key was already registered.
    pub fn register(&mut self, key: K) -> bool {
        match self.buckets.entry(key) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(Mutex::new(Vec::new()));
                true
            }
        }
    }

    pub fn is_registered(&self, key: &K) -> bool {
        self.buckets.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Append one row to a registered bucket. Rows for unregistered keys are dropped.
    pub fn append(&self, key: &K, row: &'a T) -> bool {
        match self.buckets.get(key) {
            Some(bucket) => {
                lock(bucket).push(row);
                true
            }
            None => false,
        }
    }

    /// Append a batch of rows to a registered bucket, taking the bucket lock once.
    pub fn extend(&self, key: &K, rows: impl IntoIterator<Item = &'a T>) -> bool {
        match self.buckets.get(key) {
            Some(bucket) => {
                lock(bucket).extend(rows);
                true
            }
            None => false,
        }
    }

    pub fn snapshot(&self, key: &K) -> Option<Vec<&'a T>> {
        self.buckets.get(key).map(|bucket| lock(bucket).clone())
    }

    /// Move the rows out of a bucket, leaving it registered but empty.
    pub fn take(&mut self, key: &K) -> Option<Vec<&'a T>> {
        self.buckets.get_mut(key).map(|bucket| {
            std::mem::take(bucket.get_mut().unwrap_or_else(PoisonError::into_inner))
        })
    }
}

impl<K, T> Default for BucketStore<'_, K, T>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

// A poisoned bucket only means another worker panicked mid-append; that panic is re-raised at
// the scan barrier, so the data is never observed.
fn lock<'g, 'a, T>(bucket: &'g Mutex<Vec<&'a T>>) -> MutexGuard<'g, Vec<&'a T>> {
    bucket.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Insertion-ordered key → rows map owned by one scan worker.
pub struct LocalBuckets<'a, K, T> {
    index: HashMap<K, usize, RandomState>,
    groups: Vec<(K, Vec<&'a T>)>,
}

impl<'a, K, T> LocalBuckets<'a, K, T>
where
    K: Clone + Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            index: HashMap::default(),
            groups: Vec::new(),
        }
    }

    /// Make sure `key` has a bucket, returning its position.
    pub fn touch(&mut self, key: K) -> usize {
        match self.index.entry(key) {
            Entry::Occupied(slot) => *slot.get(),
            Entry::Vacant(slot) => {
                let pos = self.groups.len();
                self.groups.push((slot.key().clone(), Vec::new()));
                slot.insert(pos);
                pos
            }
        }
    }

    pub fn push(&mut self, key: K, row: &'a T) {
        let pos = self.touch(key);
        self.groups[pos].1.push(row);
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Fold another worker's buckets into this one. Keys first seen in `other` are appended
    /// after the existing keys, in `other`'s order.
    pub fn merge(&mut self, other: LocalBuckets<'a, K, T>) {
        for (key, rows) in other.groups {
            let pos = self.touch(key);
            self.groups[pos].1.extend(rows);
        }
    }

    pub fn into_groups(self) -> Vec<(K, Vec<&'a T>)> {
        self.groups
    }
}

impl<K, T> Default for LocalBuckets<'_, K, T>
where
    K: Clone + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}
