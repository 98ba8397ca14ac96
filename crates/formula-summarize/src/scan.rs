//! Parallel row scans.
//!
//! Every scan splits the rows into contiguous chunks ([`ChunkPlan`]) and runs one task per chunk
//! on the crate-local pool. Workers share nothing but the read-only rows, the caller callbacks
//! and, for windowed scans, the [`BucketStore`]. The scan returns once every chunk is done.
use crate::bucket::{BucketStore, LocalBuckets};
use crate::filter::Filter;
use crate::key::{FieldValue, GroupKey};
use crate::options::KeyDiscovery;
use crate::parallel::map_slices;
use ahash::RandomState;
use std::collections::HashSet;
use std::hash::Hash;
use std::ops::Range;

pub(crate) type KeyFn<'a, T, K> = dyn Fn(&T) -> K + Send + Sync + 'a;

/// Split of `rows` rows into contiguous, equally sized chunks (the last one may be shorter).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkPlan {
    rows: usize,
    chunk_len: usize,
}

impl ChunkPlan {
    pub fn new(rows: usize, chunks: usize) -> Self {
        let chunk_len = rows.div_ceil(chunks.max(1)).max(1);
        Self { rows, chunk_len }
    }

    pub fn chunk_len(&self) -> usize {
        self.chunk_len
    }

    /// Number of non-empty chunks.
    pub fn chunk_count(&self) -> usize {
        self.rows.div_ceil(self.chunk_len)
    }

    pub fn ranges(&self) -> impl Iterator<Item = Range<usize>> + '_ {
        (0..self.chunk_count()).map(move |idx| {
            let start = idx * self.chunk_len;
            start..(start + self.chunk_len).min(self.rows)
        })
    }

    fn slices<'s, T>(&self, rows: &'s [T]) -> Vec<&'s [T]> {
        debug_assert_eq!(rows.len(), self.rows);
        rows.chunks(self.chunk_len).collect()
    }
}

pub(crate) struct Scanner<'s, 'a, T, K> {
    rows: &'a [T],
    plan: ChunkPlan,
    key_fn: &'s KeyFn<'a, T, K>,
    filter: &'s Filter<'a, T, K>,
}

impl<'s, 'a, T, K> Scanner<'s, 'a, T, K>
where
    T: Sync,
    K: Clone + Eq + Hash + Send + Sync,
{
    pub(crate) fn new(
        rows: &'a [T],
        chunks: usize,
        key_fn: &'s KeyFn<'a, T, K>,
        filter: &'s Filter<'a, T, K>,
    ) -> Self {
        Self {
            rows,
            plan: ChunkPlan::new(rows.len(), chunks),
            key_fn,
            filter,
        }
    }

    /// All rows accepted by the item filter, in input order.
    pub(crate) fn qualifying(&self) -> Vec<&'a T> {
        log::debug!(
            "scanning {} rows in {} chunks for the global group",
            self.rows.len(),
            self.plan.chunk_count()
        );
        let filter = self.filter;
        let parts = map_slices(&self.plan.slices(self.rows), |_, chunk| {
            chunk
                .iter()
                .filter(|row| filter.accepts_item(row))
                .collect::<Vec<_>>()
        });
        parts.into_iter().flatten().collect()
    }

    /// Route every accepted row whose key is registered in `store` into its bucket.
    ///
    /// Returns the number of routed rows.
    pub(crate) fn fill(&self, store: &BucketStore<'a, K, T>) -> usize {
        log::debug!(
            "scanning {} rows in {} chunks for {} registered keys",
            self.rows.len(),
            self.plan.chunk_count(),
            store.len()
        );
        let (filter, key_fn) = (self.filter, self.key_fn);
        let routed = map_slices(&self.plan.slices(self.rows), |idx, chunk| {
            let mut local = LocalBuckets::new();
            for row in chunk {
                if !filter.accepts_item(row) {
                    continue;
                }
                let key = key_fn(row);
                if store.is_registered(&key) {
                    local.push(key, row);
                }
            }

            let mut routed = 0;
            for (key, rows) in local.into_groups() {
                routed += rows.len();
                store.extend(&key, rows);
            }
            log::trace!("chunk {idx}: routed {routed} of {} rows", chunk.len());
            routed
        });
        routed.into_iter().sum()
    }

    /// Group all rows by key, discovering the keys on the way.
    ///
    /// Rows rejected by the item filter still contribute their key (with no rows) under
    /// [`KeyDiscovery::AllRows`]. Keys come back in first-observed input order.
    pub(crate) fn observe(&self, discovery: KeyDiscovery) -> Vec<(K, Vec<&'a T>)> {
        log::debug!(
            "scanning {} rows in {} chunks to discover groups ({discovery:?})",
            self.rows.len(),
            self.plan.chunk_count()
        );
        let (filter, key_fn) = (self.filter, self.key_fn);
        let parts = map_slices(&self.plan.slices(self.rows), |idx, chunk| {
            let mut local = LocalBuckets::new();
            for row in chunk {
                let accepted = filter.accepts_item(row);
                if accepted {
                    local.push(key_fn(row), row);
                } else if discovery == KeyDiscovery::AllRows {
                    local.touch(key_fn(row));
                }
            }
            log::trace!("chunk {idx}: {} groups", local.len());
            local
        });

        let mut parts = parts.into_iter();
        let Some(mut merged) = parts.next() else {
            return Vec::new();
        };
        for part in parts {
            merged.merge(part);
        }
        log::debug!("discovered {} groups", merged.len());
        merged.into_groups()
    }
}

impl<'s, 'a, T, K> Scanner<'s, 'a, T, K>
where
    T: Sync,
    K: GroupKey,
{
    /// Distinct values observed for each key field, sorted ascending.
    pub(crate) fn domains(&self, discovery: KeyDiscovery) -> Vec<Vec<FieldValue>> {
        log::debug!(
            "scanning {} rows in {} chunks for field domains ({discovery:?})",
            self.rows.len(),
            self.plan.chunk_count()
        );
        let (filter, key_fn) = (self.filter, self.key_fn);
        let parts = map_slices(&self.plan.slices(self.rows), |_, chunk| {
            let mut keys: HashSet<K, RandomState> = HashSet::default();
            for row in chunk {
                if discovery == KeyDiscovery::QualifyingRows && !filter.accepts_item(row) {
                    continue;
                }
                keys.insert(key_fn(row));
            }
            keys
        });

        let mut domains: Vec<HashSet<FieldValue, RandomState>> =
            K::FIELDS.iter().map(|_| HashSet::default()).collect();
        let mut seen: HashSet<K, RandomState> = HashSet::default();
        for key in parts.into_iter().flatten() {
            if !seen.insert(key.clone()) {
                continue;
            }
            for (idx, domain) in domains.iter_mut().enumerate() {
                if let Some(value) = key.field(idx) {
                    domain.insert(value);
                }
            }
        }

        domains
            .into_iter()
            .map(|domain| {
                let mut values: Vec<FieldValue> = domain.into_iter().collect();
                values.sort();
                values
            })
            .collect()
    }
}
