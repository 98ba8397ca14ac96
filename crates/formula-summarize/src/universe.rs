//! Candidate key universes and the windows they are evaluated in.
use crate::cartesian::CartesianDomains;
use crate::error::SummarizeResult;
use ahash::RandomState;
use std::collections::HashSet;
use std::fmt;
use std::hash::Hash;

/// Where the candidate keys of a summarize invocation come from.
pub(crate) enum Universe<'a, K> {
    /// Keys observed in the data, in first-observed order.
    Observed,
    /// Caller-supplied keys, evaluated in the given order. With `dedupe` a repeated key is
    /// evaluated only at its first position.
    Ordered {
        keys: Box<dyn Iterator<Item = K> + 'a>,
        dedupe: bool,
    },
    /// Cross product of per-field domains.
    Cartesian(CartesianDomains),
}

impl<K> fmt::Debug for Universe<'_, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Universe::Observed => f.write_str("Observed"),
            Universe::Ordered { dedupe, .. } => f
                .debug_struct("Ordered")
                .field("dedupe", dedupe)
                .finish_non_exhaustive(),
            Universe::Cartesian(domains) => f.debug_tuple("Cartesian").field(domains).finish(),
        }
    }
}

/// Splits a (possibly huge) key sequence into bounded windows.
///
/// Each window holds at most `window_len` keys and is scanned and aggregated as a unit, so only
/// one window's buckets are alive at a time. With de-duplication enabled a key is yielded at most
/// once across all windows, at the cost of remembering every distinct key seen. Errors from the
/// key source end the sequence.
pub struct KeyWindows<'a, K> {
    source: Box<dyn Iterator<Item = SummarizeResult<K>> + 'a>,
    window_len: usize,
    seen: Option<HashSet<K, RandomState>>,
    exhausted: bool,
}

impl<'a, K> KeyWindows<'a, K>
where
    K: Clone + Eq + Hash + 'a,
{
    /// Windows over caller-supplied keys, dropping repeated keys.
    pub fn new<I>(keys: I, window_len: usize) -> Self
    where
        I: IntoIterator<Item = K>,
        I::IntoIter: 'a,
    {
        Self::from_results(keys.into_iter().map(Ok), window_len, true)
    }

    /// Windows over a fallible key source.
    ///
    /// Set `dedupe` to `false` when the source cannot repeat keys (e.g. a cartesian product) to
    /// avoid remembering every key.
    pub fn from_results(
        source: impl Iterator<Item = SummarizeResult<K>> + 'a,
        window_len: usize,
        dedupe: bool,
    ) -> Self {
        Self {
            source: Box::new(source),
            window_len: window_len.max(1),
            seen: dedupe.then(HashSet::default),
            exhausted: false,
        }
    }

    pub fn window_len(&self) -> usize {
        self.window_len
    }
}

impl<K> Iterator for KeyWindows<'_, K>
where
    K: Clone + Eq + Hash,
{
    type Item = SummarizeResult<Vec<K>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.exhausted {
            return None;
        }

        let mut window = Vec::with_capacity(self.window_len.min(4_096));
        while window.len() < self.window_len {
            match self.source.next() {
                None => {
                    self.exhausted = true;
                    break;
                }
                Some(Err(err)) => {
                    self.exhausted = true;
                    return Some(Err(err));
                }
                Some(Ok(key)) => {
                    if let Some(seen) = &mut self.seen {
                        if !seen.insert(key.clone()) {
                            continue;
                        }
                    }
                    window.push(key);
                }
            }
        }

        (!window.is_empty()).then_some(Ok(window))
    }
}
