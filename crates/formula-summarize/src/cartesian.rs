//! Cartesian group universes.
//!
//! Instead of the key combinations that occur in the data, a cartesian universe contains every
//! combination of the per-field values: `{P1, P2} x {C1, C2}` evaluates all four keys even if only
//! `(P1, C1)` has rows. Keys with no rows ("holes") reach the aggregate with an empty row list.
use crate::error::{SummarizeError, SummarizeResult};
use crate::key::{FieldValue, GroupKey};
use ahash::RandomState;
use std::collections::HashSet;
use std::marker::PhantomData;

/// Per-field domain overrides for a cartesian universe.
///
/// Fields without an override use the distinct values observed in the data, sorted ascending.
/// An override replaces that with a caller-supplied list, evaluated in the given order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CartesianDomains {
    overrides: Vec<(String, Vec<FieldValue>)>,
}

impl CartesianDomains {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `values` as the domain of `field`. Duplicate values are dropped, keeping the first.
    pub fn with_domain<V: Into<FieldValue>>(
        mut self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let field = field.into();
        let mut seen: HashSet<FieldValue, RandomState> = HashSet::default();
        let values: Vec<FieldValue> = values
            .into_iter()
            .map(Into::into)
            .filter(|value: &FieldValue| seen.insert(value.clone()))
            .collect();
        self.overrides.retain(|(existing, _)| *existing != field);
        self.overrides.push((field, values));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }

    /// Check every override against the key schema.
    pub(crate) fn validate<K: GroupKey>(&self) -> SummarizeResult<()> {
        for (field, values) in &self.overrides {
            if K::field_index(field).is_none() {
                return Err(SummarizeError::UnknownField {
                    field: field.clone(),
                });
            }
            if values.is_empty() {
                return Err(SummarizeError::EmptyDomain {
                    field: field.clone(),
                });
            }
        }
        Ok(())
    }

    /// Whether some field still needs its domain derived from the data.
    pub(crate) fn needs_scan<K: GroupKey>(&self) -> bool {
        K::FIELDS
            .iter()
            .any(|field| !self.overrides.iter().any(|(name, _)| name == field))
    }

    /// Overlay the overrides onto derived domains (one entry per key field).
    ///
    /// Override values are normalized to the key field's own representation and de-duplicated
    /// again in that form, so no two entries of a domain build the same key.
    pub(crate) fn apply<K: GroupKey>(
        &self,
        mut derived: Vec<Vec<FieldValue>>,
    ) -> SummarizeResult<Vec<Vec<FieldValue>>> {
        self.validate::<K>()?;
        derived.resize(K::FIELDS.len(), Vec::new());
        for (field, values) in &self.overrides {
            let Some(idx) = K::field_index(field) else {
                continue;
            };
            let mut seen: HashSet<FieldValue, RandomState> = HashSet::default();
            let mut domain = Vec::with_capacity(values.len());
            for value in values {
                let value = K::normalize_field(idx, value)?;
                if seen.insert(value.clone()) {
                    domain.push(value);
                }
            }
            derived[idx] = domain;
        }
        Ok(derived)
    }
}

/// Lazy odometer over the cross product of per-field domains.
///
/// The last field varies fastest. If any domain is empty the product is empty.
#[derive(Clone, Debug)]
pub struct CartesianProduct<K> {
    domains: Vec<Vec<FieldValue>>,
    cursor: Vec<usize>,
    produced: usize,
    done: bool,
    _key: PhantomData<fn() -> K>,
}

impl<K: GroupKey> CartesianProduct<K> {
    pub fn new(domains: Vec<Vec<FieldValue>>) -> Self {
        let done = domains.iter().any(Vec::is_empty);
        Self {
            cursor: vec![0; domains.len()],
            domains,
            produced: 0,
            done,
            _key: PhantomData,
        }
    }

    /// Total number of combinations (saturating).
    pub fn total(&self) -> usize {
        self.checked_total().unwrap_or(usize::MAX)
    }

    /// Total number of combinations, or `None` if it does not fit in a `usize`.
    pub fn checked_total(&self) -> Option<usize> {
        self.domains
            .iter()
            .try_fold(1usize, |acc, domain| acc.checked_mul(domain.len()))
    }

    pub fn domains(&self) -> &[Vec<FieldValue>] {
        &self.domains
    }

    fn advance(&mut self) {
        for pos in (0..self.cursor.len()).rev() {
            self.cursor[pos] += 1;
            if self.cursor[pos] < self.domains[pos].len() {
                return;
            }
            self.cursor[pos] = 0;
        }
        self.done = true;
    }
}

impl<K: GroupKey> Iterator for CartesianProduct<K> {
    type Item = SummarizeResult<K>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let values: Vec<FieldValue> = self
            .cursor
            .iter()
            .zip(&self.domains)
            .map(|(&idx, domain)| domain[idx].clone())
            .collect();
        self.advance();
        self.produced += 1;
        Some(K::from_fields(&values))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            return (0, Some(0));
        }
        match self.checked_total() {
            Some(total) => {
                let remaining = total.saturating_sub(self.produced);
                (remaining, Some(remaining))
            }
            None => (usize::MAX.saturating_sub(self.produced), None),
        }
    }
}
