//! `SUMMARIZECOLUMNS`-style grouping over in-memory rows.
//!
//! A summarize invocation evaluates a caller-supplied aggregate once per *candidate key*. The
//! candidate keys come from one of three universes:
//! - **observed** (default): the distinct keys found in the data. Groups, buckets and keys are
//!   discovered in a single parallel pass, each worker grouping its chunk locally before a
//!   single-threaded merge;
//! - **ordered** ([`SummarizeColumns::order_by`]): caller-supplied keys, evaluated in order and
//!   in bounded windows. Each window registers its keys in a [`BucketStore`], runs one parallel
//!   scan, then aggregates and emits before the next window is pulled;
//! - **cartesian** ([`SummarizeColumns::cartesian`]): the cross product of the per-field domains,
//!   fed through the same windows as the ordered universe.
//!
//! For every candidate the group filter runs first, then the aggregate. A `None` aggregate drops
//! the group. Output is a lazy [`Summarized`] iterator: nothing is scanned until the first pull,
//! and `max_count` stops both emission and any further scanning.
//!
//! A key type without fields means "no grouping": all rows accepted by the item filter form one
//! group, evaluated exactly once, even when there are no rows.
use crate::bucket::BucketStore;
use crate::cartesian::{CartesianDomains, CartesianProduct};
use crate::error::{SummarizeError, SummarizeResult};
use crate::filter::Filter;
use crate::key::GroupKey;
use crate::options::SummarizeOptions;
use crate::scan::{KeyFn, Scanner};
use crate::universe::{KeyWindows, Universe};
use std::fmt;
use std::iter::FusedIterator;

type Aggregate<'a, T, K, R> = Box<dyn Fn(&[&T], &K) -> Option<R> + 'a>;

/// Builder for one summarize invocation.
pub struct SummarizeColumns<'a, T, K> {
    rows: &'a [T],
    key_fn: Box<KeyFn<'a, T, K>>,
    filter: Filter<'a, T, K>,
    universe: Universe<'a, K>,
    options: SummarizeOptions,
}

impl<'a, T, K> SummarizeColumns<'a, T, K>
where
    T: Sync + 'a,
    K: GroupKey + 'a,
{
    pub fn new(rows: &'a [T], key_fn: impl Fn(&T) -> K + Send + Sync + 'a) -> Self {
        Self {
            rows,
            key_fn: Box::new(key_fn),
            filter: Filter::none(),
            universe: Universe::Observed,
            options: SummarizeOptions::default(),
        }
    }

    pub fn filter(mut self, filter: Filter<'a, T, K>) -> Self {
        self.filter = filter;
        self
    }

    pub fn item_filter(mut self, item: impl Fn(&T) -> bool + Send + Sync + 'a) -> Self {
        self.filter = self.filter.with_item(item);
        self
    }

    pub fn group_filter(mut self, group: impl Fn(&[&T], &K) -> bool + Send + Sync + 'a) -> Self {
        self.filter = self.filter.with_group(group);
        self
    }

    /// Evaluate exactly these keys, in this order. Keys without rows are evaluated over an empty
    /// row list; repeated keys are evaluated once.
    ///
    /// The sequence is consumed lazily in windows of [`SummarizeOptions::window_size`] keys, so
    /// its buckets never outgrow one window. Dropping repeats means remembering every distinct
    /// key pulled so far, which is O(distinct keys) memory; use
    /// [`SummarizeColumns::order_by_unique`] for sequences known not to repeat.
    pub fn order_by<I>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        I::IntoIter: 'a,
    {
        self.universe = Universe::Ordered {
            keys: Box::new(keys.into_iter()),
            dedupe: true,
        };
        self
    }

    /// Like [`SummarizeColumns::order_by`] for a sequence without repeated keys.
    ///
    /// Keys are not remembered across windows, so memory stays bounded by the window size. A
    /// key that does repeat is evaluated again at each position.
    pub fn order_by_unique<I>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = K>,
        I::IntoIter: 'a,
    {
        self.universe = Universe::Ordered {
            keys: Box::new(keys.into_iter()),
            dedupe: false,
        };
        self
    }

    /// Evaluate every combination of the observed per-field values.
    pub fn cartesian(self) -> Self {
        self.cartesian_with(CartesianDomains::new())
    }

    /// Like [`SummarizeColumns::cartesian`], with some field domains supplied by the caller.
    pub fn cartesian_with(mut self, domains: CartesianDomains) -> Self {
        self.universe = Universe::Cartesian(domains);
        self
    }

    pub fn max_count(mut self, max_count: usize) -> Self {
        self.options.max_count = Some(max_count);
        self
    }

    /// Replace all options, including any `max_count` set earlier.
    pub fn options(mut self, options: SummarizeOptions) -> Self {
        self.options = options;
        self
    }

    /// Validate the options and return the lazy result sequence.
    pub fn evaluate<R>(
        self,
        aggregate: impl Fn(&[&T], &K) -> Option<R> + 'a,
    ) -> SummarizeResult<Summarized<'a, T, K, R>> {
        self.options.validate()?;
        Ok(Summarized {
            pipeline: Pipeline {
                rows: self.rows,
                key_fn: self.key_fn,
                filter: self.filter,
                aggregate: Box::new(aggregate),
                options: self.options,
            },
            state: State::Pending(self.universe),
            emitted: 0,
        })
    }
}

impl<T, K> fmt::Debug for SummarizeColumns<'_, T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SummarizeColumns")
            .field("rows", &self.rows.len())
            .field("filter", &self.filter)
            .field("universe", &self.universe)
            .field("options", &self.options)
            .finish()
    }
}

/// Summarize over the keys observed in `rows`.
pub fn summarize<'a, T, K, R>(
    rows: &'a [T],
    key_fn: impl Fn(&T) -> K + Send + Sync + 'a,
    filter: Filter<'a, T, K>,
    aggregate: impl Fn(&[&T], &K) -> Option<R> + 'a,
    max_count: Option<usize>,
) -> SummarizeResult<Summarized<'a, T, K, R>>
where
    T: Sync + 'a,
    K: GroupKey + 'a,
{
    SummarizeColumns::new(rows, key_fn)
        .filter(filter)
        .options(SummarizeOptions {
            max_count,
            ..SummarizeOptions::default()
        })
        .evaluate(aggregate)
}

/// Summarize over caller-supplied keys, in order.
pub fn summarize_ordered<'a, T, K, R, I>(
    rows: &'a [T],
    key_fn: impl Fn(&T) -> K + Send + Sync + 'a,
    filter: Filter<'a, T, K>,
    aggregate: impl Fn(&[&T], &K) -> Option<R> + 'a,
    order: I,
    max_count: Option<usize>,
) -> SummarizeResult<Summarized<'a, T, K, R>>
where
    T: Sync + 'a,
    K: GroupKey + 'a,
    I: IntoIterator<Item = K>,
    I::IntoIter: 'a,
{
    SummarizeColumns::new(rows, key_fn)
        .filter(filter)
        .order_by(order)
        .options(SummarizeOptions {
            max_count,
            ..SummarizeOptions::default()
        })
        .evaluate(aggregate)
}

/// Summarize over the cross product of the observed per-field values.
pub fn summarize_cartesian<'a, T, K, R>(
    rows: &'a [T],
    key_fn: impl Fn(&T) -> K + Send + Sync + 'a,
    filter: Filter<'a, T, K>,
    aggregate: impl Fn(&[&T], &K) -> Option<R> + 'a,
    max_count: Option<usize>,
) -> SummarizeResult<Summarized<'a, T, K, R>>
where
    T: Sync + 'a,
    K: GroupKey + 'a,
{
    SummarizeColumns::new(rows, key_fn)
        .filter(filter)
        .cartesian()
        .options(SummarizeOptions {
            max_count,
            ..SummarizeOptions::default()
        })
        .evaluate(aggregate)
}

struct Pipeline<'a, T, K, R> {
    rows: &'a [T],
    key_fn: Box<KeyFn<'a, T, K>>,
    filter: Filter<'a, T, K>,
    aggregate: Aggregate<'a, T, K, R>,
    options: SummarizeOptions,
}

impl<'a, T, K, R> Pipeline<'a, T, K, R>
where
    T: Sync + 'a,
    K: GroupKey + 'a,
{
    fn scanner(&self) -> Scanner<'_, 'a, T, K> {
        Scanner::new(
            self.rows,
            self.options.chunk_count(),
            &*self.key_fn,
            &self.filter,
        )
    }

    fn check_cancelled(&self) -> SummarizeResult<()> {
        if self.options.is_cancelled() {
            log::debug!("summarize cancelled before scan");
            return Err(SummarizeError::Cancelled);
        }
        Ok(())
    }

    fn start(&self, universe: Universe<'a, K>) -> SummarizeResult<State<'a, T, K>> {
        if let Universe::Cartesian(overrides) = &universe {
            overrides.validate::<K>()?;
        }
        if K::FIELDS.is_empty() {
            self.check_cancelled()?;
            let key = K::from_fields(&[])?;
            let rows = self.scanner().qualifying();
            return Ok(State::Groups(vec![(key, rows)].into_iter()));
        }

        let window_len = self.options.window_len();
        match universe {
            Universe::Observed => {
                self.check_cancelled()?;
                let groups = self.scanner().observe(self.options.key_discovery);
                Ok(State::Groups(groups.into_iter()))
            }
            Universe::Ordered { keys, dedupe } => Ok(State::Windows {
                windows: KeyWindows::from_results(keys.map(Ok), window_len, dedupe),
                current: None,
            }),
            Universe::Cartesian(overrides) => {
                let derived = if overrides.needs_scan::<K>() {
                    self.check_cancelled()?;
                    self.scanner().domains(self.options.key_discovery)
                } else {
                    Vec::new()
                };
                let product = CartesianProduct::<K>::new(overrides.apply::<K>(derived)?);
                log::debug!(
                    "cartesian universe of {} keys over domains {:?}",
                    product.total(),
                    product.domains().iter().map(Vec::len).collect::<Vec<_>>()
                );
                Ok(State::Windows {
                    windows: KeyWindows::from_results(product, window_len, false),
                    current: None,
                })
            }
        }
    }

    fn open_window(&self, keys: Vec<K>) -> SummarizeResult<Window<'a, T, K>> {
        self.check_cancelled()?;
        let mut store = BucketStore::with_capacity(keys.len());
        for key in &keys {
            store.register(key.clone());
        }
        let routed = self.scanner().fill(&store);
        log::debug!("window of {} keys: {routed} rows routed", keys.len());
        Ok(Window {
            keys: keys.into_iter(),
            store,
        })
    }

    /// Group filter, then aggregate. `None` means the group is not emitted.
    fn evaluate(&self, key: &K, rows: &[&'a T]) -> Option<R> {
        if !self.filter.accepts_group(rows, key) {
            return None;
        }
        (self.aggregate)(rows, key)
    }
}

enum State<'a, T, K> {
    Pending(Universe<'a, K>),
    Groups(std::vec::IntoIter<(K, Vec<&'a T>)>),
    Windows {
        windows: KeyWindows<'a, K>,
        current: Option<Window<'a, T, K>>,
    },
    Done,
}

struct Window<'a, T, K> {
    keys: std::vec::IntoIter<K>,
    store: BucketStore<'a, K, T>,
}

/// Lazy, single-pass sequence of `(key, aggregate)` results.
///
/// Pulling the first item runs the first scan; ordered and cartesian universes scan again each
/// time a window is exhausted. After an error the sequence ends.
pub struct Summarized<'a, T, K, R> {
    pipeline: Pipeline<'a, T, K, R>,
    state: State<'a, T, K>,
    emitted: usize,
}

impl<'a, T, K, R> Summarized<'a, T, K, R>
where
    T: Sync + 'a,
    K: GroupKey + 'a,
{
    /// Number of results yielded so far.
    pub fn emitted(&self) -> usize {
        self.emitted
    }

    pub fn options(&self) -> &SummarizeOptions {
        &self.pipeline.options
    }

    fn limit_reached(&self) -> bool {
        self.pipeline
            .options
            .max_count
            .is_some_and(|max| self.emitted >= max)
    }

    fn emit(&mut self, key: K, result: R) -> Option<SummarizeResult<(K, R)>> {
        self.emitted += 1;
        Some(Ok((key, result)))
    }

    fn fail(&mut self, err: SummarizeError) -> Option<SummarizeResult<(K, R)>> {
        self.state = State::Done;
        Some(Err(err))
    }
}

impl<'a, T, K, R> Iterator for Summarized<'a, T, K, R>
where
    T: Sync + 'a,
    K: GroupKey + 'a,
{
    type Item = SummarizeResult<(K, R)>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.limit_reached() {
                self.state = State::Done;
                return None;
            }

            match &mut self.state {
                State::Done => return None,
                State::Pending(_) => {
                    let State::Pending(universe) = std::mem::replace(&mut self.state, State::Done)
                    else {
                        return None;
                    };
                    match self.pipeline.start(universe) {
                        Ok(state) => self.state = state,
                        Err(err) => return self.fail(err),
                    }
                }
                State::Groups(groups) => {
                    let Some((key, rows)) = groups.next() else {
                        self.state = State::Done;
                        return None;
                    };
                    if let Some(result) = self.pipeline.evaluate(&key, &rows) {
                        return self.emit(key, result);
                    }
                }
                State::Windows { windows, current } => {
                    if let Some(window) = current {
                        if let Some(key) = window.keys.next() {
                            let rows = window.store.take(&key).unwrap_or_default();
                            if let Some(result) = self.pipeline.evaluate(&key, &rows) {
                                return self.emit(key, result);
                            }
                            continue;
                        }
                        // Window done; drop its buckets before scanning the next one.
                        *current = None;
                        continue;
                    }

                    match windows.next() {
                        None => {
                            self.state = State::Done;
                            return None;
                        }
                        Some(Err(err)) => return self.fail(err),
                        Some(Ok(keys)) => match self.pipeline.open_window(keys) {
                            Ok(window) => *current = Some(window),
                            Err(err) => return self.fail(err),
                        },
                    }
                }
            }
        }
    }
}

impl<'a, T, K, R> FusedIterator for Summarized<'a, T, K, R>
where
    T: Sync + 'a,
    K: GroupKey + 'a,
{
}

impl<T, K, R> fmt::Debug for Summarized<'_, T, K, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            State::Pending(_) => "pending",
            State::Groups(_) => "groups",
            State::Windows { .. } => "windows",
            State::Done => "done",
        };
        f.debug_struct("Summarized")
            .field("rows", &self.pipeline.rows.len())
            .field("state", &state)
            .field("emitted", &self.emitted)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{ChunkCount, KeyDiscovery};
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    #[derive(Debug)]
    struct Row {
        group: &'static str,
        amount: i64,
    }

    fn rows() -> Vec<Row> {
        vec![
            Row { group: "a", amount: 1 },
            Row { group: "b", amount: 2 },
            Row { group: "a", amount: 3 },
            Row { group: "c", amount: -4 },
        ]
    }

    fn by_group(row: &Row) -> (String,) {
        (row.group.to_string(),)
    }

    fn total(rows: &[&Row], _: &(String,)) -> Option<i64> {
        Some(rows.iter().map(|r| r.amount).sum())
    }

    fn collect<'a, K: GroupKey + 'a, R>(
        result: SummarizeResult<Summarized<'a, Row, K, R>>,
    ) -> Vec<(K, R)> {
        result
            .unwrap()
            .collect::<SummarizeResult<Vec<_>>>()
            .unwrap()
    }

    fn key(name: &str) -> (String,) {
        (name.to_string(),)
    }

    #[test]
    fn observed_groups_follow_first_appearance() {
        let rows = rows();
        let out = collect(SummarizeColumns::new(&rows, by_group).evaluate(total));
        assert_eq!(out, vec![(key("a"), 4), (key("b"), 2), (key("c"), -4)]);
    }

    #[test]
    fn nothing_runs_before_the_first_pull() {
        let rows = rows();
        let calls = Cell::new(0);
        let mut summarized = SummarizeColumns::new(&rows, by_group)
            .evaluate(|rows: &[&Row], _: &(String,)| {
                calls.set(calls.get() + 1);
                Some(rows.len())
            })
            .unwrap();
        assert_eq!(calls.get(), 0);
        assert!(format!("{summarized:?}").contains("pending"));

        assert_eq!(summarized.next(), Some(Ok((key("a"), 2))));
        assert_eq!(calls.get(), 1);
        assert_eq!(summarized.emitted(), 1);
    }

    #[test]
    fn none_aggregates_are_skipped_and_do_not_count_towards_max() {
        let rows = rows();
        let out = collect(
            SummarizeColumns::new(&rows, by_group)
                .max_count(1)
                .evaluate(|rows: &[&Row], _: &(String,)| {
                    let sum: i64 = rows.iter().map(|r| r.amount).sum();
                    (sum < 3).then_some(sum)
                }),
        );
        assert_eq!(out, vec![(key("b"), 2)]);
    }

    #[test]
    fn ordered_keys_are_evaluated_once_in_order_across_windows() {
        let rows = rows();
        let evaluated = Cell::new(0);
        let out = collect(
            SummarizeColumns::new(&rows, by_group)
                .order_by(["c", "z", "a", "c", "b"].map(key))
                .options(
                    SummarizeOptions::default()
                        .with_window_size(2)
                        .with_chunks(ChunkCount::Fixed(3)),
                )
                .evaluate(|rows: &[&Row], _: &(String,)| {
                    evaluated.set(evaluated.get() + 1);
                    Some(rows.iter().map(|r| r.amount).sum::<i64>())
                }),
        );
        assert_eq!(
            out,
            vec![(key("c"), -4), (key("z"), 0), (key("a"), 4), (key("b"), 2)]
        );
        assert_eq!(evaluated.get(), 4);
    }

    #[test]
    fn group_filter_runs_before_the_aggregate() {
        let rows = rows();
        let aggregated = Cell::new(0);
        let out = collect(
            SummarizeColumns::new(&rows, by_group)
                .group_filter(|rows, _| rows.len() > 1)
                .evaluate(|rows: &[&Row], _: &(String,)| {
                    aggregated.set(aggregated.get() + 1);
                    Some(rows.len())
                }),
        );
        assert_eq!(out, vec![(key("a"), 2)]);
        assert_eq!(aggregated.get(), 1);
    }

    #[test]
    fn qualifying_discovery_drops_groups_without_accepted_rows() {
        let rows = rows();
        let options = SummarizeOptions::default().with_key_discovery(KeyDiscovery::QualifyingRows);
        let out = collect(
            SummarizeColumns::new(&rows, by_group)
                .item_filter(|row| row.amount > 1)
                .options(options)
                .evaluate(total),
        );
        assert_eq!(out, vec![(key("b"), 2), (key("a"), 3)]);

        let out = collect(
            SummarizeColumns::new(&rows, by_group)
                .item_filter(|row| row.amount > 1)
                .evaluate(total),
        );
        assert_eq!(out, vec![(key("a"), 3), (key("b"), 2), (key("c"), 0)]);
    }

    #[test]
    fn invalid_options_fail_before_iteration() {
        let rows = rows();
        let err = SummarizeColumns::new(&rows, by_group)
            .options(SummarizeOptions::default().with_window_size(0))
            .evaluate(total)
            .unwrap_err();
        assert!(matches!(err, SummarizeError::InvalidOptions(_)));
    }

    #[test]
    fn errors_fuse_the_sequence() {
        let rows = rows();
        let mut summarized = SummarizeColumns::new(&rows, by_group)
            .cartesian_with(CartesianDomains::new().with_domain("0", Vec::<&str>::new()))
            .evaluate(total)
            .unwrap();
        assert_eq!(
            summarized.next(),
            Some(Err(SummarizeError::EmptyDomain {
                field: "0".to_string()
            }))
        );
        assert_eq!(summarized.next(), None);
        assert_eq!(summarized.next(), None);
    }
}
