use std::fmt;
use std::sync::Arc;

type ItemPredicate<'a, T> = Arc<dyn Fn(&T) -> bool + Send + Sync + 'a>;
type GroupPredicate<'a, T, K> = Arc<dyn Fn(&[&T], &K) -> bool + Send + Sync + 'a>;

/// Row-level and group-level predicates for a summarize invocation.
///
/// The two checks run at different points of the pipeline:
/// - the item predicate runs once per row, before bucket assignment. Rejected rows never reach
///   any group;
/// - the group predicate runs once per candidate key, after the key's rows have been collected.
///
/// A missing predicate accepts everything.
pub struct Filter<'a, T, K> {
    item: Option<ItemPredicate<'a, T>>,
    group: Option<GroupPredicate<'a, T, K>>,
}

impl<'a, T, K> Filter<'a, T, K> {
    /// A filter that accepts every row and every group.
    pub fn none() -> Self {
        Self {
            item: None,
            group: None,
        }
    }

    pub fn new(
        item: impl Fn(&T) -> bool + Send + Sync + 'a,
        group: impl Fn(&[&T], &K) -> bool + Send + Sync + 'a,
    ) -> Self {
        Self {
            item: Some(Arc::new(item)),
            group: Some(Arc::new(group)),
        }
    }

    pub fn items(item: impl Fn(&T) -> bool + Send + Sync + 'a) -> Self {
        Self::none().with_item(item)
    }

    pub fn groups(group: impl Fn(&[&T], &K) -> bool + Send + Sync + 'a) -> Self {
        Self::none().with_group(group)
    }

    /// Build both checks from one predicate.
    ///
    /// The predicate is called as `f(Some(row), None)` for the item check and as
    /// `f(None, Some(key))` for the group check.
    pub fn combined(f: impl Fn(Option<&T>, Option<&K>) -> bool + Send + Sync + 'a) -> Self {
        let f = Arc::new(f);
        let item = {
            let f = Arc::clone(&f);
            move |row: &T| f(Some(row), None)
        };
        let group = move |_: &[&T], key: &K| f(None, Some(key));
        Self::new(item, group)
    }

    pub fn with_item(mut self, item: impl Fn(&T) -> bool + Send + Sync + 'a) -> Self {
        self.item = Some(Arc::new(item));
        self
    }

    pub fn with_group(mut self, group: impl Fn(&[&T], &K) -> bool + Send + Sync + 'a) -> Self {
        self.group = Some(Arc::new(group));
        self
    }

    pub fn has_item_filter(&self) -> bool {
        self.item.is_some()
    }

    #[inline]
    pub fn accepts_item(&self, row: &T) -> bool {
        self.item.as_ref().map_or(true, |f| f(row))
    }

    pub fn accepts_group(&self, rows: &[&T], key: &K) -> bool {
        self.group.as_ref().map_or(true, |f| f(rows, key))
    }
}

impl<T, K> Default for Filter<'_, T, K> {
    fn default() -> Self {
        Self::none()
    }
}

impl<T, K> Clone for Filter<'_, T, K> {
    fn clone(&self) -> Self {
        Self {
            item: self.item.clone(),
            group: self.group.clone(),
        }
    }
}

impl<T, K> fmt::Debug for Filter<'_, T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("item", &self.item.is_some())
            .field("group", &self.group.is_some())
            .finish()
    }
}
