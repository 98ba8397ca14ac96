//! Parallel `SUMMARIZECOLUMNS`-style grouping and aggregation for Formula.
//!
//! This crate focuses on:
//! - Grouping in-memory rows by a composite [`GroupKey`] with caller-supplied aggregates.
//! - Row-level and group-level filtering ([`Filter`]).
//! - Observed, caller-ordered and cartesian group universes, evaluated lazily in bounded windows.
//! - Chunked parallel scans that stay close to linear in the number of cores.
//! - Text renderings of the results ([`render`]).
//!
//! ```
//! use formula_summarize::{Filter, SummarizeColumns, SummarizeResult};
//!
//! let sales = [("East", 10), ("West", 5), ("East", 7)];
//! let totals = SummarizeColumns::new(&sales, |row: &(&str, i64)| (row.0.to_string(),))
//!     .filter(Filter::items(|row: &(&str, i64)| row.1 > 5))
//!     .evaluate(|rows: &[&(&str, i64)], _: &(String,)| {
//!         Some(rows.iter().map(|row| row.1).sum::<i64>())
//!     })?
//!     .collect::<SummarizeResult<Vec<_>>>()?;
//!
//! assert_eq!(totals, vec![(("East".to_string(),), 17), (("West".to_string(),), 0)]);
//! # Ok::<(), formula_summarize::SummarizeError>(())
//! ```

#![forbid(unsafe_code)]

mod bucket;
mod cartesian;
mod error;
mod filter;
mod key;
mod options;
mod parallel;
pub mod render;
mod scan;
mod summarize;
mod universe;

pub use crate::bucket::{BucketStore, LocalBuckets};
pub use crate::cartesian::{CartesianDomains, CartesianProduct};
pub use crate::error::{SummarizeError, SummarizeResult};
pub use crate::filter::Filter;
pub use crate::key::{FieldValue, GroupKey, KeyField};
pub use crate::options::{
    CancellationToken, ChunkCount, KeyDiscovery, SummarizeOptions, DEFAULT_WINDOW_SIZE,
};
pub use crate::scan::ChunkPlan;
pub use crate::summarize::{
    summarize, summarize_cartesian, summarize_ordered, Summarized, SummarizeColumns,
};
pub use crate::universe::KeyWindows;

pub use ordered_float::OrderedFloat;

#[doc(hidden)]
pub mod __private {
    pub use crate::key::{check_arity, decode_named_field, normalize_value};
}
