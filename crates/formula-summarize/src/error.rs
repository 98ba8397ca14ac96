use crate::key::FieldValue;

pub type SummarizeResult<T> = Result<T, SummarizeError>;

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum SummarizeError {
    /// A caller-supplied cartesian domain contained no values.
    #[error("empty domain for field {field}")]
    EmptyDomain { field: String },

    #[error("unknown key field: {field}")]
    UnknownField { field: String },

    #[error("key arity mismatch: expected {expected} fields, got {actual}")]
    KeyArity { expected: usize, actual: usize },

    #[error("value {value:?} is not valid for key field {field}")]
    FieldType { field: String, value: FieldValue },

    #[error("invalid summarize options: {0}")]
    InvalidOptions(String),

    #[error("summarize cancelled")]
    Cancelled,
}
