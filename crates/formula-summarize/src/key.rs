//! Group key model.
//!
//! A group key is a plain value type with a fixed, ordered set of named fields. Grouping itself
//! only needs `Eq + Hash`, but cartesian expansion must be able to take a key apart into its
//! field values and rebuild keys from arbitrary field tuples. [`GroupKey`] makes that schema
//! explicit instead of discovering it at runtime:
//! - [`GroupKey::FIELDS`] lists the field names in declaration order;
//! - [`GroupKey::field`] reads one field as a [`FieldValue`];
//! - [`GroupKey::from_fields`] rebuilds a key from one value per field.
//!
//! Named key structs are declared with [`group_key!`](crate::group_key). `()` is the zero-field
//! key ("no grouping") and tuples of up to four [`KeyField`]s are keys with fields named `0..3`.
use crate::error::{SummarizeError, SummarizeResult};
use ordered_float::OrderedFloat;
use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

/// A dynamically typed key field value.
///
/// Values are totally ordered: variants order as declared (`Blank` first), then by payload.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum FieldValue {
    Blank,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(OrderedFloat<f64>),
    Text(Arc<str>),
}

impl FieldValue {
    pub fn is_blank(&self) -> bool {
        matches!(self, FieldValue::Blank)
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Blank => f.write_str(""),
            FieldValue::Bool(b) => write!(f, "{b}"),
            FieldValue::Int(n) => write!(f, "{n}"),
            FieldValue::UInt(n) => write!(f, "{n}"),
            FieldValue::Float(n) => write!(f, "{}", n.into_inner()),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(Arc::from(value))
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(Arc::from(value))
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Int(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        FieldValue::Int(i64::from(value))
    }
}

impl From<u64> for FieldValue {
    fn from(value: u64) -> Self {
        FieldValue::UInt(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(OrderedFloat(value))
    }
}

/// A type usable as a single group key field.
pub trait KeyField: Clone + Eq + Hash + Send + Sync {
    fn to_field_value(&self) -> FieldValue;

    /// Convert back from a field value, or `None` if the value has the wrong shape.
    fn from_field_value(value: &FieldValue) -> Option<Self>;
}

impl KeyField for String {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::Text(Arc::from(self.as_str()))
    }

    fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Text(s) => Some(s.to_string()),
            _ => None,
        }
    }
}

impl KeyField for Arc<str> {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::Text(self.clone())
    }

    fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Text(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl KeyField for bool {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::Bool(*self)
    }

    fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl KeyField for OrderedFloat<f64> {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::Float(*self)
    }

    fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Float(n) => Some(*n),
            _ => None,
        }
    }
}

impl<F: KeyField> KeyField for Option<F> {
    fn to_field_value(&self) -> FieldValue {
        match self {
            Some(inner) => inner.to_field_value(),
            None => FieldValue::Blank,
        }
    }

    fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Blank => Some(None),
            other => F::from_field_value(other).map(Some),
        }
    }
}

macro_rules! impl_signed_key_field {
    ($($ty:ty),+) => {
        $(
            impl KeyField for $ty {
                fn to_field_value(&self) -> FieldValue {
                    FieldValue::Int(i64::from(*self))
                }

                fn from_field_value(value: &FieldValue) -> Option<Self> {
                    match value {
                        FieldValue::Int(n) => <$ty>::try_from(*n).ok(),
                        FieldValue::UInt(n) => <$ty>::try_from(*n).ok(),
                        _ => None,
                    }
                }
            }
        )+
    };
}

macro_rules! impl_unsigned_key_field {
    ($($ty:ty),+) => {
        $(
            impl KeyField for $ty {
                fn to_field_value(&self) -> FieldValue {
                    FieldValue::UInt(u64::from(*self))
                }

                fn from_field_value(value: &FieldValue) -> Option<Self> {
                    match value {
                        FieldValue::UInt(n) => <$ty>::try_from(*n).ok(),
                        FieldValue::Int(n) => <$ty>::try_from(*n).ok(),
                        _ => None,
                    }
                }
            }
        )+
    };
}

impl_signed_key_field!(i8, i16, i32, i64);
impl_unsigned_key_field!(u8, u16, u32, u64);

impl KeyField for usize {
    fn to_field_value(&self) -> FieldValue {
        FieldValue::UInt(*self as u64)
    }

    fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::UInt(n) => usize::try_from(*n).ok(),
            FieldValue::Int(n) => usize::try_from(*n).ok(),
            _ => None,
        }
    }
}

/// A composite group key with an explicit field schema.
pub trait GroupKey: Clone + Eq + Hash + Send + Sync {
    /// Field names in declaration order. Empty means "no grouping".
    const FIELDS: &'static [&'static str];

    fn field(&self, idx: usize) -> Option<FieldValue>;

    /// Rebuild a key from exactly one value per field, in [`GroupKey::FIELDS`] order.
    fn from_fields(values: &[FieldValue]) -> SummarizeResult<Self>;

    fn fields(&self) -> Vec<FieldValue> {
        (0..Self::FIELDS.len()).filter_map(|idx| self.field(idx)).collect()
    }

    fn field_index(name: &str) -> Option<usize> {
        Self::FIELDS.iter().position(|field| *field == name)
    }

    /// Canonical form of `value` for field `idx`: the value a key built from it would report.
    ///
    /// Distinct field values can decode to the same key field (`Int(1)` and `UInt(1)` for an
    /// integer field), so domains must be compared in this form.
    fn normalize_field(_idx: usize, value: &FieldValue) -> SummarizeResult<FieldValue> {
        Ok(value.clone())
    }
}

impl GroupKey for () {
    const FIELDS: &'static [&'static str] = &[];

    fn field(&self, _idx: usize) -> Option<FieldValue> {
        None
    }

    fn from_fields(values: &[FieldValue]) -> SummarizeResult<Self> {
        check_arity(0, values)
    }
}

macro_rules! impl_tuple_group_key {
    ($(($idx:tt, $name:literal, $ty:ident)),+) => {
        impl<$($ty: KeyField),+> GroupKey for ($($ty,)+) {
            const FIELDS: &'static [&'static str] = &[$($name),+];

            fn field(&self, idx: usize) -> Option<FieldValue> {
                match idx {
                    $($idx => Some(self.$idx.to_field_value()),)+
                    _ => None,
                }
            }

            fn from_fields(values: &[FieldValue]) -> SummarizeResult<Self> {
                check_arity(Self::FIELDS.len(), values)?;
                Ok(($(decode_field::<$ty>(Self::FIELDS, values, $idx)?,)+))
            }

            fn normalize_field(idx: usize, value: &FieldValue) -> SummarizeResult<FieldValue> {
                match idx {
                    $($idx => normalize_value::<$ty>($name, value),)+
                    _ => Err(SummarizeError::KeyArity {
                        expected: Self::FIELDS.len(),
                        actual: idx + 1,
                    }),
                }
            }
        }
    };
}

impl_tuple_group_key!((0, "0", A));
impl_tuple_group_key!((0, "0", A), (1, "1", B));
impl_tuple_group_key!((0, "0", A), (1, "1", B), (2, "2", C));
impl_tuple_group_key!((0, "0", A), (1, "1", B), (2, "2", C), (3, "3", D));

#[doc(hidden)]
pub fn check_arity(expected: usize, values: &[FieldValue]) -> SummarizeResult<()> {
    if values.len() != expected {
        return Err(SummarizeError::KeyArity {
            expected,
            actual: values.len(),
        });
    }
    Ok(())
}

#[doc(hidden)]
pub fn decode_field<F: KeyField>(
    fields: &[&str],
    values: &[FieldValue],
    idx: usize,
) -> SummarizeResult<F> {
    let value = values.get(idx).ok_or(SummarizeError::KeyArity {
        expected: fields.len(),
        actual: values.len(),
    })?;
    F::from_field_value(value).ok_or_else(|| SummarizeError::FieldType {
        field: fields.get(idx).copied().unwrap_or_default().to_string(),
        value: value.clone(),
    })
}

#[doc(hidden)]
pub fn normalize_value<F: KeyField>(
    name: &str,
    value: &FieldValue,
) -> SummarizeResult<FieldValue> {
    F::from_field_value(value)
        .map(|field| field.to_field_value())
        .ok_or_else(|| SummarizeError::FieldType {
            field: name.to_string(),
            value: value.clone(),
        })
}

#[doc(hidden)]
pub fn decode_named_field<F: KeyField>(
    fields: &[&str],
    values: &[FieldValue],
    name: &str,
) -> SummarizeResult<F> {
    let idx = fields
        .iter()
        .position(|field| *field == name)
        .ok_or_else(|| SummarizeError::UnknownField {
            field: name.to_string(),
        })?;
    decode_field(fields, values, idx)
}

/// Declare a named group key struct and implement [`GroupKey`] for it.
///
/// ```
/// formula_summarize::group_key! {
///     pub struct SalesKey {
///         pub product: String,
///         pub category: String,
///     }
/// }
///
/// use formula_summarize::GroupKey;
/// assert_eq!(SalesKey::FIELDS, &["product", "category"]);
/// ```
#[macro_export]
macro_rules! group_key {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident {
            $($(#[$fmeta:meta])* $fvis:vis $field:ident : $ty:ty),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        $vis struct $name {
            $($(#[$fmeta])* $fvis $field: $ty),*
        }

        impl $crate::GroupKey for $name {
            const FIELDS: &'static [&'static str] = &[$(stringify!($field)),*];

            fn field(&self, idx: usize) -> ::std::option::Option<$crate::FieldValue> {
                match <Self as $crate::GroupKey>::FIELDS.get(idx).copied() {
                    $(::std::option::Option::Some(stringify!($field)) => {
                        ::std::option::Option::Some($crate::KeyField::to_field_value(&self.$field))
                    })*
                    _ => ::std::option::Option::None,
                }
            }

            fn from_fields(values: &[$crate::FieldValue]) -> $crate::SummarizeResult<Self> {
                $crate::__private::check_arity(<Self as $crate::GroupKey>::FIELDS.len(), values)?;
                ::std::result::Result::Ok(Self {
                    $($field: $crate::__private::decode_named_field::<$ty>(
                        <Self as $crate::GroupKey>::FIELDS,
                        values,
                        stringify!($field),
                    )?),*
                })
            }

            fn normalize_field(
                idx: usize,
                value: &$crate::FieldValue,
            ) -> $crate::SummarizeResult<$crate::FieldValue> {
                match <Self as $crate::GroupKey>::FIELDS.get(idx).copied() {
                    $(::std::option::Option::Some(stringify!($field)) => {
                        $crate::__private::normalize_value::<$ty>(stringify!($field), value)
                    })*
                    _ => ::std::result::Result::Ok(value.clone()),
                }
            }
        }
    };
}
