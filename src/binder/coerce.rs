//! Value coercion from driver values into destination types.
//!
//! The set of legal conversions is the [`CONVERSIONS`] table, keyed by
//! `(ValueKind, TargetKind)`. [`coerce`] looks a pair up and applies the
//! range checks of the target; the typed end of a conversion is the
//! [`Scannable`] implementation of the destination type.

use std::fmt::{self, Write as _};

use chrono::{DateTime, NaiveDateTime, Utc};
use thiserror::Error;

use crate::error::RowbindError;
use crate::types::{Value, ValueKind};

/// Static type of a destination leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetKind {
    /// `i8`.
    I8,
    /// `i16`.
    I16,
    /// `i32`.
    I32,
    /// `i64`.
    I64,
    /// `u8`.
    U8,
    /// `u16`.
    U16,
    /// `u32`.
    U32,
    /// `u64`.
    U64,
    /// `f32`.
    F32,
    /// `f64`.
    F64,
    /// `bool`.
    Bool,
    /// `String`.
    Text,
    /// `Vec<u8>`.
    Bytes,
    /// Caller-defined enumeration parsed from text.
    Enum,
    /// `DateTime<Utc>` or `NaiveDateTime`.
    Timestamp,
    /// Dynamically typed [`Value`].
    Any,
}

impl TargetKind {
    /// Returns the display name of the kind.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            TargetKind::I8 => "i8",
            TargetKind::I16 => "i16",
            TargetKind::I32 => "i32",
            TargetKind::I64 => "i64",
            TargetKind::U8 => "u8",
            TargetKind::U16 => "u16",
            TargetKind::U32 => "u32",
            TargetKind::U64 => "u64",
            TargetKind::F32 => "f32",
            TargetKind::F64 => "f64",
            TargetKind::Bool => "bool",
            TargetKind::Text => "text",
            TargetKind::Bytes => "bytes",
            TargetKind::Enum => "enum",
            TargetKind::Timestamp => "timestamp",
            TargetKind::Any => "any",
        }
    }

    /// Returns the inclusive value range of integer kinds.
    #[must_use]
    pub fn integer_bounds(&self) -> Option<(i128, i128)> {
        let bounds = match self {
            TargetKind::I8 => (i128::from(i8::MIN), i128::from(i8::MAX)),
            TargetKind::I16 => (i128::from(i16::MIN), i128::from(i16::MAX)),
            TargetKind::I32 => (i128::from(i32::MIN), i128::from(i32::MAX)),
            TargetKind::I64 => (i128::from(i64::MIN), i128::from(i64::MAX)),
            TargetKind::U8 => (0, i128::from(u8::MAX)),
            TargetKind::U16 => (0, i128::from(u16::MAX)),
            TargetKind::U32 => (0, i128::from(u32::MAX)),
            TargetKind::U64 => (0, i128::from(u64::MAX)),
            _ => return None,
        };
        Some(bounds)
    }

    fn is_unsigned(self) -> bool {
        matches!(
            self,
            TargetKind::U8 | TargetKind::U16 | TargetKind::U32 | TargetKind::U64
        )
    }
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Conversion applied to a `(ValueKind, TargetKind)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion {
    /// Integer into an integer of any width, range checked.
    Integer,
    /// Integer into a float, rejected if the value is not exactly representable.
    IntegerToFloat,
    /// Float into a float, `f32` range checked.
    Float,
    /// Boolean as is.
    Boolean,
    /// Bytes copied verbatim.
    Bytes,
    /// Bytes reinterpreted as UTF-8 text.
    BytesToText,
    /// Text as is.
    Text,
    /// Text handed to an enumerated destination.
    TextToEnum,
    /// UTF-8 bytes of the text.
    TextToBytes,
    /// Timestamp as is.
    Timestamp,
    /// Timestamp formatted as text; only when the leaf asks for it.
    TimestampToText,
    /// Value kept dynamically typed.
    Dynamic,
}

use Conversion as C;
use TargetKind as T;
use ValueKind as V;

/// Every legal `(source, target)` pair. Pairs not listed are unsupported.
pub const CONVERSIONS: &[(ValueKind, TargetKind, Conversion)] = &[
    (V::Integer, T::I8, C::Integer),
    (V::Integer, T::I16, C::Integer),
    (V::Integer, T::I32, C::Integer),
    (V::Integer, T::I64, C::Integer),
    (V::Integer, T::U8, C::Integer),
    (V::Integer, T::U16, C::Integer),
    (V::Integer, T::U32, C::Integer),
    (V::Integer, T::U64, C::Integer),
    (V::Integer, T::F32, C::IntegerToFloat),
    (V::Integer, T::F64, C::IntegerToFloat),
    (V::Integer, T::Any, C::Dynamic),
    (V::Float, T::F32, C::Float),
    (V::Float, T::F64, C::Float),
    (V::Float, T::Any, C::Dynamic),
    (V::Boolean, T::Bool, C::Boolean),
    (V::Boolean, T::Any, C::Dynamic),
    (V::Bytes, T::Bytes, C::Bytes),
    (V::Bytes, T::Text, C::BytesToText),
    (V::Bytes, T::Enum, C::BytesToText),
    (V::Bytes, T::Any, C::Dynamic),
    (V::Text, T::Text, C::Text),
    (V::Text, T::Enum, C::TextToEnum),
    (V::Text, T::Bytes, C::TextToBytes),
    (V::Text, T::Any, C::Dynamic),
    (V::Timestamp, T::Timestamp, C::Timestamp),
    (V::Timestamp, T::Text, C::TimestampToText),
    (V::Timestamp, T::Any, C::Dynamic),
];

/// Looks up the conversion for a pair in [`CONVERSIONS`].
#[must_use]
pub fn conversion(source: ValueKind, target: TargetKind) -> Option<Conversion> {
    CONVERSIONS
        .iter()
        .find(|(s, t, _)| *s == source && *t == target)
        .map(|(_, _, c)| *c)
}

/// Per-leaf knobs that change how a value is coerced.
#[derive(Debug, Clone, Copy, Default)]
pub struct CoerceContext<'a> {
    /// Allow timestamps into text destinations.
    pub timestamp_as_text: bool,
    /// strftime format for timestamp text; RFC 3339 when `None`.
    pub timestamp_format: Option<&'a str>,
}

/// Intermediate result of a coercion, before it lands in a typed cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Coerced {
    /// Integer for a signed destination, already range checked.
    Signed(i64),
    /// Integer for an unsigned destination, already range checked.
    Unsigned(u64),
    /// Float for a float destination.
    Float(f64),
    /// Boolean.
    Bool(bool),
    /// Text for text and enumerated destinations.
    Text(String),
    /// Bytes.
    Bytes(Vec<u8>),
    /// Timestamp.
    Timestamp(DateTime<Utc>),
    /// Untouched driver value.
    Dynamic(Value),
}

impl Coerced {
    fn value_kind(&self) -> ValueKind {
        match self {
            Coerced::Signed(_) | Coerced::Unsigned(_) => ValueKind::Integer,
            Coerced::Float(_) => ValueKind::Float,
            Coerced::Bool(_) => ValueKind::Boolean,
            Coerced::Text(_) => ValueKind::Text,
            Coerced::Bytes(_) => ValueKind::Bytes,
            Coerced::Timestamp(_) => ValueKind::Timestamp,
            Coerced::Dynamic(v) => v.kind(),
        }
    }

    /// Error for a coerced value handed to a cell of the wrong type.
    #[must_use]
    pub fn mismatch(&self, target: TargetKind) -> CoerceError {
        CoerceError::Unsupported {
            source_kind: self.value_kind(),
            target,
        }
    }

    /// Extracts the text of a value coerced for an enumerated destination.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not text.
    pub fn into_text(self, target: TargetKind) -> Result<String, CoerceError> {
        match self {
            Coerced::Text(s) => Ok(s),
            other => Err(other.mismatch(target)),
        }
    }
}

/// Column-independent coercion failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoerceError {
    /// Null into a non-nullable cell.
    #[error("null into non-nullable destination")]
    NotNullable,
    /// Value out of the target's range.
    #[error("value overflows {0}")]
    Overflow(TargetKind),
    /// No conversion for the pair.
    #[error("unsupported conversion from {source_kind} to {target}")]
    Unsupported {
        source_kind: ValueKind,
        target: TargetKind,
    },
    /// Bytes are not UTF-8.
    #[error("invalid UTF-8 text")]
    InvalidText,
    /// Text does not name an enum variant.
    #[error("invalid variant '{0}'")]
    InvalidEnumValue(String),
    /// Configured timestamp format could not be rendered.
    #[error("invalid timestamp format '{0}'")]
    TimestampFormat(String),
}

impl CoerceError {
    /// Attaches the column name, producing the crate error.
    #[must_use]
    pub fn at_column(self, column: &str) -> RowbindError {
        let column = column.to_string();
        match self {
            CoerceError::NotNullable => RowbindError::NotNullable { column },
            CoerceError::Overflow(target) => RowbindError::Overflow {
                column,
                target: target.name().to_string(),
            },
            CoerceError::Unsupported {
                source_kind,
                target,
            } => RowbindError::UnsupportedConversion {
                column,
                source_kind: source_kind.name().to_string(),
                target: target.name().to_string(),
            },
            CoerceError::InvalidText => RowbindError::InvalidText { column },
            CoerceError::InvalidEnumValue(value) => {
                RowbindError::InvalidEnumValue { column, value }
            }
            CoerceError::TimestampFormat(format) => RowbindError::ArgumentShape(format!(
                "Invalid timestamp format '{format}' for column '{column}'"
            )),
        }
    }
}

/// Converts a non-null driver value for a destination of kind `target`.
///
/// # Errors
///
/// Returns an error if the pair is not in [`CONVERSIONS`], the value does
/// not fit the target, or the value is null.
#[allow(clippy::cast_precision_loss)]
pub fn coerce(
    value: &Value,
    target: TargetKind,
    ctx: &CoerceContext<'_>,
) -> Result<Coerced, CoerceError> {
    if value.is_null() {
        return Err(CoerceError::NotNullable);
    }
    let unsupported = || CoerceError::Unsupported {
        source_kind: value.kind(),
        target,
    };
    let conv = conversion(value.kind(), target).ok_or_else(unsupported)?;

    match (conv, value) {
        (C::Integer, Value::Integer(i)) => {
            let (min, max) = target.integer_bounds().ok_or_else(unsupported)?;
            let wide = i128::from(*i);
            if wide < min || wide > max {
                return Err(CoerceError::Overflow(target));
            }
            if target.is_unsigned() {
                u64::try_from(*i)
                    .map(Coerced::Unsigned)
                    .map_err(|_| CoerceError::Overflow(target))
            } else {
                Ok(Coerced::Signed(*i))
            }
        }
        (C::IntegerToFloat, Value::Integer(i)) => {
            let exact = if target == T::F32 {
                (*i as f32) as i128 == i128::from(*i)
            } else {
                (*i as f64) as i128 == i128::from(*i)
            };
            if !exact {
                return Err(CoerceError::Overflow(target));
            }
            Ok(Coerced::Float(*i as f64))
        }
        (C::Float, Value::Float(f)) => {
            if target == T::F32 && f.is_finite() {
                let narrowed = *f as f32;
                if f.abs() > f64::from(f32::MAX) || (*f != 0.0 && narrowed == 0.0) {
                    return Err(CoerceError::Overflow(target));
                }
            }
            Ok(Coerced::Float(*f))
        }
        (C::Boolean, Value::Boolean(b)) => Ok(Coerced::Bool(*b)),
        (C::Bytes, Value::Bytes(b)) => Ok(Coerced::Bytes(b.clone())),
        (C::BytesToText, Value::Bytes(b)) => String::from_utf8(b.clone())
            .map(Coerced::Text)
            .map_err(|_| CoerceError::InvalidText),
        (C::Text | C::TextToEnum, Value::Text(s)) => Ok(Coerced::Text(s.clone())),
        (C::TextToBytes, Value::Text(s)) => Ok(Coerced::Bytes(s.as_bytes().to_vec())),
        (C::Timestamp, Value::Timestamp(t)) => Ok(Coerced::Timestamp(*t)),
        (C::TimestampToText, Value::Timestamp(t)) => {
            if !ctx.timestamp_as_text {
                return Err(unsupported());
            }
            format_timestamp(t, ctx.timestamp_format).map(Coerced::Text)
        }
        (C::Dynamic, v) => Ok(Coerced::Dynamic(v.clone())),
        _ => Err(unsupported()),
    }
}

fn format_timestamp(t: &DateTime<Utc>, format: Option<&str>) -> Result<String, CoerceError> {
    match format {
        None => Ok(t.to_rfc3339()),
        Some(fmt) => {
            let mut out = String::new();
            write!(out, "{}", t.format(fmt))
                .map_err(|_| CoerceError::TimestampFormat(fmt.to_string()))?;
            Ok(out)
        }
    }
}

/// A type that can receive a coerced driver value.
///
/// Implemented for the primitive destinations; implement it for your own
/// enumerations with [`TargetKind::Enum`]:
///
/// ```
/// use rowbind::binder::{CoerceError, Coerced, Scannable, TargetKind};
///
/// enum Status { Active, Banned }
///
/// impl Scannable for Status {
///     const KIND: TargetKind = TargetKind::Enum;
///
///     fn from_coerced(value: Coerced) -> Result<Self, CoerceError> {
///         let text = value.into_text(Self::KIND)?;
///         match text.as_str() {
///             "active" => Ok(Status::Active),
///             "banned" => Ok(Status::Banned),
///             _ => Err(CoerceError::InvalidEnumValue(text)),
///         }
///     }
/// }
/// ```
pub trait Scannable: Sized {
    /// Destination kind used to look up conversions.
    const KIND: TargetKind;

    /// Builds the value from a coerced driver value.
    ///
    /// # Errors
    ///
    /// Returns an error if the coerced value does not fit this type.
    fn from_coerced(value: Coerced) -> Result<Self, CoerceError>;

    /// Value stored for SQL NULL, if the type can represent it.
    fn from_null() -> Option<Self> {
        None
    }
}

macro_rules! scannable_integer {
    ($variant:ident => $($t:ty : $kind:ident),*) => {$(
        impl Scannable for $t {
            const KIND: TargetKind = TargetKind::$kind;

            fn from_coerced(value: Coerced) -> Result<Self, CoerceError> {
                match value {
                    Coerced::$variant(i) => {
                        <$t>::try_from(i).map_err(|_| CoerceError::Overflow(Self::KIND))
                    }
                    other => Err(other.mismatch(Self::KIND)),
                }
            }
        }
    )*};
}

scannable_integer!(Signed => i8: I8, i16: I16, i32: I32, i64: I64);
scannable_integer!(Unsigned => u8: U8, u16: U16, u32: U32, u64: U64);

impl Scannable for f32 {
    const KIND: TargetKind = TargetKind::F32;

    fn from_coerced(value: Coerced) -> Result<Self, CoerceError> {
        match value {
            Coerced::Float(f) => Ok(f as f32),
            other => Err(other.mismatch(Self::KIND)),
        }
    }
}

impl Scannable for f64 {
    const KIND: TargetKind = TargetKind::F64;

    fn from_coerced(value: Coerced) -> Result<Self, CoerceError> {
        match value {
            Coerced::Float(f) => Ok(f),
            other => Err(other.mismatch(Self::KIND)),
        }
    }
}

impl Scannable for bool {
    const KIND: TargetKind = TargetKind::Bool;

    fn from_coerced(value: Coerced) -> Result<Self, CoerceError> {
        match value {
            Coerced::Bool(b) => Ok(b),
            other => Err(other.mismatch(Self::KIND)),
        }
    }
}

impl Scannable for String {
    const KIND: TargetKind = TargetKind::Text;

    fn from_coerced(value: Coerced) -> Result<Self, CoerceError> {
        value.into_text(Self::KIND)
    }
}

impl Scannable for Vec<u8> {
    const KIND: TargetKind = TargetKind::Bytes;

    fn from_coerced(value: Coerced) -> Result<Self, CoerceError> {
        match value {
            Coerced::Bytes(b) => Ok(b),
            other => Err(other.mismatch(Self::KIND)),
        }
    }
}

impl Scannable for DateTime<Utc> {
    const KIND: TargetKind = TargetKind::Timestamp;

    fn from_coerced(value: Coerced) -> Result<Self, CoerceError> {
        match value {
            Coerced::Timestamp(t) => Ok(t),
            other => Err(other.mismatch(Self::KIND)),
        }
    }
}

impl Scannable for NaiveDateTime {
    const KIND: TargetKind = TargetKind::Timestamp;

    fn from_coerced(value: Coerced) -> Result<Self, CoerceError> {
        match value {
            Coerced::Timestamp(t) => Ok(t.naive_utc()),
            other => Err(other.mismatch(Self::KIND)),
        }
    }
}

impl Scannable for Value {
    const KIND: TargetKind = TargetKind::Any;

    fn from_coerced(value: Coerced) -> Result<Self, CoerceError> {
        match value {
            Coerced::Dynamic(v) => Ok(v),
            other => Err(other.mismatch(Self::KIND)),
        }
    }

    fn from_null() -> Option<Self> {
        Some(Value::Null)
    }
}

/// Coerces a driver value straight into a [`Scannable`] type.
///
/// # Errors
///
/// Returns an error if the value is null and `S` cannot hold null, or if
/// the coercion fails.
pub fn coerce_into<S: Scannable>(value: &Value, ctx: &CoerceContext<'_>) -> Result<S, CoerceError> {
    if value.is_null() {
        return S::from_null().ok_or(CoerceError::NotNullable);
    }
    S::from_coerced(coerce(value, S::KIND, ctx)?)
}
