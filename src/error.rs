//! Error types for rowbind operations.

use thiserror::Error;

/// Result type alias using [`RowbindError`].
pub type Result<T> = std::result::Result<T, RowbindError>;

/// Error types for rowbind operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RowbindError {
    // ==================== Destination Shape ====================
    /// A destination argument could not be classified.
    #[error("Argument shape error: {0}")]
    ArgumentShape(String),

    // ==================== Resolution ====================
    /// A required record field has no column of the same name.
    #[error("Unmatched field: '{field}' in {destination} has no matching column")]
    UnmatchedField { field: String, destination: String },

    /// Two destinations declare a field for the same column.
    #[error("Duplicate field claim: '{field}' matches column '{column}' already claimed by another destination")]
    DuplicateFieldClaim { field: String, column: String },

    /// Bare scalars and remaining columns disagree in number.
    #[error("Cardinality error: {scalars} positional destination(s) for {columns} unclaimed column(s)")]
    Cardinality { scalars: usize, columns: usize },

    /// The row does not carry one value per catalog column.
    #[error("Row length mismatch: catalog has {expected} column(s), row has {actual}")]
    RowLength { expected: usize, actual: usize },

    // ==================== Coercion ====================
    /// Null value written to a destination that cannot hold null.
    #[error("Column '{column}' is null but its destination is not nullable")]
    NotNullable { column: String },

    /// Integer or float does not fit into the destination type.
    #[error("Column '{column}' overflows destination type {target}")]
    Overflow { column: String, target: String },

    /// No conversion exists between the value kind and destination kind.
    #[error("Column '{column}': unsupported conversion from {source_kind} to {target}")]
    UnsupportedConversion {
        column: String,
        source_kind: String,
        target: String,
    },

    /// Byte sequence is not valid UTF-8 for a text destination.
    #[error("Column '{column}' does not hold valid UTF-8 text")]
    InvalidText { column: String },

    /// Text does not name a variant of an enumerated destination.
    #[error("Column '{column}': '{value}' is not a valid variant")]
    InvalidEnumValue { column: String, value: String },

    // ==================== Cursor ====================
    /// `scan` called before `next` or after the last row.
    #[error("No current row to scan")]
    NoCurrentRow,

    /// Failure reported by the row source collaborator.
    #[error("Driver error: {0}")]
    Driver(String),
}
