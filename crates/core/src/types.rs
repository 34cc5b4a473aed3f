//! Identifier and metadata types
//!
//! - ObjectId: client-assigned id naming a prepared statement or a result
//!   cursor on the server
//! - DataType / Nullability: declared SQL type information
//! - ParamMeta: what the server tells us about a statement parameter
//! - ColumnMeta: what the server tells us about a result column

use serde::{Deserialize, Serialize};
use std::fmt;

/// Client-assigned identifier for a server-side object.
///
/// Statements and result cursors draw from the same per-session counter.
/// The server keeps only the most recent ids (see
/// [`SERVER_CACHED_OBJECTS`](crate::SERVER_CACHED_OBJECTS)), so an id can go
/// stale without the client being told.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId(i32);

impl ObjectId {
    /// Sentinel that is older than any window, forcing re-preparation.
    pub const STALE: ObjectId = ObjectId(i32::MIN);

    /// Wrap a raw id.
    pub const fn new(id: i32) -> Self {
        ObjectId(id)
    }

    /// The raw id as sent on the wire.
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    /// The id following this one.
    pub fn next(self) -> Self {
        ObjectId(self.0.wrapping_add(1))
    }

    /// Returns true if this id is at or below `high_water - window`.
    ///
    /// Computed in `i64` so the [`STALE`](Self::STALE) sentinel and large
    /// windows cannot overflow.
    pub fn is_outside_window(self, high_water: ObjectId, window: u32) -> bool {
        i64::from(self.0) <= i64::from(high_water.0) - i64::from(window)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Declared SQL data type of a parameter or column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// Type could not be determined (e.g. `? IS NULL`)
    Unknown,
    /// NULL literal
    Null,
    /// BOOLEAN
    Boolean,
    /// INTEGER
    Int,
    /// BIGINT
    BigInt,
    /// DOUBLE
    Double,
    /// DECIMAL / NUMERIC
    Decimal,
    /// VARCHAR
    Varchar,
    /// VARBINARY
    Varbinary,
    /// TIMESTAMP
    Timestamp,
    /// ARRAY
    Array,
}

/// Whether a parameter or column accepts NULL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Nullability {
    /// NOT NULL
    NoNulls,
    /// NULL allowed
    Nullable,
    /// Server could not tell
    #[default]
    Unknown,
}

/// Parameter metadata returned by an initial prepare.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamMeta {
    /// Declared type
    pub data_type: DataType,
    /// Precision (or maximum length)
    pub precision: i64,
    /// Scale
    pub scale: i32,
    /// Nullability
    pub nullable: Nullability,
}

impl ParamMeta {
    /// Metadata for a parameter whose type the server could not infer.
    pub fn unknown() -> Self {
        ParamMeta {
            data_type: DataType::Unknown,
            precision: 0,
            scale: 0,
            nullable: Nullability::Unknown,
        }
    }

    /// Metadata for a parameter of the given type with default precision.
    pub fn of(data_type: DataType) -> Self {
        ParamMeta {
            data_type,
            precision: 0,
            scale: 0,
            nullable: Nullability::Unknown,
        }
    }
}

/// Column descriptor of a result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMeta {
    /// Column label as seen by the client
    pub name: String,
    /// Declared type
    pub data_type: DataType,
    /// Nullability
    pub nullable: Nullability,
}

impl ColumnMeta {
    /// Create a column descriptor with unknown nullability.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        ColumnMeta {
            name: name.into(),
            data_type,
            nullable: Nullability::Unknown,
        }
    }
}
