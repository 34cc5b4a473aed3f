//! Core types for the Strata remote client
//!
//! This crate defines the foundational types shared by every layer of the
//! client-side execution engine:
//! - Value: SQL values bound to parameters and returned in rows
//! - ObjectId: client-assigned statement and result identifiers
//! - ParamMeta / ColumnMeta: metadata learned from the server
//! - Error: Error type hierarchy with caller-fault classification
//! - Limits: protocol defaults (cache window, fetch sizes)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod limits;
pub mod types;
pub mod value;

pub use error::{Error, ErrorKind, Result, OBJECT_CLOSED};
pub use limits::{DEFAULT_FETCH_SIZE, SERVER_CACHED_OBJECTS, UNBOUNDED_FETCH};
pub use types::{ColumnMeta, DataType, Nullability, ObjectId, ParamMeta};
pub use value::Value;
