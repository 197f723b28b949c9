//! Core table model for starschema.
//!
//! This crate defines the scalar values, in-memory tables, join primitives
//! and invariant validators shared by the transformation engine and the CLI.

pub mod error;
pub mod join;
pub mod table;
pub mod validation;
pub mod value;

pub use error::{Error, Result};
pub use join::{JoinOutcome, inner_join, inner_lookup, left_lookup};
pub use table::{Row, Table, TableSet, columns};
pub use validation::{validate_references, validate_unique_key};
pub use value::{UNKNOWN_TEXT, Value, parse_date, sentinel_date, tuple_key};
