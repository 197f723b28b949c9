//! Dimensional transformation engine for starschema.
//!
//! Cleans operational entity tables, builds surrogate-keyed dimensions and
//! assembles fact tables against them. The registry of last-assigned keys is
//! threaded explicitly so repeated runs never reuse a key.

pub mod clean;
pub mod dimension;
pub mod engine;
pub mod errors;
pub mod fact;
pub mod input;
pub mod keys;
pub mod model;
pub mod output;
pub mod time;

pub use clean::{CleanOp, EntityRules, NumericFill, RuleSet};
pub use dimension::{DimensionSpec, Lookup};
pub use engine::{CleanResult, EtlEngine, EtlResult, TransformEngine, Warehouse};
pub use errors::TransformError;
pub use fact::FactSpec;
pub use keys::{Dimension, KeyRegistry, load_registry, save_registry};
pub use model::{CleanReport, DimensionReport, EtlOptions, FactReport, RunIssue, RunReport};
pub use time::DateSource;
