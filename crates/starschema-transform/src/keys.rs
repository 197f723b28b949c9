//! Surrogate key allocation and the persisted key registry.
//!
//! The registry is an explicit state object: builders receive it by `&mut`,
//! read the current counter for their dimension, append, and leave it
//! advanced for the next builder. Nothing here is global.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::{Result, TransformError};
use crate::model::RunIssue;
use crate::output::atomic::write_json_atomic;

/// Dimensions that own a surrogate key counter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub enum Dimension {
    Product,
    Supplier,
    Customer,
    Warehouse,
    Time,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::Product,
        Dimension::Supplier,
        Dimension::Customer,
        Dimension::Warehouse,
        Dimension::Time,
    ];

    /// Surrogate key column, also the counter name in the registry.
    pub fn key_column(self) -> &'static str {
        match self {
            Dimension::Product => "ProductKey",
            Dimension::Supplier => "SupplierKey",
            Dimension::Customer => "CustomerKey",
            Dimension::Warehouse => "WarehouseKey",
            Dimension::Time => "TimeKey",
        }
    }

    /// Natural key column carried in the dimension table.
    pub fn natural_key(self) -> &'static str {
        match self {
            Dimension::Product => "ProductID",
            Dimension::Supplier => "SupplierID",
            Dimension::Customer => "CustomerID",
            Dimension::Warehouse => "WarehouseID",
            Dimension::Time => "Date",
        }
    }

    pub fn table_name(self) -> &'static str {
        match self {
            Dimension::Product => "product_dim",
            Dimension::Supplier => "supplier_dim",
            Dimension::Customer => "customer_dim",
            Dimension::Warehouse => "warehouse_dim",
            Dimension::Time => "time_dim",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table_name())
    }
}

/// Persisted record of last-assigned surrogate keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct KeyRegistry {
    /// Date of the last completed run.
    #[serde(default, alias = "last_etl_run")]
    pub last_run_date: Option<NaiveDate>,
    /// Last assigned key per counter (`ProductKey`, `TimeKey`, ...).
    #[serde(default)]
    pub surrogate_keys: BTreeMap<String, i64>,
}

impl Default for KeyRegistry {
    fn default() -> Self {
        let surrogate_keys = Dimension::ALL
            .iter()
            .map(|dim| (dim.key_column().to_string(), 0))
            .collect();
        Self {
            last_run_date: None,
            surrogate_keys,
        }
    }
}

impl KeyRegistry {
    /// Last key handed out for `dimension`, 0 when none has been yet.
    pub fn last_assigned(&self, dimension: Dimension) -> i64 {
        self.surrogate_keys
            .get(dimension.key_column())
            .copied()
            .unwrap_or(0)
    }

    /// Reserve `count` consecutive keys and return the first one.
    ///
    /// The range is `last + 1 ..= last + count`; the counter is advanced to
    /// its maximum. A zero count returns `last + 1` and reserves nothing.
    /// Fails without touching the counter when the range does not fit in `i64`.
    pub fn allocate(&mut self, dimension: Dimension, count: usize) -> Result<i64> {
        let last = self.last_assigned(dimension);
        let overflow = || TransformError::KeyOverflow {
            key_column: dimension.key_column().to_string(),
            last,
            count,
        };
        let start = last.checked_add(1).ok_or_else(overflow)?;
        if count > 0 {
            let end = i64::try_from(count)
                .ok()
                .and_then(|count| last.checked_add(count))
                .ok_or_else(overflow)?;
            self.surrogate_keys
                .insert(dimension.key_column().to_string(), end);
        }
        Ok(start)
    }

    /// Fill counters that are absent from a persisted record.
    fn with_defaults(mut self) -> Self {
        for dim in Dimension::ALL {
            self.surrogate_keys
                .entry(dim.key_column().to_string())
                .or_insert(0);
        }
        self
    }

    fn validate(&self) -> std::result::Result<(), String> {
        match self.surrogate_keys.iter().find(|(_, value)| **value < 0) {
            Some((name, value)) => Err(format!("negative counter {name}={value}")),
            None => Ok(()),
        }
    }
}

/// Read the registry, bootstrapping all counters to zero when the record is
/// missing or malformed.
///
/// Any other I/O failure is returned: silently restarting the counters of an
/// existing but unreadable registry would hand out keys a second time.
pub fn load_registry(path: &Path) -> Result<(KeyRegistry, Option<RunIssue>)> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "key registry not found, starting from zero");
            let issue = registry_issue("registry_missing", path, "registry not found");
            return Ok((KeyRegistry::default(), Some(issue)));
        }
        Err(err) => return Err(err.into()),
    };

    let parsed = serde_json::from_str::<KeyRegistry>(&content)
        .map_err(|err| err.to_string())
        .and_then(|registry| {
            let registry = registry.with_defaults();
            registry.validate().map(|_| registry)
        });

    match parsed {
        Ok(registry) => {
            info!(
                path = %path.display(),
                last_run_date = ?registry.last_run_date,
                "key registry loaded"
            );
            Ok((registry, None))
        }
        Err(message) => {
            warn!(path = %path.display(), error = %message, "key registry malformed, starting from zero");
            let issue = registry_issue("registry_malformed", path, &message);
            Ok((KeyRegistry::default(), Some(issue)))
        }
    }
}

/// Persist the registry atomically, stamped with `run_date`.
pub fn save_registry(path: &Path, registry: &KeyRegistry, run_date: NaiveDate) -> Result<()> {
    let mut record = registry.clone();
    record.last_run_date = Some(run_date);
    write_json_atomic(path, &record)?;
    info!(
        path = %path.display(),
        surrogate_keys = ?record.surrogate_keys,
        "key registry written"
    );
    Ok(())
}

fn registry_issue(code: &str, path: &Path, message: &str) -> RunIssue {
    RunIssue {
        code: code.to_string(),
        path: path.display().to_string(),
        message: message.to_string(),
    }
}
