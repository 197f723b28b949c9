use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Options for a directory-level ETL run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EtlOptions {
    /// Directory holding one raw `<entity>.csv` per operational table.
    pub input_dir: PathBuf,
    /// Directory where dimension and fact tables are written.
    pub out_dir: PathBuf,
    /// Location of the persisted surrogate key registry.
    pub registry_path: PathBuf,
    /// Optional JSON rule set replacing the built-in cleaning catalog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rules_path: Option<PathBuf>,
}

impl Default for EtlOptions {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("data/raw"),
            out_dir: PathBuf::from("data/transformed"),
            registry_path: PathBuf::from("metadata/metadata.json"),
            rules_path: None,
        }
    }
}

/// Row counts for one cleaned entity table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CleanReport {
    pub entity: String,
    pub rows_in: u64,
    pub rows_out: u64,
    pub null_keys_dropped: u64,
    pub duplicates_dropped: u64,
    pub dates_nulled: u64,
}

/// Key range assigned to one dimension in this run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DimensionReport {
    pub table: String,
    pub rows: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_key: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_key: Option<i64>,
}

/// Row counts for one fact table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FactReport {
    pub table: String,
    pub rows: u64,
    /// Detail lines dropped by the header/detail join.
    pub unmatched_lines: u64,
    /// Header rows with no detail line; they contribute no fact row.
    #[serde(default)]
    pub unmatched_headers: u64,
    /// Rows dropped because a reference could not be resolved, by source.
    pub dropped_by: BTreeMap<String, u64>,
}

impl FactReport {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            rows: 0,
            unmatched_lines: 0,
            unmatched_headers: 0,
            dropped_by: BTreeMap::new(),
        }
    }

    pub fn record_dropped(&mut self, source: &str, count: usize) {
        if count > 0 {
            *self.dropped_by.entry(source.to_string()).or_insert(0) += count as u64;
        }
    }

    /// Fact rows lost; headers without lines are reported separately.
    pub fn dropped_total(&self) -> u64 {
        self.unmatched_lines + self.dropped_by.values().sum::<u64>()
    }
}

/// Structured run issue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunIssue {
    pub code: String,
    pub path: String,
    pub message: String,
}

/// Report for one transformation run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunReport {
    pub run_id: String,
    pub cleaned: Vec<CleanReport>,
    pub dimensions: Vec<DimensionReport>,
    pub facts: Vec<FactReport>,
    pub warnings_by_code: BTreeMap<String, u64>,
    pub warnings: Vec<RunIssue>,
    pub surrogate_keys: BTreeMap<String, i64>,
}

impl RunReport {
    pub fn new(run_id: String) -> Self {
        Self {
            run_id,
            cleaned: Vec::new(),
            dimensions: Vec::new(),
            facts: Vec::new(),
            warnings_by_code: BTreeMap::new(),
            warnings: Vec::new(),
            surrogate_keys: BTreeMap::new(),
        }
    }

    pub fn record_warning(&mut self, issue: RunIssue) {
        *self.warnings_by_code.entry(issue.code.clone()).or_insert(0) += 1;
        self.warnings.push(issue);
    }

    pub fn fact(&self, table: &str) -> Option<&FactReport> {
        self.facts.iter().find(|fact| fact.table == table)
    }

    pub fn dimension(&self, table: &str) -> Option<&DimensionReport> {
        self.dimensions.iter().find(|dim| dim.table == table)
    }
}
