//! Per-entity cleaning rules.
//!
//! Every entity is cleaned by the same interpreter: a natural key plus an
//! ordered list of primitive operations. The built-in catalog lives in
//! [`catalog`]; a run may replace it with a JSON rule set.

pub mod catalog;

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use starschema_core::{Table, TableSet, UNKNOWN_TEXT, Value, sentinel_date, tuple_key};

use crate::errors::{Result, TransformError};
use crate::model::{CleanReport, RunIssue};

/// How nulls in a numeric column are replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NumericFill {
    Constant { value: f64 },
    Median,
    Mean,
}

/// One primitive cleaning operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum CleanOp {
    /// Remove rows with any null natural-key component.
    DropNullKeys,
    /// Keep the first row per natural key.
    DedupByKey,
    /// Remove columns; unknown names are ignored.
    DropColumns { columns: Vec<String> },
    FillText {
        columns: Vec<String>,
        #[serde(default = "default_placeholder")]
        value: String,
    },
    /// Replace nulls with a constant or a per-table (or per-group) statistic.
    FillNumeric {
        columns: Vec<String>,
        fill: NumericFill,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        group_by: Vec<String>,
    },
    Round {
        columns: Vec<String>,
        #[serde(default = "default_decimals")]
        decimals: u32,
    },
    /// Parse text into dates; unparsable values become null.
    CoerceDate { columns: Vec<String> },
    /// Replace null dates with the sentinel date.
    FillDate { columns: Vec<String> },
    TruncateInt { columns: Vec<String> },
    /// Fill nulls in `column` from the first other row sharing `peer`.
    BackfillFromPeer { column: String, peer: String },
}

fn default_placeholder() -> String {
    UNKNOWN_TEXT.to_string()
}

fn default_decimals() -> u32 {
    2
}

impl CleanOp {
    pub fn drop_columns(columns: &[&str]) -> Self {
        CleanOp::DropColumns {
            columns: owned(columns),
        }
    }

    pub fn fill_text(columns: &[&str]) -> Self {
        CleanOp::FillText {
            columns: owned(columns),
            value: default_placeholder(),
        }
    }

    pub fn fill_zero(columns: &[&str]) -> Self {
        CleanOp::FillNumeric {
            columns: owned(columns),
            fill: NumericFill::Constant { value: 0.0 },
            group_by: Vec::new(),
        }
    }

    pub fn fill_median(columns: &[&str], group_by: &[&str]) -> Self {
        CleanOp::FillNumeric {
            columns: owned(columns),
            fill: NumericFill::Median,
            group_by: owned(group_by),
        }
    }

    pub fn fill_mean(columns: &[&str], group_by: &[&str]) -> Self {
        CleanOp::FillNumeric {
            columns: owned(columns),
            fill: NumericFill::Mean,
            group_by: owned(group_by),
        }
    }

    pub fn round(columns: &[&str]) -> Self {
        CleanOp::Round {
            columns: owned(columns),
            decimals: default_decimals(),
        }
    }

    pub fn coerce_date(columns: &[&str]) -> Self {
        CleanOp::CoerceDate {
            columns: owned(columns),
        }
    }

    pub fn fill_date(columns: &[&str]) -> Self {
        CleanOp::FillDate {
            columns: owned(columns),
        }
    }

    pub fn truncate_int(columns: &[&str]) -> Self {
        CleanOp::TruncateInt {
            columns: owned(columns),
        }
    }

    pub fn backfill_from_peer(column: &str, peer: &str) -> Self {
        CleanOp::BackfillFromPeer {
            column: column.to_string(),
            peer: peer.to_string(),
        }
    }
}

/// Natural key and ordered operations for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRules {
    pub entity: String,
    pub natural_key: Vec<String>,
    pub ops: Vec<CleanOp>,
}

impl EntityRules {
    pub fn new(entity: &str, natural_key: &[&str], ops: Vec<CleanOp>) -> Self {
        Self {
            entity: entity.to_string(),
            natural_key: owned(natural_key),
            ops,
        }
    }
}

/// A cleaned table with its counters and recoverable issues.
#[derive(Debug, Clone)]
pub struct CleanOutcome {
    pub table: Table,
    pub report: CleanReport,
    pub warnings: Vec<RunIssue>,
}

/// All cleaned tables of a run.
#[derive(Debug, Clone)]
pub struct CleanedTables {
    pub tables: TableSet,
    pub reports: Vec<CleanReport>,
    pub warnings: Vec<RunIssue>,
}

/// Mapping from entity name to its cleaning rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSet {
    pub entities: Vec<EntityRules>,
}

impl Default for RuleSet {
    fn default() -> Self {
        catalog::default_rule_set()
    }
}

impl RuleSet {
    pub fn new(entities: Vec<EntityRules>) -> Result<Self> {
        let rules = Self { entities };
        rules.validate()?;
        Ok(rules)
    }

    /// Load a rule set from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let rules: RuleSet = serde_json::from_str(&content)?;
        rules.validate()?;
        Ok(rules)
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for rules in &self.entities {
            if !seen.insert(rules.entity.as_str()) {
                return Err(TransformError::InvalidRules(format!(
                    "entity '{}' is declared more than once",
                    rules.entity
                )));
            }
            if rules.natural_key.is_empty() {
                return Err(TransformError::InvalidRules(format!(
                    "entity '{}' has no natural key",
                    rules.entity
                )));
            }
        }
        Ok(())
    }

    pub fn entity(&self, name: &str) -> Option<&EntityRules> {
        self.entities.iter().find(|rules| rules.entity == name)
    }

    /// Clean every entity the rule set declares.
    ///
    /// Each declared entity must be present in `raw`; tables without rules
    /// are not carried into the cleaned set.
    pub fn clean_all(&self, raw: &TableSet) -> Result<CleanedTables> {
        let mut cleaned = CleanedTables {
            tables: TableSet::new(),
            reports: Vec::new(),
            warnings: Vec::new(),
        };

        for name in raw.names().filter(|name| self.entity(name).is_none()) {
            debug!(table = %name, "no cleaning rules, table ignored");
        }

        for rules in &self.entities {
            let table = raw.require(&rules.entity)?;
            let outcome = clean_table(table, rules)?;
            info!(
                entity = %rules.entity,
                rows_in = outcome.report.rows_in,
                rows_out = outcome.report.rows_out,
                duplicates_dropped = outcome.report.duplicates_dropped,
                "entity cleaned"
            );
            cleaned.tables.insert(outcome.table);
            cleaned.reports.push(outcome.report);
            cleaned.warnings.extend(outcome.warnings);
        }

        Ok(cleaned)
    }
}

/// Apply `rules` to a copy of `table`.
pub fn clean_table(table: &Table, rules: &EntityRules) -> Result<CleanOutcome> {
    let mut table = table.clone().with_name(&rules.entity);
    let mut report = CleanReport {
        entity: rules.entity.clone(),
        rows_in: table.len() as u64,
        rows_out: 0,
        null_keys_dropped: 0,
        duplicates_dropped: 0,
        dates_nulled: 0,
    };
    let mut warnings = Vec::new();

    for op in &rules.ops {
        match op {
            CleanOp::DropNullKeys => {
                let positions = table.require_columns(&rules.natural_key)?;
                let dropped =
                    table.retain_rows(|row| positions.iter().all(|idx| !row[*idx].is_null()));
                report.null_keys_dropped += dropped as u64;
            }
            CleanOp::DedupByKey => {
                report.duplicates_dropped += table.dedup_by(&rules.natural_key)? as u64;
            }
            CleanOp::DropColumns { columns } => table.drop_columns(columns),
            CleanOp::FillText { columns, value } => {
                for column in columns {
                    table.map_column(column, |cell| match cell {
                        Value::Null => Value::Text(value.clone()),
                        other => other.clone(),
                    })?;
                }
            }
            CleanOp::FillNumeric {
                columns,
                fill,
                group_by,
            } => {
                for column in columns {
                    fill_numeric(&mut table, column, fill, group_by)?;
                }
            }
            CleanOp::Round { columns, decimals } => {
                let factor = 10_f64.powi(*decimals as i32);
                for column in columns {
                    table.map_column(column, |cell| match cell {
                        Value::Float(value) => Value::Float((value * factor).round() / factor),
                        other => other.clone(),
                    })?;
                }
            }
            CleanOp::CoerceDate { columns } => {
                for column in columns {
                    if !table.has_column(column) {
                        warn!(entity = %rules.entity, column = %column, "date column not found");
                        warnings.push(RunIssue {
                            code: "missing_date_column".to_string(),
                            path: format!("{}.{}", rules.entity, column),
                            message: format!("column '{column}' does not exist, not coerced"),
                        });
                        continue;
                    }
                    let mut nulled = 0_u64;
                    table.map_column(column, |cell| {
                        let coerced = cell.to_date();
                        if coerced.is_null() && !cell.is_null() {
                            nulled += 1;
                        }
                        coerced
                    })?;
                    if nulled > 0 {
                        debug!(entity = %rules.entity, column = %column, nulled, "unparsable dates set to null");
                    }
                    report.dates_nulled += nulled;
                }
            }
            CleanOp::FillDate { columns } => {
                let sentinel = sentinel_date();
                for column in columns {
                    table.map_column(column, |cell| match cell {
                        Value::Null => Value::Date(sentinel),
                        other => other.clone(),
                    })?;
                }
            }
            CleanOp::TruncateInt { columns } => {
                for column in columns {
                    table.map_column(column, |cell| match cell {
                        Value::Float(value) => Value::Int(value.trunc() as i64),
                        other => other.clone(),
                    })?;
                }
            }
            CleanOp::BackfillFromPeer { column, peer } => {
                backfill_from_peer(&mut table, column, peer)?;
            }
        }
    }

    report.rows_out = table.len() as u64;
    Ok(CleanOutcome {
        table,
        report,
        warnings,
    })
}

fn fill_numeric(
    table: &mut Table,
    column: &str,
    fill: &NumericFill,
    group_by: &[String],
) -> Result<()> {
    let idx = table.require_column(column)?;
    let groups = table.require_columns(group_by)?;

    let integral = table
        .rows()
        .iter()
        .all(|row| matches!(row[idx], Value::Null | Value::Int(_)));
    let global = statistic(fill, table.rows().iter().filter_map(|row| row[idx].as_f64()));

    let mut by_group: HashMap<String, Vec<f64>> = HashMap::new();
    if !groups.is_empty() {
        for row in table.rows() {
            if let Some(value) = row[idx].as_f64() {
                by_group.entry(group_key(row, &groups)).or_default().push(value);
            }
        }
    }
    let group_stats: HashMap<String, f64> = by_group
        .into_iter()
        .filter_map(|(key, values)| statistic(fill, values.into_iter()).map(|stat| (key, stat)))
        .collect();

    for row in table.rows_mut() {
        if !row[idx].is_null() {
            continue;
        }
        let grouped = if groups.is_empty() {
            None
        } else {
            group_stats.get(&group_key(row, &groups)).copied()
        };
        let value = grouped.or(global).unwrap_or(0.0);
        row[idx] = if integral && value.fract() == 0.0 {
            Value::Int(value as i64)
        } else {
            Value::Float(value)
        };
    }

    Ok(())
}

fn group_key(row: &[Value], groups: &[usize]) -> String {
    tuple_key(groups.iter().map(|idx| &row[*idx]))
}

fn statistic(fill: &NumericFill, values: impl Iterator<Item = f64>) -> Option<f64> {
    match fill {
        NumericFill::Constant { value } => Some(*value),
        NumericFill::Mean => {
            let (sum, count) = values.fold((0.0, 0_usize), |(sum, count), value| {
                (sum + value, count + 1)
            });
            (count > 0).then(|| sum / count as f64)
        }
        NumericFill::Median => {
            let mut values: Vec<f64> = values.collect();
            if values.is_empty() {
                return None;
            }
            values.sort_by(|a, b| a.total_cmp(b));
            let mid = values.len() / 2;
            if values.len() % 2 == 0 {
                Some((values[mid - 1] + values[mid]) / 2.0)
            } else {
                Some(values[mid])
            }
        }
    }
}

fn backfill_from_peer(table: &mut Table, column: &str, peer: &str) -> Result<()> {
    let idx = table.require_column(column)?;
    if table.rows().iter().all(|row| !row[idx].is_null()) {
        return Ok(());
    }
    let peer_idx = table.require_column(peer)?;

    let mut donors: HashMap<String, Value> = HashMap::new();
    for row in table.rows() {
        if !row[idx].is_null() && !row[peer_idx].is_null() {
            donors
                .entry(row[peer_idx].key())
                .or_insert_with(|| row[idx].clone());
        }
    }

    for row in table.rows_mut() {
        if row[idx].is_null() && !row[peer_idx].is_null() {
            if let Some(value) = donors.get(&row[peer_idx].key()) {
                row[idx] = value.clone();
            }
        }
    }

    Ok(())
}

fn owned(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use starschema_core::columns;

    fn rules(ops: Vec<CleanOp>) -> EntityRules {
        EntityRules::new("inventory", &["productid", "warehouseid"], ops)
    }

    fn inventory() -> Table {
        Table::from_rows(
            "inventory",
            columns(&["productid", "warehouseid", "reorderpoint", "lastreorderdate"]),
            vec![
                vec![Value::Int(1), Value::Int(7), Value::Int(10), Value::text("2024-01-03")],
                vec![Value::Int(2), Value::Int(7), Value::Int(20), Value::text("garbage")],
                vec![Value::Int(3), Value::Int(7), Value::Null, Value::Null],
                vec![Value::Int(4), Value::Int(8), Value::Null, Value::text("2024-02-01")],
                vec![Value::Null, Value::Int(8), Value::Int(99), Value::Null],
                vec![Value::Int(1), Value::Int(7), Value::Int(55), Value::Null],
            ],
        )
        .unwrap()
    }

    #[test]
    fn null_keys_and_duplicates_are_removed() {
        let outcome = clean_table(
            &inventory(),
            &rules(vec![CleanOp::DropNullKeys, CleanOp::DedupByKey]),
        )
        .unwrap();
        assert_eq!(outcome.table.len(), 4);
        assert_eq!(outcome.report.null_keys_dropped, 1);
        assert_eq!(outcome.report.duplicates_dropped, 1);
        assert_eq!(outcome.table.value(0, "reorderpoint"), Some(&Value::Int(10)));
    }

    #[test]
    fn grouped_mean_fills_and_empty_group_falls_back_to_global() {
        let outcome = clean_table(
            &inventory(),
            &rules(vec![
                CleanOp::DropNullKeys,
                CleanOp::DedupByKey,
                CleanOp::fill_mean(&["reorderpoint"], &["warehouseid"]),
                CleanOp::truncate_int(&["reorderpoint"]),
            ]),
        )
        .unwrap();
        // warehouse 7 holds 10 and 20; warehouse 8 holds only a null, so the
        // global mean over 10 and 20 applies.
        assert_eq!(outcome.table.value(2, "reorderpoint"), Some(&Value::Int(15)));
        assert_eq!(outcome.table.value(3, "reorderpoint"), Some(&Value::Int(15)));
    }

    #[test]
    fn median_of_even_count_averages_middle_values() {
        let table = Table::from_rows(
            "customer",
            columns(&["customerid", "creditlimit"]),
            vec![
                vec![Value::Int(1), Value::Float(100.0)],
                vec![Value::Int(2), Value::Float(300.0)],
                vec![Value::Int(3), Value::Null],
                vec![Value::Int(4), Value::Float(200.5)],
                vec![Value::Int(5), Value::Float(50.0)],
            ],
        )
        .unwrap();
        let rules = EntityRules::new(
            "customer",
            &["customerid"],
            vec![CleanOp::fill_median(&["creditlimit"], &[])],
        );
        let outcome = clean_table(&table, &rules).unwrap();
        assert_eq!(outcome.table.value(2, "creditlimit"), Some(&Value::Float(150.25)));
    }

    #[test]
    fn all_null_column_falls_back_to_zero() {
        let table = Table::from_rows(
            "department",
            columns(&["departmentid", "budget"]),
            vec![vec![Value::Int(1), Value::Null]],
        )
        .unwrap();
        let rules = EntityRules::new(
            "department",
            &["departmentid"],
            vec![CleanOp::fill_median(&["budget"], &[])],
        );
        let outcome = clean_table(&table, &rules).unwrap();
        assert_eq!(outcome.table.value(0, "budget"), Some(&Value::Int(0)));
    }

    #[test]
    fn dates_are_coerced_then_filled_with_sentinel() {
        let outcome = clean_table(
            &inventory(),
            &rules(vec![
                CleanOp::coerce_date(&["lastreorderdate", "expecteddeliverydate"]),
                CleanOp::fill_date(&["lastreorderdate"]),
            ]),
        )
        .unwrap();
        assert_eq!(outcome.report.dates_nulled, 1);
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].code, "missing_date_column");
        assert_eq!(
            outcome.table.value(1, "lastreorderdate"),
            Some(&Value::Date(sentinel_date()))
        );
        assert_eq!(
            outcome.table.value(0, "lastreorderdate"),
            Some(&Value::Date(chrono::NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()))
        );
    }

    #[test]
    fn fill_on_missing_column_is_fatal() {
        let err = clean_table(&inventory(), &rules(vec![CleanOp::fill_text(&["status"])]))
            .unwrap_err();
        assert!(matches!(
            err,
            TransformError::Core(starschema_core::Error::MissingColumn { .. })
        ));
    }

    #[test]
    fn round_keeps_two_decimals() {
        let table = Table::from_rows(
            "payment",
            columns(&["paymentid", "amount"]),
            vec![
                vec![Value::Int(1), Value::Float(10.456)],
                vec![Value::Int(2), Value::Int(3)],
            ],
        )
        .unwrap();
        let rules = EntityRules::new("payment", &["paymentid"], vec![CleanOp::round(&["amount"])]);
        let outcome = clean_table(&table, &rules).unwrap();
        assert_eq!(outcome.table.value(0, "amount"), Some(&Value::Float(10.46)));
        assert_eq!(outcome.table.value(1, "amount"), Some(&Value::Int(3)));
    }

    #[test]
    fn rule_set_rejects_duplicate_entities() {
        let err = RuleSet::new(vec![
            EntityRules::new("product", &["productid"], Vec::new()),
            EntityRules::new("product", &["productid"], Vec::new()),
        ])
        .unwrap_err();
        assert!(matches!(err, TransformError::InvalidRules(_)));
    }

    #[test]
    fn rule_set_json_uses_op_tags() {
        let json = r#"{
            "entities": [{
                "entity": "supplier",
                "natural_key": ["supplierid"],
                "ops": [
                    {"op": "drop_null_keys"},
                    {"op": "fill_text", "columns": ["name"]},
                    {"op": "fill_numeric", "columns": ["rating"], "fill": {"kind": "constant", "value": 0.0}},
                    {"op": "round", "columns": ["rating"]}
                ]
            }]
        }"#;
        let rules: RuleSet = serde_json::from_str(json).unwrap();
        let supplier = rules.entity("supplier").unwrap();
        assert_eq!(supplier.ops[1], CleanOp::fill_text(&["name"]));
        assert_eq!(supplier.ops[2], CleanOp::fill_zero(&["rating"]));
        assert_eq!(supplier.ops[3], CleanOp::round(&["rating"]));
    }
}
