use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::table::{Row, Table};
use crate::value::{Value, tuple_key};

/// Result of a join that drops unmatched rows.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinOutcome {
    pub table: Table,
    /// Left-side rows discarded because no right-side row matched.
    pub dropped: usize,
}

/// Inner join on identically named key columns.
///
/// Every matching pair yields one row, so a header joined to its detail lines
/// produces one row per line. Left rows with a null key component never match.
/// Output columns are the left columns followed by the non-key right columns;
/// a right column whose name is already taken gets the suffix `_<right name>`.
pub fn inner_join<S: AsRef<str>>(left: &Table, right: &Table, on: &[S]) -> Result<JoinOutcome> {
    if on.is_empty() {
        return Err(Error::InvalidTable(format!(
            "join of '{}' and '{}' needs at least one key column",
            left.name(),
            right.name()
        )));
    }

    let left_keys = left.require_columns(on)?;
    let right_keys = right.require_columns(on)?;

    let right_payload: Vec<usize> = (0..right.columns().len())
        .filter(|idx| !right_keys.contains(idx))
        .collect();

    let mut header: Vec<String> = left.columns().to_vec();
    for idx in &right_payload {
        let column = &right.columns()[*idx];
        let name = if header.contains(column) {
            format!("{}_{}", column, right.name())
        } else {
            column.clone()
        };
        if header.contains(&name) {
            return Err(Error::InvalidTable(format!(
                "column '{}' is ambiguous when joining '{}' and '{}'",
                name,
                left.name(),
                right.name()
            )));
        }
        header.push(name);
    }

    let mut index: HashMap<String, Vec<usize>> = HashMap::new();
    for (row_idx, row) in right.rows().iter().enumerate() {
        if let Some(key) = row_key(row, &right_keys) {
            index.entry(key).or_default().push(row_idx);
        }
    }

    let mut joined = Table::new(left.name(), header);
    let mut dropped = 0;
    for row in left.rows() {
        let matches = row_key(row, &left_keys).and_then(|key| index.get(&key));
        let Some(matches) = matches else {
            dropped += 1;
            continue;
        };
        for right_idx in matches {
            let right_row = &right.rows()[*right_idx];
            let mut combined = row.clone();
            combined.extend(right_payload.iter().map(|idx| right_row[*idx].clone()));
            joined.push_row(combined)?;
        }
    }

    Ok(JoinOutcome {
        table: joined,
        dropped,
    })
}

/// Many-to-one enrichment that never drops base rows.
///
/// Each base row takes the `(source, target)` columns from the first lookup
/// row whose `lookup_on` matches its `base_on`; unmatched rows get nulls.
pub fn left_lookup(
    base: &Table,
    base_on: &str,
    lookup: &Table,
    lookup_on: &str,
    take: &[(&str, &str)],
) -> Result<Table> {
    let (table, _) = lookup_join(base, base_on, lookup, lookup_on, take, false)?;
    Ok(table)
}

/// Many-to-one resolution that drops base rows without a match.
///
/// This is the referential-integrity primitive: the returned table holds only
/// rows that resolved, and `dropped` counts the rest.
pub fn inner_lookup(
    base: &Table,
    base_on: &str,
    lookup: &Table,
    lookup_on: &str,
    take: &[(&str, &str)],
) -> Result<JoinOutcome> {
    let (table, dropped) = lookup_join(base, base_on, lookup, lookup_on, take, true)?;
    Ok(JoinOutcome { table, dropped })
}

fn lookup_join(
    base: &Table,
    base_on: &str,
    lookup: &Table,
    lookup_on: &str,
    take: &[(&str, &str)],
    drop_unmatched: bool,
) -> Result<(Table, usize)> {
    let base_key = base.require_column(base_on)?;
    let lookup_key = lookup.require_column(lookup_on)?;
    let sources = take
        .iter()
        .map(|(source, _)| lookup.require_column(source))
        .collect::<Result<Vec<_>>>()?;

    let mut header = base.columns().to_vec();
    for (_, target) in take {
        if header.iter().any(|column| column == target) {
            return Err(Error::InvalidTable(format!(
                "column '{}' already exists in '{}'",
                target,
                base.name()
            )));
        }
        header.push(target.to_string());
    }

    let mut index: HashMap<String, usize> = HashMap::new();
    for (row_idx, row) in lookup.rows().iter().enumerate() {
        let value = &row[lookup_key];
        if !value.is_null() {
            index.entry(value.key()).or_insert(row_idx);
        }
    }

    let mut joined = Table::new(base.name(), header);
    let mut dropped = 0;
    for row in base.rows() {
        let value = &row[base_key];
        let matched = if value.is_null() {
            None
        } else {
            index.get(&value.key()).map(|idx| &lookup.rows()[*idx])
        };

        let mut combined = row.clone();
        match matched {
            Some(lookup_row) => {
                combined.extend(sources.iter().map(|idx| lookup_row[*idx].clone()));
            }
            None if drop_unmatched => {
                dropped += 1;
                continue;
            }
            None => combined.extend(sources.iter().map(|_| Value::Null)),
        }
        joined.push_row(combined)?;
    }

    Ok((joined, dropped))
}

fn row_key(row: &Row, positions: &[usize]) -> Option<String> {
    if positions.iter().any(|idx| row[*idx].is_null()) {
        return None;
    }
    Some(tuple_key(positions.iter().map(|idx| &row[*idx])))
}
