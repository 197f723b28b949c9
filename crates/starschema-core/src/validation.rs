use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::table::Table;
use crate::value::tuple_key;

/// Validate that no two rows share a key and no key component is null.
pub fn validate_unique_key<S: AsRef<str>>(table: &Table, key: &[S]) -> Result<()> {
    let positions = table.require_columns(key)?;
    let mut seen = HashSet::new();

    for (row_idx, row) in table.rows().iter().enumerate() {
        if let Some(idx) = positions.iter().find(|idx| row[**idx].is_null()) {
            return Err(Error::InvalidTable(format!(
                "null key column {}.{} at row {}",
                table.name(),
                table.columns()[*idx],
                row_idx + 1
            )));
        }

        let value = tuple_key(positions.iter().map(|idx| &row[*idx]));
        if !seen.insert(value.clone()) {
            return Err(Error::InvalidTable(format!(
                "duplicate key '{}' in {} at row {}",
                value,
                table.name(),
                row_idx + 1
            )));
        }
    }

    Ok(())
}

/// Validate that every value of `column` in `table` exists in `target.key`.
pub fn validate_references(table: &Table, column: &str, target: &Table, key: &str) -> Result<()> {
    let known: HashSet<String> = target
        .column_values(key)?
        .into_iter()
        .map(|value| value.key())
        .collect();

    for (row_idx, value) in table.column_values(column)?.into_iter().enumerate() {
        if value.is_null() || !known.contains(&value.key()) {
            return Err(Error::InvalidTable(format!(
                "{}.{} value '{}' at row {} has no match in {}.{}",
                table.name(),
                column,
                value.key(),
                row_idx + 1,
                target.name(),
                key
            )));
        }
    }

    Ok(())
}
