use std::path::Path;

use starschema_core::{Row, Table, TableSet, Value};
use tracing::debug;

use crate::errors::Result;

const NULL_TOKENS: &[&str] = &["", "null", "NULL", "NaN", "nan", "None", "N/A", "<NA>"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CellKind {
    Int,
    Float,
    Text,
}

/// Read every `*.csv` file in `dir` into a table named after the file stem.
pub fn read_table_dir(dir: &Path) -> Result<TableSet> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_csv = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if path.is_file() && is_csv {
            paths.push(path);
        }
    }
    paths.sort();

    let mut tables = TableSet::new();
    for path in paths {
        let Some(name) = path.file_stem().map(|stem| stem.to_string_lossy().to_string()) else {
            continue;
        };
        let table = read_table_csv(&path, &name)?;
        debug!(table = %name, rows = table.len(), "table loaded");
        tables.insert(table);
    }

    Ok(tables)
}

/// Read one CSV file with a header row.
///
/// Column types are inferred per column: integers when every non-null cell
/// parses as one, floats when every non-null cell is numeric, text otherwise.
/// Dates stay text until a cleaning rule coerces them.
pub fn read_table_csv(path: &Path, name: &str) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)?;

    let headers = reader
        .headers()?
        .iter()
        .map(|header| header.trim().to_string())
        .collect::<Vec<_>>();

    let mut raw_rows: Vec<Vec<Option<String>>> = Vec::new();
    for record in reader.records() {
        let record = record?;
        let cells = (0..headers.len())
            .map(|idx| {
                let cell = record.get(idx).unwrap_or_default().trim();
                if NULL_TOKENS.contains(&cell) {
                    None
                } else {
                    Some(cell.to_string())
                }
            })
            .collect();
        raw_rows.push(cells);
    }

    let kinds = (0..headers.len())
        .map(|idx| infer_kind(raw_rows.iter().filter_map(|row| row[idx].as_deref())))
        .collect::<Vec<_>>();

    let rows = raw_rows
        .into_iter()
        .map(|cells| {
            cells
                .into_iter()
                .zip(&kinds)
                .map(|(cell, kind)| typed_value(cell, *kind))
                .collect::<Row>()
        })
        .collect();

    Ok(Table::from_rows(name, headers, rows)?)
}

fn infer_kind<'a>(cells: impl Iterator<Item = &'a str>) -> CellKind {
    let mut kind = CellKind::Int;
    for cell in cells {
        match kind {
            CellKind::Int if cell.parse::<i64>().is_ok() => {}
            CellKind::Int | CellKind::Float if parse_float(cell).is_some() => {
                kind = CellKind::Float;
            }
            _ => return CellKind::Text,
        }
    }
    kind
}

fn typed_value(cell: Option<String>, kind: CellKind) -> Value {
    let Some(cell) = cell else {
        return Value::Null;
    };
    match kind {
        CellKind::Int => cell.parse().map(Value::Int).unwrap_or(Value::Text(cell)),
        CellKind::Float => parse_float(&cell)
            .map(Value::Float)
            .unwrap_or(Value::Text(cell)),
        CellKind::Text => Value::Text(cell),
    }
}

fn parse_float(cell: &str) -> Option<f64> {
    cell.parse::<f64>().ok().filter(|value| value.is_finite())
}
