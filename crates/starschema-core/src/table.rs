use std::collections::BTreeMap;
use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::value::{Value, tuple_key};

/// One table row; cells are positional and follow `Table::columns`.
pub type Row = Vec<Value>;

/// A named relational table with ordered columns and ordered rows.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: String,
    columns: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    /// Build a table from rows, checking every row matches the header width.
    pub fn from_rows(name: impl Into<String>, columns: Vec<String>, rows: Vec<Row>) -> Result<Self> {
        let mut table = Self::new(name, columns);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_index(column).is_some()
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|name| name == column)
    }

    /// Position of a column that must exist.
    pub fn require_column(&self, column: &str) -> Result<usize> {
        self.column_index(column)
            .ok_or_else(|| Error::missing_column(&self.name, column))
    }

    pub fn require_columns<S: AsRef<str>>(&self, columns: &[S]) -> Result<Vec<usize>> {
        columns
            .iter()
            .map(|column| self.require_column(column.as_ref()))
            .collect()
    }

    pub fn push_row(&mut self, row: Row) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(Error::InvalidTable(format!(
                "row width {} does not match {} columns of '{}'",
                row.len(),
                self.columns.len(),
                self.name
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Cell at `row` in `column`, if both exist.
    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|cells| cells.get(idx))
    }

    /// All values of a required column, in row order.
    pub fn column_values(&self, column: &str) -> Result<Vec<&Value>> {
        let idx = self.require_column(column)?;
        Ok(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// Apply `f` to every cell of a required column.
    pub fn map_column(&mut self, column: &str, mut f: impl FnMut(&Value) -> Value) -> Result<()> {
        let idx = self.require_column(column)?;
        for row in &mut self.rows {
            row[idx] = f(&row[idx]);
        }
        Ok(())
    }

    /// Append a column, filling every existing row with `fill`.
    pub fn add_column(&mut self, column: impl Into<String>, fill: Value) -> Result<()> {
        let column = column.into();
        if self.has_column(&column) {
            return Err(Error::InvalidTable(format!(
                "column '{}' already exists in '{}'",
                column, self.name
            )));
        }
        self.columns.push(column);
        for row in &mut self.rows {
            row.push(fill.clone());
        }
        Ok(())
    }

    /// Remove columns by name; names that are not present are ignored.
    pub fn drop_columns<S: AsRef<str>>(&mut self, columns: &[S]) {
        let drop: HashSet<&str> = columns.iter().map(|column| column.as_ref()).collect();
        let keep: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .filter(|(_, name)| !drop.contains(name.as_str()))
            .map(|(idx, _)| idx)
            .collect();
        if keep.len() == self.columns.len() {
            return;
        }

        self.columns = keep.iter().map(|idx| self.columns[*idx].clone()).collect();
        for row in &mut self.rows {
            *row = keep.iter().map(|idx| row[*idx].clone()).collect();
        }
    }

    /// Project `(source, target)` column pairs into a new table.
    pub fn select<S: AsRef<str>, T: AsRef<str>>(
        &self,
        name: impl Into<String>,
        columns: &[(S, T)],
    ) -> Result<Table> {
        let positions = columns
            .iter()
            .map(|(source, _)| self.require_column(source.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        let header = columns
            .iter()
            .map(|(_, target)| target.as_ref().to_string())
            .collect();
        let rows = self
            .rows
            .iter()
            .map(|row| positions.iter().map(|idx| row[*idx].clone()).collect())
            .collect();
        Ok(Table {
            name: name.into(),
            columns: header,
            rows,
        })
    }

    /// Keep rows for which `keep` returns true.
    pub fn retain_rows(&mut self, mut keep: impl FnMut(&Row) -> bool) -> usize {
        let before = self.rows.len();
        self.rows.retain(|row| keep(row));
        before - self.rows.len()
    }

    pub fn rows_mut(&mut self) -> &mut [Row] {
        &mut self.rows
    }

    /// Keep the first row per key tuple over `columns`; returns rows removed.
    pub fn dedup_by<S: AsRef<str>>(&mut self, columns: &[S]) -> Result<usize> {
        let positions = self.require_columns(columns)?;
        let mut seen = HashSet::new();
        Ok(self.retain_rows(|row| seen.insert(tuple_key(positions.iter().map(|idx| &row[*idx])))))
    }

    /// Keep the first occurrence of every distinct full row.
    pub fn dedup_rows(&mut self) -> usize {
        let mut seen = HashSet::new();
        self.retain_rows(|row| seen.insert(tuple_key(row.iter())))
    }

    /// Reorder columns to exactly `order`, failing on any missing name.
    pub fn reorder<S: AsRef<str>>(&self, order: &[S]) -> Result<Table> {
        let pairs: Vec<(&str, &str)> = order
            .iter()
            .map(|column| (column.as_ref(), column.as_ref()))
            .collect();
        self.select(self.name.clone(), &pairs)
    }
}

/// Tables addressed by name, iterated in name order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableSet {
    tables: BTreeMap<String, Table>,
}

impl TableSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, table: Table) -> Option<Table> {
        self.tables.insert(table.name().to_string(), table)
    }

    pub fn get(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }

    /// Table that must be present in the set.
    pub fn require(&self, name: &str) -> Result<&Table> {
        self.get(name).ok_or_else(|| Error::missing_table(name))
    }

    pub fn remove(&mut self, name: &str) -> Option<Table> {
        self.tables.remove(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Table> {
        self.tables.values()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl FromIterator<Table> for TableSet {
    fn from_iter<I: IntoIterator<Item = Table>>(iter: I) -> Self {
        let mut set = TableSet::new();
        for table in iter {
            set.insert(table);
        }
        set
    }
}

impl IntoIterator for TableSet {
    type Item = Table;
    type IntoIter = std::collections::btree_map::IntoValues<String, Table>;

    fn into_iter(self) -> Self::IntoIter {
        self.tables.into_values()
    }
}

/// Shorthand for building a column header from string literals.
pub fn columns(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::from_rows(
            "customer",
            columns(&["customerid", "name", "email"]),
            vec![
                vec![Value::Int(1), Value::text("Ana"), Value::text("a@x")],
                vec![Value::Int(2), Value::text("Bo"), Value::Null],
                vec![Value::Float(1.0), Value::text("Ana 2"), Value::Null],
            ],
        )
        .unwrap()
    }

    #[test]
    fn rejects_rows_with_wrong_width() {
        let mut table = Table::new("t", columns(&["a", "b"]));
        let err = table.push_row(vec![Value::Int(1)]).unwrap_err();
        assert!(matches!(err, Error::InvalidTable(_)));
    }

    #[test]
    fn drop_columns_ignores_unknown_names() {
        let mut table = sample();
        table.drop_columns(&["email", "does_not_exist"]);
        assert_eq!(table.columns(), &["customerid".to_string(), "name".to_string()]);
        assert_eq!(table.rows()[1], vec![Value::Int(2), Value::text("Bo")]);
    }

    #[test]
    fn dedup_by_keeps_first_occurrence() {
        let mut table = sample();
        let removed = table.dedup_by(&["customerid"]).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(table.len(), 2);
        assert_eq!(table.value(0, "name"), Some(&Value::text("Ana")));
    }

    #[test]
    fn select_renames_and_reports_missing_columns() {
        let table = sample();
        let projected = table
            .select("customer_dim", &[("customerid", "CustomerID"), ("name", "Name")])
            .unwrap();
        assert_eq!(projected.columns(), &["CustomerID".to_string(), "Name".to_string()]);

        let err = table.select("x", &[("missing", "Missing")]).unwrap_err();
        match err {
            Error::MissingColumn { table, column } => {
                assert_eq!(table, "customer");
                assert_eq!(column, "missing");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn table_set_require_names_missing_table() {
        let set: TableSet = vec![sample()].into_iter().collect();
        assert!(set.require("customer").is_ok());
        assert!(matches!(
            set.require("product"),
            Err(Error::MissingTable { table }) if table == "product"
        ));
    }
}
