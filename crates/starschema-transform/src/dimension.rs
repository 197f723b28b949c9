//! Dimension builder.
//!
//! A dimension is declared as a base entity, a list of many-to-one lookups,
//! a projection into the target schema and null defaults. One interpreter
//! builds all of them.

use tracing::info;

use starschema_core::{Table, TableSet, UNKNOWN_TEXT, Value, left_lookup};

use crate::errors::Result;
use crate::keys::{Dimension, KeyRegistry};
use crate::model::DimensionReport;

/// Enrichment of the base rows from another cleaned entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
    pub entity: String,
    /// Column of the base rows holding the lookup's natural key.
    pub base_on: String,
    pub lookup_on: String,
    /// `(lookup column, new column)` pairs appended to each base row.
    pub take: Vec<(String, String)>,
}

impl Lookup {
    pub fn new(entity: &str, on: &str, take: &[(&str, &str)]) -> Self {
        Self {
            entity: entity.to_string(),
            base_on: on.to_string(),
            lookup_on: on.to_string(),
            take: pairs(take),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DimensionSpec {
    pub dimension: Dimension,
    pub base: String,
    pub lookups: Vec<Lookup>,
    /// `(source column, target column)` in canonical order, key excluded.
    pub columns: Vec<(String, String)>,
    pub defaults: Vec<(String, Value)>,
}

impl DimensionSpec {
    pub fn table_name(&self) -> &'static str {
        self.dimension.table_name()
    }

    /// Canonical column order with the surrogate key first.
    pub fn schema(&self) -> Vec<String> {
        std::iter::once(self.dimension.key_column().to_string())
            .chain(self.columns.iter().map(|(_, target)| target.clone()))
            .collect()
    }
}

/// Entity dimensions in build order.
pub fn default_dimensions() -> Vec<DimensionSpec> {
    let unknown = || Value::text(UNKNOWN_TEXT);
    vec![
        DimensionSpec {
            dimension: Dimension::Product,
            base: "product".to_string(),
            lookups: vec![
                Lookup::new("category", "categoryid", &[("name", "CategoryName")]),
                Lookup::new(
                    "manufacturer",
                    "manufacturerid",
                    &[("name", "ManufacturerName")],
                ),
            ],
            columns: pairs(&[
                ("productid", "ProductID"),
                ("name", "Name"),
                ("discontinued", "Discontinued"),
                ("categoryid", "CategoryID"),
                ("CategoryName", "CategoryName"),
                ("manufacturerid", "ManufacturerID"),
                ("ManufacturerName", "ManufacturerName"),
                ("price", "Price"),
                ("stocklevel", "StockLevel"),
            ]),
            defaults: vec![
                ("StockLevel".to_string(), Value::Int(0)),
                ("CategoryName".to_string(), unknown()),
                ("ManufacturerName".to_string(), unknown()),
            ],
        },
        DimensionSpec {
            dimension: Dimension::Supplier,
            base: "supplier".to_string(),
            lookups: Vec::new(),
            columns: pairs(&[
                ("supplierid", "SupplierID"),
                ("name", "Name"),
                ("country", "Country"),
                ("rating", "Rating"),
                ("contractstartdate", "ContractStartDate"),
                ("contractenddate", "ContractEndDate"),
            ]),
            defaults: vec![("Rating".to_string(), unknown())],
        },
        DimensionSpec {
            dimension: Dimension::Customer,
            base: "customer".to_string(),
            lookups: Vec::new(),
            columns: pairs(&[
                ("customerid", "CustomerID"),
                ("name", "Name"),
                ("address", "Address"),
                ("preferredpaymentmethod", "PreferredPaymentMethod"),
                ("creditlimit", "CreditLimit"),
            ]),
            defaults: vec![
                ("CreditLimit".to_string(), Value::Int(0)),
                ("PreferredPaymentMethod".to_string(), unknown()),
            ],
        },
        DimensionSpec {
            dimension: Dimension::Warehouse,
            base: "warehouse".to_string(),
            lookups: vec![Lookup::new(
                "location",
                "locationid",
                &[
                    ("name", "LocationName"),
                    ("country", "LocationCountry"),
                    ("city", "LocationCity"),
                ],
            )],
            columns: pairs(&[
                ("warehouseid", "WarehouseID"),
                ("capacity", "Capacity"),
                ("locationid", "LocationID"),
                ("LocationName", "LocationName"),
                ("LocationCountry", "Country"),
                ("LocationCity", "City"),
            ]),
            defaults: vec![
                ("LocationName".to_string(), unknown()),
                ("Country".to_string(), unknown()),
                ("City".to_string(), unknown()),
            ],
        },
    ]
}

/// Build one dimension from the cleaned tables, allocating its keys from
/// `registry`.
pub fn build_dimension(
    spec: &DimensionSpec,
    cleaned: &TableSet,
    registry: &mut KeyRegistry,
) -> Result<(Table, DimensionReport)> {
    let mut enriched = cleaned.require(&spec.base)?.clone();
    for lookup in &spec.lookups {
        let source = cleaned.require(&lookup.entity)?;
        let take: Vec<(&str, &str)> = lookup
            .take
            .iter()
            .map(|(from, to)| (from.as_str(), to.as_str()))
            .collect();
        enriched = left_lookup(&enriched, &lookup.base_on, source, &lookup.lookup_on, &take)?;
    }

    let mut projected = enriched.select(spec.table_name(), &spec.columns)?;
    for (column, default) in &spec.defaults {
        projected.map_column(column, |cell| match cell {
            Value::Null => default.clone(),
            other => other.clone(),
        })?;
    }
    projected.dedup_rows();

    let table = assign_keys(spec.dimension, projected, registry)?;
    let report = key_range_report(spec.dimension, &table);
    info!(
        table = spec.table_name(),
        rows = report.rows,
        first_key = ?report.first_key,
        last_key = ?report.last_key,
        "dimension built"
    );
    Ok((table, report))
}

/// Prepend the surrogate key column, numbering rows in their current order.
pub(crate) fn assign_keys(
    dimension: Dimension,
    table: Table,
    registry: &mut KeyRegistry,
) -> Result<Table> {
    let start = registry.allocate(dimension, table.len())?;
    let mut header = vec![dimension.key_column().to_string()];
    header.extend(table.columns().iter().cloned());
    let name = table.name().to_string();

    let rows = table
        .into_rows()
        .into_iter()
        .enumerate()
        .map(|(offset, row)| {
            let mut keyed = Vec::with_capacity(row.len() + 1);
            keyed.push(Value::Int(start + offset as i64));
            keyed.extend(row);
            keyed
        })
        .collect();
    Ok(Table::from_rows(name, header, rows)?)
}

pub(crate) fn key_range_report(dimension: Dimension, table: &Table) -> DimensionReport {
    let keys = table
        .rows()
        .iter()
        .filter_map(|row| row.first().and_then(Value::as_i64));
    let (first_key, last_key) = keys.fold((None, None), |(first, _), key| {
        (first.or(Some(key)), Some(key))
    });
    DimensionReport {
        table: dimension.table_name().to_string(),
        rows: table.len() as u64,
        first_key,
        last_key,
    }
}

fn pairs(values: &[(&str, &str)]) -> Vec<(String, String)> {
    values
        .iter()
        .map(|(from, to)| (from.to_string(), to.to_string()))
        .collect()
}
