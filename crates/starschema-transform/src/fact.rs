//! Fact builder.
//!
//! Facts join a header entity to its detail lines, optionally require the
//! referenced entities to exist, then resolve every natural key against its
//! dimension. Rows that fail a resolution are dropped and counted.

use tracing::{info, warn};

use starschema_core::{Table, TableSet, inner_join, inner_lookup};

use crate::errors::Result;
use crate::keys::Dimension;
use crate::model::FactReport;

/// Header/detail join; header rows fan out to one row per line.
#[derive(Debug, Clone, PartialEq)]
pub struct DetailJoin {
    pub entity: String,
    pub on: Vec<String>,
}

/// Rows survive only when `column` matches `key` in the cleaned `entity`.
#[derive(Debug, Clone, PartialEq)]
pub struct Existence {
    pub entity: String,
    pub column: String,
    pub key: String,
}

/// Natural key column resolved to the dimension's surrogate key.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyResolution {
    pub dimension: Dimension,
    pub column: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FactSpec {
    pub name: String,
    pub header: String,
    /// Header columns superseded by the detail lines.
    pub drop_header_columns: Vec<String>,
    pub detail: Option<DetailJoin>,
    pub require: Vec<Existence>,
    /// Resolved in order; the key columns lead the output schema.
    pub keys: Vec<KeyResolution>,
    /// `(source column, target column)` measures after the keys.
    pub measures: Vec<(String, String)>,
}

impl FactSpec {
    pub fn schema(&self) -> Vec<String> {
        self.keys
            .iter()
            .map(|key| key.dimension.key_column().to_string())
            .chain(self.measures.iter().map(|(_, target)| target.clone()))
            .collect()
    }
}

fn key(dimension: Dimension, column: &str) -> KeyResolution {
    KeyResolution {
        dimension,
        column: column.to_string(),
    }
}

fn exists(entity: &str, column: &str) -> Existence {
    Existence {
        entity: entity.to_string(),
        column: column.to_string(),
        key: column.to_string(),
    }
}

fn detail(entity: &str, on: &str) -> Option<DetailJoin> {
    Some(DetailJoin {
        entity: entity.to_string(),
        on: vec![on.to_string()],
    })
}

fn measures(values: &[(&str, &str)]) -> Vec<(String, String)> {
    values
        .iter()
        .map(|(source, target)| (source.to_string(), target.to_string()))
        .collect()
}

const ORDER_MEASURES: [(&str, &str); 5] = [
    ("quantity", "Quantity"),
    ("unitprice", "UnitPrice"),
    ("discount", "Discount"),
    ("tax", "Tax"),
    ("totalamount", "TotalAmount"),
];

/// Fact tables in build order.
pub fn default_facts() -> Vec<FactSpec> {
    vec![
        FactSpec {
            name: "sales_fct".to_string(),
            header: "salesorder".to_string(),
            drop_header_columns: vec!["totalamount".to_string()],
            detail: detail("salesorderdetail", "orderid"),
            require: Vec::new(),
            keys: vec![
                key(Dimension::Time, "orderdate"),
                key(Dimension::Customer, "customerid"),
                key(Dimension::Product, "productid"),
            ],
            measures: measures(&ORDER_MEASURES),
        },
        FactSpec {
            name: "purchase_fct".to_string(),
            header: "purchaseorder".to_string(),
            drop_header_columns: vec!["totalamount".to_string()],
            detail: detail("purchaseorderdetail", "orderid"),
            require: Vec::new(),
            keys: vec![
                key(Dimension::Time, "orderdate"),
                key(Dimension::Supplier, "supplierid"),
                key(Dimension::Product, "productid"),
            ],
            measures: measures(&ORDER_MEASURES),
        },
        FactSpec {
            name: "inventory_fct".to_string(),
            header: "inventory".to_string(),
            drop_header_columns: Vec::new(),
            detail: None,
            require: vec![exists("product", "productid"), exists("warehouse", "warehouseid")],
            keys: vec![
                key(Dimension::Product, "productid"),
                key(Dimension::Warehouse, "warehouseid"),
            ],
            measures: measures(&[
                ("quantity", "Quantity"),
                ("minimumstocklevel", "MinimumStockLevel"),
                ("maximumstocklevel", "MaximumStockLevel"),
                ("reorderpoint", "ReorderPoint"),
            ]),
        },
        FactSpec {
            name: "return_fct".to_string(),
            header: "returns".to_string(),
            drop_header_columns: Vec::new(),
            detail: detail("returndetail", "returnid"),
            require: vec![exists("customer", "customerid"), exists("product", "productid")],
            keys: vec![
                key(Dimension::Time, "returndate"),
                key(Dimension::Customer, "customerid"),
                key(Dimension::Product, "productid"),
            ],
            measures: measures(&[
                ("quantity", "Quantity"),
                ("totalamount", "TotalAmount"),
                ("refundamount", "RefundAmount"),
            ]),
        },
    ]
}

/// Assemble one fact table from cleaned entities and built dimensions.
pub fn build_fact(
    spec: &FactSpec,
    cleaned: &TableSet,
    dimensions: &TableSet,
) -> Result<(Table, FactReport)> {
    let mut report = FactReport::new(&spec.name);
    let mut rows = cleaned.require(&spec.header)?.clone();
    rows.drop_columns(&spec.drop_header_columns);

    if let Some(join) = &spec.detail {
        let lines = cleaned.require(&join.entity)?;
        let outcome = inner_join(&rows, lines, &join.on)?;
        report.unmatched_lines = lines.len().saturating_sub(outcome.table.len()) as u64;
        report.unmatched_headers = outcome.dropped as u64;
        if report.unmatched_lines > 0 {
            warn!(
                fact = %spec.name,
                detail = %join.entity,
                dropped = report.unmatched_lines,
                "detail lines without a header dropped"
            );
        }
        if report.unmatched_headers > 0 {
            warn!(
                fact = %spec.name,
                header = %spec.header,
                dropped = report.unmatched_headers,
                "headers without detail lines dropped"
            );
        }
        rows = outcome.table;
    }

    for required in &spec.require {
        let target = cleaned.require(&required.entity)?;
        let outcome = inner_lookup(&rows, &required.column, target, &required.key, &[])?;
        report.record_dropped(&required.entity, outcome.dropped);
        rows = outcome.table;
    }

    for resolution in &spec.keys {
        let dimension = dimensions.require(resolution.dimension.table_name())?;
        let key_column = resolution.dimension.key_column();
        let outcome = inner_lookup(
            &rows,
            &resolution.column,
            dimension,
            resolution.dimension.natural_key(),
            &[(key_column, key_column)],
        )?;
        report.record_dropped(resolution.dimension.table_name(), outcome.dropped);
        rows = outcome.table;
    }

    for (source, dropped) in &report.dropped_by {
        warn!(fact = %spec.name, source = %source, dropped, "rows without a match dropped");
    }

    let projection: Vec<(String, String)> = spec
        .keys
        .iter()
        .map(|resolution| {
            let column = resolution.dimension.key_column().to_string();
            (column.clone(), column)
        })
        .chain(spec.measures.iter().cloned())
        .collect();
    let table = rows.select(spec.name.clone(), &projection)?;
    report.rows = table.len() as u64;

    info!(
        fact = %spec.name,
        rows = report.rows,
        dropped = report.dropped_total(),
        "fact built"
    );
    Ok((table, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use starschema_core::{Value, columns};

    fn spec() -> FactSpec {
        FactSpec {
            name: "inventory_fct".to_string(),
            header: "inventory".to_string(),
            drop_header_columns: Vec::new(),
            detail: None,
            require: vec![exists("warehouse", "warehouseid")],
            keys: vec![
                key(Dimension::Product, "productid"),
                key(Dimension::Warehouse, "warehouseid"),
            ],
            measures: measures(&[("quantity", "Quantity")]),
        }
    }

    fn cleaned() -> TableSet {
        let inventory = Table::from_rows(
            "inventory",
            columns(&["productid", "warehouseid", "quantity"]),
            vec![
                vec![Value::Int(1), Value::Int(7), Value::Int(3)],
                vec![Value::Int(2), Value::Int(7), Value::Int(4)],
                vec![Value::Int(1), Value::Int(9), Value::Int(5)],
            ],
        )
        .unwrap();
        let warehouse = Table::from_rows(
            "warehouse",
            columns(&["warehouseid"]),
            vec![vec![Value::Int(7)], vec![Value::Int(9)]],
        )
        .unwrap();
        vec![inventory, warehouse].into_iter().collect()
    }

    fn dimensions() -> TableSet {
        let product = Table::from_rows(
            "product_dim",
            columns(&["ProductKey", "ProductID"]),
            vec![vec![Value::Int(11), Value::Int(1)]],
        )
        .unwrap();
        let warehouse = Table::from_rows(
            "warehouse_dim",
            columns(&["WarehouseKey", "WarehouseID"]),
            vec![vec![Value::Int(21), Value::Int(7)]],
        )
        .unwrap();
        vec![product, warehouse].into_iter().collect()
    }

    #[test]
    fn unresolved_rows_are_dropped_and_counted_per_dimension() {
        let (table, report) = build_fact(&spec(), &cleaned(), &dimensions()).unwrap();
        assert_eq!(table.columns(), &spec().schema()[..]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0], vec![Value::Int(11), Value::Int(21), Value::Int(3)]);
        assert_eq!(report.dropped_by.get("product_dim"), Some(&1));
        assert_eq!(report.dropped_by.get("warehouse_dim"), Some(&1));
        assert_eq!(report.dropped_total(), 2);
    }

    #[test]
    fn header_and_detail_losses_are_counted_separately() {
        let orders = Table::from_rows(
            "salesorder",
            columns(&["orderid", "productid"]),
            vec![
                vec![Value::Int(100), Value::Int(1)],
                vec![Value::Int(101), Value::Int(1)],
            ],
        )
        .unwrap();
        let lines = Table::from_rows(
            "salesorderdetail",
            columns(&["orderid", "quantity"]),
            vec![
                vec![Value::Int(100), Value::Int(2)],
                vec![Value::Int(100), Value::Int(5)],
                vec![Value::Int(999), Value::Int(1)],
            ],
        )
        .unwrap();
        let cleaned: TableSet = vec![orders, lines].into_iter().collect();
        let spec = FactSpec {
            name: "sales_fct".to_string(),
            header: "salesorder".to_string(),
            drop_header_columns: Vec::new(),
            detail: detail("salesorderdetail", "orderid"),
            require: Vec::new(),
            keys: vec![key(Dimension::Product, "productid")],
            measures: measures(&[("quantity", "Quantity")]),
        };

        let (table, report) = build_fact(&spec, &cleaned, &dimensions()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(report.unmatched_lines, 1);
        assert_eq!(report.unmatched_headers, 1);
        assert_eq!(report.dropped_total(), 1);
    }

    #[test]
    fn canonical_fact_schemas() {
        let facts = default_facts();
        assert_eq!(
            facts[0].schema(),
            columns(&[
                "TimeKey",
                "CustomerKey",
                "ProductKey",
                "Quantity",
                "UnitPrice",
                "Discount",
                "Tax",
                "TotalAmount"
            ])
        );
        assert_eq!(
            facts[3].schema(),
            columns(&[
                "TimeKey",
                "CustomerKey",
                "ProductKey",
                "Quantity",
                "TotalAmount",
                "RefundAmount"
            ])
        );
    }
}
