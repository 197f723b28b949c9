//! Calendar dimension derived from every date observed in the cleaned tables.

use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate};
use tracing::{info, warn};

use starschema_core::{Table, TableSet, Value, columns, sentinel_date};

use crate::dimension::{assign_keys, key_range_report};
use crate::errors::Result;
use crate::keys::{Dimension, KeyRegistry};
use crate::model::DimensionReport;

/// Date-bearing columns of one entity.
#[derive(Debug, Clone, PartialEq)]
pub struct DateSource {
    pub entity: String,
    pub columns: Vec<String>,
}

impl DateSource {
    pub fn new(entity: &str, columns: &[&str]) -> Self {
        Self {
            entity: entity.to_string(),
            columns: columns.iter().map(|column| column.to_string()).collect(),
        }
    }
}

pub const TIME_COLUMNS: [&str; 9] = [
    "Date",
    "Year",
    "Quarter",
    "Month",
    "Week",
    "Day",
    "Weekday",
    "FiscalYear",
    "FiscalQuarter",
];

pub fn default_date_sources() -> Vec<DateSource> {
    vec![
        DateSource::new("employee", &["hiredate"]),
        DateSource::new("inventory", &["lastreorderdate", "expecteddeliverydate"]),
        DateSource::new(
            "purchaseorder",
            &["orderdate", "expecteddeliverydate", "actualdeliverydate"],
        ),
        DateSource::new("payment", &["paymentdate"]),
        DateSource::new("returns", &["returndate"]),
        DateSource::new("salesorder", &["orderdate", "actualdeliverydate"]),
        DateSource::new(
            "shipment",
            &["shipmentdate", "estimatedarrivaldate", "actualarrivaldate"],
        ),
        DateSource::new("supplier", &["contractstartdate", "contractenddate"]),
    ]
}

/// Inclusive span from the earliest non-sentinel date to the latest date.
///
/// `None` when no date other than the sentinel was observed.
pub fn observed_range(sources: &[DateSource], cleaned: &TableSet) -> Result<Option<(NaiveDate, NaiveDate)>> {
    let sentinel = sentinel_date();
    let mut range: Option<(NaiveDate, NaiveDate)> = None;

    for source in sources {
        let table = cleaned.require(&source.entity)?;
        for column in &source.columns {
            if !table.has_column(column) {
                warn!(entity = %source.entity, column = %column, "date column not found, skipped");
                continue;
            }
            for value in table.column_values(column)? {
                let date = value.to_date().as_date().unwrap_or(sentinel);
                if date == sentinel {
                    continue;
                }
                range = Some(match range {
                    Some((min, max)) => (min.min(date), max.max(date)),
                    None => (date, date),
                });
            }
        }
    }

    Ok(range)
}

/// Build `time_dim`: the sentinel day plus one row per day of the observed
/// range, rows and keys in ascending date order.
pub fn build_time_dimension(
    sources: &[DateSource],
    cleaned: &TableSet,
    registry: &mut KeyRegistry,
) -> Result<(Table, DimensionReport)> {
    let mut days = BTreeSet::from([sentinel_date()]);
    if let Some((first, last)) = observed_range(sources, cleaned)? {
        days.extend(first.iter_days().take_while(|date| *date <= last));
    }

    let mut calendar = Table::new(Dimension::Time.table_name(), columns(&TIME_COLUMNS));
    for date in days {
        calendar.push_row(calendar_row(date))?;
    }

    let table = assign_keys(Dimension::Time, calendar, registry)?;
    let report = key_range_report(Dimension::Time, &table);
    info!(
        table = Dimension::Time.table_name(),
        rows = report.rows,
        first_key = ?report.first_key,
        last_key = ?report.last_key,
        "time dimension built"
    );
    Ok((table, report))
}

fn calendar_row(date: NaiveDate) -> Vec<Value> {
    let quarter = format!("{}Q{}", date.year(), date.month0() / 3 + 1);
    vec![
        Value::Date(date),
        Value::Int(i64::from(date.year())),
        Value::text(quarter.clone()),
        Value::text(date.format("%B").to_string()),
        Value::Int(i64::from(date.iso_week().week())),
        Value::Int(i64::from(date.day())),
        Value::text(date.format("%A").to_string()),
        Value::Int(i64::from(date.year())),
        Value::text(quarter),
    ]
}
