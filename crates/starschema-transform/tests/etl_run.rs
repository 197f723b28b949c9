use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use starschema_transform::{EtlEngine, EtlOptions, KeyRegistry, RunReport, load_registry};

fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/raw")
}

fn temp_dir(label: &str) -> PathBuf {
    let mut dir = std::env::temp_dir();
    dir.push(format!("starschema_etl_{label}_{}", uuid::Uuid::new_v4()));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn copy_fixtures(target: &Path, skip: &[&str]) {
    fs::create_dir_all(target).expect("create input dir");
    for entry in fs::read_dir(fixture_dir()).expect("read fixtures") {
        let path = entry.expect("fixture entry").path();
        let name = path.file_name().expect("file name").to_string_lossy().to_string();
        if skip.iter().any(|skipped| name == format!("{skipped}.csv")) {
            continue;
        }
        fs::copy(&path, target.join(&name)).expect("copy fixture");
    }
}

fn options(root: &Path) -> EtlOptions {
    EtlOptions {
        input_dir: root.join("raw"),
        out_dir: root.join("transformed"),
        registry_path: root.join("metadata/metadata.json"),
        rules_path: None,
    }
}

fn run_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 7, 1).unwrap()
}

fn first_column(path: &Path) -> Vec<String> {
    let mut reader = csv::Reader::from_path(path).expect("open csv");
    reader
        .records()
        .map(|record| record.expect("record")[0].to_string())
        .collect()
}

#[test]
fn run_writes_tables_report_and_registry() {
    let root = temp_dir("full");
    copy_fixtures(&root.join("raw"), &[]);

    let result = EtlEngine::new(options(&root)).run("test-run", run_date()).expect("etl run");
    let out = root.join("transformed");

    for table in [
        "product_dim",
        "supplier_dim",
        "customer_dim",
        "warehouse_dim",
        "time_dim",
        "sales_fct",
        "purchase_fct",
        "inventory_fct",
        "return_fct",
    ] {
        assert!(out.join(format!("{table}.csv")).exists(), "{table}.csv missing");
    }
    assert_eq!(result.written.len(), 9);

    let header = fs::read_to_string(out.join("sales_fct.csv")).expect("read sales_fct");
    assert!(header.starts_with(
        "TimeKey,CustomerKey,ProductKey,Quantity,UnitPrice,Discount,Tax,TotalAmount"
    ));
    let time_dates: Vec<String> = {
        let mut reader = csv::Reader::from_path(out.join("time_dim.csv")).expect("time_dim");
        reader
            .records()
            .take(2)
            .map(|record| record.expect("record")[1].to_string())
            .collect()
    };
    assert_eq!(time_dates, vec!["1900-01-01", "2023-06-01"]);

    let report: RunReport = serde_json::from_str(
        &fs::read_to_string(out.join("run_report.json")).expect("read report"),
    )
    .expect("parse report");
    assert_eq!(report.run_id, "test-run");
    assert_eq!(result.report.run_id, "test-run");
    assert_eq!(report.cleaned.len(), 19);
    assert_eq!(report.warnings_by_code.get("registry_missing"), Some(&1));
    assert_eq!(report.fact("sales_fct").map(|fact| fact.rows), Some(3));

    let (registry, issue) = load_registry(&root.join("metadata/metadata.json")).expect("registry");
    assert!(issue.is_none());
    assert_eq!(registry.last_run_date, Some(run_date()));
    assert_eq!(registry, result.registry);
    assert_eq!(registry.surrogate_keys.get("ProductKey"), Some(&3));
}

#[test]
fn registry_with_existing_counters_is_continued() {
    let root = temp_dir("continue");
    copy_fixtures(&root.join("raw"), &[]);
    fs::create_dir_all(root.join("metadata")).expect("create metadata dir");
    fs::write(
        root.join("metadata/metadata.json"),
        br#"{"last_etl_run": "2024-06-01", "surrogate_keys": {"ProductKey": 5, "SupplierKey": 0, "CustomerKey": 0, "WarehouseKey": 0, "TimeKey": 0}}"#,
    )
    .expect("write registry");

    EtlEngine::new(options(&root)).run("test-run", run_date()).expect("etl run");

    let product_keys = first_column(&root.join("transformed/product_dim.csv"));
    assert_eq!(product_keys, vec!["6", "7", "8"]);
    let (registry, _) = load_registry(&root.join("metadata/metadata.json")).expect("registry");
    assert_eq!(registry.surrogate_keys.get("ProductKey"), Some(&8));
}

#[test]
fn consecutive_runs_never_reuse_keys() {
    let root = temp_dir("twice");
    copy_fixtures(&root.join("raw"), &[]);
    let engine = EtlEngine::new(options(&root));

    let first = engine.run("test-run", run_date()).expect("first run");
    let first_keys = first_column(&root.join("transformed/customer_dim.csv"));
    let second = engine.run("test-run", run_date()).expect("second run");
    let second_keys = first_column(&root.join("transformed/customer_dim.csv"));

    assert_eq!(first_keys, vec!["1", "2", "3"]);
    assert_eq!(second_keys, vec!["4", "5", "6"]);
    let time_first = first.registry.surrogate_keys["TimeKey"];
    assert_eq!(second.registry.surrogate_keys["TimeKey"], time_first * 2);
}

#[test]
fn missing_table_aborts_before_any_write() {
    let root = temp_dir("missing");
    copy_fixtures(&root.join("raw"), &["returndetail"]);

    let err = EtlEngine::new(options(&root)).run("test-run", run_date()).unwrap_err();
    assert!(err.to_string().contains("returndetail"), "{err}");
    assert!(!root.join("transformed").exists());
    assert!(!root.join("metadata/metadata.json").exists());
}

#[test]
fn rules_override_is_applied() {
    let root = temp_dir("rules");
    copy_fixtures(&root.join("raw"), &[]);

    let mut rules = starschema_transform::RuleSet::default();
    let customer = rules
        .entities
        .iter_mut()
        .find(|rules| rules.entity == "customer")
        .expect("customer rules");
    customer.ops.push(starschema_transform::CleanOp::drop_columns(&["accountstatus"]));
    let rules_path = root.join("rules.json");
    fs::write(&rules_path, serde_json::to_vec_pretty(&rules).unwrap()).expect("write rules");

    let mut options = options(&root);
    options.rules_path = Some(rules_path);
    let engine = EtlEngine::new(options);
    assert_eq!(engine.resolve_rules().expect("rules"), rules);

    let result = engine.clean("test-clean").expect("clean run");
    assert_eq!(result.written.len(), 19);
    assert_eq!(result.report.run_id, "test-clean");
    let customer = fs::read_to_string(root.join("transformed/customer.csv")).expect("customer");
    assert!(!customer.lines().next().unwrap_or_default().contains("accountstatus"));
    assert!(!root.join("metadata/metadata.json").exists());
}

#[test]
fn malformed_registry_is_replaced_after_run() {
    let root = temp_dir("malformed");
    copy_fixtures(&root.join("raw"), &[]);
    fs::create_dir_all(root.join("metadata")).expect("create metadata dir");
    fs::write(root.join("metadata/metadata.json"), b"[1, 2").expect("write registry");

    let result = EtlEngine::new(options(&root)).run("test-run", run_date()).expect("etl run");
    assert_eq!(result.report.warnings_by_code.get("registry_malformed"), Some(&1));

    let (registry, issue) = load_registry(&root.join("metadata/metadata.json")).expect("registry");
    assert!(issue.is_none());
    assert_ne!(registry, KeyRegistry::default());
}
