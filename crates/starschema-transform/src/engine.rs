use std::path::PathBuf;
use std::time::Instant;

use chrono::NaiveDate;
use tracing::{info, warn};

use starschema_core::{TableSet, validate_references, validate_unique_key};

use crate::clean::{CleanedTables, RuleSet};
use crate::dimension::{DimensionSpec, build_dimension, default_dimensions};
use crate::errors::Result;
use crate::fact::{FactSpec, build_fact, default_facts};
use crate::input::csv::read_table_dir;
use crate::keys::{Dimension, KeyRegistry, load_registry, save_registry};
use crate::model::{EtlOptions, RunReport};
use crate::output::atomic::write_json_atomic;
use crate::output::csv::write_table_csv;
use crate::time::{DateSource, build_time_dimension, default_date_sources};

/// Everything a transform produced, held in memory.
#[derive(Debug, Clone)]
pub struct Warehouse {
    pub cleaned: TableSet,
    pub dimensions: TableSet,
    pub facts: TableSet,
    pub report: RunReport,
    /// Counters after every allocation of the run; persist only on success.
    pub registry: KeyRegistry,
}

/// In-memory transformation from raw entity tables to a star schema.
#[derive(Debug, Clone)]
pub struct TransformEngine {
    rules: RuleSet,
    dimensions: Vec<DimensionSpec>,
    date_sources: Vec<DateSource>,
    facts: Vec<FactSpec>,
}

impl Default for TransformEngine {
    fn default() -> Self {
        Self::new(RuleSet::default())
    }
}

impl TransformEngine {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            rules,
            dimensions: default_dimensions(),
            date_sources: default_date_sources(),
            facts: default_facts(),
        }
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    /// Clean every entity and check natural-key uniqueness.
    pub fn clean(&self, raw: &TableSet) -> Result<CleanedTables> {
        let cleaned = self.rules.clean_all(raw)?;
        for rules in &self.rules.entities {
            validate_unique_key(cleaned.tables.require(&rules.entity)?, &rules.natural_key)?;
        }
        Ok(cleaned)
    }

    /// Run the full pipeline against a working copy of `registry`.
    ///
    /// The caller's registry is never touched; the advanced copy is returned
    /// in [`Warehouse::registry`].
    pub fn transform(
        &self,
        raw: &TableSet,
        registry: &KeyRegistry,
        run_id: String,
    ) -> Result<Warehouse> {
        let mut report = RunReport::new(run_id);
        let mut working = registry.clone();

        let cleaned = self.clean(raw)?;
        report.cleaned = cleaned.reports;
        for issue in cleaned.warnings {
            report.record_warning(issue);
        }
        let cleaned = cleaned.tables;

        let mut dimensions = TableSet::new();
        for spec in &self.dimensions {
            let (table, dim_report) = build_dimension(spec, &cleaned, &mut working)?;
            dimensions.insert(table);
            report.dimensions.push(dim_report);
        }
        let (time, time_report) = build_time_dimension(&self.date_sources, &cleaned, &mut working)?;
        dimensions.insert(time);
        report.dimensions.push(time_report);

        let mut facts = TableSet::new();
        for spec in &self.facts {
            let (table, fact_report) = build_fact(spec, &cleaned, &dimensions)?;
            facts.insert(table);
            report.facts.push(fact_report);
        }

        self.validate(&dimensions, &facts)?;
        report.surrogate_keys = working.surrogate_keys.clone();

        Ok(Warehouse {
            cleaned,
            dimensions,
            facts,
            report,
            registry: working,
        })
    }

    fn validate(&self, dimensions: &TableSet, facts: &TableSet) -> Result<()> {
        for dimension in Dimension::ALL {
            let table = dimensions.require(dimension.table_name())?;
            validate_unique_key(table, &[dimension.key_column()])?;
            validate_unique_key(table, &[dimension.natural_key()])?;
        }
        for spec in &self.facts {
            let fact = facts.require(&spec.name)?;
            for resolution in &spec.keys {
                let key = resolution.dimension.key_column();
                let target = dimensions.require(resolution.dimension.table_name())?;
                validate_references(fact, key, target, key)?;
            }
        }
        Ok(())
    }
}

/// Outcome of a directory-level run.
#[derive(Debug, Clone)]
pub struct EtlResult {
    pub report: RunReport,
    pub registry: KeyRegistry,
    pub written: Vec<PathBuf>,
}

/// Outcome of a clean-only run.
#[derive(Debug, Clone)]
pub struct CleanResult {
    pub report: RunReport,
    pub written: Vec<PathBuf>,
}

/// Directory adapter: raw CSVs in, dimension and fact CSVs out.
#[derive(Debug, Clone)]
pub struct EtlEngine {
    options: EtlOptions,
}

impl EtlEngine {
    pub fn new(options: EtlOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &EtlOptions {
        &self.options
    }

    /// The rule set this run applies: the override file if configured,
    /// otherwise the built-in catalog.
    pub fn resolve_rules(&self) -> Result<RuleSet> {
        match &self.options.rules_path {
            Some(path) => {
                info!(path = %path.display(), "loading rule set override");
                RuleSet::from_json_file(path)
            }
            None => Ok(RuleSet::default()),
        }
    }

    /// Transform, write every table and the run report, then persist the
    /// registry stamped with `run_date`.
    ///
    /// `run_id` is recorded in the report and every log event of the run.
    pub fn run(&self, run_id: &str, run_date: NaiveDate) -> Result<EtlResult> {
        let start = Instant::now();
        info!(
            event = "etl_started",
            run_id = %run_id,
            input_dir = %self.options.input_dir.display(),
            "etl run started"
        );

        let engine = TransformEngine::new(self.resolve_rules()?);
        let (registry, registry_issue) = load_registry(&self.options.registry_path)?;
        let raw = read_table_dir(&self.options.input_dir)?;
        let mut warehouse = engine.transform(&raw, &registry, run_id.to_string())?;
        if let Some(issue) = registry_issue {
            warehouse.report.record_warning(issue);
        }

        std::fs::create_dir_all(&self.options.out_dir)?;
        let mut written = Vec::new();
        for table in warehouse.dimensions.iter().chain(warehouse.facts.iter()) {
            let path = self.options.out_dir.join(format!("{}.csv", table.name()));
            let bytes = write_table_csv(&path, table)?;
            info!(
                table = %table.name(),
                rows = table.len(),
                bytes,
                path = %path.display(),
                "table written"
            );
            written.push(path);
        }

        let report_path = self.options.out_dir.join("run_report.json");
        write_json_atomic(&report_path, &warehouse.report)?;
        save_registry(&self.options.registry_path, &warehouse.registry, run_date)?;

        if !warehouse.report.warnings.is_empty() {
            warn!(
                run_id = %run_id,
                warnings = warehouse.report.warnings.len(),
                "etl run finished with warnings"
            );
        }
        info!(
            event = "etl_finished",
            run_id = %run_id,
            tables = written.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "etl run finished"
        );

        let mut registry = warehouse.registry;
        registry.last_run_date = Some(run_date);
        Ok(EtlResult {
            report: warehouse.report,
            registry,
            written,
        })
    }

    /// Clean the raw tables and write them, leaving the registry untouched.
    pub fn clean(&self, run_id: &str) -> Result<CleanResult> {
        let engine = TransformEngine::new(self.resolve_rules()?);
        let raw = read_table_dir(&self.options.input_dir)?;
        let cleaned = engine.clean(&raw)?;

        let mut report = RunReport::new(run_id.to_string());
        report.cleaned = cleaned.reports;
        for issue in cleaned.warnings {
            report.record_warning(issue);
        }

        std::fs::create_dir_all(&self.options.out_dir)?;
        let mut written = Vec::new();
        for table in cleaned.tables.iter() {
            let path = self.options.out_dir.join(format!("{}.csv", table.name()));
            write_table_csv(&path, table)?;
            written.push(path);
        }
        write_json_atomic(&self.options.out_dir.join("clean_report.json"), &report)?;
        info!(
            event = "clean_finished",
            run_id = %run_id,
            tables = written.len(),
            "clean run finished"
        );

        Ok(CleanResult { report, written })
    }
}
