mod config;
mod runs;

use std::path::PathBuf;
use std::time::Instant;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use config::{ConfigError, EtlConfig, PathsConfig};
use runs::{RunContext, init_logging, start_run, write_resolved_rules};
use starschema_transform::{EtlEngine, EtlOptions, KeyRegistry, TransformError, load_registry};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
enum CliError {
    #[error("transform error: {0}")]
    Transform(#[from] TransformError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("run artifact error: {0}")]
    Runs(#[from] runs::RunsError),
    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "starschema", version, about = "Star-schema ETL for operational extracts")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Clean, model and write dimension and fact tables.
    Run(RunArgs),
    /// Write cleaned entity tables only.
    Clean(PathArgs),
    /// Print the current surrogate key counters.
    Registry(PathArgs),
    /// Print the JSON Schema of the key registry record.
    RegistrySchema,
}

#[derive(Args, Debug, Clone)]
struct PathArgs {
    /// TOML config with a [paths] section.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Directory of raw entity CSVs.
    #[arg(long)]
    input_dir: Option<PathBuf>,
    /// Directory for output tables.
    #[arg(long)]
    out_dir: Option<PathBuf>,
    /// Surrogate key registry file.
    #[arg(long)]
    registry: Option<PathBuf>,
    /// JSON rule set replacing the built-in cleaning rules.
    #[arg(long)]
    rules: Option<PathBuf>,
    /// Output directory for run artifacts.
    #[arg(long)]
    run_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    paths: PathArgs,
    /// Date recorded in the registry, defaults to today (UTC).
    #[arg(long, value_name = "YYYY-MM-DD")]
    run_date: Option<NaiveDate>,
}

impl PathArgs {
    fn resolve(&self) -> Result<(EtlOptions, PathBuf), CliError> {
        let config = match &self.config {
            Some(path) => EtlConfig::load(path)?,
            None => EtlConfig::default(),
        };
        let overrides = PathsConfig {
            input_dir: self.input_dir.clone(),
            out_dir: self.out_dir.clone(),
            registry_path: self.registry.clone(),
            rules_path: self.rules.clone(),
            run_dir: self.run_dir.clone(),
        };
        Ok(config.resolve(&overrides))
    }
}

fn main() -> Result<(), CliError> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run(args) => run_etl(args),
        Command::Clean(args) => run_clean(args),
        Command::Registry(args) => show_registry(args),
        Command::RegistrySchema => {
            let schema = schemars::schema_for!(KeyRegistry);
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(())
        }
    }
}

fn prepare_run(
    command: &str,
    options: &EtlOptions,
    run_dir: PathBuf,
) -> Result<(EtlEngine, String), CliError> {
    let ctx = RunContext {
        run_id: Uuid::new_v4().to_string(),
        started_at: chrono::Utc::now(),
        command: command.to_string(),
        run_dir,
        options: options.clone(),
    };
    let paths = start_run(&ctx)?;
    init_logging(Some(&paths.logs_path))?;
    tracing::info!(
        event = "run_started",
        run_id = %ctx.run_id,
        command,
        run_root = %paths.root.display()
    );

    let engine = EtlEngine::new(options.clone());
    let rules = engine.resolve_rules()?;
    write_resolved_rules(&paths, &rules)?;
    tracing::info!(event = "rules_written", path = %paths.rules_path.display());
    Ok((engine, ctx.run_id))
}

fn run_etl(args: RunArgs) -> Result<(), CliError> {
    let (options, run_dir) = args.paths.resolve()?;
    let (engine, run_id) = prepare_run("run", &options, run_dir)?;
    let timer = Instant::now();

    let run_date = args
        .run_date
        .unwrap_or_else(|| chrono::Utc::now().date_naive());
    let result = engine.run(&run_id, run_date)?;

    for fact in &result.report.facts {
        tracing::info!(
            event = "fact_summary",
            table = %fact.table,
            rows = fact.rows,
            dropped = fact.dropped_total()
        );
    }
    tracing::info!(
        event = "run_finished",
        status = "success",
        tables = result.written.len(),
        warnings = result.report.warnings.len(),
        duration_ms = timer.elapsed().as_millis() as u64
    );
    Ok(())
}

fn run_clean(args: PathArgs) -> Result<(), CliError> {
    let (options, run_dir) = args.resolve()?;
    let (engine, run_id) = prepare_run("clean", &options, run_dir)?;
    let timer = Instant::now();

    let result = engine.clean(&run_id)?;
    tracing::info!(
        event = "run_finished",
        status = "success",
        tables = result.written.len(),
        duration_ms = timer.elapsed().as_millis() as u64
    );
    Ok(())
}

fn show_registry(args: PathArgs) -> Result<(), CliError> {
    let (options, _) = args.resolve()?;
    init_logging(None)?;
    let (registry, _) = load_registry(&options.registry_path)?;
    println!("{}", serde_json::to_string_pretty(&registry)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_with_overrides() {
        let cli = Cli::try_parse_from([
            "starschema",
            "run",
            "--input-dir",
            "extracts",
            "--registry",
            "state/keys.json",
            "--run-date",
            "2024-07-01",
        ])
        .unwrap();
        let Command::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert_eq!(args.run_date, NaiveDate::from_ymd_opt(2024, 7, 1));

        let (options, run_dir) = args.paths.resolve().unwrap();
        assert_eq!(options.input_dir, PathBuf::from("extracts"));
        assert_eq!(options.registry_path, PathBuf::from("state/keys.json"));
        assert_eq!(options.out_dir, PathBuf::from("data/transformed"));
        assert_eq!(run_dir, PathBuf::from("runs"));
    }

    #[test]
    fn parses_registry_schema_subcommand() {
        let cli = Cli::try_parse_from(["starschema", "registry-schema"]).unwrap();
        assert!(matches!(cli.command, Command::RegistrySchema));
    }
}
