use std::fs::{OpenOptions, create_dir_all};
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, Utc};
use serde::Serialize;

use starschema_transform::{EtlOptions, RuleSet};

use super::{RunsError, RunsResult};

/// Metadata captured at run start.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub command: String,
    pub run_dir: PathBuf,
    pub options: EtlOptions,
}

/// JSON config written to each run directory.
#[derive(Debug, Serialize)]
pub struct RunConfig {
    pub run_id: String,
    pub started_at: String,
    pub command: String,
    pub options: EtlOptions,
    pub git: GitInfo,
}

/// Git metadata for reproducibility.
#[derive(Debug, Serialize)]
pub struct GitInfo {
    pub commit: Option<String>,
    pub dirty: Option<bool>,
}

/// Paths for run artifacts.
#[derive(Debug, Clone)]
pub struct RunPaths {
    pub root: PathBuf,
    pub logs_path: PathBuf,
    pub rules_path: PathBuf,
}

/// Create `<run_dir>/<timestamp>__run_<id>/` with its `config.json`.
pub fn start_run(ctx: &RunContext) -> RunsResult<RunPaths> {
    let timestamp = ctx.started_at.format("%Y-%m-%dT%H-%M-%SZ").to_string();
    let root = ctx.run_dir.join(format!("{timestamp}__run_{}", ctx.run_id));
    create_dir_all(&root)?;

    let config = RunConfig {
        run_id: ctx.run_id.clone(),
        started_at: ctx.started_at.to_rfc3339(),
        command: ctx.command.clone(),
        options: ctx.options.clone(),
        git: collect_git_info(),
    };
    write_json(&root.join("config.json"), &config)?;

    let logs_path = root.join("logs.ndjson");
    OpenOptions::new().create(true).append(true).open(&logs_path)?;

    Ok(RunPaths {
        rules_path: root.join("resolved_rules.json"),
        logs_path,
        root,
    })
}

pub fn write_resolved_rules(paths: &RunPaths, rules: &RuleSet) -> RunsResult<()> {
    write_json(&paths.rules_path, rules)
}

pub fn collect_git_info() -> GitInfo {
    let commit = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .output()
        .ok()
        .and_then(|output| {
            if output.status.success() {
                Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
            } else {
                None
            }
        })
        .filter(|value| !value.is_empty());

    let dirty = Command::new("git")
        .args(["status", "--porcelain"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| !output.stdout.is_empty());

    GitInfo { commit, dirty }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> RunsResult<()> {
    let file = OpenOptions::new()
        .create(true)
        .truncate(true)
        .write(true)
        .open(path)?;
    serde_json::to_writer_pretty(file, value).map_err(RunsError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn start_run_lays_out_run_directory() {
        let mut run_dir = std::env::temp_dir();
        run_dir.push(format!("starschema_runs_{}", uuid::Uuid::new_v4()));
        let ctx = RunContext {
            run_id: "abc".to_string(),
            started_at: Utc::now(),
            command: "run".to_string(),
            run_dir: run_dir.clone(),
            options: EtlOptions::default(),
        };

        let paths = start_run(&ctx).expect("start run");
        let name = paths.root.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.ends_with("__run_abc"), "{name}");
        assert!(paths.logs_path.exists());

        let config: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(paths.root.join("config.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(config["command"], "run");
        assert_eq!(config["options"]["input_dir"], "data/raw");

        write_resolved_rules(&paths, &RuleSet::default()).expect("write rules");
        assert!(paths.rules_path.exists());
    }
}
