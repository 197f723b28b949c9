use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use starschema_transform::EtlOptions;

/// Optional `starschema.toml` contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EtlConfig {
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub input_dir: Option<PathBuf>,
    pub out_dir: Option<PathBuf>,
    pub registry_path: Option<PathBuf>,
    pub rules_path: Option<PathBuf>,
    pub run_dir: Option<PathBuf>,
}

impl EtlConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Apply command-line overrides on top of the file values and defaults.
    pub fn resolve(&self, overrides: &PathsConfig) -> (EtlOptions, PathBuf) {
        let defaults = EtlOptions::default();
        let pick = |flag: &Option<PathBuf>, file: &Option<PathBuf>| {
            flag.clone().or_else(|| file.clone())
        };

        let options = EtlOptions {
            input_dir: pick(&overrides.input_dir, &self.paths.input_dir)
                .unwrap_or(defaults.input_dir),
            out_dir: pick(&overrides.out_dir, &self.paths.out_dir).unwrap_or(defaults.out_dir),
            registry_path: pick(&overrides.registry_path, &self.paths.registry_path)
                .unwrap_or(defaults.registry_path),
            rules_path: pick(&overrides.rules_path, &self.paths.rules_path),
        };
        let run_dir = pick(&overrides.run_dir, &self.paths.run_dir)
            .unwrap_or_else(|| PathBuf::from("runs"));
        (options, run_dir)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("toml parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_file_values_and_defaults_fill_the_rest() {
        let config: EtlConfig = toml::from_str(
            r#"
            [paths]
            input_dir = "extracts/2024-07"
            registry_path = "state/keys.json"
            "#,
        )
        .unwrap();
        let overrides = PathsConfig {
            registry_path: Some(PathBuf::from("override.json")),
            ..PathsConfig::default()
        };

        let (options, run_dir) = config.resolve(&overrides);
        assert_eq!(options.input_dir, PathBuf::from("extracts/2024-07"));
        assert_eq!(options.registry_path, PathBuf::from("override.json"));
        assert_eq!(options.out_dir, PathBuf::from("data/transformed"));
        assert_eq!(options.rules_path, None);
        assert_eq!(run_dir, PathBuf::from("runs"));
    }

    #[test]
    fn empty_file_is_a_valid_config() {
        let config: EtlConfig = toml::from_str("").unwrap();
        assert_eq!(config, EtlConfig::default());
    }
}
