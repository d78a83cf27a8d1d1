//! Configuration file for `sparql-analyze`.

use std::fs;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::analyzers::{AnalyzerError, MultiAnalyzer, ANALYZER_NAMES};

/// When to emit ANSI colors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ColorChoice {
    /// Color when stdout is a terminal.
    #[default]
    Auto,
    /// Always color.
    Always,
    /// Never color.
    Never,
}

/// Output settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputSettings {
    /// Print queries indented, one triple per line.
    pub pretty: bool,
    /// Print each issue.
    pub print_issues: bool,
    /// Print the summary table after the batch.
    pub print_summary: bool,
    /// Color mode.
    pub color: ColorChoice,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            pretty: true,
            print_issues: true,
            print_summary: true,
            color: ColorChoice::Auto,
        }
    }
}

/// Logging settings.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `tracing` filter directive, e.g. `warn` or `sparql_analysis=debug`.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_owned(),
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    disabled_analyzers: Vec<String>,
    #[serde(default)]
    output: OutputSettings,
    #[serde(default)]
    logging: LoggingSettings,
}

/// Settings read from `config.toml`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AnalyzeConfig {
    path: Option<PathBuf>,
    /// Analyzers that do not run.
    pub disabled_analyzers: Vec<String>,
    /// Output settings.
    pub output: OutputSettings,
    /// Logging settings.
    pub logging: LoggingSettings,
}

impl AnalyzeConfig {
    /// Loads `explicit` if given, else the default config file if one
    /// exists, else built-in defaults.
    pub fn load(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        match explicit {
            Some(path) => read_file(&path),
            None => match default_config_path() {
                Some(path) if path.exists() => read_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Parses configuration text.
    pub fn from_toml(text: &str, path: Option<&Path>) -> Result<Self, ConfigError> {
        let raw: RawConfig = toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.map_or_else(|| PathBuf::from("<inline>"), Path::to_path_buf),
            source,
        })?;
        if let Some(unknown) = raw
            .disabled_analyzers
            .iter()
            .find(|name| !ANALYZER_NAMES.contains(&name.as_str()))
        {
            return Err(ConfigError::UnknownAnalyzer {
                name: unknown.clone(),
            });
        }
        Ok(Self {
            path: path.map(Path::to_path_buf),
            disabled_analyzers: raw.disabled_analyzers,
            output: raw.output,
            logging: raw.logging,
        })
    }

    /// File the settings came from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The built-in analyzers minus the disabled ones.
    pub fn analyzer(&self) -> Result<MultiAnalyzer, ConfigError> {
        MultiAnalyzer::without(&self.disabled_analyzers).map_err(|err| match err {
            AnalyzerError::UnknownAnalyzer(name) => ConfigError::UnknownAnalyzer { name },
            other => ConfigError::Analyzer(other),
        })
    }
}

fn read_file(path: &Path) -> Result<AnalyzeConfig, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    AnalyzeConfig::from_toml(&contents, Some(path))
}

/// Configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The file is not valid TOML or has unexpected keys.
    #[error("failed to parse config {path}: {source}")]
    Parse {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: toml::de::Error,
    },
    /// `disabled_analyzers` names an analyzer that does not exist.
    #[error("unknown analyzer '{name}' in disabled_analyzers (known: {})", ANALYZER_NAMES.join(", "))]
    UnknownAnalyzer {
        /// The unknown name.
        name: String,
    },
    /// Building the analyzer list failed.
    #[error(transparent)]
    Analyzer(AnalyzerError),
}

/// `<config dir>/sparql-analysis/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("sparql-analysis").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_when_empty() {
        let config = AnalyzeConfig::from_toml("", None).expect("parse");
        assert!(config.output.pretty);
        assert!(config.output.print_summary);
        assert_eq!(config.output.color, ColorChoice::Auto);
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.analyzer().expect("analyzers").analyzers().count(), 5);
    }

    #[test]
    fn reads_all_sections() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(
            file,
            "disabled_analyzers = [\"LangEquals\"]\n[output]\npretty = false\ncolor = \"never\"\n[logging]\nlevel = \"debug\""
        )
        .expect("write");
        let config = AnalyzeConfig::load(Some(file.path().to_path_buf())).expect("load");
        assert_eq!(config.path(), Some(file.path()));
        assert!(!config.output.pretty);
        assert!(config.output.print_issues);
        assert_eq!(config.output.color, ColorChoice::Never);
        assert_eq!(config.logging.level, "debug");
        let names: Vec<&str> = config
            .analyzer()
            .expect("analyzers")
            .analyzers()
            .map(|a| a.name())
            .collect();
        assert!(!names.contains(&"LangEquals"));
    }

    #[test]
    fn unknown_analyzer_is_rejected() {
        let err = AnalyzeConfig::from_toml("disabled_analyzers = [\"Nope\"]", None)
            .expect_err("unknown name");
        assert!(matches!(err, ConfigError::UnknownAnalyzer { ref name } if name == "Nope"));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = AnalyzeConfig::load(Some(dir.path().join("absent.toml"))).expect_err("missing");
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
