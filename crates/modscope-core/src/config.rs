//! Configuration loading and parsing for modscope
//!
//! Provides functionality to load and parse `modscope.toml` configuration files.

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::diagnostic::{DiagnosticKind, Severity};

pub const CONFIG_FILENAME: &str = "modscope.toml";

pub const DEFAULT_EXTENSIONS: &[&str] = &["php", "hack", "hck"];

const KNOWN_TOP_LEVEL_KEYS: &[&str] = &["extensions", "exclude", "analysis", "diagnostics"];
const KNOWN_ANALYSIS_KEYS: &[&str] = &["parallel"];
const KNOWN_DIAGNOSTICS_KEYS: &[&str] = &["disabled", "severity"];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid TOML in '{path}': {message}")]
    ParseError { path: PathBuf, message: String },
}

#[derive(Debug, Clone, Default)]
pub struct ConfigResult {
    pub config: Config,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub extensions: Vec<String>,
    pub exclude: Vec<String>,
    pub analysis: AnalysisConfig,
    pub diagnostics: DiagnosticsConfig,
}

impl Config {
    pub fn extensions(&self) -> Vec<&str> {
        if self.extensions.is_empty() {
            DEFAULT_EXTENSIONS.to_vec()
        } else {
            self.extensions.iter().map(String::as_str).collect()
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    pub parallel: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self { parallel: true }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct DiagnosticsConfig {
    pub disabled: Vec<String>,
    #[serde(default)]
    pub severity: HashMap<String, SeverityValue>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum SeverityValue {
    Error,
    Warning,
    Info,
    Hint,
}

impl From<SeverityValue> for Severity {
    fn from(value: SeverityValue) -> Self {
        match value {
            SeverityValue::Error => Severity::Error,
            SeverityValue::Warning => Severity::Warning,
            SeverityValue::Info => Severity::Info,
            SeverityValue::Hint => Severity::Hint,
        }
    }
}

pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
    let mut current = start_dir.to_path_buf();
    loop {
        let config_path = current.join(CONFIG_FILENAME);
        if config_path.exists() {
            return Some(config_path);
        }
        if !current.pop() {
            return None;
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e.message().to_string(),
    })
}

pub fn load_config_with_warnings(path: &Path) -> Result<ConfigResult, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        message: e.message().to_string(),
    })?;

    let mut warnings = detect_unknown_keys(&content);
    warnings.extend(validate_diagnostics(&config.diagnostics));

    Ok(ConfigResult { config, warnings })
}

fn detect_unknown_keys(content: &str) -> Vec<String> {
    let mut warnings = Vec::new();

    let table: toml::Table = match content.parse() {
        Ok(t) => t,
        Err(_) => return warnings,
    };

    let known_top: HashSet<&str> = KNOWN_TOP_LEVEL_KEYS.iter().copied().collect();
    for key in table.keys() {
        if !known_top.contains(key.as_str()) {
            warnings.push(format!("Unknown config option: '{}'", key));
        }
    }

    for (section, known) in [
        ("analysis", KNOWN_ANALYSIS_KEYS),
        ("diagnostics", KNOWN_DIAGNOSTICS_KEYS),
    ] {
        if let Some(toml::Value::Table(entries)) = table.get(section) {
            let known: HashSet<&str> = known.iter().copied().collect();
            for key in entries.keys() {
                if !known.contains(key.as_str()) {
                    warnings.push(format!("Unknown config option in [{}]: '{}'", section, key));
                }
            }
        }
    }

    warnings
}

fn validate_diagnostics(config: &DiagnosticsConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    for id in &config.disabled {
        match DiagnosticKind::from_code_or_name(id) {
            None => warnings.push(format!("Unknown diagnostic in [diagnostics].disabled: '{}'", id)),
            Some(kind) if !kind.is_configurable() => warnings.push(format!(
                "Diagnostic '{}' is an error and cannot be disabled",
                id
            )),
            Some(_) => {}
        }
    }

    let mut ids: Vec<&String> = config.severity.keys().collect();
    ids.sort();
    for id in ids {
        match DiagnosticKind::from_code_or_name(id) {
            None => warnings.push(format!("Unknown diagnostic in [diagnostics.severity]: '{}'", id)),
            Some(kind) if !kind.is_configurable() => warnings.push(format!(
                "Diagnostic '{}' is an error and its severity cannot be overridden",
                id
            )),
            Some(_) => {}
        }
    }

    warnings
}

pub fn load_config_or_default(start_dir: &Path) -> Config {
    find_config_file(start_dir)
        .and_then(|path| load_config(&path).ok())
        .unwrap_or_default()
}

pub fn load_config_or_default_with_warnings(start_dir: &Path) -> ConfigResult {
    match find_config_file(start_dir) {
        Some(path) => load_config_with_warnings(&path).unwrap_or_else(|e| ConfigResult {
            config: Config::default(),
            warnings: vec![e.to_string()],
        }),
        None => ConfigResult::default(),
    }
}
