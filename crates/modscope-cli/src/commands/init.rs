//! Init command - writes a starter modscope.toml

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use modscope_core::config::CONFIG_FILENAME;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG: &str = r#"# modscope configuration file

# File extensions analyzed by `modscope check`
extensions = ["php", "hack", "hck"]

# Directory names skipped during discovery
exclude = ["vendor"]

[analysis]
# Flatten traits and classes on all cores
parallel = true

[diagnostics]
# Disable non-error diagnostics by code or name
# disabled = ["trait-method-collision"]

# Override the severity of non-error diagnostics
# [diagnostics.severity]
# trait-method-collision = "warning"
"#;

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Force overwrite existing configuration
    #[arg(short, long)]
    pub force: bool,
}

impl InitArgs {
    pub fn run(&self) -> Result<()> {
        let path = self.write_config(&env::current_dir()?)?;
        println!(
            "{} Created {} configuration file",
            "✓".green().bold(),
            path.display().to_string().cyan()
        );
        Ok(())
    }

    fn write_config(&self, dir: &Path) -> Result<PathBuf> {
        let config_path = dir.join(CONFIG_FILENAME);

        if config_path.exists() && !self.force {
            anyhow::bail!(
                "Config file '{}' already exists. Use --force to overwrite.",
                CONFIG_FILENAME
            );
        }

        fs::write(&config_path, DEFAULT_CONFIG)?;
        Ok(config_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modscope_core::config::{Config, load_config_with_warnings};
    use tempfile::tempdir;

    #[test]
    fn init_creates_config_file() {
        let dir = tempdir().unwrap();

        let path = InitArgs { force: false }.write_config(dir.path()).unwrap();

        assert_eq!(path, dir.path().join(CONFIG_FILENAME));
        assert_eq!(fs::read_to_string(&path).unwrap(), DEFAULT_CONFIG);
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILENAME);
        fs::write(&config_path, "exclude = []\n").unwrap();

        let err = InitArgs { force: false }.write_config(dir.path()).unwrap_err();

        assert!(err.to_string().contains("already exists"));
        assert_eq!(fs::read_to_string(&config_path).unwrap(), "exclude = []\n");
    }

    #[test]
    fn init_overwrites_with_force() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILENAME);
        fs::write(&config_path, "exclude = []\n").unwrap();

        InitArgs { force: true }.write_config(dir.path()).unwrap();

        assert_eq!(fs::read_to_string(&config_path).unwrap(), DEFAULT_CONFIG);
    }

    #[test]
    fn default_config_loads_without_warnings() {
        let dir = tempdir().unwrap();
        let path = InitArgs { force: false }.write_config(dir.path()).unwrap();

        let result = load_config_with_warnings(&path).unwrap();

        assert!(result.warnings.is_empty(), "{:?}", result.warnings);
        assert_eq!(result.config.exclude, vec!["vendor".to_string()]);
        assert_eq!(
            result.config.extensions(),
            Config::default().extensions()
        );
        assert!(result.config.analysis.parallel);
    }
}
