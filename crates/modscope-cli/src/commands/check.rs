//! Check command - analyzes a Hack codebase for module visibility violations

use crate::output::json::JsonFormatter;
use crate::output::pretty::PrettyFormatter;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use modscope_core::config::{Config, load_config_or_default_with_warnings};
use modscope_core::diagnostic::Diagnostic;
use modscope_core::parser::{ParsedUnit, parse_unit, split_units};
use modscope_core::{AnalysisEngine, Severity};
use rayon::prelude::*;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use tracing::{debug, info};
use walkdir::WalkDir;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Path to file or directory to analyze
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Output format for diagnostics (pretty, text, json)
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Fail on warnings (exit code 1)
    #[arg(long)]
    pub fail_on_warnings: bool,

    /// Filter diagnostics by minimum severity level (error, warning, info, hint)
    #[arg(long, value_name = "LEVEL")]
    pub severity: Option<String>,

    /// Disable colored output
    #[arg(long)]
    pub no_color: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Pretty,
    Text,
    Json,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CheckOutcome {
    pub files: usize,
    pub errors: usize,
    pub warnings: usize,
}

impl CheckOutcome {
    pub fn should_fail(&self, fail_on_warnings: bool) -> bool {
        self.errors > 0 || (fail_on_warnings && self.warnings > 0)
    }
}

impl CheckArgs {
    pub fn run(&self) -> Result<()> {
        self.configure_colors();

        let mut stdout = io::stdout().lock();
        let outcome = self.execute(&mut stdout)?;
        stdout.flush()?;

        if outcome.should_fail(self.fail_on_warnings) {
            process::exit(1);
        }

        Ok(())
    }

    fn execute<W: Write>(&self, out: &mut W) -> Result<CheckOutcome> {
        let format = self.parse_format()?;
        let min_severity = self.parse_severity()?;

        let config_result = load_config_or_default_with_warnings(&config_start_dir(&self.path));
        for warning in &config_result.warnings {
            eprintln!("{} {}", "warning:".yellow().bold(), warning);
        }
        let config = config_result.config;

        let files = discover_files(&self.path, &config)?;
        info!(files = files.len(), path = %self.path.display(), "discovered sources");

        if files.is_empty() && format != OutputFormat::Json {
            writeln!(out, "No Hack files found.")?;
            return Ok(CheckOutcome::default());
        }

        let units = parse_files(&files)?;
        let result = AnalysisEngine::with_config(&config).analyze(units);
        debug!(unresolved = result.unresolved.len(), "references left unresolved");

        let diagnostics: Vec<Diagnostic> = result
            .diagnostics
            .iter()
            .filter(|d| d.severity.level() >= min_severity.level())
            .cloned()
            .collect();

        let outcome = CheckOutcome {
            files: files.len(),
            errors: count(&diagnostics, Severity::Error),
            warnings: count(&diagnostics, Severity::Warning),
        };

        match format {
            OutputFormat::Json => {
                let formatter = JsonFormatter::new();
                writeln!(
                    out,
                    "{}",
                    formatter.format(
                        &diagnostics,
                        &result.unresolved,
                        files.len(),
                        &self.path.to_string_lossy()
                    )
                )?;
            }
            OutputFormat::Text => output_text(out, &diagnostics)?,
            OutputFormat::Pretty => {
                let formatter = PrettyFormatter::with_sources(&result.sources);
                write!(out, "{}", formatter.format(&diagnostics))?;
                if diagnostics.is_empty() {
                    writeln!(
                        out,
                        "{} No problems found in {} file(s)",
                        "✓".green().bold(),
                        files.len()
                    )?;
                }
            }
        }

        Ok(outcome)
    }

    fn parse_format(&self) -> Result<OutputFormat> {
        match self.format.as_str() {
            "pretty" => Ok(OutputFormat::Pretty),
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            other => anyhow::bail!(
                "Invalid format '{}'. Valid values: pretty, text, json",
                other
            ),
        }
    }

    fn parse_severity(&self) -> Result<Severity> {
        match self.severity.as_deref() {
            Some("error") => Ok(Severity::Error),
            Some("warning") => Ok(Severity::Warning),
            Some("info") => Ok(Severity::Info),
            Some("hint") => Ok(Severity::Hint),
            Some(other) => anyhow::bail!(
                "Invalid severity '{}'. Valid values: error, warning, info, hint",
                other
            ),
            None => Ok(Severity::Hint),
        }
    }

    fn configure_colors(&self) {
        let no_color_env = std::env::var("NO_COLOR").is_ok();
        if self.no_color || no_color_env {
            colored::control::set_override(false);
        }
    }
}

fn output_text<W: Write>(out: &mut W, diagnostics: &[Diagnostic]) -> io::Result<()> {
    for diag in diagnostics {
        let severity_str = match diag.severity {
            Severity::Error => "error".red().bold(),
            Severity::Warning => "warning".yellow().bold(),
            Severity::Info => "info".blue().bold(),
            Severity::Hint => "hint".cyan().bold(),
        };

        writeln!(
            out,
            "{}:{}:{}: {} [{}]: {}",
            diag.file,
            diag.line,
            diag.column,
            severity_str,
            diag.rule_id.dimmed(),
            diag.message
        )?;

        if let Some(suggestion) = &diag.suggestion {
            writeln!(out, "  {} {}", "suggestion:".green(), suggestion)?;
        }
    }

    if !diagnostics.is_empty() {
        writeln!(out)?;
        writeln!(
            out,
            "Found {} error(s) and {} warning(s)",
            count(diagnostics, Severity::Error),
            count(diagnostics, Severity::Warning)
        )?;
    }

    Ok(())
}

fn count(diagnostics: &[Diagnostic], severity: Severity) -> usize {
    diagnostics.iter().filter(|d| d.severity == severity).count()
}

fn config_start_dir(path: &Path) -> PathBuf {
    if path.is_file() {
        path.parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    } else {
        path.to_path_buf()
    }
}

/// Reads and parses every file in parallel; units come back in file order.
fn parse_files(files: &[PathBuf]) -> Result<Vec<ParsedUnit>> {
    let parsed: Vec<Vec<ParsedUnit>> = files
        .par_iter()
        .map(|file| -> Result<Vec<ParsedUnit>> {
            let content = fs::read_to_string(file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let name = file.to_string_lossy();
            Ok(split_units(&name, &content)
                .into_iter()
                .map(|(unit_name, text)| parse_unit(&unit_name, &text))
                .collect())
        })
        .collect::<Result<_>>()?;

    Ok(parsed.into_iter().flatten().collect())
}

fn discover_files(path: &Path, config: &Config) -> Result<Vec<PathBuf>> {
    if !path.exists() {
        anyhow::bail!("Path does not exist: {}", path.display());
    }

    let extensions = config.extensions();

    if path.is_file() {
        if is_supported_file(path, &extensions) {
            return Ok(vec![path.to_path_buf()]);
        } else {
            return Ok(vec![]);
        }
    }

    let files: Vec<PathBuf> = WalkDir::new(path)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped(e, &config.exclude))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter(|e| is_supported_file(e.path(), &extensions))
        .map(|e| e.path().to_path_buf())
        .collect();

    Ok(files)
}

fn is_supported_file(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.contains(&ext))
        .unwrap_or(false)
}

fn is_skipped(entry: &walkdir::DirEntry, exclude: &[String]) -> bool {
    if entry.depth() == 0 {
        return false;
    }
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.') || exclude.iter().any(|excluded| excluded == name))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use modscope_core::config::CONFIG_FILENAME;
    use std::fs::File;
    use tempfile::tempdir;

    fn args(path: &Path, format: &str) -> CheckArgs {
        CheckArgs {
            path: path.to_path_buf(),
            format: format.to_string(),
            fail_on_warnings: false,
            severity: None,
            no_color: true,
        }
    }

    fn write_project(dir: &Path) {
        fs::write(
            dir.join("a.php"),
            "<?hh\nmodule A;\ninternal function foo(): void {}\n",
        )
        .unwrap();
        fs::write(
            dir.join("b.php"),
            "<?hh\nmodule B;\nfunction bar(): void { foo(); }\n",
        )
        .unwrap();
    }

    fn run_json(args: &CheckArgs) -> (CheckOutcome, serde_json::Value) {
        let mut out = Vec::new();
        let outcome = args.execute(&mut out).unwrap();
        let parsed = serde_json::from_slice(&out).unwrap();
        (outcome, parsed)
    }

    #[test]
    fn discover_files_finds_single_file() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.php");
        File::create(&file_path).unwrap();

        let files = discover_files(&file_path, &Config::default()).unwrap();

        assert_eq!(files, vec![file_path]);
    }

    #[test]
    fn discover_files_uses_default_extensions() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join("a.php")).unwrap();
        File::create(dir.path().join("b.hack")).unwrap();
        File::create(dir.path().join("c.hck")).unwrap();
        File::create(dir.path().join("readme.md")).unwrap();

        let files = discover_files(dir.path(), &Config::default()).unwrap();

        assert_eq!(files.len(), 3);
    }

    #[test]
    fn discover_files_honors_configured_extensions() {
        let dir = tempdir().unwrap();
        File::create(dir.path().join("a.php")).unwrap();
        File::create(dir.path().join("b.hack")).unwrap();
        let config = Config {
            extensions: vec!["hack".to_string()],
            ..Default::default()
        };

        let files = discover_files(dir.path(), &config).unwrap();

        assert_eq!(files, vec![dir.path().join("b.hack")]);
    }

    #[test]
    fn discover_files_skips_hidden_and_excluded_directories() {
        let dir = tempdir().unwrap();
        for sub in [".git", "vendor", "src"] {
            fs::create_dir(dir.path().join(sub)).unwrap();
            File::create(dir.path().join(sub).join("file.php")).unwrap();
        }
        let config = Config {
            exclude: vec!["vendor".to_string()],
            ..Default::default()
        };

        let files = discover_files(dir.path(), &config).unwrap();

        assert_eq!(files, vec![dir.path().join("src").join("file.php")]);
    }

    #[test]
    fn discover_files_is_sorted_and_recursive() {
        let dir = tempdir().unwrap();
        let subdir = dir.path().join("lib");
        fs::create_dir(&subdir).unwrap();
        File::create(dir.path().join("z.php")).unwrap();
        File::create(dir.path().join("a.php")).unwrap();
        File::create(subdir.join("m.php")).unwrap();

        let files = discover_files(dir.path(), &Config::default()).unwrap();

        assert_eq!(
            files,
            vec![
                dir.path().join("a.php"),
                subdir.join("m.php"),
                dir.path().join("z.php"),
            ]
        );
    }

    #[test]
    fn discover_files_rejects_missing_path() {
        let dir = tempdir().unwrap();
        assert!(discover_files(&dir.path().join("missing"), &Config::default()).is_err());
    }

    #[test]
    fn parse_files_splits_multi_unit_sources() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("multi.php");
        fs::write(
            &file_path,
            "//// a.php\n<?hh\nfunction a(): void {}\n//// b.php\n<?hh\nfunction b(): void {}\n",
        )
        .unwrap();

        let units = parse_files(&[file_path]).unwrap();

        assert_eq!(units.len(), 2);
        assert!(units[0].file.path().ends_with("multi.php#a.php"));
        assert!(units[1].file.path().ends_with("multi.php#b.php"));
    }

    #[test]
    fn parse_severity_accepts_known_levels() {
        let mut check = args(Path::new("."), "pretty");
        check.severity = Some("warning".to_string());
        assert_eq!(check.parse_severity().unwrap(), Severity::Warning);

        check.severity = Some("loud".to_string());
        assert!(check.parse_severity().is_err());
    }

    #[test]
    fn parse_format_rejects_unknown_format() {
        assert!(args(Path::new("."), "sarif").parse_format().is_err());
        assert_eq!(
            args(Path::new("."), "text").parse_format().unwrap(),
            OutputFormat::Text
        );
    }

    #[test]
    fn check_reports_violation_as_json() {
        let dir = tempdir().unwrap();
        write_project(dir.path());

        let (outcome, parsed) = run_json(&args(dir.path(), "json"));

        assert_eq!(outcome.files, 2);
        assert_eq!(outcome.errors, 1);
        assert!(outcome.should_fail(false));
        assert_eq!(parsed["summary"]["total_files"], 2);
        assert_eq!(parsed["diagnostics"][0]["rule_id"], "V001");
        assert!(
            parsed["diagnostics"][0]["location"]["file"]
                .as_str()
                .unwrap()
                .ends_with("b.php")
        );
    }

    #[test]
    fn severity_filter_drops_lower_levels() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("a.php"),
            "<?hh\ntrait T1 { public function m(): void {} }\ntrait T2 { public function m(): void {} }\nclass C { use T1, T2; }\n",
        )
        .unwrap();

        let (all, all_json) = run_json(&args(dir.path(), "json"));
        let mut filtered_args = args(dir.path(), "json");
        filtered_args.severity = Some("warning".to_string());
        let (filtered, parsed) = run_json(&filtered_args);

        assert_eq!(all.errors + all.warnings, 0);
        assert_eq!(all_json["summary"]["by_severity"]["info"], 1);
        assert_eq!(parsed["summary"]["total_diagnostics"], 0);
        assert!(!filtered.should_fail(true));
    }

    #[test]
    fn config_file_disables_diagnostics() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("a.php"),
            "<?hh\nmodule A;\ntrait T1 { public function m(): void {} }\ntrait T2 { internal function m(): void {} }\nclass C { use T1, T2; }\n",
        )
        .unwrap();

        let (before, _) = run_json(&args(dir.path(), "json"));
        fs::write(
            dir.path().join(CONFIG_FILENAME),
            "[diagnostics]\ndisabled = [\"trait-method-collision\"]\n",
        )
        .unwrap();
        let (after, parsed) = run_json(&args(dir.path(), "json"));

        assert!(before.should_fail(true));
        assert_eq!(after.warnings, 0);
        assert_eq!(parsed["summary"]["total_diagnostics"], 0);
    }

    #[test]
    fn text_output_lists_locations() {
        let dir = tempdir().unwrap();
        write_project(dir.path());

        let mut out = Vec::new();
        args(dir.path(), "text").execute(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("b.php:3:24"));
        assert!(text.contains("function `foo` is internal to module `A`"));
        assert!(text.contains("Found 1 error(s) and 0 warning(s)"));
    }

    #[test]
    fn empty_directory_reports_no_files() {
        let dir = tempdir().unwrap();

        let mut out = Vec::new();
        let outcome = args(dir.path(), "pretty").execute(&mut out).unwrap();

        assert_eq!(outcome, CheckOutcome::default());
        assert!(String::from_utf8(out).unwrap().contains("No Hack files found."));
    }

    #[test]
    fn warnings_fail_only_when_requested() {
        let outcome = CheckOutcome {
            files: 1,
            errors: 0,
            warnings: 2,
        };
        assert!(!outcome.should_fail(false));
        assert!(outcome.should_fail(true));
    }
}
