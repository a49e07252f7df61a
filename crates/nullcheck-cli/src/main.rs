use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use walkdir::WalkDir;

use nullcheck_core::{Config, Diagnostic, NullableContext, Report, RuleCategory, Severity};
use nullcheck_engine::{fix_all_with_config, Classifier};
use nullcheck_syntax::{source::is_generated_path, DeclaredNullability, ParseError, SourceFile};

const DEFAULT_CONFIG: &str = "nullcheck.toml";

/// Build output and tool caches that never hold hand-written sources
const IGNORED_DIRS: &[&str] = &["bin", "obj", "node_modules"];

/// NullCheck - find and remove null checks on non-nullable references
#[derive(Parser)]
#[command(name = "nullcheck")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: nullcheck.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Project-wide nullable context, overriding the config file
    #[arg(long, global = true, value_enum)]
    nullable: Option<ContextArg>,

    /// Classify files one at a time
    #[arg(long, global = true)]
    sequential: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report redundant null checks
    Check {
        /// Files or directories to analyze
        #[arg(default_value = ".")]
        paths: Vec<PathBuf>,

        /// Output file for report.json
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also output markdown report
        #[arg(short, long)]
        markdown: Option<PathBuf>,

        /// Format of the report written to stdout
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Remove redundant null checks
    Fix {
        /// Files or directories to fix
        #[arg(default_value = ".")]
        paths: Vec<PathBuf>,

        /// Print fixed sources instead of writing them
        #[arg(long)]
        dry_run: bool,
    },

    /// List the rules and their severities
    Rules,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Markdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ContextArg {
    Enable,
    Disable,
}

impl From<ContextArg> for NullableContext {
    fn from(arg: ContextArg) -> Self {
        match arg {
            ContextArg::Enable => NullableContext::Enable,
            ContextArg::Disable => NullableContext::Disable,
        }
    }
}

/// Why a discovered file could not be analyzed
#[derive(Debug, thiserror::Error)]
enum FileError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: ParseError,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let config = load_config(&cli)?;

    if cli.verbose {
        eprintln!("{} nullable context: {:?}", "Using".cyan(), config.nullable_context);
    }

    let has_errors = match cli.command {
        Commands::Check {
            paths,
            output,
            markdown,
            format,
        } => check_command(&config, &paths, output.as_deref(), markdown.as_deref(), format, cli.verbose)?,
        Commands::Fix { paths, dry_run } => fix_command(&config, &paths, dry_run, cli.verbose)?,
        Commands::Rules => {
            rules_command(&config);
            false
        }
    };

    // Exit with error code if there are errors
    if has_errors {
        std::process::exit(1);
    }

    Ok(())
}

/// Config file, then CLI flags on top
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = if let Some(config_path) = &cli.config {
        Config::from_file(config_path)
            .with_context(|| format!("failed to load config from {}", config_path.display()))?
    } else if Path::new(DEFAULT_CONFIG).exists() {
        Config::from_file(Path::new(DEFAULT_CONFIG)).with_context(|| format!("failed to load {}", DEFAULT_CONFIG))?
    } else {
        if cli.verbose {
            eprintln!("{}", "No config file found, using defaults".yellow());
        }
        Config::default()
    };

    if let Some(nullable) = cli.nullable {
        config.nullable_context = nullable.into();
    }
    if cli.sequential {
        config.parallel = false;
    }

    Ok(config)
}

/// Check command - classify every discovered file
fn check_command(
    config: &Config,
    paths: &[PathBuf],
    output: Option<&Path>,
    markdown: Option<&Path>,
    format: OutputFormat,
    verbose: bool,
) -> Result<bool> {
    let mut report = Report::new();
    report.settings = Some(serde_json::json!({
        "nullable_context": config.nullable_context,
        "disabled_rules": config.rules.disabled,
    }));
    let files = discover(paths, config, &mut report)?;

    if verbose {
        eprintln!("{} {} files...", "Checking".cyan(), files.len());
    }

    for path in &files {
        let file = match load_file(path) {
            Ok(file) => file,
            Err(err) => {
                tracing::warn!(error = %err, "file not analyzed");
                report.add_failure(path.display().to_string(), err.to_string());
                continue;
            }
        };

        if !config.analyze_generated_code && file.is_generated() {
            tracing::debug!(path = %path.display(), "skipping generated file");
            report.summary.files_skipped += 1;
            continue;
        }

        let diagnostics = analyze_file(&file, config);
        if verbose && !diagnostics.is_empty() {
            eprintln!("  {} {}", path.display(), format!("{} found", diagnostics.len()).yellow());
        }
        report.extend(diagnostics);
        report.summary.files_checked += 1;
    }

    if let Some(output) = output {
        report
            .save_to_file(output)
            .with_context(|| format!("failed to write report to {}", output.display()))?;
        if verbose {
            eprintln!("{} {}", "Report saved to:".green(), output.display());
        }
    }

    if let Some(md_path) = markdown {
        std::fs::write(md_path, report.to_markdown())
            .with_context(|| format!("failed to write markdown report to {}", md_path.display()))?;
        if verbose {
            eprintln!("{} {}", "Markdown report saved to:".green(), md_path.display());
        }
    }

    match format {
        OutputFormat::Text => print_report_summary(&report),
        OutputFormat::Json => println!("{}", report.to_json()?),
        OutputFormat::Markdown => println!("{}", report.to_markdown()),
    }

    Ok(report.has_errors())
}

/// Fix command - batch fix every discovered file
fn fix_command(config: &Config, paths: &[PathBuf], dry_run: bool, verbose: bool) -> Result<bool> {
    let mut report = Report::new();
    let files = discover(paths, config, &mut report)?;

    for path in &files {
        let file = match load_file(path) {
            Ok(file) => file,
            Err(err) => {
                tracing::warn!(error = %err, "file not fixed");
                report.add_failure(path.display().to_string(), err.to_string());
                continue;
            }
        };

        if !config.analyze_generated_code && file.is_generated() {
            report.summary.files_skipped += 1;
            continue;
        }
        report.summary.files_checked += 1;

        let context = config.nullable_context;
        let outcome = fix_all_with_config(
            file.root.clone(),
            |root: &nullcheck_syntax::SyntaxNode| DeclaredNullability::new(root, context),
            config,
        );
        let changed = outcome.changed();
        let applied = outcome.applied.len();

        let fixed_text = outcome.root.full_text();
        match locate_leftovers(path, &fixed_text, outcome.skipped) {
            Ok(leftovers) => report.extend(leftovers),
            Err(err) => {
                tracing::warn!(error = %err, "fixed text does not parse; file left untouched");
                report.add_failure(path.display().to_string(), err.to_string());
                continue;
            }
        }
        report.summary.fixes_applied += applied;

        if !changed {
            continue;
        }

        if dry_run {
            println!("{} {}", "---".bright_blue(), path.display().to_string().bold());
            print!("{}", fixed_text);
        } else {
            std::fs::write(path, &fixed_text).with_context(|| format!("failed to write {}", path.display()))?;
        }

        if verbose || dry_run {
            eprintln!(
                "{} {} ({} fixes)",
                if dry_run { "Would fix".yellow() } else { "Fixed".green() },
                path.display(),
                applied
            );
        }
    }

    println!();
    println!(
        "{} {} fixes in {} files",
        if dry_run { "Found".bold() } else { "Applied".bold() },
        report.summary.fixes_applied,
        report.summary.files_checked
    );
    if report.summary.total > 0 {
        println!("{} {}", "Left unfixed:".yellow(), report.summary.total);
    }
    if report.summary.files_failed > 0 {
        println!("{} {}", "Failed files:".red(), report.summary.files_failed);
    }

    Ok(report.has_errors())
}

/// Rules command - list rule ids
fn rules_command(config: &Config) {
    println!("{}", "Rules:".bold());
    for category in RuleCategory::ALL {
        let severity = config.severity.get_severity(category);
        let status = if config.is_rule_enabled(category) {
            format!("{}", severity).normal()
        } else {
            "disabled".dimmed()
        };
        println!("  {}  {:<6} {}", category.as_str().bold(), status, category.title());
        println!("      {}", category.description());
    }
}

/// Classify one parsed file, attaching locations
fn analyze_file(file: &SourceFile, config: &Config) -> Vec<Diagnostic> {
    let facts = DeclaredNullability::new(&file.root, config.nullable_context);
    let classifier = Classifier::new(&facts).with_config(config);

    let diagnostics = if config.parallel {
        classifier.classify_parallel(&file.root)
    } else {
        classifier.classify(&file.root)
    };

    diagnostics
        .into_iter()
        .map(|diagnostic| {
            let location = file.location(diagnostic.span);
            diagnostic.with_location(location)
        })
        .collect()
}

/// Diagnostics the fix pass left behind, located in the fixed text
fn locate_leftovers(path: &Path, fixed_text: &str, skipped: Vec<Diagnostic>) -> Result<Vec<Diagnostic>, FileError> {
    if skipped.is_empty() {
        return Ok(skipped);
    }
    let fixed = SourceFile::parse(path, fixed_text).map_err(|source| FileError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(skipped
        .into_iter()
        .map(|diagnostic| {
            let location = fixed.location(diagnostic.span);
            diagnostic.with_location(location)
        })
        .collect())
}

fn load_file(path: &Path) -> Result<SourceFile, FileError> {
    let text = std::fs::read_to_string(path).map_err(|source| FileError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    SourceFile::parse(path, text).map_err(|source| FileError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Collect `*.cs` files under `paths`, counting allowlisted and generated ones as skipped
fn discover(paths: &[PathBuf], config: &Config, report: &mut Report) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for root in paths {
        if !root.exists() {
            return Err(anyhow::anyhow!("Path not found: {}", root.display()));
        }

        let walker = WalkDir::new(root).into_iter().filter_entry(|entry| {
            // never prune the starting point itself
            entry.depth() == 0 || !is_ignored_dir(entry)
        });

        for entry in walker {
            let entry = entry.with_context(|| format!("failed to walk {}", root.display()))?;
            if !entry.file_type().is_file() || !is_csharp(entry.path()) {
                continue;
            }

            let path = entry.into_path();
            if config.allowlist.is_file_skipped(&relative_path(&path, &config.project_root)) {
                tracing::debug!(path = %path.display(), "skipping allowlisted file");
                report.summary.files_skipped += 1;
            } else if !config.analyze_generated_code && is_generated_path(&path) {
                tracing::debug!(path = %path.display(), "skipping generated file");
                report.summary.files_skipped += 1;
            } else {
                files.push(path);
            }
        }
    }

    files.sort();
    files.dedup();
    Ok(files)
}

fn is_ignored_dir(entry: &walkdir::DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || IGNORED_DIRS.contains(&name.as_ref())
}

fn is_csharp(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext.eq_ignore_ascii_case("cs"))
}

/// Forward-slash path relative to the project root, for allowlist globs
fn relative_path(path: &Path, project_root: &Path) -> String {
    let relative = path.strip_prefix(project_root).unwrap_or(path);
    let relative = relative.strip_prefix(".").unwrap_or(relative);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn print_report_summary(report: &Report) {
    println!("\n{}", "=".repeat(60).bright_blue());
    println!("{}", "Redundant Null Check Report".bold().bright_blue());
    println!("{}", "=".repeat(60).bright_blue());
    println!();

    println!("Version: {}", report.version);
    println!("Timestamp: {}", report.timestamp);
    println!();

    println!("{}", "Summary:".bold());
    println!("  Files checked: {}", report.summary.files_checked);
    println!("  Files skipped: {}", report.summary.files_skipped);
    if report.summary.files_failed > 0 {
        println!("  Files failed:  {}", format!("{}", report.summary.files_failed).red());
    }
    println!("  Total diagnostics: {}", report.summary.total);

    if report.summary.errors > 0 {
        println!("  Errors:   {}", format!("{}", report.summary.errors).red().bold());
    } else {
        println!("  Errors:   {}", format!("{}", report.summary.errors).green());
    }

    if report.summary.warnings > 0 {
        println!("  Warnings: {}", format!("{}", report.summary.warnings).yellow());
    } else {
        println!("  Warnings: {}", format!("{}", report.summary.warnings).green());
    }

    println!("  Info:     {}", report.summary.info);
    println!();

    if report.diagnostics.is_empty() {
        println!("{}", "✓ No issues found!".green().bold());
    } else {
        println!("{}", "Diagnostics:".bold());
        for diag in &report.diagnostics {
            let severity_str = match diag.severity {
                Severity::Error => "ERROR".red().bold(),
                Severity::Warn => "WARN".yellow().bold(),
                Severity::Info => "INFO".cyan(),
            };

            println!("  [{}] {}: {}", severity_str, diag.category, diag.message());
            if let Some(loc) = &diag.location {
                println!("    at {}", loc);
            }
        }
    }

    for failure in &report.failures {
        println!("  [{}] {}: {}", "FAILED".red().bold(), failure.file, failure.reason);
    }

    println!();
    println!("{}", "=".repeat(60).bright_blue());
}
