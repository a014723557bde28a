//! devbind - generate device bindings from descriptors
//!
//! Loads every descriptor in a directory, resolves the high-level features
//! and writes bindings for the selected languages. Exits non-zero if any
//! descriptor, packet, emitter or write failed.

mod config;
mod logging;

use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use devbind_codegen::provenance::HeaderMatcher;
use devbind_codegen::resolver::resolve_device;
use devbind_codegen::{generate_from_dir, GenerationDriver, Language};
use semver::Version;

use crate::config::Config;

#[derive(Parser, Debug)]
#[command(name = "devbind", version, about = "Device binding generator")]
struct Cli {
    /// Configuration file (defaults to ./devbind.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level for devbind, ignored when RUST_LOG is set
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate bindings for every descriptor
    Generate(GenerateArgs),
    /// Load and resolve descriptors without generating anything
    Check(SourceArgs),
    /// List the devices found in the descriptor directory
    List(SourceArgs),
    /// Drop hunks that only touch banner dates or versions from a unified diff
    FilterDiff {
        /// Diff file, stdin when omitted
        diff: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct SourceArgs {
    /// Descriptor directory
    #[arg(short, long)]
    descriptors: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// Output directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Target language, repeatable (python, rust, c, javascript)
    #[arg(short, long = "language")]
    languages: Vec<Language>,

    /// Locale for documentation text
    #[arg(long)]
    locale: Option<String>,

    /// Version written into every banner
    #[arg(long)]
    bindings_version: Option<Version>,

    /// Banner date (YYYY-MM-DD), today when omitted
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Worker threads
    #[arg(short, long)]
    workers: Option<usize>,

    /// Leave documentation comments out
    #[arg(long)]
    no_docs: bool,
}

impl GenerateArgs {
    fn apply(self, config: &mut Config) {
        self.source.apply(config);
        if let Some(output) = self.output {
            config.output = output;
        }
        if !self.languages.is_empty() {
            config.languages = self.languages;
        }
        if let Some(locale) = self.locale {
            config.generation.locale = locale;
        }
        if let Some(version) = self.bindings_version {
            config.generation.bindings_version = version;
        }
        if self.date.is_some() {
            config.generation.date = self.date;
        }
        if self.workers.is_some() {
            config.workers = self.workers;
        }
        if self.no_docs {
            config.generation.docs = false;
        }
    }
}

impl SourceArgs {
    fn apply(self, config: &mut Config) {
        if let Some(descriptors) = self.descriptors {
            config.descriptors = descriptors;
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            logging::init_simple_logging();
            tracing::error!("devbind failed: {e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the command finished without failures.
fn run(cli: Cli) -> anyhow::Result<bool> {
    let mut config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if cli.json_logs {
        config.logging.json = true;
    }

    match cli.command {
        Command::Generate(args) => {
            args.apply(&mut config);
            start(&config)?;
            generate(&config)
        }
        Command::Check(args) => {
            args.apply(&mut config);
            start(&config)?;
            check(&config)
        }
        Command::List(args) => {
            args.apply(&mut config);
            start(&config)?;
            list(&config)
        }
        Command::FilterDiff { diff } => {
            logging::init_logging(&config.logging).context("Failed to initialize logging")?;
            filter_diff(diff)
        }
    }
}

fn start(config: &Config) -> anyhow::Result<()> {
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;
    logging::init_logging(&config.logging).context("Failed to initialize logging")?;
    tracing::debug!(?config, "Configuration loaded");
    Ok(())
}

fn driver(config: &Config) -> GenerationDriver {
    match config.workers {
        Some(workers) => GenerationDriver::new().with_workers(workers),
        None => GenerationDriver::new(),
    }
}

fn generate(config: &Config) -> anyhow::Result<bool> {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        descriptors = %config.descriptors.display(),
        output = %config.output.display(),
        languages = ?config.languages,
        "Generating bindings"
    );

    let summary = generate_from_dir(
        &config.descriptors,
        &config.output,
        &config.languages,
        &config.generator_config(),
        &driver(config),
    )?;

    for failure in &summary.failures {
        tracing::error!(error = %failure, "Generation failure");
    }
    tracing::info!(
        devices = summary.devices,
        files = summary.files_written,
        failures = summary.failures.len(),
        "Generation complete"
    );

    Ok(summary.is_success())
}

fn check(config: &Config) -> anyhow::Result<bool> {
    let outcome = devbind_model::load_dir(&config.descriptors)
        .with_context(|| format!("loading descriptors from {}", config.descriptors.display()))?;

    let mut failures = outcome.failures.len();
    for failure in &outcome.failures {
        tracing::error!(error = %failure, "Descriptor failure");
    }

    for device in outcome.registry.devices() {
        let resolved = resolve_device(Arc::clone(device));
        failures += resolved.errors.len();
        for error in &resolved.errors {
            tracing::error!(device = %device.name, error = %error, "Resolution failure");
        }
    }

    tracing::info!(
        devices = outcome.registry.len(),
        failures,
        "Descriptor check complete"
    );
    Ok(failures == 0)
}

fn list(config: &Config) -> anyhow::Result<bool> {
    let outcome = devbind_model::load_dir(&config.descriptors)
        .with_context(|| format!("loading descriptors from {}", config.descriptors.display()))?;

    for device in outcome.registry.devices() {
        println!(
            "{:>5}  {:<9} {:<32} {}{}",
            device.identifier,
            device.category.name(),
            device.full_name().to_string(),
            device.api_version,
            if device.released { "" } else { "  (unreleased)" }
        );
    }
    for failure in &outcome.failures {
        tracing::error!(error = %failure, "Descriptor failure");
    }

    Ok(outcome.failures.is_empty())
}

fn filter_diff(path: Option<PathBuf>) -> anyhow::Result<bool> {
    let diff = match path {
        Some(path) => fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => {
            let mut diff = String::new();
            io::stdin()
                .read_to_string(&mut diff)
                .context("reading diff from stdin")?;
            diff
        }
    };

    print!("{}", HeaderMatcher::new().filter_diff(&diff));
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn flags_override_file_values() {
        let cli = Cli::try_parse_from([
            "devbind",
            "generate",
            "--descriptors",
            "devices",
            "-l",
            "python",
            "--language",
            "js",
            "--workers",
            "2",
            "--date",
            "2024-05-14",
            "--no-docs",
        ])
        .unwrap();

        let Command::Generate(args) = cli.command else {
            panic!("expected generate");
        };
        let mut config = Config::default();
        args.apply(&mut config);

        assert_eq!(config.descriptors, PathBuf::from("devices"));
        assert_eq!(config.languages, vec![Language::Python, Language::JavaScript]);
        assert_eq!(config.workers, Some(2));
        assert_eq!(config.generation.date, NaiveDate::from_ymd_opt(2024, 5, 14));
        assert!(!config.generation.docs);
        assert_eq!(config.output, PathBuf::from("generated"));
    }

    #[test]
    fn unknown_languages_are_rejected() {
        assert!(Cli::try_parse_from(["devbind", "generate", "-l", "cobol"]).is_err());
    }

    #[test]
    fn check_reports_resolution_failures() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("broken.json"),
            r#"{
                "author": "Jane Doe <jane@example.com>",
                "api_version": [2, 0, 0],
                "category": "Bricklet",
                "device_identifier": 2100,
                "name": "Broken",
                "description": {"en": "Streams without data"},
                "released": true,
                "packets": [
                    {
                        "type": "function",
                        "name": "Read Low Level",
                        "elements": [["Length", "uint16", 1, "out"]],
                        "since_firmware": [1, 0, 0],
                        "doc": ["llf", {"en": "Reads."}],
                        "high_level": {"stream_out": {"name": "Data"}}
                    }
                ]
            }"#,
        )
        .unwrap();

        let config = Config {
            descriptors: dir.path().to_path_buf(),
            ..Config::default()
        };
        assert!(!check(&config).unwrap());
        assert!(list(&Config {
            descriptors: dir.path().join("missing"),
            ..Config::default()
        })
        .is_err());
    }
}
