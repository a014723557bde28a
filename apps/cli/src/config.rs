//! Run configuration
//!
//! Values come from, in increasing precedence: built-in defaults, an optional
//! `devbind.toml`, `DEVBIND_*` environment variables (a `.env` file is read
//! first) and finally command line flags.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use config::{Environment, File};
use devbind_codegen::{GeneratorConfig, Language};
use semver::Version;
use serde::Deserialize;

/// Default configuration file, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "devbind.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding one descriptor per device
    pub descriptors: PathBuf,
    /// Root of the generated tree, one subdirectory per language
    pub output: PathBuf,
    pub languages: Vec<Language>,
    pub generation: GenerationConfig,
    /// Worker threads; unset means one per core
    pub workers: Option<usize>,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    pub locale: String,
    pub bindings_version: Version,
    pub docs: bool,
    /// Banner date; today when unset
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level for the devbind crates unless `RUST_LOG` is set
    pub level: String,
    pub json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            descriptors: PathBuf::from("descriptors"),
            output: PathBuf::from("generated"),
            languages: Language::ALL.to_vec(),
            generation: GenerationConfig::default(),
            workers: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        let defaults = GeneratorConfig::default();
        Self {
            locale: defaults.locale,
            bindings_version: defaults.bindings_version,
            docs: defaults.generate_docs,
            date: defaults.date,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// Load `.env`, then the config file and the environment.
    ///
    /// An explicitly named file must exist; the default one is optional.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_sources(path, Some("DEVBIND"))
    }

    pub(crate) fn from_sources(
        path: Option<&Path>,
        env_prefix: Option<&str>,
    ) -> anyhow::Result<Self> {
        let file = match path {
            Some(path) => File::from(path).required(true),
            None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
        };

        let mut builder = config::Config::builder().add_source(file);
        if let Some(prefix) = env_prefix {
            builder = builder.add_source(
                Environment::with_prefix(prefix)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("languages"),
            );
        }

        builder
            .build()
            .context("Failed to read configuration sources")?
            .try_deserialize()
            .context("Failed to parse configuration")
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.languages.is_empty() {
            return Err("at least one language must be selected".to_string());
        }
        if self.workers == Some(0) {
            return Err("workers must be at least 1".to_string());
        }
        if self.generation.locale.trim().is_empty() {
            return Err("locale must not be empty".to_string());
        }
        Ok(())
    }

    pub fn generator_config(&self) -> GeneratorConfig {
        GeneratorConfig {
            generate_docs: self.generation.docs,
            locale: self.generation.locale.clone(),
            bindings_version: self.generation.bindings_version.clone(),
            date: self.generation.date,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn from_file(contents: &str) -> anyhow::Result<Config> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("devbind.toml");
        fs::write(&path, contents).unwrap();
        Config::from_sources(Some(&path), None)
    }

    #[test]
    fn defaults_select_every_language() {
        let config = Config::default();
        assert_eq!(config.languages, Language::ALL.to_vec());
        assert!(config.generation.docs);
        assert_eq!(config.generation.locale, "en");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn reads_a_config_file() {
        let config = from_file(
            r#"
descriptors = "devices"
languages = ["python", "c"]
workers = 3

[generation]
locale = "de"
bindings_version = "2.1.30"
date = "2024-05-14"
docs = false

[logging]
level = "debug"
json = true
"#,
        )
        .unwrap();

        assert_eq!(config.descriptors, PathBuf::from("devices"));
        assert_eq!(config.output, PathBuf::from("generated"));
        assert_eq!(config.languages, vec![Language::Python, Language::C]);
        assert_eq!(config.workers, Some(3));
        assert_eq!(config.generation.bindings_version, Version::new(2, 1, 30));
        assert_eq!(config.generation.date, NaiveDate::from_ymd_opt(2024, 5, 14));
        assert!(config.logging.json);

        let generator = config.generator_config();
        assert_eq!(generator.locale, "de");
        assert!(!generator.generate_docs);
    }

    #[test]
    fn an_explicit_file_must_exist() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::from_sources(Some(&dir.path().join("missing.toml")), None).is_err());
    }

    #[test]
    fn unknown_languages_are_rejected() {
        assert!(from_file(r#"languages = ["cobol"]"#).is_err());
    }

    #[test]
    fn validation_rejects_empty_selections() {
        let mut config = Config::default();
        config.languages.clear();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.workers = Some(0);
        assert!(config.validate().is_err());
    }
}
