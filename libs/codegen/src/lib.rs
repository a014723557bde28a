//! Device Binding Code Generator
//!
//! This library turns declarative device descriptors into client bindings for
//! several programming languages.
//!
//! ## Architecture
//!
//! The generator uses a three-stage pipeline:
//! 1. **Model**: `devbind-model` loads and validates descriptors into an
//!    immutable IR held by a `DeviceRegistry`
//! 2. **Resolver**: derives the high-level stream views of each device
//! 3. **Generators**: language-specific emitters render the resolved devices
//!
//! The [`driver`] fans (device, language) pairs out to a worker pool and
//! [`utils::write_report`] writes the results atomically.

pub mod classify;
pub mod doc;
pub mod driver;
pub mod error;
pub mod generators;
pub mod naming;
pub mod provenance;
pub mod resolver;
pub mod utils;

#[cfg(test)]
mod test_support;

use std::path::Path;

use anyhow::{Context, Result};
use devbind_model::DeviceRegistry;

pub use driver::{GenerationDriver, GenerationReport};
pub use error::{EmitError, GenerateError, ResolveError, StreamError};
pub use generators::{Generator, GeneratorConfig, Language};

/// Main entry point for code generation
pub struct CodeGenerator {
    registry: DeviceRegistry,
    load_failures: Vec<devbind_model::Error>,
}

impl CodeGenerator {
    /// Create a generator from every descriptor in `dir`.
    ///
    /// Broken descriptors do not fail this call; they are reported with the
    /// results of [`CodeGenerator::generate`].
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let outcome = devbind_model::load_dir(dir)
            .with_context(|| format!("loading descriptors from {}", dir.display()))?;
        Ok(Self {
            registry: outcome.registry,
            load_failures: outcome.failures,
        })
    }

    /// Create a generator from an already loaded registry
    pub fn from_registry(registry: DeviceRegistry) -> Self {
        Self {
            registry,
            load_failures: Vec::new(),
        }
    }

    /// Get the device registry
    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Generate bindings for `languages`. Descriptor failures from loading
    /// are moved into the report.
    pub fn generate(
        &mut self,
        languages: &[Language],
        config: &GeneratorConfig,
        driver: &GenerationDriver,
    ) -> GenerationReport {
        let generators = generators::generators_for(languages);
        let mut report = driver.run(&self.registry, &generators, &config.context());
        let load_failures = std::mem::take(&mut self.load_failures)
            .into_iter()
            .map(GenerateError::Descriptor);
        report.failures.splice(0..0, load_failures);
        report
    }
}

/// Outcome of [`generate_from_dir`].
#[derive(Debug)]
pub struct RunSummary {
    pub devices: usize,
    pub files_written: usize,
    pub failures: Vec<GenerateError>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Convenience helper to load a descriptor directory, generate all
/// requested languages and write them below `output_dir`.
pub fn generate_from_dir(
    descriptor_dir: &Path,
    output_dir: &Path,
    languages: &[Language],
    config: &GeneratorConfig,
    driver: &GenerationDriver,
) -> Result<RunSummary> {
    let mut codegen = CodeGenerator::from_dir(descriptor_dir).context("building device registry")?;
    let devices = codegen.registry().len();

    let mut report = codegen.generate(languages, config, driver);
    let written = utils::write_report(&report, output_dir);

    let mut failures = std::mem::take(&mut report.failures);
    failures.extend(written.failures);

    Ok(RunSummary {
        devices,
        files_written: written.written.len(),
        failures,
    })
}
