use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::driver::GenerationReport;
use crate::error::GenerateError;

/// Files written by [`write_report`] and the writes that failed.
#[derive(Debug, Default)]
pub struct WriteOutcome {
    pub written: Vec<PathBuf>,
    pub failures: Vec<GenerateError>,
}

/// Write every rendered file to `<output_dir>/<language>/<file>`.
///
/// Each file goes to `<file>.tmp` first and is renamed into place, so a file
/// on disk is never half written. A failed write is recorded with its path
/// and does not stop the others.
pub fn write_report(report: &GenerationReport, output_dir: &Path) -> WriteOutcome {
    let mut outcome = WriteOutcome::default();

    for ((language, name), contents) in &report.files {
        let path = output_dir.join(language.dir_name()).join(name);
        match write_atomic(&path, contents) {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Wrote generated file");
                outcome.written.push(path);
            }
            Err(source) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %source,
                    "Failed to write generated file"
                );
                outcome.failures.push(GenerateError::Io { path, source });
            }
        }
    }

    tracing::info!(
        written = outcome.written.len(),
        failures = outcome.failures.len(),
        output = %output_dir.display(),
        "Wrote generated files"
    );

    outcome
}

fn write_atomic(path: &Path, contents: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, contents)?;
    if let Err(error) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(error);
    }
    Ok(())
}
