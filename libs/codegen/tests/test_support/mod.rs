#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use devbind_codegen::GeneratorConfig;
use semver::Version;

pub fn descriptor_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../descriptors")
}

/// Config with a pinned date so runs can be compared.
pub fn config_on(date: NaiveDate) -> GeneratorConfig {
    GeneratorConfig {
        date: Some(date),
        bindings_version: Version::new(2, 1, 30),
        ..GeneratorConfig::default()
    }
}

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub fn read(path: impl AsRef<Path>) -> String {
    fs::read_to_string(path.as_ref())
        .unwrap_or_else(|e| panic!("failed to read {}: {}", path.as_ref().display(), e))
}

/// A one-hunk unified diff between two texts of equal line count, or `None`
/// when they are identical.
pub fn single_hunk(old: &str, new: &str) -> Option<String> {
    let old: Vec<&str> = old.lines().collect();
    let new: Vec<&str> = new.lines().collect();
    assert_eq!(old.len(), new.len(), "only same-length texts are supported");

    let changed: Vec<usize> = (0..old.len()).filter(|&i| old[i] != new[i]).collect();
    let first = *changed.first()?;
    let last = *changed.last()?;

    let mut hunk = format!(
        "@@ -{},{} +{},{} @@\n",
        first + 1,
        last - first + 1,
        first + 1,
        last - first + 1
    );
    for line in &old[first..=last] {
        hunk.push_str(&format!("-{}\n", line));
    }
    for line in &new[first..=last] {
        hunk.push_str(&format!("+{}\n", line));
    }
    Some(hunk)
}
