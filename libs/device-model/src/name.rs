//! Canonical multi-word names
//!
//! Every name in a descriptor is written once as space-separated words
//! ("Get Satellite System Status Low Level"). Emitters derive the casing they
//! need from that single form, word by word, so the same canonical name always
//! renders to the same identifier within one language.

use heck::{ToKebabCase, ToLowerCamelCase, ToShoutySnakeCase, ToSnakeCase, ToUpperCamelCase};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Name(String);

impl Name {
    pub fn new(canonical: impl Into<String>) -> Self {
        let canonical: String = canonical.into();
        Self(canonical.split_whitespace().collect::<Vec<_>>().join(" "))
    }

    /// The canonical space-separated form.
    pub fn space(&self) -> &str {
        &self.0
    }

    pub fn words(&self) -> impl Iterator<Item = &str> {
        self.0.split(' ').filter(|w| !w.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// `GetSatelliteSystemStatus`. Words keep their inner capitalization so
    /// acronyms like `GPS` survive.
    pub fn camel(&self) -> String {
        self.words().map(capitalize_word).collect()
    }

    /// `getSatelliteSystemStatus`
    pub fn headless_camel(&self) -> String {
        let mut words = self.words();
        let mut out = match words.next() {
            Some(first) => first.to_lower_camel_case(),
            None => return String::new(),
        };
        for word in words {
            out.push_str(&capitalize_word(word));
        }
        out
    }

    /// `get_satellite_system_status`
    pub fn snake(&self) -> String {
        self.join_words(|w| w.to_snake_case(), "_")
    }

    /// `GET_SATELLITE_SYSTEM_STATUS`
    pub fn upper(&self) -> String {
        self.join_words(|w| w.to_shouty_snake_case(), "_")
    }

    /// `get-satellite-system-status`
    pub fn dash(&self) -> String {
        self.join_words(|w| w.to_kebab_case(), "-")
    }

    /// `GetSatelliteSystemStatus` with every word folded through heck, so
    /// `SBAS Config` becomes `SbasConfig`.
    pub fn upper_camel(&self) -> String {
        self.words().map(|w| w.to_upper_camel_case()).collect()
    }

    /// Drop the last `count` words.
    pub fn without_suffix(&self, count: usize) -> Name {
        let words: Vec<&str> = self.words().collect();
        let keep = words.len().saturating_sub(count);
        Name(words[..keep].join(" "))
    }

    pub fn ends_with_words(&self, suffix: &str) -> bool {
        let suffix = Name::new(suffix);
        let ours: Vec<&str> = self.words().collect();
        let theirs: Vec<&str> = suffix.words().collect();
        ours.len() >= theirs.len() && ours[ours.len() - theirs.len()..] == theirs[..]
    }

    /// Append words, producing e.g. `Satellite Numbers Chunk Data`.
    pub fn join(&self, suffix: &str) -> Name {
        Name::new(format!("{} {}", self.0, suffix))
    }

    fn join_words(&self, f: impl Fn(&str) -> String, sep: &str) -> String {
        self.words()
            .map(|w| f(w))
            .filter(|w| !w.is_empty())
            .collect::<Vec<_>>()
            .join(sep)
    }
}

fn capitalize_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first
            .to_uppercase()
            .chain(chars.filter(|c| c.is_alphanumeric()))
            .collect(),
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Name {
    fn from(value: &str) -> Self {
        Name::new(value)
    }
}
