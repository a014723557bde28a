//! Provenance banners
//!
//! Every generated file starts with a banner naming the generation date and
//! the bindings version. Release tooling diffs consecutive generations and
//! must be able to ignore hunks that only touch those two lines, so the
//! banner layout is fixed and [`HeaderMatcher`] recognizes it.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use semver::Version;

/// Inner width of the banner box.
const WIDTH: usize = 57;

const NOTICE: [&str; 3] = [
    "If you have a bugfix for this file and want to commit it,",
    "please fix the bug in the generator. You can find a link",
    "to the generators git repository on the project homepage",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentStyle {
    /// `/* ... */` for C, Rust and JavaScript
    CBlock,
    /// `# ... #` for Python
    Hash,
}

/// What a banner states about a generated file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance {
    pub language: &'static str,
    pub version: Version,
    pub date: NaiveDate,
}

impl Provenance {
    pub fn header(&self, style: CommentStyle) -> String {
        render_header(style, self.language, &self.version, self.date)
    }
}

pub fn render_header(
    style: CommentStyle,
    language: &str,
    version: &Version,
    date: NaiveDate,
) -> String {
    let mut lines = vec![
        format!(
            "This file was automatically generated on {}.",
            date.format("%Y-%m-%d")
        ),
        String::new(),
        format!("{} Bindings Version {}", language, version),
        String::new(),
    ];
    lines.extend(NOTICE.iter().map(|s| s.to_string()));

    let (top, left, right, bottom) = match style {
        CommentStyle::CBlock => (
            format!("/* {}", "*".repeat(WIDTH + 2)),
            " * ",
            " *",
            format!(" {}/", "*".repeat(WIDTH + 3)),
        ),
        CommentStyle::Hash => (
            "#".repeat(WIDTH + 4),
            "# ",
            " #",
            "#".repeat(WIDTH + 4),
        ),
    };

    let mut out = String::new();
    out.push_str(&top);
    out.push('\n');
    for line in lines {
        out.push_str(&format!("{}{:<width$}{}\n", left, line, right, width = WIDTH));
    }
    out.push_str(&bottom);
    out.push('\n');
    out
}

static DATE_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?: \*|#) This file was automatically generated on [0-9]{4}-[0-9]{2}-[0-9]{2}\. +(?:\*|#)$")
        .expect("date line regex must compile")
});

static VERSION_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?: \*|#) .+ Bindings Version [0-9]+\.[0-9]+\.[0-9]+ +(?:\*|#)$")
        .expect("version line regex must compile")
});

static HUNK_HEADER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^@@ -[0-9]+(?:,[0-9]+)? \+[0-9]+(?:,[0-9]+)? @@")
        .expect("hunk header regex must compile")
});

/// Recognizes unified-diff hunks that only change banner lines.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeaderMatcher;

impl HeaderMatcher {
    pub fn new() -> Self {
        Self
    }

    /// Whether a banner line carries a volatile value.
    pub fn is_volatile_line(&self, line: &str) -> bool {
        DATE_LINE.is_match(line) || VERSION_LINE.is_match(line)
    }

    /// `hunk` starts at its `@@` line. It is header-only when it changes at
    /// least one line, removes as many lines as it adds, and every changed
    /// line is a date or version line.
    pub fn is_header_only(&self, hunk: &str) -> bool {
        let mut lines = hunk.lines();
        match lines.next() {
            Some(first) if HUNK_HEADER.is_match(first) => {}
            _ => return false,
        }

        let mut removed = 0usize;
        let mut added = 0usize;

        for line in lines {
            let (counter, body) = match line.as_bytes().first() {
                Some(b'-') => (&mut removed, &line[1..]),
                Some(b'+') => (&mut added, &line[1..]),
                _ => continue,
            };
            if !self.is_volatile_line(body) {
                return false;
            }
            *counter += 1;
        }

        removed > 0 && removed == added
    }

    /// Split a unified diff into hunks and drop the header-only ones.
    /// File headers (`---`/`+++`) are kept with the hunks that follow them.
    pub fn filter_diff(&self, diff: &str) -> String {
        let mut out = String::new();
        let mut hunk = String::new();

        let flush = |hunk: &mut String, out: &mut String| {
            if !hunk.is_empty() && !self.is_header_only(hunk) {
                out.push_str(hunk);
            }
            hunk.clear();
        };

        for line in diff.split_inclusive('\n') {
            let in_hunk = hunk.starts_with("@@");
            if HUNK_HEADER.is_match(line) {
                flush(&mut hunk, &mut out);
                hunk.push_str(line);
            } else if in_hunk && is_hunk_body(line) {
                hunk.push_str(line);
            } else {
                flush(&mut hunk, &mut out);
                out.push_str(line);
            }
        }
        flush(&mut hunk, &mut out);

        out
    }
}

fn is_hunk_body(line: &str) -> bool {
    if line.starts_with("--- ") || line.starts_with("+++ ") {
        return false;
    }
    matches!(line.as_bytes().first(), Some(b' ' | b'-' | b'+' | b'\\'))
}

/// Blank the volatile banner lines so two generations can be compared
/// byte for byte.
pub fn normalize(text: &str) -> String {
    let matcher = HeaderMatcher::new();
    text.split_inclusive('\n')
        .map(|line| {
            let body = line.trim_end_matches('\n');
            if matcher.is_volatile_line(body) {
                let newline = if line.ends_with('\n') { "\n" } else { "" };
                let prefix = if body.starts_with('#') { "#" } else { " *" };
                format!("{}{}", prefix, newline)
            } else {
                line.to_string()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn banner(style: CommentStyle, day: u32, patch: u64) -> String {
        render_header(style, "Python", &Version::new(2, 1, patch), date(2024, 3, day))
    }

    fn hunk(old: &str, new: &str) -> String {
        let mut out = String::from("@@ -1,9 +1,9 @@\n");
        for (a, b) in old.lines().zip(new.lines()) {
            if a == b {
                out.push_str(&format!(" {}\n", a));
            } else {
                out.push_str(&format!("-{}\n+{}\n", a, b));
            }
        }
        out
    }

    #[test]
    fn renders_fixed_width_banners() {
        for style in [CommentStyle::CBlock, CommentStyle::Hash] {
            let text = banner(style, 1, 30);
            let lines: Vec<&str> = text.lines().collect();
            assert_eq!(lines.len(), 9);
            assert!(lines[1..8].iter().all(|l| l.chars().count() == WIDTH + 4));
            assert!(text.contains("This file was automatically generated on 2024-03-01."));
            assert!(text.contains("Python Bindings Version 2.1.30"));
        }
        assert!(banner(CommentStyle::CBlock, 1, 30).starts_with("/* ****"));
        assert!(banner(CommentStyle::CBlock, 1, 30).trim_end().ends_with("*/"));
    }

    #[test]
    fn date_and_version_changes_are_header_only() {
        let matcher = HeaderMatcher::new();
        for style in [CommentStyle::CBlock, CommentStyle::Hash] {
            assert!(matcher.is_header_only(&hunk(&banner(style, 1, 30), &banner(style, 2, 30))));
            assert!(matcher.is_header_only(&hunk(&banner(style, 1, 30), &banner(style, 2, 31))));
        }
    }

    #[test]
    fn other_changes_are_not_header_only() {
        let matcher = HeaderMatcher::new();
        let old = banner(CommentStyle::Hash, 1, 30);
        let new = old.replace("please fix", "please patch");
        assert!(!matcher.is_header_only(&hunk(&old, &new)));
        assert!(!matcher.is_header_only(&hunk(&old, &old)));
        assert!(!matcher.is_header_only("-# random\n+# random\n"));
    }

    #[test]
    fn filter_drops_only_banner_hunks() {
        let old = banner(CommentStyle::CBlock, 1, 30);
        let new = banner(CommentStyle::CBlock, 9, 30);
        let diff = format!(
            "--- a/x.h\n+++ b/x.h\n{}@@ -40,1 +40,1 @@\n-int a;\n+int b;\n",
            hunk(&old, &new)
        );
        let filtered = HeaderMatcher::new().filter_diff(&diff);
        assert!(filtered.starts_with("--- a/x.h\n+++ b/x.h\n@@ -40,1 +40,1 @@"));
        assert!(!filtered.contains("automatically generated"));
    }

    #[test]
    fn normalize_ignores_date_and_version() {
        let a = format!("{}body\n", banner(CommentStyle::Hash, 1, 30));
        let b = format!("{}body\n", banner(CommentStyle::Hash, 5, 31));
        assert_ne!(a, b);
        assert_eq!(normalize(&a), normalize(&b));
        assert!(normalize(&a).ends_with("body\n"));
    }
}
