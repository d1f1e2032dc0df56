//! Ignore-list loading and filename matching.
//!
//! The ignore file is plain text with one glob per line. Blank lines and
//! lines starting with `#` are skipped. Patterns follow shell `fnmatch`
//! rules and are matched against the entry's file name only, never its
//! full path: `*` and `?` match any character, `[...]`/`[!...]` are
//! character classes, an unterminated `[` is literal, and `**` is just `*`.

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::Path;
use tracing::warn;

/// Load ignore patterns from `path`.
///
/// A missing file means no filters are configured and yields an empty list.
/// Patterns are kept verbatim (trimmed), in file order, without dedup or
/// syntax validation.
pub fn load_patterns(path: &Path) -> std::io::Result<Vec<String>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Returns true if `filename` matches any of `patterns`.
///
/// Matching is case-sensitive. A pattern that cannot be compiled never
/// matches.
pub fn matches(filename: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|pattern| {
        compile(pattern)
            .map(|glob| glob.compile_matcher().is_match(filename))
            .unwrap_or(false)
    })
}

/// Rewrite an fnmatch pattern into globset syntax with the same meaning.
///
/// Runs of `*` collapse to one, so globset never sees a `**` path token.
/// Braces and unterminated `[` become literal classes, and a class that
/// starts with `^` (a literal member in fnmatch, a negation in globset)
/// becomes an alternation.
fn fnmatch_to_glob(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() + 8);
    let mut prev_star = false;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        i += 1;

        if c == '*' {
            if !prev_star {
                out.push('*');
            }
            prev_star = true;
            continue;
        }
        prev_star = false;

        match c {
            '[' => {
                let mut j = i;
                if j < chars.len() && chars[j] == '!' {
                    j += 1;
                }
                if j < chars.len() && chars[j] == ']' {
                    j += 1;
                }
                while j < chars.len() && chars[j] != ']' {
                    j += 1;
                }

                if j >= chars.len() {
                    out.push_str("[[]");
                } else {
                    let class: String = chars[i..j].iter().collect();
                    push_class(&mut out, &class);
                    i = j + 1;
                }
            }
            '{' => out.push_str("[{]"),
            '}' => out.push_str("[}]"),
            ',' => out.push_str("[,]"),
            other => out.push(other),
        }
    }

    out
}

fn push_class(out: &mut String, class: &str) {
    if !class.starts_with('^') {
        out.push('[');
        out.push_str(class);
        out.push(']');
        return;
    }

    let rest = class.trim_start_matches(['^', '!']);
    let literals = &class[..class.len() - rest.len()];

    out.push('{');
    let mut first = true;
    for literal in literals.chars() {
        if !first {
            out.push(',');
        }
        out.push(literal);
        first = false;
    }
    if !rest.is_empty() {
        out.push_str(",[");
        out.push_str(rest);
        out.push(']');
    }
    out.push('}');
}

fn compile(pattern: &str) -> Option<Glob> {
    match GlobBuilder::new(&fnmatch_to_glob(pattern))
        .literal_separator(false)
        .backslash_escape(false)
        .build()
    {
        Ok(glob) => Some(glob),
        Err(e) => {
            warn!(pattern = %pattern, error = %e, "Invalid ignore pattern, it will never match");
            None
        }
    }
}

/// Ignore patterns compiled once per run.
#[derive(Debug, Clone)]
pub struct IgnoreList {
    set: GlobSet,
    raw: Vec<String>,
}

impl IgnoreList {
    pub fn new(raw: Vec<String>) -> Self {
        let mut builder = GlobSetBuilder::new();
        for glob in raw.iter().filter_map(|pattern| compile(pattern)) {
            builder.add(glob);
        }

        let set = builder.build().unwrap_or_else(|e| {
            warn!(error = %e, "Failed to build ignore set, nothing will be ignored");
            GlobSet::empty()
        });

        Self { set, raw }
    }

    /// Load and compile the ignore file at `path`.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        Ok(Self::new(load_patterns(path)?))
    }

    /// Returns true if `filename` should be skipped.
    pub fn is_ignored(&self, filename: &str) -> bool {
        self.set.is_match(filename)
    }

    /// Number of patterns as read from the file, including invalid ones.
    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn patterns(&self) -> &[String] {
        &self.raw
    }
}

impl Default for IgnoreList {
    fn default() -> Self {
        Self {
            set: GlobSet::empty(),
            raw: Vec::new(),
        }
    }
}
