//! Dependencies assumed present on the deployment target.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// A set of excluded dependencies.
///
/// Entries are either bare library names (`libc.so.6`, `KERNEL32.dll`) or
/// full resolved paths. Comparison is exact unless the platform is case
/// insensitive, in which case both sides are lowercased.
#[derive(Debug, Clone, Default)]
pub struct Whitelist {
    entries: HashSet<String>,
    case_sensitive: bool,
}

impl Whitelist {
    pub fn new<I, S>(entries: I, case_sensitive: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries = entries
            .into_iter()
            .map(Into::into)
            .map(|entry| fold(entry, case_sensitive))
            .collect();
        Self {
            entries,
            case_sensitive,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn contains(&self, dep: &str) -> bool {
        if self.case_sensitive {
            self.entries.contains(dep)
        } else {
            self.entries.contains(&dep.to_lowercase())
        }
    }

    /// Whether a dependency is excluded, matching its resolved path, the raw
    /// reference it came from, or the resolved file name.
    pub fn is_excluded(&self, reference: &str, resolved: &Path) -> bool {
        if self.is_empty() {
            return false;
        }
        self.contains(&resolved.to_string_lossy())
            || self.contains(reference)
            || resolved
                .file_name()
                .is_some_and(|name| self.contains(&name.to_string_lossy()))
    }
}

pub(crate) fn fold(entry: String, case_sensitive: bool) -> String {
    if case_sensitive {
        entry
    } else {
        entry.to_lowercase()
    }
}

/// Expand whitelist arguments.
///
/// An argument of the form `@path` is replaced by the lines of that file
/// (trailing whitespace stripped, blank lines skipped). Anything else,
/// including a lone `@`, is taken literally.
pub fn expand_whitelist_entries<S: AsRef<str>>(args: &[S]) -> Result<Vec<String>> {
    let mut entries = Vec::new();
    for arg in args {
        let arg = arg.as_ref();
        match arg.strip_prefix('@').filter(|rest| !rest.is_empty()) {
            Some(file) => {
                let content = fs::read_to_string(file)
                    .with_context(|| format!("Failed to read whitelist file: {}", file))?;
                entries.extend(
                    content
                        .lines()
                        .map(str::trim_end)
                        .filter(|line| !line.is_empty())
                        .map(str::to_string),
                );
            }
            None => entries.push(arg.to_string()),
        }
    }
    Ok(entries)
}
