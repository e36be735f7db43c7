//! macOS: `otool -L` output, framework bundles and `@rpath` tokens.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use super::{Platform, PlatformAdapter, ToolConfig};
use crate::error::ResolveError;
use crate::paths::{absolutize, find_in_search_path};
use crate::tool::NativeTool;

/// Tokens the dynamic loader expands relative to a search directory.
const SEARCH_TOKENS: [&str; 2] = ["@rpath/", "@loader_path/"];

static OTOOL_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(\S+) \(.*\)\s*$").expect("static regex"));

static DYLIB_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*)(\.\d+)\.dylib$").expect("static regex"));

pub struct MacOsAdapter {
    otool: NativeTool,
}

impl MacOsAdapter {
    pub fn new(config: &ToolConfig) -> Self {
        Self {
            otool: NativeTool::new("otool").args(["-L"]).timeout(config.timeout),
        }
    }
}

impl PlatformAdapter for MacOsAdapter {
    fn platform(&self) -> Platform {
        Platform::MacOs
    }

    fn extract(&self, binary: &Path) -> Result<Vec<String>, ResolveError> {
        // Frameworks are bundled whole, never scanned
        if is_framework_bundle(binary) {
            return Ok(Vec::new());
        }

        let output = self
            .otool
            .run(binary)
            .and_then(|out| out.into_success())
            .map_err(|e| ResolveError::tool(&self.otool.name(), binary, e))?;

        Ok(parse_otool_output(&output.stdout))
    }

    fn normalize(&self, reference: &str, search_path: &[PathBuf]) -> Option<PathBuf> {
        normalize_macos(reference, search_path)
    }

    fn default_search_paths(&self) -> Vec<PathBuf> {
        vec![PathBuf::from("/usr/local/lib")]
    }
}

/// A directory whose name ends in `.framework`.
pub fn is_framework_bundle(path: &Path) -> bool {
    path.is_dir() && has_framework_suffix(path.as_os_str().to_string_lossy().trim_end_matches('/'))
}

fn has_framework_suffix(component: &str) -> bool {
    component.len() > ".framework".len() && component.ends_with(".framework")
}

fn exists_macos(path: &Path) -> bool {
    path.is_file() || is_framework_bundle(path)
}

/// Parse `otool -L` output into raw dependency references.
///
/// Example otool output:
/// ```text
/// /usr/local/bin/app:
///     @rpath/libbar.dylib (compatibility version 1.0.0, current version 1.2.0)
///     /usr/lib/libSystem.B.dylib (compatibility version 1.0.0, current version 1311.0.0)
/// ```
pub fn parse_otool_output(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| OTOOL_LINE.captures(line))
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Cut a reference after its first `.framework` component.
///
/// `/Library/Frameworks/Qt.framework/Versions/5/Qt` becomes
/// `/Library/Frameworks/Qt.framework`. References outside a framework are
/// returned unchanged.
pub fn truncate_framework(reference: &str) -> String {
    let mut kept = Vec::new();
    for component in reference.split('/') {
        kept.push(component);
        if has_framework_suffix(component) {
            break;
        }
    }
    kept.join("/")
}

/// Drop the last numeric component before `.dylib`: `libfoo.1.2.dylib` becomes `libfoo.1.dylib`.
pub fn strip_dylib_version(name: &str) -> Option<String> {
    let caps = DYLIB_VERSION.captures(name)?;
    Some(format!("{}.dylib", &caps[1]))
}

fn substitute_tokens(reference: &str, search_path: &[PathBuf]) -> Option<Option<PathBuf>> {
    let rest = SEARCH_TOKENS
        .iter()
        .find_map(|token| reference.strip_prefix(token))?;
    Some(
        search_path
            .iter()
            .map(|dir| dir.join(rest))
            .find(|candidate| exists_macos(candidate))
            .map(|found| absolutize(&found)),
    )
}

/// Resolve a macOS reference.
///
/// Each attempt truncates framework sub-paths, then expands `@rpath/` and
/// `@loader_path/` against the search path (or does a plain search path
/// lookup for other references). If nothing exists, one version component
/// is stripped from a `.dylib` name and the attempt repeats.
pub fn normalize_macos(reference: &str, search_path: &[PathBuf]) -> Option<PathBuf> {
    let mut current = reference.to_string();
    loop {
        let candidate = truncate_framework(&current);
        let found = match substitute_tokens(&candidate, search_path) {
            Some(expanded) => expanded,
            None => find_in_search_path(&candidate, search_path, exists_macos),
        };
        if found.is_some() {
            return found;
        }
        current = strip_dylib_version(&candidate)?;
    }
}
