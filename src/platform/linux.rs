//! Linux: `ldd` output and versioned `.so` names.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use super::{Platform, PlatformAdapter, ToolConfig};
use crate::error::{ResolveError, ToolError};
use crate::paths::{find_in_search_path, is_existing_file};
use crate::tool::NativeTool;

/// Kernel-provided pseudo library, never present on disk.
const VDSO: &str = "linux-vdso.so.1";

static LDD_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*((\S+) => )?((\S*) \((0x[0-9a-fA-F]+)\)|not found)\s*$")
        .expect("static regex")
});

static SO_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*)\.so(\.\d+)(.*)$").expect("static regex"));

pub struct LinuxAdapter {
    ldd: NativeTool,
}

impl LinuxAdapter {
    pub fn new(config: &ToolConfig) -> Self {
        Self {
            ldd: NativeTool::new("ldd").timeout(config.timeout),
        }
    }
}

impl PlatformAdapter for LinuxAdapter {
    fn platform(&self) -> Platform {
        Platform::Linux
    }

    fn extract(&self, binary: &Path) -> Result<Vec<String>, ResolveError> {
        // Check file exists first for a clear error message
        if !binary.exists() {
            return Err(ResolveError::tool(
                &self.ldd.name(),
                binary,
                ToolError::Other("file does not exist".to_string()),
            ));
        }

        let output = self
            .ldd
            .run(binary)
            .map_err(|e| ResolveError::tool(&self.ldd.name(), binary, e))?;

        if !output.status.success() {
            // These are legitimate "no shared libraries" cases, not errors
            let text = format!("{}{}", output.stdout, output.stderr);
            if text.contains("not a dynamic executable") || text.contains("statically linked") {
                return Ok(Vec::new());
            }
        }

        let output = output
            .into_success()
            .map_err(|e| ResolveError::tool(&self.ldd.name(), binary, e))?;
        Ok(parse_ldd_output(&output.stdout))
    }

    fn normalize(&self, reference: &str, search_path: &[PathBuf]) -> Option<PathBuf> {
        normalize_linux(reference, search_path)
    }

    fn default_search_paths(&self) -> Vec<PathBuf> {
        let triple = format!("{}-linux-gnu", std::env::consts::ARCH);
        vec![
            PathBuf::from("/lib"),
            Path::new("/lib").join(&triple),
            PathBuf::from("/lib64"),
            PathBuf::from("/usr/lib"),
            Path::new("/usr/lib").join(&triple),
            PathBuf::from("/usr/lib64"),
            PathBuf::from("/usr/local/lib"),
        ]
    }
}

/// Parse `ldd` output into raw dependency references.
///
/// Example ldd output:
/// ```text
///     linux-vdso.so.1 (0x00007ffd5a1e6000)
///     libtinfo.so.6 => /lib/x86_64-linux-gnu/libtinfo.so.6 (0x00007f0e1c2a0000)
///     libmissing.so.2 => not found
///     /lib64/ld-linux-x86-64.so.2 (0x00007f0e1c4f0000)
/// ```
///
/// The name before `=>` is preferred; unresolved entries still yield their
/// name so normalization can look for them itself.
pub fn parse_ldd_output(output: &str) -> Vec<String> {
    output
        .lines()
        .filter_map(|line| {
            let caps = LDD_LINE.captures(line)?;
            let name = caps.get(2).or_else(|| caps.get(4))?.as_str();
            (!name.is_empty() && name != VDSO).then(|| name.to_string())
        })
        .collect()
}

/// Drop one version component after `.so`: `libfoo.so.1.2` becomes `libfoo.so.2`.
///
/// Returns `None` once no version component is left.
pub fn strip_so_version(name: &str) -> Option<String> {
    let caps = SO_VERSION.captures(name)?;
    Some(format!("{}.so{}", &caps[1], &caps[3]))
}

/// Resolve a Linux reference: search path lookup, then repeated version stripping.
pub fn normalize_linux(reference: &str, search_path: &[PathBuf]) -> Option<PathBuf> {
    let mut current = reference.to_string();
    loop {
        if let Some(found) = find_in_search_path(&current, search_path, is_existing_file) {
            if current != reference {
                tracing::debug!(reference, resolved = %found.display(), "resolved after version stripping");
            }
            return Some(found);
        }
        current = strip_so_version(&current)?;
    }
}
