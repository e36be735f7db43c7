//! Windows: `dumpbin /dependents` output and API-set stub filtering.

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use super::{Platform, PlatformAdapter, ToolConfig};
use crate::error::ResolveError;
use crate::paths::{find_in_search_path, is_existing_file, normalize_lexically};
use crate::tool::NativeTool;

const DEPENDENCIES_HEADER: &str = "Image has the following dependencies";
const DELAY_LOAD_HEADER: &str = "Image has the following delay load dependencies";
const DEFAULT_WINDIR: &str = "c:/windows";
const DEFAULT_MSYS_ROOT: &str = "c:/msys64";

static SUMMARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bSummary\b").expect("static regex"));

static API_SET_DLL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(api|ext)-ms-(win|onecore|onecoreuap|mf)-.*\.dll$").expect("static regex")
});

pub struct WindowsAdapter {
    dumpbin: NativeTool,
    mount: NativeTool,
}

impl WindowsAdapter {
    pub fn new(config: &ToolConfig) -> Self {
        Self {
            // Keep the MSYS2 shell from rewriting `/dependents` into a path
            dumpbin: NativeTool::new(&config.dumpbin)
                .args(["/dependents"])
                .env("MSYS2_ARG_CONV_EXCL", "/dependents")
                .timeout(config.timeout),
            mount: NativeTool::new("mount").timeout(config.timeout),
        }
    }

    fn msys_root(&self) -> String {
        match self.mount.run_bare().and_then(|out| out.into_success()) {
            Ok(out) => parse_msys_root(&out.stdout).unwrap_or_else(|| DEFAULT_MSYS_ROOT.to_string()),
            Err(e) => {
                tracing::debug!(error = %e, "mount table unavailable, assuming {DEFAULT_MSYS_ROOT}");
                DEFAULT_MSYS_ROOT.to_string()
            }
        }
    }
}

impl PlatformAdapter for WindowsAdapter {
    fn platform(&self) -> Platform {
        Platform::Windows
    }

    fn extract(&self, binary: &Path) -> Result<Vec<String>, ResolveError> {
        // Unlocated system DLLs come back from normalization as-is
        if !binary.exists() {
            return Ok(Vec::new());
        }

        let output = self
            .dumpbin
            .run(binary)
            .and_then(|out| out.into_success())
            .map_err(|e| ResolveError::tool(&self.dumpbin.name(), binary, e))?;

        parse_dumpbin_output(binary, &output.stdout)
    }

    fn normalize(&self, reference: &str, search_path: &[PathBuf]) -> Option<PathBuf> {
        Some(normalize_windows(reference, search_path))
    }

    fn default_search_paths(&self) -> Vec<PathBuf> {
        let windir = std::env::var("WINDIR")
            .map(|dir| dir.replace('\\', "/"))
            .unwrap_or_else(|_| DEFAULT_WINDIR.to_string());
        vec![
            Path::new(&windir).join("system32"),
            Path::new(&self.msys_root()).join("mingw64").join("bin"),
        ]
    }
}

/// Windows API-set stub DLLs (`api-ms-win-*`, `ext-ms-*`), resolved by the
/// loader itself and never present as real files.
pub fn is_api_set_dll(name: &str) -> bool {
    API_SET_DLL.is_match(name)
}

/// Parse `dumpbin /dependents` output into DLL names.
///
/// Example dumpbin output:
/// ```text
/// Dump of file app.exe
///
/// File Type: EXECUTABLE IMAGE
///
///   Image has the following dependencies:
///
///     Qt5Core.dll
///     KERNEL32.dll
///     api-ms-win-crt-runtime-l1-1-0.dll
///
///   Summary
/// ```
///
/// A non-stub DLL listed under the delay load header is an error: delay
/// loaded dependencies cannot be trusted from static inspection.
pub fn parse_dumpbin_output(binary: &Path, output: &str) -> Result<Vec<String>, ResolveError> {
    let mut libs = Vec::new();
    let mut in_section = false;
    let mut delay_load = false;

    for line in output.lines().map(str::trim) {
        if line.contains(DEPENDENCIES_HEADER) {
            in_section = true;
            continue;
        }
        if SUMMARY.is_match(line) {
            in_section = false;
            continue;
        }
        if line.contains(DELAY_LOAD_HEADER) {
            delay_load = true;
            continue;
        }
        if !in_section || line.is_empty() || line.contains(char::is_whitespace) {
            continue;
        }
        if is_api_set_dll(line) {
            continue;
        }
        if delay_load {
            return Err(ResolveError::DelayLoadDetected {
                node: binary.to_path_buf(),
                dependency: line.to_string(),
            });
        }
        libs.push(line.to_string());
    }

    Ok(libs)
}

/// Search path lookup only. A DLL that cannot be found is returned as a
/// normalized but non-existent path rather than failing.
pub fn normalize_windows(reference: &str, search_path: &[PathBuf]) -> PathBuf {
    find_in_search_path(reference, search_path, is_existing_file).unwrap_or_else(|| {
        tracing::warn!(reference, "DLL not found in search path, keeping reference as-is");
        normalize_lexically(Path::new(reference))
    })
}

/// Find the directory MSYS2 mounts on `/` in `mount` output.
pub fn parse_msys_root(output: &str) -> Option<String> {
    output.lines().find_map(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        match fields.as_slice() {
            [source, "on", "/", ..] => Some(source.to_string()),
            _ => None,
        }
    })
}
