//! Platform adapters.
//!
//! Each supported operating system pairs an extractor (which runs the native
//! dependency lister on one binary) with a normalizer (which turns the raw
//! references it prints into files on disk). The pair is selected once per
//! run via [`Platform::adapter`].

mod linux;
mod macos;
mod windows;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ResolveError;
use crate::tool::DEFAULT_TOOL_TIMEOUT;

pub use linux::{normalize_linux, parse_ldd_output, strip_so_version, LinuxAdapter};
pub use macos::{
    is_framework_bundle, normalize_macos, parse_otool_output, strip_dylib_version,
    truncate_framework, MacOsAdapter,
};
pub use windows::{
    is_api_set_dll, normalize_windows, parse_dumpbin_output, parse_msys_root, WindowsAdapter,
};

/// Operating system the run is resolving for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    Linux,
    MacOs,
    Windows,
}

impl Platform {
    /// The platform this process is running on.
    pub fn current() -> Result<Self, ResolveError> {
        Self::from_os_name(std::env::consts::OS)
    }

    /// Map an OS identifier to a platform.
    ///
    /// Accepts Rust's `std::env::consts::OS` values as well as `uname -s`
    /// style names (`Linux`, `Darwin`, `MINGW64_NT-10.0`).
    pub fn from_os_name(os: &str) -> Result<Self, ResolveError> {
        let base = os.split('-').next().unwrap_or(os).to_ascii_lowercase();
        match base.as_str() {
            "linux" => Ok(Self::Linux),
            "macos" | "darwin" => Ok(Self::MacOs),
            "windows" | "mingw64_nt" | "mingw32_nt" | "msys_nt" => Ok(Self::Windows),
            _ => Err(ResolveError::UnsupportedPlatform { os: os.to_string() }),
        }
    }

    /// Whitelist comparisons are case-sensitive everywhere except Windows.
    pub fn case_sensitive(self) -> bool {
        !matches!(self, Self::Windows)
    }

    /// Build the extractor/normalizer pair for this platform.
    pub fn adapter(self, config: &ToolConfig) -> Box<dyn PlatformAdapter> {
        match self {
            Self::Linux => Box::new(LinuxAdapter::new(config)),
            Self::MacOs => Box::new(MacOsAdapter::new(config)),
            Self::Windows => Box::new(WindowsAdapter::new(config)),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Linux => "linux",
            Self::MacOs => "macos",
            Self::Windows => "windows",
        };
        f.write_str(name)
    }
}

/// Settings for the native tools the adapters invoke.
#[derive(Debug, Clone)]
pub struct ToolConfig {
    /// Upper bound for a single tool invocation.
    pub timeout: Duration,
    /// `dumpbin` executable used on Windows.
    pub dumpbin: PathBuf,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TOOL_TIMEOUT,
            dumpbin: PathBuf::from("dumpbin"),
        }
    }
}

/// Per-platform extraction and normalization.
pub trait PlatformAdapter {
    fn platform(&self) -> Platform;

    /// List the raw dependency references recorded in `binary`.
    ///
    /// Each call re-runs the native tool.
    fn extract(&self, binary: &Path) -> Result<Vec<String>, ResolveError>;

    /// Resolve a raw reference against `search_path`, or `None` if no
    /// normalization step finds it.
    fn normalize(&self, reference: &str, search_path: &[PathBuf]) -> Option<PathBuf>;

    fn case_sensitive(&self) -> bool {
        self.platform().case_sensitive()
    }

    /// System library directories searched after user-supplied ones.
    fn default_search_paths(&self) -> Vec<PathBuf>;
}
