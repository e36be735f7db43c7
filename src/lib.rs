//! Shared-library dependency resolution and bundling.
//!
//! Finds every shared library a binary needs at runtime so they can be
//! copied next to it for redistribution. Raw references come from the
//! platform's own dependency lister (`ldd` on Linux, `otool -L` on macOS,
//! `dumpbin /dependents` on Windows) and are resolved to files on disk
//! against a search path, following versioned names, framework bundles and
//! `@rpath` tokens. Whitelisted dependencies are neither reported nor
//! scanned.

mod analyze;
mod copy;
mod error;
mod paths;
pub mod platform;
mod tool;
mod whitelist;

pub use analyze::{resolve_dependencies, ResolveOptions};
pub use copy::{bundle, copy_dir_recursive, plan_bundle, CopyAction};
pub use error::{ResolveError, ResolveStage, ToolError};
pub use paths::{absolutize, find_in_search_path, normalize_lexically, search_dirs_from_args};
pub use platform::{Platform, PlatformAdapter, ToolConfig};
pub use tool::{NativeTool, ToolOutput, DEFAULT_TOOL_TIMEOUT};
pub use whitelist::{expand_whitelist_entries, Whitelist};
