//! Error types for dependency resolution.

use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::time::Duration;
use thiserror::Error;

/// Failure of a single native tool invocation.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("could not start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error while running tool: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("exited with {status}: {stderr}")]
    Failed { status: ExitStatus, stderr: String },

    #[error("{0}")]
    Other(String),
}

/// Stage of the resolution pipeline an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveStage {
    Startup,
    Extraction,
    Normalization,
    DelayLoad,
}

/// Fatal resolution error. Every variant aborts the whole traversal.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("dependency '{reference}' of {} could not be resolved to any existing file", .node.display())]
    UnresolvedDependency { node: PathBuf, reference: String },

    #[error(
        "{} has delay load dependencies (found {dependency}); verify its runtime dependencies manually",
        .node.display()
    )]
    DelayLoadDetected { node: PathBuf, dependency: String },

    #[error("{tool} failed on {}", .node.display())]
    ToolInvocation {
        tool: String,
        node: PathBuf,
        #[source]
        source: ToolError,
    },

    #[error("unsupported platform: {os}")]
    UnsupportedPlatform { os: String },
}

impl ResolveError {
    pub(crate) fn tool(tool: &str, node: &Path, source: ToolError) -> Self {
        Self::ToolInvocation {
            tool: tool.to_string(),
            node: node.to_path_buf(),
            source,
        }
    }

    pub fn stage(&self) -> ResolveStage {
        match self {
            Self::UnresolvedDependency { .. } => ResolveStage::Normalization,
            Self::DelayLoadDetected { .. } => ResolveStage::DelayLoad,
            Self::ToolInvocation { .. } => ResolveStage::Extraction,
            Self::UnsupportedPlatform { .. } => ResolveStage::Startup,
        }
    }

    /// The binary being inspected when the error occurred.
    pub fn node(&self) -> Option<&Path> {
        match self {
            Self::UnresolvedDependency { node, .. }
            | Self::DelayLoadDetected { node, .. }
            | Self::ToolInvocation { node, .. } => Some(node),
            Self::UnsupportedPlatform { .. } => None,
        }
    }
}
