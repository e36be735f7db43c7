//! Dependency closure of a binary.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use crate::error::ResolveError;
use crate::paths::{absolutize, containing_dir};
use crate::platform::PlatformAdapter;
use crate::whitelist::{fold, Whitelist};

/// Inputs for one resolution run.
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Extra directories searched after the inspected binary's own directory.
    /// Earlier entries win.
    pub search_paths: Vec<PathBuf>,
    /// Dependencies never reported and never scanned.
    pub whitelist: Whitelist,
    /// Follow dependencies of dependencies. When false only the root's
    /// direct dependencies are reported.
    pub recursive: bool,
    /// Search the directory of the binary being inspected first.
    pub search_in_target_dir: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            search_paths: Vec::new(),
            whitelist: Whitelist::default(),
            recursive: true,
            search_in_target_dir: true,
        }
    }
}

/// Resolve the shared-library dependencies of `root`.
///
/// The root itself is never part of the result. Each distinct resolved
/// file is scanned at most once, so cycles and diamonds in the dependency
/// graph cost one tool invocation per file.
///
/// # Errors
///
/// Any unresolvable reference, tool failure, or delay-load detection aborts
/// the whole run; a partial bundle is never returned.
pub fn resolve_dependencies(
    adapter: &dyn PlatformAdapter,
    root: &Path,
    options: &ResolveOptions,
) -> Result<BTreeSet<PathBuf>, ResolveError> {
    Traversal::new(adapter, options).run(root)
}

/// Work queue, visited set and results of a single walk.
struct Traversal<'a> {
    adapter: &'a dyn PlatformAdapter,
    options: &'a ResolveOptions,
    to_process: Vec<PathBuf>,
    /// Keyed by [`Traversal::visit_key`]; results keep the first spelling seen.
    visited: HashSet<PathBuf>,
    resolved: BTreeSet<PathBuf>,
}

impl<'a> Traversal<'a> {
    fn new(adapter: &'a dyn PlatformAdapter, options: &'a ResolveOptions) -> Self {
        Self {
            adapter,
            options,
            to_process: Vec::new(),
            visited: HashSet::new(),
            resolved: BTreeSet::new(),
        }
    }

    fn run(mut self, root: &Path) -> Result<BTreeSet<PathBuf>, ResolveError> {
        let root = absolutize(root);
        // Marked visited so self-references and cycles back to it are dropped
        self.visited.insert(self.visit_key(&root));
        self.scan(&root)?;

        while let Some(node) = self.to_process.pop() {
            self.scan(&node)?;
        }

        tracing::debug!(
            root = %root.display(),
            count = self.resolved.len(),
            "dependency resolution finished"
        );
        Ok(self.resolved)
    }

    /// Identity of a path in the visited set. Case-folded where the
    /// platform's filesystem is case-insensitive.
    fn visit_key(&self, path: &Path) -> PathBuf {
        if self.adapter.case_sensitive() {
            path.to_path_buf()
        } else {
            PathBuf::from(fold(path.to_string_lossy().into_owned(), false))
        }
    }

    fn search_path_for(&self, node: &Path) -> Vec<PathBuf> {
        let mut search_path = Vec::with_capacity(self.options.search_paths.len() + 1);
        if self.options.search_in_target_dir {
            search_path.push(containing_dir(node));
        }
        search_path.extend(self.options.search_paths.iter().cloned());
        search_path
    }

    fn scan(&mut self, node: &Path) -> Result<(), ResolveError> {
        let references = self.adapter.extract(node)?;
        tracing::debug!(node = %node.display(), count = references.len(), "scanned");

        let search_path = self.search_path_for(node);
        for reference in references {
            let dep = self
                .adapter
                .normalize(&reference, &search_path)
                .ok_or_else(|| ResolveError::UnresolvedDependency {
                    node: node.to_path_buf(),
                    reference: reference.clone(),
                })?;

            if self.options.whitelist.is_excluded(&reference, &dep) {
                tracing::trace!(dep = %dep.display(), "whitelisted");
                continue;
            }
            if !self.visited.insert(self.visit_key(&dep)) {
                tracing::trace!(dep = %dep.display(), "already visited");
                continue;
            }

            tracing::debug!(reference = %reference, dep = %dep.display(), "found dependency");
            self.resolved.insert(dep.clone());
            if self.options.recursive {
                self.to_process.push(dep);
            }
        }

        Ok(())
    }
}
