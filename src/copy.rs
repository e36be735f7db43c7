//! Staging resolved dependencies next to the target binary.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// One file or framework bundle to copy into the bundle directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyAction {
    pub source: PathBuf,
    pub dest: PathBuf,
}

impl CopyAction {
    pub fn is_dir(&self) -> bool {
        self.source.is_dir()
    }

    /// Copy the source to its destination.
    pub fn perform(&self) -> Result<()> {
        tracing::debug!("{self}");
        if self.is_dir() {
            copy_dir_recursive(&self.source, &self.dest)?;
        } else {
            fs::copy(&self.source, &self.dest).with_context(|| {
                format!(
                    "Failed to copy {} to {}",
                    self.source.display(),
                    self.dest.display()
                )
            })?;
        }
        Ok(())
    }
}

impl fmt::Display for CopyAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let flags = if self.is_dir() { "-a " } else { "" };
        write!(
            f,
            "cp {}{} {}",
            flags,
            self.source.display(),
            self.dest.display()
        )
    }
}

/// Work out which dependencies need copying into `target_dir`.
///
/// Each dependency lands at `target_dir/<file name>`. Dependencies already
/// in place, or whose destination exists, are skipped. Sources that do not
/// exist (unlocated Windows system DLLs) are skipped with a warning. When two
/// dependencies share a file name the first one keeps the destination.
pub fn plan_bundle<'a, I>(deps: I, target_dir: &Path) -> Vec<CopyAction>
where
    I: IntoIterator<Item = &'a PathBuf>,
{
    let mut actions = Vec::new();
    let mut claimed: HashMap<PathBuf, &PathBuf> = HashMap::new();
    for dep in deps {
        let Some(name) = dep.file_name() else {
            continue;
        };
        let dest = target_dir.join(name);
        if *dep == dest || dest.exists() || dest.is_symlink() {
            continue;
        }
        if !dep.exists() {
            tracing::warn!(dep = %dep.display(), "dependency not on disk, not bundled");
            continue;
        }
        if let Some(kept) = claimed.get(&dest) {
            tracing::warn!(
                kept = %kept.display(),
                skipped = %dep.display(),
                dest = %dest.display(),
                "two dependencies share a file name, bundling the first"
            );
            continue;
        }
        claimed.insert(dest.clone(), dep);
        actions.push(CopyAction {
            source: dep.clone(),
            dest,
        });
    }
    actions
}

/// Copy resolved dependencies into `target_dir`.
///
/// `report` sees each action before it is performed, so progress output
/// stays accurate when a later copy fails. With `dry_run` actions are only
/// reported. Returns the actions that were (or would have been) performed.
pub fn bundle<'a, I>(
    deps: I,
    target_dir: &Path,
    dry_run: bool,
    mut report: impl FnMut(&CopyAction),
) -> Result<Vec<CopyAction>>
where
    I: IntoIterator<Item = &'a PathBuf>,
{
    let actions = plan_bundle(deps, target_dir);
    for action in &actions {
        report(action);
        if !dry_run {
            action.perform()?;
        }
    }
    Ok(actions)
}

/// Copy a directory recursively, preserving symlinks.
///
/// Framework bundles rely on `Versions/Current` style links, so links are
/// recreated rather than followed.
///
/// Returns the total size in bytes of all files copied.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> Result<u64> {
    let mut total_size: u64 = 0;

    if !src.is_dir() {
        return Ok(0);
    }

    fs::create_dir_all(dst)
        .with_context(|| format!("Failed to create directory: {}", dst.display()))?;

    for entry in fs::read_dir(src)
        .with_context(|| format!("Failed to read directory: {}", src.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        let dest_path = dst.join(entry.file_name());

        if path.is_symlink() {
            copy_symlink(&path, &dest_path)?;
        } else if path.is_dir() {
            total_size += copy_dir_recursive(&path, &dest_path)?;
        } else {
            total_size += fs::copy(&path, &dest_path)
                .with_context(|| format!("Failed to copy {}", path.display()))?;
        }
    }

    Ok(total_size)
}

#[cfg(unix)]
fn copy_symlink(link: &Path, dest: &Path) -> Result<()> {
    let target = fs::read_link(link)?;
    if !dest.exists() && !dest.is_symlink() {
        std::os::unix::fs::symlink(&target, dest).with_context(|| {
            format!(
                "Failed to create symlink {} -> {}",
                dest.display(),
                target.display()
            )
        })?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn copy_symlink(link: &Path, dest: &Path) -> Result<()> {
    if link.is_dir() {
        copy_dir_recursive(link, dest)?;
    } else {
        fs::copy(link, dest).with_context(|| format!("Failed to copy {}", link.display()))?;
    }
    Ok(())
}
