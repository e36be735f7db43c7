//! Search-path lookup and path normalization helpers.

use std::path::{Component, Path, PathBuf};

/// Find a dependency reference on disk.
///
/// Tries the reference as given first, then joined onto each search
/// directory in order. The first candidate accepted by `exists` wins and is
/// returned in absolute, normalized form.
///
/// Returns `None` if no candidate exists.
#[must_use = "found dependency path should be used"]
pub fn find_in_search_path(
    reference: &str,
    search_path: &[PathBuf],
    exists: impl Fn(&Path) -> bool,
) -> Option<PathBuf> {
    let reference = Path::new(reference);
    std::iter::once(reference.to_path_buf())
        .chain(search_path.iter().map(|dir| dir.join(reference)))
        .find(|candidate| exists(candidate.as_path()))
        .map(|found| absolutize(&found))
}

/// A regular file, following symlinks.
pub fn is_existing_file(path: &Path) -> bool {
    path.is_file()
}

/// Make `path` absolute (relative to the working directory) and fold `.`
/// and `..` components without touching the filesystem.
pub fn absolutize(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    normalize_lexically(&absolute)
}

/// Fold `.` and `..` components lexically.
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else if !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}

/// Directory containing `binary`, in absolute form.
pub fn containing_dir(binary: &Path) -> PathBuf {
    let absolute = absolutize(binary);
    absolute
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or(absolute)
}

/// Reduce user-supplied search entries to directories.
///
/// An entry naming an existing file is replaced by its parent directory,
/// so `-L /opt/qt/lib/libQt5Core.so` searches `/opt/qt/lib`.
pub fn search_dirs_from_args<S: AsRef<str>>(entries: &[S]) -> Vec<PathBuf> {
    entries
        .iter()
        .map(|entry| {
            let path = Path::new(entry.as_ref());
            if path.is_file() {
                path.parent().map(Path::to_path_buf).unwrap_or_default()
            } else {
                path.to_path_buf()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, b"\x7fELF").unwrap();
    }

    #[test]
    fn test_find_existing_reference_unchanged() {
        let temp = TempDir::new().unwrap();
        let lib = temp.path().join("libfoo.so.1");
        touch(&lib);

        let other = temp.path().join("other");
        fs::create_dir_all(&other).unwrap();
        touch(&other.join("libfoo.so.1"));

        let found = find_in_search_path(lib.to_str().unwrap(), &[other], is_existing_file);
        assert_eq!(found, Some(lib));
    }

    #[test]
    fn test_find_search_order() {
        let temp = TempDir::new().unwrap();
        let first = temp.path().join("first");
        let second = temp.path().join("second");
        touch(&first.join("libdup.so"));
        touch(&second.join("libdup.so"));

        let found = find_in_search_path("libdup.so", &[second.clone(), first], is_existing_file);
        assert_eq!(found, Some(second.join("libdup.so")));
    }

    #[test]
    fn test_find_not_found() {
        let temp = TempDir::new().unwrap();
        let found = find_in_search_path(
            "libnothere.so",
            &[temp.path().to_path_buf()],
            is_existing_file,
        );
        assert!(found.is_none());
    }

    #[test]
    fn test_directories_are_not_files() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("libdir.so")).unwrap();
        let found = find_in_search_path(
            "libdir.so",
            &[temp.path().to_path_buf()],
            is_existing_file,
        );
        assert!(found.is_none());
    }

    #[test]
    fn test_normalize_lexically() {
        assert_eq!(
            normalize_lexically(Path::new("/opt/app/bin/../lib/./libx.so")),
            PathBuf::from("/opt/app/lib/libx.so")
        );
        assert_eq!(normalize_lexically(Path::new("/../lib")), PathBuf::from("/lib"));
        assert_eq!(normalize_lexically(Path::new("../a/b/..")), PathBuf::from("../a"));
        assert_eq!(normalize_lexically(Path::new("./")), PathBuf::from("."));
    }

    #[test]
    fn test_containing_dir() {
        assert_eq!(
            containing_dir(Path::new("/opt/app/bin/app")),
            PathBuf::from("/opt/app/bin")
        );
    }

    #[test]
    fn test_search_dirs_reduce_files_to_parent() {
        let temp = TempDir::new().unwrap();
        let lib = temp.path().join("lib/libQt5Core.so");
        touch(&lib);
        let dir = temp.path().join("plugins");

        let entries = vec![
            lib.to_string_lossy().into_owned(),
            dir.to_string_lossy().into_owned(),
        ];
        let dirs = search_dirs_from_args(&entries);
        assert_eq!(dirs, vec![temp.path().join("lib"), dir]);
    }
}
