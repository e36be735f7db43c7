//! Integration tests for bundle-deps using real system binaries.

#![cfg(target_os = "linux")]

use bundle_deps::{
    resolve_dependencies, Platform, PlatformAdapter, ResolveError, ResolveOptions, ResolveStage,
    ToolConfig, Whitelist,
};
use std::error::Error;
use std::path::Path;

fn linux_adapter() -> Box<dyn PlatformAdapter> {
    Platform::Linux.adapter(&ToolConfig::default())
}

fn system_options(adapter: &dyn PlatformAdapter, recursive: bool) -> ResolveOptions {
    ResolveOptions {
        search_paths: adapter.default_search_paths(),
        recursive,
        ..Default::default()
    }
}

#[test]
fn test_extract_deps_of_real_binary() {
    // /bin/sh exists on all Linux systems and is dynamically linked
    let deps = linux_adapter().extract(Path::new("/bin/sh")).unwrap();
    // Should have at least libc dependency
    assert!(
        deps.iter().any(|d| d.contains("libc")),
        "Expected libc dependency in /bin/sh, got: {:?}",
        deps
    );
    assert!(
        !deps.iter().any(|d| d.contains("linux-vdso")),
        "vdso must never be reported, got: {:?}",
        deps
    );
}

#[test]
fn test_resolve_real_binary() {
    let adapter = linux_adapter();
    let options = system_options(adapter.as_ref(), true);
    let deps = resolve_dependencies(adapter.as_ref(), Path::new("/bin/sh"), &options).unwrap();

    assert!(
        deps.iter().all(|d| d.is_absolute() && d.is_file()),
        "Every resolved dependency must be an existing file, got: {:?}",
        deps
    );
    assert!(
        deps.iter()
            .any(|d| d.file_name().is_some_and(|n| n.to_string_lossy().starts_with("libc"))),
        "Expected libc in closure of /bin/sh, got: {:?}",
        deps
    );
}

#[test]
fn test_whitelisting_libc_by_name() {
    let adapter = linux_adapter();
    let mut options = system_options(adapter.as_ref(), false);
    options.whitelist = Whitelist::new(["libc.so.6"], adapter.case_sensitive());

    let deps = resolve_dependencies(adapter.as_ref(), Path::new("/bin/sh"), &options).unwrap();
    assert!(
        !deps
            .iter()
            .any(|d| d.file_name().is_some_and(|n| n == "libc.so.6")),
        "Whitelisted libc must not be reported, got: {:?}",
        deps
    );
}

#[test]
fn test_nonexistent_binary() {
    let adapter = linux_adapter();
    let result = resolve_dependencies(
        adapter.as_ref(),
        Path::new("/nonexistent/path/to/binary"),
        &ResolveOptions::default(),
    );
    let err = result.expect_err("Expected error for nonexistent file");
    assert_eq!(err.stage(), ResolveStage::Extraction);
    let cause = err
        .source()
        .map(ToString::to_string)
        .unwrap_or_default();
    assert!(
        cause.contains("does not exist"),
        "Expected 'does not exist' in error cause, got: {}",
        cause
    );
}

#[test]
fn test_non_elf_file() {
    // /etc/passwd is a text file, not an ELF binary
    let deps = resolve_dependencies(
        linux_adapter().as_ref(),
        Path::new("/etc/passwd"),
        &ResolveOptions::default(),
    )
    .unwrap();
    assert!(
        deps.is_empty(),
        "Expected empty deps for non-ELF file, got: {:?}",
        deps
    );
}

#[test]
fn test_unsupported_platform_is_startup_error() {
    let err = Platform::from_os_name("haiku").unwrap_err();
    assert!(matches!(err, ResolveError::UnsupportedPlatform { .. }));
    assert_eq!(err.stage(), ResolveStage::Startup);
}
