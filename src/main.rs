//! bundle-deps CLI entry point
//!
//! Scans a binary for the shared libraries it needs and copies them next to
//! it, so the directory can be shipped as a self-contained bundle.

use anyhow::{Context, Result};
use bundle_deps::{
    absolutize, bundle, expand_whitelist_entries, resolve_dependencies, search_dirs_from_args,
    Platform, ResolveOptions, ToolConfig, Whitelist,
};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Copy the shared-library dependencies of a binary next to it.
#[derive(Debug, Parser)]
#[command(name = "bundle-deps", version, about)]
struct Cli {
    /// Crawl dependencies recursively
    #[arg(short, long)]
    recursive: bool,

    /// Just print the files that would be copied without copying them
    #[arg(short = 'n', long)]
    dry_run: bool,

    /// Print performed operations and debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Additional path to search for dependencies (a file stands for its directory)
    #[arg(short = 'L', long = "lib-path", value_name = "PATH")]
    lib_path: Vec<String>,

    /// Dependency to whitelist (never bundled, never scanned). `@FILE` adds
    /// every line of FILE.
    #[arg(short = 'W', long = "whitelist-dep", value_name = "DEP")]
    whitelist_dep: Vec<String>,

    /// Do not search the directory of each inspected binary
    #[arg(long)]
    no_target_dir_search: bool,

    /// Seconds before a native tool invocation is abandoned
    #[arg(long, value_name = "SECS", default_value_t = 60, env = "BUNDLE_DEPS_TOOL_TIMEOUT")]
    tool_timeout: u64,

    /// dumpbin executable used on Windows
    #[arg(long, value_name = "PATH", default_value = "dumpbin", env = "BUNDLE_DEPS_DUMPBIN")]
    dumpbin: PathBuf,

    /// Target to scan for required dependencies
    target: PathBuf,
}

impl Cli {
    fn log_filter(&self) -> EnvFilter {
        let level = if self.verbose { "debug" } else { "warn" };
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    }
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(cli.log_filter())
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let platform = Platform::current()?;
    let adapter = platform.adapter(&ToolConfig {
        timeout: Duration::from_secs(cli.tool_timeout),
        dumpbin: cli.dumpbin.clone(),
    });

    let whitelist = Whitelist::new(
        expand_whitelist_entries(&cli.whitelist_dep)?,
        adapter.case_sensitive(),
    );

    let mut search_paths = search_dirs_from_args(&cli.lib_path);
    search_paths.extend(adapter.default_search_paths());
    tracing::debug!(%platform, ?search_paths, whitelisted = whitelist.len(), "starting");

    let options = ResolveOptions {
        search_paths,
        whitelist,
        recursive: cli.recursive,
        search_in_target_dir: !cli.no_target_dir_search,
    };

    let deps = resolve_dependencies(adapter.as_ref(), &cli.target, &options)
        .with_context(|| format!("Failed to resolve dependencies of {}", cli.target.display()))?;

    let target = absolutize(&cli.target);
    let target_dir = target
        .parent()
        .context("Target path has no parent directory")?;

    let print = cli.dry_run || cli.verbose;
    bundle(&deps, target_dir, cli.dry_run, |action| {
        if print {
            println!("{action}");
        }
    })?;

    Ok(())
}
