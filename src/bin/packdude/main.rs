//! The `packdude` command-line entry point: parses the invocation, acquires
//! the per-prefix lock, opens the stores, and dispatches to the installer
//! core.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::Parser;

use packdude::installer::{InstallReason, Installer};
use packdude::repo::RepositoryClient;
use packdude::store::catalog::CatalogStore;
use packdude::store::registry::RegistryStore;

const REGISTRY_PATH: &str = "var/packdude/data.sqlite3";
const CATALOG_CACHE_DIR: &str = "var/packdude";
const LOCK_PATH: &str = "var/packdude/lock";

/// A minimalist source-agnostic binary package manager.
#[derive(Parser, Debug)]
#[command(name = "packdude", version, about, group(
    clap::ArgGroup::new("operation")
        .args(["install", "remove", "query", "list", "cleanup_list", "files"])
        .required(true)
        .multiple(false)
))]
struct Cli {
    /// Raise logging verbosity to debug.
    #[arg(short = 'd')]
    debug: bool,

    /// Record the installation reason as "core" instead of "user".
    #[arg(short = 'n')]
    core: bool,

    /// Installation prefix.
    #[arg(short = 'p', default_value = "/")]
    prefix: PathBuf,

    /// Repository base URL. Falls back to the REPO environment variable.
    #[arg(short = 'u', env = "REPO")]
    repo: Option<String>,

    /// Install a package by name.
    #[arg(short = 'i', value_name = "NAME")]
    install: Option<String>,

    /// Remove a package by name, then clean up orphaned dependencies.
    #[arg(short = 'r', value_name = "NAME")]
    remove: Option<String>,

    /// List installed packages.
    #[arg(short = 'q')]
    query: bool,

    /// List available packages.
    #[arg(short = 'l')]
    list: bool,

    /// List removable packages.
    #[arg(short = 'c')]
    cleanup_list: bool,

    /// List the files a package installed.
    #[arg(short = 'f', value_name = "NAME")]
    files: Option<String>,
}

#[allow(clippy::print_stdout)]
fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .with_target(false)
        .init();

    let _lock = packdude_util::FileLock::acquire(&cli.prefix.join(LOCK_PATH))
        .context("failed to acquire the package manager lock")?;

    let registry = RegistryStore::open(&cli.prefix.join(REGISTRY_PATH))
        .context("failed to open the installed-package registry")?;

    let (catalog, repo) = match &cli.repo {
        Some(url) => {
            let mut client = RepositoryClient::new(url, "packdude", env!("CARGO_PKG_VERSION"))
                .context("failed to set up the repository client")?;
            let catalog = client
                .get_catalog(&cli.prefix.join(CATALOG_CACHE_DIR))
                .context("failed to fetch the package catalog")?;
            (Some(catalog), Some(client))
        }
        None => (None, None),
    };

    let mut installer = Installer::new(&cli.prefix, registry, catalog, repo);

    if let Some(name) = &cli.install {
        let reason = if cli.core {
            InstallReason::Core
        } else {
            InstallReason::User
        };
        installer
            .install(name, reason)
            .with_context(|| format!("failed to install {name}"))?;
    } else if let Some(name) = &cli.remove {
        installer
            .remove(name)
            .with_context(|| format!("failed to remove {name}"))?;
        installer
            .cleanup()
            .context("failed to clean up orphaned dependencies")?;
    } else if cli.query {
        for info in installer.list_installed()? {
            println!("{}|{}|{}", info.name, info.version, info.description);
        }
    } else if cli.list {
        for info in installer.list_available()? {
            println!("{}|{}|{}", info.name, info.version, info.description);
        }
    } else if cli.cleanup_list {
        for info in installer.list_removable()? {
            println!("{}|{}|{}", info.name, info.version, info.description);
        }
    } else if let Some(name) = &cli.files {
        for path in installer.list_files(name)? {
            println!("{path}");
        }
    } else {
        bail!("no operation requested");
    }

    Ok(())
}
