//! The two SQLite-backed tabular stores: the catalog (mirrored from a
//! repository) and the registry (this host's installed packages).
//!
//! Both schemas share one row shape, [`PackageInfo`]; the registry adds an
//! install [`Reason`] and a file manifest table. See [`catalog`] and
//! [`registry`] for the concrete schemas.

pub mod catalog;
pub mod registry;

use crate::error::{PackdudeError, Result};

/// One row of either store: a package's catalog metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageInfo {
    pub name: String,
    pub version: String,
    pub description: String,
    pub file_name: String,
    pub arch: String,
    pub deps: Vec<String>,
}

/// Why a package is present in the registry.
///
/// `Core` and `User` packages are never swept by cleanup; `Dependency`
/// packages are removed once nothing installed still needs them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    User,
    Dependency,
    Core,
}

impl Reason {
    fn as_db_str(self) -> &'static str {
        match self {
            Reason::User => "user",
            Reason::Dependency => "dependency",
            Reason::Core => "core",
        }
    }

    fn from_db_str(value: &str) -> Result<Reason> {
        match value {
            "user" => Ok(Reason::User),
            "dependency" => Ok(Reason::Dependency),
            "core" => Ok(Reason::Core),
            other => Err(PackdudeError::CorruptData(format!(
                "unknown installation reason {other:?}"
            ))),
        }
    }
}

/// A registry row: catalog metadata plus why it's installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryInfo {
    pub info: PackageInfo,
    pub reason: Reason,
}

/// The sentinel stored in the `deps` column for a dependency-free package.
const NO_DEPS: &str = "-";

fn deps_to_db(deps: &[String]) -> String {
    if deps.is_empty() {
        NO_DEPS.to_owned()
    } else {
        deps.join(" ")
    }
}

fn deps_from_db(value: &str) -> Vec<String> {
    if value == NO_DEPS || value.is_empty() {
        Vec::new()
    } else {
        value.split_whitespace().map(str::to_owned).collect()
    }
}
