//! The dependency-aware installer/remover core: recursive fetch-install with
//! a cycle guard, safe removal, and orphan cleanup.
//!
//! Every relative path here (registered files, extraction destination) is
//! resolved against an explicit `prefix` field rather than the process's
//! current directory. The original implementation `chdir`s into the prefix
//! once and relies on every subsequent relative path resolving against it;
//! a library has no business mutating global process state its caller
//! might depend on, so this takes the prefix as data instead.

use std::path::{Path, PathBuf};

use crate::archive;
use crate::error::{PackdudeError, Result};
use crate::package::Package;
use crate::repo::RepositoryClient;
use crate::store::catalog::CatalogStore;
use crate::store::registry::RegistryStore;
use crate::store::{PackageInfo, Reason, RegistryInfo};

/// Why an `install` call was made, mirroring the two reasons a caller may
/// supply (a package's registry `reason` also has a third value, `Core`,
/// which is never produced by an install call and is reserved for packages
/// the implementation considers load-bearing by policy).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallReason {
    User,
    Core,
    Dependency,
}

impl From<InstallReason> for Reason {
    fn from(reason: InstallReason) -> Reason {
        match reason {
            InstallReason::User => Reason::User,
            InstallReason::Core => Reason::Core,
            InstallReason::Dependency => Reason::Dependency,
        }
    }
}

/// The installer/remover core, rooted at one prefix.
pub struct Installer {
    prefix: PathBuf,
    registry: RegistryStore,
    catalog: Option<CatalogStore>,
    repo: Option<RepositoryClient>,
    /// Packages currently being installed along the active recursion;
    /// guards against dependency cycles.
    stack: Vec<String>,
}

impl Installer {
    pub fn new(
        prefix: &Path,
        registry: RegistryStore,
        catalog: Option<CatalogStore>,
        repo: Option<RepositoryClient>,
    ) -> Installer {
        Installer {
            prefix: prefix.to_owned(),
            registry,
            catalog,
            repo,
            stack: Vec::new(),
        }
    }

    /// Whether `name` is currently installed.
    pub fn is_installed(&self, name: &str) -> Result<bool> {
        self.registry.contains(name)
    }

    /// Calls `callback` once per dependency name of `name`, in the order
    /// the catalog lists them.
    pub fn for_each_dependency(
        &self,
        name: &str,
        mut callback: impl FnMut(&str) -> Result<()>,
    ) -> Result<()> {
        let info = self.catalog()?.get(name)?;
        for dep in &info.deps {
            callback(dep)?;
        }
        Ok(())
    }

    /// Recursively installs `name` and its dependencies.
    ///
    /// A no-op (returns `Ok`) if `name` is already on the installation
    /// stack (cycle guard) or already installed.
    pub fn install(&mut self, name: &str, reason: InstallReason) -> Result<()> {
        if self.stack.iter().any(|entry| entry == name) {
            tracing::debug!(name, "already on the installation stack; skipping");
            return Ok(());
        }

        if self.registry.contains(name)? {
            tracing::warn!(name, "already installed; skipping");
            return Ok(());
        }

        let info = self.catalog()?.get(name)?;

        self.stack.push(name.to_owned());
        let result = self.install_pushed(name, &info, reason);
        self.stack.pop();
        result
    }

    fn install_pushed(&mut self, name: &str, info: &PackageInfo, reason: InstallReason) -> Result<()> {
        if !packdude_platform::is_compatible(&info.arch) {
            return Err(PackdudeError::Incompatible(format!(
                "{name} targets architecture {:?}, incompatible with {}",
                info.arch,
                packdude_platform::host_arch(),
            )));
        }

        tracing::info!(name, file_name = %info.file_name, "downloading");
        let blob = self.repo()?.get_package(info)?;
        let package = Package::open(blob)?;

        for dep in &info.deps {
            self.install(dep, InstallReason::Dependency)?;
        }

        tracing::info!(name, "unpacking");
        let registry = &self.registry;
        archive::extract(package.archive(), &self.prefix, |path| {
            registry.register_path(name, path)
        })?;

        self.registry.insert(&RegistryInfo {
            info: info.clone(),
            reason: reason.into(),
        })?;

        tracing::info!(name, "successfully installed");
        Ok(())
    }

    /// Removes `name` if it is installed and nothing else depends on it.
    /// A no-op if either condition fails (this mirrors the original
    /// implementation, which logs and reports success rather than erroring
    /// on a refused removal).
    pub fn remove(&mut self, name: &str) -> Result<()> {
        if !self.registry.contains(name)? {
            tracing::warn!(name, "not installed; nothing to remove");
            return Ok(());
        }

        if !self.can_remove(name)? {
            tracing::warn!(name, "another package depends on it; not removing");
            return Ok(());
        }

        self.remove_unchecked(name)
    }

    fn remove_unchecked(&mut self, name: &str) -> Result<()> {
        tracing::info!(name, "removing files");

        let mut paths = Vec::new();
        self.registry.for_each_file(name, |path| {
            paths.push(path.to_owned());
            Ok(())
        })?;

        for path in paths {
            if self.remove_one_file(&path)? {
                self.registry.unregister_path(&path)?;
            }
        }

        self.registry.delete(name)?;
        tracing::info!(name, "successfully removed");
        Ok(())
    }

    /// Removes the file or directory at `relative_path`, if it still exists.
    ///
    /// Returns whether the manifest row for `relative_path` should now be
    /// unregistered. A path already missing from disk is left registered,
    /// matching the original implementation's `_remove_file`, which `goto
    /// end`s past `database_unregister_path` on an `ENOENT` from `lstat`.
    fn remove_one_file(&self, relative_path: &str) -> Result<bool> {
        let absolute = self.prefix.join(relative_path.trim_start_matches("./"));

        let metadata = match std::fs::symlink_metadata(&absolute) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(err) => return Err(err.into()),
        };

        if metadata.is_dir() {
            if let Err(err) = std::fs::remove_dir(&absolute) {
                match err.kind() {
                    std::io::ErrorKind::DirectoryNotEmpty => {}
                    std::io::ErrorKind::ReadOnlyFilesystem => {}
                    _ => return Err(err.into()),
                }
            }
        } else {
            std::fs::remove_file(&absolute)?;
        }

        Ok(true)
    }

    /// Whether no installed package's dependency list names `name`.
    pub fn can_remove(&self, name: &str) -> Result<bool> {
        let mut depended_on = false;
        let result = self.registry.for_each(|entry| {
            if entry.info.name != name && entry.info.deps.iter().any(|dep| dep == name) {
                depended_on = true;
                return Err(PackdudeError::Aborted);
            }
            Ok(())
        });

        match result {
            Ok(()) => Ok(true),
            Err(PackdudeError::Aborted) => {
                debug_assert!(depended_on);
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    /// Repeatedly sweeps installed `Dependency`-reason packages, removing
    /// any that [`Self::can_remove`] allows, until a sweep removes none.
    /// Returns the total number of packages removed.
    pub fn cleanup(&mut self) -> Result<usize> {
        tracing::info!("cleaning up unneeded packages");

        let mut total_removed = 0;
        loop {
            let mut candidates = Vec::new();
            self.registry.for_each(|entry| {
                if entry.reason == Reason::Dependency {
                    candidates.push(entry.info.name.clone());
                }
                Ok(())
            })?;

            let mut removed_this_sweep = 0;
            for name in candidates {
                if self.can_remove(&name)? {
                    self.remove_unchecked(&name)?;
                    removed_this_sweep += 1;
                }
            }

            total_removed += removed_this_sweep;
            tracing::debug!(removed_this_sweep, "cleanup sweep finished");
            if removed_this_sweep == 0 {
                break;
            }
        }

        Ok(total_removed)
    }

    /// Every installed package.
    pub fn list_installed(&self) -> Result<Vec<PackageInfo>> {
        let mut entries = Vec::new();
        self.registry.for_each(|entry| {
            entries.push(entry.info.clone());
            Ok(())
        })?;
        Ok(entries)
    }

    /// Every catalog package not currently installed.
    pub fn list_available(&self) -> Result<Vec<PackageInfo>> {
        let mut entries = Vec::new();
        self.catalog()?.for_each(|info| {
            if !self.registry.contains(&info.name)? {
                entries.push(info.clone());
            }
            Ok(())
        })?;
        Ok(entries)
    }

    /// User-installed packages that nothing currently depends on.
    pub fn list_removable(&self) -> Result<Vec<PackageInfo>> {
        let mut entries = Vec::new();
        self.registry.for_each(|entry| {
            if entry.reason == Reason::User && self.can_remove(&entry.info.name)? {
                entries.push(entry.info.clone());
            }
            Ok(())
        })?;
        Ok(entries)
    }

    /// Every path `name` registered in the file manifest, most recently
    /// registered first.
    pub fn list_files(&self, name: &str) -> Result<Vec<String>> {
        let mut paths = Vec::new();
        self.registry.for_each_file(name, |path| {
            paths.push(path.to_owned());
            Ok(())
        })?;
        Ok(paths)
    }

    fn catalog(&self) -> Result<&CatalogStore> {
        self.catalog
            .as_ref()
            .ok_or_else(|| PackdudeError::CorruptData("no repository configured".into()))
    }

    fn repo(&mut self) -> Result<&mut RepositoryClient> {
        self.repo
            .as_mut()
            .ok_or_else(|| PackdudeError::CorruptData("no repository configured".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package;

    fn info(name: &str, deps: &[&str]) -> PackageInfo {
        PackageInfo {
            name: name.to_owned(),
            version: "1.0".to_owned(),
            description: format!("{name} package"),
            file_name: format!("{name}.bin"),
            arch: "all".to_owned(),
            deps: deps.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn build_tar(entries: &[&str]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for path in entries {
            let mut header = tar::Header::new_gnu();
            header.set_path(path).unwrap();
            header.set_size(0);
            header.set_mode(0o644);
            header.set_cksum();
            builder.append(&header, std::io::empty()).unwrap();
        }
        builder.into_inner().unwrap()
    }

    /// Sets up a repo directory containing packages `a` (dep on `b`) and
    /// `b` (no deps), and a catalog cache/prefix pair ready for an
    /// `Installer`.
    struct Fixture {
        _repo_dir: tempfile::TempDir,
        prefix_dir: tempfile::TempDir,
    }

    fn setup() -> (Fixture, Installer) {
        let repo_dir = tempfile::tempdir().unwrap();
        let catalog_path = repo_dir.path().join("repo.sqlite3");
        let catalog = CatalogStore::open_write(&catalog_path).unwrap();
        catalog.insert(&info("a", &["b"])).unwrap();
        catalog.insert(&info("b", &[])).unwrap();
        drop(catalog);

        for name in ["a", "b"] {
            let archive_bytes = build_tar(&[&format!("./{name}.txt")]);
            let blob = package::build(&archive_bytes);
            std::fs::write(repo_dir.path().join(format!("{name}.bin")), blob).unwrap();
        }

        let prefix_dir = tempfile::tempdir().unwrap();
        let registry = RegistryStore::open(&prefix_dir.path().join("registry.sqlite3")).unwrap();
        let catalog_for_installer = CatalogStore::open_read(&catalog_path).unwrap();
        let repo_client = RepositoryClient::new(
            &format!("file://{}", repo_dir.path().display()),
            "packdude",
            "0.1.0",
        )
        .unwrap();

        let installer = Installer::new(
            prefix_dir.path(),
            registry,
            Some(catalog_for_installer),
            Some(repo_client),
        );

        (
            Fixture {
                _repo_dir: repo_dir,
                prefix_dir,
            },
            installer,
        )
    }

    #[test]
    fn for_each_dependency_visits_catalog_deps_in_order() {
        let repo_dir = tempfile::tempdir().unwrap();
        let catalog_path = repo_dir.path().join("repo.sqlite3");
        let catalog = CatalogStore::open_write(&catalog_path).unwrap();
        catalog.insert(&info("app", &["b", "a", "c"])).unwrap();
        drop(catalog);

        let prefix_dir = tempfile::tempdir().unwrap();
        let registry = RegistryStore::open(&prefix_dir.path().join("registry.sqlite3")).unwrap();
        let catalog_for_installer = CatalogStore::open_read(&catalog_path).unwrap();
        let repo_client = RepositoryClient::new(
            &format!("file://{}", repo_dir.path().display()),
            "packdude",
            "0.1.0",
        )
        .unwrap();

        let installer = Installer::new(
            prefix_dir.path(),
            registry,
            Some(catalog_for_installer),
            Some(repo_client),
        );

        let mut seen = Vec::new();
        installer
            .for_each_dependency("app", |dep| {
                seen.push(dep.to_owned());
                Ok(())
            })
            .unwrap();

        assert_eq!(
            seen,
            vec!["b".to_owned(), "a".to_owned(), "c".to_owned()]
        );
    }

    #[test]
    fn installs_transitive_dependencies() {
        let (fixture, mut installer) = setup();

        installer.install("a", InstallReason::User).unwrap();

        assert!(installer.is_installed("a").unwrap());
        assert!(installer.is_installed("b").unwrap());
        assert!(fixture.prefix_dir.path().join("a.txt").exists());
        assert!(fixture.prefix_dir.path().join("b.txt").exists());
    }

    #[test]
    fn dependency_reason_is_recorded() {
        let (_fixture, mut installer) = setup();
        installer.install("a", InstallReason::User).unwrap();

        let entry = installer.registry.get("b").unwrap();
        assert_eq!(entry.reason, Reason::Dependency);
    }

    #[test]
    fn installing_twice_is_a_noop() {
        let (_fixture, mut installer) = setup();
        installer.install("a", InstallReason::User).unwrap();
        installer.install("a", InstallReason::User).unwrap();
        assert!(installer.is_installed("a").unwrap());
    }

    #[test]
    fn cannot_remove_a_required_dependency() {
        let (_fixture, mut installer) = setup();
        installer.install("a", InstallReason::User).unwrap();

        assert!(!installer.can_remove("b").unwrap());
        installer.remove("b").unwrap();
        assert!(installer.is_installed("b").unwrap());
    }

    #[test]
    fn removing_a_package_frees_its_dependency_for_cleanup() {
        let (_fixture, mut installer) = setup();
        installer.install("a", InstallReason::User).unwrap();

        installer.remove("a").unwrap();
        assert!(!installer.is_installed("a").unwrap());
        // "b" is still installed as an orphaned dependency until cleanup runs
        assert!(installer.is_installed("b").unwrap());

        let removed = installer.cleanup().unwrap();
        assert_eq!(removed, 1);
        assert!(!installer.is_installed("b").unwrap());
    }

    #[test]
    fn cleanup_never_removes_user_packages() {
        let (_fixture, mut installer) = setup();
        installer.install("b", InstallReason::User).unwrap();

        let removed = installer.cleanup().unwrap();
        assert_eq!(removed, 0);
        assert!(installer.is_installed("b").unwrap());
    }

    #[test]
    fn cycle_guard_prevents_infinite_recursion() {
        let repo_dir = tempfile::tempdir().unwrap();
        let catalog_path = repo_dir.path().join("repo.sqlite3");
        let catalog = CatalogStore::open_write(&catalog_path).unwrap();
        catalog.insert(&info("a", &["b"])).unwrap();
        catalog.insert(&info("b", &["a"])).unwrap();
        drop(catalog);

        for name in ["a", "b"] {
            let archive_bytes = build_tar(&[&format!("./{name}.txt")]);
            let blob = package::build(&archive_bytes);
            std::fs::write(repo_dir.path().join(format!("{name}.bin")), blob).unwrap();
        }

        let prefix_dir = tempfile::tempdir().unwrap();
        let registry = RegistryStore::open(&prefix_dir.path().join("registry.sqlite3")).unwrap();
        let catalog_for_installer = CatalogStore::open_read(&catalog_path).unwrap();
        let repo_client = RepositoryClient::new(
            &format!("file://{}", repo_dir.path().display()),
            "packdude",
            "0.1.0",
        )
        .unwrap();

        let mut installer = Installer::new(
            prefix_dir.path(),
            registry,
            Some(catalog_for_installer),
            Some(repo_client),
        );

        installer.install("a", InstallReason::User).unwrap();
        assert!(installer.is_installed("a").unwrap());
        assert!(installer.is_installed("b").unwrap());
    }

    #[test]
    fn list_removable_excludes_required_dependencies() {
        let (_fixture, mut installer) = setup();
        installer.install("a", InstallReason::User).unwrap();

        let removable: Vec<String> = installer
            .list_removable()
            .unwrap()
            .into_iter()
            .map(|info| info.name)
            .collect();
        assert_eq!(removable, vec!["a".to_owned()]);
    }

    #[test]
    fn list_available_excludes_installed_packages() {
        let (_fixture, mut installer) = setup();
        installer.install("b", InstallReason::User).unwrap();

        let available: Vec<String> = installer
            .list_available()
            .unwrap()
            .into_iter()
            .map(|info| info.name)
            .collect();
        assert_eq!(available, vec!["a".to_owned()]);
    }
}
