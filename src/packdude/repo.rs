//! A client for one package repository: mirrors its catalog with an
//! mtime-based cache and fetches individual package blobs.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use flate2::Crc;

use crate::error::Result;
use crate::fetch::Fetcher;
use crate::store::PackageInfo;
use crate::store::catalog::CatalogStore;

/// The catalog filename served at the root of every repository.
pub const REPO_DATABASE_FILE_NAME: &str = "repo.sqlite3";

/// How long a cached catalog is trusted before it's refetched unconditionally.
pub const MAX_METADATA_CACHE_AGE: Duration = Duration::from_secs(24 * 60 * 60);

/// A handle to a remote package repository, reachable at `base_url`.
pub struct RepositoryClient {
    base_url: String,
    fetcher: Fetcher,
}

impl RepositoryClient {
    pub fn new(base_url: &str, product: &str, version: &str) -> Result<RepositoryClient> {
        Ok(RepositoryClient {
            base_url: base_url.trim_end_matches('/').to_owned(),
            fetcher: Fetcher::new(product, version)?,
        })
    }

    /// The cache filename for this repository's catalog: the CRC-32 of the
    /// base URL, in decimal, so distinct repositories never collide.
    fn cache_file_name(&self) -> String {
        let mut crc = Crc::new();
        crc.update(self.base_url.as_bytes());
        format!("{}.sqlite3", crc.sum())
    }

    /// Mirrors this repository's catalog into `cache_dir`, refetching it only
    /// if the cached copy is missing or older than [`MAX_METADATA_CACHE_AGE`],
    /// then opens it read-only.
    pub fn get_catalog(&mut self, cache_dir: &Path) -> Result<CatalogStore> {
        std::fs::create_dir_all(cache_dir)?;
        let cache_path: PathBuf = cache_dir.join(self.cache_file_name());

        let needs_fetch = match std::fs::metadata(&cache_path) {
            Ok(metadata) => {
                let age = SystemTime::now()
                    .duration_since(metadata.modified()?)
                    .unwrap_or(Duration::MAX);
                age >= MAX_METADATA_CACHE_AGE
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => true,
            Err(err) => return Err(err.into()),
        };

        if needs_fetch {
            tracing::info!(url = %self.base_url, "fetching the package catalog");
            let url = format!("{}/{REPO_DATABASE_FILE_NAME}", self.base_url);
            self.fetcher.fetch_to_file(&url, &cache_path)?;
        } else {
            tracing::debug!("using the cached package catalog");
        }

        CatalogStore::open_read(&cache_path)
    }

    /// Fetches a package's blob by its catalog `file_name`.
    pub fn get_package(&mut self, info: &PackageInfo) -> Result<Vec<u8>> {
        let url = format!("{}/{}", self.base_url, info.file_name);
        self.fetcher.fetch_to_memory(&url)
    }
}
