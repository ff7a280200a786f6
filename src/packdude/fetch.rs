//! HTTP/FTP transport, backed by libcurl.
//!
//! Mirrors the shape of the original fetcher: a per-handle `curl::easy::Easy`
//! session with a small set of options applied once, and a process-wide
//! refcount around `curl_global_init`/`curl_global_cleanup` so many `Fetcher`
//! values share one underlying library context without double-initializing
//! or tearing it down while a sibling handle is still alive.

use std::fs;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::error::{PackdudeError, Result};

static GLOBAL_INIT_LOCK: Mutex<()> = Mutex::new(());
static GLOBAL_INIT_COUNT: AtomicUsize = AtomicUsize::new(0);

fn global_init() {
    let _guard = GLOBAL_INIT_LOCK.lock().unwrap();
    if GLOBAL_INIT_COUNT.fetch_add(1, Ordering::SeqCst) == 0 {
        curl::init();
    }
}

fn global_cleanup() {
    let _guard = GLOBAL_INIT_LOCK.lock().unwrap();
    // curl-rs's `curl::init` wraps `curl_global_init` but exposes no
    // matching teardown call; the refcount is kept anyway so the policy
    // (init once, "release" once per handle) stays visible and easy to
    // wire up if that changes.
    GLOBAL_INIT_COUNT.fetch_sub(1, Ordering::SeqCst);
}

/// A handle for fetching URLs over HTTP or FTP.
pub struct Fetcher {
    handle: curl::easy::Easy,
}

impl Fetcher {
    /// Creates a new handle with the shared option set applied: a
    /// `"{product}/{version}"` user-agent, `TCP_NODELAY`, and
    /// fail-on-HTTP-error.
    pub fn new(product: &str, version: &str) -> Result<Fetcher> {
        global_init();

        let mut handle = curl::easy::Easy::new();
        handle
            .useragent(&format!("{product}/{version}"))
            .map_err(|source| PackdudeError::Network {
                url: String::new(),
                source,
            })?;
        handle
            .tcp_nodelay(true)
            .map_err(|source| PackdudeError::Network {
                url: String::new(),
                source,
            })?;
        handle
            .fail_on_error(true)
            .map_err(|source| PackdudeError::Network {
                url: String::new(),
                source,
            })?;

        Ok(Fetcher { handle })
    }

    /// Fetches `url` entirely into memory.
    pub fn fetch_to_memory(&mut self, url: &str) -> Result<Vec<u8>> {
        self.handle
            .url(url)
            .map_err(|source| self.network_error(url, source))?;

        let mut buffer = Vec::new();
        {
            let mut transfer = self.handle.transfer();
            transfer
                .write_function(|data| {
                    buffer.extend_from_slice(data);
                    Ok(data.len())
                })
                .map_err(|source| PackdudeError::Network {
                    url: url.to_owned(),
                    source,
                })?;
            transfer
                .perform()
                .map_err(|source| PackdudeError::Network {
                    url: url.to_owned(),
                    source,
                })?;
        }

        Ok(buffer)
    }

    /// Fetches `url` into memory, then writes it to `path` in one shot. If
    /// the write fails, the partially written destination file is removed.
    pub fn fetch_to_file(&mut self, url: &str, path: &std::path::Path) -> Result<()> {
        tracing::debug!(url, "fetching");

        let contents = self.fetch_to_memory(url)?;

        let result = fs::File::create(path)
            .and_then(|mut file| file.write_all(&contents))
            .map_err(PackdudeError::Io);

        if result.is_err() {
            let _ = fs::remove_file(path);
        }

        result
    }

    fn network_error(&self, url: &str, source: curl::Error) -> PackdudeError {
        PackdudeError::Network {
            url: url.to_owned(),
            source,
        }
    }
}

impl Drop for Fetcher {
    fn drop(&mut self) {
        global_cleanup();
    }
}
