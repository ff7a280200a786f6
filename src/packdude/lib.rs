//! packdude, a minimalist source-agnostic binary package manager.
//!
//! A [`installer::Installer`] is the entry point: it owns a registry of
//! installed packages and, optionally, a mirrored catalog and repository
//! client, and drives recursive install/remove/cleanup against them.

pub mod archive;
pub mod comp;
pub mod error;
pub mod fetch;
pub mod installer;
pub mod package;
pub mod repo;
pub mod store;

pub use error::{PackdudeError, Result};
