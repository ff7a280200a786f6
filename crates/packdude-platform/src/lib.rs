//! packdude's notion of "the architecture this binary runs on".
//!
//! A package's `arch` field is either the host's architecture tag or the
//! sentinel [`ARCH_INDEPENDENT`]; this crate is the single place that knows
//! both.

/// The sentinel `arch` value meaning "runs on any architecture".
pub const ARCH_INDEPENDENT: &str = "all";

/// The architecture tag of the running implementation.
///
/// This is `std::env::consts::ARCH` (e.g. `"x86_64"`, `"aarch64"`), matching
/// the compile-time `ARCH` macro the original C implementation derives from
/// its build target.
pub fn host_arch() -> &'static str {
    std::env::consts::ARCH
}

/// Whether a package whose catalog `arch` field is `pkg_arch` can be
/// installed on this host.
pub fn is_compatible(pkg_arch: &str) -> bool {
    pkg_arch == host_arch() || pkg_arch == ARCH_INDEPENDENT
}
