//! The on-disk package container: a fixed header followed by a tar archive.
//!
//! Layout, offset 0 through EOF:
//! ```text
//! magic: u32 (big-endian, ASCII "dude")
//! version: u8
//! checksum: u32 (big-endian, CRC-32/IEEE of everything after the header)
//! <archive bytes...>
//! ```
//! The header has no padding; field order and widths are part of the wire
//! format, not an implementation detail, so it is parsed by hand rather than
//! transmuted from a `#[repr(C, packed)]` struct.

use flate2::Crc;

use crate::error::{PackdudeError, Result};

/// ASCII "dude", big-endian.
pub const MAGIC: u32 = 0x6475_6465;

/// The only format version this implementation produces or accepts.
pub const VERSION: u8 = 1;

const HEADER_LEN: usize = 4 + 1 + 4;

/// A parsed, verified package container.
///
/// Holds the whole blob; [`Package::archive`] is a slice into it rather than
/// a copy.
pub struct Package {
    contents: Vec<u8>,
    version: u8,
}

impl Package {
    /// Parses and verifies a package blob.
    ///
    /// Checks, in order: the blob is bigger than the header, the magic
    /// number matches, the format version matches ([`PackdudeError::Incompatible`]
    /// otherwise), and the archive region's CRC-32 matches the header's
    /// checksum field ([`PackdudeError::CorruptData`] otherwise).
    pub fn open(contents: Vec<u8>) -> Result<Package> {
        if contents.len() <= HEADER_LEN {
            return Err(PackdudeError::CorruptData(
                "package is too small to hold a header".into(),
            ));
        }

        let magic = u32::from_be_bytes(contents[0..4].try_into().unwrap());
        if magic != MAGIC {
            return Err(PackdudeError::CorruptData(
                "package magic number is wrong".into(),
            ));
        }

        let version = contents[4];
        if version != VERSION {
            return Err(PackdudeError::Incompatible(format!(
                "package format version {version} is not supported (expected {VERSION})"
            )));
        }

        let checksum = u32::from_be_bytes(contents[5..9].try_into().unwrap());

        let archive = &contents[HEADER_LEN..];
        let mut crc = Crc::new();
        crc.update(archive);
        if crc.sum() != checksum {
            return Err(PackdudeError::CorruptData(
                "package checksum does not match its archive contents".into(),
            ));
        }

        Ok(Package { contents, version })
    }

    /// The archive region: everything after the header.
    pub fn archive(&self) -> &[u8] {
        &self.contents[HEADER_LEN..]
    }

    /// The format version this package was built for. Always equal to
    /// [`VERSION`] for a successfully opened package; exposed for logging.
    pub fn version(&self) -> u8 {
        self.version
    }
}

/// Builds a container blob from a raw tar archive, for tests and tooling
/// that need to produce packages without shelling out to a packer.
pub fn build(archive: &[u8]) -> Vec<u8> {
    let mut crc = Crc::new();
    crc.update(archive);

    let mut out = Vec::with_capacity(HEADER_LEN + archive.len());
    out.extend_from_slice(&MAGIC.to_be_bytes());
    out.push(VERSION);
    out.extend_from_slice(&crc.sum().to_be_bytes());
    out.extend_from_slice(archive);
    out
}
