//! Release artifact acquisition.
//!
//! Download, checksum verification, and archive extraction for services
//! that ship no distribution package.

mod archive;
mod download;

pub use archive::{extract_tar_gz, find_file, install_binary};
pub use download::{download, sha256_hex, verify_sha256};
