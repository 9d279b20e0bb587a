//! Archive abstraction.
//!
//! The on-disk package archive format (compression, manifest embedding,
//! checksum layout) belongs to an external codec in this system; this
//! module defines the seam every fridge/kitchen consumer unpacks through,
//! plus a tar-based default good enough to drive the rest of the toolchain.

mod tar_archive;

pub use tar_archive::TarArchive;

use crate::error::Result;
use crate::model::{ConsumerOptions, PackageManifest, Version};
use std::path::Path;

/// Counts reported up front so callers can size a progress bar before
/// unpacking starts.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveCounts {
    pub files: u64,
    pub directories: u64,
    pub symlinks: u64,
}

/// Emitted once per file as an archive unpacks.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub files_done: u64,
    pub files_total: u64,
    pub current_path: String,
}

/// A package archive: a manifest plus a payload that can be unpacked to a
/// destination directory.
pub trait Archive {
    fn manifest(&self) -> &PackageManifest;
    fn version(&self) -> &Version;
    fn options(&self) -> Option<&ConsumerOptions>;
    fn counts(&self) -> ArchiveCounts;
    fn unpack(&mut self, destination: &Path, on_progress: &mut dyn FnMut(ProgressEvent)) -> Result<()>;
}
