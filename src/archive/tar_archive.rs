//! Default `Archive` implementation: a tar payload, optionally compressed,
//! carrying `manifest.json` and an optional `options.json` at its root and
//! the actual install tree under `payload/`.

use super::{Archive, ArchiveCounts, ProgressEvent};
use crate::error::{ChefError, Result};
use crate::model::{ConsumerOptions, IngredientType, PackageManifest, Version};
use serde::Deserialize;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};

const COMPONENT: &str = "archive";

enum Compression {
    None,
    Gzip,
    Xz,
    Bzip2,
    Zstd,
}

fn compression_for(path: &Path) -> Compression {
    let name = path.to_string_lossy();
    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        Compression::Gzip
    } else if name.ends_with(".tar.xz") {
        Compression::Xz
    } else if name.ends_with(".tar.bz2") {
        Compression::Bzip2
    } else if name.ends_with(".tar.zst") {
        Compression::Zstd
    } else {
        Compression::None
    }
}

fn decompress(path: &Path, compression: Compression) -> Result<Vec<u8>> {
    let file = std::fs::File::open(path).map_err(|e| ChefError::io(COMPONENT, path, e))?;
    let mut out = Vec::new();
    let result = match compression {
        Compression::None => {
            let mut file = file;
            file.read_to_end(&mut out)
        }
        Compression::Gzip => flate2::read::GzDecoder::new(file).read_to_end(&mut out),
        Compression::Xz => xz2::read::XzDecoder::new(file).read_to_end(&mut out),
        Compression::Bzip2 => bzip2::read::BzDecoder::new(file).read_to_end(&mut out),
        Compression::Zstd => {
            let mut decoder = zstd::Decoder::new(file).map_err(|e| ChefError::archive(COMPONENT, path, e.to_string()))?;
            decoder.read_to_end(&mut out)
        }
    };
    result.map_err(|e| ChefError::archive(COMPONENT, path, e.to_string()))?;
    Ok(out)
}

/// The raw shape of `manifest.json`: the manifest fields plus the version,
/// which this crate's `PackageManifest` keeps as a sibling rather than a
/// member (a version belongs to a specific archive, not to the identity a
/// manifest describes).
#[derive(Deserialize)]
struct ManifestFile {
    publisher: String,
    package: String,
    summary: String,
    description: String,
    homepage: String,
    license: String,
    eula: String,
    maintainer: String,
    email: String,
    #[serde(rename = "type")]
    kind: IngredientType,
    version: Version,
}

/// A tar archive (raw or gz/xz/bz2/zst compressed) read fully into memory
/// so its manifest and payload can each be scanned independently.
pub struct TarArchive {
    path: PathBuf,
    bytes: Vec<u8>,
    manifest: PackageManifest,
    version: Version,
    options: Option<ConsumerOptions>,
    counts: ArchiveCounts,
}

impl TarArchive {
    pub fn open(path: &Path) -> Result<Self> {
        let bytes = decompress(path, compression_for(path))?;

        let manifest_file: ManifestFile = Self::read_json_entry(&bytes, "manifest.json")?
            .ok_or_else(|| ChefError::archive(COMPONENT, path, "missing manifest.json"))?;
        let options = Self::read_json_entry(&bytes, "options.json")?;
        let counts = Self::scan_counts(&bytes)?;

        let manifest = PackageManifest {
            publisher: manifest_file.publisher,
            package: manifest_file.package,
            summary: manifest_file.summary,
            description: manifest_file.description,
            homepage: manifest_file.homepage,
            license: manifest_file.license,
            eula: manifest_file.eula,
            maintainer: manifest_file.maintainer,
            email: manifest_file.email,
            kind: manifest_file.kind,
        };

        Ok(TarArchive { path: path.to_path_buf(), bytes, manifest, version: manifest_file.version, options, counts })
    }

    fn read_json_entry<T: serde::de::DeserializeOwned>(bytes: &[u8], name: &str) -> Result<Option<T>> {
        let mut archive = tar::Archive::new(Cursor::new(bytes));
        let entries = archive.entries().map_err(|e| ChefError::archive(COMPONENT, name, e.to_string()))?;
        for entry in entries {
            let mut entry = entry.map_err(|e| ChefError::archive(COMPONENT, name, e.to_string()))?;
            let entry_path = entry.path().map_err(|e| ChefError::archive(COMPONENT, name, e.to_string()))?;
            if entry_path.to_string_lossy() == name {
                let mut contents = String::new();
                entry
                    .read_to_string(&mut contents)
                    .map_err(|e| ChefError::archive(COMPONENT, name, e.to_string()))?;
                let value = serde_json::from_str(&contents)
                    .map_err(|e| ChefError::archive(COMPONENT, name, e.to_string()))?;
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    fn scan_counts(bytes: &[u8]) -> Result<ArchiveCounts> {
        let mut archive = tar::Archive::new(Cursor::new(bytes));
        let entries = archive.entries().map_err(|e| ChefError::archive(COMPONENT, "payload", e.to_string()))?;
        let mut counts = ArchiveCounts::default();
        for entry in entries {
            let entry = entry.map_err(|e| ChefError::archive(COMPONENT, "payload", e.to_string()))?;
            let entry_path = entry.path().map_err(|e| ChefError::archive(COMPONENT, "payload", e.to_string()))?;
            if !entry_path.starts_with("payload/") {
                continue;
            }
            match entry.header().entry_type() {
                tar::EntryType::Directory => counts.directories += 1,
                tar::EntryType::Symlink => counts.symlinks += 1,
                tar::EntryType::Regular => counts.files += 1,
                _ => {}
            }
        }
        Ok(counts)
    }
}

impl Archive for TarArchive {
    fn manifest(&self) -> &PackageManifest {
        &self.manifest
    }

    fn version(&self) -> &Version {
        &self.version
    }

    fn options(&self) -> Option<&ConsumerOptions> {
        self.options.as_ref()
    }

    fn counts(&self) -> ArchiveCounts {
        self.counts
    }

    fn unpack(&mut self, destination: &Path, on_progress: &mut dyn FnMut(ProgressEvent)) -> Result<()> {
        let mut archive = tar::Archive::new(Cursor::new(&self.bytes));
        let entries = archive
            .entries()
            .map_err(|e| ChefError::archive(COMPONENT, &self.path, e.to_string()))?;

        let total = self.counts.files;
        let mut done = 0u64;

        for entry in entries {
            let mut entry = entry.map_err(|e| ChefError::archive(COMPONENT, &self.path, e.to_string()))?;
            let entry_path = entry
                .path()
                .map_err(|e| ChefError::archive(COMPONENT, &self.path, e.to_string()))?
                .into_owned();
            let Ok(relative) = entry_path.strip_prefix("payload") else {
                continue;
            };
            if relative.as_os_str().is_empty() {
                continue;
            }

            let target = destination.join(relative);
            let entry_type = entry.header().entry_type();
            if entry_type.is_dir() {
                crate::paths::mkdir_p(COMPONENT, &target)?;
                continue;
            }
            if !entry_type.is_file() && !entry_type.is_symlink() {
                continue;
            }
            if let Some(parent) = target.parent() {
                crate::paths::mkdir_p(COMPONENT, parent)?;
            }
            entry
                .unpack(&target)
                .map_err(|e| ChefError::archive(COMPONENT, &target, e.to_string()))?;

            if entry_type.is_file() {
                done += 1;
                on_progress(ProgressEvent {
                    files_done: done,
                    files_total: total,
                    current_path: relative.to_string_lossy().into_owned(),
                });
            }
        }

        Ok(())
    }
}
