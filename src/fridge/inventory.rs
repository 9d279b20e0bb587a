//! The inventory index: a JSON record of every ingredient pack the fridge
//! has stored, identified by the registry's own
//! `(publisher, package, platform, arch, channel, version)` tuple rather
//! than a content hash, with an explicit `unpacked` flag standing in for
//! the presence-based "is this already unpacked" check a hash-keyed store
//! would otherwise need.

use crate::error::{ChefError, Result};
use crate::model::Version;
use serde::{Deserialize, Serialize};
use std::path::Path;

const COMPONENT: &str = "fridge/inventory";

/// A cached archive's record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryPack {
    pub publisher: String,
    pub package: String,
    pub platform: String,
    pub arch: String,
    pub channel: String,
    pub version: Version,
    /// Absolute path to the archive file under the fridge's storage area.
    pub path: String,
    pub unpacked: bool,
}

impl InventoryPack {
    fn identity_matches(&self, publisher: &str, package: &str, platform: &str, arch: &str, channel: &str) -> bool {
        self.publisher == publisher && self.package == package && self.platform == platform && self.arch == arch && self.channel == channel
    }
}

/// The inventory index, persisted as `storage/index.json` under the fridge
/// root.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Inventory {
    packs: Vec<InventoryPack>,
}

impl Inventory {
    pub fn load(index_path: &Path) -> Result<Self> {
        if !index_path.exists() {
            return Ok(Inventory::default());
        }
        let contents = std::fs::read_to_string(index_path).map_err(|e| ChefError::io(COMPONENT, index_path, e))?;
        serde_json::from_str(&contents)
            .map_err(|e| ChefError::validation(COMPONENT, format!("corrupt inventory index: {e}")))
    }

    pub fn save(&self, index_path: &Path) -> Result<()> {
        if let Some(parent) = index_path.parent() {
            crate::paths::mkdir_p(COMPONENT, parent)?;
        }
        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| ChefError::validation(COMPONENT, format!("cannot serialize inventory: {e}")))?;
        std::fs::write(index_path, contents).map_err(|e| ChefError::io(COMPONENT, index_path, e))
    }

    /// Find a pack by identity tuple. A pinned `version` must match exactly;
    /// without one, the match with the highest `revision` wins — "any
    /// version" resolves to the latest one this fridge has already seen.
    pub fn find(
        &self,
        publisher: &str,
        package: &str,
        platform: &str,
        arch: &str,
        channel: &str,
        version: Option<&Version>,
    ) -> Option<&InventoryPack> {
        let mut candidates: Vec<&InventoryPack> =
            self.packs.iter().filter(|pack| pack.identity_matches(publisher, package, platform, arch, channel)).collect();
        if let Some(version) = version {
            return candidates.into_iter().find(|pack| &pack.version == version);
        }
        candidates.sort_by_key(|pack| pack.version.revision);
        candidates.pop()
    }

    /// Insert `pack`, replacing any existing record with the same identity
    /// and exact version.
    pub fn add(&mut self, pack: InventoryPack) {
        if let Some(existing) = self.packs.iter_mut().find(|existing| {
            existing.identity_matches(&pack.publisher, &pack.package, &pack.platform, &pack.arch, &pack.channel)
                && existing.version == pack.version
        }) {
            *existing = pack;
        } else {
            self.packs.push(pack);
        }
    }

    pub fn mark_unpacked(&mut self, publisher: &str, package: &str, platform: &str, arch: &str, channel: &str, version: &Version) {
        if let Some(pack) = self
            .packs
            .iter_mut()
            .find(|pack| pack.identity_matches(publisher, package, platform, arch, channel) && &pack.version == version)
        {
            pack.unpacked = true;
        }
    }

    /// Evict any pack whose archive file no longer exists on disk, returning
    /// how many were dropped. A pack record outliving its file (e.g. after a
    /// manual `rm -rf`) must not be trusted as "already stored".
    pub fn clear_missing(&mut self) -> usize {
        let before = self.packs.len();
        self.packs.retain(|pack| Path::new(&pack.path).exists());
        before - self.packs.len()
    }

    /// Drop every pack record, without touching anything on disk.
    pub fn clear_all(&mut self) {
        self.packs.clear();
    }

    pub fn len(&self) -> usize {
        self.packs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_pack(path: &str, revision: i64) -> InventoryPack {
        let mut version = Version::new(1, 0, 0);
        version.revision = revision;
        InventoryPack {
            publisher: "acme".to_string(),
            package: "libfoo".to_string(),
            platform: "linux".to_string(),
            arch: "x86_64".to_string(),
            channel: "stable".to_string(),
            version,
            path: path.to_string(),
            unpacked: false,
        }
    }

    #[test]
    fn add_and_find_round_trips() {
        let mut inventory = Inventory::default();
        inventory.add(sample_pack("/fridge/storage/a.pkg", 0));
        let found = inventory.find("acme", "libfoo", "linux", "x86_64", "stable", None).unwrap();
        assert_eq!(found.package, "libfoo");
        assert!(inventory.find("acme", "missing", "linux", "x86_64", "stable", None).is_none());
    }

    #[test]
    fn find_without_version_picks_highest_revision() {
        let mut inventory = Inventory::default();
        inventory.add(sample_pack("/fridge/storage/a.pkg", 0));
        let mut newer = sample_pack("/fridge/storage/b.pkg", 3);
        newer.version.patch = 1;
        inventory.add(newer);

        let found = inventory.find("acme", "libfoo", "linux", "x86_64", "stable", None).unwrap();
        assert_eq!(found.path, "/fridge/storage/b.pkg");
    }

    #[test]
    fn find_with_pinned_version_matches_exactly() {
        let mut inventory = Inventory::default();
        inventory.add(sample_pack("/fridge/storage/a.pkg", 0));
        let found = inventory.find("acme", "libfoo", "linux", "x86_64", "stable", Some(&Version::new(1, 0, 0)));
        assert!(found.is_some());
        let missing = inventory.find("acme", "libfoo", "linux", "x86_64", "stable", Some(&Version::new(2, 0, 0)));
        assert!(missing.is_none());
    }

    #[test]
    fn mark_unpacked_flips_the_flag() {
        let mut inventory = Inventory::default();
        inventory.add(sample_pack("/fridge/storage/a.pkg", 0));
        inventory.mark_unpacked("acme", "libfoo", "linux", "x86_64", "stable", &Version::new(1, 0, 0));
        assert!(inventory.find("acme", "libfoo", "linux", "x86_64", "stable", None).unwrap().unpacked);
    }

    #[test]
    fn save_then_load_preserves_contents() {
        let dir = TempDir::new().unwrap();
        let index_path = dir.path().join("storage/index.json");
        std::fs::create_dir_all(dir.path().join("storage")).unwrap();
        let archive_path = dir.path().join("storage/a.pkg");
        std::fs::write(&archive_path, b"x").unwrap();

        let mut inventory = Inventory::default();
        inventory.add(sample_pack(archive_path.to_str().unwrap(), 0));
        inventory.save(&index_path).unwrap();

        let loaded = Inventory::load(&index_path).unwrap();
        assert_eq!(loaded.len(), 1);
    }

    #[test]
    fn load_missing_file_yields_empty_inventory() {
        let dir = TempDir::new().unwrap();
        let inventory = Inventory::load(&dir.path().join("nope.json")).unwrap();
        assert!(inventory.is_empty());
    }

    #[test]
    fn clear_missing_evicts_packs_without_files() {
        let dir = TempDir::new().unwrap();
        let present = dir.path().join("present.pkg");
        std::fs::write(&present, b"x").unwrap();

        let mut inventory = Inventory::default();
        inventory.add(sample_pack(present.to_str().unwrap(), 0));
        inventory.add(sample_pack(dir.path().join("gone.pkg").to_str().unwrap(), 0));

        let evicted = inventory.clear_missing();
        assert_eq!(evicted, 1);
        assert_eq!(inventory.len(), 1);
    }

    #[test]
    fn clear_all_empties_the_index() {
        let mut inventory = Inventory::default();
        inventory.add(sample_pack("/fridge/storage/a.pkg", 0));
        inventory.clear_all();
        assert!(inventory.is_empty());
    }
}
