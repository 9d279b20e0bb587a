//! The fridge itself: a per-host cache of ingredient archives and their
//! unpacked payloads, rooted at a directory laid out as
//!
//! ```text
//! <root>/storage/            downloaded archives + the inventory index
//! <root>/storage/index.json  the index (see `inventory.rs`)
//! <root>/prep/<package>/     unpacked non-toolchain ingredients
//! <root>/utensils/<package>/ unpacked toolchain ingredients
//! ```
//!
//! An ingredient's archive is fetched at most once (`store_ingredient`); its
//! payload is unpacked at most once per archive (`use_ingredient`), tracked
//! via the inventory's `unpacked` flag rather than by unpack-path presence,
//! since a pack's on-disk identity now comes from the registry's own
//! `(publisher, package, platform, arch, channel, version)` tuple instead
//! of a content hash.

use super::inventory::{Inventory, InventoryPack};
use crate::archive::{Archive, TarArchive};
use crate::error::{ChefError, Result};
use crate::model::{parse_identity, ConsumerOptions, IngredientKey, IngredientRef, IngredientType, PackageManifest};
use crate::output;
use crate::registry::RegistryClient;
use std::path::{Path, PathBuf};

const COMPONENT: &str = "fridge";

/// DJB2-32, used throughout this toolchain for setup fingerprints and
/// archive naming: cheap, stable across platforms, and not a security
/// boundary.
pub fn djb2_32(data: &[u8]) -> u32 {
    let mut hash: u32 = 5381;
    for &byte in data {
        hash = hash.wrapping_mul(33).wrapping_add(byte as u32);
    }
    hash
}

/// What `use_ingredient` hands back: the inventory record plus enough of
/// the opened archive for a caller (the kitchen) to stage it elsewhere.
#[derive(Debug, Clone)]
pub struct UsedIngredient {
    pub pack: InventoryPack,
    pub manifest: PackageManifest,
    pub options: Option<ConsumerOptions>,
    pub unpacked_root: PathBuf,
}

pub struct FridgeStore {
    root: PathBuf,
    platform: String,
    arch: String,
    inventory: Inventory,
}

impl FridgeStore {
    /// Open (creating if needed) the fridge rooted at `root` for a given
    /// target platform/architecture, loading its inventory index and
    /// evicting any record whose archive went missing.
    pub fn initialize(root: &Path, platform: &str, arch: &str) -> Result<Self> {
        if platform.is_empty() || arch.is_empty() {
            return Err(ChefError::validation(COMPONENT, "platform and architecture are required"));
        }

        crate::paths::mkdir_p(COMPONENT, &root.join("storage"))?;
        crate::paths::mkdir_p(COMPONENT, &root.join("prep"))?;
        crate::paths::mkdir_p(COMPONENT, &root.join("utensils"))?;

        let index_path = root.join("storage/index.json");
        let mut inventory = Inventory::load(&index_path)?;
        let evicted = inventory.clear_missing();
        if evicted > 0 {
            output::warning(&format!("fridge: dropped {evicted} stale inventory record(s)"));
        }

        Ok(FridgeStore { root: root.to_path_buf(), platform: platform.to_string(), arch: arch.to_string(), inventory })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ingredient_count(&self) -> usize {
        self.inventory.len()
    }

    fn storage_dir(&self) -> PathBuf {
        self.root.join("storage")
    }

    fn prep_dir(&self) -> PathBuf {
        self.root.join("prep")
    }

    fn utensils_dir(&self) -> PathBuf {
        self.root.join("utensils")
    }

    fn index_path(&self) -> PathBuf {
        self.storage_dir().join("index.json")
    }

    fn save(&self) -> Result<()> {
        self.inventory.save(&self.index_path())
    }

    /// Resolve `reference` against the registry and make sure its archive is
    /// present under `storage/`, downloading it only on a miss. Idempotent.
    pub fn store_ingredient(&mut self, reference: &IngredientRef, registry: &dyn RegistryClient) -> Result<InventoryPack> {
        let (publisher, package) = reference.identity()?;
        let key = IngredientKey {
            publisher: publisher.clone(),
            package: package.clone(),
            platform: self.platform.clone(),
            architecture: self.arch.clone(),
            channel: reference.channel.clone(),
            version: reference.version.clone(),
        };
        let resolved = registry.resolve(&key)?;

        if let Some(existing) =
            self.inventory.find(&publisher, &package, &self.platform, &self.arch, &reference.channel, Some(&resolved.version))
        {
            if Path::new(&existing.path).exists() {
                return Ok(existing.clone());
            }
        }

        let archive_name = format!("{:08x}-{package}.pkg", djb2_32(resolved.checksum.as_bytes()));
        let archive_path = self.storage_dir().join(archive_name);
        if !archive_path.exists() {
            registry.download(&resolved, &archive_path)?;
        }

        let pack = InventoryPack {
            publisher,
            package,
            platform: self.platform.clone(),
            arch: self.arch.clone(),
            channel: reference.channel.clone(),
            version: resolved.version,
            path: archive_path.to_string_lossy().into_owned(),
            unpacked: false,
        };
        self.inventory.add(pack.clone());
        self.save()?;

        Ok(pack)
    }

    /// `store_ingredient`, then unpack its archive into the fridge's own
    /// cache the first time it's requested: `utensils/<package>` if the
    /// manifest says this is a toolchain, `prep/<package>` otherwise.
    pub fn use_ingredient(&mut self, reference: &IngredientRef, registry: &dyn RegistryClient) -> Result<UsedIngredient> {
        let pack = self.store_ingredient(reference, registry)?;
        let mut archive = TarArchive::open(Path::new(&pack.path))?;
        let manifest = archive.manifest().clone();
        let options = archive.options().cloned();

        let destination = match manifest.kind {
            IngredientType::Toolchain => self.utensils_dir().join(&pack.package),
            IngredientType::Ingredient | IngredientType::Application => self.prep_dir().join(&pack.package),
        };

        if !pack.unpacked {
            crate::paths::mkdir_p(COMPONENT, &destination)?;
            let counts = archive.counts();
            let mut last_rendered = String::new();
            archive.unpack(&destination, &mut |event| {
                let rendered = output::render_unpack_bar(&pack.package, event.files_done, counts.files.max(1));
                if rendered != last_rendered {
                    print!("{rendered}");
                    use std::io::Write;
                    let _ = std::io::stdout().flush();
                    last_rendered = rendered;
                }
            })?;
            println!();
            self.inventory.mark_unpacked(&pack.publisher, &pack.package, &pack.platform, &pack.arch, &pack.channel, &pack.version);
            self.save()?;
        }

        Ok(UsedIngredient { pack, manifest, options, unpacked_root: destination })
    }

    /// Where a toolchain's utensil lives, without creating or unpacking
    /// anything. Callers that haven't run `use_ingredient` for it yet get a
    /// path that doesn't exist.
    pub fn get_utensil_location(&self, name: &str) -> Result<PathBuf> {
        let (_, package) = parse_identity(name)?;
        Ok(self.utensils_dir().join(package))
    }

    /// Wipe the prep area and forget every pack record, forcing the next
    /// `use_ingredient` call to re-download and re-unpack everything.
    pub fn purge(&mut self) -> Result<()> {
        crate::paths::rmdir_recursive(COMPONENT, &self.prep_dir())?;
        crate::paths::mkdir_p(COMPONENT, &self.prep_dir())?;
        self.inventory.clear_all();
        Ok(())
    }

    /// Flush the inventory index and consume the store.
    pub fn cleanup(self) -> Result<()> {
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{IngredientKey, ResolvedIngredient, Version};
    use crate::registry::RegistryClient;
    use tempfile::TempDir;

    fn write_test_archive(path: &Path, kind: &str) {
        let file = std::fs::File::create(path).unwrap();
        let mut builder = tar::Builder::new(file);

        let manifest = serde_json::json!({
            "publisher": "acme",
            "package": "libfoo",
            "summary": "",
            "description": "",
            "homepage": "",
            "license": "",
            "eula": "",
            "maintainer": "",
            "email": "",
            "type": kind,
            "version": {"major": 1, "minor": 0, "patch": 0},
        });
        let manifest_bytes = serde_json::to_vec(&manifest).unwrap();
        let mut header = tar::Header::new_gnu();
        header.set_size(manifest_bytes.len() as u64);
        header.set_cksum();
        builder.append_data(&mut header, "manifest.json", manifest_bytes.as_slice()).unwrap();

        let payload = b"hello";
        let mut header = tar::Header::new_gnu();
        header.set_size(payload.len() as u64);
        header.set_cksum();
        builder.append_data(&mut header, "payload/include/foo.h", payload.as_slice()).unwrap();

        builder.finish().unwrap();
    }

    struct FakeRegistry {
        archive_path: PathBuf,
    }

    impl RegistryClient for FakeRegistry {
        fn resolve(&self, key: &IngredientKey) -> Result<ResolvedIngredient> {
            Ok(ResolvedIngredient { key: key.clone(), version: Version::new(1, 0, 0), download_url: "unused".to_string(), checksum: "fixed-checksum".to_string() })
        }

        fn download(&self, _resolved: &ResolvedIngredient, destination: &Path) -> Result<()> {
            std::fs::copy(&self.archive_path, destination).unwrap();
            Ok(())
        }
    }

    fn sample_ref() -> IngredientRef {
        IngredientRef { name: "acme/libfoo".to_string(), version: None, channel: "stable".to_string() }
    }

    #[test]
    fn djb2_is_deterministic() {
        assert_eq!(djb2_32(b"hello"), djb2_32(b"hello"));
        assert_ne!(djb2_32(b"hello"), djb2_32(b"world"));
    }

    #[test]
    fn initialize_rejects_blank_platform_or_arch() {
        let dir = TempDir::new().unwrap();
        assert!(FridgeStore::initialize(dir.path(), "", "x86_64").is_err());
        assert!(FridgeStore::initialize(dir.path(), "linux", "").is_err());
    }

    #[test]
    fn use_ingredient_unpacks_once_and_caches_on_second_call() {
        let dir = TempDir::new().unwrap();
        let archive_path = dir.path().join("source.pkg");
        write_test_archive(&archive_path, "ingredient");

        let fridge_root = dir.path().join("fridge");
        let mut store = FridgeStore::initialize(&fridge_root, "linux", "x86_64").unwrap();
        let registry = FakeRegistry { archive_path };
        let reference = sample_ref();

        let used = store.use_ingredient(&reference, &registry).unwrap();
        assert!(used.unpacked_root.join("include/foo.h").exists());
        assert_eq!(store.ingredient_count(), 1);
        assert!(used.unpacked_root.starts_with(store.prep_dir()));

        let used_again = store.use_ingredient(&reference, &registry).unwrap();
        assert_eq!(used.pack.path, used_again.pack.path);
    }

    #[test]
    fn toolchain_ingredients_unpack_under_utensils() {
        let dir = TempDir::new().unwrap();
        let archive_path = dir.path().join("source.pkg");
        write_test_archive(&archive_path, "toolchain");

        let fridge_root = dir.path().join("fridge");
        let mut store = FridgeStore::initialize(&fridge_root, "linux", "x86_64").unwrap();
        let registry = FakeRegistry { archive_path };
        let used = store.use_ingredient(&sample_ref(), &registry).unwrap();

        assert!(used.unpacked_root.starts_with(store.utensils_dir()));
        assert_eq!(store.get_utensil_location("acme/libfoo").unwrap(), used.unpacked_root);
    }

    #[test]
    fn purge_clears_prep_and_inventory() {
        let dir = TempDir::new().unwrap();
        let archive_path = dir.path().join("source.pkg");
        write_test_archive(&archive_path, "ingredient");

        let fridge_root = dir.path().join("fridge");
        let mut store = FridgeStore::initialize(&fridge_root, "linux", "x86_64").unwrap();
        let registry = FakeRegistry { archive_path };
        let used = store.use_ingredient(&sample_ref(), &registry).unwrap();
        assert!(used.unpacked_root.exists());

        store.purge().unwrap();
        assert_eq!(store.ingredient_count(), 0);
        assert!(!used.unpacked_root.exists());
    }
}
