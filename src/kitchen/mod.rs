//! Scratch area construction and sandbox entry/exit: the "Kitchen".
//!
//! A scratch area lives at `.oven/<recipe-name>/` relative to a workspace
//! root W, laid out as:
//!
//! ```text
//! W/.oven/<R>/                     host_chroot, the chroot root
//! W/.oven/<R>/target/ingredients    target-role ingredients
//! W/.oven/<R>/chef/build            out-of-tree build directory
//! W/.oven/<R>/chef/install → W/.oven/output   (shared across recipes)
//! W/.oven/<R>/chef/project → W                (symlink)
//! W/.oven/<R>/chef/.checkpoint      checkpoint file
//! W/.oven/<R>/chef/.hash            setup fingerprint
//! ```
//!
//! Inside the chroot (confined builds), the same tree is visible rooted at
//! `/`: `/target/ingredients`, `/chef/build`, `/chef/install`, `/chef/project`.

pub mod pkgconfig;

use crate::error::{ChefError, Result};
use crate::fridge::{djb2_32, FridgeStore, UsedIngredient};
use crate::model::IngredientRef;
use crate::registry::RegistryClient;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::io::RawFd;

const COMPONENT: &str = "kitchen";

pub struct ScratchOptions {
    pub name: String,
    pub ingredients: Vec<IngredientRef>,
    pub imports: Vec<String>,
    pub confined: bool,
}

/// A single recipe's sandboxed work area.
pub struct Scratch {
    root: PathBuf,
    confined: bool,
    entered: bool,
    #[cfg(unix)]
    root_handle: Option<RawFd>,
}

impl Scratch {
    /// `W/.oven/<R>`, the chroot root.
    pub fn host_chroot(&self) -> PathBuf {
        self.root.clone()
    }

    pub fn target_ingredients_path(&self) -> PathBuf {
        self.root.join("target/ingredients")
    }

    pub fn chef_dir(&self) -> PathBuf {
        self.root.join("chef")
    }

    pub fn build_dir(&self) -> PathBuf {
        self.chef_dir().join("build")
    }

    pub fn install_dir(&self) -> PathBuf {
        self.chef_dir().join("install")
    }

    pub fn project_dir(&self) -> PathBuf {
        self.chef_dir().join("project")
    }

    pub fn hash_path(&self) -> PathBuf {
        self.chef_dir().join(".hash")
    }

    pub fn confined(&self) -> bool {
        self.confined
    }
}

/// DJB2-32 over the recipe name, each ingredient name and each import name,
/// null-byte separated, in the order given. Sensitive to list order by
/// design: reordering ingredients changes the hash.
pub fn setup_hash(name: &str, ingredients: &[IngredientRef], imports: &[String]) -> u32 {
    let mut data = Vec::new();
    data.extend_from_slice(name.as_bytes());
    data.push(0);
    for ingredient in ingredients {
        data.extend_from_slice(ingredient.name.as_bytes());
        data.push(0);
    }
    for import in imports {
        data.extend_from_slice(import.as_bytes());
        data.push(0);
    }
    djb2_32(&data)
}

/// Create (or reuse) the scratch area for `options.name` under
/// `workspace_root`'s `.oven/` tree, staging every ingredient through
/// `fridge`. If a prior setup's `.hash` matches this one's, staging is
/// skipped entirely and the existing tree is reused as-is.
pub fn scratch_setup(
    workspace_root: &Path,
    options: &ScratchOptions,
    fridge: &mut FridgeStore,
    registry: &dyn RegistryClient,
    host_platform: &str,
    host_arch: &str,
) -> Result<Scratch> {
    let root = workspace_root.join(".oven").join(&options.name);
    let hash = setup_hash(&options.name, &options.ingredients, &options.imports);
    let hash_path = root.join("chef/.hash");

    if let Ok(existing) = std::fs::read_to_string(&hash_path) {
        if existing.trim() == hash.to_string() {
            return Ok(Scratch {
                root,
                confined: options.confined,
                entered: false,
                #[cfg(unix)]
                root_handle: None,
            });
        }
    }

    crate::paths::mkdir_p(COMPONENT, &root.join("target/ingredients"))?;
    crate::paths::mkdir_p(COMPONENT, &root.join("chef/build"))?;

    let output_dir = workspace_root.join(".oven/output");
    crate::paths::mkdir_p(COMPONENT, &output_dir)?;
    crate::paths::symlink(COMPONENT, &root.join("chef/install"), &output_dir)?;
    crate::paths::symlink(COMPONENT, &root.join("chef/project"), workspace_root)?;

    let scratch = Scratch {
        root: root.clone(),
        confined: options.confined,
        entered: false,
        #[cfg(unix)]
        root_handle: None,
    };

    for ingredient_ref in &options.ingredients {
        let used = fridge.use_ingredient(ingredient_ref, registry)?;
        stage_ingredient(&scratch, &used, host_platform, host_arch)?;
    }

    if let Some(parent) = hash_path.parent() {
        crate::paths::mkdir_p(COMPONENT, parent)?;
    }
    std::fs::write(&hash_path, hash.to_string()).map_err(|e| ChefError::io(COMPONENT, &hash_path, e))?;

    Ok(scratch)
}

/// Copy an already-unpacked ingredient from the fridge's cache into the
/// scratch area. Host-role ingredients (matching the host's own
/// platform/architecture) land directly under `host_chroot`; target-role
/// ingredients land under `target/ingredients`. The fridge has already
/// unpacked the archive once into its own cache, so staging is a plain
/// recursive copy rather than a second unpack.
fn stage_ingredient(scratch: &Scratch, used: &UsedIngredient, host_platform: &str, host_arch: &str) -> Result<()> {
    let is_host_role = used.pack.platform == host_platform && used.pack.arch == host_arch;
    let destination_root = if is_host_role { scratch.host_chroot() } else { scratch.target_ingredients_path() };

    copy_tree(&used.unpacked_root, &destination_root)?;

    if let Some(options) = &used.options {
        let prefix_inside_sandbox = if scratch.confined() {
            if is_host_role { "/".to_string() } else { "/target/ingredients".to_string() }
        } else {
            destination_root.to_string_lossy().into_owned()
        };
        pkgconfig::write_stub(&destination_root, &used.manifest.publisher, &used.manifest.package, &used.pack.version, &prefix_inside_sandbox, options)?;
    }

    Ok(())
}

fn copy_tree(source: &Path, destination: &Path) -> Result<()> {
    for entry in walkdir::WalkDir::new(source) {
        let entry = entry.map_err(|e| ChefError::io(COMPONENT, source, std::io::Error::other(e.to_string())))?;
        let relative = entry.path().strip_prefix(source).unwrap_or(entry.path());
        if relative.as_os_str().is_empty() {
            continue;
        }
        let target = destination.join(relative);
        if entry.file_type().is_dir() {
            crate::paths::mkdir_p(COMPONENT, &target)?;
        } else {
            crate::paths::copy_file(COMPONENT, entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Enter the sandbox: no-op unless `scratch.confined()`. Opens a directory
/// handle on `/` for `scratch_leave` to restore later, chroots into
/// `host_chroot`, and chdirs to `/chef/project`. Re-entry is a hard error.
pub fn scratch_enter(scratch: &mut Scratch) -> Result<()> {
    if !scratch.confined {
        return Ok(());
    }
    if scratch.entered {
        return Err(ChefError::validation(COMPONENT, "scratch already entered"));
    }

    #[cfg(unix)]
    {
        use nix::fcntl::{open, OFlag};
        use nix::sys::stat::Mode;

        let root_fd = open(Path::new("/"), OFlag::O_RDONLY | OFlag::O_DIRECTORY, Mode::empty())
            .map_err(|e| ChefError::privilege(COMPONENT, format!("open /: {e}")))?;

        if let Err(e) = nix::unistd::chroot(&scratch.host_chroot()) {
            let _ = nix::unistd::close(root_fd);
            return Err(ChefError::privilege(COMPONENT, format!("chroot into scratch: {e}")));
        }
        if let Err(e) = nix::unistd::chdir("/chef/project") {
            let _ = nix::unistd::close(root_fd);
            return Err(ChefError::io(COMPONENT, "/chef/project", std::io::Error::from(e)));
        }

        scratch.root_handle = Some(root_fd);
    }
    #[cfg(not(unix))]
    {
        return Err(ChefError::privilege(COMPONENT, "sandbox entry requires a unix host"));
    }

    scratch.entered = true;
    Ok(())
}

/// Leave the sandbox: no-op unless `scratch.confined()`. Restores the
/// pre-entry root via the saved handle and closes it.
pub fn scratch_leave(scratch: &mut Scratch) -> Result<()> {
    if !scratch.confined {
        return Ok(());
    }

    #[cfg(unix)]
    {
        if let Some(root_fd) = scratch.root_handle.take() {
            nix::unistd::fchdir(root_fd).map_err(|e| ChefError::privilege(COMPONENT, format!("fchdir to saved root: {e}")))?;
            nix::unistd::chroot(".").map_err(|e| ChefError::privilege(COMPONENT, format!("chroot restore: {e}")))?;
            let _ = nix::unistd::close(root_fd);
        }
    }

    scratch.entered = false;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ConsumerOptions, IngredientKey, PackageManifest, ResolvedIngredient, Version};
    use crate::registry::NullRegistryClient;
    use tempfile::TempDir;

    fn test_scratch(root: PathBuf, confined: bool) -> Scratch {
        Scratch {
            root,
            confined,
            entered: false,
            #[cfg(unix)]
            root_handle: None,
        }
    }

    #[test]
    fn setup_hash_is_stable_for_same_order() {
        let ingredients =
            vec![IngredientRef { name: "acme/libfoo".to_string(), version: None, channel: "stable".to_string() }];
        let a = setup_hash("demo", &ingredients, &[]);
        let b = setup_hash("demo", &ingredients, &[]);
        assert_eq!(a, b);
    }

    #[test]
    fn setup_hash_differs_on_reordered_ingredients() {
        let a_ref = IngredientRef { name: "acme/a".to_string(), version: None, channel: "stable".to_string() };
        let b_ref = IngredientRef { name: "acme/b".to_string(), version: None, channel: "stable".to_string() };
        let forward = setup_hash("demo", &[a_ref.clone(), b_ref.clone()], &[]);
        let backward = setup_hash("demo", &[b_ref, a_ref], &[]);
        assert_ne!(forward, backward);
    }

    #[test]
    fn scratch_enter_leave_are_noops_when_unconfined() {
        let mut scratch = test_scratch(PathBuf::from("/nonexistent"), false);
        scratch_enter(&mut scratch).unwrap();
        assert!(!scratch.entered);
        scratch_leave(&mut scratch).unwrap();
    }

    fn archive_fixture(dir: &Path, publisher: &str, package: &str, kind: &str, with_options: bool) -> PathBuf {
        let path = dir.join(format!("{package}.pkg"));
        let file = std::fs::File::create(&path).unwrap();
        let mut builder = tar::Builder::new(file);

        let manifest = serde_json::json!({
            "publisher": publisher, "package": package, "summary": "", "description": "",
            "homepage": "", "license": "", "eula": "", "maintainer": "", "email": "",
            "type": kind, "version": {"major": 1, "minor": 0, "patch": 0},
        });
        let manifest_bytes = serde_json::to_vec(&manifest).unwrap();
        let mut header = tar::Header::new_gnu();
        header.set_size(manifest_bytes.len() as u64);
        header.set_cksum();
        builder.append_data(&mut header, "manifest.json", manifest_bytes.as_slice()).unwrap();

        if with_options {
            let options = serde_json::json!({"inc_dirs": ["/include"], "lib_dirs": ["/lib"]});
            let options_bytes = serde_json::to_vec(&options).unwrap();
            let mut header = tar::Header::new_gnu();
            header.set_size(options_bytes.len() as u64);
            header.set_cksum();
            builder.append_data(&mut header, "options.json", options_bytes.as_slice()).unwrap();
        }

        let payload = b"x";
        let mut header = tar::Header::new_gnu();
        header.set_size(payload.len() as u64);
        header.set_cksum();
        builder.append_data(&mut header, "payload/include/foo.h", payload.as_slice()).unwrap();
        builder.finish().unwrap();
        path
    }

    fn resolved_for(publisher: &str, package: &str, platform: &str, arch: &str) -> ResolvedIngredient {
        ResolvedIngredient {
            key: IngredientKey {
                publisher: publisher.to_string(),
                package: package.to_string(),
                platform: platform.to_string(),
                architecture: arch.to_string(),
                channel: "stable".to_string(),
                version: None,
            },
            version: Version::new(1, 0, 0),
            download_url: "unused".to_string(),
            checksum: format!("{publisher}-{package}-checksum"),
        }
    }

    #[test]
    fn fresh_setup_stages_target_role_ingredient_and_writes_hash() {
        let workspace = TempDir::new().unwrap();
        let fridge_dir = TempDir::new().unwrap();
        let source_dir = TempDir::new().unwrap();

        archive_fixture(source_dir.path(), "acme", "libfoo", "ingredient", true);

        struct FakeRegistry {
            source_dir: PathBuf,
        }
        impl RegistryClient for FakeRegistry {
            fn resolve(&self, key: &IngredientKey) -> Result<ResolvedIngredient> {
                Ok(resolved_for(&key.publisher, &key.package, &key.platform, &key.architecture))
            }
            fn download(&self, resolved: &ResolvedIngredient, destination: &Path) -> Result<()> {
                std::fs::copy(self.source_dir.join(format!("{}.pkg", resolved.key.package)), destination).unwrap();
                Ok(())
            }
        }

        let mut fridge = FridgeStore::initialize(fridge_dir.path(), "linux", "x86_64").unwrap();
        let registry = FakeRegistry { source_dir: source_dir.path().to_path_buf() };

        let options = ScratchOptions {
            name: "demo".to_string(),
            ingredients: vec![IngredientRef { name: "acme/libfoo".to_string(), version: None, channel: "stable".to_string() }],
            imports: vec![],
            confined: false,
        };

        let scratch = scratch_setup(workspace.path(), &options, &mut fridge, &registry, "darwin", "aarch64").unwrap();

        assert!(scratch.target_ingredients_path().join("include/foo.h").exists());
        assert!(scratch.hash_path().exists());
        assert_eq!(std::fs::read_link(scratch.install_dir()).unwrap(), workspace.path().join(".oven/output"));
        assert_eq!(std::fs::read_link(scratch.project_dir()).unwrap(), workspace.path());
        assert!(scratch.target_ingredients_path().join("usr/share/pkgconfig/libfoo.pc").exists());
    }

    #[test]
    fn second_setup_with_unchanged_hash_skips_staging() {
        let workspace = TempDir::new().unwrap();
        let fridge_dir = TempDir::new().unwrap();
        let source_dir = TempDir::new().unwrap();
        archive_fixture(source_dir.path(), "acme", "libfoo", "ingredient", false);

        struct CountingRegistry {
            source_dir: PathBuf,
            downloads: std::cell::Cell<u32>,
        }
        impl RegistryClient for CountingRegistry {
            fn resolve(&self, key: &IngredientKey) -> Result<ResolvedIngredient> {
                Ok(resolved_for(&key.publisher, &key.package, &key.platform, &key.architecture))
            }
            fn download(&self, resolved: &ResolvedIngredient, destination: &Path) -> Result<()> {
                self.downloads.set(self.downloads.get() + 1);
                std::fs::copy(self.source_dir.join(format!("{}.pkg", resolved.key.package)), destination).unwrap();
                Ok(())
            }
        }

        let mut fridge = FridgeStore::initialize(fridge_dir.path(), "linux", "x86_64").unwrap();
        let registry = CountingRegistry { source_dir: source_dir.path().to_path_buf(), downloads: std::cell::Cell::new(0) };
        let options = ScratchOptions {
            name: "demo".to_string(),
            ingredients: vec![IngredientRef { name: "acme/libfoo".to_string(), version: None, channel: "stable".to_string() }],
            imports: vec![],
            confined: false,
        };

        scratch_setup(workspace.path(), &options, &mut fridge, &registry, "linux", "x86_64").unwrap();
        assert_eq!(registry.downloads.get(), 1);
        scratch_setup(workspace.path(), &options, &mut fridge, &registry, "linux", "x86_64").unwrap();
        assert_eq!(registry.downloads.get(), 1);
    }

    #[test]
    fn host_role_ingredient_stages_directly_into_chroot_root() {
        let workspace = TempDir::new().unwrap();
        let fridge_dir = TempDir::new().unwrap();
        let source_dir = TempDir::new().unwrap();
        archive_fixture(source_dir.path(), "gnu", "gcc", "toolchain", false);

        struct FakeRegistry {
            source_dir: PathBuf,
        }
        impl RegistryClient for FakeRegistry {
            fn resolve(&self, key: &IngredientKey) -> Result<ResolvedIngredient> {
                Ok(resolved_for(&key.publisher, &key.package, &key.platform, &key.architecture))
            }
            fn download(&self, resolved: &ResolvedIngredient, destination: &Path) -> Result<()> {
                std::fs::copy(self.source_dir.join(format!("{}.pkg", resolved.key.package)), destination).unwrap();
                Ok(())
            }
        }

        let mut fridge = FridgeStore::initialize(fridge_dir.path(), "linux", "x86_64").unwrap();
        let registry = FakeRegistry { source_dir: source_dir.path().to_path_buf() };
        let options = ScratchOptions {
            name: "demo".to_string(),
            ingredients: vec![IngredientRef { name: "gnu/gcc".to_string(), version: None, channel: "stable".to_string() }],
            imports: vec![],
            confined: false,
        };

        let scratch = scratch_setup(workspace.path(), &options, &mut fridge, &registry, "linux", "x86_64").unwrap();
        assert!(scratch.host_chroot().join("include/foo.h").exists());
    }
}
