//! `chef`: a thin CLI front-end over the fridge/kitchen/oven library,
//! playing the same role the teacher's own CLI binary plays over its
//! engine crate.

use chef_bake::fridge::FridgeStore;
use chef_bake::kitchen::{self, ScratchOptions};
use chef_bake::model::{IngredientRef, Version};
use chef_bake::oven::{self, backend::BuildBackend, backend::GenerateBackend, OvenParams};
use chef_bake::output;
use chef_bake::registry::{HttpRegistryClient, NullRegistryClient, RegistryClient};
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "chef", about = "Reproducible package-build toolchain", version)]
struct Cli {
    /// Fridge root directory; defaults to ~/.cache/chef-bake/fridge.
    #[arg(long, global = true, env = "CHEF_FRIDGE")]
    fridge: Option<PathBuf>,

    /// Registry base URL; omit to only use ingredients already cached in
    /// the fridge.
    #[arg(long, global = true, env = "CHEF_REGISTRY")]
    registry: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a recipe's configure + build + install steps inside a scratch area.
    Bake {
        /// Recipe name; also the scratch area's directory name under .oven/.
        recipe: String,
        /// Ingredients to stage, as `publisher/package[@version][:channel]`.
        #[arg(long = "ingredient")]
        ingredients: Vec<String>,
        /// Import names folded into the setup hash alongside ingredients.
        #[arg(long = "import")]
        imports: Vec<String>,
        /// Toolchain ingredient name, exposed to steps as TOOLCHAIN_PREFIX.
        #[arg(long)]
        toolchain: Option<String>,
        /// Build inside a chroot rather than directly against the host.
        #[arg(long)]
        confined: bool,
        /// Cross-compilation target platform; defaults to the host's.
        #[arg(long)]
        target_platform: Option<String>,
        /// Cross-compilation target architecture; defaults to the host's.
        #[arg(long)]
        target_architecture: Option<String>,
        #[arg(long, default_value = "configure")]
        generate_backend: String,
        #[arg(long, default_value = "")]
        generate_args: String,
        #[arg(long, default_value = "make")]
        build_backend: String,
        #[arg(long, default_value = "")]
        build_args: String,
    },
    /// Wipe a recipe's checkpoints, forcing a rebake from the first step.
    Clean { recipe: String },
    /// Report how many ingredients the fridge has already cached.
    FridgeStatus,
    /// Drop the fridge's unpacked prep area and forget every cached pack.
    FridgePurge,
}

fn default_fridge_root() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".cache/chef-bake/fridge")
}

fn registry_client(base_url: Option<&str>) -> Box<dyn RegistryClient> {
    match base_url {
        Some(url) => Box::new(HttpRegistryClient::new(url)),
        None => Box::new(NullRegistryClient::new()),
    }
}

/// Parse `publisher/package[@version][:channel]`, defaulting channel to
/// "stable" when omitted.
fn parse_ingredient_spec(spec: &str) -> anyhow::Result<IngredientRef> {
    let (rest, channel) = match spec.split_once(':') {
        Some((rest, channel)) => (rest, channel.to_string()),
        None => (spec, "stable".to_string()),
    };
    let (name, version) = match rest.split_once('@') {
        Some((name, version)) => {
            let version = Version::parse(version)
                .ok_or_else(|| anyhow::anyhow!("malformed version in ingredient spec '{spec}'"))?;
            (name.to_string(), Some(version))
        }
        None => (rest.to_string(), None),
    };
    Ok(IngredientRef { name, version, channel })
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let fridge_root = cli.fridge.unwrap_or_else(default_fridge_root);
    let workspace_root = std::env::current_dir()?;
    let host_platform = std::env::consts::OS;
    let host_arch = std::env::consts::ARCH;
    let registry = registry_client(cli.registry.as_deref());

    match cli.command {
        Command::Bake {
            recipe,
            ingredients,
            imports,
            toolchain,
            confined,
            target_platform,
            target_architecture,
            generate_backend,
            generate_args,
            build_backend,
            build_args,
        } => {
            let mut fridge = FridgeStore::initialize(&fridge_root, host_platform, host_arch)?;

            let ingredient_refs =
                ingredients.iter().map(|spec| parse_ingredient_spec(spec)).collect::<anyhow::Result<Vec<_>>>()?;
            let options = ScratchOptions { name: recipe.clone(), ingredients: ingredient_refs, imports, confined };
            let scratch = kitchen::scratch_setup(&workspace_root, &options, &mut fridge, registry.as_ref(), host_platform, host_arch)?;

            let params = OvenParams {
                target_platform: target_platform.unwrap_or_else(|| host_platform.to_string()),
                target_architecture: target_architecture.unwrap_or_else(|| host_arch.to_string()),
            };
            let env_vars: HashMap<String, String> = std::env::vars().collect();

            oven::oven_initialize(params)?;
            oven::oven_recipe_start(scratch, toolchain.as_deref(), env_vars, &recipe)?;

            let generate = GenerateBackend::parse(&generate_backend)?;
            oven::oven_configure(generate, &generate_args)?;

            let build = BuildBackend::parse(&build_backend)?;
            oven::oven_build(build, &build_args)?;
            oven::oven_install()?;

            oven::oven_recipe_end(&recipe)?;
            oven::oven_cleanup()?;
            fridge.cleanup()?;
            Ok(())
        }
        Command::Clean { recipe } => {
            let mut fridge = FridgeStore::initialize(&fridge_root, host_platform, host_arch)?;
            let options = ScratchOptions { name: recipe, ingredients: vec![], imports: vec![], confined: false };
            let scratch = kitchen::scratch_setup(&workspace_root, &options, &mut fridge, registry.as_ref(), host_platform, host_arch)?;

            let params = OvenParams { target_platform: host_platform.to_string(), target_architecture: host_arch.to_string() };
            oven::oven_initialize(params)?;
            oven::oven_recipe_start(scratch, None, HashMap::new(), "clean")?;
            oven::oven_clean()?;
            oven::oven_recipe_end("clean")?;
            oven::oven_cleanup()?;
            fridge.cleanup()?;
            output::success("scratch area cleaned");
            Ok(())
        }
        Command::FridgeStatus => {
            let store = FridgeStore::initialize(&fridge_root, host_platform, host_arch)?;
            output::action(&format!("fridge root: {}", store.root().display()));
            output::detail(&format!("{} ingredient(s) cached", store.ingredient_count()));
            store.cleanup()?;
            Ok(())
        }
        Command::FridgePurge => {
            let mut store = FridgeStore::initialize(&fridge_root, host_platform, host_arch)?;
            store.purge()?;
            store.cleanup()?;
            output::success("fridge purged");
            Ok(())
        }
    }
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        output::error(&err.to_string());
        std::process::exit(1);
    }
}
