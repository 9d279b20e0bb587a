//! The oven: checkpointed execution of a recipe's configure/build/script
//! steps inside a scratch area.
//!
//! State for the recipe currently being baked lives in a thread-local
//! singleton, the way the teacher's own process-wide engine context does —
//! callers reach it through the `oven_*` free functions below rather than
//! threading a context object through every call site. Underneath, every
//! one of those functions is a thin wrapper over `OvenContext`'s own
//! methods, which take an explicit `&mut self` and carry no global state;
//! tests and any caller that wants to run more than one oven in a process
//! (or just avoid the thread-local) can use `OvenContext` directly.

pub mod backend;
pub mod checkpoint;
pub mod variables;

use crate::error::{ChefError, Result};
use crate::kitchen::{scratch_enter, scratch_leave, Scratch};
use crate::output;
use backend::{build_invoker, generate_invoker, BackendData, BuildBackend, GenerateBackend};
use checkpoint::Checkpoint;
use std::cell::RefCell;
use std::collections::HashMap;

const COMPONENT: &str = "oven";

/// The target this oven instance was initialized for. Fixed for the life
/// of the process; a recipe's confinement and toolchain are per-recipe and
/// live on `OvenContext` instead.
#[derive(Debug, Clone)]
pub struct OvenParams {
    pub target_platform: String,
    pub target_architecture: String,
}

enum OvenState {
    Uninitialized,
    Ready(OvenParams),
    Active { params: OvenParams, ctx: OvenContext },
}

/// Everything one recipe's bake needs: where it runs, what's already done,
/// and the variables its step commands may reference.
pub struct OvenContext {
    scratch: Scratch,
    checkpoint: Checkpoint,
    internal_vars: HashMap<String, String>,
    env_vars: HashMap<String, String>,
    include_filters: Vec<String>,
}

impl OvenContext {
    /// Build the context for one recipe run. The internal variable set is
    /// exactly `CHEF_TARGET_PLATFORM`, `CHEF_TARGET_ARCHITECTURE`,
    /// `CHEF_HOST_PLATFORM`, `CHEF_HOST_ARCHITECTURE`, `TOOLCHAIN_PREFIX`,
    /// `PROJECT_PATH`, `INSTALL_PREFIX` — no others.
    pub fn new(scratch: Scratch, env_vars: HashMap<String, String>, params: &OvenParams, toolchain: Option<&str>) -> Result<Self> {
        let checkpoint = Checkpoint::open(&scratch.chef_dir())?;

        let project_path = if scratch.confined() {
            "/chef/project".to_string()
        } else {
            scratch.project_dir().to_string_lossy().into_owned()
        };
        let install_prefix = if scratch.confined() {
            "/chef/install".to_string()
        } else {
            scratch.install_dir().to_string_lossy().into_owned()
        };

        let mut internal_vars = HashMap::new();
        internal_vars.insert("CHEF_TARGET_PLATFORM".to_string(), params.target_platform.clone());
        internal_vars.insert("CHEF_TARGET_ARCHITECTURE".to_string(), params.target_architecture.clone());
        internal_vars.insert("CHEF_HOST_PLATFORM".to_string(), std::env::consts::OS.to_string());
        internal_vars.insert("CHEF_HOST_ARCHITECTURE".to_string(), std::env::consts::ARCH.to_string());
        internal_vars.insert("TOOLCHAIN_PREFIX".to_string(), toolchain.unwrap_or("").to_string());
        internal_vars.insert("PROJECT_PATH".to_string(), project_path);
        internal_vars.insert("INSTALL_PREFIX".to_string(), install_prefix);

        Ok(OvenContext { scratch, checkpoint, internal_vars, env_vars, include_filters: Vec::new() })
    }

    pub fn clear_recipe_checkpoint(&mut self) -> Result<()> {
        self.checkpoint.clear()
    }

    /// Run `step` unless already checkpointed, wrapping the work in a
    /// `scratch_enter`/`scratch_leave` pair per the per-step execution
    /// contract. `scratch_leave` always runs, even if the step itself
    /// failed, so a failing step doesn't strand the process inside the
    /// chroot; the step's own error is what gets surfaced to the caller.
    fn run_checkpointed_step(&mut self, step: &str, run: impl FnOnce(&mut Self) -> Result<()>) -> Result<()> {
        if self.checkpoint.contains(step) {
            output::detail(&format!("nothing to be done for {step}"));
            return Ok(());
        }
        output::sub_action(step);

        scratch_enter(&mut self.scratch)?;
        let result = run(self);
        let leave_result = scratch_leave(&mut self.scratch);
        result?;
        leave_result?;

        self.checkpoint.create(step)
    }

    pub fn configure(&mut self, backend: GenerateBackend, arguments: &str) -> Result<()> {
        self.run_checkpointed_step("configure", |ctx| {
            let expanded = variables::expand(arguments, &ctx.internal_vars, &ctx.env_vars)?;
            let build_dir = ctx.scratch.build_dir();
            let env = backend::env_vec(&ctx.env_vars);
            generate_invoker(backend).invoke(&BackendData {
                working_dir: &build_dir,
                arguments: &expanded,
                environment: &env,
            })
        })
    }

    pub fn build(&mut self, backend: BuildBackend, arguments: &str) -> Result<()> {
        self.run_checkpointed_step("build", |ctx| {
            let expanded = variables::expand(arguments, &ctx.internal_vars, &ctx.env_vars)?;
            let build_dir = ctx.scratch.build_dir();
            let env = backend::env_vec(&ctx.env_vars);
            build_invoker(backend).invoke(&BackendData {
                working_dir: &build_dir,
                arguments: &expanded,
                environment: &env,
            })
        })
    }

    /// Run an arbitrary shell script as a named step, checkpointed the same
    /// way configure/build are.
    pub fn script(&mut self, step_name: &str, script: &str) -> Result<()> {
        let step_name = step_name.to_string();
        self.run_checkpointed_step(&step_name.clone(), |ctx| {
            let expanded = variables::expand(script, &ctx.internal_vars, &ctx.env_vars)?;
            let build_dir = ctx.scratch.build_dir();
            let env = backend::env_vec(&ctx.env_vars);
            let status = crate::spawn::spawn(
                "sh",
                &format!("-c \"{expanded}\""),
                &env,
                crate::spawn::SpawnOptions { argv0: None, cwd: Some(&build_dir), on_output: None },
            )?;
            if status != 0 {
                return Err(ChefError::child_exit(COMPONENT, step_name.clone(), status));
            }
            Ok(())
        })
    }

    /// Wipe the build directory and all checkpoints, forcing a full rebake.
    pub fn clean(&mut self) -> Result<()> {
        crate::paths::rmdir_recursive(COMPONENT, &self.scratch.build_dir())?;
        crate::paths::mkdir_p(COMPONENT, &self.scratch.build_dir())?;
        self.checkpoint.clear()
    }

    /// Set the glob patterns (relative to the build directory) that decide
    /// which files an install step does **not** copy into the scratch
    /// install prefix. A zero-length list copies everything.
    pub fn set_include_filters(&mut self, patterns: Vec<String>) {
        self.include_filters = patterns;
    }

    /// Whether `relative_path` should be copied during install: true unless
    /// it matches one of the configured filters.
    pub fn should_install(&self, relative_path: &str) -> bool {
        if self.include_filters.is_empty() {
            return true;
        }
        !self.include_filters.iter().any(|pattern| crate::paths::glob_match(pattern, relative_path))
    }

    /// Walk the build directory and copy every file not excluded by the
    /// install filters into the scratch install prefix, checkpointed as
    /// "install".
    pub fn install(&mut self) -> Result<()> {
        self.run_checkpointed_step("install", |ctx| {
            let build_dir = ctx.scratch.build_dir();
            let install_dir = ctx.scratch.install_dir();

            for entry in walkdir::WalkDir::new(&build_dir) {
                let entry = entry.map_err(|e| {
                    ChefError::io(COMPONENT, build_dir.clone(), std::io::Error::from(e))
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let relative = entry
                    .path()
                    .strip_prefix(&build_dir)
                    .expect("walkdir entries are rooted under build_dir");
                let relative_str = relative.to_string_lossy();
                if !ctx.should_install(&relative_str) {
                    continue;
                }
                crate::paths::copy_file(COMPONENT, entry.path(), &install_dir.join(relative))?;
            }
            Ok(())
        })
    }
}

thread_local! {
    static STATE: RefCell<OvenState> = const { RefCell::new(OvenState::Uninitialized) };
}

fn with_context<R>(f: impl FnOnce(&mut OvenContext) -> Result<R>) -> Result<R> {
    STATE.with(|cell| match &mut *cell.borrow_mut() {
        OvenState::Active { ctx, .. } => f(ctx),
        _ => Err(ChefError::validation(COMPONENT, "no recipe active; call oven_recipe_start first")),
    })
}

/// `Uninitialized -> Ready`.
pub fn oven_initialize(params: OvenParams) -> Result<()> {
    STATE.with(|cell| {
        let mut state = cell.borrow_mut();
        match &*state {
            OvenState::Uninitialized => {
                *state = OvenState::Ready(params);
                Ok(())
            }
            _ => Err(ChefError::validation(COMPONENT, "already initialized")),
        }
    })
}

/// `Ready -> Uninitialized`. A hard error while a recipe is active.
pub fn oven_cleanup() -> Result<()> {
    STATE.with(|cell| {
        let mut state = cell.borrow_mut();
        match &*state {
            OvenState::Active { .. } => Err(ChefError::validation(COMPONENT, "cannot clean up with a recipe active")),
            _ => {
                *state = OvenState::Uninitialized;
                Ok(())
            }
        }
    })
}

/// `Ready -> Active`. Re-entrant starts (already Active, or never
/// initialized) are validation errors.
pub fn oven_recipe_start(scratch: Scratch, toolchain: Option<&str>, env_vars: HashMap<String, String>, name: &str) -> Result<()> {
    STATE.with(|cell| {
        let mut state = cell.borrow_mut();
        let params = match &*state {
            OvenState::Ready(params) => params.clone(),
            OvenState::Active { .. } => return Err(ChefError::validation(COMPONENT, "recipe already started")),
            OvenState::Uninitialized => return Err(ChefError::validation(COMPONENT, "not initialized; call oven_initialize first")),
        };

        output::action(&format!("baking {name}"));
        let ctx = OvenContext::new(scratch, env_vars, &params, toolchain)?;
        *state = OvenState::Active { params, ctx };
        Ok(())
    })
}

/// `Active -> Ready`.
pub fn oven_recipe_end(name: &str) -> Result<()> {
    STATE.with(|cell| {
        let mut state = cell.borrow_mut();
        match std::mem::replace(&mut *state, OvenState::Uninitialized) {
            OvenState::Active { params, .. } => {
                output::success(&format!("finished {name}"));
                *state = OvenState::Ready(params);
                Ok(())
            }
            other => {
                *state = other;
                Err(ChefError::validation(COMPONENT, "no recipe active"))
            }
        }
    })
}

pub fn oven_clear_recipe_checkpoint() -> Result<()> {
    with_context(|ctx| ctx.clear_recipe_checkpoint())
}

pub fn oven_configure(backend: GenerateBackend, arguments: &str) -> Result<()> {
    with_context(|ctx| ctx.configure(backend, arguments))
}

pub fn oven_build(backend: BuildBackend, arguments: &str) -> Result<()> {
    with_context(|ctx| ctx.build(backend, arguments))
}

pub fn oven_script(step_name: &str, script: &str) -> Result<()> {
    with_context(|ctx| ctx.script(step_name, script))
}

pub fn oven_clean() -> Result<()> {
    with_context(|ctx| ctx.clean())
}

pub fn oven_include_filters(patterns: Vec<String>) -> Result<()> {
    with_context(|ctx| {
        ctx.set_include_filters(patterns);
        Ok(())
    })
}

pub fn oven_install() -> Result<()> {
    with_context(|ctx| ctx.install())
}
