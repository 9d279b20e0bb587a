//! Backend dispatch for the generate and build steps.
//!
//! Closed, tagged enums rather than a string-keyed lookup table: the set of
//! supported backends is small and fixed, and a typo in a recipe's backend
//! name should be a parse-time error, not a silent no-op at dispatch time.

use crate::error::{ChefError, Result};
use crate::spawn::{self, SpawnOptions};
use std::collections::HashMap;
use std::path::Path;

const COMPONENT: &str = "oven/backend";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerateBackend {
    Configure,
    CMake,
    Meson,
}

impl GenerateBackend {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "configure" => Ok(GenerateBackend::Configure),
            "cmake" => Ok(GenerateBackend::CMake),
            "meson" => Ok(GenerateBackend::Meson),
            other => Err(ChefError::not_found(COMPONENT, format!("generate backend '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildBackend {
    Make,
    Meson,
}

impl BuildBackend {
    pub fn parse(name: &str) -> Result<Self> {
        match name {
            "make" => Ok(BuildBackend::Make),
            "meson" => Ok(BuildBackend::Meson),
            other => Err(ChefError::not_found(COMPONENT, format!("build backend '{other}'"))),
        }
    }
}

/// Data a backend invocation needs: where to run, what to pass, and what
/// environment the child process should see.
pub struct BackendData<'a> {
    pub working_dir: &'a Path,
    pub arguments: &'a str,
    pub environment: &'a [(String, String)],
}

/// A concrete way to drive one backend's command-line tool.
pub trait BackendInvoker {
    fn invoke(&self, data: &BackendData<'_>) -> Result<()>;
}

struct ShellInvoker {
    program: &'static str,
}

impl BackendInvoker for ShellInvoker {
    fn invoke(&self, data: &BackendData<'_>) -> Result<()> {
        let status = spawn::spawn(
            self.program,
            data.arguments,
            data.environment,
            SpawnOptions { argv0: None, cwd: Some(data.working_dir), on_output: None },
        )?;
        if status != 0 {
            return Err(ChefError::child_exit(COMPONENT, self.program, status));
        }
        Ok(())
    }
}

pub fn generate_invoker(backend: GenerateBackend) -> Box<dyn BackendInvoker> {
    let program = match backend {
        GenerateBackend::Configure => "./configure",
        GenerateBackend::CMake => "cmake",
        GenerateBackend::Meson => "meson",
    };
    Box::new(ShellInvoker { program })
}

pub fn build_invoker(backend: BuildBackend) -> Box<dyn BackendInvoker> {
    let program = match backend {
        BuildBackend::Make => "make",
        BuildBackend::Meson => "meson",
    };
    Box::new(ShellInvoker { program })
}

pub fn env_vec(map: &HashMap<String, String>) -> Vec<(String, String)> {
    map.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generate_backend_parses_known_names() {
        assert_eq!(GenerateBackend::parse("cmake").unwrap(), GenerateBackend::CMake);
        assert_eq!(GenerateBackend::parse("meson").unwrap(), GenerateBackend::Meson);
        assert_eq!(GenerateBackend::parse("configure").unwrap(), GenerateBackend::Configure);
    }

    #[test]
    fn generate_backend_rejects_unknown_names() {
        assert!(GenerateBackend::parse("ninja").is_err());
    }

    #[test]
    fn build_backend_parses_known_names() {
        assert_eq!(BuildBackend::parse("make").unwrap(), BuildBackend::Make);
        assert_eq!(BuildBackend::parse("meson").unwrap(), BuildBackend::Meson);
    }

    #[test]
    fn build_backend_rejects_unknown_names() {
        assert!(BuildBackend::parse("msbuild").is_err());
    }
}
