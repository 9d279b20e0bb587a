//! Crate-wide error taxonomy.
//!
//! Every public operation in `fridge`, `kitchen` and `oven` returns
//! `Result<T, ChefError>`. The CLI front-end converts these into
//! `anyhow::Error` at the boundary, the way a thin binary wrapping a
//! library normally does.

use std::path::PathBuf;
use thiserror::Error;

/// A single crate-wide error type, one variant per taxonomy entry.
#[derive(Debug, Error)]
pub enum ChefError {
    #[error("{component}: {message}")]
    Validation { component: &'static str, message: String },

    #[error("{component}: {what} not found")]
    NotFound { component: &'static str, what: String },

    #[error("{component}: {path}: {source}")]
    Io {
        component: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{component}: failed to unpack {path}: {message}")]
    Archive {
        component: &'static str,
        path: PathBuf,
        message: String,
    },

    #[error("{component}: step '{step}' exited with status {status}")]
    ChildExit {
        component: &'static str,
        step: String,
        status: i32,
    },

    #[error("{component}: {message}")]
    Privilege { component: &'static str, message: String },
}

impl ChefError {
    pub fn validation(component: &'static str, message: impl Into<String>) -> Self {
        ChefError::Validation { component, message: message.into() }
    }

    pub fn not_found(component: &'static str, what: impl Into<String>) -> Self {
        ChefError::NotFound { component, what: what.into() }
    }

    pub fn io(component: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ChefError::Io { component, path: path.into(), source }
    }

    pub fn archive(component: &'static str, path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        ChefError::Archive { component, path: path.into(), message: message.into() }
    }

    pub fn child_exit(component: &'static str, step: impl Into<String>, status: i32) -> Self {
        ChefError::ChildExit { component, step: step.into(), status }
    }

    pub fn privilege(component: &'static str, message: impl Into<String>) -> Self {
        ChefError::Privilege { component, message: message.into() }
    }
}

pub type Result<T> = std::result::Result<T, ChefError>;
