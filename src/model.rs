//! Data types shared across fridge, kitchen and oven: package identity,
//! version ordering, manifests and the request that kicks off a recipe run.

use crate::error::{ChefError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A version as tracked by the registry: `major.minor.patch` plus a
/// server-side monotonic `revision` within a channel, an optional free-form
/// `tag`, and archive bookkeeping (`size`, `created`). Ordering compares
/// only the semantic triple and tag; `revision` is a separate axis used by
/// inventory lookups to pick "the latest" when a caller doesn't pin a
/// version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    #[serde(default)]
    pub revision: i64,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub size: i64,
    #[serde(default)]
    pub created: Option<i64>,
}

impl Version {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Version { major, minor, patch, revision: 0, tag: None, size: 0, created: None }
    }

    pub fn parse(text: &str) -> Option<Self> {
        let (core, tag) = match text.split_once('-') {
            Some((core, tag)) => (core, Some(tag.to_string())),
            None => (text, None),
        };
        let mut parts = core.split('.');
        let major = parts.next()?.parse().ok()?;
        let minor = parts.next().unwrap_or("0").parse().ok()?;
        let patch = parts.next().unwrap_or("0").parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Version { major, minor, patch, revision: 0, tag, size: 0, created: None })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if let Some(tag) = &self.tag {
            write!(f, "-{tag}")?;
        }
        Ok(())
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        (self.major, self.minor, self.patch, &self.tag) == (other.major, other.minor, other.patch, &other.tag)
    }
}

impl Eq for Version {}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (&self.tag, &other.tag) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Greater,
                (Some(_), None) => Ordering::Less,
                (Some(a), Some(b)) => a.cmp(b),
            })
    }
}

/// What an ingredient archive is for, per its embedded manifest. Toolchain
/// ingredients route to the fridge's utensils area; everything else routes
/// to prep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngredientType {
    Toolchain,
    Ingredient,
    Application,
}

/// Per-consumer build flags an ingredient may declare, used to generate a
/// pkg-config stub for anything that depends on it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsumerOptions {
    pub inc_dirs: Vec<String>,
    pub lib_dirs: Vec<String>,
}

/// The manifest embedded in a package archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageManifest {
    pub publisher: String,
    pub package: String,
    pub summary: String,
    pub description: String,
    pub homepage: String,
    pub license: String,
    pub eula: String,
    pub maintainer: String,
    pub email: String,
    #[serde(rename = "type")]
    pub kind: IngredientType,
}

/// Split `"publisher/package"` into its two segments. A malformed name
/// (missing or empty segment) is a validation error, not a panic — package
/// names arrive from recipe files and registries, both untrusted input.
pub fn parse_identity(name: &str) -> Result<(String, String)> {
    let mut parts = name.splitn(2, '/');
    let publisher = parts.next().filter(|s| !s.is_empty());
    let package = parts.next().filter(|s| !s.is_empty());
    match (publisher, package) {
        (Some(publisher), Some(package)) => Ok((publisher.to_string(), package.to_string())),
        _ => Err(ChefError::validation("model", format!("malformed ingredient name '{name}', expected 'publisher/package'"))),
    }
}

/// A reference to an ingredient a recipe depends on, as written in a recipe
/// file (already parsed upstream; this crate treats recipe parsing as an
/// external collaborator and only consumes the resulting structured data).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngredientRef {
    /// `"publisher/package"`.
    pub name: String,
    pub version: Option<Version>,
    pub channel: String,
}

impl IngredientRef {
    pub fn identity(&self) -> Result<(String, String)> {
        parse_identity(&self.name)
    }
}

/// The registry key tuple: `(publisher, package, platform, architecture,
/// channel, version-or-any)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngredientKey {
    pub publisher: String,
    pub package: String,
    pub platform: String,
    pub architecture: String,
    pub channel: String,
    pub version: Option<Version>,
}

/// What a registry resolved an `IngredientKey` to: a concrete version plus
/// enough information to download and verify the archive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedIngredient {
    pub key: IngredientKey,
    pub version: Version,
    pub download_url: String,
    pub checksum: String,
}

/// The parsed, validated request that starts a recipe run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeRequest {
    pub name: String,
    pub relative_path: String,
    pub toolchain: Option<String>,
    pub ingredients: Vec<IngredientRef>,
    pub imports: Vec<String>,
    pub confined: bool,
}
