//! Registry client abstraction.
//!
//! Resolving an ingredient reference to a concrete, downloadable version is
//! an external collaborator's job in this system (an actual package
//! registry's wire protocol and auth are out of scope here); this module
//! only defines the seam and a couple of implementations useful for
//! driving the rest of the toolchain without a live registry.

use crate::error::{ChefError, Result};
use crate::model::{IngredientKey, ResolvedIngredient};
use std::path::Path;

const COMPONENT: &str = "registry";

fn describe(key: &IngredientKey) -> String {
    format!("{}/{}", key.publisher, key.package)
}

/// Resolves ingredient references and fetches their archives.
pub trait RegistryClient {
    fn resolve(&self, key: &IngredientKey) -> Result<ResolvedIngredient>;
    fn download(&self, resolved: &ResolvedIngredient, destination: &Path) -> Result<()>;
}

/// A registry client backed by an in-memory table, useful for tests and for
/// recipes that only consume ingredients already present in the fridge. A
/// `HashMap` keyed on `IngredientKey` isn't workable here since the key
/// carries an `Option<Version>` whose equality ignores `revision`, so lookups
/// instead scan linearly by identity.
#[derive(Default)]
pub struct NullRegistryClient {
    known: Vec<ResolvedIngredient>,
}

impl NullRegistryClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_known(mut self, resolved: ResolvedIngredient) -> Self {
        self.known.push(resolved);
        self
    }
}

impl RegistryClient for NullRegistryClient {
    fn resolve(&self, key: &IngredientKey) -> Result<ResolvedIngredient> {
        self.known
            .iter()
            .find(|candidate| {
                candidate.key.publisher == key.publisher
                    && candidate.key.package == key.package
                    && candidate.key.platform == key.platform
                    && candidate.key.architecture == key.architecture
                    && candidate.key.channel == key.channel
                    && key.version.as_ref().map(|wanted| &candidate.version == wanted).unwrap_or(true)
            })
            .cloned()
            .ok_or_else(|| ChefError::not_found(COMPONENT, format!("ingredient {}", describe(key))))
    }

    fn download(&self, resolved: &ResolvedIngredient, _destination: &Path) -> Result<()> {
        Err(ChefError::not_found(COMPONENT, format!("archive for {}", describe(&resolved.key))))
    }
}

/// A registry client that speaks to a real HTTP registry over `ureq`. Its
/// wire format is whatever the registry on the other end defines; this
/// crate's contract stops at "resolve returns a downloadable URL and a
/// checksum, download fetches the bytes at that URL".
pub struct HttpRegistryClient {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpRegistryClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        HttpRegistryClient { base_url: base_url.into(), agent: ureq::Agent::new() }
    }
}

impl RegistryClient for HttpRegistryClient {
    fn resolve(&self, key: &IngredientKey) -> Result<ResolvedIngredient> {
        let url = format!(
            "{}/ingredients/{}/{}/{}/{}/{}",
            self.base_url, key.publisher, key.package, key.channel, key.platform, key.architecture
        );
        self.agent
            .get(&url)
            .call()
            .map_err(|e| ChefError::validation(COMPONENT, format!("resolve {url}: {e}")))?
            .into_json()
            .map_err(|e| ChefError::validation(COMPONENT, format!("decode response from {url}: {e}")))
    }

    fn download(&self, resolved: &ResolvedIngredient, destination: &Path) -> Result<()> {
        let response = self
            .agent
            .get(&resolved.download_url)
            .call()
            .map_err(|e| ChefError::validation(COMPONENT, format!("download {}: {e}", resolved.download_url)))?;
        let mut file = std::fs::File::create(destination)
            .map_err(|e| ChefError::io(COMPONENT, destination, e))?;
        std::io::copy(&mut response.into_reader(), &mut file)
            .map_err(|e| ChefError::io(COMPONENT, destination, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Version;

    fn key(publisher: &str, package: &str) -> IngredientKey {
        IngredientKey {
            publisher: publisher.to_string(),
            package: package.to_string(),
            channel: "stable".to_string(),
            platform: "linux".to_string(),
            architecture: "x86_64".to_string(),
            version: None,
        }
    }

    #[test]
    fn null_client_resolves_known_ingredients() {
        let resolved = ResolvedIngredient {
            key: key("acme", "libfoo"),
            version: Version::new(1, 0, 0),
            download_url: "https://example.test/libfoo.tar".to_string(),
            checksum: "deadbeef".to_string(),
        };
        let client = NullRegistryClient::new().with_known(resolved.clone());
        assert_eq!(client.resolve(&key("acme", "libfoo")).unwrap().checksum, "deadbeef");
    }

    #[test]
    fn null_client_rejects_unknown_ingredients() {
        let client = NullRegistryClient::new();
        assert!(client.resolve(&key("acme", "libbar")).is_err());
    }

    #[test]
    fn null_client_matches_pinned_version() {
        let resolved = ResolvedIngredient {
            key: key("acme", "libfoo"),
            version: Version::new(1, 0, 0),
            download_url: "https://example.test/libfoo.tar".to_string(),
            checksum: "deadbeef".to_string(),
        };
        let client = NullRegistryClient::new().with_known(resolved);
        let mut wanted = key("acme", "libfoo");
        wanted.version = Some(Version::new(2, 0, 0));
        assert!(client.resolve(&wanted).is_err());
    }
}
