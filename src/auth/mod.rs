//! Registry credential resolution.
//!
//! Publish-mode phases push and pull images directly against a registry and
//! need credentials resolved before the phase container exists. The resolved
//! payload is the wire format the lifecycle reads from its environment: a
//! JSON map of registry host to Authorization header value.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::LifecycleError;

/// Docker Hub registry host, used when a reference carries no registry.
pub const DEFAULT_REGISTRY: &str = "index.docker.io";

/// Credential lookup for image references.
pub trait Keychain: Send + Sync {
    /// Resolve credentials for one image reference.
    ///
    /// An empty authorization means anonymous access; lookup machinery
    /// failures (unreadable credential store, helper errors) are `Err`.
    fn resolve(&self, reference: &str) -> Result<RegistryAuth>;
}

/// Resolved credentials for a single registry.
#[derive(Debug, Clone)]
pub struct RegistryAuth {
    pub registry: String,
    /// Authorization header value, e.g. `Basic <base64>`. Empty = anonymous.
    pub authorization: String,
}

/// Opaque credential blob owned by the contract that required it.
///
/// The contents never appear in `Debug` output or logs.
#[derive(Clone)]
pub struct AuthPayload(String);

impl AuthPayload {
    pub(crate) fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthPayload(<redacted>)")
    }
}

/// Registry host of an image reference.
///
/// The leading path component is the registry iff it looks like a host
/// (contains `.` or `:`, or is `localhost`); everything else resolves to
/// Docker Hub.
pub fn registry_of(reference: &str) -> &str {
    match reference.split_once('/') {
        Some((host, _)) if host.contains('.') || host.contains(':') || host == "localhost" => host,
        _ => DEFAULT_REGISTRY,
    }
}

/// Resolve credentials for every reference and aggregate them into one
/// payload. The first resolution failure aborts, before any phase unit is
/// created.
pub fn registry_auth_payload(
    keychain: &dyn Keychain,
    references: &[&str],
) -> Result<AuthPayload, LifecycleError> {
    let mut by_registry = BTreeMap::new();
    for reference in references {
        let auth = keychain
            .resolve(reference)
            .map_err(|error| LifecycleError::CredentialResolution {
                references: references.join(", "),
                error,
            })?;
        by_registry.insert(auth.registry, auth.authorization);
    }
    let payload =
        serde_json::to_string(&by_registry).map_err(|error| LifecycleError::CredentialResolution {
            references: references.join(", "),
            error: error.into(),
        })?;
    Ok(AuthPayload(payload))
}

#[derive(Debug, Deserialize, Default)]
struct DockerConfig {
    #[serde(default)]
    auths: BTreeMap<String, DockerAuthEntry>,
}

#[derive(Debug, Deserialize, Default)]
struct DockerAuthEntry {
    #[serde(default)]
    auth: String,
}

/// Default keychain backed by the Docker CLI's `config.json`.
///
/// Stored `auth` entries become `Basic` Authorization headers; registries
/// without an entry resolve anonymously.
pub struct DockerConfigKeychain {
    auths: BTreeMap<String, String>,
}

impl DockerConfigKeychain {
    /// Load from `$DOCKER_CONFIG/config.json`, falling back to
    /// `~/.docker/config.json`. A missing file yields an empty keychain.
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) if path.exists() => Self::from_path(&path),
            _ => Ok(Self {
                auths: BTreeMap::new(),
            }),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading docker config at {}", path.display()))?;
        let config: DockerConfig = serde_json::from_str(&raw)
            .with_context(|| format!("parsing docker config at {}", path.display()))?;
        let auths = config
            .auths
            .into_iter()
            .filter(|(_, entry)| !entry.auth.is_empty())
            .map(|(registry, entry)| {
                (
                    normalize_registry(&registry).to_string(),
                    format!("Basic {}", entry.auth),
                )
            })
            .collect();
        Ok(Self { auths })
    }

    fn config_path() -> Option<PathBuf> {
        if let Ok(dir) = std::env::var("DOCKER_CONFIG") {
            return Some(PathBuf::from(dir).join("config.json"));
        }
        dirs::home_dir().map(|home| home.join(".docker").join("config.json"))
    }
}

impl Keychain for DockerConfigKeychain {
    fn resolve(&self, reference: &str) -> Result<RegistryAuth> {
        let registry = registry_of(reference);
        let authorization = self.auths.get(registry).cloned().unwrap_or_default();
        Ok(RegistryAuth {
            registry: registry.to_string(),
            authorization,
        })
    }
}

/// Docker config keys may be full index URLs ("https://index.docker.io/v1/");
/// reduce them to the bare host for lookup.
fn normalize_registry(key: &str) -> &str {
    let key = key
        .strip_prefix("https://")
        .or_else(|| key.strip_prefix("http://"))
        .unwrap_or(key);
    key.split('/').next().unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    struct StaticKeychain {
        fail: bool,
    }

    impl Keychain for StaticKeychain {
        fn resolve(&self, reference: &str) -> Result<RegistryAuth> {
            if self.fail {
                return Err(anyhow!("no credentials for {reference}"));
            }
            Ok(RegistryAuth {
                registry: registry_of(reference).to_string(),
                authorization: format!("Basic {}", reference.len()),
            })
        }
    }

    #[test]
    fn test_registry_of_docker_hub_default() {
        assert_eq!(registry_of("my/image"), DEFAULT_REGISTRY);
        assert_eq!(registry_of("ubuntu"), DEFAULT_REGISTRY);
    }

    #[test]
    fn test_registry_of_explicit_hosts() {
        assert_eq!(registry_of("gcr.io/project/image"), "gcr.io");
        assert_eq!(registry_of("localhost:5000/image"), "localhost:5000");
        assert_eq!(registry_of("localhost/image"), "localhost");
    }

    #[test]
    fn test_payload_is_registry_to_authorization_json() {
        let keychain = StaticKeychain { fail: false };
        let payload =
            registry_auth_payload(&keychain, &["gcr.io/p/image", "my/run-image"]).unwrap();
        let parsed: BTreeMap<String, String> = serde_json::from_str(payload.expose()).unwrap();
        assert_eq!(parsed.len(), 2);
        assert!(parsed.contains_key("gcr.io"));
        assert!(parsed.contains_key(DEFAULT_REGISTRY));
    }

    #[test]
    fn test_payload_resolution_failure() {
        let keychain = StaticKeychain { fail: true };
        let err = registry_auth_payload(&keychain, &["my/image"]).unwrap_err();
        assert!(matches!(err, LifecycleError::CredentialResolution { .. }));
    }

    #[test]
    fn test_payload_debug_is_redacted() {
        let keychain = StaticKeychain { fail: false };
        let payload = registry_auth_payload(&keychain, &["my/image"]).unwrap();
        let debug = format!("{payload:?}");
        assert!(debug.contains("redacted"));
        assert!(!debug.contains("Basic"));
    }

    #[test]
    fn test_docker_config_keychain() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"auths":{"gcr.io":{"auth":"Z2NyLXRva2Vu"},"https://index.docker.io/v1/":{"auth":"aHViLXRva2Vu"},"quay.io":{}}}"#,
        )
        .unwrap();

        let keychain = DockerConfigKeychain::from_path(&path).unwrap();

        let gcr = keychain.resolve("gcr.io/project/image").unwrap();
        assert_eq!(gcr.authorization, "Basic Z2NyLXRva2Vu");

        let hub = keychain.resolve("my/image").unwrap();
        assert_eq!(hub.registry, DEFAULT_REGISTRY);
        assert_eq!(hub.authorization, "Basic aHViLXRva2Vu");

        // No auth entry resolves anonymously, not as an error.
        let quay = keychain.resolve("quay.io/org/image").unwrap();
        assert_eq!(quay.authorization, "");
    }

    #[test]
    fn test_docker_config_keychain_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(DockerConfigKeychain::from_path(&path).is_err());
    }
}
