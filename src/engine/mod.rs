//! Execution engines for lifecycle phases.
//!
//! The orchestrator only sees the [`crate::lifecycle::PhaseFactory`]
//! capability; this module provides the real implementation against the
//! local Docker daemon.

pub mod docker;

pub use docker::{DockerPhaseFactory, DOCKER_SOCKET_PATH};

use anyhow::Result;
use std::path::Path;
use tracing::debug;

/// Check whether a local Docker daemon is reachable.
pub async fn daemon_available() -> Result<bool> {
    if !Path::new(DOCKER_SOCKET_PATH).exists() {
        debug!("Docker socket not found at {}", DOCKER_SOCKET_PATH);
        return Ok(false);
    }

    let docker = match bollard::Docker::connect_with_local_defaults() {
        Ok(d) => d,
        Err(e) => {
            debug!("Failed to connect to Docker: {}", e);
            return Ok(false);
        }
    };

    match docker.version().await {
        Ok(v) => {
            let api_version = v.api_version.unwrap_or_else(|| "0.0".to_string());
            debug!("Docker API version: {}", api_version);
            Ok(true)
        }
        Err(e) => {
            debug!("Failed to get Docker version: {}", e);
            Ok(false)
        }
    }
}
