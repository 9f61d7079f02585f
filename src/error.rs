//! Error taxonomy for lifecycle orchestration.

use thiserror::Error;

/// Errors surfaced by lifecycle operations.
///
/// No retries anywhere: the first error from contract derivation or from a
/// phase run is the one reported. Cleanup always runs but never overrides a
/// prior error with its own.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The configured lifecycle version is not a valid semantic version.
    #[error("invalid lifecycle version {value:?}")]
    InvalidVersion {
        value: String,
        #[source]
        source: semver::Error,
    },

    /// Registry credential lookup failed; no phase unit was created.
    #[error("credential resolution failed for [{references}]: {error:#}")]
    CredentialResolution {
        references: String,
        error: anyhow::Error,
    },

    /// The phase reported failure, crashed, or was cancelled.
    #[error("{phase} phase failed: {error:#}")]
    PhaseRun {
        phase: &'static str,
        error: anyhow::Error,
    },

    /// Releasing the phase's resources failed after a successful run.
    #[error("{phase} phase cleanup failed: {error:#}")]
    Cleanup {
        phase: &'static str,
        error: anyhow::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_version_display() {
        let source = semver::Version::parse("not-a-version").unwrap_err();
        let err = LifecycleError::InvalidVersion {
            value: "not-a-version".to_string(),
            source,
        };
        assert!(err.to_string().contains("not-a-version"));
    }

    #[test]
    fn test_phase_run_display_includes_cause_chain() {
        let cause = anyhow::anyhow!("exit status 51").context("waiting for container");
        let err = LifecycleError::PhaseRun {
            phase: "analyzer",
            error: cause,
        };
        let rendered = err.to_string();
        assert!(rendered.contains("analyzer phase failed"));
        assert!(rendered.contains("exit status 51"));
    }
}
