//! kiln - container-executed build lifecycle orchestration
//!
//! This library derives per-phase execution contracts for a multi-phase
//! container build pipeline (detect, restore, analyze, build, export) and
//! sequences phase execution with guaranteed cleanup.
//!
//! # Core Concepts
//!
//! - **Lifecycle**: immutable per-run context (pipeline version, verbosity
//!   capability, credential keychain) exposing one operation per phase
//! - **Execution Contract**: the fully resolved description of one phase
//!   container: executable, ordered arguments, volume bindings, network
//!   mode, privilege level, and image-store access mode
//! - **Phase Factory**: capability that turns a contract into a runnable,
//!   cleanable unit; the Docker engine ships in [`engine`], test doubles
//!   implement the same trait
//!
//! # Example Usage
//!
//! ```ignore
//! use kiln::{cancel_pair, DockerConfigKeychain, DockerPhaseFactory, Lifecycle, TracingLogger};
//! use std::sync::Arc;
//!
//! async fn pipeline() -> Result<(), kiln::LifecycleError> {
//!     let lifecycle = Lifecycle::new(
//!         "0.5.0",
//!         Arc::new(TracingLogger),
//!         Arc::new(DockerConfigKeychain::load().unwrap()),
//!     )?;
//!     let factory = DockerPhaseFactory::connect("builder:bionic").unwrap();
//!     let (_handle, signal) = cancel_pair();
//!
//!     lifecycle.detect(&signal, None, &[], &factory).await?;
//!     lifecycle.restore(&signal, "cache-vol", &factory).await?;
//!     lifecycle
//!         .analyze(&signal, "my/image", "cache-vol", false, false, &factory)
//!         .await?;
//!     lifecycle.build(&signal, None, &[], &factory).await?;
//!     lifecycle
//!         .export(&signal, "my/image", "run/image", false, "launch-vol", "cache-vol", &factory)
//!         .await
//! }
//! ```

// Public modules
pub mod auth;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod util;

// Re-export key types for convenient access
pub use auth::{AuthPayload, DockerConfigKeychain, Keychain, RegistryAuth};
pub use engine::DockerPhaseFactory;
pub use error::LifecycleError;
pub use lifecycle::{
    cancel_pair, CancelHandle, CancelSignal, ContractBuilder, EngineAccess, ExecutionContract,
    Lifecycle, Logger, PhaseFactory, PhaseIdentity, PhaseUnit, TracingLogger, VolumeBind,
};
pub use util::{init_default, init_from_env, init_logging, LoggingConfig};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_exists() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_name_is_kiln() {
        assert_eq!(NAME, "kiln");
    }
}
