//! Lifecycle orchestration: contract derivation and phase sequencing.

pub mod cancel;
pub mod contract;
pub mod factory;
pub mod phases;

pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use contract::{
    ContractBuilder, EngineAccess, ExecutionContract, PhaseIdentity, VolumeBind, APP_DIR,
    CACHE_DIR, LAUNCH_CACHE_DIR, LAYERS_DIR, PLATFORM_DIR,
};
pub use factory::{PhaseFactory, PhaseUnit};
pub use phases::Lifecycle;

/// Verbosity capability consumed by contract derivation.
///
/// The lifecycle only ever asks one question of its logger; everything else
/// about logging lives outside this component.
pub trait Logger: Send + Sync {
    fn is_verbose(&self) -> bool;
}

/// Answers the verbosity query from the active `tracing` subscriber.
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn is_verbose(&self) -> bool {
        tracing::enabled!(tracing::Level::DEBUG)
    }
}
