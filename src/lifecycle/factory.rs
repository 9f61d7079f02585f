//! Capability seams between the orchestrator and the execution engine.

use anyhow::Result;
use async_trait::async_trait;

use super::cancel::CancelSignal;
use super::contract::ExecutionContract;

/// A single runnable phase container.
#[async_trait]
pub trait PhaseUnit: Send {
    /// Run the phase to completion.
    ///
    /// May block for the lifetime of the underlying container; must abort
    /// promptly when `signal` fires.
    async fn run(&mut self, signal: &CancelSignal) -> Result<()>;

    /// Release the unit's resources. Invoked exactly once after `run`, on
    /// every exit path.
    async fn cleanup(&mut self) -> Result<()>;
}

/// Produces phase units from execution contracts.
///
/// The engine behind a lifecycle run is selected by handing a different
/// factory to each phase operation; test doubles implement this trait to
/// observe derived contracts without touching a real engine.
pub trait PhaseFactory: Send + Sync {
    fn new_phase(&self, contract: ExecutionContract) -> Box<dyn PhaseUnit>;
}
