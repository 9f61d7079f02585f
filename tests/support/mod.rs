//! Test doubles for lifecycle integration tests.
#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use kiln::auth::registry_of;
use kiln::{
    CancelSignal, ExecutionContract, Keychain, Lifecycle, Logger, PhaseFactory, PhaseUnit,
    RegistryAuth,
};
use std::sync::{Arc, Mutex};

pub struct FixedLogger(pub bool);

impl Logger for FixedLogger {
    fn is_verbose(&self) -> bool {
        self.0
    }
}

/// Keychain double: records every reference it resolves, optionally fails.
#[derive(Default)]
pub struct StaticKeychain {
    pub fail: bool,
    resolved: Mutex<Vec<String>>,
}

impl StaticKeychain {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            fail: true,
            ..Default::default()
        })
    }

    pub fn resolved_references(&self) -> Vec<String> {
        self.resolved.lock().unwrap().clone()
    }
}

impl Keychain for StaticKeychain {
    fn resolve(&self, reference: &str) -> Result<RegistryAuth> {
        self.resolved.lock().unwrap().push(reference.to_string());
        if self.fail {
            return Err(anyhow!("no credentials for {reference}"));
        }
        Ok(RegistryAuth {
            registry: registry_of(reference).to_string(),
            authorization: "Basic dGVzdA==".to_string(),
        })
    }
}

/// Factory double: captures every contract it is handed and the run/cleanup
/// order of the units it produced.
#[derive(Clone, Default)]
pub struct RecordingFactory {
    contracts: Arc<Mutex<Vec<ExecutionContract>>>,
    events: Arc<Mutex<Vec<String>>>,
    fail_run: bool,
    fail_cleanup: bool,
    block_until_cancelled: bool,
}

impl RecordingFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_run() -> Self {
        Self {
            fail_run: true,
            ..Self::default()
        }
    }

    pub fn failing_cleanup() -> Self {
        Self {
            fail_cleanup: true,
            ..Self::default()
        }
    }

    pub fn failing_run_and_cleanup() -> Self {
        Self {
            fail_run: true,
            fail_cleanup: true,
            ..Self::default()
        }
    }

    pub fn blocking() -> Self {
        Self {
            block_until_cancelled: true,
            ..Self::default()
        }
    }

    pub fn contracts(&self) -> Vec<ExecutionContract> {
        self.contracts.lock().unwrap().clone()
    }

    pub fn single_contract(&self) -> ExecutionContract {
        let contracts = self.contracts();
        assert_eq!(contracts.len(), 1, "expected exactly one contract");
        contracts.into_iter().next().unwrap()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }
}

impl PhaseFactory for RecordingFactory {
    fn new_phase(&self, contract: ExecutionContract) -> Box<dyn PhaseUnit> {
        self.contracts.lock().unwrap().push(contract.clone());
        Box::new(RecordingPhase {
            phase: contract.command(),
            events: Arc::clone(&self.events),
            fail_run: self.fail_run,
            fail_cleanup: self.fail_cleanup,
            block_until_cancelled: self.block_until_cancelled,
        })
    }
}

pub struct RecordingPhase {
    phase: &'static str,
    events: Arc<Mutex<Vec<String>>>,
    fail_run: bool,
    fail_cleanup: bool,
    block_until_cancelled: bool,
}

#[async_trait]
impl PhaseUnit for RecordingPhase {
    async fn run(&mut self, signal: &CancelSignal) -> Result<()> {
        self.events.lock().unwrap().push(format!("run:{}", self.phase));
        if self.block_until_cancelled {
            signal.cancelled().await;
            return Err(anyhow!("cancelled"));
        }
        if self.fail_run {
            return Err(anyhow!("exit status 1"));
        }
        Ok(())
    }

    async fn cleanup(&mut self) -> Result<()> {
        self.events
            .lock()
            .unwrap()
            .push(format!("cleanup:{}", self.phase));
        if self.fail_cleanup {
            return Err(anyhow!("container removal failed"));
        }
        Ok(())
    }
}

/// Lifecycle with an anonymous keychain.
pub fn lifecycle(version: &str, verbose: bool) -> Lifecycle {
    lifecycle_with_keychain(version, verbose, StaticKeychain::new())
}

pub fn lifecycle_with_keychain(
    version: &str,
    verbose: bool,
    keychain: Arc<StaticKeychain>,
) -> Lifecycle {
    Lifecycle::new(version, Arc::new(FixedLogger(verbose)), keychain).unwrap()
}
