//! Lifecycle phase operations.
//!
//! One operation per pipeline phase: each derives an immutable
//! [`ExecutionContract`], obtains a unit from the [`PhaseFactory`], runs it
//! to completion or cancellation, and always releases it afterwards. Phase
//! order (detect, restore/analyze, build, export) is sequenced by the
//! caller, not here.

use std::sync::Arc;
use std::time::Instant;

use semver::Version;
use tracing::{debug, info, warn};

use super::cancel::CancelSignal;
use super::contract::{
    ContractBuilder, ExecutionContract, PhaseIdentity, VolumeBind, APP_DIR, CACHE_DIR,
    LAUNCH_CACHE_DIR, LAYERS_DIR, PLATFORM_DIR,
};
use super::factory::{PhaseFactory, PhaseUnit};
use super::Logger;
use crate::auth::{registry_auth_payload, Keychain};
use crate::error::LifecycleError;

/// Immutable per-run lifecycle context.
///
/// Holds the pipeline version, the verbosity capability, and the credential
/// keychain. Created once per build invocation; read-only thereafter.
pub struct Lifecycle {
    version: Version,
    logger: Arc<dyn Logger>,
    keychain: Arc<dyn Keychain>,
}

impl Lifecycle {
    /// Create a lifecycle context.
    ///
    /// Fails with [`LifecycleError::InvalidVersion`] when `version` is not a
    /// valid semantic version; every later version gate is infallible.
    pub fn new(
        version: &str,
        logger: Arc<dyn Logger>,
        keychain: Arc<dyn Keychain>,
    ) -> Result<Self, LifecycleError> {
        let version = Version::parse(version).map_err(|source| LifecycleError::InvalidVersion {
            value: version.to_string(),
            source,
        })?;
        Ok(Self {
            version,
            logger,
            keychain,
        })
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub async fn detect(
        &self,
        signal: &CancelSignal,
        network: Option<&str>,
        volumes: &[VolumeBind],
        factory: &dyn PhaseFactory,
    ) -> Result<(), LifecycleError> {
        let contract = self.detect_contract(network, volumes);
        self.run_phase(factory.new_phase(contract), PhaseIdentity::Detect, signal)
            .await
    }

    pub async fn restore(
        &self,
        signal: &CancelSignal,
        cache_volume: &str,
        factory: &dyn PhaseFactory,
    ) -> Result<(), LifecycleError> {
        let contract = self.restore_contract(cache_volume);
        self.run_phase(factory.new_phase(contract), PhaseIdentity::Restore, signal)
            .await
    }

    pub async fn analyze(
        &self,
        signal: &CancelSignal,
        image_ref: &str,
        cache_volume: &str,
        publish: bool,
        clear_cache: bool,
        factory: &dyn PhaseFactory,
    ) -> Result<(), LifecycleError> {
        let contract = self.analyze_contract(image_ref, cache_volume, publish, clear_cache)?;
        self.run_phase(factory.new_phase(contract), PhaseIdentity::Analyze, signal)
            .await
    }

    pub async fn build(
        &self,
        signal: &CancelSignal,
        network: Option<&str>,
        volumes: &[VolumeBind],
        factory: &dyn PhaseFactory,
    ) -> Result<(), LifecycleError> {
        let contract = self.build_contract(network, volumes);
        self.run_phase(factory.new_phase(contract), PhaseIdentity::Build, signal)
            .await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn export(
        &self,
        signal: &CancelSignal,
        image_ref: &str,
        run_image_ref: &str,
        publish: bool,
        launch_cache_volume: &str,
        cache_volume: &str,
        factory: &dyn PhaseFactory,
    ) -> Result<(), LifecycleError> {
        let contract = self.export_contract(
            image_ref,
            run_image_ref,
            publish,
            launch_cache_volume,
            cache_volume,
        )?;
        self.run_phase(factory.new_phase(contract), PhaseIdentity::Export, signal)
            .await
    }

    /// Contract derivation for the detect phase.
    pub fn detect_contract(
        &self,
        network: Option<&str>,
        volumes: &[VolumeBind],
    ) -> ExecutionContract {
        ContractBuilder::new(PhaseIdentity::Detect)
            .args(self.with_log_level(base_args(&[
                "-app",
                APP_DIR,
                "-platform",
                PLATFORM_DIR,
            ])))
            .network(network)
            .binds(volumes)
            .build()
    }

    /// Contract derivation for the restore phase.
    pub fn restore_contract(&self, cache_volume: &str) -> ExecutionContract {
        ContractBuilder::new(PhaseIdentity::Restore)
            .daemon_access()
            .args(self.with_log_level(base_args(&[
                "-cache-dir",
                CACHE_DIR,
                "-layers",
                LAYERS_DIR,
            ])))
            .bind(cache_volume, CACHE_DIR)
            .build()
    }

    /// Contract derivation for the analyze phase.
    ///
    /// `clear_cache` swaps `-cache-dir` for `-skip-layers` and omits the
    /// cache volume bind. Publish mode resolves registry credentials up
    /// front; resolution failure aborts before any phase unit exists.
    pub fn analyze_contract(
        &self,
        image_ref: &str,
        cache_volume: &str,
        publish: bool,
        clear_cache: bool,
    ) -> Result<ExecutionContract, LifecycleError> {
        let mut args = base_args(&["-layers", LAYERS_DIR]);
        args.push(image_ref.to_string());
        let args = if clear_cache {
            prepend_args(&["-skip-layers"], args)
        } else {
            prepend_args(&["-cache-dir", CACHE_DIR], args)
        };

        if publish {
            let auth = registry_auth_payload(self.keychain.as_ref(), &[image_ref])?;
            let mut builder = ContractBuilder::new(PhaseIdentity::Analyze)
                .registry_access(auth)
                .root()
                .args(args);
            if !clear_cache {
                builder = builder.bind(cache_volume, CACHE_DIR);
            }
            return Ok(builder.build());
        }

        let mut builder = ContractBuilder::new(PhaseIdentity::Analyze)
            .daemon_access()
            .args(self.with_log_level(prepend_args(&["-daemon"], args)));
        if !clear_cache {
            builder = builder.bind(cache_volume, CACHE_DIR);
        }
        Ok(builder.build())
    }

    /// Contract derivation for the build phase.
    pub fn build_contract(
        &self,
        network: Option<&str>,
        volumes: &[VolumeBind],
    ) -> ExecutionContract {
        ContractBuilder::new(PhaseIdentity::Build)
            .args(base_args(&[
                "-layers",
                LAYERS_DIR,
                "-app",
                APP_DIR,
                "-platform",
                PLATFORM_DIR,
            ]))
            .network(network)
            .binds(volumes)
            .build()
    }

    /// Contract derivation for the export phase.
    ///
    /// Publish mode resolves credentials for both the target and the run
    /// image; daemon mode additionally binds the launch cache.
    pub fn export_contract(
        &self,
        image_ref: &str,
        run_image_ref: &str,
        publish: bool,
        launch_cache_volume: &str,
        cache_volume: &str,
    ) -> Result<ExecutionContract, LifecycleError> {
        let mut args = base_args(&[
            "-image",
            run_image_ref,
            "-cache-dir",
            CACHE_DIR,
            "-layers",
            LAYERS_DIR,
            "-app",
            APP_DIR,
        ]);
        args.push(image_ref.to_string());

        if publish {
            let auth = registry_auth_payload(self.keychain.as_ref(), &[image_ref, run_image_ref])?;
            return Ok(ContractBuilder::new(PhaseIdentity::Export)
                .registry_access(auth)
                .root()
                .args(args)
                .bind(cache_volume, CACHE_DIR)
                .build());
        }

        let args = prepend_args(&["-daemon", "-launch-cache", LAUNCH_CACHE_DIR], args);
        Ok(ContractBuilder::new(PhaseIdentity::Export)
            .daemon_access()
            .args(self.with_log_level(args))
            .bind(cache_volume, CACHE_DIR)
            .bind(launch_cache_volume, LAUNCH_CACHE_DIR)
            .build())
    }

    /// Prepend `-log-level debug` when the lifecycle understands the flag
    /// (strictly newer than 0.4.0) and the logger is verbose.
    fn with_log_level(&self, args: Vec<String>) -> Vec<String> {
        if self.version > Version::new(0, 4, 0) && self.logger.is_verbose() {
            return prepend_args(&["-log-level", "debug"], args);
        }
        args
    }

    /// Run a phase unit and unconditionally release it afterwards.
    ///
    /// A cleanup failure is logged; it becomes the operation's result only
    /// when the run itself succeeded.
    async fn run_phase(
        &self,
        mut unit: Box<dyn PhaseUnit>,
        phase: PhaseIdentity,
        signal: &CancelSignal,
    ) -> Result<(), LifecycleError> {
        let start = Instant::now();
        info!("Phase: {}", phase);

        let run_result = unit
            .run(signal)
            .await
            .map_err(|error| LifecycleError::PhaseRun {
                phase: phase.command(),
                error,
            });

        let cleanup_result = unit.cleanup().await;
        if let Err(error) = &cleanup_result {
            warn!("Phase {} cleanup failed: {:#}", phase, error);
        }

        match (run_result, cleanup_result) {
            (Ok(()), Ok(())) => {
                debug!("Phase {} complete in {:?}", phase, start.elapsed());
                Ok(())
            }
            (Ok(()), Err(error)) => Err(LifecycleError::Cleanup {
                phase: phase.command(),
                error,
            }),
            (Err(run_err), _) => Err(run_err),
        }
    }
}

fn base_args(args: &[&str]) -> Vec<String> {
    args.iter().map(|arg| arg.to_string()).collect()
}

fn prepend_args(prefix: &[&str], args: Vec<String>) -> Vec<String> {
    prefix
        .iter()
        .map(|arg| arg.to_string())
        .chain(args)
        .collect()
}
