//! Execution contracts for lifecycle phases.
//!
//! A contract is the fully resolved description of one phase container:
//! which lifecycle executable runs, its ordered argument list, volume
//! bindings, network mode, privilege level, and how the phase reaches an
//! image store (local daemon vs. remote registry with credentials).
//!
//! Contracts are derived fresh for every phase invocation and are immutable
//! once built.

use std::fmt;
use std::str::FromStr;

use crate::auth::AuthPayload;

/// Container path the lifecycle writes layer metadata to.
pub const LAYERS_DIR: &str = "/layers";
/// Container path the application source is mounted at.
pub const APP_DIR: &str = "/workspace";
/// Container path the build cache volume is mounted at.
pub const CACHE_DIR: &str = "/cache";
/// Container path the launch cache volume is mounted at.
pub const LAUNCH_CACHE_DIR: &str = "/launch-cache";
/// Container path for platform configuration.
pub const PLATFORM_DIR: &str = "/platform";

/// The five lifecycle phases, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseIdentity {
    Detect,
    Restore,
    Analyze,
    Build,
    Export,
}

impl PhaseIdentity {
    /// Name of the lifecycle executable implementing this phase.
    pub fn command(&self) -> &'static str {
        match self {
            PhaseIdentity::Detect => "detector",
            PhaseIdentity::Restore => "restorer",
            PhaseIdentity::Analyze => "analyzer",
            PhaseIdentity::Build => "builder",
            PhaseIdentity::Export => "exporter",
        }
    }
}

impl fmt::Display for PhaseIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.command())
    }
}

/// A host path or named volume mapped to a container path.
///
/// Sources are opaque identifiers owned by the caller; no deduplication or
/// conflict checking happens here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeBind {
    source: String,
    target: String,
}

impl VolumeBind {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

impl fmt::Display for VolumeBind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source, self.target)
    }
}

impl FromStr for VolumeBind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((source, target)) if !source.is_empty() && !target.is_empty() => {
                Ok(Self::new(source, target))
            }
            _ => Err(anyhow::anyhow!("invalid volume binding {s:?}, expected source:target")),
        }
    }
}

/// How a phase reaches an image store.
///
/// At most one access mode applies to a contract; phases that need neither
/// (detect, build) use `None`.
#[derive(Debug, Clone, Default)]
pub enum EngineAccess {
    #[default]
    None,
    /// The phase talks to the local image daemon.
    Daemon,
    /// The phase pushes/pulls a remote registry with resolved credentials.
    Registry(AuthPayload),
}

/// Immutable execution contract for one phase container.
#[derive(Debug, Clone)]
pub struct ExecutionContract {
    phase: PhaseIdentity,
    args: Vec<String>,
    binds: Vec<VolumeBind>,
    network: Option<String>,
    root: bool,
    access: EngineAccess,
}

impl ExecutionContract {
    pub fn phase(&self) -> PhaseIdentity {
        self.phase
    }

    /// Lifecycle executable name for this phase.
    pub fn command(&self) -> &'static str {
        self.phase.command()
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn binds(&self) -> &[VolumeBind] {
        &self.binds
    }

    pub fn network(&self) -> Option<&str> {
        self.network.as_deref()
    }

    pub fn root(&self) -> bool {
        self.root
    }

    pub fn access(&self) -> &EngineAccess {
        &self.access
    }

    pub fn daemon_access(&self) -> bool {
        matches!(self.access, EngineAccess::Daemon)
    }

    pub fn registry_auth(&self) -> Option<&AuthPayload> {
        match &self.access {
            EngineAccess::Registry(payload) => Some(payload),
            _ => None,
        }
    }
}

/// Consuming builder for [`ExecutionContract`].
pub struct ContractBuilder {
    phase: PhaseIdentity,
    args: Vec<String>,
    binds: Vec<VolumeBind>,
    network: Option<String>,
    root: bool,
    access: EngineAccess,
}

impl ContractBuilder {
    pub fn new(phase: PhaseIdentity) -> Self {
        Self {
            phase,
            args: Vec::new(),
            binds: Vec::new(),
            network: None,
            root: false,
            access: EngineAccess::None,
        }
    }

    pub fn args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Bind a named volume or host path to a container path.
    pub fn bind(mut self, source: &str, target: &str) -> Self {
        self.binds.push(VolumeBind::new(source, target));
        self
    }

    /// Append caller-supplied bindings, in order, without deduplication.
    pub fn binds(mut self, binds: &[VolumeBind]) -> Self {
        self.binds.extend_from_slice(binds);
        self
    }

    pub fn network(mut self, mode: Option<&str>) -> Self {
        self.network = mode.map(str::to_string);
        self
    }

    pub fn root(mut self) -> Self {
        self.root = true;
        self
    }

    pub fn daemon_access(mut self) -> Self {
        self.access = EngineAccess::Daemon;
        self
    }

    pub fn registry_access(mut self, payload: AuthPayload) -> Self {
        self.access = EngineAccess::Registry(payload);
        self
    }

    pub fn build(self) -> ExecutionContract {
        debug_assert!(
            !(self.args.iter().any(|a| a == "-skip-layers")
                && self.args.iter().any(|a| a == "-cache-dir")),
            "-skip-layers and -cache-dir are mutually exclusive"
        );
        ExecutionContract {
            phase: self.phase,
            args: self.args,
            binds: self.binds,
            network: self.network,
            root: self.root,
            access: self.access,
        }
    }
}
