//! Docker-backed phase execution.
//!
//! Each lifecycle phase runs as a container created from the builder image.
//! The contract's access mode decides what the container sees: daemon-access
//! phases get the Docker socket bind-mounted, registry-access phases get the
//! resolved credential payload in their environment.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bollard::container::{
    Config, LogsOptions, RemoveContainerOptions, StartContainerOptions, StopContainerOptions,
    WaitContainerOptions,
};
use bollard::Docker;
use futures_util::stream::StreamExt;
use tracing::debug;

use crate::lifecycle::{
    CancelSignal, EngineAccess, ExecutionContract, PhaseFactory, PhaseUnit,
};

/// Docker daemon socket, bind-mounted into daemon-access phases.
pub const DOCKER_SOCKET_PATH: &str = "/var/run/docker.sock";

/// Environment variable the lifecycle reads registry credentials from.
const REGISTRY_AUTH_ENV: &str = "CNB_REGISTRY_AUTH";

/// Directory of the lifecycle executables inside the builder image.
const LIFECYCLE_BIN_DIR: &str = "/lifecycle";

/// Phase factory backed by the local Docker daemon.
pub struct DockerPhaseFactory {
    docker: Docker,
    builder_image: String,
}

impl DockerPhaseFactory {
    /// Connect with local defaults; phase containers are created from
    /// `builder_image`.
    pub fn connect(builder_image: impl Into<String>) -> Result<Self> {
        let docker =
            Docker::connect_with_local_defaults().context("Failed to connect to Docker")?;
        Ok(Self::new(docker, builder_image))
    }

    pub fn new(docker: Docker, builder_image: impl Into<String>) -> Self {
        Self {
            docker,
            builder_image: builder_image.into(),
        }
    }
}

impl PhaseFactory for DockerPhaseFactory {
    fn new_phase(&self, contract: ExecutionContract) -> Box<dyn PhaseUnit> {
        Box::new(DockerPhase {
            docker: self.docker.clone(),
            builder_image: self.builder_image.clone(),
            contract,
            container_id: None,
        })
    }
}

/// One phase container, created by `run` and removed by `cleanup`.
pub struct DockerPhase {
    docker: Docker,
    builder_image: String,
    contract: ExecutionContract,
    container_id: Option<String>,
}

impl DockerPhase {
    fn container_config(&self) -> Config<String> {
        let mut cmd = vec![format!("{}/{}", LIFECYCLE_BIN_DIR, self.contract.command())];
        cmd.extend(self.contract.args().iter().cloned());

        let mut binds: Vec<String> = self
            .contract
            .binds()
            .iter()
            .map(|bind| bind.to_string())
            .collect();
        let mut env = Vec::new();
        match self.contract.access() {
            EngineAccess::Daemon => {
                binds.push(format!("{DOCKER_SOCKET_PATH}:{DOCKER_SOCKET_PATH}"));
            }
            EngineAccess::Registry(payload) => {
                env.push(format!("{REGISTRY_AUTH_ENV}={}", payload.expose()));
            }
            EngineAccess::None => {}
        }

        Config {
            image: Some(self.builder_image.clone()),
            cmd: Some(cmd),
            env: Some(env),
            user: self.contract.root().then(|| "root".to_string()),
            host_config: Some(bollard::service::HostConfig {
                binds: Some(binds),
                network_mode: self.contract.network().map(str::to_string),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}

#[async_trait]
impl PhaseUnit for DockerPhase {
    async fn run(&mut self, signal: &CancelSignal) -> Result<()> {
        let phase = self.contract.command();

        let container = self
            .docker
            .create_container::<String, String>(None, self.container_config())
            .await
            .context("Failed to create phase container")?;
        self.container_id = Some(container.id.clone());

        self.docker
            .start_container(&container.id, None::<StartContainerOptions<String>>)
            .await
            .context("Failed to start phase container")?;
        debug!(phase, container = %container.id, "phase container started");

        // Forward phase output into our own log stream while we wait.
        let log_docker = self.docker.clone();
        let log_container = container.id.clone();
        let log_task = tokio::spawn(async move {
            let mut stream = log_docker.logs(
                &log_container,
                Some(LogsOptions::<String> {
                    stdout: true,
                    stderr: true,
                    follow: true,
                    ..Default::default()
                }),
            );
            while let Some(entry) = stream.next().await {
                match entry {
                    Ok(output) => debug!(phase, "{}", output.to_string().trim_end()),
                    Err(_) => break,
                }
            }
        });

        let mut wait = self
            .docker
            .wait_container(&container.id, None::<WaitContainerOptions<String>>);

        let outcome = tokio::select! {
            exit = wait.next() => exit,
            _ = signal.cancelled() => {
                let _ = self
                    .docker
                    .stop_container(&container.id, Some(StopContainerOptions { t: 0 }))
                    .await;
                log_task.abort();
                return Err(anyhow!("{phase} phase cancelled"));
            }
        };
        log_task.abort();

        match outcome {
            Some(Ok(exit)) if exit.status_code == 0 => Ok(()),
            Some(Ok(exit)) => Err(anyhow!(
                "{phase} phase exited with code {}",
                exit.status_code
            )),
            Some(Err(error)) => {
                Err(anyhow::Error::new(error).context("Waiting for phase container"))
            }
            None => Err(anyhow!("phase container wait returned no status")),
        }
    }

    async fn cleanup(&mut self) -> Result<()> {
        if let Some(container_id) = self.container_id.take() {
            self.docker
                .remove_container(
                    &container_id,
                    Some(RemoveContainerOptions {
                        force: true,
                        ..Default::default()
                    }),
                )
                .await
                .context("Failed to remove phase container")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{registry_auth_payload, Keychain, RegistryAuth};
    use crate::lifecycle::{ContractBuilder, PhaseIdentity, CACHE_DIR};

    struct TestKeychain;

    impl Keychain for TestKeychain {
        fn resolve(&self, reference: &str) -> Result<RegistryAuth> {
            Ok(RegistryAuth {
                registry: crate::auth::registry_of(reference).to_string(),
                authorization: "Basic dGVzdA==".to_string(),
            })
        }
    }

    fn phase_for(contract: ExecutionContract) -> DockerPhase {
        DockerPhase {
            // Config-only unit tests: the connection is never exercised, so build a
            // handle that does not require a live daemon socket (unlike the local
            // defaults, which fail when /var/run/docker.sock is absent).
            docker: Docker::connect_with_http("localhost:2375", 120, bollard::API_DEFAULT_VERSION)
                .unwrap(),
            builder_image: "builder:latest".to_string(),
            contract,
            container_id: None,
        }
    }

    #[test]
    fn test_config_daemon_access_binds_socket() {
        let contract = ContractBuilder::new(PhaseIdentity::Restore)
            .daemon_access()
            .bind("cache-vol", CACHE_DIR)
            .build();
        let config = phase_for(contract).container_config();

        let binds = config.host_config.unwrap().binds.unwrap();
        assert_eq!(
            binds,
            vec![
                "cache-vol:/cache".to_string(),
                format!("{DOCKER_SOCKET_PATH}:{DOCKER_SOCKET_PATH}"),
            ]
        );
        assert!(config.env.unwrap().is_empty());
        assert!(config.user.is_none());
    }

    #[test]
    fn test_config_registry_access_sets_auth_env() {
        let payload = registry_auth_payload(&TestKeychain, &["my/image"]).unwrap();
        let contract = ContractBuilder::new(PhaseIdentity::Analyze)
            .registry_access(payload)
            .root()
            .build();
        let config = phase_for(contract).container_config();

        let env = config.env.unwrap();
        assert_eq!(env.len(), 1);
        assert!(env[0].starts_with("CNB_REGISTRY_AUTH={"));
        assert_eq!(config.user.as_deref(), Some("root"));
        assert!(config.host_config.unwrap().binds.unwrap().is_empty());
    }

    #[test]
    fn test_config_command_path_and_network() {
        let contract = ContractBuilder::new(PhaseIdentity::Detect)
            .args(vec!["-app".to_string(), "/workspace".to_string()])
            .network(Some("host"))
            .build();
        let config = phase_for(contract).container_config();

        assert_eq!(
            config.cmd.unwrap(),
            vec!["/lifecycle/detector", "-app", "/workspace"]
        );
        assert_eq!(
            config.host_config.unwrap().network_mode.as_deref(),
            Some("host")
        );
    }
}
