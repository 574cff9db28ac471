use std::process::Stdio;
use tokio::process::{Child, Command};

use super::client::DevnetClient;
use crate::error::{HarnessError, HarnessResult};
use crate::models::config::DevnetConfig;

/// A `starknet-devnet` child process.
///
/// The process is killed when this value is dropped.
pub struct DevnetProcess {
    child: Child,
    client: DevnetClient,
    config: DevnetConfig,
}

impl DevnetProcess {
    /// Command-line arguments for the devnet binary.
    pub fn args(config: &DevnetConfig) -> Vec<String> {
        let mut args = vec![
            "--host".to_string(),
            config.host.clone(),
            "--port".to_string(),
            config.port.to_string(),
            "--seed".to_string(),
            config.seed.to_string(),
            "--accounts".to_string(),
            config.accounts.to_string(),
        ];
        if let Some(network) = &config.fork_network {
            args.push("--fork-network".to_string());
            args.push(network.clone());
            if let Some(block) = config.fork_block {
                args.push("--fork-block".to_string());
                args.push(block.to_string());
            }
        }
        args
    }

    /// Spawn the devnet and wait until it answers the liveness probe.
    pub async fn start(config: DevnetConfig) -> HarnessResult<Self> {
        let args = Self::args(&config);
        tracing::info!("Starting devnet: {} {}", config.binary, args.join(" "));

        let child = Command::new(&config.binary)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                HarnessError::DevnetProcess(format!("failed to spawn {}: {e}", config.binary))
            })?;

        let client = DevnetClient::new(config.rpc_url())?;
        let mut process = Self {
            child,
            client,
            config,
        };

        if let Err(e) = process
            .client
            .wait_until_ready(process.config.startup_timeout)
            .await
        {
            process.stop().await;
            return Err(e);
        }

        if let Some(network) = &process.config.fork_network {
            tracing::info!(
                "Devnet forked from {} at block {:?}",
                network,
                process.config.fork_block
            );
        }
        Ok(process)
    }

    pub fn client(&self) -> &DevnetClient {
        &self.client
    }

    pub fn config(&self) -> &DevnetConfig {
        &self.config
    }

    pub fn rpc_url(&self) -> &str {
        self.client.url()
    }

    /// Kill the process and reap it.
    pub async fn stop(&mut self) {
        match self.child.kill().await {
            Ok(()) => tracing::info!("Devnet on port {} stopped", self.config.port),
            Err(e) => tracing::warn!("Failed to stop devnet on port {}: {}", self.config.port, e),
        }
    }
}

impl Drop for DevnetProcess {
    fn drop(&mut self) {
        tracing::info!("Dropping devnet process (RPC: {})", self.client.url());
    }
}
