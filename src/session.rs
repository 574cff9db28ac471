//! Forked devnet session: the process, the impersonated privileged accounts
//! and a ready [`PerpetualsTestUtils`] bound to them.

use starknet::core::types::Felt;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::error::{HarnessError, HarnessResult};
use crate::models::account::{DevnetAccount, KnownAccounts, Role};
use crate::models::config::HarnessConfig;
use crate::models::protocol::Timestamp;
use crate::perpetuals::PerpetualsTestUtils;
use crate::services::devnet::{DevnetClient, DevnetProcess};
use crate::services::gateway::StarknetGateway;
use crate::telemetry::init_sentry;

pub struct DevnetSession {
    process: DevnetProcess,
    utils: PerpetualsTestUtils,
    // Flushes pending events when the session is dropped
    sentry: Option<sentry::ClientInitGuard>,
}

/// Privileged roles of a configuration, each bound to an impersonated account.
pub fn known_accounts(config: &HarnessConfig) -> KnownAccounts {
    let mut accounts = KnownAccounts::new()
        .with(Role::Operator, DevnetAccount::impersonated(config.operator))
        .with(Role::Deployer, DevnetAccount::impersonated(config.deployer))
        .with(
            Role::AppGovernor,
            DevnetAccount::impersonated(config.app_governor),
        )
        .with(
            Role::UpgradeGovernor,
            DevnetAccount::impersonated(config.upgrade_governor),
        );
    if let Some(holder) = config.rich_usdc_holder {
        accounts.insert(Role::RichUsdcHolder, DevnetAccount::impersonated(holder));
    }
    accounts
}

fn unix_now() -> HarnessResult<Timestamp> {
    let elapsed = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| HarnessError::Config(format!("system clock before epoch: {e}")))?;
    Ok(Timestamp::from_seconds(elapsed.as_secs()))
}

async fn impersonate_all(client: &DevnetClient, accounts: &KnownAccounts) -> HarnessResult<()> {
    let mut seen = HashSet::new();
    for (role, address) in accounts.addresses() {
        if !seen.insert(address) {
            continue;
        }
        client.impersonate_account(address).await?;
        tracing::debug!("Impersonated {} at {:#x}", role, address);
    }
    Ok(())
}

impl DevnetSession {
    /// Spawn the forked devnet, impersonate the privileged accounts and build
    /// the test utilities.
    pub async fn start(config: HarnessConfig) -> HarnessResult<Self> {
        let sentry = init_sentry();
        let mut process = DevnetProcess::start(config.devnet.clone()).await?;
        match Self::connect(&process, &config).await {
            Ok(utils) => Ok(Self {
                process,
                utils,
                sentry,
            }),
            Err(e) => {
                tracing::error!("Devnet session setup failed: {}", e);
                process.stop().await;
                Err(e)
            }
        }
    }

    async fn connect(
        process: &DevnetProcess,
        config: &HarnessConfig,
    ) -> HarnessResult<PerpetualsTestUtils> {
        let client = process.client().clone();
        let accounts = known_accounts(config);
        impersonate_all(&client, &accounts).await?;

        let pool = client
            .predeployed_accounts()
            .await?
            .iter()
            .map(|predeployed| predeployed.to_account())
            .collect::<HarnessResult<Vec<_>>>()?;
        tracing::info!("{} predeployed accounts available", pool.len());

        let gateway = StarknetGateway::connect(process.rpc_url()).await?;
        let utils = PerpetualsTestUtils::new(
            Arc::new(gateway),
            config.perpetuals_contract,
            accounts,
        )?
        .with_devnet(client)
        .with_account_pool(pool)
        .with_asset_ids(config.synthetic_asset_ids.clone())
        .with_random_seed(config.random_seed)
        .with_now(unix_now()?)
        .with_artifacts_dir(config.artifacts_dir.clone());

        Ok(utils)
    }

    pub fn utils(&self) -> &PerpetualsTestUtils {
        &self.utils
    }

    pub fn devnet(&self) -> &DevnetClient {
        self.process.client()
    }

    pub fn rpc_url(&self) -> &str {
        self.process.rpc_url()
    }

    /// Whether failures of this session are reported to Sentry.
    pub fn reports_to_sentry(&self) -> bool {
        self.sentry.as_ref().is_some_and(|guard| guard.is_enabled())
    }

    pub fn perpetuals_contract(&self) -> Felt {
        self.utils.perpetuals_contract()
    }

    /// Stop the devnet process.
    pub async fn shutdown(mut self) {
        self.process.stop().await;
    }
}
