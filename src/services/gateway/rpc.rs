use async_trait::async_trait;
use starknet::accounts::{Account, Call, ExecutionEncoding, SingleOwnerAccount};
use starknet::contract::ContractFactory;
use starknet::core::types::contract::{CompiledClass, SierraClass};
use starknet::core::types::{
    BlockId, BlockTag, ExecutionResult, Felt, FunctionCall, StarknetError,
};
use starknet::core::utils::get_selector_from_name;
use starknet::providers::jsonrpc::HttpTransport;
use starknet::providers::{JsonRpcClient, Provider, ProviderError, Url};
use starknet::signers::{LocalWallet, SigningKey};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use super::PerpetualsGateway;
use crate::error::{HarnessError, HarnessResult};
use crate::models::account::DevnetAccount;
use crate::models::config::{DECLARE_RESOURCE_BOUNDS, ResourceBounds};
use crate::models::protocol::{Invocation, ViewCall};
use crate::services::artifacts::ContractArtifact;

/// Interval between receipt polls while waiting for acceptance.
pub const RECEIPT_POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Upper bound on waiting for a single receipt.
pub const RECEIPT_TIMEOUT: Duration = Duration::from_secs(120);

type DevnetProvider = JsonRpcClient<HttpTransport>;
type DevnetSigner = SingleOwnerAccount<Arc<DevnetProvider>, LocalWallet>;

/// Gateway backed by a Starknet JSON-RPC endpoint.
///
/// Invokes are fee-estimated by the provider. Declare and deploy use the
/// fixed [`DECLARE_RESOURCE_BOUNDS`].
#[derive(Debug, Clone)]
pub struct StarknetGateway {
    provider: Arc<DevnetProvider>,
    chain_id: Felt,
    resource_bounds: ResourceBounds,
}

impl StarknetGateway {
    /// Connect to `rpc_url` and read its chain id.
    pub async fn connect(rpc_url: &str) -> HarnessResult<Self> {
        let url = Url::parse(rpc_url)
            .map_err(|e| HarnessError::Config(format!("invalid RPC URL '{rpc_url}': {e}")))?;
        let provider = Arc::new(JsonRpcClient::new(HttpTransport::new(url)));
        let chain_id = provider.chain_id().await.map_err(|e| HarnessError::Call {
            entry_point: "starknet_chainId".to_string(),
            reason: e.to_string(),
        })?;
        tracing::info!("Connected to {} (chain id {:#x})", rpc_url, chain_id);

        Ok(Self {
            provider,
            chain_id,
            resource_bounds: DECLARE_RESOURCE_BOUNDS,
        })
    }

    pub fn chain_id(&self) -> Felt {
        self.chain_id
    }

    /// Account bound to `sender`. Impersonated accounts get a throwaway key:
    /// the devnet does not validate their signatures.
    fn account(&self, sender: &DevnetAccount) -> DevnetSigner {
        let private_key = sender
            .keys
            .as_ref()
            .map(|keys| keys.private_key)
            .unwrap_or(Felt::ONE);
        let signer = LocalWallet::from(SigningKey::from_secret_scalar(private_key));

        let mut account = SingleOwnerAccount::new(
            self.provider.clone(),
            signer,
            sender.address,
            self.chain_id,
            ExecutionEncoding::New,
        );
        account.set_block_id(BlockId::Tag(BlockTag::Pending));
        account
    }

    /// Poll the receipt until the transaction is accepted or reverted.
    async fn wait_for_acceptance(&self, entry_point: &str, tx_hash: Felt) -> HarnessResult<()> {
        let poll = async {
            loop {
                match self.provider.get_transaction_receipt(tx_hash).await {
                    Ok(receipt) => return Ok(receipt),
                    Err(ProviderError::StarknetError(StarknetError::TransactionHashNotFound)) => {
                        tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        let receipt = match timeout(RECEIPT_TIMEOUT, poll).await {
            Ok(Ok(receipt)) => receipt,
            Ok(Err(e)) => {
                tracing::error!("Failed to get receipt of {:#x}: {}", tx_hash, e);
                return Err(HarnessError::Invoke {
                    entry_point: entry_point.to_string(),
                    reason: format!("failed to get receipt: {e}"),
                });
            }
            Err(_) => {
                tracing::error!("Timeout waiting for receipt of {:#x}", tx_hash);
                return Err(HarnessError::Invoke {
                    entry_point: entry_point.to_string(),
                    reason: format!("timeout waiting for receipt of {tx_hash:#x}"),
                });
            }
        };

        match receipt.receipt.execution_result() {
            ExecutionResult::Succeeded => Ok(()),
            ExecutionResult::Reverted { reason } => {
                tracing::error!("{} transaction {:#x} reverted: {}", entry_point, tx_hash, reason);
                sentry::capture_message(
                    &format!("{entry_point} transaction {tx_hash:#x} reverted: {reason}"),
                    sentry::Level::Error,
                );
                Err(HarnessError::Reverted {
                    tx_hash,
                    reason: reason.clone(),
                })
            }
        }
    }
}

fn selector(entry_point: &str) -> HarnessResult<Felt> {
    get_selector_from_name(entry_point)
        .map_err(|e| HarnessError::Encoding(format!("invalid entry point '{entry_point}': {e}")))
}

#[async_trait]
impl PerpetualsGateway for StarknetGateway {
    async fn call(&self, contract: Felt, view: &ViewCall) -> HarnessResult<Vec<Felt>> {
        let request = FunctionCall {
            contract_address: contract,
            entry_point_selector: selector(view.entry_point())?,
            calldata: view.calldata(),
        };
        self.provider
            .call(request, BlockId::Tag(BlockTag::Latest))
            .await
            .map_err(|e| HarnessError::Call {
                entry_point: view.entry_point().to_string(),
                reason: e.to_string(),
            })
    }

    async fn invoke(
        &self,
        sender: &DevnetAccount,
        target: Felt,
        invocation: &Invocation,
    ) -> HarnessResult<Felt> {
        let entry_point = invocation.entry_point();
        let call = Call {
            to: target,
            selector: selector(entry_point)?,
            calldata: invocation.calldata(),
        };

        let account = self.account(sender);
        let result = account
            .execute_v3(vec![call])
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to send {} from {:#x}: {}", entry_point, sender.address, e);
                HarnessError::Invoke {
                    entry_point: entry_point.to_string(),
                    reason: e.to_string(),
                }
            })?;

        tracing::info!(
            "Sent {} from {:#x}: {:#x}",
            entry_point,
            sender.address,
            result.transaction_hash
        );
        self.wait_for_acceptance(entry_point, result.transaction_hash)
            .await?;
        Ok(result.transaction_hash)
    }

    async fn declare(
        &self,
        sender: &DevnetAccount,
        artifact: &ContractArtifact,
    ) -> HarnessResult<Felt> {
        let declare_error = |reason: String| HarnessError::Declare {
            contract: artifact.name.clone(),
            reason,
        };

        let sierra: SierraClass = serde_json::from_str(&artifact.sierra)
            .map_err(|e| declare_error(format!("invalid contract class: {e}")))?;
        let flattened = sierra
            .flatten()
            .map_err(|e| declare_error(format!("failed to flatten contract class: {e}")))?;
        let casm: CompiledClass = serde_json::from_str(&artifact.casm)
            .map_err(|e| declare_error(format!("invalid compiled class: {e}")))?;
        let compiled_class_hash = casm
            .class_hash()
            .map_err(|e| declare_error(format!("failed to hash compiled class: {e}")))?;

        let account = self.account(sender);
        let result = account
            .declare_v3(Arc::new(flattened), compiled_class_hash)
            .gas(self.resource_bounds.max_amount)
            .gas_price(self.resource_bounds.max_price_per_unit)
            .send()
            .await
            .map_err(|e| declare_error(e.to_string()))?;

        self.wait_for_acceptance("declare", result.transaction_hash)
            .await?;
        tracing::info!(
            "Declared {} with class hash {:#x}",
            artifact.name,
            result.class_hash
        );
        Ok(result.class_hash)
    }

    async fn deploy(
        &self,
        sender: &DevnetAccount,
        class_hash: Felt,
        constructor_calldata: &[Felt],
        salt: Felt,
    ) -> HarnessResult<Felt> {
        let factory = ContractFactory::new(class_hash, self.account(sender));
        let deployment = factory.deploy_v3(constructor_calldata.to_vec(), salt, true);
        let address = deployment.deployed_address();

        let result = deployment
            .gas(self.resource_bounds.max_amount)
            .gas_price(self.resource_bounds.max_price_per_unit)
            .send()
            .await
            .map_err(|e| HarnessError::Deploy {
                class_hash,
                reason: e.to_string(),
            })?;

        self.wait_for_acceptance("deploy", result.transaction_hash)
            .await?;
        tracing::info!("Deployed class {:#x} at {:#x}", class_hash, address);
        Ok(address)
    }
}
