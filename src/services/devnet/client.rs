//! JSON-RPC client for the devnet's liveness probe and admin methods.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use starknet::core::types::Felt;
use std::fmt;
use std::time::{Duration, Instant};

use crate::error::{HarnessError, HarnessResult};
use crate::models::account::{DevnetAccount, KeyPair};
use crate::models::config::parse_felt;

/// Interval between liveness probes while waiting for the devnet.
pub const READINESS_POLL_INTERVAL: Duration = Duration::from_secs(1);

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Unit of a devnet balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeeUnit {
    #[serde(rename = "WEI")]
    Wei,
    #[serde(rename = "FRI")]
    Fri,
}

impl fmt::Display for FeeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeeUnit::Wei => f.write_str("WEI"),
            FeeUnit::Fri => f.write_str("FRI"),
        }
    }
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: &'static str,
    method: &'a str,
    params: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

/// Response of `devnet_mint`.
#[derive(Debug, Clone, Deserialize)]
pub struct MintResponse {
    pub new_balance: String,
    pub unit: FeeUnit,
    pub tx_hash: String,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    amount: String,
    #[allow(dead_code)]
    unit: FeeUnit,
}

/// One entry of `devnet_getPredeployedAccounts`.
#[derive(Debug, Clone, Deserialize)]
pub struct PredeployedAccount {
    pub address: String,
    pub public_key: String,
    pub private_key: String,
    #[serde(default)]
    pub initial_balance: Option<String>,
}

impl PredeployedAccount {
    pub fn to_account(&self) -> HarnessResult<DevnetAccount> {
        let address = parse_felt(&self.address)?;
        let private_key = parse_felt(&self.private_key)?;
        let keys = KeyPair {
            public_key: parse_felt(&self.public_key)?,
            private_key,
        };
        Ok(DevnetAccount::with_keys(address, keys))
    }
}

fn hex(address: Felt) -> String {
    format!("{address:#x}")
}

/// Thin JSON-RPC 2.0 client bound to one devnet endpoint.
#[derive(Debug, Clone)]
pub struct DevnetClient {
    http: reqwest::Client,
    url: String,
}

impl DevnetClient {
    pub fn new(url: impl Into<String>) -> HarnessResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Send one JSON-RPC request and decode its `result`.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> HarnessResult<T> {
        let body = JsonRpcRequest {
            jsonrpc: "2.0",
            id: "1",
            method,
            params,
        };

        tracing::debug!("JSON-RPC {} -> {}", method, self.url);
        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await?
            .error_for_status()?;
        let envelope: JsonRpcResponse<T> = response.json().await?;

        if let Some(error) = envelope.error {
            let message = match error.data {
                Some(data) => format!("{} ({data})", error.message),
                None => error.message,
            };
            tracing::error!("{} failed: {}", method, message);
            return Err(HarnessError::JsonRpc {
                method: method.to_string(),
                code: error.code,
                message,
            });
        }

        envelope.result.ok_or_else(|| HarnessError::JsonRpc {
            method: method.to_string(),
            code: 0,
            message: "response carried neither result nor error".to_string(),
        })
    }

    /// Liveness probe.
    pub async fn chain_id(&self) -> HarnessResult<String> {
        self.request("starknet_chainId", json!([])).await
    }

    pub async fn is_alive(&self) -> bool {
        self.chain_id().await.is_ok()
    }

    /// Block until the endpoint answers `starknet_chainId` or `timeout` elapses.
    pub async fn wait_until_ready(&self, timeout: Duration) -> HarnessResult<()> {
        let started = Instant::now();
        loop {
            match self.chain_id().await {
                Ok(chain_id) => {
                    tracing::info!(
                        "Devnet at {} is ready (chain id {}) after {:?}",
                        self.url,
                        chain_id,
                        started.elapsed()
                    );
                    return Ok(());
                }
                Err(e) => {
                    tracing::debug!("Devnet at {} not ready yet: {}", self.url, e);
                }
            }

            if started.elapsed() + READINESS_POLL_INTERVAL > timeout {
                tracing::error!("Devnet at {} did not start within {:?}", self.url, timeout);
                return Err(HarnessError::DevnetStartTimeout {
                    url: self.url.clone(),
                    timeout,
                });
            }
            tokio::time::sleep(READINESS_POLL_INTERVAL).await;
        }
    }

    /// Mint fee tokens to an address (`devnet_mint`).
    pub async fn mint(
        &self,
        address: Felt,
        amount: u128,
        unit: FeeUnit,
    ) -> HarnessResult<MintResponse> {
        let response: MintResponse = self
            .request(
                "devnet_mint",
                json!({
                    "address": hex(address),
                    "amount": amount,
                    "unit": unit,
                }),
            )
            .await?;
        tracing::info!(
            "Funded account {:#x} with {} {}: new balance {}",
            address,
            amount,
            unit,
            response.new_balance
        );
        Ok(response)
    }

    /// Fee-token balance of an address at the latest block.
    pub async fn account_balance(&self, address: Felt, unit: FeeUnit) -> HarnessResult<u128> {
        let response: BalanceResponse = self
            .request(
                "devnet_getAccountBalance",
                json!({
                    "address": hex(address),
                    "unit": unit,
                    "block_id": "latest",
                }),
            )
            .await?;
        response
            .amount
            .parse::<u128>()
            .map_err(|e| HarnessError::JsonRpc {
                method: "devnet_getAccountBalance".to_string(),
                code: 0,
                message: format!("invalid amount '{}': {e}", response.amount),
            })
    }

    pub async fn impersonate_account(&self, address: Felt) -> HarnessResult<()> {
        let _: serde_json::Value = self
            .request(
                "devnet_impersonateAccount",
                json!({ "account_address": hex(address) }),
            )
            .await?;
        tracing::info!("Impersonating account {:#x}", address);
        Ok(())
    }

    pub async fn stop_impersonating_account(&self, address: Felt) -> HarnessResult<()> {
        let _: serde_json::Value = self
            .request(
                "devnet_stopImpersonateAccount",
                json!({ "account_address": hex(address) }),
            )
            .await?;
        tracing::info!("Stopped impersonating account {:#x}", address);
        Ok(())
    }

    pub async fn predeployed_accounts(&self) -> HarnessResult<Vec<PredeployedAccount>> {
        self.request("devnet_getPredeployedAccounts", json!({})).await
    }
}
