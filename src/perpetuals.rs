//! Domain-level test utilities over the perpetuals contract.
//!
//! [`PerpetualsTestUtils`] turns raw entry points into the operations a
//! scenario speaks in: open a position, deposit, withdraw, tick prices and
//! funding, trade, register assets and oracles, upgrade. It owns the
//! operator nonce cache, the seeded generator for ids and salts, the pool of
//! fresh accounts and the sorted mirror of registered synthetic assets.

use async_trait::async_trait;
use starknet::core::types::Felt;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

use crate::error::{HarnessError, HarnessResult};
use crate::models::account::{DevnetAccount, KnownAccounts, Role};
use crate::models::protocol::{
    AssetId, AssetTimelyData, EicData, ImplementationData, Invocation, Order, PositionId,
    PositionTvTr, RiskFactorConfig, SignedPrice, Timestamp, ViewCall, short_string,
};
use crate::services::artifacts::ContractArtifact;
use crate::services::devnet::{DevnetClient, FeeUnit, MintResponse};
use crate::services::funding::{check_active_count, fetch_funding_indices, rebuild_funding_ticks};
use crate::services::gateway::PerpetualsGateway;
use crate::services::nonce::{NonceSource, OperatorNonce};
use crate::services::retry::BoundedRetry;
use crate::services::rng::HarnessRng;
use crate::services::signing::{
    MessageSigner, SigningDomain, WithdrawArgs, price_message_hash, sign_hash,
};

/// Attempts `new_position` makes before giving up.
pub const DEFAULT_POSITION_ATTEMPTS: u32 = 3;
/// Contract name of the perpetuals core class.
pub const PERPETUALS_CORE_CONTRACT: &str = "perpetuals_Core";

/// Settled amounts of a trade, from the point of view of order A.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradeFill {
    pub actual_amount_base_a: i64,
    pub actual_amount_quote_a: i64,
    pub actual_fee_a: u64,
    pub actual_fee_b: u64,
}

pub struct PerpetualsTestUtils {
    gateway: Arc<dyn PerpetualsGateway>,
    devnet: Option<DevnetClient>,
    perpetuals_contract: Felt,
    known_accounts: KnownAccounts,
    account_pool: Vec<DevnetAccount>,
    next_account: Mutex<usize>,
    positions: RwLock<HashMap<Felt, PositionId>>,
    operator_nonce: OperatorNonce,
    rng: HarnessRng,
    signer: MessageSigner,
    asset_ids: RwLock<Vec<AssetId>>,
    now: Timestamp,
    artifacts_dir: PathBuf,
}

impl PerpetualsTestUtils {
    pub fn new(
        gateway: Arc<dyn PerpetualsGateway>,
        perpetuals_contract: Felt,
        known_accounts: KnownAccounts,
    ) -> HarnessResult<Self> {
        Ok(Self {
            gateway,
            devnet: None,
            perpetuals_contract,
            known_accounts,
            account_pool: Vec::new(),
            next_account: Mutex::new(0),
            positions: RwLock::new(HashMap::new()),
            operator_nonce: OperatorNonce::new(),
            rng: HarnessRng::from_seed(0),
            signer: MessageSigner::new(&SigningDomain::default())?,
            asset_ids: RwLock::new(Vec::new()),
            now: Timestamp::from_seconds(0),
            artifacts_dir: PathBuf::from("target/release"),
        })
    }

    /// Devnet admin endpoint used by `fund_account` and `get_account_balance`.
    pub fn with_devnet(mut self, client: DevnetClient) -> Self {
        self.devnet = Some(client);
        self
    }

    /// Accounts handed out by `new_account`, in order.
    pub fn with_account_pool(mut self, pool: Vec<DevnetAccount>) -> Self {
        self.account_pool = pool;
        self
    }

    /// Synthetic assets already active on the ledger.
    pub fn with_asset_ids(mut self, mut asset_ids: Vec<AssetId>) -> Self {
        asset_ids.sort();
        asset_ids.dedup();
        self.asset_ids = RwLock::new(asset_ids);
        self
    }

    pub fn with_random_seed(mut self, seed: u64) -> Self {
        self.rng = HarnessRng::from_seed(seed);
        self
    }

    /// Timestamp stamped on funding ticks.
    pub fn with_now(mut self, now: Timestamp) -> Self {
        self.now = now;
        self
    }

    pub fn with_artifacts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifacts_dir = dir.into();
        self
    }

    pub fn perpetuals_contract(&self) -> Felt {
        self.perpetuals_contract
    }

    pub fn known_accounts(&self) -> &KnownAccounts {
        &self.known_accounts
    }

    pub fn operator_nonce_cache(&self) -> &OperatorNonce {
        &self.operator_nonce
    }

    pub fn now(&self) -> Timestamp {
        self.now
    }

    /// Registered synthetic assets in canonical order.
    pub fn asset_ids(&self) -> Vec<AssetId> {
        self.asset_ids
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn role(&self, role: Role) -> HarnessResult<&DevnetAccount> {
        self.known_accounts.get(role)
    }

    fn devnet(&self) -> HarnessResult<&DevnetClient> {
        self.devnet
            .as_ref()
            .ok_or_else(|| HarnessError::Config("no devnet client attached".to_string()))
    }

    // Helper functions

    /// Hand out the next unused predeployed account.
    pub fn new_account(&self) -> HarnessResult<DevnetAccount> {
        let mut next = self.next_account.lock().unwrap_or_else(|e| e.into_inner());
        let account = self
            .account_pool
            .get(*next)
            .cloned()
            .ok_or(HarnessError::AccountPoolExhausted(self.account_pool.len()))?;
        *next += 1;
        tracing::info!("New account #{}: {:#x}", *next, account.address);
        Ok(account)
    }

    pub fn get_account_address(&self, account: &DevnetAccount) -> Felt {
        account.address
    }

    pub fn get_account_public_key(&self, account: &DevnetAccount) -> HarnessResult<Felt> {
        account.public_key()
    }

    pub fn get_account_position_id(&self, account: &DevnetAccount) -> HarnessResult<PositionId> {
        self.positions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&account.address)
            .copied()
            .ok_or(HarnessError::NoPosition(account.address))
    }

    /// Oracle attestation of `oracle_price` at `timestamp`, signed by `oracle`.
    pub fn create_signed_price(
        &self,
        oracle: &DevnetAccount,
        oracle_price: u128,
        timestamp: u32,
        asset_name: Felt,
        oracle_name: Felt,
    ) -> HarnessResult<SignedPrice> {
        let keys = oracle.key_pair()?;
        let hash = price_message_hash(asset_name, oracle_name, oracle_price, timestamp);
        Ok(SignedPrice {
            signature: sign_hash(&keys.private_key, &hash)?,
            signer_public_key: keys.public_key,
            timestamp,
            oracle_price,
        })
    }

    /// Order quoted and paid in the collateral asset, with a fresh salt.
    pub async fn create_order(
        &self,
        position_id: PositionId,
        base_asset_id: AssetId,
        base_amount: i64,
        quote_amount: i64,
        fee_amount: u64,
        expiration: Timestamp,
    ) -> HarnessResult<Order> {
        let collateral_id = self.get_collateral_asset_id().await?;
        Ok(Order {
            position_id,
            base_asset_id,
            base_amount,
            quote_asset_id: collateral_id,
            quote_amount,
            fee_asset_id: collateral_id,
            fee_amount,
            expiration,
            salt: self.rng.salt(),
        })
    }

    // View functions

    async fn view(&self, view: ViewCall) -> HarnessResult<(ViewCall, Vec<Felt>)> {
        let result = self.gateway.call(self.perpetuals_contract, &view).await?;
        Ok((view, result))
    }

    /// Read the operator nonce and resync the local cache with it.
    pub async fn get_operator_nonce(&self) -> HarnessResult<u64> {
        self.operator_nonce.get_nonce(self).await
    }

    pub async fn get_collateral_asset_id(&self) -> HarnessResult<AssetId> {
        let (view, result) = self.view(ViewCall::GetCollateralId).await?;
        Ok(AssetId(view.word(&result, 0)?))
    }

    pub async fn get_collateral_token_contract(&self) -> HarnessResult<Felt> {
        let (view, result) = self.view(ViewCall::GetBaseCollateralTokenContract).await?;
        view.word(&result, 0)
    }

    pub async fn get_position_total_value(&self, position_id: PositionId) -> HarnessResult<i64> {
        let (view, result) = self.view(ViewCall::GetPositionTvTr(position_id)).await?;
        Ok(PositionTvTr::decode(&view, &result)?.total_value)
    }

    pub async fn get_num_of_active_synthetic_assets(&self) -> HarnessResult<u64> {
        let (view, result) = self.view(ViewCall::GetNumOfActiveSyntheticAssets).await?;
        view.word_u64(&result, 0)
    }

    pub async fn get_asset_timely_data(&self, asset_id: AssetId) -> HarnessResult<AssetTimelyData> {
        let (view, result) = self.view(ViewCall::GetTimelyData(asset_id)).await?;
        AssetTimelyData::decode(&view, &result)
    }

    // Storage-mutating functions

    async fn invoke_as(
        &self,
        sender: &DevnetAccount,
        target: Felt,
        invocation: Invocation,
    ) -> HarnessResult<Felt> {
        self.gateway.invoke(sender, target, &invocation).await
    }

    /// Invoke an operator entry point with the next operator nonce.
    ///
    /// Any failure resets the nonce cache: the nonce may or may not have been
    /// consumed remotely.
    async fn invoke_as_operator(
        &self,
        build: impl FnOnce(u64) -> Invocation,
    ) -> HarnessResult<Felt> {
        let operator = self.role(Role::Operator)?;
        let nonce = match self.operator_nonce.consume(self).await {
            Ok(nonce) => nonce,
            Err(e) => {
                self.operator_nonce.reset();
                return Err(e);
            }
        };

        let invocation = build(nonce);
        match self
            .gateway
            .invoke(operator, self.perpetuals_contract, &invocation)
            .await
        {
            Ok(tx_hash) => Ok(tx_hash),
            Err(e) => {
                tracing::warn!(
                    "{} with operator nonce {} failed, resetting nonce cache: {}",
                    invocation.entry_point(),
                    nonce,
                    e
                );
                self.operator_nonce.reset();
                Err(e)
            }
        }
    }

    pub async fn new_position(&self, account: &DevnetAccount) -> HarnessResult<PositionId> {
        self.new_position_with_attempts(account, DEFAULT_POSITION_ATTEMPTS)
            .await
    }

    /// Open a position under a random id, retrying with a fresh id (and a
    /// resynced nonce) when creation fails.
    pub async fn new_position_with_attempts(
        &self,
        account: &DevnetAccount,
        attempts: u32,
    ) -> HarnessResult<PositionId> {
        let owner_public_key = account.public_key()?;
        let owner_account = account.address;

        let outcome = BoundedRetry::new(attempts)
            .run(
                |_| async move {
                    let position_id = PositionId(self.rng.nonzero_u32());
                    self.invoke_as_operator(|operator_nonce| Invocation::NewPosition {
                        operator_nonce,
                        position_id,
                        owner_public_key,
                        owner_account,
                        owner_protection_enabled: true,
                    })
                    .await?;
                    Ok::<_, HarnessError>(position_id)
                },
                |attempt, e: &HarnessError| {
                    tracing::warn!("new_position attempt {} failed: {}", attempt, e);
                    self.operator_nonce.reset();
                },
            )
            .await;

        match outcome {
            Ok(position_id) => {
                self.positions
                    .write()
                    .unwrap_or_else(|e| e.into_inner())
                    .insert(owner_account, position_id);
                tracing::info!(
                    "Created position {} for account {:#x}",
                    position_id,
                    owner_account
                );
                Ok(position_id)
            }
            Err(exhausted) => {
                tracing::error!(
                    "Failed to create a new position after {} attempts: {}",
                    exhausted.attempts,
                    exhausted.last
                );
                Err(HarnessError::PositionAllocation {
                    attempts: exhausted.attempts,
                    last: Box::new(exhausted.last),
                })
            }
        }
    }

    /// Fund the account with collateral, approve, deposit and have the
    /// operator process the deposit.
    pub async fn deposit(&self, account: &DevnetAccount, amount: u64) -> HarnessResult<()> {
        let position_id = self.get_account_position_id(account)?;
        let token = self.get_collateral_token_contract().await?;
        let holder = self.role(Role::RichUsdcHolder)?;

        self.invoke_as(
            holder,
            token,
            Invocation::Erc20Transfer {
                recipient: account.address,
                amount: u128::from(amount),
            },
        )
        .await?;
        self.invoke_as(
            account,
            token,
            Invocation::Erc20Approve {
                spender: self.perpetuals_contract,
                amount: u128::from(amount),
            },
        )
        .await?;

        let asset_id = self.get_collateral_asset_id().await?;
        let salt = self.rng.salt();
        self.invoke_as(
            account,
            self.perpetuals_contract,
            Invocation::DepositAsset {
                asset_id,
                position_id,
                quantized_amount: amount,
                salt,
            },
        )
        .await?;

        let depositor = account.address;
        self.invoke_as_operator(|operator_nonce| Invocation::ProcessDeposit {
            operator_nonce,
            depositor,
            asset_id,
            position_id,
            quantized_amount: amount,
            salt,
        })
        .await?;

        tracing::info!("Deposited {} into position {}", amount, position_id);
        Ok(())
    }

    /// Sign and register a withdrawal request, then have the operator
    /// execute it.
    pub async fn withdraw(
        &self,
        account: &DevnetAccount,
        amount: u64,
        expiration: Timestamp,
    ) -> HarnessResult<()> {
        let keys = account.key_pair()?;
        let position_id = self.get_account_position_id(account)?;
        let asset_id = self.get_collateral_asset_id().await?;
        let args = WithdrawArgs {
            recipient: account.address,
            position_id,
            collateral_id: asset_id,
            amount,
            expiration,
            salt: self.rng.salt(),
        };
        let signature = self.signer.sign_withdraw(keys, &args)?;

        self.invoke_as(
            account,
            self.perpetuals_contract,
            Invocation::WithdrawRequest {
                signature,
                asset_id,
                recipient: args.recipient,
                position_id,
                amount,
                expiration,
                salt: args.salt,
            },
        )
        .await?;

        self.invoke_as_operator(|operator_nonce| Invocation::Withdraw {
            operator_nonce,
            asset_id,
            recipient: args.recipient,
            position_id,
            amount,
            expiration,
            salt: args.salt,
        })
        .await?;

        tracing::info!("Withdrew {} from position {}", amount, position_id);
        Ok(())
    }

    pub async fn price_tick(
        &self,
        asset_id: AssetId,
        oracle_price: u128,
        signed_prices: Vec<SignedPrice>,
    ) -> HarnessResult<()> {
        let signers = signed_prices.len();
        self.invoke_as_operator(|operator_nonce| Invocation::PriceTick {
            operator_nonce,
            asset_id,
            oracle_price,
            signed_prices,
        })
        .await?;
        tracing::info!(
            "Price tick for {}: {} ({} signed prices)",
            asset_id,
            oracle_price,
            signers
        );
        Ok(())
    }

    /// Register a synthetic asset under a random id and mirror it locally.
    pub async fn add_synthetic_asset(
        &self,
        risk_factor: RiskFactorConfig,
        quorum: u8,
        resolution_factor: u64,
    ) -> HarnessResult<AssetId> {
        let asset_id = AssetId::from(self.rng.nonzero_u32());
        let governor = self.role(Role::AppGovernor)?;

        self.invoke_as(
            governor,
            self.perpetuals_contract,
            Invocation::AddSyntheticAsset {
                asset_id,
                risk_factor,
                quorum,
                resolution_factor,
            },
        )
        .await
        .map_err(|e| HarnessError::SyntheticAsset {
            asset_id: asset_id.value(),
            last: Box::new(e),
        })?;

        let mut asset_ids = self.asset_ids.write().unwrap_or_else(|e| e.into_inner());
        if let Err(index) = asset_ids.binary_search(&asset_id) {
            asset_ids.insert(index, asset_id);
        }
        tracing::info!("Added synthetic asset {}", asset_id);
        Ok(asset_id)
    }

    pub async fn add_oracle_to_asset(
        &self,
        asset_id: AssetId,
        oracle_public_key: Felt,
        oracle_name: Felt,
        asset_name: Felt,
    ) -> HarnessResult<()> {
        let governor = self.role(Role::AppGovernor)?;
        self.invoke_as(
            governor,
            self.perpetuals_contract,
            Invocation::AddOracleToAsset {
                asset_id,
                oracle_public_key,
                oracle_name,
                asset_name,
            },
        )
        .await?;
        tracing::info!(
            "Added oracle {:#x} to asset {}",
            oracle_public_key,
            asset_id
        );
        Ok(())
    }

    /// Submit a funding tick moving the listed assets by their diff and
    /// keeping every other active asset's index.
    ///
    /// Nothing is submitted unless the index of every active asset was read.
    pub async fn funding_tick(&self, diffs: &HashMap<AssetId, i64>) -> HarnessResult<()> {
        let asset_ids = self.asset_ids();
        let active = self.get_num_of_active_synthetic_assets().await?;
        if asset_ids.is_empty() && active > 0 {
            tracing::error!(
                "No synthetic asset ids known locally while {} are active on the ledger",
                active
            );
            return Err(HarnessError::Config(format!(
                "{active} synthetic assets are active but none are known locally; \
                 set SYNTHETIC_ASSET_IDS to the fork block's asset list"
            )));
        }
        let current =
            fetch_funding_indices(self.gateway.as_ref(), self.perpetuals_contract, &asset_ids)
                .await;
        check_active_count(current.len(), active)?;

        let funding_ticks = rebuild_funding_ticks(&asset_ids, &current, diffs)?;
        let timestamp = self.now;
        self.invoke_as_operator(|operator_nonce| Invocation::FundingTick {
            operator_nonce,
            funding_ticks,
            timestamp,
        })
        .await?;
        tracing::info!(
            "Funding tick over {} assets ({} changed)",
            asset_ids.len(),
            diffs.len()
        );
        Ok(())
    }

    /// Sign both orders with their owners' keys and settle them.
    pub async fn trade(
        &self,
        account_a: &DevnetAccount,
        account_b: &DevnetAccount,
        order_a: Order,
        order_b: Order,
        fill: TradeFill,
    ) -> HarnessResult<()> {
        let signature_a = self.signer.sign_order(account_a.key_pair()?, &order_a)?;
        let signature_b = self.signer.sign_order(account_b.key_pair()?, &order_b)?;
        let (position_a, position_b) = (order_a.position_id, order_b.position_id);

        self.invoke_as_operator(|operator_nonce| Invocation::Trade {
            operator_nonce,
            signature_a,
            signature_b,
            order_a,
            order_b,
            actual_amount_base_a: fill.actual_amount_base_a,
            actual_amount_quote_a: fill.actual_amount_quote_a,
            actual_fee_a: fill.actual_fee_a,
            actual_fee_b: fill.actual_fee_b,
        })
        .await?;
        tracing::info!(
            "Traded {} base between positions {} and {}",
            fill.actual_amount_base_a,
            position_a,
            position_b
        );
        Ok(())
    }

    // Contract lifecycle

    /// Declare a freshly built `perpetuals_Core` and switch the proxy to it.
    pub async fn upgrade_perpetuals_contract(
        &self,
        eic_data: Option<EicData>,
    ) -> HarnessResult<Felt> {
        let governor = self.role(Role::UpgradeGovernor)?;
        let impl_hash = self
            .declare_contract(PERPETUALS_CORE_CONTRACT, governor)
            .await?;
        let implementation = ImplementationData {
            impl_hash,
            eic_data,
            final_: false,
        };

        self.invoke_as(
            governor,
            self.perpetuals_contract,
            Invocation::AddNewImplementation(implementation.clone()),
        )
        .await?;
        self.invoke_as(
            governor,
            self.perpetuals_contract,
            Invocation::ReplaceTo(implementation),
        )
        .await?;

        tracing::info!("Upgraded perpetuals contract to {:#x}", impl_hash);
        Ok(impl_hash)
    }

    pub async fn register_and_activate_external_component(
        &self,
        contract_name: &str,
        component_type: &str,
    ) -> HarnessResult<Felt> {
        let governor = self.role(Role::UpgradeGovernor)?;
        let component_type = short_string(component_type)?;
        let class_hash = self.declare_contract(contract_name, governor).await?;

        self.invoke_as(
            governor,
            self.perpetuals_contract,
            Invocation::RegisterExternalComponent {
                component_type,
                class_hash,
            },
        )
        .await?;
        self.invoke_as(
            governor,
            self.perpetuals_contract,
            Invocation::ActivateExternalComponent {
                component_type,
                class_hash,
            },
        )
        .await?;

        tracing::info!(
            "Activated external component {} ({:#x})",
            contract_name,
            class_hash
        );
        Ok(class_hash)
    }

    /// Declare a contract class from the artifacts directory.
    pub async fn declare_contract(
        &self,
        contract_name: &str,
        sender: &DevnetAccount,
    ) -> HarnessResult<Felt> {
        let artifact = ContractArtifact::load(&self.artifacts_dir, contract_name)?;
        self.gateway.declare(sender, &artifact).await
    }

    pub async fn deploy_contract(
        &self,
        sender: &DevnetAccount,
        class_hash: Felt,
        constructor_calldata: &[Felt],
    ) -> HarnessResult<Felt> {
        let salt = Felt::from(self.rng.salt());
        self.gateway
            .deploy(sender, class_hash, constructor_calldata, salt)
            .await
    }

    // Devnet JSON-RPC

    pub async fn fund_account(
        &self,
        address: Felt,
        amount: u128,
        unit: FeeUnit,
    ) -> HarnessResult<MintResponse> {
        self.devnet()?.mint(address, amount, unit).await
    }

    pub async fn get_account_balance(&self, address: Felt, unit: FeeUnit) -> HarnessResult<u128> {
        self.devnet()?.account_balance(address, unit).await
    }
}

#[async_trait]
impl NonceSource for PerpetualsTestUtils {
    async fn fetch_operator_nonce(&self) -> HarnessResult<u64> {
        let (view, result) = self.view(ViewCall::GetOperatorNonce).await?;
        view.word_u64(&result, 0)
    }
}
