//! In-memory stand-in for the perpetuals contract and its collateral token.
//!
//! Models the observable behaviour the harness relies on: operator nonce
//! checking, position creation, the two-step deposit and withdrawal flows,
//! synthetic asset and oracle registration, price and funding ticks, trades
//! and upgrades. Signatures are verified exactly as the contract does, so a
//! passing mock scenario exercises the real message hashing.

use async_trait::async_trait;
use starknet::core::types::Felt;
use starknet::core::utils::starknet_keccak;
use starknet_crypto::verify;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use super::PerpetualsGateway;
use crate::error::{HarnessError, HarnessResult};
use crate::models::account::DevnetAccount;
use crate::models::protocol::{
    AssetId, AssetTimelyData, FundingIndex, ImplementationData, Invocation, Order, PositionId,
    Signature, SignedPrice, Timestamp, ViewCall, felt_from_i64,
};
use crate::services::artifacts::ContractArtifact;
use crate::services::signing::{
    MessageSigner, SigningDomain, WithdrawArgs, price_message_hash,
};

pub const MOCK_COLLATERAL_ID: u32 = 1;
pub const MOCK_COLLATERAL_TOKEN: Felt =
    Felt::from_hex_unchecked("0x053c91253bc9682c04929ca02ed00b3e423f6710d2ee7e0d5ebb06f3ecf368a8");

/// One invoke the mock received, accepted or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedInvoke {
    pub sender: Felt,
    pub target: Felt,
    pub entry_point: &'static str,
    pub operator_nonce: Option<u64>,
    pub accepted: bool,
}

#[derive(Debug, Clone, Default)]
struct MockPosition {
    owner_account: Felt,
    owner_public_key: Felt,
    collateral: i64,
    synthetics: HashMap<AssetId, i64>,
}

#[derive(Debug, Clone)]
struct MockAsset {
    active: bool,
    quorum: u8,
    /// oracle public key -> (oracle name, asset name)
    oracles: HashMap<Felt, (Felt, Felt)>,
    timely: AssetTimelyData,
}

impl MockAsset {
    fn new(quorum: u8) -> Self {
        Self {
            active: false,
            quorum,
            oracles: HashMap::new(),
            timely: AssetTimelyData {
                version: 1,
                price: 0,
                last_price_update: Timestamp::from_seconds(0),
                funding_index: FundingIndex { value: 0 },
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DepositKey {
    depositor: Felt,
    asset_id: AssetId,
    position_id: PositionId,
    amount: u64,
    salt: u64,
}

#[derive(Debug, Default)]
struct MockState {
    now: u64,
    operator_nonce: u64,
    positions: HashMap<PositionId, MockPosition>,
    assets: BTreeMap<AssetId, MockAsset>,
    balances: HashMap<Felt, u128>,
    allowances: HashMap<(Felt, Felt), u128>,
    pending_deposits: HashSet<DepositKey>,
    pending_withdrawals: HashSet<Felt>,
    last_funding_tick: Option<Timestamp>,
    declared: HashSet<Felt>,
    deployed: HashMap<Felt, Felt>,
    implementations: Vec<ImplementationData>,
    current_implementation: Option<Felt>,
    registered_components: HashSet<(Felt, Felt)>,
    active_components: HashMap<Felt, Felt>,
    failing_invokes: HashMap<String, u32>,
    failing_timely_data: HashSet<AssetId>,
    invocations: Vec<RecordedInvoke>,
    tx_counter: u64,
}

/// In-memory [`PerpetualsGateway`].
#[derive(Debug)]
pub struct MockGateway {
    perpetuals_contract: Felt,
    collateral_id: AssetId,
    collateral_token: Felt,
    signer: MessageSigner,
    state: Mutex<MockState>,
}

impl MockGateway {
    pub fn new(perpetuals_contract: Felt) -> HarnessResult<Self> {
        Ok(Self {
            perpetuals_contract,
            collateral_id: AssetId::from(MOCK_COLLATERAL_ID),
            collateral_token: MOCK_COLLATERAL_TOKEN,
            signer: MessageSigner::new(&SigningDomain::default())?,
            state: Mutex::new(MockState::default()),
        })
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn perpetuals_contract(&self) -> Felt {
        self.perpetuals_contract
    }

    pub fn collateral_token(&self) -> Felt {
        self.collateral_token
    }

    /// Block timestamp seen by expiration checks and price ticks.
    pub fn set_timestamp(&self, seconds: u64) {
        self.state().now = seconds;
    }

    pub fn set_operator_nonce(&self, nonce: u64) {
        self.state().operator_nonce = nonce;
    }

    pub fn operator_nonce(&self) -> u64 {
        self.state().operator_nonce
    }

    /// Register an already active synthetic asset, as found on a fork.
    pub fn add_active_asset(&self, asset_id: AssetId, price: u128, funding_index: i64) {
        let mut asset = MockAsset::new(1);
        asset.active = true;
        asset.timely.price = price;
        asset.timely.funding_index = FundingIndex {
            value: funding_index,
        };
        self.state().assets.insert(asset_id, asset);
    }

    /// Credit collateral tokens to an address.
    pub fn mint_collateral(&self, address: Felt, amount: u128) {
        *self.state().balances.entry(address).or_default() += amount;
    }

    pub fn collateral_balance(&self, address: Felt) -> u128 {
        self.state().balances.get(&address).copied().unwrap_or(0)
    }

    /// Make the next `times` invokes of `entry_point` fail before reaching the
    /// contract. `u32::MAX` fails forever.
    pub fn fail_invokes(&self, entry_point: &str, times: u32) {
        self.state()
            .failing_invokes
            .insert(entry_point.to_string(), times);
    }

    /// Make `get_timely_data` fail for one asset.
    pub fn fail_timely_data(&self, asset_id: AssetId) {
        self.state().failing_timely_data.insert(asset_id);
    }

    pub fn invocations(&self) -> Vec<RecordedInvoke> {
        self.state().invocations.clone()
    }

    pub fn invocations_of(&self, entry_point: &str) -> Vec<RecordedInvoke> {
        self.state()
            .invocations
            .iter()
            .filter(|invoke| invoke.entry_point == entry_point)
            .cloned()
            .collect()
    }

    pub fn position_owner(&self, position_id: PositionId) -> Option<Felt> {
        self.state()
            .positions
            .get(&position_id)
            .map(|position| position.owner_account)
    }

    pub fn funding_index(&self, asset_id: AssetId) -> Option<i64> {
        self.state()
            .assets
            .get(&asset_id)
            .map(|asset| asset.timely.funding_index.value)
    }

    pub fn last_funding_tick(&self) -> Option<Timestamp> {
        self.state().last_funding_tick
    }

    pub fn oracle_count(&self, asset_id: AssetId) -> usize {
        self.state()
            .assets
            .get(&asset_id)
            .map_or(0, |asset| asset.oracles.len())
    }

    pub fn current_implementation(&self) -> Option<Felt> {
        self.state().current_implementation
    }

    pub fn active_component(&self, component_type: Felt) -> Option<Felt> {
        self.state().active_components.get(&component_type).copied()
    }

    pub fn is_declared(&self, class_hash: Felt) -> bool {
        self.state().declared.contains(&class_hash)
    }

    pub fn deployed_class(&self, address: Felt) -> Option<Felt> {
        self.state().deployed.get(&address).copied()
    }

    fn take_injected_failure(state: &mut MockState, entry_point: &str) -> bool {
        match state.failing_invokes.get_mut(entry_point) {
            Some(0) | None => false,
            Some(&mut u32::MAX) => true,
            Some(remaining) => {
                *remaining -= 1;
                true
            }
        }
    }

    fn next_tx_hash(state: &mut MockState) -> Felt {
        state.tx_counter += 1;
        Felt::from(state.tx_counter)
    }

    fn view(&self, view: &ViewCall) -> Result<Vec<Felt>, String> {
        let state = self.state();
        match view {
            ViewCall::GetOperatorNonce => Ok(vec![Felt::from(state.operator_nonce)]),
            ViewCall::GetCollateralId => Ok(vec![self.collateral_id.value()]),
            ViewCall::GetBaseCollateralTokenContract => Ok(vec![self.collateral_token]),
            ViewCall::GetPositionTvTr(position_id) => {
                let position = state
                    .positions
                    .get(position_id)
                    .ok_or_else(|| "INVALID_POSITION".to_string())?;
                let total_value = total_value(position, &state.assets)?;
                Ok(vec![felt_from_i64(total_value), Felt::ZERO])
            }
            ViewCall::GetNumOfActiveSyntheticAssets => {
                let active = state.assets.values().filter(|asset| asset.active).count();
                Ok(vec![Felt::from(active as u64)])
            }
            ViewCall::GetTimelyData(asset_id) => {
                if state.failing_timely_data.contains(asset_id) {
                    return Err("injected failure".to_string());
                }
                state
                    .assets
                    .get(asset_id)
                    .map(|asset| asset.timely.to_words())
                    .ok_or_else(|| "SYNTHETIC_NOT_EXISTS".to_string())
            }
        }
    }

    fn verify(public_key: Felt, hash: Felt, signature: &Signature) -> bool {
        verify(&public_key, &hash, &signature.r, &signature.s).unwrap_or(false)
    }

    fn check_operator_nonce(state: &MockState, operator_nonce: Option<u64>) -> Result<(), String> {
        match operator_nonce {
            Some(nonce) if nonce != state.operator_nonce => Err(format!(
                "INVALID_NONCE: expected {}, got {}",
                state.operator_nonce, nonce
            )),
            _ => Ok(()),
        }
    }

    fn verify_order(&self, state: &MockState, order: &Order, signature: &Signature) -> Result<(), String> {
        let position = state
            .positions
            .get(&order.position_id)
            .ok_or_else(|| format!("INVALID_POSITION {}", order.position_id))?;
        let hash = self
            .signer
            .order_message_hash(position.owner_public_key, order);
        if !Self::verify(position.owner_public_key, hash, signature) {
            return Err("INVALID_STARK_KEY_SIGNATURE".to_string());
        }
        if order.expiration.seconds <= state.now {
            return Err("INVALID_EXPIRATION".to_string());
        }
        Ok(())
    }

    fn verify_signed_price(asset: &MockAsset, signed: &SignedPrice) -> Result<(), String> {
        let (oracle_name, asset_name) = asset
            .oracles
            .get(&signed.signer_public_key)
            .ok_or_else(|| "ORACLE_NOT_EXISTS".to_string())?;
        let hash = price_message_hash(
            *asset_name,
            *oracle_name,
            signed.oracle_price,
            signed.timestamp,
        );
        if !Self::verify(signed.signer_public_key, hash, &signed.signature) {
            return Err("INVALID_ORACLE_SIGNATURE".to_string());
        }
        Ok(())
    }

    /// Apply an invocation against the perpetuals contract.
    fn apply_perpetuals(
        &self,
        state: &mut MockState,
        sender: Felt,
        invocation: &Invocation,
    ) -> Result<(), String> {
        Self::check_operator_nonce(state, invocation.operator_nonce())?;

        match invocation {
            Invocation::NewPosition {
                position_id,
                owner_public_key,
                owner_account,
                ..
            } => {
                if state.positions.contains_key(position_id) {
                    return Err("POSITION_ALREADY_EXISTS".to_string());
                }
                state.positions.insert(
                    *position_id,
                    MockPosition {
                        owner_account: *owner_account,
                        owner_public_key: *owner_public_key,
                        ..Default::default()
                    },
                );
            }
            Invocation::DepositAsset {
                asset_id,
                position_id,
                quantized_amount,
                salt,
            } => {
                if *asset_id != self.collateral_id {
                    return Err("NOT_COLLATERAL".to_string());
                }
                let amount = u128::from(*quantized_amount);
                let allowance = state
                    .allowances
                    .get(&(sender, self.perpetuals_contract))
                    .copied()
                    .unwrap_or(0);
                if allowance < amount {
                    return Err("ERC20: insufficient allowance".to_string());
                }
                let balance = state.balances.get(&sender).copied().unwrap_or(0);
                if balance < amount {
                    return Err("ERC20: insufficient balance".to_string());
                }
                state.allowances.insert((sender, self.perpetuals_contract), allowance - amount);
                state.balances.insert(sender, balance - amount);
                *state.balances.entry(self.perpetuals_contract).or_default() += amount;
                state.pending_deposits.insert(DepositKey {
                    depositor: sender,
                    asset_id: *asset_id,
                    position_id: *position_id,
                    amount: *quantized_amount,
                    salt: *salt,
                });
            }
            Invocation::ProcessDeposit {
                depositor,
                asset_id,
                position_id,
                quantized_amount,
                salt,
                ..
            } => {
                let key = DepositKey {
                    depositor: *depositor,
                    asset_id: *asset_id,
                    position_id: *position_id,
                    amount: *quantized_amount,
                    salt: *salt,
                };
                if !state.pending_deposits.contains(&key) {
                    return Err("DEPOSIT_NOT_REGISTERED".to_string());
                }
                let position = state
                    .positions
                    .get_mut(position_id)
                    .ok_or_else(|| "INVALID_POSITION".to_string())?;
                position.collateral =
                    checked(position.collateral.checked_add(signed(*quantized_amount)?))?;
                state.pending_deposits.remove(&key);
            }
            Invocation::WithdrawRequest {
                signature,
                asset_id,
                recipient,
                position_id,
                amount,
                expiration,
                salt,
            } => {
                let position = state
                    .positions
                    .get(position_id)
                    .ok_or_else(|| "INVALID_POSITION".to_string())?;
                let args = WithdrawArgs {
                    recipient: *recipient,
                    position_id: *position_id,
                    collateral_id: *asset_id,
                    amount: *amount,
                    expiration: *expiration,
                    salt: *salt,
                };
                let hash = self
                    .signer
                    .withdraw_message_hash(position.owner_public_key, &args);
                if !Self::verify(position.owner_public_key, hash, signature) {
                    return Err("INVALID_STARK_KEY_SIGNATURE".to_string());
                }
                if expiration.seconds <= state.now {
                    return Err("WITHDRAW_EXPIRED".to_string());
                }
                if !state.pending_withdrawals.insert(hash) {
                    return Err("REQUEST_ALREADY_REGISTERED".to_string());
                }
            }
            Invocation::Withdraw {
                asset_id,
                recipient,
                position_id,
                amount,
                expiration,
                salt,
                ..
            } => {
                let position = state
                    .positions
                    .get(position_id)
                    .ok_or_else(|| "INVALID_POSITION".to_string())?;
                let args = WithdrawArgs {
                    recipient: *recipient,
                    position_id: *position_id,
                    collateral_id: *asset_id,
                    amount: *amount,
                    expiration: *expiration,
                    salt: *salt,
                };
                let hash = self
                    .signer
                    .withdraw_message_hash(position.owner_public_key, &args);
                if !state.pending_withdrawals.contains(&hash) {
                    return Err("WITHDRAW_NOT_REGISTERED".to_string());
                }
                let withdrawn = signed(*amount)?;
                let position = state
                    .positions
                    .get_mut(position_id)
                    .ok_or_else(|| "INVALID_POSITION".to_string())?;
                if position.collateral < withdrawn {
                    return Err("POSITION_UNHEALTHY".to_string());
                }
                position.collateral -= withdrawn;
                state.pending_withdrawals.remove(&hash);
                let contract_balance = state.balances.entry(self.perpetuals_contract).or_default();
                *contract_balance = contract_balance.saturating_sub(u128::from(*amount));
                *state.balances.entry(*recipient).or_default() += u128::from(*amount);
            }
            Invocation::PriceTick {
                asset_id,
                oracle_price,
                signed_prices,
                ..
            } => {
                let now = state.now;
                let asset = state
                    .assets
                    .get_mut(asset_id)
                    .ok_or_else(|| "SYNTHETIC_NOT_EXISTS".to_string())?;
                if signed_prices.len() < usize::from(asset.quorum) {
                    return Err("QUORUM_NOT_REACHED".to_string());
                }
                for signed in signed_prices {
                    Self::verify_signed_price(asset, signed)?;
                }
                asset.timely.price = *oracle_price;
                asset.timely.last_price_update = Timestamp::from_seconds(now);
                asset.active = true;
            }
            Invocation::FundingTick {
                funding_ticks,
                timestamp,
                ..
            } => {
                let active = state.assets.values().filter(|asset| asset.active).count();
                if funding_ticks.len() != active {
                    return Err("INVALID_FUNDING_TICK_LEN".to_string());
                }
                if funding_ticks
                    .windows(2)
                    .any(|pair| pair[0].asset_id >= pair[1].asset_id)
                {
                    return Err("INVALID_FUNDING_TICK_ORDER".to_string());
                }
                for tick in funding_ticks {
                    match state.assets.get(&tick.asset_id) {
                        Some(asset) if asset.active => {}
                        _ => return Err("SYNTHETIC_NOT_ACTIVE".to_string()),
                    }
                }
                for tick in funding_ticks {
                    if let Some(asset) = state.assets.get_mut(&tick.asset_id) {
                        asset.timely.funding_index = tick.funding_index;
                    }
                }
                state.last_funding_tick = Some(*timestamp);
            }
            Invocation::Trade {
                signature_a,
                signature_b,
                order_a,
                order_b,
                actual_amount_base_a,
                actual_amount_quote_a,
                actual_fee_a,
                actual_fee_b,
                ..
            } => {
                if order_a.position_id == order_b.position_id {
                    return Err("INVALID_SAME_POSITIONS".to_string());
                }
                if order_a.base_asset_id != order_b.base_asset_id {
                    return Err("DIFFERENT_BASE_ASSET_IDS".to_string());
                }
                self.verify_order(state, order_a, signature_a)?;
                self.verify_order(state, order_b, signature_b)?;

                let base_asset = order_a.base_asset_id;
                let (fee_a, fee_b) = (signed(*actual_fee_a)?, signed(*actual_fee_b)?);
                let settle = |position: &MockPosition, base: i64, quote: i64, fee: i64| {
                    let synthetic = position.synthetics.get(&base_asset).copied().unwrap_or(0);
                    let synthetic = checked(synthetic.checked_add(base))?;
                    let collateral = checked(
                        position
                            .collateral
                            .checked_add(quote)
                            .and_then(|c| c.checked_sub(fee)),
                    )?;
                    Ok::<_, String>((synthetic, collateral))
                };
                let negated = |value: i64| checked(value.checked_neg());

                let a = position_of(state, order_a.position_id)?;
                let settled_a = settle(a, *actual_amount_base_a, *actual_amount_quote_a, fee_a)?;
                let b = position_of(state, order_b.position_id)?;
                let settled_b = settle(
                    b,
                    negated(*actual_amount_base_a)?,
                    negated(*actual_amount_quote_a)?,
                    fee_b,
                )?;

                for (position_id, (synthetic, collateral)) in
                    [(order_a.position_id, settled_a), (order_b.position_id, settled_b)]
                {
                    if let Some(position) = state.positions.get_mut(&position_id) {
                        position.synthetics.insert(base_asset, synthetic);
                        position.collateral = collateral;
                    }
                }
            }
            Invocation::AddSyntheticAsset {
                asset_id, quorum, ..
            } => {
                if state.assets.contains_key(asset_id) {
                    return Err("SYNTHETIC_ALREADY_EXISTS".to_string());
                }
                state.assets.insert(*asset_id, MockAsset::new(*quorum));
            }
            Invocation::AddOracleToAsset {
                asset_id,
                oracle_public_key,
                oracle_name,
                asset_name,
            } => {
                let asset = state
                    .assets
                    .get_mut(asset_id)
                    .ok_or_else(|| "SYNTHETIC_NOT_EXISTS".to_string())?;
                if asset.oracles.contains_key(oracle_public_key) {
                    return Err("ORACLE_ALREADY_EXISTS".to_string());
                }
                asset
                    .oracles
                    .insert(*oracle_public_key, (*oracle_name, *asset_name));
            }
            Invocation::RegisterExternalComponent {
                component_type,
                class_hash,
            } => {
                if !state.declared.contains(class_hash) {
                    return Err("CLASS_NOT_DECLARED".to_string());
                }
                state
                    .registered_components
                    .insert((*component_type, *class_hash));
            }
            Invocation::ActivateExternalComponent {
                component_type,
                class_hash,
            } => {
                if !state
                    .registered_components
                    .contains(&(*component_type, *class_hash))
                {
                    return Err("COMPONENT_NOT_REGISTERED".to_string());
                }
                state.active_components.insert(*component_type, *class_hash);
            }
            Invocation::AddNewImplementation(data) => {
                if !state.declared.contains(&data.impl_hash) {
                    return Err("CLASS_NOT_DECLARED".to_string());
                }
                state.implementations.push(data.clone());
            }
            Invocation::ReplaceTo(data) => {
                if !state.implementations.contains(data) {
                    return Err("UNKNOWN_IMPLEMENTATION".to_string());
                }
                state.current_implementation = Some(data.impl_hash);
            }
            Invocation::Erc20Transfer { .. } | Invocation::Erc20Approve { .. } => {
                return Err("ENTRYPOINT_NOT_FOUND".to_string());
            }
        }

        if invocation.operator_nonce().is_some() {
            state.operator_nonce += 1;
        }
        Ok(())
    }

    fn apply_token(state: &mut MockState, sender: Felt, invocation: &Invocation) -> Result<(), String> {
        match invocation {
            Invocation::Erc20Transfer { recipient, amount } => {
                let balance = state.balances.get(&sender).copied().unwrap_or(0);
                if balance < *amount {
                    return Err("ERC20: insufficient balance".to_string());
                }
                state.balances.insert(sender, balance - amount);
                *state.balances.entry(*recipient).or_default() += amount;
                Ok(())
            }
            Invocation::Erc20Approve { spender, amount } => {
                state.allowances.insert((sender, *spender), *amount);
                Ok(())
            }
            _ => Err("ENTRYPOINT_NOT_FOUND".to_string()),
        }
    }
}

fn position_of(state: &MockState, position_id: PositionId) -> Result<&MockPosition, String> {
    state
        .positions
        .get(&position_id)
        .ok_or_else(|| format!("INVALID_POSITION {position_id}"))
}

const AMOUNT_OVERFLOW: &str = "AMOUNT_OVERFLOW";

fn signed(amount: u64) -> Result<i64, String> {
    i64::try_from(amount).map_err(|_| AMOUNT_OVERFLOW.to_string())
}

fn checked(value: Option<i64>) -> Result<i64, String> {
    value.ok_or_else(|| AMOUNT_OVERFLOW.to_string())
}

/// Collateral plus every synthetic balance at its current price.
fn total_value(
    position: &MockPosition,
    assets: &BTreeMap<AssetId, MockAsset>,
) -> Result<i64, String> {
    let overflow = || AMOUNT_OVERFLOW.to_string();
    let mut total = i128::from(position.collateral);
    for (asset_id, balance) in &position.synthetics {
        let price = assets.get(asset_id).map_or(0, |asset| asset.timely.price);
        let price = i128::try_from(price).map_err(|_| overflow())?;
        let value = i128::from(*balance)
            .checked_mul(price)
            .ok_or_else(overflow)?;
        total = total.checked_add(value).ok_or_else(overflow)?;
    }
    i64::try_from(total).map_err(|_| overflow())
}

#[async_trait]
impl PerpetualsGateway for MockGateway {
    async fn call(&self, contract: Felt, view: &ViewCall) -> HarnessResult<Vec<Felt>> {
        if contract != self.perpetuals_contract {
            return Err(HarnessError::Call {
                entry_point: view.entry_point().to_string(),
                reason: format!("contract {contract:#x} not found"),
            });
        }
        self.view(view).map_err(|reason| HarnessError::Call {
            entry_point: view.entry_point().to_string(),
            reason,
        })
    }

    async fn invoke(
        &self,
        sender: &DevnetAccount,
        target: Felt,
        invocation: &Invocation,
    ) -> HarnessResult<Felt> {
        let entry_point = invocation.entry_point();
        let mut state = self.state();
        let mut record = RecordedInvoke {
            sender: sender.address,
            target,
            entry_point,
            operator_nonce: invocation.operator_nonce(),
            accepted: false,
        };

        if Self::take_injected_failure(&mut state, entry_point) {
            state.invocations.push(record);
            return Err(HarnessError::Invoke {
                entry_point: entry_point.to_string(),
                reason: "injected failure".to_string(),
            });
        }

        let tx_hash = Self::next_tx_hash(&mut state);
        let outcome = if target == self.perpetuals_contract {
            self.apply_perpetuals(&mut state, sender.address, invocation)
        } else if target == self.collateral_token {
            Self::apply_token(&mut state, sender.address, invocation)
        } else {
            Err(format!("contract {target:#x} not found"))
        };

        record.accepted = outcome.is_ok();
        state.invocations.push(record);
        match outcome {
            Ok(()) => Ok(tx_hash),
            Err(reason) => {
                tracing::debug!("Mock {} reverted: {}", entry_point, reason);
                Err(HarnessError::Reverted { tx_hash, reason })
            }
        }
    }

    async fn declare(
        &self,
        _sender: &DevnetAccount,
        artifact: &ContractArtifact,
    ) -> HarnessResult<Felt> {
        let class_hash = starknet_keccak(artifact.sierra.as_bytes());
        let mut state = self.state();
        if !state.declared.insert(class_hash) {
            return Err(HarnessError::Declare {
                contract: artifact.name.clone(),
                reason: format!("class {class_hash:#x} is already declared"),
            });
        }
        Ok(class_hash)
    }

    async fn deploy(
        &self,
        sender: &DevnetAccount,
        class_hash: Felt,
        constructor_calldata: &[Felt],
        salt: Felt,
    ) -> HarnessResult<Felt> {
        let mut state = self.state();
        if !state.declared.contains(&class_hash) {
            return Err(HarnessError::Deploy {
                class_hash,
                reason: "class is not declared".to_string(),
            });
        }
        let mut preimage = vec![sender.address, salt, class_hash];
        preimage.extend_from_slice(constructor_calldata);
        let address = starknet_crypto::poseidon_hash_many(&preimage);
        if state.deployed.insert(address, class_hash).is_some() {
            return Err(HarnessError::Deploy {
                class_hash,
                reason: format!("address {address:#x} is already deployed"),
            });
        }
        Ok(address)
    }
}
