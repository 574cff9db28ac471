//! Typed records for the perpetuals contract interface.
//!
//! Every state-mutating entry point the harness touches is one variant of
//! [`Invocation`], and every read entry point one variant of [`ViewCall`].
//! Calldata is produced with Cairo serde layout: structs flatten field by
//! field, spans are length-prefixed, `Option` is tagged with `0` for `Some`
//! and `1` for `None`, `u256` splits into `(low, high)`.

use serde::{Deserialize, Serialize};
use starknet::core::types::Felt;
use starknet::core::utils::cairo_short_string_to_felt;
use std::cmp::Ordering;
use std::fmt;

use crate::error::{HarnessError, HarnessResult};

/// Append the Cairo serde encoding of a value to a calldata buffer.
pub trait CairoSerialize {
    fn serialize_into(&self, out: &mut Vec<Felt>);

    fn to_calldata(&self) -> Vec<Felt> {
        let mut out = Vec::new();
        self.serialize_into(&mut out);
        out
    }
}

/// Encode a signed integer as a field element (negative values wrap modulo P).
pub fn felt_from_i64(value: i64) -> Felt {
    if value < 0 {
        -Felt::from(value.unsigned_abs())
    } else {
        Felt::from(value as u64)
    }
}

pub fn felt_to_u128(felt: &Felt) -> Option<u128> {
    let bytes = felt.to_bytes_be();
    if bytes[..16].iter().any(|b| *b != 0) {
        return None;
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&bytes[16..]);
    Some(u128::from_be_bytes(low))
}

pub fn felt_to_u64(felt: &Felt) -> Option<u64> {
    felt_to_u128(felt).and_then(|v| u64::try_from(v).ok())
}

/// Decode a field element holding a Cairo `i64`.
pub fn felt_to_i64(felt: &Felt) -> Option<i64> {
    if let Some(positive) = felt_to_u64(felt) {
        return i64::try_from(positive).ok();
    }
    let magnitude = felt_to_u64(&(-*felt))?;
    if magnitude > i64::MAX as u64 + 1 {
        return None;
    }
    Some((-(magnitude as i128)) as i64)
}

/// Encode an ASCII string of at most 31 characters as a felt.
pub fn short_string(value: &str) -> HarnessResult<Felt> {
    cairo_short_string_to_felt(value)
        .map_err(|e| HarnessError::Encoding(format!("invalid short string '{value}': {e}")))
}

impl CairoSerialize for Felt {
    fn serialize_into(&self, out: &mut Vec<Felt>) {
        out.push(*self);
    }
}

impl CairoSerialize for bool {
    fn serialize_into(&self, out: &mut Vec<Felt>) {
        out.push(if *self { Felt::ONE } else { Felt::ZERO });
    }
}

impl<T: CairoSerialize> CairoSerialize for [T] {
    fn serialize_into(&self, out: &mut Vec<Felt>) {
        out.push(Felt::from(self.len() as u64));
        for item in self {
            item.serialize_into(out);
        }
    }
}

impl<T: CairoSerialize> CairoSerialize for Option<T> {
    fn serialize_into(&self, out: &mut Vec<Felt>) {
        match self {
            Some(value) => {
                out.push(Felt::ZERO);
                value.serialize_into(out);
            }
            None => out.push(Felt::ONE),
        }
    }
}

/// Asset identifier (`AssetId { value: felt252 }`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetId(pub Felt);

impl AssetId {
    pub fn value(&self) -> Felt {
        self.0
    }
}

impl From<u32> for AssetId {
    fn from(value: u32) -> Self {
        Self(Felt::from(value))
    }
}

impl Ord for AssetId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.to_bytes_be().cmp(&other.0.to_bytes_be())
    }
}

impl PartialOrd for AssetId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl CairoSerialize for AssetId {
    fn serialize_into(&self, out: &mut Vec<Felt>) {
        out.push(self.0);
    }
}

/// Position identifier (`PositionId { value: u32 }`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PositionId(pub u32);

impl fmt::Display for PositionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl CairoSerialize for PositionId {
    fn serialize_into(&self, out: &mut Vec<Felt>) {
        out.push(Felt::from(self.0));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp {
    pub seconds: u64,
}

impl Timestamp {
    pub fn from_seconds(seconds: u64) -> Self {
        Self { seconds }
    }
}

impl CairoSerialize for Timestamp {
    fn serialize_into(&self, out: &mut Vec<Felt>) {
        out.push(Felt::from(self.seconds));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FundingIndex {
    pub value: i64,
}

impl CairoSerialize for FundingIndex {
    fn serialize_into(&self, out: &mut Vec<Felt>) {
        out.push(felt_from_i64(self.value));
    }
}

/// Stark ECDSA signature, serialized as `Span<felt252>` of `[r, s]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub r: Felt,
    pub s: Felt,
}

impl CairoSerialize for Signature {
    fn serialize_into(&self, out: &mut Vec<Felt>) {
        [self.r, self.s].serialize_into(out);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub position_id: PositionId,
    pub base_asset_id: AssetId,
    pub base_amount: i64,
    pub quote_asset_id: AssetId,
    pub quote_amount: i64,
    pub fee_asset_id: AssetId,
    pub fee_amount: u64,
    pub expiration: Timestamp,
    pub salt: u64,
}

impl CairoSerialize for Order {
    fn serialize_into(&self, out: &mut Vec<Felt>) {
        self.position_id.serialize_into(out);
        self.base_asset_id.serialize_into(out);
        out.push(felt_from_i64(self.base_amount));
        self.quote_asset_id.serialize_into(out);
        out.push(felt_from_i64(self.quote_amount));
        self.fee_asset_id.serialize_into(out);
        out.push(Felt::from(self.fee_amount));
        self.expiration.serialize_into(out);
        out.push(Felt::from(self.salt));
    }
}

/// Oracle attestation of a price at a timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPrice {
    pub signature: Signature,
    pub signer_public_key: Felt,
    pub timestamp: u32,
    pub oracle_price: u128,
}

impl CairoSerialize for SignedPrice {
    fn serialize_into(&self, out: &mut Vec<Felt>) {
        self.signature.serialize_into(out);
        out.push(self.signer_public_key);
        out.push(Felt::from(self.timestamp));
        out.push(Felt::from(self.oracle_price));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FundingTick {
    pub asset_id: AssetId,
    pub funding_index: FundingIndex,
}

impl CairoSerialize for FundingTick {
    fn serialize_into(&self, out: &mut Vec<Felt>) {
        self.asset_id.serialize_into(out);
        self.funding_index.serialize_into(out);
    }
}

/// External initializer run as part of an upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EicData {
    pub eic_hash: Felt,
    pub eic_init_data: Vec<Felt>,
}

impl CairoSerialize for EicData {
    fn serialize_into(&self, out: &mut Vec<Felt>) {
        out.push(self.eic_hash);
        self.eic_init_data.serialize_into(out);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImplementationData {
    pub impl_hash: Felt,
    pub eic_data: Option<EicData>,
    pub final_: bool,
}

impl CairoSerialize for ImplementationData {
    fn serialize_into(&self, out: &mut Vec<Felt>) {
        out.push(self.impl_hash);
        self.eic_data.serialize_into(out);
        self.final_.serialize_into(out);
    }
}

/// Risk factor tiering of a synthetic asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskFactorConfig {
    pub tiers: Vec<u16>,
    pub first_tier_boundary: u128,
    pub tier_size: u128,
}

impl CairoSerialize for RiskFactorConfig {
    fn serialize_into(&self, out: &mut Vec<Felt>) {
        out.push(Felt::from(self.tiers.len() as u64));
        out.extend(self.tiers.iter().map(|tier| Felt::from(*tier)));
        out.push(Felt::from(self.first_tier_boundary));
        out.push(Felt::from(self.tier_size));
    }
}

fn u256_into(value: u128, out: &mut Vec<Felt>) {
    out.push(Felt::from(value));
    out.push(Felt::ZERO);
}

/// A state-mutating contract call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Invocation {
    NewPosition {
        operator_nonce: u64,
        position_id: PositionId,
        owner_public_key: Felt,
        owner_account: Felt,
        owner_protection_enabled: bool,
    },
    DepositAsset {
        asset_id: AssetId,
        position_id: PositionId,
        quantized_amount: u64,
        salt: u64,
    },
    ProcessDeposit {
        operator_nonce: u64,
        depositor: Felt,
        asset_id: AssetId,
        position_id: PositionId,
        quantized_amount: u64,
        salt: u64,
    },
    WithdrawRequest {
        signature: Signature,
        asset_id: AssetId,
        recipient: Felt,
        position_id: PositionId,
        amount: u64,
        expiration: Timestamp,
        salt: u64,
    },
    Withdraw {
        operator_nonce: u64,
        asset_id: AssetId,
        recipient: Felt,
        position_id: PositionId,
        amount: u64,
        expiration: Timestamp,
        salt: u64,
    },
    PriceTick {
        operator_nonce: u64,
        asset_id: AssetId,
        oracle_price: u128,
        signed_prices: Vec<SignedPrice>,
    },
    FundingTick {
        operator_nonce: u64,
        funding_ticks: Vec<FundingTick>,
        timestamp: Timestamp,
    },
    Trade {
        operator_nonce: u64,
        signature_a: Signature,
        signature_b: Signature,
        order_a: Order,
        order_b: Order,
        actual_amount_base_a: i64,
        actual_amount_quote_a: i64,
        actual_fee_a: u64,
        actual_fee_b: u64,
    },
    AddSyntheticAsset {
        asset_id: AssetId,
        risk_factor: RiskFactorConfig,
        quorum: u8,
        resolution_factor: u64,
    },
    AddOracleToAsset {
        asset_id: AssetId,
        oracle_public_key: Felt,
        oracle_name: Felt,
        asset_name: Felt,
    },
    RegisterExternalComponent {
        component_type: Felt,
        class_hash: Felt,
    },
    ActivateExternalComponent {
        component_type: Felt,
        class_hash: Felt,
    },
    AddNewImplementation(ImplementationData),
    ReplaceTo(ImplementationData),
    Erc20Transfer {
        recipient: Felt,
        amount: u128,
    },
    Erc20Approve {
        spender: Felt,
        amount: u128,
    },
}

impl Invocation {
    pub fn entry_point(&self) -> &'static str {
        match self {
            Invocation::NewPosition { .. } => "new_position",
            Invocation::DepositAsset { .. } => "deposit_asset",
            Invocation::ProcessDeposit { .. } => "process_deposit",
            Invocation::WithdrawRequest { .. } => "withdraw_request",
            Invocation::Withdraw { .. } => "withdraw",
            Invocation::PriceTick { .. } => "price_tick",
            Invocation::FundingTick { .. } => "funding_tick",
            Invocation::Trade { .. } => "trade",
            Invocation::AddSyntheticAsset { .. } => "add_synthetic_asset",
            Invocation::AddOracleToAsset { .. } => "add_oracle_to_asset",
            Invocation::RegisterExternalComponent { .. } => "register_external_component",
            Invocation::ActivateExternalComponent { .. } => "activate_external_component",
            Invocation::AddNewImplementation(_) => "add_new_implementation",
            Invocation::ReplaceTo(_) => "replace_to",
            Invocation::Erc20Transfer { .. } => "transfer",
            Invocation::Erc20Approve { .. } => "approve",
        }
    }

    /// Operator nonce carried by the call, if it is an operator action.
    pub fn operator_nonce(&self) -> Option<u64> {
        match self {
            Invocation::NewPosition { operator_nonce, .. }
            | Invocation::ProcessDeposit { operator_nonce, .. }
            | Invocation::Withdraw { operator_nonce, .. }
            | Invocation::PriceTick { operator_nonce, .. }
            | Invocation::FundingTick { operator_nonce, .. }
            | Invocation::Trade { operator_nonce, .. } => Some(*operator_nonce),
            _ => None,
        }
    }

    pub fn calldata(&self) -> Vec<Felt> {
        let mut out = Vec::new();
        match self {
            Invocation::NewPosition {
                operator_nonce,
                position_id,
                owner_public_key,
                owner_account,
                owner_protection_enabled,
            } => {
                out.push(Felt::from(*operator_nonce));
                position_id.serialize_into(&mut out);
                out.push(*owner_public_key);
                out.push(*owner_account);
                owner_protection_enabled.serialize_into(&mut out);
            }
            Invocation::DepositAsset {
                asset_id,
                position_id,
                quantized_amount,
                salt,
            } => {
                asset_id.serialize_into(&mut out);
                position_id.serialize_into(&mut out);
                out.push(Felt::from(*quantized_amount));
                out.push(Felt::from(*salt));
            }
            Invocation::ProcessDeposit {
                operator_nonce,
                depositor,
                asset_id,
                position_id,
                quantized_amount,
                salt,
            } => {
                out.push(Felt::from(*operator_nonce));
                out.push(*depositor);
                asset_id.serialize_into(&mut out);
                position_id.serialize_into(&mut out);
                out.push(Felt::from(*quantized_amount));
                out.push(Felt::from(*salt));
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
                signature.serialize_into(&mut out);
                asset_id.serialize_into(&mut out);
                out.push(*recipient);
                position_id.serialize_into(&mut out);
                out.push(Felt::from(*amount));
                expiration.serialize_into(&mut out);
                out.push(Felt::from(*salt));
            }
            Invocation::Withdraw {
                operator_nonce,
                asset_id,
                recipient,
                position_id,
                amount,
                expiration,
                salt,
            } => {
                out.push(Felt::from(*operator_nonce));
                asset_id.serialize_into(&mut out);
                out.push(*recipient);
                position_id.serialize_into(&mut out);
                out.push(Felt::from(*amount));
                expiration.serialize_into(&mut out);
                out.push(Felt::from(*salt));
            }
            Invocation::PriceTick {
                operator_nonce,
                asset_id,
                oracle_price,
                signed_prices,
            } => {
                out.push(Felt::from(*operator_nonce));
                asset_id.serialize_into(&mut out);
                out.push(Felt::from(*oracle_price));
                signed_prices.as_slice().serialize_into(&mut out);
            }
            Invocation::FundingTick {
                operator_nonce,
                funding_ticks,
                timestamp,
            } => {
                out.push(Felt::from(*operator_nonce));
                funding_ticks.as_slice().serialize_into(&mut out);
                timestamp.serialize_into(&mut out);
            }
            Invocation::Trade {
                operator_nonce,
                signature_a,
                signature_b,
                order_a,
                order_b,
                actual_amount_base_a,
                actual_amount_quote_a,
                actual_fee_a,
                actual_fee_b,
            } => {
                out.push(Felt::from(*operator_nonce));
                signature_a.serialize_into(&mut out);
                signature_b.serialize_into(&mut out);
                order_a.serialize_into(&mut out);
                order_b.serialize_into(&mut out);
                out.push(felt_from_i64(*actual_amount_base_a));
                out.push(felt_from_i64(*actual_amount_quote_a));
                out.push(Felt::from(*actual_fee_a));
                out.push(Felt::from(*actual_fee_b));
            }
            Invocation::AddSyntheticAsset {
                asset_id,
                risk_factor,
                quorum,
                resolution_factor,
            } => {
                asset_id.serialize_into(&mut out);
                risk_factor.serialize_into(&mut out);
                out.push(Felt::from(*quorum));
                out.push(Felt::from(*resolution_factor));
            }
            Invocation::AddOracleToAsset {
                asset_id,
                oracle_public_key,
                oracle_name,
                asset_name,
            } => {
                asset_id.serialize_into(&mut out);
                out.push(*oracle_public_key);
                out.push(*oracle_name);
                out.push(*asset_name);
            }
            Invocation::RegisterExternalComponent {
                component_type,
                class_hash,
            }
            | Invocation::ActivateExternalComponent {
                component_type,
                class_hash,
            } => {
                out.push(*component_type);
                out.push(*class_hash);
            }
            Invocation::AddNewImplementation(data) | Invocation::ReplaceTo(data) => {
                data.serialize_into(&mut out);
            }
            Invocation::Erc20Transfer { recipient, amount } => {
                out.push(*recipient);
                u256_into(*amount, &mut out);
            }
            Invocation::Erc20Approve { spender, amount } => {
                out.push(*spender);
                u256_into(*amount, &mut out);
            }
        }
        out
    }
}

/// A read-only contract call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewCall {
    GetOperatorNonce,
    GetCollateralId,
    GetBaseCollateralTokenContract,
    GetPositionTvTr(PositionId),
    GetNumOfActiveSyntheticAssets,
    GetTimelyData(AssetId),
}

impl ViewCall {
    pub fn entry_point(&self) -> &'static str {
        match self {
            ViewCall::GetOperatorNonce => "get_operator_nonce",
            ViewCall::GetCollateralId => "get_collateral_id",
            ViewCall::GetBaseCollateralTokenContract => "get_base_collateral_token_contract",
            ViewCall::GetPositionTvTr(_) => "get_position_tv_tr",
            ViewCall::GetNumOfActiveSyntheticAssets => "get_num_of_active_synthetic_assets",
            ViewCall::GetTimelyData(_) => "get_timely_data",
        }
    }

    pub fn calldata(&self) -> Vec<Felt> {
        match self {
            ViewCall::GetPositionTvTr(position_id) => position_id.to_calldata(),
            ViewCall::GetTimelyData(asset_id) => asset_id.to_calldata(),
            _ => Vec::new(),
        }
    }

    fn decode_error(&self, reason: impl Into<String>) -> HarnessError {
        HarnessError::Decode {
            entry_point: self.entry_point().to_string(),
            reason: reason.into(),
        }
    }

    /// Read the felt at `index` of a call result.
    pub fn word(&self, result: &[Felt], index: usize) -> HarnessResult<Felt> {
        result.get(index).copied().ok_or_else(|| {
            self.decode_error(format!(
                "expected at least {} words, got {}",
                index + 1,
                result.len()
            ))
        })
    }

    pub fn word_u64(&self, result: &[Felt], index: usize) -> HarnessResult<u64> {
        let word = self.word(result, index)?;
        felt_to_u64(&word).ok_or_else(|| self.decode_error(format!("{word:#x} is not a u64")))
    }

    pub fn word_i64(&self, result: &[Felt], index: usize) -> HarnessResult<i64> {
        let word = self.word(result, index)?;
        felt_to_i64(&word).ok_or_else(|| self.decode_error(format!("{word:#x} is not an i64")))
    }

    pub fn word_u128(&self, result: &[Felt], index: usize) -> HarnessResult<u128> {
        let word = self.word(result, index)?;
        felt_to_u128(&word).ok_or_else(|| self.decode_error(format!("{word:#x} is not a u128")))
    }
}

/// Result of `get_position_tv_tr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionTvTr {
    pub total_value: i64,
    pub total_risk: u128,
}

impl PositionTvTr {
    pub fn decode(view: &ViewCall, result: &[Felt]) -> HarnessResult<Self> {
        Ok(Self {
            total_value: view.word_i64(result, 0)?,
            total_risk: view.word_u128(result, 1)?,
        })
    }
}

/// Result of `get_timely_data`: `(version, price, last_price_update, funding_index)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetTimelyData {
    pub version: u64,
    pub price: u128,
    pub last_price_update: Timestamp,
    pub funding_index: FundingIndex,
}

impl AssetTimelyData {
    pub fn decode(view: &ViewCall, result: &[Felt]) -> HarnessResult<Self> {
        Ok(Self {
            version: view.word_u64(result, 0)?,
            price: view.word_u128(result, 1)?,
            last_price_update: Timestamp::from_seconds(view.word_u64(result, 2)?),
            funding_index: FundingIndex {
                value: view.word_i64(result, 3)?,
            },
        })
    }

    pub fn to_words(&self) -> Vec<Felt> {
        vec![
            Felt::from(self.version),
            Felt::from(self.price),
            Felt::from(self.last_price_update.seconds),
            felt_from_i64(self.funding_index.value),
        ]
    }
}
