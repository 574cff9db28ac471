use starknet::core::types::Felt;
use std::time::Duration;

use crate::models::account::Role;

/// Errors raised by the devnet harness.
///
/// Remote failures are kept opaque: the reason string is whatever the
/// underlying provider or devnet reported.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("devnet at {url} did not become ready within {timeout:?}")]
    DevnetStartTimeout { url: String, timeout: Duration },

    #[error("devnet process error: {0}")]
    DevnetProcess(String),

    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{method} failed: error code {code}: {message}")]
    JsonRpc {
        method: String,
        code: i64,
        message: String,
    },

    #[error("call to {entry_point} failed: {reason}")]
    Call { entry_point: String, reason: String },

    #[error("invoke of {entry_point} failed: {reason}")]
    Invoke { entry_point: String, reason: String },

    #[error("transaction {tx_hash:#x} reverted: {reason}")]
    Reverted { tx_hash: Felt, reason: String },

    #[error("failed to declare {contract}: {reason}")]
    Declare { contract: String, reason: String },

    #[error("failed to deploy class {class_hash:#x}: {reason}")]
    Deploy { class_hash: Felt, reason: String },

    #[error("contract artifact error: {0}")]
    Artifact(String),

    #[error("malformed response from {entry_point}: {reason}")]
    Decode { entry_point: String, reason: String },

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("no more accounts available ({0} in pool)")]
    AccountPoolExhausted(usize),

    #[error("account {0:#x} is not managed by this harness")]
    UnknownAccount(Felt),

    #[error("account {0:#x} has no position")]
    NoPosition(Felt),

    #[error("account {0:#x} has no signing key")]
    MissingKey(Felt),

    #[error("no account configured for role {0}")]
    MissingRole(Role),

    #[error("failed to create a new position after {attempts} attempts: {last}")]
    PositionAllocation {
        attempts: u32,
        #[source]
        last: Box<HarnessError>,
    },

    #[error("failed to add synthetic asset {asset_id:#x}: {last}")]
    SyntheticAsset {
        asset_id: Felt,
        #[source]
        last: Box<HarnessError>,
    },

    #[error("failed to get all funding indices: expected {expected}, got {actual}")]
    FundingIndexCountMismatch { expected: u64, actual: u64 },

    #[error("configuration error: {0}")]
    Config(String),
}

pub type HarnessResult<T> = Result<T, HarnessError>;
