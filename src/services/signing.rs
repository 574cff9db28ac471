//! SNIP-12 style message hashing and Stark ECDSA signing.
//!
//! Orders and withdrawals share one two-stage scheme:
//!
//! ```text
//! args_hash    = poseidon(KIND_TYPE_HASH, field_0, ..., field_n)
//! domain_hash  = poseidon(DOMAIN_TYPE_HASH, name, version, chain_id, revision)
//! message_hash = poseidon("StarkNet Message", domain_hash, public_key, args_hash)
//! ```
//!
//! Oracle price attestations use the oracle's own pedersen scheme, see
//! [`price_message_hash`].

use starknet::core::types::Felt;
use starknet_crypto::{pedersen_hash, poseidon_hash_many, rfc6979_generate_k, sign};

use crate::error::{HarnessError, HarnessResult};
use crate::models::account::KeyPair;
use crate::models::protocol::{
    AssetId, Order, PositionId, Signature, Timestamp, felt_from_i64, short_string,
};

/// Type hash of the `Order` struct.
pub const ORDER_ARGS_TYPE_HASH: &str =
    "0x36da8d51815527cabfaa9c982f564c80fa7429616739306036f1f9b608dd112";
/// Type hash of the `WithdrawArgs` struct.
pub const WITHDRAW_ARGS_TYPE_HASH: &str =
    "0x250a5fa378e8b771654bd43dcb34844534f9d1e29e16b14760d7936ea7f4b1d";
/// Type hash of the revision 1 `StarknetDomain` struct.
pub const STARKNET_DOMAIN_TYPE_HASH: &str =
    "0x1ff2f602e42168014d405a94f75e8a93d640751d71d16311266e140d8b0a210";

pub const STARKNET_MESSAGE_PREFIX: &str = "StarkNet Message";
pub const PERPETUALS_NAME: &str = "Perpetuals";
pub const PERPETUALS_VERSION: &str = "v0";
pub const STARKNET_MAINNET_CHAIN_ID: &str = "SN_MAIN";
pub const DOMAIN_REVISION: u64 = 1;

const TWO_POW_32: u64 = 1 << 32;
const TWO_POW_40: u64 = 1 << 40;

fn type_hash(hex: &str) -> Felt {
    Felt::from_hex_unchecked(hex)
}

/// Domain separator of the signed messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningDomain {
    pub name: &'static str,
    pub version: &'static str,
    pub chain_id: &'static str,
    pub revision: u64,
}

impl Default for SigningDomain {
    fn default() -> Self {
        Self {
            name: PERPETUALS_NAME,
            version: PERPETUALS_VERSION,
            chain_id: STARKNET_MAINNET_CHAIN_ID,
            revision: DOMAIN_REVISION,
        }
    }
}

impl SigningDomain {
    pub fn hash(&self) -> HarnessResult<Felt> {
        let elements = vec![
            type_hash(STARKNET_DOMAIN_TYPE_HASH),
            short_string(self.name)?,
            short_string(self.version)?,
            short_string(self.chain_id)?,
            Felt::from(self.revision),
        ];
        Ok(poseidon_hash_many(&elements))
    }
}

/// Fields of a withdrawal request as they are signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawArgs {
    pub recipient: Felt,
    pub position_id: PositionId,
    pub collateral_id: AssetId,
    pub amount: u64,
    pub expiration: Timestamp,
    pub salt: u64,
}

pub fn order_args_hash(order: &Order) -> Felt {
    let elements = vec![
        type_hash(ORDER_ARGS_TYPE_HASH),
        Felt::from(order.position_id.0),
        order.base_asset_id.value(),
        felt_from_i64(order.base_amount),
        order.quote_asset_id.value(),
        felt_from_i64(order.quote_amount),
        order.fee_asset_id.value(),
        Felt::from(order.fee_amount),
        Felt::from(order.expiration.seconds),
        Felt::from(order.salt),
    ];
    poseidon_hash_many(&elements)
}

pub fn withdraw_args_hash(args: &WithdrawArgs) -> Felt {
    let elements = vec![
        type_hash(WITHDRAW_ARGS_TYPE_HASH),
        args.recipient,
        Felt::from(args.position_id.0),
        args.collateral_id.value(),
        Felt::from(args.amount),
        Felt::from(args.expiration.seconds),
        Felt::from(args.salt),
    ];
    poseidon_hash_many(&elements)
}

/// Hash of an oracle price attestation:
/// `pedersen(asset_name * 2^40 + oracle_name, price * 2^32 + timestamp)`.
pub fn price_message_hash(
    asset_name: Felt,
    oracle_name: Felt,
    oracle_price: u128,
    timestamp: u32,
) -> Felt {
    let asset_oracle = asset_name * Felt::from(TWO_POW_40) + oracle_name;
    let price_timestamp = Felt::from(oracle_price) * Felt::from(TWO_POW_32) + Felt::from(timestamp);
    pedersen_hash(&asset_oracle, &price_timestamp)
}

/// Sign a message hash with RFC 6979 deterministic nonces.
pub fn sign_hash(private_key: &Felt, message_hash: &Felt) -> HarnessResult<Signature> {
    let k = rfc6979_generate_k(message_hash, private_key, None);
    let signature = sign(private_key, message_hash, &k)
        .map_err(|e| HarnessError::Signing(format!("{e}")))?;
    Ok(Signature {
        r: signature.r,
        s: signature.s,
    })
}

/// Domain-bound message builder.
#[derive(Debug, Clone)]
pub struct MessageSigner {
    domain_hash: Felt,
    prefix: Felt,
}

impl MessageSigner {
    pub fn new(domain: &SigningDomain) -> HarnessResult<Self> {
        Ok(Self {
            domain_hash: domain.hash()?,
            prefix: short_string(STARKNET_MESSAGE_PREFIX)?,
        })
    }

    pub fn domain_hash(&self) -> Felt {
        self.domain_hash
    }

    /// Wrap an argument hash with the domain and the signer's public key.
    pub fn message_hash(&self, public_key: Felt, args_hash: Felt) -> Felt {
        let elements = vec![self.prefix, self.domain_hash, public_key, args_hash];
        poseidon_hash_many(&elements)
    }

    pub fn order_message_hash(&self, public_key: Felt, order: &Order) -> Felt {
        self.message_hash(public_key, order_args_hash(order))
    }

    pub fn withdraw_message_hash(&self, public_key: Felt, args: &WithdrawArgs) -> Felt {
        self.message_hash(public_key, withdraw_args_hash(args))
    }

    pub fn sign_order(&self, keys: &KeyPair, order: &Order) -> HarnessResult<Signature> {
        let hash = self.order_message_hash(keys.public_key, order);
        tracing::debug!("Signing order of position {} (hash {:#x})", order.position_id, hash);
        sign_hash(&keys.private_key, &hash)
    }

    pub fn sign_withdraw(&self, keys: &KeyPair, args: &WithdrawArgs) -> HarnessResult<Signature> {
        let hash = self.withdraw_message_hash(keys.public_key, args);
        tracing::debug!(
            "Signing withdrawal of {} from position {} (hash {:#x})",
            args.amount,
            args.position_id,
            hash
        );
        sign_hash(&keys.private_key, &hash)
    }
}
