//! Contract access seam.
//!
//! Everything the harness does on-chain goes through [`PerpetualsGateway`]:
//! [`StarknetGateway`] talks to a live devnet, [`MockGateway`] keeps an
//! in-memory model of the protocol for tests that must not spawn one.

use async_trait::async_trait;
use starknet::core::types::Felt;

use crate::error::HarnessResult;
use crate::models::account::DevnetAccount;
use crate::models::protocol::{Invocation, ViewCall};
use crate::services::artifacts::ContractArtifact;

pub mod mock;
pub mod rpc;

pub use mock::{MockGateway, RecordedInvoke};
pub use rpc::{RECEIPT_POLL_INTERVAL, RECEIPT_TIMEOUT, StarknetGateway};

#[async_trait]
pub trait PerpetualsGateway: Send + Sync {
    /// Read-only call; returns the raw result words.
    async fn call(&self, contract: Felt, view: &ViewCall) -> HarnessResult<Vec<Felt>>;

    /// Send `invocation` to `target` from `sender` and wait until it is
    /// accepted. Returns the transaction hash.
    async fn invoke(
        &self,
        sender: &DevnetAccount,
        target: Felt,
        invocation: &Invocation,
    ) -> HarnessResult<Felt>;

    /// Declare a contract class. Returns its class hash.
    async fn declare(
        &self,
        sender: &DevnetAccount,
        artifact: &ContractArtifact,
    ) -> HarnessResult<Felt>;

    /// Deploy an instance of a declared class through the universal
    /// deployer. Returns its address.
    async fn deploy(
        &self,
        sender: &DevnetAccount,
        class_hash: Felt,
        constructor_calldata: &[Felt],
        salt: Felt,
    ) -> HarnessResult<Felt>;
}
