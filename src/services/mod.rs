pub mod artifacts;
pub mod devnet;
pub mod funding;
pub mod gateway;
pub mod nonce;
pub mod retry;
pub mod rng;
pub mod signing;

pub use artifacts::ContractArtifact;
pub use devnet::{DevnetClient, DevnetProcess, FeeUnit};
pub use gateway::{MockGateway, PerpetualsGateway, StarknetGateway};
pub use nonce::{NonceSource, OperatorNonce};
pub use retry::{BoundedRetry, RetryExhausted};
pub use rng::HarnessRng;
pub use signing::{MessageSigner, SigningDomain, WithdrawArgs};
