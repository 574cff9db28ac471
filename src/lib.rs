//! Devnet integration-test tooling for the Starknet perpetuals protocol.
//!
//! A [`DevnetSession`] forks mainnet into a local `starknet-devnet`,
//! impersonates the protocol's privileged accounts and hands out a
//! [`PerpetualsTestUtils`] that scenarios drive. The same utilities run
//! against a [`MockGateway`] when no devnet is available.

pub mod error;
pub mod models;
pub mod perpetuals;
pub mod services;
pub mod session;
pub mod telemetry;

pub use error::{HarnessError, HarnessResult};
pub use models::{DevnetAccount, HarnessConfig, Role};
pub use perpetuals::{PerpetualsTestUtils, TradeFill};
pub use services::gateway::{MockGateway, PerpetualsGateway, StarknetGateway};
pub use session::DevnetSession;
