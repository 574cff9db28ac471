//! Local devnet lifecycle: process management, readiness gating and the
//! admin JSON-RPC methods (minting, balances, impersonation).

pub mod client;
pub mod process;

pub use client::{DevnetClient, FeeUnit, MintResponse, PredeployedAccount, READINESS_POLL_INTERVAL};
pub use process::DevnetProcess;
