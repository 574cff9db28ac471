pub mod account;
pub mod config;
pub mod protocol;

pub use account::{DevnetAccount, KeyPair, KnownAccounts, Role};
pub use config::{DevnetConfig, HarnessConfig, ResourceBounds};
pub use protocol::{
    AssetId, AssetTimelyData, CairoSerialize, EicData, FundingIndex, FundingTick,
    ImplementationData, Invocation, Order, PositionId, PositionTvTr, RiskFactorConfig, Signature,
    SignedPrice, Timestamp, ViewCall,
};
