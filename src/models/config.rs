use starknet::core::types::Felt;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{HarnessError, HarnessResult};
use crate::models::protocol::AssetId;

/// Mainnet perpetuals contract.
pub const PERPETUALS_CONTRACT_ADDRESS: &str =
    "0x062da0780fae50d68cecaa5a051606dc21217ba290969b302db4dd99d2e9b470";
/// Mainnet operator account.
pub const OPERATOR_ADDRESS: &str =
    "0x048ddc53f41523d2a6b40c3dff7f69f4bbac799cd8b2e3fc50d3de1d4119441f";
/// Mainnet deployer account.
pub const DEPLOYER_ADDRESS: &str =
    "0x0522e5ba327bfbd85138b29bde060a5340a460706b00ae2e10e6d2a16fbf8c57";

pub const DEFAULT_FORK_NETWORK: &str = "https://rpc.starknet.lava.build/";
pub const DEFAULT_FORK_BLOCK: u64 = 1_844_544;

/// Resource ceilings used for declare and deploy transactions, which are not
/// auto-estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceBounds {
    pub max_amount: u64,
    pub max_price_per_unit: u128,
}

pub const DECLARE_RESOURCE_BOUNDS: ResourceBounds = ResourceBounds {
    max_amount: 500_000,
    max_price_per_unit: 100_000_000_000_000,
};

/// Devnet process and fork settings
#[derive(Debug, Clone)]
pub struct DevnetConfig {
    pub binary: String,
    pub host: String,
    pub port: u16,
    pub seed: u64,
    pub accounts: u32,
    pub fork_network: Option<String>,
    pub fork_block: Option<u64>,
    pub startup_timeout: Duration,
}

impl DevnetConfig {
    pub fn rpc_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

impl Default for DevnetConfig {
    fn default() -> Self {
        Self {
            binary: "starknet-devnet".to_string(),
            host: "127.0.0.1".to_string(),
            port: 5050,
            seed: 0,
            accounts: 10,
            fork_network: Some(DEFAULT_FORK_NETWORK.to_string()),
            fork_block: Some(DEFAULT_FORK_BLOCK),
            startup_timeout: Duration::from_secs(60),
        }
    }
}

/// Full harness configuration.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    pub devnet: DevnetConfig,
    pub perpetuals_contract: Felt,
    pub operator: Felt,
    pub deployer: Felt,
    pub app_governor: Felt,
    pub upgrade_governor: Felt,
    pub rich_usdc_holder: Option<Felt>,
    /// Active synthetic assets at the fork block
    pub synthetic_asset_ids: Vec<AssetId>,
    pub artifacts_dir: PathBuf,
    pub random_seed: u64,
}

impl HarnessConfig {
    /// Load configuration from `.env` and environment variables
    pub fn from_env() -> HarnessResult<Self> {
        dotenvy::dotenv().ok();

        let defaults = DevnetConfig::default();
        let devnet = DevnetConfig {
            binary: env::var("DEVNET_BIN").unwrap_or(defaults.binary),
            host: env::var("DEVNET_HOST").unwrap_or(defaults.host),
            port: parse_var("DEVNET_PORT")?.unwrap_or(defaults.port),
            seed: parse_var("DEVNET_SEED")?.unwrap_or(defaults.seed),
            accounts: parse_var("DEVNET_ACCOUNTS")?.unwrap_or(defaults.accounts),
            fork_network: match non_empty_var("FORK_NETWORK") {
                Some(url) if url.eq_ignore_ascii_case("none") => None,
                Some(url) => Some(url),
                None => defaults.fork_network,
            },
            fork_block: parse_var("FORK_BLOCK")?.or(defaults.fork_block),
            startup_timeout: parse_var("DEVNET_STARTUP_TIMEOUT_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.startup_timeout),
        };

        let deployer = felt_var("DEPLOYER_ADDRESS")?.unwrap_or(parse_felt(DEPLOYER_ADDRESS)?);

        let synthetic_asset_ids = match non_empty_var("SYNTHETIC_ASSET_IDS") {
            Some(list) => parse_asset_ids(&list)?,
            None => Vec::new(),
        };
        if synthetic_asset_ids.is_empty() && devnet.fork_network.is_some() {
            tracing::warn!("SYNTHETIC_ASSET_IDS is unset; funding ticks on the fork will fail");
        }

        Ok(Self {
            devnet,
            perpetuals_contract: felt_var("PERPETUALS_CONTRACT_ADDRESS")?
                .unwrap_or(parse_felt(PERPETUALS_CONTRACT_ADDRESS)?),
            operator: felt_var("OPERATOR_ADDRESS")?.unwrap_or(parse_felt(OPERATOR_ADDRESS)?),
            deployer,
            app_governor: felt_var("APP_GOVERNOR_ADDRESS")?.unwrap_or(deployer),
            upgrade_governor: felt_var("UPGRADE_GOVERNOR_ADDRESS")?.unwrap_or(deployer),
            rich_usdc_holder: felt_var("RICH_USDC_HOLDER_ADDRESS")?,
            synthetic_asset_ids,
            artifacts_dir: non_empty_var("ARTIFACTS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("target").join("release")),
            random_seed: parse_var("RANDOM_SEED")?.unwrap_or(0),
        })
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T>(name: &str) -> HarnessResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    non_empty_var(name)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| HarnessError::Config(format!("invalid {name} '{raw}': {e}")))
        })
        .transpose()
}

pub fn parse_felt(raw: &str) -> HarnessResult<Felt> {
    Felt::from_hex(raw).map_err(|e| HarnessError::Config(format!("invalid felt '{raw}': {e}")))
}

fn felt_var(name: &str) -> HarnessResult<Option<Felt>> {
    non_empty_var(name).map(|raw| parse_felt(&raw)).transpose()
}

/// Parse a comma-separated list of hex asset ids, returned sorted.
pub fn parse_asset_ids(list: &str) -> HarnessResult<Vec<AssetId>> {
    let mut ids = list
        .split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(|id| parse_felt(id).map(AssetId))
        .collect::<HarnessResult<Vec<_>>>()?;
    ids.sort();
    ids.dedup();
    Ok(ids)
}
