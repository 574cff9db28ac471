//! Shared fixtures for the harness test suites.
//!
//! [`mock_harness`] wires a [`PerpetualsTestUtils`] to an in-memory
//! [`MockGateway`] seeded like a mainnet fork: a collateral asset, a set of
//! active synthetic assets, a rich collateral holder and a pool of fresh
//! signing accounts.

#![allow(dead_code)]

use once_cell::sync::Lazy;
use perpetuals_devnet::models::{DevnetAccount, KeyPair, KnownAccounts, Role};
use perpetuals_devnet::models::{AssetId, Timestamp};
use perpetuals_devnet::telemetry::init_tracing;
use perpetuals_devnet::{MockGateway, PerpetualsGateway, PerpetualsTestUtils};
use starknet::core::types::Felt;
use std::sync::Arc;

pub const PERPETUALS_CONTRACT: u64 = 0x62da;
pub const OPERATOR: u64 = 0x48dd;
pub const APP_GOVERNOR: u64 = 0x522e;
pub const UPGRADE_GOVERNOR: u64 = 0x522f;
pub const RICH_USDC_HOLDER: u64 = 0x0bad;

/// Block timestamp of the mock ledger.
pub const NOW: u64 = 1_700_000_000;
/// Comfortably after [`NOW`].
pub const FUTURE_EXPIRATION: u64 = 3_765_971_800;
pub const HOLDER_BALANCE: u128 = 1_000_000_000;
pub const POOL_SIZE: u64 = 10;

static TRACING: Lazy<()> = Lazy::new(init_tracing);

pub fn init_test_tracing() {
    Lazy::force(&TRACING);
}

pub fn felt(value: u64) -> Felt {
    Felt::from(value)
}

/// A signing account with deterministic keys.
pub fn signing_account(index: u64) -> DevnetAccount {
    let keys = KeyPair::from_private_key(Felt::from(0x5eed_0000 + index));
    DevnetAccount::with_keys(Felt::from(0xacc0_0000 + index), keys)
}

pub fn known_accounts() -> KnownAccounts {
    KnownAccounts::new()
        .with(Role::Operator, DevnetAccount::impersonated(felt(OPERATOR)))
        .with(
            Role::AppGovernor,
            DevnetAccount::impersonated(felt(APP_GOVERNOR)),
        )
        .with(
            Role::UpgradeGovernor,
            DevnetAccount::impersonated(felt(UPGRADE_GOVERNOR)),
        )
        .with(
            Role::RichUsdcHolder,
            DevnetAccount::impersonated(felt(RICH_USDC_HOLDER)),
        )
}

pub struct MockHarness {
    pub mock: Arc<MockGateway>,
    pub utils: PerpetualsTestUtils,
}

/// Active synthetic assets of the default harness: `(id, price, funding index)`.
pub const DEFAULT_ASSETS: &[(u32, u128, i64)] = &[(0x11, 100, 5), (0x22, 2_000, -7), (0x33, 50, 0)];

pub fn mock_harness() -> MockHarness {
    mock_harness_with_assets(DEFAULT_ASSETS)
}

pub fn mock_harness_with_assets(assets: &[(u32, u128, i64)]) -> MockHarness {
    init_test_tracing();

    let mock = Arc::new(MockGateway::new(felt(PERPETUALS_CONTRACT)).unwrap());
    mock.set_timestamp(NOW);
    mock.set_operator_nonce(100);
    mock.mint_collateral(felt(RICH_USDC_HOLDER), HOLDER_BALANCE);
    for (id, price, funding_index) in assets {
        mock.add_active_asset(AssetId::from(*id), *price, *funding_index);
    }

    let gateway: Arc<dyn PerpetualsGateway> = mock.clone();
    let utils = PerpetualsTestUtils::new(gateway, felt(PERPETUALS_CONTRACT), known_accounts())
        .unwrap()
        .with_account_pool((0..POOL_SIZE).map(signing_account).collect())
        .with_asset_ids(assets.iter().map(|(id, _, _)| AssetId::from(*id)).collect())
        .with_random_seed(7)
        .with_now(Timestamp::from_seconds(NOW));

    MockHarness { mock, utils }
}
