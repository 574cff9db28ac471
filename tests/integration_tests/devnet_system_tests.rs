//! These need `starknet-devnet` on PATH, network access to the fork RPC and
//! compiled contract classes for the lifecycle scenarios. Run with
//! `cargo test --test integration_tests -- --ignored`.
//!
//! Funding scenarios also need `SYNTHETIC_ASSET_IDS` set to every synthetic
//! asset active at the fork block; a funding tick must cover all of them.
//! Set `SENTRY_DSN` to report reverted invocations.

use crate::test_utils::{FUTURE_EXPIRATION, init_test_tracing};
use perpetuals_devnet::models::{AssetId, Timestamp};
use perpetuals_devnet::services::devnet::FeeUnit;
use perpetuals_devnet::{DevnetSession, HarnessConfig};
use serial_test::serial;
use starknet::core::types::Felt;

async fn start_session() -> DevnetSession {
    init_test_tracing();
    let config = HarnessConfig::from_env().expect("invalid harness configuration");
    DevnetSession::start(config)
        .await
        .expect("failed to start devnet session")
}

#[tokio::test]
#[ignore] // Requires starknet-devnet and a mainnet fork
#[serial]
async fn test_helper_functions() {
    let session = start_session().await;
    let utils = session.utils();

    assert!(session.devnet().is_alive().await);
    assert_eq!(
        session.reports_to_sentry(),
        std::env::var("SENTRY_DSN").is_ok_and(|dsn| dsn.parse::<sentry::types::Dsn>().is_ok())
    );

    let account = utils.new_account().unwrap();
    assert_eq!(utils.get_account_address(&account), account.address);
    assert_eq!(
        utils.get_account_public_key(&account).unwrap(),
        account.keys.as_ref().unwrap().public_key
    );

    let nonce = utils.get_operator_nonce().await.unwrap();
    tracing::info!("Operator nonce at fork: {}", nonce);

    let position_id = utils.new_position(&account).await.unwrap();
    assert!(position_id.0 > 0);
    assert_eq!(utils.get_account_position_id(&account).unwrap(), position_id);

    session.shutdown().await;
}

#[tokio::test]
#[ignore] // Requires starknet-devnet and a mainnet fork
#[serial]
async fn test_view_functions() {
    let session = start_session().await;
    let utils = session.utils();

    assert_eq!(
        utils.get_collateral_asset_id().await.unwrap(),
        AssetId::from(1)
    );
    assert_ne!(
        utils.get_collateral_token_contract().await.unwrap(),
        Felt::ZERO
    );

    let active = utils.get_num_of_active_synthetic_assets().await.unwrap();
    assert!(active > 0);
    if !utils.asset_ids().is_empty() {
        assert_eq!(active, utils.asset_ids().len() as u64);
    }

    let account = utils.new_account().unwrap();
    let position_id = utils.new_position(&account).await.unwrap();
    assert_eq!(utils.get_position_total_value(position_id).await.unwrap(), 0);

    session.shutdown().await;
}

#[tokio::test]
#[ignore] // Requires starknet-devnet, a mainnet fork and RICH_USDC_HOLDER_ADDRESS
#[serial]
async fn test_deposit_withdraw() {
    let session = start_session().await;
    let utils = session.utils();

    let account = utils.new_account().unwrap();
    let position_id = utils.new_position(&account).await.unwrap();

    utils.deposit(&account, 10).await.unwrap();
    assert_eq!(utils.get_position_total_value(position_id).await.unwrap(), 10);

    utils
        .withdraw(&account, 5, Timestamp::from_seconds(FUTURE_EXPIRATION))
        .await
        .unwrap();
    assert_eq!(utils.get_position_total_value(position_id).await.unwrap(), 5);

    session.shutdown().await;
}

#[tokio::test]
#[ignore] // Requires starknet-devnet
#[serial]
async fn test_fund_account() {
    let session = start_session().await;
    let utils = session.utils();

    let account = utils.new_account().unwrap();
    let before = utils
        .get_account_balance(account.address, FeeUnit::Fri)
        .await
        .unwrap();
    let minted = utils
        .fund_account(account.address, 1_000, FeeUnit::Fri)
        .await
        .unwrap();
    assert_eq!(minted.unit, FeeUnit::Fri);

    let after = utils
        .get_account_balance(account.address, FeeUnit::Fri)
        .await
        .unwrap();
    assert_eq!(after, before + 1_000);

    session.shutdown().await;
}
