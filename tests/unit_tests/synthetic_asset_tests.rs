use crate::test_utils::{NOW, mock_harness};
use perpetuals_devnet::HarnessError;
use perpetuals_devnet::models::protocol::short_string;
use perpetuals_devnet::models::{AssetId, RiskFactorConfig};
use std::collections::HashMap;

fn risk_factor() -> RiskFactorConfig {
    RiskFactorConfig {
        tiers: vec![50, 100, 200],
        first_tier_boundary: 1_000_000,
        tier_size: 100_000,
    }
}

#[tokio::test]
async fn test_add_synthetic_asset_and_price_tick() {
    let harness = mock_harness();
    let utils = &harness.utils;

    let asset_id = utils
        .add_synthetic_asset(risk_factor(), 1, 1_000_000)
        .await
        .unwrap();
    let asset_ids = utils.asset_ids();
    assert!(asset_ids.contains(&asset_id));
    assert!(asset_ids.windows(2).all(|pair| pair[0] < pair[1]));
    // Registered but inactive until its first price tick
    assert_eq!(utils.get_num_of_active_synthetic_assets().await.unwrap(), 3);

    let oracle = utils.new_account().unwrap();
    let oracle_name = short_string("ORCL").unwrap();
    let asset_name = short_string("BTC-USD").unwrap();
    utils
        .add_oracle_to_asset(asset_id, oracle.public_key().unwrap(), oracle_name, asset_name)
        .await
        .unwrap();
    assert_eq!(harness.mock.oracle_count(asset_id), 1);

    let signed = utils
        .create_signed_price(&oracle, 42_000, NOW as u32, asset_name, oracle_name)
        .unwrap();
    utils.price_tick(asset_id, 42_000, vec![signed]).await.unwrap();

    assert_eq!(utils.get_num_of_active_synthetic_assets().await.unwrap(), 4);
    let timely = utils.get_asset_timely_data(asset_id).await.unwrap();
    assert_eq!(timely.price, 42_000);
    assert_eq!(timely.last_price_update.seconds, NOW);

    // The new asset takes part in funding ticks
    let diffs = HashMap::from([(asset_id, 11)]);
    utils.funding_tick(&diffs).await.unwrap();
    assert_eq!(harness.mock.funding_index(asset_id), Some(11));
    assert_eq!(harness.mock.funding_index(AssetId::from(0x11)), Some(5));
}

#[tokio::test]
async fn test_price_tick_from_unregistered_oracle_is_rejected() {
    let harness = mock_harness();
    let utils = &harness.utils;

    let asset_id = utils
        .add_synthetic_asset(risk_factor(), 1, 1_000_000)
        .await
        .unwrap();
    let oracle = utils.new_account().unwrap();
    let asset_name = short_string("ETH-USD").unwrap();
    let oracle_name = short_string("ORCL").unwrap();

    let signed = utils
        .create_signed_price(&oracle, 3_000, NOW as u32, asset_name, oracle_name)
        .unwrap();
    let result = utils.price_tick(asset_id, 3_000, vec![signed]).await;

    match result {
        Err(HarnessError::Reverted { reason, .. }) => assert_eq!(reason, "ORACLE_NOT_EXISTS"),
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(utils.operator_nonce_cache().cached(), None);
    assert_eq!(utils.get_num_of_active_synthetic_assets().await.unwrap(), 3);
}

#[tokio::test]
async fn test_price_tick_signed_for_other_asset_is_rejected() {
    let harness = mock_harness();
    let utils = &harness.utils;

    let asset_id = utils
        .add_synthetic_asset(risk_factor(), 1, 1_000_000)
        .await
        .unwrap();
    let oracle = utils.new_account().unwrap();
    let oracle_name = short_string("ORCL").unwrap();
    utils
        .add_oracle_to_asset(
            asset_id,
            oracle.public_key().unwrap(),
            oracle_name,
            short_string("BTC-USD").unwrap(),
        )
        .await
        .unwrap();

    let signed = utils
        .create_signed_price(
            &oracle,
            3_000,
            NOW as u32,
            short_string("ETH-USD").unwrap(),
            oracle_name,
        )
        .unwrap();
    let result = utils.price_tick(asset_id, 3_000, vec![signed]).await;
    assert!(matches!(
        result,
        Err(HarnessError::Reverted { ref reason, .. }) if reason == "INVALID_ORACLE_SIGNATURE"
    ));
}

#[tokio::test]
async fn test_price_tick_below_quorum_is_rejected() {
    let harness = mock_harness();
    let utils = &harness.utils;

    let asset_id = utils
        .add_synthetic_asset(risk_factor(), 2, 1_000_000)
        .await
        .unwrap();
    let oracle = utils.new_account().unwrap();
    let oracle_name = short_string("ORCL").unwrap();
    let asset_name = short_string("SOL-USD").unwrap();
    utils
        .add_oracle_to_asset(asset_id, oracle.public_key().unwrap(), oracle_name, asset_name)
        .await
        .unwrap();

    let signed = utils
        .create_signed_price(&oracle, 150, NOW as u32, asset_name, oracle_name)
        .unwrap();
    let result = utils.price_tick(asset_id, 150, vec![signed]).await;
    assert!(matches!(
        result,
        Err(HarnessError::Reverted { ref reason, .. }) if reason == "QUORUM_NOT_REACHED"
    ));
}

#[tokio::test]
async fn test_failed_registration_leaves_mirror_untouched() {
    let harness = mock_harness();
    let utils = &harness.utils;
    harness.mock.fail_invokes("add_synthetic_asset", 1);

    let result = utils.add_synthetic_asset(risk_factor(), 1, 1_000_000).await;
    match result {
        Err(HarnessError::SyntheticAsset { last, .. }) => {
            assert!(matches!(*last, HarnessError::Invoke { .. }))
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(utils.asset_ids().len(), 3);
}

#[tokio::test]
async fn test_duplicate_oracle_is_rejected() {
    let harness = mock_harness();
    let utils = &harness.utils;

    let asset_id = utils
        .add_synthetic_asset(risk_factor(), 1, 1_000_000)
        .await
        .unwrap();
    let oracle = utils.new_account().unwrap();
    let public_key = oracle.public_key().unwrap();
    let oracle_name = short_string("ORCL").unwrap();
    let asset_name = short_string("BTC-USD").unwrap();

    utils
        .add_oracle_to_asset(asset_id, public_key, oracle_name, asset_name)
        .await
        .unwrap();
    let result = utils
        .add_oracle_to_asset(asset_id, public_key, oracle_name, asset_name)
        .await;
    assert!(matches!(result, Err(HarnessError::Reverted { .. })));
    assert_eq!(harness.mock.oracle_count(asset_id), 1);
}
