use crate::test_utils::{
    NOW, PERPETUALS_CONTRACT, felt, known_accounts, mock_harness, mock_harness_with_assets,
};
use perpetuals_devnet::models::{AssetId, Timestamp};
use perpetuals_devnet::{HarnessError, PerpetualsGateway, PerpetualsTestUtils};
use std::collections::HashMap;
use std::sync::Arc;

#[tokio::test]
async fn test_funding_tick_applies_diffs_and_keeps_other_indices() {
    let harness = mock_harness();
    let utils = &harness.utils;

    let diffs = HashMap::from([(AssetId::from(0x22), 3), (AssetId::from(0x33), -2)]);
    utils.funding_tick(&diffs).await.unwrap();

    assert_eq!(harness.mock.funding_index(AssetId::from(0x11)), Some(5));
    assert_eq!(harness.mock.funding_index(AssetId::from(0x22)), Some(-4));
    assert_eq!(harness.mock.funding_index(AssetId::from(0x33)), Some(-2));
    assert_eq!(
        harness.mock.last_funding_tick(),
        Some(Timestamp::from_seconds(NOW))
    );

    let ticks = harness.mock.invocations_of("funding_tick");
    assert_eq!(ticks.len(), 1);
    assert!(ticks[0].accepted);
}

#[tokio::test]
async fn test_funding_tick_without_diffs_resubmits_current_indices() {
    let harness = mock_harness();

    harness.utils.funding_tick(&HashMap::new()).await.unwrap();

    assert_eq!(harness.mock.funding_index(AssetId::from(0x11)), Some(5));
    assert_eq!(harness.mock.funding_index(AssetId::from(0x22)), Some(-7));
    assert_eq!(harness.mock.funding_index(AssetId::from(0x33)), Some(0));
}

#[tokio::test]
async fn test_funding_tick_aborts_when_an_index_is_unreadable() {
    let harness = mock_harness();
    harness.mock.fail_timely_data(AssetId::from(0x33));

    let diffs = HashMap::from([(AssetId::from(0x11), 1)]);
    let result = harness.utils.funding_tick(&diffs).await;

    match result {
        Err(HarnessError::FundingIndexCountMismatch { expected, actual }) => {
            assert_eq!(expected, 3);
            assert_eq!(actual, 2);
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(harness.mock.invocations_of("funding_tick").is_empty());
    assert_eq!(harness.mock.funding_index(AssetId::from(0x11)), Some(5));
    assert_eq!(harness.mock.last_funding_tick(), None);
}

#[tokio::test]
async fn test_funding_tick_covers_newly_activated_asset() {
    let harness = mock_harness();
    let utils = &harness.utils;

    // Active on the ledger but not yet mirrored locally
    harness.mock.add_active_asset(AssetId::from(0x44), 10, 1);
    let result = utils.funding_tick(&HashMap::new()).await;
    assert!(matches!(
        result,
        Err(HarnessError::FundingIndexCountMismatch {
            expected: 4,
            actual: 3
        })
    ));
}

#[tokio::test]
async fn test_funding_tick_without_local_asset_ids_is_config_error() {
    let harness = mock_harness();
    let gateway: Arc<dyn PerpetualsGateway> = harness.mock.clone();
    let utils = PerpetualsTestUtils::new(gateway, felt(PERPETUALS_CONTRACT), known_accounts())
        .unwrap()
        .with_now(Timestamp::from_seconds(NOW));
    assert!(utils.asset_ids().is_empty());

    match utils.funding_tick(&HashMap::new()).await {
        Err(HarnessError::Config(message)) => {
            assert!(message.contains("SYNTHETIC_ASSET_IDS"), "{message}");
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(harness.mock.invocations_of("funding_tick").is_empty());
    assert_eq!(harness.mock.last_funding_tick(), None);
}

#[tokio::test]
async fn test_funding_tick_with_no_active_assets() {
    let harness = mock_harness_with_assets(&[]);

    harness.utils.funding_tick(&HashMap::new()).await.unwrap();
    assert_eq!(
        harness.mock.last_funding_tick(),
        Some(Timestamp::from_seconds(NOW))
    );
}
