use crate::test_utils::{POOL_SIZE, mock_harness, signing_account};
use perpetuals_devnet::HarnessError;
use perpetuals_devnet::models::{AssetId, PositionId};

#[tokio::test]
async fn test_helper_functions() {
    let harness = mock_harness();
    let utils = &harness.utils;

    let account = utils.new_account().unwrap();
    assert_eq!(account, signing_account(0));
    assert_eq!(utils.get_account_address(&account), account.address);
    assert_eq!(
        utils.get_account_public_key(&account).unwrap(),
        account.keys.as_ref().unwrap().public_key
    );

    let nonce = utils.get_operator_nonce().await.unwrap();
    assert_eq!(nonce, 100);

    let position_id = utils.new_position(&account).await.unwrap();
    assert!(position_id.0 > 0);
    assert_eq!(utils.get_account_position_id(&account).unwrap(), position_id);
    assert_eq!(harness.mock.position_owner(position_id), Some(account.address));
}

#[tokio::test]
async fn test_view_functions() {
    let harness = mock_harness();
    let utils = &harness.utils;

    assert_eq!(
        utils.get_collateral_asset_id().await.unwrap(),
        AssetId::from(1)
    );
    assert_eq!(
        utils.get_collateral_token_contract().await.unwrap(),
        harness.mock.collateral_token()
    );
    assert_eq!(utils.get_num_of_active_synthetic_assets().await.unwrap(), 3);

    let account = utils.new_account().unwrap();
    let position_id = utils.new_position(&account).await.unwrap();
    assert_eq!(utils.get_position_total_value(position_id).await.unwrap(), 0);

    let timely = utils
        .get_asset_timely_data(AssetId::from(0x22))
        .await
        .unwrap();
    assert_eq!(timely.price, 2_000);
    assert_eq!(timely.funding_index.value, -7);
}

#[tokio::test]
async fn test_accounts_are_handed_out_in_order_until_exhausted() {
    let harness = mock_harness();
    let utils = &harness.utils;

    for index in 0..POOL_SIZE {
        assert_eq!(utils.new_account().unwrap(), signing_account(index));
    }
    match utils.new_account() {
        Err(HarnessError::AccountPoolExhausted(size)) => assert_eq!(size, POOL_SIZE as usize),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_account_without_position() {
    let harness = mock_harness();
    let account = harness.utils.new_account().unwrap();

    assert!(matches!(
        harness.utils.get_account_position_id(&account),
        Err(HarnessError::NoPosition(address)) if address == account.address
    ));
    assert!(
        harness
            .utils
            .get_position_total_value(PositionId(424_242))
            .await
            .is_err()
    );
}
