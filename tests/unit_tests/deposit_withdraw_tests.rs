use crate::test_utils::{FUTURE_EXPIRATION, HOLDER_BALANCE, NOW, RICH_USDC_HOLDER, felt, mock_harness};
use perpetuals_devnet::HarnessError;
use perpetuals_devnet::models::Timestamp;

#[tokio::test]
async fn test_deposit_and_withdraw() {
    let harness = mock_harness();
    let utils = &harness.utils;

    let account = utils.new_account().unwrap();
    let position_id = utils.new_position(&account).await.unwrap();

    utils.deposit(&account, 10).await.unwrap();
    assert_eq!(utils.get_position_total_value(position_id).await.unwrap(), 10);
    assert_eq!(
        harness.mock.collateral_balance(felt(RICH_USDC_HOLDER)),
        HOLDER_BALANCE - 10
    );
    assert_eq!(harness.mock.collateral_balance(account.address), 0);

    utils
        .withdraw(&account, 5, Timestamp::from_seconds(FUTURE_EXPIRATION))
        .await
        .unwrap();
    assert_eq!(utils.get_position_total_value(position_id).await.unwrap(), 5);
    assert_eq!(harness.mock.collateral_balance(account.address), 5);
}

#[tokio::test]
async fn test_deposit_is_processed_by_operator() {
    let harness = mock_harness();
    let utils = &harness.utils;

    let account = utils.new_account().unwrap();
    utils.new_position(&account).await.unwrap();
    utils.deposit(&account, 25).await.unwrap();

    let deposit = harness.mock.invocations_of("deposit_asset");
    assert_eq!(deposit.len(), 1);
    assert_eq!(deposit[0].sender, account.address);
    assert_eq!(deposit[0].operator_nonce, None);

    let processed = harness.mock.invocations_of("process_deposit");
    assert_eq!(processed.len(), 1);
    assert!(processed[0].accepted);
    assert!(processed[0].operator_nonce.is_some());
}

#[tokio::test]
async fn test_deposit_requires_position() {
    let harness = mock_harness();
    let account = harness.utils.new_account().unwrap();

    let result = harness.utils.deposit(&account, 10).await;
    assert!(matches!(result, Err(HarnessError::NoPosition(_))));
    assert!(harness.mock.invocations().is_empty());
}

#[tokio::test]
async fn test_expired_withdraw_is_rejected() {
    let harness = mock_harness();
    let utils = &harness.utils;

    let account = utils.new_account().unwrap();
    let position_id = utils.new_position(&account).await.unwrap();
    utils.deposit(&account, 10).await.unwrap();

    let result = utils
        .withdraw(&account, 5, Timestamp::from_seconds(NOW))
        .await;
    match result {
        Err(HarnessError::Reverted { reason, .. }) => assert_eq!(reason, "WITHDRAW_EXPIRED"),
        other => panic!("unexpected result: {other:?}"),
    }
    assert!(harness.mock.invocations_of("withdraw").is_empty());
    assert_eq!(utils.get_position_total_value(position_id).await.unwrap(), 10);
}

#[tokio::test]
async fn test_withdraw_more_than_collateral_fails() {
    let harness = mock_harness();
    let utils = &harness.utils;

    let account = utils.new_account().unwrap();
    let position_id = utils.new_position(&account).await.unwrap();
    utils.deposit(&account, 10).await.unwrap();

    let result = utils
        .withdraw(&account, 11, Timestamp::from_seconds(FUTURE_EXPIRATION))
        .await;
    assert!(matches!(result, Err(HarnessError::Reverted { .. })));
    assert_eq!(utils.get_position_total_value(position_id).await.unwrap(), 10);
    assert_eq!(utils.operator_nonce_cache().cached(), None);
}

#[tokio::test]
async fn test_deposit_beyond_signed_range_reverts() {
    let harness = mock_harness();
    let utils = &harness.utils;
    let amount = 1u64 << 63;
    harness
        .mock
        .mint_collateral(felt(RICH_USDC_HOLDER), u128::from(amount));

    let account = utils.new_account().unwrap();
    let position_id = utils.new_position(&account).await.unwrap();

    let result = utils.deposit(&account, amount).await;
    match result {
        Err(HarnessError::Reverted { reason, .. }) => assert_eq!(reason, "AMOUNT_OVERFLOW"),
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(utils.get_position_total_value(position_id).await.unwrap(), 0);
    assert_eq!(utils.operator_nonce_cache().cached(), None);
}

#[tokio::test]
async fn test_deposit_overflowing_collateral_reverts() {
    let harness = mock_harness();
    let utils = &harness.utils;
    let first = i64::MAX as u64;
    harness
        .mock
        .mint_collateral(felt(RICH_USDC_HOLDER), u128::from(first));

    let account = utils.new_account().unwrap();
    let position_id = utils.new_position(&account).await.unwrap();
    utils.deposit(&account, first).await.unwrap();

    let result = utils.deposit(&account, 1).await;
    assert!(matches!(
        result,
        Err(HarnessError::Reverted { ref reason, .. }) if reason == "AMOUNT_OVERFLOW"
    ));
    assert_eq!(
        utils.get_position_total_value(position_id).await.unwrap(),
        i64::MAX
    );
}
