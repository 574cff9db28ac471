use crate::test_utils::mock_harness;
use perpetuals_devnet::HarnessError;
use perpetuals_devnet::perpetuals::DEFAULT_POSITION_ATTEMPTS;

#[tokio::test]
async fn test_new_position_gives_up_after_bounded_attempts() {
    let harness = mock_harness();
    let utils = &harness.utils;
    harness.mock.fail_invokes("new_position", u32::MAX);

    let account = utils.new_account().unwrap();
    let result = utils.new_position(&account).await;

    match result {
        Err(HarnessError::PositionAllocation { attempts, last }) => {
            assert_eq!(attempts, DEFAULT_POSITION_ATTEMPTS);
            assert!(matches!(*last, HarnessError::Invoke { .. }));
        }
        other => panic!("unexpected result: {other:?}"),
    }
    assert_eq!(
        harness.mock.invocations_of("new_position").len(),
        DEFAULT_POSITION_ATTEMPTS as usize
    );
    assert!(matches!(
        utils.get_account_position_id(&account),
        Err(HarnessError::NoPosition(_))
    ));
}

#[tokio::test]
async fn test_new_position_recovers_from_transient_failures() {
    let harness = mock_harness();
    let utils = &harness.utils;
    harness.mock.fail_invokes("new_position", 2);

    let account = utils.new_account().unwrap();
    let position_id = utils.new_position(&account).await.unwrap();

    let attempts = harness.mock.invocations_of("new_position");
    assert_eq!(attempts.len(), 3);
    assert!(attempts[..2].iter().all(|attempt| !attempt.accepted));
    assert!(attempts[2].accepted);
    // Every attempt re-read the nonce after the previous failure
    assert!(
        attempts
            .iter()
            .all(|attempt| attempt.operator_nonce == Some(100))
    );
    assert_eq!(harness.mock.position_owner(position_id), Some(account.address));
    assert_eq!(utils.get_account_position_id(&account).unwrap(), position_id);
}

#[tokio::test]
async fn test_zero_attempts_still_tries_once() {
    let harness = mock_harness();
    let utils = &harness.utils;
    harness.mock.fail_invokes("new_position", u32::MAX);

    let account = utils.new_account().unwrap();
    let result = utils.new_position_with_attempts(&account, 0).await;

    assert!(matches!(
        result,
        Err(HarnessError::PositionAllocation { attempts: 1, .. })
    ));
    assert_eq!(harness.mock.invocations_of("new_position").len(), 1);
}

#[tokio::test]
async fn test_positions_get_distinct_ids() {
    let harness = mock_harness();
    let utils = &harness.utils;

    let mut ids = Vec::new();
    for _ in 0..5 {
        let account = utils.new_account().unwrap();
        ids.push(utils.new_position(&account).await.unwrap());
    }
    let mut unique = ids.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), ids.len());
}

#[tokio::test]
async fn test_impersonated_account_cannot_open_position() {
    let harness = mock_harness();
    let operator = harness
        .utils
        .known_accounts()
        .get(perpetuals_devnet::Role::Operator)
        .unwrap()
        .clone();

    let result = harness.utils.new_position(&operator).await;
    assert!(matches!(result, Err(HarnessError::MissingKey(_))));
    assert!(harness.mock.invocations().is_empty());
}
