use crate::test_utils::{felt, init_test_tracing};
use perpetuals_devnet::models::DevnetConfig;
use perpetuals_devnet::{DevnetSession, HarnessConfig, HarnessError};
use std::path::PathBuf;
use std::time::Duration;

fn config(binary: &str, port: u16) -> HarnessConfig {
    HarnessConfig {
        devnet: DevnetConfig {
            binary: binary.to_string(),
            port,
            fork_network: None,
            fork_block: None,
            startup_timeout: Duration::from_millis(1_500),
            ..DevnetConfig::default()
        },
        perpetuals_contract: felt(0x62da),
        operator: felt(0x48dd),
        deployer: felt(0x522e),
        app_governor: felt(0x522e),
        upgrade_governor: felt(0x522e),
        rich_usdc_holder: None,
        synthetic_asset_ids: Vec::new(),
        artifacts_dir: PathBuf::from("target/release"),
        random_seed: 0,
    }
}

#[tokio::test]
async fn test_missing_devnet_binary_is_reported() {
    init_test_tracing();
    let result = DevnetSession::start(config("starknet-devnet-does-not-exist", 59_871)).await;
    assert!(matches!(result, Err(HarnessError::DevnetProcess(_))));
}

#[cfg(unix)]
#[tokio::test]
async fn test_devnet_that_never_answers_times_out() {
    init_test_tracing();
    // `true` accepts any arguments and exits without serving RPC
    let result = DevnetSession::start(config("true", 59_872)).await;
    match result {
        Err(HarnessError::DevnetStartTimeout { url, timeout }) => {
            assert_eq!(url, "http://127.0.0.1:59872");
            assert_eq!(timeout, Duration::from_millis(1_500));
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("session started without a devnet"),
    }
}
