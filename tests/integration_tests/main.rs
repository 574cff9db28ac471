// Devnet process and live forked-devnet scenarios

#[path = "../test_utils/mod.rs"]
mod test_utils;

mod devnet_system_tests;
mod session_startup_tests;
