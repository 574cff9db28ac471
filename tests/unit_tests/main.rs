// Façade scenarios against the in-memory gateway

#[path = "../test_utils/mod.rs"]
mod test_utils;

mod account_tests;
mod deposit_withdraw_tests;
mod funding_tick_tests;
mod position_allocation_tests;
mod synthetic_asset_tests;
