//! Funding-index reconstruction.
//!
//! `funding_tick` replaces the funding index of every active synthetic asset
//! at once, so the harness reads all current indices, checks it has seen
//! every active asset and rebuilds the full vector with the requested diffs
//! applied.

use futures::future::join_all;
use starknet::core::types::Felt;
use std::collections::HashMap;

use crate::error::{HarnessError, HarnessResult};
use crate::models::protocol::{AssetId, AssetTimelyData, FundingIndex, FundingTick, ViewCall};
use crate::services::gateway::PerpetualsGateway;

/// Read the funding index of every asset concurrently.
///
/// Assets whose read fails are logged and left out; the caller detects the
/// gap through [`check_active_count`].
pub async fn fetch_funding_indices(
    gateway: &dyn PerpetualsGateway,
    contract: Felt,
    asset_ids: &[AssetId],
) -> HashMap<AssetId, i64> {
    let reads = asset_ids.iter().map(|asset_id| async move {
        let view = ViewCall::GetTimelyData(*asset_id);
        let result = match gateway.call(contract, &view).await {
            Ok(words) => AssetTimelyData::decode(&view, &words),
            Err(e) => Err(e),
        };
        (*asset_id, result)
    });

    join_all(reads)
        .await
        .into_iter()
        .filter_map(|(asset_id, result)| match result {
            Ok(data) => Some((asset_id, data.funding_index.value)),
            Err(e) => {
                tracing::warn!("Error fetching funding index for asset {}: {}", asset_id, e);
                None
            }
        })
        .collect()
}

/// The fetched indices must cover exactly the remote active-asset count.
pub fn check_active_count(fetched: usize, active: u64) -> HarnessResult<()> {
    if fetched as u64 != active {
        tracing::error!(
            "Failed to get all funding indices: expected {}, got {}",
            active,
            fetched
        );
        return Err(HarnessError::FundingIndexCountMismatch {
            expected: active,
            actual: fetched as u64,
        });
    }
    Ok(())
}

/// Build the replacement funding vector in the order of `asset_ids`.
///
/// Assets in `diffs` get `current + diff`, all others keep `current`.
/// `asset_ids` must be sorted; the contract rejects unordered ticks.
pub fn rebuild_funding_ticks(
    asset_ids: &[AssetId],
    current: &HashMap<AssetId, i64>,
    diffs: &HashMap<AssetId, i64>,
) -> HarnessResult<Vec<FundingTick>> {
    asset_ids
        .iter()
        .map(|asset_id| {
            let old = current.get(asset_id).copied().ok_or(
                HarnessError::FundingIndexCountMismatch {
                    expected: asset_ids.len() as u64,
                    actual: current.len() as u64,
                },
            )?;
            let value = match diffs.get(asset_id) {
                Some(diff) => old.checked_add(*diff).ok_or_else(|| {
                    HarnessError::Encoding(format!(
                        "funding index of {asset_id} overflows: {old} + {diff}"
                    ))
                })?,
                None => old,
            };
            Ok(FundingTick {
                asset_id: *asset_id,
                funding_index: FundingIndex { value },
            })
        })
        .collect()
}
