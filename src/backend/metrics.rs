// src/backend/metrics.rs
use crate::log_warn;
use crate::storage::metrics::MetricsCell;
use candid::CandidType;
use ic_stable_structures::Memory;
use serde::{Deserialize, Serialize};

/// Lifetime counters for the canister.
#[derive(CandidType, Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct SignupMetrics {
    pub apps_registered: u64,
    pub apps_deleted: u64,
    pub testers_registered: u64,
    pub codes_added: u64,
    pub codes_redeemed: u64,
    /// Redemptions that found their code already taken and had to retry.
    pub redemption_races_lost: u64,
    pub group_adds_succeeded: u64,
    pub group_adds_failed: u64,
    /// Codes redeemed but never written onto a tester record.
    pub codes_lost: u64,
}

/// Counter updates never fail the request that triggered them.
pub fn record<M: Memory>(cell: &mut MetricsCell<M>, update_fn: impl FnOnce(&mut SignupMetrics)) {
    if let Err(e) = cell.update(update_fn) {
        log_warn!("Metrics update skipped: {}", e);
    }
}
