// src/backend/services/allocation.rs
// Picks one available promotional code for a tester and commits it with a
// compare-and-set redemption before anyone is told about it.

use crate::error::SignupError;
use crate::models::{PromotionalCode, Timestamp};
use crate::storage::CodePool;
use crate::{log_error, log_info, log_warn};

/// Upper bound on find-then-redeem rounds when other testers keep winning the race.
pub const MAX_ALLOCATION_ATTEMPTS: u32 = 3;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AllocationReport {
    /// The committed code, or `None` when the pool had nothing to give.
    pub code: Option<PromotionalCode>,
    /// Rounds lost to a concurrent redemption.
    pub lost_races: u32,
}

/// Assigns exactly one code to `email`, or none if the pool is exhausted.
///
/// The redemption write is the commit point. A store failure during redemption is
/// returned as an error and the candidate code is never reported to the caller.
pub fn allocate_code<P: CodePool>(
    pool: &mut P,
    app_id: &str,
    email: &str,
    now: Timestamp,
) -> Result<AllocationReport, SignupError> {
    let mut lost_races = 0;

    for attempt in 1..=MAX_ALLOCATION_ATTEMPTS {
        let Some(candidate) = pool.find_one_available(app_id) else {
            log_info!("🎟️ No promotional code available for {} in app {}", email, app_id);
            return Ok(AllocationReport { code: None, lost_races });
        };

        match pool.redeem(candidate.id, email, app_id, now) {
            Ok(redeemed) => {
                log_info!(
                    "🎟️ Promotional code {} of app {} redeemed by {} (attempt {})",
                    redeemed.id, app_id, email, attempt
                );
                return Ok(AllocationReport { code: Some(redeemed), lost_races });
            }
            Err(SignupError::RedemptionConflict(code_id)) => {
                lost_races += 1;
                log_warn!(
                    "Lost redemption race for code {} of app {} (attempt {}/{})",
                    code_id, app_id, attempt, MAX_ALLOCATION_ATTEMPTS
                );
            }
            Err(e) => {
                log_error!(
                    "Redeeming code {} of app {} for {} failed: {}",
                    candidate.id, app_id, email, e
                );
                return Err(e);
            }
        }
    }

    log_warn!(
        "Giving up allocation for {} in app {} after {} lost races",
        email, app_id, lost_races
    );
    Ok(AllocationReport { code: None, lost_races })
}
