// src/backend/utils/guards.rs
use crate::storage::{canister_store, CanisterMemory, ConfigCell};
use crate::log_warn;
use candid::Principal;
use ic_cdk::api::canister_balance128;

// Every Group API call is an HTTP outcall paid for in cycles.
const MIN_CYCLES_THRESHOLD: u128 = 10_000_000_000;

fn caller_is(check: impl FnOnce(&ConfigCell<CanisterMemory>, &Principal) -> bool) -> Result<bool, String> {
    let caller = ic_cdk::caller();
    let store = canister_store().map_err(|e| e.to_string())?;
    let allowed = check(&store.borrow().config, &caller);
    Ok(allowed)
}

/// Caller must be the web gateway that forwards signed-in sessions.
pub fn gateway_guard() -> Result<(), String> {
    if caller_is(|config, caller| config.is_gateway(caller))? {
        Ok(())
    } else {
        Err(format!("Caller {} is not the gateway", ic_cdk::caller()))
    }
}

pub fn admin_guard() -> Result<(), String> {
    if is_admin_caller()? {
        Ok(())
    } else {
        Err(format!("Caller {} is not an admin", ic_cdk::caller()))
    }
}

pub fn gateway_or_admin_guard() -> Result<(), String> {
    gateway_guard().or_else(|_| admin_guard())
}

/// Gateway endpoints that may reach the Group API.
pub fn gateway_outcall_guard() -> Result<(), String> {
    gateway_guard()?;
    check_cycles()
}

pub fn is_admin_caller() -> Result<bool, String> {
    caller_is(|config, caller| config.is_admin(caller))
}

/// Checks if the canister has enough cycles left for HTTP outcalls.
pub fn check_cycles() -> Result<(), String> {
    let balance = canister_balance128();
    if balance < MIN_CYCLES_THRESHOLD {
        log_warn!(
            "Cycle balance low: {} cycles, threshold: {}",
            balance, MIN_CYCLES_THRESHOLD
        );
        Err("Canister cycle balance too low".to_string())
    } else {
        Ok(())
    }
}
