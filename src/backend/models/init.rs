// src/backend/models/init.rs
use candid::{CandidType, Principal};
use serde::{Deserialize, Serialize};

#[derive(CandidType, Deserialize, Debug)]
pub struct InitArgs {
    /// Web tier that performs Google sign-in and forwards sessions.
    pub gateway_principal: Principal,
    pub admin_principals: Vec<Principal>,
}

/// Persisted canister configuration.
#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct CanisterConfig {
    pub gateway_principal: Principal,
    pub admin_principals: Vec<Principal>,
}

impl Default for CanisterConfig {
    fn default() -> Self {
        Self {
            gateway_principal: Principal::anonymous(),
            admin_principals: Vec::new(),
        }
    }
}

impl From<InitArgs> for CanisterConfig {
    fn from(args: InitArgs) -> Self {
        Self {
            gateway_principal: args.gateway_principal,
            admin_principals: args.admin_principals,
        }
    }
}
