// src/backend/lib.rs

pub mod adapter;
pub mod api;
pub mod error;
pub mod metrics;
pub mod models;
pub mod services;
pub mod storage;
pub mod utils;

// Types named in endpoint signatures, needed by `export_candid!`.
use crate::error::SignupError;
use crate::metrics::SignupMetrics;
use crate::models::init::{CanisterConfig, InitArgs};
use crate::models::{AppView, Session, Tester};
use crate::services::app_service::{AddCodesRequest, AppOverview, RegisterAppRequest};
use crate::services::membership::GroupValidation;
use crate::services::signup::{SignupOutcome, SignupRequest};

#[ic_cdk::init]
fn init(args: InitArgs) {
    let config = CanisterConfig::from(args);
    let admins = config.admin_principals.len();
    let result = storage::install_canister_store()
        .and_then(|store| store.borrow_mut().config.set(config));
    if let Err(e) = result {
        ic_cdk::trap(&format!("Canister initialization failed: {}", e));
    }
    log_info!("Tester gate canister initialized with {} admins.", admins);
}

#[ic_cdk::post_upgrade]
fn post_upgrade() {
    if let Err(e) = storage::install_canister_store() {
        ic_cdk::trap(&format!("Reopening stable storage failed: {}", e));
    }
    log_info!("Tester gate canister upgraded.");
}

// Export Candid interface
ic_cdk::export_candid!();
