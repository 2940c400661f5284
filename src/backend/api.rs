// src/backend/api.rs
// Candid endpoints. Every tester/owner call arrives through the gateway,
// which forwards the signed-in Google session when there is one.

use crate::{
    adapter::HttpGroupDirectory,
    error::SignupError,
    log_error,
    metrics::SignupMetrics,
    models::{AccessCredential, AppView, Session, Tester},
    services::{
        app_service::{self, AddCodesRequest, AppOverview, RegisterAppRequest},
        membership::{self, GroupValidation},
        signup::{self, SignupOutcome, SignupRequest},
    },
    storage::canister_store,
    utils::crypto::generate_app_secret,
    utils::guards::{admin_guard, gateway_guard, gateway_or_admin_guard, gateway_outcall_guard, is_admin_caller},
    utils::time::now,
};
use ic_cdk_macros::{query, update};

const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

/// Passes user-facing errors through; logs everything else and hides the details.
fn surface<T>(endpoint: &str, result: Result<T, SignupError>) -> Result<T, SignupError> {
    result.map_err(|e| {
        if e.is_user_facing() {
            e
        } else {
            log_error!("{} failed: {}", endpoint, e);
            SignupError::InternalError(GENERIC_FAILURE.to_string())
        }
    })
}

// --- App registry ---

#[update(guard = "gateway_outcall_guard")]
async fn register_app(req: RegisterAppRequest, session: Option<Session>) -> Result<AppView, SignupError> {
    let result = async {
        let store = canister_store()?;
        let secret = generate_app_secret().await?;
        let app = app_service::register_app(&store, &HttpGroupDirectory, req, session.as_ref(), secret, now()).await?;
        Ok::<_, SignupError>(AppView::from(&app))
    }
    .await;
    surface("register_app", result)
}

#[query(guard = "gateway_guard")]
fn get_app(app_id: String) -> Result<AppView, SignupError> {
    surface("get_app", canister_store().and_then(|store| app_service::get_app(&store, &app_id)))
}

#[query(guard = "gateway_guard")]
fn get_app_overview(app_id: String, session: Option<Session>) -> Result<AppOverview, SignupError> {
    surface(
        "get_app_overview",
        canister_store().and_then(|store| app_service::get_app_overview(&store, &app_id, session.as_ref())),
    )
}

#[update(guard = "gateway_guard")]
fn add_codes(req: AddCodesRequest, session: Option<Session>) -> Result<u64, SignupError> {
    surface(
        "add_codes",
        canister_store().and_then(|store| app_service::add_codes(&store, req, session.as_ref(), now())),
    )
}

#[update(guard = "gateway_or_admin_guard")]
fn delete_app(app_id: String, session: Option<Session>) -> Result<(), SignupError> {
    let is_admin = is_admin_caller().map_err(SignupError::InternalError);
    surface(
        "delete_app",
        is_admin.and_then(|is_admin| {
            let store = canister_store()?;
            app_service::delete_app(&store, &app_id, session.as_ref(), is_admin)
        }),
    )
}

/// Checks the owner's access to a group before registration.
#[update(guard = "gateway_outcall_guard")]
async fn validate_group(group_email: String, session: Option<Session>) -> GroupValidation {
    let credential = session
        .and_then(|s| s.access_token)
        .map(|access_token| AccessCredential { access_token });
    membership::validate_group(&HttpGroupDirectory, &group_email, credential.as_ref()).await
}

// --- Tester signup ---

#[update(guard = "gateway_outcall_guard")]
async fn submit_signup(req: SignupRequest, session: Option<Session>) -> Result<SignupOutcome, SignupError> {
    let result = match canister_store() {
        Ok(store) => signup::submit_signup(&store, &HttpGroupDirectory, req, session.as_ref(), now()).await,
        Err(e) => Err(e),
    };
    surface("submit_signup", result)
}

#[update(guard = "gateway_outcall_guard")]
async fn complete_signup(
    app_id: String,
    secret: String,
    session: Option<Session>,
) -> Result<SignupOutcome, SignupError> {
    let result = match canister_store() {
        Ok(store) => {
            signup::complete_signup(&store, &HttpGroupDirectory, &app_id, &secret, session.as_ref(), now()).await
        }
        Err(e) => Err(e),
    };
    surface("complete_signup", result)
}

#[query(guard = "gateway_guard")]
fn get_tester_status(app_id: String, email: String) -> Result<Option<Tester>, SignupError> {
    surface(
        "get_tester_status",
        canister_store().and_then(|store| signup::get_tester_status(&store, &app_id, &email)),
    )
}

// --- Admin ---

#[query(guard = "admin_guard")]
fn get_metrics() -> Result<SignupMetrics, SignupError> {
    surface("get_metrics", canister_store().map(|store| app_service::get_metrics(&store)))
}
