// src/backend/services/signup.rs
// Per-tester signup workflow. The stage is always derived from the persisted
// tester record plus the request context, never stored on its own.

use crate::error::SignupError;
use crate::metrics;
use crate::models::tester::normalize_email;
use crate::models::{App, GroupKind, Session, Tester, TesterUpdate, Timestamp};
use crate::services::allocation::allocate_code;
use crate::services::membership::{ensure_membership, GroupDirectory, MembershipOutcome, MembershipRequest};
use crate::storage::{CodePool, MetricsCell, Store, StoreHandle, TesterStore};
use crate::utils::crypto::secrets_match;
use crate::{log_error, log_info, log_warn};
use candid::CandidType;
use ic_stable_structures::Memory;
use serde::{Deserialize, Serialize};

#[derive(CandidType, Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SignupStage {
    NotStarted,
    AwaitingGroupJoin,
    AwaitingIdentityVerification,
    CodeAssignmentPending,
    Completed,
}

/// Request facts that, together with the tester record, decide the stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SignupContext {
    pub group_kind: GroupKind,
    pub authenticated: bool,
    pub claimed_joined_group: bool,
    pub secret_verified: bool,
}

pub fn derive_stage(tester: Option<&Tester>, ctx: &SignupContext) -> SignupStage {
    if let Some(t) = tester {
        if t.has_joined_group && t.promotional_code.is_some() {
            return SignupStage::Completed;
        }
    }
    if tester.is_none() && !ctx.authenticated && !ctx.claimed_joined_group && !ctx.secret_verified {
        return SignupStage::NotStarted;
    }

    let joined = tester.is_some_and(|t| t.has_joined_group)
        || ctx.claimed_joined_group
        || ctx.secret_verified;
    if ctx.group_kind == GroupKind::Consumer && !joined {
        return SignupStage::AwaitingGroupJoin;
    }
    if !ctx.authenticated {
        return SignupStage::AwaitingIdentityVerification;
    }
    SignupStage::CodeAssignmentPending
}

#[derive(CandidType, Deserialize, Clone, Debug)]
pub struct SignupRequest {
    pub app_id: String,
    /// Defaults to the session email; a different email is rejected.
    pub email: Option<String>,
    pub claimed_joined_group: bool,
}

#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct SignupOutcome {
    pub stage: SignupStage,
    pub promotional_code: Option<String>,
    pub has_joined_group: bool,
    pub already_existed: bool,
}

impl SignupOutcome {
    fn from_tester(stage: SignupStage, tester: &Tester, already_existed: bool) -> Self {
        Self {
            stage,
            promotional_code: tester.promotional_code.clone(),
            has_joined_group: tester.has_joined_group,
            already_existed,
        }
    }
}

/// Signup entry point for a signed-in tester.
pub async fn submit_signup<M: Memory, D: GroupDirectory>(
    store: &StoreHandle<M>,
    directory: &D,
    request: SignupRequest,
    session: Option<&Session>,
    now: Timestamp,
) -> Result<SignupOutcome, SignupError> {
    let session = session.ok_or_else(|| SignupError::AuthenticationRequired {
        return_to: format!("/signup/{}", request.app_id),
    })?;
    let app = store
        .borrow()
        .apps
        .get(&request.app_id)
        .filter(|app| app.is_setup_complete)
        .ok_or_else(|| SignupError::NotFound(format!("App {}", request.app_id)))?;

    if let Some(email) = &request.email {
        if normalize_email(email) != normalize_email(&session.email) {
            return Err(SignupError::PermissionDenied(
                "Signup email does not match the signed-in account".to_string(),
            ));
        }
    }

    advance(store, directory, &app, &session.email, request.claimed_joined_group, false, now).await
}

/// Handles the "complete" link from the consumer group welcome message.
/// A wrong secret is rejected before anything else is looked at or written.
pub async fn complete_signup<M: Memory, D: GroupDirectory>(
    store: &StoreHandle<M>,
    directory: &D,
    app_id: &str,
    secret: &str,
    session: Option<&Session>,
    now: Timestamp,
) -> Result<SignupOutcome, SignupError> {
    let app = store
        .borrow()
        .apps
        .get(app_id)
        .filter(|app| app.is_setup_complete)
        .ok_or_else(|| SignupError::NotFound(format!("App {}", app_id)))?;

    if !secrets_match(&app.app_id_secret, secret) {
        log_warn!("Rejected complete link with invalid secret for app {}", app_id);
        return Err(SignupError::PermissionDenied(
            "Invalid or missing access token. Use the link from the group welcome message.".to_string(),
        ));
    }

    let session = session.ok_or_else(|| SignupError::AuthenticationRequired {
        return_to: app.complete_link_path(),
    })?;

    advance(store, directory, &app, &session.email, true, true, now).await
}

/// Read-only lookup of a tester's record.
pub fn get_tester_status<M: Memory>(
    store: &StoreHandle<M>,
    app_id: &str,
    email: &str,
) -> Result<Option<Tester>, SignupError> {
    let store = store.borrow();
    if !store.apps.get(app_id).is_some_and(|app| app.is_setup_complete) {
        return Err(SignupError::NotFound(format!("App {}", app_id)));
    }
    Ok(store.testers.find_by_email(app_id, email))
}

async fn advance<M: Memory, D: GroupDirectory>(
    store: &StoreHandle<M>,
    directory: &D,
    app: &App,
    email: &str,
    claimed_joined_group: bool,
    secret_verified: bool,
    now: Timestamp,
) -> Result<SignupOutcome, SignupError> {
    let email = normalize_email(email);
    let (existing, credential) = {
        let s = store.borrow();
        (s.testers.find_by_email(&app.app_id, &email), s.credentials.get(&app.app_id))
    };

    let ctx = SignupContext {
        group_kind: app.group_kind(),
        authenticated: true,
        claimed_joined_group,
        secret_verified,
    };
    if let Some(tester) = &existing {
        if derive_stage(Some(tester), &ctx) == SignupStage::Completed {
            log_info!("🔁 Replaying signup result for {} in app {}", email, app.app_id);
            return Ok(SignupOutcome::from_tester(SignupStage::Completed, tester, true));
        }
    }

    let membership = ensure_membership(
        directory,
        MembershipRequest {
            group_email: &app.google_group_email,
            user_email: &email,
            credential: credential.as_ref(),
            already_proven: existing.as_ref().is_some_and(|t| t.has_joined_group) || secret_verified,
            claimed_manual_join: claimed_joined_group,
        },
    )
    .await;

    // Everything from here runs in one borrow: the tester is re-read because
    // another request may have written it while this one awaited the group API.
    let mut guard = store.borrow_mut();
    commit(&mut guard, app, &email, ctx, membership, now)
}

fn commit<M: Memory>(
    s: &mut Store<M>,
    app: &App,
    email: &str,
    ctx: SignupContext,
    membership: MembershipOutcome,
    now: Timestamp,
) -> Result<SignupOutcome, SignupError> {
    if let Some(added) = membership.auto_add {
        metrics::record(&mut s.metrics, |m| {
            if added {
                m.group_adds_succeeded += 1;
            } else {
                m.group_adds_failed += 1;
            }
        });
    }

    let current = s.testers.find_by_email(&app.app_id, email);
    let already_existed = current.is_some();
    let ctx = SignupContext {
        claimed_joined_group: ctx.claimed_joined_group || membership.has_joined_group,
        ..ctx
    };

    match derive_stage(current.as_ref(), &ctx) {
        SignupStage::Completed => {
            let tester = current.ok_or_else(|| {
                SignupError::InternalError("Completed stage without a tester record".to_string())
            })?;
            Ok(SignupOutcome::from_tester(SignupStage::Completed, &tester, true))
        }
        SignupStage::AwaitingGroupJoin => {
            let tester = match current {
                Some(tester) => tester,
                None => {
                    let tester = s.testers.create(&app.app_id, email, false, None, now)?;
                    metrics::record(&mut s.metrics, |m| m.testers_registered += 1);
                    log_info!("🧪 Registered {} for app {}, waiting for group join", email, app.app_id);
                    tester
                }
            };
            Ok(SignupOutcome::from_tester(SignupStage::AwaitingGroupJoin, &tester, already_existed))
        }
        SignupStage::CodeAssignmentPending => assign_and_persist(
            &mut s.codes,
            &mut s.testers,
            &mut s.metrics,
            app,
            email,
            current,
            membership.has_joined_group,
            now,
        ),
        stage @ (SignupStage::NotStarted | SignupStage::AwaitingIdentityVerification) => Ok(SignupOutcome {
            stage,
            promotional_code: None,
            has_joined_group: membership.has_joined_group,
            already_existed,
        }),
    }
}

/// Allocation runs only for testers without a code. A tester that already
/// holds one gets it replayed and only the membership flag may change.
#[allow(clippy::too_many_arguments)]
fn assign_and_persist<P: CodePool, T: TesterStore, M: Memory>(
    codes: &mut P,
    testers: &mut T,
    metrics_cell: &mut MetricsCell<M>,
    app: &App,
    email: &str,
    current: Option<Tester>,
    has_joined_group: bool,
    now: Timestamp,
) -> Result<SignupOutcome, SignupError> {
    let already_existed = current.is_some();

    if let Some(tester) = current.as_ref().filter(|t| t.promotional_code.is_some()) {
        let tester = if has_joined_group && !tester.has_joined_group {
            testers.update(
                &tester.id,
                &app.app_id,
                TesterUpdate { has_joined_group: true, promotional_code: None },
            )?
        } else {
            tester.clone()
        };
        return Ok(SignupOutcome::from_tester(SignupStage::Completed, &tester, true));
    }

    let code = match allocate_code(codes, &app.app_id, email, now) {
        Ok(report) => {
            if report.lost_races > 0 {
                metrics::record(metrics_cell, |m| {
                    m.redemption_races_lost += u64::from(report.lost_races)
                });
            }
            report.code.map(|c| c.code)
        }
        Err(e) => {
            // No code was committed; the next visit retries allocation.
            log_error!("Allocation for {} in app {} failed: {}", email, app.app_id, e);
            None
        }
    };
    if code.is_some() {
        metrics::record(metrics_cell, |m| m.codes_redeemed += 1);
    }

    let persisted = match &current {
        None => testers
            .create(&app.app_id, email, has_joined_group, code.clone(), now)
            .inspect(|_| metrics::record(metrics_cell, |m| m.testers_registered += 1)),
        Some(tester) => testers.update(
            &tester.id,
            &app.app_id,
            TesterUpdate { has_joined_group, promotional_code: code.clone() },
        ),
    };

    match persisted {
        Ok(tester) => {
            log_info!(
                "✅ Signup of {} for app {} completed (code assigned: {}, joined group: {})",
                email, app.app_id, tester.promotional_code.is_some(), tester.has_joined_group
            );
            Ok(SignupOutcome::from_tester(SignupStage::Completed, &tester, already_existed))
        }
        Err(e) => match code {
            Some(lost) => {
                log_error!(
                    "Promotional code {} of app {} was redeemed by {} but could not be saved: {}",
                    lost, app.app_id, email, e
                );
                metrics::record(metrics_cell, |m| m.codes_lost += 1);
                Ok(SignupOutcome {
                    stage: SignupStage::Completed,
                    promotional_code: None,
                    has_joined_group,
                    already_existed,
                })
            }
            None => Err(e),
        },
    }
}
