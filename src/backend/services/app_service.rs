// src/backend/services/app_service.rs
// Owner-side operations: registering an app, growing its code pool,
// reporting on it and deleting it.

use crate::error::SignupError;
use crate::metrics::{self, SignupMetrics};
use crate::models::tester::normalize_email;
use crate::models::{AccessCredential, App, AppView, GroupKind, PromotionalCode, Session, Tester, Timestamp};
use crate::services::membership::GroupDirectory;
use crate::storage::{Store, StoreHandle};
use crate::utils::play_store::extract_package_name;
use crate::{log_error, log_info, log_warn};
use candid::CandidType;
use ic_stable_structures::Memory;
use serde::Deserialize;
use std::collections::HashSet;
use validator::{Validate, ValidationError};

pub const MAX_CODES_PER_BATCH: usize = 1000;

fn validate_play_store_url(url: &str) -> Result<(), ValidationError> {
    extract_package_name(url)
        .map(|_| ())
        .ok_or_else(|| ValidationError::new("invalid_play_store_url"))
}

#[derive(CandidType, Deserialize, Clone, Debug, Validate)]
pub struct RegisterAppRequest {
    #[validate(length(min = 1, max = 100))]
    pub app_name: String,
    #[validate(email)]
    pub google_group_email: String,
    #[validate(custom(function = "validate_play_store_url"))]
    pub play_store_url: String,
    #[validate(url)]
    pub icon_url: Option<String>,
    pub manage_group_automatically: bool,
    #[validate(length(max = 1000))]
    pub promotional_codes: Vec<String>,
}

#[derive(CandidType, Deserialize, Clone, Debug, Validate)]
pub struct AddCodesRequest {
    #[validate(length(min = 1))]
    pub app_id: String,
    #[validate(length(min = 1, max = 1000))]
    pub codes: Vec<String>,
}

#[derive(CandidType, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AppStats {
    pub total_testers: u64,
    pub joined_group: u64,
    pub codes_assigned: u64,
    pub total_codes: u64,
    pub available_codes: u64,
}

#[derive(CandidType, Deserialize, Clone, Debug)]
pub struct AppOverview {
    pub app: App,
    /// Link to paste into the consumer group welcome message.
    pub complete_link_path: String,
    pub testers: Vec<Tester>,
    /// Newest first.
    pub codes: Vec<PromotionalCode>,
    pub stats: AppStats,
}

/// Trims, drops empty entries and removes exact duplicates, keeping first occurrences.
pub fn normalize_codes(raw: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.iter()
        .map(|code| code.trim())
        .filter(|code| !code.is_empty())
        .filter(|code| seen.insert(*code))
        .map(str::to_string)
        .collect()
}

fn owned_app<M: Memory>(store: &Store<M>, app_id: &str, session: &Session) -> Result<App, SignupError> {
    let app = store
        .apps
        .get(app_id)
        .ok_or_else(|| SignupError::NotFound(format!("App {}", app_id)))?;
    if !app.is_owned_by(&session.email) {
        return Err(SignupError::PermissionDenied(format!(
            "{} does not own app {}",
            session.email, app_id
        )));
    }
    Ok(app)
}

fn require_session<'a>(session: Option<&'a Session>, return_to: String) -> Result<&'a Session, SignupError> {
    session.ok_or(SignupError::AuthenticationRequired { return_to })
}

/// Registers an app for the signed-in owner. `app_secret` gates the complete link.
pub async fn register_app<M: Memory, D: GroupDirectory>(
    store: &StoreHandle<M>,
    directory: &D,
    request: RegisterAppRequest,
    session: Option<&Session>,
    app_secret: String,
    now: Timestamp,
) -> Result<App, SignupError> {
    let session = require_session(session, "/register".to_string())?;
    request.validate()?;
    let app_id = extract_package_name(&request.play_store_url)
        .ok_or_else(|| SignupError::InvalidInput("Invalid Play Store URL".to_string()))?;
    let group_email = request.google_group_email.trim().to_ascii_lowercase();
    let group_kind = GroupKind::of(&group_email);
    let credential = session
        .access_token
        .clone()
        .map(|access_token| AccessCredential { access_token });

    if group_kind == GroupKind::Managed {
        let credential = credential.as_ref().ok_or_else(|| SignupError::AuthenticationRequired {
            return_to: "/register".to_string(),
        })?;
        match directory.check_external_member_policy(&group_email, credential).await {
            Ok(true) => {}
            Ok(false) => log_warn!(
                "Group {} does not allow external members; outside testers cannot join",
                group_email
            ),
            Err(e) => {
                log_warn!("{} cannot manage group {}: {}", session.email, group_email, e);
                return Err(SignupError::PermissionDenied(format!(
                    "Cannot manage group {}",
                    group_email
                )));
            }
        }
    }

    let codes = normalize_codes(&request.promotional_codes);
    let stored_credential = credential.filter(|_| request.manage_group_automatically && group_kind == GroupKind::Managed);
    let app = App {
        app_id: app_id.clone(),
        app_name: request.app_name.trim().to_string(),
        google_group_email: group_email,
        play_store_url: request.play_store_url.trim().to_string(),
        icon_url: request.icon_url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty()),
        owner_email: normalize_email(&session.email),
        app_id_secret: app_secret,
        manage_group_automatically: request.manage_group_automatically,
        is_setup_complete: false,
        created_at: now,
    };

    let mut guard = store.borrow_mut();
    let s = &mut *guard;
    if let Some(existing) = s.apps.get(&app_id) {
        if existing.is_setup_complete {
            return Err(SignupError::AppAlreadyExists(app_id));
        }
        log_warn!("Removing incomplete registration of app {}", app_id);
        s.delete_app_cascade(&app_id);
    }

    s.apps.insert(app)?;
    match finish_registration(s, &app_id, &codes, stored_credential, now) {
        Ok(app) => {
            metrics::record(&mut s.metrics, |m| {
                m.apps_registered += 1;
                m.codes_added += codes.len() as u64;
            });
            log_info!("📱 App {} registered by {} with {} codes", app_id, app.owner_email, codes.len());
            Ok(app)
        }
        Err(e) => {
            log_error!("Registration of app {} failed, rolling back: {}", app_id, e);
            s.delete_app_cascade(&app_id);
            Err(e)
        }
    }
}

fn finish_registration<M: Memory>(
    s: &mut Store<M>,
    app_id: &str,
    codes: &[String],
    credential: Option<AccessCredential>,
    now: Timestamp,
) -> Result<App, SignupError> {
    if !codes.is_empty() {
        s.codes.add_codes(app_id, codes, now)?;
    }
    if let Some(credential) = credential {
        s.credentials.put(app_id, credential);
    }
    s.apps.mark_setup_complete(app_id)
}

/// Appends owner-supplied codes. Returns how many were added.
pub fn add_codes<M: Memory>(
    store: &StoreHandle<M>,
    request: AddCodesRequest,
    session: Option<&Session>,
    now: Timestamp,
) -> Result<u64, SignupError> {
    let session = require_session(session, format!("/admin/{}", request.app_id))?;
    request.validate()?;
    let codes = normalize_codes(&request.codes);
    if codes.is_empty() {
        return Err(SignupError::InvalidInput("No promotional codes provided".to_string()));
    }

    let mut guard = store.borrow_mut();
    let s = &mut *guard;
    owned_app(s, &request.app_id, session)?;
    let ids = s.codes.add_codes(&request.app_id, &codes, now)?;
    let added = ids.len() as u64;
    metrics::record(&mut s.metrics, |m| m.codes_added += added);
    log_info!("🎟️ {} promotional codes added to app {}", added, request.app_id);
    Ok(added)
}

/// Public view of a fully registered app.
pub fn get_app<M: Memory>(store: &StoreHandle<M>, app_id: &str) -> Result<AppView, SignupError> {
    store
        .borrow()
        .apps
        .get(app_id)
        .filter(|app| app.is_setup_complete)
        .map(|app| AppView::from(&app))
        .ok_or_else(|| SignupError::NotFound(format!("App {}", app_id)))
}

pub fn get_app_overview<M: Memory>(
    store: &StoreHandle<M>,
    app_id: &str,
    session: Option<&Session>,
) -> Result<AppOverview, SignupError> {
    let session = require_session(session, format!("/admin/{}", app_id))?;
    let s = store.borrow();
    let app = owned_app(&s, app_id, session)?;

    let testers = s.testers.list_for_app(app_id);
    let codes = s.codes.list_codes(app_id);
    let code_stats = s.codes.stats(app_id);
    let stats = AppStats {
        total_testers: testers.len() as u64,
        joined_group: testers.iter().filter(|t| t.has_joined_group).count() as u64,
        codes_assigned: testers.iter().filter(|t| t.promotional_code.is_some()).count() as u64,
        total_codes: code_stats.total,
        available_codes: code_stats.available,
    };

    Ok(AppOverview {
        complete_link_path: app.complete_link_path(),
        app,
        testers,
        codes,
        stats,
    })
}

/// Deletes the app and everything it owns. Admins may delete any app.
pub fn delete_app<M: Memory>(
    store: &StoreHandle<M>,
    app_id: &str,
    session: Option<&Session>,
    is_admin: bool,
) -> Result<(), SignupError> {
    let mut guard = store.borrow_mut();
    let s = &mut *guard;
    if !is_admin {
        let session = require_session(session, format!("/admin/{}", app_id))?;
        owned_app(s, app_id, session)?;
    }

    let report = s
        .delete_app_cascade(app_id)
        .ok_or_else(|| SignupError::NotFound(format!("App {}", app_id)))?;
    metrics::record(&mut s.metrics, |m| m.apps_deleted += 1);
    log_info!(
        "🗑️ App {} deleted with {} codes and {} testers",
        app_id, report.codes, report.testers
    );
    Ok(())
}

pub fn get_metrics<M: Memory>(store: &StoreHandle<M>) -> SignupMetrics {
    store.borrow().metrics.get()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GroupApiError;
    use crate::services::test_support::ScriptedDirectory;
    use crate::storage::test_support::{test_store, TestMemory};
    use crate::storage::TesterStore;
    use futures::executor::block_on;

    const APP_ID: &str = "com.example.demo";

    fn request(group: &str, codes: &[&str]) -> RegisterAppRequest {
        RegisterAppRequest {
            app_name: "Demo".to_string(),
            google_group_email: group.to_string(),
            play_store_url: format!("https://play.google.com/store/apps/details?id={}", APP_ID),
            icon_url: None,
            manage_group_automatically: true,
            promotional_codes: codes.iter().map(|c| c.to_string()).collect(),
        }
    }

    fn owner() -> Session {
        Session { email: "owner@example.com".to_string(), access_token: Some("owner-token".to_string()) }
    }

    fn register(
        store: &StoreHandle<TestMemory>,
        directory: &ScriptedDirectory,
        request: RegisterAppRequest,
        session: Option<&Session>,
    ) -> Result<App, SignupError> {
        block_on(register_app(store, directory, request, session, "secret".to_string(), 1))
    }

    fn add(store: &StoreHandle<TestMemory>, codes: &[&str], session: &Session) -> Result<u64, SignupError> {
        let request = AddCodesRequest {
            app_id: APP_ID.to_string(),
            codes: codes.iter().map(|c| c.to_string()).collect(),
        };
        add_codes(store, request, Some(session), 2)
    }

    #[test]
    fn registers_consumer_group_app_without_calling_google() {
        let store = test_store();
        let directory = ScriptedDirectory::default();
        let app = register(&store, &directory, request("beta@googlegroups.com", &["A1", " A1 ", "A2", ""]), Some(&owner()))
            .unwrap();

        assert_eq!(app.app_id, APP_ID);
        assert!(app.is_setup_complete);
        assert!(directory.calls().is_empty());
        let s = store.borrow();
        assert_eq!(s.codes.stats(APP_ID).total, 2);
        assert!(s.credentials.get(APP_ID).is_none());
        assert_eq!(s.metrics.get().apps_registered, 1);
    }

    #[test]
    fn managed_group_stores_owner_credential() {
        let store = test_store();
        let directory = ScriptedDirectory::default();
        register(&store, &directory, request("beta@example.com", &[]), Some(&owner())).unwrap();
        assert_eq!(directory.calls(), vec!["policy:beta@example.com".to_string()]);
        assert_eq!(
            store.borrow().credentials.get(APP_ID),
            Some(AccessCredential { access_token: "owner-token".to_string() })
        );
    }

    #[test]
    fn unmanageable_group_is_denied_and_nothing_is_stored() {
        let store = test_store();
        let directory = ScriptedDirectory {
            policy_result: Err(GroupApiError::from_status(403, "Not Authorized to access this resource/api")),
            ..Default::default()
        };
        let err = register(&store, &directory, request("beta@example.com", &["A1"]), Some(&owner())).unwrap_err();
        assert!(matches!(err, SignupError::PermissionDenied(_)));
        assert!(store.borrow().apps.get(APP_ID).is_none());
    }

    #[test]
    fn registration_needs_a_session() {
        let store = test_store();
        let directory = ScriptedDirectory::default();
        let err = register(&store, &directory, request("beta@googlegroups.com", &[]), None).unwrap_err();
        assert_eq!(err, SignupError::AuthenticationRequired { return_to: "/register".to_string() });

        let no_token = Session { access_token: None, ..owner() };
        let err = register(&store, &directory, request("beta@example.com", &[]), Some(&no_token)).unwrap_err();
        assert!(matches!(err, SignupError::AuthenticationRequired { .. }));
    }

    #[test]
    fn rejects_invalid_requests() {
        let store = test_store();
        let directory = ScriptedDirectory::default();

        let mut bad_url = request("beta@googlegroups.com", &[]);
        bad_url.play_store_url = "https://example.com/store/apps/details?id=com.example.demo".to_string();
        assert!(matches!(
            register(&store, &directory, bad_url, Some(&owner())),
            Err(SignupError::InvalidInput(_))
        ));

        let mut bad_email = request("beta@googlegroups.com", &[]);
        bad_email.google_group_email = "not-an-email".to_string();
        assert!(matches!(
            register(&store, &directory, bad_email, Some(&owner())),
            Err(SignupError::InvalidInput(_))
        ));

        let too_many: Vec<String> = (0..=MAX_CODES_PER_BATCH).map(|i| format!("C{}", i)).collect();
        let mut oversized = request("beta@googlegroups.com", &[]);
        oversized.promotional_codes = too_many;
        assert!(matches!(
            register(&store, &directory, oversized, Some(&owner())),
            Err(SignupError::InvalidInput(_))
        ));
    }

    #[test]
    fn complete_app_conflicts_but_incomplete_one_is_replaced() {
        let store = test_store();
        let directory = ScriptedDirectory::default();
        register(&store, &directory, request("beta@googlegroups.com", &["A1"]), Some(&owner())).unwrap();
        assert_eq!(
            register(&store, &directory, request("beta@googlegroups.com", &[]), Some(&owner())),
            Err(SignupError::AppAlreadyExists(APP_ID.to_string()))
        );

        // Leave a half-registered app behind, as a failed registration would.
        {
            let mut s = store.borrow_mut();
            s.delete_app_cascade(APP_ID);
            let mut partial = register_fixture();
            partial.is_setup_complete = false;
            s.apps.insert(partial).unwrap();
            s.codes.add_codes(APP_ID, &["STALE".to_string()], 1).unwrap();
        }
        let app = register(&store, &directory, request("beta@googlegroups.com", &["A2"]), Some(&owner())).unwrap();
        assert!(app.is_setup_complete);
        let codes: Vec<String> = store.borrow().codes.list_codes(APP_ID).into_iter().map(|c| c.code).collect();
        assert_eq!(codes, vec!["A2".to_string()]);
    }

    fn register_fixture() -> App {
        App {
            app_id: APP_ID.to_string(),
            app_name: "Demo".to_string(),
            google_group_email: "beta@googlegroups.com".to_string(),
            play_store_url: format!("https://play.google.com/store/apps/details?id={}", APP_ID),
            icon_url: None,
            owner_email: "owner@example.com".to_string(),
            app_id_secret: "secret".to_string(),
            manage_group_automatically: false,
            is_setup_complete: true,
            created_at: 1,
        }
    }

    #[test]
    fn add_codes_dedupes_and_checks_ownership() {
        let store = test_store();
        store.borrow_mut().apps.insert(register_fixture()).unwrap();

        assert_eq!(add(&store, &["B1", "b1", "B1", "  ", "B2 "], &owner()).unwrap(), 3);
        let codes: Vec<String> = store.borrow().codes.list_codes(APP_ID).into_iter().map(|c| c.code).collect();
        assert_eq!(codes, vec!["B2", "b1", "B1"]);

        assert!(matches!(add(&store, &[" ", ""], &owner()), Err(SignupError::InvalidInput(_))));
        assert!(matches!(add(&store, &[], &owner()), Err(SignupError::InvalidInput(_))));

        let stranger = Session { email: "stranger@example.com".to_string(), access_token: None };
        assert!(matches!(add(&store, &["B3"], &stranger), Err(SignupError::PermissionDenied(_))));
        assert_eq!(store.borrow().codes.stats(APP_ID).total, 3);
    }

    #[test]
    fn overview_reports_statistics_to_the_owner_only() {
        let store = test_store();
        {
            let mut s = store.borrow_mut();
            s.apps.insert(register_fixture()).unwrap();
            let ids = s.codes.add_codes(APP_ID, &["A1".to_string(), "A2".to_string(), "A3".to_string()], 1).unwrap();
            use crate::storage::CodePool;
            s.codes.redeem(ids[0], "x@example.com", APP_ID, 2).unwrap();
            s.testers.create(APP_ID, "x@example.com", true, Some("A1".to_string()), 2).unwrap();
            s.testers.create(APP_ID, "y@example.com", false, None, 3).unwrap();
        }

        let overview = get_app_overview(&store, APP_ID, Some(&owner())).unwrap();
        assert_eq!(
            overview.stats,
            AppStats { total_testers: 2, joined_group: 1, codes_assigned: 1, total_codes: 3, available_codes: 2 }
        );
        assert_eq!(overview.complete_link_path, format!("/signup/{}/complete?s=secret", APP_ID));
        assert_eq!(overview.codes.first().map(|c| c.code.as_str()), Some("A3"));

        let stranger = Session { email: "stranger@example.com".to_string(), access_token: None };
        assert!(matches!(
            get_app_overview(&store, APP_ID, Some(&stranger)),
            Err(SignupError::PermissionDenied(_))
        ));
        assert!(matches!(get_app_overview(&store, APP_ID, None), Err(SignupError::AuthenticationRequired { .. })));
    }

    #[test]
    fn public_view_hides_incomplete_apps() {
        let store = test_store();
        let mut partial = register_fixture();
        partial.is_setup_complete = false;
        store.borrow_mut().apps.insert(partial).unwrap();
        assert!(matches!(get_app(&store, APP_ID), Err(SignupError::NotFound(_))));

        store.borrow_mut().apps.mark_setup_complete(APP_ID).unwrap();
        assert_eq!(get_app(&store, APP_ID).unwrap().group_kind, GroupKind::Consumer);
    }

    #[test]
    fn delete_requires_owner_or_admin() {
        let store = test_store();
        store.borrow_mut().apps.insert(register_fixture()).unwrap();
        let stranger = Session { email: "stranger@example.com".to_string(), access_token: None };

        assert!(matches!(delete_app(&store, APP_ID, Some(&stranger), false), Err(SignupError::PermissionDenied(_))));
        delete_app(&store, APP_ID, None, true).unwrap();
        assert!(matches!(delete_app(&store, APP_ID, Some(&owner()), false), Err(SignupError::NotFound(_))));
        assert_eq!(get_metrics(&store).apps_deleted, 1);
    }

    #[test]
    fn normalizes_code_lists() {
        let raw: Vec<String> = ["X", " Y", "X", "x", "", "Y "].iter().map(|c| c.to_string()).collect();
        assert_eq!(normalize_codes(&raw), vec!["X", "Y", "x"]);
    }
}
