// src/backend/models/app.rs
use crate::models::common::{AppId, GroupKind, Timestamp};
use candid::CandidType;
use serde::{Deserialize, Serialize};

#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct App {
    pub app_id: AppId,
    pub app_name: String,
    pub google_group_email: String,
    pub play_store_url: String,
    pub icon_url: Option<String>,
    pub owner_email: String,
    /// Gates the "complete" link sent in the group welcome message.
    pub app_id_secret: String,
    pub manage_group_automatically: bool,
    /// False only while registration is in flight or after a crash mid-registration.
    pub is_setup_complete: bool,
    pub created_at: Timestamp,
}

impl App {
    pub fn group_kind(&self) -> GroupKind {
        GroupKind::of(&self.google_group_email)
    }

    pub fn is_owned_by(&self, email: &str) -> bool {
        self.owner_email.eq_ignore_ascii_case(email.trim())
    }

    /// Path embedded in the consumer group welcome message.
    pub fn complete_link_path(&self) -> String {
        format!("/signup/{}/complete?s={}", self.app_id, self.app_id_secret)
    }
}

/// What testers see of an app: no secret, no owner identity.
#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct AppView {
    pub app_id: AppId,
    pub app_name: String,
    pub google_group_email: String,
    pub group_kind: GroupKind,
    pub play_store_url: String,
    pub icon_url: Option<String>,
}

impl From<&App> for AppView {
    fn from(app: &App) -> Self {
        Self {
            app_id: app.app_id.clone(),
            app_name: app.app_name.clone(),
            google_group_email: app.google_group_email.clone(),
            group_kind: app.group_kind(),
            play_store_url: app.play_store_url.clone(),
            icon_url: app.icon_url.clone(),
        }
    }
}
