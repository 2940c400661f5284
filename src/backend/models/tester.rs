// src/backend/models/tester.rs
use crate::models::common::{AppId, TesterId, Timestamp};
use candid::CandidType;
use serde::{Deserialize, Serialize};

#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Tester {
    pub id: TesterId,
    pub app_id: AppId,
    pub email: String,
    pub has_joined_group: bool,
    /// Set at most once, never cleared.
    pub promotional_code: Option<String>,
    pub joined_at: Timestamp,
}

/// Partial update applied to an existing tester. Fields can only be set, never cleared.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TesterUpdate {
    pub has_joined_group: bool,
    pub promotional_code: Option<String>,
}

/// Canonical form of an email used for tester identity.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}
