// src/backend/models/common.rs
use candid::CandidType;
use serde::{Deserialize, Serialize};

pub type AppId = String; // Android package name, e.g. "com.example.app"
pub type TesterId = String; // Hex SHA-256 of (app id, normalized email)
pub type CodeId = u64; // Internal counter for promotional codes

pub type Timestamp = u64; // Nanoseconds since epoch

/// Domain suffix of consumer (non-Workspace) Google Groups.
pub const CONSUMER_GROUP_SUFFIX: &str = "@googlegroups.com";

/// Kind of Google Group an app distributes its beta through.
#[derive(CandidType, Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupKind {
    /// `@googlegroups.com` group. Testers must join by hand.
    Consumer,
    /// Workspace group. Members can be added through the Directory API.
    Managed,
}

impl GroupKind {
    pub fn of(group_email: &str) -> Self {
        if group_email
            .trim()
            .to_ascii_lowercase()
            .ends_with(CONSUMER_GROUP_SUFFIX)
        {
            GroupKind::Consumer
        } else {
            GroupKind::Managed
        }
    }
}

/// Identity forwarded by the gateway after Google sign-in.
#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct Session {
    pub email: String,
    /// OAuth access token with the Groups scope, when the user granted one.
    pub access_token: Option<String>,
}

/// Owner-delegated credential used for automatic group management.
#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct AccessCredential {
    pub access_token: String,
}
