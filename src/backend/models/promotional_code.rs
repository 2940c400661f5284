// src/backend/models/promotional_code.rs
use crate::models::common::{AppId, CodeId, Timestamp};
use candid::CandidType;
use serde::{Deserialize, Serialize};

#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct PromotionalCode {
    pub id: CodeId,
    pub app_id: AppId,
    /// Free-form code text as supplied by the owner.
    pub code: String,
    pub created_at: Timestamp,
    pub redeemed_at: Option<Timestamp>,
    pub redeemed_by: Option<String>,
}

impl PromotionalCode {
    pub fn is_available(&self) -> bool {
        self.redeemed_at.is_none()
    }
}
