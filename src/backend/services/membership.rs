// src/backend/services/membership.rs
// Decides whether a tester can be put into the app's Google Group automatically
// and folds every outcome, including failures, into a plain `has_joined_group`.

use crate::error::{GroupApiError, GroupApiErrorKind};
use crate::models::{AccessCredential, GroupKind};
use crate::{log_info, log_warn};
use candid::CandidType;
use serde::{Deserialize, Serialize};

/// External Google Group capability. Implementations must bound every call in time.
#[allow(async_fn_in_trait)]
pub trait GroupDirectory {
    async fn check_membership(
        &self,
        group_email: &str,
        user_email: &str,
        credential: &AccessCredential,
    ) -> Result<bool, GroupApiError>;

    /// Adds `user_email` as a MEMBER. "Already a member" counts as success.
    async fn add_member(
        &self,
        group_email: &str,
        user_email: &str,
        credential: &AccessCredential,
    ) -> Result<bool, GroupApiError>;

    async fn check_external_member_policy(
        &self,
        group_email: &str,
        credential: &AccessCredential,
    ) -> Result<bool, GroupApiError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MembershipPlan {
    /// Tester record or secret link already proves membership.
    AlreadyMember,
    /// Consumer group: only the tester's own claim counts.
    ManualJoin { claimed: bool },
    /// Managed group with an owner credential.
    AutoAdd,
    /// Managed group but the owner never delegated a credential.
    NoCredential,
}

pub struct MembershipRequest<'a> {
    pub group_email: &'a str,
    pub user_email: &'a str,
    pub credential: Option<&'a AccessCredential>,
    pub already_proven: bool,
    pub claimed_manual_join: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MembershipOutcome {
    pub has_joined_group: bool,
    /// `Some(success)` when an automatic add was attempted.
    pub auto_add: Option<bool>,
}

pub fn plan_membership(
    kind: GroupKind,
    has_credential: bool,
    already_proven: bool,
    claimed_manual_join: bool,
) -> MembershipPlan {
    match (already_proven, kind, has_credential) {
        (true, _, _) => MembershipPlan::AlreadyMember,
        (false, GroupKind::Consumer, _) => MembershipPlan::ManualJoin { claimed: claimed_manual_join },
        (false, GroupKind::Managed, true) => MembershipPlan::AutoAdd,
        (false, GroupKind::Managed, false) => MembershipPlan::NoCredential,
    }
}

/// Never fails: any group API error degrades to "not joined" so signup can continue.
pub async fn ensure_membership<D: GroupDirectory>(
    directory: &D,
    request: MembershipRequest<'_>,
) -> MembershipOutcome {
    let kind = GroupKind::of(request.group_email);
    let plan = plan_membership(
        kind,
        request.credential.is_some(),
        request.already_proven,
        request.claimed_manual_join,
    );

    match (plan, request.credential) {
        (MembershipPlan::AlreadyMember, _) => MembershipOutcome { has_joined_group: true, auto_add: None },
        (MembershipPlan::ManualJoin { claimed }, _) => MembershipOutcome { has_joined_group: claimed, auto_add: None },
        (MembershipPlan::AutoAdd, Some(credential)) => {
            let added = add_with_fallback(directory, request.group_email, request.user_email, credential).await;
            MembershipOutcome { has_joined_group: added, auto_add: Some(added) }
        }
        (MembershipPlan::AutoAdd, None) | (MembershipPlan::NoCredential, _) => {
            log_info!(
                "No owner credential for group {}; {} must be added by hand",
                request.group_email, request.user_email
            );
            MembershipOutcome { has_joined_group: false, auto_add: None }
        }
    }
}

async fn add_with_fallback<D: GroupDirectory>(
    directory: &D,
    group_email: &str,
    user_email: &str,
    credential: &AccessCredential,
) -> bool {
    match directory.add_member(group_email, user_email, credential).await {
        Ok(true) => {
            log_info!("👥 Added {} to group {}", user_email, group_email);
            true
        }
        Ok(false) => {
            log_warn!("Group {} did not accept {}", group_email, user_email);
            false
        }
        Err(add_err) => {
            // The add may have failed because the user is already in the group.
            match directory.check_membership(group_email, user_email, credential).await {
                Ok(true) => {
                    log_info!("👥 {} was already a member of {}", user_email, group_email);
                    true
                }
                Ok(false) => {
                    log_warn!("Could not add {} to group {}: {}", user_email, group_email, add_err);
                    false
                }
                Err(check_err) => {
                    log_warn!(
                        "Could not add {} to group {}: {}; membership check also failed: {}",
                        user_email, group_email, add_err, check_err
                    );
                    false
                }
            }
        }
    }
}

#[derive(CandidType, Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum GroupIssue {
    Authentication,
    NotFound,
    AccessDenied,
    ConsumerGroup,
    NetworkError,
}

impl From<GroupApiErrorKind> for GroupIssue {
    fn from(kind: GroupApiErrorKind) -> Self {
        match kind {
            GroupApiErrorKind::Authentication => GroupIssue::Authentication,
            GroupApiErrorKind::NotFound => GroupIssue::NotFound,
            GroupApiErrorKind::AccessDenied => GroupIssue::AccessDenied,
            GroupApiErrorKind::NetworkError => GroupIssue::NetworkError,
        }
    }
}

#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct GroupValidation {
    pub can_manage: bool,
    pub allows_external_members: bool,
    pub issue: Option<GroupIssue>,
    pub message: Option<String>,
}

/// Checks that the signed-in owner can manage `group_email` and whether
/// people outside the Workspace domain may join it.
pub async fn validate_group<D: GroupDirectory>(
    directory: &D,
    group_email: &str,
    credential: Option<&AccessCredential>,
) -> GroupValidation {
    if GroupKind::of(group_email) == GroupKind::Consumer {
        return GroupValidation {
            can_manage: true,
            allows_external_members: true,
            issue: Some(GroupIssue::ConsumerGroup),
            message: None,
        };
    }

    let Some(credential) = credential else {
        return GroupValidation {
            can_manage: false,
            allows_external_members: false,
            issue: Some(GroupIssue::Authentication),
            message: Some("Sign in again and grant group management access.".to_string()),
        };
    };

    match directory.check_external_member_policy(group_email, credential).await {
        Ok(allows_external_members) => GroupValidation {
            can_manage: true,
            allows_external_members,
            issue: None,
            message: None,
        },
        Err(err) => {
            log_warn!("Group validation for {} failed: {}", group_email, err);
            let message = match err.kind {
                GroupApiErrorKind::Authentication => "Sign in again to check this group's settings.",
                GroupApiErrorKind::NotFound => "Group not found. Check the group email.",
                GroupApiErrorKind::AccessDenied => "You need admin permissions for this group.",
                GroupApiErrorKind::NetworkError => "Could not reach Google Groups. Try again later.",
            };
            GroupValidation {
                can_manage: false,
                allows_external_members: false,
                issue: Some(err.kind.into()),
                message: Some(message.to_string()),
            }
        }
    }
}
