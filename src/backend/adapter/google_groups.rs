use crate::error::{GroupApiError, GroupApiErrorKind};
use crate::models::AccessCredential;
use crate::services::membership::GroupDirectory;
use crate::{log_error, log_info};
use ic_cdk::api::call::RejectionCode;
use ic_cdk::api::management_canister::http_request::{
    http_request, CanisterHttpRequestArgument, HttpHeader, HttpMethod,
};
use num::ToPrimitive;
use serde::Serialize;

const DIRECTORY_API_URL: &str = "https://admin.googleapis.com/admin/directory/v1";
const GROUPS_SETTINGS_API_URL: &str = "https://www.googleapis.com/groups/v1";

const HTTP_OUTCALL_CYCLES: u128 = 2_000_000_000; // Cycles attached to each outcall
const MAX_RESPONSE_BYTES: u64 = 1024 * 16; // Max 16KiB response

#[derive(Serialize)]
struct AddMemberBody<'a> {
    email: &'a str,
    role: &'a str,
}

/// Google Directory / Groups Settings client over HTTP outcalls.
/// Acts with the credential passed to each call, never with one of its own.
#[derive(Clone, Copy, Debug, Default)]
pub struct HttpGroupDirectory;

impl GroupDirectory for HttpGroupDirectory {
    async fn check_membership(
        &self,
        group_email: &str,
        user_email: &str,
        credential: &AccessCredential,
    ) -> Result<bool, GroupApiError> {
        let url = format!(
            "{}/groups/{}/members/{}",
            DIRECTORY_API_URL,
            encode_path_segment(group_email),
            encode_path_segment(user_email)
        );
        let (status, body) = send(HttpMethod::GET, url, None, credential).await?;
        match status {
            200..=299 => Ok(true),
            404 => Ok(false),
            _ => Err(GroupApiError::from_status(status, &body)),
        }
    }

    async fn add_member(
        &self,
        group_email: &str,
        user_email: &str,
        credential: &AccessCredential,
    ) -> Result<bool, GroupApiError> {
        let url = format!("{}/groups/{}/members", DIRECTORY_API_URL, encode_path_segment(group_email));
        let body = serde_json::to_vec(&AddMemberBody { email: user_email, role: "MEMBER" })
            .map_err(|e| GroupApiError::network(format!("Failed to serialize member: {}", e)))?;
        let (status, body) = send(HttpMethod::POST, url, Some(body), credential).await?;
        add_member_result(status, &body)
    }

    async fn check_external_member_policy(
        &self,
        group_email: &str,
        credential: &AccessCredential,
    ) -> Result<bool, GroupApiError> {
        let url = format!(
            "{}/groups/{}?alt=json",
            GROUPS_SETTINGS_API_URL,
            encode_path_segment(group_email)
        );
        let (status, body) = send(HttpMethod::GET, url, None, credential).await?;
        if !(200..300).contains(&status) {
            return Err(GroupApiError::from_status(status, &body));
        }
        parse_external_member_policy(&body)
    }
}

/// One outcall. The replica bounds its duration and reports a timeout as a reject.
/// Returns the status and the body as text.
async fn send(
    method: HttpMethod,
    url: String,
    body: Option<Vec<u8>>,
    credential: &AccessCredential,
) -> Result<(u16, String), GroupApiError> {
    let mut headers = vec![HttpHeader {
        name: String::from("Authorization"),
        value: format!("Bearer {}", credential.access_token),
    }];
    if body.is_some() {
        headers.push(HttpHeader {
            name: String::from("Content-Type"),
            value: String::from("application/json"),
        });
    }

    let request_arg = CanisterHttpRequestArgument {
        url: url.clone(),
        method,
        body,
        max_response_bytes: Some(MAX_RESPONSE_BYTES),
        transform: None,
        headers,
    };

    let (response,) = http_request(request_arg, HTTP_OUTCALL_CYCLES)
        .await
        .map_err(|(code, msg)| {
            log_error!("HTTP outcall to {} failed: {:?} - {}", url, code, msg);
            outcall_rejected(code, &msg)
        })?;

    let status = response
        .status
        .0
        .to_u16()
        .ok_or_else(|| GroupApiError::network(format!("Unexpected HTTP status {}", response.status)))?;
    log_info!("🔗 Group API responded {} for {}", status, url);
    Ok((status, String::from_utf8_lossy(&response.body).into_owned()))
}

/// A rejected outcall, replica timeouts included, is a transport failure.
fn outcall_rejected(code: RejectionCode, message: &str) -> GroupApiError {
    GroupApiError::network(format!("{:?}: {}", code, message))
}

/// 409 means the user is already a member.
fn add_member_result(status: u16, body: &str) -> Result<bool, GroupApiError> {
    match status {
        200..=299 | 409 => Ok(true),
        _ => Err(GroupApiError::from_status(status, body)),
    }
}

/// Reads `allowExternalMembers` from a Groups Settings resource.
fn parse_external_member_policy(body: &str) -> Result<bool, GroupApiError> {
    let settings: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| GroupApiError::network(format!("Malformed group settings: {}", e)))?;
    match settings.as_object() {
        Some(fields) if !fields.is_empty() => Ok(fields
            .get("allowExternalMembers")
            .and_then(|v| v.as_str())
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))),
        // The API answers with an empty resource when the caller cannot read the settings.
        _ => Err(GroupApiError::new(
            GroupApiErrorKind::AccessDenied,
            "Group settings are not visible to this account",
        )),
    }
}

fn encode_path_segment(segment: &str) -> String {
    urlencoding::encode(segment.trim()).into_owned()
}
