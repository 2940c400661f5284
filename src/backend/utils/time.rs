use crate::models::common::Timestamp;

/// Returns the current time as nanoseconds since epoch.
/// Uses the IC clock inside a canister and the system clock elsewhere.
pub fn now() -> Timestamp {
    #[cfg(target_arch = "wasm32")]
    {
        ic_cdk::api::time()
    }

    #[cfg(not(target_arch = "wasm32"))]
    {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as Timestamp)
            .unwrap_or_default()
    }
}
