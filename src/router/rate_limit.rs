//! Rate-limit classification
//!
//! Provider SDKs surface throttling in different places: the HTTP status, a
//! numeric or string error code, or only in free text. The check is
//! deliberately loose across all three.

use crate::providers::ErrorCode;

const RATE_LIMIT_STATUS: u16 = 429;

/// Returns true if the failure describes provider-side throttling
///
/// True when any of:
/// - `status` is 429
/// - `code` is numeric 429, or a string equal to `"429"` after trimming
/// - `message` contains "rate limit" (case-insensitive)
pub fn is_rate_limited(status: Option<u16>, code: Option<&ErrorCode>, message: Option<&str>) -> bool {
    if status == Some(RATE_LIMIT_STATUS) {
        return true;
    }

    match code {
        Some(ErrorCode::Numeric(n)) if *n == i64::from(RATE_LIMIT_STATUS) => return true,
        Some(ErrorCode::Text(s)) if s.trim() == "429" => return true,
        _ => {}
    }

    message.is_some_and(|m| m.to_lowercase().contains("rate limit"))
}
