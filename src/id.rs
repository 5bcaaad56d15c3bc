//! ID generation utilities
//!
//! Activity identifiers and millisecond timestamps.

use uuid::Uuid;

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Generate a unique activity ID
///
/// Format: `act-{timestamp_ms}-{8 hex chars}`
/// Example: `act-1738300800123-9f1c02ab`
pub fn generate_activity_id() -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("act-{}-{}", now_ms(), &random[..8])
}
