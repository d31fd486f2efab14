/// Sled tree names used by the consent store.
///
/// Changing any of these orphans existing data.
pub const GRANTS_TREE: &str = "consent_grants";
pub const GRANT_HISTORY_TREE: &str = "consent_grant_history";
pub const ACCESS_REQUESTS_TREE: &str = "access_requests";
pub const PENDING_REQUESTS_TREE: &str = "pending_access_requests";
pub const RECORDS_TREE: &str = "holder_records";
pub const RECORD_HEADS_TREE: &str = "holder_record_heads";
