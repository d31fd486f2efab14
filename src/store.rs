//! Collaborator contracts for persistence.
//!
//! [`ConsentStore`] holds grants and requests; [`RecordStore`] holds holder
//! records addressed by [`ContentId`]. The registry depends only on these
//! traits. [`DbOperations`](crate::db_operations::DbOperations) implements both
//! over sled.

use crate::error::StorageResult;
use crate::permissions::types::{AccessRequest, ConsentGrant, PartyPair};
use crate::schema::field_path::Record;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque identifier of a stored record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(String);

impl ContentId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One write inside a [`ConsentBatch`].
#[derive(Debug, Clone)]
pub enum ConsentWrite {
    /// Insert or overwrite a grant and make it the pair's current grant.
    PutGrant(ConsentGrant),
    /// Insert or overwrite a request, keeping the pending index in step.
    PutRequest(AccessRequest),
    /// Physically remove a request.
    DeleteRequest(AccessRequest),
}

/// Writes that must land together or not at all.
#[derive(Debug, Clone, Default)]
pub struct ConsentBatch {
    writes: Vec<ConsentWrite>,
}

impl ConsentBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_grant(mut self, grant: ConsentGrant) -> Self {
        self.writes.push(ConsentWrite::PutGrant(grant));
        self
    }

    pub fn put_request(mut self, request: AccessRequest) -> Self {
        self.writes.push(ConsentWrite::PutRequest(request));
        self
    }

    pub fn delete_request(mut self, request: AccessRequest) -> Self {
        self.writes.push(ConsentWrite::DeleteRequest(request));
        self
    }

    pub fn writes(&self) -> &[ConsentWrite] {
        &self.writes
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

/// Transactional storage for grants and requests.
pub trait ConsentStore: Send + Sync {
    /// Most recent grant for the pair, whatever its status.
    fn current_grant(&self, pair: &PartyPair) -> StorageResult<Option<ConsentGrant>>;

    /// Every grant ever created for the pair, oldest first.
    fn grant_history(&self, pair: &PartyPair) -> StorageResult<Vec<ConsentGrant>>;

    /// Current grant of every pair with this holder.
    fn grants_for_holder(&self, holder_id: &str) -> StorageResult<Vec<ConsentGrant>>;

    /// Current grant of every pair with this requester.
    fn grants_for_requester(&self, requester_id: &str) -> StorageResult<Vec<ConsentGrant>>;

    fn request(&self, request_id: &Uuid) -> StorageResult<Option<AccessRequest>>;

    /// The single pending request for the pair, if any.
    fn pending_request(&self, pair: &PartyPair) -> StorageResult<Option<AccessRequest>>;

    fn requests_for_holder(&self, holder_id: &str) -> StorageResult<Vec<AccessRequest>>;

    fn requests_for_requester(&self, requester_id: &str) -> StorageResult<Vec<AccessRequest>>;

    /// Applies every write atomically.
    fn commit(&self, batch: ConsentBatch) -> StorageResult<()>;
}

/// Content-addressed storage for holder records.
pub trait RecordStore: Send + Sync {
    /// Stores a record and makes it the holder's current one.
    fn store(&self, holder_id: &str, record: &Record) -> StorageResult<ContentId>;

    /// Fetches a record the holder stored earlier.
    fn retrieve(&self, holder_id: &str, content_id: &ContentId) -> StorageResult<Option<Record>>;

    /// The holder's current record, if they ever stored one.
    fn latest(&self, holder_id: &str) -> StorageResult<Option<ContentId>>;
}
