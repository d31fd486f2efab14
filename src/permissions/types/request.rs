use crate::error::{ConsentError, ConsentResult};
use crate::permissions::types::grant::PartyPair;
use crate::schema::field_path::FieldSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle status of an [`AccessRequest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    Pending,
    Approved,
    Denied,
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequestStatus::Pending => "Pending",
            RequestStatus::Approved => "Approved",
            RequestStatus::Denied => "Denied",
        };
        write!(f, "{s}")
    }
}

/// The holder's answer to a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Approve,
    Deny,
}

/// One ask by a requester for a specific set of a holder's fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessRequest {
    pub request_id: Uuid,
    pub holder_id: String,
    pub requester_id: String,
    pub requested_fields: FieldSet,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AccessRequest {
    /// A new pending request. Callers guarantee `requested_fields` is non-empty.
    pub fn new(pair: &PartyPair, requested_fields: FieldSet) -> Self {
        let now = Utc::now();
        Self {
            request_id: Uuid::new_v4(),
            holder_id: pair.holder_id.clone(),
            requester_id: pair.requester_id.clone(),
            requested_fields,
            status: RequestStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn pair(&self) -> PartyPair {
        PartyPair::new(&self.holder_id, &self.requester_id)
    }

    pub fn is_pending(&self) -> bool {
        self.status == RequestStatus::Pending
    }

    /// Applies the holder's decision. A request resolves exactly once.
    pub fn resolve(&mut self, decision: Decision) -> ConsentResult<()> {
        if !self.is_pending() {
            return Err(ConsentError::AlreadyResolved {
                request_id: self.request_id.to_string(),
                status: self.status.to_string(),
            });
        }
        self.status = match decision {
            Decision::Approve => RequestStatus::Approved,
            Decision::Deny => RequestStatus::Denied,
        };
        self.updated_at = Utc::now();
        Ok(())
    }
}
