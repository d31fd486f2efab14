use crate::error::{ConsentError, ConsentResult};
use crate::schema::field_path::FieldSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// The (holder, requester) pair a grant or request relates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartyPair {
    pub holder_id: String,
    pub requester_id: String,
}

impl PartyPair {
    pub fn new(holder_id: impl Into<String>, requester_id: impl Into<String>) -> Self {
        Self {
            holder_id: holder_id.into(),
            requester_id: requester_id.into(),
        }
    }

    /// Unambiguous storage key. The holder id is length-prefixed so that no
    /// two distinct pairs share a key and all pairs of one holder share a
    /// key prefix.
    pub fn storage_key(&self) -> String {
        format!("{}{}", Self::holder_prefix(&self.holder_id), self.requester_id)
    }

    /// Key prefix shared by every pair with this holder.
    pub fn holder_prefix(holder_id: &str) -> String {
        format!("{}:{}", holder_id.len(), holder_id)
    }
}

impl fmt::Display for PartyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.holder_id, self.requester_id)
    }
}

/// Lifecycle status of a [`ConsentGrant`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrantStatus {
    Pending,
    Active,
    /// Terminal. Reconnecting creates a new grant.
    Revoked,
}

impl fmt::Display for GrantStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GrantStatus::Pending => "Pending",
            GrantStatus::Active => "Active",
            GrantStatus::Revoked => "Revoked",
        };
        write!(f, "{s}")
    }
}

/// Authorization for one requester to view a set of a holder's fields.
///
/// Grants are never deleted. Revocation clears the field set and marks the
/// grant terminal, leaving it in the pair's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsentGrant {
    pub grant_id: Uuid,
    pub holder_id: String,
    pub requester_id: String,
    pub approved_fields: FieldSet,
    pub status: GrantStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl ConsentGrant {
    fn with_status(pair: &PartyPair, status: GrantStatus) -> Self {
        let now = Utc::now();
        Self {
            grant_id: Uuid::new_v4(),
            holder_id: pair.holder_id.clone(),
            requester_id: pair.requester_id.clone(),
            approved_fields: FieldSet::new(),
            status,
            created_at: now,
            updated_at: now,
            revoked_at: None,
        }
    }

    /// A holder-initiated connection: active, nothing shared yet.
    pub fn new_active(pair: &PartyPair) -> Self {
        Self::with_status(pair, GrantStatus::Active)
    }

    /// A requester-first connection awaiting its first approval.
    pub fn new_pending(pair: &PartyPair) -> Self {
        Self::with_status(pair, GrantStatus::Pending)
    }

    pub fn pair(&self) -> PartyPair {
        PartyPair::new(&self.holder_id, &self.requester_id)
    }

    pub fn is_active(&self) -> bool {
        self.status == GrantStatus::Active
    }

    pub fn is_revoked(&self) -> bool {
        self.status == GrantStatus::Revoked
    }

    /// Sets the approved fields and makes the grant active.
    pub fn approve(&mut self, fields: FieldSet) -> ConsentResult<()> {
        if self.is_revoked() {
            return Err(ConsentError::AlreadyRevoked {
                holder_id: self.holder_id.clone(),
                requester_id: self.requester_id.clone(),
            });
        }
        self.approved_fields = fields;
        self.status = GrantStatus::Active;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Marks the grant revoked and clears its fields.
    pub fn revoke(&mut self) -> ConsentResult<()> {
        if self.is_revoked() {
            return Err(ConsentError::AlreadyRevoked {
                holder_id: self.holder_id.clone(),
                requester_id: self.requester_id.clone(),
            });
        }
        let now = Utc::now();
        self.approved_fields.clear();
        self.status = GrantStatus::Revoked;
        self.updated_at = now;
        self.revoked_at = Some(now);
        Ok(())
    }
}
