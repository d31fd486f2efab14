use crate::config::DEFAULT_LOCK_STRIPES;
use crate::error::{ConsentError, ConsentResult};
use crate::permissions::pair_locks::PairLocks;
use crate::permissions::types::{
    AccessRequest, ApprovalPolicy, ConsentGrant, Decision, GrantStatus, PartyPair,
};
use crate::schema::catalog::FieldCatalog;
use crate::schema::field_path::FieldSet;
use crate::store::{ConsentBatch, ConsentStore};
use log::{debug, info, warn};
use std::sync::Arc;
use uuid::Uuid;

/// Creates, resolves, and revokes consent between holders and requesters.
///
/// The registry is the only writer of [`ConsentGrant`] and [`AccessRequest`]
/// state. It keeps nothing in memory: every operation reads the store, checks
/// its preconditions, and commits one atomic batch while holding the pair's
/// lock, so concurrent calls on the same pair serialize and the
/// one-active-grant and one-pending-request rules hold.
///
/// Per pair, a grant moves `Pending -> Active -> Revoked` and each request
/// moves `Pending -> Approved | Denied` (or is deleted by its requester while
/// pending). The two tracks meet only when a request is approved.
pub struct ConsentRegistry {
    store: Arc<dyn ConsentStore>,
    catalog: Arc<dyn FieldCatalog>,
    policy: ApprovalPolicy,
    locks: PairLocks,
}

impl ConsentRegistry {
    pub fn new(
        store: Arc<dyn ConsentStore>,
        catalog: Arc<dyn FieldCatalog>,
        policy: ApprovalPolicy,
    ) -> Self {
        Self {
            store,
            catalog,
            policy,
            locks: PairLocks::new(DEFAULT_LOCK_STRIPES),
        }
    }

    /// Replace the pair lock table with one of `stripes` stripes.
    pub fn with_lock_stripes(mut self, stripes: usize) -> Self {
        self.locks = PairLocks::new(stripes);
        self
    }

    pub fn approval_policy(&self) -> ApprovalPolicy {
        self.policy
    }

    /// Holder connects with a requester, sharing nothing yet.
    ///
    /// A pending (requester-initiated) grant is activated in place. A revoked
    /// grant is left in history and a new grant is created.
    pub fn initiate_connection(
        &self,
        holder_id: &str,
        requester_id: &str,
    ) -> ConsentResult<ConsentGrant> {
        let pair = PartyPair::new(holder_id, requester_id);
        let _guard = self.locks.lock(&pair)?;

        let grant = match self.store.current_grant(&pair)? {
            Some(existing) if existing.is_active() => {
                warn!("Rejected connection {pair}: already connected");
                return Err(ConsentError::AlreadyConnected {
                    holder_id: pair.holder_id,
                    requester_id: pair.requester_id,
                });
            }
            Some(mut pending) if pending.status == GrantStatus::Pending => {
                let fields = pending.approved_fields.clone();
                pending.approve(fields)?;
                pending
            }
            _ => ConsentGrant::new_active(&pair),
        };

        self.store.commit(ConsentBatch::new().put_grant(grant.clone()))?;
        info!("Connected {pair} with grant {}", grant.grant_id);
        Ok(grant)
    }

    /// Requester asks a holder to connect. The grant stays pending until the
    /// holder connects or approves a request.
    pub fn request_connection(
        &self,
        requester_id: &str,
        holder_id: &str,
    ) -> ConsentResult<ConsentGrant> {
        let pair = PartyPair::new(holder_id, requester_id);
        let _guard = self.locks.lock(&pair)?;

        if let Some(existing) = self.store.current_grant(&pair)? {
            if !existing.is_revoked() {
                warn!("Rejected connection request {pair}: grant is {}", existing.status);
                return Err(ConsentError::AlreadyConnected {
                    holder_id: pair.holder_id,
                    requester_id: pair.requester_id,
                });
            }
        }

        let grant = ConsentGrant::new_pending(&pair);
        self.store.commit(ConsentBatch::new().put_grant(grant.clone()))?;
        info!("Pending connection {pair} with grant {}", grant.grant_id);
        Ok(grant)
    }

    /// Requester asks to see `requested_fields` of the holder's record.
    ///
    /// Checks, in order: an active grant exists, no request is already
    /// pending, the field set is non-empty, and every field is recognized.
    pub fn request_access(
        &self,
        requester_id: &str,
        holder_id: &str,
        requested_fields: FieldSet,
    ) -> ConsentResult<AccessRequest> {
        let pair = PartyPair::new(holder_id, requester_id);
        let _guard = self.locks.lock(&pair)?;

        let connected = self
            .store
            .current_grant(&pair)?
            .is_some_and(|g| g.is_active());
        if !connected {
            warn!("Rejected access request {pair}: no active connection");
            return Err(ConsentError::NoActiveConnection {
                holder_id: pair.holder_id,
                requester_id: pair.requester_id,
            });
        }

        if let Some(pending) = self.store.pending_request(&pair)? {
            warn!("Rejected access request {pair}: {} is pending", pending.request_id);
            return Err(ConsentError::DuplicateRequest {
                holder_id: pair.holder_id,
                requester_id: pair.requester_id,
                request_id: pending.request_id.to_string(),
            });
        }

        if requested_fields.is_empty() {
            return Err(ConsentError::EmptyFieldSet);
        }

        if let Some(unknown) = self.catalog.first_unrecognized(&requested_fields) {
            warn!("Rejected access request {pair}: unknown field {unknown}");
            return Err(ConsentError::UnknownField {
                field: unknown.as_dotted(),
            });
        }

        let request = AccessRequest::new(&pair, requested_fields);
        self.store
            .commit(ConsentBatch::new().put_request(request.clone()))?;
        info!(
            "Access request {} {pair} for {}",
            request.request_id, request.requested_fields
        );
        Ok(request)
    }

    /// Like [`request_access`](Self::request_access), taking dotted strings.
    pub fn request_access_dotted<I, S>(
        &self,
        requester_id: &str,
        holder_id: &str,
        paths: I,
    ) -> ConsentResult<AccessRequest>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let fields = FieldSet::parse_all(paths)?;
        self.request_access(requester_id, holder_id, fields)
    }

    /// Loads a request, checks `is_owner` against it, then locks its pair and
    /// re-reads it so the caller sees the state the lock protects.
    fn lock_owned_request<'a>(
        &'a self,
        caller_id: &str,
        request_id: &Uuid,
        is_owner: impl Fn(&AccessRequest) -> bool,
    ) -> ConsentResult<(std::sync::MutexGuard<'a, ()>, AccessRequest)> {
        let request = self
            .store
            .request(request_id)?
            .ok_or_else(|| ConsentError::request_not_found(&request_id.to_string()))?;
        if !is_owner(&request) {
            warn!("Rejected {caller_id} acting on request {request_id}: not owner");
            return Err(ConsentError::NotOwner {
                caller_id: caller_id.to_string(),
                request_id: request_id.to_string(),
            });
        }

        let guard = self.locks.lock(&request.pair())?;
        let request = self
            .store
            .request(request_id)?
            .ok_or_else(|| ConsentError::request_not_found(&request_id.to_string()))?;
        Ok((guard, request))
    }

    /// Requester withdraws a pending request. The request is deleted.
    pub fn cancel_request(&self, requester_id: &str, request_id: &Uuid) -> ConsentResult<()> {
        let (_guard, request) =
            self.lock_owned_request(requester_id, request_id, |r| r.requester_id == requester_id)?;

        if !request.is_pending() {
            return Err(ConsentError::NotPending {
                request_id: request_id.to_string(),
                status: request.status.to_string(),
            });
        }

        self.store
            .commit(ConsentBatch::new().delete_request(request))?;
        info!("Cancelled access request {request_id}");
        Ok(())
    }

    /// Holder approves or denies a pending request.
    ///
    /// Approval updates the pair's grant according to the approval policy in
    /// the same commit that marks the request approved. If the pair has no
    /// grant at all, a new active one is created. A revoked grant cannot be
    /// approved into; the holder must connect again first.
    pub fn resolve_request(
        &self,
        holder_id: &str,
        request_id: &Uuid,
        decision: Decision,
    ) -> ConsentResult<AccessRequest> {
        let (_guard, mut request) =
            self.lock_owned_request(holder_id, request_id, |r| r.holder_id == holder_id)?;

        request.resolve(decision)?;
        let mut batch = ConsentBatch::new().put_request(request.clone());

        if decision == Decision::Approve {
            let pair = request.pair();
            let mut grant = match self.store.current_grant(&pair)? {
                Some(grant) if grant.is_revoked() => {
                    warn!("Rejected approval of {request_id} {pair}: grant is revoked");
                    return Err(ConsentError::NoActiveConnection {
                        holder_id: pair.holder_id,
                        requester_id: pair.requester_id,
                    });
                }
                Some(grant) => grant,
                None => ConsentGrant::new_active(&pair),
            };
            let fields = self
                .policy
                .apply(&grant.approved_fields, &request.requested_fields);
            grant.approve(fields)?;
            info!(
                "Grant {} {pair} now shares {}",
                grant.grant_id, grant.approved_fields
            );
            batch = batch.put_grant(grant);
        }

        self.store.commit(batch)?;
        info!("Resolved access request {request_id} as {}", request.status);
        Ok(request)
    }

    /// Holder revokes the requester's access. The grant keeps its history
    /// entry with an empty field set, and a request still pending for the
    /// pair is denied in the same commit.
    pub fn revoke(&self, holder_id: &str, requester_id: &str) -> ConsentResult<()> {
        let pair = PartyPair::new(holder_id, requester_id);
        let _guard = self.locks.lock(&pair)?;

        let mut grant = self
            .store
            .current_grant(&pair)?
            .ok_or_else(|| ConsentError::grant_not_found(holder_id, requester_id))?;
        grant.revoke()?;
        let mut batch = ConsentBatch::new().put_grant(grant.clone());

        if let Some(mut pending) = self.store.pending_request(&pair)? {
            pending.resolve(Decision::Deny)?;
            info!("Denied access request {} {pair} on revoke", pending.request_id);
            batch = batch.put_request(pending);
        }

        self.store.commit(batch)?;
        info!("Revoked grant {} {pair}", grant.grant_id);
        Ok(())
    }

    /// Fields the requester may currently see. Empty unless the pair has an
    /// active grant.
    ///
    /// Read fresh from the store on every call; callers must not cache the
    /// result across reads.
    pub fn get_approved_fields(&self, holder_id: &str, requester_id: &str) -> ConsentResult<FieldSet> {
        let pair = PartyPair::new(holder_id, requester_id);
        let fields = match self.store.current_grant(&pair)? {
            Some(grant) if grant.is_active() => grant.approved_fields,
            _ => FieldSet::new(),
        };
        debug!("Approved fields {pair}: {fields}");
        Ok(fields)
    }

    pub fn current_grant(&self, holder_id: &str, requester_id: &str) -> ConsentResult<Option<ConsentGrant>> {
        Ok(self
            .store
            .current_grant(&PartyPair::new(holder_id, requester_id))?)
    }

    /// Every grant the pair has had, oldest first, revoked ones included.
    pub fn grant_history(&self, holder_id: &str, requester_id: &str) -> ConsentResult<Vec<ConsentGrant>> {
        Ok(self
            .store
            .grant_history(&PartyPair::new(holder_id, requester_id))?)
    }

    pub fn get_request(&self, request_id: &Uuid) -> ConsentResult<AccessRequest> {
        self.store
            .request(request_id)?
            .ok_or_else(|| ConsentError::request_not_found(&request_id.to_string()))
    }

    /// The holder's inbox: pending requests, oldest first.
    pub fn pending_requests_for_holder(&self, holder_id: &str) -> ConsentResult<Vec<AccessRequest>> {
        let mut requests = self.store.requests_for_holder(holder_id)?;
        requests.retain(AccessRequest::is_pending);
        Ok(requests)
    }

    /// Every request the requester has made that was not cancelled.
    pub fn requests_by_requester(&self, requester_id: &str) -> ConsentResult<Vec<AccessRequest>> {
        Ok(self.store.requests_for_requester(requester_id)?)
    }

    /// Active grants where this party is the holder.
    pub fn connections_for_holder(&self, holder_id: &str) -> ConsentResult<Vec<ConsentGrant>> {
        let mut grants = self.store.grants_for_holder(holder_id)?;
        grants.retain(ConsentGrant::is_active);
        Ok(grants)
    }

    /// Active grants where this party is the requester.
    pub fn connections_for_requester(&self, requester_id: &str) -> ConsentResult<Vec<ConsentGrant>> {
        let mut grants = self.store.grants_for_requester(requester_id)?;
        grants.retain(ConsentGrant::is_active);
        Ok(grants)
    }
}
