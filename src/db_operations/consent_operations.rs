use super::core::DbOperations;
use crate::error::{StorageError, StorageResult};
use crate::permissions::types::{AccessRequest, ConsentGrant, PartyPair};
use crate::store::{ConsentBatch, ConsentStore, ConsentWrite};
use log::debug;
use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionalTree};
use sled::Transactional;
use uuid::Uuid;

type TxResult<T> = Result<T, ConflictableTransactionError<StorageError>>;

/// A batch write with its payload already serialized, so the transaction
/// closure only moves bytes and can be retried freely on conflict.
enum PreparedWrite {
    Grant {
        id: String,
        pair_key: String,
        bytes: Vec<u8>,
    },
    Request {
        id: String,
        pair_key: String,
        pending: bool,
        bytes: Vec<u8>,
    },
    Delete {
        id: String,
        pair_key: String,
    },
}

fn prepare(write: &ConsentWrite) -> StorageResult<PreparedWrite> {
    Ok(match write {
        ConsentWrite::PutGrant(grant) => {
            let id = grant.grant_id.to_string();
            let bytes = serde_json::to_vec(grant).map_err(StorageError::serialization(&id))?;
            PreparedWrite::Grant {
                pair_key: grant.pair().storage_key(),
                id,
                bytes,
            }
        }
        ConsentWrite::PutRequest(request) => {
            let id = request.request_id.to_string();
            let bytes = serde_json::to_vec(request).map_err(StorageError::serialization(&id))?;
            PreparedWrite::Request {
                pair_key: request.pair().storage_key(),
                pending: request.is_pending(),
                id,
                bytes,
            }
        }
        ConsentWrite::DeleteRequest(request) => PreparedWrite::Delete {
            id: request.request_id.to_string(),
            pair_key: request.pair().storage_key(),
        },
    })
}

fn abort<T>(err: StorageError) -> TxResult<T> {
    Err(ConflictableTransactionError::Abort(err))
}

/// Appends `grant_id` to the pair's history if it is not already there.
fn append_history(history: &TransactionalTree, pair_key: &str, grant_id: &str) -> TxResult<()> {
    let mut ids: Vec<String> = match history.get(pair_key.as_bytes())? {
        Some(bytes) => match serde_json::from_slice(&bytes) {
            Ok(ids) => ids,
            Err(e) => return abort(StorageError::serialization(pair_key)(e)),
        },
        None => Vec::new(),
    };
    if !ids.iter().any(|id| id == grant_id) {
        ids.push(grant_id.to_string());
        let bytes = match serde_json::to_vec(&ids) {
            Ok(bytes) => bytes,
            Err(e) => return abort(StorageError::serialization(pair_key)(e)),
        };
        history.insert(pair_key.as_bytes(), bytes)?;
    }
    Ok(())
}

/// Removes the pair's pending index entry if it points at `request_id`.
fn clear_pending(pending: &TransactionalTree, pair_key: &str, request_id: &str) -> TxResult<()> {
    if let Some(current) = pending.get(pair_key.as_bytes())? {
        if current.as_ref() == request_id.as_bytes() {
            pending.remove(pair_key.as_bytes())?;
        }
    }
    Ok(())
}

impl DbOperations {
    fn grant_ids(&self, pair_key: &str) -> StorageResult<Vec<String>> {
        Ok(self
            .get_from_tree::<Vec<String>>(&self.grant_history_tree, pair_key)?
            .unwrap_or_default())
    }

    fn load_grant(&self, grant_id: &str) -> StorageResult<ConsentGrant> {
        self.get_from_tree(&self.grants_tree, grant_id)?
            .ok_or_else(|| StorageError::Corrupted(format!("grant {grant_id} is indexed but missing")))
    }

    fn current_grants_matching(
        &self,
        prefix: &str,
        keep: impl Fn(&ConsentGrant) -> bool,
    ) -> StorageResult<Vec<ConsentGrant>> {
        let mut grants = Vec::new();
        for (_, ids) in self.list_items_with_prefix::<Vec<String>>(&self.grant_history_tree, prefix)? {
            if let Some(latest) = ids.last() {
                let grant = self.load_grant(latest)?;
                if keep(&grant) {
                    grants.push(grant);
                }
            }
        }
        grants.sort_by_key(|g| g.created_at);
        Ok(grants)
    }

    fn requests_matching(
        &self,
        keep: impl Fn(&AccessRequest) -> bool,
    ) -> StorageResult<Vec<AccessRequest>> {
        let mut requests: Vec<AccessRequest> = self
            .list_items_in_tree::<AccessRequest>(&self.access_requests_tree)?
            .into_iter()
            .map(|(_, request)| request)
            .filter(|request| keep(request))
            .collect();
        requests.sort_by_key(|r| r.created_at);
        Ok(requests)
    }
}

impl ConsentStore for DbOperations {
    fn current_grant(&self, pair: &PartyPair) -> StorageResult<Option<ConsentGrant>> {
        match self.grant_ids(&pair.storage_key())?.last() {
            Some(id) => Ok(Some(self.load_grant(id)?)),
            None => Ok(None),
        }
    }

    fn grant_history(&self, pair: &PartyPair) -> StorageResult<Vec<ConsentGrant>> {
        self.grant_ids(&pair.storage_key())?
            .iter()
            .map(|id| self.load_grant(id))
            .collect()
    }

    fn grants_for_holder(&self, holder_id: &str) -> StorageResult<Vec<ConsentGrant>> {
        let prefix = PartyPair::holder_prefix(holder_id);
        self.current_grants_matching(&prefix, |g| g.holder_id == holder_id)
    }

    fn grants_for_requester(&self, requester_id: &str) -> StorageResult<Vec<ConsentGrant>> {
        self.current_grants_matching("", |g| g.requester_id == requester_id)
    }

    fn request(&self, request_id: &Uuid) -> StorageResult<Option<AccessRequest>> {
        self.get_from_tree(&self.access_requests_tree, &request_id.to_string())
    }

    fn pending_request(&self, pair: &PartyPair) -> StorageResult<Option<AccessRequest>> {
        let Some(id) = self.pending_requests_tree.get(pair.storage_key().as_bytes())? else {
            return Ok(None);
        };
        let id = String::from_utf8_lossy(&id).to_string();
        let request: AccessRequest = self
            .get_from_tree(&self.access_requests_tree, &id)?
            .ok_or_else(|| StorageError::Corrupted(format!("pending request {id} is indexed but missing")))?;
        Ok(Some(request))
    }

    fn requests_for_holder(&self, holder_id: &str) -> StorageResult<Vec<AccessRequest>> {
        self.requests_matching(|r| r.holder_id == holder_id)
    }

    fn requests_for_requester(&self, requester_id: &str) -> StorageResult<Vec<AccessRequest>> {
        self.requests_matching(|r| r.requester_id == requester_id)
    }

    fn commit(&self, batch: ConsentBatch) -> StorageResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        let prepared = batch
            .writes()
            .iter()
            .map(prepare)
            .collect::<StorageResult<Vec<_>>>()?;

        let trees = (
            &self.grants_tree,
            &self.grant_history_tree,
            &self.access_requests_tree,
            &self.pending_requests_tree,
        );
        let result = trees.transaction(|(grants, history, requests, pending)| -> TxResult<()> {
            for write in &prepared {
                match write {
                    PreparedWrite::Grant { id, pair_key, bytes } => {
                        grants.insert(id.as_bytes(), bytes.clone())?;
                        append_history(history, pair_key, id)?;
                    }
                    PreparedWrite::Request {
                        id,
                        pair_key,
                        pending: is_pending,
                        bytes,
                    } => {
                        requests.insert(id.as_bytes(), bytes.clone())?;
                        if *is_pending {
                            pending.insert(pair_key.as_bytes(), id.as_bytes())?;
                        } else {
                            clear_pending(pending, pair_key, id)?;
                        }
                    }
                    PreparedWrite::Delete { id, pair_key } => {
                        requests.remove(id.as_bytes())?;
                        clear_pending(pending, pair_key, id)?;
                    }
                }
            }
            Ok(())
        });

        result.map_err(|e| match e {
            TransactionError::Abort(err) => err,
            TransactionError::Storage(err) => StorageError::Database(err),
        })?;
        self.flush()?;
        debug!("Committed consent batch of {} writes", prepared.len());
        Ok(())
    }
}
