use super::core::DbOperations;
use crate::error::{StorageError, StorageResult};
use crate::permissions::types::PartyPair;
use crate::schema::field_path::Record;
use crate::store::{ContentId, RecordStore};
use log::info;
use sha2::{Digest, Sha256};
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::Transactional;

/// Hex SHA-256 of the record's JSON encoding.
///
/// serde_json objects are key-ordered, so equal records get equal ids.
pub fn content_id_for(bytes: &[u8]) -> ContentId {
    ContentId::new(hex::encode(Sha256::digest(bytes)))
}

fn record_key(holder_id: &str, content_id: &ContentId) -> String {
    format!("{}{}", PartyPair::holder_prefix(holder_id), content_id)
}

impl RecordStore for DbOperations {
    fn store(&self, holder_id: &str, record: &Record) -> StorageResult<ContentId> {
        let bytes = serde_json::to_vec(record).map_err(StorageError::serialization("record"))?;
        let content_id = content_id_for(&bytes);
        let key = record_key(holder_id, &content_id);

        (&self.records_tree, &self.record_heads_tree)
            .transaction(
                |(records, heads)| -> Result<(), ConflictableTransactionError<StorageError>> {
                    records.insert(key.as_bytes(), bytes.clone())?;
                    heads.insert(holder_id.as_bytes(), content_id.as_str().as_bytes())?;
                    Ok(())
                },
            )
            .map_err(|e: TransactionError<StorageError>| match e {
                TransactionError::Abort(err) => err,
                TransactionError::Storage(err) => StorageError::Database(err),
            })?;
        self.flush()?;

        info!("Stored record {} for holder {}", content_id, holder_id);
        Ok(content_id)
    }

    fn retrieve(&self, holder_id: &str, content_id: &ContentId) -> StorageResult<Option<Record>> {
        self.get_from_tree(&self.records_tree, &record_key(holder_id, content_id))
    }

    fn latest(&self, holder_id: &str) -> StorageResult<Option<ContentId>> {
        Ok(self
            .record_heads_tree
            .get(holder_id.as_bytes())?
            .map(|id| ContentId::new(String::from_utf8_lossy(&id).to_string())))
    }
}
