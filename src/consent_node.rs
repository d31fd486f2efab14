use log::info;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::{ConfigResult, ConsentConfig};
use crate::db_operations::DbOperations;
use crate::error::{ConsentError, ConsentResult};
use crate::permissions::{
    AccessRequest, ConsentGrant, ConsentRegistry, Decision, RecordProjector,
};
use crate::schema::field_path::{FieldSet, Record};
use crate::store::{ContentId, RecordStore};

/// A consent node: the registry, a record store, and the projector wired
/// together behind the operations an API layer calls.
///
/// Reads of another party's record always go through
/// [`read_shared_record`](Self::read_shared_record), which fetches the
/// approved fields fresh on every call.
///
/// # Examples
///
/// ```rust,no_run
/// use fold_consent::config::ConsentConfig;
/// use fold_consent::consent_node::ConsentNode;
/// use fold_consent::permissions::Decision;
/// use serde_json::json;
/// use std::path::PathBuf;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let node = ConsentNode::new(ConsentConfig::new(PathBuf::from("data/consent")))?;
///
/// node.initiate_connection("patient-1", "doctor-1")?;
/// let request = node.request_access("doctor-1", "patient-1", ["vitals.heartRate"])?;
/// node.resolve_request("patient-1", &request.request_id, Decision::Approve)?;
///
/// let record = json!({"vitals": {"heartRate": 72, "temperature": 98.6}});
/// node.upload_record("patient-1", record.as_object().unwrap())?;
/// let visible = node.read_shared_record("patient-1", "doctor-1")?;
/// assert_eq!(visible.len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct ConsentNode {
    registry: ConsentRegistry,
    records: Arc<dyn RecordStore>,
    projector: RecordProjector,
}

impl ConsentNode {
    /// Opens the sled database and field catalog named by `config`.
    pub fn new(config: ConsentConfig) -> ConfigResult<Self> {
        config.validate()?;
        let catalog = Arc::new(config.load_catalog()?);
        let db_ops = Arc::new(DbOperations::open(&config.storage_path, config.temporary)?);

        let registry = ConsentRegistry::new(db_ops.clone(), catalog, config.approval_policy)
            .with_lock_stripes(config.lock_stripes);

        info!(
            "Consent node opened at {} with {:?} approval policy",
            config.storage_path.display(),
            config.approval_policy
        );
        Ok(Self::from_parts(registry, db_ops))
    }

    /// Wires an already-built registry to a record store.
    pub fn from_parts(registry: ConsentRegistry, records: Arc<dyn RecordStore>) -> Self {
        Self {
            registry,
            records,
            projector: RecordProjector::new(),
        }
    }

    /// The underlying registry, for the listing and history queries.
    pub fn registry(&self) -> &ConsentRegistry {
        &self.registry
    }

    pub fn initiate_connection(&self, holder_id: &str, requester_id: &str) -> ConsentResult<ConsentGrant> {
        self.registry.initiate_connection(holder_id, requester_id)
    }

    pub fn request_access<I, S>(
        &self,
        requester_id: &str,
        holder_id: &str,
        paths: I,
    ) -> ConsentResult<AccessRequest>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.registry
            .request_access_dotted(requester_id, holder_id, paths)
    }

    pub fn cancel_request(&self, requester_id: &str, request_id: &Uuid) -> ConsentResult<()> {
        self.registry.cancel_request(requester_id, request_id)
    }

    pub fn resolve_request(
        &self,
        holder_id: &str,
        request_id: &Uuid,
        decision: Decision,
    ) -> ConsentResult<AccessRequest> {
        self.registry.resolve_request(holder_id, request_id, decision)
    }

    pub fn revoke(&self, holder_id: &str, requester_id: &str) -> ConsentResult<()> {
        self.registry.revoke(holder_id, requester_id)
    }

    pub fn get_approved_fields(&self, holder_id: &str, requester_id: &str) -> ConsentResult<FieldSet> {
        self.registry.get_approved_fields(holder_id, requester_id)
    }

    /// Stores a new version of the holder's record and makes it current.
    pub fn upload_record(&self, holder_id: &str, record: &Record) -> ConsentResult<ContentId> {
        Ok(self.records.store(holder_id, record)?)
    }

    fn current_record(&self, holder_id: &str) -> ConsentResult<Record> {
        let content_id = self
            .records
            .latest(holder_id)?
            .ok_or_else(|| ConsentError::NoRecordUploaded {
                holder_id: holder_id.to_string(),
            })?;

        let unavailable = |reason: String| ConsentError::RecordUnavailable {
            holder_id: holder_id.to_string(),
            content_id: content_id.to_string(),
            reason,
        };
        match self.records.retrieve(holder_id, &content_id) {
            Ok(Some(record)) => Ok(record),
            Ok(None) => Err(unavailable("record missing from store".to_string())),
            Err(e) => Err(unavailable(e.to_string())),
        }
    }

    /// The holder's full current record.
    pub fn read_own_record(&self, holder_id: &str) -> ConsentResult<Record> {
        self.current_record(holder_id)
    }

    /// The part of the holder's current record the requester may see.
    pub fn read_shared_record(&self, holder_id: &str, requester_id: &str) -> ConsentResult<Record> {
        let approved = self.registry.get_approved_fields(holder_id, requester_id)?;
        let record = self.current_record(holder_id)?;
        let projected = self.projector.project(&record, &approved);
        info!(
            "Requester {} read {} top-level fields of holder {}",
            requester_id,
            projected.len(),
            holder_id
        );
        Ok(projected)
    }
}
