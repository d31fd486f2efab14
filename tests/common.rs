//! Common test utilities and fixtures for consent tests
//!
//! Each fixture owns a temporary sled database that is removed when the
//! fixture is dropped.

#![allow(dead_code)]

use fold_consent::db_operations::DbOperations;
use fold_consent::{
    ApprovalPolicy, ConsentNode, ConsentRegistry, FieldSet, Record, SchemaFieldCatalog,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;

pub const HOLDER: &str = "patient-h";
pub const REQUESTER: &str = "doctor-d";

/// Common test fixture shared by the integration tests
pub struct CommonTestFixture {
    pub node: ConsentNode,
    pub db_ops: Arc<DbOperations>,
    pub _temp_dir: TempDir,
}

impl CommonTestFixture {
    /// Create a fixture using the given approval policy
    pub fn with_policy(policy: ApprovalPolicy) -> Self {
        init_logging();
        let temp_dir = tempfile::tempdir().expect("temp dir");
        let db = sled::Config::new()
            .path(temp_dir.path())
            .temporary(true)
            .open()
            .expect("temporary database");
        let db_ops = Arc::new(DbOperations::new(db).expect("db operations"));
        let registry = ConsentRegistry::new(
            db_ops.clone(),
            Arc::new(SchemaFieldCatalog::clinical_default()),
            policy,
        );
        let node = ConsentNode::from_parts(registry, db_ops.clone());

        Self {
            node,
            db_ops,
            _temp_dir: temp_dir,
        }
    }

    /// Create a fixture with the default (replace) approval policy
    pub fn new() -> Self {
        Self::with_policy(ApprovalPolicy::default())
    }

    pub fn registry(&self) -> &ConsentRegistry {
        self.node.registry()
    }
}

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn fields(paths: &[&str]) -> FieldSet {
    FieldSet::parse_all(paths).expect("valid paths")
}

pub fn record(value: Value) -> Record {
    value.as_object().cloned().expect("object")
}

/// The clinical record used by the end-to-end scenarios
pub fn sample_record() -> Record {
    record(json!({
        "vitals": {"heartRate": 72, "temperature": 98.6},
        "patientInfo": {"bloodType": "A+"}
    }))
}
