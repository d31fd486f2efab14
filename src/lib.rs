//! Consent grants and field-level access control.
//!
//! A holder connects with a requester, the requester asks for named fields of
//! the holder's record, the holder approves or denies, and later reads by the
//! requester are projected down to exactly the approved fields.
//!
//! * [`schema`] - dotted field paths, field sets, and the recognized-field catalog
//! * [`permissions`] - grants, requests, the [`ConsentRegistry`] and [`RecordProjector`]
//! * [`store`] and [`db_operations`] - persistence contracts and their sled implementation
//! * [`consent_node`] - the wired-up facade an API layer calls

pub mod config;
pub mod consent_node;
pub mod constants;
pub mod db_operations;
pub mod error;
pub mod permissions;
pub mod schema;
pub mod store;

pub use config::{ConfigError, ConsentConfig};
pub use consent_node::ConsentNode;
pub use error::{ConsentError, ConsentResult, ErrorKind, StorageError};
pub use permissions::{
    AccessRequest, ApprovalPolicy, ConsentGrant, ConsentRegistry, Decision, GrantStatus,
    RecordProjector, RequestStatus,
};
pub use schema::{FieldCatalog, FieldPath, FieldSet, Record, SchemaFieldCatalog};
pub use store::{ConsentStore, ContentId, RecordStore};
