//! Consent grants, access requests, and the field projection they gate.

pub mod pair_locks;
pub mod projector;
pub mod registry;
pub mod types;

pub use pair_locks::PairLocks;
pub use projector::RecordProjector;
pub use registry::ConsentRegistry;
pub use types::{
    AccessRequest, ApprovalPolicy, ConsentGrant, Decision, GrantStatus, PartyPair, RequestStatus,
};
