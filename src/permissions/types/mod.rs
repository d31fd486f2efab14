pub mod grant;
pub mod policy;
pub mod request;

pub use grant::{ConsentGrant, GrantStatus, PartyPair};
pub use policy::ApprovalPolicy;
pub use request::{AccessRequest, Decision, RequestStatus};
