mod common;

use common::{fields, CommonTestFixture, HOLDER, REQUESTER};
use fold_consent::{
    ApprovalPolicy, ConsentError, Decision, ErrorKind, FieldSet, GrantStatus, RequestStatus,
};
use fold_consent::store::{ConsentBatch, ConsentStore};
use uuid::Uuid;

#[test]
fn test_second_connection_is_rejected() {
    let fixture = CommonTestFixture::new();
    let registry = fixture.registry();

    let grant = registry.initiate_connection(HOLDER, REQUESTER).unwrap();
    assert_eq!(grant.status, GrantStatus::Active);
    assert!(grant.approved_fields.is_empty());

    let err = registry.initiate_connection(HOLDER, REQUESTER).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyConnected);
}

#[test]
fn test_connection_is_per_pair() {
    let fixture = CommonTestFixture::new();
    let registry = fixture.registry();

    registry.initiate_connection(HOLDER, REQUESTER).unwrap();
    registry.initiate_connection(HOLDER, "doctor-2").unwrap();
    registry.initiate_connection("patient-2", REQUESTER).unwrap();

    assert_eq!(registry.connections_for_holder(HOLDER).unwrap().len(), 2);
    assert_eq!(registry.connections_for_requester(REQUESTER).unwrap().len(), 2);
}

#[test]
fn test_request_requires_active_connection() {
    let fixture = CommonTestFixture::new();
    let err = fixture
        .registry()
        .request_access(REQUESTER, HOLDER, fields(&["vitals.heartRate"]))
        .unwrap_err();
    assert!(matches!(err, ConsentError::NoActiveConnection { .. }));
}

#[test]
fn test_duplicate_pending_request_rejected_regardless_of_fields() {
    let fixture = CommonTestFixture::new();
    let registry = fixture.registry();
    registry.initiate_connection(HOLDER, REQUESTER).unwrap();

    let first = registry
        .request_access(REQUESTER, HOLDER, fields(&["vitals.heartRate", "patientInfo.bloodType"]))
        .unwrap();
    assert_eq!(first.status, RequestStatus::Pending);

    for second in [fields(&["vitals.heartRate"]), fields(&["allergies"]), FieldSet::new()] {
        let err = registry.request_access(REQUESTER, HOLDER, second).unwrap_err();
        match err {
            ConsentError::DuplicateRequest { request_id, .. } => {
                assert_eq!(request_id, first.request_id.to_string())
            }
            other => panic!("expected DuplicateRequest, got {other:?}"),
        }
    }
}

#[test]
fn test_empty_and_unknown_fields_rejected() {
    let fixture = CommonTestFixture::new();
    let registry = fixture.registry();
    registry.initiate_connection(HOLDER, REQUESTER).unwrap();

    let err = registry
        .request_access(REQUESTER, HOLDER, FieldSet::new())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptyFieldSet);

    let err = registry
        .request_access(REQUESTER, HOLDER, fields(&["vitals.heartRate", "patientInfo.ssn"]))
        .unwrap_err();
    match err {
        ConsentError::UnknownField { field } => assert_eq!(field, "patientInfo.ssn"),
        other => panic!("expected UnknownField, got {other:?}"),
    }

    // Rejections leave nothing pending
    assert!(registry.pending_requests_for_holder(HOLDER).unwrap().is_empty());
}

#[test]
fn test_malformed_dotted_path_rejected() {
    let fixture = CommonTestFixture::new();
    let registry = fixture.registry();
    registry.initiate_connection(HOLDER, REQUESTER).unwrap();

    let err = registry
        .request_access_dotted(REQUESTER, HOLDER, ["vitals..heartRate"])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidFieldPath);
}

#[test]
fn test_approve_replaces_previous_fields() {
    let fixture = CommonTestFixture::new();
    let registry = fixture.registry();
    registry.initiate_connection(HOLDER, REQUESTER).unwrap();

    let first = registry
        .request_access(REQUESTER, HOLDER, fields(&["vitals.heartRate", "allergies"]))
        .unwrap();
    registry
        .resolve_request(HOLDER, &first.request_id, Decision::Approve)
        .unwrap();
    assert_eq!(
        registry.get_approved_fields(HOLDER, REQUESTER).unwrap(),
        fields(&["vitals.heartRate", "allergies"])
    );

    let second = registry
        .request_access(REQUESTER, HOLDER, fields(&["medications"]))
        .unwrap();
    let resolved = registry
        .resolve_request(HOLDER, &second.request_id, Decision::Approve)
        .unwrap();
    assert_eq!(resolved.status, RequestStatus::Approved);

    let approved = registry.get_approved_fields(HOLDER, REQUESTER).unwrap();
    assert_eq!(approved, fields(&["medications"]));
    assert!(!approved.contains_dotted("allergies"));
}

#[test]
fn test_union_policy_merges_fields() {
    let fixture = CommonTestFixture::with_policy(ApprovalPolicy::Union);
    let registry = fixture.registry();
    registry.initiate_connection(HOLDER, REQUESTER).unwrap();

    for paths in [&["vitals.heartRate"][..], &["medications", "vitals.heartRate"][..]] {
        let request = registry.request_access(REQUESTER, HOLDER, fields(paths)).unwrap();
        registry
            .resolve_request(HOLDER, &request.request_id, Decision::Approve)
            .unwrap();
    }

    assert_eq!(
        registry.get_approved_fields(HOLDER, REQUESTER).unwrap(),
        fields(&["medications", "vitals.heartRate"])
    );
}

#[test]
fn test_deny_leaves_grant_untouched() {
    let fixture = CommonTestFixture::new();
    let registry = fixture.registry();
    registry.initiate_connection(HOLDER, REQUESTER).unwrap();

    let first = registry
        .request_access(REQUESTER, HOLDER, fields(&["allergies"]))
        .unwrap();
    registry
        .resolve_request(HOLDER, &first.request_id, Decision::Approve)
        .unwrap();

    let second = registry
        .request_access(REQUESTER, HOLDER, fields(&["medications"]))
        .unwrap();
    let denied = registry
        .resolve_request(HOLDER, &second.request_id, Decision::Deny)
        .unwrap();
    assert_eq!(denied.status, RequestStatus::Denied);
    assert_eq!(
        registry.get_approved_fields(HOLDER, REQUESTER).unwrap(),
        fields(&["allergies"])
    );

    // A denied request no longer blocks a new one
    registry
        .request_access(REQUESTER, HOLDER, fields(&["medications"]))
        .unwrap();
}

#[test]
fn test_resolve_is_once_only_and_owner_only() {
    let fixture = CommonTestFixture::new();
    let registry = fixture.registry();
    registry.initiate_connection(HOLDER, REQUESTER).unwrap();
    let request = registry
        .request_access(REQUESTER, HOLDER, fields(&["allergies"]))
        .unwrap();

    let err = registry
        .resolve_request("patient-other", &request.request_id, Decision::Approve)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotOwner);

    // The requester cannot approve their own request
    let err = registry
        .resolve_request(REQUESTER, &request.request_id, Decision::Approve)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotOwner);

    registry
        .resolve_request(HOLDER, &request.request_id, Decision::Deny)
        .unwrap();
    let err = registry
        .resolve_request(HOLDER, &request.request_id, Decision::Approve)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyResolved);
    assert!(registry.get_approved_fields(HOLDER, REQUESTER).unwrap().is_empty());

    let err = registry
        .resolve_request(HOLDER, &Uuid::new_v4(), Decision::Approve)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_cancel_deletes_pending_request() {
    let fixture = CommonTestFixture::new();
    let registry = fixture.registry();
    registry.initiate_connection(HOLDER, REQUESTER).unwrap();
    let request = registry
        .request_access(REQUESTER, HOLDER, fields(&["allergies"]))
        .unwrap();

    let err = registry
        .cancel_request(HOLDER, &request.request_id)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotOwner);

    registry.cancel_request(REQUESTER, &request.request_id).unwrap();
    assert_eq!(
        registry.get_request(&request.request_id).unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert!(registry.requests_by_requester(REQUESTER).unwrap().is_empty());

    // Cancelling frees the pair for a new request
    registry
        .request_access(REQUESTER, HOLDER, fields(&["medications"]))
        .unwrap();

    let err = registry
        .cancel_request(REQUESTER, &request.request_id)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_cancel_resolved_request_is_not_pending() {
    let fixture = CommonTestFixture::new();
    let registry = fixture.registry();
    registry.initiate_connection(HOLDER, REQUESTER).unwrap();
    let request = registry
        .request_access(REQUESTER, HOLDER, fields(&["allergies"]))
        .unwrap();
    registry
        .resolve_request(HOLDER, &request.request_id, Decision::Approve)
        .unwrap();

    let err = registry
        .cancel_request(REQUESTER, &request.request_id)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotPending);
    assert_eq!(
        registry.get_request(&request.request_id).unwrap().status,
        RequestStatus::Approved
    );
}

#[test]
fn test_revoke_clears_fields_and_blocks_requests() {
    let fixture = CommonTestFixture::new();
    let registry = fixture.registry();
    registry.initiate_connection(HOLDER, REQUESTER).unwrap();
    let request = registry
        .request_access(REQUESTER, HOLDER, fields(&["vitals.heartRate"]))
        .unwrap();
    registry
        .resolve_request(HOLDER, &request.request_id, Decision::Approve)
        .unwrap();

    registry.revoke(HOLDER, REQUESTER).unwrap();
    assert!(registry.get_approved_fields(HOLDER, REQUESTER).unwrap().is_empty());

    let err = registry
        .request_access(REQUESTER, HOLDER, fields(&["vitals.heartRate"]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoActiveConnection);

    let err = registry.revoke(HOLDER, REQUESTER).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyRevoked);

    let grant = registry.current_grant(HOLDER, REQUESTER).unwrap().unwrap();
    assert_eq!(grant.status, GrantStatus::Revoked);
    assert!(grant.approved_fields.is_empty());
}

#[test]
fn test_revoke_without_grant_is_not_found() {
    let fixture = CommonTestFixture::new();
    let err = fixture.registry().revoke(HOLDER, REQUESTER).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn test_reconnect_creates_new_grant_and_keeps_history() {
    let fixture = CommonTestFixture::new();
    let registry = fixture.registry();

    let first = registry.initiate_connection(HOLDER, REQUESTER).unwrap();
    registry.revoke(HOLDER, REQUESTER).unwrap();
    let second = registry.initiate_connection(HOLDER, REQUESTER).unwrap();

    assert_ne!(first.grant_id, second.grant_id);
    assert!(second.approved_fields.is_empty());

    let history = registry.grant_history(HOLDER, REQUESTER).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].grant_id, first.grant_id);
    assert_eq!(history[0].status, GrantStatus::Revoked);
    assert_eq!(history[1].status, GrantStatus::Active);

    // The new connection can be revoked again
    registry.revoke(HOLDER, REQUESTER).unwrap();
}

#[test]
fn test_revoke_denies_pending_request() {
    let fixture = CommonTestFixture::new();
    let registry = fixture.registry();
    registry.initiate_connection(HOLDER, REQUESTER).unwrap();
    let request = registry
        .request_access(REQUESTER, HOLDER, fields(&["allergies"]))
        .unwrap();

    registry.revoke(HOLDER, REQUESTER).unwrap();

    let stale = registry.get_request(&request.request_id).unwrap();
    assert_eq!(stale.status, RequestStatus::Denied);
    assert!(registry.pending_requests_for_holder(HOLDER).unwrap().is_empty());

    // The denied request can no longer restore access
    let err = registry
        .resolve_request(HOLDER, &request.request_id, Decision::Approve)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyResolved);
    assert!(registry.get_approved_fields(HOLDER, REQUESTER).unwrap().is_empty());
    assert_eq!(registry.grant_history(HOLDER, REQUESTER).unwrap().len(), 1);
    assert!(registry
        .current_grant(HOLDER, REQUESTER)
        .unwrap()
        .unwrap()
        .is_revoked());
}

#[test]
fn test_reconnect_then_request_access() {
    let fixture = CommonTestFixture::new();
    let registry = fixture.registry();
    registry.initiate_connection(HOLDER, REQUESTER).unwrap();
    registry
        .request_access(REQUESTER, HOLDER, fields(&["allergies"]))
        .unwrap();
    registry.revoke(HOLDER, REQUESTER).unwrap();
    registry.initiate_connection(HOLDER, REQUESTER).unwrap();

    let request = registry
        .request_access(REQUESTER, HOLDER, fields(&["medications"]))
        .unwrap();
    registry
        .resolve_request(HOLDER, &request.request_id, Decision::Approve)
        .unwrap();

    assert_eq!(
        registry.get_approved_fields(HOLDER, REQUESTER).unwrap(),
        fields(&["medications"])
    );
}

#[test]
fn test_approving_into_revoked_grant_is_rejected() {
    let fixture = CommonTestFixture::new();
    let registry = fixture.registry();
    registry.initiate_connection(HOLDER, REQUESTER).unwrap();
    let request = registry
        .request_access(REQUESTER, HOLDER, fields(&["allergies"]))
        .unwrap();

    // Revoke the grant underneath the registry, leaving the request pending
    let mut grant = registry.current_grant(HOLDER, REQUESTER).unwrap().unwrap();
    grant.revoke().unwrap();
    fixture
        .db_ops
        .commit(ConsentBatch::new().put_grant(grant))
        .unwrap();

    let err = registry
        .resolve_request(HOLDER, &request.request_id, Decision::Approve)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoActiveConnection);

    assert!(registry.get_request(&request.request_id).unwrap().is_pending());
    assert!(registry.get_approved_fields(HOLDER, REQUESTER).unwrap().is_empty());
    assert_eq!(registry.grant_history(HOLDER, REQUESTER).unwrap().len(), 1);
}

#[test]
fn test_requester_first_connection() {
    let fixture = CommonTestFixture::new();
    let registry = fixture.registry();

    let pending = registry.request_connection(REQUESTER, HOLDER).unwrap();
    assert_eq!(pending.status, GrantStatus::Pending);
    assert!(registry.get_approved_fields(HOLDER, REQUESTER).unwrap().is_empty());

    // Not yet usable for field requests
    let err = registry
        .request_access(REQUESTER, HOLDER, fields(&["allergies"]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoActiveConnection);

    let err = registry.request_connection(REQUESTER, HOLDER).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyConnected);

    // Holder accepts: the same grant becomes active
    let active = registry.initiate_connection(HOLDER, REQUESTER).unwrap();
    assert_eq!(active.grant_id, pending.grant_id);
    assert_eq!(active.status, GrantStatus::Active);
    assert_eq!(registry.grant_history(HOLDER, REQUESTER).unwrap().len(), 1);
}

#[test]
fn test_holder_inbox_lists_only_pending() {
    let fixture = CommonTestFixture::new();
    let registry = fixture.registry();
    for requester in ["doctor-1", "doctor-2", "doctor-3"] {
        registry.initiate_connection(HOLDER, requester).unwrap();
    }
    let r1 = registry
        .request_access("doctor-1", HOLDER, fields(&["allergies"]))
        .unwrap();
    let r2 = registry
        .request_access("doctor-2", HOLDER, fields(&["medications"]))
        .unwrap();
    registry
        .request_access("doctor-3", HOLDER, fields(&["vitals.weight"]))
        .unwrap();
    registry
        .resolve_request(HOLDER, &r1.request_id, Decision::Deny)
        .unwrap();

    let inbox = registry.pending_requests_for_holder(HOLDER).unwrap();
    assert_eq!(inbox.len(), 2);
    assert_eq!(inbox[0].request_id, r2.request_id);
    assert!(inbox.iter().all(|r| r.status == RequestStatus::Pending));
}

#[test]
fn test_state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let request_id = {
        let node = fold_consent::ConsentNode::new(fold_consent::ConsentConfig::new(
            dir.path().join("db"),
        ))
        .unwrap();
        node.initiate_connection(HOLDER, REQUESTER).unwrap();
        node.request_access(REQUESTER, HOLDER, ["allergies"])
            .unwrap()
            .request_id
    };

    let node =
        fold_consent::ConsentNode::new(fold_consent::ConsentConfig::new(dir.path().join("db")))
            .unwrap();
    let err = node
        .request_access(REQUESTER, HOLDER, ["medications"])
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DuplicateRequest);
    node.resolve_request(HOLDER, &request_id, Decision::Approve)
        .unwrap();
    assert_eq!(
        node.get_approved_fields(HOLDER, REQUESTER).unwrap(),
        fields(&["allergies"])
    );
}
