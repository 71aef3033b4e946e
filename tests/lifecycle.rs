//! Handle lifecycle: allocation, failure cleanup, teardown and expiry.

#![cfg(feature = "crypto")]

mod common;

use std::sync::atomic::{AtomicU64, Ordering};

use common::{facade, flags, mechanism, Peers};
use gss::krb5::crypto::EncType;
use gss::krb5::minor;
use gss::status::CallError;
use gss::{
    AcceptRequest, ContextHandle, GssError, InitRequest, MajorStatus, MemoryRealm,
};

#[test]
fn test_missing_handle_is_a_call_error() {
    let peers = Peers::new(EncType::Des3CbcSha1Kd);

    let err = peers
        .gss
        .init_sec_context(None, &InitRequest::new(&peers.target))
        .unwrap_err();
    let status = err.status();
    assert_eq!(status.call_error, Some(CallError::InaccessibleRead));
    assert_eq!(status.major, MajorStatus::NoContext);

    let err = peers
        .gss
        .accept_sec_context(None, &AcceptRequest::new(b""))
        .unwrap_err();
    assert_eq!(err.status().call_error, Some(CallError::InaccessibleRead));

    let err = peers.gss.delete_sec_context(None).unwrap_err();
    assert_eq!(err.status().call_error, Some(CallError::InaccessibleRead));
}

fn assert_bad_structure(err: GssError) {
    let status = err.status();
    assert_eq!(status.major, MajorStatus::NoContext);
    assert_eq!(status.call_error, Some(CallError::BadStructure));
    assert_eq!(status.to_legacy(), 0x0308_0000);
}

#[test]
fn test_unbound_handle_is_bad_structure() {
    let peers = Peers::new(EncType::Des3CbcSha1Kd);
    let mut handle = ContextHandle::none();

    assert_bad_structure(peers.gss.delete_sec_context(Some(&mut handle)).unwrap_err());
    assert_bad_structure(peers.gss.wrap(&mut handle, false, b"x").unwrap_err());
    assert_bad_structure(peers.gss.unwrap(&mut handle, b"x").unwrap_err());
    assert_bad_structure(peers.gss.get_mic(&mut handle, b"x").unwrap_err());
    assert_bad_structure(peers.gss.verify_mic(&mut handle, b"x", b"y").unwrap_err());
    assert_bad_structure(peers.gss.context_time(&handle).unwrap_err());
    assert_bad_structure(peers.gss.inquire_context(&handle).unwrap_err());
    assert!(handle.is_none());
}

#[test]
fn test_first_call_failure_leaves_sentinel() {
    let peers = Peers::new(EncType::Des3CbcSha1Kd);
    let mut initiator = ContextHandle::none();
    let mut acceptor = ContextHandle::none();

    let err = peers
        .gss
        .init_sec_context(
            Some(&mut initiator),
            &InitRequest::new(&peers.target).bindings(b"cb"),
        )
        .unwrap_err();
    assert_eq!(err.major(), MajorStatus::BadBindings);
    assert!(initiator.is_none());

    let err = peers
        .gss
        .accept_sec_context(Some(&mut acceptor), &AcceptRequest::new(b"\x60\x00"))
        .unwrap_err();
    assert_eq!(err.major(), MajorStatus::DefectiveToken);
    assert!(acceptor.is_none());
}

#[test]
fn test_continuation_failure_keeps_context() {
    let peers = Peers::new(EncType::DesCbcMd5);
    let mut initiator = ContextHandle::none();

    let req = InitRequest::new(&peers.target).flags(flags(true));
    peers.gss.init_sec_context(Some(&mut initiator), &req).unwrap();

    // missing reply
    let err = peers
        .gss
        .init_sec_context(Some(&mut initiator), &req)
        .unwrap_err();
    assert_eq!(err.major(), MajorStatus::DefectiveToken);
    assert!(!initiator.is_none());

    // garbage reply
    let err = peers
        .gss
        .init_sec_context(Some(&mut initiator), &req.input_token(b"garbage"))
        .unwrap_err();
    assert_eq!(err.major(), MajorStatus::DefectiveToken);
    assert!(!initiator.is_none());

    let info = peers.gss.inquire_context(&initiator).unwrap();
    assert!(!info.open);
    assert!(info.locally_initiated);
}

#[test]
fn test_half_built_context_semantics() {
    let peers = Peers::new(EncType::Des3CbcSha1Kd);
    let mut initiator = ContextHandle::none();
    let mut acceptor = ContextHandle::none();

    let req = InitRequest::new(&peers.target).flags(flags(true));
    let out = peers.gss.init_sec_context(Some(&mut initiator), &req).unwrap();
    peers
        .gss
        .accept_sec_context(
            Some(&mut acceptor),
            &AcceptRequest::new(&out.output_token).credential(&peers.service),
        )
        .unwrap();

    // protection-ready: sending works, receiving waits for establishment
    let early = peers.gss.wrap(&mut initiator, false, b"early").unwrap();
    assert_eq!(peers.gss.unwrap(&mut acceptor, &early.token).unwrap().message, b"early");

    let back = peers.gss.wrap(&mut acceptor, false, b"back").unwrap();
    let err = peers.gss.unwrap(&mut initiator, &back.token).unwrap_err();
    assert_eq!(err.major(), MajorStatus::NoContext);
    assert_eq!(err.minor(), minor::CTX_INCOMPLETE);

    // deleting a half-built context always succeeds
    peers.gss.delete_sec_context(Some(&mut initiator)).unwrap();
    assert!(initiator.is_none());
}

#[test]
fn test_extra_steps_rejected() {
    let peers = Peers::new(EncType::Des3CbcSha1Kd);
    let (mut initiator, mut acceptor) = peers.establish(true);

    let err = peers
        .gss
        .init_sec_context(
            Some(&mut initiator),
            &InitRequest::new(&peers.target).input_token(b"again"),
        )
        .unwrap_err();
    assert_eq!(err.major(), MajorStatus::Failure);
    assert_eq!(err.minor(), minor::CONTEXT_ESTABLISHED);

    let err = peers
        .gss
        .accept_sec_context(Some(&mut acceptor), &AcceptRequest::new(b"again"))
        .unwrap_err();
    assert_eq!(err.major(), MajorStatus::Failure);
    assert_eq!(err.minor(), minor::CONTEXT_ESTABLISHED);

    // both contexts survive the rejected steps
    let token = peers.gss.wrap(&mut initiator, false, b"still").unwrap().token;
    assert_eq!(peers.gss.unwrap(&mut acceptor, &token).unwrap().message, b"still");
}

#[test]
fn test_delete_resets_established_handles() {
    let peers = Peers::new(EncType::Des3CbcSha1Kd);
    for mutual in [false, true] {
        let (mut initiator, mut acceptor) = peers.establish(mutual);

        assert_eq!(peers.gss.delete_sec_context(Some(&mut initiator)).unwrap(), None);
        assert_eq!(peers.gss.delete_sec_context(Some(&mut acceptor)).unwrap(), None);
        assert!(initiator.is_none());
        assert!(acceptor.is_none());

        let err = peers.gss.delete_sec_context(Some(&mut initiator)).unwrap_err();
        assert_eq!(err.major(), MajorStatus::NoContext);
    }
}

static NOW: AtomicU64 = AtomicU64::new(1_700_000_000);

fn test_clock() -> u64 {
    NOW.load(Ordering::SeqCst)
}

#[test]
fn test_context_expiry() {
    let realm = MemoryRealm::new("EXAMPLE.ORG")
        .with_clock(test_clock)
        .with_lifetime(120);
    let peers = Peers::with_realm(realm);
    let gss = facade(mechanism(&peers.realm).clock(test_clock).build());

    let mut initiator = ContextHandle::none();
    gss.init_sec_context(Some(&mut initiator), &InitRequest::new(&peers.target))
        .unwrap();
    assert_eq!(gss.context_time(&initiator).unwrap(), 120);

    NOW.fetch_add(100, Ordering::SeqCst);
    assert_eq!(gss.context_time(&initiator).unwrap(), 20);
    assert_eq!(gss.inquire_context(&initiator).unwrap().lifetime, 20);

    NOW.fetch_add(20, Ordering::SeqCst);
    let err = gss.context_time(&initiator).unwrap_err();
    assert!(matches!(err, GssError::ContextExpired));
    assert_eq!(err.major(), MajorStatus::ContextExpired);

    // an expired context can still be deleted
    gss.delete_sec_context(Some(&mut initiator)).unwrap();
    assert!(initiator.is_none());
}
