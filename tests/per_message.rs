//! Per-message protection over established contexts.
//!
//! Property tests cover round trips and tamper detection for both key
//! profiles; the fixed tests cover sequencing and the legacy token layout.

#![cfg(feature = "crypto")]

mod common;

use common::Peers;
use gss::codec;
use gss::krb5::crypto::EncType;
use gss::oid::GSS_KRB5;
use gss::{ContextHandle, MajorStatus};
use proptest::prelude::*;

fn enctype_strategy() -> impl Strategy<Value = EncType> {
    prop_oneof![Just(EncType::DesCbcMd5), Just(EncType::Des3CbcSha1Kd)]
}

/// Offset of the inner token within a framed token
fn inner_offset(token: &[u8]) -> usize {
    let inner = codec::decapsulate_for(token, &GSS_KRB5).unwrap();
    token.len() - inner.len()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_wrap_round_trip(
        enctype in enctype_strategy(),
        mutual in any::<bool>(),
        payload in proptest::collection::vec(any::<u8>(), 0..512),
        conf_req in any::<bool>(),
    ) {
        let peers = Peers::new(enctype);
        let (mut initiator, mut acceptor) = peers.establish(mutual);

        let wrapped = peers.gss.wrap(&mut initiator, conf_req, &payload).unwrap();
        prop_assert!(!wrapped.conf_applied);
        let unwrapped = peers.gss.unwrap(&mut acceptor, &wrapped.token).unwrap();
        prop_assert_eq!(&unwrapped.message, &payload);
        prop_assert!(!unwrapped.conf_applied);
        prop_assert_eq!(unwrapped.qop, 0);

        let wrapped = peers.gss.wrap(&mut acceptor, conf_req, &payload).unwrap();
        let unwrapped = peers.gss.unwrap(&mut initiator, &wrapped.token).unwrap();
        prop_assert_eq!(&unwrapped.message, &payload);
    }

    #[test]
    fn prop_tampered_wrap_token_rejected(
        enctype in enctype_strategy(),
        payload in proptest::collection::vec(any::<u8>(), 1..128),
        position in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let peers = Peers::new(enctype);
        let (mut initiator, mut acceptor) = peers.establish(false);

        let mut token = peers.gss.wrap(&mut initiator, false, &payload).unwrap().token;
        // flip a bit after the 8-byte header: sequence block, checksum, confounder or payload
        let start = inner_offset(&token) + 8;
        let index = start + position.index(token.len() - start);
        token[index] ^= 1 << bit;

        let err = peers.gss.unwrap(&mut acceptor, &token).unwrap_err();
        prop_assert_eq!(err.major(), MajorStatus::BadMic);
    }

    #[test]
    fn prop_tampered_mic_rejected(
        enctype in enctype_strategy(),
        message in proptest::collection::vec(any::<u8>(), 0..128),
        position in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let peers = Peers::new(enctype);
        let (mut initiator, mut acceptor) = peers.establish(true);

        let mut token = peers.gss.get_mic(&mut initiator, &message).unwrap();
        let start = inner_offset(&token) + 8;
        let index = start + position.index(token.len() - start);
        token[index] ^= 1 << bit;

        let err = peers.gss.verify_mic(&mut acceptor, &message, &token).unwrap_err();
        prop_assert_eq!(err.major(), MajorStatus::BadMic);
    }
}

fn wrap_n(peers: &Peers, handle: &mut ContextHandle, n: usize) -> Vec<Vec<u8>> {
    (0..n)
        .map(|i| {
            peers
                .gss
                .wrap(handle, false, format!("message {i}").as_bytes())
                .unwrap()
                .token
        })
        .collect()
}

#[test]
fn test_in_order_delivery() {
    let peers = Peers::new(EncType::Des3CbcSha1Kd);
    let (mut initiator, mut acceptor) = peers.establish(true);

    for (i, token) in wrap_n(&peers, &mut initiator, 10).iter().enumerate() {
        let message = peers.gss.unwrap(&mut acceptor, token).unwrap().message;
        assert_eq!(message, format!("message {i}").into_bytes());
    }
}

#[test]
fn test_reordered_delivery_rejected() {
    let peers = Peers::new(EncType::DesCbcMd5);
    let (mut initiator, mut acceptor) = peers.establish(false);
    let tokens = wrap_n(&peers, &mut initiator, 3);

    let err = peers.gss.unwrap(&mut acceptor, &tokens[1]).unwrap_err();
    assert_eq!(err.major(), MajorStatus::BadMic);

    peers.gss.unwrap(&mut acceptor, &tokens[0]).unwrap();
    peers.gss.unwrap(&mut acceptor, &tokens[1]).unwrap();

    let err = peers.gss.unwrap(&mut acceptor, &tokens[0]).unwrap_err();
    assert_eq!(err.major(), MajorStatus::BadMic);
    peers.gss.unwrap(&mut acceptor, &tokens[2]).unwrap();
}

#[test]
fn test_duplicate_rejected() {
    let peers = Peers::new(EncType::Des3CbcSha1Kd);
    let (mut initiator, mut acceptor) = peers.establish(true);
    let tokens = wrap_n(&peers, &mut initiator, 1);

    peers.gss.unwrap(&mut acceptor, &tokens[0]).unwrap();
    let err = peers.gss.unwrap(&mut acceptor, &tokens[0]).unwrap_err();
    assert_eq!(err.major(), MajorStatus::BadMic);
}

#[test]
fn test_reflected_token_rejected() {
    let peers = Peers::new(EncType::Des3CbcSha1Kd);
    let (mut initiator, _acceptor) = peers.establish(false);

    // without mutual both directions start from the same number
    let token = peers.gss.wrap(&mut initiator, false, b"mirror").unwrap().token;
    let err = peers.gss.unwrap(&mut initiator, &token).unwrap_err();
    assert_eq!(err.major(), MajorStatus::BadMic);
}

#[test]
fn test_wrap_token_layout() {
    let peers = Peers::new(EncType::DesCbcMd5);
    let (mut initiator, _acceptor) = peers.establish(false);

    let token = peers.gss.wrap(&mut initiator, true, b"abc").unwrap().token;
    assert_eq!(token[0], 0x60);
    let inner = codec::decapsulate_for(&token, &GSS_KRB5).unwrap();
    assert_eq!(&inner[..8], &[0x02, 0x01, 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF]);
    // header, sequence, checksum, confounder, "abc" + 5 pad bytes
    assert_eq!(inner.len(), 8 + 8 + 8 + 8 + 8);
    assert_eq!(&inner[32..35], b"abc");
    assert_eq!(&inner[35..], &[5u8; 5]);

    let peers = Peers::new(EncType::Des3CbcSha1Kd);
    let (mut initiator, _acceptor) = peers.establish(false);
    let token = peers.gss.get_mic(&mut initiator, b"abc").unwrap();
    let inner = codec::decapsulate_for(&token, &GSS_KRB5).unwrap();
    assert_eq!(&inner[..8], &[0x01, 0x01, 0x04, 0x00, 0xFF, 0xFF, 0xFF, 0xFF]);
    assert_eq!(inner.len(), 8 + 8 + 20);
}

#[test]
fn test_mic_and_wrap_interleave() {
    let peers = Peers::new(EncType::Des3CbcSha1Kd);
    let (mut initiator, mut acceptor) = peers.establish(true);

    let mic = peers.gss.get_mic(&mut acceptor, b"one").unwrap();
    let wrapped = peers.gss.wrap(&mut acceptor, false, b"two").unwrap().token;

    // the MIC holds the earlier sequence number
    let err = peers.gss.unwrap(&mut initiator, &wrapped).unwrap_err();
    assert_eq!(err.major(), MajorStatus::BadMic);

    peers.gss.verify_mic(&mut initiator, b"one", &mic).unwrap();
    assert_eq!(peers.gss.unwrap(&mut initiator, &wrapped).unwrap().message, b"two");
}
