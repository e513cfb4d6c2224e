//! End-to-end driver tests against a scripted transport
//!
//! The mock transport records every APDU and plays back canned responses,
//! so the tests can check the exact bytes a real MioCOS card would see.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use sc_core::acl::{AccessOperation, AccessPolicy, AclEntry};
use sc_core::apdu::{Apdu, Response};
use sc_core::driver::{AlgorithmSpec, Algorithm, Card, CardDriver, RsaFlags, SecOperation, SecurityEnv, Session};
use sc_core::file::{FileKind, FileNode, FilePath};
use sc_core::iso7816::Iso7816Driver;
use sc_core::miocos::{MiocosDriver, MIOCOS_11_ATR};
use sc_core::transport::CardTransport;
use sc_core::Error;

#[derive(Clone, Default)]
struct Script {
    sent: Arc<Mutex<Vec<Apdu>>>,
    replies: Arc<Mutex<VecDeque<Response>>>,
}

impl Script {
    fn sent(&self) -> Vec<Apdu> {
        self.sent.lock().unwrap().clone()
    }
}

struct MockTransport(Script);

impl CardTransport for MockTransport {
    fn transmit(&mut self, apdu: &Apdu) -> sc_core::Result<Response> {
        self.0.sent.lock().unwrap().push(apdu.clone());
        let reply = self.0.replies.lock().unwrap().pop_front();
        Ok(reply.unwrap_or_else(Response::ok))
    }
}

fn scripted_card(replies: Vec<Response>) -> (Card, Script) {
    let script = Script {
        sent: Arc::new(Mutex::new(Vec::new())),
        replies: Arc::new(Mutex::new(replies.into())),
    };
    let card = Card::new(Box::new(MockTransport(script.clone())), MIOCOS_11_ATR.to_vec());
    (card, script)
}

fn bound_session(replies: Vec<Response>) -> (Session, Script) {
    let (card, script) = scripted_card(replies);
    let session = Session::bind(card, vec![Box::new(MiocosDriver::new())]).unwrap();
    (session, script)
}

#[test]
fn bind_prefers_vendor_overlay_and_registers_capabilities() {
    let (card, _script) = scripted_card(Vec::new());
    let candidates: Vec<Box<dyn CardDriver>> =
        vec![Box::new(MiocosDriver::new()), Box::new(Iso7816Driver::new())];
    let session = Session::bind(card, candidates).unwrap();

    let algorithms = session.card().algorithms();
    assert_eq!(algorithms.len(), 1);
    assert_eq!(algorithms[0].algorithm, Algorithm::Rsa);
    assert_eq!(algorithms[0].key_length, 1024);
    assert!(algorithms[0]
        .flags
        .contains(RsaFlags::RAW | RsaFlags::PAD_PKCS1 | RsaFlags::HASH_NONE | RsaFlags::HASH_SHA1));
    assert_eq!(session.card().cla, 0x00);
}

#[test]
fn bind_fails_without_matching_pattern() {
    let script = Script::default();
    let card = Card::new(Box::new(MockTransport(script)), vec![0x3B, 0x00]);
    let result = Session::bind(card, vec![Box::new(MiocosDriver::new())]);
    assert!(matches!(result, Err(Error::NotSupported(_))));
}

#[test]
fn create_file_emits_documented_payload() {
    let (mut session, script) = bound_session(vec![Response::ok()]);

    let mut file = FileNode::new(0x1234, FileKind::TransparentEf);
    file.size = 256;
    file.set_policy(AccessOperation::Delete, AccessPolicy::Never);
    file.set_policy(AccessOperation::Read, AccessPolicy::Always);
    session.create_file(&file).unwrap();

    let sent = script.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].ins, 0xE0);
    assert_eq!(
        sent[0].data,
        vec![0x12, 0x34, 0x40, 0x01, 0x00, 0xF0, 0x00, 0x00, 0x00, 0x00, 0x01]
    );
}

#[test]
fn create_file_surfaces_card_status() {
    let (mut session, _script) = bound_session(vec![Response::error(0x6A89)]);
    let file = FileNode::new(0x1234, FileKind::TransparentEf);
    assert_eq!(session.create_file(&file), Err(Error::CardStatus(0x6A89)));
}

#[test]
fn delete_file_rejects_non_file_id_path_before_any_exchange() {
    let (mut session, script) = bound_session(Vec::new());
    let path = FilePath::from_path(vec![0x3F, 0x00, 0x2F, 0x00]);
    assert!(matches!(
        session.delete_file(&path),
        Err(Error::InvalidArguments(_))
    ));
    assert!(script.sent().is_empty());
}

#[test]
fn delete_file_selects_then_deletes() {
    let (mut session, script) = bound_session(vec![Response::ok(), Response::ok()]);
    session.delete_file(&FilePath::from_id(0x4400)).unwrap();

    let sent = script.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].ins, 0xA4);
    assert_eq!(sent[0].data, vec![0x44, 0x00]);
    assert_eq!(sent[1].ins, 0xE4);
    assert!(sent[1].data.is_empty());
}

#[test]
fn delete_file_propagates_select_failure() {
    let (mut session, script) = bound_session(vec![Response::error(0x6A82)]);
    assert_eq!(
        session.delete_file(&FilePath::from_id(0x4400)),
        Err(Error::CardStatus(0x6A82))
    );
    // The deletion command itself was never sent.
    assert_eq!(script.sent().len(), 1);
}

#[test]
fn select_file_decodes_security_attribute_into_policies() {
    // FCI: id 0x1234, transparent EF, size 0x0100, sec attr F1 00 00 04
    let fci = hex::decode("6F1183021234820101800201008604F1000004").unwrap();
    let (mut session, _script) = bound_session(vec![Response::success(fci)]);

    let file = session.select_file(&FilePath::from_id(0x1234)).unwrap();
    assert_eq!(file.id, 0x1234);
    assert_eq!(file.size, 0x0100);
    assert_eq!(
        file.policy(AccessOperation::Delete),
        Some(&AccessPolicy::Never)
    );
    assert_eq!(
        file.policy(AccessOperation::Read),
        Some(&AccessPolicy::Always)
    );
    assert_eq!(
        file.policy(AccessOperation::Rehabilitate),
        Some(&AccessPolicy::Entries(vec![AclEntry::term()]))
    );
    // The raw buffer stays available for re-encoding.
    assert_eq!(file.sec_attr(), Some(&[0xF1, 0x00, 0x00, 0x04][..]));
}

#[test]
fn list_files_returns_payload_length() {
    let listing = vec![0x2F, 0x00, 0x50, 0x15];
    let (mut session, script) = bound_session(vec![Response::success(listing.clone())]);

    let mut buf = [0u8; 512];
    let count = session.list_files(&mut buf).unwrap();
    assert_eq!(count, 4);
    assert_eq!(&buf[..count], &listing[..]);

    let sent = script.sent();
    assert_eq!(sent[0].ins, 0xCA);
    assert_eq!(sent[0].p1, 0x01);
    // Le is capped at the protocol ceiling even for larger buffers.
    assert_eq!(sent[0].le, Some(256));
}

#[test]
fn list_files_propagates_status_on_empty_payload() {
    let (mut session, _script) = bound_session(vec![Response::error(0x6982)]);
    let mut buf = [0u8; 64];
    assert_eq!(session.list_files(&mut buf), Err(Error::CardStatus(0x6982)));
}

#[test]
fn security_env_by_value_is_rewritten_to_reference() {
    let (mut session, script) = bound_session(vec![Response::ok()]);

    let mut env = SecurityEnv::new(SecOperation::Sign);
    env.algorithm = AlgorithmSpec::Value {
        algorithm: Algorithm::Rsa,
        flags: RsaFlags::PAD_PKCS1 | RsaFlags::HASH_SHA1,
    };
    env.key_ref = Some(0x01);
    env.file_ref = Some(0x4B01);
    session.set_security_env(&env, 0).unwrap();

    let sent = script.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].ins, 0x22);
    assert_eq!(sent[0].p1, 0x41);
    assert_eq!(sent[0].p2, 0xB6);
    // PKCS#1 base reference 0x02 with the SHA-1 bit 0x10 on top.
    assert_eq!(
        sent[0].data,
        vec![0x80, 0x01, 0x12, 0x81, 0x02, 0x4B, 0x01, 0x84, 0x01, 0x01]
    );
}

#[test]
fn security_env_raw_rsa_keeps_base_reference() {
    let (mut session, script) = bound_session(vec![Response::ok()]);

    let mut env = SecurityEnv::new(SecOperation::Decipher);
    env.algorithm = AlgorithmSpec::Value {
        algorithm: Algorithm::Rsa,
        flags: RsaFlags::RAW | RsaFlags::HASH_NONE,
    };
    session.set_security_env(&env, 0).unwrap();

    let sent = script.sent();
    assert_eq!(sent[0].p2, 0xB8);
    assert_eq!(sent[0].data, vec![0x80, 0x01, 0x00]);
}

#[test]
fn security_env_without_algorithm_delegates_unchanged() {
    let (mut session, script) = bound_session(vec![Response::ok()]);

    let mut env = SecurityEnv::new(SecOperation::Sign);
    env.key_ref = Some(0x02);
    session.set_security_env(&env, 0).unwrap();

    let sent = script.sent();
    // No algorithm reference object, just the key reference.
    assert_eq!(sent[0].data, vec![0x84, 0x01, 0x02]);
}

#[test]
fn session_finish_releases_cleanly() {
    let (session, _script) = bound_session(Vec::new());
    session.finish().unwrap();
}
