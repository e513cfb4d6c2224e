//! MioCOS card family driver
//!
//! Overlay over [`Iso7816Driver`] for MioCOS 1.1 PKI cards. Reimplements
//! file creation (proprietary header layout), directory listing and file
//! deletion, post-processes SELECT responses into decoded access policies,
//! and rewrites by-value security environments into the card's algorithm
//! references. Everything else delegates to the generic driver.

use log::{debug, error};

use crate::acl::{policy_from_nibble, policy_nibble, AccessOperation};
use crate::apdu::{ins, Apdu, SW};
use crate::atr::match_atr;
use crate::driver::{Algorithm, AlgorithmSpec, Card, CardDriver, RsaFlags, SecurityEnv};
use crate::error::{Error, Result};
use crate::file::{FileKind, FileNode, FilePath, FileStatus};
use crate::iso7816::Iso7816Driver;

/// ATR of MioCOS 1.1 cards; historical bytes spell "MioCOS"
pub const MIOCOS_11_ATR: &[u8] = &[
    0x3B, 0x9D, 0x94, 0x40, 0x23, 0x00, 0x68, 0x10, 0x11, 0x4D, 0x69, 0x6F, 0x43, 0x4F, 0x53,
    0x00, 0x90, 0x00,
];

const KNOWN_ATRS: &[&[u8]] = &[MIOCOS_11_ATR];

// Algorithm reference encoding: PKCS#1 padding selects the base value, the
// on-card SHA-1 variant adds a flag bit on top.
const ALG_REF_RSA_RAW: u8 = 0x00;
const ALG_REF_RSA_PKCS1: u8 = 0x02;
const ALG_REF_HASH_SHA1: u8 = 0x10;

type SlotTable = [Option<AccessOperation>; 8];

// Per-node-kind assignment of ACL nibble slots. Unassigned slots encode as
// 0x0 and are skipped on decode.
const DF_OPS: SlotTable = [
    Some(AccessOperation::Delete),
    Some(AccessOperation::Create),
    None, // create AC
    None, // update AC
    None,
    None,
    None,
    None,
];
const EF_OPS: SlotTable = [
    Some(AccessOperation::Delete),
    None,
    Some(AccessOperation::Read),
    Some(AccessOperation::Update),
    None,
    None,
    Some(AccessOperation::Invalidate),
    Some(AccessOperation::Rehabilitate),
];
const KEY_OPS: SlotTable = [
    Some(AccessOperation::Delete),
    None,
    None,
    Some(AccessOperation::Update),
    Some(AccessOperation::Crypto),
    None,
    Some(AccessOperation::Invalidate),
    Some(AccessOperation::Rehabilitate),
];

fn slot_table(kind: FileKind) -> &'static SlotTable {
    match kind {
        FileKind::Df => &DF_OPS,
        FileKind::InternalEf => &KEY_OPS,
        _ => &EF_OPS,
    }
}

/// Pack a node's access policies into the card's 4-byte encoding
///
/// Two 4-bit codes per byte, most significant nibble first, in the slot
/// order of the node kind's table.
fn encode_sec_attr(file: &FileNode) -> [u8; 4] {
    let table = slot_table(file.kind);
    let mut out = [0u8; 4];
    for (i, slot) in table.iter().enumerate() {
        let nibble = slot.map_or(0x00, |op| policy_nibble(file.policy(op)));
        if i & 1 == 0 {
            out[i / 2] = nibble << 4;
        } else {
            out[i / 2] |= nibble & 0x0F;
        }
    }
    out
}

/// Decode a 4-byte security attribute into the node's access policies
///
/// Buffers shorter than 4 bytes are ignored; slots not applicable to the
/// node's kind are skipped, everything else degrades to "unknown" per slot.
fn parse_sec_attr(file: &mut FileNode, attr: &[u8]) {
    if attr.len() < 4 {
        return;
    }
    let table = slot_table(file.kind);
    for (i, slot) in table.iter().enumerate() {
        let Some(op) = *slot else { continue };
        let nibble = if i & 1 == 0 {
            attr[i / 2] >> 4
        } else {
            attr[i / 2] & 0x0F
        };
        file.apply_policy(op, policy_from_nibble(nibble));
    }
}

/// Serialize a node into the proprietary CREATE FILE payload
///
/// Layout: file id, type tag, size (zero for DFs), 4 access-control bytes
/// (a pre-supplied 4-byte security attribute is copied verbatim), record
/// length for structured EFs, status byte, optional DF name.
fn encode_file_structure(file: &FileNode) -> Result<Vec<u8>> {
    if !file.kind.is_directory() && file.size > 0xFFFF {
        return Err(Error::InvalidArguments("file size exceeds two bytes"));
    }
    if file.record_length > 0xFF {
        return Err(Error::InvalidArguments("record length exceeds one byte"));
    }

    let mut out = Vec::with_capacity(32);
    out.push((file.id >> 8) as u8);
    out.push(file.id as u8);
    out.push(match file.kind {
        FileKind::Df => 0x20,
        FileKind::TransparentEf => 0x40,
        FileKind::LinearFixedEf => 0x41,
        FileKind::CyclicEf => 0x43,
        FileKind::InternalEf => 0x44,
    });
    if file.kind.is_directory() {
        out.push(0);
        out.push(0);
    } else {
        out.push((file.size >> 8) as u8);
        out.push(file.size as u8);
    }
    match file.sec_attr() {
        Some(attr) if attr.len() == 4 => out.extend_from_slice(attr),
        _ => out.extend_from_slice(&encode_sec_attr(file)),
    }
    if file.kind.is_structured_ef() {
        out.push(file.record_length as u8);
    } else {
        out.push(0);
    }
    out.push(match file.status {
        FileStatus::Invalidated => 0x00,
        FileStatus::Normal => 0x01,
    });
    if file.kind.is_directory() {
        if let Some(name) = file.name() {
            out.extend_from_slice(name);
        }
    }
    Ok(out)
}

#[derive(Debug, Clone, Copy)]
struct MiocosData {
    /// Index into the known-ATR table the session matched
    card_type: usize,
}

/// Driver for MioCOS 1.1 cards
pub struct MiocosDriver {
    iso: Iso7816Driver,
    data: Option<MiocosData>,
}

impl MiocosDriver {
    pub fn new() -> Self {
        Self {
            iso: Iso7816Driver::new(),
            data: None,
        }
    }
}

impl Default for MiocosDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl CardDriver for MiocosDriver {
    fn name(&self) -> &'static str {
        "miocos"
    }

    fn match_card(&self, card: &Card) -> bool {
        match_atr(&card.atr, KNOWN_ATRS).is_some()
    }

    fn init(&mut self, card: &mut Card) -> Result<()> {
        // Re-run the match to learn which pattern bound this session.
        let card_type = match_atr(&card.atr, KNOWN_ATRS)
            .ok_or(Error::NotSupported("card ATR not recognized by miocos"))?;
        self.data = Some(MiocosData { card_type });
        card.cla = 0x00;
        card.add_rsa_algorithm(
            1024,
            RsaFlags::RAW | RsaFlags::PAD_PKCS1 | RsaFlags::HASH_NONE | RsaFlags::HASH_SHA1,
        );
        debug!("miocos init, card type {card_type}");
        Ok(())
    }

    fn finish(&mut self, _card: &mut Card) -> Result<()> {
        self.data = None;
        Ok(())
    }

    fn select_file(&mut self, card: &mut Card, path: &FilePath) -> Result<FileNode> {
        let mut file = self.iso.select_file(card, path)?;
        if let Some(attr) = file.sec_attr().map(<[u8]>::to_vec) {
            parse_sec_attr(&mut file, &attr);
        }
        Ok(file)
    }

    fn create_file(&mut self, card: &mut Card, file: &FileNode) -> Result<()> {
        let data = encode_file_structure(file)?;
        let apdu = Apdu::with_data(card.cla, ins::CREATE_FILE, 0x00, 0x00, data);
        let response = card.transmit(&apdu)?;
        SW::check(response.sw())
    }

    fn delete_file(&mut self, card: &mut Card, path: &FilePath) -> Result<()> {
        if path.file_id().is_none() {
            error!("delete_file path must be a 2-byte file id");
            return Err(Error::InvalidArguments(
                "delete_file needs a 2-byte file id path",
            ));
        }
        // The card deletes whatever is currently selected.
        self.select_file(card, path)?;
        let apdu = Apdu::new(card.cla, ins::DELETE_FILE, 0x00, 0x00);
        let response = card.transmit(&apdu)?;
        SW::check(response.sw())
    }

    fn list_files(&mut self, card: &mut Card, buf: &mut [u8]) -> Result<usize> {
        let le = buf.len().min(256);
        let apdu = Apdu::new(card.cla, ins::GET_DATA, 0x01, 0x00).expecting(le);
        let response = card.transmit(&apdu)?;
        if response.data.is_empty() {
            SW::check(response.sw())?;
            return Ok(0);
        }
        let count = response.data.len().min(buf.len());
        buf[..count].copy_from_slice(&response.data[..count]);
        Ok(count)
    }

    fn set_security_env(&mut self, card: &mut Card, env: &SecurityEnv, se_num: u8) -> Result<()> {
        if let AlgorithmSpec::Value { algorithm, flags } = env.algorithm {
            if algorithm != Algorithm::Rsa {
                error!("only the RSA algorithm is supported");
                return Err(Error::NotSupported("only RSA is supported by miocos"));
            }
            let mut reference = ALG_REF_RSA_RAW;
            if flags.contains(RsaFlags::PAD_PKCS1) {
                reference = ALG_REF_RSA_PKCS1;
            }
            if flags.contains(RsaFlags::HASH_SHA1) {
                reference |= ALG_REF_HASH_SHA1;
            }
            let mut rewritten = env.clone();
            rewritten.algorithm = AlgorithmSpec::Reference(reference);
            return self.iso.set_security_env(card, &rewritten, se_num);
        }
        self.iso.set_security_env(card, env, se_num)
    }
}
