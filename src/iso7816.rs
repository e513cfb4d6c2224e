//! Generic ISO 7816-4/9 driver
//!
//! Implements the operation table against the standard command set. Vendor
//! overlays own an instance of this driver and delegate whatever they do not
//! reimplement.

use log::debug;

use crate::apdu::{ins, Apdu, SW};
use crate::driver::{AlgorithmSpec, Card, CardDriver, SecOperation, SecurityEnv};
use crate::error::{Error, Result};
use crate::file::{FileKind, FileNode, FilePath, FileStatus, PathKind};
use crate::tlv::{self, Tlv};

// FCI template tags (ISO 7816-4 table 12)
const TAG_FCI: u16 = 0x6F;
const TAG_FCP: u16 = 0x62;
const TAG_SIZE: u16 = 0x80;
const TAG_SIZE_TOTAL: u16 = 0x81;
const TAG_DESCRIPTOR: u16 = 0x82;
const TAG_FILE_ID: u16 = 0x83;
const TAG_DF_NAME: u16 = 0x84;
const TAG_PROP_ATTR: u16 = 0x85;
const TAG_SEC_ATTR: u16 = 0x86;
const TAG_LIFE_CYCLE: u16 = 0x8A;

/// The generic (base) driver
#[derive(Debug, Default)]
pub struct Iso7816Driver;

impl Iso7816Driver {
    pub fn new() -> Self {
        Iso7816Driver
    }
}

fn encode_descriptor(file: &FileNode) -> Vec<u8> {
    match file.kind {
        FileKind::Df => vec![0x38],
        FileKind::TransparentEf => vec![0x01],
        FileKind::InternalEf => vec![0x08],
        FileKind::LinearFixedEf | FileKind::CyclicEf => {
            let fdb = if file.kind == FileKind::LinearFixedEf {
                0x02
            } else {
                0x06
            };
            vec![
                fdb,
                0x41,
                (file.record_length >> 8) as u8,
                file.record_length as u8,
            ]
        }
    }
}

fn decode_descriptor(value: &[u8]) -> Result<(FileKind, usize)> {
    let fdb = *value
        .first()
        .ok_or_else(|| Error::Format("empty file descriptor".into()))?;
    let kind = if fdb == 0x38 || fdb == 0x3F {
        FileKind::Df
    } else if fdb & 0x08 != 0 {
        FileKind::InternalEf
    } else {
        match fdb & 0x07 {
            0x01 => FileKind::TransparentEf,
            0x02 | 0x03 => FileKind::LinearFixedEf,
            0x06 | 0x07 => FileKind::CyclicEf,
            _ => {
                return Err(Error::Format(format!(
                    "unrecognized file descriptor byte 0x{fdb:02X}"
                )))
            }
        }
    };
    let record_length = match value.len() {
        0..=2 => 0,
        3 => value[2] as usize,
        _ => ((value[2] as usize) << 8) | value[3] as usize,
    };
    Ok((kind, record_length))
}

fn be16(value: &[u8]) -> usize {
    value
        .iter()
        .take(2)
        .fold(0usize, |acc, &b| (acc << 8) | b as usize)
}

/// Build a [`FileNode`] from the FCI/FCP template of a SELECT response
fn process_fci(template: &Tlv, fallback_id: Option<u16>) -> Result<FileNode> {
    let id = template
        .find_child(TAG_FILE_ID)
        .filter(|t| t.value.len() == 2)
        .map(|t| ((t.value[0] as u16) << 8) | t.value[1] as u16)
        .or(fallback_id)
        .unwrap_or(0);

    let (kind, record_length) = match template.find_child(TAG_DESCRIPTOR) {
        Some(t) => decode_descriptor(&t.value)?,
        None => (FileKind::TransparentEf, 0),
    };

    let mut file = FileNode::new(id, kind);
    file.record_length = record_length;
    if let Some(t) = template
        .find_child(TAG_SIZE)
        .or_else(|| template.find_child(TAG_SIZE_TOTAL))
    {
        file.size = be16(&t.value);
    }
    if let Some(t) = template.find_child(TAG_DF_NAME) {
        file.set_name(&t.value)?;
    }
    if let Some(t) = template.find_child(TAG_PROP_ATTR) {
        file.set_prop_attr(Some(&t.value));
    }
    if let Some(t) = template.find_child(TAG_SEC_ATTR) {
        file.set_sec_attr(Some(&t.value));
    }
    // Life cycle status 0x04 means deactivated
    if let Some(t) = template.find_child(TAG_LIFE_CYCLE) {
        if t.value.first() == Some(&0x04) {
            file.status = FileStatus::Invalidated;
        }
    }
    Ok(file)
}

impl CardDriver for Iso7816Driver {
    fn name(&self) -> &'static str {
        "iso7816"
    }

    fn match_card(&self, _card: &Card) -> bool {
        // The base driver accepts any card as a last resort.
        true
    }

    fn init(&mut self, _card: &mut Card) -> Result<()> {
        Ok(())
    }

    fn select_file(&mut self, card: &mut Card, path: &FilePath) -> Result<FileNode> {
        let p1 = match path.kind {
            PathKind::FileId => 0x00,
            PathKind::Path => 0x08,
            PathKind::DfName => 0x04,
        };
        let apdu =
            Apdu::with_data(card.cla, ins::SELECT, p1, 0x00, path.value.clone()).expecting(256);
        let response = card.transmit(&apdu)?;
        SW::check(response.sw())?;

        if response.data.is_empty() {
            debug!("SELECT returned no FCI");
            return Ok(FileNode::new(
                path.file_id().unwrap_or(0),
                FileKind::TransparentEf,
            ));
        }
        let (template, _) = tlv::read_one(&response.data, true)?;
        if template.tag != TAG_FCI && template.tag != TAG_FCP {
            return Err(Error::Format(format!(
                "expected FCI template, got tag 0x{:02X}",
                template.tag
            )));
        }
        process_fci(&template, path.file_id())
    }

    fn create_file(&mut self, card: &mut Card, file: &FileNode) -> Result<()> {
        let mut fcp = Vec::new();
        let size = if file.kind.is_directory() { 0 } else { file.size };
        tlv::put(&mut fcp, TAG_SIZE as u8, &[(size >> 8) as u8, size as u8]);
        tlv::put(&mut fcp, TAG_DESCRIPTOR as u8, &encode_descriptor(file));
        tlv::put(
            &mut fcp,
            TAG_FILE_ID as u8,
            &[(file.id >> 8) as u8, file.id as u8],
        );
        if let Some(name) = file.name() {
            tlv::put(&mut fcp, TAG_DF_NAME as u8, name);
        }
        if let Some(attr) = file.sec_attr() {
            tlv::put(&mut fcp, TAG_SEC_ATTR as u8, attr);
        }
        if let Some(attr) = file.prop_attr() {
            tlv::put(&mut fcp, TAG_PROP_ATTR as u8, attr);
        }
        let mut data = Vec::with_capacity(fcp.len() + 2);
        tlv::put(&mut data, TAG_FCI as u8, &fcp);

        let apdu = Apdu::with_data(card.cla, ins::CREATE_FILE, 0x00, 0x00, data);
        let response = card.transmit(&apdu)?;
        SW::check(response.sw())
    }

    fn delete_file(&mut self, card: &mut Card, path: &FilePath) -> Result<()> {
        if path.file_id().is_none() {
            return Err(Error::InvalidArguments(
                "delete_file needs a 2-byte file id path",
            ));
        }
        let apdu = Apdu::with_data(card.cla, ins::DELETE_FILE, 0x00, 0x00, path.value.clone());
        let response = card.transmit(&apdu)?;
        SW::check(response.sw())
    }

    fn list_files(&mut self, _card: &mut Card, _buf: &mut [u8]) -> Result<usize> {
        // ISO 7816 has no portable directory listing.
        Err(Error::NotSupported("list_files"))
    }

    fn set_security_env(&mut self, card: &mut Card, env: &SecurityEnv, _se_num: u8) -> Result<()> {
        let mut data = Vec::new();
        match env.algorithm {
            AlgorithmSpec::Reference(reference) => tlv::put(&mut data, 0x80, &[reference]),
            AlgorithmSpec::Value { .. } => {
                // The standard command set only carries references; the
                // vendor driver translates values before delegating here.
                return Err(Error::NotSupported(
                    "security environment algorithm must be given by reference",
                ));
            }
            AlgorithmSpec::None => {}
        }
        if let Some(file_ref) = env.file_ref {
            tlv::put(&mut data, 0x81, &[(file_ref >> 8) as u8, file_ref as u8]);
        }
        if let Some(key_ref) = env.key_ref {
            tlv::put(&mut data, 0x84, &[key_ref]);
        }

        let p2 = match env.operation {
            SecOperation::Sign => 0xB6,
            SecOperation::Decipher => 0xB8,
            SecOperation::Authenticate => 0xA4,
        };
        let apdu = Apdu::with_data(card.cla, ins::MANAGE_SECURITY_ENV, 0x41, p2, data);
        let response = card.transmit(&apdu)?;
        SW::check(response.sw())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_round_trip() {
        let mut file = FileNode::new(0x1234, FileKind::LinearFixedEf);
        file.record_length = 0x20;
        let enc = encode_descriptor(&file);
        let (kind, rl) = decode_descriptor(&enc).unwrap();
        assert_eq!(kind, FileKind::LinearFixedEf);
        assert_eq!(rl, 0x20);

        let df = FileNode::new(0x3F00, FileKind::Df);
        assert_eq!(decode_descriptor(&encode_descriptor(&df)).unwrap().0, FileKind::Df);
    }

    #[test]
    fn test_decode_descriptor_rejects_garbage() {
        assert!(decode_descriptor(&[0x05]).is_err());
        assert!(decode_descriptor(&[]).is_err());
    }

    #[test]
    fn test_process_fci() {
        // FCI with size 0x0100, transparent EF, id 0x1234, sec attr, lcs 04
        let raw = hex::decode("6F12800201008201018302123486020FF08A0104").unwrap();
        let (template, _) = tlv::read_one(&raw, true).unwrap();
        let file = process_fci(&template, None).unwrap();
        assert_eq!(file.id, 0x1234);
        assert_eq!(file.kind, FileKind::TransparentEf);
        assert_eq!(file.size, 0x0100);
        assert_eq!(file.sec_attr(), Some(&[0x0F, 0xF0][..]));
        assert_eq!(file.status, FileStatus::Invalidated);
    }

    #[test]
    fn test_process_fci_falls_back_to_path_id() {
        let raw = hex::decode("6F04800200FF").unwrap();
        let (template, _) = tlv::read_one(&raw, true).unwrap();
        let file = process_fci(&template, Some(0x2F00)).unwrap();
        assert_eq!(file.id, 0x2F00);
        assert_eq!(file.size, 0xFF);
    }
}
