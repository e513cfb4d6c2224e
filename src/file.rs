//! Card file-system model
//!
//! One [`FileNode`] describes one entry of the card's hierarchical file
//! system: a directory (DF) or an elementary file (EF). A node owns one
//! access policy slot per operation plus the optional raw security and
//! property attribute buffers some cards attach to their file headers.

use crate::acl::{AccessOperation, AccessPolicy, AclEntry};
use crate::error::{Error, Result};

/// Maximum length of a DF name
pub const MAX_NAME_LEN: usize = 16;

// Sentinel marking a live node; mutations on anything else are a bug in the
// caller and trip the debug assertion below.
const NODE_TAG: u32 = 0x4643_4C45;

/// Kind of file-system node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    /// Dedicated file (directory)
    Df,
    /// Transparent (flat binary) elementary file
    TransparentEf,
    /// Linear fixed-record elementary file
    LinearFixedEf,
    /// Cyclic-record elementary file
    CyclicEf,
    /// Internal elementary file (key material)
    InternalEf,
}

impl FileKind {
    pub fn is_directory(self) -> bool {
        matches!(self, FileKind::Df)
    }

    /// True for record-structured working EFs, where a record length applies
    pub fn is_structured_ef(self) -> bool {
        matches!(self, FileKind::LinearFixedEf | FileKind::CyclicEf)
    }
}

/// Life-cycle status of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Normal,
    Invalidated,
}

/// How a [`FilePath`] addresses a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathKind {
    /// A single 2-byte file identifier
    FileId,
    /// A sequence of file identifiers from the MF
    Path,
    /// A DF name (application identifier)
    DfName,
}

/// A path addressing a file on the card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePath {
    pub kind: PathKind,
    pub value: Vec<u8>,
}

impl FilePath {
    /// Path consisting of one 2-byte file identifier
    pub fn from_id(id: u16) -> Self {
        Self {
            kind: PathKind::FileId,
            value: vec![(id >> 8) as u8, id as u8],
        }
    }

    /// Absolute path of concatenated file identifiers
    pub fn from_path(value: Vec<u8>) -> Self {
        Self {
            kind: PathKind::Path,
            value,
        }
    }

    /// The file identifier, when this path is exactly one
    pub fn file_id(&self) -> Option<u16> {
        if self.kind == PathKind::FileId && self.value.len() == 2 {
            Some(((self.value[0] as u16) << 8) | self.value[1] as u16)
        } else {
            None
        }
    }
}

/// One node of the card file system
///
/// Created by a driver when the card describes a selected file, or built by
/// a caller about to create a new file. The node exclusively owns its policy
/// slots and attribute buffers; duplicating a node shares no storage with
/// the original.
#[derive(Debug, PartialEq, Eq)]
pub struct FileNode {
    tag: u32,
    /// 2-byte file identifier
    pub id: u16,
    pub kind: FileKind,
    /// Byte size; meaningless for directories
    pub size: usize,
    /// Record length; meaningful only for record-structured EFs
    pub record_length: usize,
    pub status: FileStatus,
    name: Option<Vec<u8>>,
    acl: [Option<AccessPolicy>; AccessOperation::ALL.len()],
    sec_attr: Option<Vec<u8>>,
    prop_attr: Option<Vec<u8>>,
}

impl FileNode {
    /// Create a fresh node with every policy slot absent
    pub fn new(id: u16, kind: FileKind) -> Self {
        Self {
            tag: NODE_TAG,
            id,
            kind,
            size: 0,
            record_length: 0,
            status: FileStatus::Normal,
            name: None,
            acl: Default::default(),
            sec_attr: None,
            prop_attr: None,
        }
    }

    /// A node is valid iff its tag matches the live sentinel
    pub fn is_valid(&self) -> bool {
        self.tag == NODE_TAG
    }

    fn assert_valid(&self) {
        debug_assert!(self.is_valid(), "operation on invalid file node");
    }

    /// The DF name, when one is set
    pub fn name(&self) -> Option<&[u8]> {
        self.name.as_deref()
    }

    /// Set the DF name (at most [`MAX_NAME_LEN`] bytes)
    pub fn set_name(&mut self, name: &[u8]) -> Result<()> {
        self.assert_valid();
        if name.len() > MAX_NAME_LEN {
            return Err(Error::InvalidArguments("file name longer than 16 bytes"));
        }
        self.name = Some(name.to_vec());
        Ok(())
    }

    /// The policy for one operation, absent until something sets it
    pub fn policy(&self, op: AccessOperation) -> Option<&AccessPolicy> {
        self.acl[op.index()].as_ref()
    }

    /// Replace the policy for one operation outright
    pub fn set_policy(&mut self, op: AccessOperation, policy: AccessPolicy) {
        self.assert_valid();
        self.acl[op.index()] = Some(policy);
    }

    /// Add one conditional entry to an operation's policy
    ///
    /// A "never" policy absorbs the entry silently. "Always", "unknown" and
    /// absent policies are replaced by a fresh single-entry list. Existing
    /// entries accumulate in insertion order.
    pub fn add_acl_entry(&mut self, op: AccessOperation, entry: AclEntry) {
        self.assert_valid();
        match &mut self.acl[op.index()] {
            Some(AccessPolicy::Never) => {}
            Some(AccessPolicy::Entries(entries)) => entries.push(entry),
            slot => *slot = Some(AccessPolicy::Entries(vec![entry])),
        }
    }

    /// Merge a decoded policy into an operation's slot
    ///
    /// Constants replace the slot; conditional lists go through the
    /// accumulation rules of [`add_acl_entry`](Self::add_acl_entry).
    pub fn apply_policy(&mut self, op: AccessOperation, policy: AccessPolicy) {
        match policy {
            AccessPolicy::Entries(entries) => {
                for entry in entries {
                    self.add_acl_entry(op, entry);
                }
            }
            constant => self.set_policy(op, constant),
        }
    }

    /// The raw vendor security-attribute buffer
    pub fn sec_attr(&self) -> Option<&[u8]> {
        self.sec_attr.as_deref()
    }

    /// Replace or clear the raw security-attribute buffer
    pub fn set_sec_attr(&mut self, attr: Option<&[u8]>) {
        self.assert_valid();
        self.sec_attr = attr.map(<[u8]>::to_vec);
    }

    /// The raw vendor property-attribute buffer
    pub fn prop_attr(&self) -> Option<&[u8]> {
        self.prop_attr.as_deref()
    }

    /// Replace or clear the raw property-attribute buffer
    pub fn set_prop_attr(&mut self, attr: Option<&[u8]>) {
        self.assert_valid();
        self.prop_attr = attr.map(<[u8]>::to_vec);
    }

    /// Deep copy, rebuilding every policy slot independently
    ///
    /// No conditional-entry storage is shared between the original and the
    /// copy.
    pub fn duplicate(&self) -> FileNode {
        self.assert_valid();
        let mut copy = FileNode::new(self.id, self.kind);
        copy.size = self.size;
        copy.record_length = self.record_length;
        copy.status = self.status;
        copy.name = self.name.clone();
        copy.sec_attr = self.sec_attr.clone();
        copy.prop_attr = self.prop_attr.clone();
        for op in AccessOperation::ALL {
            if let Some(policy) = self.policy(op) {
                copy.apply_policy(op, policy.clone());
            }
        }
        copy
    }
}

impl Clone for FileNode {
    fn clone(&self) -> Self {
        self.duplicate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::AuthMethod;

    #[test]
    fn test_new_node_has_absent_policies() {
        let file = FileNode::new(0x3F00, FileKind::Df);
        assert!(file.is_valid());
        for op in AccessOperation::ALL {
            assert!(file.policy(op).is_none());
        }
    }

    #[test]
    fn test_entries_accumulate_in_order() {
        let mut file = FileNode::new(0x1234, FileKind::TransparentEf);
        file.add_acl_entry(AccessOperation::Update, AclEntry::chv(1));
        file.add_acl_entry(AccessOperation::Update, AclEntry::term());
        match file.policy(AccessOperation::Update) {
            Some(AccessPolicy::Entries(entries)) => {
                assert_eq!(entries.len(), 2);
                assert_eq!(entries[0], AclEntry::chv(1));
                assert_eq!(entries[1].method, AuthMethod::Term);
            }
            other => panic!("unexpected policy: {other:?}"),
        }
    }

    #[test]
    fn test_never_absorbs_entries() {
        let mut file = FileNode::new(0x1234, FileKind::TransparentEf);
        file.set_policy(AccessOperation::Delete, AccessPolicy::Never);
        file.add_acl_entry(AccessOperation::Delete, AclEntry::chv(1));
        assert_eq!(
            file.policy(AccessOperation::Delete),
            Some(&AccessPolicy::Never)
        );
    }

    #[test]
    fn test_entry_replaces_sentinels() {
        let mut file = FileNode::new(0x1234, FileKind::TransparentEf);
        file.set_policy(AccessOperation::Read, AccessPolicy::Unknown);
        file.add_acl_entry(AccessOperation::Read, AclEntry::chv(2));
        assert_eq!(
            file.policy(AccessOperation::Read),
            Some(&AccessPolicy::Entries(vec![AclEntry::chv(2)]))
        );
    }

    #[test]
    fn test_duplicate_does_not_alias() {
        let mut file = FileNode::new(0x1234, FileKind::TransparentEf);
        file.add_acl_entry(AccessOperation::Read, AclEntry::chv(1));
        file.set_sec_attr(Some(&[1, 2, 3, 4]));

        let mut copy = file.duplicate();
        copy.add_acl_entry(AccessOperation::Read, AclEntry::term());
        copy.set_policy(AccessOperation::Delete, AccessPolicy::Never);

        // The original keeps its single entry and its absent delete slot.
        assert_eq!(
            file.policy(AccessOperation::Read),
            Some(&AccessPolicy::Entries(vec![AclEntry::chv(1)]))
        );
        assert!(file.policy(AccessOperation::Delete).is_none());
        assert_eq!(copy.sec_attr(), Some(&[1, 2, 3, 4][..]));
    }

    #[test]
    fn test_attr_buffers_replace_and_clear() {
        let mut file = FileNode::new(0x1234, FileKind::TransparentEf);
        file.set_sec_attr(Some(&[0xFF; 4]));
        assert_eq!(file.sec_attr(), Some(&[0xFF; 4][..]));
        file.set_sec_attr(None);
        assert!(file.sec_attr().is_none());

        file.set_prop_attr(Some(&[0x01]));
        assert_eq!(file.prop_attr(), Some(&[0x01][..]));
    }

    #[test]
    fn test_name_length_limit() {
        let mut file = FileNode::new(0x5000, FileKind::Df);
        assert!(file.set_name(b"wallet").is_ok());
        assert_eq!(file.name(), Some(&b"wallet"[..]));
        assert_eq!(
            file.set_name(&[0u8; 17]),
            Err(Error::InvalidArguments("file name longer than 16 bytes"))
        );
    }

    #[test]
    fn test_file_id_path() {
        let path = FilePath::from_id(0x2F00);
        assert_eq!(path.value, vec![0x2F, 0x00]);
        assert_eq!(path.file_id(), Some(0x2F00));

        let long = FilePath::from_path(vec![0x3F, 0x00, 0x2F, 0x00]);
        assert_eq!(long.file_id(), None);
    }
}
