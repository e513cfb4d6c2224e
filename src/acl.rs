//! Access-control model for card file-system nodes
//!
//! Each file operation carries one [`AccessPolicy`]: either one of three
//! constant sentinels or an ordered list of conditional entries tried
//! first-match-wins by the enforcing driver. This crate only stores and
//! serializes policies; enforcement happens on the card.
//!
//! The nibble codec at the bottom is the primitive used by vendor drivers
//! that pack one policy per 4-bit slot into their security-attribute bytes.

/// A card file operation guarded by an access policy
///
/// Used as a key; which subset is legal depends on the node kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessOperation {
    Delete,
    Create,
    Read,
    Update,
    Crypto,
    Invalidate,
    Rehabilitate,
}

impl AccessOperation {
    /// All operations, in stable slot order
    pub const ALL: [AccessOperation; 7] = [
        AccessOperation::Delete,
        AccessOperation::Create,
        AccessOperation::Read,
        AccessOperation::Update,
        AccessOperation::Crypto,
        AccessOperation::Invalidate,
        AccessOperation::Rehabilitate,
    ];

    pub(crate) fn index(self) -> usize {
        match self {
            AccessOperation::Delete => 0,
            AccessOperation::Create => 1,
            AccessOperation::Read => 2,
            AccessOperation::Update => 3,
            AccessOperation::Crypto => 4,
            AccessOperation::Invalidate => 5,
            AccessOperation::Rehabilitate => 6,
        }
    }
}

/// How a conditional ACL entry is satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    /// Card holder verification (PIN)
    Chv,
    /// Terminal authentication
    Term,
    /// Some other, vendor-specific method
    Other,
}

/// One conditional access-control entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AclEntry {
    pub method: AuthMethod,
    /// Key or PIN reference, when the method uses one
    pub key_ref: Option<u32>,
}

impl AclEntry {
    pub fn chv(key_ref: u32) -> Self {
        Self {
            method: AuthMethod::Chv,
            key_ref: Some(key_ref),
        }
    }

    pub fn term() -> Self {
        Self {
            method: AuthMethod::Term,
            key_ref: None,
        }
    }
}

/// Access policy for one operation on one file node
///
/// Always exactly one of the four variants. Conditional entries accumulate
/// in insertion order; callers assume first-match-wins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessPolicy {
    /// Always permitted, no authentication required
    Always,
    /// Never permitted
    Never,
    /// Policy not known or not decodable
    Unknown,
    /// Ordered conditional entries
    Entries(Vec<AclEntry>),
}

/// Encode a policy as its 4-bit on-card code
///
/// An absent policy and anything without a canonical code encode as 0x0.
/// For a conditional list the head entry is encoded, matching the order the
/// card itself evaluates.
pub fn policy_nibble(policy: Option<&AccessPolicy>) -> u8 {
    match policy {
        Some(AccessPolicy::Never) => 0x0F,
        Some(AccessPolicy::Entries(entries)) => entries.first().map_or(0x00, entry_nibble),
        Some(AccessPolicy::Always) | Some(AccessPolicy::Unknown) | None => 0x00,
    }
}

fn entry_nibble(entry: &AclEntry) -> u8 {
    match entry.method {
        AuthMethod::Chv => match entry.key_ref {
            Some(1) => 0x01,
            Some(2) => 0x02,
            _ => 0x00,
        },
        AuthMethod::Term => 0x04,
        AuthMethod::Other => 0x00,
    }
}

/// Decode a 4-bit on-card code into a policy
///
/// Non-canonical codes degrade to [`AccessPolicy::Unknown`]; this direction
/// is intentionally lossy.
pub fn policy_from_nibble(nibble: u8) -> AccessPolicy {
    match nibble & 0x0F {
        0x00 => AccessPolicy::Always,
        0x01 => AccessPolicy::Entries(vec![AclEntry::chv(1)]),
        0x02 => AccessPolicy::Entries(vec![AclEntry::chv(2)]),
        0x04 => AccessPolicy::Entries(vec![AclEntry::term()]),
        0x0F => AccessPolicy::Never,
        _ => AccessPolicy::Unknown,
    }
}
