//! Driver composition
//!
//! A [`Card`] is one powered card session wrapping the transport
//! collaborator. Drivers implement [`CardDriver`]; a vendor overlay holds a
//! generic driver instance and delegates the operations it does not
//! override. [`Session`] walks a list of candidate drivers, binds the first
//! one whose ATR match succeeds and routes all further operations through
//! it.

use bitflags::bitflags;
use log::{debug, info};

use crate::apdu::{Apdu, Response};
use crate::error::{Error, Result};
use crate::file::{FileNode, FilePath};
use crate::transport::CardTransport;

bitflags! {
    /// RSA capability flags registered by a driver's init
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RsaFlags: u32 {
        /// Raw (unpadded) RSA
        const RAW = 0x01;
        /// PKCS#1 v1.5 padding
        const PAD_PKCS1 = 0x02;
        /// Card signs externally hashed input
        const HASH_NONE = 0x04;
        /// Card hashes with SHA-1 before signing
        const HASH_SHA1 = 0x08;
    }
}

/// Cryptographic algorithm families known to the framework
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Rsa,
}

/// One entry of a card's capability registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlgorithmInfo {
    pub algorithm: Algorithm,
    /// Key length in bits
    pub key_length: usize,
    pub flags: RsaFlags,
}

/// Operation a security environment is being prepared for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecOperation {
    Sign,
    Decipher,
    Authenticate,
}

/// How a security environment names its algorithm
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlgorithmSpec {
    /// No algorithm requested
    None,
    /// Algorithm requested by value with capability flags; a vendor driver
    /// translates this into a reference the card understands
    Value { algorithm: Algorithm, flags: RsaFlags },
    /// Vendor-specific numeric algorithm reference
    Reference(u8),
}

/// Requested security environment for a subsequent cryptographic command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityEnv {
    pub operation: SecOperation,
    pub algorithm: AlgorithmSpec,
    /// Key reference within the selected DF
    pub key_ref: Option<u8>,
    /// Key file identifier
    pub file_ref: Option<u16>,
}

impl SecurityEnv {
    pub fn new(operation: SecOperation) -> Self {
        Self {
            operation,
            algorithm: AlgorithmSpec::None,
            key_ref: None,
            file_ref: None,
        }
    }
}

/// One card session
///
/// Owns the transport handle, the raw ATR captured at power-up, the command
/// class byte and the capability registry. All operations on one session are
/// serialized by the caller; the only blocking point is the transport
/// exchange.
pub struct Card {
    transport: Box<dyn CardTransport>,
    /// Raw ATR bytes as captured at reset
    pub atr: Vec<u8>,
    /// Command class byte, fixed by the bound driver's init
    pub cla: u8,
    algorithms: Vec<AlgorithmInfo>,
}

impl Card {
    pub fn new(transport: Box<dyn CardTransport>, atr: Vec<u8>) -> Self {
        Self {
            transport,
            atr,
            cla: 0x00,
            algorithms: Vec::new(),
        }
    }

    /// One command/response exchange through the transport collaborator
    ///
    /// A command that does not fit the short APDU form is rejected here,
    /// before the transport sees it.
    pub fn transmit(&mut self, apdu: &Apdu) -> Result<Response> {
        apdu.validate()?;
        debug!(
            "APDU: CLA={:02X} INS={:02X} P1={:02X} P2={:02X} lc={} le={:?}",
            apdu.cla,
            apdu.ins,
            apdu.p1,
            apdu.p2,
            apdu.data.len(),
            apdu.le
        );
        let response = self.transport.transmit(apdu)?;
        debug!("SW: {:04X}, {} data bytes", response.sw(), response.data.len());
        Ok(response)
    }

    /// Register an RSA capability (init-time, append-only)
    pub fn add_rsa_algorithm(&mut self, key_length: usize, flags: RsaFlags) {
        self.algorithms.push(AlgorithmInfo {
            algorithm: Algorithm::Rsa,
            key_length,
            flags,
        });
    }

    /// The capability registry filled in by the bound driver
    pub fn algorithms(&self) -> &[AlgorithmInfo] {
        &self.algorithms
    }
}

/// The card operation table
///
/// A generic driver implements every operation against the standard command
/// set; a vendor overlay reimplements some and delegates the rest to a
/// generic driver instance it owns.
pub trait CardDriver {
    /// Short driver name for logs
    fn name(&self) -> &'static str;

    /// Whether this driver recognizes the session's raw ATR
    fn match_card(&self, card: &Card) -> bool;

    /// Bind to the card: fix the class byte, allocate private data and
    /// register capabilities
    fn init(&mut self, card: &mut Card) -> Result<()>;

    /// Release driver private data at session teardown
    fn finish(&mut self, _card: &mut Card) -> Result<()> {
        Ok(())
    }

    /// Select a file and return the card's description of it
    fn select_file(&mut self, card: &mut Card, path: &FilePath) -> Result<FileNode>;

    /// Create the file described by `file` under the current DF
    fn create_file(&mut self, card: &mut Card, file: &FileNode) -> Result<()>;

    /// Delete the file addressed by `path`
    fn delete_file(&mut self, card: &mut Card, path: &FilePath) -> Result<()>;

    /// List the files under the current DF into `buf`, returning the number
    /// of bytes written
    fn list_files(&mut self, card: &mut Card, buf: &mut [u8]) -> Result<usize>;

    /// Install a security environment for a subsequent cryptographic command
    fn set_security_env(&mut self, card: &mut Card, env: &SecurityEnv, se_num: u8) -> Result<()>;
}

/// A card session bound to the driver that recognized it
pub struct Session {
    card: Card,
    driver: Box<dyn CardDriver>,
}

impl Session {
    /// Match the card against candidate drivers and bind the first hit
    ///
    /// Candidates are tried in order; a vendor overlay therefore goes before
    /// the catch-all generic driver. No match leaves the card unbound.
    pub fn bind(mut card: Card, candidates: Vec<Box<dyn CardDriver>>) -> Result<Session> {
        for mut driver in candidates {
            if !driver.match_card(&card) {
                continue;
            }
            info!("binding driver '{}'", driver.name());
            driver.init(&mut card)?;
            return Ok(Session { card, driver });
        }
        Err(Error::NotSupported("no driver recognizes the card ATR"))
    }

    pub fn card(&self) -> &Card {
        &self.card
    }

    pub fn select_file(&mut self, path: &FilePath) -> Result<FileNode> {
        self.driver.select_file(&mut self.card, path)
    }

    pub fn create_file(&mut self, file: &FileNode) -> Result<()> {
        self.driver.create_file(&mut self.card, file)
    }

    pub fn delete_file(&mut self, path: &FilePath) -> Result<()> {
        self.driver.delete_file(&mut self.card, path)
    }

    pub fn list_files(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.driver.list_files(&mut self.card, buf)
    }

    pub fn set_security_env(&mut self, env: &SecurityEnv, se_num: u8) -> Result<()> {
        self.driver.set_security_env(&mut self.card, env, se_num)
    }

    /// Tear the session down, releasing driver private data
    pub fn finish(mut self) -> Result<()> {
        self.driver.finish(&mut self.card)
    }
}
