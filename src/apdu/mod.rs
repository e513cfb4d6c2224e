//! APDU (Application Protocol Data Unit) handling
//!
//! Command-side structures for ISO 7816-4 APDUs. Drivers build an [`Apdu`],
//! hand it to the transport collaborator, and get back a [`Response`]
//! carrying the card's data and status word.
//!
//! # Example
//! ```
//! use sc_core::apdu::Apdu;
//!
//! // SELECT by file id
//! let apdu = Apdu::with_data(0x00, 0xA4, 0x00, 0x00, vec![0x3F, 0x00]).expecting(256);
//! let raw = apdu.to_bytes().unwrap();
//! assert_eq!(raw[..4], [0x00, 0xA4, 0x00, 0x00]);
//! ```

mod response;
mod status;

pub use response::Response;
pub use status::SW;

use thiserror::Error;

/// Errors that can occur while serializing an APDU
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApduError {
    #[error("command data too long for short APDU: {0} bytes")]
    DataTooLong(usize),

    #[error("expected response length too large for short APDU: {0}")]
    LeTooLarge(usize),
}

impl From<ApduError> for crate::Error {
    fn from(e: ApduError) -> Self {
        match e {
            ApduError::DataTooLong(_) => {
                crate::Error::InvalidArguments("command data too long for short APDU")
            }
            ApduError::LeTooLarge(_) => {
                crate::Error::InvalidArguments("expected length too large for short APDU")
            }
        }
    }
}

/// A command APDU
///
/// # Fields
/// - `cla`: Class byte (fixed per card family by the driver's init)
/// - `ins`: Instruction byte (the command to execute)
/// - `p1`, `p2`: Parameter bytes (command-specific)
/// - `data`: Outgoing command data (may be empty)
/// - `le`: Expected response length, None if no response body is expected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Apdu {
    /// Class byte (CLA)
    pub cla: u8,
    /// Instruction byte (INS)
    pub ins: u8,
    /// Parameter 1 (P1)
    pub p1: u8,
    /// Parameter 2 (P2)
    pub p2: u8,
    /// Command data (may be empty)
    pub data: Vec<u8>,
    /// Expected response length (Le), None if not specified
    pub le: Option<usize>,
}

impl Apdu {
    /// Create a case 1 APDU with just the header (CLA, INS, P1, P2)
    pub fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: Vec::new(),
            le: None,
        }
    }

    /// Create an APDU carrying command data
    pub fn with_data(cla: u8, ins: u8, p1: u8, p2: u8, data: Vec<u8>) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data,
            le: None,
        }
    }

    /// Set the expected response length (Le)
    pub fn expecting(mut self, le: usize) -> Self {
        self.le = Some(le);
        self
    }

    /// Check that the command fits the short APDU form
    pub fn validate(&self) -> Result<(), ApduError> {
        if self.data.len() > 255 {
            return Err(ApduError::DataTooLong(self.data.len()));
        }
        if let Some(le) = self.le {
            if le > 256 {
                return Err(ApduError::LeTooLarge(le));
            }
        }
        Ok(())
    }

    /// Serialize to raw bytes in short form
    ///
    /// Covers ISO 7816-4 cases 1 through 4 (short). Le of 256 is encoded as
    /// 0x00 per the standard.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ApduError> {
        self.validate()?;

        let mut out = Vec::with_capacity(4 + 1 + self.data.len() + 1);
        out.push(self.cla);
        out.push(self.ins);
        out.push(self.p1);
        out.push(self.p2);
        if !self.data.is_empty() {
            out.push(self.data.len() as u8);
            out.extend_from_slice(&self.data);
        }
        if let Some(le) = self.le {
            // 256 encodes as 0x00
            out.push(le as u8);
        }
        Ok(out)
    }
}

/// Instruction bytes used by the drivers in this crate
pub mod ins {
    pub const SELECT: u8 = 0xA4;
    pub const CREATE_FILE: u8 = 0xE0;
    pub const DELETE_FILE: u8 = 0xE4;
    pub const MANAGE_SECURITY_ENV: u8 = 0x22;
    pub const GET_DATA: u8 = 0xCA;
}
