//! Status Word (SW) constants for APDU responses
//!
//! ISO 7816-4 status words indicating command execution results.

use crate::error::Error;

/// Status Word constants and helpers
pub struct SW;

impl SW {
    // Success
    pub const SUCCESS: u16 = 0x9000;

    // Warnings (62xx)
    pub const WARNING_CORRUPTED: u16 = 0x6281;
    pub const WARNING_SELECTED_FILE_INVALIDATED: u16 = 0x6283;

    // Checking errors
    pub const WRONG_LENGTH: u16 = 0x6700;
    pub const SECURITY_STATUS_NOT_SATISFIED: u16 = 0x6982;
    pub const AUTH_METHOD_BLOCKED: u16 = 0x6983;
    pub const CONDITIONS_NOT_SATISFIED: u16 = 0x6985;
    pub const WRONG_DATA: u16 = 0x6A80;
    pub const FUNCTION_NOT_SUPPORTED: u16 = 0x6A81;
    pub const FILE_NOT_FOUND: u16 = 0x6A82;
    pub const NOT_ENOUGH_MEMORY: u16 = 0x6A84;
    pub const INCORRECT_P1_P2: u16 = 0x6A86;
    pub const FILE_ALREADY_EXISTS: u16 = 0x6A89;
    pub const WRONG_P1_P2: u16 = 0x6B00;
    pub const INS_NOT_SUPPORTED: u16 = 0x6D00;
    pub const CLA_NOT_SUPPORTED: u16 = 0x6E00;
    pub const UNKNOWN_ERROR: u16 = 0x6F00;

    /// Check if a status word indicates success (9000 or 61xx)
    #[inline]
    pub fn is_success(sw: u16) -> bool {
        sw == Self::SUCCESS || (sw & 0xFF00) == 0x6100
    }

    /// Translate a status word into a driver outcome
    ///
    /// Success status words map to Ok; everything else is surfaced as a
    /// [`Error::CardStatus`] wrapping the raw word.
    #[inline]
    pub fn check(sw: u16) -> Result<(), Error> {
        if Self::is_success(sw) {
            Ok(())
        } else {
            Err(Error::CardStatus(sw))
        }
    }
}
