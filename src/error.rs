//! Crate-wide error type
//!
//! Driver operations return a single typed error to the immediate caller.
//! Nothing in this crate retries or swallows an error; callers above decide
//! on user-visible messaging and retry policy.

use thiserror::Error;

/// Errors reported by the driver core
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// Input bytes do not follow the expected wire format
    #[error("format error: {0}")]
    Format(String),

    /// Caller supplied an argument of the wrong shape or type
    #[error("invalid arguments: {0}")]
    InvalidArguments(&'static str),

    /// The transport collaborator failed to complete an exchange
    #[error("transport failure: {0}")]
    Transport(String),

    /// The card answered with a non-success status word
    #[error("card returned status word {0:#06X}")]
    CardStatus(u16),

    /// A buffer or allocation limit was exceeded
    #[error("out of resources: {0}")]
    Resource(&'static str),

    /// The operation is not available on this driver or card
    #[error("not supported: {0}")]
    NotSupported(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_status_display() {
        let e = Error::CardStatus(0x6A82);
        assert_eq!(e.to_string(), "card returned status word 0x6A82");
    }

    #[test]
    fn test_errors_compare() {
        assert_eq!(Error::CardStatus(0x6982), Error::CardStatus(0x6982));
        assert_ne!(
            Error::InvalidArguments("path"),
            Error::NotSupported("list_files")
        );
    }
}
