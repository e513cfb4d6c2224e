//! Transport collaborator seam
//!
//! The physical reader layer (slot detection, card power, raw byte exchange)
//! lives outside this crate. Drivers only need one synchronous exchange
//! primitive, expressed by [`CardTransport`].

use crate::apdu::{Apdu, Response};
use crate::error::Result;

/// One synchronous command/response exchange with the card
///
/// Implementations own their timeout and cancellation behavior; this crate
/// never retries an exchange. Exactly one exchange is in flight per card
/// session at any time (sessions are externally serialized).
pub trait CardTransport {
    /// Submit a command and receive the card's response
    ///
    /// A communication failure maps to [`crate::Error::Transport`]. A
    /// non-success status word is NOT an error at this level; the caller
    /// decides via [`crate::apdu::SW::check`].
    fn transmit(&mut self, apdu: &Apdu) -> Result<Response>;
}
