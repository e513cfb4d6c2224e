//! Smart card driver framework core
//!
//! This crate is the generic core of a smart-card driver stack:
//!
//! - [`atr`] decodes the Answer-To-Reset byte stream a card emits at
//!   power-up and matches raw ATRs against known card-family patterns,
//! - [`file`] and [`acl`] model the on-card hierarchical file system and its
//!   per-operation access-control policy,
//! - [`driver`] defines the [`CardDriver`] operation table and the session
//!   binding flow,
//! - [`iso7816`] is the generic base driver against the standard command
//!   set, and [`miocos`] is the MioCOS 1.1 vendor overlay that overrides
//!   selected operations while delegating the rest.
//!
//! The physical reader layer is external; it plugs in through the
//! [`transport::CardTransport`] trait, one synchronous APDU exchange at a
//! time. One [`driver::Card`] is one card session; operations on a session
//! are serialized by the caller.
//!
//! # Example
//! ```no_run
//! use sc_core::driver::{Card, CardDriver, Session};
//! use sc_core::file::FilePath;
//! use sc_core::iso7816::Iso7816Driver;
//! use sc_core::miocos::MiocosDriver;
//!
//! # fn open_reader() -> Box<dyn sc_core::transport::CardTransport> { unimplemented!() }
//! # fn captured_atr() -> Vec<u8> { Vec::new() }
//! let card = Card::new(open_reader(), captured_atr());
//! let candidates: Vec<Box<dyn CardDriver>> =
//!     vec![Box::new(MiocosDriver::new()), Box::new(Iso7816Driver::new())];
//! let mut session = Session::bind(card, candidates)?;
//! let file = session.select_file(&FilePath::from_id(0x3F00))?;
//! # Ok::<(), sc_core::Error>(())
//! ```

pub mod acl;
pub mod apdu;
pub mod atr;
pub mod driver;
mod error;
pub mod file;
pub mod iso7816;
pub mod miocos;
pub mod tlv;
pub mod transport;

pub use driver::{Card, CardDriver, Session};
pub use error::{Error, Result};
