//! ATR (Answer To Reset) decoding
//!
//! Parses the byte sequence a card emits at reset into structured timing and
//! protocol parameters plus the trailing historical bytes, and matches raw
//! ATRs against known card-family patterns.
//!
//! An ATR is TS (initial character), T0 (historical count and presence mask),
//! then up to four rounds of optional interface bytes TA/TB/TC/TD where each
//! TD's high nibble is the presence mask of the next round, then up to 15
//! historical bytes.

use thiserror::Error;

/// Hardware-imposed maximum ATR length
pub const MAX_ATR_SIZE: usize = 33;

/// Maximum number of interface-byte rounds
///
/// ISO 7816-3 cards stop at TD4 in practice; the cap keeps a corrupted
/// stream from driving the chain loop on buffer exhaustion alone.
const MAX_INTERFACE_ROUNDS: usize = 4;

// 16-entry lookup tables indexed by the FI/DI nibbles of TA1. Reserved
// slots decode to "not specified".
const FI_TABLE: [Option<u32>; 16] = [
    Some(372),
    Some(372),
    Some(558),
    Some(744),
    Some(1116),
    Some(1488),
    Some(1860),
    None,
    None,
    Some(512),
    Some(768),
    Some(1024),
    Some(1536),
    Some(2048),
    None,
    None,
];

// Maximum clock frequency in units of 100 kHz, indexed by FI.
const F_MAX_TABLE: [Option<u32>; 16] = [
    Some(40),
    Some(50),
    Some(60),
    Some(80),
    Some(120),
    Some(160),
    Some(200),
    None,
    None,
    Some(50),
    Some(75),
    Some(100),
    Some(150),
    Some(200),
    None,
    None,
];

const DI_TABLE: [Option<u32>; 16] = [
    None,
    Some(1),
    Some(2),
    Some(4),
    Some(8),
    Some(16),
    Some(32),
    None,
    Some(12),
    Some(20),
    None,
    None,
    None,
    None,
    None,
    None,
];

/// Errors that can occur while decoding an ATR
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AtrError {
    #[error("ATR too short: expected at least 2 bytes, got {0}")]
    TooShort(usize),

    #[error("invalid initial character in ATR: 0x{0:02X}")]
    InvalidInitialByte(u8),
}

impl From<AtrError> for crate::Error {
    fn from(e: AtrError) -> Self {
        crate::Error::Format(e.to_string())
    }
}

/// Decoded ATR parameters
///
/// Every field is either a validated table lookup result or "not specified";
/// raw indices are never exposed. The historical bytes borrow from the input
/// buffer and must not outlive it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtrInfo<'a> {
    /// Clock rate conversion factor Fi
    pub fi: Option<u32>,
    /// Maximum clock frequency in units of 100 kHz
    pub f_max: Option<u32>,
    /// Baud rate adjustment factor Di
    pub di: Option<u32>,
    /// Extra guard time N
    pub extra_guard_time: Option<u8>,
    /// Trailing historical bytes (borrowed view into the raw ATR)
    pub historical_bytes: &'a [u8],
}

/// The four optional interface bytes of one ATR round, in stream order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InterfaceByte {
    Ta = 0,
    Tb = 1,
    Tc = 2,
    Td = 3,
}

const ROUND_ORDER: [InterfaceByte; 4] = [
    InterfaceByte::Ta,
    InterfaceByte::Tb,
    InterfaceByte::Tc,
    InterfaceByte::Td,
];

/// Decode a raw ATR into an [`AtrInfo`]
///
/// Only an unrecognized initial character (or a buffer shorter than the two
/// mandatory bytes) is a hard failure. A stream that runs out mid-chain or
/// that announces more historical bytes than it carries degrades gracefully:
/// fields derived so far are kept and the rest stay "not specified".
pub fn parse_atr(atr: &[u8]) -> Result<AtrInfo<'_>, AtrError> {
    if atr.len() < 2 {
        return Err(AtrError::TooShort(atr.len()));
    }
    if atr[0] != 0x3B && atr[0] != 0x3F {
        return Err(AtrError::InvalidInitialByte(atr[0]));
    }

    let n_hist = (atr[1] & 0x0F) as usize;
    let mut mask = atr[1] >> 4;
    let mut rest = &atr[2..];
    let mut info = AtrInfo {
        fi: None,
        f_max: None,
        di: None,
        extra_guard_time: None,
        historical_bytes: &[],
    };

    for round in 0..MAX_INTERFACE_ROUNDS {
        let mut group = [None::<u8>; 4];
        for ib in ROUND_ORDER {
            if mask & (1 << ib as usize) == 0 {
                continue;
            }
            let Some((&byte, tail)) = rest.split_first() else {
                break;
            };
            group[ib as usize] = Some(byte);
            rest = tail;
        }

        if round == 0 {
            if let Some(ta1) = group[InterfaceByte::Ta as usize] {
                info.fi = FI_TABLE[(ta1 >> 4) as usize];
                info.f_max = F_MAX_TABLE[(ta1 >> 4) as usize];
                info.di = DI_TABLE[(ta1 & 0x0F) as usize];
            }
            // The guard time byte only counts when the byte before it in
            // the group was present as well.
            if group[InterfaceByte::Tb as usize].is_some() {
                info.extra_guard_time = group[InterfaceByte::Tc as usize];
            }
        }

        // The chain continues only while TD is present with a non-zero
        // presence mask for the next round and bytes remain.
        match group[InterfaceByte::Td as usize] {
            Some(td) if td != 0 && td >> 4 != 0 && !rest.is_empty() => mask = td >> 4,
            _ => break,
        }
    }

    // A truncated stream yields fewer historical bytes, not an error.
    let count = n_hist.min(rest.len());
    info.historical_bytes = &rest[..count];
    Ok(info)
}

/// Match a raw ATR against a table of known exact patterns
///
/// Returns the index of the first matching pattern. Identification compares
/// the raw bytes, not the structural decode.
pub fn match_atr(atr: &[u8], patterns: &[&[u8]]) -> Option<usize> {
    patterns.iter().position(|p| *p == atr)
}
