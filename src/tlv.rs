//! Minimal BER-TLV reader and writer
//!
//! Just enough TLV to handle the FCI template returned by SELECT and the
//! data objects sent with MANAGE SECURITY ENVIRONMENT. Tags up to two bytes,
//! short and long form lengths.

use thiserror::Error;

/// Errors that can occur during TLV parsing
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TlvError {
    #[error("unexpected end of data while parsing tag")]
    UnexpectedEndTag,

    #[error("unexpected end of data while parsing length")]
    UnexpectedEndLength,

    #[error("unexpected end of data while parsing value")]
    UnexpectedEndValue,

    #[error("invalid length encoding")]
    InvalidLength,
}

impl From<TlvError> for crate::Error {
    fn from(e: TlvError) -> Self {
        crate::Error::Format(e.to_string())
    }
}

/// A parsed TLV data object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tlv {
    /// The tag (1-2 bytes encoded as u16)
    pub tag: u16,
    /// The raw value bytes
    pub value: Vec<u8>,
    /// Child TLVs if this is a constructed (composite) tag
    pub subs: Vec<Tlv>,
}

impl Tlv {
    /// Find a direct child by tag (non-recursive)
    pub fn find_child(&self, tag: u16) -> Option<&Tlv> {
        self.subs.iter().find(|c| c.tag == tag)
    }
}

/// Parse a single TLV from the front of `data`, returning it with the
/// number of bytes consumed
pub fn read_one(data: &[u8], recursive: bool) -> Result<(Tlv, usize), TlvError> {
    let (tag, tag_len) = parse_tag(data)?;
    let (length, len_len) = parse_length(&data[tag_len..])?;
    let start = tag_len + len_len;
    // Compared this way around so a hostile length near usize::MAX cannot
    // wrap the sum on 32-bit targets.
    if length > data.len() - start {
        return Err(TlvError::UnexpectedEndValue);
    }
    let value = data[start..start + length].to_vec();

    // Bit 6 of the first tag byte marks a constructed data object
    let first_byte = if tag > 0xFF { (tag >> 8) as u8 } else { tag as u8 };
    let subs = if recursive && (first_byte & 0x20) != 0 && !value.is_empty() {
        read_all(&value, true)?
    } else {
        Vec::new()
    };

    Ok((Tlv { tag, value, subs }, start + length))
}

/// Parse consecutive TLVs until `data` is exhausted
///
/// Filler bytes (0x00, 0xFF) between objects are skipped.
pub fn read_all(data: &[u8], recursive: bool) -> Result<Vec<Tlv>, TlvError> {
    let mut result = Vec::new();
    let mut rest = data;
    while let Some((&first, tail)) = rest.split_first() {
        if first == 0x00 || first == 0xFF {
            rest = tail;
            continue;
        }
        let (tlv, consumed) = read_one(rest, recursive)?;
        result.push(tlv);
        rest = &rest[consumed..];
    }
    Ok(result)
}

/// Append one primitive TLV with a single-byte tag
///
/// Values under 128 bytes use the short form length; longer values get a
/// long-form length with the minimal octet count.
pub fn put(out: &mut Vec<u8>, tag: u8, value: &[u8]) {
    out.push(tag);
    if value.len() < 0x80 {
        out.push(value.len() as u8);
    } else {
        let bytes = value.len().to_be_bytes();
        let skip = bytes.iter().take_while(|&&b| b == 0).count();
        out.push(0x80 | (bytes.len() - skip) as u8);
        out.extend_from_slice(&bytes[skip..]);
    }
    out.extend_from_slice(value);
}

fn parse_tag(data: &[u8]) -> Result<(u16, usize), TlvError> {
    let (&first, rest) = data.split_first().ok_or(TlvError::UnexpectedEndTag)?;

    // Low 5 bits all set means a multi-byte tag
    if (first & 0x1F) != 0x1F {
        return Ok((first as u16, 1));
    }
    let &second = rest.first().ok_or(TlvError::UnexpectedEndTag)?;
    Ok((((first as u16) << 8) | (second as u16), 2))
}

fn parse_length(data: &[u8]) -> Result<(usize, usize), TlvError> {
    let (&first, rest) = data.split_first().ok_or(TlvError::UnexpectedEndLength)?;

    // Short form (0-127)
    if (first & 0x80) == 0 {
        return Ok((first as usize, 1));
    }

    let num_bytes = (first & 0x7F) as usize;
    if num_bytes == 0 || num_bytes > 4 {
        // Indefinite lengths are not used on cards
        return Err(TlvError::InvalidLength);
    }
    if rest.len() < num_bytes {
        return Err(TlvError::UnexpectedEndLength);
    }
    let mut length = 0usize;
    for &b in &rest[..num_bytes] {
        length = (length << 8) | b as usize;
    }
    Ok((length, 1 + num_bytes))
}
