//! Header and whole-tree parsers.
//!
//! These operate on in-memory slices with streaming semantics: a partial
//! header or value yields `Err(Incomplete)` so callers holding a growing
//! buffer can retry once more input arrives. The stateful, feed-oriented
//! layer lives in [`crate::decoder`].

use crate::common::{TagClass, TagStructure};
use crate::structure::{StructureTag, PL};

use nom::bytes::streaming::take;
use nom::error::{Error, ErrorKind};
use nom::number::streaming::be_u8;
use nom::{Err, IResult};

/// Longest accepted long-form length: 4 octets, i.e. lengths up to 2^32-1.
pub const MAX_LENGTH_OCTETS: usize = 4;

fn fail(i: &[u8]) -> Err<Error<&[u8]>> {
    Err::Error(Error::new(i, ErrorKind::Tag))
}

/// Parse the identifier octet into (class, primitive/constructed, tag number).
///
/// High-tag-number form (tag number bits all ones) is rejected; no LDAP
/// construct uses it.
pub fn parse_type_header(i: &[u8]) -> IResult<&[u8], (TagClass, TagStructure, u64)> {
    let (rest, octet) = be_u8(i)?;
    let class = TagClass::from_u8(octet >> 6).expect("two bits");
    let structure = TagStructure::from_u8((octet >> 5) & 0x01).expect("one bit");
    let id = (octet & 0x1F) as u64;
    if id == 0x1F {
        return Err(fail(i));
    }
    Ok((rest, (class, structure, id)))
}

/// Parse a definite-form length, short or long.
///
/// The indefinite form (`0x80`) and long forms wider than
/// [`MAX_LENGTH_OCTETS`] are rejected.
pub fn parse_length(i: &[u8]) -> IResult<&[u8], u64> {
    let (rest, first) = be_u8(i)?;
    if first & 0x80 == 0 {
        return Ok((rest, first as u64));
    }
    let count = (first & 0x7F) as usize;
    if count == 0 || count > MAX_LENGTH_OCTETS {
        return Err(fail(i));
    }
    let (rest, octets) = take(count)(rest)?;
    Ok((rest, fold_uint(octets)))
}

fn fold_uint(octets: &[u8]) -> u64 {
    octets.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

/// Extract an unsigned integer value from BER content octets.
pub fn parse_uint(i: &[u8]) -> IResult<&[u8], u64> {
    if i.len() > 8 {
        return Err(fail(i));
    }
    Ok((&i[i.len()..], fold_uint(i)))
}

/// Extract a signed integer value from BER content octets.
pub fn parse_int(i: &[u8]) -> IResult<&[u8], i64> {
    if i.is_empty() || i.len() > 8 {
        return Err(fail(i));
    }
    let mut acc: i64 = if i[0] & 0x80 != 0 { -1 } else { 0 };
    for &b in i {
        acc = (acc << 8) | b as i64;
    }
    Ok((&i[i.len()..], acc))
}

/// Parse one complete TLV, recursing into constructed payloads.
pub fn parse_tag(i: &[u8]) -> IResult<&[u8], StructureTag> {
    let (i, (class, structure, id)) = parse_type_header(i)?;
    let (mut i, len) = parse_length(i)?;

    let pl: PL = match structure {
        TagStructure::Primitive => {
            let (j, content) = take(len as usize)(i)?;
            i = j;
            PL::P(content.to_vec())
        }
        TagStructure::Constructed => {
            let (j, mut content) = take(len as usize)(i)?;
            i = j;
            let mut tv: Vec<StructureTag> = Vec::new();
            while !content.is_empty() {
                // A child running off the end of its parent's content is a
                // framing error, not missing input.
                let (rest, child) = parse_tag(content).map_err(|e| match e {
                    Err::Incomplete(_) => Err::Failure(Error::new(content, ErrorKind::Eof)),
                    e => e,
                })?;
                content = rest;
                tv.push(child);
            }
            PL::C(tv)
        }
    };

    Ok((i, StructureTag { class, id, payload: pl }))
}

/// Number of bytes `parse_tag` would need, if knowable, for the PDU
/// starting at the head of `i`.
pub fn pdu_size(i: &[u8]) -> Result<Option<usize>, ()> {
    let mut cursor = i;
    let start = i.len();
    match parse_type_header(cursor) {
        Ok((rest, _)) => cursor = rest,
        Err(Err::Incomplete(_)) => return Ok(None),
        Err(_) => return Err(()),
    }
    match parse_length(cursor) {
        Ok((rest, len)) => Ok(Some(start - rest.len() + len as usize)),
        Err(Err::Incomplete(_)) => Ok(None),
        Err(_) => Err(()),
    }
}
