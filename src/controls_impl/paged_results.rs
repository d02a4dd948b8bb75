use berstream::structures::{Integer, OctetString, Sequence, Tag};

use super::ControlValue;
use crate::error::DecodeError;

/// Paged Results control ([RFC 2696](https://tools.ietf.org/html/rfc2696)).
///
/// The same shape is used for requests and responses, although `size` means
/// different things in each case.
#[derive(Clone, Debug, PartialEq)]
pub struct PagedResults {
    /// For requests, desired page size. For responses, a server's estimate
    /// of the result set size, if non-zero.
    pub size: i32,
    /// Paging cookie.
    pub cookie: Vec<u8>,
}

pub const PAGED_RESULTS_OID: &str = "1.2.840.113556.1.4.319";

pub(crate) fn decode_value(val: Option<&[u8]>) -> Result<ControlValue, DecodeError> {
    const WHAT: &str = "paged results value";
    let tag = super::parse_value_tree(val, WHAT)?;
    let mut components = tag
        .expect_constructed()
        .ok_or(DecodeError::Protocol(WHAT))?
        .into_iter();
    let size = components
        .next()
        .ok_or(DecodeError::Protocol(WHAT))
        .and_then(|t| super::expect_int(t, WHAT))? as i32;
    let cookie = components
        .next()
        .ok_or(DecodeError::Protocol(WHAT))
        .and_then(|t| super::expect_octets(t, WHAT))?;
    Ok(ControlValue::PagedResults(PagedResults { size, cookie }))
}

pub(crate) fn encode_value(pr: &PagedResults) -> Vec<u8> {
    super::encode_value_tree(Tag::Sequence(Sequence {
        inner: vec![
            Tag::Integer(Integer {
                inner: pr.size as i64,
                ..Default::default()
            }),
            Tag::OctetString(OctetString {
                inner: pr.cookie.clone(),
                ..Default::default()
            }),
        ],
        ..Default::default()
    }))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn roundtrip() {
        let pr = PagedResults {
            size: 500,
            cookie: b"opaque".to_vec(),
        };
        let bytes = encode_value(&pr);
        match decode_value(Some(&bytes)).expect("decoded") {
            ControlValue::PagedResults(back) => assert_eq!(back, pr),
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn absent_value_rejected() {
        assert!(decode_value(None).is_err());
    }
}
