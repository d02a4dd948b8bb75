//! Server Side Sorting controls ([RFC 2891](https://tools.ietf.org/html/rfc2891)).

use berstream::common::TagClass;
use berstream::structure::StructureTag;
use berstream::structures::{Boolean, Enumerated, OctetString, Sequence, Tag};

use super::ControlValue;
use crate::error::{DecodeError, EncodeError};

pub const SORT_REQUEST_OID: &str = "1.2.840.113556.1.4.473";
pub const SORT_RESPONSE_OID: &str = "1.2.840.113556.1.4.474";

/// One sort key of a request.
#[derive(Clone, Debug, PartialEq)]
pub struct SortKey {
    pub attr_type: String,
    pub ordering_rule: Option<String>,
    pub reverse_order: bool,
}

impl SortKey {
    pub fn ascending(attr_type: &str) -> SortKey {
        SortKey {
            attr_type: attr_type.to_owned(),
            ordering_rule: None,
            reverse_order: false,
        }
    }

    pub fn descending(attr_type: &str) -> SortKey {
        SortKey {
            attr_type: attr_type.to_owned(),
            ordering_rule: None,
            reverse_order: true,
        }
    }
}

/// Sort request: an ordered, non-empty list of keys.
#[derive(Clone, Debug, PartialEq)]
pub struct SortRequest {
    pub keys: Vec<SortKey>,
}

/// Sort response. `sort_result` is kept numeric on decode so that
/// out-of-range values reach the caller; encoding refuses codes RFC 2891
/// does not define.
#[derive(Clone, Debug, PartialEq)]
pub struct SortResponse {
    pub sort_result: u32,
    pub attr_type: Option<String>,
}

/// Result codes enumerated by RFC 2891 §2.2.
const KNOWN_SORT_RESULTS: &[u32] = &[0, 1, 3, 8, 11, 16, 18, 50, 51, 53, 80];

fn decode_key(tag: StructureTag) -> Result<SortKey, DecodeError> {
    const WHAT: &str = "sort key";
    let mut components = tag
        .expect_constructed()
        .ok_or(DecodeError::Protocol(WHAT))?
        .into_iter();
    let attr_type = components
        .next()
        .ok_or(DecodeError::Protocol(WHAT))
        .and_then(|t| super::expect_octets(t, WHAT))
        .and_then(|b| super::expect_utf8(b, WHAT))?;
    let mut key = SortKey {
        attr_type,
        ordering_rule: None,
        reverse_order: false,
    };
    for t in components {
        match (t.class, t.id) {
            (TagClass::Context, 0) if key.ordering_rule.is_none() && !key.reverse_order => {
                let rule = t
                    .expect_primitive()
                    .ok_or(DecodeError::Protocol(WHAT))
                    .and_then(|b| super::expect_utf8(b, WHAT))?;
                key.ordering_rule = Some(rule);
            }
            (TagClass::Context, 1) => {
                let content = t.expect_primitive().ok_or(DecodeError::Protocol(WHAT))?;
                if content.len() != 1 {
                    return Err(DecodeError::Protocol(WHAT));
                }
                key.reverse_order = content[0] != 0;
            }
            _ => return Err(DecodeError::Protocol("unexpected tag in sort key")),
        }
    }
    Ok(key)
}

pub(crate) fn decode_request_value(val: Option<&[u8]>) -> Result<ControlValue, DecodeError> {
    const WHAT: &str = "sort request value";
    let tag = super::parse_value_tree(val, WHAT)?;
    let keys = tag
        .expect_constructed()
        .ok_or(DecodeError::Protocol(WHAT))?
        .into_iter()
        .map(decode_key)
        .collect::<Result<Vec<_>, _>>()?;
    if keys.is_empty() {
        return Err(DecodeError::Protocol("sort request without keys"));
    }
    Ok(ControlValue::SortRequest(SortRequest { keys }))
}

pub(crate) fn decode_response_value(val: Option<&[u8]>) -> Result<ControlValue, DecodeError> {
    const WHAT: &str = "sort response value";
    let tag = super::parse_value_tree(val, WHAT)?;
    let mut components = tag
        .expect_constructed()
        .ok_or(DecodeError::Protocol(WHAT))?
        .into_iter();
    let sort_result = components
        .next()
        .ok_or(DecodeError::Protocol(WHAT))
        .and_then(|t| super::expect_enum(t, WHAT))? as u32;
    let attr_type = match components.next() {
        None => None,
        Some(t) => {
            if t.class != TagClass::Context || t.id != 0 {
                return Err(DecodeError::Protocol(WHAT));
            }
            Some(
                t.expect_primitive()
                    .ok_or(DecodeError::Protocol(WHAT))
                    .and_then(|b| super::expect_utf8(b, WHAT))?,
            )
        }
    };
    Ok(ControlValue::SortResponse(SortResponse {
        sort_result,
        attr_type,
    }))
}

pub(crate) fn encode_request_value(req: &SortRequest) -> Result<Vec<u8>, EncodeError> {
    if req.keys.is_empty() {
        return Err(EncodeError::CannotEncode("sort request without keys"));
    }
    let keys = req
        .keys
        .iter()
        .map(|key| {
            let mut inner = vec![Tag::OctetString(OctetString {
                inner: Vec::from(key.attr_type.as_bytes()),
                ..Default::default()
            })];
            if let Some(ref rule) = key.ordering_rule {
                inner.push(Tag::OctetString(OctetString {
                    class: TagClass::Context,
                    id: 0,
                    inner: Vec::from(rule.as_bytes()),
                }));
            }
            if key.reverse_order {
                inner.push(Tag::Boolean(Boolean {
                    class: TagClass::Context,
                    id: 1,
                    inner: true,
                }));
            }
            Tag::Sequence(Sequence {
                inner,
                ..Default::default()
            })
        })
        .collect();
    Ok(super::encode_value_tree(Tag::Sequence(Sequence {
        inner: keys,
        ..Default::default()
    })))
}

pub(crate) fn encode_response_value(resp: &SortResponse) -> Result<Vec<u8>, EncodeError> {
    if !KNOWN_SORT_RESULTS.contains(&resp.sort_result) {
        return Err(EncodeError::UnknownSortResult(resp.sort_result));
    }
    let mut inner = vec![Tag::Enumerated(Enumerated {
        inner: resp.sort_result as i64,
        ..Default::default()
    })];
    if let Some(ref attr_type) = resp.attr_type {
        inner.push(Tag::OctetString(OctetString {
            class: TagClass::Context,
            id: 0,
            inner: Vec::from(attr_type.as_bytes()),
        }));
    }
    Ok(super::encode_value_tree(Tag::Sequence(Sequence {
        inner,
        ..Default::default()
    })))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn request_roundtrip() {
        let req = SortRequest {
            keys: vec![SortKey::ascending("cn"), SortKey::descending("sn")],
        };
        let bytes = encode_request_value(&req).expect("encoded");
        match decode_request_value(Some(&bytes)).expect("decoded") {
            ControlValue::SortRequest(back) => assert_eq!(back, req),
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn request_with_rule() {
        let req = SortRequest {
            keys: vec![SortKey {
                attr_type: "givenName".to_owned(),
                ordering_rule: Some("2.5.13.3".to_owned()),
                reverse_order: true,
            }],
        };
        let bytes = encode_request_value(&req).expect("encoded");
        match decode_request_value(Some(&bytes)).expect("decoded") {
            ControlValue::SortRequest(back) => assert_eq!(back, req),
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn empty_request_rejected() {
        // wire: an empty outer sequence
        assert!(decode_request_value(Some(&[0x30, 0x00])).is_err());
        assert!(encode_request_value(&SortRequest { keys: vec![] }).is_err());
    }

    #[test]
    fn response_roundtrip() {
        let resp = SortResponse {
            sort_result: 0,
            attr_type: Some("cn".to_owned()),
        };
        let bytes = encode_response_value(&resp).expect("encoded");
        match decode_response_value(Some(&bytes)).expect("decoded") {
            ControlValue::SortResponse(back) => assert_eq!(back, resp),
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn unknown_sort_result_refused_on_encode() {
        let resp = SortResponse {
            sort_result: 19,
            attr_type: None,
        };
        assert!(matches!(
            encode_response_value(&resp),
            Err(EncodeError::UnknownSortResult(19))
        ));
    }

    #[test]
    fn unknown_tag_in_key_rejected() {
        // SEQUENCE { SEQUENCE { "cn", [2] 0xFF } } -- [2] is not defined
        let bytes = [
            0x30, 0x09, 0x30, 0x07, 0x04, 0x02, b'c', b'n', 0x82, 0x01, 0xFF,
        ];
        assert!(decode_request_value(Some(&bytes)).is_err());
    }
}
