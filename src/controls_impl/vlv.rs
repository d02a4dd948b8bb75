//! Virtual List View controls (draft-ietf-ldapext-ldapv3-vlv).

use berstream::common::TagClass;
use berstream::structure::PL;
use berstream::structures::{ASNTag, Enumerated, Integer, OctetString, Sequence, Tag};

use super::ControlValue;
use crate::error::DecodeError;

pub const VLV_REQUEST_OID: &str = "2.16.840.1.113730.3.4.9";
pub const VLV_RESPONSE_OID: &str = "2.16.840.1.113730.3.4.10";

/// Window target of a VLV request.
#[derive(Clone, Debug, PartialEq)]
pub enum VlvTarget {
    /// `[0]` byOffset { offset, contentCount }.
    ByOffset { offset: i32, content_count: i32 },
    /// `[1]` greaterThanOrEqual assertion value.
    ByValue(Vec<u8>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct VlvRequest {
    pub before_count: i32,
    pub after_count: i32,
    pub target: VlvTarget,
    pub context_id: Option<Vec<u8>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VlvResponse {
    pub target_position: i32,
    pub content_count: i32,
    pub result: u32,
    pub context_id: Option<Vec<u8>>,
}

pub(crate) fn decode_request_value(val: Option<&[u8]>) -> Result<ControlValue, DecodeError> {
    const WHAT: &str = "virtual list view request value";
    let tag = super::parse_value_tree(val, WHAT)?;
    let mut components = tag
        .expect_constructed()
        .ok_or(DecodeError::Protocol(WHAT))?
        .into_iter();
    let before_count = components
        .next()
        .ok_or(DecodeError::Protocol(WHAT))
        .and_then(|t| super::expect_int(t, WHAT))? as i32;
    let after_count = components
        .next()
        .ok_or(DecodeError::Protocol(WHAT))
        .and_then(|t| super::expect_int(t, WHAT))? as i32;
    let target_tag = components.next().ok_or(DecodeError::Protocol(WHAT))?;
    if target_tag.class != TagClass::Context {
        return Err(DecodeError::Protocol(WHAT));
    }
    let target = match (target_tag.id, target_tag.payload) {
        (0, PL::C(inner)) => {
            let mut inner = inner.into_iter();
            let offset = inner
                .next()
                .ok_or(DecodeError::Protocol(WHAT))
                .and_then(|t| super::expect_int(t, WHAT))? as i32;
            let content_count = inner
                .next()
                .ok_or(DecodeError::Protocol(WHAT))
                .and_then(|t| super::expect_int(t, WHAT))? as i32;
            VlvTarget::ByOffset {
                offset,
                content_count,
            }
        }
        (1, PL::P(value)) => VlvTarget::ByValue(value),
        _ => return Err(DecodeError::Protocol("unexpected VLV target")),
    };
    let context_id = match components.next() {
        None => None,
        Some(t) => Some(super::expect_octets(t, WHAT)?),
    };
    Ok(ControlValue::VlvRequest(VlvRequest {
        before_count,
        after_count,
        target,
        context_id,
    }))
}

pub(crate) fn decode_response_value(val: Option<&[u8]>) -> Result<ControlValue, DecodeError> {
    const WHAT: &str = "virtual list view response value";
    let tag = super::parse_value_tree(val, WHAT)?;
    let mut components = tag
        .expect_constructed()
        .ok_or(DecodeError::Protocol(WHAT))?
        .into_iter();
    let target_position = components
        .next()
        .ok_or(DecodeError::Protocol(WHAT))
        .and_then(|t| super::expect_int(t, WHAT))? as i32;
    let content_count = components
        .next()
        .ok_or(DecodeError::Protocol(WHAT))
        .and_then(|t| super::expect_int(t, WHAT))? as i32;
    let result = components
        .next()
        .ok_or(DecodeError::Protocol(WHAT))
        .and_then(|t| super::expect_enum(t, WHAT))? as u32;
    let context_id = match components.next() {
        None => None,
        Some(t) => Some(super::expect_octets(t, WHAT)?),
    };
    Ok(ControlValue::VlvResponse(VlvResponse {
        target_position,
        content_count,
        result,
        context_id,
    }))
}

pub(crate) fn encode_request_value(req: &VlvRequest) -> Vec<u8> {
    let target = match &req.target {
        VlvTarget::ByOffset {
            offset,
            content_count,
        } => {
            let inner = Sequence {
                inner: vec![
                    Tag::Integer(Integer {
                        inner: *offset as i64,
                        ..Default::default()
                    }),
                    Tag::Integer(Integer {
                        inner: *content_count as i64,
                        ..Default::default()
                    }),
                ],
                ..Default::default()
            };
            let mut st = inner.into_structure();
            st.class = TagClass::Context;
            st.id = 0;
            Tag::StructureTag(st)
        }
        VlvTarget::ByValue(value) => Tag::OctetString(OctetString {
            class: TagClass::Context,
            id: 1,
            inner: value.clone(),
        }),
    };
    let mut inner = vec![
        Tag::Integer(Integer {
            inner: req.before_count as i64,
            ..Default::default()
        }),
        Tag::Integer(Integer {
            inner: req.after_count as i64,
            ..Default::default()
        }),
        target,
    ];
    if let Some(ref context_id) = req.context_id {
        inner.push(Tag::OctetString(OctetString {
            inner: context_id.clone(),
            ..Default::default()
        }));
    }
    super::encode_value_tree(Tag::Sequence(Sequence {
        inner,
        ..Default::default()
    }))
}

pub(crate) fn encode_response_value(resp: &VlvResponse) -> Vec<u8> {
    let mut inner = vec![
        Tag::Integer(Integer {
            inner: resp.target_position as i64,
            ..Default::default()
        }),
        Tag::Integer(Integer {
            inner: resp.content_count as i64,
            ..Default::default()
        }),
        Tag::Enumerated(Enumerated {
            inner: resp.result as i64,
            ..Default::default()
        }),
    ];
    if let Some(ref context_id) = resp.context_id {
        inner.push(Tag::OctetString(OctetString {
            inner: context_id.clone(),
            ..Default::default()
        }));
    }
    super::encode_value_tree(Tag::Sequence(Sequence {
        inner,
        ..Default::default()
    }))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn by_offset_roundtrip() {
        let req = VlvRequest {
            before_count: 0,
            after_count: 19,
            target: VlvTarget::ByOffset {
                offset: 1,
                content_count: 0,
            },
            context_id: None,
        };
        let bytes = encode_request_value(&req);
        match decode_request_value(Some(&bytes)).expect("decoded") {
            ControlValue::VlvRequest(back) => assert_eq!(back, req),
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn by_value_roundtrip() {
        let req = VlvRequest {
            before_count: 5,
            after_count: 5,
            target: VlvTarget::ByValue(b"Smith".to_vec()),
            context_id: Some(b"ctx".to_vec()),
        };
        let bytes = encode_request_value(&req);
        match decode_request_value(Some(&bytes)).expect("decoded") {
            ControlValue::VlvRequest(back) => assert_eq!(back, req),
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn response_roundtrip() {
        let resp = VlvResponse {
            target_position: 1,
            content_count: 420,
            result: 0,
            context_id: None,
        };
        let bytes = encode_response_value(&resp);
        match decode_response_value(Some(&bytes)).expect("decoded") {
            ControlValue::VlvResponse(back) => assert_eq!(back, resp),
            other => panic!("unexpected payload: {:?}", other),
        }
    }
}
