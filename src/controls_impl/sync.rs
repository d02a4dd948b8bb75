//! Content synchronization controls ([RFC 4533](https://tools.ietf.org/html/rfc4533)).

use berstream::common::TagClass;
use berstream::structures::{Boolean, Enumerated, OctetString, Sequence, Tag};
use berstream::universal::Types;

use super::ControlValue;
use crate::error::DecodeError;

pub const SYNC_REQUEST_OID: &str = "1.3.6.1.4.1.4203.1.9.1.1";
pub const SYNC_STATE_OID: &str = "1.3.6.1.4.1.4203.1.9.1.2";
pub const SYNC_DONE_OID: &str = "1.3.6.1.4.1.4203.1.9.1.3";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncMode {
    RefreshOnly = 1,
    RefreshAndPersist = 3,
}

impl SyncMode {
    pub fn from_code(code: u64) -> Option<SyncMode> {
        match code {
            1 => Some(SyncMode::RefreshOnly),
            3 => Some(SyncMode::RefreshAndPersist),
            _ => None,
        }
    }
}

/// Sync Request control, attached to a Search request.
#[derive(Clone, Debug, PartialEq)]
pub struct SyncRequest {
    pub mode: SyncMode,
    pub cookie: Option<Vec<u8>>,
    pub reload_hint: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncStateKind {
    Present = 0,
    Add = 1,
    Modify = 2,
    Delete = 3,
}

impl SyncStateKind {
    pub fn from_code(code: u64) -> Option<SyncStateKind> {
        match code {
            0 => Some(SyncStateKind::Present),
            1 => Some(SyncStateKind::Add),
            2 => Some(SyncStateKind::Modify),
            3 => Some(SyncStateKind::Delete),
            _ => None,
        }
    }
}

/// Sync State control, attached to Search result entries and references.
#[derive(Clone, Debug, PartialEq)]
pub struct SyncState {
    pub state: SyncStateKind,
    /// The entryUUID of the entry, 16 octets.
    pub entry_uuid: Vec<u8>,
    pub cookie: Option<Vec<u8>>,
}

/// Sync Done control, attached to the Search result done message.
#[derive(Clone, Debug, PartialEq)]
pub struct SyncDone {
    pub cookie: Option<Vec<u8>>,
    pub refresh_deletes: bool,
}

pub(crate) fn decode_request_value(val: Option<&[u8]>) -> Result<ControlValue, DecodeError> {
    const WHAT: &str = "sync request value";
    let tag = super::parse_value_tree(val, WHAT)?;
    let mut components = tag
        .expect_constructed()
        .ok_or(DecodeError::Protocol(WHAT))?
        .into_iter();
    let mode = components
        .next()
        .ok_or(DecodeError::Protocol(WHAT))
        .and_then(|t| super::expect_enum(t, WHAT))
        .map(SyncMode::from_code)?
        .ok_or(DecodeError::Protocol("unknown sync request mode"))?;
    let mut req = SyncRequest {
        mode,
        cookie: None,
        reload_hint: false,
    };
    for t in components {
        match (t.class, t.id) {
            (TagClass::Universal, id) if id == Types::OctetString as u64 => {
                req.cookie = Some(t.expect_primitive().ok_or(DecodeError::Protocol(WHAT))?);
            }
            (TagClass::Universal, id) if id == Types::Boolean as u64 => {
                req.reload_hint = super::expect_bool(t, WHAT)?;
            }
            _ => return Err(DecodeError::Protocol("unexpected tag in sync request")),
        }
    }
    Ok(ControlValue::SyncRequest(req))
}

pub(crate) fn decode_state_value(val: Option<&[u8]>) -> Result<ControlValue, DecodeError> {
    const WHAT: &str = "sync state value";
    let tag = super::parse_value_tree(val, WHAT)?;
    let mut components = tag
        .expect_constructed()
        .ok_or(DecodeError::Protocol(WHAT))?
        .into_iter();
    let state = components
        .next()
        .ok_or(DecodeError::Protocol(WHAT))
        .and_then(|t| super::expect_enum(t, WHAT))
        .map(SyncStateKind::from_code)?
        .ok_or(DecodeError::Protocol("unknown sync state"))?;
    let entry_uuid = components
        .next()
        .ok_or(DecodeError::Protocol(WHAT))
        .and_then(|t| super::expect_octets(t, WHAT))?;
    if entry_uuid.len() != 16 {
        return Err(DecodeError::Protocol("sync state entryUUID size"));
    }
    let cookie = match components.next() {
        None => None,
        Some(t) => Some(super::expect_octets(t, WHAT)?),
    };
    Ok(ControlValue::SyncState(SyncState {
        state,
        entry_uuid,
        cookie,
    }))
}

pub(crate) fn decode_done_value(val: Option<&[u8]>) -> Result<ControlValue, DecodeError> {
    const WHAT: &str = "sync done value";
    let tag = super::parse_value_tree(val, WHAT)?;
    let mut done = SyncDone {
        cookie: None,
        refresh_deletes: false,
    };
    for t in tag
        .expect_constructed()
        .ok_or(DecodeError::Protocol(WHAT))?
    {
        match (t.class, t.id) {
            (TagClass::Universal, id) if id == Types::OctetString as u64 => {
                done.cookie = Some(t.expect_primitive().ok_or(DecodeError::Protocol(WHAT))?);
            }
            (TagClass::Universal, id) if id == Types::Boolean as u64 => {
                done.refresh_deletes = super::expect_bool(t, WHAT)?;
            }
            _ => return Err(DecodeError::Protocol("unexpected tag in sync done")),
        }
    }
    Ok(ControlValue::SyncDone(done))
}

pub(crate) fn encode_request_value(req: &SyncRequest) -> Vec<u8> {
    let mut inner = vec![Tag::Enumerated(Enumerated {
        inner: req.mode as i64,
        ..Default::default()
    })];
    if let Some(ref cookie) = req.cookie {
        inner.push(Tag::OctetString(OctetString {
            inner: cookie.clone(),
            ..Default::default()
        }));
    }
    if req.reload_hint {
        inner.push(Tag::Boolean(Boolean {
            inner: true,
            ..Default::default()
        }));
    }
    super::encode_value_tree(Tag::Sequence(Sequence {
        inner,
        ..Default::default()
    }))
}

pub(crate) fn encode_state_value(state: &SyncState) -> Vec<u8> {
    let mut inner = vec![
        Tag::Enumerated(Enumerated {
            inner: state.state as i64,
            ..Default::default()
        }),
        Tag::OctetString(OctetString {
            inner: state.entry_uuid.clone(),
            ..Default::default()
        }),
    ];
    if let Some(ref cookie) = state.cookie {
        inner.push(Tag::OctetString(OctetString {
            inner: cookie.clone(),
            ..Default::default()
        }));
    }
    super::encode_value_tree(Tag::Sequence(Sequence {
        inner,
        ..Default::default()
    }))
}

pub(crate) fn encode_done_value(done: &SyncDone) -> Vec<u8> {
    let mut inner = Vec::new();
    if let Some(ref cookie) = done.cookie {
        inner.push(Tag::OctetString(OctetString {
            inner: cookie.clone(),
            ..Default::default()
        }));
    }
    if done.refresh_deletes {
        inner.push(Tag::Boolean(Boolean {
            inner: true,
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
    fn request_roundtrip() {
        let req = SyncRequest {
            mode: SyncMode::RefreshAndPersist,
            cookie: Some(b"rid=000,csn=x".to_vec()),
            reload_hint: true,
        };
        let bytes = encode_request_value(&req);
        match decode_request_value(Some(&bytes)).expect("decoded") {
            ControlValue::SyncRequest(back) => assert_eq!(back, req),
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn state_roundtrip() {
        let state = SyncState {
            state: SyncStateKind::Add,
            entry_uuid: (0u8..16).collect(),
            cookie: None,
        };
        let bytes = encode_state_value(&state);
        match decode_state_value(Some(&bytes)).expect("decoded") {
            ControlValue::SyncState(back) => assert_eq!(back, state),
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn state_uuid_size_checked() {
        let state = SyncState {
            state: SyncStateKind::Present,
            entry_uuid: vec![0; 4],
            cookie: None,
        };
        let bytes = encode_state_value(&state);
        assert!(decode_state_value(Some(&bytes)).is_err());
    }

    #[test]
    fn done_roundtrip() {
        let done = SyncDone {
            cookie: Some(b"cookie".to_vec()),
            refresh_deletes: true,
        };
        let bytes = encode_done_value(&done);
        match decode_done_value(Some(&bytes)).expect("decoded") {
            ControlValue::SyncDone(back) => assert_eq!(back, done),
            other => panic!("unexpected payload: {:?}", other),
        }
    }
}
