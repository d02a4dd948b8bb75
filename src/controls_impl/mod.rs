//! Control payload codecs and the OID registry.
//!
//! Every control known to the crate has a typed payload with its own value
//! codec; anything else travels as an opaque [`RawControl`] with the
//! criticality flag preserved. The registry maps OIDs to decoding factories
//! and is populated with the built-ins at first use; additional factories
//! can be registered at runtime and take precedence over the opaque
//! fallback.

use std::collections::HashMap;
use std::sync::RwLock;

use bytes::BytesMut;
use lazy_static::lazy_static;

use berstream::structure::{StructureTag, PL};
use berstream::structures::{ASNTag, Boolean, OctetString, Sequence, Tag};
use berstream::universal::Types;
use berstream::write;

use crate::error::{DecodeError, EncodeError};

mod entry_change;
mod manage_dsa_it;
mod paged_results;
mod persistent_search;
mod proxy_auth;
mod sort;
mod subentries;
mod sync;
mod vlv;

pub use self::entry_change::{ChangeType, EntryChange, ENTRY_CHANGE_OID};
pub use self::manage_dsa_it::MANAGE_DSA_IT_OID;
pub use self::paged_results::{PagedResults, PAGED_RESULTS_OID};
pub use self::persistent_search::{PersistentSearch, PERSISTENT_SEARCH_OID};
pub use self::proxy_auth::{ProxiedAuthz, PROXIED_AUTHZ_OID};
pub use self::sort::{SortKey, SortRequest, SortResponse, SORT_REQUEST_OID, SORT_RESPONSE_OID};
pub use self::subentries::{Subentries, SUBENTRIES_OID};
pub use self::sync::{
    SyncDone, SyncMode, SyncRequest, SyncState, SyncStateKind, SYNC_DONE_OID, SYNC_REQUEST_OID,
    SYNC_STATE_OID,
};
pub use self::vlv::{VlvRequest, VlvResponse, VlvTarget, VLV_REQUEST_OID, VLV_RESPONSE_OID};

/// An opaque control: OID plus undecoded value bytes.
#[derive(Clone, Debug, PartialEq)]
pub struct RawControl {
    pub oid: String,
    pub val: Option<Vec<u8>>,
}

/// Decoded payload of a control, or the opaque carrier for unknown OIDs.
#[derive(Clone, Debug, PartialEq)]
pub enum ControlValue {
    SortRequest(SortRequest),
    SortResponse(SortResponse),
    PagedResults(PagedResults),
    ProxiedAuthz(ProxiedAuthz),
    ManageDsaIt,
    Subentries(Subentries),
    PersistentSearch(PersistentSearch),
    EntryChange(EntryChange),
    SyncRequest(SyncRequest),
    SyncState(SyncState),
    SyncDone(SyncDone),
    VlvRequest(VlvRequest),
    VlvResponse(VlvResponse),
    Raw(RawControl),
}

/// One control of a message: criticality flag plus payload.
#[derive(Clone, Debug, PartialEq)]
pub struct Control {
    pub crit: bool,
    pub value: ControlValue,
}

impl Control {
    pub fn new(value: ControlValue) -> Control {
        Control { crit: false, value }
    }

    pub fn critical(value: ControlValue) -> Control {
        Control { crit: true, value }
    }

    pub fn oid(&self) -> &str {
        use ControlValue::*;
        match &self.value {
            SortRequest(_) => SORT_REQUEST_OID,
            SortResponse(_) => SORT_RESPONSE_OID,
            PagedResults(_) => PAGED_RESULTS_OID,
            ProxiedAuthz(_) => PROXIED_AUTHZ_OID,
            ManageDsaIt => MANAGE_DSA_IT_OID,
            Subentries(_) => SUBENTRIES_OID,
            PersistentSearch(_) => PERSISTENT_SEARCH_OID,
            EntryChange(_) => ENTRY_CHANGE_OID,
            SyncRequest(_) => SYNC_REQUEST_OID,
            SyncState(_) => SYNC_STATE_OID,
            SyncDone(_) => SYNC_DONE_OID,
            VlvRequest(_) => VLV_REQUEST_OID,
            VlvResponse(_) => VLV_RESPONSE_OID,
            Raw(rc) => &rc.oid,
        }
    }
}

/// Decodes the value octets of a control with a known OID. `None` stands
/// for an absent value.
pub type ControlFactory = fn(Option<&[u8]>) -> Result<ControlValue, DecodeError>;

lazy_static! {
    static ref CONTROLS: RwLock<HashMap<String, ControlFactory>> = {
        let mut map: HashMap<String, ControlFactory> = HashMap::new();
        map.insert(SORT_REQUEST_OID.to_owned(), sort::decode_request_value);
        map.insert(SORT_RESPONSE_OID.to_owned(), sort::decode_response_value);
        map.insert(PAGED_RESULTS_OID.to_owned(), paged_results::decode_value);
        map.insert(PROXIED_AUTHZ_OID.to_owned(), proxy_auth::decode_value);
        map.insert(MANAGE_DSA_IT_OID.to_owned(), manage_dsa_it::decode_value);
        map.insert(SUBENTRIES_OID.to_owned(), subentries::decode_value);
        map.insert(
            PERSISTENT_SEARCH_OID.to_owned(),
            persistent_search::decode_value,
        );
        map.insert(ENTRY_CHANGE_OID.to_owned(), entry_change::decode_value);
        map.insert(SYNC_REQUEST_OID.to_owned(), sync::decode_request_value);
        map.insert(SYNC_STATE_OID.to_owned(), sync::decode_state_value);
        map.insert(SYNC_DONE_OID.to_owned(), sync::decode_done_value);
        map.insert(VLV_REQUEST_OID.to_owned(), vlv::decode_request_value);
        map.insert(VLV_RESPONSE_OID.to_owned(), vlv::decode_response_value);
        RwLock::new(map)
    };
}

/// Register (or replace) the decoding factory for a control OID.
pub fn register_control_factory(oid: &str, factory: ControlFactory) {
    CONTROLS
        .write()
        .expect("control registry")
        .insert(oid.to_owned(), factory);
}

fn lookup(oid: &str) -> Option<ControlFactory> {
    CONTROLS.read().expect("control registry").get(oid).copied()
}

/// Decode one control from its envelope TLV.
pub(crate) fn parse_control(tag: StructureTag) -> Result<Control, DecodeError> {
    let components = tag
        .expect_constructed()
        .ok_or(DecodeError::Protocol("control is not a sequence"))?;
    let mut components = components.into_iter();
    let oid = components
        .next()
        .and_then(|t| t.expect_primitive())
        .ok_or(DecodeError::Protocol("control without an OID"))?;
    let oid = String::from_utf8(oid)
        .map_err(|_| DecodeError::Protocol("control OID is not valid UTF-8"))?;
    let next = components.next();
    let (crit, val_tag) = match next {
        None => (false, None),
        Some(t) if t.id == Types::Boolean as u64 => {
            let crit = match t.payload {
                PL::P(ref v) if v.len() == 1 => v[0] != 0,
                _ => return Err(DecodeError::Protocol("bad control criticality")),
            };
            (crit, components.next())
        }
        Some(t) if t.id == Types::OctetString as u64 => (false, Some(t)),
        Some(_) => return Err(DecodeError::Protocol("unexpected tag in control")),
    };
    let val = match val_tag {
        None => None,
        Some(t) => Some(
            t.expect_primitive()
                .ok_or(DecodeError::Protocol("control value is not primitive"))?,
        ),
    };
    control_from_parts(oid, crit, val)
}

/// Assemble a control from its parts, decoding the value when the OID has
/// a registered factory. Also used by the LDIF reader for `control:` lines.
pub(crate) fn control_from_parts(
    oid: String,
    crit: bool,
    val: Option<Vec<u8>>,
) -> Result<Control, DecodeError> {
    match lookup(&oid) {
        Some(factory) => {
            let value = factory(val.as_deref())?;
            Ok(Control { crit, value })
        }
        None => {
            log::trace!("passing through unknown control {}", oid);
            Ok(Control {
                crit,
                value: ControlValue::Raw(RawControl { oid, val }),
            })
        }
    }
}

/// Serialized value octets for a control payload; `None` when the control
/// carries no value.
pub(crate) fn control_value_bytes(value: &ControlValue) -> Result<Option<Vec<u8>>, EncodeError> {
    use ControlValue::*;
    Ok(match value {
        SortRequest(c) => Some(sort::encode_request_value(c)?),
        SortResponse(c) => Some(sort::encode_response_value(c)?),
        PagedResults(c) => Some(paged_results::encode_value(c)),
        ProxiedAuthz(c) => Some(proxy_auth::encode_value(c)),
        ManageDsaIt => None,
        Subentries(c) => Some(subentries::encode_value(c)),
        PersistentSearch(c) => Some(persistent_search::encode_value(c)),
        EntryChange(c) => Some(entry_change::encode_value(c)),
        SyncRequest(c) => Some(sync::encode_request_value(c)),
        SyncState(c) => Some(sync::encode_state_value(c)),
        SyncDone(c) => Some(sync::encode_done_value(c)),
        VlvRequest(c) => Some(vlv::encode_request_value(c)),
        VlvResponse(c) => Some(vlv::encode_response_value(c)),
        Raw(rc) => rc.val.clone(),
    })
}

/// Build the envelope TLV of one control.
pub(crate) fn build_control(ctrl: &Control) -> Result<Tag, EncodeError> {
    let mut seq = vec![Tag::OctetString(OctetString {
        inner: Vec::from(ctrl.oid().as_bytes()),
        ..Default::default()
    })];
    if ctrl.crit {
        seq.push(Tag::Boolean(Boolean {
            inner: true,
            ..Default::default()
        }));
    }
    if let Some(val) = control_value_bytes(&ctrl.value)? {
        seq.push(Tag::OctetString(OctetString {
            inner: val,
            ..Default::default()
        }));
    }
    Ok(Tag::Sequence(Sequence {
        inner: seq,
        ..Default::default()
    }))
}

/// Serialize a value tree into the control value octets.
pub(crate) fn encode_value_tree(tag: Tag) -> Vec<u8> {
    let val = tag.into_structure();
    let mut buf = BytesMut::with_capacity(write::encoded_len(&val));
    write::encode_into(&mut buf, &val);
    Vec::from(&buf[..])
}

/// Parse control value octets into their root TLV.
pub(crate) fn parse_value_tree(
    val: Option<&[u8]>,
    what: &'static str,
) -> Result<StructureTag, DecodeError> {
    let val = val.ok_or(DecodeError::Protocol(what))?;
    match berstream::parse::parse_tag(val) {
        Ok((rest, tag)) if rest.is_empty() => Ok(tag),
        _ => Err(DecodeError::Protocol(what)),
    }
}

pub(crate) fn expect_int(tag: StructureTag, what: &'static str) -> Result<i64, DecodeError> {
    let content = tag
        .match_class(berstream::common::TagClass::Universal)
        .and_then(|t| t.match_id(Types::Integer as u64))
        .and_then(|t| t.expect_primitive())
        .ok_or(DecodeError::Protocol(what))?;
    match berstream::parse::parse_int(&content) {
        Ok((_, n)) => Ok(n),
        Err(_) => Err(DecodeError::Protocol(what)),
    }
}

pub(crate) fn expect_enum(tag: StructureTag, what: &'static str) -> Result<u64, DecodeError> {
    let content = tag
        .match_class(berstream::common::TagClass::Universal)
        .and_then(|t| t.match_id(Types::Enumerated as u64))
        .and_then(|t| t.expect_primitive())
        .ok_or(DecodeError::Protocol(what))?;
    match berstream::parse::parse_uint(&content) {
        Ok((_, n)) => Ok(n),
        Err(_) => Err(DecodeError::Protocol(what)),
    }
}

pub(crate) fn expect_octets(tag: StructureTag, what: &'static str) -> Result<Vec<u8>, DecodeError> {
    tag.match_class(berstream::common::TagClass::Universal)
        .and_then(|t| t.match_id(Types::OctetString as u64))
        .and_then(|t| t.expect_primitive())
        .ok_or(DecodeError::Protocol(what))
}

pub(crate) fn expect_bool(tag: StructureTag, what: &'static str) -> Result<bool, DecodeError> {
    let content = tag
        .match_class(berstream::common::TagClass::Universal)
        .and_then(|t| t.match_id(Types::Boolean as u64))
        .and_then(|t| t.expect_primitive())
        .ok_or(DecodeError::Protocol(what))?;
    if content.len() != 1 {
        return Err(DecodeError::Protocol(what));
    }
    Ok(content[0] != 0)
}

pub(crate) fn expect_utf8(bytes: Vec<u8>, what: &'static str) -> Result<String, DecodeError> {
    String::from_utf8(bytes).map_err(|_| DecodeError::Protocol(what))
}

#[cfg(test)]
mod test {
    use super::*;

    fn roundtrip(ctrl: Control) -> Control {
        let tag = build_control(&ctrl).expect("built").into_structure();
        parse_control(tag).expect("parsed")
    }

    #[test]
    fn unknown_control_is_opaque() {
        let ctrl = Control {
            crit: true,
            value: ControlValue::Raw(RawControl {
                oid: "1.2.3.4.5".to_owned(),
                val: Some(vec![0x30, 0x00]),
            }),
        };
        assert_eq!(roundtrip(ctrl.clone()), ctrl);
    }

    #[test]
    fn valueless_control() {
        let ctrl = Control::new(ControlValue::ManageDsaIt);
        let back = roundtrip(ctrl.clone());
        assert_eq!(back, ctrl);
        assert!(!back.crit);
    }

    #[test]
    fn dynamic_registration() {
        fn factory(_val: Option<&[u8]>) -> Result<ControlValue, DecodeError> {
            Ok(ControlValue::ManageDsaIt)
        }
        register_control_factory("1.2.3.4.5.6.7", factory);
        let raw = Control::new(ControlValue::Raw(RawControl {
            oid: "1.2.3.4.5.6.7".to_owned(),
            val: None,
        }));
        let back = roundtrip(raw);
        assert_eq!(back.value, ControlValue::ManageDsaIt);
    }
}
