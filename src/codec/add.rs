//! Add request. Decoding shares the entry builder with the Search result
//! entry grammar but enforces the Add-specific emptiness rules: at least
//! one attribute, and at least one value per attribute (a zero-length
//! value is fine, a zero-value attribute is not).

use berstream::structures::{OctetString, Sequence, Tag};

use super::search_result::{
    attribute_tags, finish_attr, into_entry, store_dn, store_type, store_value, DN_STORED, DONE,
    IN_ATTR, IN_ATTR_LIST, IN_VALUES, LIST_DONE, SEQ_OPEN, START, TYPE_STORED, VALUES_DONE,
};
use super::{Container, APP, OCTS, SEQ, SET, UNI};
use crate::error::{EncodeError, OpError};
use crate::grammar::{skip, Event, Follow, GrammarTable, On, Transition};
use crate::message::{AddRequest, ProtocolOp};
use crate::result::ResultCode;

macro_rules! t {
    ($from:expr, $on:expr, $to:expr, $action:expr) => {
        Transition {
            from: $from,
            on: $on,
            to: $to,
            action: $action,
        }
    };
}

// AddRequest ::= [APPLICATION 8] SEQUENCE {
//     entry      LDAPDN,
//     attributes AttributeList }
pub(crate) static ADD_REQUEST: GrammarTable<Container> = GrammarTable {
    name: "unexpected tag in AddRequest",
    start: START,
    transitions: &[
        t!(START, On::open(APP, 8), SEQ_OPEN, skip),
        t!(SEQ_OPEN, On::prim(UNI, OCTS), DN_STORED, store_dn),
        t!(DN_STORED, On::open(UNI, SEQ), IN_ATTR_LIST, skip),
        t!(IN_ATTR_LIST, On::open(UNI, SEQ), IN_ATTR, skip),
        t!(IN_ATTR, On::prim(UNI, OCTS), TYPE_STORED, store_type),
        t!(TYPE_STORED, On::open(UNI, SET), IN_VALUES, skip),
        t!(IN_VALUES, On::prim(UNI, OCTS), IN_VALUES, store_value),
        t!(IN_VALUES, On::close(), VALUES_DONE, check_values),
        t!(VALUES_DONE, On::close(), IN_ATTR_LIST, finish_attr),
        t!(IN_ATTR_LIST, On::close(), LIST_DONE, check_attrs),
        t!(LIST_DONE, On::close(), DONE, skip),
    ],
    accepting: |_, state| state == DONE,
};

type R = Result<Follow<Container>, OpError>;

fn check_values(c: &mut Container, _ev: &Event) -> R {
    let empty = c
        .entry()
        .cur
        .as_ref()
        .map(|attr| attr.is_empty())
        .unwrap_or(true);
    if empty {
        return Err(OpError::semantic(
            ResultCode::ProtocolError,
            "attribute without values in add request",
        ));
    }
    Ok(Follow::Next)
}

fn check_attrs(c: &mut Container, _ev: &Event) -> R {
    if c.entry().attrs.is_empty() {
        return Err(OpError::semantic(
            ResultCode::ProtocolError,
            "add request without attributes",
        ));
    }
    Ok(Follow::Next)
}

pub(crate) fn assemble_request(mut c: Container) -> ProtocolOp {
    let build = std::mem::take(c.entry());
    ProtocolOp::AddRequest(AddRequest {
        entry: into_entry(build),
    })
}

pub(crate) fn build_request(req: &AddRequest) -> Result<Tag, EncodeError> {
    if req.entry.is_empty() {
        return Err(EncodeError::CannotEncode("add request without attributes"));
    }
    if req.entry.attributes().any(|attr| attr.is_empty()) {
        return Err(EncodeError::CannotEncode(
            "attribute without values in add request",
        ));
    }
    Ok(super::app_sequence(
        8,
        vec![
            Tag::OctetString(OctetString {
                inner: Vec::from(req.entry.dn().to_string().as_bytes()),
                ..Default::default()
            }),
            Tag::Sequence(Sequence {
                inner: attribute_tags(&req.entry),
                ..Default::default()
            }),
        ],
    ))
}
