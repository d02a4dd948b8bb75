//! Extended request/response and Intermediate response.

use berstream::structures::{OctetString, Tag};

use super::result::{result_tags, RESULT};
use super::{ev_utf8, Container, OpBuild, APP, CTX};
use crate::error::OpError;
use crate::grammar::{skip, Event, Follow, GrammarTable, On, Transition};
use crate::message::{ExtendedRequest, ExtendedResponse, IntermediateResponse, ProtocolOp};
use crate::result::ResultCode;

#[derive(Default)]
pub(crate) struct NameValueBuild {
    name: Option<String>,
    value: Option<Vec<u8>>,
}

impl Container {
    fn name_value(&mut self) -> &mut NameValueBuild {
        match &mut self.op {
            OpBuild::NameValue(b) => b,
            _ => unreachable!("name/value container"),
        }
    }
}

fn is_valid_oid(oid: &str) -> bool {
    let mut arcs = 0;
    for arc in oid.split('.') {
        if arc.is_empty() || !arc.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
        if arc.len() > 1 && arc.starts_with('0') {
            return false;
        }
        arcs += 1;
    }
    arcs >= 2
}

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

// ExtendedRequest ::= [APPLICATION 23] SEQUENCE {
//     requestName  [0] LDAPOID,
//     requestValue [1] OCTET STRING OPTIONAL }
const START: u8 = 0;
const SEQ_OPEN: u8 = 1;
const NAME_STORED: u8 = 2;
const VALUE_STORED: u8 = 3;
const DONE: u8 = 4;

pub(crate) static EXTENDED_REQUEST: GrammarTable<Container> = GrammarTable {
    name: "unexpected tag in ExtendedRequest",
    start: START,
    transitions: &[
        t!(START, On::open(APP, 23), SEQ_OPEN, skip),
        t!(SEQ_OPEN, On::prim(CTX, 0), NAME_STORED, store_request_name),
        t!(NAME_STORED, On::prim(CTX, 1), VALUE_STORED, store_value),
        t!(NAME_STORED, On::close(), DONE, skip),
        t!(VALUE_STORED, On::close(), DONE, skip),
    ],
    accepting: |_, state| state == DONE,
};

type R = Result<Follow<Container>, OpError>;

fn store_request_name(c: &mut Container, ev: &Event) -> R {
    let name = ev_utf8(ev, "extended request name")?;
    if !is_valid_oid(&name) {
        return Err(OpError::semantic(
            ResultCode::ProtocolError,
            format!("invalid extended request OID {:?}", name),
        ));
    }
    c.name_value().name = Some(name);
    Ok(Follow::Next)
}

fn store_value(c: &mut Container, ev: &Event) -> R {
    c.name_value().value = Some(ev.value.to_vec());
    Ok(Follow::Next)
}

pub(crate) fn assemble_request(mut c: Container) -> ProtocolOp {
    let build = std::mem::take(c.name_value());
    ProtocolOp::ExtendedRequest(ExtendedRequest {
        name: build.name.expect("grammar stored name"),
        value: build.value,
    })
}

// ExtendedResponse ::= [APPLICATION 24] SEQUENCE {
//     COMPONENTS OF LDAPResult,
//     responseName  [10] LDAPOID OPTIONAL,
//     responseValue [11] OCTET STRING OPTIONAL }
const RESP_BODY: u8 = 1;
const RESP_NAME: u8 = 2;
const RESP_VALUE: u8 = 3;
const RESP_DONE: u8 = 4;

pub(crate) static EXTENDED_RESPONSE: GrammarTable<Container> = GrammarTable {
    name: "unexpected tag in ExtendedResponse",
    start: START,
    transitions: &[
        t!(START, On::open(APP, 24), RESP_BODY, enter_result),
        t!(RESP_BODY, On::prim(CTX, 10), RESP_NAME, store_response_name),
        t!(RESP_BODY, On::prim(CTX, 11), RESP_VALUE, store_value),
        t!(RESP_NAME, On::prim(CTX, 11), RESP_VALUE, store_value),
        t!(RESP_BODY, On::close(), RESP_DONE, skip),
        t!(RESP_NAME, On::close(), RESP_DONE, skip),
        t!(RESP_VALUE, On::close(), RESP_DONE, skip),
    ],
    accepting: |_, state| state == RESP_DONE,
};

fn enter_result(_c: &mut Container, _ev: &Event) -> R {
    Ok(Follow::Enter(&RESULT))
}

fn store_response_name(c: &mut Container, ev: &Event) -> R {
    c.name_value().name = Some(ev_utf8(ev, "extended response name")?);
    Ok(Follow::Next)
}

pub(crate) fn assemble_response(mut c: Container) -> ProtocolOp {
    let build = std::mem::take(c.name_value());
    ProtocolOp::ExtendedResponse(ExtendedResponse {
        result: c.result,
        name: build.name,
        value: build.value,
    })
}

// IntermediateResponse ::= [APPLICATION 25] SEQUENCE {
//     responseName  [0] LDAPOID OPTIONAL,
//     responseValue [1] OCTET STRING OPTIONAL }
const INT_BODY: u8 = 1;
const INT_NAME: u8 = 2;
const INT_VALUE: u8 = 3;
const INT_DONE: u8 = 4;

pub(crate) static INTERMEDIATE_RESPONSE: GrammarTable<Container> = GrammarTable {
    name: "unexpected tag in IntermediateResponse",
    start: START,
    transitions: &[
        t!(START, On::open(APP, 25), INT_BODY, skip),
        t!(INT_BODY, On::prim(CTX, 0), INT_NAME, store_intermediate_name),
        t!(INT_BODY, On::prim(CTX, 1), INT_VALUE, store_value),
        t!(INT_NAME, On::prim(CTX, 1), INT_VALUE, store_value),
        t!(INT_BODY, On::close(), INT_DONE, skip),
        t!(INT_NAME, On::close(), INT_DONE, skip),
        t!(INT_VALUE, On::close(), INT_DONE, skip),
    ],
    accepting: |_, state| state == INT_DONE,
};

fn store_intermediate_name(c: &mut Container, ev: &Event) -> R {
    c.name_value().name = Some(ev_utf8(ev, "intermediate response name")?);
    Ok(Follow::Next)
}

pub(crate) fn assemble_intermediate(mut c: Container) -> ProtocolOp {
    let build = std::mem::take(c.name_value());
    ProtocolOp::IntermediateResponse(IntermediateResponse {
        name: build.name,
        value: build.value,
    })
}

pub(crate) fn build_request(req: &ExtendedRequest) -> Tag {
    let mut inner = vec![Tag::OctetString(OctetString {
        class: CTX,
        id: 0,
        inner: Vec::from(req.name.as_bytes()),
    })];
    if let Some(ref value) = req.value {
        inner.push(Tag::OctetString(OctetString {
            class: CTX,
            id: 1,
            inner: value.clone(),
        }));
    }
    super::app_sequence(23, inner)
}

pub(crate) fn build_response(resp: &ExtendedResponse) -> Tag {
    let mut inner = result_tags(&resp.result);
    if let Some(ref name) = resp.name {
        inner.push(Tag::OctetString(OctetString {
            class: CTX,
            id: 10,
            inner: Vec::from(name.as_bytes()),
        }));
    }
    if let Some(ref value) = resp.value {
        inner.push(Tag::OctetString(OctetString {
            class: CTX,
            id: 11,
            inner: value.clone(),
        }));
    }
    super::app_sequence(24, inner)
}

pub(crate) fn build_intermediate(resp: &IntermediateResponse) -> Tag {
    let mut inner = Vec::new();
    if let Some(ref name) = resp.name {
        inner.push(Tag::OctetString(OctetString {
            class: CTX,
            id: 0,
            inner: Vec::from(name.as_bytes()),
        }));
    }
    if let Some(ref value) = resp.value {
        inner.push(Tag::OctetString(OctetString {
            class: CTX,
            id: 1,
            inner: value.clone(),
        }));
    }
    super::app_sequence(25, inner)
}

#[cfg(test)]
mod test {
    use super::is_valid_oid;

    #[test]
    fn oid_validation() {
        assert!(is_valid_oid("1.3.6.1.4.1.4203.1.11.1"));
        assert!(is_valid_oid("0.0"));
        assert!(!is_valid_oid("1"));
        assert!(!is_valid_oid("1..2"));
        assert!(!is_valid_oid("1.02"));
        assert!(!is_valid_oid("1.2a"));
        assert!(!is_valid_oid(""));
    }
}
