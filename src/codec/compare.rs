//! Compare request.

use berstream::structures::{OctetString, Sequence, Tag};

use super::{ev_dn, ev_utf8, Container, OpBuild, APP, OCTS, SEQ, UNI};
use crate::dn::Dn;
use crate::entry::AttrValue;
use crate::error::OpError;
use crate::grammar::{skip, Event, Follow, GrammarTable, On, Transition};
use crate::message::{CompareRequest, ProtocolOp};

#[derive(Default)]
pub(crate) struct CompareBuild {
    entry: Option<Dn>,
    attr: Option<String>,
    value: Option<AttrValue>,
}

impl Container {
    fn compare(&mut self) -> &mut CompareBuild {
        match &mut self.op {
            OpBuild::Compare(b) => b,
            _ => unreachable!("compare container"),
        }
    }
}

// CompareRequest ::= [APPLICATION 14] SEQUENCE {
//     entry LDAPDN,
//     ava   AttributeValueAssertion }
const START: u8 = 0;
const SEQ_OPEN: u8 = 1;
const ENTRY_STORED: u8 = 2;
const IN_AVA: u8 = 3;
const ATTR_STORED: u8 = 4;
const VALUE_STORED: u8 = 5;
const AVA_DONE: u8 = 6;
const DONE: u8 = 7;

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

pub(crate) static COMPARE_REQUEST: GrammarTable<Container> = GrammarTable {
    name: "unexpected tag in CompareRequest",
    start: START,
    transitions: &[
        t!(START, On::open(APP, 14), SEQ_OPEN, skip),
        t!(SEQ_OPEN, On::prim(UNI, OCTS), ENTRY_STORED, store_entry),
        t!(ENTRY_STORED, On::open(UNI, SEQ), IN_AVA, skip),
        t!(IN_AVA, On::prim(UNI, OCTS), ATTR_STORED, store_attr),
        t!(ATTR_STORED, On::prim(UNI, OCTS), VALUE_STORED, store_value),
        t!(VALUE_STORED, On::close(), AVA_DONE, skip),
        t!(AVA_DONE, On::close(), DONE, skip),
    ],
    accepting: |_, state| state == DONE,
};

type R = Result<Follow<Container>, OpError>;

fn store_entry(c: &mut Container, ev: &Event) -> R {
    let entry = ev_dn(ev, "compare entry")?;
    c.compare().entry = Some(entry);
    Ok(Follow::Next)
}

fn store_attr(c: &mut Container, ev: &Event) -> R {
    let attr = ev_utf8(ev, "compare attribute")?;
    c.compare().attr = Some(attr);
    Ok(Follow::Next)
}

fn store_value(c: &mut Container, ev: &Event) -> R {
    c.compare().value = Some(AttrValue::from_bytes(ev.value.to_vec()));
    Ok(Follow::Next)
}

pub(crate) fn assemble_request(mut c: Container) -> ProtocolOp {
    let build = std::mem::take(c.compare());
    ProtocolOp::CompareRequest(CompareRequest {
        entry: build.entry.expect("grammar stored entry"),
        attr_desc: build.attr.expect("grammar stored attribute"),
        assertion_value: build.value.expect("grammar stored value"),
    })
}

pub(crate) fn build_request(req: &CompareRequest) -> Tag {
    super::app_sequence(
        14,
        vec![
            Tag::OctetString(OctetString {
                inner: Vec::from(req.entry.to_string().as_bytes()),
                ..Default::default()
            }),
            Tag::Sequence(Sequence {
                inner: vec![
                    Tag::OctetString(OctetString {
                        inner: Vec::from(req.attr_desc.as_bytes()),
                        ..Default::default()
                    }),
                    Tag::OctetString(OctetString {
                        inner: req.assertion_value.as_bytes().to_vec(),
                        ..Default::default()
                    }),
                ],
                ..Default::default()
            }),
        ],
    )
}
