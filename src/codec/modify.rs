//! Modify request.

use berstream::structures::{Enumerated, OctetString, Sequence, Set, Tag};

use super::{ev_dn, ev_uint, ev_utf8, Container, OpBuild, APP, ENUM, OCTS, SEQ, SET, UNI};
use crate::dn::Dn;
use crate::entry::{AttrValue, Attribute};
use crate::error::OpError;
use crate::grammar::{skip, Event, Follow, GrammarTable, On, Transition};
use crate::message::{Modification, ModifyOperation, ModifyRequest, ProtocolOp};
use crate::result::ResultCode;

#[derive(Default)]
pub(crate) struct ModifyBuild {
    object: Option<Dn>,
    changes: Vec<Modification>,
    cur_op: Option<ModifyOperation>,
    cur_attr: Option<Attribute>,
}

impl Container {
    fn modify(&mut self) -> &mut ModifyBuild {
        match &mut self.op {
            OpBuild::Modify(b) => b,
            _ => unreachable!("modify container"),
        }
    }
}

// ModifyRequest ::= [APPLICATION 6] SEQUENCE {
//     object  LDAPDN,
//     changes SEQUENCE OF change SEQUENCE {
//         operation ENUMERATED { add (0), delete (1), replace (2), increment (3) },
//         modification PartialAttribute } }
const START: u8 = 0;
const SEQ_OPEN: u8 = 1;
const OBJECT_STORED: u8 = 2;
const IN_CHANGES: u8 = 3;
const IN_CHANGE: u8 = 4;
const OP_STORED: u8 = 5;
const IN_PARTIAL_ATTR: u8 = 6;
const TYPE_STORED: u8 = 7;
const IN_VALUES: u8 = 8;
const VALUES_DONE: u8 = 9;
const ATTR_DONE: u8 = 10;
const CHANGES_DONE: u8 = 11;
const DONE: u8 = 12;

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

pub(crate) static MODIFY_REQUEST: GrammarTable<Container> = GrammarTable {
    name: "unexpected tag in ModifyRequest",
    start: START,
    transitions: &[
        t!(START, On::open(APP, 6), SEQ_OPEN, skip),
        t!(SEQ_OPEN, On::prim(UNI, OCTS), OBJECT_STORED, store_object),
        t!(OBJECT_STORED, On::open(UNI, SEQ), IN_CHANGES, skip),
        t!(IN_CHANGES, On::open(UNI, SEQ), IN_CHANGE, skip),
        t!(IN_CHANGE, On::prim(UNI, ENUM), OP_STORED, store_operation),
        t!(OP_STORED, On::open(UNI, SEQ), IN_PARTIAL_ATTR, skip),
        t!(IN_PARTIAL_ATTR, On::prim(UNI, OCTS), TYPE_STORED, store_type),
        t!(TYPE_STORED, On::open(UNI, SET), IN_VALUES, skip),
        t!(IN_VALUES, On::prim(UNI, OCTS), IN_VALUES, store_value),
        t!(IN_VALUES, On::close(), VALUES_DONE, skip),
        t!(VALUES_DONE, On::close(), ATTR_DONE, skip),
        t!(ATTR_DONE, On::close(), IN_CHANGES, finish_change),
        t!(IN_CHANGES, On::close(), CHANGES_DONE, skip),
        t!(CHANGES_DONE, On::close(), DONE, skip),
    ],
    accepting: |_, state| state == DONE,
};

type R = Result<Follow<Container>, OpError>;

fn store_object(c: &mut Container, ev: &Event) -> R {
    let object = ev_dn(ev, "modify object")?;
    c.modify().object = Some(object);
    Ok(Follow::Next)
}

fn store_operation(c: &mut Container, ev: &Event) -> R {
    let code = ev_uint(ev, "modify operation")?;
    let op = ModifyOperation::from_code(code).ok_or_else(|| {
        OpError::semantic(
            ResultCode::ProtocolError,
            format!("unknown modify operation {}", code),
        )
    })?;
    c.modify().cur_op = Some(op);
    Ok(Follow::Next)
}

fn store_type(c: &mut Container, ev: &Event) -> R {
    let up_id = ev_utf8(ev, "modification attribute")?;
    c.modify().cur_attr = Some(Attribute::new(&up_id));
    Ok(Follow::Next)
}

fn store_value(c: &mut Container, ev: &Event) -> R {
    let build = c.modify();
    let attr = build.cur_attr.as_mut().expect("attribute in progress");
    attr.add_value(AttrValue::from_bytes(ev.value.to_vec()));
    Ok(Follow::Next)
}

fn finish_change(c: &mut Container, _ev: &Event) -> R {
    let build = c.modify();
    let op = build.cur_op.take().expect("operation stored");
    let attribute = build.cur_attr.take().expect("attribute stored");
    build.changes.push(Modification { op, attribute });
    Ok(Follow::Next)
}

pub(crate) fn assemble_request(mut c: Container) -> ProtocolOp {
    let build = std::mem::take(c.modify());
    ProtocolOp::ModifyRequest(ModifyRequest {
        object: build.object.expect("grammar stored object"),
        changes: build.changes,
    })
}

pub(crate) fn build_request(req: &ModifyRequest) -> Tag {
    let changes = req
        .changes
        .iter()
        .map(|change| {
            Tag::Sequence(Sequence {
                inner: vec![
                    Tag::Enumerated(Enumerated {
                        inner: change.op as i64,
                        ..Default::default()
                    }),
                    Tag::Sequence(Sequence {
                        inner: vec![
                            Tag::OctetString(OctetString {
                                inner: Vec::from(change.attribute.up_id().as_bytes()),
                                ..Default::default()
                            }),
                            Tag::Set(Set {
                                inner: change
                                    .attribute
                                    .values()
                                    .iter()
                                    .map(|v| {
                                        Tag::OctetString(OctetString {
                                            inner: v.as_bytes().to_vec(),
                                            ..Default::default()
                                        })
                                    })
                                    .collect(),
                                ..Default::default()
                            }),
                        ],
                        ..Default::default()
                    }),
                ],
                ..Default::default()
            })
        })
        .collect();
    super::app_sequence(
        6,
        vec![
            Tag::OctetString(OctetString {
                inner: Vec::from(req.object.to_string().as_bytes()),
                ..Default::default()
            }),
            Tag::Sequence(Sequence {
                inner: changes,
                ..Default::default()
            }),
        ],
    )
}
