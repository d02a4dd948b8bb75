//! Del request: the DN travels directly in an application-tagged octet
//! string, with no enclosing sequence.

use berstream::structures::{OctetString, Tag};

use super::{ev_dn, Container, OpBuild, APP};
use crate::error::OpError;
use crate::grammar::{Event, Follow, GrammarTable, On, Transition};
use crate::message::{DelRequest, ProtocolOp};

const START: u8 = 0;
const DONE: u8 = 1;

pub(crate) static DEL_REQUEST: GrammarTable<Container> = GrammarTable {
    name: "unexpected tag in DelRequest",
    start: START,
    transitions: &[Transition {
        from: START,
        on: On::prim(APP, 10),
        to: DONE,
        action: store_dn,
    }],
    accepting: |_, state| state == DONE,
};

fn store_dn(c: &mut Container, ev: &Event) -> Result<Follow<Container>, OpError> {
    let dn = ev_dn(ev, "delete DN")?;
    c.op = OpBuild::Del(Some(dn));
    Ok(Follow::Next)
}

pub(crate) fn assemble_request(c: Container) -> ProtocolOp {
    match c.op {
        OpBuild::Del(Some(dn)) => ProtocolOp::DelRequest(DelRequest { dn }),
        _ => unreachable!("delete container"),
    }
}

pub(crate) fn build_request(req: &DelRequest) -> Tag {
    Tag::OctetString(OctetString {
        class: APP,
        id: 10,
        inner: Vec::from(req.dn.to_string().as_bytes()),
    })
}
