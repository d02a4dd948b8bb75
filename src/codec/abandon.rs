//! Abandon and Unbind: the two bodyless requests with no response type.

use berstream::structures::{Integer, Null, Tag};

use super::{ev_int, Container, OpBuild, APP};
use crate::error::{EncodeError, OpError};
use crate::grammar::{Event, Follow, GrammarTable, On, Transition};
use crate::message::{AbandonRequest, ProtocolOp, MAX_INT};
use crate::result::ResultCode;

const START: u8 = 0;
const DONE: u8 = 1;

// AbandonRequest ::= [APPLICATION 16] MessageID
pub(crate) static ABANDON_REQUEST: GrammarTable<Container> = GrammarTable {
    name: "unexpected tag in AbandonRequest",
    start: START,
    transitions: &[Transition {
        from: START,
        on: On::prim(APP, 16),
        to: DONE,
        action: store_id,
    }],
    accepting: |_, state| state == DONE,
};

fn store_id(c: &mut Container, ev: &Event) -> Result<Follow<Container>, OpError> {
    let id = ev_int(ev, "abandoned message id")?;
    if !(1..=MAX_INT as i64).contains(&id) {
        // there is no AbandonResponse, so this surfaces as a fatal error
        return Err(OpError::semantic(
            ResultCode::ProtocolError,
            format!("abandoned message id out of range: {}", id),
        ));
    }
    c.op = OpBuild::Abandon(Some(id as i32));
    Ok(Follow::Next)
}

pub(crate) fn assemble_request(c: Container) -> ProtocolOp {
    match c.op {
        OpBuild::Abandon(Some(id)) => ProtocolOp::AbandonRequest(AbandonRequest { id }),
        _ => unreachable!("abandon container"),
    }
}

pub(crate) fn build_request(req: &AbandonRequest) -> Result<Tag, EncodeError> {
    if req.id <= 0 {
        return Err(EncodeError::CannotEncode("abandon target id out of range"));
    }
    Ok(Tag::Integer(Integer {
        class: APP,
        id: 16,
        inner: req.id as i64,
    }))
}

// UnbindRequest ::= [APPLICATION 2] NULL
pub(crate) static UNBIND_REQUEST: GrammarTable<Container> = GrammarTable {
    name: "unexpected tag in UnbindRequest",
    start: START,
    transitions: &[Transition {
        from: START,
        on: On::prim(APP, 2),
        to: DONE,
        action: check_empty,
    }],
    accepting: |_, state| state == DONE,
};

fn check_empty(_c: &mut Container, ev: &Event) -> Result<Follow<Container>, OpError> {
    if !ev.value.is_empty() {
        return Err(OpError::Protocol("unbind request with content"));
    }
    Ok(Follow::Next)
}

pub(crate) fn build_unbind() -> Tag {
    Tag::Null(Null { class: APP, id: 2 })
}
