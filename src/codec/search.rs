//! Search request.

use berstream::structures::{Boolean, Enumerated, Integer, OctetString, Sequence, Tag};

use super::filter::{build_filter, FILTER};
use super::{ev_bool, ev_dn, ev_int, ev_uint, ev_utf8, Container, OpBuild};
use super::{APP, BOOL, CTX, ENUM, INT, OCTS, SEQ, UNI};
use crate::dn::Dn;
use crate::error::OpError;
use crate::grammar::{skip, Event, Follow, GrammarTable, On, Transition};
use crate::message::{DerefAliases, ProtocolOp, SearchRequest, SearchScope, MAX_INT};
use crate::result::ResultCode;

#[derive(Default)]
pub(crate) struct SearchBuild {
    base: Option<Dn>,
    scope: Option<SearchScope>,
    deref: Option<DerefAliases>,
    size_limit: i32,
    time_limit: i32,
    types_only: bool,
    attributes: Vec<String>,
}

impl Container {
    fn search(&mut self) -> &mut SearchBuild {
        match &mut self.op {
            OpBuild::Search(b) => b,
            _ => unreachable!("search container"),
        }
    }
}

// SearchRequest ::= [APPLICATION 3] SEQUENCE {
//     baseObject LDAPDN, scope ENUMERATED, derefAliases ENUMERATED,
//     sizeLimit INTEGER (0..maxInt), timeLimit INTEGER (0..maxInt),
//     typesOnly BOOLEAN, filter Filter,
//     attributes AttributeSelection }
const START: u8 = 0;
const SEQ_OPEN: u8 = 1;
const BASE_STORED: u8 = 2;
const SCOPE_STORED: u8 = 3;
const DEREF_STORED: u8 = 4;
const SIZE_STORED: u8 = 5;
const TIME_STORED: u8 = 6;
const TYPES_STORED: u8 = 7;
const FILTER_DONE: u8 = 8;
const IN_ATTRS: u8 = 9;
const ATTRS_DONE: u8 = 10;
const DONE: u8 = 11;

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

/// A transition handing the filter root TLV over to the filter grammar.
macro_rules! filter_root {
    ($on:expr) => {
        t!(TYPES_STORED, $on, FILTER_DONE, enter_filter)
    };
}

pub(crate) static SEARCH_REQUEST: GrammarTable<Container> = GrammarTable {
    name: "unexpected tag in SearchRequest",
    start: START,
    transitions: &[
        t!(START, On::open(APP, 3), SEQ_OPEN, skip),
        t!(SEQ_OPEN, On::prim(UNI, OCTS), BASE_STORED, store_base),
        t!(BASE_STORED, On::prim(UNI, ENUM), SCOPE_STORED, store_scope),
        t!(SCOPE_STORED, On::prim(UNI, ENUM), DEREF_STORED, store_deref),
        t!(DEREF_STORED, On::prim(UNI, INT), SIZE_STORED, store_size_limit),
        t!(SIZE_STORED, On::prim(UNI, INT), TIME_STORED, store_time_limit),
        t!(TIME_STORED, On::prim(UNI, BOOL), TYPES_STORED, store_types_only),
        filter_root!(On::open(CTX, 0)),
        filter_root!(On::open(CTX, 1)),
        filter_root!(On::open(CTX, 2)),
        filter_root!(On::open(CTX, 3)),
        filter_root!(On::open(CTX, 4)),
        filter_root!(On::open(CTX, 5)),
        filter_root!(On::open(CTX, 6)),
        filter_root!(On::prim(CTX, 7)),
        filter_root!(On::open(CTX, 8)),
        filter_root!(On::open(CTX, 9)),
        t!(FILTER_DONE, On::open(UNI, SEQ), IN_ATTRS, skip),
        t!(IN_ATTRS, On::prim(UNI, OCTS), IN_ATTRS, store_attribute),
        t!(IN_ATTRS, On::close(), ATTRS_DONE, skip),
        t!(ATTRS_DONE, On::close(), DONE, skip),
    ],
    accepting: |_, state| state == DONE,
};

type R = Result<Follow<Container>, OpError>;

fn store_base(c: &mut Container, ev: &Event) -> R {
    let base = ev_dn(ev, "search base")?;
    c.search().base = Some(base);
    Ok(Follow::Next)
}

fn store_scope(c: &mut Container, ev: &Event) -> R {
    let scope = ev_uint(ev, "search scope")?;
    let scope = SearchScope::from_code(scope)
        .ok_or_else(|| OpError::semantic(ResultCode::ProtocolError, "unknown search scope"))?;
    c.search().scope = Some(scope);
    Ok(Follow::Next)
}

fn store_deref(c: &mut Container, ev: &Event) -> R {
    let deref = ev_uint(ev, "search derefAliases")?;
    let deref = DerefAliases::from_code(deref).ok_or_else(|| {
        OpError::semantic(ResultCode::ProtocolError, "unknown derefAliases value")
    })?;
    c.search().deref = Some(deref);
    Ok(Follow::Next)
}

fn limit(ev: &Event, what: &'static str) -> Result<i32, OpError> {
    let n = ev_int(ev, what)?;
    if !(0..=MAX_INT as i64).contains(&n) {
        return Err(OpError::semantic(
            ResultCode::ProtocolError,
            format!("{} out of range: {}", what, n),
        ));
    }
    Ok(n as i32)
}

fn store_size_limit(c: &mut Container, ev: &Event) -> R {
    c.search().size_limit = limit(ev, "search size limit")?;
    Ok(Follow::Next)
}

fn store_time_limit(c: &mut Container, ev: &Event) -> R {
    c.search().time_limit = limit(ev, "search time limit")?;
    Ok(Follow::Next)
}

fn store_types_only(c: &mut Container, ev: &Event) -> R {
    c.search().types_only = ev_bool(ev, "search typesOnly")?;
    Ok(Follow::Next)
}

fn enter_filter(_c: &mut Container, _ev: &Event) -> R {
    Ok(Follow::Redispatch(&FILTER))
}

fn store_attribute(c: &mut Container, ev: &Event) -> R {
    let attr = ev_utf8(ev, "requested attribute")?;
    c.search().attributes.push(attr);
    Ok(Follow::Next)
}

pub(crate) fn assemble_request(mut c: Container) -> ProtocolOp {
    let build = std::mem::take(c.search());
    ProtocolOp::SearchRequest(SearchRequest {
        base: build.base.expect("grammar stored base"),
        scope: build.scope.expect("grammar stored scope"),
        deref_aliases: build.deref.expect("grammar stored derefAliases"),
        size_limit: build.size_limit,
        time_limit: build.time_limit,
        types_only: build.types_only,
        filter: c.filter.take().expect("filter grammar finished"),
        attributes: build.attributes,
    })
}

pub(crate) fn build_request(req: &SearchRequest) -> Tag {
    super::app_sequence(
        3,
        vec![
            Tag::OctetString(OctetString {
                inner: Vec::from(req.base.to_string().as_bytes()),
                ..Default::default()
            }),
            Tag::Enumerated(Enumerated {
                inner: req.scope as i64,
                ..Default::default()
            }),
            Tag::Enumerated(Enumerated {
                inner: req.deref_aliases as i64,
                ..Default::default()
            }),
            Tag::Integer(Integer {
                inner: req.size_limit as i64,
                ..Default::default()
            }),
            Tag::Integer(Integer {
                inner: req.time_limit as i64,
                ..Default::default()
            }),
            Tag::Boolean(Boolean {
                inner: req.types_only,
                ..Default::default()
            }),
            build_filter(&req.filter),
            Tag::Sequence(Sequence {
                inner: req
                    .attributes
                    .iter()
                    .map(|attr| {
                        Tag::OctetString(OctetString {
                            inner: Vec::from(attr.as_bytes()),
                            ..Default::default()
                        })
                    })
                    .collect(),
                ..Default::default()
            }),
        ],
    )
}
