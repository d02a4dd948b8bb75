//! Modify DN request.

use berstream::structures::{Boolean, OctetString, Tag};

use super::{ev_bool, ev_dn, Container, OpBuild, APP, BOOL, CTX, OCTS, UNI};
use crate::dn::{Dn, Rdn};
use crate::error::OpError;
use crate::grammar::{skip, Event, Follow, GrammarTable, On, Transition};
use crate::message::{ModDnRequest, ProtocolOp};
use crate::result::ResultCode;

#[derive(Default)]
pub(crate) struct ModDnBuild {
    entry: Option<Dn>,
    new_rdn: Option<Rdn>,
    delete_old_rdn: bool,
    new_superior: Option<Dn>,
}

impl Container {
    fn moddn(&mut self) -> &mut ModDnBuild {
        match &mut self.op {
            OpBuild::ModDn(b) => b,
            _ => unreachable!("modDN container"),
        }
    }
}

// ModifyDNRequest ::= [APPLICATION 12] SEQUENCE {
//     entry        LDAPDN,
//     newrdn       RelativeLDAPDN,
//     deleteoldrdn BOOLEAN,
//     newSuperior  [0] LDAPDN OPTIONAL }
const START: u8 = 0;
const SEQ_OPEN: u8 = 1;
const ENTRY_STORED: u8 = 2;
const RDN_STORED: u8 = 3;
const DELETE_STORED: u8 = 4;
const SUPERIOR_STORED: u8 = 5;
const DONE: u8 = 6;

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

pub(crate) static MODDN_REQUEST: GrammarTable<Container> = GrammarTable {
    name: "unexpected tag in ModifyDNRequest",
    start: START,
    transitions: &[
        t!(START, On::open(APP, 12), SEQ_OPEN, skip),
        t!(SEQ_OPEN, On::prim(UNI, OCTS), ENTRY_STORED, store_entry),
        t!(ENTRY_STORED, On::prim(UNI, OCTS), RDN_STORED, store_new_rdn),
        t!(RDN_STORED, On::prim(UNI, BOOL), DELETE_STORED, store_delete_old),
        t!(DELETE_STORED, On::prim(CTX, 0), SUPERIOR_STORED, store_superior),
        t!(DELETE_STORED, On::close(), DONE, skip),
        t!(SUPERIOR_STORED, On::close(), DONE, skip),
    ],
    accepting: |_, state| state == DONE,
};

type R = Result<Follow<Container>, OpError>;

fn store_entry(c: &mut Container, ev: &Event) -> R {
    let entry = ev_dn(ev, "modDN entry")?;
    c.moddn().entry = Some(entry);
    Ok(Follow::Next)
}

fn store_new_rdn(c: &mut Container, ev: &Event) -> R {
    let s = String::from_utf8(ev.value.to_vec())
        .map_err(|_| OpError::semantic(ResultCode::InvalidDnSyntax, "newrdn: not UTF-8"))?;
    let rdn =
        Rdn::parse(&s).map_err(|e| OpError::semantic(ResultCode::InvalidDnSyntax, e.to_string()))?;
    c.moddn().new_rdn = Some(rdn);
    Ok(Follow::Next)
}

fn store_delete_old(c: &mut Container, ev: &Event) -> R {
    c.moddn().delete_old_rdn = ev_bool(ev, "deleteoldrdn")?;
    Ok(Follow::Next)
}

fn store_superior(c: &mut Container, ev: &Event) -> R {
    let superior = ev_dn(ev, "newSuperior")?;
    c.moddn().new_superior = Some(superior);
    Ok(Follow::Next)
}

pub(crate) fn assemble_request(mut c: Container) -> ProtocolOp {
    let build = std::mem::take(c.moddn());
    ProtocolOp::ModDnRequest(ModDnRequest {
        entry: build.entry.expect("grammar stored entry"),
        new_rdn: build.new_rdn.expect("grammar stored newrdn"),
        delete_old_rdn: build.delete_old_rdn,
        new_superior: build.new_superior,
    })
}

pub(crate) fn build_request(req: &ModDnRequest) -> Tag {
    let mut inner = vec![
        Tag::OctetString(OctetString {
            inner: Vec::from(req.entry.to_string().as_bytes()),
            ..Default::default()
        }),
        Tag::OctetString(OctetString {
            inner: Vec::from(req.new_rdn.to_string().as_bytes()),
            ..Default::default()
        }),
        Tag::Boolean(Boolean {
            inner: req.delete_old_rdn,
            ..Default::default()
        }),
    ];
    if let Some(ref superior) = req.new_superior {
        inner.push(Tag::OctetString(OctetString {
            class: CTX,
            id: 0,
            inner: Vec::from(superior.to_string().as_bytes()),
        }));
    }
    super::app_sequence(12, inner)
}
