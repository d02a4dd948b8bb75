//! Bind request and response.

use berstream::structures::{Integer, OctetString, Sequence, Tag};

use super::result::{result_tags, RESULT};
use super::{app_sequence, ev_dn, ev_int, ev_utf8, Container, OpBuild, APP, CTX, INT, OCTS, UNI};
use crate::dn::Dn;
use crate::error::OpError;
use crate::grammar::{skip, Event, Follow, GrammarTable, On, Transition};
use crate::message::{AuthChoice, BindRequest, BindResponse, ProtocolOp};
use crate::result::ResultCode;

#[derive(Default)]
pub(crate) struct BindBuild {
    version: u8,
    name: Option<Dn>,
    simple: Option<Vec<u8>>,
    sasl: bool,
    sasl_mech: Option<String>,
    sasl_creds: Option<Vec<u8>>,
}

#[derive(Default)]
pub(crate) struct BindRespBuild {
    creds: Option<Vec<u8>>,
}

impl Container {
    fn bind(&mut self) -> &mut BindBuild {
        match &mut self.op {
            OpBuild::Bind(b) => b,
            _ => unreachable!("bind container"),
        }
    }

    fn bind_resp(&mut self) -> &mut BindRespBuild {
        match &mut self.op {
            OpBuild::BindResp(b) => b,
            _ => unreachable!("bind response container"),
        }
    }
}

// BindRequest ::= [APPLICATION 0] SEQUENCE {
//     version  INTEGER (1 .. 127),
//     name     LDAPDN,
//     authentication AuthenticationChoice }
const START: u8 = 0;
const SEQ_OPEN: u8 = 1;
const VERSION_STORED: u8 = 2;
const NAME_STORED: u8 = 3;
const AUTH_DONE: u8 = 4;
const SASL_OPEN: u8 = 5;
const SASL_MECH: u8 = 6;
const SASL_CREDS: u8 = 7;
const DONE: u8 = 8;

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

pub(crate) static BIND_REQUEST: GrammarTable<Container> = GrammarTable {
    name: "unexpected tag in BindRequest",
    start: START,
    transitions: &[
        t!(START, On::open(APP, 0), SEQ_OPEN, skip),
        t!(SEQ_OPEN, On::prim(UNI, INT), VERSION_STORED, store_version),
        t!(VERSION_STORED, On::prim(UNI, OCTS), NAME_STORED, store_name),
        t!(NAME_STORED, On::prim(CTX, 0), AUTH_DONE, store_simple),
        t!(NAME_STORED, On::open(CTX, 3), SASL_OPEN, begin_sasl),
        t!(SASL_OPEN, On::prim(UNI, OCTS), SASL_MECH, store_mech),
        t!(SASL_MECH, On::prim(UNI, OCTS), SASL_CREDS, store_sasl_creds),
        t!(SASL_MECH, On::close(), AUTH_DONE, skip),
        t!(SASL_CREDS, On::close(), AUTH_DONE, skip),
        t!(AUTH_DONE, On::close(), DONE, skip),
    ],
    accepting: |_, state| state == DONE,
};

type R = Result<Follow<Container>, OpError>;

fn store_version(c: &mut Container, ev: &Event) -> R {
    let version = ev_int(ev, "bind version")?;
    if !(1..=127).contains(&version) {
        return Err(OpError::Protocol("bind version out of range"));
    }
    if version != 3 {
        return Err(OpError::semantic(
            ResultCode::ProtocolError,
            format!("unsupported bind version {}", version),
        ));
    }
    c.bind().version = version as u8;
    Ok(Follow::Next)
}

fn store_name(c: &mut Container, ev: &Event) -> R {
    let name = ev_dn(ev, "bind name")?;
    c.bind().name = Some(name);
    Ok(Follow::Next)
}

fn store_simple(c: &mut Container, ev: &Event) -> R {
    c.bind().simple = Some(ev.value.to_vec());
    Ok(Follow::Next)
}

fn begin_sasl(c: &mut Container, _ev: &Event) -> R {
    c.bind().sasl = true;
    Ok(Follow::Next)
}

fn store_mech(c: &mut Container, ev: &Event) -> R {
    let mech = ev_utf8(ev, "sasl mechanism")?;
    if mech.is_empty() {
        return Err(OpError::semantic(
            ResultCode::ProtocolError,
            "empty SASL mechanism",
        ));
    }
    c.bind().sasl_mech = Some(mech);
    Ok(Follow::Next)
}

fn store_sasl_creds(c: &mut Container, ev: &Event) -> R {
    c.bind().sasl_creds = Some(ev.value.to_vec());
    Ok(Follow::Next)
}

pub(crate) fn assemble_request(mut c: Container) -> ProtocolOp {
    let build = std::mem::take(c.bind());
    let auth = if build.sasl {
        AuthChoice::Sasl {
            mechanism: build.sasl_mech.expect("grammar stored mechanism"),
            credentials: build.sasl_creds,
        }
    } else {
        AuthChoice::Simple(build.simple.expect("grammar stored credentials"))
    };
    ProtocolOp::BindRequest(BindRequest {
        version: build.version,
        name: build.name.expect("grammar stored name"),
        auth,
    })
}

// BindResponse ::= [APPLICATION 1] SEQUENCE {
//     COMPONENTS OF LDAPResult,
//     serverSaslCreds [7] OCTET STRING OPTIONAL }
const RESP_BODY: u8 = 1;
const RESP_CREDS: u8 = 2;
const RESP_DONE: u8 = 3;

pub(crate) static BIND_RESPONSE: GrammarTable<Container> = GrammarTable {
    name: "unexpected tag in BindResponse",
    start: START,
    transitions: &[
        t!(START, On::open(APP, 1), RESP_BODY, enter_result),
        t!(RESP_BODY, On::prim(CTX, 7), RESP_CREDS, store_server_creds),
        t!(RESP_BODY, On::close(), RESP_DONE, skip),
        t!(RESP_CREDS, On::close(), RESP_DONE, skip),
    ],
    accepting: |_, state| state == RESP_DONE,
};

fn enter_result(_c: &mut Container, _ev: &Event) -> R {
    Ok(Follow::Enter(&RESULT))
}

fn store_server_creds(c: &mut Container, ev: &Event) -> R {
    c.bind_resp().creds = Some(ev.value.to_vec());
    Ok(Follow::Next)
}

pub(crate) fn assemble_response(mut c: Container) -> ProtocolOp {
    let creds = std::mem::take(c.bind_resp()).creds;
    ProtocolOp::BindResponse(BindResponse {
        result: c.result,
        server_sasl_creds: creds,
    })
}

pub(crate) fn build_request(req: &BindRequest) -> Tag {
    let auth = match &req.auth {
        AuthChoice::Simple(creds) => Tag::OctetString(OctetString {
            class: CTX,
            id: 0,
            inner: creds.clone(),
        }),
        AuthChoice::Sasl {
            mechanism,
            credentials,
        } => {
            let mut inner = vec![Tag::OctetString(OctetString {
                inner: Vec::from(mechanism.as_bytes()),
                ..Default::default()
            })];
            if let Some(creds) = credentials {
                inner.push(Tag::OctetString(OctetString {
                    inner: creds.clone(),
                    ..Default::default()
                }));
            }
            Tag::Sequence(Sequence {
                class: CTX,
                id: 3,
                inner,
            })
        }
    };
    app_sequence(
        0,
        vec![
            Tag::Integer(Integer {
                inner: req.version as i64,
                ..Default::default()
            }),
            Tag::OctetString(OctetString {
                inner: Vec::from(req.name.to_string().as_bytes()),
                ..Default::default()
            }),
            auth,
        ],
    )
}

pub(crate) fn build_response(resp: &BindResponse) -> Tag {
    let mut inner = result_tags(&resp.result);
    if let Some(ref creds) = resp.server_sasl_creds {
        inner.push(Tag::OctetString(OctetString {
            class: CTX,
            id: 7,
            inner: creds.clone(),
        }));
    }
    app_sequence(1, inner)
}
