//! The LDAP message codec: envelope handling, the decode driver, and the
//! two encoders.
//!
//! Decoding pipeline: a [`berstream::BerDecoder`] materializes one TLV tree
//! per PDU; the envelope (messageID, protocolOp, controls) is peeled here;
//! the protocolOp subtree is flattened to events and run through the
//! per-operation grammar selected by its application tag. Semantic failures
//! in requests surface as [`DecodeError::RequestError`] with a skeleton
//! response carrying the copied message id.
//!
//! Encoding builds a TLV tree per message and serializes it through either
//! berstream encoder; both produce identical bytes.

use bytes::BytesMut;

use berstream::common::TagClass;
use berstream::structure::{StructureTag, PL};
use berstream::structures::{ASNTag, Integer, Sequence, Tag};
use berstream::universal::Types;
use berstream::{write, BerDecoder, Feed};

use crate::controls_impl::{build_control, parse_control};
use crate::dn::Dn;
use crate::error::{DecodeError, EncodeError, OpError};
use crate::grammar::{events_of, Engine, Event};
use crate::message::*;
use crate::result::{LdapResult, ResultCode};

pub(crate) mod abandon;
pub(crate) mod add;
pub(crate) mod bind;
pub(crate) mod compare;
pub(crate) mod delete;
pub(crate) mod extended;
pub(crate) mod filter;
pub(crate) mod moddn;
pub(crate) mod modify;
pub(crate) mod result;
pub(crate) mod search;
pub(crate) mod search_result;

pub(crate) const UNI: TagClass = TagClass::Universal;
pub(crate) const APP: TagClass = TagClass::Application;
pub(crate) const CTX: TagClass = TagClass::Context;

pub(crate) const BOOL: u64 = Types::Boolean as u64;
pub(crate) const INT: u64 = Types::Integer as u64;
pub(crate) const OCTS: u64 = Types::OctetString as u64;
pub(crate) const ENUM: u64 = Types::Enumerated as u64;
pub(crate) const SEQ: u64 = Types::Sequence as u64;
pub(crate) const SET: u64 = Types::Set as u64;

/// The in-progress message shared by every grammar of one decode run.
pub(crate) struct Container {
    pub op: OpBuild,
    /// Filled by the shared LDAPResult component grammar.
    pub result: LdapResult,
    /// Filled by the self-recursive filter grammar.
    pub filter: filter::FilterBuilder,
}

impl Container {
    fn new(op: OpBuild) -> Container {
        Container {
            op,
            result: LdapResult::default(),
            filter: filter::FilterBuilder::new(),
        }
    }
}

/// Per-operation partial state. One variant per distinct decode shape; the
/// six responses that are a bare LDAPResult share `ResultOnly`.
pub(crate) enum OpBuild {
    Bind(bind::BindBuild),
    BindResp(bind::BindRespBuild),
    Unbind,
    Search(search::SearchBuild),
    Entry(search_result::EntryBuild),
    SearchRef(Vec<String>),
    ResultOnly,
    Modify(modify::ModifyBuild),
    ModDn(moddn::ModDnBuild),
    Compare(compare::CompareBuild),
    Del(Option<Dn>),
    Abandon(Option<i32>),
    NameValue(extended::NameValueBuild),
}

/// A streaming decoder for one connection.
///
/// Feed byte slices as they arrive; each call yields at most one message.
/// `Ok(None)` means the buffered input does not yet hold a complete PDU.
pub struct LdapCodec {
    ber: BerDecoder,
}

impl Default for LdapCodec {
    fn default() -> Self {
        LdapCodec::new()
    }
}

impl LdapCodec {
    pub fn new() -> LdapCodec {
        LdapCodec {
            ber: BerDecoder::new(),
        }
    }

    pub fn with_max_pdu_size(max_pdu_size: usize) -> LdapCodec {
        LdapCodec {
            ber: BerDecoder::with_max_pdu_size(max_pdu_size),
        }
    }

    pub fn set_max_pdu_size(&mut self, max_pdu_size: usize) {
        self.ber.set_max_pdu_size(max_pdu_size);
    }

    /// Feed input and try to decode one message. Call with an empty slice
    /// to drain further PDUs already buffered.
    pub fn decode(&mut self, input: &[u8]) -> Result<Option<LdapMessage>, DecodeError> {
        match self.ber.feed(input)? {
            Feed::NeedMore => Ok(None),
            Feed::Pdu(root) => {
                let msg = decode_message(root)?;
                log::trace!("decoded message {} ({:?} op)", msg.id, msg.op.tag());
                Ok(Some(msg))
            }
        }
    }

    /// Signal end of stream; an error if a PDU is cut short.
    pub fn finish(&self) -> Result<(), DecodeError> {
        Ok(self.ber.finish()?)
    }
}

/// Decode one complete PDU tree into a message.
pub fn decode_message(root: StructureTag) -> Result<LdapMessage, DecodeError> {
    let envelope = root
        .match_class(UNI)
        .and_then(|t| t.match_id(SEQ))
        .and_then(|t| t.expect_constructed())
        .ok_or(DecodeError::Protocol("message envelope is not a sequence"))?;
    let mut parts = envelope.into_iter();

    let id = parts
        .next()
        .and_then(|t| t.match_class(UNI))
        .and_then(|t| t.match_id(INT))
        .and_then(|t| t.expect_primitive())
        .ok_or(DecodeError::Protocol("missing message id"))?;
    let id = match berstream::parse::parse_int(&id) {
        Ok((_, n)) if (0..=MAX_INT as i64).contains(&n) => n as i32,
        _ => return Err(DecodeError::Protocol("message id out of range")),
    };

    let op_tag = parts.next().ok_or(DecodeError::Protocol("missing protocolOp"))?;
    if op_tag.class != APP {
        return Err(DecodeError::Protocol("protocolOp is not application class"));
    }

    let controls_tag = parts.next();
    if parts.next().is_some() {
        return Err(DecodeError::Protocol("trailing elements in message"));
    }

    let op = decode_op(id, &op_tag)?;

    let mut controls = Vec::new();
    if let Some(tag) = controls_tag {
        if tag.class != CTX || tag.id != 0 {
            return Err(DecodeError::Protocol("unexpected tag after protocolOp"));
        }
        let inner = tag
            .expect_constructed()
            .ok_or(DecodeError::Protocol("controls are not constructed"))?;
        for ctrl in inner {
            controls.push(parse_control(ctrl)?);
        }
    }

    Ok(LdapMessage { id, op, controls })
}

fn decode_op(id: i32, op_tag: &StructureTag) -> Result<ProtocolOp, DecodeError> {
    let (grammar, build) = select_grammar(op_tag)?;
    let mut container = Container::new(build);
    let mut engine = Engine::new(grammar);
    let run = run_events(&mut engine, op_tag, &mut container);
    match run {
        Ok(()) => Ok(assemble(op_tag.id, container)),
        Err(OpError::Protocol(msg)) => Err(DecodeError::Protocol(msg)),
        Err(OpError::Semantic { code, message }) => match skeleton_response(op_tag.id, code) {
            Some(response) => Err(DecodeError::RequestError {
                id,
                code,
                message,
                response: Box::new(LdapMessage::new(id, response)),
            }),
            None if is_request_tag(op_tag.id) => {
                // abandon and unbind have no response to carry the error
                Err(DecodeError::Protocol("invalid request without a response type"))
            }
            None => Err(DecodeError::ResponseError { id, message }),
        },
    }
}

fn run_events(
    engine: &mut Engine<Container>,
    op_tag: &StructureTag,
    container: &mut Container,
) -> Result<(), OpError> {
    for ev in events_of(op_tag) {
        engine.event(&ev, container)?;
    }
    engine.finish(container)
}

fn select_grammar(
    op_tag: &StructureTag,
) -> Result<(&'static crate::grammar::GrammarTable<Container>, OpBuild), DecodeError> {
    let pair = match op_tag.id {
        0 => (&bind::BIND_REQUEST, OpBuild::Bind(Default::default())),
        1 => (&bind::BIND_RESPONSE, OpBuild::BindResp(Default::default())),
        2 => (&abandon::UNBIND_REQUEST, OpBuild::Unbind),
        3 => (&search::SEARCH_REQUEST, OpBuild::Search(Default::default())),
        4 => (
            &search_result::SEARCH_RESULT_ENTRY,
            OpBuild::Entry(Default::default()),
        ),
        5 | 7 | 9 | 11 | 13 | 15 => (&result::RESULT_ONLY, OpBuild::ResultOnly),
        6 => (&modify::MODIFY_REQUEST, OpBuild::Modify(Default::default())),
        8 => (&add::ADD_REQUEST, OpBuild::Entry(Default::default())),
        10 => (&delete::DEL_REQUEST, OpBuild::Del(None)),
        12 => (&moddn::MODDN_REQUEST, OpBuild::ModDn(Default::default())),
        14 => (
            &compare::COMPARE_REQUEST,
            OpBuild::Compare(Default::default()),
        ),
        16 => (&abandon::ABANDON_REQUEST, OpBuild::Abandon(None)),
        19 => (&search_result::SEARCH_RESULT_REFERENCE, OpBuild::SearchRef(Vec::new())),
        23 => (
            &extended::EXTENDED_REQUEST,
            OpBuild::NameValue(Default::default()),
        ),
        24 => (
            &extended::EXTENDED_RESPONSE,
            OpBuild::NameValue(Default::default()),
        ),
        25 => (
            &extended::INTERMEDIATE_RESPONSE,
            OpBuild::NameValue(Default::default()),
        ),
        _ => return Err(DecodeError::Protocol("unknown protocolOp tag")),
    };
    Ok(pair)
}

fn assemble(tag: u64, container: Container) -> ProtocolOp {
    match tag {
        0 => bind::assemble_request(container),
        1 => bind::assemble_response(container),
        2 => ProtocolOp::UnbindRequest,
        3 => search::assemble_request(container),
        4 => search_result::assemble_entry(container),
        5 => ProtocolOp::SearchResultDone(SearchResultDone(container.result)),
        6 => modify::assemble_request(container),
        7 => ProtocolOp::ModifyResponse(ModifyResponse(container.result)),
        8 => add::assemble_request(container),
        9 => ProtocolOp::AddResponse(AddResponse(container.result)),
        10 => delete::assemble_request(container),
        11 => ProtocolOp::DelResponse(DelResponse(container.result)),
        12 => moddn::assemble_request(container),
        13 => ProtocolOp::ModDnResponse(ModDnResponse(container.result)),
        14 => compare::assemble_request(container),
        15 => ProtocolOp::CompareResponse(CompareResponse(container.result)),
        16 => abandon::assemble_request(container),
        19 => search_result::assemble_reference(container),
        23 => extended::assemble_request(container),
        24 => extended::assemble_response(container),
        25 => extended::assemble_intermediate(container),
        _ => unreachable!("grammar selection covers all tags"),
    }
}

fn is_request_tag(tag: u64) -> bool {
    matches!(tag, 0 | 2 | 3 | 6 | 8 | 10 | 12 | 14 | 16 | 23)
}

/// The response type matching a request tag, as a skeleton carrying `code`.
fn skeleton_response(tag: u64, code: ResultCode) -> Option<ProtocolOp> {
    let result = LdapResult::new(code);
    Some(match tag {
        0 => ProtocolOp::BindResponse(BindResponse {
            result,
            server_sasl_creds: None,
        }),
        3 => ProtocolOp::SearchResultDone(SearchResultDone(result)),
        6 => ProtocolOp::ModifyResponse(ModifyResponse(result)),
        8 => ProtocolOp::AddResponse(AddResponse(result)),
        10 => ProtocolOp::DelResponse(DelResponse(result)),
        12 => ProtocolOp::ModDnResponse(ModDnResponse(result)),
        14 => ProtocolOp::CompareResponse(CompareResponse(result)),
        23 => ProtocolOp::ExtendedResponse(ExtendedResponse {
            result,
            name: None,
            value: None,
        }),
        _ => return None,
    })
}

// --- encoding ---

/// Serialize a message with the forward (length-precomputing) encoder.
pub fn encode_forward(msg: &LdapMessage) -> Result<BytesMut, EncodeError> {
    let tree = build_message(msg)?;
    let mut buf = BytesMut::with_capacity(write::encoded_len(&tree));
    write::encode_into(&mut buf, &tree);
    Ok(buf)
}

/// Serialize a message with the reverse (tail-first) encoder. The preferred
/// path: no length pre-computation pass.
pub fn encode_reverse(msg: &LdapMessage) -> Result<BytesMut, EncodeError> {
    let tree = build_message(msg)?;
    Ok(berstream::rwrite::encode_rev(&tree))
}

fn build_message(msg: &LdapMessage) -> Result<StructureTag, EncodeError> {
    if msg.id < 0 || (msg.id == 0 && msg.op.is_request()) {
        return Err(EncodeError::MessageIdOutOfRange(msg.id));
    }
    let mut inner = vec![
        Tag::Integer(Integer {
            inner: msg.id as i64,
            ..Default::default()
        }),
        build_op(&msg.op)?,
    ];
    if !msg.controls.is_empty() {
        let controls = msg
            .controls
            .iter()
            .map(|c| build_control(c).map(|t| t.into_structure()))
            .collect::<Result<Vec<_>, _>>()?;
        inner.push(Tag::StructureTag(StructureTag {
            class: CTX,
            id: 0,
            payload: PL::C(controls),
        }));
    }
    Ok(Tag::Sequence(Sequence {
        inner,
        ..Default::default()
    })
    .into_structure())
}

fn build_op(op: &ProtocolOp) -> Result<Tag, EncodeError> {
    use ProtocolOp::*;
    Ok(match op {
        BindRequest(req) => bind::build_request(req),
        BindResponse(resp) => bind::build_response(resp),
        UnbindRequest => abandon::build_unbind(),
        SearchRequest(req) => search::build_request(req),
        SearchResultEntry(entry) => search_result::build_entry(entry),
        SearchResultDone(done) => result::build_result_only(5, &done.0),
        SearchResultReference(reference) => search_result::build_reference(reference)?,
        ModifyRequest(req) => modify::build_request(req),
        ModifyResponse(resp) => result::build_result_only(7, &resp.0),
        AddRequest(req) => add::build_request(req)?,
        AddResponse(resp) => result::build_result_only(9, &resp.0),
        DelRequest(req) => delete::build_request(req),
        DelResponse(resp) => result::build_result_only(11, &resp.0),
        ModDnRequest(req) => moddn::build_request(req),
        ModDnResponse(resp) => result::build_result_only(13, &resp.0),
        CompareRequest(req) => compare::build_request(req),
        CompareResponse(resp) => result::build_result_only(15, &resp.0),
        AbandonRequest(req) => abandon::build_request(req)?,
        ExtendedRequest(req) => extended::build_request(req),
        ExtendedResponse(resp) => extended::build_response(resp),
        IntermediateResponse(resp) => extended::build_intermediate(resp),
    })
}

// --- event content helpers shared by the op grammars ---

pub(crate) fn ev_utf8(ev: &Event, what: &'static str) -> Result<String, OpError> {
    String::from_utf8(ev.value.to_vec()).map_err(|_| OpError::Protocol(what))
}

pub(crate) fn ev_uint(ev: &Event, what: &'static str) -> Result<u64, OpError> {
    match berstream::parse::parse_uint(ev.value) {
        Ok((_, n)) => Ok(n),
        Err(_) => Err(OpError::Protocol(what)),
    }
}

pub(crate) fn ev_int(ev: &Event, what: &'static str) -> Result<i64, OpError> {
    match berstream::parse::parse_int(ev.value) {
        Ok((_, n)) => Ok(n),
        Err(_) => Err(OpError::Protocol(what)),
    }
}

pub(crate) fn ev_bool(ev: &Event, what: &'static str) -> Result<bool, OpError> {
    if ev.value.len() != 1 {
        return Err(OpError::Protocol(what));
    }
    Ok(ev.value[0] != 0)
}

pub(crate) fn ev_dn(ev: &Event, what: &str) -> Result<Dn, OpError> {
    let s = String::from_utf8(ev.value.to_vec())
        .map_err(|_| OpError::semantic(ResultCode::InvalidDnSyntax, format!("{}: not UTF-8", what)))?;
    Dn::parse(&s).map_err(|e| OpError::semantic(ResultCode::InvalidDnSyntax, e.to_string()))
}

/// An application-class TLV wrapping a sequence body.
pub(crate) fn app_sequence(id: u64, inner: Vec<Tag>) -> Tag {
    Tag::Sequence(Sequence {
        class: APP,
        id,
        inner,
    })
}
