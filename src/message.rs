//! The LDAP message envelope and per-operation payload holders.
//!
//! Decoders build these incrementally; encoders consume them without
//! mutation. Structural equality follows the semantics of each field:
//! attribute collections compare as multisets (see [`crate::entry`]), DNs
//! through their normalized form, everything else verbatim.

use crate::controls_impl::Control;
use crate::dn::{Dn, Rdn};
use crate::entry::{AttrValue, Attribute, Entry};
use crate::filter::Filter;
use crate::result::LdapResult;

/// Largest message id and size/time limit value: maxInt of RFC 4511.
pub const MAX_INT: i32 = i32::MAX;

/// One LDAP PDU: message id, operation, optional controls.
#[derive(Clone, Debug, PartialEq)]
pub struct LdapMessage {
    /// Positive for ordinary messages; zero occurs only in unsolicited
    /// notifications.
    pub id: i32,
    pub op: ProtocolOp,
    pub controls: Vec<Control>,
}

impl LdapMessage {
    pub fn new(id: i32, op: ProtocolOp) -> LdapMessage {
        LdapMessage {
            id,
            op,
            controls: Vec::new(),
        }
    }

    pub fn with_controls(id: i32, op: ProtocolOp, controls: Vec<Control>) -> LdapMessage {
        LdapMessage { id, op, controls }
    }
}

/// The protocolOp CHOICE. Application tag numbers follow RFC 4511 §4.1.1.
#[derive(Clone, Debug, PartialEq)]
pub enum ProtocolOp {
    BindRequest(BindRequest),
    BindResponse(BindResponse),
    UnbindRequest,
    SearchRequest(SearchRequest),
    SearchResultEntry(SearchResultEntry),
    SearchResultDone(SearchResultDone),
    SearchResultReference(SearchResultReference),
    ModifyRequest(ModifyRequest),
    ModifyResponse(ModifyResponse),
    AddRequest(AddRequest),
    AddResponse(AddResponse),
    DelRequest(DelRequest),
    DelResponse(DelResponse),
    ModDnRequest(ModDnRequest),
    ModDnResponse(ModDnResponse),
    CompareRequest(CompareRequest),
    CompareResponse(CompareResponse),
    AbandonRequest(AbandonRequest),
    ExtendedRequest(ExtendedRequest),
    ExtendedResponse(ExtendedResponse),
    IntermediateResponse(IntermediateResponse),
}

impl ProtocolOp {
    /// The application-class tag number carried on the wire.
    pub fn tag(&self) -> u64 {
        use ProtocolOp::*;
        match self {
            BindRequest(_) => 0,
            BindResponse(_) => 1,
            UnbindRequest => 2,
            SearchRequest(_) => 3,
            SearchResultEntry(_) => 4,
            SearchResultDone(_) => 5,
            ModifyRequest(_) => 6,
            ModifyResponse(_) => 7,
            AddRequest(_) => 8,
            AddResponse(_) => 9,
            DelRequest(_) => 10,
            DelResponse(_) => 11,
            ModDnRequest(_) => 12,
            ModDnResponse(_) => 13,
            CompareRequest(_) => 14,
            CompareResponse(_) => 15,
            AbandonRequest(_) => 16,
            SearchResultReference(_) => 19,
            ExtendedRequest(_) => 23,
            ExtendedResponse(_) => 24,
            IntermediateResponse(_) => 25,
        }
    }

    pub fn is_request(&self) -> bool {
        use ProtocolOp::*;
        matches!(
            self,
            BindRequest(_)
                | UnbindRequest
                | SearchRequest(_)
                | ModifyRequest(_)
                | AddRequest(_)
                | DelRequest(_)
                | ModDnRequest(_)
                | CompareRequest(_)
                | AbandonRequest(_)
                | ExtendedRequest(_)
        )
    }

    /// The LDAPResult component, for operations that carry one.
    pub fn result(&self) -> Option<&LdapResult> {
        use ProtocolOp::*;
        match self {
            BindResponse(r) => Some(&r.result),
            SearchResultDone(r) => Some(&r.0),
            ModifyResponse(r) => Some(&r.0),
            AddResponse(r) => Some(&r.0),
            DelResponse(r) => Some(&r.0),
            ModDnResponse(r) => Some(&r.0),
            CompareResponse(r) => Some(&r.0),
            ExtendedResponse(r) => Some(&r.result),
            _ => None,
        }
    }
}

/// The authentication CHOICE of a Bind request.
#[derive(Clone, Debug, PartialEq)]
pub enum AuthChoice {
    Simple(Vec<u8>),
    Sasl {
        mechanism: String,
        credentials: Option<Vec<u8>>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct BindRequest {
    /// Protocol version; only 3 is accepted on decode.
    pub version: u8,
    pub name: Dn,
    pub auth: AuthChoice,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BindResponse {
    pub result: LdapResult,
    pub server_sasl_creds: Option<Vec<u8>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchScope {
    BaseObject = 0,
    SingleLevel = 1,
    WholeSubtree = 2,
}

impl SearchScope {
    pub fn from_code(code: u64) -> Option<SearchScope> {
        match code {
            0 => Some(SearchScope::BaseObject),
            1 => Some(SearchScope::SingleLevel),
            2 => Some(SearchScope::WholeSubtree),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DerefAliases {
    NeverDerefAliases = 0,
    DerefInSearching = 1,
    DerefFindingBaseObj = 2,
    DerefAlways = 3,
}

impl DerefAliases {
    pub fn from_code(code: u64) -> Option<DerefAliases> {
        match code {
            0 => Some(DerefAliases::NeverDerefAliases),
            1 => Some(DerefAliases::DerefInSearching),
            2 => Some(DerefAliases::DerefFindingBaseObj),
            3 => Some(DerefAliases::DerefAlways),
            _ => None,
        }
    }
}

/// Requested attribute list markers: `*` selects all user attributes, `+`
/// all operational attributes, `1.1` none. An empty list means all user
/// attributes.
pub const ALL_USER_ATTRIBUTES: &str = "*";
pub const ALL_OPERATIONAL_ATTRIBUTES: &str = "+";
pub const NO_ATTRIBUTES: &str = "1.1";

#[derive(Clone, Debug, PartialEq)]
pub struct SearchRequest {
    pub base: Dn,
    pub scope: SearchScope,
    pub deref_aliases: DerefAliases,
    /// 0 means no client-requested limit.
    pub size_limit: i32,
    /// 0 means no client-requested limit.
    pub time_limit: i32,
    pub types_only: bool,
    pub filter: Filter,
    pub attributes: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SearchResultEntry {
    pub entry: Entry,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SearchResultReference {
    /// At least one URI.
    pub uris: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SearchResultDone(pub LdapResult);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModifyOperation {
    Add = 0,
    Delete = 1,
    Replace = 2,
    /// RFC 4525.
    Increment = 3,
}

impl ModifyOperation {
    pub fn from_code(code: u64) -> Option<ModifyOperation> {
        match code {
            0 => Some(ModifyOperation::Add),
            1 => Some(ModifyOperation::Delete),
            2 => Some(ModifyOperation::Replace),
            3 => Some(ModifyOperation::Increment),
            _ => None,
        }
    }

    pub fn ldif_keyword(&self) -> &'static str {
        match self {
            ModifyOperation::Add => "add",
            ModifyOperation::Delete => "delete",
            ModifyOperation::Replace => "replace",
            ModifyOperation::Increment => "increment",
        }
    }
}

/// One element of a Modify request's change sequence.
#[derive(Clone, Debug, PartialEq)]
pub struct Modification {
    pub op: ModifyOperation,
    /// Attribute description plus zero or more values.
    pub attribute: Attribute,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModifyRequest {
    pub object: Dn,
    pub changes: Vec<Modification>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModifyResponse(pub LdapResult);

#[derive(Clone, Debug, PartialEq)]
pub struct AddRequest {
    /// DN plus at least one attribute, each with at least one value.
    pub entry: Entry,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AddResponse(pub LdapResult);

#[derive(Clone, Debug, PartialEq)]
pub struct DelRequest {
    pub dn: Dn,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DelResponse(pub LdapResult);

#[derive(Clone, Debug, PartialEq)]
pub struct ModDnRequest {
    pub entry: Dn,
    pub new_rdn: Rdn,
    pub delete_old_rdn: bool,
    pub new_superior: Option<Dn>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ModDnResponse(pub LdapResult);

#[derive(Clone, Debug, PartialEq)]
pub struct CompareRequest {
    pub entry: Dn,
    pub attr_desc: String,
    pub assertion_value: AttrValue,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CompareResponse(pub LdapResult);

#[derive(Clone, Debug, PartialEq)]
pub struct AbandonRequest {
    /// Id of the message to abandon; must be positive.
    pub id: i32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExtendedRequest {
    /// Dotted-decimal OID.
    pub name: String,
    pub value: Option<Vec<u8>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ExtendedResponse {
    pub result: LdapResult,
    pub name: Option<String>,
    pub value: Option<Vec<u8>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IntermediateResponse {
    pub name: Option<String>,
    pub value: Option<Vec<u8>>,
}
