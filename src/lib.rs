//! A pure-Rust LDAPv3 wire-protocol codec.
//!
//! The crate decodes and encodes the full set of RFC 4511 messages over the
//! streaming BER layer of the companion [`berstream`] crate, together with
//! the value codecs of widely deployed controls and extended operations,
//! text parsers for DNs (RFC 4514), search filters (RFC 4515) and LDAP URLs
//! (RFC 4516), an RFC 2849 LDIF reader/writer with a change-record
//! revertor, and a converter from OpenLDAP-style schema definitions to
//! their meta-schema LDIF projection.
//!
//! ## Decoding
//!
//! One [`LdapCodec`] serves one logical connection. Feed it byte slices as
//! they arrive from the transport; each call yields at most one complete
//! message, and `Ok(None)` asks for more input:
//!
//! ```no_run
//! use ldapcodec::LdapCodec;
//!
//! # fn recv() -> Vec<u8> { Vec::new() }
//! # fn main() -> Result<(), ldapcodec::DecodeError> {
//! let mut codec = LdapCodec::new();
//! loop {
//!     let chunk = recv();
//!     let mut input: &[u8] = &chunk;
//!     // a chunk may complete several PDUs; drain with empty feeds
//!     while let Some(msg) = codec.decode(input)? {
//!         input = &[];
//!         println!("message {} received", msg.id);
//!     }
//!     # break;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Decode failures follow three taxonomies (see [`DecodeError`]): fatal
//! framing errors, semantic request errors carrying a ready-to-send
//! skeleton response, and response content errors tagged with the message
//! id.
//!
//! ## Encoding
//!
//! [`encode_forward`] and [`encode_reverse`] serialize a message through
//! the length-precomputing and the tail-first encoder respectively; their
//! output is byte-identical.
//!
//! The codec performs no I/O, never blocks, and holds no state shared
//! between connections apart from the read-mostly OID registries.

pub mod codec;
pub mod controls_impl;
pub mod dn;
pub mod entry;
pub mod error;
pub mod exop_impl;
pub mod filter;
pub mod ldif;
pub mod message;
pub mod result;
pub mod schema;
pub mod url;

mod grammar;

pub use codec::{decode_message, encode_forward, encode_reverse, LdapCodec};
pub use controls_impl::{register_control_factory, Control, ControlValue, RawControl};
pub use dn::{Ava, Dn, DnParseError, Rdn};
pub use entry::{AttrValue, Attribute, Entry};
pub use error::{DecodeError, EncodeError};
pub use exop_impl::register_extended_factory;
pub use filter::{Filter, FilterParseError};
pub use message::{LdapMessage, ProtocolOp};
pub use result::{LdapResult, ResultCode};
pub use url::{LdapUrl, UrlParseError};

pub use berstream;
