//! A streaming ASN.1 BER codec.
//!
//! The crate provides the three layers a wire protocol built on BER needs:
//!
//! * a TLV object model ([`structure::StructureTag`]) together with builder
//!   types ([`structures::Tag`]) for constructing trees to be encoded;
//! * a resumable decoder ([`decoder::BerDecoder`]) which accepts a byte
//!   stream split at arbitrary boundaries and yields one complete top-level
//!   TLV per PDU, enforcing a configurable PDU size bound;
//! * two encoders: [`write::encode_into`], which pre-computes lengths and
//!   writes head-first, and [`rwrite::encode_rev`], which writes tail-first
//!   into a buffer growing at the head and therefore needs no length
//!   pre-computation. Both produce identical bytes for the same tree.
//!
//! Only definite-length encodings are supported; the indefinite form is
//! rejected, as are high-tag-number headers, neither of which occurs in
//! protocols like LDAP.

pub mod common;
pub mod decoder;
pub mod error;
pub mod parse;
pub mod rwrite;
pub mod structure;
pub mod structures;
pub mod universal;
pub mod write;

pub use decoder::{BerDecoder, DecoderState, Feed};
pub use error::BerError;
