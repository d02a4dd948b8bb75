//! Builder types for TLV trees destined for the encoders.

use crate::structure;

pub mod boolean;
pub mod explicit;
pub mod integer;
pub mod null;
pub mod octetstring;
pub mod sequence;

pub use self::boolean::Boolean;
pub use self::explicit::ExplicitTag;
pub use self::integer::{Enumerated, Integer};
pub use self::null::Null;
pub use self::octetstring::OctetString;
pub use self::sequence::{Sequence, Set};

pub trait ASNTag {
    /// Encode yourself into a generic Tag format.
    ///
    /// The only thing that changes between types is how to encode the value
    /// they wrap into bytes, however the encoding of the class and id does
    /// not change. By first converting the tag into a more generic tag (with
    /// already encoded payload), we don't have to reimplement the encoding
    /// step for class & id every time.
    fn into_structure(self) -> structure::StructureTag;
}

/// This enum does not cover all ASN.1 types, only those needed for LDAPv3.
#[derive(Clone, Debug, PartialEq)]
pub enum Tag {
    Integer(integer::Integer),
    Enumerated(integer::Enumerated),
    Sequence(sequence::Sequence),
    Set(sequence::Set),
    OctetString(octetstring::OctetString),
    Boolean(boolean::Boolean),
    Null(null::Null),
    ExplicitTag(explicit::ExplicitTag),
    StructureTag(structure::StructureTag),
}

impl ASNTag for Tag {
    fn into_structure(self) -> structure::StructureTag {
        match self {
            Tag::Integer(i) => i.into_structure(),
            Tag::Enumerated(i) => i.into_structure(),
            Tag::Sequence(i) => i.into_structure(),
            Tag::Set(i) => i.into_structure(),
            Tag::OctetString(i) => i.into_structure(),
            Tag::Boolean(i) => i.into_structure(),
            Tag::Null(i) => i.into_structure(),
            Tag::ExplicitTag(i) => i.into_structure(),
            Tag::StructureTag(s) => s,
        }
    }
}
