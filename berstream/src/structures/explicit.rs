use super::{ASNTag, Tag};
use crate::common::TagClass;
use crate::structure;
use crate::universal;

/// A tag wrapping an inner tag in a constructed TLV of its own.
#[derive(Clone, Debug, PartialEq)]
pub struct ExplicitTag {
    pub id: u64,
    pub class: TagClass,
    pub inner: Box<Tag>,
}

impl ASNTag for ExplicitTag {
    fn into_structure(self) -> structure::StructureTag {
        structure::StructureTag {
            id: self.id,
            class: self.class,
            payload: structure::PL::C(vec![self.inner.into_structure()]),
        }
    }
}

impl Default for ExplicitTag {
    fn default() -> Self {
        ExplicitTag {
            id: universal::Types::Sequence as u64,
            class: TagClass::Universal,
            inner: Box::new(Tag::Null(super::Null::default())),
        }
    }
}
