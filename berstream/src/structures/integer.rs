use super::ASNTag;
use crate::common::TagClass;
use crate::structure;
use crate::universal;

use byteorder::{BigEndian, WriteBytesExt};

/// Integer value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Integer {
    pub id: u64,
    pub class: TagClass,
    pub inner: i64,
}

/// Integer with a different tag.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Enumerated {
    pub id: u64,
    pub class: TagClass,
    pub inner: i64,
}

fn i_e_into_structure(id: u64, class: TagClass, inner: i64) -> structure::StructureTag {
    // Smallest two's-complement width: the bits shifted out must all equal
    // the sign bit.
    let mut count = 1usize;
    while count < 8 {
        let shifted = inner >> (8 * count - 1);
        if shifted == 0 || shifted == -1 {
            break;
        }
        count += 1;
    }

    let mut out: Vec<u8> = Vec::with_capacity(count);
    out.write_int::<BigEndian>(inner, count)
        .expect("integer in range");

    structure::StructureTag {
        id,
        class,
        payload: structure::PL::P(out),
    }
}

impl ASNTag for Integer {
    fn into_structure(self) -> structure::StructureTag {
        i_e_into_structure(self.id, self.class, self.inner)
    }
}

impl ASNTag for Enumerated {
    fn into_structure(self) -> structure::StructureTag {
        i_e_into_structure(self.id, self.class, self.inner)
    }
}

impl Default for Integer {
    fn default() -> Integer {
        Integer {
            id: universal::Types::Integer as u64,
            class: TagClass::Universal,
            inner: 0i64,
        }
    }
}

impl Default for Enumerated {
    fn default() -> Enumerated {
        Enumerated {
            id: universal::Types::Enumerated as u64,
            class: TagClass::Universal,
            inner: 0i64,
        }
    }
}

#[cfg(test)]
mod test {
    use super::i_e_into_structure;

    use crate::common::TagClass;
    use crate::structure;

    #[test]
    fn test_not_unnecessary_octets() {
        // 127 can be encoded into 8 bits
        let result = i_e_into_structure(2, TagClass::Universal, 127);
        let correct = structure::PL::P(vec![127]);
        assert_eq!(result.payload, correct);
    }

    #[test]
    fn test_not_positive_getting_negative() {
        // 128 cannot be encoded into an 8 bit signed number
        let result = i_e_into_structure(2, TagClass::Universal, 128);
        let correct = structure::PL::P(vec![0, 128]);
        assert_eq!(result.payload, correct);
    }

    #[test]
    fn test_multi_octet() {
        let result = i_e_into_structure(2, TagClass::Universal, 0x0180);
        let correct = structure::PL::P(vec![0x01, 0x80]);
        assert_eq!(result.payload, correct);
    }
}
