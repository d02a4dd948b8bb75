//! Forward (head-first) encoder.
//!
//! Lengths are computed in a first pass over the tree, then headers and
//! values are written in document order. The tail-first alternative in
//! [`crate::rwrite`] produces identical bytes without the first pass.

use bytes::{BufMut, BytesMut};

use crate::structure::{StructureTag, PL};

/// Serialized size of the length field for a content length of `len`.
pub fn len_of_len(len: usize) -> usize {
    if len < 128 {
        1
    } else {
        1 + length_octets(len)
    }
}

fn length_octets(len: usize) -> usize {
    let mut octets = 1;
    let mut rem = len >> 8;
    while rem > 0 {
        octets += 1;
        rem >>= 8;
    }
    octets
}

/// Total serialized size of a TLV, headers included.
pub fn encoded_len(tag: &StructureTag) -> usize {
    let content = content_len(tag);
    1 + len_of_len(content) + content
}

fn content_len(tag: &StructureTag) -> usize {
    match tag.payload {
        PL::P(ref bytes) => bytes.len(),
        PL::C(ref children) => children.iter().map(encoded_len).sum(),
    }
}

fn put_header(buf: &mut BytesMut, tag: &StructureTag, content: usize) {
    let constructed = matches!(tag.payload, PL::C(_)) as u8;
    buf.put_u8(((tag.class as u8) << 6) | (constructed << 5) | tag.id as u8);
    if content < 128 {
        buf.put_u8(content as u8);
    } else {
        let octets = length_octets(content);
        buf.put_u8(0x80 | octets as u8);
        for shift in (0..octets).rev() {
            buf.put_u8((content >> (8 * shift)) as u8);
        }
    }
}

/// Append the BER serialization of `tag` to `buf`.
pub fn encode_into(buf: &mut BytesMut, tag: &StructureTag) {
    buf.reserve(encoded_len(tag));
    encode_rec(buf, tag);
}

fn encode_rec(buf: &mut BytesMut, tag: &StructureTag) {
    put_header(buf, tag, content_len(tag));
    match tag.payload {
        PL::P(ref bytes) => buf.put_slice(bytes),
        PL::C(ref children) => {
            for child in children {
                encode_rec(buf, child);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::common::TagClass;
    use crate::parse::parse_tag;

    #[test]
    fn primitive_roundtrip() {
        let tag = StructureTag {
            class: TagClass::Universal,
            id: 4,
            payload: PL::P(b"hello".to_vec()),
        };
        let mut buf = BytesMut::new();
        encode_into(&mut buf, &tag);
        assert_eq!(&buf[..], &[0x04, 0x05, b'h', b'e', b'l', b'l', b'o']);
        let (rest, parsed) = parse_tag(&buf).expect("parse");
        assert!(rest.is_empty());
        assert_eq!(parsed, tag);
    }

    #[test]
    fn long_form_length() {
        let tag = StructureTag {
            class: TagClass::Universal,
            id: 4,
            payload: PL::P(vec![0xA5; 300]),
        };
        let mut buf = BytesMut::new();
        encode_into(&mut buf, &tag);
        assert_eq!(&buf[..4], &[0x04, 0x82, 0x01, 0x2C]);
        assert_eq!(buf.len(), 4 + 300);
    }

    #[test]
    fn nested_lengths_consistent() {
        let tag = StructureTag {
            class: TagClass::Universal,
            id: 16,
            payload: PL::C(vec![
                StructureTag {
                    class: TagClass::Universal,
                    id: 2,
                    payload: PL::P(vec![0x01]),
                },
                StructureTag {
                    class: TagClass::Context,
                    id: 0,
                    payload: PL::P(b"pw".to_vec()),
                },
            ]),
        };
        let mut buf = BytesMut::new();
        encode_into(&mut buf, &tag);
        assert_eq!(&buf[..], &[0x30, 0x07, 0x02, 0x01, 0x01, 0x80, 0x02, b'p', b'w']);
    }
}
