//! Reverse (tail-first) encoder.
//!
//! The serialization of a TLV ends with its value, which is known before its
//! length. Writing the output back-to-front therefore needs no length
//! pre-computation: a node's children are emitted last-child-first, and once
//! they are in the buffer the byte count between the current cursor and the
//! node's end position is exactly the content length to prepend.

use bytes::BytesMut;

use crate::structure::{StructureTag, PL};

/// A byte buffer that grows at the head.
///
/// Data lives in the tail of the allocation; `prepend` moves the cursor
/// toward index 0, reallocating with the existing content shifted to the
/// new tail when the headroom runs out.
pub struct TailBuf {
    buf: Vec<u8>,
    head: usize,
}

impl TailBuf {
    pub fn with_capacity(capacity: usize) -> TailBuf {
        let capacity = capacity.max(16);
        TailBuf {
            buf: vec![0; capacity],
            head: capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len() - self.head
    }

    pub fn is_empty(&self) -> bool {
        self.head == self.buf.len()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf[self.head..]
    }

    fn grow(&mut self, at_least: usize) {
        let used = self.len();
        let new_cap = (self.buf.len() * 2).max(used + at_least);
        let mut new_buf = vec![0; new_cap];
        let new_head = new_cap - used;
        new_buf[new_head..].copy_from_slice(&self.buf[self.head..]);
        self.buf = new_buf;
        self.head = new_head;
    }

    pub fn prepend(&mut self, bytes: &[u8]) {
        if self.head < bytes.len() {
            self.grow(bytes.len());
        }
        self.head -= bytes.len();
        self.buf[self.head..self.head + bytes.len()].copy_from_slice(bytes);
    }

    pub fn push_front(&mut self, byte: u8) {
        if self.head == 0 {
            self.grow(1);
        }
        self.head -= 1;
        self.buf[self.head] = byte;
    }
}

/// Serialize `tag` tail-first and return the contiguous output.
pub fn encode_rev(tag: &StructureTag) -> BytesMut {
    let mut tb = TailBuf::with_capacity(256);
    write_rev(&mut tb, tag);
    BytesMut::from(tb.as_slice())
}

fn write_rev(tb: &mut TailBuf, tag: &StructureTag) {
    let end = tb.len();
    let constructed = match tag.payload {
        PL::P(ref bytes) => {
            tb.prepend(bytes);
            0u8
        }
        PL::C(ref children) => {
            for child in children.iter().rev() {
                write_rev(tb, child);
            }
            1u8
        }
    };
    let content = tb.len() - end;
    prepend_length(tb, content);
    tb.push_front(((tag.class as u8) << 6) | (constructed << 5) | tag.id as u8);
}

fn prepend_length(tb: &mut TailBuf, len: usize) {
    if len < 128 {
        tb.push_front(len as u8);
        return;
    }
    let mut octets = 0u8;
    let mut rem = len;
    while rem > 0 {
        tb.push_front(rem as u8);
        rem >>= 8;
        octets += 1;
    }
    tb.push_front(0x80 | octets);
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::common::TagClass;
    use crate::write::encode_into;

    fn sample() -> StructureTag {
        StructureTag {
            class: TagClass::Universal,
            id: 16,
            payload: PL::C(vec![
                StructureTag {
                    class: TagClass::Universal,
                    id: 2,
                    payload: PL::P(vec![0x01]),
                },
                StructureTag {
                    class: TagClass::Application,
                    id: 0,
                    payload: PL::C(vec![StructureTag {
                        class: TagClass::Context,
                        id: 0,
                        payload: PL::P(vec![0xAB; 200]),
                    }]),
                },
            ]),
        }
    }

    #[test]
    fn matches_forward_encoder() {
        let tag = sample();
        let mut fwd = BytesMut::new();
        encode_into(&mut fwd, &tag);
        let rev = encode_rev(&tag);
        assert_eq!(&fwd[..], &rev[..]);
    }

    #[test]
    fn grows_at_head() {
        let mut tb = TailBuf::with_capacity(16);
        for chunk in 0..100 {
            tb.prepend(&[chunk as u8; 7]);
        }
        assert_eq!(tb.len(), 700);
        assert_eq!(&tb.as_slice()[..7], &[99; 7]);
    }

    #[test]
    fn empty_value() {
        let tag = StructureTag {
            class: TagClass::Universal,
            id: 5,
            payload: PL::P(Vec::new()),
        };
        assert_eq!(&encode_rev(&tag)[..], &[0x05, 0x00]);
    }
}
