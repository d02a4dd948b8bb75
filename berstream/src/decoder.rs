//! Resumable, bounded TLV stream decoder.
//!
//! [`BerDecoder`] accepts byte slices split at arbitrary boundaries and
//! materializes one [`StructureTag`] per complete top-level TLV. All partial
//! state (a half-read header, the tail of a long value, the stack of open
//! constructed frames) survives between feeds, so a transport can hand over
//! whatever it has whenever it has it.

use bytes::{Buf, BytesMut};

use crate::common::{TagClass, TagStructure};
use crate::error::BerError;
use crate::structure::{StructureTag, PL};

/// Default PDU size bound.
pub const DEFAULT_MAX_PDU_SIZE: usize = 16 * 1024 * 1024;

/// Externally observable decoder position.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecoderState {
    /// Waiting for the identifier octet of the next TLV.
    TagStart,
    /// Identifier read, waiting for the first length octet.
    LengthStart,
    /// Long-form length partially read.
    LengthPending,
    /// Header complete, value octets outstanding.
    ValuePending,
    /// A TLV has just closed; transient on the way back to `TagStart`.
    TlvComplete,
    /// A whole PDU has been emitted; the next feed starts a new one.
    PduDecoded,
}

/// Outcome of one [`BerDecoder::feed`] call.
#[derive(Debug, PartialEq)]
pub enum Feed {
    /// A complete top-level TLV. Unconsumed input stays buffered; feed an
    /// empty slice to drain back-to-back PDUs.
    Pdu(StructureTag),
    NeedMore,
}

struct Frame {
    class: TagClass,
    id: u64,
    remaining: usize,
    children: Vec<StructureTag>,
}

struct Header {
    class: TagClass,
    structure: TagStructure,
    id: u64,
    /// Identifier plus length octets consumed so far.
    hdr_len: usize,
}

pub struct BerDecoder {
    buf: BytesMut,
    state: DecoderState,
    max_pdu_size: usize,
    stack: Vec<Frame>,
    cur: Option<Header>,
    len_needed: usize,
    len_acc: u64,
    value: Vec<u8>,
    value_needed: usize,
    err: Option<BerError>,
}

impl Default for BerDecoder {
    fn default() -> Self {
        BerDecoder::new()
    }
}

impl BerDecoder {
    pub fn new() -> BerDecoder {
        BerDecoder::with_max_pdu_size(DEFAULT_MAX_PDU_SIZE)
    }

    pub fn with_max_pdu_size(max_pdu_size: usize) -> BerDecoder {
        BerDecoder {
            buf: BytesMut::new(),
            state: DecoderState::TagStart,
            max_pdu_size,
            stack: Vec::new(),
            cur: None,
            len_needed: 0,
            len_acc: 0,
            value: Vec::new(),
            value_needed: 0,
            err: None,
        }
    }

    pub fn set_max_pdu_size(&mut self, max_pdu_size: usize) {
        self.max_pdu_size = max_pdu_size;
    }

    pub fn max_pdu_size(&self) -> usize {
        self.max_pdu_size
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    /// Content bytes still expected by the innermost open constructed frame.
    pub fn open_frame_remaining(&self) -> Option<usize> {
        self.stack.last().map(|f| f.remaining)
    }

    /// Feed more input. Returns at most one PDU per call.
    pub fn feed(&mut self, input: &[u8]) -> Result<Feed, BerError> {
        if let Some(ref e) = self.err {
            return Err(e.clone());
        }
        self.buf.extend_from_slice(input);
        match self.run() {
            Ok(feed) => Ok(feed),
            Err(e) => {
                self.err = Some(e.clone());
                Err(e)
            }
        }
    }

    /// Signal end of stream. An error if a PDU is still in flight.
    pub fn finish(&self) -> Result<(), BerError> {
        match self.state {
            DecoderState::TagStart | DecoderState::PduDecoded if self.buf.is_empty() => Ok(()),
            _ => Err(BerError::TruncatedFinal),
        }
    }

    fn run(&mut self) -> Result<Feed, BerError> {
        loop {
            match self.state {
                DecoderState::PduDecoded | DecoderState::TlvComplete => {
                    self.state = DecoderState::TagStart;
                }
                DecoderState::TagStart => {
                    if self.buf.is_empty() {
                        return Ok(Feed::NeedMore);
                    }
                    let octet = self.buf.get_u8();
                    let class = TagClass::from_u8(octet >> 6).expect("two bits");
                    let structure = TagStructure::from_u8((octet >> 5) & 0x01).expect("one bit");
                    let id = (octet & 0x1F) as u64;
                    if id == 0x1F {
                        // high-tag-number form
                        return Err(BerError::BadTag);
                    }
                    self.cur = Some(Header {
                        class,
                        structure,
                        id,
                        hdr_len: 1,
                    });
                    self.state = DecoderState::LengthStart;
                }
                DecoderState::LengthStart => {
                    if self.buf.is_empty() {
                        return Ok(Feed::NeedMore);
                    }
                    let octet = self.buf.get_u8();
                    self.cur.as_mut().expect("header").hdr_len += 1;
                    if octet & 0x80 == 0 {
                        if let Some(pdu) = self.header_done(octet as u64)? {
                            return Ok(Feed::Pdu(pdu));
                        }
                    } else {
                        let count = (octet & 0x7F) as usize;
                        if count == 0 || count > crate::parse::MAX_LENGTH_OCTETS {
                            return Err(BerError::BadLength);
                        }
                        self.len_needed = count;
                        self.len_acc = 0;
                        self.state = DecoderState::LengthPending;
                    }
                }
                DecoderState::LengthPending => {
                    while self.len_needed > 0 && !self.buf.is_empty() {
                        self.len_acc = (self.len_acc << 8) | self.buf.get_u8() as u64;
                        self.len_needed -= 1;
                        self.cur.as_mut().expect("header").hdr_len += 1;
                    }
                    if self.len_needed > 0 {
                        return Ok(Feed::NeedMore);
                    }
                    let len = self.len_acc;
                    if let Some(pdu) = self.header_done(len)? {
                        return Ok(Feed::Pdu(pdu));
                    }
                }
                DecoderState::ValuePending => {
                    let take = self.value_needed.min(self.buf.len());
                    self.value.extend_from_slice(&self.buf[..take]);
                    self.buf.advance(take);
                    self.value_needed -= take;
                    if self.value_needed > 0 {
                        return Ok(Feed::NeedMore);
                    }
                    let hdr = self.cur.take().expect("header");
                    let tag = StructureTag {
                        class: hdr.class,
                        id: hdr.id,
                        payload: PL::P(std::mem::take(&mut self.value)),
                    };
                    if let Some(pdu) = self.tlv_done(tag)? {
                        return Ok(Feed::Pdu(pdu));
                    }
                }
            }
        }
    }

    /// Header (tag + length) fully read; validate bounds and set up value
    /// or frame bookkeeping. Returns a PDU if a zero-length TLV closed it.
    fn header_done(&mut self, len: u64) -> Result<Option<StructureTag>, BerError> {
        let len = usize::try_from(len).map_err(|_| BerError::BadLength)?;
        let (structure, hdr_len) = {
            let hdr = self.cur.as_ref().expect("header");
            (hdr.structure, hdr.hdr_len)
        };
        if self.stack.is_empty() {
            if len > self.max_pdu_size {
                return Err(BerError::PduTooLarge {
                    declared: len,
                    limit: self.max_pdu_size,
                });
            }
        } else {
            let total = hdr_len + len;
            let parent = self.stack.last_mut().expect("frame");
            if total > parent.remaining {
                return Err(BerError::LengthExceedsFrame);
            }
            parent.remaining -= total;
        }
        match structure {
            TagStructure::Constructed => {
                let hdr = self.cur.take().expect("header");
                self.stack.push(Frame {
                    class: hdr.class,
                    id: hdr.id,
                    remaining: len,
                    children: Vec::new(),
                });
                if len == 0 {
                    return self.close_frames();
                }
                self.state = DecoderState::TagStart;
            }
            TagStructure::Primitive => {
                if len == 0 {
                    let hdr = self.cur.take().expect("header");
                    let tag = StructureTag {
                        class: hdr.class,
                        id: hdr.id,
                        payload: PL::P(Vec::new()),
                    };
                    return self.tlv_done(tag);
                }
                self.value = Vec::with_capacity(len.min(self.max_pdu_size));
                self.value_needed = len;
                self.state = DecoderState::ValuePending;
            }
        }
        Ok(None)
    }

    /// A primitive TLV closed; attach it and close any satisfied frames.
    fn tlv_done(&mut self, tag: StructureTag) -> Result<Option<StructureTag>, BerError> {
        match self.stack.last_mut() {
            None => {
                self.state = DecoderState::PduDecoded;
                Ok(Some(tag))
            }
            Some(parent) => {
                parent.children.push(tag);
                self.close_frames()
            }
        }
    }

    /// Pop every open frame whose content is fully accounted for.
    fn close_frames(&mut self) -> Result<Option<StructureTag>, BerError> {
        while matches!(self.stack.last(), Some(f) if f.remaining == 0) {
            let frame = self.stack.pop().expect("frame");
            let tag = StructureTag {
                class: frame.class,
                id: frame.id,
                payload: PL::C(frame.children),
            };
            match self.stack.last_mut() {
                None => {
                    self.state = DecoderState::PduDecoded;
                    return Ok(Some(tag));
                }
                Some(parent) => parent.children.push(tag),
            }
        }
        self.state = DecoderState::TlvComplete;
        Ok(None)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::common::TagClass;

    fn seq(children: Vec<StructureTag>) -> StructureTag {
        StructureTag {
            class: TagClass::Universal,
            id: 16,
            payload: PL::C(children),
        }
    }

    fn octets(bytes: &[u8]) -> StructureTag {
        StructureTag {
            class: TagClass::Universal,
            id: 4,
            payload: PL::P(bytes.to_vec()),
        }
    }

    #[test]
    fn whole_pdu_single_feed() {
        let mut dec = BerDecoder::new();
        let input = [0x30, 0x05, 0x04, 0x03, b'a', b'b', b'c'];
        match dec.feed(&input).expect("feed") {
            Feed::Pdu(tag) => assert_eq!(tag, seq(vec![octets(b"abc")])),
            Feed::NeedMore => panic!("expected PDU"),
        }
        assert_eq!(dec.state(), DecoderState::PduDecoded);
        assert!(dec.finish().is_ok());
    }

    #[test]
    fn split_at_every_boundary() {
        let input = [0x30, 0x05, 0x04, 0x03, b'a', b'b', b'c'];
        let whole = match BerDecoder::new().feed(&input).expect("feed") {
            Feed::Pdu(tag) => tag,
            Feed::NeedMore => panic!("expected PDU"),
        };
        for cut in 0..=input.len() {
            let mut dec = BerDecoder::new();
            let first = dec.feed(&input[..cut]).expect("first feed");
            let got = match first {
                Feed::Pdu(tag) => {
                    assert_eq!(cut, input.len());
                    tag
                }
                Feed::NeedMore => match dec.feed(&input[cut..]).expect("second feed") {
                    Feed::Pdu(tag) => tag,
                    Feed::NeedMore => panic!("expected PDU after second feed"),
                },
            };
            assert_eq!(got, whole);
        }
    }

    #[test]
    fn long_form_length_pending() {
        let mut dec = BerDecoder::new();
        assert_eq!(dec.feed(&[0x30, 0x82, 0x01]).expect("feed"), Feed::NeedMore);
        assert_eq!(dec.state(), DecoderState::LengthPending);
        assert_eq!(dec.feed(&[0x80]).expect("feed"), Feed::NeedMore);
        assert_eq!(dec.open_frame_remaining(), Some(0x0180));
    }

    #[test]
    fn back_to_back_pdus() {
        let mut dec = BerDecoder::new();
        let input = [0x04, 0x01, b'x', 0x04, 0x01, b'y'];
        match dec.feed(&input).expect("feed") {
            Feed::Pdu(tag) => assert_eq!(tag, octets(b"x")),
            Feed::NeedMore => panic!("expected first PDU"),
        }
        match dec.feed(&[]).expect("feed") {
            Feed::Pdu(tag) => assert_eq!(tag, octets(b"y")),
            Feed::NeedMore => panic!("expected second PDU"),
        }
    }

    #[test]
    fn pdu_too_large_before_value() {
        let mut dec = BerDecoder::with_max_pdu_size(1024);
        let err = dec.feed(&[0x30, 0x82, 0x04, 0x01]).expect_err("too large");
        assert_eq!(
            err,
            BerError::PduTooLarge {
                declared: 0x0401,
                limit: 1024
            }
        );
        // the decoder stays poisoned
        assert!(dec.feed(&[0x00]).is_err());
    }

    #[test]
    fn child_overruns_frame() {
        // outer SEQUENCE claims 4 content bytes, inner OCTET STRING claims 5
        let err = BerDecoder::new()
            .feed(&[0x30, 0x04, 0x04, 0x05])
            .expect_err("overrun");
        assert_eq!(err, BerError::LengthExceedsFrame);
    }

    #[test]
    fn child_underruns_frame() {
        // outer SEQUENCE claims 5 content bytes but a 4-byte child leaves a
        // single spare byte no further TLV can occupy
        let err = BerDecoder::new()
            .feed(&[0x30, 0x05, 0x04, 0x02, b'a', b'b', 0x04, 0x00])
            .expect_err("underrun");
        assert_eq!(err, BerError::LengthExceedsFrame);
    }

    #[test]
    fn truncated_final() {
        let mut dec = BerDecoder::new();
        assert_eq!(dec.feed(&[0x30, 0x05, 0x04]).expect("feed"), Feed::NeedMore);
        assert_eq!(dec.finish(), Err(BerError::TruncatedFinal));
    }

    #[test]
    fn empty_constructed() {
        let mut dec = BerDecoder::new();
        match dec.feed(&[0x30, 0x00]).expect("feed") {
            Feed::Pdu(tag) => assert_eq!(tag, seq(vec![])),
            Feed::NeedMore => panic!("expected PDU"),
        }
    }
}
