//! End-to-end wire scenarios: literal PDUs in, decoded messages out, and
//! byte-exact re-encoding through both encoders.

use hex_literal::hex;

use ldapcodec::berstream::common::TagClass;
use ldapcodec::berstream::structures::{ASNTag, Integer, OctetString, Sequence, Set, Tag};
use ldapcodec::codec::{decode_message, encode_forward, encode_reverse, LdapCodec};
use ldapcodec::controls_impl::{Control, ControlValue, SortKey, SortRequest, SortResponse};
use ldapcodec::entry::Entry;
use ldapcodec::filter::Filter;
use ldapcodec::message::*;
use ldapcodec::result::ResultCode;
use ldapcodec::{DecodeError, LdapMessage};

fn dn(s: &str) -> ldapcodec::Dn {
    s.parse().expect("dn")
}

fn decode_one(bytes: &[u8]) -> LdapMessage {
    let mut codec = LdapCodec::new();
    codec
        .decode(bytes)
        .expect("decode")
        .expect("complete message")
}

/// Both encoders must agree; returns the bytes.
fn encode_both(msg: &LdapMessage) -> Vec<u8> {
    let fwd = encode_forward(msg).expect("forward encode");
    let rev = encode_reverse(msg).expect("reverse encode");
    assert_eq!(&fwd[..], &rev[..], "forward and reverse encoders disagree");
    fwd.to_vec()
}

const BIND_V3_SIMPLE: [u8; 0x35] = hex!(
    "30 33 02 01 01
     60 2e
     02 01 03
     04 1f 75 69 64 3d 61 6b 61 72 61 73 75 6c 75 2c
           64 63 3d 65 78 61 6d 70 6c 65 2c 64 63 3d 63 6f 6d
     80 08 70 61 73 73 77 6f 72 64"
);

#[test]
fn bind_request_v3_simple() {
    let msg = decode_one(&BIND_V3_SIMPLE);
    assert_eq!(msg.id, 1);
    assert!(msg.controls.is_empty());
    match &msg.op {
        ProtocolOp::BindRequest(req) => {
            assert_eq!(req.version, 3);
            assert_eq!(req.name.to_string(), "uid=akarasulu,dc=example,dc=com");
            assert_eq!(req.auth, AuthChoice::Simple(b"password".to_vec()));
        }
        other => panic!("unexpected op: {:?}", other),
    }
    assert_eq!(encode_both(&msg), &BIND_V3_SIMPLE[..]);
}

#[test]
fn bind_request_split_feed() {
    let whole = decode_one(&BIND_V3_SIMPLE);
    // the specified split: 16 bytes, then the remaining 37
    let mut codec = LdapCodec::new();
    assert!(codec.decode(&BIND_V3_SIMPLE[..16]).expect("first feed").is_none());
    let msg = codec
        .decode(&BIND_V3_SIMPLE[16..])
        .expect("second feed")
        .expect("complete message");
    assert_eq!(msg, whole);
    // and every other single split point
    for cut in 0..BIND_V3_SIMPLE.len() {
        let mut codec = LdapCodec::new();
        let first = codec.decode(&BIND_V3_SIMPLE[..cut]).expect("first feed");
        let msg = match first {
            Some(msg) => msg,
            None => codec
                .decode(&BIND_V3_SIMPLE[cut..])
                .expect("second feed")
                .expect("complete message"),
        };
        assert_eq!(msg, whole, "split at {} diverged", cut);
    }
}

#[test]
fn bind_version_2_is_response_carrying() {
    let mut bytes = BIND_V3_SIMPLE;
    bytes[9] = 0x02; // version octet
    let mut codec = LdapCodec::new();
    match codec.decode(&bytes) {
        Err(DecodeError::RequestError {
            id,
            code,
            response,
            ..
        }) => {
            assert_eq!(id, 1);
            assert_eq!(code, ResultCode::ProtocolError);
            match response.op {
                ProtocolOp::BindResponse(ref resp) => {
                    assert_eq!(resp.result.result_code, ResultCode::ProtocolError)
                }
                ref other => panic!("unexpected skeleton: {:?}", other),
            }
        }
        other => panic!("expected response-carrying error, got {:?}", other),
    }
}

fn add_request_fixture() -> LdapMessage {
    let mut entry = Entry::new("cn=testModify,ou=users,ou=system".parse().expect("dn"));
    entry.add("l", ["Paris"]);
    entry.add("attrs", ["test1", "test2", "test3"]);
    LdapMessage::new(1, ProtocolOp::AddRequest(AddRequest { entry }))
}

#[test]
fn add_request_two_attributes() {
    let msg = add_request_fixture();
    let bytes = encode_both(&msg);
    assert_eq!(bytes.len(), 0x59);
    let back = decode_one(&bytes);
    match &back.op {
        ProtocolOp::AddRequest(req) => {
            assert_eq!(req.entry.len(), 2);
            assert_eq!(req.entry.get("attrs").expect("attrs").len(), 3);
        }
        other => panic!("unexpected op: {:?}", other),
    }
    assert_eq!(back, msg);
}

#[test]
fn add_request_malformed_dn() {
    // DN uses a colon instead of '='
    let op = Tag::Sequence(Sequence {
        class: TagClass::Application,
        id: 8,
        inner: vec![
            Tag::OctetString(OctetString {
                inner: b"cn:testModify,ou=users,ou=system".to_vec(),
                ..Default::default()
            }),
            Tag::Sequence(Sequence {
                inner: vec![Tag::Sequence(Sequence {
                    inner: vec![
                        Tag::OctetString(OctetString {
                            inner: b"l".to_vec(),
                            ..Default::default()
                        }),
                        Tag::Set(Set {
                            inner: vec![Tag::OctetString(OctetString {
                                inner: b"Paris".to_vec(),
                                ..Default::default()
                            })],
                            ..Default::default()
                        }),
                    ],
                    ..Default::default()
                })],
                ..Default::default()
            }),
        ],
    });
    let envelope = Tag::Sequence(Sequence {
        inner: vec![
            Tag::Integer(Integer {
                inner: 7,
                ..Default::default()
            }),
            op,
        ],
        ..Default::default()
    })
    .into_structure();
    match decode_message(envelope) {
        Err(DecodeError::RequestError {
            id,
            code,
            response,
            ..
        }) => {
            assert_eq!(id, 7);
            assert_eq!(code, ResultCode::InvalidDnSyntax);
            match response.op {
                ProtocolOp::AddResponse(ref resp) => {
                    assert_eq!(resp.0.result_code, ResultCode::InvalidDnSyntax)
                }
                ref other => panic!("unexpected skeleton: {:?}", other),
            }
        }
        other => panic!("expected response-carrying error, got {:?}", other),
    }
}

#[test]
fn add_request_empty_body_is_fatal() {
    let mut codec = LdapCodec::new();
    match codec.decode(&hex!("30 05 02 01 01 68 00")) {
        Err(DecodeError::Protocol(_)) => {}
        other => panic!("expected fatal protocol error, got {:?}", other),
    }
}

#[test]
fn zero_length_matched_dn() {
    // BindResponse, success, empty matched DN and diagnostic
    let bytes = hex!("30 0c 02 01 01 61 07 0a 01 00 04 00 04 00");
    let msg = decode_one(&bytes);
    match &msg.op {
        ProtocolOp::BindResponse(resp) => {
            assert!(resp.result.matched_dn.is_empty());
            assert!(resp.result.is_success());
        }
        other => panic!("unexpected op: {:?}", other),
    }
    assert_eq!(encode_both(&msg), &bytes[..]);
}

#[test]
fn search_result_entry_value_order_is_irrelevant() {
    let mut entry = Entry::new("cn=two,ou=system".parse().expect("dn"));
    entry.add("objectClass", ["top", "person"]);
    entry.add("cn", ["two", "deux"]);
    let msg = LdapMessage::new(
        2,
        ProtocolOp::SearchResultEntry(SearchResultEntry { entry }),
    );
    let back = decode_one(&encode_both(&msg));

    let mut shuffled = Entry::new("cn=two,ou=system".parse().expect("dn"));
    shuffled.add("cn", ["deux", "two"]);
    shuffled.add("objectClass", ["person", "top"]);
    let expect = LdapMessage::new(
        2,
        ProtocolOp::SearchResultEntry(SearchResultEntry { entry: shuffled }),
    );
    assert_eq!(back, expect);
}

#[test]
fn extensible_match_filter_roundtrip() {
    let filter = Filter::parse("(cn:dn:1.2.840.48018.1.2.2:=aok)").expect("filter");
    let msg = LdapMessage::new(
        3,
        ProtocolOp::SearchRequest(SearchRequest {
            base: "ou=system".parse().expect("dn"),
            scope: SearchScope::WholeSubtree,
            deref_aliases: DerefAliases::DerefAlways,
            size_limit: 0,
            time_limit: 0,
            types_only: false,
            filter: filter.clone(),
            attributes: vec!["attr0".into(), "attr1".into(), "attr2".into()],
        }),
    );
    let bytes = encode_both(&msg);
    let back = decode_one(&bytes);
    match &back.op {
        ProtocolOp::SearchRequest(req) => {
            // the wire decoder and the text parser agree on the tree
            assert_eq!(req.filter, filter);
            assert_eq!(req.attributes, vec!["attr0", "attr1", "attr2"]);
        }
        other => panic!("unexpected op: {:?}", other),
    }
    assert_eq!(encode_both(&back), bytes);
}

#[test]
fn nested_filter_roundtrip() {
    for text in [
        "(&(objectClass=person)(|(cn=a*)(sn=*b))(!(uid>=100)))",
        "(cn=ab*cd*ef)",
        "(&)",
        "(cn~=close)",
    ] {
        let filter = Filter::parse(text).expect("filter");
        let msg = LdapMessage::new(
            4,
            ProtocolOp::SearchRequest(SearchRequest {
                base: "dc=example,dc=com".parse().expect("dn"),
                scope: SearchScope::SingleLevel,
                deref_aliases: DerefAliases::NeverDerefAliases,
                size_limit: 100,
                time_limit: 10,
                types_only: true,
                filter: filter.clone(),
                attributes: vec![],
            }),
        );
        let back = decode_one(&encode_both(&msg));
        assert_eq!(back, msg, "filter {} diverged", text);
    }
}

#[test]
fn sort_request_control_roundtrip() {
    let msg = LdapMessage::with_controls(
        5,
        ProtocolOp::SearchRequest(SearchRequest {
            base: "ou=people,dc=example,dc=com".parse().expect("dn"),
            scope: SearchScope::WholeSubtree,
            deref_aliases: DerefAliases::NeverDerefAliases,
            size_limit: 0,
            time_limit: 0,
            types_only: false,
            filter: Filter::present_object_class(),
            attributes: vec![],
        }),
        vec![Control::new(ControlValue::SortRequest(SortRequest {
            keys: vec![SortKey::ascending("cn"), SortKey::descending("sn")],
        }))],
    );
    let bytes = encode_both(&msg);
    let back = decode_one(&bytes);
    match &back.controls[0].value {
        ControlValue::SortRequest(req) => {
            assert_eq!(req.keys.len(), 2);
            assert_eq!(req.keys[0].attr_type, "cn");
            assert!(!req.keys[0].reverse_order);
            assert_eq!(req.keys[1].attr_type, "sn");
            assert!(req.keys[1].reverse_order);
        }
        other => panic!("unexpected control: {:?}", other),
    }
    assert_eq!(encode_both(&back), bytes);
}

#[test]
fn sort_response_control_roundtrip() {
    let msg = LdapMessage::with_controls(
        5,
        ProtocolOp::SearchResultDone(SearchResultDone(Default::default())),
        vec![Control::new(ControlValue::SortResponse(SortResponse {
            sort_result: 0,
            attr_type: Some("cn".to_owned()),
        }))],
    );
    let bytes = encode_both(&msg);
    let back = decode_one(&bytes);
    assert_eq!(back, msg);
    assert_eq!(encode_both(&back), bytes);
}

#[test]
fn unknown_control_is_preserved() {
    use ldapcodec::RawControl;
    let msg = LdapMessage::with_controls(
        9,
        ProtocolOp::DelRequest(DelRequest {
            dn: "cn=gone,ou=system".parse().expect("dn"),
        }),
        vec![Control::critical(ControlValue::Raw(RawControl {
            oid: "1.3.6.1.4.1.42.2.27.8.5.1".to_owned(),
            val: Some(vec![0x30, 0x03, 0x02, 0x01, 0x2A]),
        }))],
    );
    let back = decode_one(&encode_both(&msg));
    assert_eq!(back, msg);
    assert!(back.controls[0].crit);
}

#[test]
fn large_add_round_trips() {
    let mut entry = Entry::new("cn=big,ou=system".parse().expect("dn"));
    for i in 0..100_000 {
        entry.add(&format!("attr{}", i), [format!("value{}", i)]);
    }
    let msg = LdapMessage::new(1, ProtocolOp::AddRequest(AddRequest { entry }));
    let bytes = encode_reverse(&msg).expect("reverse encode");
    let mut codec = LdapCodec::with_max_pdu_size(64 * 1024 * 1024);
    let back = codec
        .decode(&bytes)
        .expect("decode")
        .expect("complete message");
    match &back.op {
        ProtocolOp::AddRequest(req) => assert_eq!(req.entry.len(), 100_000),
        other => panic!("unexpected op: {:?}", other),
    }
    assert_eq!(back, msg);
}

#[test]
fn pdu_too_large_is_fatal_before_content() {
    let mut codec = LdapCodec::with_max_pdu_size(1024);
    match codec.decode(&hex!("30 82 30 39")) {
        Err(DecodeError::Ber(ldapcodec::berstream::BerError::PduTooLarge {
            declared,
            limit,
        })) => {
            assert_eq!(declared, 0x3039);
            assert_eq!(limit, 1024);
        }
        other => panic!("expected PduTooLarge, got {:?}", other),
    }
}

#[test]
fn every_operation_roundtrips() {
    use ldapcodec::entry::{AttrValue, Attribute};
    let result = ldapcodec::LdapResult {
        result_code: ResultCode::Referral,
        matched_dn: "ou=system".parse().expect("dn"),
        diagnostic_message: "try elsewhere".to_owned(),
        referral: vec!["ldap://other.example.com/ou=system".to_owned()],
    };
    let ops = vec![
        ProtocolOp::BindRequest(BindRequest {
            version: 3,
            name: dn("cn=admin,ou=system"),
            auth: AuthChoice::Sasl {
                mechanism: "DIGEST-MD5".to_owned(),
                credentials: Some(b"challenge-response".to_vec()),
            },
        }),
        ProtocolOp::BindResponse(BindResponse {
            result: result.clone(),
            server_sasl_creds: Some(b"server-nonce".to_vec()),
        }),
        ProtocolOp::UnbindRequest,
        ProtocolOp::SearchResultReference(SearchResultReference {
            uris: vec!["ldap://h1/dc=x".to_owned(), "ldap://h2/dc=x".to_owned()],
        }),
        ProtocolOp::SearchResultDone(SearchResultDone(result.clone())),
        ProtocolOp::ModifyRequest(ModifyRequest {
            object: dn("cn=foo,ou=system"),
            changes: vec![
                Modification {
                    op: ModifyOperation::Replace,
                    attribute: Attribute::with_values("mail", ["a@example.com"]),
                },
                Modification {
                    op: ModifyOperation::Increment,
                    attribute: Attribute::with_values("uidNumber", ["3"]),
                },
                Modification {
                    op: ModifyOperation::Delete,
                    attribute: Attribute::new("description"),
                },
            ],
        }),
        ProtocolOp::ModifyResponse(ModifyResponse(result.clone())),
        ProtocolOp::AddResponse(AddResponse(result.clone())),
        ProtocolOp::DelRequest(DelRequest {
            dn: dn("cn=gone,ou=system"),
        }),
        ProtocolOp::DelResponse(DelResponse(result.clone())),
        ProtocolOp::ModDnRequest(ModDnRequest {
            entry: dn("cn=old,ou=system"),
            new_rdn: "cn=new".parse().expect("rdn"),
            delete_old_rdn: true,
            new_superior: Some(dn("ou=elsewhere,ou=system")),
        }),
        ProtocolOp::ModDnResponse(ModDnResponse(result.clone())),
        ProtocolOp::CompareRequest(CompareRequest {
            entry: dn("cn=foo,ou=system"),
            attr_desc: "cn".to_owned(),
            assertion_value: AttrValue::from("foo"),
        }),
        ProtocolOp::CompareResponse(CompareResponse(ldapcodec::LdapResult::new(
            ResultCode::CompareTrue,
        ))),
        ProtocolOp::AbandonRequest(AbandonRequest { id: 4 }),
        ProtocolOp::ExtendedRequest(ExtendedRequest {
            name: "1.3.6.1.4.1.4203.1.11.1".to_owned(),
            value: Some(vec![0x30, 0x00]),
        }),
        ProtocolOp::ExtendedResponse(ExtendedResponse {
            result: result.clone(),
            name: Some("1.3.6.1.4.1.4203.1.11.1".to_owned()),
            value: Some(vec![0x30, 0x00]),
        }),
        ProtocolOp::IntermediateResponse(IntermediateResponse {
            name: Some("1.3.6.1.4.1.4203.1.9.1.4".to_owned()),
            value: Some(b"sync info".to_vec()),
        }),
    ];
    for op in ops {
        let msg = LdapMessage::new(6, op);
        let back = decode_one(&encode_both(&msg));
        assert_eq!(back, msg);
    }
}

#[test]
fn back_to_back_pdus_drain() {
    let mut bytes = BIND_V3_SIMPLE.to_vec();
    bytes.extend_from_slice(&BIND_V3_SIMPLE);
    let mut codec = LdapCodec::new();
    let first = codec.decode(&bytes).expect("decode").expect("first");
    let second = codec.decode(&[]).expect("decode").expect("second");
    assert_eq!(first, second);
    assert!(codec.decode(&[]).expect("decode").is_none());
    assert!(codec.finish().is_ok());
}
