//! BER encode/decode for SNMPv1/v2c messages.
//!
//! Implements just the subset of ASN.1 BER that SNMP wire format uses:
//! definite-length SEQUENCE, INTEGER, OCTET STRING, NULL, OBJECT
//! IDENTIFIER, and the SNMP application/context tags for the network
//! management types and PDU/exception markers.

use bytes::{BufMut, BytesMut};

use super::oid::Oid;
use super::pdu::{Message, Pdu, PduKind, Version, VarBind};
use super::value::SnmpValue;
use crate::{Error, Result};

mod tag {
    pub const INTEGER: u8 = 0x02;
    pub const OCTET_STRING: u8 = 0x04;
    pub const NULL: u8 = 0x05;
    pub const OBJECT_IDENTIFIER: u8 = 0x06;
    pub const SEQUENCE: u8 = 0x30;

    pub const IP_ADDRESS: u8 = 0x40;
    pub const COUNTER32: u8 = 0x41;
    pub const GAUGE32: u8 = 0x42;
    pub const TIME_TICKS: u8 = 0x43;
    pub const OPAQUE: u8 = 0x44;
    pub const COUNTER64: u8 = 0x46;

    pub const NO_SUCH_OBJECT: u8 = 0x80;
    pub const NO_SUCH_INSTANCE: u8 = 0x81;
    pub const END_OF_MIB_VIEW: u8 = 0x82;

    pub const GET_REQUEST: u8 = 0xA0;
    pub const GET_NEXT_REQUEST: u8 = 0xA1;
    pub const GET_RESPONSE: u8 = 0xA2;
    pub const SET_REQUEST: u8 = 0xA3;
    pub const GET_BULK_REQUEST: u8 = 0xA5;
}

// ---------------------------------------------------------------- encode

fn encode_length(len: usize, out: &mut BytesMut) {
    if len < 128 {
        out.put_u8(len as u8);
        return;
    }
    let bytes = len.to_be_bytes();
    let first_nonzero = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len() - 1);
    let significant = &bytes[first_nonzero..];
    out.put_u8(0x80 | significant.len() as u8);
    out.put_slice(significant);
}

fn encode_tlv(tag: u8, content: &[u8], out: &mut BytesMut) {
    out.put_u8(tag);
    encode_length(content.len(), out);
    out.put_slice(content);
}

/// Minimal two's-complement big-endian encoding, as BER INTEGER requires.
fn encode_signed_content(n: i64) -> Vec<u8> {
    let bytes = n.to_be_bytes();
    let mut start = 0;
    while start < bytes.len() - 1 {
        let b = bytes[start];
        let next = bytes[start + 1];
        let redundant = (b == 0x00 && next & 0x80 == 0) || (b == 0xFF && next & 0x80 != 0);
        if redundant {
            start += 1;
        } else {
            break;
        }
    }
    bytes[start..].to_vec()
}

/// Unsigned content encoding for Counter32/Gauge32/TimeTicks/Counter64:
/// same minimal big-endian form, but a leading 0x00 is inserted if the
/// high bit of the first byte would otherwise be set (BER INTEGER is
/// signed; an unsigned SNMP value must not look negative).
fn encode_unsigned_content(n: u64) -> Vec<u8> {
    let bytes = n.to_be_bytes();
    let first_nonzero = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len() - 1);
    let mut content = bytes[first_nonzero..].to_vec();
    if content[0] & 0x80 != 0 {
        content.insert(0, 0x00);
    }
    content
}

fn encode_oid_content(components: &[u32]) -> Result<Vec<u8>> {
    if components.is_empty() {
        return Err(Error::encode("cannot encode empty OID"));
    }
    let (x1, x2) = if components.len() >= 2 {
        (components[0], components[1])
    } else {
        (components[0], 0)
    };
    if x1 > 2 {
        return Err(Error::encode("OID first component must be 0, 1 or 2"));
    }
    let mut out = vec![(x1 * 40 + x2) as u8];
    let tail = if components.len() >= 2 { &components[2..] } else { &[] };
    for &sub in tail {
        out.extend(encode_base128(sub));
    }
    Ok(out)
}

fn encode_base128(mut value: u32) -> Vec<u8> {
    let mut chunks = vec![(value & 0x7F) as u8];
    value >>= 7;
    while value > 0 {
        chunks.push(((value & 0x7F) as u8) | 0x80);
        value >>= 7;
    }
    chunks.reverse();
    chunks
}

fn encode_value(value: &SnmpValue, out: &mut BytesMut) -> Result<()> {
    match value {
        SnmpValue::Integer(n) => encode_tlv(tag::INTEGER, &encode_signed_content(*n as i64), out),
        SnmpValue::OctetString(bytes) => encode_tlv(tag::OCTET_STRING, bytes, out),
        SnmpValue::ObjectIdentifier(components) => {
            let content = encode_oid_content(components)?;
            encode_tlv(tag::OBJECT_IDENTIFIER, &content, out);
        }
        SnmpValue::Null => encode_tlv(tag::NULL, &[], out),
        SnmpValue::IpAddress(octets) => encode_tlv(tag::IP_ADDRESS, octets, out),
        SnmpValue::Counter32(n) => encode_tlv(tag::COUNTER32, &encode_unsigned_content(*n as u64), out),
        SnmpValue::Gauge32(n) => encode_tlv(tag::GAUGE32, &encode_unsigned_content(*n as u64), out),
        SnmpValue::TimeTicks(n) => encode_tlv(tag::TIME_TICKS, &encode_unsigned_content(*n as u64), out),
        SnmpValue::Opaque(bytes) => encode_tlv(tag::OPAQUE, bytes, out),
        SnmpValue::Counter64(n) => encode_tlv(tag::COUNTER64, &encode_unsigned_content(*n), out),
        SnmpValue::NoSuchObject => encode_tlv(tag::NO_SUCH_OBJECT, &[], out),
        SnmpValue::NoSuchInstance => encode_tlv(tag::NO_SUCH_INSTANCE, &[], out),
        SnmpValue::EndOfMibView => encode_tlv(tag::END_OF_MIB_VIEW, &[], out),
    }
    Ok(())
}

fn encode_varbind(vb: &VarBind, out: &mut BytesMut) -> Result<()> {
    let mut inner = BytesMut::new();
    let oid_content = encode_oid_content(vb.oid.components())?;
    encode_tlv(tag::OBJECT_IDENTIFIER, &oid_content, &mut inner);
    encode_value(&vb.value, &mut inner)?;
    encode_tlv(tag::SEQUENCE, &inner, out);
    Ok(())
}

fn pdu_tag(kind: PduKind) -> u8 {
    match kind {
        PduKind::Get => tag::GET_REQUEST,
        PduKind::GetNext => tag::GET_NEXT_REQUEST,
        PduKind::GetBulk => tag::GET_BULK_REQUEST,
        PduKind::Set => tag::SET_REQUEST,
        PduKind::GetResponse => tag::GET_RESPONSE,
    }
}

fn encode_pdu(pdu: &Pdu, out: &mut BytesMut) -> Result<()> {
    let mut inner = BytesMut::new();
    encode_tlv(tag::INTEGER, &encode_signed_content(pdu.request_id as i64), &mut inner);
    encode_tlv(tag::INTEGER, &encode_signed_content(pdu.field2 as i64), &mut inner);
    encode_tlv(tag::INTEGER, &encode_signed_content(pdu.field3 as i64), &mut inner);

    let mut varbind_list = BytesMut::new();
    for vb in &pdu.varbinds {
        encode_varbind(vb, &mut varbind_list)?;
    }
    encode_tlv(tag::SEQUENCE, &varbind_list, &mut inner);

    encode_tlv(pdu_tag(pdu.kind), &inner, out);
    Ok(())
}

pub fn encode_message(msg: &Message) -> Result<Vec<u8>> {
    let mut inner = BytesMut::new();
    encode_tlv(tag::INTEGER, &encode_signed_content(msg.version.wire_value()), &mut inner);
    encode_tlv(tag::OCTET_STRING, msg.community.as_bytes(), &mut inner);
    encode_pdu(&msg.pdu, &mut inner)?;

    let mut out = BytesMut::new();
    encode_tlv(tag::SEQUENCE, &inner, &mut out);
    Ok(out.to_vec())
}

// ---------------------------------------------------------------- decode

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn read_u8(&mut self) -> Result<u8> {
        if self.remaining() < 1 {
            return Err(Error::decode("unexpected end of input"));
        }
        let b = self.data[self.pos];
        self.pos += 1;
        Ok(b)
    }

    fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(Error::decode("truncated BER content"));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn peek_tag(&self) -> Result<u8> {
        if self.remaining() < 1 {
            return Err(Error::decode("unexpected end of input"));
        }
        Ok(self.data[self.pos])
    }

    fn read_length(&mut self) -> Result<usize> {
        let first = self.read_u8()?;
        if first & 0x80 == 0 {
            return Ok(first as usize);
        }
        let num_bytes = (first & 0x7F) as usize;
        if num_bytes == 0 {
            return Err(Error::decode("indefinite-length BER is not supported"));
        }
        if num_bytes > 8 {
            return Err(Error::decode("BER length field too large"));
        }
        let length_bytes = self.read_bytes(num_bytes)?;
        let mut len: u64 = 0;
        for &b in length_bytes {
            len = (len << 8) | b as u64;
        }
        Ok(len as usize)
    }

    /// Reads a tag byte plus its length-prefixed content, returning the
    /// raw tag and a slice over the content bytes only.
    fn read_tlv(&mut self) -> Result<(u8, &'a [u8])> {
        let tag = self.read_u8()?;
        let len = self.read_length()?;
        let content = self.read_bytes(len)?;
        Ok((tag, content))
    }

    fn read_tlv_expect(&mut self, expected: u8) -> Result<&'a [u8]> {
        let (tag, content) = self.read_tlv()?;
        if tag != expected {
            return Err(Error::decode(format!("expected tag 0x{:02x}, found 0x{:02x}", expected, tag)));
        }
        Ok(content)
    }
}

fn decode_integer(content: &[u8]) -> Result<i64> {
    if content.is_empty() {
        return Err(Error::decode("empty INTEGER content"));
    }
    if content.len() > 8 {
        return Err(Error::decode("INTEGER too wide"));
    }
    let negative = content[0] & 0x80 != 0;
    let mut buf = [if negative { 0xFFu8 } else { 0x00 }; 8];
    let offset = 8 - content.len();
    buf[offset..].copy_from_slice(content);
    Ok(i64::from_be_bytes(buf))
}

fn decode_unsigned(content: &[u8]) -> Result<u64> {
    if content.is_empty() {
        return Err(Error::decode("empty unsigned content"));
    }
    if content.len() > 9 {
        return Err(Error::decode("unsigned value too wide"));
    }
    let mut buf = [0u8; 8];
    let trimmed = if content.len() == 9 { &content[1..] } else { content };
    let offset = 8 - trimmed.len();
    buf[offset..].copy_from_slice(trimmed);
    Ok(u64::from_be_bytes(buf))
}

fn decode_oid_content(content: &[u8]) -> Result<Vec<u32>> {
    if content.is_empty() {
        return Err(Error::decode("empty OID content"));
    }
    let first = content[0];
    let (x1, x2) = if first < 40 {
        (0u32, first as u32)
    } else if first < 80 {
        (1u32, first as u32 - 40)
    } else {
        (2u32, first as u32 - 80)
    };
    let mut components = vec![x1, x2];

    let mut value: u64 = 0;
    let mut have_digits = false;
    for &byte in &content[1..] {
        have_digits = true;
        value = (value << 7) | (byte & 0x7F) as u64;
        if byte & 0x80 == 0 {
            if value > u32::MAX as u64 {
                return Err(Error::decode("OID sub-identifier overflows u32"));
            }
            components.push(value as u32);
            value = 0;
            have_digits = false;
        }
    }
    if have_digits {
        return Err(Error::decode("truncated OID sub-identifier"));
    }
    Ok(components)
}

fn decode_value(tag: u8, content: &[u8]) -> Result<SnmpValue> {
    Ok(match tag {
        tag::INTEGER => SnmpValue::Integer(decode_integer(content)? as i32),
        tag::OCTET_STRING => SnmpValue::OctetString(content.to_vec()),
        tag::OBJECT_IDENTIFIER => SnmpValue::ObjectIdentifier(decode_oid_content(content)?),
        tag::NULL => SnmpValue::Null,
        tag::IP_ADDRESS => {
            if content.len() != 4 {
                return Err(Error::decode("IpAddress must be 4 octets"));
            }
            let mut octets = [0u8; 4];
            octets.copy_from_slice(content);
            SnmpValue::IpAddress(octets)
        }
        tag::COUNTER32 => SnmpValue::Counter32(decode_unsigned(content)? as u32),
        tag::GAUGE32 => SnmpValue::Gauge32(decode_unsigned(content)? as u32),
        tag::TIME_TICKS => SnmpValue::TimeTicks(decode_unsigned(content)? as u32),
        tag::OPAQUE => SnmpValue::Opaque(content.to_vec()),
        tag::COUNTER64 => SnmpValue::Counter64(decode_unsigned(content)?),
        tag::NO_SUCH_OBJECT => SnmpValue::NoSuchObject,
        tag::NO_SUCH_INSTANCE => SnmpValue::NoSuchInstance,
        tag::END_OF_MIB_VIEW => SnmpValue::EndOfMibView,
        other => return Err(Error::decode(format!("unsupported value tag 0x{:02x}", other))),
    })
}

fn decode_varbind(cursor: &mut Cursor) -> Result<VarBind> {
    let content = cursor.read_tlv_expect(tag::SEQUENCE)?;
    let mut inner = Cursor::new(content);
    let oid_content = inner.read_tlv_expect(tag::OBJECT_IDENTIFIER)?;
    let oid = Oid::new(decode_oid_content(oid_content)?);
    let (value_tag, value_content) = inner.read_tlv()?;
    let value = decode_value(value_tag, value_content)?;
    Ok(VarBind::new(oid, value))
}

fn decode_varbind_list(content: &[u8]) -> Result<Vec<VarBind>> {
    let mut cursor = Cursor::new(content);
    let mut varbinds = Vec::new();
    while cursor.remaining() > 0 {
        varbinds.push(decode_varbind(&mut cursor)?);
    }
    Ok(varbinds)
}

fn pdu_kind_from_tag(tag: u8) -> Result<PduKind> {
    Ok(match tag {
        tag::GET_REQUEST => PduKind::Get,
        tag::GET_NEXT_REQUEST => PduKind::GetNext,
        tag::GET_BULK_REQUEST => PduKind::GetBulk,
        tag::SET_REQUEST => PduKind::Set,
        tag::GET_RESPONSE => PduKind::GetResponse,
        other => return Err(Error::decode(format!("unsupported PDU tag 0x{:02x}", other))),
    })
}

fn decode_pdu(tag: u8, content: &[u8]) -> Result<Pdu> {
    let kind = pdu_kind_from_tag(tag)?;
    let mut cursor = Cursor::new(content);
    let request_id = decode_integer(cursor.read_tlv_expect(tag::INTEGER)?)?;
    let field2 = decode_integer(cursor.read_tlv_expect(tag::INTEGER)?)?;
    let field3 = decode_integer(cursor.read_tlv_expect(tag::INTEGER)?)?;
    let varbind_content = cursor.read_tlv_expect(tag::SEQUENCE)?;
    let varbinds = decode_varbind_list(varbind_content)?;

    if request_id < i32::MIN as i64 || request_id > i32::MAX as i64 {
        return Err(Error::decode("request-id out of i32 range"));
    }

    Ok(Pdu {
        kind,
        request_id: request_id as i32,
        field2: field2 as i32,
        field3: field3 as i32,
        varbinds,
    })
}

pub fn decode_message(bytes: &[u8]) -> Result<Message> {
    let mut outer = Cursor::new(bytes);
    let envelope = outer.read_tlv_expect(tag::SEQUENCE)?;

    let mut cursor = Cursor::new(envelope);
    let version_content = cursor.read_tlv_expect(tag::INTEGER)?;
    let version_value = decode_integer(version_content)?;
    let version = Version::from_wire_value(version_value)
        .ok_or_else(|| Error::decode(format!("unsupported SNMP version {}", version_value)))?;

    let community_content = cursor.read_tlv_expect(tag::OCTET_STRING)?;
    let community = String::from_utf8_lossy(community_content).into_owned();

    let (pdu_tag, pdu_content) = cursor.read_tlv()?;
    let pdu = decode_pdu(pdu_tag, pdu_content)?;

    Ok(Message { version, community, pdu })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snmp::pdu::ErrorStatus;

    fn oid(s: &str) -> Oid {
        Oid::parse(s).unwrap()
    }

    #[test]
    fn round_trips_get_request() {
        let pdu = Pdu::get(42, vec![VarBind::new(oid("1.3.6.1.2.1.1.1.0"), SnmpValue::Null)]);
        let msg = Message::new(Version::V2c, "public", pdu);
        let wire = encode_message(&msg).unwrap();
        let decoded = decode_message(&wire).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn round_trips_all_scalar_types() {
        let varbinds = vec![
            VarBind::new(oid("1.1.1"), SnmpValue::Integer(-5)),
            VarBind::new(oid("1.1.2"), SnmpValue::OctetString(b"hello".to_vec())),
            VarBind::new(oid("1.1.3"), SnmpValue::ObjectIdentifier(vec![1, 3, 6, 1])),
            VarBind::new(oid("1.1.4"), SnmpValue::IpAddress([192, 168, 1, 1])),
            VarBind::new(oid("1.1.5"), SnmpValue::Counter32(4_000_000_000)),
            VarBind::new(oid("1.1.6"), SnmpValue::Gauge32(100)),
            VarBind::new(oid("1.1.7"), SnmpValue::TimeTicks(123456)),
            VarBind::new(oid("1.1.8"), SnmpValue::Opaque(vec![0xde, 0xad])),
            VarBind::new(oid("1.1.9"), SnmpValue::Counter64(18_000_000_000_000_000_000)),
            VarBind::new(oid("1.1.10"), SnmpValue::NoSuchObject),
            VarBind::new(oid("1.1.11"), SnmpValue::NoSuchInstance),
            VarBind::new(oid("1.1.12"), SnmpValue::EndOfMibView),
        ];
        let pdu = Pdu::response(1, ErrorStatus::NoError, 0, varbinds);
        let msg = Message::new(Version::V2c, "public", pdu);
        let wire = encode_message(&msg).unwrap();
        let decoded = decode_message(&wire).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn round_trips_getbulk() {
        let pdu = Pdu::get_bulk(7, 1, 10, vec![VarBind::new(oid("1.3.6.1"), SnmpValue::Null)]);
        let msg = Message::new(Version::V2c, "public", pdu);
        let wire = encode_message(&msg).unwrap();
        let decoded = decode_message(&wire).unwrap();
        assert_eq!(decoded.pdu.non_repeaters(), 1);
        assert_eq!(decoded.pdu.max_repetitions(), 10);
    }

    #[test]
    fn v1_wire_version_is_zero() {
        let pdu = Pdu::get(1, vec![]);
        let msg = Message::new(Version::V1, "public", pdu);
        let wire = encode_message(&msg).unwrap();
        assert_eq!(wire[4], 0x02); // INTEGER tag for version
        let decoded = decode_message(&wire).unwrap();
        assert_eq!(decoded.version, Version::V1);
    }

    #[test]
    fn rejects_truncated_input() {
        let pdu = Pdu::get(1, vec![VarBind::new(oid("1.3.6.1"), SnmpValue::Null)]);
        let msg = Message::new(Version::V2c, "public", pdu);
        let wire = encode_message(&msg).unwrap();
        let truncated = &wire[..wire.len() - 3];
        assert!(decode_message(truncated).is_err());
    }

    #[test]
    fn large_length_uses_long_form() {
        let long_string = vec![b'x'; 300];
        let pdu = Pdu::get(1, vec![VarBind::new(oid("1.3.6.1"), SnmpValue::OctetString(long_string))]);
        let msg = Message::new(Version::V2c, "public", pdu);
        let wire = encode_message(&msg).unwrap();
        let decoded = decode_message(&wire).unwrap();
        assert_eq!(decoded, msg);
    }
}
