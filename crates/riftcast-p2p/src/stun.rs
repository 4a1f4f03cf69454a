//! / STUN — RFC 5389 Binding Request/Response, just enough to
//! learn our server-reflexive address. Only `XOR-MAPPED-ADDRESS` and
//! `MAPPED-ADDRESS` are interpreted; every other attribute is skipped with
//! 4-byte alignment.

use std::net::Ipv4Addr;

use rand::RngCore;

use crate::errors::P2pError;

pub const MAGIC_COOKIE: u32 = 0x2112_A442;
const BINDING_REQUEST: u16 = 0x0001;
const BINDING_RESPONSE: u16 = 0x0101;
const ATTR_MAPPED_ADDRESS: u16 = 0x0001;
const ATTR_XOR_MAPPED_ADDRESS: u16 = 0x0020;
const HEADER_LEN: usize = 20;
const FAMILY_IPV4: u8 = 0x01;

/// A 20-byte STUN Binding Request with a fresh random transaction ID.
pub struct BindingRequest {
    pub transaction_id: [u8; 12],
    pub bytes: [u8; HEADER_LEN],
}

impl BindingRequest {
    pub fn new() -> Self {
        let mut transaction_id = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut transaction_id);

        let mut bytes = [0u8; HEADER_LEN];
        bytes[0..2].copy_from_slice(&BINDING_REQUEST.to_be_bytes());
        bytes[2..4].copy_from_slice(&0u16.to_be_bytes()); // no attributes
        bytes[4..8].copy_from_slice(&MAGIC_COOKIE.to_be_bytes());
        bytes[8..20].copy_from_slice(&transaction_id);

        Self { transaction_id, bytes }
    }
}

impl Default for BindingRequest {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a STUN Binding Success Response, returning the reflexive
/// `(Ipv4Addr, port)` carried in its address attribute. Validates message
/// type, magic cookie, and transaction ID before trusting the body.
pub fn parse_binding_response(data: &[u8], expected_txn_id: &[u8; 12]) -> Result<(Ipv4Addr, u16), P2pError> {
    if data.len() < HEADER_LEN {
        return Err(P2pError::MalformedStunResponse("shorter than the STUN header".into()));
    }
    let msg_type = u16::from_be_bytes([data[0], data[1]]);
    if msg_type != BINDING_RESPONSE {
        return Err(P2pError::MalformedStunResponse(format!("unexpected message type {msg_type:#06x}")));
    }
    let magic = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
    if magic != MAGIC_COOKIE {
        return Err(P2pError::MalformedStunResponse("bad magic cookie".into()));
    }
    if &data[8..20] != expected_txn_id {
        return Err(P2pError::MalformedStunResponse("transaction ID mismatch".into()));
    }

    let msg_len = u16::from_be_bytes([data[2], data[3]]) as usize;
    let attrs_end = HEADER_LEN + msg_len.min(data.len().saturating_sub(HEADER_LEN));

    let mut pos = HEADER_LEN;
    let mut mapped_fallback = None;
    while pos + 4 <= attrs_end {
        let attr_type = u16::from_be_bytes([data[pos], data[pos + 1]]);
        let attr_len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
        let value_start = pos + 4;
        let value_end = value_start + attr_len;
        if value_end > attrs_end {
            break;
        }
        let value = &data[value_start..value_end];

        if attr_type == ATTR_XOR_MAPPED_ADDRESS {
            return decode_xor_mapped_address(value);
        }
        if attr_type == ATTR_MAPPED_ADDRESS && mapped_fallback.is_none() {
            mapped_fallback = decode_mapped_address(value).ok();
        }

        // Attributes are padded to a 4-byte boundary.
        pos = value_start + ((attr_len + 3) & !3);
    }

    mapped_fallback.ok_or_else(|| P2pError::MalformedStunResponse("no mapped-address attribute found".into()))
}

fn decode_xor_mapped_address(value: &[u8]) -> Result<(Ipv4Addr, u16), P2pError> {
    if value.len() < 8 || value[1] != FAMILY_IPV4 {
        return Err(P2pError::MalformedStunResponse("unsupported XOR-MAPPED-ADDRESS family".into()));
    }
    let xport = u16::from_be_bytes([value[2], value[3]]);
    let port = xport ^ (MAGIC_COOKIE >> 16) as u16;

    let xip = u32::from_be_bytes([value[4], value[5], value[6], value[7]]);
    let ip = xip ^ MAGIC_COOKIE;
    Ok((Ipv4Addr::from(ip), port))
}

fn decode_mapped_address(value: &[u8]) -> Result<(Ipv4Addr, u16), P2pError> {
    if value.len() < 8 || value[1] != FAMILY_IPV4 {
        return Err(P2pError::MalformedStunResponse("unsupported MAPPED-ADDRESS family".into()));
    }
    let port = u16::from_be_bytes([value[2], value[3]]);
    let ip = u32::from_be_bytes([value[4], value[5], value[6], value[7]]);
    Ok((Ipv4Addr::from(ip), port))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attr(buf: &mut Vec<u8>, attr_type: u16, value: &[u8]) {
        buf.extend_from_slice(&attr_type.to_be_bytes());
        buf.extend_from_slice(&(value.len() as u16).to_be_bytes());
        buf.extend_from_slice(value);
        let pad = (4 - value.len() % 4) % 4;
        buf.extend(std::iter::repeat(0u8).take(pad));
    }

    fn xor_mapped_address_attr(ip: Ipv4Addr, port: u16) -> Vec<u8> {
        let xport = port ^ (MAGIC_COOKIE >> 16) as u16;
        let xip = u32::from(ip) ^ MAGIC_COOKIE;
        let mut value = vec![0u8, FAMILY_IPV4];
        value.extend_from_slice(&xport.to_be_bytes());
        value.extend_from_slice(&xip.to_be_bytes());
        value
    }

    fn wrap_response(txn_id: [u8; 12], attrs: &[u8]) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + attrs.len());
        buf.extend_from_slice(&BINDING_RESPONSE.to_be_bytes());
        buf.extend_from_slice(&(attrs.len() as u16).to_be_bytes());
        buf.extend_from_slice(&MAGIC_COOKIE.to_be_bytes());
        buf.extend_from_slice(&txn_id);
        buf.extend_from_slice(attrs);
        buf
    }

    #[test]
    fn xor_mapped_address_round_trips_for_an_arbitrary_ip_and_port() {
        let ip = Ipv4Addr::new(198, 51, 100, 23);
        let port = 40_000;
        let txn_id = [7u8; 12];
        let mut attrs = Vec::new();
        attr(&mut attrs, ATTR_XOR_MAPPED_ADDRESS, &xor_mapped_address_attr(ip, port));
        let response = wrap_response(txn_id, &attrs);

        let (parsed_ip, parsed_port) = parse_binding_response(&response, &txn_id).unwrap();
        assert_eq!(parsed_ip, ip);
        assert_eq!(parsed_port, port);
    }

    #[test]
    fn known_vector_decodes_to_the_expected_address() {
        // port=51820, ip=203.0.113.7, xored against the RFC 5389 magic cookie.
        let ip = Ipv4Addr::new(203, 0, 113, 7);
        let port = 51_820;
        let txn_id = [1u8; 12];
        let mut attrs = Vec::new();
        attr(&mut attrs, ATTR_XOR_MAPPED_ADDRESS, &xor_mapped_address_attr(ip, port));
        let response = wrap_response(txn_id, &attrs);

        let (parsed_ip, parsed_port) = parse_binding_response(&response, &txn_id).unwrap();
        assert_eq!(parsed_ip, ip);
        assert_eq!(parsed_port, port);
    }

    #[test]
    fn falls_back_to_mapped_address_when_xor_variant_is_absent() {
        let ip = Ipv4Addr::new(10, 0, 0, 5);
        let port = 1234;
        let txn_id = [2u8; 12];
        let mut value = vec![0u8, FAMILY_IPV4];
        value.extend_from_slice(&port.to_be_bytes());
        value.extend_from_slice(&u32::from(ip).to_be_bytes());
        let mut attrs = Vec::new();
        attr(&mut attrs, ATTR_MAPPED_ADDRESS, &value);
        let response = wrap_response(txn_id, &attrs);

        let (parsed_ip, parsed_port) = parse_binding_response(&response, &txn_id).unwrap();
        assert_eq!(parsed_ip, ip);
        assert_eq!(parsed_port, port);
    }

    #[test]
    fn rejects_a_response_with_the_wrong_transaction_id() {
        let txn_id = [3u8; 12];
        let other_txn_id = [4u8; 12];
        let mut attrs = Vec::new();
        attr(&mut attrs, ATTR_XOR_MAPPED_ADDRESS, &xor_mapped_address_attr(Ipv4Addr::new(1, 2, 3, 4), 80));
        let response = wrap_response(other_txn_id, &attrs);

        assert!(parse_binding_response(&response, &txn_id).is_err());
    }

    #[test]
    fn binding_request_has_the_expected_20_byte_header() {
        let req = BindingRequest::new();
        assert_eq!(req.bytes.len(), HEADER_LEN);
        assert_eq!(u16::from_be_bytes([req.bytes[0], req.bytes[1]]), BINDING_REQUEST);
        assert_eq!(u32::from_be_bytes([req.bytes[4], req.bytes[5], req.bytes[6], req.bytes[7]]), MAGIC_COOKIE);
        assert_eq!(&req.bytes[8..20], &req.transaction_id);
    }
}
