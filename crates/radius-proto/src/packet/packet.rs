use super::Code;
use crate::attributes::{Attribute, AttributeType};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PacketError {
    #[error("Invalid packet length: {0}")]
    InvalidLength(usize),
    #[error("Invalid packet code: {0}")]
    InvalidCode(u8),
    #[error("Attribute error: {0}")]
    AttributeError(String),
    #[error("Packet too large: {0} bytes")]
    PacketTooLarge(usize),
}

/// RADIUS packet (RFC 2865 Section 3)
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |     Code      |  Identifier   |            Length             |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |                         Authenticator (16)                    |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |  Attributes ...
/// +-+-+-+-+-+-+-+-+-+-+-+-+-
/// ```
#[derive(Debug, Clone)]
pub struct Packet {
    pub code: Code,
    pub identifier: u8,
    pub authenticator: [u8; 16],
    pub attributes: Vec<Attribute>,
}

impl Packet {
    /// Header size: code, identifier, length, authenticator
    pub const HEADER_SIZE: usize = 20;
    /// RFC 2865 upper bound
    pub const MAX_PACKET_SIZE: usize = 4096;

    pub fn new(code: Code, identifier: u8, authenticator: [u8; 16]) -> Self {
        Packet {
            code,
            identifier,
            authenticator,
            attributes: Vec::new(),
        }
    }

    pub fn add_attribute(&mut self, attribute: Attribute) {
        self.attributes.push(attribute);
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Length of the packet on the wire
    pub fn length(&self) -> usize {
        Self::HEADER_SIZE
            + self
                .attributes
                .iter()
                .map(Attribute::encoded_length)
                .sum::<usize>()
    }

    /// Encoded attribute section only
    pub fn encode_attributes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.length() - Self::HEADER_SIZE);
        for attr in &self.attributes {
            attr.write_to(&mut out);
        }
        out
    }

    pub fn encode(&self) -> Result<Vec<u8>, PacketError> {
        let length = self.length();
        if length > Self::MAX_PACKET_SIZE {
            return Err(PacketError::PacketTooLarge(length));
        }

        let mut buffer = Vec::with_capacity(length);
        buffer.push(self.code.as_u8());
        buffer.push(self.identifier);
        buffer.extend_from_slice(&(length as u16).to_be_bytes());
        buffer.extend_from_slice(&self.authenticator);
        for attr in &self.attributes {
            attr.write_to(&mut buffer);
        }

        Ok(buffer)
    }

    /// Decode a packet; bytes past the declared length are ignored
    pub fn decode(data: &[u8]) -> Result<Self, PacketError> {
        if data.len() < Self::HEADER_SIZE {
            return Err(PacketError::InvalidLength(data.len()));
        }

        let code = Code::from_u8(data[0]).ok_or(PacketError::InvalidCode(data[0]))?;
        let identifier = data[1];
        let length = u16::from_be_bytes([data[2], data[3]]) as usize;

        if !(Self::HEADER_SIZE..=Self::MAX_PACKET_SIZE).contains(&length) || length > data.len() {
            return Err(PacketError::InvalidLength(length));
        }

        let mut authenticator = [0u8; 16];
        authenticator.copy_from_slice(&data[4..20]);

        let mut attributes = Vec::new();
        let mut rest = &data[Self::HEADER_SIZE..length];
        while !rest.is_empty() {
            let (attr, used) = Attribute::parse(rest)?;
            attributes.push(attr);
            rest = &rest[used..];
        }

        Ok(Packet {
            code,
            identifier,
            authenticator,
            attributes,
        })
    }

    pub fn find_attribute(&self, attr_type: AttributeType) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.attr_type == attr_type as u8)
    }

    pub fn find_all_attributes(&self, attr_type: AttributeType) -> Vec<&Attribute> {
        self.attributes
            .iter()
            .filter(|a| a.attr_type == attr_type as u8)
            .collect()
    }

    pub fn string_attribute(&self, attr_type: AttributeType) -> Option<String> {
        self.find_attribute(attr_type).and_then(|a| a.as_string().ok())
    }

    pub fn integer_attribute(&self, attr_type: AttributeType) -> Option<u32> {
        self.find_attribute(attr_type).and_then(|a| a.as_integer().ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnect_request_wire_layout() {
        let packet = Packet::new(Code::DisconnectRequest, 7, [0u8; 16])
            .with_attribute(Attribute::string(AttributeType::AcctSessionId as u8, "abc").unwrap());
        let wire = packet.encode().unwrap();

        assert_eq!(wire[0], 40);
        assert_eq!(wire[1], 7);
        assert_eq!(u16::from_be_bytes([wire[2], wire[3]]) as usize, wire.len());
        assert_eq!(&wire[20..], &[44, 5, b'a', b'b', b'c']);
    }

    #[test]
    fn test_decode_reads_attributes() {
        let packet = Packet::new(Code::DisconnectNak, 9, [3u8; 16])
            .with_attribute(Attribute::integer(AttributeType::ErrorCause as u8, 503).unwrap());
        let decoded = Packet::decode(&packet.encode().unwrap()).unwrap();

        assert_eq!(decoded.code, Code::DisconnectNak);
        assert_eq!(decoded.identifier, 9);
        assert_eq!(decoded.authenticator, [3u8; 16]);
        assert_eq!(decoded.integer_attribute(AttributeType::ErrorCause), Some(503));
    }

    #[test]
    fn test_decode_ignores_trailing_padding() {
        let mut wire = Packet::new(Code::CoaAck, 1, [0u8; 16]).encode().unwrap();
        wire.extend_from_slice(&[0, 0, 0]);
        let decoded = Packet::decode(&wire).unwrap();
        assert!(decoded.attributes.is_empty());
    }

    #[test]
    fn test_decode_rejects_short_and_oversized() {
        assert!(matches!(Packet::decode(&[0u8; 19]), Err(PacketError::InvalidLength(19))));

        let mut wire = Packet::new(Code::CoaAck, 1, [0u8; 16]).encode().unwrap();
        wire[2..4].copy_from_slice(&64u16.to_be_bytes());
        assert!(matches!(Packet::decode(&wire), Err(PacketError::InvalidLength(64))));
    }

    #[test]
    fn test_decode_rejects_unknown_code() {
        let mut wire = Packet::new(Code::CoaAck, 1, [0u8; 16]).encode().unwrap();
        wire[0] = 99;
        assert!(matches!(Packet::decode(&wire), Err(PacketError::InvalidCode(99))));
    }

    #[test]
    fn test_encode_rejects_oversized_packet() {
        let mut packet = Packet::new(Code::CoaRequest, 1, [0u8; 16]);
        for _ in 0..20 {
            packet.add_attribute(Attribute::new(11, vec![b'x'; 253]).unwrap());
        }
        assert!(matches!(packet.encode(), Err(PacketError::PacketTooLarge(_))));
    }
}
