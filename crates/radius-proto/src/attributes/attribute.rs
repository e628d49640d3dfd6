use crate::packet::PacketError;
use std::net::Ipv4Addr;

/// A single RADIUS attribute (RFC 2865 Section 5)
///
/// ```text
///  0                   1                   2
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |     Type      |    Length     |  Value ...
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub attr_type: u8,
    pub value: Vec<u8>,
}

impl Attribute {
    /// Type and length octets
    pub const HEADER_LENGTH: usize = 2;
    /// Largest value an attribute can carry
    pub const MAX_VALUE_LENGTH: usize = 253;

    pub fn new(attr_type: u8, value: Vec<u8>) -> Result<Self, PacketError> {
        if value.len() > Self::MAX_VALUE_LENGTH {
            return Err(PacketError::AttributeError(format!(
                "value of attribute {} is {} bytes (max {})",
                attr_type,
                value.len(),
                Self::MAX_VALUE_LENGTH
            )));
        }
        Ok(Attribute { attr_type, value })
    }

    pub fn string(attr_type: u8, value: impl AsRef<str>) -> Result<Self, PacketError> {
        Self::new(attr_type, value.as_ref().as_bytes().to_vec())
    }

    pub fn integer(attr_type: u8, value: u32) -> Result<Self, PacketError> {
        Self::new(attr_type, value.to_be_bytes().to_vec())
    }

    pub fn ipv4(attr_type: u8, addr: Ipv4Addr) -> Result<Self, PacketError> {
        Self::new(attr_type, addr.octets().to_vec())
    }

    /// Vendor-Specific attribute (type 26) carrying a single sub-attribute
    ///
    /// ```text
    /// | 26 | len | Vendor-Id (4) | Vendor-Type | Vendor-Length | Value ...
    /// ```
    pub fn vendor_specific(vendor_id: u32, vendor_type: u8, value: &[u8]) -> Result<Self, PacketError> {
        // vendor id + vendor type + vendor length + value
        if value.len() > Self::MAX_VALUE_LENGTH - 6 {
            return Err(PacketError::AttributeError(format!(
                "vendor attribute {}:{} value too long: {} bytes",
                vendor_id,
                vendor_type,
                value.len()
            )));
        }
        let mut payload = Vec::with_capacity(value.len() + 6);
        payload.extend_from_slice(&vendor_id.to_be_bytes());
        payload.push(vendor_type);
        payload.push((value.len() + 2) as u8);
        payload.extend_from_slice(value);
        Self::new(super::AttributeType::VendorSpecific as u8, payload)
    }

    pub fn encoded_length(&self) -> usize {
        Self::HEADER_LENGTH + self.value.len()
    }

    /// Append the wire form of this attribute to `out`
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.push(self.attr_type);
        out.push(self.encoded_length() as u8);
        out.extend_from_slice(&self.value);
    }

    /// Parse one attribute from the front of `data`
    ///
    /// Returns the attribute and the number of bytes it occupied.
    pub fn parse(data: &[u8]) -> Result<(Self, usize), PacketError> {
        if data.len() < Self::HEADER_LENGTH {
            return Err(PacketError::AttributeError(format!(
                "truncated attribute header: {} bytes",
                data.len()
            )));
        }

        let attr_type = data[0];
        let length = data[1] as usize;
        if length < Self::HEADER_LENGTH {
            return Err(PacketError::AttributeError(format!(
                "attribute {} declares invalid length {}",
                attr_type, length
            )));
        }
        if length > data.len() {
            return Err(PacketError::AttributeError(format!(
                "attribute {} declares {} bytes, only {} remain",
                attr_type,
                length,
                data.len()
            )));
        }

        let value = data[Self::HEADER_LENGTH..length].to_vec();
        Ok((Attribute { attr_type, value }, length))
    }

    pub fn as_string(&self) -> Result<String, PacketError> {
        String::from_utf8(self.value.clone())
            .map_err(|e| PacketError::AttributeError(format!("attribute {} is not UTF-8: {}", self.attr_type, e)))
    }

    pub fn as_integer(&self) -> Result<u32, PacketError> {
        let bytes: [u8; 4] = self.value.as_slice().try_into().map_err(|_| {
            PacketError::AttributeError(format!(
                "attribute {} expected 4 bytes for integer, got {}",
                self.attr_type,
                self.value.len()
            ))
        })?;
        Ok(u32::from_be_bytes(bytes))
    }

    pub fn as_ipv4(&self) -> Result<Ipv4Addr, PacketError> {
        let bytes: [u8; 4] = self.value.as_slice().try_into().map_err(|_| {
            PacketError::AttributeError(format!(
                "attribute {} expected 4 bytes for IPv4, got {}",
                self.attr_type,
                self.value.len()
            ))
        })?;
        Ok(Ipv4Addr::from(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{AttributeType, MikrotikAttribute, VENDOR_MIKROTIK};

    #[test]
    fn test_string_attribute() {
        let attr = Attribute::string(AttributeType::AcctSessionId as u8, "81200004").unwrap();
        assert_eq!(attr.attr_type, 44);
        assert_eq!(attr.as_string().unwrap(), "81200004");
        assert_eq!(attr.encoded_length(), 10);
    }

    #[test]
    fn test_integer_attribute() {
        let attr = Attribute::integer(AttributeType::SessionTimeout as u8, 3600).unwrap();
        assert_eq!(attr.as_integer().unwrap(), 3600);
        assert!(Attribute::string(27, "abc").unwrap().as_integer().is_err());
    }

    #[test]
    fn test_ipv4_attribute() {
        let attr = Attribute::ipv4(AttributeType::FramedIpAddress as u8, Ipv4Addr::new(10, 0, 1, 100)).unwrap();
        assert_eq!(attr.value, vec![10, 0, 1, 100]);
        assert_eq!(attr.as_ipv4().unwrap(), Ipv4Addr::new(10, 0, 1, 100));
    }

    #[test]
    fn test_parse_reports_consumed_length() {
        let mut wire = Vec::new();
        Attribute::string(1, "alice").unwrap().write_to(&mut wire);
        wire.extend_from_slice(&[99, 99]);

        let (attr, used) = Attribute::parse(&wire).unwrap();
        assert_eq!(used, 7);
        assert_eq!(attr.as_string().unwrap(), "alice");
    }

    #[test]
    fn test_parse_rejects_bad_lengths() {
        assert!(Attribute::parse(&[1]).is_err());
        assert!(Attribute::parse(&[1, 1]).is_err());
        assert!(Attribute::parse(&[1, 10, b'a']).is_err());
    }

    #[test]
    fn test_mikrotik_rate_limit_vsa() {
        let attr = Attribute::vendor_specific(VENDOR_MIKROTIK, MikrotikAttribute::RateLimit.as_u8(), b"10M/10M")
            .unwrap();
        assert_eq!(attr.attr_type, 26);
        assert_eq!(&attr.value[0..4], &14988u32.to_be_bytes());
        assert_eq!(attr.value[4], 8);
        assert_eq!(attr.value[5], 9);
        assert_eq!(&attr.value[6..], b"10M/10M");
    }

    #[test]
    fn test_max_value_length() {
        assert!(Attribute::new(1, vec![0u8; 253]).is_ok());
        assert!(Attribute::new(1, vec![0u8; 254]).is_err());
        assert!(Attribute::vendor_specific(1, 1, &[0u8; 248]).is_err());
    }
}
