//! Authenticator calculation for accounting and dynamic authorization packets

use crate::packet::Packet;
use rand::Rng;

/// Generate a random 16-byte authenticator
pub fn generate_request_authenticator() -> [u8; 16] {
    let mut authenticator = [0u8; 16];
    rand::rng().fill(&mut authenticator);
    authenticator
}

fn digest(packet: &Packet, authenticator: &[u8; 16], secret: &[u8]) -> [u8; 16] {
    let length = packet.length() as u16;

    let mut data = Vec::with_capacity(packet.length() + secret.len());
    data.push(packet.code.as_u8());
    data.push(packet.identifier);
    data.extend_from_slice(&length.to_be_bytes());
    data.extend_from_slice(authenticator);
    data.extend_from_slice(&packet.encode_attributes());
    data.extend_from_slice(secret);

    md5::compute(&data).0
}

/// Request Authenticator for Accounting-Request, Disconnect-Request and CoA-Request
///
/// MD5(Code + Identifier + Length + 16 zero octets + Attributes + Secret),
/// RFC 2866 Section 3 and RFC 5176 Section 2.3.
pub fn calculate_request_authenticator(packet: &Packet, secret: &[u8]) -> [u8; 16] {
    digest(packet, &[0u8; 16], secret)
}

/// Check the Request Authenticator of a received accounting or dynamic authorization request
pub fn verify_request_authenticator(packet: &Packet, secret: &[u8]) -> bool {
    calculate_request_authenticator(packet, secret) == packet.authenticator
}

/// Response Authenticator
///
/// MD5(Code + Identifier + Length + Request Authenticator + Attributes + Secret)
pub fn calculate_response_authenticator(
    packet: &Packet,
    request_authenticator: &[u8; 16],
    secret: &[u8],
) -> [u8; 16] {
    digest(packet, request_authenticator, secret)
}

pub fn verify_response_authenticator(
    response: &Packet,
    request_authenticator: &[u8; 16],
    secret: &[u8],
) -> bool {
    calculate_response_authenticator(response, request_authenticator, secret) == response.authenticator
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::{Attribute, AttributeType};
    use crate::packet::Code;

    fn disconnect_request() -> Packet {
        Packet::new(Code::DisconnectRequest, 42, [0u8; 16])
            .with_attribute(Attribute::string(AttributeType::AcctSessionId as u8, "81200004").unwrap())
    }

    #[test]
    fn test_generate_authenticator_is_random() {
        assert_ne!(generate_request_authenticator(), generate_request_authenticator());
    }

    #[test]
    fn test_request_authenticator_covers_attributes_and_secret() {
        let mut packet = disconnect_request();
        packet.authenticator = calculate_request_authenticator(&packet, b"testing123");
        assert!(verify_request_authenticator(&packet, b"testing123"));
        assert!(!verify_request_authenticator(&packet, b"other"));

        packet.add_attribute(Attribute::string(AttributeType::UserName as u8, "alice").unwrap());
        assert!(!verify_request_authenticator(&packet, b"testing123"));
    }

    #[test]
    fn test_request_authenticator_ignores_current_authenticator_field() {
        let mut a = disconnect_request();
        let mut b = disconnect_request();
        a.authenticator = [9u8; 16];
        b.authenticator = [1u8; 16];
        assert_eq!(
            calculate_request_authenticator(&a, b"s"),
            calculate_request_authenticator(&b, b"s")
        );
    }

    #[test]
    fn test_response_authenticator() {
        let secret = b"sharedsecret";
        let request_auth = [7u8; 16];
        let mut ack = Packet::new(Code::DisconnectAck, 42, [0u8; 16]);
        ack.authenticator = calculate_response_authenticator(&ack, &request_auth, secret);

        assert!(verify_response_authenticator(&ack, &request_auth, secret));
        assert!(!verify_response_authenticator(&ack, &[8u8; 16], secret));
        assert!(!verify_response_authenticator(&ack, &request_auth, b"wrong"));
    }
}
