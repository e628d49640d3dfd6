//! RADIUS Protocol Implementation
//!
//! The wire format a management plane needs to talk to NAS devices:
//! packet framing (RFC 2865), accounting values (RFC 2866) and Dynamic
//! Authorization, i.e. Disconnect and CoA (RFC 5176).
//!
//! # Example
//!
//! ```rust
//! use radius_proto::{Attribute, AttributeType, Code, Packet};
//! use radius_proto::auth::calculate_request_authenticator;
//!
//! let mut packet = Packet::new(Code::DisconnectRequest, 1, [0u8; 16]);
//! packet.add_attribute(
//!     Attribute::string(AttributeType::AcctSessionId as u8, "81200004").unwrap()
//! );
//! packet.authenticator = calculate_request_authenticator(&packet, b"testing123");
//!
//! let bytes = packet.encode().unwrap();
//! assert_eq!(bytes[0], 40);
//! ```

pub mod accounting;
pub mod attributes;
pub mod auth;
pub mod packet;

pub use accounting::{AcctStatusType, AcctTerminateCause, ErrorCause};
pub use attributes::{Attribute, AttributeType, MikrotikAttribute, VENDOR_MIKROTIK};
pub use auth::{
    calculate_request_authenticator, calculate_response_authenticator,
    generate_request_authenticator, verify_request_authenticator, verify_response_authenticator,
};
pub use packet::{Code, Packet, PacketError};
