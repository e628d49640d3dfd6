//! Accounting (RFC 2866) and Dynamic Authorization (RFC 5176) value sets
//!
//! FreeRADIUS stores these as dictionary names in `radacct`, so every enum
//! here converts both to the wire integer and to the dictionary string.
//!
//! ```rust
//! use radius_proto::accounting::{AcctTerminateCause, ErrorCause};
//!
//! assert_eq!(AcctTerminateCause::AdminReset.as_str(), "Admin-Reset");
//! assert_eq!(AcctTerminateCause::from_name("NAS-Reboot"), Some(AcctTerminateCause::NasReboot));
//! assert_eq!(ErrorCause::from_u32(503), Some(ErrorCause::SessionContextNotFound));
//! ```

/// Acct-Status-Type values (RFC 2866 Section 5.1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum AcctStatusType {
    Start = 1,
    Stop = 2,
    InterimUpdate = 3,
    AccountingOn = 7,
    AccountingOff = 8,
}

impl AcctStatusType {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            1 => Some(AcctStatusType::Start),
            2 => Some(AcctStatusType::Stop),
            3 => Some(AcctStatusType::InterimUpdate),
            7 => Some(AcctStatusType::AccountingOn),
            8 => Some(AcctStatusType::AccountingOff),
            _ => None,
        }
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// Accounting-On/Off mean the NAS lost every session it had
    pub fn resets_nas(self) -> bool {
        matches!(self, AcctStatusType::AccountingOn | AcctStatusType::AccountingOff)
    }
}

/// Acct-Terminate-Cause values (RFC 2866 Section 5.10)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum AcctTerminateCause {
    UserRequest = 1,
    LostCarrier = 2,
    LostService = 3,
    IdleTimeout = 4,
    SessionTimeout = 5,
    AdminReset = 6,
    AdminReboot = 7,
    PortError = 8,
    NasError = 9,
    NasRequest = 10,
    NasReboot = 11,
    PortUnneeded = 12,
    PortPreempted = 13,
    PortSuspended = 14,
    ServiceUnavailable = 15,
    Callback = 16,
    UserError = 17,
    HostRequest = 18,
}

const TERMINATE_CAUSES: [(AcctTerminateCause, &str); 18] = [
    (AcctTerminateCause::UserRequest, "User-Request"),
    (AcctTerminateCause::LostCarrier, "Lost-Carrier"),
    (AcctTerminateCause::LostService, "Lost-Service"),
    (AcctTerminateCause::IdleTimeout, "Idle-Timeout"),
    (AcctTerminateCause::SessionTimeout, "Session-Timeout"),
    (AcctTerminateCause::AdminReset, "Admin-Reset"),
    (AcctTerminateCause::AdminReboot, "Admin-Reboot"),
    (AcctTerminateCause::PortError, "Port-Error"),
    (AcctTerminateCause::NasError, "NAS-Error"),
    (AcctTerminateCause::NasRequest, "NAS-Request"),
    (AcctTerminateCause::NasReboot, "NAS-Reboot"),
    (AcctTerminateCause::PortUnneeded, "Port-Unneeded"),
    (AcctTerminateCause::PortPreempted, "Port-Preempted"),
    (AcctTerminateCause::PortSuspended, "Port-Suspended"),
    (AcctTerminateCause::ServiceUnavailable, "Service-Unavailable"),
    (AcctTerminateCause::Callback, "Callback"),
    (AcctTerminateCause::UserError, "User-Error"),
    (AcctTerminateCause::HostRequest, "Host-Request"),
];

impl AcctTerminateCause {
    pub fn from_u32(value: u32) -> Option<Self> {
        TERMINATE_CAUSES
            .iter()
            .find(|(cause, _)| cause.as_u32() == value)
            .map(|(cause, _)| *cause)
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }

    /// FreeRADIUS dictionary name, as written to `radacct.acctterminatecause`
    pub fn as_str(self) -> &'static str {
        TERMINATE_CAUSES
            .iter()
            .find(|(cause, _)| *cause == self)
            .map(|(_, name)| *name)
            .unwrap_or("Unknown")
    }

    pub fn from_name(name: &str) -> Option<Self> {
        TERMINATE_CAUSES
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(name))
            .map(|(cause, _)| *cause)
    }
}

/// Error-Cause values carried in Disconnect-NAK / CoA-NAK (RFC 5176 Section 3.5)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCause {
    ResidualSessionContextRemoved = 201,
    InvalidEapPacket = 202,
    UnsupportedAttribute = 401,
    MissingAttribute = 402,
    NasIdentificationMismatch = 403,
    InvalidRequest = 404,
    UnsupportedService = 405,
    UnsupportedExtension = 406,
    InvalidAttributeValue = 407,
    AdministrativelyProhibited = 501,
    RequestNotRoutable = 502,
    SessionContextNotFound = 503,
    SessionContextNotRemovable = 504,
    OtherProxyProcessingError = 505,
    ResourcesUnavailable = 506,
    RequestInitiated = 507,
    MultipleSessionSelectionUnsupported = 508,
}

const ERROR_CAUSES: [(ErrorCause, &str); 17] = [
    (ErrorCause::ResidualSessionContextRemoved, "Residual-Session-Context-Removed"),
    (ErrorCause::InvalidEapPacket, "Invalid-EAP-Packet"),
    (ErrorCause::UnsupportedAttribute, "Unsupported-Attribute"),
    (ErrorCause::MissingAttribute, "Missing-Attribute"),
    (ErrorCause::NasIdentificationMismatch, "NAS-Identification-Mismatch"),
    (ErrorCause::InvalidRequest, "Invalid-Request"),
    (ErrorCause::UnsupportedService, "Unsupported-Service"),
    (ErrorCause::UnsupportedExtension, "Unsupported-Extension"),
    (ErrorCause::InvalidAttributeValue, "Invalid-Attribute-Value"),
    (ErrorCause::AdministrativelyProhibited, "Administratively-Prohibited"),
    (ErrorCause::RequestNotRoutable, "Request-Not-Routable"),
    (ErrorCause::SessionContextNotFound, "Session-Context-Not-Found"),
    (ErrorCause::SessionContextNotRemovable, "Session-Context-Not-Removable"),
    (ErrorCause::OtherProxyProcessingError, "Other-Proxy-Processing-Error"),
    (ErrorCause::ResourcesUnavailable, "Resources-Unavailable"),
    (ErrorCause::RequestInitiated, "Request-Initiated"),
    (ErrorCause::MultipleSessionSelectionUnsupported, "Multiple-Session-Selection-Unsupported"),
];

impl ErrorCause {
    pub fn from_u32(value: u32) -> Option<Self> {
        ERROR_CAUSES
            .iter()
            .find(|(cause, _)| cause.as_u32() == value)
            .map(|(cause, _)| *cause)
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub fn as_str(self) -> &'static str {
        ERROR_CAUSES
            .iter()
            .find(|(cause, _)| *cause == self)
            .map(|(_, name)| *name)
            .unwrap_or("Unknown")
    }

    /// 4xx values are permanent client errors; 5xx values are NAS-side failures
    pub fn is_client_error(self) -> bool {
        (400..500).contains(&self.as_u32())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acct_status_type_conversion() {
        assert_eq!(AcctStatusType::from_u32(3), Some(AcctStatusType::InterimUpdate));
        assert_eq!(AcctStatusType::from_u32(99), None);
        assert!(AcctStatusType::AccountingOn.resets_nas());
        assert!(!AcctStatusType::Stop.resets_nas());
    }

    #[test]
    fn test_terminate_cause_names_round_trip() {
        for (cause, name) in TERMINATE_CAUSES {
            assert_eq!(cause.as_str(), name);
            assert_eq!(AcctTerminateCause::from_name(name), Some(cause));
            assert_eq!(AcctTerminateCause::from_u32(cause.as_u32()), Some(cause));
        }
        assert_eq!(AcctTerminateCause::from_name("stale-session"), None);
        assert_eq!(AcctTerminateCause::from_name("nas-reboot"), Some(AcctTerminateCause::NasReboot));
    }

    #[test]
    fn test_error_cause() {
        assert_eq!(ErrorCause::from_u32(503), Some(ErrorCause::SessionContextNotFound));
        assert_eq!(ErrorCause::SessionContextNotFound.as_str(), "Session-Context-Not-Found");
        assert!(ErrorCause::MissingAttribute.is_client_error());
        assert!(!ErrorCause::ResourcesUnavailable.is_client_error());
        assert_eq!(ErrorCause::from_u32(300), None);
    }
}
