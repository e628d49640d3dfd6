/// RADIUS attribute types used by accounting and dynamic authorization.
///
/// Only the subset a management plane reads from `radacct` or puts into
/// Disconnect/CoA requests is modelled; anything else travels as a raw
/// [`Attribute`](super::Attribute) with its numeric type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AttributeType {
    /// User-Name (1) - RFC 2865
    UserName = 1,
    /// NAS-IP-Address (4) - RFC 2865
    NasIpAddress = 4,
    /// NAS-Port (5) - RFC 2865
    NasPort = 5,
    /// Framed-IP-Address (8) - RFC 2865
    FramedIpAddress = 8,
    /// Filter-Id (11) - RFC 2865
    FilterId = 11,
    /// Reply-Message (18) - RFC 2865
    ReplyMessage = 18,
    /// State (24) - RFC 2865
    State = 24,
    /// Class (25) - RFC 2865
    Class = 25,
    /// Vendor-Specific (26) - RFC 2865
    VendorSpecific = 26,
    /// Session-Timeout (27) - RFC 2865
    SessionTimeout = 27,
    /// Idle-Timeout (28) - RFC 2865
    IdleTimeout = 28,
    /// Called-Station-Id (30) - RFC 2865
    CalledStationId = 30,
    /// Calling-Station-Id (31) - RFC 2865
    CallingStationId = 31,
    /// NAS-Identifier (32) - RFC 2865
    NasIdentifier = 32,
    /// Proxy-State (33) - RFC 2865
    ProxyState = 33,
    /// Acct-Status-Type (40) - RFC 2866
    AcctStatusType = 40,
    /// Acct-Delay-Time (41) - RFC 2866
    AcctDelayTime = 41,
    /// Acct-Input-Octets (42) - RFC 2866
    AcctInputOctets = 42,
    /// Acct-Output-Octets (43) - RFC 2866
    AcctOutputOctets = 43,
    /// Acct-Session-Id (44) - RFC 2866
    AcctSessionId = 44,
    /// Acct-Session-Time (46) - RFC 2866
    AcctSessionTime = 46,
    /// Acct-Terminate-Cause (49) - RFC 2866
    AcctTerminateCause = 49,
    /// Acct-Multi-Session-Id (50) - RFC 2866
    AcctMultiSessionId = 50,
    /// Acct-Input-Gigawords (52) - RFC 2869
    AcctInputGigawords = 52,
    /// Acct-Output-Gigawords (53) - RFC 2869
    AcctOutputGigawords = 53,
    /// Event-Timestamp (55) - RFC 2869
    EventTimestamp = 55,
    /// Acct-Interim-Interval (85) - RFC 2869
    AcctInterimInterval = 85,
    /// Framed-Pool (88) - RFC 2869
    FramedPool = 88,
    /// Error-Cause (101) - RFC 5176
    ErrorCause = 101,
}

impl AttributeType {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(AttributeType::UserName),
            4 => Some(AttributeType::NasIpAddress),
            5 => Some(AttributeType::NasPort),
            8 => Some(AttributeType::FramedIpAddress),
            11 => Some(AttributeType::FilterId),
            18 => Some(AttributeType::ReplyMessage),
            24 => Some(AttributeType::State),
            25 => Some(AttributeType::Class),
            26 => Some(AttributeType::VendorSpecific),
            27 => Some(AttributeType::SessionTimeout),
            28 => Some(AttributeType::IdleTimeout),
            30 => Some(AttributeType::CalledStationId),
            31 => Some(AttributeType::CallingStationId),
            32 => Some(AttributeType::NasIdentifier),
            33 => Some(AttributeType::ProxyState),
            40 => Some(AttributeType::AcctStatusType),
            41 => Some(AttributeType::AcctDelayTime),
            42 => Some(AttributeType::AcctInputOctets),
            43 => Some(AttributeType::AcctOutputOctets),
            44 => Some(AttributeType::AcctSessionId),
            46 => Some(AttributeType::AcctSessionTime),
            49 => Some(AttributeType::AcctTerminateCause),
            50 => Some(AttributeType::AcctMultiSessionId),
            52 => Some(AttributeType::AcctInputGigawords),
            53 => Some(AttributeType::AcctOutputGigawords),
            55 => Some(AttributeType::EventTimestamp),
            85 => Some(AttributeType::AcctInterimInterval),
            88 => Some(AttributeType::FramedPool),
            101 => Some(AttributeType::ErrorCause),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Dictionary name as FreeRADIUS spells it in `radcheck`/`radreply`.
    pub fn name(self) -> &'static str {
        match self {
            AttributeType::UserName => "User-Name",
            AttributeType::NasIpAddress => "NAS-IP-Address",
            AttributeType::NasPort => "NAS-Port",
            AttributeType::FramedIpAddress => "Framed-IP-Address",
            AttributeType::FilterId => "Filter-Id",
            AttributeType::ReplyMessage => "Reply-Message",
            AttributeType::State => "State",
            AttributeType::Class => "Class",
            AttributeType::VendorSpecific => "Vendor-Specific",
            AttributeType::SessionTimeout => "Session-Timeout",
            AttributeType::IdleTimeout => "Idle-Timeout",
            AttributeType::CalledStationId => "Called-Station-Id",
            AttributeType::CallingStationId => "Calling-Station-Id",
            AttributeType::NasIdentifier => "NAS-Identifier",
            AttributeType::ProxyState => "Proxy-State",
            AttributeType::AcctStatusType => "Acct-Status-Type",
            AttributeType::AcctDelayTime => "Acct-Delay-Time",
            AttributeType::AcctInputOctets => "Acct-Input-Octets",
            AttributeType::AcctOutputOctets => "Acct-Output-Octets",
            AttributeType::AcctSessionId => "Acct-Session-Id",
            AttributeType::AcctSessionTime => "Acct-Session-Time",
            AttributeType::AcctTerminateCause => "Acct-Terminate-Cause",
            AttributeType::AcctMultiSessionId => "Acct-Multi-Session-Id",
            AttributeType::AcctInputGigawords => "Acct-Input-Gigawords",
            AttributeType::AcctOutputGigawords => "Acct-Output-Gigawords",
            AttributeType::EventTimestamp => "Event-Timestamp",
            AttributeType::AcctInterimInterval => "Acct-Interim-Interval",
            AttributeType::FramedPool => "Framed-Pool",
            AttributeType::ErrorCause => "Error-Cause",
        }
    }
}

/// IANA enterprise number for MikroTik
pub const VENDOR_MIKROTIK: u32 = 14988;

/// MikroTik vendor-specific attribute types (dictionary.mikrotik)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MikrotikAttribute {
    /// Mikrotik-Recv-Limit (1)
    RecvLimit = 1,
    /// Mikrotik-Xmit-Limit (2)
    XmitLimit = 2,
    /// Mikrotik-Group (3)
    Group = 3,
    /// Mikrotik-Rate-Limit (8), e.g. "10M/10M"
    RateLimit = 8,
    /// Mikrotik-Address-List (19)
    AddressList = 19,
}

impl MikrotikAttribute {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_u8_known_and_unknown() {
        assert_eq!(AttributeType::from_u8(44), Some(AttributeType::AcctSessionId));
        assert_eq!(AttributeType::from_u8(101), Some(AttributeType::ErrorCause));
        assert_eq!(AttributeType::from_u8(2), None);
    }

    #[test]
    fn test_dictionary_names() {
        assert_eq!(AttributeType::FramedPool.name(), "Framed-Pool");
        assert_eq!(AttributeType::AcctInterimInterval.name(), "Acct-Interim-Interval");
        assert_eq!(AttributeType::FramedPool.as_u8(), 88);
    }
}
