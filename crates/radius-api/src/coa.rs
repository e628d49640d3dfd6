//! Dynamic Authorization client (RFC 5176)
//!
//! Sends Disconnect-Request and CoA-Request packets to a NAS on UDP 3799
//! and waits for the matching ACK or NAK. The NAS only acts on requests
//! signed with the shared secret it has for this server.

use radius_proto::{
    calculate_request_authenticator, verify_response_authenticator, Attribute, AttributeType,
    Code, ErrorCause, MikrotikAttribute, Packet, PacketError, VENDOR_MIKROTIK,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// RFC 5176 Dynamic Authorization port
pub const DEFAULT_COA_PORT: u16 = 3799;

/// Upper bound for `timeout_ms`
pub const MAX_TIMEOUT_MS: u64 = 60_000;

/// Upper bound for `retries`
pub const MAX_RETRIES: u32 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoaConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    /// Wait per attempt, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Extra attempts after the first one times out
    #[serde(default = "default_retries")]
    pub retries: u32,

    /// Secret for NAS devices that have no row in the `nas` table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_secret: Option<String>,

    /// Local address to send from; unspecified address of the NAS family if unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<IpAddr>,
}

fn default_port() -> u16 {
    DEFAULT_COA_PORT
}

fn default_timeout_ms() -> u64 {
    3000
}

fn default_retries() -> u32 {
    1
}

impl Default for CoaConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            timeout_ms: default_timeout_ms(),
            retries: default_retries(),
            default_secret: None,
            bind_address: None,
        }
    }
}

impl CoaConfig {
    /// Wait per attempt, capped at [`MAX_TIMEOUT_MS`]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms.min(MAX_TIMEOUT_MS))
    }

    /// Packets sent before giving up: the first one plus at most [`MAX_RETRIES`]
    pub fn attempts(&self) -> u32 {
        self.retries.min(MAX_RETRIES) + 1
    }
}

#[derive(Error, Debug)]
pub enum CoaError {
    #[error("NAS {0} is not registered and no default CoA secret is configured")]
    UnknownNas(String),

    #[error("Cannot resolve NAS address {0}")]
    InvalidAddress(String),

    #[error("Invalid request: {0}")]
    Packet(#[from] PacketError),

    #[error("Socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("No response from {nas} after {attempts} attempt(s)")]
    Timeout { nas: SocketAddr, attempts: u32 },

    #[error("NAS answered {code:?}: {}", describe_nak(.error_cause))]
    Nak {
        code: Code,
        error_cause: Option<u32>,
    },
}

/// Dictionary name of an Error-Cause value, for messages
pub fn error_cause_name(error_cause: Option<u32>) -> String {
    match error_cause {
        Some(value) => ErrorCause::from_u32(value)
            .map(|cause| cause.as_str().to_string())
            .unwrap_or_else(|| format!("Error-Cause {}", value)),
        None => "no Error-Cause".to_string(),
    }
}

fn describe_nak(error_cause: &Option<u32>) -> String {
    error_cause_name(*error_cause)
}

/// Session a request is about
#[derive(Debug, Clone)]
pub struct CoaTarget {
    pub nas: SocketAddr,
    pub secret: Vec<u8>,
    pub acct_session_id: String,
    pub username: Option<String>,
    pub framed_ip: Option<Ipv4Addr>,
}

/// Attributes a CoA-Request may change
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationChange {
    /// MikroTik rate limit, e.g. `10M/10M`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_timeout: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_id: Option<String>,
}

impl AuthorizationChange {
    pub fn is_empty(&self) -> bool {
        self.rate_limit.is_none() && self.session_timeout.is_none() && self.filter_id.is_none()
    }

    pub fn to_attributes(&self) -> Result<Vec<Attribute>, PacketError> {
        let mut attributes = Vec::new();
        if let Some(ref rate) = self.rate_limit {
            attributes.push(Attribute::vendor_specific(
                VENDOR_MIKROTIK,
                MikrotikAttribute::RateLimit.as_u8(),
                rate.as_bytes(),
            )?);
        }
        if let Some(timeout) = self.session_timeout {
            attributes.push(Attribute::integer(AttributeType::SessionTimeout.as_u8(), timeout)?);
        }
        if let Some(ref filter) = self.filter_id {
            attributes.push(Attribute::string(AttributeType::FilterId.as_u8(), filter)?);
        }
        Ok(attributes)
    }
}

/// `rate_limit=10M/10M session_timeout=3600`, for logs and audit details
impl fmt::Display for AuthorizationChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sep = "";
        if let Some(ref rate) = self.rate_limit {
            write!(f, "rate_limit={}", rate)?;
            sep = " ";
        }
        if let Some(timeout) = self.session_timeout {
            write!(f, "{}session_timeout={}", sep, timeout)?;
            sep = " ";
        }
        if let Some(ref filter) = self.filter_id {
            write!(f, "{}filter_id={}", sep, filter)?;
        }
        Ok(())
    }
}

/// Positive answer from the NAS
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoaOutcome {
    pub code: Code,
    /// Packets sent before the answer arrived
    pub attempts: u32,
}

/// Sends Disconnect-Request and CoA-Request packets and matches the replies
///
/// Each request goes out from a fresh UDP socket. The Identifier comes from a
/// shared counter, so concurrent requests to one NAS do not collide.
///
/// ```no_run
/// use radius_api::coa::{CoaClient, CoaConfig, CoaTarget};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = CoaClient::new(CoaConfig::default());
/// let target = CoaTarget {
///     nas: client.resolve("10.0.0.1").await?,
///     secret: b"nas-secret".to_vec(),
///     acct_session_id: "81200004".to_string(),
///     username: Some("alice".to_string()),
///     framed_ip: None,
/// };
/// let outcome = client.disconnect(&target).await?;
/// println!("acknowledged after {} attempt(s)", outcome.attempts);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct CoaClient {
    config: CoaConfig,
    next_identifier: AtomicU8,
}

impl CoaClient {
    pub fn new(config: CoaConfig) -> Self {
        Self {
            config,
            next_identifier: AtomicU8::new(rand_start()),
        }
    }

    pub fn config(&self) -> &CoaConfig {
        &self.config
    }

    /// Secret used for NAS devices missing from the `nas` table
    pub fn default_secret(&self) -> Option<&str> {
        self.config.default_secret.as_deref()
    }

    /// NAS name or address to its Dynamic Authorization endpoint
    ///
    /// # Errors
    ///
    /// Returns [`CoaError::InvalidAddress`] if `nas` is neither an IP address
    /// nor a name that resolves.
    pub async fn resolve(&self, nas: &str) -> Result<SocketAddr, CoaError> {
        if let Ok(ip) = nas.parse::<IpAddr>() {
            return Ok(SocketAddr::new(ip, self.config.port));
        }

        tokio::net::lookup_host((nas, self.config.port))
            .await
            .map_err(|_| CoaError::InvalidAddress(nas.to_string()))?
            .next()
            .ok_or_else(|| CoaError::InvalidAddress(nas.to_string()))
    }

    /// Packet of Disconnect
    ///
    /// # Errors
    ///
    /// - [`CoaError::Nak`] if the NAS answers Disconnect-NAK
    /// - [`CoaError::Timeout`] if no signed answer arrives within the attempts
    /// - [`CoaError::Io`] if the local socket cannot be bound or written
    pub async fn disconnect(&self, target: &CoaTarget) -> Result<CoaOutcome, CoaError> {
        self.exchange(Code::DisconnectRequest, target, Vec::new()).await
    }

    /// CoA-Request carrying the attributes set in `change`
    ///
    /// # Errors
    ///
    /// Same as [`CoaClient::disconnect`], plus [`CoaError::Packet`] if an
    /// attribute value does not fit in a RADIUS attribute.
    pub async fn change_authorization(
        &self,
        target: &CoaTarget,
        change: &AuthorizationChange,
    ) -> Result<CoaOutcome, CoaError> {
        self.exchange(Code::CoaRequest, target, change.to_attributes()?)
            .await
    }

    fn build_request(
        &self,
        code: Code,
        target: &CoaTarget,
        extra: Vec<Attribute>,
    ) -> Result<Packet, CoaError> {
        let identifier = self.next_identifier.fetch_add(1, Ordering::Relaxed);
        let mut request = Packet::new(code, identifier, [0u8; 16]);

        request.add_attribute(Attribute::string(
            AttributeType::AcctSessionId.as_u8(),
            &target.acct_session_id,
        )?);
        if let Some(ref username) = target.username {
            request.add_attribute(Attribute::string(AttributeType::UserName.as_u8(), username)?);
        }
        if let Some(ip) = target.framed_ip {
            request.add_attribute(Attribute::ipv4(AttributeType::FramedIpAddress.as_u8(), ip)?);
        }
        for attribute in extra {
            request.add_attribute(attribute);
        }
        request.add_attribute(Attribute::integer(
            AttributeType::EventTimestamp.as_u8(),
            unix_now(),
        )?);

        request.authenticator = calculate_request_authenticator(&request, &target.secret);
        Ok(request)
    }

    fn local_address(&self, nas: SocketAddr) -> SocketAddr {
        let ip = self.config.bind_address.unwrap_or(match nas {
            SocketAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            SocketAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        });
        SocketAddr::new(ip, 0)
    }

    async fn exchange(
        &self,
        code: Code,
        target: &CoaTarget,
        extra: Vec<Attribute>,
    ) -> Result<CoaOutcome, CoaError> {
        let request = self.build_request(code, target, extra)?;
        let wire = request.encode()?;

        let socket = UdpSocket::bind(self.local_address(target.nas)).await?;
        socket.connect(target.nas).await?;

        let attempts = self.config.attempts();
        let mut buf = vec![0u8; Packet::MAX_PACKET_SIZE];

        for attempt in 1..=attempts {
            socket.send(&wire).await?;
            debug!(
                nas = %target.nas,
                code = ?code,
                identifier = request.identifier,
                attempt,
                "Sent dynamic authorization request"
            );

            let deadline = Instant::now() + self.config.timeout();
            loop {
                let len = match tokio::time::timeout_at(deadline, socket.recv(&mut buf)).await {
                    Err(_) => break,
                    Ok(Ok(len)) => len,
                    Ok(Err(e)) => {
                        // ICMP port unreachable surfaces here on a connected socket
                        debug!(
                            nas = %target.nas,
                            error = %e,
                            attempt,
                            "Receive failed, ending attempt"
                        );
                        break;
                    }
                };

                let Some(response) = match_response(&buf[..len], &request, &target.secret) else {
                    warn!(nas = %target.nas, "Discarding unmatched or unauthenticated response");
                    continue;
                };

                return if Some(response.code) == code.ack() {
                    info!(
                        nas = %target.nas,
                        session = %target.acct_session_id,
                        code = ?response.code,
                        attempt,
                        "NAS acknowledged request"
                    );
                    Ok(CoaOutcome {
                        code: response.code,
                        attempts: attempt,
                    })
                } else {
                    let error_cause = response.integer_attribute(AttributeType::ErrorCause);
                    warn!(
                        nas = %target.nas,
                        session = %target.acct_session_id,
                        code = ?response.code,
                        error_cause = %error_cause_name(error_cause),
                        "NAS rejected request"
                    );
                    Err(CoaError::Nak {
                        code: response.code,
                        error_cause,
                    })
                };
            }
        }

        warn!(nas = %target.nas, attempts, "No response to dynamic authorization request");
        Err(CoaError::Timeout {
            nas: target.nas,
            attempts,
        })
    }
}

/// Decode `data` and accept it only as the signed ACK/NAK for `request`
fn match_response(data: &[u8], request: &Packet, secret: &[u8]) -> Option<Packet> {
    let response = Packet::decode(data).ok()?;
    if response.identifier != request.identifier {
        return None;
    }
    if Some(response.code) != request.code.ack() && Some(response.code) != request.code.nak() {
        return None;
    }
    verify_response_authenticator(&response, &request.authenticator, secret).then_some(response)
}

fn unix_now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

fn rand_start() -> u8 {
    radius_proto::generate_request_authenticator()[0]
}

#[cfg(test)]
mod tests {
    use super::*;
    use radius_proto::{calculate_response_authenticator, verify_request_authenticator};
    use std::sync::Arc;

    const SECRET: &[u8] = b"nas-secret";

    /// How the fake NAS answers each request it receives
    #[derive(Clone, Copy)]
    enum Reply {
        Ack,
        Nak(u32),
        WrongSecretThenAck,
        Silent,
    }

    async fn fake_nas(reply: Reply) -> (SocketAddr, Arc<tokio::sync::Mutex<Vec<Packet>>>) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        let seen = Arc::new(tokio::sync::Mutex::new(Vec::new()));
        let log = seen.clone();

        tokio::spawn(async move {
            let mut buf = [0u8; 4096];
            loop {
                let Ok((len, peer)) = socket.recv_from(&mut buf).await else {
                    return;
                };
                let request = Packet::decode(&buf[..len]).unwrap();
                assert!(verify_request_authenticator(&request, SECRET));
                log.lock().await.push(request.clone());

                let respond = |code: Code, secret: &[u8], attrs: Vec<Attribute>| {
                    let mut response = Packet::new(code, request.identifier, [0u8; 16]);
                    for attr in attrs {
                        response.add_attribute(attr);
                    }
                    response.authenticator =
                        calculate_response_authenticator(&response, &request.authenticator, secret);
                    response.encode().unwrap()
                };

                let ack = request.code.ack().unwrap();
                let nak = request.code.nak().unwrap();
                match reply {
                    Reply::Ack => {
                        socket.send_to(&respond(ack, SECRET, vec![]), peer).await.unwrap();
                    }
                    Reply::Nak(cause) => {
                        let attr = Attribute::integer(AttributeType::ErrorCause.as_u8(), cause).unwrap();
                        socket.send_to(&respond(nak, SECRET, vec![attr]), peer).await.unwrap();
                    }
                    Reply::WrongSecretThenAck => {
                        socket.send_to(&respond(ack, b"wrong", vec![]), peer).await.unwrap();
                        socket.send_to(&respond(ack, SECRET, vec![]), peer).await.unwrap();
                    }
                    Reply::Silent => {}
                }
            }
        });

        (addr, seen)
    }

    fn client(retries: u32) -> CoaClient {
        CoaClient::new(CoaConfig {
            timeout_ms: 200,
            retries,
            ..Default::default()
        })
    }

    fn target(nas: SocketAddr) -> CoaTarget {
        CoaTarget {
            nas,
            secret: SECRET.to_vec(),
            acct_session_id: "81200004".to_string(),
            username: Some("alice".to_string()),
            framed_ip: Some(Ipv4Addr::new(100, 64, 0, 10)),
        }
    }

    #[tokio::test]
    async fn test_disconnect_ack() {
        let (nas, seen) = fake_nas(Reply::Ack).await;

        let outcome = client(0).disconnect(&target(nas)).await.unwrap();
        assert_eq!(outcome.code, Code::DisconnectAck);
        assert_eq!(outcome.attempts, 1);

        let requests = seen.lock().await;
        let request = &requests[0];
        assert_eq!(request.code, Code::DisconnectRequest);
        assert_eq!(
            request.string_attribute(AttributeType::AcctSessionId).as_deref(),
            Some("81200004")
        );
        assert_eq!(request.string_attribute(AttributeType::UserName).as_deref(), Some("alice"));
        assert_eq!(
            request
                .find_attribute(AttributeType::FramedIpAddress)
                .unwrap()
                .as_ipv4()
                .unwrap(),
            Ipv4Addr::new(100, 64, 0, 10)
        );
        assert!(request.integer_attribute(AttributeType::EventTimestamp).is_some());
    }

    #[tokio::test]
    async fn test_disconnect_nak_carries_error_cause() {
        let (nas, _) = fake_nas(Reply::Nak(503)).await;

        let err = client(0).disconnect(&target(nas)).await.unwrap_err();
        match err {
            CoaError::Nak { code, error_cause } => {
                assert_eq!(code, Code::DisconnectNak);
                assert_eq!(error_cause, Some(503));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(error_cause_name(Some(503)), "Session-Context-Not-Found");
    }

    #[tokio::test]
    async fn test_response_with_bad_authenticator_is_ignored() {
        let (nas, _) = fake_nas(Reply::WrongSecretThenAck).await;

        let outcome = client(0).disconnect(&target(nas)).await.unwrap();
        assert_eq!(outcome.code, Code::DisconnectAck);
    }

    #[tokio::test]
    async fn test_timeout_after_retries() {
        let (nas, seen) = fake_nas(Reply::Silent).await;

        let err = client(1).disconnect(&target(nas)).await.unwrap_err();
        assert!(matches!(err, CoaError::Timeout { attempts: 2, .. }));

        // Retransmissions reuse the identifier and authenticator
        let requests = seen.lock().await;
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].identifier, requests[1].identifier);
        assert_eq!(requests[0].authenticator, requests[1].authenticator);
    }

    #[tokio::test]
    async fn test_closed_port_ends_each_attempt() {
        let closed = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let nas = closed.local_addr().unwrap();
        drop(closed);

        let client = CoaClient::new(CoaConfig {
            timeout_ms: 5_000,
            retries: 2,
            ..Default::default()
        });

        // Port unreachable ends the attempt instead of waiting out the timeout
        let started = Instant::now();
        let err = client.disconnect(&target(nas)).await.unwrap_err();
        assert!(matches!(err, CoaError::Timeout { attempts: 3, .. } | CoaError::Io(_)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_config_caps_timeout_and_attempts() {
        let config = CoaConfig {
            timeout_ms: u64::MAX,
            retries: u32::MAX,
            ..Default::default()
        };
        assert_eq!(config.timeout(), Duration::from_millis(MAX_TIMEOUT_MS));
        assert_eq!(config.attempts(), MAX_RETRIES + 1);

        let defaults = CoaConfig::default();
        assert_eq!(defaults.timeout(), Duration::from_secs(3));
        assert_eq!(defaults.attempts(), 2);
    }

    #[tokio::test]
    async fn test_change_authorization_sends_mikrotik_rate_limit() {
        let (nas, seen) = fake_nas(Reply::Ack).await;
        let change = AuthorizationChange {
            rate_limit: Some("10M/10M".to_string()),
            session_timeout: Some(3600),
            filter_id: None,
        };

        let outcome = client(0).change_authorization(&target(nas), &change).await.unwrap();
        assert_eq!(outcome.code, Code::CoaAck);

        let requests = seen.lock().await;
        let request = &requests[0];
        assert_eq!(request.code, Code::CoaRequest);
        assert_eq!(request.integer_attribute(AttributeType::SessionTimeout), Some(3600));

        let vsa = request.find_attribute(AttributeType::VendorSpecific).unwrap();
        assert_eq!(&vsa.value[..4], &VENDOR_MIKROTIK.to_be_bytes());
        assert_eq!(vsa.value[4], MikrotikAttribute::RateLimit.as_u8());
        assert_eq!(&vsa.value[6..], b"10M/10M");
    }

    #[tokio::test]
    async fn test_identifiers_advance() {
        let (nas, seen) = fake_nas(Reply::Ack).await;
        let client = client(0);

        client.disconnect(&target(nas)).await.unwrap();
        client.disconnect(&target(nas)).await.unwrap();

        let requests = seen.lock().await;
        assert_eq!(requests[1].identifier, requests[0].identifier.wrapping_add(1));
    }

    #[tokio::test]
    async fn test_resolve() {
        let client = client(0);
        assert_eq!(
            client.resolve("10.0.0.1").await.unwrap(),
            "10.0.0.1:3799".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            client.resolve("::1").await.unwrap(),
            "[::1]:3799".parse::<SocketAddr>().unwrap()
        );
        assert!(client.resolve("no such host.invalid").await.is_err());
    }

    #[test]
    fn test_authorization_change_attributes() {
        assert!(AuthorizationChange::default().is_empty());

        let change = AuthorizationChange {
            filter_id: Some("suspended".into()),
            ..Default::default()
        };
        let attrs = change.to_attributes().unwrap();
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[0].attr_type, AttributeType::FilterId.as_u8());
    }

    #[test]
    fn test_authorization_change_display() {
        assert_eq!(AuthorizationChange::default().to_string(), "");

        let change = AuthorizationChange {
            rate_limit: Some("10M/10M".into()),
            session_timeout: Some(3600),
            filter_id: Some("suspended".into()),
        };
        assert_eq!(
            change.to_string(),
            "rate_limit=10M/10M session_timeout=3600 filter_id=suspended"
        );

        let change = AuthorizationChange {
            session_timeout: Some(60),
            ..Default::default()
        };
        assert_eq!(change.to_string(), "session_timeout=60");
    }
}
