use crate::{
    Result,
    constants::{
        ACK_DENIED, ACK_GRANTED, DEFAULT_BAUD_RATE, DEFAULT_DATA_BITS, DEFAULT_READ_TIMEOUT_MS,
        DEFAULT_RECONNECT_INTERVAL_MS, DEFAULT_WRITE_TIMEOUT_MS, FALLBACK_READ_TIMEOUT_MS,
        FALLBACK_WRITE_TIMEOUT_MS,
    },
    error::Error,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Lifecycle state of the serial link.
///
/// Owned by the connection supervisor; every other component only observes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    /// No port is open. Initial state.
    Disconnected,

    /// An open attempt is in flight.
    Connecting,

    /// The port is open and the reader is running.
    Connected,

    /// The last open attempt failed.
    Faulted,
}

impl LinkState {
    /// Returns `true` if the link is open.
    #[inline]
    #[must_use]
    pub fn is_connected(self) -> bool {
        matches!(self, LinkState::Connected)
    }

    /// Returns `true` in the states where the reconnect timer may run.
    #[inline]
    #[must_use]
    pub fn awaits_reconnect(self) -> bool {
        matches!(self, LinkState::Disconnected | LinkState::Faulted)
    }
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LinkState::Disconnected => write!(f, "Disconnected"),
            LinkState::Connecting => write!(f, "Connecting"),
            LinkState::Connected => write!(f, "Connected"),
            LinkState::Faulted => write!(f, "Faulted"),
        }
    }
}

/// Serial parity setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

/// Serial stop bits setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopBits {
    #[default]
    One,
    Two,
}

/// Serial link configuration.
///
/// Everything except the port identifier is fixed once the supervisor is
/// started; an explicit connect to another port replaces only `port_name`.
///
/// # Examples
///
/// ```
/// use gatelink_core::LinkConfig;
/// use std::time::Duration;
///
/// let config = LinkConfig::new("/dev/ttyACM0")
///     .baud_rate(115_200)
///     .reconnect_interval_ms(2000);
///
/// assert_eq!(config.port_name, "/dev/ttyACM0");
/// assert_eq!(config.reconnect_interval(), Duration::from_secs(2));
/// assert!(config.auto_reconnect);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// OS port identifier (`/dev/ttyUSB0`, `COM5`, ...).
    pub port_name: String,

    /// Baud rate.
    pub baud_rate: u32,

    /// Data bits per character (5-8).
    pub data_bits: u8,

    /// Parity.
    pub parity: Parity,

    /// Stop bits.
    pub stop_bits: StopBits,

    /// Read timeout in milliseconds. Zero selects the fallback.
    pub read_timeout_ms: u64,

    /// Write timeout in milliseconds. Zero selects the fallback.
    pub write_timeout_ms: u64,

    /// Reopen the port automatically after it closes or fails to open.
    pub auto_reconnect: bool,

    /// Interval between reconnect attempts in milliseconds.
    pub reconnect_interval_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: DEFAULT_DATA_BITS,
            parity: Parity::None,
            stop_bits: StopBits::One,
            read_timeout_ms: DEFAULT_READ_TIMEOUT_MS,
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT_MS,
            auto_reconnect: true,
            reconnect_interval_ms: DEFAULT_RECONNECT_INTERVAL_MS,
        }
    }
}

impl LinkConfig {
    /// Create a configuration for the given port with default settings.
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            ..Default::default()
        }
    }

    /// Set the baud rate.
    pub fn baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the read timeout in milliseconds.
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout in milliseconds.
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.write_timeout_ms = ms;
        self
    }

    /// Enable or disable automatic reconnection.
    pub fn auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    /// Set the reconnect interval in milliseconds.
    pub fn reconnect_interval_ms(mut self, ms: u64) -> Self {
        self.reconnect_interval_ms = ms;
        self
    }

    /// Copy of this configuration pointed at another port.
    #[must_use]
    pub fn with_port(&self, port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            ..self.clone()
        }
    }

    /// Effective read timeout.
    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        match self.read_timeout_ms {
            0 => Duration::from_millis(FALLBACK_READ_TIMEOUT_MS),
            ms => Duration::from_millis(ms),
        }
    }

    /// Effective write timeout.
    #[must_use]
    pub fn write_timeout(&self) -> Duration {
        match self.write_timeout_ms {
            0 => Duration::from_millis(FALLBACK_WRITE_TIMEOUT_MS),
            ms => Duration::from_millis(ms),
        }
    }

    /// Effective reconnect interval. Never zero.
    #[must_use]
    pub fn reconnect_interval(&self) -> Duration {
        match self.reconnect_interval_ms {
            0 => Duration::from_millis(DEFAULT_RECONNECT_INTERVAL_MS),
            ms => Duration::from_millis(ms),
        }
    }

    /// Validate the settings that the serial driver would otherwise reject.
    ///
    /// # Errors
    /// Returns `Error::InvalidConfig` for a zero baud rate or data bits
    /// outside 5-8.
    pub fn validate(&self) -> Result<()> {
        if self.baud_rate == 0 {
            return Err(Error::InvalidConfig("baud rate must be positive".to_string()));
        }
        if !(5..=8).contains(&self.data_bits) {
            return Err(Error::InvalidConfig(format!(
                "data bits must be 5-8, got {}",
                self.data_bits
            )));
        }
        Ok(())
    }
}

/// Acknowledgement written back to the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AckByte {
    /// `A`: open the gate.
    Granted,
    /// `N`: keep it closed.
    Denied,
}

impl AckByte {
    /// The character sent on the wire.
    #[inline]
    #[must_use]
    pub fn as_char(self) -> char {
        match self {
            AckByte::Granted => ACK_GRANTED,
            AckByte::Denied => ACK_DENIED,
        }
    }

    /// The byte sent on the wire.
    #[inline]
    #[must_use]
    pub fn as_byte(self) -> u8 {
        match self {
            AckByte::Granted => b'A',
            AckByte::Denied => b'N',
        }
    }
}

impl TryFrom<char> for AckByte {
    type Error = Error;

    fn try_from(c: char) -> Result<Self> {
        match c {
            ACK_GRANTED => Ok(AckByte::Granted),
            ACK_DENIED => Ok(AckByte::Denied),
            other => Err(Error::InvalidAck(other)),
        }
    }
}

impl fmt::Display for AckByte {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Owner of an RFID token as seen by the decision engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenOwner {
    pub id: i64,
    pub name: String,
    pub active: bool,
}

/// RFID token record returned by the lookup collaborator.
///
/// The owner is optional at this boundary: a token whose owner row is gone is
/// still a token, and the engine treats the missing owner as inactive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessToken {
    pub id: i64,
    pub code: String,
    pub active: bool,
    pub owner: Option<TokenOwner>,
}

impl AccessToken {
    /// Returns `true` only when an owner exists and is active.
    #[must_use]
    pub fn owner_active(&self) -> bool {
        self.owner.as_ref().is_some_and(|o| o.active)
    }

    /// Owner display name, if the owner is known.
    #[must_use]
    pub fn owner_name(&self) -> Option<&str> {
        self.owner.as_ref().map(|o| o.name.as_str())
    }
}

/// Why an access attempt was denied.
///
/// The texts are part of the observable contract and end up in the access log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialReason {
    /// No token registered for the code.
    InvalidToken,
    /// Token exists but is disabled.
    TokenInactive,
    /// Token is enabled but its owner is not.
    UserInactive,
    /// The token lookup itself failed; fail closed.
    LookupFailed,
}

impl DenialReason {
    /// Canonical reason text.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DenialReason::InvalidToken => "Invalid RFID token",
            DenialReason::TokenInactive => "RFID token is inactive",
            DenialReason::UserInactive => "User is inactive",
            DenialReason::LookupFailed => "Token lookup failed",
        }
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access status column of the log, kept next to the boolean flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccessStatus {
    Authorized,
    Unauthorized,
}

impl AccessStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            AccessStatus::Authorized => "AUTHORIZED",
            AccessStatus::Unauthorized => "UNAUTHORIZED",
        }
    }
}

impl fmt::Display for AccessStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AccessStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "AUTHORIZED" => Ok(AccessStatus::Authorized),
            "UNAUTHORIZED" => Ok(AccessStatus::Unauthorized),
            other => Err(Error::InvalidStatus(other.to_string())),
        }
    }
}

/// Outcome of one RFID frame.
///
/// Built exactly once per valid frame, logged exactly once, and mapped to
/// exactly one [`AckByte`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessDecision {
    pub granted: bool,
    pub denied_reason: Option<DenialReason>,
    pub timestamp: DateTime<Utc>,
    pub token_id: Option<i64>,
    /// Code as presented by the device.
    pub code: String,
    pub owner_name: Option<String>,
}

impl AccessDecision {
    /// Granted decision for a known token.
    pub fn grant(token: &AccessToken, timestamp: DateTime<Utc>) -> Self {
        Self {
            granted: true,
            denied_reason: None,
            timestamp,
            token_id: Some(token.id),
            code: token.code.clone(),
            owner_name: token.owner_name().map(str::to_string),
        }
    }

    /// Denied decision. `token` is `None` when the code is unknown.
    pub fn deny(
        reason: DenialReason,
        code: impl Into<String>,
        token: Option<&AccessToken>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            granted: false,
            denied_reason: Some(reason),
            timestamp,
            token_id: token.map(|t| t.id),
            code: code.into(),
            owner_name: token.and_then(|t| t.owner_name()).map(str::to_string),
        }
    }

    /// Acknowledgement for this decision.
    #[must_use]
    pub fn ack(&self) -> AckByte {
        if self.granted {
            AckByte::Granted
        } else {
            AckByte::Denied
        }
    }

    /// Log status for this decision.
    #[must_use]
    pub fn status(&self) -> AccessStatus {
        if self.granted {
            AccessStatus::Authorized
        } else {
            AccessStatus::Unauthorized
        }
    }
}

impl From<&AccessDecision> for AckByte {
    fn from(decision: &AccessDecision) -> Self {
        decision.ack()
    }
}
