//! Unified error types for the Crackwatch node firmware.
//!
//! Every subsystem owns a small `Copy` error enum; all of them convert into
//! the firmware-wide [`Error`] so the top-level loop can treat fatal
//! conditions uniformly.  Recoverable errors (association, broker, transmit)
//! are normally handled inside the component that raised them and only
//! show up here when they escape a tick.

use core::fmt;

// ---------------------------------------------------------------------------
// Top-level firmware error
// ---------------------------------------------------------------------------

/// Every fallible operation in the firmware funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A force sensor could not be read.
    Sensor(SensorError),
    /// WiFi scan or association failed.
    Connectivity(ConnectivityError),
    /// Broker session failure.
    Broker(BrokerError),
    /// Durable sample queue failure.
    Queue(QueueError),
    /// Credential slot access failed.
    Credential(CredentialError),
}

impl Error {
    /// Invariant breaches that must stop the node rather than be retried.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Queue(QueueError::OrderViolation) | Self::Credential(CredentialError::InvalidIndex)
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Connectivity(e) => write!(f, "connectivity: {e}"),
            Self::Broker(e) => write!(f, "broker: {e}"),
            Self::Queue(e) => write!(f, "queue: {e}"),
            Self::Credential(e) => write!(f, "credentials: {e}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// `read` was called before `begin`.
    NotInitialised,
    /// The converter never signalled data-ready within the bounded wait.
    Timeout,
    /// A GPIO access returned an error.
    GpioFailed,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotInitialised => write!(f, "sensor not initialised"),
            Self::Timeout => write!(f, "data-ready timeout"),
            Self::GpioFailed => write!(f, "GPIO access failed"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Connectivity errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    /// The radio could not complete a scan.
    ScanFailed,
    /// The access point rejected the association (bad secret, refused).
    ConnectFailed,
    /// No association within the bounded timeout.
    AssociationTimeout,
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ScanFailed => write!(f, "WiFi scan failed"),
            Self::ConnectFailed => write!(f, "WiFi association failed"),
            Self::AssociationTimeout => write!(f, "WiFi association timed out"),
        }
    }
}

impl From<ConnectivityError> for Error {
    fn from(e: ConnectivityError) -> Self {
        Self::Connectivity(e)
    }
}

// ---------------------------------------------------------------------------
// Broker errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrokerError {
    /// CONNECT was refused or the transport could not be opened.
    HandshakeFailed,
    /// SUBSCRIBE to the command topic failed.
    SubscribeFailed,
    /// A PUBLISH was not acknowledged.
    TransmitFailed,
    /// Operation attempted without an established session.
    NotConnected,
}

impl fmt::Display for BrokerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HandshakeFailed => write!(f, "broker handshake failed"),
            Self::SubscribeFailed => write!(f, "command subscribe failed"),
            Self::TransmitFailed => write!(f, "publish failed"),
            Self::NotConnected => write!(f, "no broker session"),
        }
    }
}

impl From<BrokerError> for Error {
    fn from(e: BrokerError) -> Self {
        Self::Broker(e)
    }
}

// ---------------------------------------------------------------------------
// Queue errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// Appending would exceed the log capacity.
    StorageFull,
    /// The backing device is missing or returned an I/O error.
    StorageUnavailable,
    /// `confirm_sent` was called with a record that is not the oldest unsent one.
    OrderViolation,
    /// A sample could not be encoded into a log line.
    Encode,
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StorageFull => write!(f, "storage full"),
            Self::StorageUnavailable => write!(f, "storage unavailable"),
            Self::OrderViolation => write!(f, "confirm out of append order"),
            Self::Encode => write!(f, "record encode failed"),
        }
    }
}

impl From<QueueError> for Error {
    fn from(e: QueueError) -> Self {
        Self::Queue(e)
    }
}

// ---------------------------------------------------------------------------
// Credential store errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialError {
    /// Slot index outside `[0, MAX_PROFILES)`.
    InvalidIndex,
    /// Another slot already holds a profile with this name.
    DuplicateName,
    /// Name or secret exceeds its bounded length.
    TooLong,
    /// Provisioning was asked to store a profile without a name.
    EmptyName,
    /// Every slot is occupied by a different network.
    StoreFull,
    /// The NVS backend failed.
    Storage,
}

impl fmt::Display for CredentialError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidIndex => write!(f, "slot index out of range"),
            Self::DuplicateName => write!(f, "network name already stored in another slot"),
            Self::TooLong => write!(f, "name or secret too long"),
            Self::EmptyName => write!(f, "network name is empty"),
            Self::StoreFull => write!(f, "all credential slots in use"),
            Self::Storage => write!(f, "NVS access failed"),
        }
    }
}

impl From<CredentialError> for Error {
    fn from(e: CredentialError) -> Self {
        Self::Credential(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Firmware-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
