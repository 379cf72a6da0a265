use crate::Interface;
use thiserror::Error;

/// The list of socket operations which can fail while setting up an
/// interface
#[non_exhaustive]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Syscall {
    /// socket() returned an error
    Socket,
    /// Switching to non-blocking mode failed
    Nonblocking,
    /// bind() returned an error
    Bind,
    /// setsockopt(IP_MULTICAST_IF or IPV6_MULTICAST_IF) returned an error
    MulticastInterface,
    /// The socket could not be registered with the async reactor
    Register,
    /// sendto() of the search request returned an error
    Send,
}

/// Failure to provision a socket on one interface
///
/// Contained to that interface: the session logs it, skips the
/// interface, and carries on with the rest.
#[derive(Debug, Error)]
#[error("setting up {interface}: error from syscall {syscall:?}")]
pub struct SetupError {
    /// The interface which could not be set up
    pub interface: Interface,

    /// Which step failed
    pub syscall: Syscall,

    /// The underlying operating-system error
    #[source]
    pub source: std::io::Error,
}

impl SetupError {
    pub(crate) fn new(
        interface: Interface,
        syscall: Syscall,
        source: std::io::Error,
    ) -> Self {
        Self {
            interface,
            syscall,
            source,
        }
    }
}

/// Why a received datagram was dropped rather than reported
#[non_exhaustive]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DatagramError {
    /// Zero-length payload
    #[error("empty datagram")]
    Empty,

    /// Payload is not valid UTF-8
    #[error("datagram is not UTF-8: {0}")]
    NotUtf8(#[from] std::str::Utf8Error),
}

/// Text which is not a valid [`Interface`]
#[non_exhaustive]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InterfaceParseError {
    /// Neither "default" nor an IP address
    #[error("invalid interface address: {0}")]
    Address(#[from] std::net::AddrParseError),

    /// The part after '%' is not an interface index
    #[error("invalid interface scope: {0}")]
    Scope(#[from] std::num::ParseIntError),
}

/// The errors which can be returned from
/// [`DiscoveryService`](crate::DiscoveryService) methods
#[non_exhaustive]
#[derive(Debug, Error, PartialEq, Eq)]
pub enum Error {
    /// A discovery session is already running
    #[error("discovery session already running")]
    AlreadyRunning,

    /// The task owning the session has gone away
    #[error("discovery service has shut down")]
    ServiceGone,
}
