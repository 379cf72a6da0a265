//! Discovering UPnP devices with SSDP multicast searches
//!
//! The ssdp-discovery crate finds the devices and services on the
//! local network segment which answer to the Simple Service Discovery
//! Protocol (SSDP) -- media servers and renderers, routers, printers,
//! and anything else built on UPnP. It implements only the search half
//! of SSDP: an M-SEARCH request is multicast on each chosen interface,
//! and every reply which arrives within a fixed time window is passed
//! on to the caller.
//!
//! A discovery *session* runs like this:
//!
//!  - one UDP socket is opened per requested interface, and the search
//!    sent from it to the SSDP multicast group (239.255.255.250, or
//!    ff02::c for IPv6); interfaces which cannot be set up are skipped;
//!  - each socket gets its own task, reading replies until the session
//!    ends;
//!  - after the requested duration, or on an explicit
//!    [`DiscoveryService::stop`], all the sockets are closed.
//!
//! Progress is reported to an [`Observer`]: started, then each
//! [`DiscoveredService`], then finished. If not a single interface could
//! be set up, the finished notification says so -- often that means the
//! process is not allowed to use the network.
//!
//! Nothing is remembered between sessions, and replies are not
//! de-duplicated.
//!
//! The service runs on Tokio. Logging uses `tracing`; pass a
//! `Dispatch` to [`Builder::dispatch`] to route it somewhere other than
//! the current default subscriber.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

mod error;
mod event;
mod message;
mod reader;
mod resolver;
mod service;
mod session;

/// Opening sockets and sending searches
pub mod udp;

pub use error::{
    DatagramError, Error, InterfaceParseError, SetupError, Syscall,
};
pub use event::{DiscoveredService, DiscoveryEvent, Observer};
pub use message::build_search;
pub use resolver::{
    resolve, Family, Interface, MulticastTarget, SSDP_PORT, SSDP_V4_GROUP,
    SSDP_V6_GROUP,
};
pub use service::{Builder, DiscoveryService};
pub use session::{SearchRequest, SessionState, Status};
pub use udp::{DatagramSource, Transport, UdpTransport};
