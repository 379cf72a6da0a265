use crate::error::InterfaceParseError;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV6};

/// The SSDP multicast group for IPv4
pub const SSDP_V4_GROUP: Ipv4Addr = Ipv4Addr::new(239, 255, 255, 250);

/// The (link-local scope) SSDP multicast group for IPv6
pub const SSDP_V6_GROUP: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 0xc);

/// The well-known SSDP port
pub const SSDP_PORT: u16 = 1900;

/// A local network interface to search on
///
/// Either one of the host's own IP addresses, or "whatever the system
/// would choose by default". IPv6 link-local addresses are only
/// meaningful with a scope (the interface index), so they need
/// [`Interface::Scoped`]; a scope also picks the link the search is
/// multicast on.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Interface {
    /// Let the operating system pick (IPv4)
    #[default]
    Default,

    /// The interface which owns this local address
    Address(IpAddr),

    /// An IPv6 address on the interface with this index
    Scoped {
        /// The local address
        addr: Ipv6Addr,
        /// Interface index, as in `fe80::1%2`
        scope_id: u32,
    },
}

impl From<IpAddr> for Interface {
    fn from(addr: IpAddr) -> Self {
        Self::Address(addr)
    }
}

impl core::fmt::Display for Interface {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Default => f.write_str("default"),
            Self::Address(addr) => write!(f, "{addr}"),
            Self::Scoped { addr, scope_id } => write!(f, "{addr}%{scope_id}"),
        }
    }
}

impl core::str::FromStr for Interface {
    type Err = InterfaceParseError;

    /// Accepts "default", an IP address, or an IPv6 address with a
    /// numeric scope such as "fe80::1%2"
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("default") {
            return Ok(Self::Default);
        }
        match s.split_once('%') {
            Some((addr, scope_id)) => Ok(Self::Scoped {
                addr: addr.parse()?,
                scope_id: scope_id.parse()?,
            }),
            None => Ok(Self::Address(s.parse()?)),
        }
    }
}

/// IP address family
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Family {
    /// IPv4
    V4,
    /// IPv6
    V6,
}

impl Family {
    /// The SSDP multicast group for this family
    #[must_use]
    pub const fn multicast_group(self) -> IpAddr {
        match self {
            Self::V4 => IpAddr::V4(SSDP_V4_GROUP),
            Self::V6 => IpAddr::V6(SSDP_V6_GROUP),
        }
    }
}

/// Where a search on one interface binds, and where it is sent
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct MulticastTarget {
    /// Family of the local address
    pub family: Family,

    /// SSDP group for that family
    pub group: IpAddr,

    /// Local address to bind; always an ephemeral port, as replies
    /// come back unicast and port 1900 belongs to any local SSDP
    /// server. Carries the scope of a [`Interface::Scoped`].
    pub bind: SocketAddr,
}

impl MulticastTarget {
    /// Interface index to multicast from, if the interface had a scope
    #[must_use]
    pub const fn scope_id(&self) -> Option<u32> {
        match self.bind {
            SocketAddr::V6(v6) if v6.scope_id() != 0 => Some(v6.scope_id()),
            _ => None,
        }
    }

    /// The full destination of the search request
    #[must_use]
    pub const fn destination(&self, port: u16) -> SocketAddr {
        match (self.group, self.scope_id()) {
            (IpAddr::V6(group), Some(scope_id)) => {
                SocketAddr::V6(SocketAddrV6::new(group, port, 0, scope_id))
            }
            _ => SocketAddr::new(self.group, port),
        }
    }
}

/// Work out the bind address, family and multicast group for an interface
#[must_use]
pub fn resolve(interface: Interface) -> MulticastTarget {
    let bind = match interface {
        Interface::Default => SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
        Interface::Address(addr) => SocketAddr::new(addr, 0),
        Interface::Scoped { addr, scope_id } => {
            SocketAddr::V6(SocketAddrV6::new(addr, 0, 0, scope_id))
        }
    };
    let family = match bind {
        SocketAddr::V4(_) => Family::V4,
        SocketAddr::V6(_) => Family::V6,
    };
    MulticastTarget {
        family,
        group: family.multicast_group(),
        bind,
    }
}
