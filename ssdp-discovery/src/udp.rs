use crate::error::{SetupError, Syscall};
use crate::resolver::{Family, Interface, MulticastTarget};
use std::future::Future;
use std::net::{Ipv4Addr, SocketAddr};

/// Receiving datagrams, one at a time
///
/// Implemented for `tokio::net::UdpSocket`; other implementations are
/// mostly useful for testing.
pub trait DatagramSource: Send + Sync + 'static {
    /// Receive one datagram into `buffer`
    ///
    /// Returns the payload length and the sender, or `Ok(None)` if the
    /// source has been closed and no more datagrams will arrive.
    ///
    /// # Errors
    ///
    /// Passes on any error from the underlying receive.
    ///
    fn receive<'a>(
        &'a self,
        buffer: &'a mut [u8],
    ) -> impl Future<Output = std::io::Result<Option<(usize, SocketAddr)>>>
           + Send
           + 'a;

    /// The local address the source is bound to
    ///
    /// # Errors
    ///
    /// Passes on any error from the underlying socket.
    ///
    fn local_addr(&self) -> std::io::Result<SocketAddr>;
}

impl DatagramSource for tokio::net::UdpSocket {
    fn receive<'a>(
        &'a self,
        buffer: &'a mut [u8],
    ) -> impl Future<Output = std::io::Result<Option<(usize, SocketAddr)>>>
           + Send
           + 'a {
        async move { self.recv_from(buffer).await.map(Some) }
    }

    fn local_addr(&self) -> std::io::Result<SocketAddr> {
        tokio::net::UdpSocket::local_addr(self)
    }
}

/// Setting up one socket per interface, and sending the search on it
pub trait Transport: Send + Sync + 'static {
    /// The kind of socket produced
    type Socket: DatagramSource;

    /// Open a socket on `interface` and send `message` to the
    /// multicast group
    ///
    /// On success the socket is returned ready for reading replies.
    ///
    /// # Errors
    ///
    /// Returns a [`SetupError`] saying which step failed.
    ///
    fn provision(
        &self,
        interface: Interface,
        target: &MulticastTarget,
        port: u16,
        message: &[u8],
    ) -> impl Future<Output = Result<Self::Socket, SetupError>> + Send;
}

/// The real thing: UDP sockets via socket2 and tokio
#[derive(Debug, Default, Copy, Clone)]
pub struct UdpTransport;

impl Transport for UdpTransport {
    type Socket = tokio::net::UdpSocket;

    async fn provision(
        &self,
        interface: Interface,
        target: &MulticastTarget,
        port: u16,
        message: &[u8],
    ) -> Result<Self::Socket, SetupError> {
        let socket = setup_socket(interface, target)?;
        let socket = tokio::net::UdpSocket::from_std(socket)
            .map_err(|e| SetupError::new(interface, Syscall::Register, e))?;
        socket
            .send_to(message, target.destination(port))
            .await
            .map_err(|e| SetupError::new(interface, Syscall::Send, e))?;
        Ok(socket)
    }
}

type NewSocketFn = fn(Family) -> std::io::Result<socket2::Socket>;
type SockoptFn = fn(&socket2::Socket, bool) -> std::io::Result<()>;
type BindFn = fn(&socket2::Socket, SocketAddr) -> std::io::Result<()>;
type MulticastIfFn = fn(&socket2::Socket, &Ipv4Addr) -> std::io::Result<()>;
type MulticastIfV6Fn = fn(&socket2::Socket, u32) -> std::io::Result<()>;

fn setup_socket_inner(
    interface: Interface,
    target: &MulticastTarget,
    new_socket: NewSocketFn,
    nonblocking: SockoptFn,
    bind: BindFn,
    multicast_if: MulticastIfFn,
    multicast_if_v6: MulticastIfV6Fn,
) -> Result<std::net::UdpSocket, SetupError> {
    let fail = move |syscall| move |e| SetupError::new(interface, syscall, e);

    let socket = new_socket(target.family).map_err(fail(Syscall::Socket))?;
    nonblocking(&socket, true).map_err(fail(Syscall::Nonblocking))?;
    bind(&socket, target.bind).map_err(fail(Syscall::Bind))?;

    // Without this, multicasts from a specific address still leave by
    // the default route's interface.
    match target.bind {
        SocketAddr::V4(v4) if !v4.ip().is_unspecified() => {
            multicast_if(&socket, v4.ip())
                .map_err(fail(Syscall::MulticastInterface))?;
        }
        SocketAddr::V6(v6) if v6.scope_id() != 0 => {
            multicast_if_v6(&socket, v6.scope_id())
                .map_err(fail(Syscall::MulticastInterface))?;
        }
        _ => {}
    }
    Ok(socket.into())
}

pub(crate) fn setup_socket(
    interface: Interface,
    target: &MulticastTarget,
) -> Result<std::net::UdpSocket, SetupError> {
    setup_socket_inner(
        interface,
        target,
        |family| {
            let domain = match family {
                Family::V4 => socket2::Domain::IPV4,
                Family::V6 => socket2::Domain::IPV6,
            };
            socket2::Socket::new(
                domain,
                socket2::Type::DGRAM,
                Some(socket2::Protocol::UDP),
            )
        },
        socket2::Socket::set_nonblocking,
        |s, a| s.bind(&socket2::SockAddr::from(a)),
        socket2::Socket::set_multicast_if_v4,
        socket2::Socket::set_multicast_if_v6,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::resolve;
    use std::net::{IpAddr, Ipv6Addr};

    fn my_err() -> std::io::Error {
        std::io::Error::from(std::io::ErrorKind::Other)
    }

    fn good_new_socket(family: Family) -> std::io::Result<socket2::Socket> {
        let domain = match family {
            Family::V4 => socket2::Domain::IPV4,
            Family::V6 => socket2::Domain::IPV6,
        };
        socket2::Socket::new(domain, socket2::Type::DGRAM, None)
    }
    fn bogus_new_socket(_: Family) -> std::io::Result<socket2::Socket> {
        Err(my_err())
    }
    fn bogus_setsockopt(_: &socket2::Socket, b: bool) -> std::io::Result<()> {
        assert!(b);
        Err(my_err())
    }
    fn bogus_bind(_: &socket2::Socket, _: SocketAddr) -> std::io::Result<()> {
        Err(my_err())
    }
    fn good_bind(s: &socket2::Socket, a: SocketAddr) -> std::io::Result<()> {
        s.bind(&socket2::SockAddr::from(a))
    }
    fn bogus_multicast_if(
        _: &socket2::Socket,
        _: &Ipv4Addr,
    ) -> std::io::Result<()> {
        Err(my_err())
    }
    fn unused_multicast_if(
        _: &socket2::Socket,
        _: &Ipv4Addr,
    ) -> std::io::Result<()> {
        panic!("multicast interface should not be set");
    }
    fn bogus_multicast_if_v6(_: &socket2::Socket, _: u32) -> std::io::Result<()> {
        Err(my_err())
    }
    fn unused_multicast_if_v6(_: &socket2::Socket, _: u32) -> std::io::Result<()> {
        panic!("v6 multicast interface should not be set");
    }

    fn loopback() -> Interface {
        Interface::Address(IpAddr::V4(Ipv4Addr::LOCALHOST))
    }

    fn loopback_v6() -> Interface {
        Interface::Address(IpAddr::V6(Ipv6Addr::LOCALHOST))
    }

    // Loopback is not link-local, so the kernel does not insist on the
    // scope at bind time; it still selects the multicast interface.
    fn scoped_loopback_v6() -> Interface {
        Interface::Scoped {
            addr: Ipv6Addr::LOCALHOST,
            scope_id: 1,
        }
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn setup_socket_passes_on_creation_error() {
        let i = loopback();
        let e = setup_socket_inner(
            i,
            &resolve(i),
            bogus_new_socket,
            bogus_setsockopt,
            bogus_bind,
            bogus_multicast_if,
            bogus_multicast_if_v6,
        )
        .unwrap_err();
        assert_eq!(e.syscall, Syscall::Socket);
        assert_eq!(e.interface, i);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn setup_socket_passes_on_nonblocking_error() {
        let i = loopback();
        let e = setup_socket_inner(
            i,
            &resolve(i),
            good_new_socket,
            bogus_setsockopt,
            bogus_bind,
            bogus_multicast_if,
            bogus_multicast_if_v6,
        )
        .unwrap_err();
        assert_eq!(e.syscall, Syscall::Nonblocking);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn setup_socket_passes_on_bind_error() {
        let i = loopback();
        let e = setup_socket_inner(
            i,
            &resolve(i),
            good_new_socket,
            socket2::Socket::set_nonblocking,
            bogus_bind,
            bogus_multicast_if,
            bogus_multicast_if_v6,
        )
        .unwrap_err();
        assert_eq!(e.syscall, Syscall::Bind);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn setup_socket_passes_on_multicast_if_error() {
        let i = loopback();
        let e = setup_socket_inner(
            i,
            &resolve(i),
            good_new_socket,
            socket2::Socket::set_nonblocking,
            good_bind,
            bogus_multicast_if,
            bogus_multicast_if_v6,
        )
        .unwrap_err();
        assert_eq!(e.syscall, Syscall::MulticastInterface);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn default_interface_skips_multicast_if() {
        let i = Interface::Default;
        let s = setup_socket_inner(
            i,
            &resolve(i),
            good_new_socket,
            socket2::Socket::set_nonblocking,
            good_bind,
            unused_multicast_if,
            unused_multicast_if_v6,
        )
        .unwrap();
        let local = s.local_addr().unwrap();
        assert!(local.ip().is_unspecified());
        assert_ne!(local.port(), 0);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn setup_socket_passes_on_multicast_if_v6_error() {
        let i = scoped_loopback_v6();
        let e = setup_socket_inner(
            i,
            &resolve(i),
            good_new_socket,
            socket2::Socket::set_nonblocking,
            good_bind,
            unused_multicast_if,
            bogus_multicast_if_v6,
        )
        .unwrap_err();
        assert_eq!(e.syscall, Syscall::MulticastInterface);
        assert_eq!(e.interface, i);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn unscoped_v6_skips_multicast_if() {
        let i = loopback_v6();
        let s = setup_socket_inner(
            i,
            &resolve(i),
            good_new_socket,
            socket2::Socket::set_nonblocking,
            good_bind,
            unused_multicast_if,
            unused_multicast_if_v6,
        )
        .unwrap();
        assert_eq!(s.local_addr().unwrap().ip(), IpAddr::V6(Ipv6Addr::LOCALHOST));
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn real_setup_on_v6_loopback() {
        let i = loopback_v6();
        let s = setup_socket(i, &resolve(i)).unwrap();
        let local = s.local_addr().unwrap();
        assert_eq!(local.ip(), IpAddr::V6(Ipv6Addr::LOCALHOST));
        assert_ne!(local.port(), 1900);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn real_setup_on_scoped_v6_loopback() {
        let i = scoped_loopback_v6();
        let s = setup_socket(i, &resolve(i)).unwrap();
        assert_eq!(s.local_addr().unwrap().ip(), IpAddr::V6(Ipv6Addr::LOCALHOST));
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn real_setup_on_loopback() {
        let i = loopback();
        let s = setup_socket(i, &resolve(i)).unwrap();
        let local = s.local_addr().unwrap();
        assert_eq!(local.ip(), IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_ne!(local.port(), 1900);
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn real_setup_on_foreign_address_fails_bind() {
        // TEST-NET-1, never assigned to a local interface
        let i = Interface::Address(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)));
        let e = setup_socket(i, &resolve(i)).unwrap_err();
        assert_eq!(e.syscall, Syscall::Bind);
        assert_eq!(e.interface, i);
    }

    #[tokio::test]
    #[cfg_attr(miri, ignore)]
    async fn provision_reports_bind_failure() {
        let i = Interface::Address(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)));
        let e = UdpTransport
            .provision(i, &resolve(i), 1900, b"M-SEARCH")
            .await
            .unwrap_err();
        assert_eq!(e.syscall, Syscall::Bind);
    }

    #[tokio::test]
    #[cfg_attr(miri, ignore)]
    async fn tokio_socket_receives() {
        let rx = tokio::net::UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let tx = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
        let rx_addr = DatagramSource::local_addr(&rx).unwrap();
        tx.send_to(b"foo", rx_addr).unwrap();

        let mut buf = [0u8; 1500];
        let (n, wasfrom) = rx.receive(&mut buf).await.unwrap().unwrap();
        assert_eq!(n, 3);
        assert_eq!(&buf[0..n], b"foo");
        assert_eq!(wasfrom, tx.local_addr().unwrap());
    }
}
