use crate::error::DatagramError;
use crate::event::DiscoveredService;
use crate::resolver::Interface;
use crate::udp::DatagramSource;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// Largest possible UDP payload
const MAX_DATAGRAM_SIZE: usize = 65_536;

/// Turn one datagram into text; each datagram is one whole message
pub(crate) fn decode(payload: &[u8]) -> Result<&str, DatagramError> {
    if payload.is_empty() {
        return Err(DatagramError::Empty);
    }
    Ok(core::str::from_utf8(payload)?)
}

/// Read replies from one socket until it closes or fails
///
/// Owns the socket: when this future is dropped (the session aborting
/// the task) the socket is closed, which is the normal way for a
/// reader to end. Returns early if the session stops listening for
/// services.
pub(crate) async fn run<S: DatagramSource>(
    socket: S,
    interface: Interface,
    services: mpsc::Sender<DiscoveredService>,
) {
    let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];
    loop {
        let received = socket.receive(&mut buf).await;
        match received {
            Ok(Some((n, wasfrom))) => match decode(&buf[0..n]) {
                Ok(text) => {
                    trace!(%wasfrom, "{text}");
                    let service =
                        DiscoveredService::new(wasfrom.ip(), text.to_string());
                    if services.send(service).await.is_err() {
                        return;
                    }
                }
                Err(e) => debug!(%interface, %wasfrom, error = %e, "dropping datagram"),
            },
            Ok(None) => {
                debug!(%interface, "socket closed");
                return;
            }
            Err(e) => {
                warn!(%interface, error = %e, "receive failed, no more replies on this interface");
                return;
            }
        }
    }
}
