use crate::message;
use std::net::IpAddr;
use tokio::sync::mpsc;

/// One reply to a search, as received
///
/// Sent by devices in response to an M-SEARCH, usually in the shape of
/// an HTTP response. Nothing is parsed up front: the raw text is kept,
/// and the accessor methods pick headers out of it on demand.
///
/// No de-duplication is done -- a device replying on several
/// interfaces, or for several service types, shows up several times.
/// The `unique_service_name` can be used to tell them apart.
///
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredService {
    host: IpAddr,
    response: String,
}

impl DiscoveredService {
    /// Wrap a received reply
    #[must_use]
    pub fn new(host: IpAddr, response: String) -> Self {
        Self { host, response }
    }

    /// Address the reply came from
    #[must_use]
    pub fn host(&self) -> IpAddr {
        self.host
    }

    /// The reply text, verbatim
    #[must_use]
    pub fn response(&self) -> &str {
        &self.response
    }

    /// First line of the reply, e.g. "HTTP/1.1 200 OK"
    #[must_use]
    pub fn status_line(&self) -> Option<&str> {
        message::status_line(&self.response)
    }

    /// Value of any header, matched case-insensitively
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        message::header(&self.response, name)
    }

    /// The USN header: unique identifier of the resource
    #[must_use]
    pub fn unique_service_name(&self) -> Option<&str> {
        self.header("USN")
    }

    /// The LOCATION header: for UPnP, URL of the description document
    #[must_use]
    pub fn location(&self) -> Option<&str> {
        self.header("LOCATION")
    }

    /// The SERVER header
    #[must_use]
    pub fn server(&self) -> Option<&str> {
        self.header("SERVER")
    }

    /// The ST header: which search target this reply matches
    #[must_use]
    pub fn search_target(&self) -> Option<&str> {
        self.header("ST")
    }
}

/// Receiving the progress of a discovery session
///
/// Every method has a do-nothing default, so implementors need only
/// override the ones they care about. All calls are made from the task
/// which owns the session, in the order started, discovered (zero or
/// more times), finished.
pub trait Observer: Send + 'static {
    /// A session has begun; sockets are about to be set up
    fn on_discovery_started(&mut self) {}

    /// A reply to the search has arrived
    fn on_service_discovered(&mut self, _service: &DiscoveredService) {}

    /// The session is over
    ///
    /// `no_sockets_available` is set if no interface at all could be
    /// set up -- often a sign that the process lacks permission to use
    /// the network.
    fn on_discovery_finished(&mut self, _no_sockets_available: bool) {}
}

/// Observer that ignores everything
impl Observer for () {}

/// Session progress as a value, see [`Builder::spawn_with_events`](crate::Builder::spawn_with_events)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    /// See [`Observer::on_discovery_started`]
    Started,

    /// See [`Observer::on_service_discovered`]
    Discovered(DiscoveredService),

    /// See [`Observer::on_discovery_finished`]
    Finished {
        /// No interface could be set up
        no_sockets_available: bool,
    },
}

impl Observer for mpsc::UnboundedSender<DiscoveryEvent> {
    fn on_discovery_started(&mut self) {
        let _ = self.send(DiscoveryEvent::Started);
    }

    fn on_service_discovered(&mut self, service: &DiscoveredService) {
        let _ = self.send(DiscoveryEvent::Discovered(service.clone()));
    }

    fn on_discovery_finished(&mut self, no_sockets_available: bool) {
        let _ = self.send(DiscoveryEvent::Finished {
            no_sockets_available,
        });
    }
}
