use crate::error::Error;
use crate::event::{DiscoveryEvent, Observer};
use crate::resolver::Interface;
use crate::session::{Command, Coordinator, SearchRequest, Status};
use crate::udp::{Transport, UdpTransport};
use futures::Stream;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::instrument::WithSubscriber;
use tracing::Dispatch;

/// How many requests may be waiting for the session task
const COMMAND_CHANNEL_CAPACITY: usize = 16;

/// Setting up a [`DiscoveryService`]
///
/// ```no_run
/// # async fn example() -> Result<(), ssdp_discovery::Error> {
/// use ssdp_discovery::{Builder, DiscoveryEvent, SearchRequest};
/// use futures_util::StreamExt;
///
/// let (service, mut events) = Builder::new().spawn_with_events();
/// service.discover(SearchRequest::new()).await?;
/// while let Some(event) = events.next().await {
///     match event {
///         DiscoveryEvent::Discovered(s) => println!("{} {:?}", s.host(), s.location()),
///         DiscoveryEvent::Finished { .. } => break,
///         DiscoveryEvent::Started => {}
///     }
/// }
/// # Ok(())
/// # }
/// ```
pub struct Builder<T: Transport = UdpTransport> {
    transport: T,
    dispatch: Option<Dispatch>,
}

impl Default for Builder<UdpTransport> {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder<UdpTransport> {
    /// A builder using real UDP sockets
    #[must_use]
    pub fn new() -> Self {
        Self {
            transport: UdpTransport,
            dispatch: None,
        }
    }
}

impl<T: Transport> Builder<T> {
    /// Use a different way of opening sockets
    #[must_use]
    pub fn transport<U: Transport>(self, transport: U) -> Builder<U> {
        Builder {
            transport,
            dispatch: self.dispatch,
        }
    }

    /// Send the service's log output to this subscriber
    ///
    /// By default, whichever subscriber is current when
    /// [`Builder::spawn`] is called gets it.
    #[must_use]
    pub fn dispatch(mut self, dispatch: Dispatch) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    /// Start the service, reporting progress to `observer`
    ///
    /// # Panics
    ///
    /// Will panic if called outside of a Tokio runtime.
    ///
    pub fn spawn<O: Observer>(self, observer: O) -> DiscoveryService {
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let coordinator = Coordinator::new(self.transport, Box::new(observer));
        let dispatch = self.dispatch.unwrap_or_else(Dispatch::default);
        tokio::spawn(coordinator.run(rx).with_subscriber(dispatch));
        DiscoveryService { commands: tx }
    }

    /// Start the service, reporting progress as a stream of events
    ///
    /// # Panics
    ///
    /// Will panic if called outside of a Tokio runtime.
    ///
    pub fn spawn_with_events(
        self,
    ) -> (DiscoveryService, impl Stream<Item = DiscoveryEvent>) {
        let (snd, rcv) = mpsc::unbounded_channel();
        (self.spawn(snd), UnboundedReceiverStream::new(rcv))
    }
}

/// Handle on a running discovery service
///
/// Each call is passed to the task which owns the session, so calls
/// from several places (clones of the handle) are handled one at a
/// time, in order. Only one session runs at once; when the last handle
/// is dropped, any running session is stopped and the task exits.
#[derive(Clone)]
pub struct DiscoveryService {
    commands: mpsc::Sender<Command>,
}

impl DiscoveryService {
    /// A service using real UDP sockets, reporting to `observer`
    ///
    /// # Panics
    ///
    /// Will panic if called outside of a Tokio runtime.
    ///
    pub fn new<O: Observer>(observer: O) -> Self {
        Builder::new().spawn(observer)
    }

    async fn call<R>(
        &self,
        make: impl FnOnce(oneshot::Sender<R>) -> Command,
    ) -> Result<R, Error> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(make(reply))
            .await
            .map_err(|_| Error::ServiceGone)?;
        response.await.map_err(|_| Error::ServiceGone)
    }

    /// Start a discovery session
    ///
    /// Returns once the search has been sent on every interface that
    /// could be set up, with the number of sockets now listening.
    /// Zero means no interface could be set up; the observer has then
    /// already been told the session is finished.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyRunning`] if a session is in progress, or
    /// [`Error::ServiceGone`] if the service task has exited.
    ///
    pub async fn discover(&self, request: SearchRequest) -> Result<usize, Error> {
        self.call(|reply| Command::Discover { request, reply })
            .await?
    }

    /// Start a discovery session, spelling out every parameter
    ///
    /// # Errors
    ///
    /// As [`DiscoveryService::discover`].
    ///
    pub async fn discover_service<A, I>(
        &self,
        duration: Duration,
        search_target: A,
        port: u16,
        interfaces: I,
    ) -> Result<usize, Error>
    where
        A: Into<String>,
        I: IntoIterator<Item = Interface>,
    {
        self.discover(
            SearchRequest::new()
                .with_duration(duration)
                .with_search_target(search_target)
                .with_port(port)
                .with_interfaces(interfaces),
        )
        .await
    }

    /// End the current session early
    ///
    /// Does nothing if no session is running. Otherwise all sockets
    /// are closed before this returns, and the observer hears that the
    /// session is finished.
    ///
    /// # Errors
    ///
    /// [`Error::ServiceGone`] if the service task has exited.
    ///
    pub async fn stop(&self) -> Result<(), Error> {
        self.call(|reply| Command::Stop { reply }).await
    }

    /// Current state of the session
    ///
    /// # Errors
    ///
    /// [`Error::ServiceGone`] if the service task has exited.
    ///
    pub async fn status(&self) -> Result<Status, Error> {
        self.call(|reply| Command::Status { reply }).await
    }
}
