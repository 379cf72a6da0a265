use crate::error::Error;
use crate::event::{DiscoveredService, Observer};
use crate::message::build_search;
use crate::reader;
use crate::resolver::{resolve, Interface, MulticastTarget, SSDP_PORT};
use crate::udp::{DatagramSource, Transport};
use std::net::SocketAddr;
use std::pin::Pin;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::instrument::WithSubscriber;
use tracing::{debug, info, warn};

/// How many replies may queue up between the readers and the session
const SERVICE_CHANNEL_CAPACITY: usize = 64;

/// What to search for, where, and for how long
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    /// How long to listen for replies; also sent, in whole seconds,
    /// as the MX wait hint
    pub duration: Duration,

    /// The ST header: "ssdp:all", "upnp:rootdevice", a device or
    /// service type URN, or a "uuid:..." device identifier
    pub search_target: String,

    /// Destination port of the search
    pub port: u16,

    /// Interfaces to search on; one socket each
    pub interfaces: Vec<Interface>,
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(10),
            search_target: "ssdp:all".to_string(),
            port: SSDP_PORT,
            interfaces: vec![Interface::Default],
        }
    }
}

impl SearchRequest {
    /// Search for everything, on the default interface, for ten seconds
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen for this long
    #[must_use]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Search for this target
    #[must_use]
    pub fn with_search_target<A: Into<String>>(mut self, search_target: A) -> Self {
        self.search_target = search_target.into();
        self
    }

    /// Send to this port instead of 1900
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Search on exactly these interfaces
    #[must_use]
    pub fn with_interfaces<I>(mut self, interfaces: I) -> Self
    where
        I: IntoIterator<Item = Interface>,
    {
        self.interfaces = interfaces.into_iter().collect();
        self
    }

    /// The MX value: the duration truncated to whole seconds
    #[must_use]
    pub fn wait_hint(&self) -> u64 {
        self.duration.as_secs()
    }
}

/// Lifecycle of a discovery session
///
/// `Starting` and `Stopping` only exist in the middle of handling a
/// request, so from outside only `Idle` and `Listening` are ever seen.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// No session; a new one may be started
    Idle,
    /// Setting up sockets and sending searches
    Starting,
    /// Sockets open, readers collecting replies
    Listening,
    /// Closing sockets
    Stopping,
}

/// A snapshot of the session, see [`DiscoveryService::status`](crate::DiscoveryService::status)
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Status {
    /// Current lifecycle state
    pub state: SessionState,

    /// Number of sockets currently open
    pub open_sockets: usize,
}

pub(crate) enum Command {
    Discover {
        request: SearchRequest,
        reply: oneshot::Sender<Result<usize, Error>>,
    },
    Stop {
        reply: oneshot::Sender<()>,
    },
    Status {
        reply: oneshot::Sender<Status>,
    },
}

/// One open socket, and the task reading from it
///
/// The reader task owns the socket itself, so aborting and reaping
/// the task is what closes the socket.
struct SocketBinding {
    interface: Interface,
    target: MulticastTarget,
    local: Option<SocketAddr>,
    reader: JoinHandle<()>,
}

impl SocketBinding {
    async fn close(self) {
        self.reader.abort();
        match self.reader.await {
            Err(e) if e.is_panic() => {
                warn!(interface = %self.interface, "reader panicked");
            }
            _ => debug!(
                interface = %self.interface,
                family = ?self.target.family,
                local = ?self.local,
                "socket closed"
            ),
        }
    }
}

struct Listening {
    sockets: Vec<SocketBinding>,
    services: mpsc::Receiver<DiscoveredService>,
    readers_done: bool,
    deadline: Pin<Box<tokio::time::Sleep>>,
}

enum Wakeup {
    Discovered(DiscoveredService),
    Deadline,
}

impl Listening {
    async fn next(&mut self) -> Wakeup {
        loop {
            let received = tokio::select! {
                s = self.services.recv(), if !self.readers_done => s,
                () = &mut self.deadline => return Wakeup::Deadline,
            };
            match received {
                Some(service) => return Wakeup::Discovered(service),
                None => {
                    // Every reader has failed; wait out the deadline
                    debug!("no readers left");
                    self.readers_done = true;
                }
            }
        }
    }
}

enum Input {
    Command(Command),
    Wakeup(Wakeup),
}

/// The owner of a discovery session
///
/// Runs as a single task: every change to the session happens here,
/// in response to a command or to one of its own wakeups (a reply
/// arriving, or the deadline passing).
pub(crate) struct Coordinator<T: Transport> {
    transport: T,
    observer: Box<dyn Observer>,
    state: SessionState,
    listening: Option<Listening>,
}

impl<T: Transport> Coordinator<T> {
    pub(crate) fn new(transport: T, observer: Box<dyn Observer>) -> Self {
        Self {
            transport,
            observer,
            state: SessionState::Idle,
            listening: None,
        }
    }

    async fn wait(listening: &mut Option<Listening>) -> Wakeup {
        match listening {
            Some(l) => l.next().await,
            None => std::future::pending().await,
        }
    }

    /// Serve commands until every handle has been dropped
    pub(crate) async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        loop {
            let input = tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => Input::Command(command),
                    None => break,
                },
                wakeup = Self::wait(&mut self.listening) => Input::Wakeup(wakeup),
            };

            match input {
                Input::Command(Command::Discover { request, reply }) => {
                    let result = self.start(request).await;
                    let _ = reply.send(result);
                }
                Input::Command(Command::Stop { reply }) => {
                    self.stop().await;
                    let _ = reply.send(());
                }
                Input::Command(Command::Status { reply }) => {
                    let _ = reply.send(self.status());
                }
                Input::Wakeup(Wakeup::Discovered(service)) => {
                    self.observer.on_service_discovered(&service);
                }
                Input::Wakeup(Wakeup::Deadline) => {
                    debug!("search duration elapsed");
                    self.stop().await;
                }
            }
        }
        self.stop().await;
        debug!("discovery service shut down");
    }

    fn status(&self) -> Status {
        Status {
            state: self.state,
            open_sockets: self.listening.as_ref().map_or(0, |l| l.sockets.len()),
        }
    }

    async fn start(&mut self, request: SearchRequest) -> Result<usize, Error> {
        if self.state != SessionState::Idle {
            warn!("discovery already running");
            return Err(Error::AlreadyRunning);
        }
        self.state = SessionState::Starting;
        info!(
            search_target = %request.search_target,
            port = request.port,
            duration = ?request.duration,
            "discovery started"
        );
        self.observer.on_discovery_started();

        let mut provisioned = Vec::with_capacity(request.interfaces.len());
        for &interface in &request.interfaces {
            let target = resolve(interface);
            let message = build_search(
                &request.search_target,
                target.group,
                request.port,
                request.wait_hint(),
            );
            match self
                .transport
                .provision(interface, &target, request.port, message.as_bytes())
                .await
            {
                Ok(socket) => provisioned.push((interface, target, socket)),
                Err(e) => warn!(
                    %interface,
                    error = %e,
                    cause = %e.source,
                    "skipping interface"
                ),
            }
        }

        if provisioned.is_empty() {
            warn!("no interface could be set up");
            self.state = SessionState::Idle;
            self.observer.on_discovery_finished(true);
            return Ok(0);
        }

        let (tx, rx) = mpsc::channel(SERVICE_CHANNEL_CAPACITY);
        let sockets = provisioned
            .into_iter()
            .map(|(interface, target, socket)| {
                let local = socket.local_addr().ok();
                debug!(%interface, group = %target.group, ?local, "search sent");
                let reader = tokio::spawn(
                    reader::run(socket, interface, tx.clone())
                        .with_current_subscriber(),
                );
                SocketBinding {
                    interface,
                    target,
                    local,
                    reader,
                }
            })
            .collect::<Vec<_>>();

        let count = sockets.len();
        self.listening = Some(Listening {
            sockets,
            services: rx,
            readers_done: false,
            deadline: Box::pin(tokio::time::sleep(request.duration)),
        });
        self.state = SessionState::Listening;
        info!(sockets = count, "listening for replies");
        Ok(count)
    }

    async fn stop(&mut self) {
        let Some(mut listening) = self.listening.take() else {
            return;
        };
        self.state = SessionState::Stopping;

        for binding in &listening.sockets {
            binding.reader.abort();
        }
        for binding in listening.sockets.drain(..) {
            binding.close().await;
        }

        // Replies which arrived before the sockets closed still count
        while let Ok(service) = listening.services.try_recv() {
            self.observer.on_service_discovered(&service);
        }
        drop(listening);

        self.state = SessionState::Idle;
        info!("discovery finished");
        self.observer.on_discovery_finished(false);
    }
}
