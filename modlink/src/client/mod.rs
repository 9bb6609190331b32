//! TCP client with request/confirm (passive) and push-notification (active) delivery
//!
//! Each client is a single tokio task that owns the connection and every piece of
//! connection state. A cloneable [`TcpClient`] handle sends messages to the task and
//! awaits the reply, so operations never run concurrently with each other or with
//! the processing of inbound frames.
//!
//! In passive mode one request may be outstanding and its response is retrieved with
//! [`TcpClient::confirmation`]. In active mode any number of requests may be
//! outstanding, they are correlated by transaction id, and each response is pushed to
//! the notify target as a [`Notification`].

use std::time::Duration;

use tracing::Instrument;

use crate::command::{Command, Values};
use crate::common::frame::TxId;
use crate::decode::DecodeLevel;
use crate::error::RequestError;

mod channel;
mod listener;
mod message;
mod task;

pub use channel::TcpClient;
pub use listener::{Listener, Notifications, OverflowPolicy};

/// Settings of a TCP client
///
/// `max_queued_requests`, `notification_capacity` and `overflow` are consumed when the
/// client is spawned. The remaining fields can be replaced with
/// [`TcpClient::configure`] while the connection is closed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientOptions {
    /// host name or IP address of the device
    pub host: String,
    /// TCP port of the device
    pub port: u16,
    /// bound on connecting and on waiting for a passive-mode confirmation
    pub timeout: Duration,
    /// push responses to the notify target instead of waiting for `confirmation`
    pub active: bool,
    /// protocol decoding written to the log
    pub decode: DecodeLevel,
    /// depth of the message queue between the handles and the task
    pub max_queued_requests: usize,
    /// depth of the default notification channel
    pub notification_capacity: usize,
    /// what to do when the default notification channel is full
    pub overflow: OverflowPolicy,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 502,
            timeout: Duration::from_secs(1),
            active: false,
            decode: DecodeLevel::default(),
            max_queued_requests: 16,
            notification_capacity: 16,
            overflow: OverflowPolicy::default(),
        }
    }
}

impl ClientOptions {
    /// default options targeting `host:port`
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// change the connect and confirmation timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// select active (push) or passive (request/confirm) delivery
    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// change the decode level
    pub fn decode(mut self, decode: DecodeLevel) -> Self {
        self.decode = decode;
        self
    }

    /// change the depth of the message queue
    pub fn max_queued_requests(mut self, count: usize) -> Self {
        self.max_queued_requests = count;
        self
    }

    /// change the depth and overflow behavior of the default notification channel
    pub fn notifications(mut self, capacity: usize, overflow: OverflowPolicy) -> Self {
        self.notification_capacity = capacity;
        self.overflow = overflow;
        self
    }
}

/// Whether the client currently holds a connection
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// no connection
    Closed,
    /// connection established
    Connected,
}

/// Snapshot of the client state returned by [`TcpClient::state`]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ClientState {
    /// connection status
    pub status: ConnectionStatus,
    /// transaction id the next request will use
    pub next_tx_id: TxId,
    /// number of active-mode requests awaiting a response
    pub pending: usize,
    /// active (push) delivery
    pub active: bool,
    /// a passive-mode request is awaiting `confirmation`
    pub request_in_flight: bool,
}

/// A response delivered to the notify target in active mode
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notification {
    /// transaction id the request was sent with
    pub tx_id: TxId,
    /// the request this responds to
    pub command: Command,
    /// decoded values, `None` for write acknowledgements
    pub result: Result<Option<Values>, RequestError>,
}

/// Spawn a client task on the current runtime, delivering notifications to a bounded channel
///
/// The connection starts closed, call [`TcpClient::connect`] to open it. The task
/// stops once every handle is dropped.
///
/// Must be called from within a tokio runtime.
pub fn spawn_tcp_client(options: ClientOptions) -> (TcpClient, Notifications) {
    let (listener, notifications) =
        listener::ChannelListener::create(options.notification_capacity, options.overflow);
    let client = spawn_tcp_client_with_listener(options, Box::new(listener));
    (client, notifications)
}

/// Spawn a client task on the current runtime, delivering notifications to `listener`
///
/// Must be called from within a tokio runtime.
pub fn spawn_tcp_client_with_listener(
    options: ClientOptions,
    listener: Box<dyn Listener<Notification>>,
) -> TcpClient {
    let (client, task) = create_tcp_client(options, listener);
    tokio::spawn(task);
    client
}

/// Create a client handle and the future that runs its task, without spawning it
///
/// This allows the caller to spawn the task on a runtime of its choosing.
pub fn create_tcp_client(
    options: ClientOptions,
    listener: Box<dyn Listener<Notification>>,
) -> (TcpClient, impl std::future::Future<Output = ()> + Send + 'static) {
    let (tx, rx) = tokio::sync::mpsc::channel(options.max_queued_requests.max(1));
    let endpoint = format!("{}:{}", options.host, options.port);
    let span = tracing::info_span!("Modbus-Client-TCP", endpoint = %endpoint);
    let mut task = task::ClientTask::new(options, rx.into(), listener);
    let future = async move {
        task.run().await;
    }
    .instrument(span);
    (TcpClient::new(tx), future)
}
