use tokio::sync::{mpsc, oneshot};

use crate::client::message::{Message, Promise};
use crate::client::{ClientOptions, ClientState, Listener, Notification};
use crate::command::{Command, Values};
use crate::common::frame::TxId;
use crate::error::RequestError;

/// Handle to a client task
///
/// Handles are cheap to clone. Every operation is a message to the task, answered
/// once the task has processed it. All operations fail with
/// [`RequestError::Shutdown`] if the task has stopped.
#[derive(Clone, Debug)]
pub struct TcpClient {
    tx: mpsc::Sender<Message>,
}

impl TcpClient {
    pub(crate) fn new(tx: mpsc::Sender<Message>) -> Self {
        Self { tx }
    }

    /// Open the connection, bounded by the configured timeout
    pub async fn connect(&self) -> Result<(), RequestError> {
        self.send(Message::Connect).await
    }

    /// Close the connection
    ///
    /// Active-mode requests awaiting a response stay pending, see [`TcpClient::flush`].
    pub async fn close(&self) -> Result<(), RequestError> {
        self.send(Message::Close).await
    }

    /// Replace the endpoint, timeout, delivery mode and decode level. Only while closed.
    pub async fn configure(&self, options: ClientOptions) -> Result<(), RequestError> {
        let options = Box::new(options);
        self.send(|promise| Message::Configure(options, promise))
            .await
    }

    /// Replace the target of active-mode notifications. Only while closed.
    pub async fn set_notify_target(
        &self,
        listener: Box<dyn Listener<Notification>>,
    ) -> Result<(), RequestError> {
        self.send(|promise| Message::SetNotifyTarget(listener, promise))
            .await
    }

    /// Send a request, returning the transaction id it was sent with
    ///
    /// In passive mode the response is retrieved with [`TcpClient::confirmation`]. In
    /// active mode it is delivered to the notify target.
    pub async fn request(&self, command: Command) -> Result<TxId, RequestError> {
        self.send(|promise| Message::Request(command, promise))
            .await
    }

    /// Wait for the response to the outstanding passive-mode request
    ///
    /// Returns `None` for write acknowledgements.
    pub async fn confirmation(&self) -> Result<Option<Values>, RequestError> {
        self.send(Message::Confirmation).await
    }

    /// Remove and return every active-mode request awaiting a response, ordered by id
    pub async fn flush(&self) -> Result<Vec<(TxId, Command)>, RequestError> {
        self.send(Message::Flush).await
    }

    /// Snapshot of the connection state
    pub async fn state(&self) -> Result<ClientState, RequestError> {
        self.send(Message::State).await
    }

    async fn send<T, F>(&self, create: F) -> Result<T, RequestError>
    where
        F: FnOnce(Promise<T>) -> Message,
    {
        let (tx, rx) = oneshot::channel();
        self.tx.send(create(Promise::new(tx))).await?;
        rx.await?
    }
}
