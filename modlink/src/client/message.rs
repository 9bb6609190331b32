use tokio::sync::oneshot;

use crate::client::{ClientOptions, ClientState, Listener, Notification};
use crate::command::{Command, Values};
use crate::common::frame::TxId;
use crate::error::RequestError;

/// messages sent from the handles to the client task
pub(crate) enum Message {
    Connect(Promise<()>),
    Close(Promise<()>),
    Configure(Box<ClientOptions>, Promise<()>),
    SetNotifyTarget(Box<dyn Listener<Notification>>, Promise<()>),
    Request(Command, Promise<TxId>),
    Confirmation(Promise<Option<Values>>),
    Flush(Promise<Vec<(TxId, Command)>>),
    State(Promise<ClientState>),
}

pub(crate) struct Promise<T> {
    sender: oneshot::Sender<Result<T, RequestError>>,
}

impl<T> Promise<T> {
    pub(crate) fn new(sender: oneshot::Sender<Result<T, RequestError>>) -> Self {
        Self { sender }
    }

    pub(crate) fn complete(self, result: Result<T, RequestError>) {
        // the caller may have stopped waiting
        self.sender.send(result).ok();
    }
}
