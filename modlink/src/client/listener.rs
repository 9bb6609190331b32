use tokio::sync::mpsc;

use crate::client::Notification;
use crate::error::Shutdown;
use crate::MaybeAsync;

/// A generic listener type that can be invoked multiple times
pub trait Listener<T>: Send {
    /// inform the listener of a new value
    fn update(&mut self, _value: T) -> MaybeAsync<()> {
        MaybeAsync::ready(())
    }
}

/// Behavior of the default notification channel when it is full
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// wait for room, which pauses the client task until the receiver catches up
    #[default]
    Block,
    /// log and discard the notification that does not fit
    DropNewest,
}

/// Receiving end of the default notification channel
pub struct Notifications {
    rx: crate::channel::Receiver<Notification>,
}

impl Notifications {
    /// wait for the next notification
    ///
    /// Fails once the client task has stopped or its notify target was replaced.
    pub async fn recv(&mut self) -> Result<Notification, Shutdown> {
        self.rx.recv().await
    }
}

pub(crate) struct ChannelListener {
    tx: mpsc::Sender<Notification>,
    overflow: OverflowPolicy,
}

impl ChannelListener {
    pub(crate) fn create(capacity: usize, overflow: OverflowPolicy) -> (Self, Notifications) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx, overflow }, Notifications { rx: rx.into() })
    }
}

impl Listener<Notification> for ChannelListener {
    fn update(&mut self, value: Notification) -> MaybeAsync<()> {
        match self.overflow {
            OverflowPolicy::Block => {
                let tx = self.tx.clone();
                MaybeAsync::asynchronous(async move {
                    // receiver dropped, nobody is interested
                    let _ = tx.send(value).await;
                })
            }
            OverflowPolicy::DropNewest => {
                if let Err(mpsc::error::TrySendError::Full(value)) = self.tx.try_send(value) {
                    tracing::warn!(
                        "notification queue is full, dropping response to tx id {}",
                        value.tx_id
                    );
                }
                MaybeAsync::ready(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Command;
    use crate::common::frame::TxId;
    use crate::types::UnitId;

    fn notification(id: u16) -> Notification {
        Notification {
            tx_id: TxId::new(id),
            command: Command::write_single_coil(UnitId::new(1), 0, true),
            result: Ok(None),
        }
    }

    #[tokio::test]
    async fn drop_newest_discards_when_full() {
        let (mut listener, mut notifications) =
            ChannelListener::create(1, OverflowPolicy::DropNewest);
        listener.update(notification(1)).get().await;
        listener.update(notification(2)).get().await;
        drop(listener);

        assert_eq!(notifications.recv().await.unwrap().tx_id, TxId::new(1));
        assert_eq!(notifications.recv().await, Err(Shutdown));
    }

    #[tokio::test]
    async fn block_waits_for_room() {
        let (mut listener, mut notifications) = ChannelListener::create(1, OverflowPolicy::Block);
        listener.update(notification(1)).get().await;
        let second = tokio::spawn(listener.update(notification(2)).get());

        assert_eq!(notifications.recv().await.unwrap().tx_id, TxId::new(1));
        second.await.unwrap();
        assert_eq!(notifications.recv().await.unwrap().tx_id, TxId::new(2));
    }
}
