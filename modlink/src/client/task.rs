use std::collections::BTreeMap;

use tracing::Instrument;

use crate::channel::Receiver;
use crate::client::message::Message;
use crate::client::{ClientOptions, ClientState, ConnectionStatus, Listener, Notification};
use crate::codec::{decode_response, encode_request};
use crate::command::{Command, CommandDisplay, Values, ValuesDisplay};
use crate::common::frame::{Frame, FrameHeader, FramedReader, TxId};
use crate::common::phys::PhysLayer;
use crate::error::{AduParseError, FrameParseError, RequestError, Shutdown, StateError};
use crate::maybe_async::BoxFuture;
use crate::tcp::frame::{MbapDisplay, MbapParser};

/// the passive-mode request awaiting `confirmation`
struct InFlight {
    command: Command,
    expected_length: usize,
}

enum Event {
    Message(Message),
    Frame(Result<Frame, RequestError>),
    Delivered,
}

pub(crate) struct ClientTask {
    rx: Receiver<Message>,
    options: ClientOptions,
    listener: Box<dyn Listener<Notification>>,
    tx_id: TxId,
    io: Option<PhysLayer>,
    reader: FramedReader<MbapParser>,
    pending: BTreeMap<TxId, Command>,
    in_flight: Option<InFlight>,
    // notification the listener has not accepted yet
    delivery: Option<BoxFuture<()>>,
}

impl ClientTask {
    pub(crate) fn new(
        options: ClientOptions,
        rx: Receiver<Message>,
        listener: Box<dyn Listener<Notification>>,
    ) -> Self {
        Self {
            rx,
            options,
            listener,
            tx_id: TxId::default(),
            io: None,
            reader: FramedReader::new(MbapParser::new()),
            pending: BTreeMap::new(),
            in_flight: None,
            delivery: None,
        }
    }

    pub(crate) async fn run(&mut self) {
        while self.poll().await.is_ok() {}

        if let Some(mut io) = self.io.take() {
            io.shutdown().await;
        }
        tracing::info!("client task shut down");
    }

    async fn poll(&mut self) -> Result<(), Shutdown> {
        let decode = self.options.decode;
        let event = match (self.delivery.as_mut(), self.io.as_mut()) {
            // no more frames are read until the listener accepts the last notification
            (Some(delivery), _) => tokio::select! {
                _ = delivery => Event::Delivered,
                message = self.rx.recv() => Event::Message(message?),
            },
            // only read unsolicited frames in active mode
            (None, Some(io)) if self.options.active => tokio::select! {
                frame = self.reader.next_frame(io, decode) => Event::Frame(frame),
                message = self.rx.recv() => Event::Message(message?),
            },
            _ => Event::Message(self.rx.recv().await?),
        };

        match event {
            Event::Message(message) => self.handle_message(message).await,
            Event::Frame(frame) => self.handle_frame(frame),
            Event::Delivered => self.delivery = None,
        }

        Ok(())
    }

    async fn handle_message(&mut self, message: Message) {
        match message {
            Message::Connect(promise) => promise.complete(self.connect().await),
            Message::Close(promise) => promise.complete(self.close().await),
            Message::Configure(options, promise) => promise.complete(self.configure(*options)),
            Message::SetNotifyTarget(listener, promise) => {
                promise.complete(self.set_notify_target(listener))
            }
            Message::Request(command, promise) => {
                let tx_id = self.tx_id;
                let result = self
                    .request(command)
                    .instrument(tracing::info_span!("Transaction", tx_id = %tx_id))
                    .await;
                if let Err(err) = &result {
                    tracing::warn!("request error: {}", err);
                }
                promise.complete(result)
            }
            Message::Confirmation(promise) => {
                let tx_id = self.tx_id;
                let result = self
                    .confirmation()
                    .instrument(tracing::info_span!("Transaction", tx_id = %tx_id))
                    .await;
                promise.complete(result)
            }
            Message::Flush(promise) => promise.complete(Ok(self.flush())),
            Message::State(promise) => promise.complete(Ok(self.state())),
        }
    }

    pub(crate) fn attach(&mut self, io: PhysLayer) {
        self.reader.reset();
        self.io = Some(io);
    }

    async fn connect(&mut self) -> Result<(), RequestError> {
        if self.io.is_some() {
            return Err(StateError::AlreadyConnected.into());
        }

        let endpoint = (self.options.host.as_str(), self.options.port);
        let connect = tokio::net::TcpStream::connect(endpoint);
        let socket = match tokio::time::timeout(self.options.timeout, connect).await {
            Ok(Ok(socket)) => socket,
            Ok(Err(err)) => {
                tracing::warn!("failed to connect: {}", err);
                return Err(err.into());
            }
            Err(_) => {
                tracing::warn!("connect timed out after {:?}", self.options.timeout);
                return Err(RequestError::ResponseTimeout);
            }
        };

        if let Err(err) = socket.set_nodelay(true) {
            tracing::warn!("unable to enable TCP_NODELAY: {}", err);
        }

        tracing::info!("connected to {}:{}", self.options.host, self.options.port);
        self.attach(PhysLayer::new_tcp(socket));
        Ok(())
    }

    async fn close(&mut self) -> Result<(), RequestError> {
        match self.io.as_mut() {
            None => Err(StateError::AlreadyClosed.into()),
            Some(io) => {
                io.shutdown().await;
                self.disconnect();
                tracing::info!("connection closed");
                Ok(())
            }
        }
    }

    /// drop the connection and anything tied to it
    fn disconnect(&mut self) {
        self.io = None;
        self.in_flight = None;
        self.reader.reset();
    }

    fn configure(&mut self, options: ClientOptions) -> Result<(), RequestError> {
        if self.io.is_some() {
            return Err(StateError::Connected.into());
        }
        self.options = options;
        Ok(())
    }

    fn set_notify_target(
        &mut self,
        listener: Box<dyn Listener<Notification>>,
    ) -> Result<(), RequestError> {
        if self.io.is_some() {
            return Err(StateError::Connected.into());
        }
        self.listener = listener;
        Ok(())
    }

    async fn request(&mut self, command: Command) -> Result<TxId, RequestError> {
        let decode = self.options.decode;
        let io = match self.io.as_mut() {
            Some(io) => io,
            None => return Err(StateError::Closed.into()),
        };

        let payload = encode_request(&command)?;
        let tx_id = self.tx_id;
        let header = FrameHeader::new(command.unit_id(), tx_id);
        let frame = crate::tcp::frame::wrap(&payload, tx_id, header.unit_id)?;

        if decode.app.enabled() {
            tracing::info!("PDU TX - {}", CommandDisplay::new(decode.app, &command));
        }
        if decode.frame.enabled() {
            tracing::info!(
                "MBAP TX - {}",
                MbapDisplay::new(decode.frame, header, &payload)
            );
        }

        let result = io.write(&frame, decode.physical).await;
        if let Err(err) = result {
            let err = RequestError::from(err);
            if err.is_disconnect() {
                tracing::warn!("closing connection after send failure: {}", err);
                self.disconnect();
            }
            return Err(err);
        }

        if self.options.active {
            self.pending.insert(tx_id, command);
            self.tx_id.next();
        } else {
            let expected_length = crate::tcp::frame::response_length(&command);
            if let Some(previous) = self.in_flight.replace(InFlight {
                command,
                expected_length,
            }) {
                tracing::warn!("unconfirmed request replaced: {}", previous.command);
            }
        }

        Ok(tx_id)
    }

    async fn confirmation(&mut self) -> Result<Option<Values>, RequestError> {
        if self.options.active {
            return Err(StateError::WrongMode.into());
        }
        if self.io.is_none() {
            return Err(StateError::Closed.into());
        }
        let in_flight = match self.in_flight.take() {
            Some(x) => x,
            None => return Err(StateError::NoRequestInFlight.into()),
        };

        let timeout = self.options.timeout;
        let receive = self.receive(in_flight.expected_length);
        let bytes = match tokio::time::timeout(timeout, receive).await {
            Ok(Ok(bytes)) => bytes,
            Ok(Err(err)) => {
                tracing::warn!("closing connection after receive failure: {}", err);
                self.disconnect();
                return Err(err);
            }
            Err(_) => {
                tracing::warn!("no response within {:?}, closing connection", timeout);
                self.disconnect();
                return Err(RequestError::ResponseTimeout);
            }
        };

        // the bytes are consumed whether or not they decode
        let expected = self.tx_id.next();
        let result = self.decode_confirmation(expected, &in_flight.command, &bytes);
        if let Err(err) = &result {
            tracing::warn!("bad confirmation: {}", err);
        }
        result
    }

    fn decode_confirmation(
        &self,
        expected: TxId,
        command: &Command,
        bytes: &[u8],
    ) -> Result<Option<Values>, RequestError> {
        let decode = self.options.decode;
        let (tx_id, unit_id, payload) = crate::tcp::frame::unwrap(bytes)?;

        if decode.frame.enabled() {
            tracing::info!(
                "MBAP RX - {}",
                MbapDisplay::new(decode.frame, FrameHeader::new(unit_id, tx_id), payload)
            );
        }

        if tx_id != expected {
            return Err(FrameParseError::TxIdMismatch(tx_id.to_u16(), expected.to_u16()).into());
        }

        self.decode_payload(command, payload)
    }

    fn decode_payload(
        &self,
        command: &Command,
        payload: &[u8],
    ) -> Result<Option<Values>, RequestError> {
        let (values, trailing) = decode_response(command, payload)?;
        if !trailing.is_empty() {
            return Err(AduParseError::TrailingBytes(trailing.len()).into());
        }

        let level = self.options.decode.app;
        if level.enabled() {
            tracing::info!(
                "PDU RX - {} {}",
                command.function(),
                ValuesDisplay::new(level, command.start_address(), values.as_ref())
            );
        }

        Ok(values)
    }

    /// read the MBAP header and function code, then the rest of the expected response
    async fn receive(&mut self, expected_length: usize) -> Result<Vec<u8>, RequestError> {
        const PREFIX_LENGTH: usize = crate::tcp::frame::constants::HEADER_LENGTH + 1;

        let physical = self.options.decode.physical;
        let io = match self.io.as_mut() {
            Some(io) => io,
            None => return Err(StateError::Closed.into()),
        };

        let mut buffer = vec![0u8; PREFIX_LENGTH];
        read_exact(io, &mut buffer, physical).await?;

        // exception responses carry a single exception code after the function code
        let total = if buffer[PREFIX_LENGTH - 1] & 0x80 != 0 {
            PREFIX_LENGTH + 1
        } else {
            expected_length.max(PREFIX_LENGTH)
        };

        buffer.resize(total, 0);
        read_exact(io, &mut buffer[PREFIX_LENGTH..], physical).await?;
        Ok(buffer)
    }

    fn handle_frame(&mut self, frame: Result<Frame, RequestError>) {
        let frame = match frame {
            Ok(frame) => frame,
            Err(err) => {
                tracing::warn!("closing connection: {}", err);
                self.disconnect();
                return;
            }
        };

        let decode = self.options.decode;
        if decode.frame.enabled() {
            tracing::info!(
                "MBAP RX - {}",
                MbapDisplay::new(decode.frame, frame.header, frame.payload())
            );
        }

        let tx_id = frame.header.tx_id;
        let command = match self.pending.remove(&tx_id) {
            Some(command) => command,
            None => {
                tracing::warn!(
                    "dropping response: {}",
                    FrameParseError::UnknownTransactionId(tx_id.to_u16())
                );
                return;
            }
        };

        let result = self.decode_payload(&command, frame.payload());
        if let Err(err) = &result {
            tracing::warn!("bad response to tx id {}: {}", tx_id, err);
        }

        let update = self.listener.update(Notification {
            tx_id,
            command,
            result,
        });
        if let Err(delivery) = update.into_ready() {
            self.delivery = Some(delivery);
        }
    }

    fn flush(&mut self) -> Vec<(TxId, Command)> {
        std::mem::take(&mut self.pending).into_iter().collect()
    }

    fn state(&self) -> ClientState {
        ClientState {
            status: if self.io.is_some() {
                ConnectionStatus::Connected
            } else {
                ConnectionStatus::Closed
            },
            next_tx_id: self.tx_id,
            pending: self.pending.len(),
            active: self.options.active,
            request_in_flight: self.in_flight.is_some(),
        }
    }
}

async fn read_exact(
    io: &mut PhysLayer,
    buffer: &mut [u8],
    level: crate::decode::PhysDecodeLevel,
) -> Result<(), RequestError> {
    let mut filled = 0;
    while filled < buffer.len() {
        let count = io.read(&mut buffer[filled..], level).await?;
        if count == 0 {
            return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
        }
        filled += count;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

    use super::*;
    use crate::client::listener::ChannelListener;
    use crate::client::{Notifications, OverflowPolicy, TcpClient};
    use crate::exception::ExceptionCode;
    use crate::types::UnitId;

    struct Fixture {
        client: TcpClient,
        notifications: Notifications,
        server: DuplexStream,
    }

    fn spawn(active: bool, tx_id: u16) -> Fixture {
        spawn_with_capacity(active, tx_id, 4)
    }

    fn spawn_with_capacity(active: bool, tx_id: u16, capacity: usize) -> Fixture {
        let options = ClientOptions::default()
            .active(active)
            .notifications(capacity, OverflowPolicy::Block);
        let (listener, notifications) =
            ChannelListener::create(options.notification_capacity, options.overflow);
        let (tx, rx) = tokio::sync::mpsc::channel(4);
        let mut task = ClientTask::new(options, rx.into(), Box::new(listener));
        task.tx_id = TxId::new(tx_id);
        let (io, server) = tokio::io::duplex(1024);
        task.attach(PhysLayer::new_mock(io));
        tokio::spawn(async move { task.run().await });
        Fixture {
            client: TcpClient::new(tx),
            notifications,
            server,
        }
    }

    async fn read_frame(server: &mut DuplexStream, length: usize) -> Vec<u8> {
        let mut buffer = vec![0; length];
        server.read_exact(&mut buffer).await.unwrap();
        buffer
    }

    fn read_three_coils() -> Command {
        Command::read_coils(UnitId::new(1), 0, 3).unwrap()
    }

    const READ_COILS_REQUEST: &[u8] = &[
        0x00, 0x00, // tx id
        0x00, 0x00, // protocol id
        0x00, 0x06, // length
        0x01, // unit id
        0x01, // function code
        0x00, 0x00, // start
        0x00, 0x03, // count
    ];
    const READ_COILS_RESPONSE: &[u8] = &[
        0x00, 0x00, 0x00, 0x00, 0x00, 0x04, 0x01, 0x01, 0x01, 0x05,
    ];

    #[tokio::test]
    async fn passive_request_is_confirmed() {
        let mut fixture = spawn(false, 0);
        let command = Command::read_holding_registers(UnitId::new(5), 2300, 1).unwrap();

        assert_eq!(fixture.client.request(command).await, Ok(TxId::new(0)));
        assert_eq!(
            read_frame(&mut fixture.server, 12).await,
            &[0x00, 0x00, 0x00, 0x00, 0x00, 0x06, 0x05, 0x03, 0x08, 0xFC, 0x00, 0x01]
        );

        // the counter only advances once the response is consumed
        let state = fixture.client.state().await.unwrap();
        assert_eq!(state.next_tx_id, TxId::new(0));
        assert!(state.request_in_flight);

        fixture
            .server
            .write_all(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x05, 0x05, 0x03, 0x02, 0x00, 0x25])
            .await
            .unwrap();
        assert_eq!(
            fixture.client.confirmation().await,
            Ok(Some(Values::Registers(vec![37])))
        );

        let state = fixture.client.state().await.unwrap();
        assert_eq!(state.status, ConnectionStatus::Connected);
        assert_eq!(state.next_tx_id, TxId::new(1));
        assert!(!state.request_in_flight);
    }

    #[tokio::test]
    async fn confirmation_checks_mode_first() {
        let fixture = spawn(true, 0);
        assert_eq!(
            fixture.client.confirmation().await,
            Err(RequestError::InvalidState(StateError::WrongMode))
        );
        assert_eq!(
            fixture.client.state().await.unwrap().status,
            ConnectionStatus::Connected
        );

        fixture.client.close().await.unwrap();
        assert_eq!(
            fixture.client.confirmation().await,
            Err(RequestError::InvalidState(StateError::WrongMode))
        );
    }

    #[tokio::test]
    async fn confirmation_requires_connection_and_request() {
        let fixture = spawn(false, 0);
        assert_eq!(
            fixture.client.confirmation().await,
            Err(RequestError::InvalidState(StateError::NoRequestInFlight))
        );

        fixture.client.close().await.unwrap();
        assert_eq!(
            fixture.client.confirmation().await,
            Err(RequestError::InvalidState(StateError::Closed))
        );
        assert_eq!(
            fixture.client.close().await,
            Err(RequestError::InvalidState(StateError::AlreadyClosed))
        );
        assert_eq!(
            fixture.client.request(read_three_coils()).await,
            Err(RequestError::InvalidState(StateError::Closed))
        );
    }

    #[tokio::test]
    async fn exception_response_keeps_connection_open() {
        let mut fixture = spawn(false, 0);
        fixture
            .client
            .request(Command::write_single_register(UnitId::new(1), 0x10, 0x1234))
            .await
            .unwrap();
        read_frame(&mut fixture.server, 12).await;

        fixture
            .server
            .write_all(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x03, 0x01, 0x86, 0x02])
            .await
            .unwrap();
        assert_eq!(
            fixture.client.confirmation().await,
            Err(RequestError::Exception(ExceptionCode::IllegalDataAddress))
        );

        let state = fixture.client.state().await.unwrap();
        assert_eq!(state.status, ConnectionStatus::Connected);
        assert_eq!(state.next_tx_id, TxId::new(1));
        assert!(!state.request_in_flight);
    }

    #[tokio::test]
    async fn mismatched_transaction_id_is_consumed() {
        let mut fixture = spawn(false, 0);
        fixture
            .client
            .request(Command::write_single_register(UnitId::new(1), 0x10, 0x1234))
            .await
            .unwrap();
        read_frame(&mut fixture.server, 12).await;

        fixture
            .server
            .write_all(&[0x00, 0x09, 0x00, 0x00, 0x00, 0x06, 0x01, 0x06, 0x00, 0x10, 0x12, 0x34])
            .await
            .unwrap();
        assert_eq!(
            fixture.client.confirmation().await,
            Err(RequestError::BadFrame(FrameParseError::TxIdMismatch(9, 0)))
        );

        let state = fixture.client.state().await.unwrap();
        assert_eq!(state.status, ConnectionStatus::Connected);
        assert_eq!(state.next_tx_id, TxId::new(1));
    }

    #[tokio::test(start_paused = true)]
    async fn confirmation_timeout_closes_connection() {
        let mut fixture = spawn(false, 0);
        fixture.client.request(read_three_coils()).await.unwrap();
        read_frame(&mut fixture.server, 12).await;

        assert_eq!(
            fixture.client.confirmation().await,
            Err(RequestError::ResponseTimeout)
        );

        let state = fixture.client.state().await.unwrap();
        assert_eq!(state.status, ConnectionStatus::Closed);
        assert!(!state.request_in_flight);
    }

    #[tokio::test]
    async fn send_failure_closes_connection() {
        let fixture = spawn(false, 0);
        let Fixture { client, server, .. } = fixture;
        drop(server);

        assert_eq!(
            client.request(read_three_coils()).await,
            Err(RequestError::Io(std::io::ErrorKind::BrokenPipe))
        );
        assert_eq!(
            client.state().await.unwrap().status,
            ConnectionStatus::Closed
        );
        assert_eq!(
            client.request(read_three_coils()).await,
            Err(RequestError::InvalidState(StateError::Closed))
        );
    }

    #[tokio::test]
    async fn transaction_id_wraps_around() {
        let mut fixture = spawn(true, 0xFFFF);
        let command = Command::write_single_coil(UnitId::new(1), 0, true);

        assert_eq!(
            fixture.client.request(command.clone()).await,
            Ok(TxId::new(0xFFFF))
        );
        let frame = read_frame(&mut fixture.server, 12).await;
        assert_eq!(
            frame,
            &[0xFF, 0xFF, 0x00, 0x00, 0x00, 0x06, 0x01, 0x05, 0x00, 0x00, 0xFF, 0x00]
        );
        assert_eq!(
            fixture.client.state().await.unwrap().next_tx_id,
            TxId::new(0)
        );
        assert_eq!(
            fixture.client.request(command.clone()).await,
            Ok(TxId::new(0))
        );

        // the write response echoes the request
        fixture.server.write_all(&frame).await.unwrap();
        assert_eq!(
            fixture.notifications.recv().await.unwrap(),
            Notification {
                tx_id: TxId::new(0xFFFF),
                command,
                result: Ok(None),
            }
        );
    }

    #[tokio::test]
    async fn unknown_transaction_id_is_dropped() {
        let mut fixture = spawn(true, 0);
        fixture.client.request(read_three_coils()).await.unwrap();
        assert_eq!(
            read_frame(&mut fixture.server, 12).await,
            READ_COILS_REQUEST
        );

        fixture
            .server
            .write_all(&[0x00, 0x07, 0x00, 0x00, 0x00, 0x04, 0x01, 0x01, 0x01, 0x05])
            .await
            .unwrap();
        fixture.server.write_all(READ_COILS_RESPONSE).await.unwrap();

        assert_eq!(
            fixture.notifications.recv().await.unwrap(),
            Notification {
                tx_id: TxId::new(0),
                command: read_three_coils(),
                result: Ok(Some(Values::Bits(vec![true, false, true]))),
            }
        );

        let state = fixture.client.state().await.unwrap();
        assert_eq!(state.status, ConnectionStatus::Connected);
        assert_eq!(state.pending, 0);
    }

    #[tokio::test]
    async fn decode_failure_is_notified() {
        let mut fixture = spawn(true, 0);
        fixture.client.request(read_three_coils()).await.unwrap();
        read_frame(&mut fixture.server, 12).await;

        // byte count of 2 for 3 coils
        fixture
            .server
            .write_all(&[0x00, 0x00, 0x00, 0x00, 0x00, 0x05, 0x01, 0x01, 0x02, 0x05, 0x00])
            .await
            .unwrap();

        let notification = fixture.notifications.recv().await.unwrap();
        assert_eq!(
            notification.result,
            Err(RequestError::BadResponse(
                AduParseError::RequestByteCountMismatch(1, 2)
            ))
        );
        assert_eq!(
            fixture.client.state().await.unwrap().status,
            ConnectionStatus::Connected
        );
    }

    #[tokio::test]
    async fn flush_returns_pending_in_order() {
        let fixture = spawn(true, 0);
        for start in 0..3 {
            fixture
                .client
                .request(Command::read_coils(UnitId::new(1), start, 1).unwrap())
                .await
                .unwrap();
        }

        let flushed = fixture.client.flush().await.unwrap();
        assert_eq!(
            flushed
                .iter()
                .map(|(id, command)| (id.to_u16(), command.start_address()))
                .collect::<Vec<_>>(),
            vec![(0, 0), (1, 1), (2, 2)]
        );
        assert_eq!(fixture.client.state().await.unwrap().pending, 0);
        assert_eq!(fixture.client.flush().await, Ok(Vec::new()));
    }

    #[tokio::test]
    async fn configuration_only_changes_while_closed() {
        let fixture = spawn(false, 0);
        assert_eq!(
            fixture
                .client
                .configure(ClientOptions::default().active(true))
                .await,
            Err(RequestError::InvalidState(StateError::Connected))
        );
        let (listener, _notifications) = ChannelListener::create(1, OverflowPolicy::Block);
        assert_eq!(
            fixture.client.set_notify_target(Box::new(listener)).await,
            Err(RequestError::InvalidState(StateError::Connected))
        );

        fixture.client.close().await.unwrap();
        fixture
            .client
            .configure(ClientOptions::default().active(true))
            .await
            .unwrap();
        assert!(fixture.client.state().await.unwrap().active);
    }

    #[tokio::test]
    async fn connect_twice_is_rejected() {
        let fixture = spawn(false, 0);
        assert_eq!(
            fixture.client.connect().await,
            Err(RequestError::InvalidState(StateError::AlreadyConnected))
        );
    }

    async fn wait_for_status(client: &TcpClient, status: ConnectionStatus) {
        while client.state().await.unwrap().status != status {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn peer_close_in_active_mode_closes_connection() {
        let Fixture { client, server, .. } = spawn(true, 0);
        drop(server);

        wait_for_status(&client, ConnectionStatus::Closed).await;
        assert_eq!(
            client.request(read_three_coils()).await,
            Err(RequestError::InvalidState(StateError::Closed))
        );
    }

    #[tokio::test]
    async fn bad_protocol_id_in_active_mode_closes_connection() {
        let mut fixture = spawn(true, 0);
        fixture.client.request(read_three_coils()).await.unwrap();
        read_frame(&mut fixture.server, 12).await;

        //                      |  tx id  | proto id  | length | unit | fc | count | coils |
        fixture
            .server
            .write_all(&[0x00, 0x00, 0xCA, 0xFE, 0x00, 0x04, 0x01, 0x01, 0x01, 0x05])
            .await
            .unwrap();

        wait_for_status(&fixture.client, ConnectionStatus::Closed).await;
        assert_eq!(
            fixture.client.request(read_three_coils()).await,
            Err(RequestError::InvalidState(StateError::Closed))
        );
        // the request stays pending until flushed
        assert_eq!(fixture.client.state().await.unwrap().pending, 1);
    }

    #[tokio::test]
    async fn full_notification_queue_does_not_stall_the_client() {
        let mut fixture = spawn_with_capacity(true, 0, 1);
        let command = Command::write_single_coil(UnitId::new(1), 0, true);

        for _ in 0..3 {
            fixture.client.request(command.clone()).await.unwrap();
            let frame = read_frame(&mut fixture.server, 12).await;
            fixture.server.write_all(&frame).await.unwrap();
        }

        // one notification fills the queue, the next one waits on the listener
        while fixture.client.state().await.unwrap().pending > 1 {
            tokio::task::yield_now().await;
        }

        let timeout = std::time::Duration::from_secs(1);
        assert_eq!(
            tokio::time::timeout(timeout, fixture.client.request(command.clone()))
                .await
                .unwrap(),
            Ok(TxId::new(3))
        );
        assert_eq!(
            tokio::time::timeout(timeout, fixture.client.flush())
                .await
                .unwrap()
                .unwrap()
                .len(),
            2
        );
        assert_eq!(
            tokio::time::timeout(timeout, fixture.client.close())
                .await
                .unwrap(),
            Ok(())
        );

        // the waiting notification is delivered once the queue drains
        assert_eq!(
            fixture.notifications.recv().await.unwrap().tx_id,
            TxId::new(0)
        );
        assert_eq!(
            fixture.notifications.recv().await.unwrap().tx_id,
            TxId::new(1)
        );
    }
}
