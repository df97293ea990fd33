//! WebSocket transport and its event loop.
//!
//! The transport spawns a tokio task that owns the socket and handles:
//!
//! - Connecting and reconnecting with bounded exponential backoff
//! - Incoming JSON frames, dispatched to the listener table
//! - Outgoing frames from the caller, buffered in order while disconnected
//! - Local lifecycle events (`connect`, `disconnect`, `reconnect_attempt`,
//!   `connect_error`)
//! - Dropping a link that stays silent past ping interval plus timeout
//!
//! # Event Loop
//!
//! ```text
//!   connect ──► pump ──► disconnect(reason) ──► reconnect_attempt(n)
//!      ▲                                                │
//!      └─────────────── backoff(n) ◄────────────────────┘
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::{Instant, sleep_until};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, error, info, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::ListenerId;
use crate::protocol::{DisconnectReason, EventName, Frame};

use super::{
    ConnectOptions, Listener, ListenerTable, Transport, TransportFactory, TransportKind,
    TransportState,
};

// ============================================================================
// Types
// ============================================================================

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

type SocketSink = futures_util::stream::SplitSink<Socket, Message>;

// ============================================================================
// TransportCommand
// ============================================================================

/// Internal commands for the event loop.
enum TransportCommand {
    /// Send a frame (buffered while disconnected).
    Emit(Frame),
    /// Close for good.
    Close,
}

// ============================================================================
// Shared
// ============================================================================

/// State shared between the handle and the event loop.
struct Shared {
    listeners: ListenerTable,
    state: Mutex<TransportState>,
    query: Mutex<BTreeMap<String, String>>,
    closed: AtomicBool,
}

impl Shared {
    fn set_state(&self, state: TransportState) {
        *self.state.lock() = state;
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

// ============================================================================
// WsTransport
// ============================================================================

/// WebSocket transport.
///
/// Cheap to share behind an `Arc`. All methods are non-blocking; socket I/O
/// happens on the spawned event loop. Dropping the last handle ends the
/// command channel, which stops the loop.
pub struct WsTransport {
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<TransportCommand>,
    /// Listener table, state and query (shared with event loop).
    shared: Arc<Shared>,
}

impl WsTransport {
    /// Opens a transport and spawns its event loop.
    ///
    /// Returns immediately; the `connect` event fires once the socket is up.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] / [`Error::Url`] if the options are invalid
    /// - [`Error::UnsupportedTransport`] if `websocket` is not in the preference list
    /// - [`Error::Config`] if called outside a Tokio runtime
    pub fn connect(options: ConnectOptions) -> Result<Arc<Self>> {
        options.validate()?;

        for kind in &options.transports {
            if *kind != TransportKind::WebSocket {
                debug!(transport = kind.as_str(), "Transport preference not supported, skipping");
            }
        }
        if !options.transports.contains(&TransportKind::WebSocket) {
            let wanted: Vec<_> = options.transports.iter().map(|k| k.as_str()).collect();
            return Err(Error::unsupported_transport(wanted.join(",")));
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| Error::config("WebSocket transport requires a Tokio runtime"))?;

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(Shared {
            listeners: ListenerTable::new(),
            state: Mutex::new(TransportState::Connecting),
            query: Mutex::new(options.query.clone()),
            closed: AtomicBool::new(false),
        });

        let event_loop = EventLoop {
            options,
            command_rx,
            shared: Arc::clone(&shared),
            outbox: VecDeque::new(),
        };
        runtime.spawn(event_loop.run());

        Ok(Arc::new(Self { command_tx, shared }))
    }
}

impl Transport for WsTransport {
    fn state(&self) -> TransportState {
        *self.shared.state.lock()
    }

    fn on(&self, event: &EventName, listener: Listener) {
        self.shared.listeners.attach(event, listener);
    }

    fn off(&self, event: &EventName, id: ListenerId) {
        self.shared.listeners.detach(event, id);
    }

    fn emit(&self, event: &EventName, args: Vec<Value>) {
        if event.is_local() {
            warn!(event = %event, "Refusing to send a local lifecycle event");
            return;
        }
        if self
            .command_tx
            .send(TransportCommand::Emit(Frame::new(event, args)))
            .is_err()
        {
            trace!(event = %event, "Emit after event loop ended, dropped");
        }
    }

    fn remove_all_listeners(&self) {
        self.shared.listeners.clear();
    }

    fn close(&self) {
        if self.shared.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.command_tx.send(TransportCommand::Close);
    }

    fn set_query(&self, key: &str, value: &str) {
        self.shared
            .query
            .lock()
            .insert(key.to_string(), value.to_string());
    }
}

// ============================================================================
// WsTransportFactory
// ============================================================================

/// Factory opening [`WsTransport`]s.
#[derive(Debug, Default, Clone, Copy)]
pub struct WsTransportFactory;

impl TransportFactory for WsTransportFactory {
    fn connect(&self, options: &ConnectOptions) -> Result<Arc<dyn Transport>> {
        let transport: Arc<dyn Transport> = WsTransport::connect(options.clone())?;
        Ok(transport)
    }
}

// ============================================================================
// EventLoop
// ============================================================================

/// Owns the socket for the lifetime of one transport.
struct EventLoop {
    options: ConnectOptions,
    command_rx: mpsc::UnboundedReceiver<TransportCommand>,
    shared: Arc<Shared>,
    /// Frames waiting for the next connection.
    outbox: VecDeque<Frame>,
}

impl EventLoop {
    async fn run(mut self) {
        let policy = self.options.reconnection;
        let mut attempt: u32 = 0;

        loop {
            if self.shared.is_closed() {
                break;
            }

            if attempt > 0 {
                if attempt > policy.max_attempts {
                    warn!(attempts = policy.max_attempts, "Reconnection attempts exhausted");
                    break;
                }

                self.shared.set_state(TransportState::Connecting);
                self.shared
                    .listeners
                    .dispatch(&EventName::ReconnectAttempt, &[json!(attempt)]);

                // A listener may have closed the transport on stale auth.
                if self.shared.is_closed() || !self.idle(policy.backoff(attempt)).await {
                    break;
                }
            }

            self.shared.set_state(TransportState::Connecting);
            let url = {
                let query = self.shared.query.lock().clone();
                match self.options.url_with(&query) {
                    Ok(url) => url,
                    Err(e) => {
                        error!(error = %e, "Invalid endpoint");
                        break;
                    }
                }
            };

            match connect_async(url.as_str()).await {
                Ok((socket, _)) => {
                    if self.shared.is_closed() {
                        break;
                    }

                    info!(endpoint = %self.options.endpoint, "Realtime connection established");
                    attempt = 0;
                    self.shared.set_state(TransportState::Connected);
                    self.shared.listeners.dispatch(&EventName::Connect, &[]);

                    let reason = self.pump(socket).await;

                    self.shared.set_state(TransportState::Disconnected);
                    info!(reason = %reason, "Realtime connection lost");
                    self.shared
                        .listeners
                        .dispatch(&EventName::Disconnect, &[json!(reason.as_str())]);

                    if reason.is_client_initiated() {
                        break;
                    }
                    attempt = 1;
                }
                Err(e) => {
                    let error = Error::from(e);
                    warn!(error = %error, attempt, "Connection attempt failed");
                    self.shared
                        .listeners
                        .dispatch(&EventName::ConnectError, &[json!(error.to_string())]);
                    attempt = attempt.saturating_add(1);
                }
            }
        }

        self.shared.set_state(TransportState::Closed);

        if !self.outbox.is_empty() {
            debug!(count = self.outbox.len(), "Dropping unsent frames");
        }

        debug!("Event loop terminated");
    }

    /// Waits out a backoff delay while buffering emits.
    ///
    /// Returns `false` if the transport was closed meanwhile.
    async fn idle(&mut self, delay: std::time::Duration) -> bool {
        let deadline = Instant::now() + delay;

        loop {
            tokio::select! {
                _ = sleep_until(deadline) => return true,

                command = self.command_rx.recv() => match command {
                    Some(TransportCommand::Emit(frame)) => self.outbox.push_back(frame),
                    Some(TransportCommand::Close) | None => return false,
                },
            }
        }
    }

    /// Runs one connected session until the link drops.
    async fn pump(&mut self, socket: Socket) -> DisconnectReason {
        let (mut ws_write, mut ws_read) = socket.split();

        while let Some(frame) = self.outbox.pop_front() {
            if !Self::send_frame(&mut ws_write, &frame).await {
                self.outbox.push_front(frame);
                return DisconnectReason::TransportError;
            }
        }

        let silence_limit = self.options.silence_limit();
        let mut last_inbound = Instant::now();

        loop {
            tokio::select! {
                // Incoming frames from the server
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            last_inbound = Instant::now();
                            self.handle_incoming(&text);
                        }

                        Some(Ok(Message::Close(_))) => {
                            debug!("WebSocket closed by server");
                            return DisconnectReason::ServerDisconnect;
                        }

                        Some(Err(e)) => {
                            warn!(error = %e, "WebSocket error");
                            return DisconnectReason::TransportError;
                        }

                        None => {
                            debug!("WebSocket stream ended");
                            return DisconnectReason::TransportClose;
                        }

                        // Ping/Pong/Binary still prove liveness
                        Some(Ok(_)) => {
                            last_inbound = Instant::now();
                        }
                    }
                }

                // Commands from the handle
                command = self.command_rx.recv() => {
                    match command {
                        Some(TransportCommand::Emit(frame)) => {
                            if !Self::send_frame(&mut ws_write, &frame).await {
                                self.outbox.push_back(frame);
                                return DisconnectReason::TransportError;
                            }
                        }

                        Some(TransportCommand::Close) | None => {
                            debug!("Close command received");
                            let _ = ws_write.close().await;
                            return DisconnectReason::ClientDisconnect;
                        }
                    }
                }

                _ = sleep_until(last_inbound + silence_limit) => {
                    warn!(limit_ms = silence_limit.as_millis() as u64, "No traffic from server");
                    return DisconnectReason::PingTimeout;
                }
            }
        }
    }

    /// Decodes a text frame and dispatches it.
    fn handle_incoming(&self, text: &str) {
        let frame = match Frame::decode(text) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Failed to parse incoming frame");
                return;
            }
        };

        let event = frame.name();
        if event.is_local() {
            warn!(event = %event, "Server sent a reserved event name, ignored");
            return;
        }

        trace!(event = %event, "Frame received");
        self.shared.listeners.dispatch(&event, &frame.args);
    }

    /// Sends one frame. Returns `false` if the socket failed.
    async fn send_frame(ws_write: &mut SocketSink, frame: &Frame) -> bool {
        let json = match frame.encode() {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, event = %frame.event, "Failed to encode frame, dropped");
                return true;
            }
        };

        match ws_write.send(Message::Text(json.into())).await {
            Ok(()) => {
                trace!(event = %frame.event, "Frame sent");
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to send frame");
                false
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use tokio::net::TcpListener;
    use tokio::sync::mpsc::unbounded_channel;
    use tokio_tungstenite::accept_async;

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }

    async fn server() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("addr").port();
        (listener, format!("ws://127.0.0.1:{port}/socket"))
    }

    fn recorder(transport: &WsTransport, event: EventName) -> mpsc::UnboundedReceiver<Vec<Value>> {
        let (tx, rx) = unbounded_channel();
        transport.on(
            &event,
            Listener::new(move |args| {
                let _ = tx.send(args.to_vec());
            }),
        );
        rx
    }

    /// Records lifecycle events as `name` or `name:arg` labels, in order.
    fn lifecycle(transport: &WsTransport) -> mpsc::UnboundedReceiver<String> {
        let (tx, rx) = unbounded_channel();
        for event in [
            EventName::Connect,
            EventName::Disconnect,
            EventName::ReconnectAttempt,
            EventName::ConnectError,
        ] {
            let tx = tx.clone();
            let name = event.as_str().to_string();
            let bare = event == EventName::ConnectError;
            transport.on(
                &event,
                Listener::new(move |args| {
                    let label = match args.first() {
                        Some(_) if bare => name.clone(),
                        Some(Value::String(arg)) => format!("{name}:{arg}"),
                        Some(arg) => format!("{name}:{arg}"),
                        None => name.clone(),
                    };
                    let _ = tx.send(label);
                }),
            );
        }
        rx
    }

    async fn next_label(rx: &mut mpsc::UnboundedReceiver<String>) -> String {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("lifecycle event")
            .expect("listener alive")
    }

    async fn wait_for_state(transport: &WsTransport, expected: TransportState) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while transport.state() != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("state reached");
    }

    #[test]
    fn test_connect_requires_runtime() {
        let err = WsTransport::connect(ConnectOptions::new("ws://127.0.0.1:9"))
            .err()
            .expect("no runtime");
        assert!(matches!(err, Error::Config { .. }));
    }

    #[tokio::test]
    async fn test_connect_requires_websocket_preference() {
        let mut options = ConnectOptions::new("ws://127.0.0.1:9");
        options.transports = vec![TransportKind::Polling];
        let err = WsTransport::connect(options).err().expect("unsupported");
        assert!(matches!(err, Error::UnsupportedTransport { .. }));
    }

    #[tokio::test]
    async fn test_round_trip_with_server() {
        init_tracing();
        let (listener, url) = server().await;

        let server_task = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut ws = accept_async(stream).await.expect("upgrade");
            ws.send(Message::Text(r#"{"event":"ready","args":[]}"#.into()))
                .await
                .expect("send ready");
            ws.send(Message::Text(r#"{"event":"7-ticket","args":[{"x":1}]}"#.into()))
                .await
                .expect("send domain event");

            // Echo whatever the client sends back as the first text frame
            loop {
                match ws.next().await {
                    Some(Ok(Message::Text(text))) => return text.as_str().to_string(),
                    Some(Ok(_)) => continue,
                    other => panic!("unexpected: {other:?}"),
                }
            }
        });

        let options = ConnectOptions::new(url).with_query("token", "abc");
        let transport = WsTransport::connect(options).expect("connect");
        let mut connects = recorder(&transport, EventName::Connect);
        let mut readies = recorder(&transport, EventName::Ready);
        let mut tickets = recorder(&transport, EventName::from("7-ticket"));

        // Emitted before the socket is up: must be buffered and flushed
        transport.emit(&EventName::Heartbeat, vec![json!({ "n": 1 })]);

        let timeout = Duration::from_secs(5);
        tokio::time::timeout(timeout, connects.recv()).await.expect("connect event");
        tokio::time::timeout(timeout, readies.recv()).await.expect("ready event");
        let args = tokio::time::timeout(timeout, tickets.recv())
            .await
            .expect("domain event")
            .expect("args");
        assert_eq!(args, vec![json!({ "x": 1 })]);

        let echoed = tokio::time::timeout(timeout, server_task)
            .await
            .expect("server done")
            .expect("server task");
        let frame = Frame::decode(&echoed).expect("frame");
        assert_eq!(frame.name(), EventName::Heartbeat);
        assert_eq!(frame.args, vec![json!({ "n": 1 })]);

        transport.close();
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_reports_connect_error() {
        init_tracing();
        let (listener, url) = server().await;
        drop(listener);

        let mut options = ConnectOptions::new(url);
        options.reconnection.max_attempts = 1;
        options.reconnection.delay = Duration::from_millis(10);

        let transport = WsTransport::connect(options).expect("connect");
        let mut errors = recorder(&transport, EventName::ConnectError);

        let message = tokio::time::timeout(Duration::from_secs(5), errors.recv())
            .await
            .expect("connect_error event");
        assert!(message.is_some());
        transport.close();
    }

    #[tokio::test]
    async fn test_reconnect_flushes_buffered_frames_in_order() {
        init_tracing();
        let (listener, url) = server().await;

        let server_task = tokio::spawn(async move {
            // First session: hang up on the client
            let (stream, _) = listener.accept().await.expect("accept");
            let mut ws = accept_async(stream).await.expect("upgrade");
            ws.close(None).await.expect("close");
            drop(ws);

            // Second session: collect what the client buffered meanwhile
            let (stream, _) = listener.accept().await.expect("accept again");
            let mut ws = accept_async(stream).await.expect("upgrade again");
            let mut frames = Vec::new();
            while frames.len() < 2 {
                match ws.next().await {
                    Some(Ok(Message::Text(text))) => frames.push(text.as_str().to_string()),
                    Some(Ok(_)) => continue,
                    other => panic!("unexpected: {other:?}"),
                }
            }
            frames
        });

        let mut options = ConnectOptions::new(url);
        options.reconnection.delay = Duration::from_millis(200);
        let transport = WsTransport::connect(options).expect("connect");
        let mut events = lifecycle(&transport);

        assert_eq!(next_label(&mut events).await, "connect");
        let dropped = next_label(&mut events).await;
        assert!(dropped.starts_with("disconnect:"), "got {dropped}");
        assert_ne!(dropped, "disconnect:io client disconnect");

        transport.emit(&EventName::from("7-first"), vec![json!(1)]);
        transport.emit(&EventName::from("7-second"), vec![json!(2)]);

        assert_eq!(next_label(&mut events).await, "reconnect_attempt:1");
        assert_eq!(next_label(&mut events).await, "connect");

        let frames = tokio::time::timeout(Duration::from_secs(5), server_task)
            .await
            .expect("server done")
            .expect("server task");
        let names: Vec<_> = frames
            .iter()
            .map(|text| Frame::decode(text).expect("frame").name())
            .collect();
        assert_eq!(
            names,
            vec![EventName::from("7-first"), EventName::from("7-second")]
        );

        transport.close();
        wait_for_state(&transport, TransportState::Closed).await;
    }

    #[tokio::test]
    async fn test_silent_server_drops_with_ping_timeout() {
        init_tracing();
        let (listener, url) = server().await;

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut ws = accept_async(stream).await.expect("upgrade");
            // Keep the socket open without ever writing
            while let Some(Ok(_)) = ws.next().await {}
        });

        let mut options = ConnectOptions::new(url);
        options.ping_interval = Duration::from_millis(50);
        options.ping_timeout = Duration::from_millis(50);
        options.reconnection.delay = Duration::from_secs(5);
        let transport = WsTransport::connect(options).expect("connect");
        let mut events = lifecycle(&transport);

        assert_eq!(next_label(&mut events).await, "connect");
        assert_eq!(
            next_label(&mut events).await,
            format!("disconnect:{}", DisconnectReason::PingTimeout.as_str())
        );
        assert_eq!(next_label(&mut events).await, "reconnect_attempt:1");

        // Closing during backoff ends the loop
        transport.close();
        wait_for_state(&transport, TransportState::Closed).await;
    }

    #[tokio::test]
    async fn test_close_stops_reconnection() {
        init_tracing();
        let (listener, url) = server().await;

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let mut ws = accept_async(stream).await.expect("upgrade");
            while let Some(Ok(_)) = ws.next().await {}
        });

        let mut options = ConnectOptions::new(url);
        options.reconnection.delay = Duration::from_millis(10);
        let transport = WsTransport::connect(options).expect("connect");
        let mut events = lifecycle(&transport);

        assert_eq!(next_label(&mut events).await, "connect");
        transport.close();
        assert_eq!(
            next_label(&mut events).await,
            format!("disconnect:{}", DisconnectReason::ClientDisconnect.as_str())
        );
        wait_for_state(&transport, TransportState::Closed).await;

        let late = tokio::time::timeout(Duration::from_millis(200), events.recv()).await;
        assert!(late.is_err(), "unexpected event after close: {late:?}");
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        init_tracing();
        let (listener, url) = server().await;
        drop(listener);

        let mut options = ConnectOptions::new(url);
        options.reconnection.max_attempts = 2;
        options.reconnection.delay = Duration::from_millis(10);
        let transport = WsTransport::connect(options).expect("connect");
        let mut events = lifecycle(&transport);

        let mut labels = Vec::new();
        for _ in 0..5 {
            labels.push(next_label(&mut events).await);
        }
        assert_eq!(
            labels,
            vec![
                "connect_error",
                "reconnect_attempt:1",
                "connect_error",
                "reconnect_attempt:2",
                "connect_error",
            ]
        );

        wait_for_state(&transport, TransportState::Closed).await;
        assert!(transport.state().is_terminal());
    }
}
