use anyhow::{Result, anyhow};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::{debug, warn};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long a single CDP command may take before the caller gives up on it.
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

static GLOBAL_ID_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// Returns a unique incremental ID for request messages.
pub(crate) fn next_id() -> usize {
    GLOBAL_ID_COUNTER.fetch_add(1, Ordering::SeqCst) + 1
}

pub(crate) type ReplyReceiver = oneshot::Receiver<Result<TransportResponse>>;

/// Waits for a reply routed by the actor, bounded by [`RESPONSE_TIMEOUT`].
pub(crate) async fn await_reply(rx: ReplyReceiver, what: &str) -> Result<TransportResponse> {
    time::timeout(RESPONSE_TIMEOUT, rx)
        .await
        .map_err(|_| anyhow!("Timeout waiting for {}", what))?
        .map_err(|_| anyhow!("Response channel closed"))?
}

/// Identifies an event stream: the target session and the CDP method name.
type EventKey = (String, String);

/// Messages sent to the transport actor.
#[derive(Debug)]
pub(crate) enum TransportMessage {
    /// A browser-level command with a response sender.
    Request(Value, oneshot::Sender<Result<TransportResponse>>),
    /// Listener for the target reply carrying the given ID.
    ListenTargetMessage(u64, oneshot::Sender<Result<TransportResponse>>),
    /// Forwards every `method` event of `session` until the receiver is dropped.
    Subscribe(EventKey, mpsc::UnboundedSender<Value>),
    Shutdown,
}

/// Responses produced by the transport actor.
#[derive(Debug)]
pub(crate) enum TransportResponse {
    Response(Response),
    Target(TargetMessage),
}

/// A browser-level CDP reply.
#[derive(Debug)]
pub(crate) struct Response {
    pub(crate) result: Value,
}

/// A `Target.receivedMessageFromTarget` notification.
#[derive(Debug)]
pub(crate) struct TargetMessage {
    pub(crate) params: Value,
}

/// Owns the websocket and routes replies and events to whoever waits for them.
struct TransportActor {
    pending_requests: HashMap<u64, oneshot::Sender<Result<TransportResponse>>>,
    subscribers: HashMap<EventKey, Vec<mpsc::UnboundedSender<Value>>>,
    ws_sink: SplitSink<WsStream, Message>,
    command_rx: mpsc::Receiver<TransportMessage>,
}

impl TransportActor {
    async fn run(mut self, mut ws_stream: SplitStream<WsStream>) {
        loop {
            tokio::select! {
                Some(msg) = ws_stream.next() => {
                    match msg {
                        Ok(Message::Text(text)) => self.route(&text),
                        Ok(Message::Close(_)) | Err(_) => break,
                        _ => {}
                    }
                }
                Some(msg) = self.command_rx.recv() => {
                    match msg {
                        TransportMessage::Request(cmd, tx) => {
                            let Some(id) = cmd["id"].as_u64() else {
                                let _ = tx.send(Err(anyhow!("Command without id")));
                                continue;
                            };
                            if self.ws_sink.send(Message::Text(cmd.to_string())).await.is_ok() {
                                self.pending_requests.insert(id, tx);
                            } else {
                                let _ = tx.send(Err(anyhow!("WebSocket send failed")));
                            }
                        }
                        TransportMessage::ListenTargetMessage(id, tx) => {
                            self.pending_requests.insert(id, tx);
                        }
                        TransportMessage::Subscribe(key, tx) => {
                            self.subscribers.entry(key).or_default().push(tx);
                        }
                        TransportMessage::Shutdown => {
                            let _ = self.ws_sink.send(Message::Text(json!({
                                "id": next_id(),
                                "method": "Browser.close",
                                "params": {}
                            }).to_string())).await;
                            let _ = self.ws_sink.close().await;
                            break;
                        }
                    }
                }
                else => break,
            }
        }

        for (_, tx) in self.pending_requests.drain() {
            let _ = tx.send(Err(anyhow!("Browser connection closed")));
        }
        debug!("Transport actor stopped");
    }

    fn route(&mut self, text: &str) {
        let Ok(value) = serde_json::from_str::<Value>(text) else {
            warn!("Dropping unparseable CDP message");
            return;
        };

        if let Some(id) = value.get("id").and_then(Value::as_u64) {
            if let Some(sender) = self.pending_requests.remove(&id) {
                let reply = match value.get("error") {
                    Some(err) => Err(anyhow!("CDP error: {}", err)),
                    None => Ok(TransportResponse::Response(Response {
                        result: value["result"].clone(),
                    })),
                };
                let _ = sender.send(reply);
            }
            return;
        }

        if value.get("method").and_then(Value::as_str) != Some("Target.receivedMessageFromTarget") {
            return;
        }
        let params = value["params"].clone();
        let Some(inner) = params
            .get("message")
            .and_then(Value::as_str)
            .and_then(|s| serde_json::from_str::<Value>(s).ok())
        else {
            return;
        };

        if let Some(id) = inner.get("id").and_then(Value::as_u64) {
            if let Some(sender) = self.pending_requests.remove(&id) {
                let _ = sender.send(Ok(TransportResponse::Target(TargetMessage { params })));
            }
        } else if let (Some(session), Some(method)) = (
            params.get("sessionId").and_then(Value::as_str),
            inner.get("method").and_then(Value::as_str),
        ) {
            let key = (session.to_string(), method.to_string());
            if let Some(subs) = self.subscribers.get_mut(&key) {
                subs.retain(|tx| tx.send(inner["params"].clone()).is_ok());
                if subs.is_empty() {
                    self.subscribers.remove(&key);
                }
            }
        }
    }
}

/// Asynchronous transport interface to the Chrome DevTools Protocol over WebSocket.
#[derive(Debug)]
pub(crate) struct Transport {
    tx: mpsc::Sender<TransportMessage>,
}

impl Transport {
    /// Connects to the browser's debugging websocket and spawns the actor.
    pub(crate) async fn new(ws_url: &str) -> Result<Self> {
        let (ws_stream, _) = connect_async(ws_url).await?;
        let (ws_sink, ws_stream) = ws_stream.split();
        let (tx, rx) = mpsc::channel(100);

        let actor = TransportActor {
            pending_requests: HashMap::new(),
            subscribers: HashMap::new(),
            ws_sink,
            command_rx: rx,
        };
        tokio::spawn(actor.run(ws_stream));

        Ok(Self { tx })
    }

    /// Sends a browser-level command and awaits its response.
    pub(crate) async fn send(&self, command: Value) -> Result<TransportResponse> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(TransportMessage::Request(command, tx))
            .await
            .map_err(|_| anyhow!("Transport actor dropped"))?;
        await_reply(rx, "response").await
    }

    /// Registers interest in the target reply carrying `msg_id`.
    ///
    /// Register before sending the message so a fast reply cannot be missed.
    pub(crate) async fn listen_target_msg(&self, msg_id: usize) -> Result<ReplyReceiver> {
        let (tx, rx) = oneshot::channel();
        self.tx
            .send(TransportMessage::ListenTargetMessage(msg_id as u64, tx))
            .await
            .map_err(|_| anyhow!("Transport actor dropped"))?;
        Ok(rx)
    }

    /// Subscribes to `method` events of the target attached as `session_id`.
    ///
    /// Events that arrive before this call returns are not delivered, so subscribe before
    /// issuing the command that triggers them.
    pub(crate) async fn subscribe(
        &self,
        session_id: &str,
        method: &str,
    ) -> Result<mpsc::UnboundedReceiver<Value>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.tx
            .send(TransportMessage::Subscribe(
                (session_id.to_string(), method.to_string()),
                tx,
            ))
            .await
            .map_err(|_| anyhow!("Transport actor dropped"))?;
        Ok(rx)
    }

    /// Asks the browser to close and stops the actor.
    pub(crate) async fn shutdown(&self) {
        let _ = self.tx.send(TransportMessage::Shutdown).await;
    }
}
