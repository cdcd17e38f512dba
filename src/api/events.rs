use crate::api::models::Message;
use crate::api::socket::{self, EnginePacket, SocketPacket};
use crate::config::Session;
use crate::error::Result;
use futures_util::{Sink, SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error as WsError, Message as WsMessage};
use url::Url;

/// Join/leave per conversation room. The controller only sees this seam.
pub trait RoomChannel: Send + Sync {
    fn join(&self, room: &str);
    fn leave(&self, room: &str);
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    Connected,
    /// One `message` push. The backend sends a batch; consumers decide
    /// how much of it to use.
    Messages(Vec<Message>),
    Disconnected(Option<String>),
}

#[derive(Debug)]
enum Command {
    Join(String),
    Leave(String),
    Shutdown,
}

impl Command {
    fn packet(&self) -> Option<EnginePacket> {
        let (name, room) = match self {
            Command::Join(room) => ("join", room),
            Command::Leave(room) => ("leave", room),
            Command::Shutdown => return None,
        };
        Some(EnginePacket::Message(SocketPacket::event(name, vec![json!(room)])))
    }
}

/// Cloneable handle to the session's single socket.
#[derive(Clone)]
pub struct ChannelHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl ChannelHandle {
    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }
}

impl RoomChannel for ChannelHandle {
    fn join(&self, room: &str) {
        if self.commands.send(Command::Join(room.to_string())).is_err() {
            log::debug!("socket already closed, not joining {room}");
        }
    }

    fn leave(&self, room: &str) {
        let _ = self.commands.send(Command::Leave(room.to_string()));
    }
}

pub struct RealtimeChannel {
    pub handle: ChannelHandle,
    pub events: mpsc::UnboundedReceiver<ChannelEvent>,
    pub task: JoinHandle<()>,
}

impl RealtimeChannel {
    /// Opens the one long-lived socket for this session on the shared
    /// runtime. Connection failures are reported as `Disconnected`, never
    /// retried.
    pub fn connect(origin: &str, session: &Session) -> Result<Self> {
        let url = crate::utils::socket_url(origin)?;
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let token = session.token();
        let task = crate::utils::spawn_async(async move {
            let reason = match run(url, token, cmd_rx, &event_tx).await {
                Ok(()) => None,
                Err(e) => {
                    log::warn!("realtime channel closed: {e}");
                    Some(e.to_string())
                }
            };
            let _ = event_tx.send(ChannelEvent::Disconnected(reason));
        });
        Ok(Self {
            handle: ChannelHandle { commands: cmd_tx },
            events: event_rx,
            task,
        })
    }
}

async fn run(
    url: Url,
    token: Option<String>,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: &mpsc::UnboundedSender<ChannelEvent>,
) -> std::result::Result<(), WsError> {
    let mut request = url.as_str().into_client_request()?;
    if let Some(t) = &token {
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {t}")) {
            request.headers_mut().insert(AUTHORIZATION, value);
        }
    }
    let (ws, _) = connect_async(request).await?;
    log::info!("realtime channel connected to {}", url.host_str().unwrap_or_default());
    let (mut sink, mut stream) = ws.split();

    let mut connected = false;
    let mut pending: Vec<Command> = Vec::new();

    loop {
        tokio::select! {
            frame = stream.next() => {
                let text = match frame {
                    Some(Ok(WsMessage::Text(text))) => text,
                    Some(Ok(WsMessage::Close(_))) | None => return Ok(()),
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(e),
                };
                let packet = match socket::decode(&text) {
                    Ok(packet) => packet,
                    Err(e) => {
                        log::warn!("dropping malformed frame: {e}");
                        continue;
                    }
                };
                match packet {
                    EnginePacket::Open(handshake) => {
                        log::debug!("engine session {}", handshake.sid);
                        let auth = token.as_ref().map(|t| json!({ "token": t }));
                        send(&mut sink, EnginePacket::Message(SocketPacket::connect(auth))).await?;
                    }
                    EnginePacket::Ping(data) => send(&mut sink, EnginePacket::Pong(data)).await?,
                    EnginePacket::Close => return Ok(()),
                    EnginePacket::Message(SocketPacket::Connect { .. }) => {
                        connected = true;
                        for cmd in pending.drain(..) {
                            if let Some(packet) = cmd.packet() {
                                send(&mut sink, packet).await?;
                            }
                        }
                        let _ = events.send(ChannelEvent::Connected);
                    }
                    EnginePacket::Message(SocketPacket::Event { name, args, .. }) if name == "message" => {
                        match message_batch(&args) {
                            Some(batch) => {
                                let _ = events.send(ChannelEvent::Messages(batch));
                            }
                            None => log::warn!("ignoring undecodable message push"),
                        }
                    }
                    EnginePacket::Message(SocketPacket::ConnectError { data, .. }) => {
                        log::warn!("socket namespace refused: {}", data.unwrap_or(Value::Null));
                        return Ok(());
                    }
                    EnginePacket::Message(SocketPacket::Disconnect { .. }) => return Ok(()),
                    other => log::debug!("ignoring {other:?}"),
                }
            }
            cmd = commands.recv() => {
                match cmd {
                    Some(Command::Shutdown) | None => {
                        let _ = sink.close().await;
                        return Ok(());
                    }
                    Some(cmd) if !connected => pending.push(cmd),
                    Some(cmd) => {
                        if let Some(packet) = cmd.packet() {
                            send(&mut sink, packet).await?;
                        }
                    }
                }
            }
        }
    }
}

async fn send<S>(sink: &mut S, packet: EnginePacket) -> std::result::Result<(), WsError>
where
    S: Sink<WsMessage, Error = WsError> + Unpin,
{
    sink.send(WsMessage::Text(socket::encode(&packet))).await
}

/// Payload of a `message` push: `{data: Message[]}`, or a bare array.
pub(crate) fn message_batch(args: &[Value]) -> Option<Vec<Message>> {
    let first = args.first()?;
    let data = first.get("data").unwrap_or(first);
    serde_json::from_value(data.clone()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_batch_unwraps_the_data_field() {
        let args = vec![json!({"data": [{
            "_id": "m1", "conversation": "c1", "sender": "u2", "receiver": "u1",
            "text": "hello", "createdAt": "2024-05-01T10:00:00Z"
        }]})];
        let batch = message_batch(&args).unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].conversation, "c1");
        assert!(message_batch(&[json!({"data": "nope"})]).is_none());
        assert!(message_batch(&[]).is_none());
    }

    #[test]
    fn room_commands_encode_as_events() {
        let join = Command::Join("c9".into()).packet().unwrap();
        assert_eq!(socket::encode(&join), r#"42["join","c9"]"#);
        let leave = Command::Leave("c9".into()).packet().unwrap();
        assert_eq!(socket::encode(&leave), r#"42["leave","c9"]"#);
        assert!(Command::Shutdown.packet().is_none());
    }
}
