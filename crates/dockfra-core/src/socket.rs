//! Socket.IO v4 client over the Engine.IO websocket transport
//!
//! Only what the wizard uses is implemented: the default namespace, inbound
//! events, and outbound `action` events without acknowledgements.

use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::action::OutboundAction;
use crate::logstream::LogLine;
use crate::state::ChatMessage;
use crate::widget::WidgetDescriptor;

const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(10);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    #[error("empty packet")]
    Empty,
    #[error("unknown engine.io packet type {0:?}")]
    UnknownEngineType(char),
    #[error("unknown socket.io packet type {0:?}")]
    UnknownSocketType(char),
    #[error("event payload is not a JSON array: {0}")]
    BadEventPayload(String),
    #[error("event has no name")]
    MissingEventName,
}

/// Socket.IO packets carried inside Engine.IO `message` packets
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect(Option<Value>),
    Disconnect,
    Event { name: String, args: Vec<Value> },
    ConnectError(Option<Value>),
}

/// Engine.IO transport packets
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(Option<Value>),
    Close,
    Ping,
    Pong,
    Message(SocketPacket),
    Noop,
}

fn optional_json(payload: &str) -> Option<Value> {
    if payload.is_empty() {
        None
    } else {
        serde_json::from_str(payload).ok()
    }
}

fn decode_socket(frame: &str) -> Result<SocketPacket, PacketError> {
    let mut chars = frame.chars();
    let kind = chars.next().ok_or(PacketError::Empty)?;
    let mut rest = chars.as_str();
    // Namespace other than "/" is prefixed as "/ns,"
    if rest.starts_with('/') {
        rest = rest.split_once(',').map(|(_, r)| r).unwrap_or_default();
    }
    match kind {
        '0' => Ok(SocketPacket::Connect(optional_json(rest))),
        '1' => Ok(SocketPacket::Disconnect),
        '2' => {
            // Ack ids are digits before the payload; we never request acks
            let payload = rest.trim_start_matches(|c: char| c.is_ascii_digit());
            let value: Value = serde_json::from_str(payload)
                .map_err(|e| PacketError::BadEventPayload(e.to_string()))?;
            let Value::Array(mut items) = value else {
                return Err(PacketError::BadEventPayload(payload.to_string()));
            };
            if items.is_empty() {
                return Err(PacketError::MissingEventName);
            }
            let Value::String(name) = items.remove(0) else {
                return Err(PacketError::MissingEventName);
            };
            Ok(SocketPacket::Event { name, args: items })
        }
        '4' => Ok(SocketPacket::ConnectError(optional_json(rest))),
        other => Err(PacketError::UnknownSocketType(other)),
    }
}

pub fn decode(frame: &str) -> Result<EnginePacket, PacketError> {
    let mut chars = frame.chars();
    let kind = chars.next().ok_or(PacketError::Empty)?;
    let rest = chars.as_str();
    match kind {
        '0' => Ok(EnginePacket::Open(optional_json(rest))),
        '1' => Ok(EnginePacket::Close),
        '2' => Ok(EnginePacket::Ping),
        '3' => Ok(EnginePacket::Pong),
        '4' => decode_socket(rest).map(EnginePacket::Message),
        '6' => Ok(EnginePacket::Noop),
        other => Err(PacketError::UnknownEngineType(other)),
    }
}

pub const CONNECT_FRAME: &str = "40";
pub const PONG_FRAME: &str = "3";

/// Encode an event for the default namespace as `42["name",payload]`
pub fn encode_event<T: Serialize>(name: &str, payload: &T) -> serde_json::Result<String> {
    Ok(format!("42{}", serde_json::to_string(&(name, payload))?))
}

pub fn encode_action(action: &OutboundAction) -> serde_json::Result<String> {
    encode_event("action", action)
}

/// Websocket endpoint for an `http(s)://` server base URL
pub fn websocket_url(base_url: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let ws = if let Some(rest) = base.strip_prefix("https://") {
        format!("wss://{}", rest)
    } else if let Some(rest) = base.strip_prefix("http://") {
        format!("ws://{}", rest)
    } else {
        base.to_string()
    };
    format!("{}/socket.io/?EIO=4&transport=websocket", ws)
}

/// Events the wizard pushes to the client
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Message(ChatMessage),
    Widget(WidgetDescriptor),
    ClearWidgets,
    LogLine(LogLine),
}

impl ServerEvent {
    /// Interpret a socket.io event; unknown names and malformed payloads
    /// yield `None`
    pub fn from_event(name: &str, mut args: Vec<Value>) -> Option<Self> {
        let payload = if args.is_empty() {
            Value::Null
        } else {
            args.swap_remove(0)
        };
        match name {
            "message" => serde_json::from_value(payload).ok().map(ServerEvent::Message),
            "widget" => WidgetDescriptor::from_value(payload).map(ServerEvent::Widget),
            "clear_widgets" => Some(ServerEvent::ClearWidgets),
            "log_line" => serde_json::from_value(payload).ok().map(ServerEvent::LogLine),
            _ => None,
        }
    }
}

/// Connection lifecycle and inbound events, delivered to the UI task
#[derive(Debug, Clone, PartialEq)]
pub enum SocketEvent {
    Connected,
    Disconnected(String),
    Server(ServerEvent),
}

#[derive(Debug, Error)]
#[error("connection task has stopped")]
pub struct SinkClosed;

/// Where dispatched actions go
pub trait ActionSink {
    fn send_action(&self, action: OutboundAction) -> Result<(), SinkClosed>;
}

/// Cloneable handle for queueing outbound actions
#[derive(Clone, Debug)]
pub struct SocketHandle {
    tx: UnboundedSender<OutboundAction>,
}

impl ActionSink for SocketHandle {
    fn send_action(&self, action: OutboundAction) -> Result<(), SinkClosed> {
        self.tx.send(action).map_err(|_| SinkClosed)
    }
}

/// Spawn the connection task. It reconnects with exponential backoff until
/// the returned handle and the event receiver are both dropped.
pub fn spawn(base_url: &str, events: UnboundedSender<SocketEvent>) -> SocketHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let url = websocket_url(base_url);
    tokio::spawn(run(url, rx, events));
    SocketHandle { tx }
}

async fn run(
    url: String,
    mut outbound: UnboundedReceiver<OutboundAction>,
    events: UnboundedSender<SocketEvent>,
) {
    let mut backoff = INITIAL_BACKOFF;
    loop {
        match session(&url, &mut outbound, &events).await {
            Ok(SessionEnd::Shutdown) => {
                tracing::debug!("socket task shutting down");
                return;
            }
            Ok(SessionEnd::Lost(reason)) => {
                tracing::info!(%reason, "socket disconnected");
                backoff = INITIAL_BACKOFF;
                if events.send(SocketEvent::Disconnected(reason)).is_err() {
                    return;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, url = %url, "socket connect failed");
                if events.send(SocketEvent::Disconnected(e)).is_err() {
                    return;
                }
            }
        }
        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
}

enum SessionEnd {
    Shutdown,
    Lost(String),
}

async fn session(
    url: &str,
    outbound: &mut UnboundedReceiver<OutboundAction>,
    events: &UnboundedSender<SocketEvent>,
) -> Result<SessionEnd, String> {
    let (stream, _response) = connect_async(url).await.map_err(|e| e.to_string())?;
    let (mut write, mut read) = stream.split();
    tracing::debug!(%url, "websocket open");

    loop {
        tokio::select! {
            frame = read.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => {
                        return Ok(SessionEnd::Lost("closed by server".to_string()));
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Ok(SessionEnd::Lost(e.to_string())),
                };
                let packet = match decode(&text) {
                    Ok(packet) => packet,
                    Err(e) => {
                        tracing::debug!(error = %e, frame = %text, "dropping undecodable frame");
                        continue;
                    }
                };
                let reply = match packet {
                    EnginePacket::Open(_) => Some(CONNECT_FRAME),
                    EnginePacket::Ping => Some(PONG_FRAME),
                    EnginePacket::Close => return Ok(SessionEnd::Lost("engine closed".to_string())),
                    EnginePacket::Message(SocketPacket::Connect(_)) => {
                        if events.send(SocketEvent::Connected).is_err() {
                            return Ok(SessionEnd::Shutdown);
                        }
                        None
                    }
                    EnginePacket::Message(SocketPacket::Disconnect) => {
                        return Ok(SessionEnd::Lost("namespace disconnect".to_string()));
                    }
                    EnginePacket::Message(SocketPacket::ConnectError(detail)) => {
                        return Ok(SessionEnd::Lost(format!("connect error: {:?}", detail)));
                    }
                    EnginePacket::Message(SocketPacket::Event { name, args }) => {
                        match ServerEvent::from_event(&name, args) {
                            Some(event) => {
                                if events.send(SocketEvent::Server(event)).is_err() {
                                    return Ok(SessionEnd::Shutdown);
                                }
                            }
                            None => tracing::trace!(event = %name, "ignoring event"),
                        }
                        None
                    }
                    EnginePacket::Pong | EnginePacket::Noop => None,
                };
                if let Some(reply) = reply {
                    if let Err(e) = write.send(Message::Text(reply.to_string())).await {
                        return Ok(SessionEnd::Lost(e.to_string()));
                    }
                }
            }
            action = outbound.recv() => {
                let Some(action) = action else {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(SessionEnd::Shutdown);
                };
                tracing::debug!(value = %action.value, "sending action");
                let frame = match encode_action(&action) {
                    Ok(frame) => frame,
                    Err(e) => {
                        tracing::warn!(value = %action.value, error = %e, "could not encode action");
                        continue;
                    }
                };
                if let Err(e) = write.send(Message::Text(frame)).await {
                    return Ok(SessionEnd::Lost(e.to_string()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_engine_packets() {
        assert!(matches!(
            decode(r#"0{"sid":"abc","pingInterval":25000}"#),
            Ok(EnginePacket::Open(Some(_)))
        ));
        assert_eq!(decode("2"), Ok(EnginePacket::Ping));
        assert_eq!(decode("1"), Ok(EnginePacket::Close));
        assert_eq!(decode("40"), Ok(EnginePacket::Message(SocketPacket::Connect(None))));
        assert_eq!(decode("41"), Ok(EnginePacket::Message(SocketPacket::Disconnect)));
        assert_eq!(decode(""), Err(PacketError::Empty));
        assert_eq!(decode("9"), Err(PacketError::UnknownEngineType('9')));
    }

    #[test]
    fn test_decode_event() {
        let packet = decode(r#"42["log_line",{"id":"log-3","text":"ok"}]"#).unwrap();
        let EnginePacket::Message(SocketPacket::Event { name, args }) = packet else {
            panic!("expected event");
        };
        assert_eq!(name, "log_line");
        assert_eq!(
            ServerEvent::from_event(&name, args),
            Some(ServerEvent::LogLine(LogLine {
                id: Some("log-3".to_string()),
                text: "ok".to_string()
            }))
        );

        assert!(matches!(
            decode(r#"4212["clear_widgets"]"#),
            Ok(EnginePacket::Message(SocketPacket::Event { .. }))
        ));
        assert_eq!(decode("42[]"), Err(PacketError::MissingEventName));
        assert!(matches!(decode("42{}"), Err(PacketError::BadEventPayload(_))));
    }

    #[test]
    fn test_server_events() {
        assert_eq!(
            ServerEvent::from_event("clear_widgets", vec![]),
            Some(ServerEvent::ClearWidgets)
        );
        assert!(matches!(
            ServerEvent::from_event("widget", vec![json!({"type": "code", "text": "x"})]),
            Some(ServerEvent::Widget(_))
        ));
        assert!(ServerEvent::from_event("widget", vec![json!({"type": "nope"})]).is_none());
        assert!(ServerEvent::from_event("unknown", vec![]).is_none());
    }

    #[test]
    fn test_encode_action() {
        let mut form = crate::action::FormSnapshot::new();
        form.insert("ssh_cmd".to_string(), "status".to_string());
        let frame = encode_action(&OutboundAction {
            value: "ssh_run".to_string(),
            form,
        })
        .unwrap();
        assert_eq!(frame, r#"42["action",{"value":"ssh_run","form":{"ssh_cmd":"status"}}]"#);
        assert_eq!(encode_event("ping", &json!(null)).unwrap(), r#"42["ping",null]"#);
    }

    #[test]
    fn test_websocket_url() {
        assert_eq!(
            websocket_url("http://localhost:5050/"),
            "ws://localhost:5050/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            websocket_url("https://wizard.example"),
            "wss://wizard.example/socket.io/?EIO=4&transport=websocket"
        );
    }

    #[test]
    fn test_handle_reports_closed_task() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let handle = SocketHandle { tx };
        assert!(handle
            .send_action(OutboundAction {
                value: "x".to_string(),
                form: Default::default(),
            })
            .is_err());
    }
}
