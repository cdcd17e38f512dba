//! Text framing for the backend's realtime endpoint: Engine.IO v4 packets
//! carrying Socket.IO v5 packets. Binary attachments are not supported.

use serde::Deserialize;
use serde_json::Value;

pub const DEFAULT_NAMESPACE: &str = "/";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum CodecError {
    #[error("empty frame")]
    Empty,
    #[error("unknown packet type {0:?}")]
    UnknownType(char),
    #[error("binary packets are not supported")]
    Binary,
    #[error("bad payload: {0}")]
    Payload(String),
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub ping_interval: u64,
    #[serde(default)]
    pub ping_timeout: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping(String),
    Pong(String),
    Message(SocketPacket),
    Upgrade,
    Noop,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect { namespace: String, data: Option<Value> },
    Disconnect { namespace: String },
    Event { namespace: String, id: Option<u64>, name: String, args: Vec<Value> },
    Ack { namespace: String, id: u64, args: Vec<Value> },
    ConnectError { namespace: String, data: Option<Value> },
}

impl SocketPacket {
    pub fn connect(auth: Option<Value>) -> Self {
        SocketPacket::Connect { namespace: DEFAULT_NAMESPACE.into(), data: auth }
    }

    pub fn event(name: &str, args: Vec<Value>) -> Self {
        SocketPacket::Event { namespace: DEFAULT_NAMESPACE.into(), id: None, name: name.into(), args }
    }
}

pub fn decode(frame: &str) -> Result<EnginePacket, CodecError> {
    let mut chars = frame.chars();
    let kind = chars.next().ok_or(CodecError::Empty)?;
    let rest = chars.as_str();
    match kind {
        '0' => serde_json::from_str(rest)
            .map(EnginePacket::Open)
            .map_err(|e| CodecError::Payload(e.to_string())),
        '1' => Ok(EnginePacket::Close),
        '2' => Ok(EnginePacket::Ping(rest.to_string())),
        '3' => Ok(EnginePacket::Pong(rest.to_string())),
        '4' => decode_socket(rest).map(EnginePacket::Message),
        '5' => Ok(EnginePacket::Upgrade),
        '6' => Ok(EnginePacket::Noop),
        other => Err(CodecError::UnknownType(other)),
    }
}

fn decode_socket(frame: &str) -> Result<SocketPacket, CodecError> {
    let mut chars = frame.chars();
    let kind = chars.next().ok_or(CodecError::Empty)?;
    if matches!(kind, '5' | '6') {
        return Err(CodecError::Binary);
    }
    let mut rest = chars.as_str();

    let mut namespace = DEFAULT_NAMESPACE.to_string();
    if rest.starts_with('/') {
        let (ns, tail) = rest.split_once(',').unwrap_or((rest, ""));
        namespace = ns.to_string();
        rest = tail;
    }

    let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
    let id = if digits > 0 {
        Some(rest[..digits].parse::<u64>().map_err(|e| CodecError::Payload(e.to_string()))?)
    } else {
        None
    };
    rest = &rest[digits..];

    let payload = if rest.is_empty() {
        None
    } else {
        Some(serde_json::from_str::<Value>(rest).map_err(|e| CodecError::Payload(e.to_string()))?)
    };

    match kind {
        '0' => Ok(SocketPacket::Connect { namespace, data: payload }),
        '1' => Ok(SocketPacket::Disconnect { namespace }),
        '2' => {
            let mut args = match payload {
                Some(Value::Array(args)) => args,
                _ => return Err(CodecError::Payload("event payload must be an array".into())),
            };
            if args.is_empty() {
                return Err(CodecError::Payload("event without a name".into()));
            }
            let name = match args.remove(0) {
                Value::String(name) => name,
                other => return Err(CodecError::Payload(format!("event name {other}"))),
            };
            Ok(SocketPacket::Event { namespace, id, name, args })
        }
        '3' => {
            let id = id.ok_or_else(|| CodecError::Payload("ack without id".into()))?;
            let args = match payload {
                Some(Value::Array(args)) => args,
                _ => Vec::new(),
            };
            Ok(SocketPacket::Ack { namespace, id, args })
        }
        '4' => Ok(SocketPacket::ConnectError { namespace, data: payload }),
        other => Err(CodecError::UnknownType(other)),
    }
}

pub fn encode(packet: &EnginePacket) -> String {
    match packet {
        EnginePacket::Open(h) => format!(
            "0{}",
            serde_json::json!({"sid": h.sid, "pingInterval": h.ping_interval, "pingTimeout": h.ping_timeout})
        ),
        EnginePacket::Close => "1".into(),
        EnginePacket::Ping(data) => format!("2{data}"),
        EnginePacket::Pong(data) => format!("3{data}"),
        EnginePacket::Message(socket) => format!("4{}", encode_socket(socket)),
        EnginePacket::Upgrade => "5".into(),
        EnginePacket::Noop => "6".into(),
    }
}

fn encode_socket(packet: &SocketPacket) -> String {
    let (kind, namespace, id, payload) = match packet {
        SocketPacket::Connect { namespace, data } => ('0', namespace, None, data.clone()),
        SocketPacket::Disconnect { namespace } => ('1', namespace, None, None),
        SocketPacket::Event { namespace, id, name, args } => {
            let mut all = Vec::with_capacity(args.len() + 1);
            all.push(Value::String(name.clone()));
            all.extend(args.iter().cloned());
            ('2', namespace, *id, Some(Value::Array(all)))
        }
        SocketPacket::Ack { namespace, id, args } => ('3', namespace, Some(*id), Some(Value::Array(args.clone()))),
        SocketPacket::ConnectError { namespace, data } => ('4', namespace, None, data.clone()),
    };

    let mut out = String::new();
    out.push(kind);
    if namespace != DEFAULT_NAMESPACE {
        out.push_str(namespace);
        out.push(',');
    }
    if let Some(id) = id {
        out.push_str(&id.to_string());
    }
    if let Some(payload) = payload {
        out.push_str(&payload.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_the_open_handshake() {
        let packet = decode(r#"0{"sid":"abc","upgrades":[],"pingInterval":25000,"pingTimeout":20000,"maxPayload":1000000}"#).unwrap();
        assert_eq!(
            packet,
            EnginePacket::Open(Handshake { sid: "abc".into(), ping_interval: 25000, ping_timeout: 20000 })
        );
    }

    #[test]
    fn decodes_a_message_event() {
        let packet = decode(r#"42["message",{"data":[{"_id":"m1"}]}]"#).unwrap();
        let EnginePacket::Message(SocketPacket::Event { namespace, id, name, args }) = packet else {
            panic!("expected event");
        };
        assert_eq!(namespace, "/");
        assert_eq!(id, None);
        assert_eq!(name, "message");
        assert_eq!(args, vec![json!({"data": [{"_id": "m1"}]})]);
    }

    #[test]
    fn namespace_and_ack_id_are_parsed() {
        let packet = decode(r#"42/admin,17["join","c1"]"#).unwrap();
        assert_eq!(
            packet,
            EnginePacket::Message(SocketPacket::Event {
                namespace: "/admin".into(),
                id: Some(17),
                name: "join".into(),
                args: vec![json!("c1")],
            })
        );
    }

    #[test]
    fn join_is_encoded_the_way_socket_io_expects() {
        let join = EnginePacket::Message(SocketPacket::event("join", vec![json!("c1")]));
        assert_eq!(encode(&join), r#"42["join","c1"]"#);
        let connect = EnginePacket::Message(SocketPacket::connect(Some(json!({"token": "t"}))));
        assert_eq!(encode(&connect), r#"40{"token":"t"}"#);
        assert_eq!(encode(&EnginePacket::Pong(String::new())), "3");
    }

    #[test]
    fn connect_ack_and_pings_decode() {
        assert_eq!(
            decode(r#"40{"sid":"x"}"#).unwrap(),
            EnginePacket::Message(SocketPacket::Connect { namespace: "/".into(), data: Some(json!({"sid": "x"})) })
        );
        assert_eq!(decode("2").unwrap(), EnginePacket::Ping(String::new()));
    }

    #[test]
    fn garbage_is_rejected() {
        assert_eq!(decode(""), Err(CodecError::Empty));
        assert_eq!(decode("9"), Err(CodecError::UnknownType('9')));
        assert!(matches!(decode("42{\"not\":\"array\"}"), Err(CodecError::Payload(_))));
        assert_eq!(decode("45-[]"), Err(CodecError::Binary));
    }
}
