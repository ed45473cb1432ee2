//! The tagged-union wire message set: one byte type tag, length-prefixed body.

use crate::error::DecodeError;
use crate::ids::Identifier;
use crate::protocol::codec::{Reader, Writer};
use crate::types::NodeInfo;

pub mod tag {
    pub const FIND_SUCCESSOR_REQUEST: u8 = 0x01;
    pub const FIND_SUCCESSOR_RESPONSE: u8 = 0x02;
    pub const GET_PREDECESSOR_REQUEST: u8 = 0x03;
    pub const GET_PREDECESSOR_RESPONSE: u8 = 0x04;
    pub const NOTIFY: u8 = 0x05;
    pub const NOTIFY_ACK: u8 = 0x06;
    pub const PING: u8 = 0x07;
    pub const PONG: u8 = 0x08;
    pub const GET_REQUEST: u8 = 0x10;
    pub const GET_RESPONSE: u8 = 0x11;
    pub const PUT_REQUEST: u8 = 0x12;
    pub const PUT_RESPONSE: u8 = 0x13;
    pub const TRANSFER_KEYS_REQUEST: u8 = 0x20;
    pub const TRANSFER_KEYS_RESPONSE: u8 = 0x21;
    pub const ERROR_RESPONSE: u8 = 0xFF;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    FindSuccessorRequest { id: Identifier },
    FindSuccessorResponse { found: Option<NodeInfo> },
    GetPredecessorRequest,
    GetPredecessorResponse { predecessor: Option<NodeInfo> },
    Notify { candidate: NodeInfo },
    NotifyAck { accepted: bool },
    Ping,
    Pong,
    GetRequest { key: String },
    GetResponse { value: Option<String> },
    PutRequest { key: String, value: String },
    PutResponse { success: bool },
    TransferKeysRequest { start: Identifier, end: Identifier },
    TransferKeysResponse { items: Vec<(String, String)> },
    ErrorResponse { message: String },
}

impl Message {
    pub fn tag(&self) -> u8 {
        match self {
            Message::FindSuccessorRequest { .. } => tag::FIND_SUCCESSOR_REQUEST,
            Message::FindSuccessorResponse { .. } => tag::FIND_SUCCESSOR_RESPONSE,
            Message::GetPredecessorRequest => tag::GET_PREDECESSOR_REQUEST,
            Message::GetPredecessorResponse { .. } => tag::GET_PREDECESSOR_RESPONSE,
            Message::Notify { .. } => tag::NOTIFY,
            Message::NotifyAck { .. } => tag::NOTIFY_ACK,
            Message::Ping => tag::PING,
            Message::Pong => tag::PONG,
            Message::GetRequest { .. } => tag::GET_REQUEST,
            Message::GetResponse { .. } => tag::GET_RESPONSE,
            Message::PutRequest { .. } => tag::PUT_REQUEST,
            Message::PutResponse { .. } => tag::PUT_RESPONSE,
            Message::TransferKeysRequest { .. } => tag::TRANSFER_KEYS_REQUEST,
            Message::TransferKeysResponse { .. } => tag::TRANSFER_KEYS_RESPONSE,
            Message::ErrorResponse { .. } => tag::ERROR_RESPONSE,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::new();
        w.write_u8(self.tag());
        match self {
            Message::FindSuccessorRequest { id } => {
                w.write_u32(*id);
            }
            Message::FindSuccessorResponse { found } => {
                write_optional_node(&mut w, found.as_ref());
            }
            Message::GetPredecessorRequest => {}
            Message::GetPredecessorResponse { predecessor } => {
                write_optional_node(&mut w, predecessor.as_ref());
            }
            Message::Notify { candidate } => {
                w.write_node_info(candidate);
            }
            Message::NotifyAck { accepted } => {
                w.write_bool(*accepted);
            }
            Message::Ping => {}
            Message::Pong => {}
            Message::GetRequest { key } => {
                w.write_string(key);
            }
            Message::GetResponse { value } => match value {
                Some(v) => {
                    w.write_bool(true);
                    w.write_string(v);
                }
                None => {
                    w.write_bool(false);
                }
            },
            Message::PutRequest { key, value } => {
                w.write_string(key);
                w.write_string(value);
            }
            Message::PutResponse { success } => {
                w.write_bool(*success);
            }
            Message::TransferKeysRequest { start, end } => {
                w.write_u32(*start);
                w.write_u32(*end);
            }
            Message::TransferKeysResponse { items } => {
                w.write_u32(items.len() as u32);
                for (k, v) in items {
                    w.write_string(k);
                    w.write_string(v);
                }
            }
            Message::ErrorResponse { message } => {
                w.write_string(message);
            }
        }
        w.into_bytes()
    }

    pub fn decode(bytes: &[u8]) -> Result<Message, DecodeError> {
        let mut r = Reader::new(bytes);
        let tag = r.read_u8()?;
        let msg = match tag {
            tag::FIND_SUCCESSOR_REQUEST => Message::FindSuccessorRequest { id: r.read_u32()? },
            tag::FIND_SUCCESSOR_RESPONSE => {
                Message::FindSuccessorResponse { found: read_optional_node(&mut r)? }
            }
            tag::GET_PREDECESSOR_REQUEST => Message::GetPredecessorRequest,
            tag::GET_PREDECESSOR_RESPONSE => {
                Message::GetPredecessorResponse { predecessor: read_optional_node(&mut r)? }
            }
            tag::NOTIFY => Message::Notify { candidate: r.read_node_info()? },
            tag::NOTIFY_ACK => Message::NotifyAck { accepted: r.read_bool()? },
            tag::PING => Message::Ping,
            tag::PONG => Message::Pong,
            tag::GET_REQUEST => Message::GetRequest { key: r.read_string()? },
            tag::GET_RESPONSE => {
                let found = r.read_bool()?;
                let value = if found { Some(r.read_string()?) } else { None };
                Message::GetResponse { value }
            }
            tag::PUT_REQUEST => {
                let key = r.read_string()?;
                let value = r.read_string()?;
                Message::PutRequest { key, value }
            }
            tag::PUT_RESPONSE => Message::PutResponse { success: r.read_bool()? },
            tag::TRANSFER_KEYS_REQUEST => {
                let start = r.read_u32()?;
                let end = r.read_u32()?;
                Message::TransferKeysRequest { start, end }
            }
            tag::TRANSFER_KEYS_RESPONSE => {
                let count = r.read_u32()?;
                let mut items = Vec::with_capacity(count as usize);
                for _ in 0..count {
                    let k = r.read_string()?;
                    let v = r.read_string()?;
                    items.push((k, v));
                }
                Message::TransferKeysResponse { items }
            }
            tag::ERROR_RESPONSE => Message::ErrorResponse { message: r.read_string()? },
            other => return Err(DecodeError::UnknownTag(other)),
        };
        Ok(msg)
    }
}

fn write_optional_node(w: &mut Writer, node: Option<&NodeInfo>) {
    match node {
        Some(n) => {
            w.write_bool(true);
            w.write_node_info(n);
        }
        None => {
            w.write_bool(false);
        }
    }
}

fn read_optional_node(r: &mut Reader) -> Result<Option<NodeInfo>, DecodeError> {
    if r.read_bool()? {
        Ok(Some(r.read_node_info()?))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeAddress;

    fn sample_node() -> NodeInfo {
        NodeInfo::new(NodeAddress::new("192.168.0.5", 4300))
    }

    fn assert_round_trips(m: Message) {
        let bytes = m.encode();
        let decoded = Message::decode(&bytes).expect("decode should succeed");
        assert_eq!(decoded, m);
    }

    #[test]
    fn round_trips_every_variant() {
        assert_round_trips(Message::FindSuccessorRequest { id: 42 });
        assert_round_trips(Message::FindSuccessorResponse { found: Some(sample_node()) });
        assert_round_trips(Message::FindSuccessorResponse { found: None });
        assert_round_trips(Message::GetPredecessorRequest);
        assert_round_trips(Message::GetPredecessorResponse { predecessor: Some(sample_node()) });
        assert_round_trips(Message::Notify { candidate: sample_node() });
        assert_round_trips(Message::NotifyAck { accepted: true });
        assert_round_trips(Message::Ping);
        assert_round_trips(Message::Pong);
        assert_round_trips(Message::GetRequest { key: "k".into() });
        assert_round_trips(Message::GetResponse { value: Some("v".into()) });
        assert_round_trips(Message::GetResponse { value: None });
        assert_round_trips(Message::PutRequest { key: "k".into(), value: "v".into() });
        assert_round_trips(Message::PutResponse { success: true });
        assert_round_trips(Message::TransferKeysRequest { start: 1, end: 100 });
        assert_round_trips(Message::TransferKeysResponse {
            items: vec![("a".into(), "1".into()), ("b".into(), "2".into())],
        });
        assert_round_trips(Message::ErrorResponse { message: "bad request".into() });
    }

    #[test]
    fn unknown_tag_is_a_decode_error() {
        let bytes = [0x99];
        assert!(matches!(Message::decode(&bytes), Err(DecodeError::UnknownTag(0x99))));
    }

    #[test]
    fn transfer_keys_response_reads_count_then_pairs_in_order() {
        let items = vec![("first".to_string(), "1".to_string())];
        let m = Message::TransferKeysResponse { items };
        assert_round_trips(m);
    }

    /// Every variant round-trips for randomly generated field values, not
    /// just the fixed samples above — covers ids near the wraparound edges,
    /// empty/unicode strings, and varying item counts.
    #[test]
    fn round_trips_under_random_field_values() {
        use rand::Rng;
        let mut rng = rand::thread_rng();

        fn random_string(rng: &mut impl Rng) -> String {
            let len = rng.gen_range(0..12);
            let mut s: String = (0..len).map(|_| rng.gen_range(b'a'..=b'z') as char).collect();
            if rng.gen_bool(0.2) {
                s.push('☃'); // exercise multi-byte UTF-8 on the wire too
            }
            s
        }

        fn random_node(rng: &mut impl Rng) -> NodeInfo {
            NodeInfo::new(NodeAddress::new(random_string(rng), rng.gen()))
        }

        for _ in 0..300 {
            let id: Identifier = rng.gen();
            assert_round_trips(Message::FindSuccessorRequest { id });
            assert_round_trips(Message::FindSuccessorResponse {
                found: if rng.gen_bool(0.5) { Some(random_node(&mut rng)) } else { None },
            });
            assert_round_trips(Message::GetPredecessorResponse {
                predecessor: if rng.gen_bool(0.5) { Some(random_node(&mut rng)) } else { None },
            });
            assert_round_trips(Message::Notify { candidate: random_node(&mut rng) });
            assert_round_trips(Message::NotifyAck { accepted: rng.gen_bool(0.5) });
            assert_round_trips(Message::GetRequest { key: random_string(&mut rng) });
            assert_round_trips(Message::GetResponse {
                value: if rng.gen_bool(0.5) { Some(random_string(&mut rng)) } else { None },
            });
            assert_round_trips(Message::PutRequest {
                key: random_string(&mut rng),
                value: random_string(&mut rng),
            });
            assert_round_trips(Message::TransferKeysRequest { start: rng.gen(), end: rng.gen() });

            let item_count = rng.gen_range(0..6);
            let items = (0..item_count).map(|_| (random_string(&mut rng), random_string(&mut rng))).collect();
            assert_round_trips(Message::TransferKeysResponse { items });

            assert_round_trips(Message::ErrorResponse { message: random_string(&mut rng) });
        }
    }
}
