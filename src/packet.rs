//! Canal 세션 패킷 정의 (CanalProtocol.proto)
//!
//! 서버의 protobuf 정의와 wire 호환되도록 prost 메시지를 직접 선언합니다.
//! proto3 `oneof xxx_present` 필드는 `optional`로 표현합니다.

use crate::error::{CanalError, Result};
use prost::Message;

/// Envelope 타입
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum PacketType {
    Compatible = 0,
    Handshake = 1,
    ClientAuthentication = 2,
    Ack = 3,
    Subscription = 4,
    Unsubscription = 5,
    Get = 6,
    Messages = 7,
    ClientAck = 8,
    Shutdown = 9,
    Dump = 10,
    Heartbeat = 11,
    ClientRollback = 12,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum Compression {
    Compatible = 0,
    Uncompressed = 1,
    Zlib = 2,
    Gzip = 3,
    Lzf = 4,
}

/// 모든 메시지를 감싸는 envelope: `{type, body}`
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Packet {
    #[prost(int32, optional, tag = "1")]
    pub magic_number: Option<i32>,
    #[prost(int32, optional, tag = "2")]
    pub version: Option<i32>,
    #[prost(enumeration = "PacketType", tag = "3")]
    pub packet_type: i32,
    #[prost(enumeration = "Compression", optional, tag = "4")]
    pub compression: Option<i32>,
    #[prost(bytes = "vec", tag = "5")]
    pub body: Vec<u8>,
}

impl Packet {
    /// 메시지를 인코딩하여 envelope으로 감싸기
    pub fn wrap<M: Message>(packet_type: PacketType, body: &M) -> Self {
        Packet {
            packet_type: packet_type as i32,
            body: body.encode_to_vec(),
            ..Default::default()
        }
    }

    /// envelope 타입 (알 수 없는 값이면 ProtocolError)
    pub fn kind(&self) -> Result<PacketType> {
        PacketType::try_from(self.packet_type).map_err(|_| {
            CanalError::ProtocolError(format!("unknown packet type: {}", self.packet_type))
        })
    }

    /// body를 지정한 메시지 타입으로 디코딩
    pub fn body_as<M: Message + Default>(&self) -> Result<M> {
        Ok(M::decode(self.body.as_slice())?)
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Handshake {
    #[prost(string, optional, tag = "1")]
    pub communication_encoding: Option<String>,
    #[prost(bytes = "vec", tag = "2")]
    pub seeds: Vec<u8>,
    #[prost(enumeration = "Compression", tag = "3")]
    pub supported_compressions: i32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClientAuth {
    #[prost(string, tag = "1")]
    pub username: String,
    #[prost(bytes = "vec", tag = "2")]
    pub password: Vec<u8>,
    #[prost(int32, optional, tag = "3")]
    pub net_read_timeout: Option<i32>,
    #[prost(int32, optional, tag = "4")]
    pub net_write_timeout: Option<i32>,
    #[prost(string, tag = "5")]
    pub destination: String,
    #[prost(string, tag = "6")]
    pub client_id: String,
    #[prost(string, tag = "7")]
    pub filter: String,
    #[prost(int64, tag = "8")]
    pub start_timestamp: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Ack {
    #[prost(int32, optional, tag = "1")]
    pub error_code: Option<i32>,
    #[prost(string, tag = "2")]
    pub error_message: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Sub {
    #[prost(string, tag = "1")]
    pub destination: String,
    #[prost(string, tag = "2")]
    pub client_id: String,
    #[prost(string, tag = "7")]
    pub filter: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Get {
    #[prost(string, tag = "1")]
    pub destination: String,
    #[prost(string, tag = "2")]
    pub client_id: String,
    #[prost(int32, tag = "3")]
    pub fetch_size: i32,
    #[prost(int64, optional, tag = "4")]
    pub timeout: Option<i64>,
    #[prost(int32, optional, tag = "5")]
    pub unit: Option<i32>,
    #[prost(bool, optional, tag = "6")]
    pub auto_ack: Option<bool>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Messages {
    #[prost(int64, tag = "1")]
    pub batch_id: i64,
    #[prost(bytes = "vec", repeated, tag = "2")]
    pub messages: Vec<Vec<u8>>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClientAck {
    #[prost(string, tag = "1")]
    pub destination: String,
    #[prost(string, tag = "2")]
    pub client_id: String,
    #[prost(int64, tag = "3")]
    pub batch_id: i64,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ClientRollback {
    #[prost(string, tag = "1")]
    pub destination: String,
    #[prost(string, tag = "2")]
    pub client_id: String,
    #[prost(int64, tag = "3")]
    pub batch_id: i64,
}

/// ACK 패킷의 결과. `error_code == 0`이면 성공
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AckResult {
    pub error_code: i32,
    pub error_message: String,
}

impl AckResult {
    pub fn is_success(&self) -> bool {
        self.error_code <= 0
    }
}

impl From<Ack> for AckResult {
    fn from(ack: Ack) -> Self {
        AckResult {
            error_code: ack.error_code.unwrap_or(0),
            error_message: ack.error_message,
        }
    }
}

pub fn encode_packet(packet: &Packet) -> Vec<u8> {
    packet.encode_to_vec()
}

pub fn decode_packet(data: &[u8]) -> Result<Packet> {
    Ok(Packet::decode(data)?)
}
