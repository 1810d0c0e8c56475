//! Canal 세션 클라이언트
//!
//! handshake → 인증 → 구독 → fetch/ack → rollback 순서를 관리하는 상태 머신입니다.
//! 모든 요청은 하나의 연결 위에서 순서대로 실행되며, 응답을 기다리는 것은 fetch 계열
//! (및 연결/인증/구독) 뿐이고 ack와 rollback은 전송만 합니다.

use crate::auth::{self, AuthMode};
use crate::connection::DEFAULT_CONNECT_TIMEOUT;
use crate::entry::Entry;
use crate::error::{CanalError, Result};
use crate::packet::{
    decode_packet, encode_packet, Ack, AckResult, ClientAck, ClientRollback, Get, Handshake,
    Messages, Packet, PacketType, Sub,
};
use crate::protocol::PacketChannel;
use crate::session::{Batch, SessionIdentity, SessionState};
use prost::Message;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, info, warn};

/// 서버 기본값 사용
pub const SERVER_DEFAULT: i64 = -1;

/// Canal 클라이언트
pub struct CanalClient<S = TcpStream> {
    channel: Option<PacketChannel<S>>,
    state: SessionState,
    identity: Option<SessionIdentity>,
    seeds: Vec<u8>,
    auth_mode: AuthMode,
}

impl<S> Default for CanalClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn default() -> Self {
        Self::new()
    }
}

impl CanalClient<TcpStream> {
    /// TCP 연결 후 handshake 수신
    pub async fn connect(&mut self, hostname: &str, port: u16) -> Result<()> {
        self.connect_timeout(hostname, port, DEFAULT_CONNECT_TIMEOUT)
            .await
    }

    pub async fn connect_timeout(
        &mut self,
        hostname: &str,
        port: u16,
        timeout: Duration,
    ) -> Result<()> {
        self.ensure_state(SessionState::Disconnected, "connect")?;

        let channel = PacketChannel::connect(hostname, port, timeout).await?;
        self.connect_with(channel).await?;

        info!("Connected to {}:{}", hostname, port);
        Ok(())
    }
}

impl<S> CanalClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new() -> Self {
        CanalClient {
            channel: None,
            state: SessionState::Disconnected,
            identity: None,
            seeds: Vec::new(),
            auth_mode: AuthMode::Plain,
        }
    }

    pub fn with_auth_mode(mut self, auth_mode: AuthMode) -> Self {
        self.auth_mode = auth_mode;
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn identity(&self) -> Option<&SessionIdentity> {
        self.identity.as_ref()
    }

    /// 이미 열린 채널 위에서 handshake 수행
    ///
    /// 채널을 받은 시점에 `Connected`가 되며, handshake가 아닌 응답이 오면
    /// `Connected` 상태 그대로 ProtocolError를 반환합니다.
    pub async fn connect_with(&mut self, channel: PacketChannel<S>) -> Result<()> {
        self.ensure_state(SessionState::Disconnected, "connect")?;

        self.channel = Some(channel);
        self.state = SessionState::Connected;

        let packet = self.read_packet().await?;
        if packet.kind()? != PacketType::Handshake {
            return Err(CanalError::ProtocolError(
                "unexpected handshake response".to_string(),
            ));
        }

        // seeds 외의 handshake 필드는 사용하지 않음
        let handshake: Handshake = packet.body_as()?;
        self.seeds = handshake.seeds;

        debug!("Received handshake ({} seed bytes)", self.seeds.len());
        Ok(())
    }

    /// 인증: `Connected → Authenticated`
    pub async fn authenticate(&mut self, username: &str, password: &str) -> Result<()> {
        self.ensure_state(SessionState::Connected, "authenticate")?;

        let client_auth =
            auth::create_client_auth(username, password, &self.seeds, self.auth_mode);
        self.send(PacketType::ClientAuthentication, &client_auth)
            .await?;

        let ack = self.read_ack("authentication").await?;
        if !ack.is_success() {
            return Err(CanalError::AuthError {
                code: ack.error_code,
                message: ack.error_message,
            });
        }

        self.state = SessionState::Authenticated;
        info!("Authentication successful");
        Ok(())
    }

    /// 구독: `Authenticated → Subscribed`
    ///
    /// 구독 요청 전에 항상 `rollback(0)`을 보내 서버 측 fetch 위치를 초기화합니다.
    pub async fn subscribe(
        &mut self,
        client_id: &str,
        destination: &str,
        filter: &str,
    ) -> Result<()> {
        self.ensure_state(SessionState::Authenticated, "subscribe")?;

        let identity = SessionIdentity::new(client_id, destination);

        self.send_rollback(&identity, 0).await?;

        let sub = Sub {
            destination: identity.destination().to_string(),
            client_id: identity.client_id().to_string(),
            filter: filter.to_string(),
        };
        self.send(PacketType::Subscription, &sub).await?;

        let ack = self.read_ack("subscription").await?;
        if !ack.is_success() {
            return Err(CanalError::SubscribeError {
                code: ack.error_code,
                message: ack.error_message,
            });
        }

        info!("Subscribed {} with filter {}", identity, filter);
        self.identity = Some(identity);
        self.state = SessionState::Subscribed;
        Ok(())
    }

    /// 구독 해지 (서버와 통신하지 않음)
    pub async fn unsubscribe(&mut self) -> Result<()> {
        debug!("unsubscribe is a no-op");
        Ok(())
    }

    /// ack 없이 배치 조회
    ///
    /// `timeout`/`unit`은 서버에 그대로 전달됩니다 (`-1`은 서버 기본값).
    pub async fn fetch_without_ack(
        &mut self,
        batch_size: i32,
        timeout: i64,
        unit: i32,
    ) -> Result<Batch> {
        let identity = self.subscribed_identity("fetch")?.clone();

        let get = Get {
            destination: identity.destination().to_string(),
            client_id: identity.client_id().to_string(),
            fetch_size: batch_size,
            timeout: Some(timeout),
            unit: Some(unit),
            auto_ack: Some(false),
        };
        self.send(PacketType::Get, &get).await?;

        let packet = self.read_packet().await?;
        self.state = SessionState::Streaming;

        let batch = match packet.kind()? {
            PacketType::Messages => {
                let messages: Messages = packet.body_as()?;
                Self::batch_from_messages(messages)?
            }
            PacketType::Ack => {
                let ack: AckResult = packet.body_as::<Ack>()?.into();
                if !ack.is_success() {
                    return Err(CanalError::FetchError {
                        code: ack.error_code,
                        message: ack.error_message,
                    });
                }
                Batch::empty()
            }
            other => {
                return Err(CanalError::ProtocolError(format!(
                    "unexpected packet type: {:?}",
                    other
                )))
            }
        };

        debug!("Fetched batch {} with {} entries", batch.id, batch.entries.len());
        Ok(batch)
    }

    /// 조회 후 즉시 ack (at-most-once)
    pub async fn fetch(&mut self, batch_size: i32) -> Result<Batch> {
        let batch = self
            .fetch_without_ack(batch_size, SERVER_DEFAULT, SERVER_DEFAULT as i32)
            .await?;
        self.acknowledge(batch.id).await?;
        Ok(batch)
    }

    /// 배치 ack. id가 없거나 0이면 아무것도 보내지 않음
    pub async fn acknowledge(&mut self, batch_id: impl Into<Option<i64>>) -> Result<()> {
        let identity = self.subscribed_identity("acknowledge")?.clone();

        let batch_id = match batch_id.into() {
            Some(id) if id != 0 => id,
            _ => return Ok(()),
        };

        let ack = ClientAck {
            destination: identity.destination().to_string(),
            client_id: identity.client_id().to_string(),
            batch_id,
        };
        self.send(PacketType::ClientAck, &ack).await?;

        debug!("Acknowledged batch {}", batch_id);
        Ok(())
    }

    /// 배치 rollback. `0`이면 마지막 ack 위치로 되돌림
    pub async fn rollback(&mut self, batch_id: i64) -> Result<()> {
        let identity = self.subscribed_identity("rollback")?.clone();
        self.send_rollback(&identity, batch_id).await
    }

    /// 연결 종료 (어느 상태에서든 가능)
    pub async fn disconnect(&mut self) -> Result<()> {
        if let Some(mut channel) = self.channel.take() {
            channel.close().await?;
            info!("Disconnected");
        }
        self.reset();
        Ok(())
    }

    fn batch_from_messages(messages: Messages) -> Result<Batch> {
        // batch_id <= 0 이면 내용과 관계없이 빈 배치
        if messages.batch_id <= 0 {
            return Ok(Batch::empty());
        }

        let entries = messages
            .messages
            .iter()
            .map(|raw| Entry::decode_from(raw))
            .collect::<Result<Vec<_>>>()
            .map_err(|e| CanalError::BatchDecodeError {
                batch_id: messages.batch_id,
                message: e.to_string(),
            })?;

        Ok(Batch {
            id: messages.batch_id,
            entries,
        })
    }

    async fn send_rollback(&mut self, identity: &SessionIdentity, batch_id: i64) -> Result<()> {
        let rollback = ClientRollback {
            destination: identity.destination().to_string(),
            client_id: identity.client_id().to_string(),
            batch_id,
        };
        self.send(PacketType::ClientRollback, &rollback).await?;

        debug!("Rolled back {} to batch {}", identity, batch_id);
        Ok(())
    }

    async fn read_ack(&mut self, step: &str) -> Result<AckResult> {
        let packet = self.read_packet().await?;
        if packet.kind()? != PacketType::Ack {
            return Err(CanalError::ProtocolError(format!(
                "unexpected {} response: {:?}",
                step,
                packet.kind()?
            )));
        }
        Ok(packet.body_as::<Ack>()?.into())
    }

    async fn send<M: Message>(&mut self, packet_type: PacketType, body: &M) -> Result<()> {
        let data = encode_packet(&Packet::wrap(packet_type, body));
        let channel = self.channel()?;
        let result = channel.write_packet(&data).await;
        self.check_transport(result)
    }

    async fn read_packet(&mut self) -> Result<Packet> {
        let channel = self.channel()?;
        let result = channel.read_packet().await;
        let data = self.check_transport(result)?;
        decode_packet(&data)
    }

    fn channel(&mut self) -> Result<&mut PacketChannel<S>> {
        self.channel
            .as_mut()
            .ok_or_else(|| CanalError::InvalidState("not connected".to_string()))
    }

    /// 전송 계층 에러면 세션을 폐기
    fn check_transport<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(ref e) = result {
            if e.is_connection_lost() {
                warn!("Connection lost, session invalidated: {}", e);
                self.channel = None;
                self.reset();
            }
        }
        result
    }

    fn reset(&mut self) {
        self.state = SessionState::Disconnected;
        self.identity = None;
        self.seeds.clear();
    }

    fn ensure_state(&self, expected: SessionState, operation: &str) -> Result<()> {
        if self.state != expected {
            return Err(CanalError::InvalidState(format!(
                "{} requires {} but session is {}",
                operation, expected, self.state
            )));
        }
        Ok(())
    }

    fn subscribed_identity(&self, operation: &str) -> Result<&SessionIdentity> {
        match (&self.identity, self.state.is_subscribed()) {
            (Some(identity), true) => Ok(identity),
            _ => Err(CanalError::InvalidState(format!(
                "{} requires a subscription but session is {}",
                operation, self.state
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::{EntryType, EventType, Header};
    use tokio::io::{duplex, DuplexStream};

    /// 테스트용 서버 측 채널
    struct FakeServer {
        channel: PacketChannel<DuplexStream>,
    }

    impl FakeServer {
        async fn send<M: Message>(&mut self, packet_type: PacketType, body: &M) {
            let data = encode_packet(&Packet::wrap(packet_type, body));
            self.channel.write_packet(&data).await.unwrap();
        }

        async fn send_ack(&mut self, code: i32, message: &str) {
            let ack = Ack {
                error_code: Some(code),
                error_message: message.to_string(),
            };
            self.send(PacketType::Ack, &ack).await;
        }

        async fn recv(&mut self) -> Packet {
            let data = self.channel.read_packet().await.unwrap();
            decode_packet(&data).unwrap()
        }

        async fn recv_eof(&mut self) -> bool {
            matches!(
                self.channel.read_packet().await,
                Err(CanalError::ConnectionClosed)
            )
        }
    }

    fn pair() -> (PacketChannel<DuplexStream>, FakeServer) {
        let (client, server) = duplex(1024);
        (
            PacketChannel::new(client),
            FakeServer {
                channel: PacketChannel::new(server),
            },
        )
    }

    fn handshake() -> Handshake {
        Handshake {
            seeds: b"abcdefgh".to_vec(),
            ..Default::default()
        }
    }

    fn sample_entry(table: &str) -> Vec<u8> {
        Entry {
            header: Some(Header {
                schema_name: "shop".to_string(),
                table_name: table.to_string(),
                event_type: Some(EventType::Insert as i32),
                ..Default::default()
            }),
            entry_type: Some(EntryType::RowData as i32),
            ..Default::default()
        }
        .encode_to_vec()
    }

    async fn connected() -> (CanalClient<DuplexStream>, FakeServer) {
        let (channel, mut server) = pair();
        let mut client = CanalClient::new();
        server.send(PacketType::Handshake, &handshake()).await;
        client.connect_with(channel).await.unwrap();
        (client, server)
    }

    async fn subscribed() -> (CanalClient<DuplexStream>, FakeServer) {
        let (mut client, mut server) = connected().await;

        server.send_ack(0, "").await;
        client.authenticate("canal", "canal").await.unwrap();
        server.recv().await;

        server.send_ack(0, "").await;
        client.subscribe("1001", "example", ".*\\..*").await.unwrap();
        server.recv().await;
        server.recv().await;

        (client, server)
    }

    #[tokio::test]
    async fn test_connect_reads_handshake() {
        let (client, _server) = connected().await;
        assert_eq!(client.state(), SessionState::Connected);
        assert_eq!(client.seeds, b"abcdefgh");
    }

    #[tokio::test]
    async fn test_connect_rejects_non_handshake() {
        let (channel, mut server) = pair();
        let mut client = CanalClient::new();
        server.send_ack(0, "").await;

        let result = client.connect_with(channel).await;
        assert!(matches!(
            result,
            Err(CanalError::ProtocolError(ref m)) if m == "unexpected handshake response"
        ));
        assert_eq!(client.state(), SessionState::Connected);
    }

    #[tokio::test]
    async fn test_authenticate_success() {
        let (mut client, mut server) = connected().await;
        server.send_ack(0, "").await;

        client.authenticate("canal", "secret").await.unwrap();
        assert_eq!(client.state(), SessionState::Authenticated);

        let packet = server.recv().await;
        assert_eq!(packet.kind().unwrap(), PacketType::ClientAuthentication);
        let auth: crate::packet::ClientAuth = packet.body_as().unwrap();
        assert_eq!(auth.username, "canal");
        assert_eq!(auth.password, b"secret");
    }

    #[tokio::test]
    async fn test_authenticate_failure() {
        let (mut client, mut server) = connected().await;
        server.send_ack(1, "bad credentials").await;

        let result = client.authenticate("canal", "wrong").await;
        match result {
            Err(CanalError::AuthError { code, message }) => {
                assert_eq!(code, 1);
                assert_eq!(message, "bad credentials");
            }
            other => panic!("expected AuthError, got {:?}", other),
        }
        assert_eq!(client.state(), SessionState::Connected);
    }

    #[tokio::test]
    async fn test_authenticate_scrambles_with_seeds() {
        let (channel, mut server) = pair();
        let mut client = CanalClient::new().with_auth_mode(AuthMode::Scramble);
        server.send(PacketType::Handshake, &handshake()).await;
        client.connect_with(channel).await.unwrap();

        server.send_ack(0, "").await;
        client.authenticate("canal", "secret").await.unwrap();

        let auth: crate::packet::ClientAuth = server.recv().await.body_as().unwrap();
        let expected = auth::create_client_auth("canal", "secret", b"abcdefgh", AuthMode::Scramble);
        assert_eq!(auth.password, expected.password);
        assert_ne!(auth.password, b"secret");
    }

    #[tokio::test]
    async fn test_authenticate_requires_connection() {
        let mut client: CanalClient<DuplexStream> = CanalClient::new();
        assert!(matches!(
            client.authenticate("canal", "canal").await,
            Err(CanalError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_subscribe_sends_rollback_first() {
        let (mut client, mut server) = connected().await;
        server.send_ack(0, "").await;
        client.authenticate("canal", "canal").await.unwrap();
        server.recv().await;

        server.send_ack(0, "").await;
        client.subscribe("1001", "example", ".*\\..*").await.unwrap();
        assert_eq!(client.state(), SessionState::Subscribed);

        let first = server.recv().await;
        assert_eq!(first.kind().unwrap(), PacketType::ClientRollback);
        let rollback: ClientRollback = first.body_as().unwrap();
        assert_eq!(rollback.batch_id, 0);
        assert_eq!(rollback.client_id, "1001");
        assert_eq!(rollback.destination, "example");

        let second = server.recv().await;
        assert_eq!(second.kind().unwrap(), PacketType::Subscription);
        let sub: Sub = second.body_as().unwrap();
        assert_eq!(sub.filter, ".*\\..*");
    }

    #[tokio::test]
    async fn test_subscribe_failure() {
        let (mut client, mut server) = connected().await;
        server.send_ack(0, "").await;
        client.authenticate("canal", "canal").await.unwrap();

        server.send_ack(2, "no such destination").await;
        let result = client.subscribe("1001", "missing", ".*").await;
        assert!(matches!(result, Err(CanalError::SubscribeError { code: 2, .. })));
        assert_eq!(client.state(), SessionState::Authenticated);
        assert!(client.identity().is_none());
    }

    #[tokio::test]
    async fn test_fetch_without_ack_request_fields() {
        let (mut client, mut server) = subscribed().await;
        let messages = Messages {
            batch_id: 3,
            messages: vec![sample_entry("orders")],
        };
        server.send(PacketType::Messages, &messages).await;

        let batch = client.fetch_without_ack(10, 500, 1).await.unwrap();
        assert_eq!(batch.id, 3);
        assert_eq!(batch.entries.len(), 1);
        assert_eq!(client.state(), SessionState::Streaming);

        let get: Get = server.recv().await.body_as().unwrap();
        assert_eq!(get.client_id, "1001");
        assert_eq!(get.destination, "example");
        assert_eq!(get.fetch_size, 10);
        assert_eq!(get.timeout, Some(500));
        assert_eq!(get.unit, Some(1));
        assert_eq!(get.auto_ack, Some(false));
    }

    #[tokio::test]
    async fn test_zero_batch_id_discards_entries() {
        let (mut client, mut server) = subscribed().await;
        let messages = Messages {
            batch_id: 0,
            messages: vec![sample_entry("orders")],
        };
        server.send(PacketType::Messages, &messages).await;

        let batch = client.fetch_without_ack(10, -1, -1).await.unwrap();
        assert_eq!(batch.id, 0);
        assert!(batch.entries.is_empty());
    }

    #[tokio::test]
    async fn test_fetch_ack_success_is_empty_batch() {
        let (mut client, mut server) = subscribed().await;
        server.send_ack(0, "").await;

        let batch = client.fetch_without_ack(10, -1, -1).await.unwrap();
        assert_eq!(batch, Batch::empty());
    }

    #[tokio::test]
    async fn test_fetch_ack_failure() {
        let (mut client, mut server) = subscribed().await;
        server.send_ack(5, "destination is stopped").await;

        let result = client.fetch_without_ack(10, -1, -1).await;
        assert!(matches!(result, Err(CanalError::FetchError { code: 5, .. })));
    }

    #[tokio::test]
    async fn test_fetch_unexpected_packet_type() {
        let (mut client, mut server) = subscribed().await;
        server.send(PacketType::Handshake, &handshake()).await;

        let result = client.fetch_without_ack(10, -1, -1).await;
        assert!(matches!(result, Err(CanalError::ProtocolError(_))));
    }

    #[tokio::test]
    async fn test_undecodable_entry_reports_batch_id() {
        let (mut client, mut server) = subscribed().await;
        let messages = Messages {
            batch_id: 5,
            messages: vec![sample_entry("orders"), vec![0xff, 0xff, 0xff]],
        };
        server.send(PacketType::Messages, &messages).await;

        let result = client.fetch_without_ack(10, -1, -1).await;
        server.recv().await;
        assert!(matches!(
            result,
            Err(CanalError::BatchDecodeError { batch_id: 5, .. })
        ));
        assert_eq!(client.state(), SessionState::Streaming);

        // 디코딩 실패한 배치도 되돌릴 수 있어야 함
        client.rollback(5).await.unwrap();
        let rollback: ClientRollback = server.recv().await.body_as().unwrap();
        assert_eq!(rollback.batch_id, 5);
    }

    #[tokio::test]
    async fn test_unsubscribe_sends_nothing() {
        let (mut client, mut server) = subscribed().await;

        client.unsubscribe().await.unwrap();
        client.acknowledge(7i64).await.unwrap();

        // 다음 프레임은 ack여야 함
        let packet = server.recv().await;
        assert_eq!(packet.kind().unwrap(), PacketType::ClientAck);
        assert_eq!(client.state(), SessionState::Subscribed);
    }

    #[tokio::test]
    async fn test_rollback_before_any_fetch() {
        let (mut client, mut server) = subscribed().await;

        client.rollback(5).await.unwrap();

        let packet = server.recv().await;
        assert_eq!(packet.kind().unwrap(), PacketType::ClientRollback);
        let rollback: ClientRollback = packet.body_as().unwrap();
        assert_eq!(rollback.batch_id, 5);
        assert_eq!(rollback.client_id, "1001");
        assert_eq!(rollback.destination, "example");
        assert_eq!(client.state(), SessionState::Subscribed);
    }

    #[tokio::test]
    async fn test_authenticate_rejects_non_ack_reply() {
        let (mut client, mut server) = connected().await;
        server.send(PacketType::Messages, &Messages::default()).await;

        let expected = "unexpected authentication response: Messages";
        let result = client.authenticate("canal", "canal").await;
        assert!(matches!(
            result,
            Err(CanalError::ProtocolError(ref m)) if m == expected
        ));
        assert_eq!(client.state(), SessionState::Connected);
    }

    #[tokio::test]
    async fn test_subscribe_rejects_non_ack_reply() {
        let (mut client, mut server) = connected().await;
        server.send_ack(0, "").await;
        client.authenticate("canal", "canal").await.unwrap();
        server.recv().await;

        server.send(PacketType::Messages, &Messages::default()).await;
        let result = client.subscribe("1001", "example", ".*\\..*").await;
        assert!(matches!(result, Err(CanalError::ProtocolError(_))));
        assert_eq!(client.state(), SessionState::Authenticated);
        assert!(client.identity().is_none());
    }

    #[tokio::test]
    async fn test_refused_connect_stays_disconnected() {
        // 바인드 후 바로 닫아 연결이 거부되는 포트를 얻음
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut client: CanalClient = CanalClient::new();
        let result = client
            .connect_timeout("127.0.0.1", port, Duration::from_secs(2))
            .await;
        assert!(matches!(result, Err(CanalError::ConnectionError(_))));
        assert_eq!(client.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_fetch_before_subscribe() {
        let (mut client, _server) = connected().await;
        assert!(matches!(
            client.fetch_without_ack(10, -1, -1).await,
            Err(CanalError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_acknowledge_zero_sends_nothing() {
        let (mut client, mut server) = subscribed().await;

        client.acknowledge(0i64).await.unwrap();
        client.acknowledge(None::<i64>).await.unwrap();
        client.acknowledge(42i64).await.unwrap();

        let packet = server.recv().await;
        assert_eq!(packet.kind().unwrap(), PacketType::ClientAck);
        let ack: ClientAck = packet.body_as().unwrap();
        assert_eq!(ack.batch_id, 42);
        assert_eq!(ack.client_id, "1001");
        assert_eq!(ack.destination, "example");

        client.disconnect().await.unwrap();
        assert!(server.recv_eof().await);
    }

    #[tokio::test]
    async fn test_fetch_acknowledges_batch() {
        let (mut client, mut server) = subscribed().await;
        let messages = Messages {
            batch_id: 9,
            messages: vec![sample_entry("orders")],
        };
        server.send(PacketType::Messages, &messages).await;

        let batch = client.fetch(100).await.unwrap();
        assert_eq!(batch.id, 9);

        let get: Get = server.recv().await.body_as().unwrap();
        assert_eq!(get.fetch_size, 100);
        assert_eq!(get.timeout, Some(-1));
        assert_eq!(get.unit, Some(-1));

        let ack: ClientAck = server.recv().await.body_as().unwrap();
        assert_eq!(ack.batch_id, 9);
    }

    #[tokio::test]
    async fn test_fetch_empty_batch_is_not_acknowledged() {
        let (mut client, mut server) = subscribed().await;
        server
            .send(PacketType::Messages, &Messages::default())
            .await;

        let batch = client.fetch(100).await.unwrap();
        assert!(batch.is_empty());

        server.recv().await; // GET
        client.disconnect().await.unwrap();
        assert!(server.recv_eof().await);
    }

    #[tokio::test]
    async fn test_peer_close_invalidates_session() {
        let (mut client, server) = subscribed().await;
        drop(server);

        let result = client.fetch_without_ack(10, -1, -1).await;
        assert!(result.unwrap_err().is_connection_lost());
        assert_eq!(client.state(), SessionState::Disconnected);
        assert!(client.identity().is_none());
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let (mut client, _server) = connected().await;
        client.disconnect().await.unwrap();
        client.disconnect().await.unwrap();
        assert_eq!(client.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_end_to_end_session() {
        let (channel, mut server) = pair();
        let mut client = CanalClient::new();

        server.send(PacketType::Handshake, &handshake()).await;
        client.connect_with(channel).await.unwrap();

        server.send_ack(0, "").await;
        client.authenticate("canal", "canal").await.unwrap();
        assert_eq!(
            server.recv().await.kind().unwrap(),
            PacketType::ClientAuthentication
        );

        server.send_ack(0, "").await;
        client.subscribe("1001", "example", ".*\\..*").await.unwrap();
        assert_eq!(server.recv().await.kind().unwrap(), PacketType::ClientRollback);
        assert_eq!(server.recv().await.kind().unwrap(), PacketType::Subscription);

        let messages = Messages {
            batch_id: 7,
            messages: vec![
                sample_entry("orders"),
                sample_entry("users"),
                sample_entry("items"),
            ],
        };
        server.send(PacketType::Messages, &messages).await;
        let batch = client.fetch_without_ack(10, -1, -1).await.unwrap();
        assert_eq!(batch.id, 7);
        assert_eq!(batch.entries.len(), 3);
        assert_eq!(server.recv().await.kind().unwrap(), PacketType::Get);

        client.acknowledge(batch.id).await.unwrap();
        let ack: ClientAck = server.recv().await.body_as().unwrap();
        assert_eq!(ack.batch_id, 7);

        client.rollback(0).await.unwrap();
        let rollback_packet = server.recv().await;
        assert_eq!(rollback_packet.kind().unwrap(), PacketType::ClientRollback);
        let rollback: ClientRollback = rollback_packet.body_as().unwrap();
        assert_eq!(rollback.batch_id, 0);
        assert_eq!(client.state(), SessionState::Streaming);

        client.disconnect().await.unwrap();
        assert!(server.recv_eof().await);
    }
}
