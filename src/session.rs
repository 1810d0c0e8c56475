//! 세션 식별 정보, 세션 상태, 배치

use crate::entry::Entry;
use std::fmt;

/// 구독 시점에 한 번 정해지는 세션 식별 정보
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    client_id: String,
    destination: String,
}

impl SessionIdentity {
    pub fn new(client_id: impl Into<String>, destination: impl Into<String>) -> Self {
        SessionIdentity {
            client_id: client_id.into(),
            destination: destination.into(),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }
}

impl fmt::Display for SessionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.client_id, self.destination)
    }
}

/// 세션 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    /// 전송 계층 연결됨
    Connected,
    Authenticated,
    Subscribed,
    /// 한 번 이상 fetch 수행
    Streaming,
}

impl SessionState {
    /// ack/rollback/fetch가 가능한 상태
    pub fn is_subscribed(&self) -> bool {
        matches!(self, SessionState::Subscribed | SessionState::Streaming)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Disconnected => "Disconnected",
            SessionState::Connected => "Connected",
            SessionState::Authenticated => "Authenticated",
            SessionState::Subscribed => "Subscribed",
            SessionState::Streaming => "Streaming",
        };
        f.write_str(name)
    }
}

/// 한 번에 전달된 엔트리 묶음
///
/// `id == 0`이면 데이터 없음. `id > 0`이면 ack/rollback에 그대로 넘겨야 하는 커서 토큰.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    pub id: i64,
    pub entries: Vec<Entry>,
}

impl Batch {
    pub fn empty() -> Self {
        Batch::default()
    }

    pub fn is_empty(&self) -> bool {
        self.id <= 0 || self.entries.is_empty()
    }
}
