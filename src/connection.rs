//! Canal 서버 연결 설정

use crate::auth::AuthMode;
use std::time::Duration;

/// 기본 연결 timeout
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// 연결 및 구독 설정
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub hostname: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub client_id: String,
    pub destination: String,
    /// 구독 필터 (예: `.*\\..*`, `db\\.table1,db\\.table2`)
    pub filter: String,
    /// TCP 연결 timeout
    pub timeout: Duration,
    pub batch_size: i32,
    /// 빈 배치를 받은 뒤 다음 fetch까지 대기 시간
    pub poll_interval: Duration,
    pub auth_mode: AuthMode,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            hostname: "127.0.0.1".to_string(),
            port: 11111,
            username: String::new(),
            password: String::new(),
            client_id: "1001".to_string(),
            destination: "example".to_string(),
            filter: ".*\\..*".to_string(),
            timeout: DEFAULT_CONNECT_TIMEOUT,
            batch_size: 100,
            poll_interval: Duration::from_secs(1),
            auth_mode: AuthMode::Plain,
        }
    }
}

impl ConnectionConfig {
    pub fn new(hostname: impl Into<String>, destination: impl Into<String>) -> Self {
        ConnectionConfig {
            hostname: hostname.into(),
            destination: destination.into(),
            ..Default::default()
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.hostname, self.port)
    }
}
