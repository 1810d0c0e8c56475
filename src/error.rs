//! Canal 클라이언트 에러 타입

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CanalError {
    #[error("Canal 서버 연결 에러: {0}")]
    ConnectionError(String),

    #[error("서버가 연결을 닫았습니다")]
    ConnectionClosed,

    #[error("프로토콜 에러: {0}")]
    ProtocolError(String),

    #[error("인증 실패 (error code: {code}): {message}")]
    AuthError { code: i32, message: String },

    #[error("구독 실패 (error code: {code}): {message}")]
    SubscribeError { code: i32, message: String },

    #[error("데이터 조회 실패 (error code: {code}): {message}")]
    FetchError { code: i32, message: String },

    #[error("메시지 디코딩 에러: {0}")]
    DecodeError(String),

    #[error("배치 {batch_id} 엔트리 디코딩 에러: {message}")]
    BatchDecodeError { batch_id: i64, message: String },

    #[error("잘못된 세션 상태: {0}")]
    InvalidState(String),

    #[error("I/O 에러: {0}")]
    IoError(String),

    #[error("직렬화 에러: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl CanalError {
    /// 세션을 더 이상 사용할 수 없는 전송 계층 에러인지 여부
    ///
    /// `true`이면 handshake → auth → subscribe 과정을 처음부터 다시 수행해야 합니다.
    pub fn is_connection_lost(&self) -> bool {
        matches!(
            self,
            CanalError::ConnectionError(_) | CanalError::ConnectionClosed | CanalError::IoError(_)
        )
    }
}

impl From<io::Error> for CanalError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => CanalError::ConnectionClosed,
            _ => CanalError::IoError(err.to_string()),
        }
    }
}

impl From<prost::DecodeError> for CanalError {
    fn from(err: prost::DecodeError) -> Self {
        CanalError::DecodeError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CanalError>;
