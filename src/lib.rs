//! Canal CDC (Change Data Capture) 클라이언트 핵심 구현
//!
//! Canal 서버에 접속하여 변경 로그를 배치 단위로 가져오고 행 단위 변경 이벤트로 변환합니다.
//! 주요 기능:
//! - 길이 prefix 프레임 전송
//! - handshake / 인증 / 구독 세션 관리
//! - 배치 fetch, ack, rollback
//! - 변경 로그 엔트리 디코딩

pub mod auth;
pub mod client;
pub mod connection;
pub mod entry;
pub mod error;
pub mod events;
pub mod packet;
pub mod protocol;
pub mod session;

pub use auth::AuthMode;
pub use client::CanalClient;
pub use connection::ConnectionConfig;
pub use entry::Entry;
pub use error::{CanalError, Result};
pub use events::{decode, decode_batch, ChangeData, NormalizedChange, OperationType};
pub use session::{Batch, SessionIdentity, SessionState};
