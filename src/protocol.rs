//! Canal 프레임 채널
//!
//! 모든 메시지는 `[4 bytes big-endian length][payload]` 형식으로 전송됩니다.
//! payload는 임의의 protobuf 바이트이므로 구분자 대신 길이 prefix를 사용합니다.

use crate::error::{CanalError, Result};
use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, BytesMut};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::debug;

/// 길이 헤더 크기
pub const HEADER_LEN: usize = 4;

/// 프레임 payload 최대 크기 (64 MiB)
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// 길이 prefix 프레임 채널
pub struct PacketChannel<S = TcpStream> {
    stream: Option<S>,
}

impl PacketChannel<TcpStream> {
    /// TCP 연결 (연결 시에만 timeout 적용, 이후 읽기는 무기한 대기)
    pub async fn connect(hostname: &str, port: u16, timeout: Duration) -> Result<Self> {
        let addr = format!("{}:{}", hostname, port);
        let stream = tokio::time::timeout(timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| {
                CanalError::ConnectionError(format!(
                    "Timed out connecting to {} after {:?}",
                    addr, timeout
                ))
            })?
            .map_err(|e| {
                CanalError::ConnectionError(format!("Failed to connect to {}: {}", addr, e))
            })?;

        stream.set_nodelay(true)?;

        debug!("Connected to canal server at {}", addr);

        Ok(PacketChannel::new(stream))
    }
}

impl<S> PacketChannel<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// 이미 연결된 스트림으로 채널 생성
    pub fn new(stream: S) -> Self {
        PacketChannel {
            stream: Some(stream),
        }
    }

    fn stream(&mut self) -> Result<&mut S> {
        self.stream.as_mut().ok_or(CanalError::ConnectionClosed)
    }

    /// 프레임 하나 읽기
    ///
    /// `read_exact`가 부분 읽기를 모아주며, 길이를 채우기 전에 EOF가 오면 ConnectionClosed.
    pub async fn read_packet(&mut self) -> Result<Vec<u8>> {
        let stream = self.stream()?;

        let mut len_buf = [0u8; HEADER_LEN];
        stream.read_exact(&mut len_buf).await?;
        let length = BigEndian::read_u32(&len_buf) as usize;
        if length > MAX_FRAME_LEN {
            return Err(CanalError::ProtocolError(format!(
                "Frame too large: {} bytes (max {})",
                length, MAX_FRAME_LEN
            )));
        }

        let mut buffer = vec![0u8; length];
        stream.read_exact(&mut buffer).await?;

        debug!("Read frame: {} bytes", length);

        Ok(buffer)
    }

    /// 프레임 하나 쓰기 (헤더와 본문을 한 번에 전송)
    pub async fn write_packet(&mut self, data: &[u8]) -> Result<()> {
        if data.len() > MAX_FRAME_LEN {
            return Err(CanalError::ProtocolError(format!(
                "Frame too large: {} bytes (max {})",
                data.len(),
                MAX_FRAME_LEN
            )));
        }
        let length = data.len() as u32;

        let mut frame = BytesMut::with_capacity(HEADER_LEN + data.len());
        frame.put_u32(length);
        frame.extend_from_slice(data);

        let stream = self.stream()?;
        stream.write_all(&frame).await?;
        stream.flush().await?;

        debug!("Wrote frame: {} bytes", length);

        Ok(())
    }

    /// 스트림 닫기 (여러 번 호출해도 안전)
    pub async fn close(&mut self) -> Result<()> {
        if let Some(mut stream) = self.stream.take() {
            // 이미 끊어진 연결이면 shutdown 실패는 무시
            if let Err(e) = stream.shutdown().await {
                debug!("Shutdown of closed stream failed: {}", e);
            }
            debug!("Packet channel closed");
        }
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }
}
