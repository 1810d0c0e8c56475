//! Canal 인증 처리
//!
//! handshake의 seeds를 이용한 scramble411 (MySQL native password와 동일) 구현

use crate::packet::ClientAuth;
use std::fmt::Write;

/// 비밀번호 전송 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    /// 비밀번호를 그대로 전송
    #[default]
    Plain,
    /// handshake seeds로 scramble한 값을 hex 문자열로 전송
    Scramble,
}

/// scramble411 응답 생성
///
/// `SHA1(password) XOR SHA1(seeds + SHA1(SHA1(password)))`
pub fn scramble411(password: &[u8], seeds: &[u8]) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }

    let stage1 = sha1(password);
    let stage2 = sha1(&stage1);

    let mut combined = seeds.to_vec();
    combined.extend_from_slice(&stage2);
    let stage3 = sha1(&combined);

    stage1
        .iter()
        .zip(stage3.iter())
        .map(|(a, b)| a ^ b)
        .collect()
}

fn sha1(data: &[u8]) -> Vec<u8> {
    use sha1::{Digest, Sha1};
    let mut hasher = Sha1::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// 소문자 hex 인코딩
fn to_hex(data: &[u8]) -> String {
    data.iter().fold(String::with_capacity(data.len() * 2), |mut out, b| {
        let _ = write!(out, "{:02x}", b);
        out
    })
}

/// ClientAuth 메시지 생성
pub fn create_client_auth(
    username: &str,
    password: &str,
    seeds: &[u8],
    mode: AuthMode,
) -> ClientAuth {
    let password = match mode {
        AuthMode::Plain => password.as_bytes().to_vec(),
        AuthMode::Scramble => {
            let scrambled = scramble411(password.as_bytes(), seeds);
            to_hex(&scrambled).into_bytes()
        }
    };

    ClientAuth {
        username: username.to_string(),
        password,
        ..Default::default()
    }
}
