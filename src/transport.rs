//! UDP 소켓 보조 함수
//!
//! 프로토콜의 유일한 대기 수단은 타임아웃이 있는 recv

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::{Duration, Instant};

use tokio::net::UdpSocket;
use tracing::warn;

use crate::{Error, Result};

/// 피어와 같은 주소 체계의 임시 포트로 바인딩
pub async fn bind_ephemeral(peer: SocketAddr) -> Result<UdpSocket> {
    let local: SocketAddr = match peer {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };
    Ok(UdpSocket::bind(local).await?)
}

/// 제한 시간 내 datagram 하나 수신
///
/// 시간 초과는 `ProtocolTimeout`, 소켓 에러는 `Io`
pub async fn recv_within(
    socket: &UdpSocket,
    buf: &mut [u8],
    wait: Duration,
) -> Result<(usize, SocketAddr)> {
    match tokio::time::timeout(wait, socket.recv_from(buf)).await {
        Ok(Ok(received)) => Ok(received),
        Ok(Err(e)) => Err(Error::Io(e)),
        Err(_) => Err(Error::ProtocolTimeout {
            timeout_ms: wait.as_millis() as u64,
        }),
    }
}

/// `started`부터 `wait`가 지날 때까지 대기
///
/// 소켓 에러로 recv가 일찍 끝나도 한 라운드는 제한 시간 전체를 차지
pub async fn wait_remaining(started: Instant, wait: Duration) {
    let remaining = wait.saturating_sub(started.elapsed());
    if !remaining.is_zero() {
        tokio::time::sleep(remaining).await;
    }
}

/// 전송 후 실패는 로그만 남김 (라운드 재시도로 흡수)
pub async fn send_logged(socket: &UdpSocket, bytes: &[u8], peer: SocketAddr, what: &str) -> bool {
    match socket.send_to(bytes, peer).await {
        Ok(_) => true,
        Err(e) => {
            warn!("{} 전송 실패 ({}): {}", what, peer, e);
            false
        }
    }
}
