//! 세션 종료 핸드쉐이크
//!
//! 수신자: 완료 ACK 전송 후 `end`를 기다림, 타임아웃마다 완료 ACK 재전송
//! 송신자: 완료 ACK 확인 후 `end` 한 번 전송, 응답 기다리지 않음

use std::net::SocketAddr;
use std::time::Instant;

use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::message::Message;
use crate::{transport, Config, Error};

/// 수신측 종료 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownOutcome {
    /// `end` 수신, 정상 종료
    Closed,

    /// 최대 시도 횟수 동안 `end` 없음
    GaveUp { attempts: u32 },
}

/// `end` 제어 메시지 전송 (송신자)
pub async fn send_end(socket: &UdpSocket, peer: SocketAddr) -> bool {
    let sent = transport::send_logged(socket, &Message::End.to_bytes(), peer, "end").await;
    if sent {
        debug!("end 전송 → {}", peer);
    }
    sent
}

/// `end` 대기 (수신자)
///
/// 완료 ACK는 호출 전에 이미 한 번 보낸 상태여야 함
pub async fn await_end(
    socket: &UdpSocket,
    peer: SocketAddr,
    completion_ack: u32,
    config: &Config,
) -> TeardownOutcome {
    let ack = Message::Ack(completion_ack).to_bytes();
    let mut buf = vec![0u8; config.recv_buffer_size];
    let mut attempts = 0u32;

    loop {
        let started = Instant::now();
        match transport::recv_within(socket, &mut buf, config.teardown_timeout()).await {
            Ok((len, from)) => {
                if Message::is_end(&buf[..len]) {
                    info!("end 수신 ({}), 세션 종료", from);
                    return TeardownOutcome::Closed;
                }

                // 송신자가 아직 완료를 못 본 상태
                debug!("종료 대기 중 datagram 수신 ({} bytes), 완료 ACK 재전송", len);
                transport::send_logged(socket, &ack, from, "완료 ACK").await;
            }
            Err(e) => {
                attempts += 1;
                match e {
                    Error::ProtocolTimeout { timeout_ms } => {
                        debug!("{}ms 동안 end 없음 (시도 {})", timeout_ms, attempts);
                    }
                    other => {
                        warn!("종료 대기 중 수신 에러: {}", other);
                        transport::wait_remaining(started, config.teardown_timeout()).await;
                    }
                }

                if let Some(max) = config.teardown_max_attempts {
                    if attempts >= max {
                        warn!("No end received after {} attempts, exiting...", attempts);
                        return TeardownOutcome::GaveUp { attempts };
                    }
                }

                transport::send_logged(socket, &ack, peer, "완료 ACK").await;
            }
        }
    }
}
