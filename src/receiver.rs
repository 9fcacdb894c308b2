//! 수신자 (서버측)
//!
//! - 프레임 CRC 검증 후 인덱스 위치에 저장
//! - 누적 ACK: 아직 확정되지 않은 가장 낮은 인덱스
//! - 손상 프레임은 상태 변경 없이 현재 ACK 재전송 (송신자 중복 ACK 유도)
//! - 전체 확정 시 ACK = 총 청크 수

use std::net::SocketAddr;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::chunk::FileAssembler;
use crate::frame::{ExtensionTag, Frame};
use crate::message::Message;
use crate::stats::TransferStats;
use crate::teardown::{self, TeardownOutcome};
use crate::{transport, Config, Result};

/// 수신 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    /// index 0 프레임 대기 (총 청크 수 모름)
    AwaitingFirstFrame,

    /// 청크 수신 중
    Receiving,

    /// 전체 청크 확정
    Completed,

    /// 종료 핸드쉐이크 끝
    Closed,
}

/// 수신 세션 상태
#[derive(Debug)]
pub struct ReceiverSession {
    state: ReceiverState,

    /// 인덱스별 확정 여부
    confirmed: Vec<bool>,

    /// 미확정 청크 수
    outstanding: usize,

    /// 가장 낮은 미확정 인덱스
    next_expected: u32,

    /// 인덱스 순 청크 데이터
    chunks: Vec<Bytes>,

    extension: ExtensionTag,

    stats: TransferStats,
}

impl ReceiverSession {
    pub fn new() -> Self {
        Self {
            state: ReceiverState::AwaitingFirstFrame,
            confirmed: Vec::new(),
            outstanding: 0,
            next_expected: 0,
            chunks: Vec::new(),
            extension: ExtensionTag::default(),
            stats: TransferStats::new(),
        }
    }

    pub fn state(&self) -> ReceiverState {
        self.state
    }

    /// 총 청크 수 (첫 프레임 전에는 0)
    pub fn total(&self) -> u32 {
        self.confirmed.len() as u32
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    pub fn next_expected(&self) -> u32 {
        self.next_expected
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.state, ReceiverState::Completed | ReceiverState::Closed)
    }

    pub fn chunks(&self) -> &[Bytes] {
        &self.chunks
    }

    pub fn extension(&self) -> &ExtensionTag {
        &self.extension
    }

    pub fn stats(&self) -> &TransferStats {
        &self.stats
    }

    /// 보낼 ACK 값
    pub fn ack_value(&self) -> u32 {
        if self.is_complete() {
            self.total()
        } else {
            self.next_expected
        }
    }

    pub fn record_ack_sent(&mut self) {
        self.stats.acks_sent += 1;
    }

    pub fn close(&mut self) {
        self.state = ReceiverState::Closed;
    }

    pub fn into_parts(self) -> (Vec<Bytes>, ExtensionTag, TransferStats) {
        (self.chunks, self.extension, self.stats)
    }

    /// datagram 처리
    ///
    /// 프레임으로 해석 불가하면 손실과 동일하게 무시 (`None`)
    pub fn on_datagram(&mut self, bytes: &[u8]) -> Option<u32> {
        match Frame::decode(bytes) {
            Ok(frame) => Some(self.on_frame(frame)),
            Err(e) => {
                self.stats.malformed_datagrams += 1;
                debug!("datagram 폐기: {}", e);
                None
            }
        }
    }

    /// 프레임 처리 후 보낼 ACK 반환
    pub fn on_frame(&mut self, frame: Frame) -> u32 {
        let index = frame.sequence_index;

        if let Err(e) = frame.check() {
            self.stats.corrupted_frames += 1;
            debug!("청크 {} 손상: {}", index, e);
            return self.ack_value();
        }

        if self.state == ReceiverState::AwaitingFirstFrame {
            if index != 0 || frame.total_count == 0 {
                debug!("첫 프레임 전 청크 {} 수신, 무시", index);
                return self.ack_value();
            }
            self.initialize(frame.total_count);
        }

        let slot = index as usize;
        if slot >= self.confirmed.len() {
            debug!("범위 밖 청크 {} (총 {})", index, self.total());
            return self.ack_value();
        }

        self.stats.frames_received += 1;

        if self.confirmed[slot] {
            self.stats.duplicate_frames += 1;
        } else {
            self.stats.bytes_received += frame.payload.len() as u64;
            self.chunks[slot] = frame.payload;
            self.confirmed[slot] = true;
            self.outstanding -= 1;
            self.next_expected = self.lowest_unconfirmed();
        }

        if self.outstanding == 0 && self.state == ReceiverState::Receiving {
            self.extension = frame.extension;
            self.state = ReceiverState::Completed;
            info!(
                "전체 {} 청크 수신 완료 (ext={:?})",
                self.total(),
                self.extension.as_str()
            );
        }

        self.ack_value()
    }

    fn initialize(&mut self, total: u32) {
        let total = total as usize;
        self.confirmed = vec![false; total];
        self.chunks = vec![Bytes::new(); total];
        self.outstanding = total;
        self.next_expected = 0;
        self.state = ReceiverState::Receiving;
        debug!("세션 초기화: {} 청크", total);
    }

    fn lowest_unconfirmed(&self) -> u32 {
        self.confirmed
            .iter()
            .position(|&confirmed| !confirmed)
            .unwrap_or(self.confirmed.len()) as u32
    }
}

impl Default for ReceiverSession {
    fn default() -> Self {
        Self::new()
    }
}

/// 수신 결과
#[derive(Debug)]
pub struct ReceiveReport<T> {
    /// 조립기 출력
    pub output: T,

    /// 송신자 주소
    pub peer: SocketAddr,

    pub teardown: TeardownOutcome,

    pub stats: TransferStats,
}

/// 수신자
pub struct Receiver {
    config: Config,
    socket: UdpSocket,
}

impl Receiver {
    /// 소켓 바인딩
    pub async fn bind(config: Config, bind_addr: SocketAddr) -> Result<Self> {
        config.validate()?;
        let socket = UdpSocket::bind(bind_addr).await?;
        info!("RFT Receiver started on {}", socket.local_addr()?);
        Ok(Self { config, socket })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// 파일 하나 수신
    ///
    /// 완료 ACK 전송 → 조립기 호출 → 종료 핸드쉐이크 순서
    pub async fn receive<A: FileAssembler>(
        self,
        assembler: &mut A,
    ) -> Result<ReceiveReport<A::Output>> {
        let mut session = ReceiverSession::new();
        let mut buf = vec![0u8; self.config.recv_buffer_size];

        info!("Listening...");

        let peer = loop {
            let (len, from) = match self.socket.recv_from(&mut buf).await {
                Ok(received) => received,
                Err(e) => {
                    warn!("수신 에러: {}", e);
                    continue;
                }
            };

            let Some(ack) = session.on_datagram(&buf[..len]) else {
                continue;
            };

            let reply = Message::Ack(ack).to_bytes();
            if transport::send_logged(&self.socket, &reply, from, "ACK").await {
                session.record_ack_sent();
            }

            if session.is_complete() {
                break from;
            }
        };

        info!("File received! {}", session.stats().receiver_summary());

        let output = assembler.assemble(session.chunks(), session.extension());
        if let Err(e) = &output {
            warn!("파일 조립 실패: {}", e);
        }

        let teardown =
            teardown::await_end(&self.socket, peer, session.ack_value(), &self.config).await;
        session.close();

        let (_, _, stats) = session.into_parts();
        Ok(ReceiveReport {
            output: output?,
            peer,
            teardown,
            stats,
        })
    }
}
