//! 송신자 (클라이언트측)
//!
//! - Slow Start: 라운드마다 윈도우 2배 (상한 4096)
//! - Fast Retransmit: 같은 ACK 3회 → 누락 청크 하나만 재전송
//! - 완료 ACK 수신 시 `end` 한 번 보내고 소켓 해제
//!
//! [`SenderSession`]은 상태만 관리하고 소켓 I/O는 [`Sender`]가 담당

use std::net::SocketAddr;
use std::ops::Range;
use std::path::Path;
use std::time::Instant;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::chunk::ChunkSplitter;
use crate::frame::{ExtensionTag, Frame, MAX_FIELD_VALUE};
use crate::message::Message;
use crate::stats::TransferStats;
use crate::{teardown, transport, Config, Error, Result, HEADER_LEN};

/// 송신 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    /// 윈도우 증가 중
    Ramping,

    /// 다음 라운드에 해당 인덱스 하나만 재전송
    FastRetransmit(u32),

    /// 버스트 전송 후 ACK 대기
    AwaitingAck,

    /// 전체 청크 확인됨
    Completed,

    /// 응답 없음으로 포기
    Abandoned,
}

/// 라운드 결과
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    /// 결론 없음, 다음 라운드 진행
    Retry,

    /// 해당 인덱스 즉시 재전송
    Retransmit(u32),

    /// 수신자가 완료 보고
    Completed,

    /// 세션 포기
    Abandoned,
}

/// 한 라운드에 보낼 청크 범위
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Burst {
    pub indices: Range<u32>,
    pub window: u32,
    pub retransmit: bool,
}

impl Burst {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// 송신 세션 상태
#[derive(Debug)]
pub struct SenderSession {
    /// 인코딩된 프레임 (인덱스 순)
    frames: Vec<Bytes>,

    /// 인덱스별 ACK 관측 횟수 (ack - 1 위치)
    confirmation_counts: Vec<u32>,

    /// 현재 윈도우 (시작 시 없음)
    window: Option<u32>,

    state: SenderState,

    window_cap: u32,
    duplicate_ack_threshold: u32,
    max_idle_rounds: Option<u32>,

    /// 연속 무응답 라운드 수
    idle_rounds: u32,

    /// 이번 라운드에 ACK를 하나라도 받았는지
    heard: bool,

    stats: TransferStats,
}

impl SenderSession {
    /// 세션 시작: 전체 프레임 미리 인코딩
    pub fn start(chunks: &[Bytes], extension: &ExtensionTag, config: &Config) -> Result<Self> {
        config.validate()?;
        if chunks.is_empty() {
            return Err(Error::EmptyTransfer);
        }
        if chunks.len() > MAX_FIELD_VALUE as usize {
            return Err(Error::FieldOverflow {
                field: "total_count",
                value: chunks.len() as u64,
                max: MAX_FIELD_VALUE as u64,
            });
        }

        let total = chunks.len() as u32;
        let frames = chunks
            .iter()
            .enumerate()
            .map(|(idx, chunk)| Frame::encode(idx as u32, total, extension, chunk))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            confirmation_counts: vec![0; frames.len()],
            frames,
            window: None,
            state: SenderState::Ramping,
            window_cap: config.window_cap,
            duplicate_ack_threshold: config.duplicate_ack_threshold,
            max_idle_rounds: config.max_idle_rounds,
            idle_rounds: 0,
            heard: false,
            stats: TransferStats::new(),
        })
    }

    /// 총 청크 수
    pub fn total(&self) -> u32 {
        self.frames.len() as u32
    }

    pub fn state(&self) -> SenderState {
        self.state
    }

    pub fn window(&self) -> Option<u32> {
        self.window
    }

    pub fn idle_rounds(&self) -> u32 {
        self.idle_rounds
    }

    pub fn confirmation_count(&self, index: u32) -> u32 {
        self.confirmation_counts
            .get(index as usize)
            .copied()
            .unwrap_or(0)
    }

    pub fn frame(&self, index: u32) -> Option<&Bytes> {
        self.frames.get(index as usize)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, SenderState::Completed | SenderState::Abandoned)
    }

    pub fn stats(&self) -> &TransferStats {
        &self.stats
    }

    pub fn into_stats(self) -> TransferStats {
        self.stats
    }

    /// 버스트 시작 위치: 카운터가 0이 아닌 마지막 인덱스 + 1
    fn burst_start(&self) -> u32 {
        self.confirmation_counts
            .iter()
            .rposition(|&count| count != 0)
            .map_or(0, |idx| idx as u32 + 1)
    }

    /// 다음 라운드 버스트 결정
    pub fn next_burst(&mut self) -> Burst {
        if self.is_finished() {
            let start = self.total();
            return Burst {
                indices: start..start,
                window: self.window.unwrap_or(0),
                retransmit: false,
            };
        }

        self.heard = false;
        self.stats.rounds += 1;

        let burst = match self.state {
            SenderState::FastRetransmit(index) => {
                self.confirmation_counts[index as usize] = 0;
                self.window = Some(1);
                self.stats.fast_retransmits += 1;
                Burst {
                    indices: index..index + 1,
                    window: 1,
                    retransmit: true,
                }
            }
            _ => {
                let window = self
                    .window
                    .map_or(1, |prev| prev.saturating_mul(2).min(self.window_cap))
                    .max(1);
                self.window = Some(window);

                let start = self.burst_start();
                let end = start.saturating_add(window).min(self.total()).max(start);
                Burst {
                    indices: start..end,
                    window,
                    retransmit: false,
                }
            }
        };

        self.stats.record_window(burst.window);
        self.state = SenderState::AwaitingAck;
        burst
    }

    /// 프레임 전송 기록
    pub fn record_sent(&mut self, index: u32) {
        if let Some(frame) = self.frames.get(index as usize) {
            self.stats.frames_sent += 1;
            self.stats.bytes_sent += frame.len().saturating_sub(HEADER_LEN) as u64;
        }
    }

    pub fn record_malformed(&mut self) {
        self.stats.malformed_datagrams += 1;
    }

    /// ACK 처리
    ///
    /// 라운드를 끝내야 하는 경우에만 `Some`
    pub fn on_ack(&mut self, ack: u32) -> Option<RoundOutcome> {
        if self.is_finished() {
            return None;
        }

        self.stats.acks_received += 1;
        self.heard = true;
        self.idle_rounds = 0;

        // 아직 아무것도 확정되지 않음
        if ack == 0 {
            return None;
        }

        let total = self.total();
        if ack > total {
            debug!("범위 밖 ACK 무시: {} (총 {})", ack, total);
            return None;
        }

        let slot = (ack - 1) as usize;
        self.confirmation_counts[slot] += 1;
        let count = self.confirmation_counts[slot];

        if ack == total {
            self.state = SenderState::Completed;
            return Some(RoundOutcome::Completed);
        }

        if count == self.duplicate_ack_threshold {
            debug!("중복 ACK {}회: 청크 {} 재전송 예정", count, ack);
            self.state = SenderState::FastRetransmit(ack);
            return Some(RoundOutcome::Retransmit(ack));
        }

        None
    }

    /// ACK 대기 타임아웃 처리
    pub fn on_timeout(&mut self) -> RoundOutcome {
        match self.state {
            SenderState::Completed => return RoundOutcome::Completed,
            SenderState::Abandoned => return RoundOutcome::Abandoned,
            _ => {}
        }

        self.stats.timeouts += 1;

        if !self.heard {
            // 아무 응답도 없었던 라운드: 윈도우 1부터 다시
            self.idle_rounds += 1;
            self.window = None;

            if let Some(max) = self.max_idle_rounds {
                if self.idle_rounds >= max {
                    self.state = SenderState::Abandoned;
                    return RoundOutcome::Abandoned;
                }
            }
        }

        if !matches!(self.state, SenderState::FastRetransmit(_)) {
            self.state = SenderState::Ramping;
        }
        RoundOutcome::Retry
    }
}

/// 송신자
pub struct Sender {
    config: Config,
    socket: UdpSocket,
    peer: SocketAddr,
}

impl Sender {
    /// 임시 포트로 소켓 생성
    ///
    /// 소켓 생성 실패는 세션 시작 전 에러로 반환
    pub async fn connect(config: Config, peer: SocketAddr) -> Result<Self> {
        config.validate()?;
        let socket = transport::bind_ephemeral(peer).await?;
        info!(
            "RFT Sender started on {}, receiver: {}",
            socket.local_addr()?,
            peer
        );

        Ok(Self {
            config,
            socket,
            peer,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// 파일 전송
    pub async fn send_file(self, path: &Path) -> Result<TransferStats> {
        let splitter = ChunkSplitter::new(self.config.chunk_size)?;
        let (chunks, extension) = splitter.read_file(path)?;
        info!(
            "파일 로드: {:?} ({} chunks x {} bytes, ext={:?})",
            path,
            chunks.len(),
            splitter.chunk_size(),
            extension.as_str()
        );

        self.send_chunks(&chunks, &extension).await
    }

    /// 청크 전송
    ///
    /// 완료 시 통계 반환, 포기 시 `Error::Abandoned`
    pub async fn send_chunks(
        self,
        chunks: &[Bytes],
        extension: &ExtensionTag,
    ) -> Result<TransferStats> {
        let mut session = SenderSession::start(chunks, extension, &self.config)?;
        let mut buf = vec![0u8; self.config.recv_buffer_size];

        info!("Slow start: {} chunks → {}", session.total(), self.peer);

        loop {
            let burst = session.next_burst();
            self.transmit(&mut session, &burst).await;

            match self.receive_acks(&mut session, &mut buf).await {
                RoundOutcome::Retry => {}
                RoundOutcome::Retransmit(index) => {
                    debug!("Fast retransmit: chunk {}", index);
                }
                RoundOutcome::Completed => {
                    teardown::send_end(&self.socket, self.peer).await;
                    info!("Upload completed! {}", session.stats().sender_summary());
                    return Ok(session.into_stats());
                }
                RoundOutcome::Abandoned => {
                    let idle_rounds = session.idle_rounds();
                    warn!(
                        "수신자 응답 없음, 전송 포기: {}",
                        session.stats().sender_summary()
                    );
                    return Err(Error::Abandoned { idle_rounds });
                }
            }
        }
    }

    /// 버스트 전송
    async fn transmit(&self, session: &mut SenderSession, burst: &Burst) {
        if burst.is_empty() {
            debug!("보낼 청크 없음, 완료 ACK 대기");
            return;
        }

        debug!(
            "Sending chunks {}..{} (window={}{})",
            burst.indices.start,
            burst.indices.end,
            burst.window,
            if burst.retransmit { ", retransmit" } else { "" }
        );

        for index in burst.indices.clone() {
            let Some(frame) = session.frame(index).cloned() else {
                continue;
            };
            if transport::send_logged(&self.socket, &frame, self.peer, "프레임").await {
                session.record_sent(index);
            }
        }
    }

    /// 결론이 나거나 타임아웃될 때까지 ACK 수신
    async fn receive_acks(&self, session: &mut SenderSession, buf: &mut [u8]) -> RoundOutcome {
        loop {
            let started = Instant::now();
            match transport::recv_within(&self.socket, buf, self.config.ack_timeout()).await {
                Ok((len, from)) => match Message::from_bytes(&buf[..len]) {
                    Ok(Message::Ack(ack)) => {
                        debug!("ACK {} 수신 ({})", ack, from);
                        if let Some(outcome) = session.on_ack(ack) {
                            return outcome;
                        }
                    }
                    Ok(Message::End) => {
                        debug!("송신자에게 end 수신, 무시 ({})", from);
                    }
                    Err(e) => {
                        session.record_malformed();
                        debug!("ACK 파싱 실패 ({}): {}", from, e);
                    }
                },
                Err(Error::ProtocolTimeout { timeout_ms }) => {
                    debug!("{}ms 동안 ACK 없음", timeout_ms);
                    return session.on_timeout();
                }
                Err(e) => {
                    warn!("ACK 수신 에러: {}", e);
                    transport::wait_remaining(started, self.config.ack_timeout()).await;
                    return session.on_timeout();
                }
            }
        }
    }
}
