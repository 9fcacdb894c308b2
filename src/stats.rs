//! 전송 통계

use std::time::{Duration, Instant};

/// 세션 전송 통계 (송신/수신 공용)
#[derive(Debug, Clone)]
pub struct TransferStats {
    /// 시작 시간
    pub start_time: Instant,

    /// 송신 라운드 수
    pub rounds: u64,

    /// 전송한 프레임 수 (재전송 포함)
    pub frames_sent: u64,

    /// 전송한 페이로드 바이트
    pub bytes_sent: u64,

    /// Fast Retransmit 횟수
    pub fast_retransmits: u64,

    /// 수신한 ACK 수
    pub acks_received: u64,

    /// 보낸 ACK 수
    pub acks_sent: u64,

    /// ACK 대기 타임아웃 횟수
    pub timeouts: u64,

    /// 수신한 유효 프레임 수 (중복 포함)
    pub frames_received: u64,

    /// 새로 확정된 페이로드 바이트
    pub bytes_received: u64,

    /// 이미 확정된 청크 재수신
    pub duplicate_frames: u64,

    /// CRC 불일치 프레임
    pub corrupted_frames: u64,

    /// 파싱 불가 datagram
    pub malformed_datagrams: u64,

    /// 최대 윈도우
    pub peak_window: u32,
}

impl TransferStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            rounds: 0,
            frames_sent: 0,
            bytes_sent: 0,
            fast_retransmits: 0,
            acks_received: 0,
            acks_sent: 0,
            timeouts: 0,
            frames_received: 0,
            bytes_received: 0,
            duplicate_frames: 0,
            corrupted_frames: 0,
            malformed_datagrams: 0,
            peak_window: 0,
        }
    }

    /// 경과 시간
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    pub fn record_window(&mut self, window: u32) {
        self.peak_window = self.peak_window.max(window);
    }

    /// 송신 처리율 (bytes/sec)
    pub fn send_throughput(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            return 0.0;
        }
        self.bytes_sent as f64 / elapsed
    }

    /// 수신 처리율 (bytes/sec)
    pub fn receive_throughput(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            return 0.0;
        }
        self.bytes_received as f64 / elapsed
    }

    /// 손상률 (유효 + 손상 프레임 대비)
    pub fn corruption_rate(&self) -> f64 {
        let total = self.frames_received + self.corrupted_frames;
        if total == 0 {
            return 0.0;
        }
        self.corrupted_frames as f64 / total as f64
    }

    /// 송신측 요약
    pub fn sender_summary(&self) -> String {
        format!(
            "Elapsed: {:.2}s | Rounds: {} | Frames: {} | Bytes: {} | Retransmits: {} | ACKs: {} | Timeouts: {} | Peak window: {} | Throughput: {:.2} KB/s",
            self.elapsed().as_secs_f64(),
            self.rounds,
            self.frames_sent,
            self.bytes_sent,
            self.fast_retransmits,
            self.acks_received,
            self.timeouts,
            self.peak_window,
            self.send_throughput() / 1_000.0,
        )
    }

    /// 수신측 요약
    pub fn receiver_summary(&self) -> String {
        format!(
            "Elapsed: {:.2}s | Frames: {} | Bytes: {} | Duplicates: {} | Corrupted: {:.2}% | Malformed: {} | ACKs: {} | Throughput: {:.2} KB/s",
            self.elapsed().as_secs_f64(),
            self.frames_received,
            self.bytes_received,
            self.duplicate_frames,
            self.corruption_rate() * 100.0,
            self.malformed_datagrams,
            self.acks_sent,
            self.receive_throughput() / 1_000.0,
        )
    }
}

impl Default for TransferStats {
    fn default() -> Self {
        Self::new()
    }
}
