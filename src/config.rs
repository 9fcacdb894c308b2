//! 프로토콜 설정

use std::time::Duration;

use crate::{Error, Result, DUPLICATE_ACK_THRESHOLD, MAX_PAYLOAD_LEN, MAX_WINDOW};

/// RFT 프로토콜 설정
#[derive(Debug, Clone)]
pub struct Config {
    /// 청크 크기 (바이트, 최대 492)
    pub chunk_size: usize,

    /// 송신자 ACK 대기 타임아웃 (밀리초)
    /// recv 호출마다 적용됨
    pub ack_timeout_ms: u64,

    /// 수신자 `end` 대기 타임아웃 (밀리초)
    pub teardown_timeout_ms: u64,

    /// 종료 대기 최대 시도 횟수
    /// None이면 `end` 수신 때까지 무한 재시도
    pub teardown_max_attempts: Option<u32>,

    /// 전송 윈도우 상한 (청크 수)
    pub window_cap: u32,

    /// Fast Retransmit 기준 중복 ACK 수
    pub duplicate_ack_threshold: u32,

    /// 연속 무응답 라운드 허용치
    /// 초과 시 송신 세션 포기, None이면 무제한
    pub max_idle_rounds: Option<u32>,

    /// 수신 버퍼 크기 (바이트)
    pub recv_buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chunk_size: MAX_PAYLOAD_LEN,
            ack_timeout_ms: 100,            // 100ms
            teardown_timeout_ms: 300,       // 300ms
            teardown_max_attempts: Some(20),
            window_cap: MAX_WINDOW,
            duplicate_ack_threshold: DUPLICATE_ACK_THRESHOLD,
            max_idle_rounds: Some(100),     // 약 10초
            recv_buffer_size: 2048,
        }
    }
}

impl Config {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 로컬 네트워크용 설정
    pub fn lan() -> Self {
        Self {
            ack_timeout_ms: 20,
            teardown_timeout_ms: 100,
            teardown_max_attempts: Some(10),
            max_idle_rounds: Some(250),
            ..Self::default()
        }
    }

    /// 불안정한 네트워크용 설정
    pub fn unstable_network() -> Self {
        Self {
            chunk_size: 256,                // 작은 청크
            ack_timeout_ms: 250,
            teardown_timeout_ms: 600,
            teardown_max_attempts: Some(50),
            window_cap: 256,
            max_idle_rounds: Some(240),     // 약 1분
            ..Self::default()
        }
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_millis(self.ack_timeout_ms)
    }

    pub fn teardown_timeout(&self) -> Duration {
        Duration::from_millis(self.teardown_timeout_ms)
    }

    /// 설정값 검증
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 || self.chunk_size > MAX_PAYLOAD_LEN {
            return Err(Error::InvalidConfig(format!(
                "chunk_size {} (1..={} 필요)",
                self.chunk_size, MAX_PAYLOAD_LEN
            )));
        }
        if self.window_cap == 0 || self.window_cap > MAX_WINDOW {
            return Err(Error::InvalidConfig(format!(
                "window_cap {} (1..={} 필요)",
                self.window_cap, MAX_WINDOW
            )));
        }
        if self.duplicate_ack_threshold == 0 {
            return Err(Error::InvalidConfig("duplicate_ack_threshold 0".into()));
        }
        if self.ack_timeout_ms == 0 || self.teardown_timeout_ms == 0 {
            return Err(Error::InvalidConfig("타임아웃은 0보다 커야 함".into()));
        }
        if self.recv_buffer_size < crate::MAX_FRAME_LEN {
            return Err(Error::InvalidConfig(format!(
                "recv_buffer_size {} (최소 {})",
                self.recv_buffer_size,
                crate::MAX_FRAME_LEN
            )));
        }
        Ok(())
    }
}
