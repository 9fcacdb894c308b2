//! 에러 타입 정의

use thiserror::Error;

/// RFT 프로토콜 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error("잘못된 프레임: {reason}")]
    MalformedFrame { reason: String },

    #[error("페이로드 크기 초과: {len} bytes (최대 {max})")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("헤더 필드 범위 초과: {field}={value} (최대 {max})")]
    FieldOverflow {
        field: &'static str,
        value: u64,
        max: u64,
    },

    #[error("CRC 불일치: expected {expected:08X}, got {got:08X}")]
    ChecksumMismatch { expected: u64, got: u64 },

    #[error("응답 대기 타임아웃: {timeout_ms}ms")]
    ProtocolTimeout { timeout_ms: u64 },

    #[error("유효하지 않은 ACK: {0:?}")]
    InvalidAck(String),

    #[error("전송할 청크 없음")]
    EmptyTransfer,

    #[error("유효하지 않은 설정: {0}")]
    InvalidConfig(String),

    #[error("세션 포기: {idle_rounds} 라운드 연속 응답 없음")]
    Abandoned { idle_rounds: u32 },
}

impl Error {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Error::MalformedFrame {
            reason: reason.into(),
        }
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
