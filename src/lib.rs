//! # RFT (Reliable File Transfer)
//!
//! UDP 위에서 동작하는 단일 파일 전송 프로토콜
//!
//! ## 핵심 특징
//! - **고정 폭 프레임**: 20바이트 ASCII 헤더 + 최대 492바이트 페이로드
//! - **CRC 검증**: 페이로드 손상 시 이전 ACK를 다시 보내 재전송 유도
//! - **Slow Start**: 라운드마다 전송 윈도우 2배 증가 (최대 4096)
//! - **Fast Retransmit**: 같은 ACK 3회 수신 시 누락 청크 하나만 즉시 재전송
//! - **명시적 종료**: 완료 ACK + `end` 제어 메시지로 양쪽 세션 정리

pub mod checksum;
pub mod chunk;
pub mod config;
pub mod error;
pub mod frame;
pub mod message;
pub mod receiver;
pub mod sender;
pub mod stats;
pub mod teardown;
pub mod transport;

pub use chunk::{ChunkSplitter, DiskAssembler, FileAssembler, MemoryAssembler};
pub use config::Config;
pub use error::{Error, Result};
pub use frame::{ExtensionTag, Frame};
pub use message::Message;
pub use receiver::{ReceiveReport, Receiver, ReceiverSession, ReceiverState};
pub use sender::{Burst, RoundOutcome, Sender, SenderSession, SenderState};
pub use stats::TransferStats;
pub use teardown::TeardownOutcome;

/// 프레임 헤더 길이 (바이트)
pub const HEADER_LEN: usize = 20;

/// 프레임당 최대 페이로드 (바이트)
pub const MAX_PAYLOAD_LEN: usize = 492;

/// 최대 프레임 길이 (헤더 + 페이로드)
pub const MAX_FRAME_LEN: usize = HEADER_LEN + MAX_PAYLOAD_LEN;

/// 전송 윈도우 상한 (청크 수)
pub const MAX_WINDOW: u32 = 4096;

/// Fast Retransmit를 유발하는 중복 ACK 수
pub const DUPLICATE_ACK_THRESHOLD: u32 = 3;

/// 세션 종료 제어 메시지
pub const END_MARKER: &[u8; 3] = b"end";

/// 수신자 기본 포트
pub const DEFAULT_PORT: u16 = 3000;
