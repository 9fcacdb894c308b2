//! 제어 메시지 정의
//!
//! 데이터 프레임 외에 오가는 메시지는 두 가지뿐
//! - ACK: 수신자 → 송신자, ASCII 10진수 (다음에 필요한 청크 인덱스 또는 총 청크 수)
//! - End: 송신자 → 수신자, 리터럴 `end`

use crate::{Error, Result, END_MARKER};

/// 통합 메시지 enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    /// 누적 ACK (마지막 수신 인덱스 + 1)
    Ack(u32),

    /// 세션 종료
    End,
}

impl Message {
    /// 바이트로 직렬화
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Message::Ack(ack) => ack.to_string().into_bytes(),
            Message::End => END_MARKER.to_vec(),
        }
    }

    /// 바이트에서 역직렬화
    ///
    /// 고정 크기 버퍼로 받은 경우를 위해 끝의 NUL과 공백은 무시
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let end = bytes
            .iter()
            .rposition(|b| *b != 0 && !b.is_ascii_whitespace())
            .map_or(0, |i| i + 1);
        let text = &bytes[..end];

        if text == END_MARKER {
            return Ok(Message::End);
        }

        std::str::from_utf8(text)
            .ok()
            .filter(|s| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()))
            .and_then(|s| s.parse::<u32>().ok())
            .map(Message::Ack)
            .ok_or_else(|| Error::InvalidAck(String::from_utf8_lossy(text).into_owned()))
    }

    pub fn is_end(bytes: &[u8]) -> bool {
        matches!(Self::from_bytes(bytes), Ok(Message::End))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ack_encoding() {
        assert_eq!(Message::Ack(0).to_bytes(), b"0");
        assert_eq!(Message::Ack(4096).to_bytes(), b"4096");
        assert_eq!(Message::End.to_bytes(), b"end");
    }

    #[test]
    fn test_parse_with_nul_padding() {
        let mut buf = [0u8; 16];
        buf[..2].copy_from_slice(b"42");
        assert_eq!(Message::from_bytes(&buf).unwrap(), Message::Ack(42));

        let mut buf = [0u8; 16];
        buf[..3].copy_from_slice(b"end");
        assert_eq!(Message::from_bytes(&buf).unwrap(), Message::End);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(matches!(Message::from_bytes(b""), Err(Error::InvalidAck(_))));
        assert!(matches!(Message::from_bytes(b"-1"), Err(Error::InvalidAck(_))));
        assert!(matches!(Message::from_bytes(b"12a"), Err(Error::InvalidAck(_))));
        assert!(matches!(Message::from_bytes(b"ending"), Err(Error::InvalidAck(_))));
        assert!(!Message::is_end(b"0001"));
    }
}
