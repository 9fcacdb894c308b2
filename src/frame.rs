//! 프레임 인코딩/디코딩
//!
//! ```text
//!  0        4        8        12                20
//!  ┌────────┬────────┬────────┬─────────────────┬──────────────┐
//!  │ seq    │ total  │ ext    │ checksum (u64)  │ payload      │
//!  │ ASCII  │ ASCII  │ ASCII  │ big-endian      │ ≤ 492 bytes  │
//!  └────────┴────────┴────────┴─────────────────┴──────────────┘
//! ```
//!
//! 숫자 필드는 0으로 채운 4자리 10진수
//! 페이로드 길이 필드는 없음 (datagram 길이 - 헤더)

use std::fmt;
use std::path::Path;

use bytes::{BufMut, Bytes, BytesMut};

use crate::{checksum, Error, Result, HEADER_LEN, MAX_PAYLOAD_LEN};

const SEQ_RANGE: std::ops::Range<usize> = 0..4;
const TOTAL_RANGE: std::ops::Range<usize> = 4..8;
const EXT_RANGE: std::ops::Range<usize> = 8..12;
const CRC_RANGE: std::ops::Range<usize> = 12..20;

/// 숫자 필드 폭 (자리수)
const NUMERIC_WIDTH: usize = 4;

/// 숫자 필드 최대값 (4자리 10진수)
pub const MAX_FIELD_VALUE: u32 = 9999;

/// 확장자 태그 폭
pub const EXTENSION_WIDTH: usize = 4;

/// 파일 확장자 태그 (ASCII, 최대 4바이트)
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ExtensionTag(String);

impl ExtensionTag {
    pub fn new(tag: &str) -> Result<Self> {
        if !tag.is_ascii() || tag.bytes().any(|b| b.is_ascii_control()) {
            return Err(Error::malformed(format!("확장자 태그가 ASCII가 아님: {tag:?}")));
        }
        if tag.len() > EXTENSION_WIDTH {
            return Err(Error::FieldOverflow {
                field: "extension",
                value: tag.len() as u64,
                max: EXTENSION_WIDTH as u64,
            });
        }
        Ok(Self(tag.to_string()))
    }

    /// 파일 경로의 확장자로 태그 생성 (점 제외)
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) => Self::new(ext),
            None => Ok(Self::default()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// 공백으로 채운 고정 폭 표현
    fn to_field(&self) -> [u8; EXTENSION_WIDTH] {
        let mut field = [b' '; EXTENSION_WIDTH];
        field[..self.0.len()].copy_from_slice(self.0.as_bytes());
        field
    }

    fn from_field(field: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(trim_padding(field))
            .map_err(|_| Error::malformed("확장자 태그가 ASCII가 아님"))?;
        Self::new(text)
    }
}

impl fmt::Display for ExtensionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 디코딩된 프레임
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// 청크 인덱스 (0부터)
    pub sequence_index: u32,

    /// 총 청크 수 (index 0 프레임에서만 유효)
    pub total_count: u32,

    /// 파일 확장자 태그
    pub extension: ExtensionTag,

    /// 헤더에 기록된 체크섬
    pub checksum: u64,

    /// 청크 데이터
    pub payload: Bytes,
}

impl Frame {
    /// 프레임을 바이트로 인코딩
    pub fn encode(
        sequence_index: u32,
        total_count: u32,
        extension: &ExtensionTag,
        payload: &[u8],
    ) -> Result<Bytes> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(Error::PayloadTooLarge {
                len: payload.len(),
                max: MAX_PAYLOAD_LEN,
            });
        }

        let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
        put_numeric(&mut buf, "sequence_index", sequence_index)?;
        put_numeric(&mut buf, "total_count", total_count)?;
        buf.put_slice(&extension.to_field());
        buf.put_u64(checksum::compute(payload));
        buf.put_slice(payload);
        Ok(buf.freeze())
    }

    /// 바이트에서 프레임 디코딩
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::malformed(format!(
                "헤더보다 짧음: {} bytes",
                bytes.len()
            )));
        }
        let payload = &bytes[HEADER_LEN..];
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(Error::malformed(format!(
                "페이로드 초과: {} bytes",
                payload.len()
            )));
        }

        let mut crc = [0u8; 8];
        crc.copy_from_slice(&bytes[CRC_RANGE]);

        Ok(Self {
            sequence_index: parse_numeric(&bytes[SEQ_RANGE], "sequence_index")?,
            total_count: parse_numeric(&bytes[TOTAL_RANGE], "total_count")?,
            extension: ExtensionTag::from_field(&bytes[EXT_RANGE])?,
            checksum: u64::from_be_bytes(crc),
            payload: Bytes::copy_from_slice(payload),
        })
    }

    /// 체크섬 검증
    pub fn verify(&self) -> bool {
        checksum::verify(&self.payload, self.checksum)
    }

    /// 체크섬 검증 (불일치 상세 포함)
    pub fn check(&self) -> Result<()> {
        let got = checksum::compute(&self.payload);
        if got == self.checksum {
            Ok(())
        } else {
            Err(Error::ChecksumMismatch {
                expected: self.checksum,
                got,
            })
        }
    }
}

fn put_numeric(buf: &mut BytesMut, field: &'static str, value: u32) -> Result<()> {
    if value > MAX_FIELD_VALUE {
        return Err(Error::FieldOverflow {
            field,
            value: value as u64,
            max: MAX_FIELD_VALUE as u64,
        });
    }
    buf.put_slice(format!("{value:0width$}", width = NUMERIC_WIDTH).as_bytes());
    Ok(())
}

fn parse_numeric(field: &[u8], name: &str) -> Result<u32> {
    let digits = trim_padding(field);
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return Err(Error::malformed(format!("{name} 필드가 숫자가 아님: {field:?}")));
    }
    // 최대 4자리라 오버플로 없음
    Ok(digits
        .iter()
        .fold(0u32, |acc, d| acc * 10 + (d - b'0') as u32))
}

/// 앞뒤 공백/NUL 제거
fn trim_padding(field: &[u8]) -> &[u8] {
    let is_pad = |b: &u8| *b == 0 || b.is_ascii_whitespace();
    let start = field.iter().position(|b| !is_pad(b)).unwrap_or(field.len());
    let end = field.iter().rposition(|b| !is_pad(b)).map_or(start, |i| i + 1);
    &field[start..end]
}
