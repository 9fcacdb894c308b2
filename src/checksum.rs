//! 페이로드 CRC 검증
//!
//! CRC-32(IEEE)를 헤더의 8바이트 필드 폭(u64)으로 확장해서 사용
//! 헤더 바이트는 절대 포함하지 않음

/// 페이로드 체크섬 계산
pub fn compute(payload: &[u8]) -> u64 {
    crc32fast::hash(payload) as u64
}

/// 페이로드 체크섬 검증
///
/// 불일치는 에러가 아니라 `false` (손상 처리는 호출자 몫)
pub fn verify(payload: &[u8], checksum: u64) -> bool {
    compute(payload) == checksum
}
