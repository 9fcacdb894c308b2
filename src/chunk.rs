//! 청크 분할과 파일 조립
//!
//! - 송신 전: 파일 바이트를 고정 크기 청크로 분할
//! - 수신 완료 후: 인덱스 순서대로 청크를 이어 붙여 파일 복원

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use bytes::{Bytes, BytesMut};
use tracing::info;

use crate::frame::{ExtensionTag, MAX_FIELD_VALUE};
use crate::{Error, Result, MAX_PAYLOAD_LEN};

/// 청크 분할기 (송신측)
#[derive(Debug, Clone)]
pub struct ChunkSplitter {
    chunk_size: usize,
}

impl ChunkSplitter {
    pub fn new(chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 || chunk_size > MAX_PAYLOAD_LEN {
            return Err(Error::PayloadTooLarge {
                len: chunk_size,
                max: MAX_PAYLOAD_LEN,
            });
        }
        Ok(Self { chunk_size })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// 데이터를 청크들로 분할
    ///
    /// 빈 데이터도 빈 청크 하나로 전송 (세션은 최소 1청크)
    pub fn split(&self, data: Bytes) -> Result<Vec<Bytes>> {
        if data.is_empty() {
            return Ok(vec![Bytes::new()]);
        }

        let total_chunks = data.len().div_ceil(self.chunk_size);
        if total_chunks > MAX_FIELD_VALUE as usize {
            return Err(Error::FieldOverflow {
                field: "total_count",
                value: total_chunks as u64,
                max: MAX_FIELD_VALUE as u64,
            });
        }

        Ok((0..total_chunks)
            .map(|idx| {
                let start = idx * self.chunk_size;
                let end = (start + self.chunk_size).min(data.len());
                data.slice(start..end)
            })
            .collect())
    }

    /// 파일을 읽어 청크와 확장자 태그 반환
    pub fn read_file(&self, path: &Path) -> Result<(Vec<Bytes>, ExtensionTag)> {
        let extension = ExtensionTag::from_path(path)?;
        let data = Bytes::from(fs::read(path)?);
        let chunks = self.split(data)?;
        Ok((chunks, extension))
    }
}

/// 수신 완료된 청크들로 파일을 만드는 협력자
pub trait FileAssembler {
    type Output;

    fn assemble(&mut self, chunks: &[Bytes], extension: &ExtensionTag) -> Result<Self::Output>;
}

/// 메모리 조립기 (청크 연결만)
#[derive(Debug, Default, Clone, Copy)]
pub struct MemoryAssembler;

impl FileAssembler for MemoryAssembler {
    type Output = Bytes;

    fn assemble(&mut self, chunks: &[Bytes], _extension: &ExtensionTag) -> Result<Bytes> {
        let total: usize = chunks.iter().map(Bytes::len).sum();
        let mut buf = BytesMut::with_capacity(total);
        for chunk in chunks {
            buf.extend_from_slice(chunk);
        }
        Ok(buf.freeze())
    }
}

/// 디스크 조립기
///
/// `dir/stem.ext` 경로에 기록 (확장자 없으면 `dir/stem`)
#[derive(Debug, Clone)]
pub struct DiskAssembler {
    dir: PathBuf,
    stem: String,
}

impl DiskAssembler {
    pub fn new(dir: impl Into<PathBuf>, stem: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            stem: stem.into(),
        }
    }

    pub fn target_path(&self, extension: &ExtensionTag) -> PathBuf {
        if extension.is_empty() {
            self.dir.join(&self.stem)
        } else {
            self.dir.join(format!("{}.{}", self.stem, extension))
        }
    }
}

impl FileAssembler for DiskAssembler {
    type Output = PathBuf;

    fn assemble(&mut self, chunks: &[Bytes], extension: &ExtensionTag) -> Result<PathBuf> {
        let path = self.target_path(extension);
        fs::create_dir_all(&self.dir)?;

        let mut file = fs::File::create(&path)?;
        let mut written = 0usize;
        for chunk in chunks {
            file.write_all(chunk)?;
            written += chunk.len();
        }
        file.sync_all()?;

        info!("파일 저장: {:?} ({} bytes)", path, written);
        Ok(path)
    }
}
