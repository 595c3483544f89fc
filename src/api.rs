use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, BoxStream, StreamExt};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;

use crate::error::{NetworkError, TransferError};
use crate::models::OperationResponse;

const CHUNK_SIZE: usize = 64 * 1024;

/// progress callback: bytes moved so far, and the total when known
pub type ProgressFn = Arc<dyn Fn(u64, Option<u64>) + Send + Sync>;

/// Remote operations the tracker drives. Implemented by the http gateway;
/// tests substitute scripted implementations.
#[async_trait]
pub trait FileApi: Send + Sync {
    /// post a small json body to a mutation endpoint
    async fn mutate(
        &self,
        endpoint: &str,
        body: serde_json::Value,
    ) -> Result<OperationResponse, NetworkError>;

    /// send `file` into the remote directory `target_path`
    async fn upload(
        &self,
        file: UploadFile,
        target_path: &str,
        progress: ProgressFn,
        cancel: CancellationToken,
    ) -> Result<OperationResponse, TransferError>;

    /// fetch `remote_path` into `destination`, returning the bytes written
    async fn download(
        &self,
        remote_path: &str,
        destination: &Path,
        progress: ProgressFn,
        cancel: CancellationToken,
    ) -> Result<u64, TransferError>;
}

#[derive(Debug, Clone)]
pub enum UploadSource {
    Memory(Bytes),
    Disk(PathBuf),
}

/// a file queued for upload; its size is known before the transfer starts
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub name: String,
    pub size: u64,
    pub source: UploadSource,
}

impl UploadFile {
    pub fn from_bytes(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            name: name.into(),
            size: data.len() as u64,
            source: UploadSource::Memory(data),
        }
    }

    pub async fn from_path(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let metadata = tokio::fs::metadata(&path).await?;
        if metadata.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is a directory", path.display()),
            ));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        Ok(Self {
            name,
            size: metadata.len(),
            source: UploadSource::Disk(path),
        })
    }

    /// content as a stream of chunks
    pub async fn into_stream(self) -> io::Result<BoxStream<'static, io::Result<Bytes>>> {
        match self.source {
            UploadSource::Memory(data) => {
                let chunks: Vec<io::Result<Bytes>> = (0..data.len())
                    .step_by(CHUNK_SIZE)
                    .map(|start| Ok(data.slice(start..(start + CHUNK_SIZE).min(data.len()))))
                    .collect();
                Ok(stream::iter(chunks).boxed())
            }
            UploadSource::Disk(path) => {
                let file = tokio::fs::File::open(&path).await?;
                Ok(ReaderStream::with_capacity(file, CHUNK_SIZE).boxed())
            }
        }
    }
}
