//! Uploaded-file handles.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;

/// A user-supplied file: a name, a byte size and asynchronous content access.
#[async_trait]
pub trait SourceFile: Send + Sync + std::fmt::Debug {
    fn name(&self) -> &str;

    fn size(&self) -> u64;

    /// Reads at most `len` bytes from the start of the file.
    async fn read_prefix(&self, len: usize) -> io::Result<Vec<u8>>;

    async fn read_all(&self) -> io::Result<Vec<u8>>;

    /// Reads the whole file as text. Invalid UTF-8 sequences are replaced
    /// and a leading byte-order mark is dropped.
    async fn read_text(&self) -> io::Result<String> {
        let bytes = self.read_all().await?;
        let text = String::from_utf8_lossy(&bytes);
        Ok(text.strip_prefix('\u{feff}').unwrap_or(text.as_ref()).to_string())
    }
}

/// A file on the local filesystem.
#[derive(Debug, Clone)]
pub struct DiskFile {
    path: PathBuf,
    name: String,
    size: u64,
}

impl DiskFile {
    /// Opens `path`, capturing its name and size up front.
    pub async fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = tokio::fs::metadata(&path).await?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("not a regular file: {}", path.display()),
            ));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        Ok(Self {
            path,
            name,
            size: metadata.len(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl SourceFile for DiskFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.size
    }

    async fn read_prefix(&self, len: usize) -> io::Result<Vec<u8>> {
        let file = tokio::fs::File::open(&self.path).await?;
        let mut buf = Vec::with_capacity(len);
        file.take(len as u64).read_to_end(&mut buf).await?;
        Ok(buf)
    }

    async fn read_all(&self) -> io::Result<Vec<u8>> {
        tokio::fs::read(&self.path).await
    }
}

/// A file held entirely in memory.
#[derive(Debug, Clone)]
pub struct MemoryFile {
    name: String,
    data: Arc<[u8]>,
}

impl MemoryFile {
    pub fn new(name: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            data: Arc::from(data.into()),
        }
    }
}

#[async_trait]
impl SourceFile for MemoryFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    async fn read_prefix(&self, len: usize) -> io::Result<Vec<u8>> {
        let end = len.min(self.data.len());
        Ok(self.data[..end].to_vec())
    }

    async fn read_all(&self) -> io::Result<Vec<u8>> {
        Ok(self.data.to_vec())
    }
}
