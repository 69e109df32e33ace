//! Data source trait hierarchy for different source types
//!
//! A data source is a re-creatable producer of byte streams. Every call to
//! [`DataSource::get_stream`] opens or fetches the underlying data again and
//! returns a fresh stream starting from the configured offset.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use ml_stream_core::{
    ByteStream, ChunkOptions, ChunkStream, DataStreamExt, FileContainer, MemoryMappedFile,
};
use tracing::debug;

use crate::error::Result;
use crate::remote::fetch_chunks;
use crate::shard::ShardSequenceSource;
use crate::transport::{RequestTemplate, Transport};

/// Base trait for all data sources
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Open a new stream over the source's bytes
    async fn get_stream(&self) -> Result<ByteStream>;
}

/// A local file read in chunks
#[derive(Debug, Clone)]
pub struct FileDataSource {
    path: PathBuf,
    chunk: ChunkOptions,
    memory_map: bool,
}

impl FileDataSource {
    /// Create a file source read with `chunk`
    pub fn new<P: AsRef<Path>>(path: P, chunk: ChunkOptions) -> Result<Self> {
        chunk.validate()?;
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            chunk,
            memory_map: false,
        })
    }

    /// Memory-map the file instead of reading it through a file handle
    #[must_use]
    pub fn memory_mapped(mut self, memory_map: bool) -> Self {
        self.memory_map = memory_map;
        self
    }

    /// Get the path to the file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl DataSource for FileDataSource {
    async fn get_stream(&self) -> Result<ByteStream> {
        debug!(path = %self.path.display(), memory_map = self.memory_map, "opening file source");
        if self.memory_map {
            let file = MemoryMappedFile::open(&self.path)?;
            Ok(ChunkStream::new(file, self.chunk)?.boxed())
        } else {
            let file = FileContainer::open(&self.path).await?;
            Ok(ChunkStream::new(file, self.chunk)?.boxed())
        }
    }
}

/// A single remote resource read in chunks
///
/// Unlike a shard sequence there is nothing to fall back on when the
/// resource is unavailable, so that is reported as
/// [`Error::Unavailable`](crate::error::Error::Unavailable).
pub struct UrlDataSource<T: ?Sized> {
    transport: Arc<T>,
    request: RequestTemplate,
    chunk: ChunkOptions,
}

impl<T: Transport + ?Sized> UrlDataSource<T> {
    /// Create a source for `request`
    pub fn new(
        transport: Arc<T>,
        request: impl Into<RequestTemplate>,
        chunk: ChunkOptions,
    ) -> Result<Self> {
        chunk.validate()?;
        Ok(Self {
            transport,
            request: request.into(),
            chunk,
        })
    }

    /// Get the request this source fetches
    pub fn request(&self) -> &RequestTemplate {
        &self.request
    }
}

#[async_trait]
impl<T: Transport + ?Sized> DataSource for UrlDataSource<T> {
    async fn get_stream(&self) -> Result<ByteStream> {
        let chunks = fetch_chunks(self.transport.as_ref(), &self.request, self.chunk).await??;
        Ok(chunks.boxed())
    }
}

#[async_trait]
impl<T: Transport + ?Sized + 'static> DataSource for ShardSequenceSource<T> {
    async fn get_stream(&self) -> Result<ByteStream> {
        Ok(self.open().boxed())
    }
}
