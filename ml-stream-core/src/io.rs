//! Byte containers and the chunked byte stream over them

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use memmap2::{Mmap, MmapOptions};
use serde::{Deserialize, Serialize};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{Error, Result};
use crate::stream::{BoxDataStream, DataStream, StreamState};

/// An immutable slice of raw bytes read from a container
pub type ByteChunk = Bytes;

/// A type-erased stream of byte chunks
pub type ByteStream = BoxDataStream<ByteChunk>;

/// Default number of bytes per chunk (1 MiB)
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// A seekable container of bytes with a known total size
#[async_trait]
pub trait ByteContainer: Send + Sync {
    /// Total size of the container in bytes
    fn size(&self) -> u64;

    /// Read the bytes in `start..end`
    ///
    /// Callers only request ranges within `0..size()`.
    async fn read_range(&self, start: u64, end: u64) -> Result<Bytes>;
}

fn checked_range(start: u64, end: u64, size: u64) -> Result<(usize, usize)> {
    if start > end || end > size {
        return Err(Error::IndexOutOfBounds);
    }
    let start = usize::try_from(start).map_err(|_| Error::IndexOutOfBounds)?;
    let end = usize::try_from(end).map_err(|_| Error::IndexOutOfBounds)?;
    Ok((start, end))
}

#[async_trait]
impl ByteContainer for Bytes {
    fn size(&self) -> u64 {
        self.len() as u64
    }

    async fn read_range(&self, start: u64, end: u64) -> Result<Bytes> {
        let (start, end) = checked_range(start, end, self.len() as u64)?;
        Ok(self.slice(start..end))
    }
}

/// Memory-mapped file for zero-copy reads
pub struct MemoryMappedFile {
    /// The memory map, absent for empty files which cannot be mapped
    mmap: Option<Mmap>,

    /// The path to the file
    path: PathBuf,

    /// The size of the file in bytes
    size: u64,
}

impl MemoryMappedFile {
    /// Open a file for memory-mapped reading
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = std::fs::File::open(&path)?;
        let size = file.metadata()?.len();

        let mmap = if size == 0 {
            None
        } else {
            // The mapping is read-only and owned by this value.
            #[allow(unsafe_code)]
            let mmap = unsafe { MmapOptions::new().map(&file)? };
            Some(mmap)
        };
        // The mapped length wins over `metadata` if the file changed in between.
        let size = mmap.as_ref().map_or(0, |m| m.len() as u64);
        debug!(path = %path.display(), size, "memory-mapped file");

        Ok(Self { mmap, path, size })
    }

    /// Get the mapped bytes
    pub fn as_slice(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or(&[])
    }

    /// Get the path to the file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ByteContainer for MemoryMappedFile {
    fn size(&self) -> u64 {
        self.size
    }

    async fn read_range(&self, start: u64, end: u64) -> Result<Bytes> {
        let (start, end) = checked_range(start, end, self.size)?;
        let bytes = self.as_slice().get(start..end).ok_or(Error::IndexOutOfBounds)?;
        Ok(Bytes::copy_from_slice(bytes))
    }
}

/// A file read through positioned async reads
///
/// The handle sits behind a mutex because a positioned read is a seek
/// followed by a read, and the pair must not interleave.
pub struct FileContainer {
    file: Mutex<File>,
    path: PathBuf,
    size: u64,
}

impl FileContainer {
    /// Open a file for reading
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).await?;
        let size = file.metadata().await?.len();
        debug!(path = %path.display(), size, "opened file");

        Ok(Self {
            file: Mutex::new(file),
            path,
            size,
        })
    }

    /// Get the path to the file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ByteContainer for FileContainer {
    fn size(&self) -> u64 {
        self.size
    }

    async fn read_range(&self, start: u64, end: u64) -> Result<Bytes> {
        let (from, to) = checked_range(start, end, self.size)?;
        let mut buf = vec![0u8; to - from];

        let mut file = self.file.lock().await;
        file.seek(SeekFrom::Start(start))
            .await
            .map_err(|e| Error::read(start, end, e))?;
        file.read_exact(&mut buf)
            .await
            .map_err(|e| Error::read(start, end, e))?;

        Ok(Bytes::from(buf))
    }
}

/// Options for chunked reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkOptions {
    /// Byte offset at which to begin reading
    pub offset: u64,

    /// Number of bytes to read per chunk
    pub chunk_size: usize,
}

impl Default for ChunkOptions {
    fn default() -> Self {
        Self {
            offset: 0,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ChunkOptions {
    /// Set the chunk size
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Set the starting offset
    pub fn with_offset(mut self, offset: u64) -> Self {
        self.offset = offset;
        self
    }

    /// Check that the options describe a readable chunking
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(Error::InvalidArgument("Chunk size must be greater than 0".into()));
        }
        Ok(())
    }
}

/// Read position of a chunked stream
///
/// The cursor never touches the container; it only computes which range the
/// next read should cover and where the read after that starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkCursor {
    offset: u64,
    chunk_size: u64,
}

impl ChunkCursor {
    /// Create a cursor at `offset` stepping by `chunk_size`
    pub fn new(offset: u64, chunk_size: usize) -> Self {
        Self {
            offset,
            chunk_size: chunk_size as u64,
        }
    }

    /// Current offset
    pub fn offset(self) -> u64 {
        self.offset
    }

    /// The range the next read covers in a container of `size` bytes
    ///
    /// `None` once the offset has reached the end. The range is clipped to
    /// `size`, so the last chunk may be short.
    pub fn range(self, size: u64) -> Option<(u64, u64)> {
        if self.offset >= size {
            return None;
        }
        let end = self.offset.saturating_add(self.chunk_size).min(size);
        Some((self.offset, end))
    }

    /// The cursor for the following read
    ///
    /// Always steps by the full chunk size, even after a short read.
    pub fn advance(self) -> Self {
        Self {
            offset: self.offset.saturating_add(self.chunk_size),
            chunk_size: self.chunk_size,
        }
    }
}

/// A stream of fixed-size chunks read from a byte container
///
/// Every chunk has `chunk_size` bytes except possibly the last. An empty
/// container yields no chunks. Read failures are returned from `next` and
/// are not retried.
pub struct ChunkStream<C> {
    container: C,
    cursor: ChunkCursor,
    state: StreamState,
}

impl<C: ByteContainer> ChunkStream<C> {
    /// Create a chunk stream over `container`
    pub fn new(container: C, options: ChunkOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            container,
            cursor: ChunkCursor::new(options.offset, options.chunk_size),
            state: StreamState::Active,
        })
    }

    /// Offset of the next read
    pub fn position(&self) -> u64 {
        self.cursor.offset()
    }

    /// Get a reference to the container
    pub fn container(&self) -> &C {
        &self.container
    }

    async fn pull(&mut self) -> Result<Option<ByteChunk>> {
        let Some((start, end)) = self.cursor.range(self.container.size()) else {
            return Ok(None);
        };

        let chunk = self.container.read_range(start, end).await?;
        if chunk.len() as u64 != end - start {
            return Err(Error::read(start, end, std::io::ErrorKind::UnexpectedEof.into()));
        }

        self.cursor = self.cursor.advance();
        Ok(Some(chunk))
    }
}

#[async_trait]
impl<C: ByteContainer> DataStream for ChunkStream<C> {
    type Item = ByteChunk;

    async fn next(&mut self) -> Result<Option<ByteChunk>> {
        if !self.state.ensure_active()? {
            return Ok(None);
        }
        let pulled = self.pull().await;
        self.state.settle(pulled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use test_case::test_case;

    fn alphabet() -> Bytes {
        Bytes::from_static(b"abcdefghijklmnopqrstuvwxyz")
    }

    fn chunk_lengths(chunks: &[ByteChunk]) -> Vec<usize> {
        chunks.iter().map(Bytes::len).collect()
    }

    struct FailingContainer {
        kind: std::io::ErrorKind,
    }

    #[async_trait]
    impl ByteContainer for FailingContainer {
        fn size(&self) -> u64 {
            100
        }

        async fn read_range(&self, start: u64, end: u64) -> Result<Bytes> {
            Err(Error::read(start, end, std::io::Error::new(self.kind, "read failed")))
        }
    }

    struct ShortReadContainer;

    #[async_trait]
    impl ByteContainer for ShortReadContainer {
        fn size(&self) -> u64 {
            10
        }

        async fn read_range(&self, _start: u64, _end: u64) -> Result<Bytes> {
            Ok(Bytes::from_static(b"abc"))
        }
    }

    #[test]
    fn test_cursor_ranges() {
        let cursor = ChunkCursor::new(0, 10);
        assert_eq!(cursor.range(26), Some((0, 10)));

        let cursor = cursor.advance().advance();
        assert_eq!(cursor.offset(), 20);
        assert_eq!(cursor.range(26), Some((20, 26)));

        let cursor = cursor.advance();
        assert_eq!(cursor.offset(), 30);
        assert_eq!(cursor.range(26), None);
    }

    #[test]
    fn test_default_chunk_options() {
        let options = ChunkOptions::default();
        assert_eq!(options.offset, 0);
        assert_eq!(options.chunk_size, 1_048_576);
    }

    #[test]
    fn test_chunk_options_from_json() {
        let options: ChunkOptions = serde_json::from_str(r#"{"chunk_size": 10}"#).unwrap();
        assert_eq!(options, ChunkOptions::default().with_chunk_size(10));
    }

    #[test]
    fn test_zero_chunk_size_is_rejected() {
        let result = ChunkStream::new(alphabet(), ChunkOptions::default().with_chunk_size(0));
        assert!(matches!(result, Err(Error::InvalidArgument(_))));
    }

    #[test_case(26, 10, 0 => vec![10, 10, 6]; "short tail")]
    #[test_case(20, 10, 0 => vec![10, 10]; "exact multiple")]
    #[test_case(26, 10, 5 => vec![10, 10, 1]; "offset")]
    #[test_case(3, 10, 0 => vec![3]; "smaller than one chunk")]
    #[test_case(0, 4, 0 => Vec::<usize>::new(); "empty")]
    fn test_cursor_walk(size: u64, chunk_size: usize, offset: u64) -> Vec<usize> {
        let mut cursor = ChunkCursor::new(offset, chunk_size);
        let mut lengths = Vec::new();
        while let Some((start, end)) = cursor.range(size) {
            lengths.push(usize::try_from(end - start).unwrap());
            cursor = cursor.advance();
        }
        lengths
    }

    #[tokio::test]
    async fn test_chunks_of_in_memory_bytes() {
        let options = ChunkOptions::default().with_chunk_size(10);
        let mut stream = ChunkStream::new(alphabet(), options).unwrap();
        let chunks = stream.collect_remaining().await.unwrap();

        assert_eq!(chunk_lengths(&chunks), vec![10, 10, 6]);
        assert_eq!(&chunks[0][..], b"abcdefghij");
        assert_eq!(&chunks[2][..], b"uvwxyz");
        assert_eq!(stream.position(), 30);
    }

    #[tokio::test]
    async fn test_start_offset() {
        let options = ChunkOptions::default().with_chunk_size(10).with_offset(20);
        let mut stream = ChunkStream::new(alphabet(), options).unwrap();
        let chunks = stream.collect_remaining().await.unwrap();
        assert_eq!(chunks, vec![Bytes::from_static(b"uvwxyz")]);
    }

    #[tokio::test]
    async fn test_offset_past_end_yields_nothing() {
        let options = ChunkOptions::default().with_offset(100);
        let mut stream = ChunkStream::new(alphabet(), options).unwrap();
        assert_eq!(stream.next().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_empty_container_ends_immediately() {
        let mut stream = ChunkStream::new(Bytes::new(), ChunkOptions::default()).unwrap();
        assert_eq!(stream.next().await.unwrap(), None);
        assert_eq!(stream.next().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_read_error_fails_the_stream() {
        let container = FailingContainer {
            kind: std::io::ErrorKind::Interrupted,
        };
        let mut stream = ChunkStream::new(container, ChunkOptions::default()).unwrap();

        match stream.next().await {
            Err(Error::Read { start, end, source }) => {
                assert_eq!((start, end), (0, 100));
                assert_eq!(source.kind(), std::io::ErrorKind::Interrupted);
            }
            other => panic!("expected a read error, got {other:?}"),
        }
        assert!(matches!(stream.next().await, Err(Error::StreamFailed)));
    }

    #[tokio::test]
    async fn test_short_read_is_a_read_error() {
        let mut stream = ChunkStream::new(ShortReadContainer, ChunkOptions::default()).unwrap();
        match stream.next().await {
            Err(Error::Read { start, end, source }) => {
                assert_eq!((start, end), (0, 10));
                assert_eq!(source.kind(), std::io::ErrorKind::UnexpectedEof);
            }
            other => panic!("expected a read error, got {other:?}"),
        }
        assert!(matches!(stream.next().await, Err(Error::StreamFailed)));
    }

    #[tokio::test]
    async fn test_file_container() {
        let subscriber = tracing_subscriber::fmt()
            .with_test_writer()
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"abcdefghijklmnopqrstuvwxyz").unwrap();

        let container = FileContainer::open(file.path()).await.unwrap();
        assert_eq!(container.size(), 26);
        assert_eq!(&container.read_range(3, 6).await.unwrap()[..], b"def");

        let options = ChunkOptions::default().with_chunk_size(8);
        let mut stream = ChunkStream::new(container, options).unwrap();
        let chunks = stream.collect_remaining().await.unwrap();
        assert_eq!(chunk_lengths(&chunks), vec![8, 8, 8, 2]);
        assert_eq!(chunks.concat(), b"abcdefghijklmnopqrstuvwxyz".to_vec());
    }

    #[tokio::test]
    async fn test_memory_mapped_container() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[7u8; 1000]).unwrap();
        file.flush().unwrap();

        let container = MemoryMappedFile::open(file.path()).unwrap();
        assert_eq!(container.size(), 1000);
        assert_eq!(container.as_slice().len(), 1000);
        assert!(matches!(container.read_range(990, 1001).await, Err(Error::IndexOutOfBounds)));

        let options = ChunkOptions::default().with_chunk_size(300);
        let mut stream = ChunkStream::new(container, options).unwrap();
        let chunks = stream.collect_remaining().await.unwrap();
        assert_eq!(chunk_lengths(&chunks), vec![300, 300, 300, 100]);
    }

    #[tokio::test]
    async fn test_empty_memory_mapped_file() {
        let file = NamedTempFile::new().unwrap();
        let container = MemoryMappedFile::open(file.path()).unwrap();
        assert_eq!(container.size(), 0);

        let mut stream = ChunkStream::new(container, ChunkOptions::default()).unwrap();
        assert_eq!(stream.next().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_out_of_range_read_is_rejected() {
        let bytes = alphabet();
        assert!(matches!(bytes.read_range(20, 30).await, Err(Error::IndexOutOfBounds)));
        assert!(matches!(bytes.read_range(5, 4).await, Err(Error::IndexOutOfBounds)));
    }

    proptest! {
        #[test]
        fn prop_chunk_count_and_lengths(size in 0usize..2048, chunk_size in 1usize..300) {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let data = Bytes::from((0..size).map(|i| (i % 251) as u8).collect::<Vec<u8>>());

            let chunks = runtime.block_on(async {
                let options = ChunkOptions::default().with_chunk_size(chunk_size);
                let mut stream = ChunkStream::new(data.clone(), options).unwrap();
                stream.collect_remaining().await.unwrap()
            });

            prop_assert_eq!(chunks.len(), size.div_ceil(chunk_size));
            if let Some((last, rest)) = chunks.split_last() {
                prop_assert!(rest.iter().all(|chunk| chunk.len() == chunk_size));
                let expected_last = if size % chunk_size == 0 {
                    chunk_size
                } else {
                    size % chunk_size
                };
                prop_assert_eq!(last.len(), expected_last);
            }
            prop_assert_eq!(chunks.concat(), data.to_vec());
        }
    }
}
