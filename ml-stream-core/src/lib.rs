//! Core stream abstraction for ML data loading pipelines
//!
//! This crate provides the lazy, pull-based [`DataStream`] that every source
//! and transform is built from: in-process sources, chunked reads over byte
//! containers (in-memory buffers, files, memory-mapped files), stream
//! concatenation, and regrouping of records into columnar batches.
//!
//! ```no_run
//! use ml_stream_core::{ChunkOptions, ChunkStream, DataStream, FileContainer};
//!
//! # async fn run() -> ml_stream_core::Result<()> {
//! let file = FileContainer::open("train.bin").await?;
//! let mut chunks = ChunkStream::new(file, ChunkOptions::default().with_chunk_size(64 * 1024))?;
//! while let Some(chunk) = chunks.next().await? {
//!     println!("read {} bytes", chunk.len());
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod column;
pub mod error;
pub mod io;
pub mod record;
pub mod record_batch;
pub mod source;
pub mod stream;
pub mod tensor;
pub mod transform;

// Re-export key types for convenience
pub use column::Column;
pub use error::{Error, Result};
pub use io::{
    ByteChunk, ByteContainer, ByteStream, ChunkCursor, ChunkOptions, ChunkStream, FileContainer,
    MemoryMappedFile,
};
pub use record::{Record, Value};
pub use record_batch::{RecordBatch, RecordBatches};
pub use source::{
    stream_from_concatenated, stream_from_function, stream_from_incrementing, stream_from_items,
};
pub use stream::{BoxDataStream, DataStream, DataStreamExt, StreamState};
pub use tensor::DenseTensor;
pub use transform::Concatenated;
