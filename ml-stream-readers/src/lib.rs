//! Byte sources for ML data pipelines
//!
//! This crate provides the sources that feed raw bytes into
//! [`ml_stream_core`] streams: local files, single remote resources and
//! sequences of sharded remote resources. Remote access goes through the
//! [`Transport`] trait; [`InMemoryTransport`] serves resources from memory
//! and, with the `http` feature, `HttpTransport` fetches them over HTTP.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use ml_stream_core::{ChunkOptions, DataStream};
//! use ml_stream_readers::{InMemoryTransport, ShardSequenceOptions, ShardSequenceSource};
//!
//! # async fn run() -> ml_stream_readers::Result<()> {
//! let transport =
//!     Arc::new(InMemoryTransport::new().with_resource("train-00000.bin", vec![0u8; 4096]));
//! let options = ShardSequenceOptions::default()
//!     .with_suffix(".bin")
//!     .with_chunk(ChunkOptions::default().with_chunk_size(1024));
//! let source = ShardSequenceSource::new(transport, "train-", options)?;
//!
//! let mut chunks = source.open();
//! while let Some(chunk) = chunks.next().await? {
//!     println!("read {} bytes", chunk.len());
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod data_source;
pub mod error;
#[cfg(feature = "http")]
pub mod http;
pub mod remote;
pub mod shard;
pub mod transport;

pub use data_source::{DataSource, FileDataSource, UrlDataSource};
pub use error::{Error, Result};
#[cfg(feature = "http")]
pub use http::HttpTransport;
pub use remote::{fetch_chunks, Unavailable};
pub use shard::{
    render_index, IndexOverflow, ShardChunks, ShardDescriptor, ShardSequenceOptions,
    ShardSequenceSource, ShardStep, Shards,
};
pub use transport::{
    InMemoryTransport, RequestTemplate, Transport, TransportOptions, TransportResponse,
};

// Re-export core types
pub use ml_stream_core::{ByteChunk, ByteStream, ChunkOptions, Result as CoreResult};
