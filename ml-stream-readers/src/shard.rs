//! Sharded remote resources
//!
//! A shard sequence is a family of remote resources named
//! `prefix + index + suffix`, with the index zero-padded to a fixed width.
//! Shards are fetched one at a time in index order and their chunks are
//! concatenated; the first shard that cannot be fetched marks the end of the
//! data.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use ml_stream_core::error::{Error as CoreError, Result as CoreResult};
use ml_stream_core::source::Incrementing;
use ml_stream_core::{ChunkOptions, ChunkStream, Concatenated, DataStream, StreamState};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::remote::{fetch_chunks, Unavailable};
use crate::transport::{RequestTemplate, Transport};

/// Default number of digits in a rendered shard index
pub const DEFAULT_INDEX_DIGITS: usize = 5;

/// What to do with an index that has more digits than the configured width
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexOverflow {
    /// Keep the rightmost digits
    #[default]
    Truncate,
    /// Fail the stream
    Fail,
}

/// Render `index` using exactly `digits` characters
///
/// Shorter renderings are zero-padded; longer ones keep their rightmost
/// `digits` characters. A width of 0 renders the index unpadded.
pub fn render_index(index: u64, digits: usize) -> String {
    let natural = index.to_string();
    if digits == 0 {
        return natural;
    }
    if natural.len() >= digits {
        return natural[natural.len() - digits..].to_string();
    }
    format!("{natural:0>digits$}")
}

/// Location of a single shard
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardDescriptor {
    /// Locator prefix
    pub base: String,
    /// Shard index
    pub index: u64,
    /// Locator suffix
    pub suffix: String,
    /// Width of the rendered index
    pub digits: usize,
}

impl ShardDescriptor {
    /// Whether the index needs more than `digits` characters
    pub fn overflows(&self) -> bool {
        self.digits != 0 && self.index.to_string().len() > self.digits
    }

    /// The rendered index
    pub fn render_index(&self) -> String {
        render_index(self.index, self.digits)
    }

    /// The full locator, truncating an overflowing index
    pub fn locator(&self) -> String {
        format!("{}{}{}", self.base, self.render_index(), self.suffix)
    }

    /// The full locator under `policy`
    pub fn try_locator(&self, policy: IndexOverflow) -> CoreResult<String> {
        if policy == IndexOverflow::Fail && self.overflows() {
            return Err(CoreError::IndexOverflow {
                index: self.index,
                digits: self.digits,
            });
        }
        Ok(self.locator())
    }
}

/// Configuration of a shard sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShardSequenceOptions {
    /// Width of the rendered index
    pub digits: usize,

    /// Appended after the index
    pub suffix: String,

    /// First shard index
    pub start_from: u64,

    /// Chunking applied to every shard
    pub chunk: ChunkOptions,

    /// Handling of indices wider than `digits`
    pub overflow: IndexOverflow,
}

impl Default for ShardSequenceOptions {
    fn default() -> Self {
        Self {
            digits: DEFAULT_INDEX_DIGITS,
            suffix: String::new(),
            start_from: 0,
            chunk: ChunkOptions::default(),
            overflow: IndexOverflow::default(),
        }
    }
}

impl ShardSequenceOptions {
    /// Parse options from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)?;
        options.chunk.validate()?;
        Ok(options)
    }

    /// Set the index width
    #[must_use]
    pub fn with_digits(mut self, digits: usize) -> Self {
        self.digits = digits;
        self
    }

    /// Set the locator suffix
    #[must_use]
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Set the first shard index
    #[must_use]
    pub fn with_start_from(mut self, start_from: u64) -> Self {
        self.start_from = start_from;
        self
    }

    /// Set the chunking applied to every shard
    #[must_use]
    pub fn with_chunk(mut self, chunk: ChunkOptions) -> Self {
        self.chunk = chunk;
        self
    }

    /// Set the index overflow policy
    #[must_use]
    pub fn with_overflow(mut self, overflow: IndexOverflow) -> Self {
        self.overflow = overflow;
        self
    }
}

/// Outcome of fetching one shard
pub enum ShardStep {
    /// The shard was fetched; its chunks are ready to be pulled
    Shard(ChunkStream<Bytes>),
    /// The shard could not be fetched, so there are no more shards
    EndOfShards(Unavailable),
}

/// A stream of byte chunks spanning every shard of a sequence
pub type ShardChunks<T> = Concatenated<Shards<T>>;

/// A sequence of sharded remote resources
///
/// Nothing is fetched until the stream returned by [`open`](Self::open) is
/// pulled. Every call to `open` starts again from the first shard.
pub struct ShardSequenceSource<T: ?Sized> {
    transport: Arc<T>,
    prefix: RequestTemplate,
    options: ShardSequenceOptions,
}

impl<T: Transport + ?Sized + 'static> ShardSequenceSource<T> {
    /// Create a shard sequence under `prefix`
    ///
    /// The prefix's transport options are used for every shard request.
    pub fn new(
        transport: Arc<T>,
        prefix: impl Into<RequestTemplate>,
        options: ShardSequenceOptions,
    ) -> Result<Self> {
        options.chunk.validate()?;
        Ok(Self {
            transport,
            prefix: prefix.into(),
            options,
        })
    }

    /// Get the sequence options
    pub fn options(&self) -> &ShardSequenceOptions {
        &self.options
    }

    /// Get the request template shards are derived from
    pub fn prefix(&self) -> &RequestTemplate {
        &self.prefix
    }

    /// Describe the shard at `index`
    pub fn descriptor(&self, index: u64) -> ShardDescriptor {
        ShardDescriptor {
            base: self.prefix.url.clone(),
            index,
            suffix: self.options.suffix.clone(),
            digits: self.options.digits,
        }
    }

    /// The request for the shard at `index`
    pub fn request(&self, index: u64) -> CoreResult<RequestTemplate> {
        let locator = self.descriptor(index).try_locator(self.options.overflow)?;
        Ok(self.prefix.with_url(locator))
    }

    /// Fetch the shard at `index`
    ///
    /// Only an overflowing index under [`IndexOverflow::Fail`] or invalid
    /// chunk options are an error; a shard that cannot be fetched comes back
    /// as [`ShardStep::EndOfShards`].
    pub async fn fetch_shard(&self, index: u64) -> CoreResult<ShardStep> {
        let request = self.request(index)?;
        debug!(index, url = %request.url, "fetching shard");

        match fetch_chunks(self.transport.as_ref(), &request, self.options.chunk).await? {
            Ok(chunks) => Ok(ShardStep::Shard(chunks)),
            Err(reason) => Ok(ShardStep::EndOfShards(reason)),
        }
    }

    /// A stream of per-shard chunk streams, in index order
    pub fn shards(&self) -> Shards<T> {
        Shards {
            source: Self {
                transport: Arc::clone(&self.transport),
                prefix: self.prefix.clone(),
                options: self.options.clone(),
            },
            indices: Incrementing::new(self.options.start_from),
            end_reason: None,
            state: StreamState::Active,
        }
    }

    /// A stream of every chunk of every shard, in (shard, offset) order
    pub fn open(&self) -> ShardChunks<T> {
        Concatenated::new(self.shards())
    }
}

/// A stream yielding one chunk stream per shard
///
/// Ends at the first shard that cannot be fetched. The next shard is only
/// requested when this stream is pulled again.
pub struct Shards<T: ?Sized> {
    source: ShardSequenceSource<T>,
    indices: Incrementing,
    end_reason: Option<Unavailable>,
    state: StreamState,
}

impl<T: Transport + ?Sized + 'static> Shards<T> {
    /// Why the sequence ended, once it has
    pub fn end_reason(&self) -> Option<&Unavailable> {
        self.end_reason.as_ref()
    }

    async fn pull(&mut self) -> CoreResult<Option<ChunkStream<Bytes>>> {
        let Some(index) = self.indices.next().await? else {
            return Ok(None);
        };

        match self.source.fetch_shard(index).await? {
            ShardStep::Shard(chunks) => Ok(Some(chunks)),
            ShardStep::EndOfShards(reason) => {
                if reason.is_not_found() {
                    info!(index, url = reason.url(), "no more shards");
                } else {
                    warn!(index, reason = %reason, "ending shard sequence on failed fetch");
                }
                self.end_reason = Some(reason);
                Ok(None)
            }
        }
    }
}

#[async_trait]
impl<T: Transport + ?Sized + 'static> DataStream for Shards<T> {
    type Item = ChunkStream<Bytes>;

    async fn next(&mut self) -> CoreResult<Option<ChunkStream<Bytes>>> {
        if !self.state.ensure_active()? {
            return Ok(None);
        }
        let pulled = self.pull().await;
        self.state.settle(pulled)
    }
}
