//! Remote byte sources
//!
//! A remote resource is fetched in full before its first chunk is emitted;
//! the transport is not assumed to support incremental reads. Chunking then
//! works exactly as for any other in-memory container.

use bytes::Bytes;
use ml_stream_core::error::Result as CoreResult;
use ml_stream_core::{ChunkOptions, ChunkStream};
use thiserror::Error;
use tracing::{debug, warn};

use crate::transport::{RequestTemplate, Transport};

/// Why a remote resource could not be fetched
///
/// This is a value returned to the caller, not a stream failure: shard
/// sequences treat it as the end of the data.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Unavailable {
    /// The transport answered with a non-success status
    #[error("{url} responded with status {status}")]
    Status {
        /// Requested locator
        url: String,
        /// Response status
        status: u16,
    },

    /// The request could not complete
    #[error("fetching {url} failed: {reason}")]
    Transport {
        /// Requested locator
        url: String,
        /// Transport error message
        reason: String,
    },
}

impl Unavailable {
    /// Whether the resource simply does not exist (404)
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }

    /// The locator that could not be fetched
    pub fn url(&self) -> &str {
        match self {
            Self::Status { url, .. } | Self::Transport { url, .. } => url,
        }
    }
}

/// Fetch `request` in full and expose its body as a chunk stream
///
/// Invalid chunk options are an error and no request is made. A failure
/// status and a failed request both come back as the inner `Err`
/// [`Unavailable`]; transport failures are logged before being mapped.
pub async fn fetch_chunks<T>(
    transport: &T,
    request: &RequestTemplate,
    chunk_options: ChunkOptions,
) -> CoreResult<std::result::Result<ChunkStream<Bytes>, Unavailable>>
where
    T: Transport + ?Sized,
{
    chunk_options.validate()?;

    let response = match transport.fetch(request).await {
        Ok(response) => response,
        Err(e) => {
            warn!(url = %request.url, error = %e, "fetch failed");
            return Ok(Err(Unavailable::Transport {
                url: request.url.clone(),
                reason: e.to_string(),
            }));
        }
    };

    if !response.is_success() {
        debug!(url = %request.url, status = response.status, "fetch returned failure status");
        return Ok(Err(Unavailable::Status {
            url: request.url.clone(),
            status: response.status,
        }));
    }

    debug!(url = %request.url, bytes = response.body.len(), "fetched resource");
    ChunkStream::new(response.body, chunk_options).map(Ok)
}
