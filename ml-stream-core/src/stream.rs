//! The lazy, pull-based stream abstraction
//!
//! A [`DataStream`] produces one element per call to [`DataStream::next`].
//! Nothing is read, fetched or computed until a consumer pulls. Every adapter
//! in this crate owns its upstream stream and delegates pulls to it, so a
//! pipeline such as `chunks.map(decode).batch(32)` performs exactly one
//! upstream pull chain per element the consumer asks for.
//!
//! Pulls take `&mut self`, so at most one `next` can be in flight for a
//! stream at any time.

use std::future::Future;

use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt};

use crate::error::{Error, Result};
use crate::record::Record;
use crate::record_batch::RecordBatches;
use crate::source::Items;
use crate::transform::{Concatenated, Filter, Grouped, Map, Skip, Take, Then};

/// A lazy sequence of elements produced one pull at a time
///
/// `Ok(None)` is the end marker. Once a stream has returned it, every later
/// pull returns it again. Once a pull has failed the stream is unusable and
/// later pulls return [`Error::StreamFailed`] without touching the source.
#[async_trait]
pub trait DataStream: Send {
    /// The type of elements produced by this stream
    type Item: Send + 'static;

    /// Pull the next element, suspending until it is available
    async fn next(&mut self) -> Result<Option<Self::Item>>;

    /// Pull until exhaustion and return every remaining element in order
    ///
    /// Intended for bounded streams only.
    async fn collect_remaining(&mut self) -> Result<Vec<Self::Item>> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await? {
            items.push(item);
        }
        Ok(items)
    }

    /// Pull until exhaustion, handing each element to `f`
    async fn for_each<F>(&mut self, mut f: F) -> Result<()>
    where
        Self: Sized,
        F: FnMut(Self::Item) + Send,
    {
        while let Some(item) = self.next().await? {
            f(item);
        }
        Ok(())
    }
}

/// A type-erased stream
pub type BoxDataStream<T> = Box<dyn DataStream<Item = T>>;

#[async_trait]
impl<S: DataStream + ?Sized> DataStream for Box<S> {
    type Item = S::Item;

    async fn next(&mut self) -> Result<Option<Self::Item>> {
        (**self).next().await
    }
}

/// Exhaustion state of a stream
///
/// Streams keep one of these next to their cursor and route every pull
/// through it, which is what makes end-of-stream sticky.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StreamState {
    /// The stream may still produce elements
    #[default]
    Active,
    /// The stream has returned the end marker
    Exhausted,
    /// A pull failed
    Failed,
}

impl StreamState {
    /// Whether the next pull should reach the source
    ///
    /// Returns `Ok(false)` once exhausted and `Err` once failed.
    pub fn ensure_active(self) -> Result<bool> {
        match self {
            Self::Active => Ok(true),
            Self::Exhausted => Ok(false),
            Self::Failed => Err(Error::StreamFailed),
        }
    }

    /// Record the outcome of a pull and pass it through
    pub fn settle<T>(&mut self, pulled: Result<Option<T>>) -> Result<Option<T>> {
        match &pulled {
            Ok(Some(_)) => {}
            Ok(None) => *self = Self::Exhausted,
            Err(_) => *self = Self::Failed,
        }
        pulled
    }

    /// Check if the stream has returned the end marker
    pub fn is_exhausted(self) -> bool {
        self == Self::Exhausted
    }
}

/// Lazy adapters available on every [`DataStream`]
pub trait DataStreamExt: DataStream + Sized {
    /// Apply `f` to each element as it is pulled
    fn map<U, F>(self, f: F) -> Map<Self, F>
    where
        U: Send + 'static,
        F: FnMut(Self::Item) -> U + Send,
    {
        Map::new(self, f)
    }

    /// Apply an asynchronous `f` to each element as it is pulled
    ///
    /// The future for one element completes before the next element is
    /// pulled from upstream.
    fn then<U, F, Fut>(self, f: F) -> Then<Self, F, Fut>
    where
        U: Send + 'static,
        F: FnMut(Self::Item) -> Fut + Send,
        Fut: Future<Output = U> + Send,
    {
        Then::new(self, f)
    }

    /// Keep only the elements for which `predicate` returns true
    fn filter<F>(self, predicate: F) -> Filter<Self, F>
    where
        F: FnMut(&Self::Item) -> bool + Send,
    {
        Filter::new(self, predicate)
    }

    /// Yield at most `count` elements
    fn take(self, count: usize) -> Take<Self> {
        Take::new(self, count)
    }

    /// Discard the first `count` elements
    fn skip(self, count: usize) -> Skip<Self> {
        Skip::new(self, count)
    }

    /// Regroup elements into vectors of `size`, the last possibly shorter
    fn group(self, size: usize) -> Result<Grouped<Self>> {
        Grouped::new(self, size)
    }

    /// Regroup records into columnar batches of `size` rows
    fn batch(self, size: usize) -> Result<RecordBatches<Self>>
    where
        Self: DataStream<Item = Record>,
    {
        RecordBatches::new(self, size)
    }

    /// Yield every element of `self`, then every element of `other`
    fn concatenate<S>(
        self,
        other: S,
    ) -> Concatenated<Items<std::vec::IntoIter<BoxDataStream<Self::Item>>>>
    where
        Self: 'static,
        S: DataStream<Item = Self::Item> + 'static,
    {
        let streams: Vec<BoxDataStream<Self::Item>> = vec![Box::new(self), Box::new(other)];
        Concatenated::new(Items::new(streams))
    }

    /// Exhaust each inner stream in turn
    fn flatten(self) -> Concatenated<Self>
    where
        Self::Item: DataStream,
    {
        Concatenated::new(self)
    }

    /// Erase the concrete stream type
    fn boxed(self) -> BoxDataStream<Self::Item>
    where
        Self: 'static,
    {
        Box::new(self)
    }

    /// Convert into a `futures` stream of results
    ///
    /// The converted stream ends after the first error.
    fn into_futures_stream(self) -> BoxStream<'static, Result<Self::Item>>
    where
        Self: 'static,
    {
        futures::stream::unfold(Some(self), |state| async move {
            let mut stream = state?;
            match stream.next().await {
                Ok(Some(item)) => Some((Ok(item), Some(stream))),
                Ok(None) => None,
                Err(e) => Some((Err(e), None)),
            }
        })
        .boxed()
    }
}

impl<S: DataStream> DataStreamExt for S {}
