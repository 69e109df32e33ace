//! In-process stream sources

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;

use crate::error::Result;
use crate::stream::{DataStream, StreamState};
use crate::transform::Concatenated;

/// A stream over the items of an iterator
pub struct Items<I> {
    iter: I,
    state: StreamState,
}

impl<I> Items<I> {
    /// Create a stream that yields the iterator's items in order
    pub fn new<T: IntoIterator<IntoIter = I>>(items: T) -> Self {
        Self {
            iter: items.into_iter(),
            state: StreamState::Active,
        }
    }
}

#[async_trait]
impl<I> DataStream for Items<I>
where
    I: Iterator + Send,
    I::Item: Send + 'static,
{
    type Item = I::Item;

    async fn next(&mut self) -> Result<Option<I::Item>> {
        if !self.state.ensure_active()? {
            return Ok(None);
        }
        let pulled = Ok(self.iter.next());
        self.state.settle(pulled)
    }
}

/// An unbounded stream of consecutive integers
///
/// Ends only if the counter would overflow `u64`.
#[derive(Debug, Clone)]
pub struct Incrementing {
    next: Option<u64>,
}

impl Incrementing {
    /// Count upwards from `start`
    pub fn new(start: u64) -> Self {
        Self { next: Some(start) }
    }
}

#[async_trait]
impl DataStream for Incrementing {
    type Item = u64;

    async fn next(&mut self) -> Result<Option<u64>> {
        let current = self.next;
        self.next = current.and_then(|value| value.checked_add(1));
        Ok(current)
    }
}

/// A stream whose elements are produced by repeatedly calling a function
pub struct FromFn<F, Fut> {
    f: F,
    state: StreamState,
    _future: PhantomData<fn() -> Fut>,
}

#[async_trait]
impl<F, Fut, T> DataStream for FromFn<F, Fut>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<Option<T>>> + Send,
    T: Send + 'static,
{
    type Item = T;

    async fn next(&mut self) -> Result<Option<T>> {
        if !self.state.ensure_active()? {
            return Ok(None);
        }
        let pulled = (self.f)().await;
        self.state.settle(pulled)
    }
}

/// Create a stream over the given items
pub fn stream_from_items<T: IntoIterator>(items: T) -> Items<T::IntoIter> {
    Items::new(items)
}

/// Create an unbounded stream counting up from `start`
pub fn stream_from_incrementing(start: u64) -> Incrementing {
    Incrementing::new(start)
}

/// Create a stream that calls `f` once per pull
///
/// `f` returns `Ok(None)` to end the stream.
pub fn stream_from_function<F, Fut, T>(f: F) -> FromFn<F, Fut>
where
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = Result<Option<T>>> + Send,
    T: Send + 'static,
{
    FromFn {
        f,
        state: StreamState::Active,
        _future: PhantomData,
    }
}

/// Create a stream that exhausts each stream produced by `streams` in turn
pub fn stream_from_concatenated<O>(streams: O) -> Concatenated<O>
where
    O: DataStream,
    O::Item: DataStream,
{
    Concatenated::new(streams)
}
