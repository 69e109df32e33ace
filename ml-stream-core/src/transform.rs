//! Stream adapters
//!
//! Each adapter owns its upstream stream and only pulls from it when its own
//! `next` is called. None of them buffer more than the element currently
//! being produced, except [`Grouped`] which holds at most one group.

use std::future::Future;
use std::marker::PhantomData;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::stream::{DataStream, StreamState};

/// Stream returned by [`DataStreamExt::map`](crate::stream::DataStreamExt::map)
pub struct Map<S, F> {
    inner: S,
    f: F,
    state: StreamState,
}

impl<S, F> Map<S, F> {
    pub(crate) fn new(inner: S, f: F) -> Self {
        Self {
            inner,
            f,
            state: StreamState::Active,
        }
    }
}

#[async_trait]
impl<S, F, U> DataStream for Map<S, F>
where
    S: DataStream,
    F: FnMut(S::Item) -> U + Send,
    U: Send + 'static,
{
    type Item = U;

    async fn next(&mut self) -> Result<Option<U>> {
        if !self.state.ensure_active()? {
            return Ok(None);
        }
        let pulled = self.inner.next().await.map(|item| item.map(&mut self.f));
        self.state.settle(pulled)
    }
}

/// Stream returned by [`DataStreamExt::then`](crate::stream::DataStreamExt::then)
pub struct Then<S, F, Fut> {
    inner: S,
    f: F,
    state: StreamState,
    _future: PhantomData<fn() -> Fut>,
}

impl<S, F, Fut> Then<S, F, Fut> {
    pub(crate) fn new(inner: S, f: F) -> Self {
        Self {
            inner,
            f,
            state: StreamState::Active,
            _future: PhantomData,
        }
    }
}

#[async_trait]
impl<S, F, Fut, U> DataStream for Then<S, F, Fut>
where
    S: DataStream,
    F: FnMut(S::Item) -> Fut + Send,
    Fut: Future<Output = U> + Send,
    U: Send + 'static,
{
    type Item = U;

    async fn next(&mut self) -> Result<Option<U>> {
        if !self.state.ensure_active()? {
            return Ok(None);
        }
        let pulled = match self.inner.next().await {
            Ok(Some(item)) => Ok(Some((self.f)(item).await)),
            other => other.map(|_| None),
        };
        self.state.settle(pulled)
    }
}

/// Stream returned by [`DataStreamExt::filter`](crate::stream::DataStreamExt::filter)
pub struct Filter<S, F> {
    inner: S,
    predicate: F,
    state: StreamState,
}

impl<S, F> Filter<S, F> {
    pub(crate) fn new(inner: S, predicate: F) -> Self {
        Self {
            inner,
            predicate,
            state: StreamState::Active,
        }
    }

    async fn pull(&mut self) -> Result<Option<S::Item>>
    where
        S: DataStream,
        F: FnMut(&S::Item) -> bool + Send,
    {
        while let Some(item) = self.inner.next().await? {
            if (self.predicate)(&item) {
                return Ok(Some(item));
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl<S, F> DataStream for Filter<S, F>
where
    S: DataStream,
    F: FnMut(&S::Item) -> bool + Send,
{
    type Item = S::Item;

    async fn next(&mut self) -> Result<Option<S::Item>> {
        if !self.state.ensure_active()? {
            return Ok(None);
        }
        let pulled = self.pull().await;
        self.state.settle(pulled)
    }
}

/// Stream returned by [`DataStreamExt::take`](crate::stream::DataStreamExt::take)
pub struct Take<S> {
    inner: S,
    remaining: usize,
    state: StreamState,
}

impl<S> Take<S> {
    pub(crate) fn new(inner: S, count: usize) -> Self {
        Self {
            inner,
            remaining: count,
            state: StreamState::Active,
        }
    }
}

#[async_trait]
impl<S: DataStream> DataStream for Take<S> {
    type Item = S::Item;

    async fn next(&mut self) -> Result<Option<S::Item>> {
        if !self.state.ensure_active()? {
            return Ok(None);
        }
        // Never pull past the limit.
        let pulled = if self.remaining == 0 {
            Ok(None)
        } else {
            self.remaining -= 1;
            self.inner.next().await
        };
        self.state.settle(pulled)
    }
}

/// Stream returned by [`DataStreamExt::skip`](crate::stream::DataStreamExt::skip)
pub struct Skip<S> {
    inner: S,
    to_skip: usize,
    state: StreamState,
}

impl<S> Skip<S> {
    pub(crate) fn new(inner: S, count: usize) -> Self {
        Self {
            inner,
            to_skip: count,
            state: StreamState::Active,
        }
    }

    async fn pull(&mut self) -> Result<Option<S::Item>>
    where
        S: DataStream,
    {
        while self.to_skip > 0 {
            if self.inner.next().await?.is_none() {
                return Ok(None);
            }
            self.to_skip -= 1;
        }
        self.inner.next().await
    }
}

#[async_trait]
impl<S: DataStream> DataStream for Skip<S> {
    type Item = S::Item;

    async fn next(&mut self) -> Result<Option<S::Item>> {
        if !self.state.ensure_active()? {
            return Ok(None);
        }
        let pulled = self.pull().await;
        self.state.settle(pulled)
    }
}

/// Stream of element groups returned by
/// [`DataStreamExt::group`](crate::stream::DataStreamExt::group)
///
/// Every group holds `size` elements except possibly the last, which holds
/// between 1 and `size`. An empty upstream produces no groups.
pub struct Grouped<S> {
    inner: S,
    size: usize,
    state: StreamState,
}

impl<S> Grouped<S> {
    pub(crate) fn new(inner: S, size: usize) -> Result<Self> {
        if size == 0 {
            return Err(Error::InvalidArgument("Group size must be greater than 0".into()));
        }
        Ok(Self {
            inner,
            size,
            state: StreamState::Active,
        })
    }

    /// Get the configured group size
    pub fn size(&self) -> usize {
        self.size
    }

    async fn pull(&mut self) -> Result<Option<Vec<S::Item>>>
    where
        S: DataStream,
    {
        let mut group = Vec::with_capacity(self.size);
        while group.len() < self.size {
            match self.inner.next().await? {
                Some(item) => group.push(item),
                None => break,
            }
        }
        if group.is_empty() {
            Ok(None)
        } else {
            Ok(Some(group))
        }
    }
}

#[async_trait]
impl<S: DataStream> DataStream for Grouped<S> {
    type Item = Vec<S::Item>;

    async fn next(&mut self) -> Result<Option<Vec<S::Item>>> {
        if !self.state.ensure_active()? {
            return Ok(None);
        }
        let pulled = self.pull().await;
        self.state.settle(pulled)
    }
}

/// A stream that exhausts each stream produced by an outer stream in turn
///
/// The outer stream is only pulled once the current inner stream has
/// returned its end marker, so inner streams are created (and any I/O they
/// imply is started) strictly one at a time, in order.
pub struct Concatenated<O: DataStream> {
    outer: O,
    current: Option<O::Item>,
    state: StreamState,
}

impl<O> Concatenated<O>
where
    O: DataStream,
    O::Item: DataStream,
{
    /// Concatenate the streams produced by `outer`
    pub fn new(outer: O) -> Self {
        Self {
            outer,
            current: None,
            state: StreamState::Active,
        }
    }

    async fn pull(&mut self) -> Result<Option<<O::Item as DataStream>::Item>> {
        loop {
            if let Some(current) = self.current.as_mut() {
                if let Some(item) = current.next().await? {
                    return Ok(Some(item));
                }
                self.current = None;
            }
            match self.outer.next().await? {
                Some(next) => self.current = Some(next),
                None => return Ok(None),
            }
        }
    }
}

#[async_trait]
impl<O> DataStream for Concatenated<O>
where
    O: DataStream,
    O::Item: DataStream,
{
    type Item = <O::Item as DataStream>::Item;

    async fn next(&mut self) -> Result<Option<Self::Item>> {
        if !self.state.ensure_active()? {
            return Ok(None);
        }
        let pulled = self.pull().await;
        self.state.settle(pulled)
    }
}
