//! Synchronous-or-deferred results.
//!
//! Every resolution step may complete immediately or depend on a future
//! (an async module resolver, an async factory). [`Resolution`] keeps both
//! cases explicit so that a graph built entirely from synchronous pieces is
//! handed back without ever touching an executor.

use std::future::{Future, IntoFuture};

use futures::future::{try_join_all, BoxFuture, FutureExt};

use crate::error::{DiError, DiResult};

/// The outcome of a resolution step: available now, or later.
///
/// # Examples
///
/// ```rust
/// use rewire::Resolution;
/// use std::future::IntoFuture;
///
/// let now = Resolution::ok(20).map(|n| n + 1);
/// assert!(!now.is_deferred());
/// assert_eq!(now.into_ready("answer").unwrap(), 21);
///
/// let later = Resolution::deferred(async { Ok(21) }).map(|n| n * 2);
/// assert!(later.is_deferred());
/// assert_eq!(futures::executor::block_on(later.into_future()).unwrap(), 42);
/// ```
#[must_use = "a resolution does nothing until it is inspected or awaited"]
pub enum Resolution<T> {
    /// Completed synchronously
    Ready(DiResult<T>),
    /// Completes when the future does
    Deferred(BoxFuture<'static, DiResult<T>>),
}

impl<T: Send + 'static> Resolution<T> {
    /// A successful, synchronous result.
    pub fn ok(value: T) -> Self {
        Resolution::Ready(Ok(value))
    }

    /// A failed, synchronous result.
    pub fn err(error: DiError) -> Self {
        Resolution::Ready(Err(error))
    }

    /// Wraps a future producing the result.
    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = DiResult<T>> + Send + 'static,
    {
        Resolution::Deferred(future.boxed())
    }

    /// Returns `true` when the value is only available through a future.
    pub fn is_deferred(&self) -> bool {
        matches!(self, Resolution::Deferred(_))
    }

    /// Transforms the successful value, keeping the synchronous/deferred mode.
    pub fn map<U, F>(self, f: F) -> Resolution<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        match self {
            Resolution::Ready(result) => Resolution::Ready(result.map(f)),
            Resolution::Deferred(future) => {
                Resolution::Deferred(async move { future.await.map(f) }.boxed())
            }
        }
    }

    /// Chains another step. Stays synchronous as long as both steps are.
    pub fn and_then<U, F>(self, f: F) -> Resolution<U>
    where
        U: Send + 'static,
        F: FnOnce(T) -> Resolution<U> + Send + 'static,
    {
        match self {
            Resolution::Ready(Ok(value)) => f(value),
            Resolution::Ready(Err(error)) => Resolution::Ready(Err(error)),
            Resolution::Deferred(future) => Resolution::Deferred(
                async move {
                    let value = future.await?;
                    f(value).await
                }
                .boxed(),
            ),
        }
    }

    /// Runs `f` on failure without changing the outcome.
    pub fn inspect_err<F>(self, f: F) -> Self
    where
        F: FnOnce(&DiError) + Send + 'static,
    {
        match self {
            Resolution::Ready(result) => {
                if let Err(error) = &result {
                    f(error);
                }
                Resolution::Ready(result)
            }
            Resolution::Deferred(future) => Resolution::Deferred(
                async move {
                    let result = future.await;
                    if let Err(error) = &result {
                        f(error);
                    }
                    result
                }
                .boxed(),
            ),
        }
    }

    /// Joins independent resolutions, preserving order.
    ///
    /// The joined result is synchronous when every input is. An input that
    /// already failed synchronously fails the whole join immediately;
    /// otherwise the deferred inputs are driven concurrently and the first
    /// failure wins.
    pub fn all(items: Vec<Resolution<T>>) -> Resolution<Vec<T>> {
        if items.iter().all(|item| !item.is_deferred()) {
            let collected = items
                .into_iter()
                .map(|item| match item {
                    Resolution::Ready(result) => result,
                    Resolution::Deferred(_) => unreachable!("checked above"),
                })
                .collect::<DiResult<Vec<T>>>();
            return Resolution::Ready(collected);
        }

        let mut futures: Vec<BoxFuture<'static, DiResult<T>>> = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Resolution::Ready(Err(error)) => return Resolution::Ready(Err(error)),
                Resolution::Ready(Ok(value)) => futures.push(async move { Ok(value) }.boxed()),
                Resolution::Deferred(future) => futures.push(future),
            }
        }
        Resolution::Deferred(try_join_all(futures).boxed())
    }

    /// Takes the value if it is available right now.
    ///
    /// Fails with [`DiError::Pending`] (naming `what`) when the resolution is
    /// deferred.
    pub fn into_ready(self, what: &str) -> DiResult<T> {
        match self {
            Resolution::Ready(result) => result,
            Resolution::Deferred(_) => Err(DiError::Pending(what.to_string())),
        }
    }

    /// Returns the synchronous result, or hands the resolution back.
    pub fn try_ready(self) -> Result<DiResult<T>, Self> {
        match self {
            Resolution::Ready(result) => Ok(result),
            deferred => Err(deferred),
        }
    }
}

impl<T: Send + 'static> IntoFuture for Resolution<T> {
    type Output = DiResult<T>;
    type IntoFuture = BoxFuture<'static, DiResult<T>>;

    fn into_future(self) -> Self::IntoFuture {
        match self {
            Resolution::Ready(result) => futures::future::ready(result).boxed(),
            Resolution::Deferred(future) => future,
        }
    }
}

impl<T> From<DiResult<T>> for Resolution<T> {
    fn from(result: DiResult<T>) -> Self {
        Resolution::Ready(result)
    }
}

impl<T> std::fmt::Debug for Resolution<T>
where
    T: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Resolution::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            Resolution::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}
