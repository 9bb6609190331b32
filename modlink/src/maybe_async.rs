pub(crate) type BoxFuture<T> =
    core::pin::Pin<Box<dyn core::future::Future<Output = T> + Send + 'static>>;

enum Value<T> {
    Ready(T),
    Async(BoxFuture<T>),
}

/// Represents a result that may be computed synchronously or asynchronously by user code.
///
/// Listeners that only touch local state return [`MaybeAsync::ready`] and avoid
/// boxing a future. Listeners that need to await (e.g. sending into a bounded
/// channel) return [`MaybeAsync::asynchronous`].
#[must_use]
pub struct MaybeAsync<T> {
    inner: Value<T>,
}

impl<T> MaybeAsync<T> {
    /// Retrieve the value, which might be available immediately or require awaiting
    pub async fn get(self) -> T {
        match self.inner {
            Value::Ready(x) => x,
            Value::Async(x) => x.await,
        }
    }

    /// The value if it is already available, otherwise the future that produces it
    pub(crate) fn into_ready(self) -> Result<T, BoxFuture<T>> {
        match self.inner {
            Value::Ready(x) => Ok(x),
            Value::Async(x) => Err(x),
        }
    }

    /// Construct a new `MaybeAsync` from an already available result
    pub fn ready(result: T) -> Self {
        MaybeAsync {
            inner: Value::Ready(result),
        }
    }

    /// Construct a new `MaybeAsync` from a future which yields the value eventually
    pub fn asynchronous<F>(result: F) -> Self
    where
        F: core::future::Future<Output = T> + Send + 'static,
    {
        MaybeAsync {
            inner: Value::Async(Box::pin(result)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn both_variants_yield_their_value() {
        assert_eq!(MaybeAsync::ready(4).get().await, 4);
        assert_eq!(MaybeAsync::asynchronous(async { 2 + 2 }).get().await, 4);
    }

    #[tokio::test]
    async fn into_ready_hands_back_pending_futures() {
        assert_eq!(MaybeAsync::ready(4).into_ready().ok(), Some(4));
        match MaybeAsync::asynchronous(async { 2 + 2 }).into_ready() {
            Ok(_) => panic!("expected a pending future"),
            Err(future) => assert_eq!(future.await, 4),
        }
    }
}
