use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;

/// Well-known topic names used by the core runtime. Payload shapes for
/// these topics live in [`crate::agent::events`], not here — the bus
/// itself is payload-agnostic (see [`Handler`]).
pub mod topics {
    pub const INPUT_TEXT: &str = "input.text";
    pub const INPUT_TEXT_PARTIAL: &str = "input.text.partial";
    pub const OUTPUT_TEXT: &str = "output.text";
}

/// A subscribed handler: an async function of one JSON message to `()`.
///
/// Handlers receive the message as `serde_json::Value` rather than a
/// concrete type so that the bus itself stays agnostic to payload shape —
/// a network-backed implementation (e.g. Redis pub/sub) only has to move
/// bytes, not link against every message type in the crate. Callers
/// typically build a `Handler` with [`typed_handler`], which does the
/// `serde_json::from_value` deserialization once per invocation.
pub type Handler = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<(), String>> + Send + Sync>;

/// Wrap a strongly-typed async closure as an untyped [`Handler`].
///
/// Deserialization failures are treated the same as a handler error: they
/// are logged by the bus and do not abort other subscribers for the topic.
pub fn typed_handler<T, F, Fut>(f: F) -> Handler
where
    T: serde::de::DeserializeOwned + Send + 'static,
    F: Fn(T) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = Result<(), String>> + Send + 'static,
{
    Arc::new(move |value: Value| {
        let parsed = serde_json::from_value::<T>(value);
        let fut = match parsed {
            Ok(typed) => Some(f(typed)),
            Err(_) => None,
        };
        Box::pin(async move {
            match fut {
                Some(fut) => fut.await,
                None => Err("handler received a message that did not match its expected shape".to_string()),
            }
        })
    })
}

/// Topic pub/sub contract. Implementations must be swappable with a
/// network-backed bus (e.g. Redis) without changing any caller.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Register `handler` to be invoked, in registration order relative to
    /// other handlers on the same topic, whenever `publish` is called for
    /// `topic`.
    fn subscribe(&self, topic: &str, handler: Handler);

    /// Publish `message` on `topic`. Every handler subscribed to `topic` is
    /// awaited sequentially, in subscription order. A handler that returns
    /// an error (or whose deserialization failed) is logged and does not
    /// prevent later handlers from running. Publishing to a topic with no
    /// subscribers is a no-op.
    async fn publish(&self, topic: &str, message: Value) -> Result<(), String>;

    /// Convenience: serialize `message` and publish it.
    async fn publish_typed<T: serde::Serialize + Send + Sync>(
        &self,
        topic: &str,
        message: &T,
    ) -> Result<(), String>
    where
        Self: Sized,
    {
        let value = serde_json::to_value(message).map_err(|e| format!("serialize: {e}"))?;
        self.publish(topic, value).await
    }
}
