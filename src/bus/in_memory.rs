use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::RwLock;

use super::traits::{EventBus, Handler};

/// Default in-process implementation of [`EventBus`].
///
/// Grounded in the teacher's `event_bus::TokioBroadcastBus` for the overall
/// shape (a lock-guarded registry, `Send + Sync`, unit tests exercising
/// delivery order) but replaces the broadcast-channel fan-out with the
/// topic-keyed handler list the runtime's contract requires.
#[derive(Default)]
pub struct InMemoryBus {
    handlers: RwLock<HashMap<String, Vec<Handler>>>,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self {
            handlers: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl EventBus for InMemoryBus {
    fn subscribe(&self, topic: &str, handler: Handler) {
        let mut handlers = match self.handlers.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        handlers.entry(topic.to_string()).or_default().push(handler);
    }

    async fn publish(&self, topic: &str, message: Value) -> Result<(), String> {
        // Clone the handler list out from under the lock so that a handler
        // calling `subscribe`/`publish` recursively never deadlocks; the
        // handlers themselves are cheap `Arc` clones.
        let handlers: Vec<Handler> = {
            let guard = match self.handlers.read() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.get(topic).cloned().unwrap_or_default()
        };

        for handler in handlers {
            if let Err(err) = handler(message.clone()).await {
                tracing::warn!(topic, error = %err, "event bus handler failed; continuing with remaining subscribers");
            }
        }
        Ok(())
    }
}
