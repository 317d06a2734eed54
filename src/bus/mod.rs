//! Topic-keyed, handler-invoking event bus.
//!
//! This replaces the teacher's `tokio::sync::broadcast` fan-out-to-all-
//! subscribers model with a topic-addressed pub/sub where each topic owns
//! an ordered list of async handlers. `publish` awaits every handler for a
//! topic in subscription order; a handler that errors is logged and does
//! not stop its siblings. There is no redelivery, no backpressure, and no
//! persistence — a handler that is not subscribed when a message is
//! published simply never sees it, matching the original implementation's
//! `bus/broker.py::InMemoryBus`.

pub mod in_memory;
pub mod traits;

pub use in_memory::InMemoryBus;
pub use traits::{EventBus, Handler, topics};
