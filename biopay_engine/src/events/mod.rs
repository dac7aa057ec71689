mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers, DEFAULT_EVENT_BUFFER_SIZE, DEFAULT_MAX_JOBS};
