use std::{future::Future, pin::Pin, sync::Arc};

use log::*;

use crate::events::{AuditRecordEvent, EventHandler, EventProducer, Handler};

pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 256;
pub const DEFAULT_MAX_JOBS: u32 = 8;

#[derive(Default, Clone)]
pub struct EventProducers {
    pub audit_record_producer: Vec<EventProducer<AuditRecordEvent>>,
}

impl EventProducers {
    /// Hands the record to every audit subscriber without waiting. Returns the number of subscribers that accepted it.
    pub fn publish_audit_record(&self, record: AuditRecordEvent) -> usize {
        if self.audit_record_producer.is_empty() {
            trace!("📬️ No audit record subscribers. Record {} is not forwarded.", record.record_id);
            return 0;
        }
        self.audit_record_producer.iter().filter(|emitter| emitter.try_publish_event(record.clone())).count()
    }
}

pub struct EventHandlers {
    pub on_audit_record: Option<EventHandler<AuditRecordEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, max_jobs: u32, hooks: EventHooks) -> Self {
        let on_audit_record = hooks.on_audit_record.map(|f| EventHandler::new(buffer_size, max_jobs, f));
        Self { on_audit_record }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_audit_record {
            result.audit_record_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_audit_record {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_audit_record: Option<Handler<AuditRecordEvent>>,
}

impl EventHooks {
    pub fn on_audit_record<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(AuditRecordEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_audit_record = Some(Arc::new(f));
        self
    }
}
