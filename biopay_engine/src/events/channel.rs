//! Simple stateless pub-sub event handler
//!
//! This module provides a simple hook system that allow components of the system to subscribe to payment engine
//! events and react to them. The event handler is stateless, i.e. the handlers have no access to the internal state
//! of the system. All that is received is the event itself.
//!
//! Handlers are async. Each event is handled on its own task, and at most `max_jobs` of those tasks run at once. While
//! all job slots are taken, events queue up in the channel; once the channel is full, [`EventProducer::try_publish_event`]
//! drops new events rather than making the publisher wait.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::sync::{mpsc, mpsc::error::TrySendError, Semaphore};

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    listener: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
    max_jobs: u32,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, max_jobs: u32, handler: Handler<E>) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size.max(1));
        Self { listener: receiver, sender, handler, max_jobs: max_jobs.max(1) }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    /// Runs until every producer has been dropped and all in-flight jobs have finished.
    pub async fn start_handler(mut self) {
        debug!("📬️ Starting event handler with {} job slots", self.max_jobs);
        // drop the internal sender so that when the last subscriber is dropped, we can automatically shut down the
        // handler
        drop(self.sender);
        let slots = Arc::new(Semaphore::new(self.max_jobs as usize));
        while let Some(ev) = self.listener.recv().await {
            let permit = match Arc::clone(&slots).acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => {
                    error!("📬️ Event handler job slots are closed. {e}. No more events will be handled.");
                    break;
                },
            };
            trace!("📬️ Handling event");
            let handler = Arc::clone(&self.handler);
            tokio::spawn(async move {
                (handler)(ev).await;
                drop(permit);
                trace!("📬️ Event handled");
            });
        }
        debug!("📬️ Waiting for jobs to complete");
        match slots.acquire_many(self.max_jobs).await {
            Ok(_) => debug!("📬️ Event handler shutting down gracefully"),
            Err(e) => warn!("📬️ Event handler could not wait for outstanding jobs. {e}"),
        }
        debug!("📬️ Event handler has shut down");
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    /// Publishes the event, waiting for space in the queue if necessary.
    pub async fn publish_event(&self, event: E) {
        if let Err(e) = self.sender.send(event).await {
            error!("📬️ Failed to send event: {e}");
        }
    }

    /// Publishes the event without waiting. Returns false, and drops the event, if the queue is full or the handler
    /// has shut down.
    pub fn try_publish_event(&self, event: E) -> bool {
        match self.sender.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                error!("📬️ Event queue is full. The event has been dropped.");
                false
            },
            Err(TrySendError::Closed(_)) => {
                error!("📬️ Event handler has shut down. The event has been dropped.");
                false
            },
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    use super::*;

    #[tokio::test]
    async fn test_event_handler() {
        let _ = env_logger::try_init();
        let count = Arc::new(AtomicU64::new(0));
        let c2 = count.clone();
        let handler = Arc::new(move |v| {
            let count = count.clone();
            Box::pin(async move {
                debug!("Handler received {v}");
                let _ = count.fetch_add(v, Ordering::SeqCst);
                tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        let event_handler = EventHandler::new(1, 4, handler);
        let producer_1 = event_handler.subscribe();
        let producer_2 = event_handler.subscribe();
        tokio::spawn(async move {
            for i in 0..5 {
                let v = i * 2 + 1;
                producer_1.publish_event(v).await;
            }
        });
        tokio::spawn(async move {
            for i in 0..5 {
                let v = i * 2;
                producer_2.publish_event(v).await;
            }
        });

        event_handler.start_handler().await;
        assert_eq!(c2.load(Ordering::SeqCst), 45);
    }

    #[tokio::test]
    async fn jobs_are_bounded() {
        let _ = env_logger::try_init();
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let handled = Arc::new(AtomicUsize::new(0));
        let (r, p, h) = (running.clone(), peak.clone(), handled.clone());
        let handler = Arc::new(move |_: u32| {
            let (running, peak, handled) = (r.clone(), p.clone(), h.clone());
            Box::pin(async move {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(tokio::time::Duration::from_millis(30)).await;
                running.fetch_sub(1, Ordering::SeqCst);
                handled.fetch_add(1, Ordering::SeqCst);
            }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        let event_handler = EventHandler::new(16, 2, handler);
        let producer = event_handler.subscribe();
        for i in 0..8 {
            assert!(producer.try_publish_event(i));
        }
        drop(producer);
        event_handler.start_handler().await;
        assert_eq!(handled.load(Ordering::SeqCst), 8);
        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn try_publish_drops_when_full() {
        let handler: Handler<u32> =
            Arc::new(|_: u32| Box::pin(async {}) as Pin<Box<dyn Future<Output = ()> + Send>>);
        let event_handler = EventHandler::new(1, 1, handler);
        let producer = event_handler.subscribe();
        assert!(producer.try_publish_event(1));
        assert!(!producer.try_publish_event(2));
        drop(event_handler);
        assert!(!producer.try_publish_event(3));
    }
}
