//! Observable side effects of the request pipeline.
//!
//! The transport publishes [`Event`]s instead of driving UI primitives. A
//! presentation layer either subscribes to the channel directly or hands a
//! [`FeedbackSink`] to [`spawn_feedback_forwarder`].

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// A request is about to be sent; show the loading indicator.
    LoadingStarted { request_id: u64, path: String },
    /// The request resolved or failed; hide the loading indicator.
    LoadingFinished { request_id: u64 },
    /// Transient user-visible notification for a failed request.
    Toast { request_id: u64, message: String },
}

/// Fan-out channel for [`Event`]s. Publishing never blocks and succeeds
/// whether or not anyone is listening.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: Event) {
        if self.tx.send(event).is_err() {
            debug!("no event subscribers");
        }
    }
}

/// UI collaborator receiving loading and toast signals.
pub trait FeedbackSink: Send + Sync + 'static {
    fn show_loading(&self);
    fn hide_loading(&self);
    fn show_toast(&self, message: &str);
}

pub struct ForwarderHandle {
    cancel_tx: broadcast::Sender<()>,
    join: JoinHandle<()>,
}

impl ForwarderHandle {
    pub async fn stop(self) -> Result<(), tokio::task::JoinError> {
        let _ = self.cancel_tx.send(());
        self.join.await
    }
}

/// Drives `sink` from the bus until stopped or the bus is dropped.
pub fn spawn_feedback_forwarder(bus: &EventBus, sink: Arc<dyn FeedbackSink>) -> ForwarderHandle {
    let (cancel_tx, mut cancel_rx) = broadcast::channel(1);
    let mut events = bus.subscribe();
    let join = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel_rx.recv() => {
                    info!("feedback forwarder shutdown requested");
                    break;
                }
                received = events.recv() => match received {
                    Ok(Event::LoadingStarted { .. }) => sink.show_loading(),
                    Ok(Event::LoadingFinished { .. }) => sink.hide_loading(),
                    Ok(Event::Toast { message, .. }) => sink.show_toast(&message),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Skipped events may include the matching hides.
                        warn!(skipped, "feedback forwarder lagged behind, hiding loading");
                        sink.hide_loading();
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    });

    ForwarderHandle { cancel_tx, join }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl FeedbackSink for Recorder {
        fn show_loading(&self) {
            self.0.lock().unwrap().push("show".into());
        }
        fn hide_loading(&self) {
            self.0.lock().unwrap().push("hide".into());
        }
        fn show_toast(&self, message: &str) {
            self.0.lock().unwrap().push(format!("toast:{message}"));
        }
    }

    #[test]
    fn publish_without_subscribers_is_fine() {
        EventBus::new().publish(Event::LoadingFinished { request_id: 1 });
    }

    #[tokio::test]
    async fn forwarder_maps_events_to_sink() {
        let bus = EventBus::new();
        let recorder = Arc::new(Recorder::default());
        let handle = spawn_feedback_forwarder(&bus, recorder.clone());

        bus.publish(Event::LoadingStarted { request_id: 1, path: "/x".into() });
        bus.publish(Event::LoadingFinished { request_id: 1 });
        bus.publish(Event::Toast { request_id: 1, message: "boom".into() });

        for _ in 0..50 {
            if recorder.0.lock().unwrap().len() == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.stop().await.unwrap();

        assert_eq!(*recorder.0.lock().unwrap(), vec!["show", "hide", "toast:boom"]);
    }

    #[tokio::test]
    async fn lagging_forwarder_hides_loading() {
        let bus = EventBus::new();
        let recorder = Arc::new(Recorder::default());
        let handle = spawn_feedback_forwarder(&bus, recorder.clone());

        // The forwarder task cannot run before the first await, so it falls
        // behind by six events.
        let total = CHANNEL_CAPACITY as u64 + 6;
        for request_id in 1..total {
            bus.publish(Event::LoadingStarted { request_id, path: "/x".into() });
        }
        bus.publish(Event::LoadingFinished { request_id: total });

        for _ in 0..50 {
            if recorder.0.lock().unwrap().len() == CHANNEL_CAPACITY + 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.stop().await.unwrap();

        let seen = recorder.0.lock().unwrap();
        assert_eq!(seen.len(), CHANNEL_CAPACITY + 1);
        assert_eq!(seen[0], "hide");
        assert_eq!(seen.last().map(String::as_str), Some("hide"));
    }
}
