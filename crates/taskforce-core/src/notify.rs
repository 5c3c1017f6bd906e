use crate::event::TeamEvent;
use crate::TaskforceResult;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock};
use tracing::warn;

/// A progress subscriber.
///
/// Handlers run synchronously at the publish site and must not block;
/// anything slow belongs behind a channel owned by the subscriber.
pub trait ProgressSink: Send + Sync {
    /// Receive one lifecycle event.
    fn on_event(&self, event: &TeamEvent) -> TaskforceResult<()>;
}

struct FnSink<F>(F);

impl<F> ProgressSink for FnSink<F>
where
    F: Fn(&TeamEvent) + Send + Sync,
{
    fn on_event(&self, event: &TeamEvent) -> TaskforceResult<()> {
        (self.0)(event);
        Ok(())
    }
}

/// Fan-out event bus delivering lifecycle events to zero or more
/// subscribers.
///
/// Delivery is best-effort and order-preserving per subscriber. A
/// subscriber that returns an error or panics is caught and logged here;
/// it never aborts orchestration or alters the team result.
#[derive(Clone, Default)]
pub struct ProgressNotifier {
    sinks: Arc<RwLock<Vec<Arc<dyn ProgressSink>>>>,
}

impl ProgressNotifier {
    /// Create an empty notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber.
    pub fn subscribe(&self, sink: Arc<dyn ProgressSink>) {
        let mut sinks = match self.sinks.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        sinks.push(sink);
    }

    /// Register a closure as a subscriber.
    pub fn subscribe_fn<F>(&self, handler: F)
    where
        F: Fn(&TeamEvent) + Send + Sync + 'static,
    {
        self.subscribe(Arc::new(FnSink(handler)));
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        match self.sinks.read() {
            Ok(guard) => guard.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Deliver an event to every subscriber in registration order.
    pub fn publish(&self, event: &TeamEvent) {
        let sinks = match self.sinks.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        for sink in &sinks {
            match catch_unwind(AssertUnwindSafe(|| sink.on_event(event))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    warn!(event = event.name(), error = %e, "Progress subscriber returned error");
                }
                Err(_) => {
                    warn!(event = event.name(), "Progress subscriber panicked");
                }
            }
        }
    }
}
