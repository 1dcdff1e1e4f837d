//! Lifecycle events and synchronous, failure-isolated subscriber lists.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use crate::tracker::marker::DetectedMarker;

/// Error returned by a failing subscriber.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

pub type HandlerResult = Result<(), HandlerError>;

/// Lifecycle transition of one tracker.
///
/// Marker payloads are the filter chain's output, so with an averaging
/// z-score stage they carry the aggregated pose and size.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackingEvent {
    /// Emitted on the first valid detection after creation, before `Detected`
    FirstDetected(DetectedMarker),
    /// Emitted on every valid detection
    Detected(DetectedMarker),
    /// Emitted once when a tracked marker stops being detected
    Lost,
}

impl TrackingEvent {
    pub fn marker(&self) -> Option<&DetectedMarker> {
        match self {
            Self::FirstDetected(marker) | Self::Detected(marker) => Some(marker),
            Self::Lost => None,
        }
    }
}

/// Handle returned by [`Subscribers::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Ordered list of event handlers.
///
/// Handlers run synchronously in subscription order. A handler that returns
/// an error or panics is logged and skipped; the remaining handlers still run.
/// Handlers must not block: no timeout is enforced.
pub struct Subscribers<E: ?Sized> {
    next_id: u64,
    handlers: Vec<(SubscriptionId, Box<dyn FnMut(&E) -> HandlerResult + Send>)>,
}

impl<E: ?Sized> Default for Subscribers<E> {
    fn default() -> Self {
        Self {
            next_id: 0,
            handlers: Vec::new(),
        }
    }
}

impl<E: ?Sized> fmt::Debug for Subscribers<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl<E: ?Sized> Subscribers<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&mut self, handler: F) -> SubscriptionId
    where
        F: FnMut(&E) -> HandlerResult + Send + 'static,
    {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.handlers.push((id, Box::new(handler)));
        id
    }

    /// Returns `false` if `id` was not subscribed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(handler_id, _)| *handler_id != id);
        self.handlers.len() != before
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Invoke every handler with `event`; returns the number of failures.
    pub fn emit(&mut self, event: &E) -> usize {
        let mut failures = 0;
        for (id, handler) in self.handlers.iter_mut() {
            match panic::catch_unwind(AssertUnwindSafe(|| handler(event))) {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    failures += 1;
                    log::error!("event handler {id:?} failed: {err}");
                }
                Err(payload) => {
                    failures += 1;
                    log::error!(
                        "event handler {id:?} panicked: {}",
                        panic_message(payload.as_ref())
                    );
                }
            }
        }
        failures
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        *msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}
