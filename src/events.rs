//! The application-wide error channel.
//!
//! Errors that escape a request's pipeline, and errors raised by a streaming
//! body after the response has started, are broadcast here. Subscribers run
//! synchronously, in subscription order, on the task that raised the error.

use std::sync::{Arc, PoisonError, RwLock};

use crate::error::Error;

type Subscriber = Arc<dyn Fn(&Error) + Send + Sync + 'static>;

/// Publish/subscribe channel for unhandled errors.
///
/// Cloning is cheap and every clone shares the same subscriber list, so a
/// subscription added after a handler was built still sees that handler's
/// errors.
#[derive(Clone, Default)]
pub struct ErrorChannel {
    subscribers: Arc<RwLock<Vec<Subscriber>>>,
}

impl ErrorChannel {
    pub fn subscribe<F>(&self, f: F)
    where
        F: Fn(&Error) + Send + Sync + 'static,
    {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(f));
    }

    /// Invokes every subscriber with `err`.
    pub fn publish(&self, err: &Error) {
        // Snapshot so a subscriber may itself subscribe without deadlocking.
        let subscribers = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for subscriber in subscribers {
            subscriber(err);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl std::fmt::Debug for ErrorChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErrorChannel")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
