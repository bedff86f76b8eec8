//! Client lifecycle events.
//!
//! Listeners observe payments, failures, and budget pressure. They are
//! invoked synchronously inside the payment lock, after accounting, so a
//! listener sees budget state consistent with the event it receives.
//! Listeners must not call back into the client from the callback.

use std::sync::Arc;

use payfetch::error::Error;
use payfetch::money::Money;
use payfetch::record::PaymentRecord;

use crate::budget::{BudgetPeriod, BudgetWarning};

/// An event emitted by the client.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// A payment completed and was recorded.
    Payment(PaymentRecord),
    /// A fetch is about to fail with this error.
    Error {
        /// Stable error code.
        code: &'static str,
        /// Human-readable message.
        message: String,
    },
    /// Spending crossed the warning threshold of a period limit.
    BudgetWarning(BudgetWarning),
    /// A budget gate rejected a payment.
    BudgetExceeded {
        /// The period whose limit was hit, or `None` for the
        /// per-transaction limit.
        period: Option<BudgetPeriod>,
        /// The USD amount that was attempted.
        attempted: Money,
        /// The limit that blocked it.
        limit: Money,
    },
}

/// Observes [`ClientEvent`]s.
pub trait EventListener: Send + Sync {
    /// Called for each event, inside the payment lock.
    fn on_event(&self, event: &ClientEvent);
}

/// The client's registered listeners.
#[derive(Clone, Default)]
pub struct Events {
    listeners: Vec<Arc<dyn EventListener>>,
}

impl std::fmt::Debug for Events {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Events")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl Events {
    /// Creates an empty listener set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener.
    pub fn push(&mut self, listener: Arc<dyn EventListener>) {
        self.listeners.push(listener);
    }

    /// Emits an event to every listener in registration order.
    pub fn emit(&self, event: &ClientEvent) {
        for listener in &self.listeners {
            listener.on_event(event);
        }
    }

    /// Emits the `error` event for an error about to be raised.
    pub fn emit_error(&self, error: &Error) {
        self.emit(&ClientEvent::Error {
            code: error.code(),
            message: error.message().to_string(),
        });
    }
}
