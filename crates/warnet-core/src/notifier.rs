//! The engine's seam to the real-time transport.
//!
//! The engine addresses three audiences and never learns what carries
//! the bytes; the daemon supplies an implementation backed by whatever
//! transport it runs.

use std::sync::Mutex;
use warnet_api::{Audience, EventPayload};
use warnet_util::CustomerId;

/// Delivers named events to clients.
pub trait Notifier: Send + Sync {
    /// Deliver to the single customer's channel.
    fn to_customer(&self, customer_id: CustomerId, event: EventPayload);

    /// Deliver to all administrator listeners.
    fn to_admins(&self, event: EventPayload);

    /// Deliver to every connected client.
    fn to_all(&self, event: EventPayload);
}

/// Test double that records every delivery.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(Audience, EventPayload)>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything delivered so far, in order.
    pub fn sent(&self) -> Vec<(Audience, EventPayload)> {
        self.sent.lock().unwrap().clone()
    }

    /// Drain the recording.
    pub fn take(&self) -> Vec<(Audience, EventPayload)> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }
}

impl Notifier for RecordingNotifier {
    fn to_customer(&self, customer_id: CustomerId, event: EventPayload) {
        self.sent
            .lock()
            .unwrap()
            .push((Audience::Customer(customer_id), event));
    }

    fn to_admins(&self, event: EventPayload) {
        self.sent.lock().unwrap().push((Audience::Admins, event));
    }

    fn to_all(&self, event: EventPayload) {
        self.sent.lock().unwrap().push((Audience::All, event));
    }
}
