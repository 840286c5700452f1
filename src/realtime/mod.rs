//! Realtime notification fan-out.
//!
//! Services emit events through the [`Notifier`] trait; the production
//! implementation is an in-process [`Hub`] of per-user broadcast rooms
//! drained by WebSocket connections. Delivery is best-effort: no
//! ordering guarantee, no offline persistence, and a failed delivery
//! never affects the state change that triggered it.

mod hub;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::{MessageResponse, ServiceStatus, UserSummary};

pub use hub::Hub;

/// Realtime event payloads, tagged the way the SPA consumes them.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum Event {
    #[serde(rename_all = "camelCase")]
    NewMessage { message: MessageResponse },

    #[serde(rename_all = "camelCase")]
    ServiceAccepted {
        service_id: Uuid,
        title: String,
        provider: UserSummary,
    },

    #[serde(rename_all = "camelCase")]
    ServicePendingConfirmation {
        service_id: Uuid,
        title: String,
        provider: UserSummary,
    },

    #[serde(rename_all = "camelCase")]
    ServiceCompleted {
        service_id: Uuid,
        title: String,
        credits: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        new_rating: Option<f64>,
    },

    #[serde(rename_all = "camelCase")]
    ServiceStatusChanged {
        service_id: Uuid,
        status: ServiceStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        completed_at: Option<DateTime<Utc>>,
    },
}

/// Best-effort notification delivery to a single user.
///
/// Injected into services as an explicit dependency; implementations
/// must never block or fail the caller.
pub trait Notifier: Send + Sync {
    fn notify(&self, recipient: Uuid, event: Event);
}

/// Notifier that drops everything; used in tests and offline tools.
#[derive(Debug, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _recipient: Uuid, _event: Event) {}
}
