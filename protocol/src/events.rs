//! Progress and outcome notifications.
//!
//! Every orchestrated operation and every reveal gets an operation id and
//! reports through a broadcast channel: a few progress steps, then exactly
//! one `Succeeded` or `Failed`. Nobody listening is fine; events are
//! dropped on the floor.
//!
//! Abandoned (stale) operations emit nothing after the abandonment. They
//! are not failures.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::registry::TokenSymbol;
use crate::types::TxHash;

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// A step started. `step` is a short machine-friendly label.
    Progress { step: String },
    /// A transaction was broadcast.
    Submitted { tx_hash: TxHash },
    Succeeded { message: String },
    /// Terminal failure. `message` is the human-readable error.
    Failed { message: String },
}

/// One notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineEvent {
    pub op_id: Uuid,
    pub token: TokenSymbol,
    pub kind: EventKind,
}

/// Broadcasts [`EngineEvent`]s to any number of subscribers.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: broadcast::Sender<EngineEvent>,
}

impl Notifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, op_id: Uuid, token: &TokenSymbol, kind: EventKind) {
        // An error here only means there are no subscribers.
        let _ = self.tx.send(EngineEvent {
            op_id,
            token: token.clone(),
            kind,
        });
    }

    pub fn progress(&self, op_id: Uuid, token: &TokenSymbol, step: &str) {
        self.emit(
            op_id,
            token,
            EventKind::Progress {
                step: step.to_string(),
            },
        );
    }

    pub fn succeeded(&self, op_id: Uuid, token: &TokenSymbol, message: impl Into<String>) {
        self.emit(
            op_id,
            token,
            EventKind::Succeeded {
                message: message.into(),
            },
        );
    }

    pub fn failed(&self, op_id: Uuid, token: &TokenSymbol, message: impl Into<String>) {
        self.emit(
            op_id,
            token,
            EventKind::Failed {
                message: message.into(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_see_events_in_order() {
        let notifier = Notifier::new(8);
        let mut rx = notifier.subscribe();
        let op = Uuid::new_v4();

        notifier.progress(op, &TokenSymbol::ZUsd, "encrypting");
        notifier.succeeded(op, &TokenSymbol::ZUsd, "minted 1000 zUSD");

        let first = rx.recv().await.unwrap();
        assert_eq!(first.op_id, op);
        assert!(matches!(first.kind, EventKind::Progress { ref step } if step == "encrypting"));
        let second = rx.recv().await.unwrap();
        assert!(matches!(second.kind, EventKind::Succeeded { .. }));
    }

    #[test]
    fn emitting_without_subscribers_is_fine() {
        let notifier = Notifier::new(1);
        notifier.failed(Uuid::new_v4(), &TokenSymbol::ZEth, "boom");
    }

    #[test]
    fn events_serialize_with_type_tag() {
        let event = EngineEvent {
            op_id: Uuid::nil(),
            token: TokenSymbol::ZBtc,
            kind: EventKind::Failed {
                message: "nope".into(),
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"failed\""));
        assert!(json.contains("\"token\":\"zBTC\""));
    }
}
