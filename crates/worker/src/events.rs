//! Host event surface beyond fetch: sync, push, notifications, messages.
//!
//! The worker never talks to the OS itself; push and notification-click
//! handling return plain values describing what the host should do
//! (show this notification, focus a window), which keeps the surface
//! testable.

use serde::{Deserialize, Serialize};

use stashway_core::Error;

use crate::worker::OfflineWorker;

/// Deferred-sync tag the worker registers with the host.
pub const SYNC_TAG: &str = "replay-when-online";

/// Payload of a push event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushPayload {
    pub title: String,
    pub body: String,
}

/// Action button on a rendered notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationAction {
    Open,
    Close,
}

/// A notification for the host to render.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub actions: Vec<NotificationAction>,
}

/// What the host should do with its application window after a
/// notification interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowDirective {
    /// Bring an application window to the foreground, or open one.
    Focus,
    /// Dismiss with no side effects.
    Dismiss,
}

/// Control messages accepted from the hosting page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum WorkerMessage {
    /// Promote a waiting worker version immediately, skipping the
    /// staged rollout.
    SkipWaiting,
}

impl OfflineWorker {
    /// Deferred-sync hook, invoked by the host once connectivity
    /// returns.
    ///
    /// The body is intentionally a no-op until a feature consumes it;
    /// re-delivery of the same tag is therefore trivially idempotent.
    pub async fn handle_sync(&self, tag: &str) {
        if tag == SYNC_TAG {
            tracing::info!(tag, "connectivity restored, nothing queued to replay");
        } else {
            tracing::debug!(tag, "ignoring unknown sync tag");
        }
    }

    /// Render a push payload as a notification with open/close actions.
    pub fn handle_push(&self, payload: PushPayload) -> Notification {
        Notification {
            title: payload.title,
            body: payload.body,
            actions: vec![NotificationAction::Open, NotificationAction::Close],
        }
    }

    /// Resolve a notification interaction. No explicit action counts as
    /// `open`.
    pub fn handle_notification_click(&self, action: Option<NotificationAction>) -> WindowDirective {
        match action {
            Some(NotificationAction::Close) => WindowDirective::Dismiss,
            Some(NotificationAction::Open) | None => WindowDirective::Focus,
        }
    }

    /// Handle a control message from the page.
    ///
    /// Unrecognized commands are logged and ignored so a newer page
    /// talking to an older worker never breaks it.
    pub async fn handle_message(&self, data: serde_json::Value) -> Result<(), Error> {
        match serde_json::from_value::<WorkerMessage>(data.clone()) {
            Ok(WorkerMessage::SkipWaiting) => self.skip_waiting().await,
            Err(_) => {
                tracing::debug!(%data, "ignoring unrecognized message");
                Ok(())
            }
        }
    }
}
