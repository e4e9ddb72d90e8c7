//! # Notifications
//!
//! Notification-worthy lifecycle events for namespace subscribers.
//!
//! Events are emitted as structured log records (`event_type =
//! "namespace_notification"`) and returned in the pass summary. Delivery is
//! left to whatever consumes the logs; a pass may emit the same warning
//! again on the next run.

use crate::observability::metrics;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::fmt;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationAction {
    ShutdownWarning,
    ShutdownImminent,
    ShutdownCompleted,
}

impl NotificationAction {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationAction::ShutdownWarning => "shutdown_warning",
            NotificationAction::ShutdownImminent => "shutdown_imminent",
            NotificationAction::ShutdownCompleted => "shutdown_completed",
        }
    }
}

impl fmt::Display for NotificationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    pub namespace: String,
    pub subscribers: Vec<String>,
    /// Scheduled deactivation date (`YYYY-MM-DD`)
    pub shutdown_at: String,
    pub action: NotificationAction,
    pub hours_until_shutdown: i64,
}

/// Action for a namespace that is scheduled but not yet due
///
/// `days_left` is the deadline minus today, in days.
#[must_use]
pub fn pending_action(days_left: i64, warning_days: i64) -> Option<NotificationAction> {
    if days_left == 0 {
        Some(NotificationAction::ShutdownImminent)
    } else if days_left > 0 && days_left <= warning_days {
        Some(NotificationAction::ShutdownWarning)
    } else {
        None
    }
}

/// Whole hours from `now` to the start of the deadline day, never negative
#[must_use]
pub fn hours_until(shutdown_at: NaiveDate, now: DateTime<Utc>) -> i64 {
    let deadline = shutdown_at.and_time(chrono::NaiveTime::MIN).and_utc();
    (deadline - now).num_hours().max(0)
}

/// Build and emit an event, or log that nobody is listening
#[must_use]
pub fn notify(
    namespace: &str,
    subscribers: &[String],
    shutdown_at: NaiveDate,
    action: NotificationAction,
    now: DateTime<Utc>,
) -> Option<NotificationEvent> {
    if subscribers.is_empty() {
        info!(
            event_type = "namespace_notification",
            namespace,
            subscriber_count = 0,
            action = %action,
            "No subscribers for namespace {namespace} - no notification needed"
        );
        return None;
    }

    let event = NotificationEvent {
        namespace: namespace.to_string(),
        subscribers: subscribers.to_vec(),
        shutdown_at: shutdown_at.format("%Y-%m-%d").to_string(),
        action,
        hours_until_shutdown: hours_until(shutdown_at, now),
    };
    info!(
        event_type = "namespace_notification",
        namespace,
        subscribers = ?event.subscribers,
        subscriber_count = event.subscribers.len(),
        shutdown_at = %event.shutdown_at,
        action = %action,
        hours_until_shutdown = event.hours_until_shutdown,
        "Notification required: {action} for namespace {namespace} with {} subscribers",
        event.subscribers.len()
    );
    metrics::increment_notifications(action);
    Some(event)
}
