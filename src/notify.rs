//! Local notification platform: an in-process timer table plus a presenter that shows
//! notifications once they are due.

use std::sync::{Arc, Mutex};

use serde::Serialize;

use crate::models::{Priority, Timestamp};

pub type NotificationHandle = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    pub task_id: String,
    pub lead_minutes: u32,
    pub priority: Priority,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    pub payload: NotificationPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingNotification {
    pub handle: NotificationHandle,
    pub fire_at: Timestamp,
    pub content: NotificationContent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformError(String);

impl PlatformError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl std::fmt::Display for PlatformError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "notification platform error: {}", self.0)
    }
}

impl std::error::Error for PlatformError {}

/// Capability consumed by the scheduler. `cancel` must tolerate unknown handles.
pub trait NotificationPlatform: Send + Sync {
    fn request_permission(&self) -> Permission;
    fn schedule_at(
        &self,
        fire_at: Timestamp,
        content: NotificationContent,
    ) -> Result<NotificationHandle, PlatformError>;
    fn cancel(&self, handle: &str);
}

/// Shows a notification right now (OS toast, log line, ...).
pub trait Presenter: Send + Sync {
    fn request_permission(&self) -> Permission;
    fn present(&self, notification: &PendingNotification) -> Result<(), PlatformError>;
}

/// Headless presenter: due notifications only reach the log.
pub struct LogPresenter;

impl Presenter for LogPresenter {
    fn request_permission(&self) -> Permission {
        Permission::Granted
    }

    fn present(&self, notification: &PendingNotification) -> Result<(), PlatformError> {
        log::info!(
            "reminder task_id={} title={} body={}",
            notification.content.payload.task_id,
            notification.content.title,
            notification.content.body
        );
        Ok(())
    }
}

#[derive(Debug)]
struct TimerTable {
    session: i64,
    next_id: u64,
    pending: Vec<PendingNotification>,
}

/// Handles embed a per-process session so stale handles from an earlier run never match a new one.
#[derive(Clone)]
pub struct LocalTimerPlatform {
    inner: Arc<Mutex<TimerTable>>,
    presenter: Arc<dyn Presenter>,
}

impl LocalTimerPlatform {
    pub fn new(presenter: Arc<dyn Presenter>) -> Self {
        Self::with_session(presenter, chrono::Utc::now().timestamp_millis())
    }

    pub fn with_session(presenter: Arc<dyn Presenter>, session: i64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TimerTable {
                session,
                next_id: 1,
                pending: Vec::new(),
            })),
            presenter,
        }
    }

    /// Snapshot ordered by fire time.
    pub fn pending(&self) -> Vec<PendingNotification> {
        let guard = self.inner.lock().expect("timer table poisoned");
        let mut pending = guard.pending.clone();
        pending.sort_by_key(|item| item.fire_at);
        pending
    }

    /// Removes and returns everything due at `now`, earliest first.
    pub fn take_due(&self, now: Timestamp) -> Vec<PendingNotification> {
        let mut guard = self.inner.lock().expect("timer table poisoned");
        let (mut due, rest): (Vec<_>, Vec<_>) = guard
            .pending
            .drain(..)
            .partition(|item| item.fire_at <= now);
        guard.pending = rest;
        due.sort_by_key(|item| item.fire_at);
        due
    }

    /// Presents all due notifications and returns how many were shown.
    pub fn dispatch_due(&self, now: Timestamp) -> usize {
        let due = self.take_due(now);
        let mut shown = 0;
        for notification in &due {
            match self.presenter.present(notification) {
                Ok(()) => shown += 1,
                Err(err) => log::warn!(
                    "failed to present handle={} task_id={}: {err}",
                    notification.handle,
                    notification.content.payload.task_id
                ),
            }
        }
        shown
    }
}

impl NotificationPlatform for LocalTimerPlatform {
    fn request_permission(&self) -> Permission {
        self.presenter.request_permission()
    }

    fn schedule_at(
        &self,
        fire_at: Timestamp,
        content: NotificationContent,
    ) -> Result<NotificationHandle, PlatformError> {
        let mut guard = self.inner.lock().expect("timer table poisoned");
        let handle = format!("ntf-{}-{}", guard.session, guard.next_id);
        guard.next_id += 1;
        guard.pending.push(PendingNotification {
            handle: handle.clone(),
            fire_at,
            content,
        });
        Ok(handle)
    }

    fn cancel(&self, handle: &str) {
        let mut guard = self.inner.lock().expect("timer table poisoned");
        guard.pending.retain(|item| item.handle != handle);
    }
}
