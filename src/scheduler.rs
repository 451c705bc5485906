use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::labels::Labels;
use crate::models::{Priority, Timestamp};
use crate::notify::{
    LocalTimerPlatform, NotificationContent, NotificationHandle, NotificationPayload,
    NotificationPlatform, Permission,
};

/// Everything needed to schedule the reminders of one task.
#[derive(Debug, Clone, Copy)]
pub struct ReminderRequest<'a> {
    pub task_id: &'a str,
    pub title: &'a str,
    pub due_at: Timestamp,
    pub lead_times: &'a [u32],
    pub priority: Priority,
    pub category: &'a str,
}

/// `(lead_minutes, fire_at)` for every lead time whose fire time is strictly after `now`.
/// A fire time below the representable range counts as past.
pub fn fire_times(due_at: Timestamp, lead_times: &[u32], now: Timestamp) -> Vec<(u32, Timestamp)> {
    lead_times
        .iter()
        .filter_map(|&lead| {
            let fire_at = due_at.checked_sub(i64::from(lead) * 60)?;
            (fire_at > now).then_some((lead, fire_at))
        })
        .collect()
}

pub struct NotificationScheduler {
    platform: Arc<dyn NotificationPlatform>,
    labels: Labels,
    enabled: bool,
}

impl NotificationScheduler {
    pub fn new(platform: Arc<dyn NotificationPlatform>, labels: Labels) -> Self {
        Self {
            platform,
            labels,
            enabled: true,
        }
    }

    pub fn set_labels(&mut self, labels: Labels) {
        self.labels = labels;
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Registers one notification per future fire time. Never fails: permission denial,
    /// disabled notifications and platform errors all shrink the returned handle list.
    pub fn schedule_reminders(
        &self,
        request: &ReminderRequest<'_>,
        now: Timestamp,
    ) -> Vec<NotificationHandle> {
        let times = fire_times(request.due_at, request.lead_times, now);
        if times.is_empty() {
            log::debug!(
                "no future fire times task_id={} due_at={} lead_times={:?}",
                request.task_id,
                request.due_at,
                request.lead_times
            );
            return Vec::new();
        }
        if !self.enabled {
            log::debug!("notifications disabled, skipping task_id={}", request.task_id);
            return Vec::new();
        }
        if self.platform.request_permission() == Permission::Denied {
            log::info!(
                "notification permission denied, task_id={} left without reminders",
                request.task_id
            );
            return Vec::new();
        }

        let title = self.labels.title(request.title, request.priority);
        let mut handles = Vec::with_capacity(times.len());
        for (lead, fire_at) in times {
            let content = NotificationContent {
                title: title.clone(),
                body: self.labels.body(request.category, lead),
                payload: NotificationPayload {
                    task_id: request.task_id.to_string(),
                    lead_minutes: lead,
                    priority: request.priority,
                    category: request.category.to_string(),
                },
            };
            match self.platform.schedule_at(fire_at, content) {
                Ok(handle) => handles.push(handle),
                Err(err) => log::warn!(
                    "failed to schedule task_id={} fire_at={fire_at}: {err}",
                    request.task_id
                ),
            }
        }
        log::debug!(
            "scheduled {} reminder(s) task_id={}",
            handles.len(),
            request.task_id
        );
        handles
    }

    pub fn cancel_reminders(&self, handles: &[NotificationHandle]) {
        for handle in handles {
            self.platform.cancel(handle);
        }
        if !handles.is_empty() {
            log::debug!("cancelled {} reminder(s)", handles.len());
        }
    }
}

/// Fires due notifications every `interval_secs` until the runtime shuts down.
pub async fn run_dispatcher(platform: LocalTimerPlatform, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        interval.tick().await;
        let now = Utc::now().timestamp();
        let shown = platform.dispatch_due(now);
        if shown > 0 {
            log::debug!("dispatched {shown} reminder(s)");
        }
    }
}
