use crate::models::{Settings, Task, Timestamp};
use crate::notify::PendingNotification;

pub const EVENT_REMINDER: &str = "reminder_fired";
pub const EVENT_STATE_UPDATED: &str = "state_updated";

#[derive(Debug, Clone, serde::Serialize)]
pub struct StatePayload {
    pub tasks: Vec<Task>,
    pub settings: Settings,
}

/// Sent when a reminder is shown so the frontend can open the task.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReminderPayload {
    pub task_id: String,
    pub title: String,
    pub body: String,
    pub fire_at: Timestamp,
}

impl From<&PendingNotification> for ReminderPayload {
    fn from(notification: &PendingNotification) -> Self {
        Self {
            task_id: notification.content.payload.task_id.clone(),
            title: notification.content.title.clone(),
            body: notification.content.body.clone(),
            fire_at: notification.fire_at,
        }
    }
}
