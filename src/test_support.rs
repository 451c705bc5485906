use std::sync::Mutex;

use crate::models::{Priority, Task, TaskStatus, Timestamp, DEFAULT_CATEGORY, DEFAULT_LEAD_TIMES};
use crate::notify::{
    NotificationContent, NotificationHandle, NotificationPlatform, PendingNotification,
    Permission, PlatformError,
};

pub fn sample_task(id: &str) -> Task {
    Task {
        id: id.to_string(),
        title: format!("task-{id}"),
        description: None,
        category: DEFAULT_CATEGORY.to_string(),
        status: TaskStatus::Todo,
        priority: Priority::Medium,
        reminder: false,
        reminder_date: None,
        lead_times: DEFAULT_LEAD_TIMES.to_vec(),
        notification_ids: Vec::new(),
        subtasks: Vec::new(),
        tags: Vec::new(),
        created_at: 1,
        updated_at: 1,
        completed_at: None,
    }
}

#[derive(Default)]
struct Recorded {
    next_id: u64,
    scheduled: Vec<PendingNotification>,
    cancelled: Vec<NotificationHandle>,
    permission_requests: usize,
    fail_next: usize,
}

/// Fake platform that records every call.
pub struct RecordingPlatform {
    permission: Mutex<Permission>,
    inner: Mutex<Recorded>,
}

impl RecordingPlatform {
    pub fn new() -> Self {
        Self {
            permission: Mutex::new(Permission::Granted),
            inner: Mutex::new(Recorded::default()),
        }
    }

    pub fn denied() -> Self {
        let platform = Self::new();
        platform.set_permission(Permission::Denied);
        platform
    }

    pub fn set_permission(&self, permission: Permission) {
        *self.permission.lock().unwrap() = permission;
    }

    pub fn fail_next_schedules(&self, count: usize) {
        self.inner.lock().unwrap().fail_next = count;
    }

    /// Every successful registration, in call order.
    pub fn scheduled(&self) -> Vec<PendingNotification> {
        self.inner.lock().unwrap().scheduled.clone()
    }

    pub fn cancelled(&self) -> Vec<NotificationHandle> {
        self.inner.lock().unwrap().cancelled.clone()
    }

    pub fn permission_requests(&self) -> usize {
        self.inner.lock().unwrap().permission_requests
    }

    /// Registered and not cancelled.
    pub fn live(&self) -> Vec<NotificationHandle> {
        let guard = self.inner.lock().unwrap();
        guard
            .scheduled
            .iter()
            .map(|item| item.handle.clone())
            .filter(|handle| !guard.cancelled.contains(handle))
            .collect()
    }

    pub fn fire_at_of(&self, handle: &str) -> Option<Timestamp> {
        self.inner
            .lock()
            .unwrap()
            .scheduled
            .iter()
            .find(|item| item.handle == handle)
            .map(|item| item.fire_at)
    }
}

impl NotificationPlatform for RecordingPlatform {
    fn request_permission(&self) -> Permission {
        self.inner.lock().unwrap().permission_requests += 1;
        *self.permission.lock().unwrap()
    }

    fn schedule_at(
        &self,
        fire_at: Timestamp,
        content: NotificationContent,
    ) -> Result<NotificationHandle, PlatformError> {
        let mut guard = self.inner.lock().unwrap();
        if guard.fail_next > 0 {
            guard.fail_next -= 1;
            return Err(PlatformError::new("schedule rejected"));
        }
        guard.next_id += 1;
        let handle = format!("h{}", guard.next_id);
        guard.scheduled.push(PendingNotification {
            handle: handle.clone(),
            fire_at,
            content,
        });
        Ok(handle)
    }

    fn cancel(&self, handle: &str) {
        self.inner.lock().unwrap().cancelled.push(handle.to_string());
    }
}
