//! Task lifecycle: every task mutation goes through here so that the stored notification
//! handles always match what is registered with the platform.
//!
//! Reminder bookkeeping follows one decision table ([`plan_reminder_change`]) evaluated on the
//! task before and after a change. Handles are always cancelled before new ones are scheduled,
//! and the task is persisted only once both steps are done.

use chrono::Utc;

use crate::models::{
    normalize_lead_times, normalize_tags, Subtask, Task, TaskDraft, TaskPatch, TaskStatus,
    Timestamp, DEFAULT_CATEGORY, DEFAULT_LEAD_TIMES,
};
use crate::scheduler::{NotificationScheduler, ReminderRequest};
use crate::storage::StorageError;
use crate::store::TaskStore;

pub type Clock = Box<dyn Fn() -> Timestamp + Send>;

pub fn system_clock() -> Clock {
    Box::new(|| Utc::now().timestamp())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    EmptyTitle,
    TaskNotFound(String),
    SubtaskNotFound(String),
}

impl std::fmt::Display for LifecycleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LifecycleError::EmptyTitle => write!(f, "title is required"),
            LifecycleError::TaskNotFound(id) => write!(f, "task not found: {id}"),
            LifecycleError::SubtaskNotFound(id) => write!(f, "subtask not found: {id}"),
        }
    }
}

impl std::error::Error for LifecycleError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderAction {
    /// Leave `notification_ids` as they are.
    Keep,
    /// Cancel every handle and clear the list.
    Cancel,
    /// Cancel every handle, then schedule again if the task still wants reminders.
    Reschedule,
}

/// Decides what happens to a task's notifications when it changes from `before` to `after`.
pub fn plan_reminder_change(before: &Task, after: &Task) -> ReminderAction {
    if after.is_completed() {
        if !before.is_completed() || !before.notification_ids.is_empty() {
            return ReminderAction::Cancel;
        }
        return ReminderAction::Keep;
    }

    let leaving_completed = before.is_completed();
    let content_changed = before.title != after.title
        || before.reminder_date != after.reminder_date
        || before.effective_lead_times() != after.effective_lead_times();
    let reminder_on = !before.reminder && after.reminder;
    if leaving_completed || content_changed || reminder_on {
        return ReminderAction::Reschedule;
    }

    if before.reminder && !after.reminder {
        return ReminderAction::Cancel;
    }
    ReminderAction::Keep
}

pub struct TaskLifecycle {
    store: TaskStore,
    scheduler: NotificationScheduler,
    clock: Clock,
    next_seq: u64,
}

impl TaskLifecycle {
    pub fn new(store: TaskStore, scheduler: NotificationScheduler) -> Self {
        Self::with_clock(store, scheduler, system_clock())
    }

    pub fn with_clock(store: TaskStore, scheduler: NotificationScheduler, clock: Clock) -> Self {
        Self {
            store,
            scheduler,
            clock,
            next_seq: 0,
        }
    }

    pub fn tasks(&self) -> &[Task] {
        self.store.list()
    }

    pub fn find(&self, id: &str) -> Option<&Task> {
        self.store.find(id)
    }

    pub fn scheduler_mut(&mut self) -> &mut NotificationScheduler {
        &mut self.scheduler
    }

    pub fn is_dirty(&self) -> bool {
        self.store.is_dirty()
    }

    /// Retries persisting after an earlier write failure.
    pub fn flush(&mut self) -> Result<(), StorageError> {
        self.store.flush()
    }

    pub fn add_task(&mut self, draft: TaskDraft) -> Result<Task, LifecycleError> {
        let title = draft.title.trim();
        if title.is_empty() {
            return Err(LifecycleError::EmptyTitle);
        }
        let now = self.now();
        let status = draft.status.unwrap_or_default();
        let lead_times = if draft.lead_times.is_empty() {
            DEFAULT_LEAD_TIMES.to_vec()
        } else {
            normalize_lead_times(&draft.lead_times)
        };
        let id = self.next_task_id(now);
        let mut subtasks = Vec::new();
        for subtask_title in &draft.subtasks {
            let subtask_title = subtask_title.trim();
            if subtask_title.is_empty() {
                continue;
            }
            let subtask_id = self.next_subtask_id(&subtasks);
            subtasks.push(Subtask {
                id: subtask_id,
                title: subtask_title.to_string(),
                completed: false,
            });
        }

        let mut task = Task {
            id,
            title: title.to_string(),
            description: clean_optional(draft.description),
            category: clean_category(draft.category.as_deref()),
            status,
            priority: draft.priority.unwrap_or_default(),
            reminder: draft.reminder,
            reminder_date: draft.reminder_date,
            lead_times,
            notification_ids: Vec::new(),
            subtasks,
            tags: normalize_tags(&draft.tags),
            created_at: now,
            updated_at: now,
            completed_at: (status == TaskStatus::Completed).then_some(now),
        };
        if task.wants_reminders() {
            task.notification_ids = self.schedule_for(&task, now);
        }

        log::info!(
            "task created id={} reminders={}",
            task.id,
            task.notification_ids.len()
        );
        self.store.upsert(task.clone());
        Ok(task)
    }

    pub fn update_task(&mut self, id: &str, patch: TaskPatch) -> Result<Task, LifecycleError> {
        let before = self
            .store
            .find(id)
            .cloned()
            .ok_or_else(|| LifecycleError::TaskNotFound(id.to_string()))?;
        let now = self.now();

        let mut after = before.clone();
        apply_patch(&mut after, patch)?;
        after.updated_at = now;
        match (before.is_completed(), after.is_completed()) {
            (false, true) => after.completed_at = Some(now),
            (true, false) => after.completed_at = None,
            _ => {}
        }

        let action = plan_reminder_change(&before, &after);
        self.apply_reminder_action(&before, &mut after, action, now);
        log::debug!(
            "task updated id={} action={action:?} reminders={}",
            after.id,
            after.notification_ids.len()
        );
        self.store.upsert(after.clone());
        Ok(after)
    }

    /// Flips between `completed` and `todo`.
    pub fn toggle_task(&mut self, id: &str) -> Result<Task, LifecycleError> {
        let current = self
            .store
            .find(id)
            .map(|task| task.status)
            .ok_or_else(|| LifecycleError::TaskNotFound(id.to_string()))?;
        let next = if current == TaskStatus::Completed {
            TaskStatus::Todo
        } else {
            TaskStatus::Completed
        };
        self.update_task(id, TaskPatch::status(next))
    }

    /// Cancels live notifications, then deletes. Unknown ids are a no-op (`false`).
    pub fn remove_task(&mut self, id: &str) -> bool {
        let Some(task) = self.store.find(id) else {
            return false;
        };
        self.scheduler.cancel_reminders(&task.notification_ids);
        self.store.remove(id);
        log::info!("task removed id={id}");
        true
    }

    pub fn reorder_tasks(&mut self, ids: &[String]) -> bool {
        self.store.reorder(ids)
    }

    pub fn add_subtask(&mut self, task_id: &str, title: &str) -> Result<Task, LifecycleError> {
        let title = title.trim();
        if title.is_empty() {
            return Err(LifecycleError::EmptyTitle);
        }
        let mut task = self.task_for_edit(task_id)?;
        let subtask_id = self.next_subtask_id(&task.subtasks);
        task.subtasks.push(Subtask {
            id: subtask_id,
            title: title.to_string(),
            completed: false,
        });
        task.updated_at = self.now();
        self.store.upsert(task.clone());
        Ok(task)
    }

    pub fn toggle_subtask(
        &mut self,
        task_id: &str,
        subtask_id: &str,
    ) -> Result<Task, LifecycleError> {
        let mut task = self.task_for_edit(task_id)?;
        let subtask = task
            .subtasks
            .iter_mut()
            .find(|subtask| subtask.id == subtask_id)
            .ok_or_else(|| LifecycleError::SubtaskNotFound(subtask_id.to_string()))?;
        subtask.completed = !subtask.completed;
        task.updated_at = self.now();
        self.store.upsert(task.clone());
        Ok(task)
    }

    pub fn remove_subtask(
        &mut self,
        task_id: &str,
        subtask_id: &str,
    ) -> Result<Task, LifecycleError> {
        let mut task = self.task_for_edit(task_id)?;
        let before = task.subtasks.len();
        task.subtasks.retain(|subtask| subtask.id != subtask_id);
        if task.subtasks.len() == before {
            return Err(LifecycleError::SubtaskNotFound(subtask_id.to_string()));
        }
        task.updated_at = self.now();
        self.store.upsert(task.clone());
        Ok(task)
    }

    /// Reconciles stored handles with the platform after a restart. Handles from an earlier
    /// process are cancelled; tasks that still want reminders are scheduled again.
    /// Returns the number of notifications registered.
    pub fn restore_reminders(&mut self) -> usize {
        let now = self.now();
        let mut changed = Vec::new();
        let mut registered = 0;
        for task in self.store.list().to_vec() {
            if !task.wants_reminders() && task.notification_ids.is_empty() {
                continue;
            }
            let mut next = task.clone();
            self.scheduler.cancel_reminders(&task.notification_ids);
            next.notification_ids = if task.wants_reminders() {
                self.schedule_for(&task, now)
            } else {
                Vec::new()
            };
            registered += next.notification_ids.len();
            if next != task {
                changed.push(next);
            }
        }
        log::info!(
            "reminders restored registered={registered} tasks_changed={}",
            changed.len()
        );
        self.store.replace_many(changed);
        registered
    }

    fn apply_reminder_action(
        &mut self,
        before: &Task,
        after: &mut Task,
        action: ReminderAction,
        now: Timestamp,
    ) {
        match action {
            ReminderAction::Keep => {
                after.notification_ids = before.notification_ids.clone();
            }
            ReminderAction::Cancel => {
                self.scheduler.cancel_reminders(&before.notification_ids);
                after.notification_ids.clear();
            }
            ReminderAction::Reschedule => {
                self.scheduler.cancel_reminders(&before.notification_ids);
                after.notification_ids.clear();
                if after.wants_reminders() {
                    after.notification_ids = self.schedule_for(after, now);
                }
            }
        }
    }

    fn schedule_for(&self, task: &Task, now: Timestamp) -> Vec<String> {
        let Some(due_at) = task.reminder_date else {
            return Vec::new();
        };
        let lead_times = task.effective_lead_times();
        self.scheduler.schedule_reminders(
            &ReminderRequest {
                task_id: &task.id,
                title: &task.title,
                due_at,
                lead_times: &lead_times,
                priority: task.priority,
                category: &task.category,
            },
            now,
        )
    }

    fn task_for_edit(&self, task_id: &str) -> Result<Task, LifecycleError> {
        self.store
            .find(task_id)
            .cloned()
            .ok_or_else(|| LifecycleError::TaskNotFound(task_id.to_string()))
    }

    fn now(&self) -> Timestamp {
        (self.clock)()
    }

    fn next_task_id(&mut self, now: Timestamp) -> String {
        loop {
            self.next_seq += 1;
            let id = format!("task-{now}-{}", self.next_seq);
            if !self.store.contains(&id) {
                return id;
            }
        }
    }

    fn next_subtask_id(&mut self, existing: &[Subtask]) -> String {
        loop {
            self.next_seq += 1;
            let id = format!("sub-{}-{}", self.now(), self.next_seq);
            if existing.iter().all(|subtask| subtask.id != id) {
                return id;
            }
        }
    }
}

fn apply_patch(task: &mut Task, patch: TaskPatch) -> Result<(), LifecycleError> {
    if let Some(title) = patch.title {
        let title = title.trim();
        if title.is_empty() {
            return Err(LifecycleError::EmptyTitle);
        }
        task.title = title.to_string();
    }
    if let Some(description) = patch.description {
        task.description = clean_optional(description);
    }
    if let Some(category) = patch.category {
        task.category = clean_category(Some(&category));
    }
    if let Some(status) = patch.status {
        task.status = status;
    }
    if let Some(priority) = patch.priority {
        task.priority = priority;
    }
    if let Some(reminder) = patch.reminder {
        task.reminder = reminder;
    }
    if let Some(reminder_date) = patch.reminder_date {
        task.reminder_date = reminder_date;
    }
    if let Some(lead_times) = patch.lead_times {
        task.lead_times = if lead_times.is_empty() {
            DEFAULT_LEAD_TIMES.to_vec()
        } else {
            normalize_lead_times(&lead_times)
        };
    }
    if let Some(tags) = patch.tags {
        task.tags = normalize_tags(&tags);
    }
    Ok(())
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

fn clean_category(value: Option<&str>) -> String {
    value
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .unwrap_or(DEFAULT_CATEGORY)
        .to_string()
}
