use serde::{Deserialize, Serialize};

pub type Timestamp = i64;

/// Offsets (minutes before `reminder_date`) used when a task does not carry its own.
pub const DEFAULT_LEAD_TIMES: [u32; 2] = [60, 10];

pub const DEFAULT_CATEGORY: &str = "general";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Completed,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Todo
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    pub id: String,
    pub title: String,
    pub completed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub category: String,
    pub status: TaskStatus,
    pub priority: Priority,
    pub reminder: bool,
    pub reminder_date: Option<Timestamp>,
    pub lead_times: Vec<u32>,
    pub notification_ids: Vec<String>,
    pub subtasks: Vec<Subtask>,
    pub tags: Vec<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}

impl Task {
    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }

    /// Active-reminder: notifications are expected for this task.
    pub fn wants_reminders(&self) -> bool {
        self.reminder && !self.is_completed() && self.reminder_date.is_some()
    }

    pub fn effective_lead_times(&self) -> Vec<u32> {
        if self.lead_times.is_empty() {
            DEFAULT_LEAD_TIMES.to_vec()
        } else {
            normalize_lead_times(&self.lead_times)
        }
    }
}

/// Input for creating a task. Everything except the title is optional on the wire.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub category: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub reminder: bool,
    pub reminder_date: Option<Timestamp>,
    pub lead_times: Vec<u32>,
    pub subtasks: Vec<String>,
    pub tags: Vec<String>,
}

/// Partial update. `None` leaves a field untouched; for nullable fields `Some(None)` clears it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TaskPatch {
    pub title: Option<String>,
    #[serde(with = "double_option")]
    pub description: Option<Option<String>>,
    pub category: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub reminder: Option<bool>,
    #[serde(with = "double_option")]
    pub reminder_date: Option<Option<Timestamp>>,
    pub lead_times: Option<Vec<u32>>,
    pub tags: Option<Vec<String>>,
}

impl TaskPatch {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// Distinguishes an absent key (`None`) from an explicit `null` (`Some(None)`).
mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<T, S>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Serialize,
        S: Serializer,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

/// Descending (earliest notification first), without duplicates.
pub fn normalize_lead_times(lead_times: &[u32]) -> Vec<u32> {
    let mut out = lead_times.to_vec();
    out.sort_unstable_by(|a, b| b.cmp(a));
    out.dedup();
    out
}

pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.trim();
        if tag.is_empty() || out.iter().any(|existing| existing == tag) {
            continue;
        }
        out.push(tag.to_string());
    }
    out
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_notifications_enabled")]
    pub notifications_enabled: bool,
    #[serde(default = "default_dispatch_interval_secs")]
    pub dispatch_interval_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            language: default_language(),
            notifications_enabled: default_notifications_enabled(),
            dispatch_interval_secs: default_dispatch_interval_secs(),
        }
    }
}

fn default_language() -> String {
    "auto".to_string()
}

fn default_notifications_enabled() -> bool {
    true
}

fn default_dispatch_interval_secs() -> u64 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TasksFile {
    pub schema_version: u32,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsFile {
    pub schema_version: u32,
    pub settings: Settings,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_task;

    #[test]
    fn settings_serde_applies_defaults_for_missing_fields() {
        let settings: Settings = serde_json::from_str("{}").expect("settings should deserialize");
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.language, "auto");
        assert!(settings.notifications_enabled);
        assert_eq!(settings.dispatch_interval_secs, 1);
    }

    #[test]
    fn task_serializes_with_camel_case_keys_and_kebab_status() {
        let mut task = sample_task("a");
        task.status = TaskStatus::InProgress;
        task.priority = Priority::Urgent;
        let value = serde_json::to_value(&task).unwrap();
        assert_eq!(value["status"], "in-progress");
        assert_eq!(value["priority"], "urgent");
        assert!(value.get("notificationIds").is_some());
        assert!(value.get("leadTimes").is_some());
        assert!(value.get("reminderDate").is_some());
    }

    #[test]
    fn task_rejects_records_missing_current_fields() {
        let json = r#"{ "id": "a", "title": "old" }"#;
        assert!(serde_json::from_str::<Task>(json).is_err());
    }

    #[test]
    fn wants_reminders_requires_flag_date_and_open_status() {
        let mut task = sample_task("a");
        assert!(!task.wants_reminders());
        task.reminder = true;
        assert!(!task.wants_reminders());
        task.reminder_date = Some(100);
        assert!(task.wants_reminders());
        task.status = TaskStatus::Completed;
        assert!(!task.wants_reminders());
    }

    #[test]
    fn effective_lead_times_fall_back_to_default_and_normalize() {
        let mut task = sample_task("a");
        task.lead_times = Vec::new();
        assert_eq!(task.effective_lead_times(), DEFAULT_LEAD_TIMES.to_vec());
        task.lead_times = vec![5, 30, 5, 0];
        assert_eq!(task.effective_lead_times(), vec![30, 5, 0]);
    }

    #[test]
    fn normalize_tags_trims_and_dedups_in_order() {
        let tags = vec![
            " home ".to_string(),
            "".to_string(),
            "work".to_string(),
            "home".to_string(),
        ];
        assert_eq!(normalize_tags(&tags), vec!["home", "work"]);
    }

    #[test]
    fn patch_distinguishes_missing_from_null() {
        let patch: TaskPatch = serde_json::from_str(r#"{ "reminderDate": null }"#).unwrap();
        assert_eq!(patch.reminder_date, Some(None));
        assert_eq!(patch.description, None);

        let patch: TaskPatch = serde_json::from_str(r#"{ "reminderDate": 42 }"#).unwrap();
        assert_eq!(patch.reminder_date, Some(Some(42)));
    }
}
