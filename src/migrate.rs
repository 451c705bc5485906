//! Decoding of persisted task lists, including records written by older clients.
//!
//! Every record is first decoded as the current [`Task`] shape. Records that do not fit are
//! retried as a [`LegacyTask`], whose absent fields receive documented defaults. Records that fit
//! neither are handed back as quarantined JSON so the caller can keep them aside.

use serde::Deserialize;
use serde_json::Value;

use crate::models::{
    normalize_lead_times, normalize_tags, Priority, Subtask, Task, TaskStatus, Timestamp,
    DEFAULT_CATEGORY, DEFAULT_LEAD_TIMES,
};

pub const SCHEMA_VERSION: u32 = 2;

/// Unix timestamps above this are taken as milliseconds.
const MILLIS_THRESHOLD: u64 = 100_000_000_000;

#[derive(Debug, Default)]
pub struct Decoded {
    pub tasks: Vec<Task>,
    /// Records that were rewritten into the current shape.
    pub migrated: usize,
    pub quarantined: Vec<Value>,
    /// The container itself was not the current envelope.
    pub legacy_envelope: bool,
}

impl Decoded {
    pub fn changed(&self) -> bool {
        self.migrated > 0 || !self.quarantined.is_empty() || self.legacy_envelope
    }
}

#[derive(Debug)]
pub enum DecodeError {
    Json(serde_json::Error),
    UnknownEnvelope,
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::Json(err) => write!(f, "json error: {err}"),
            DecodeError::UnknownEnvelope => write!(f, "unrecognized task list envelope"),
        }
    }
}

impl std::error::Error for DecodeError {}

impl From<serde_json::Error> for DecodeError {
    fn from(value: serde_json::Error) -> Self {
        DecodeError::Json(value)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Envelope {
    #[serde(rename_all = "camelCase")]
    Current {
        schema_version: u32,
        tasks: Vec<Value>,
    },
    Persisted {
        state: PersistedState,
    },
    Bare(Vec<Value>),
}

#[derive(Debug, Deserialize)]
struct PersistedState {
    #[serde(default)]
    tasks: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredTask {
    Current(Task),
    Legacy(LegacyTask),
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LegacyTime {
    Number(i64),
    Float(f64),
    Text(String),
}

impl LegacyTime {
    fn to_timestamp(&self) -> Option<Timestamp> {
        match self {
            LegacyTime::Number(value) => Some(from_unix_number(*value)),
            LegacyTime::Float(value) => Some(from_unix_number(*value as i64)),
            LegacyTime::Text(text) => {
                let text = text.trim();
                if let Ok(value) = text.parse::<i64>() {
                    return Some(from_unix_number(value));
                }
                chrono::DateTime::parse_from_rfc3339(text)
                    .ok()
                    .map(|dt| dt.timestamp())
            }
        }
    }
}

fn from_unix_number(value: i64) -> Timestamp {
    if value.unsigned_abs() > MILLIS_THRESHOLD {
        value / 1000
    } else {
        value
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LegacyId {
    Text(String),
    Number(i64),
}

impl LegacyId {
    fn into_string(self) -> String {
        match self {
            LegacyId::Text(text) => text,
            LegacyId::Number(value) => value.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum LegacyStatus {
    #[serde(alias = "pending")]
    Todo,
    #[serde(alias = "in-progress", alias = "inProgress")]
    InProgress,
    #[serde(alias = "done")]
    Completed,
}

impl From<LegacyStatus> for TaskStatus {
    fn from(value: LegacyStatus) -> Self {
        match value {
            LegacyStatus::Todo => TaskStatus::Todo,
            LegacyStatus::InProgress => TaskStatus::InProgress,
            LegacyStatus::Completed => TaskStatus::Completed,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacySubtask {
    id: LegacyId,
    title: String,
    #[serde(default)]
    completed: Option<bool>,
}

/// The shape older clients wrote: only `id` and `title` are guaranteed.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyTask {
    id: LegacyId,
    title: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    status: Option<LegacyStatus>,
    #[serde(default)]
    completed: Option<bool>,
    #[serde(default)]
    priority: Option<Priority>,
    #[serde(default)]
    reminder: Option<bool>,
    #[serde(default)]
    reminder_date: Option<LegacyTime>,
    #[serde(default)]
    lead_times: Option<Vec<u32>>,
    #[serde(default)]
    notification_id: Option<String>,
    #[serde(default)]
    notification_ids: Option<Vec<String>>,
    #[serde(default)]
    subtasks: Option<Vec<LegacySubtask>>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    created_at: Option<LegacyTime>,
    #[serde(default)]
    updated_at: Option<LegacyTime>,
    #[serde(default)]
    completed_at: Option<LegacyTime>,
}

impl LegacyTask {
    fn into_current(self, loaded_at: Timestamp) -> Task {
        let status = match (self.status, self.completed) {
            (Some(status), _) => status.into(),
            (None, Some(true)) => TaskStatus::Completed,
            (None, _) => TaskStatus::Todo,
        };
        let notification_ids = match (self.notification_ids, self.notification_id) {
            (Some(ids), _) => ids,
            (None, Some(id)) if !id.trim().is_empty() => vec![id],
            (None, _) => Vec::new(),
        };
        let lead_times = match self.lead_times {
            Some(values) => normalize_lead_times(&values),
            None => DEFAULT_LEAD_TIMES.to_vec(),
        };
        let category = self
            .category
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
        let created_at = self
            .created_at
            .as_ref()
            .and_then(LegacyTime::to_timestamp)
            .unwrap_or(loaded_at);
        let updated_at = self
            .updated_at
            .as_ref()
            .and_then(LegacyTime::to_timestamp)
            .unwrap_or(created_at);
        let completed_at = if status == TaskStatus::Completed {
            self.completed_at.as_ref().and_then(LegacyTime::to_timestamp)
        } else {
            None
        };

        Task {
            id: self.id.into_string(),
            title: self.title,
            description: self.description,
            category,
            status,
            priority: self.priority.unwrap_or_default(),
            reminder: self.reminder.unwrap_or(false),
            reminder_date: self.reminder_date.as_ref().and_then(LegacyTime::to_timestamp),
            lead_times,
            notification_ids,
            subtasks: self
                .subtasks
                .unwrap_or_default()
                .into_iter()
                .map(|subtask| Subtask {
                    id: subtask.id.into_string(),
                    title: subtask.title,
                    completed: subtask.completed.unwrap_or(false),
                })
                .collect(),
            tags: normalize_tags(&self.tags.unwrap_or_default()),
            created_at,
            updated_at,
            completed_at,
        }
    }
}

/// Decodes one record. `Err` carries the original value back for quarantine.
pub fn migrate_record(value: Value, loaded_at: Timestamp) -> Result<(Task, bool), Value> {
    match serde_json::from_value::<StoredTask>(value.clone()) {
        Ok(StoredTask::Current(task)) => Ok((task, false)),
        Ok(StoredTask::Legacy(legacy)) => Ok((legacy.into_current(loaded_at), true)),
        Err(_) => Err(value),
    }
}

/// Decodes a whole persisted task list, migrating records one by one.
pub fn decode_task_list(bytes: &[u8], loaded_at: Timestamp) -> Result<Decoded, DecodeError> {
    let envelope: Envelope =
        serde_json::from_slice(bytes).map_err(|_| match serde_json::from_slice::<Value>(bytes) {
            Ok(_) => DecodeError::UnknownEnvelope,
            Err(err) => DecodeError::Json(err),
        })?;

    let (records, legacy_envelope) = match envelope {
        Envelope::Current {
            schema_version,
            tasks,
        } => (tasks, schema_version != SCHEMA_VERSION),
        Envelope::Persisted { state } => (state.tasks, true),
        Envelope::Bare(tasks) => (tasks, true),
    };

    let mut decoded = Decoded {
        legacy_envelope,
        ..Decoded::default()
    };
    for record in records {
        match migrate_record(record, loaded_at) {
            Ok((task, migrated)) => {
                if decoded.tasks.iter().any(|existing| existing.id == task.id) {
                    log::warn!("dropping task with duplicate id={}", task.id);
                    decoded.migrated += 1;
                    continue;
                }
                if migrated {
                    log::debug!("migrated legacy task id={}", task.id);
                    decoded.migrated += 1;
                }
                decoded.tasks.push(task);
            }
            Err(raw) => {
                log::warn!("quarantining malformed task record");
                decoded.quarantined.push(raw);
            }
        }
    }
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sample_task;
    use serde_json::json;

    const LOADED_AT: Timestamp = 1_700_000_000;

    #[test]
    fn current_records_pass_through_byte_identical() {
        let mut task = sample_task("a");
        task.reminder = true;
        task.reminder_date = Some(1_800_000_000);
        task.notification_ids = vec!["ntf-1".into(), "ntf-2".into()];
        task.lead_times = Vec::new();
        let before = serde_json::to_vec(&task).unwrap();

        let (once, migrated) =
            migrate_record(serde_json::from_slice(&before).unwrap(), LOADED_AT).unwrap();
        assert!(!migrated);
        let after_once = serde_json::to_vec(&once).unwrap();

        let (twice, migrated) =
            migrate_record(serde_json::from_slice(&after_once).unwrap(), LOADED_AT).unwrap();
        assert!(!migrated);
        let after_twice = serde_json::to_vec(&twice).unwrap();

        assert_eq!(before, after_once);
        assert_eq!(after_once, after_twice);
        // An explicitly empty list is current data, not a missing field.
        assert!(twice.lead_times.is_empty());
    }

    #[test]
    fn migrated_records_are_stable_on_second_pass() {
        let legacy = json!({ "id": 7, "title": "old", "notificationId": "n-1", "reminder": true });
        let (task, migrated) = migrate_record(legacy, LOADED_AT).unwrap();
        assert!(migrated);

        let first = serde_json::to_vec(&task).unwrap();
        let (again, migrated) =
            migrate_record(serde_json::from_slice(&first).unwrap(), LOADED_AT + 99).unwrap();
        assert!(!migrated);
        assert_eq!(first, serde_json::to_vec(&again).unwrap());
    }

    #[test]
    fn legacy_record_gets_defaults() {
        let legacy = json!({
            "id": "t1",
            "title": "Pay rent",
            "reminder": true,
            "reminderDate": "2030-01-01T09:00:00Z",
            "notificationId": "n-42",
            "createdAt": 1_700_000_123_000i64,
            "completed": false,
            "subtasks": [{ "id": 1, "title": "find checkbook" }],
            "tags": ["home", "home", " "]
        });
        let (task, migrated) = migrate_record(legacy, LOADED_AT).unwrap();
        assert!(migrated);
        assert_eq!(task.id, "t1");
        assert_eq!(task.status, TaskStatus::Todo);
        assert_eq!(task.priority, Priority::Medium);
        assert_eq!(task.category, DEFAULT_CATEGORY);
        assert_eq!(task.lead_times, DEFAULT_LEAD_TIMES.to_vec());
        assert_eq!(task.notification_ids, vec!["n-42".to_string()]);
        assert_eq!(task.reminder_date, Some(1_893_488_400));
        assert_eq!(task.created_at, 1_700_000_123);
        assert_eq!(task.updated_at, 1_700_000_123);
        assert_eq!(task.subtasks[0].id, "1");
        assert!(!task.subtasks[0].completed);
        assert_eq!(task.tags, vec!["home".to_string()]);
    }

    #[test]
    fn legacy_status_aliases_and_completed_flag_map_to_status() {
        let done = json!({ "id": "a", "title": "x", "status": "done", "completedAt": 1_700_000_000 });
        let (task, _) = migrate_record(done, LOADED_AT).unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.completed_at, Some(1_700_000_000));

        let flag = json!({ "id": "b", "title": "x", "completed": true });
        assert_eq!(
            migrate_record(flag, LOADED_AT).unwrap().0.status,
            TaskStatus::Completed
        );

        let progress = json!({ "id": "c", "title": "x", "status": "inProgress" });
        assert_eq!(
            migrate_record(progress, LOADED_AT).unwrap().0.status,
            TaskStatus::InProgress
        );

        let missing_created = json!({ "id": "d", "title": "x" });
        assert_eq!(migrate_record(missing_created, LOADED_AT).unwrap().0.created_at, LOADED_AT);
    }

    #[test]
    fn null_collections_in_legacy_records_fall_back_to_defaults() {
        let legacy = json!({
            "id": "a",
            "title": "Buy milk",
            "subtasks": null,
            "tags": null,
            "leadTimes": null,
            "reminderDate": null
        });
        let (task, migrated) = migrate_record(legacy, LOADED_AT).unwrap();
        assert!(migrated);
        assert_eq!(task.title, "Buy milk");
        assert!(task.subtasks.is_empty());
        assert!(task.tags.is_empty());
        assert_eq!(task.lead_times, DEFAULT_LEAD_TIMES.to_vec());
        assert_eq!(task.reminder_date, None);

        let with_subtask = json!({
            "id": "b",
            "title": "x",
            "subtasks": [{ "id": "s", "title": "y", "completed": null }]
        });
        let (task, _) = migrate_record(with_subtask, LOADED_AT).unwrap();
        assert!(!task.subtasks[0].completed);
    }

    #[test]
    fn extreme_legacy_timestamps_do_not_overflow() {
        let min = json!({ "id": "a", "title": "x", "createdAt": i64::MIN });
        assert_eq!(
            migrate_record(min, LOADED_AT).unwrap().0.created_at,
            i64::MIN / 1000
        );

        let text = json!({ "id": "b", "title": "x", "reminderDate": "-9223372036854775808" });
        assert_eq!(
            migrate_record(text, LOADED_AT).unwrap().0.reminder_date,
            Some(i64::MIN / 1000)
        );

        let float = json!({ "id": "c", "title": "x", "createdAt": -1e300 });
        assert_eq!(
            migrate_record(float, LOADED_AT).unwrap().0.created_at,
            i64::MIN / 1000
        );

        let max = json!({ "id": "d", "title": "x", "updatedAt": i64::MAX });
        assert_eq!(migrate_record(max, LOADED_AT).unwrap().0.updated_at, i64::MAX / 1000);
    }

    #[test]
    fn malformed_records_are_returned_for_quarantine() {
        let bad = json!({ "title": 12 });
        let raw = migrate_record(bad.clone(), LOADED_AT).unwrap_err();
        assert_eq!(raw, bad);
    }

    #[test]
    fn decode_accepts_all_envelopes_and_keeps_going_past_bad_records() {
        let current = json!({
            "schemaVersion": SCHEMA_VERSION,
            "tasks": [serde_json::to_value(sample_task("a")).unwrap()]
        });
        let decoded = decode_task_list(&serde_json::to_vec(&current).unwrap(), LOADED_AT).unwrap();
        assert_eq!(decoded.tasks.len(), 1);
        assert!(!decoded.changed());

        let persisted = json!({
            "state": { "tasks": [{ "id": "a", "title": "x" }, "garbage", { "id": "b", "title": "y" }] },
            "version": 0
        });
        let decoded =
            decode_task_list(&serde_json::to_vec(&persisted).unwrap(), LOADED_AT).unwrap();
        assert_eq!(decoded.tasks.len(), 2);
        assert_eq!(decoded.migrated, 2);
        assert_eq!(decoded.quarantined, vec![json!("garbage")]);
        assert!(decoded.changed());

        let bare = json!([{ "id": "a", "title": "x" }, { "id": "a", "title": "dup" }]);
        let decoded = decode_task_list(&serde_json::to_vec(&bare).unwrap(), LOADED_AT).unwrap();
        assert_eq!(decoded.tasks.len(), 1);
        assert_eq!(decoded.tasks[0].title, "x");
        assert!(decoded.legacy_envelope);
    }

    #[test]
    fn decode_rejects_unknown_envelopes_and_invalid_json() {
        assert!(matches!(
            decode_task_list(b"{\"foo\": 1}", LOADED_AT),
            Err(DecodeError::UnknownEnvelope)
        ));
        assert!(matches!(
            decode_task_list(b"{ not json", LOADED_AT),
            Err(DecodeError::Json(_))
        ));
    }
}
