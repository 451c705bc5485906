use serde_json::Value;

use crate::migrate::{decode_task_list, SCHEMA_VERSION};
use crate::models::{Task, TasksFile, Timestamp};
use crate::storage::{KeyValueStorage, StorageError};

pub const TASKS_KEY: &str = "lifeos.tasks";
pub const QUARANTINE_KEY: &str = "lifeos.tasks.quarantine";
/// Raw copy of a task list that could not be decoded at all.
pub const CORRUPT_KEY: &str = "lifeos.tasks.corrupt";

/// Ordered task list (newest first) mirrored to one storage key.
///
/// A failed write keeps the in-memory list authoritative and marks the store dirty; the next
/// mutation or [`TaskStore::flush`] rewrites the whole list.
pub struct TaskStore {
    storage: Box<dyn KeyValueStorage>,
    tasks: Vec<Task>,
    dirty: bool,
}

impl TaskStore {
    pub fn load(storage: Box<dyn KeyValueStorage>, loaded_at: Timestamp) -> Self {
        let mut store = Self {
            storage,
            tasks: Vec::new(),
            dirty: false,
        };

        let bytes = match store.storage.get(TASKS_KEY) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return store,
            Err(err) => {
                log::error!("failed to read task list, starting empty: {err}");
                return store;
            }
        };

        match decode_task_list(&bytes, loaded_at) {
            Ok(decoded) => {
                let changed = decoded.changed();
                if !decoded.quarantined.is_empty() {
                    store.quarantine(decoded.quarantined);
                }
                store.tasks = decoded.tasks;
                if changed {
                    log::info!(
                        "task list migrated: tasks={} migrated={}",
                        store.tasks.len(),
                        decoded.migrated
                    );
                    store.persist();
                }
            }
            Err(err) => {
                log::error!("task list unreadable, keeping a copy and starting empty: {err}");
                if let Err(err) = store.storage.set(CORRUPT_KEY, &bytes) {
                    log::error!("failed to keep corrupt task list: {err}");
                }
            }
        }
        store
    }

    pub fn list(&self) -> &[Task] {
        &self.tasks
    }

    pub fn find(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn tasks_file(&self) -> TasksFile {
        TasksFile {
            schema_version: SCHEMA_VERSION,
            tasks: self.tasks.clone(),
        }
    }

    /// Inserts at the front when the id is new, otherwise replaces the record in place.
    pub fn upsert(&mut self, task: Task) {
        match self.tasks.iter_mut().find(|existing| existing.id == task.id) {
            Some(existing) => *existing = task,
            None => self.tasks.insert(0, task),
        }
        self.persist();
    }

    /// Replaces known records in place with a single write; unknown ids are ignored.
    pub fn replace_many(&mut self, tasks: Vec<Task>) {
        if tasks.is_empty() {
            return;
        }
        for task in tasks {
            if let Some(existing) = self.tasks.iter_mut().find(|existing| existing.id == task.id) {
                *existing = task;
            }
        }
        self.persist();
    }

    pub fn remove(&mut self, id: &str) -> Option<Task> {
        let index = self.tasks.iter().position(|task| task.id == id)?;
        let removed = self.tasks.remove(index);
        self.persist();
        Some(removed)
    }

    /// Puts `ids` (a subsequence of the list in a new relative order) back into the slots they
    /// occupied. Unknown or repeated ids leave the list untouched and return `false`.
    pub fn reorder(&mut self, ids: &[String]) -> bool {
        let mut slots = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(index) = self.tasks.iter().position(|task| &task.id == id) else {
                log::debug!("reorder ignored: unknown id={id}");
                return false;
            };
            if slots.contains(&index) {
                log::debug!("reorder ignored: repeated id={id}");
                return false;
            }
            slots.push(index);
        }
        if slots.is_empty() {
            return true;
        }

        let moved: Vec<Task> = slots.iter().map(|&index| self.tasks[index].clone()).collect();
        slots.sort_unstable();
        for (slot, task) in slots.into_iter().zip(moved) {
            self.tasks[slot] = task;
        }
        self.persist();
        true
    }

    pub fn flush(&mut self) -> Result<(), StorageError> {
        self.write()?;
        self.dirty = false;
        Ok(())
    }

    fn persist(&mut self) {
        match self.write() {
            Ok(()) => self.dirty = false,
            Err(err) => {
                self.dirty = true;
                log::error!("failed to persist task list: {err}");
            }
        }
    }

    fn write(&self) -> Result<(), StorageError> {
        let json = serde_json::to_vec_pretty(&self.tasks_file())?;
        self.storage.set(TASKS_KEY, &json)
    }

    fn quarantine(&self, records: Vec<Value>) {
        let mut kept: Vec<Value> = match self.storage.get(QUARANTINE_KEY) {
            Ok(Some(bytes)) => serde_json::from_slice(&bytes).unwrap_or_default(),
            _ => Vec::new(),
        };
        log::warn!("quarantining {} malformed task record(s)", records.len());
        kept.extend(records);
        let result = serde_json::to_vec_pretty(&kept)
            .map_err(StorageError::from)
            .and_then(|json| self.storage.set(QUARANTINE_KEY, &json));
        if let Err(err) = result {
            log::error!("failed to write quarantined records: {err}");
        }
    }
}
