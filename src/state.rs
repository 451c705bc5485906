use std::sync::{Arc, Mutex};

use crate::config::{normalize_settings, save_settings};
use crate::events::StatePayload;
use crate::labels::{resolve_language, Labels};
use crate::lifecycle::TaskLifecycle;
use crate::models::{Settings, Task};
use crate::scheduler::NotificationScheduler;
use crate::storage::{KeyValueStorage, StorageError};

/// Shared handle used by commands. One lock serializes every task operation.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<Mutex<AppData>>,
}

struct AppData {
    lifecycle: TaskLifecycle,
    settings: Settings,
    settings_storage: Box<dyn KeyValueStorage>,
}

impl AppState {
    pub fn new(
        mut lifecycle: TaskLifecycle,
        settings: Settings,
        settings_storage: Box<dyn KeyValueStorage>,
    ) -> Self {
        let settings = normalize_settings(settings);
        apply_to_scheduler(lifecycle.scheduler_mut(), &settings);
        Self {
            inner: Arc::new(Mutex::new(AppData {
                lifecycle,
                settings,
                settings_storage,
            })),
        }
    }

    pub fn with_lifecycle<T>(&self, f: impl FnOnce(&mut TaskLifecycle) -> T) -> T {
        let mut guard = self.inner.lock().expect("state poisoned");
        f(&mut guard.lifecycle)
    }

    pub fn tasks(&self) -> Vec<Task> {
        let guard = self.inner.lock().expect("state poisoned");
        guard.lifecycle.tasks().to_vec()
    }

    pub fn settings(&self) -> Settings {
        let guard = self.inner.lock().expect("state poisoned");
        guard.settings.clone()
    }

    pub fn snapshot(&self) -> StatePayload {
        let guard = self.inner.lock().expect("state poisoned");
        StatePayload {
            tasks: guard.lifecycle.tasks().to_vec(),
            settings: guard.settings.clone(),
        }
    }

    /// Persists normalized settings, then applies language and enablement to future
    /// scheduling. Already scheduled reminders are left alone.
    pub fn update_settings(&self, settings: Settings) -> Result<Settings, StorageError> {
        let settings = normalize_settings(settings);
        let mut guard = self.inner.lock().expect("state poisoned");
        save_settings(guard.settings_storage.as_ref(), &settings)?;
        apply_to_scheduler(guard.lifecycle.scheduler_mut(), &settings);
        guard.settings = settings.clone();
        log::info!(
            "settings updated language={} notifications_enabled={}",
            settings.language,
            settings.notifications_enabled
        );
        Ok(settings)
    }
}

fn apply_to_scheduler(scheduler: &mut NotificationScheduler, settings: &Settings) {
    scheduler.set_labels(Labels::new(resolve_language(&settings.language)));
    scheduler.set_enabled(settings.notifications_enabled);
}
