// Learn more about Tauri commands at https://tauri.app/develop/calling-rust/
mod commands;
pub mod config;
#[cfg(all(feature = "app", not(test)))]
mod desktop;
pub mod events;
pub mod labels;
pub mod lifecycle;
pub mod logging;
pub mod migrate;
pub mod models;
pub mod notify;
pub mod scheduler;
pub mod state;
pub mod storage;
pub mod store;
#[cfg(test)]
mod test_support;

#[cfg(all(feature = "app", not(test)))]
use std::sync::Arc;

#[cfg(all(feature = "app", not(test)))]
use tauri::Manager;

#[cfg(all(feature = "app", not(test)))]
use crate::commands::*;

#[cfg_attr(mobile, tauri::mobile_entry_point)]
#[cfg(all(feature = "app", not(test)))]
pub fn run() {
    use crate::desktop::TauriPresenter;
    use crate::labels::{resolve_language, Labels};
    use crate::lifecycle::TaskLifecycle;
    use crate::notify::LocalTimerPlatform;
    use crate::scheduler::{run_dispatcher, NotificationScheduler};
    use crate::state::AppState;
    use crate::storage::FileStorage;
    use crate::store::TaskStore;

    tauri::Builder::default()
        .plugin(tauri_plugin_notification::init())
        .setup(|app| {
            let data_dir = match app.path().app_data_dir() {
                Ok(dir) => dir,
                Err(err) => config::data_dir().ok_or(err)?,
            };
            if let Err(err) = logging::init_logging(&data_dir) {
                eprintln!("failed to initialize logging: {err}");
            }
            log::info!(
                "starting lifeos tasks data_dir={} log={}",
                data_dir.display(),
                logging::log_file_path(&data_dir).display()
            );

            let storage = FileStorage::new(data_dir);
            storage.ensure_dirs()?;
            let settings = config::load_settings(&storage);

            let platform =
                LocalTimerPlatform::new(Arc::new(TauriPresenter::new(app.handle().clone())));
            let scheduler = NotificationScheduler::new(
                Arc::new(platform.clone()),
                Labels::new(resolve_language(&settings.language)),
            );
            let store = TaskStore::load(Box::new(storage.clone()), chrono::Utc::now().timestamp());
            let lifecycle = TaskLifecycle::new(store, scheduler);
            let state = AppState::new(lifecycle, settings.clone(), Box::new(storage));
            // Handles from the previous process are gone with its timer table.
            state.with_lifecycle(|lifecycle| lifecycle.restore_reminders());
            app.manage(state);

            tauri::async_runtime::spawn(run_dispatcher(
                platform,
                settings.dispatch_interval_secs,
            ));
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            load_state,
            create_task,
            update_task,
            toggle_task,
            delete_task,
            reorder_tasks,
            add_subtask,
            toggle_subtask,
            remove_subtask,
            update_settings,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
