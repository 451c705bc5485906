use crate::events::StatePayload;
#[cfg(all(feature = "app", not(test)))]
use crate::events::EVENT_STATE_UPDATED;
use crate::lifecycle::{LifecycleError, TaskLifecycle};
use crate::models::{Settings, Task, TaskDraft, TaskPatch};
use crate::state::AppState;

#[cfg(all(feature = "app", not(test)))]
use tauri::{AppHandle, Emitter, Runtime, State};

#[derive(Debug, serde::Serialize)]
pub struct CommandResult<T> {
    pub ok: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

trait CommandCtx {
    fn emit_state_updated(&self, payload: StatePayload);
}

fn ok<T>(data: T) -> CommandResult<T> {
    CommandResult {
        ok: true,
        data: Some(data),
        error: None,
    }
}

fn err<T>(message: &str) -> CommandResult<T> {
    CommandResult {
        ok: false,
        data: None,
        error: Some(message.to_string()),
    }
}

fn publish(ctx: &impl CommandCtx, state: &AppState) {
    ctx.emit_state_updated(state.snapshot());
}

/// Runs a task mutation and broadcasts the new state when it succeeds.
fn mutate_task(
    ctx: &impl CommandCtx,
    state: &AppState,
    op: impl FnOnce(&mut TaskLifecycle) -> Result<Task, LifecycleError>,
) -> CommandResult<Task> {
    let (result, dirty) = state.with_lifecycle(|lifecycle| {
        let result = op(lifecycle);
        (result, lifecycle.is_dirty())
    });
    match result {
        Ok(task) => {
            if dirty {
                log::warn!("task {} changed but is not yet persisted", task.id);
            }
            publish(ctx, state);
            ok(task)
        }
        Err(error) => err(&error.to_string()),
    }
}

#[cfg(all(feature = "app", not(test)))]
struct TauriCommandCtx<'a, R: Runtime> {
    app: &'a AppHandle<R>,
}

#[cfg(all(feature = "app", not(test)))]
impl<R: Runtime> CommandCtx for TauriCommandCtx<'_, R> {
    fn emit_state_updated(&self, payload: StatePayload) {
        let _ = self.app.emit(EVENT_STATE_UPDATED, payload);
    }
}

/// Also retries a pending write so a reload after a disk error converges.
fn load_state_impl(state: &AppState) -> CommandResult<StatePayload> {
    state.with_lifecycle(|lifecycle| {
        if lifecycle.is_dirty() {
            if let Err(error) = lifecycle.flush() {
                log::warn!("task list still not persisted: {error}");
            }
        }
    });
    ok(state.snapshot())
}

fn create_task_impl(ctx: &impl CommandCtx, state: &AppState, draft: TaskDraft) -> CommandResult<Task> {
    mutate_task(ctx, state, |lifecycle| lifecycle.add_task(draft))
}

fn update_task_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    task_id: String,
    patch: TaskPatch,
) -> CommandResult<Task> {
    mutate_task(ctx, state, |lifecycle| lifecycle.update_task(&task_id, patch))
}

fn toggle_task_impl(ctx: &impl CommandCtx, state: &AppState, task_id: String) -> CommandResult<Task> {
    mutate_task(ctx, state, |lifecycle| lifecycle.toggle_task(&task_id))
}

fn delete_task_impl(ctx: &impl CommandCtx, state: &AppState, task_id: String) -> CommandResult<bool> {
    let removed = state.with_lifecycle(|lifecycle| lifecycle.remove_task(&task_id));
    if removed {
        publish(ctx, state);
    }
    ok(removed)
}

fn reorder_tasks_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    task_ids: Vec<String>,
) -> CommandResult<bool> {
    let reordered = state.with_lifecycle(|lifecycle| lifecycle.reorder_tasks(&task_ids));
    if reordered {
        publish(ctx, state);
    }
    ok(reordered)
}

fn add_subtask_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    task_id: String,
    title: String,
) -> CommandResult<Task> {
    mutate_task(ctx, state, |lifecycle| lifecycle.add_subtask(&task_id, &title))
}

fn toggle_subtask_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    task_id: String,
    subtask_id: String,
) -> CommandResult<Task> {
    mutate_task(ctx, state, |lifecycle| {
        lifecycle.toggle_subtask(&task_id, &subtask_id)
    })
}

fn remove_subtask_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    task_id: String,
    subtask_id: String,
) -> CommandResult<Task> {
    mutate_task(ctx, state, |lifecycle| {
        lifecycle.remove_subtask(&task_id, &subtask_id)
    })
}

fn update_settings_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    settings: Settings,
) -> CommandResult<Settings> {
    match state.update_settings(settings) {
        Ok(settings) => {
            publish(ctx, state);
            ok(settings)
        }
        Err(error) => err(&format!("storage error: {error}")),
    }
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn load_state(state: State<AppState>) -> CommandResult<StatePayload> {
    load_state_impl(state.inner())
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn create_task(app: AppHandle, state: State<AppState>, draft: TaskDraft) -> CommandResult<Task> {
    let ctx = TauriCommandCtx { app: &app };
    create_task_impl(&ctx, state.inner(), draft)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn update_task(
    app: AppHandle,
    state: State<AppState>,
    task_id: String,
    patch: TaskPatch,
) -> CommandResult<Task> {
    let ctx = TauriCommandCtx { app: &app };
    update_task_impl(&ctx, state.inner(), task_id, patch)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn toggle_task(app: AppHandle, state: State<AppState>, task_id: String) -> CommandResult<Task> {
    let ctx = TauriCommandCtx { app: &app };
    toggle_task_impl(&ctx, state.inner(), task_id)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn delete_task(app: AppHandle, state: State<AppState>, task_id: String) -> CommandResult<bool> {
    let ctx = TauriCommandCtx { app: &app };
    delete_task_impl(&ctx, state.inner(), task_id)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn reorder_tasks(
    app: AppHandle,
    state: State<AppState>,
    task_ids: Vec<String>,
) -> CommandResult<bool> {
    let ctx = TauriCommandCtx { app: &app };
    reorder_tasks_impl(&ctx, state.inner(), task_ids)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn add_subtask(
    app: AppHandle,
    state: State<AppState>,
    task_id: String,
    title: String,
) -> CommandResult<Task> {
    let ctx = TauriCommandCtx { app: &app };
    add_subtask_impl(&ctx, state.inner(), task_id, title)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn toggle_subtask(
    app: AppHandle,
    state: State<AppState>,
    task_id: String,
    subtask_id: String,
) -> CommandResult<Task> {
    let ctx = TauriCommandCtx { app: &app };
    toggle_subtask_impl(&ctx, state.inner(), task_id, subtask_id)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn remove_subtask(
    app: AppHandle,
    state: State<AppState>,
    task_id: String,
    subtask_id: String,
) -> CommandResult<Task> {
    let ctx = TauriCommandCtx { app: &app };
    remove_subtask_impl(&ctx, state.inner(), task_id, subtask_id)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn update_settings(
    app: AppHandle,
    state: State<AppState>,
    settings: Settings,
) -> CommandResult<Settings> {
    let ctx = TauriCommandCtx { app: &app };
    update_settings_impl(&ctx, state.inner(), settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TaskStatus;
    use crate::state::tests::{make_state, NOW};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TestCtx {
        emitted: Mutex<Vec<StatePayload>>,
    }

    impl TestCtx {
        fn emitted(&self) -> usize {
            self.emitted.lock().unwrap().len()
        }
    }

    impl CommandCtx for TestCtx {
        fn emit_state_updated(&self, payload: StatePayload) {
            self.emitted.lock().unwrap().push(payload);
        }
    }

    fn draft(title: &str) -> TaskDraft {
        TaskDraft {
            title: title.to_string(),
            reminder: true,
            reminder_date: Some(NOW + 3600),
            lead_times: vec![10],
            ..TaskDraft::default()
        }
    }

    #[test]
    fn create_emits_state_and_returns_the_task() {
        let ctx = TestCtx::default();
        let (state, platform, _) = make_state(Settings::default());

        let res = create_task_impl(&ctx, &state, draft("Pay rent"));
        assert!(res.ok);
        let task = res.data.unwrap();
        assert_eq!(task.notification_ids.len(), 1);
        assert_eq!(platform.scheduled().len(), 1);

        let emitted = ctx.emitted.lock().unwrap();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].tasks, vec![task]);
    }

    #[test]
    fn validation_errors_are_reported_without_emitting() {
        let ctx = TestCtx::default();
        let (state, _, _) = make_state(Settings::default());

        let res = create_task_impl(&ctx, &state, draft("   "));
        assert!(!res.ok);
        assert_eq!(res.error.as_deref(), Some("title is required"));

        let res = toggle_task_impl(&ctx, &state, "missing".into());
        assert!(!res.ok);
        assert_eq!(res.error.as_deref(), Some("task not found: missing"));
        assert_eq!(ctx.emitted(), 0);
    }

    #[test]
    fn toggle_and_update_route_through_the_lifecycle() {
        let ctx = TestCtx::default();
        let (state, platform, _) = make_state(Settings::default());
        let task = create_task_impl(&ctx, &state, draft("Pay rent")).data.unwrap();

        let done = toggle_task_impl(&ctx, &state, task.id.clone()).data.unwrap();
        assert_eq!(done.status, TaskStatus::Completed);
        assert!(done.notification_ids.is_empty());
        assert_eq!(platform.cancelled(), task.notification_ids);

        let res = update_task_impl(
            &ctx,
            &state,
            task.id.clone(),
            TaskPatch {
                title: Some("Pay rent now".into()),
                ..TaskPatch::default()
            },
        );
        assert!(res.ok);
        assert!(res.data.unwrap().notification_ids.is_empty());
        assert_eq!(ctx.emitted(), 3);
    }

    #[test]
    fn delete_and_reorder_report_no_ops() {
        let ctx = TestCtx::default();
        let (state, platform, _) = make_state(Settings::default());
        let a = create_task_impl(&ctx, &state, draft("a")).data.unwrap();
        let b = create_task_impl(&ctx, &state, draft("b")).data.unwrap();

        let res = reorder_tasks_impl(&ctx, &state, vec![a.id.clone(), b.id.clone()]);
        assert_eq!(res.data, Some(true));
        assert_eq!(state.tasks()[0].id, a.id);

        let res = reorder_tasks_impl(&ctx, &state, vec!["ghost".into()]);
        assert!(res.ok);
        assert_eq!(res.data, Some(false));

        assert_eq!(delete_task_impl(&ctx, &state, a.id.clone()).data, Some(true));
        assert_eq!(delete_task_impl(&ctx, &state, a.id.clone()).data, Some(false));
        assert_eq!(platform.cancelled(), a.notification_ids);
        // Two creates, one reorder, one delete.
        assert_eq!(ctx.emitted(), 4);
    }

    #[test]
    fn subtask_commands() {
        let ctx = TestCtx::default();
        let (state, _, _) = make_state(Settings::default());
        let task = create_task_impl(&ctx, &state, draft("a")).data.unwrap();

        let with_sub = add_subtask_impl(&ctx, &state, task.id.clone(), "step".into())
            .data
            .unwrap();
        let sub_id = with_sub.subtasks[0].id.clone();
        let toggled = toggle_subtask_impl(&ctx, &state, task.id.clone(), sub_id.clone())
            .data
            .unwrap();
        assert!(toggled.subtasks[0].completed);
        let removed = remove_subtask_impl(&ctx, &state, task.id.clone(), sub_id.clone())
            .data
            .unwrap();
        assert!(removed.subtasks.is_empty());

        let res = remove_subtask_impl(&ctx, &state, task.id, sub_id);
        assert!(!res.ok);
        assert!(res.error.unwrap().starts_with("subtask not found"));
    }

    #[test]
    fn settings_update_and_load_state() {
        let ctx = TestCtx::default();
        let (state, _, _) = make_state(Settings::default());
        let res = update_settings_impl(
            &ctx,
            &state,
            Settings {
                language: "EN".into(),
                notifications_enabled: false,
                dispatch_interval_secs: 3,
            },
        );
        assert!(res.ok);
        assert_eq!(res.data.unwrap().language, "en");
        assert_eq!(ctx.emitted(), 1);

        let loaded = load_state_impl(&state).data.unwrap();
        assert!(!loaded.settings.notifications_enabled);
        assert!(loaded.tasks.is_empty());
    }
}
