use tauri::plugin::PermissionState;
use tauri::{AppHandle, Emitter, Runtime};
use tauri_plugin_notification::NotificationExt;

use crate::events::{ReminderPayload, EVENT_REMINDER};
use crate::notify::{PendingNotification, Permission, PlatformError, Presenter};

/// Shows due reminders as OS notifications and tells the frontend which task fired.
pub struct TauriPresenter<R: Runtime> {
    app: AppHandle<R>,
}

impl<R: Runtime> TauriPresenter<R> {
    pub fn new(app: AppHandle<R>) -> Self {
        Self { app }
    }
}

impl<R: Runtime> Presenter for TauriPresenter<R> {
    fn request_permission(&self) -> Permission {
        let notification = self.app.notification();
        let state = match notification.permission_state() {
            Ok(PermissionState::Prompt) | Ok(PermissionState::PromptWithRationale) => {
                notification.request_permission()
            }
            other => other,
        };
        match state {
            Ok(PermissionState::Granted) => Permission::Granted,
            Ok(_) => Permission::Denied,
            Err(err) => {
                log::warn!("notification permission unavailable: {err}");
                Permission::Denied
            }
        }
    }

    fn present(&self, notification: &PendingNotification) -> Result<(), PlatformError> {
        self.app
            .notification()
            .builder()
            .title(&notification.content.title)
            .body(&notification.content.body)
            .show()
            .map_err(|err| PlatformError::new(err.to_string()))?;
        if let Err(err) = self
            .app
            .emit(EVENT_REMINDER, ReminderPayload::from(notification))
        {
            log::warn!(
                "failed to emit {EVENT_REMINDER} task_id={}: {err}",
                notification.content.payload.task_id
            );
        }
        Ok(())
    }
}
