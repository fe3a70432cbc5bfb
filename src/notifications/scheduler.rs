use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use time::{OffsetDateTime, UtcOffset};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::config::NotifyConfig;
use crate::notifications::platform::{NotificationContent, NotificationPlatform, PermissionStatus, Trigger};
use crate::tasks::services::parse_due_date;

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification permission denied")]
    PermissionDenied,

    #[error("invalid due date: {0:?}")]
    InvalidDueDate(String),

    #[error("notification platform: {0:#}")]
    Platform(anyhow::Error),

    #[error("task {0} was deleted")]
    TaskDeleted(i64),
}

pub const PERMISSION_WARNING: &str = "You need to enable notifications to receive task reminders";

/// Task reminders on top of a [`NotificationPlatform`]. Remembers the pending
/// reminder per task so a reschedule or delete can cancel it.
pub struct NotificationScheduler {
    platform: Arc<dyn NotificationPlatform>,
    offset: UtcOffset,
    reminder_hour: u8,
    created_delay: Duration,
    permission: OnceCell<bool>,
    reminders: Mutex<Reminders>,
}

#[derive(Default)]
struct Reminders {
    by_task: HashMap<i64, String>,
    /// Deleted tasks. Task ids are never reused.
    forgotten: HashSet<i64>,
}

impl NotificationScheduler {
    pub fn new(platform: Arc<dyn NotificationPlatform>, cfg: &NotifyConfig) -> Self {
        let offset = UtcOffset::from_hms(cfg.utc_offset_hours, 0, 0).unwrap_or(UtcOffset::UTC);
        Self {
            platform,
            offset,
            reminder_hour: cfg.reminder_hour,
            created_delay: Duration::from_secs(cfg.created_delay_secs),
            permission: OnceCell::new(),
            reminders: Mutex::new(Reminders::default()),
        }
    }

    /// True when granted. The platform is asked once; the answer is kept.
    /// Denial is reported as a warning, never an error. A failed request is
    /// not remembered and will be retried.
    pub async fn request_permission(&self) -> bool {
        let asked = self
            .permission
            .get_or_try_init(|| async {
                self.platform.request_permission().await.map(|status| match status {
                    PermissionStatus::Granted => true,
                    PermissionStatus::Denied => {
                        warn!("{PERMISSION_WARNING}");
                        false
                    }
                })
            })
            .await;
        match asked {
            Ok(granted) => *granted,
            Err(e) => {
                warn!(error = %e, "permission request failed");
                false
            }
        }
    }

    /// Due date in local time with the hour replaced; minutes and seconds kept.
    pub fn reminder_time(&self, due_date: &str) -> Result<OffsetDateTime, NotifyError> {
        let due = parse_due_date(due_date).ok_or_else(|| NotifyError::InvalidDueDate(due_date.into()))?;
        due.to_offset(self.offset)
            .replace_hour(self.reminder_hour)
            .map_err(|_| NotifyError::InvalidDueDate(due_date.into()))
    }

    /// Schedules the due-day reminder, then the "created" notice after a short
    /// delay. Returns the reminder id. A failed notice is logged and does not
    /// undo the reminder.
    pub async fn schedule_task_reminder(
        &self,
        task_id: i64,
        title: &str,
        due_date: &str,
    ) -> Result<String, NotifyError> {
        let at = self.reminder_time(due_date)?;
        if !self.request_permission().await {
            return Err(NotifyError::PermissionDenied);
        }
        if self.is_forgotten(task_id) {
            return Err(NotifyError::TaskDeleted(task_id));
        }

        let reminder_id = self
            .platform
            .schedule(
                NotificationContent {
                    title: "Task Reminder".into(),
                    body: format!("Task \"{title}\" is due today!"),
                    task_id,
                },
                Trigger::At(at),
            )
            .await
            .map_err(NotifyError::Platform)?;

        // The task may have been deleted while the platform call was pending.
        let previous = match self.reminders.lock() {
            Ok(r) if r.forgotten.contains(&task_id) => None,
            Ok(mut r) => Some(r.by_task.insert(task_id, reminder_id.clone())),
            Err(_) => Some(None),
        };
        let Some(previous) = previous else {
            debug!(task_id, %reminder_id, "task deleted while scheduling");
            self.cancel_task_reminder(&reminder_id).await;
            return Err(NotifyError::TaskDeleted(task_id));
        };
        if let Some(previous) = previous {
            self.cancel_task_reminder(&previous).await;
        }

        if let Err(e) = self
            .platform
            .schedule(
                NotificationContent {
                    title: "Task Created".into(),
                    body: format!("New task \"{title}\" has been created"),
                    task_id,
                },
                Trigger::After(self.created_delay),
            )
            .await
        {
            warn!(task_id, error = %e, "created notice not scheduled");
        }

        info!(task_id, %reminder_id, %at, "reminder scheduled");
        Ok(reminder_id)
    }

    /// Best effort; failures are logged.
    pub async fn cancel_task_reminder(&self, notification_id: &str) {
        if let Ok(mut reminders) = self.reminders.lock() {
            reminders.by_task.retain(|_, id| id != notification_id);
        }
        match self.platform.cancel(notification_id).await {
            Ok(()) => debug!(notification_id, "reminder cancelled"),
            Err(e) => warn!(notification_id, error = %e, "reminder cancel failed"),
        }
    }

    /// Cancels whatever reminder is pending for a deleted task, including one
    /// still being scheduled.
    pub async fn forget_task(&self, task_id: i64) {
        let pending = self.reminders.lock().ok().and_then(|mut r| {
            r.forgotten.insert(task_id);
            r.by_task.remove(&task_id)
        });
        if let Some(id) = pending {
            self.cancel_task_reminder(&id).await;
        }
    }

    fn is_forgotten(&self, task_id: i64) -> bool {
        self.reminders
            .lock()
            .map(|r| r.forgotten.contains(&task_id))
            .unwrap_or(false)
    }

    #[cfg(test)]
    pub fn reminder_for(&self, task_id: i64) -> Option<String> {
        self.reminders
            .lock()
            .ok()
            .and_then(|r| r.by_task.get(&task_id).cloned())
    }
}
