use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationContent {
    pub title: String,
    pub body: String,
    pub task_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    After(Duration),
    At(OffsetDateTime),
}

impl Trigger {
    /// Time left until the trigger; zero when already past.
    pub fn delay_from(&self, now: OffsetDateTime) -> Duration {
        match *self {
            Trigger::After(d) => d,
            Trigger::At(at) => Duration::try_from(at - now).unwrap_or(Duration::ZERO),
        }
    }
}

/// Local notification capability provided by the host platform.
#[async_trait]
pub trait NotificationPlatform: Send + Sync {
    async fn request_permission(&self) -> anyhow::Result<PermissionStatus>;
    async fn schedule(&self, content: NotificationContent, trigger: Trigger) -> anyhow::Result<String>;
    /// Unknown or already delivered ids are not an error.
    async fn cancel(&self, id: &str) -> anyhow::Result<()>;
}

/// A notification that reached its trigger time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    pub id: String,
    pub content: NotificationContent,
}

/// In-process platform: each notification is a tokio task sleeping until its
/// trigger, then published on a broadcast channel.
pub struct TokioPlatform {
    granted: bool,
    pending: Arc<Mutex<HashMap<String, JoinHandle<()>>>>,
    delivered: broadcast::Sender<Delivered>,
}

impl TokioPlatform {
    pub fn new(granted: bool) -> Self {
        let (delivered, _) = broadcast::channel(64);
        Self {
            granted,
            pending: Arc::new(Mutex::new(HashMap::new())),
            delivered,
        }
    }

}

#[cfg(test)]
impl TokioPlatform {
    pub fn subscribe(&self) -> broadcast::Receiver<Delivered> {
        self.delivered.subscribe()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }
}

#[async_trait]
impl NotificationPlatform for TokioPlatform {
    async fn request_permission(&self) -> anyhow::Result<PermissionStatus> {
        Ok(if self.granted {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        })
    }

    async fn schedule(&self, content: NotificationContent, trigger: Trigger) -> anyhow::Result<String> {
        if !self.granted {
            anyhow::bail!("notification permission not granted");
        }

        let id = Uuid::new_v4().to_string();
        let delay = trigger.delay_from(OffsetDateTime::now_utc());
        let pending = Arc::clone(&self.pending);
        let sender = self.delivered.clone();

        // Held across spawn + insert so the task cannot remove itself first.
        let mut map = pending
            .lock()
            .map_err(|_| anyhow::anyhow!("notification registry poisoned"))?;
        let task_id = id.clone();
        let handle = tokio::spawn({
            let pending = Arc::clone(&pending);
            async move {
                tokio::time::sleep(delay).await;
                if let Ok(mut map) = pending.lock() {
                    map.remove(&task_id);
                }
                info!(id = %task_id, task_id = content.task_id, title = %content.title, body = %content.body, "notification delivered");
                // no subscribers is fine
                let _ = sender.send(Delivered { id: task_id, content });
            }
        });
        map.insert(id.clone(), handle);

        debug!(%id, delay_ms = delay.as_millis() as u64, "notification scheduled");
        Ok(id)
    }

    async fn cancel(&self, id: &str) -> anyhow::Result<()> {
        let handle = self
            .pending
            .lock()
            .map_err(|_| anyhow::anyhow!("notification registry poisoned"))?
            .remove(id);
        if let Some(handle) = handle {
            handle.abort();
            debug!(id, "notification cancelled");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(title: &str) -> NotificationContent {
        NotificationContent {
            title: title.into(),
            body: "body".into(),
            task_id: 1,
        }
    }

    #[test]
    fn past_trigger_has_no_delay() {
        let now = OffsetDateTime::now_utc();
        let past = Trigger::At(now - time::Duration::hours(1));
        assert_eq!(past.delay_from(now), Duration::ZERO);
        let future = Trigger::At(now + time::Duration::seconds(90));
        assert_eq!(future.delay_from(now), Duration::from_secs(90));
    }

    #[tokio::test(start_paused = true)]
    async fn delivers_after_delay() {
        let platform = TokioPlatform::new(true);
        let mut rx = platform.subscribe();

        let id = platform
            .schedule(content("Task Created"), Trigger::After(Duration::from_secs(2)))
            .await
            .unwrap();
        assert_eq!(platform.pending_count(), 1);

        let delivered = rx.recv().await.unwrap();
        assert_eq!(delivered.id, id);
        assert_eq!(delivered.content.title, "Task Created");
        assert_eq!(platform.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_notification_never_fires() {
        let platform = TokioPlatform::new(true);
        let mut rx = platform.subscribe();

        let doomed = platform
            .schedule(content("doomed"), Trigger::After(Duration::from_secs(5)))
            .await
            .unwrap();
        platform
            .schedule(content("kept"), Trigger::After(Duration::from_secs(10)))
            .await
            .unwrap();
        platform.cancel(&doomed).await.unwrap();

        let delivered = rx.recv().await.unwrap();
        assert_eq!(delivered.content.title, "kept");

        // cancelling unknown or delivered ids is a no-op
        platform.cancel(&doomed).await.unwrap();
        platform.cancel("does-not-exist").await.unwrap();
    }

    #[tokio::test]
    async fn denied_platform_refuses_to_schedule() {
        let platform = TokioPlatform::new(false);
        assert_eq!(
            platform.request_permission().await.unwrap(),
            PermissionStatus::Denied
        );
        assert!(platform
            .schedule(content("x"), Trigger::After(Duration::ZERO))
            .await
            .is_err());
    }
}
