use crate::config::{AppConfig, NotifyConfig};
use crate::db::PgKvStore;
use crate::notifications::{NotificationPlatform, NotificationScheduler, TokioPlatform};
use crate::records::RecordStore;
use crate::storage::{KvStore, MemoryKvStore};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<RecordStore>,
    pub notifier: Arc<NotificationScheduler>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let kv = match config.database_url.as_deref() {
            Some(url) => {
                let pg = PgKvStore::connect(url).await?;
                if let Err(e) = sqlx::migrate!("./migrations").run(pg.pool()).await {
                    tracing::warn!(error = %e, "migration failed; continuing");
                }
                Arc::new(pg) as Arc<dyn KvStore>
            }
            None => {
                tracing::warn!("DATABASE_URL not set; records live in memory only");
                Arc::new(MemoryKvStore::new()) as Arc<dyn KvStore>
            }
        };

        let store = Arc::new(RecordStore::new(
            kv,
            Duration::from_millis(config.storage_timeout_ms),
        ));
        store.initialize().await?;

        let platform = Arc::new(TokioPlatform::new(config.notify.enabled)) as Arc<dyn NotificationPlatform>;
        let notifier = Arc::new(NotificationScheduler::new(platform, &config.notify));
        notifier.request_permission().await;

        Ok(Self {
            config,
            store,
            notifier,
        })
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        store: Arc<RecordStore>,
        notifier: Arc<NotificationScheduler>,
    ) -> Self {
        Self {
            config,
            store,
            notifier,
        }
    }

    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            host: "127.0.0.1".into(),
            port: 0,
            database_url: None,
            storage_timeout_ms: 1000,
            notify: NotifyConfig::default(),
        });
        let store = Arc::new(RecordStore::new(
            Arc::new(MemoryKvStore::new()),
            Duration::from_millis(config.storage_timeout_ms),
        ));
        let notifier = Arc::new(NotificationScheduler::new(
            Arc::new(TokioPlatform::new(true)),
            &config.notify,
        ));
        Self::from_parts(config, store, notifier)
    }
}
