use crate::config::AppConfig;
use crate::db::SqliteStore;
use crate::services::events::LifecycleEventSink;

pub struct AppState {
    pub store: SqliteStore,
    pub config: AppConfig,
    pub events: Box<dyn LifecycleEventSink>,
}
