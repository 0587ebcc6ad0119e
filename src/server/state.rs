use std::sync::Arc;
use std::time::Instant;

use crate::auth::JwtValidator;
use crate::config::Settings;
use crate::connection_manager::ConnectionManager;
use crate::digest::DigestQueue;
use crate::notification::{
    LoggingSender, MemoryNotificationRepository, NotificationDispatcher, NotificationRepository,
    OutboundSender,
};
use crate::preferences::PreferenceStore;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub jwt_validator: Arc<JwtValidator>,
    pub connection_manager: Arc<ConnectionManager>,
    pub preferences: Arc<PreferenceStore>,
    pub repository: Arc<dyn NotificationRepository>,
    pub digest_queue: Arc<DigestQueue>,
    pub outbound: Arc<dyn OutboundSender>,
    pub dispatcher: Arc<NotificationDispatcher>,
    pub start_time: Instant,
}

impl AppState {
    /// State with the in-memory repository and the logging sender
    pub fn new(settings: Settings) -> Self {
        Self::with_backends(
            settings,
            Arc::new(MemoryNotificationRepository::default()),
            Arc::new(LoggingSender),
        )
    }

    pub fn with_backends(
        settings: Settings,
        repository: Arc<dyn NotificationRepository>,
        outbound: Arc<dyn OutboundSender>,
    ) -> Self {
        let jwt_validator = Arc::new(JwtValidator::new(&settings.jwt));
        let connection_manager = Arc::new(ConnectionManager::new());
        let preferences = Arc::new(PreferenceStore::new());
        let digest_queue = Arc::new(DigestQueue::new(settings.digest.max_per_bucket));
        let dispatcher = Arc::new(NotificationDispatcher::new(
            preferences.clone(),
            repository.clone(),
            connection_manager.clone(),
            digest_queue.clone(),
            outbound.clone(),
        ));

        tracing::info!(
            repository = repository.backend_type(),
            outbound = outbound.name(),
            "Application state initialized"
        );

        Self {
            settings: Arc::new(settings),
            jwt_validator,
            connection_manager,
            preferences,
            repository,
            digest_queue,
            outbound,
            dispatcher,
            start_time: Instant::now(),
        }
    }
}
