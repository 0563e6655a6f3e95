use config::Config;
use events::EventPublisher;
use log::info;
use sessions::SessionStore;
use sse::domain_event_handler::SseDomainEventHandler;
use sse::Manager;
use std::sync::Arc;

pub mod config;
pub mod logging;
pub mod sessions;

// Service-level state shared by every request handler and background task
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub sse_manager: Arc<Manager>,
    pub event_publisher: EventPublisher,
    pub sessions: Arc<SessionStore>,
}

impl AppState {
    pub fn new(app_config: Config) -> Self {
        info!(
            "Event bus config: global_channel_capacity={}, session_channel_capacity={}",
            app_config.global_channel_capacity, app_config.session_channel_capacity,
        );

        let sse_manager = Arc::new(Manager::with_capacity(
            app_config.global_channel_capacity,
            app_config.session_channel_capacity,
        ));
        let event_publisher = EventPublisher::new()
            .with_handler(Arc::new(SseDomainEventHandler::new(sse_manager.clone())));

        Self {
            config: app_config,
            sse_manager,
            event_publisher,
            sessions: Arc::new(SessionStore::new()),
        }
    }
}
