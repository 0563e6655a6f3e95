use crate::error::{Error, ErrorKind};
use crate::message::{Event, VersionMeta};
use crate::Manager;
use async_trait::async_trait;
use log::*;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

pub const DEFAULT_VERSION_POLL_INTERVAL: Duration = Duration::from_secs(60);

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Source of the latest released frontend version.
#[async_trait]
pub trait VersionProvider: Send + Sync {
    async fn latest_version(&self) -> Result<String, Error>;
}

#[async_trait]
impl<T: VersionProvider + ?Sized> VersionProvider for Box<T> {
    async fn latest_version(&self) -> Result<String, Error> {
        (**self).latest_version().await
    }
}

/// Reads the latest version as a plain-text body from an HTTP endpoint.
pub struct HttpVersionProvider {
    client: reqwest::Client,
    url: String,
}

impl HttpVersionProvider {
    pub fn new(url: impl Into<String>) -> Result<Self, Error> {
        let client = reqwest::Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl VersionProvider for HttpVersionProvider {
    async fn latest_version(&self) -> Result<String, Error> {
        let response = self.client.get(&self.url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::new(ErrorKind::UnexpectedStatus(status.as_u16())));
        }

        let body = response.text().await?;
        Ok(body.trim().to_string())
    }
}

/// Always reports the same version. Used when no version endpoint is configured.
pub struct StaticVersionProvider(pub String);

#[async_trait]
impl VersionProvider for StaticVersionProvider {
    async fn latest_version(&self) -> Result<String, Error> {
        Ok(self.0.clone())
    }
}

/// Turns raw provider polls into `VersionMeta` values, distinct until changed.
pub struct VersionWatcher<P> {
    provider: P,
    revision: String,
    build_date: String,
    last_seen: Option<String>,
}

impl<P: VersionProvider> VersionWatcher<P> {
    pub fn new(provider: P, revision: impl Into<String>, build_date: impl Into<String>) -> Self {
        Self {
            provider,
            revision: revision.into(),
            build_date: build_date.into(),
            last_seen: None,
        }
    }

    /// Poll the provider once. Returns a value only when the version differs
    /// from the last successful poll. Failures are logged and yield `None`
    /// without touching the last seen value.
    pub async fn poll_once(&mut self) -> Option<VersionMeta> {
        let version = match self.provider.latest_version().await {
            Ok(version) => version,
            Err(e) => {
                warn!("Failed to poll latest frontend version: {e}");
                return None;
            }
        };

        if self.last_seen.as_deref() == Some(version.as_str()) {
            trace!("Frontend version unchanged ({version})");
            return None;
        }

        info!("Frontend version changed to {version}");
        self.last_seen = Some(version.clone());
        Some(VersionMeta {
            revision: self.revision.clone(),
            latest_frontend_version: version,
            build_date: self.build_date.clone(),
        })
    }
}

/// Polls a [`VersionProvider`] on an interval and publishes a global
/// `Meta` event whenever the version changes.
pub struct VersionSource<P> {
    watcher: VersionWatcher<P>,
    manager: Arc<Manager>,
    interval: Duration,
}

impl<P: VersionProvider + 'static> VersionSource<P> {
    pub fn new(watcher: VersionWatcher<P>, manager: Arc<Manager>, interval: Duration) -> Self {
        Self {
            watcher,
            manager,
            interval: interval.max(Duration::from_millis(1)),
        }
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("Starting version source, polling every {:?}", self.interval);

        // The first tick fires immediately so clients learn the version on startup.
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let polled = tokio::select! {
                        _ = shutdown.cancelled() => break,
                        polled = self.watcher.poll_once() => polled,
                    };
                    if let Some(meta) = polled {
                        self.manager.publish_global(Event::VersionMeta(meta));
                    }
                }
            }
        }

        info!("Version source stopped");
    }
}
