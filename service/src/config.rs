use clap::builder::TypedValueParser as _;
use clap::Parser;
use dotenvy::dotenv;
use log::LevelFilter;
use sse::PipelineOptions;
use std::ffi::OsString;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Backend revision reported in `Meta` events when none is configured.
pub const DEFAULT_BACKEND_REVISION: &str = env!("CARGO_PKG_VERSION");

#[derive(Clone, Debug, PartialEq)]
pub enum RustEnv {
    Development,
    Production,
    Staging,
}

#[derive(Debug, PartialEq, Eq)]
pub struct RustEnvParseError;

impl FromStr for RustEnv {
    type Err = RustEnvParseError;
    fn from_str(level: &str) -> Result<RustEnv, Self::Err> {
        match level.to_lowercase().as_str() {
            "development" => Ok(RustEnv::Development),
            "production" => Ok(RustEnv::Production),
            "staging" => Ok(RustEnv::Staging),
            _ => Err(RustEnvParseError),
        }
    }
}

impl fmt::Display for RustEnv {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            RustEnv::Development => write!(f, "development"),
            RustEnv::Production => write!(f, "production"),
            RustEnv::Staging => write!(f, "staging"),
        }
    }
}

#[derive(Clone, Debug, Parser)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// A list of full CORS origin URLs that allowed to receive server responses.
    #[arg(
        long,
        env,
        value_delimiter = ',',
        use_value_delimiter = true,
        default_value = "http://localhost:3000,https://localhost:3000"
    )]
    pub allowed_origins: Vec<String>,

    /// The host interface to listen for incoming connections
    #[arg(short, long, env, default_value = "127.0.0.1")]
    pub interface: Option<String>,

    /// The host TCP port to listen for incoming connections
    #[arg(short, long, env, default_value_t = 4000)]
    pub port: u16,

    /// Set the log level verbosity threshold (level) to control what gets displayed on console output
    #[arg(
        short,
        long,
        env,
        default_value_t = LevelFilter::Info,
        value_parser = clap::builder::PossibleValuesParser::new(["OFF", "ERROR", "WARN", "INFO", "DEBUG", "TRACE"])
            .map(|s| s.parse::<LevelFilter>().unwrap()),
        )]
    pub log_level_filter: LevelFilter,

    /// Set the Rust runtime environment to use.
    #[arg(
    short,
    long,
    env,
    default_value_t = RustEnv::Development,
    value_parser = clap::builder::PossibleValuesParser::new([
        "DEVELOPMENT", "PRODUCTION", "STAGING",
        "development", "production", "staging"
    ])
        .map(|s| s.parse::<RustEnv>().unwrap()),
    )]
    pub runtime_env: RustEnv,

    /// Seconds between heartbeat events pushed to every connected client
    #[arg(long, env, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    pub heartbeat_interval_secs: u64,

    /// Seconds between polls of the frontend version endpoint
    #[arg(long, env, default_value_t = 60, value_parser = clap::value_parser!(u64).range(1..))]
    pub version_poll_interval_secs: u64,

    /// URL returning the latest frontend version as plain text. When unset,
    /// the backend revision is reported as the frontend version.
    #[arg(long, env)]
    version_url: Option<String>,

    /// The backend revision reported to clients in version events
    #[arg(long, env, default_value = DEFAULT_BACKEND_REVISION)]
    pub backend_revision: String,

    /// The build date reported to clients in version events
    #[arg(long, env, default_value = "unknown")]
    pub build_date: String,

    /// Events buffered per client on the global channel before the oldest are dropped
    #[arg(long, env, default_value_t = sse::DEFAULT_GLOBAL_CHANNEL_CAPACITY)]
    pub global_channel_capacity: usize,

    /// Events buffered per client on its private channel before the oldest are dropped
    #[arg(long, env, default_value_t = sse::DEFAULT_SESSION_CHANNEL_CAPACITY)]
    pub session_channel_capacity: usize,

    /// Deliver the first event of a new stream without re-checking auth,
    /// since the stream was authenticated when it was opened.
    #[arg(long, env, default_value_t = true, action = clap::ArgAction::Set)]
    pub sse_skip_initial_auth_check: bool,

    /// Milliseconds a submitted task takes before its completion is announced
    #[arg(long, env, default_value_t = 1000)]
    pub task_completion_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    pub fn new() -> Self {
        // Load .env file first
        dotenv().ok();
        // Then parse the command line parameters and flags
        Config::parse()
    }

    /// Parse from an explicit argument list, ignoring the process arguments
    /// and `.env`. The first item is the program name.
    pub fn try_from_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        Config::try_parse_from(args)
    }

    pub fn interface(&self) -> &str {
        self.interface.as_deref().unwrap_or("127.0.0.1")
    }

    pub fn version_url(&self) -> Option<&str> {
        self.version_url.as_deref()
    }

    pub fn set_version_url(mut self, version_url: String) -> Self {
        self.version_url = Some(version_url);
        self
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn version_poll_interval(&self) -> Duration {
        Duration::from_secs(self.version_poll_interval_secs)
    }

    pub fn task_completion_delay(&self) -> Duration {
        Duration::from_millis(self.task_completion_delay_ms)
    }

    pub fn pipeline_options(&self) -> PipelineOptions {
        PipelineOptions {
            skip_first_auth_check: self.sse_skip_initial_auth_check,
        }
    }

    pub fn runtime_env(&self) -> RustEnv {
        self.runtime_env.clone()
    }

    pub fn is_production(&self) -> bool {
        self.runtime_env() == RustEnv::Production
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        let mut argv = vec!["push_events_rs"];
        argv.extend_from_slice(args);
        Config::try_from_args(argv).unwrap()
    }

    #[test]
    fn test_defaults() {
        let config = parse(&[]);
        assert_eq!(config.port, 4000);
        assert_eq!(config.interface(), "127.0.0.1");
        assert_eq!(config.heartbeat_interval(), Duration::from_secs(30));
        assert_eq!(config.version_poll_interval(), Duration::from_secs(60));
        assert_eq!(config.version_url(), None);
        assert_eq!(config.backend_revision, DEFAULT_BACKEND_REVISION);
        assert!(config.pipeline_options().skip_first_auth_check);
        assert!(!config.is_production());
    }

    #[test]
    fn test_initial_auth_bypass_can_be_disabled() {
        let config = parse(&["--sse-skip-initial-auth-check", "false"]);
        assert!(!config.pipeline_options().skip_first_auth_check);
    }

    #[test]
    fn test_zero_heartbeat_interval_is_rejected() {
        let result = Config::try_from_args(["push_events_rs", "--heartbeat-interval-secs", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_runtime_env_is_case_insensitive() {
        let config = parse(&["--runtime-env", "PRODUCTION"]);
        assert!(config.is_production());
        assert_eq!(config.runtime_env().to_string(), "production");
    }

    #[test]
    fn test_set_version_url() {
        let config = parse(&[]).set_version_url("http://localhost:3000/version".to_string());
        assert_eq!(config.version_url(), Some("http://localhost:3000/version"));
    }
}
