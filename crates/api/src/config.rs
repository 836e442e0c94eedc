use std::path::PathBuf;
use std::str::FromStr;

use chrono::Duration;
use marquee_core::alignment::SlotCadence;
use marquee_pipeline::config::GenerationConfig;
use marquee_pipeline::now_playing::DEFAULT_PLAYER_URL;

/// Which store backs the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Postgres,
    /// In-process store; content is lost on restart.
    Memory,
}

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `3000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `30`).
    pub request_timeout_secs: u64,
    pub store: StoreKind,
    /// Required when `store` is [`StoreKind::Postgres`].
    pub database_url: Option<String>,
    /// Directory holding the placeholder and other static assets.
    pub static_dir: PathBuf,
    pub generation: GenerationConfig,
    /// Internal generation scheduler period; `None` leaves generation to
    /// external triggers.
    pub generate_interval_secs: Option<u64>,
    pub retention_hours: i64,
    /// Bearer token for the now-playing probe; `None` disables it.
    pub now_playing_token: Option<String>,
    pub now_playing_url: String,
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                 |
    /// |--------------------------|-------------------------|
    /// | `HOST`                   | `0.0.0.0`               |
    /// | `PORT`                   | `3000`                  |
    /// | `CORS_ORIGINS`           | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`   | `30`                    |
    /// | `STORE`                  | `postgres`              |
    /// | `DATABASE_URL`           | required for postgres   |
    /// | `RENDER_DIR`             | `render`                |
    /// | `STATIC_DIR`             | `static`                |
    /// | `SLOT_CADENCE_SECS`      | `12`                    |
    /// | `ANIMATION_LENGTH_SECS`  | `15`                    |
    /// | `SEGMENT_WINDOW_SECS`    | `90`                    |
    /// | `FRAME_INTERVAL_MS`      | `100`                   |
    /// | `LOOKAHEAD_SECS`         | `1800`                  |
    /// | `LOCK_TTL_SECS`          | `300`                   |
    /// | `GENERATE_INTERVAL_SECS` | unset                   |
    /// | `RETENTION_HOURS`        | `4`                     |
    /// | `NOW_PLAYING_TOKEN`      | unset                   |
    /// | `NOW_PLAYING_URL`        | Spotify player endpoint |
    ///
    /// Panics on malformed values; misconfiguration should fail fast.
    pub fn from_env() -> Self {
        let host = std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let port: u16 = env_parse("PORT", 3000);

        let cors_origins: Vec<String> = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:5173".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 = env_parse("REQUEST_TIMEOUT_SECS", 30);

        let store = match std::env::var("STORE").as_deref() {
            Ok("memory") => StoreKind::Memory,
            Ok("postgres") | Err(_) => StoreKind::Postgres,
            Ok(other) => panic!("STORE must be 'postgres' or 'memory', got '{other}'"),
        };
        let database_url = std::env::var("DATABASE_URL").ok();

        let cadence = SlotCadence::new(env_parse("SLOT_CADENCE_SECS", 12))
            .unwrap_or_else(|e| panic!("SLOT_CADENCE_SECS: {e}"));
        let defaults = GenerationConfig::default();
        let generation = GenerationConfig {
            cadence,
            animation_length: Duration::seconds(env_parse("ANIMATION_LENGTH_SECS", 15)),
            segment_window: Duration::seconds(env_parse("SEGMENT_WINDOW_SECS", 90)),
            frame_interval: Duration::milliseconds(env_parse("FRAME_INTERVAL_MS", 100)),
            render_dir: std::env::var("RENDER_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.render_dir.clone()),
            lookahead: Duration::seconds(env_parse("LOOKAHEAD_SECS", 1800)),
            lock_ttl: Duration::seconds(env_parse("LOCK_TTL_SECS", 300)),
            ..defaults
        };
        if let Err(e) = generation.validate() {
            panic!("Invalid generation settings: {e}");
        }

        let generate_interval_secs = std::env::var("GENERATE_INTERVAL_SECS").ok().map(|v| {
            v.parse()
                .expect("GENERATE_INTERVAL_SECS must be a valid u64")
        });

        Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            store,
            database_url,
            static_dir: std::env::var("STATIC_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("static")),
            generation,
            generate_interval_secs,
            retention_hours: env_parse("RETENTION_HOURS", 4),
            now_playing_token: std::env::var("NOW_PLAYING_TOKEN")
                .ok()
                .filter(|t| !t.is_empty()),
            now_playing_url: std::env::var("NOW_PLAYING_URL")
                .unwrap_or_else(|_| DEFAULT_PLAYER_URL.into()),
        }
    }

    /// How long animations and render files are kept.
    pub fn retention(&self) -> Duration {
        Duration::hours(self.retention_hours)
    }
}

/// Parse `name` from the environment, falling back to `default` when unset.
fn env_parse<T>(name: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .unwrap_or_else(|e| panic!("{name} must be a valid number: {e}")),
        Err(_) => default,
    }
}
