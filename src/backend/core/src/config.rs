//! Configuration management.

use serde::Deserialize;
use std::time::Duration;

use crate::telemetry::TelemetryConfig;
use crate::timeline::{LaneGeometry, TimeInterval, DEFAULT_INTERVAL_PX, DEFAULT_MIN_INTERVALS, DEFAULT_WIDTH};

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    /// Where scheduler stream messages come from
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Timeline layout defaults
    #[serde(default)]
    pub timeline: TimelineConfig,

    /// Live view timers
    #[serde(default)]
    pub view: ViewConfig,

    #[serde(default)]
    pub observability: TelemetryConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// HTTP server host
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngestConfig {
    /// Path of a JSON-lines stream, or `-` for stdin
    #[serde(default = "default_source")]
    pub source: String,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            source: default_source(),
        }
    }
}

impl IngestConfig {
    pub fn reads_stdin(&self) -> bool {
        self.source == "-"
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TimelineConfig {
    /// Overview interval: `hour`, `minute`, `second`, `day` or milliseconds
    #[serde(default)]
    pub default_interval: TimeInterval,

    /// Pixels per interval
    #[serde(default = "default_interval_px")]
    pub interval_px: u32,

    #[serde(default = "default_min_intervals")]
    pub min_intervals: u32,

    /// Viewport width used when a request does not name one
    #[serde(default = "default_width")]
    pub default_width: u32,

    #[serde(default)]
    pub geometry: LaneGeometry,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            default_interval: TimeInterval::default(),
            interval_px: default_interval_px(),
            min_intervals: default_min_intervals(),
            default_width: default_width(),
            geometry: LaneGeometry::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ViewConfig {
    #[serde(default = "default_resize_debounce", with = "humantime_serde")]
    pub resize_debounce: Duration,

    #[serde(default = "default_filter_debounce", with = "humantime_serde")]
    pub filter_debounce: Duration,

    /// How often the live view checks for a pending redraw
    #[serde(default = "default_render_poll", with = "humantime_serde")]
    pub render_poll: Duration,

    /// Forced redraw period as a fraction of the interval
    #[serde(default = "default_redraw_factor")]
    pub redraw_factor: f64,

    #[serde(default = "default_redraw_floor", with = "humantime_serde")]
    pub redraw_floor: Duration,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            resize_debounce: default_resize_debounce(),
            filter_debounce: default_filter_debounce(),
            render_poll: default_render_poll(),
            redraw_factor: default_redraw_factor(),
            redraw_floor: default_redraw_floor(),
        }
    }
}

impl ViewConfig {
    /// Period of the forced full redraw for `interval`: never below the floor.
    pub fn redraw_period(&self, interval: TimeInterval) -> Duration {
        let scaled = interval.as_std().mul_f64(self.redraw_factor.max(0.0));
        scaled.max(self.redraw_floor)
    }
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8080 }
fn default_source() -> String { "-".to_string() }
fn default_interval_px() -> u32 { DEFAULT_INTERVAL_PX }
fn default_min_intervals() -> u32 { DEFAULT_MIN_INTERVALS }
fn default_width() -> u32 { DEFAULT_WIDTH }
fn default_resize_debounce() -> Duration { Duration::from_millis(100) }
fn default_filter_debounce() -> Duration { Duration::from_millis(300) }
fn default_render_poll() -> Duration { Duration::from_millis(500) }
fn default_redraw_factor() -> f64 { 0.95 }
fn default_redraw_floor() -> Duration { Duration::from_secs(5) }

impl Config {
    /// Load configuration from the environment.
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("JOBSCOPE").separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }

    /// Load from a specific file path, with the environment layered on top.
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("JOBSCOPE").separator("__"))
            .build()?;

        let cfg: Config = config.try_deserialize()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_need_no_sources() {
        let config = Config::default();
        assert_eq!(config.server.port, 8080);
        assert!(config.ingest.reads_stdin());
        assert_eq!(config.timeline.default_interval, TimeInterval::HOUR);
        assert_eq!(config.view.render_poll, Duration::from_millis(500));
    }

    #[test]
    fn test_redraw_period_has_floor() {
        let view = ViewConfig::default();
        assert_eq!(
            view.redraw_period(TimeInterval::HOUR),
            Duration::from_secs(3420)
        );
        assert_eq!(
            view.redraw_period(TimeInterval::MINUTE),
            Duration::from_secs(57)
        );
        assert_eq!(
            view.redraw_period(TimeInterval::SECOND),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
[server]
port = 9191

[ingest]
source = "/var/log/scheduler.jsonl"

[timeline]
default_interval = "minute"
interval_px = 40

[view]
filter_debounce = "250ms"
"#
        )
        .unwrap();

        let config = Config::from_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.server.port, 9191);
        assert!(!config.ingest.reads_stdin());
        assert_eq!(config.timeline.default_interval, TimeInterval::MINUTE);
        assert_eq!(config.timeline.interval_px, 40);
        assert_eq!(config.timeline.min_intervals, DEFAULT_MIN_INTERVALS);
        assert_eq!(config.view.filter_debounce, Duration::from_millis(250));
        assert_eq!(config.view.resize_debounce, Duration::from_millis(100));
    }
}
