//! Coordinator configuration.
//!
//! Every knob has a default matching the behaviour the UI layer was tuned
//! for. Values can come from YAML/JSON documents (millisecond fields) and be
//! overridden from the environment:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `FRESHLINE_TTL_MS` | `ttl` |
//! | `FRESHLINE_HOVER_DELAY_MS` | `hover_delay` |
//! | `FRESHLINE_SEARCH_DEBOUNCE_MS` | `search_debounce` |
//! | `FRESHLINE_ROOT_MARGIN_PX` | `root_margin_px` |
//! | `FRESHLINE_VISIBILITY_THRESHOLD` | `visibility_threshold` |

use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_TTL: Duration = Duration::from_millis(300_000);
pub const DEFAULT_HOVER_DELAY: Duration = Duration::from_millis(300);
pub const DEFAULT_SEARCH_DEBOUNCE: Duration = Duration::from_millis(300);
pub const DEFAULT_ROOT_MARGIN_PX: u32 = 200;
pub const DEFAULT_VISIBILITY_THRESHOLD: f64 = 0.1;

#[derive(Debug, Clone, PartialEq)]
pub struct CoordinatorConfig {
    /// How long a `Ready` cache entry stays fresh.
    pub ttl: Duration,
    /// Sustained hover/focus time before a prefetch fires.
    pub hover_delay: Duration,
    /// Quiet period before a typed query is sent.
    pub search_debounce: Duration,
    /// Early-trigger zone around the scroll sentinel.
    pub root_margin_px: u32,
    /// Fraction of the sentinel that must be visible.
    pub visibility_threshold: f64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            hover_delay: DEFAULT_HOVER_DELAY,
            search_debounce: DEFAULT_SEARCH_DEBOUNCE,
            root_margin_px: DEFAULT_ROOT_MARGIN_PX,
            visibility_threshold: DEFAULT_VISIBILITY_THRESHOLD,
        }
    }
}

/// Wire form: durations as integer milliseconds, every field optional.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct RawConfig {
    ttl_ms: u64,
    hover_delay_ms: u64,
    search_debounce_ms: u64,
    root_margin_px: u32,
    visibility_threshold: f64,
}

impl Default for RawConfig {
    fn default() -> Self {
        CoordinatorConfig::default().into()
    }
}

impl From<CoordinatorConfig> for RawConfig {
    fn from(c: CoordinatorConfig) -> Self {
        Self {
            ttl_ms: millis(c.ttl),
            hover_delay_ms: millis(c.hover_delay),
            search_debounce_ms: millis(c.search_debounce),
            root_margin_px: c.root_margin_px,
            visibility_threshold: c.visibility_threshold,
        }
    }
}

impl From<RawConfig> for CoordinatorConfig {
    fn from(r: RawConfig) -> Self {
        Self {
            ttl: Duration::from_millis(r.ttl_ms),
            hover_delay: Duration::from_millis(r.hover_delay_ms),
            search_debounce: Duration::from_millis(r.search_debounce_ms),
            root_margin_px: r.root_margin_px,
            visibility_threshold: r.visibility_threshold,
        }
    }
}

impl Serialize for CoordinatorConfig {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        RawConfig::from(self.clone()).serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CoordinatorConfig {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        RawConfig::deserialize(deserializer).map(Into::into)
    }
}

impl CoordinatorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_hover_delay(mut self, delay: Duration) -> Self {
        self.hover_delay = delay;
        self
    }

    pub fn with_search_debounce(mut self, debounce: Duration) -> Self {
        self.search_debounce = debounce;
        self
    }

    pub fn with_root_margin_px(mut self, px: u32) -> Self {
        self.root_margin_px = px;
        self
    }

    pub fn with_visibility_threshold(mut self, threshold: f64) -> Self {
        self.visibility_threshold = threshold;
        self
    }

    /// Parse a YAML (or JSON) document and validate it.
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        let cfg: Self = serde_yaml::from_str(s)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&content)
    }

    /// Defaults with environment overrides applied.
    pub fn from_env() -> Result<Self> {
        let cfg = Self::default().apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn apply_env_overrides(mut self) -> Self {
        if let Some(ms) = env_value::<u64>("FRESHLINE_TTL_MS") {
            self.ttl = Duration::from_millis(ms);
        }
        if let Some(ms) = env_value::<u64>("FRESHLINE_HOVER_DELAY_MS") {
            self.hover_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = env_value::<u64>("FRESHLINE_SEARCH_DEBOUNCE_MS") {
            self.search_debounce = Duration::from_millis(ms);
        }
        if let Some(px) = env_value::<u32>("FRESHLINE_ROOT_MARGIN_PX") {
            self.root_margin_px = px;
        }
        if let Some(t) = env_value::<f64>("FRESHLINE_VISIBILITY_THRESHOLD") {
            self.visibility_threshold = t;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("ttl_ms", self.ttl),
            ("hover_delay_ms", self.hover_delay),
            ("search_debounce_ms", self.search_debounce),
        ] {
            if value.is_zero() {
                return Err(Error::configuration_with_context(
                    "duration must be greater than zero",
                    ErrorContext::new()
                        .with_field_path(field)
                        .with_source("coordinator_config"),
                ));
            }
        }
        if !(0.0..=1.0).contains(&self.visibility_threshold) {
            return Err(Error::configuration_with_context(
                "visibility threshold must be within 0.0..=1.0",
                ErrorContext::new()
                    .with_field_path("visibility_threshold")
                    .with_details(format!("got {}", self.visibility_threshold))
                    .with_source("coordinator_config"),
            ));
        }
        Ok(())
    }

    pub fn observe_options(&self) -> ObserveOptions {
        ObserveOptions {
            root_margin_px: self.root_margin_px,
            threshold: self.visibility_threshold,
        }
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn env_value<T: FromStr>(key: &str) -> Option<T> {
    let raw = std::env::var(key).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!(variable = key, value = %raw, "ignoring unparsable override");
            None
        }
    }
}

/// Options handed to a visibility notifier when a sentinel is observed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObserveOptions {
    pub root_margin_px: u32,
    pub threshold: f64,
}

impl Default for ObserveOptions {
    fn default() -> Self {
        CoordinatorConfig::default().observe_options()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = CoordinatorConfig::default();
        assert_eq!(cfg.ttl, Duration::from_secs(300));
        assert_eq!(cfg.hover_delay, Duration::from_millis(300));
        assert_eq!(cfg.search_debounce, Duration::from_millis(300));
        assert_eq!(cfg.root_margin_px, 200);
        assert_eq!(cfg.visibility_threshold, 0.1);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let cfg = CoordinatorConfig::from_yaml_str("ttl_ms: 5000\nroot_margin_px: 50\n").unwrap();
        assert_eq!(cfg.ttl, Duration::from_millis(5000));
        assert_eq!(cfg.root_margin_px, 50);
        assert_eq!(cfg.hover_delay, DEFAULT_HOVER_DELAY);
    }

    #[test]
    fn test_from_file() {
        let path = std::env::temp_dir().join(format!("freshline-config-{}.yaml", std::process::id()));
        std::fs::write(&path, "ttl_ms: 5000\nhover_delay_ms: 150\nvisibility_threshold: 0.25\n").unwrap();
        let loaded = CoordinatorConfig::from_file(&path);
        std::fs::remove_file(&path).unwrap();

        let cfg = loaded.unwrap();
        assert_eq!(cfg.ttl, Duration::from_millis(5000));
        assert_eq!(cfg.hover_delay, Duration::from_millis(150));
        assert_eq!(cfg.visibility_threshold, 0.25);
        assert_eq!(cfg.search_debounce, DEFAULT_SEARCH_DEBOUNCE);
    }

    #[test]
    fn test_from_missing_file_is_io_error() {
        let path = std::env::temp_dir().join("freshline-config-does-not-exist.yaml");
        assert!(matches!(CoordinatorConfig::from_file(&path), Err(Error::Io(_))));
    }

    #[test]
    fn test_huge_durations_saturate() {
        let cfg = CoordinatorConfig::new().with_ttl(Duration::MAX);
        let raw = RawConfig::from(cfg);
        assert_eq!(raw.ttl_ms, u64::MAX);
        assert_eq!(raw.hover_delay_ms, 300);
    }

    #[test]
    fn test_json_is_accepted() {
        let cfg = CoordinatorConfig::from_yaml_str(r#"{"search_debounce_ms": 150}"#).unwrap();
        assert_eq!(cfg.search_debounce, Duration::from_millis(150));
    }

    #[test]
    fn test_zero_duration_rejected() {
        let err = CoordinatorConfig::from_yaml_str("hover_delay_ms: 0").unwrap_err();
        let ctx = err.context().unwrap();
        assert_eq!(ctx.field_path.as_deref(), Some("hover_delay_ms"));
    }

    #[test]
    fn test_threshold_out_of_range_rejected() {
        let cfg = CoordinatorConfig::new().with_visibility_threshold(1.5);
        assert!(matches!(cfg.validate(), Err(Error::Configuration { .. })));
    }

    #[test]
    fn test_env_overrides() {
        std::env::set_var("FRESHLINE_SEARCH_DEBOUNCE_MS", "120");
        std::env::set_var("FRESHLINE_ROOT_MARGIN_PX", "not-a-number");
        let cfg = CoordinatorConfig::default().apply_env_overrides();
        std::env::remove_var("FRESHLINE_SEARCH_DEBOUNCE_MS");
        std::env::remove_var("FRESHLINE_ROOT_MARGIN_PX");
        assert_eq!(cfg.search_debounce, Duration::from_millis(120));
        assert_eq!(cfg.root_margin_px, DEFAULT_ROOT_MARGIN_PX);
    }

    #[test]
    fn test_observe_options() {
        let opts = CoordinatorConfig::new()
            .with_root_margin_px(80)
            .with_visibility_threshold(0.5)
            .observe_options();
        assert_eq!(opts.root_margin_px, 80);
        assert_eq!(opts.threshold, 0.5);
    }
}
