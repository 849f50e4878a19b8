// Configuration for the raise/handle engine
//
// Process-wide settings, installed once and read on every raise and every
// cause-chain walk.

use once_cell::sync::OnceCell;
use sling_error::{Result, SlingError};

/// Environment variable selecting the stack trace capture mode
pub const ENV_STACK_TRACES: &str = "SLING_STACK_TRACES";
/// Environment variable overriding the cause-chain depth cap
pub const ENV_MAX_CAUSE_DEPTH: &str = "SLING_MAX_CAUSE_DEPTH";

/// Text used when a non-error payload is raised without a message
pub const DEFAULT_MESSAGE: &str = "object raised";

static CONFIG: OnceCell<SlingConfig> = OnceCell::new();

/// When to capture a stack trace at a raise site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceCapture {
    /// Opt-out: capture only if `RUST_BACKTRACE`/`RUST_LIB_BACKTRACE` ask for it
    Auto,
    /// Always capture (default)
    Force,
    /// Opt-out: never capture
    Off,
}

impl std::str::FromStr for TraceCapture {
    type Err = SlingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(TraceCapture::Auto),
            "force" | "1" | "on" | "full" => Ok(TraceCapture::Force),
            "off" | "0" | "none" => Ok(TraceCapture::Off),
            other => Err(SlingError::invalid_config(ENV_STACK_TRACES, other)),
        }
    }
}

/// Configuration for the raise/handle engine
#[derive(Debug, Clone)]
pub struct SlingConfig {
    /// Stack trace capture mode for raises
    pub stack_traces: TraceCapture,

    /// Maximum number of links the resolver follows down a cause chain
    pub max_cause_depth: usize,

    /// Message prefix for payloads raised without a message
    pub default_message: String,
}

impl Default for SlingConfig {
    fn default() -> Self {
        Self {
            stack_traces: TraceCapture::Force,
            max_cause_depth: 128,
            default_message: DEFAULT_MESSAGE.to_string(),
        }
    }
}

impl SlingConfig {
    /// Create a new configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults overridden by `SLING_STACK_TRACES` and `SLING_MAX_CAUSE_DEPTH`
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(mode) = lookup(ENV_STACK_TRACES) {
            config.stack_traces = mode.parse()?;
        }
        if let Some(depth) = lookup(ENV_MAX_CAUSE_DEPTH) {
            config.max_cause_depth = depth
                .trim()
                .parse()
                .map_err(|_| SlingError::invalid_config(ENV_MAX_CAUSE_DEPTH, depth.clone()))?;
        }
        Ok(config)
    }

    /// Set the stack trace capture mode
    pub fn with_stack_traces(mut self, mode: TraceCapture) -> Self {
        self.stack_traces = mode;
        self
    }

    /// Set the cause-chain depth cap
    pub fn with_max_cause_depth(mut self, depth: usize) -> Self {
        self.max_cause_depth = depth;
        self
    }

    /// Set the default message prefix
    pub fn with_default_message(mut self, message: impl Into<String>) -> Self {
        self.default_message = message.into();
        self
    }
}

/// Install the process configuration. Fails if one is already in use.
pub fn init(config: SlingConfig) -> Result<()> {
    CONFIG.set(config).map_err(|_| SlingError::AlreadyConfigured)?;
    tracing::debug!(config = ?get(), "sling configuration installed");
    Ok(())
}

/// The process configuration, defaults if none was installed.
pub fn get() -> &'static SlingConfig {
    CONFIG.get_or_init(SlingConfig::default)
}
