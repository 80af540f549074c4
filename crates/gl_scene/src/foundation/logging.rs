//! Logging utilities and structured logging support

pub use log::{debug, error, info, trace, warn};

use crate::config::SceneConfig;

/// Initialize the logging system from `RUST_LOG`
pub fn init() {
    env_logger::init();
}

/// Initialize logging with a default filter (e.g. `"info"` or `"gl_scene=debug"`)
///
/// `RUST_LOG` still wins when it is set. Calling this more than once is harmless;
/// later calls are ignored.
pub fn init_with_level(level: &str) {
    if builder(env_logger::Env::default(), level).try_init().is_err() {
        log::trace!("Logger already initialized, keeping existing configuration");
    }
}

/// Initialize logging with the filter from [`SceneConfig::log_level`]
pub fn init_from_config(config: &SceneConfig) {
    init_with_level(&config.log_level);
}

fn builder(env: env_logger::Env<'_>, level: &str) -> env_logger::Builder {
    let mut builder = env_logger::Builder::from_env(env.default_filter_or(level.to_string()));
    builder.format_timestamp_millis();
    builder
}
