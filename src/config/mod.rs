mod settings;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{LoggingSettings, NotificationSettings, RealtimeSettings, Settings};

/// Prefix for environment overrides, e.g. `TOURNEYSYNC__REALTIME__URL`.
pub const ENV_PREFIX: &str = "TOURNEYSYNC";

/// Loads the configuration from the default file and environment variables
/// Merges the configuration with default values
/// Returns a `Settings` struct containing the realtime, notification and logging configurations
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from("config/default")
}

/// Same as [`load_config`] but reading the optional file at `path` (extension inferred).
pub fn load_config_from(path: &str) -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        );

    let config = builder.build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(merge(partial, Settings::default()))
}

fn merge(partial: PartialSettings, default: Settings) -> Settings {
    let realtime = partial.realtime;
    let notifications = partial.notifications;
    let logging = partial.logging;

    Settings {
        realtime: RealtimeSettings {
            url: realtime
                .as_ref()
                .and_then(|r| r.url.clone())
                .unwrap_or(default.realtime.url),
            reconnect_attempts: realtime
                .as_ref()
                .and_then(|r| r.reconnect_attempts)
                .unwrap_or(default.realtime.reconnect_attempts),
            reconnect_delay_ms: realtime
                .as_ref()
                .and_then(|r| r.reconnect_delay_ms)
                .unwrap_or(default.realtime.reconnect_delay_ms),
            reconnect_delay_max_ms: realtime
                .as_ref()
                .and_then(|r| r.reconnect_delay_max_ms)
                .unwrap_or(default.realtime.reconnect_delay_max_ms),
        },
        notifications: NotificationSettings {
            debounce_ms: notifications
                .as_ref()
                .and_then(|n| n.debounce_ms)
                .unwrap_or(default.notifications.debounce_ms),
            default_duration_ms: notifications
                .as_ref()
                .and_then(|n| n.default_duration_ms)
                .unwrap_or(default.notifications.default_duration_ms),
        },
        logging: LoggingSettings {
            level: logging
                .as_ref()
                .and_then(|l| l.level.clone())
                .unwrap_or(default.logging.level),
        },
    }
}
