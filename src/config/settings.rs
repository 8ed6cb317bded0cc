use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration settings for the application.
///
/// Groups the realtime connection, notification sequencing and logging settings.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub realtime: RealtimeSettings,
    pub notifications: NotificationSettings,
    pub logging: LoggingSettings,
}

/// Configuration of the shared realtime connection.
///
/// The reconnect fields bound how hard the transport retries before it gives
/// up and leaves the connection disconnected.
#[derive(Debug, Deserialize, Clone)]
pub struct RealtimeSettings {
    pub url: String,
    pub reconnect_attempts: u32,
    pub reconnect_delay_ms: u64,
    pub reconnect_delay_max_ms: u64,
}

/// Notification sequencing parameters.
#[derive(Debug, Deserialize, Clone)]
pub struct NotificationSettings {
    pub debounce_ms: u64,
    pub default_duration_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSettings {
    pub level: String,
}

impl NotificationSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn default_duration(&self) -> Duration {
        Duration::from_millis(self.default_duration_ms)
    }
}

/// Partial configuration settings loaded from files or environment.
///
/// Missing values are filled from defaults.
#[derive(Debug, Deserialize)]
pub struct PartialSettings {
    pub realtime: Option<PartialRealtimeSettings>,
    pub notifications: Option<PartialNotificationSettings>,
    pub logging: Option<PartialLoggingSettings>,
}

#[derive(Debug, Deserialize)]
pub struct PartialRealtimeSettings {
    pub url: Option<String>,
    pub reconnect_attempts: Option<u32>,
    pub reconnect_delay_ms: Option<u64>,
    pub reconnect_delay_max_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialNotificationSettings {
    pub debounce_ms: Option<u64>,
    pub default_duration_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PartialLoggingSettings {
    pub level: Option<String>,
}

/// Provides default values for `Settings`.
///
/// The reconnect policy defaults to 5 attempts starting at 1s and capped at
/// 5s; notifications stay on screen for at least 3s.
impl Default for Settings {
    fn default() -> Self {
        Self {
            realtime: RealtimeSettings {
                url: "ws://127.0.0.1:8080/ws".to_string(),
                reconnect_attempts: 5,
                reconnect_delay_ms: 1000,
                reconnect_delay_max_ms: 5000,
            },
            notifications: NotificationSettings {
                debounce_ms: 3000,
                default_duration_ms: 3000,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
            },
        }
    }
}
