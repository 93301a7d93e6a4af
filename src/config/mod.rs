use chrono::{FixedOffset, NaiveDateTime, Offset, Utc, Weekday};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::domain::{pricing::default_weekend_days, PointsPolicy, RefundPolicy, TimeOfDay};

#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub booking: BookingConfig,
    #[serde(default)]
    pub points: PointsConfig,
    #[serde(default)]
    pub notifications: NotificationConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub base_url: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub session_duration_hours: i64,
    #[serde(default)]
    pub secure_cookies: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory payment proofs are written to; served publicly under `/storage`.
    pub uploads_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            uploads_dir: "storage/uploads".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BookingConfig {
    /// Opening time for venues created without one.
    pub default_open_time: String,
    pub default_close_time: String,
    /// Weekday names ("sat", "sunday", ...) priced with the weekend rate.
    pub weekend_days: Vec<String>,
    /// Offset of the venues' local time from UTC.
    pub utc_offset_hours: i32,
    /// Unpaid bookings older than this are cancelled by the expiry sweep.
    pub payment_timeout_minutes: i64,
    pub full_refund_hours: i64,
    pub partial_refund_hours: i64,
    pub partial_refund_percent: i64,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            default_open_time: "08:00".to_string(),
            default_close_time: "23:00".to_string(),
            weekend_days: vec!["sat".to_string(), "sun".to_string()],
            utc_offset_hours: 7,
            payment_timeout_minutes: 60,
            full_refund_hours: 24,
            partial_refund_hours: 12,
            partial_refund_percent: 50,
        }
    }
}

impl BookingConfig {
    pub fn weekend_days(&self) -> Vec<Weekday> {
        let days: Vec<Weekday> = self
            .weekend_days
            .iter()
            .filter_map(|day| match day.parse::<Weekday>() {
                Ok(weekday) => Some(weekday),
                Err(_) => {
                    tracing::warn!("Ignoring unknown weekend day in config: {}", day);
                    None
                }
            })
            .collect();
        if days.is_empty() {
            default_weekend_days()
        } else {
            days
        }
    }

    pub fn refund_policy(&self) -> RefundPolicy {
        RefundPolicy {
            full_refund_hours: self.full_refund_hours,
            partial_refund_hours: self.partial_refund_hours,
            partial_refund_percent: self.partial_refund_percent,
        }
    }

    pub fn default_hours(&self) -> (TimeOfDay, TimeOfDay) {
        let open = self.default_open_time.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid default_open_time {}, using 08:00", self.default_open_time);
            TimeOfDay::new(8, 0).unwrap_or(TimeOfDay::MIDNIGHT)
        });
        let close = self.default_close_time.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid default_close_time {}, using 23:00", self.default_close_time);
            TimeOfDay::new(23, 0).unwrap_or(TimeOfDay::END_OF_DAY)
        });
        (open, close)
    }

    pub fn utc_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_hours * 3600)
            .unwrap_or_else(|| Utc.fix())
    }

    /// Current wall-clock time at the venues.
    pub fn local_now(&self) -> NaiveDateTime {
        Utc::now().with_timezone(&self.utc_offset()).naive_local()
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct PointsConfig {
    pub earn_divisor: i64,
    pub redeem_rate: i64,
}

impl Default for PointsConfig {
    fn default() -> Self {
        let policy = PointsPolicy::default();
        Self {
            earn_divisor: policy.earn_divisor,
            redeem_rate: policy.redeem_rate,
        }
    }
}

impl PointsConfig {
    pub fn policy(&self) -> PointsPolicy {
        PointsPolicy {
            earn_divisor: self.earn_divisor,
            redeem_rate: self.redeem_rate,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct NotificationConfig {
    /// Channels to deliver through, by name: "whatsapp", "email", "log".
    pub channels: Vec<String>,
    pub whatsapp: Option<WhatsAppConfig>,
    pub email: Option<EmailConfig>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            channels: vec!["log".to_string()],
            whatsapp: None,
            email: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WhatsAppConfig {
    pub enabled: bool,
    pub api_url: String,
    pub token: String,
    #[serde(default = "default_country_code")]
    pub country_code: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_country_code() -> String {
    "62".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmailConfig {
    pub enabled: bool,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub username: String,
    pub password: String,
    pub from_address: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub reminder_interval_secs: u64,
    pub completion_interval_secs: u64,
    pub expiry_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            reminder_interval_secs: 24 * 60 * 60,
            completion_interval_secs: 60 * 60,
            expiry_interval_secs: 5 * 60,
        }
    }
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("server.base_url", "http://localhost:8080")?
            .set_default("database.url", "sqlite://lapangan.db?mode=rwc")?
            .set_default("database.max_connections", 10)?
            .set_default("auth.session_duration_hours", 24)?

            // Add config file if it exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))

            // Add environment variables (with LAPANGAN__ prefix, double underscore separates levels)
            .add_source(
                Environment::with_prefix("LAPANGAN")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("booking.weekend_days")
                    .with_list_parse_key("notifications.channels")
                    .try_parsing(true),
            )

            .build()?;

        config.try_deserialize()
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                base_url: "http://localhost:8080".to_string(),
            },
            database: DatabaseConfig {
                url: "sqlite://lapangan.db?mode=rwc".to_string(),
                max_connections: 10,
            },
            auth: AuthConfig {
                session_duration_hours: 24,
                secure_cookies: false,
            },
            storage: StorageConfig::default(),
            booking: BookingConfig::default(),
            points: PointsConfig::default(),
            notifications: NotificationConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weekend_days_parse() {
        let config = BookingConfig {
            weekend_days: vec!["fri".to_string(), "Saturday".to_string(), "nope".to_string()],
            ..Default::default()
        };
        assert_eq!(config.weekend_days(), vec![Weekday::Fri, Weekday::Sat]);
    }

    #[test]
    fn test_weekend_days_fall_back_when_empty() {
        let config = BookingConfig {
            weekend_days: vec![],
            ..Default::default()
        };
        assert_eq!(config.weekend_days(), vec![Weekday::Sat, Weekday::Sun]);
    }

    #[test]
    fn test_default_hours() {
        let (open, close) = BookingConfig::default().default_hours();
        assert_eq!(open.to_string(), "08:00");
        assert_eq!(close.to_string(), "23:00");
    }
}
