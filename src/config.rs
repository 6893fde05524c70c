//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default snapshot schedule: 00:00 UTC on the 1st of every month.
///
/// The `cron` crate expects a leading seconds field.
pub const DEFAULT_SCHEDULE: &str = "0 0 0 1 * *";

/// File name of the compiled address book. The same name is overwritten
/// every cycle.
pub const ARTIFACT_FILE_NAME: &str = "master_contacts.vcf";

/// Bot configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Telegram Bot API token. `None` disables the Telegram channel.
    pub telegram_token: Option<SecretString>,
    /// Identity that receives new-contact notifications.
    pub operator_id: Option<String>,
    /// Channel used to reach the operator.
    pub operator_channel: String,
    /// Path of the libSQL database file.
    pub db_path: PathBuf,
    /// Directory the compiled artifact is written to.
    pub vcf_dir: PathBuf,
    /// Public base URL under which `vcf_dir` is reachable.
    pub public_url: String,
    /// Cron expression for snapshot compilation.
    pub schedule: String,
    /// How often the scheduler checks whether a compilation is due.
    pub poll_interval: Duration,
    /// Port for the built-in artifact server. `None` disables it.
    pub http_port: Option<u16>,
    /// Run one compilation cycle at startup.
    pub compile_on_start: bool,
    /// Add the stdin/stdout channel.
    pub enable_cli: bool,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            telegram_token: None,
            operator_id: None,
            operator_channel: "cli".to_string(),
            db_path: PathBuf::from("./data/vcf-bot.db"),
            vcf_dir: PathBuf::from("./vcf"),
            public_url: "http://localhost:8080/vcf".to_string(),
            schedule: DEFAULT_SCHEDULE.to_string(),
            poll_interval: Duration::from_secs(60),
            http_port: None,
            compile_on_start: false,
            enable_cli: false,
        }
    }
}

impl BotConfig {
    /// Build the configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let telegram_token = get("TELEGRAM_BOT_TOKEN").map(SecretString::from);

        let operator_channel = get("VCF_BOT_OPERATOR_CHANNEL").unwrap_or_else(|| {
            if telegram_token.is_some() {
                "telegram".to_string()
            } else {
                defaults.operator_channel.clone()
            }
        });

        let poll_interval = match get("VCF_BOT_POLL_SECS") {
            Some(raw) => {
                let secs: u64 = parse_value("VCF_BOT_POLL_SECS", &raw)?;
                if secs == 0 {
                    return Err(ConfigError::InvalidValue {
                        key: "VCF_BOT_POLL_SECS".into(),
                        message: "must be greater than zero".into(),
                    });
                }
                Duration::from_secs(secs)
            }
            None => defaults.poll_interval,
        };

        let http_port = get("VCF_BOT_HTTP_PORT")
            .map(|raw| parse_value::<u16>("VCF_BOT_HTTP_PORT", &raw))
            .transpose()?;

        let compile_on_start = get("VCF_BOT_COMPILE_ON_START")
            .map(|raw| parse_bool("VCF_BOT_COMPILE_ON_START", &raw))
            .transpose()?
            .unwrap_or(defaults.compile_on_start);

        let enable_cli = get("VCF_BOT_CLI")
            .map(|raw| parse_bool("VCF_BOT_CLI", &raw))
            .transpose()?
            .unwrap_or(false)
            || telegram_token.is_none();

        Ok(Self {
            operator_id: get("VCF_BOT_OPERATOR_ID"),
            operator_channel,
            db_path: get("VCF_BOT_DB_PATH").map(PathBuf::from).unwrap_or(defaults.db_path),
            vcf_dir: get("VCF_BOT_VCF_DIR").map(PathBuf::from).unwrap_or(defaults.vcf_dir),
            public_url: get("VCF_BOT_PUBLIC_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.public_url),
            schedule: get("VCF_BOT_SCHEDULE").unwrap_or(defaults.schedule),
            telegram_token,
            poll_interval,
            http_port,
            compile_on_start,
            enable_cli,
        })
    }

    /// Public URL of the compiled artifact.
    pub fn artifact_url(&self) -> String {
        format!("{}/{}", self.public_url, ARTIFACT_FILE_NAME)
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}

fn parse_bool(key: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("expected a boolean, got '{other}'"),
        }),
    }
}
