//! Configuration loading from environment variables

use crate::state_machine::Features;
use crate::transport::MediaKind;
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_ROSTER_SEED: &str = "+62812155249";
const DEFAULT_PLAYLIST: &str = "/static/3.mp4,/static/5.mp4";
const DEFAULT_REMINDER_SAMPLES: &str =
    "contoh-foto-1.png,contoh-foto-2.png,contoh-video-1.mp4,contoh-video-2.mp4";

const REMINDER_OPENING: &str = "Assalamu'alaikum warahmatullahi wabarakatuh

Semoga Bapak/Ibu telah menerima undangan kami.

*Tanpa mengurangi rasa hormat, kami tidak menerima karangan bunga secara fisik*. Namun, kami sangat menantikan ucapan selamat dan do'a, berupa foto atau video yang insya Allah akan ditampilkan pada hari acara.

Berikut kami lampirkan contoh foto dan video yang dimaksud";

const REMINDER_CLOSING: &str = "*Pengiriman foto dan/atau video dapat melalui nomor WhatsApp ini* dengan format jpg/png/pdf/mkv/mp4/mov

Terima kasih atas perhatian, pengertian, dan do'anya.

Wassalamu'alaikum warahmatullahi wabarakatuh";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
    #[error("cannot load injection table {path}: {reason}")]
    InjectionTable { path: PathBuf, reason: String },
}

/// A sample file attached to the reminder broadcast
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderSample {
    pub kind: MediaKind,
    pub file_name: String,
}

impl ReminderSample {
    /// Videos are recognised by MIME type; everything else is sent as an image
    pub fn from_file_name(file_name: &str) -> Self {
        let kind = if crate::media::mime_for(file_name).starts_with("video/") {
            MediaKind::Video
        } else {
            MediaKind::Image
        };
        Self {
            kind,
            file_name: file_name.to_string(),
        }
    }
}

/// Reminder broadcast content and pacing
#[derive(Debug, Clone)]
pub struct ReminderSettings {
    pub opening: String,
    pub samples: Vec<ReminderSample>,
    pub closing: String,
    /// Pause between recipients
    pub pacing: Duration,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            opening: REMINDER_OPENING.to_string(),
            samples: split_list(DEFAULT_REMINDER_SAMPLES)
                .iter()
                .map(|name| ReminderSample::from_file_name(name))
                .collect(),
            closing: REMINDER_CLOSING.to_string(),
            pacing: Duration::from_millis(5000),
        }
    }
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub db_path: PathBuf,
    pub media_dir: PathBuf,
    /// Session store; in-process memory when unset
    pub redis_url: Option<String>,
    /// Messaging gateway; outbound messages are only logged when unset
    pub gateway_url: Option<String>,
    pub key_prefix: String,
    pub session_ttl: Duration,
    pub roster_ttl: Duration,
    pub playlist_ttl: Duration,
    pub roster_seed: Vec<String>,
    pub playlist_defaults: Vec<String>,
    /// JSON object of guest id -> media URL
    pub injection_file: Option<PathBuf>,
    pub features: Features,
    pub reminder: ReminderSettings,
}

impl Config {
    /// Load configuration from the process environment.
    ///
    /// Optional (with defaults):
    /// - `CONCIERGE_PORT` (8000)
    /// - `CONCIERGE_DB_PATH` (`$HOME/.guest-concierge/registry.db`)
    /// - `CONCIERGE_MEDIA_DIR` (`./static`)
    /// - `CONCIERGE_REDIS_URL`, `CONCIERGE_GATEWAY_URL` (unset)
    /// - `CONCIERGE_KEY_PREFIX` (`concierge`)
    /// - `CONCIERGE_SESSION_TTL_SECS` (60), `CONCIERGE_ROSTER_TTL_SECS` (36000),
    ///   `CONCIERGE_PLAYLIST_TTL_SECS` (600)
    /// - `CONCIERGE_ROSTER_SEED`, `CONCIERGE_PLAYLIST`, `CONCIERGE_REMINDER_SAMPLES` (comma lists)
    /// - `CONCIERGE_INJECTION_FILE` (unset)
    /// - `CONCIERGE_OPS_COMMANDS`, `CONCIERGE_BROADCAST_MODE` (false)
    /// - `CONCIERGE_BROADCAST_PACING_MS` (5000)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |var: &str| lookup(var).filter(|value| !value.trim().is_empty());
        let ttl_of = |var: &'static str, default_secs: u64| ttl(var, get(var), default_secs);
        let flag = |var: &'static str| parse_flag(var, get(var));

        let db_path = get("CONCIERGE_DB_PATH").map_or_else(
            || {
                let home = get("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(format!("{home}/.guest-concierge/registry.db"))
            },
            PathBuf::from,
        );

        let mut reminder = ReminderSettings::default();
        if let Some(samples) = get("CONCIERGE_REMINDER_SAMPLES") {
            reminder.samples = split_list(&samples)
                .iter()
                .map(|name| ReminderSample::from_file_name(name))
                .collect();
        }
        reminder.pacing = Duration::from_millis(parse_number(
            "CONCIERGE_BROADCAST_PACING_MS",
            get("CONCIERGE_BROADCAST_PACING_MS"),
            5000,
        )?);

        Ok(Self {
            port: parse_number("CONCIERGE_PORT", get("CONCIERGE_PORT"), 8000)?,
            db_path,
            media_dir: PathBuf::from(
                get("CONCIERGE_MEDIA_DIR").unwrap_or_else(|| "./static".to_string()),
            ),
            redis_url: get("CONCIERGE_REDIS_URL"),
            gateway_url: get("CONCIERGE_GATEWAY_URL"),
            key_prefix: get("CONCIERGE_KEY_PREFIX").unwrap_or_else(|| "concierge".to_string()),
            session_ttl: ttl_of("CONCIERGE_SESSION_TTL_SECS", 60)?,
            roster_ttl: ttl_of("CONCIERGE_ROSTER_TTL_SECS", 36_000)?,
            playlist_ttl: ttl_of("CONCIERGE_PLAYLIST_TTL_SECS", 600)?,
            roster_seed: split_list(
                &get("CONCIERGE_ROSTER_SEED").unwrap_or_else(|| DEFAULT_ROSTER_SEED.to_string()),
            ),
            playlist_defaults: split_list(
                &get("CONCIERGE_PLAYLIST").unwrap_or_else(|| DEFAULT_PLAYLIST.to_string()),
            ),
            injection_file: get("CONCIERGE_INJECTION_FILE").map(PathBuf::from),
            features: Features {
                operations_commands: flag("CONCIERGE_OPS_COMMANDS")?,
                broadcast_mode: flag("CONCIERGE_BROADCAST_MODE")?,
            },
            reminder,
        })
    }

    /// Read the content-injection table; empty when no file is configured
    pub fn load_injections(&self) -> Result<HashMap<String, String>, ConfigError> {
        let Some(path) = &self.injection_file else {
            return Ok(HashMap::new());
        };
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::InjectionTable {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&raw).map_err(|e| ConfigError::InjectionTable {
            path: path.clone(),
            reason: e.to_string(),
        })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_number<T: std::str::FromStr>(
    var: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            var,
            reason: format!("{raw:?} is not a valid number"),
        }),
    }
}

fn ttl(
    var: &'static str,
    value: Option<String>,
    default_secs: u64,
) -> Result<Duration, ConfigError> {
    let secs = parse_number(var, value, default_secs)?;
    if secs == 0 {
        return Err(ConfigError::Invalid {
            var,
            reason: "must be at least one second".to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}

fn parse_flag(var: &'static str, value: Option<String>) -> Result<bool, ConfigError> {
    match value.as_deref().map(str::trim) {
        None => Ok(false),
        Some("1" | "true" | "TRUE" | "yes") => Ok(true),
        Some("0" | "false" | "FALSE" | "no") => Ok(false),
        Some(other) => Err(ConfigError::Invalid {
            var,
            reason: format!("{other:?} is not a boolean"),
        }),
    }
}
