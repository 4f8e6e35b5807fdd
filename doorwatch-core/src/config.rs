//! Static startup configuration
//!
//! One YAML document shared by the presence service and the check agent.
//! Every field has a default matching the original deployment except `people`,
//! which must list at least one tracked phone.

use chrono::{NaiveTime, Timelike};
use chrono_tz::Tz;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

pub const CONFIG_ENV: &str = "DOORWATCH_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "doorwatch.yaml";

const DEFAULT_PROMPT: &str = "\
I have a camera set up inside the garage to check if the garage door is open or closed.

In daytime, if the door is open, you should see the driveway and maybe the street.
Otherwise you'll see the inside of the door, maybe with light coming through the door
windows.

At night, I'd expect a mostly black image if the door is shut. If it's open you might see
the street lights outside.

Here's the latest photo.

Is the door open or closed?
";

/// A tracked presence target (one phone per person)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    pub name: String,
    pub address: String,
}

impl Entity {
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self { name: name.into(), address: address.into() }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    #[serde(deserialize_with = "de_timezone")]
    pub timezone: Tz,
    /// name -> address, in file order
    #[serde(deserialize_with = "de_people")]
    pub people: Vec<Entity>,
    pub daytime: DaytimeWindow,
    pub check_interval_secs: u64,
    pub max_api_calls_per_day: u32,
    pub night_check_hours: Vec<u32>,
    pub presence: PresenceConf,
    pub retry: RetryConf,
    pub camera: CameraConf,
    pub classifier: ClassifierConf,
    pub notify: NotifyConf,
    pub dataset: DatasetConf,
}

/// Inclusive on both ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DaytimeWindow {
    #[serde(deserialize_with = "de_time")]
    pub start: NaiveTime,
    #[serde(deserialize_with = "de_time")]
    pub end: NaiveTime,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PresenceConf {
    pub ping_interval_secs: u64,
    pub debounce: u32,
    pub bind: String,
    pub status_url: String,
    pub probe_timeout_secs: u64,
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryConf {
    pub max_retries: u32,
    pub interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CameraConf {
    pub url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClassifierConf {
    pub endpoint: String,
    pub model: String,
    pub prompt: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifyConf {
    pub server: String,
    pub topic: String,
    pub when_shut: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatasetConf {
    pub dir: PathBuf,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::America::Los_Angeles,
            people: Vec::new(),
            daytime: DaytimeWindow::default(),
            check_interval_secs: 30,
            max_api_calls_per_day: 20,
            night_check_hours: vec![20, 22, 0, 4],
            presence: PresenceConf::default(),
            retry: RetryConf::default(),
            camera: CameraConf::default(),
            classifier: ClassifierConf::default(),
            notify: NotifyConf::default(),
            dataset: DatasetConf::default(),
        }
    }
}

impl Default for DaytimeWindow {
    fn default() -> Self {
        Self {
            start: NaiveTime::from_hms_opt(6, 0, 0).unwrap_or_default(),
            end: NaiveTime::from_hms_opt(20, 0, 0).unwrap_or_default(),
        }
    }
}

impl Default for PresenceConf {
    fn default() -> Self {
        Self {
            ping_interval_secs: 10,
            debounce: 3,
            bind: "0.0.0.0:8765".into(),
            status_url: "http://127.0.0.1:8765/status".into(),
            probe_timeout_secs: 1,
            log_file: Some(PathBuf::from("presence.log")),
        }
    }
}

impl Default for RetryConf {
    fn default() -> Self {
        Self { max_retries: 15, interval_secs: 60 }
    }
}

impl Default for CameraConf {
    fn default() -> Self {
        Self { url: "http://192.168.0.225:8080/shot.jpg".into(), timeout_secs: 10 }
    }
}

impl Default for ClassifierConf {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta".into(),
            model: "gemini-3-flash-preview".into(),
            prompt: DEFAULT_PROMPT.into(),
            api_key_env: "GEMINI_API_KEY".into(),
            timeout_secs: 60,
        }
    }
}

impl Default for NotifyConf {
    fn default() -> Self {
        Self {
            server: "https://ntfy.sh".into(),
            topic: "is_my_garage_door_open".into(),
            when_shut: true,
        }
    }
}

impl Default for DatasetConf {
    fn default() -> Self {
        Self { dir: PathBuf::from("dataset") }
    }
}

impl DaytimeWindow {
    pub fn contains(&self, t: NaiveTime) -> bool {
        self.start <= t && t <= self.end
    }
}

impl WatchConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.presence.ping_interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.presence.probe_timeout_secs)
    }

    /// Rejects settings the loops cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.people.is_empty() {
            return Err(ConfigError::Invalid("no people configured".into()));
        }
        for (i, p) in self.people.iter().enumerate() {
            if p.address.trim().is_empty() {
                return Err(ConfigError::Invalid(format!("empty address for {}", p.name)));
            }
            if self.people[..i].iter().any(|q| q.name == p.name) {
                return Err(ConfigError::Invalid(format!("duplicate person {}", p.name)));
            }
        }
        if self.daytime.start > self.daytime.end {
            return Err(ConfigError::Invalid(format!(
                "daytime start {} is after end {}",
                self.daytime.start, self.daytime.end
            )));
        }
        if self.presence.debounce == 0 {
            return Err(ConfigError::Invalid("presence.debounce must be at least 1".into()));
        }
        if self.check_interval_secs == 0 || self.presence.ping_interval_secs == 0 {
            return Err(ConfigError::Invalid("intervals must be non-zero".into()));
        }
        if self.presence.probe_timeout_secs == 0 {
            return Err(ConfigError::Invalid("presence.probe_timeout_secs must be non-zero".into()));
        }
        for &hour in &self.night_check_hours {
            let Some(first) = NaiveTime::from_hms_opt(hour, 0, 0) else {
                return Err(ConfigError::Invalid(format!("night check hour {hour} out of range")));
            };
            let last = NaiveTime::from_hms_opt(hour, 59, 59).unwrap_or(first);
            if self.daytime.contains(first) && self.daytime.contains(last) {
                return Err(ConfigError::Invalid(format!(
                    "night check hour {hour} lies inside the daytime window"
                )));
            }
            // the scheduler forgets fired night hours during the start hour
            if hour == self.daytime.start.hour() {
                return Err(ConfigError::Invalid(format!(
                    "night check hour {hour} shares the hour of daytime start {}",
                    self.daytime.start
                )));
            }
        }
        Ok(())
    }
}

/// Explicit path, then `$DOORWATCH_CONFIG`, then `./doorwatch.yaml`
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    std::env::var(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

pub fn parse_config(txt: &str) -> Result<WatchConfig, ConfigError> {
    let cfg: WatchConfig = serde_yaml::from_str(txt)?;
    cfg.validate()?;
    Ok(cfg)
}

pub async fn load_config(explicit: Option<&Path>) -> Result<WatchConfig, ConfigError> {
    let path = resolve_config_path(explicit);
    let txt = tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| ConfigError::Read { path: path.clone(), source })?;
    let cfg = parse_config(&txt)?;
    tracing::info!(
        path = %path.display(),
        people = cfg.people.len(),
        timezone = %cfg.timezone,
        "config loaded"
    );
    Ok(cfg)
}

fn de_timezone<'de, D: Deserializer<'de>>(d: D) -> Result<Tz, D::Error> {
    let name = String::deserialize(d)?;
    name.parse::<Tz>()
        .map_err(|_| D::Error::custom(format!("unknown timezone: {name}")))
}

fn de_time<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveTime, D::Error> {
    let raw = String::deserialize(d)?;
    NaiveTime::parse_from_str(&raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M:%S"))
        .map_err(|_| D::Error::custom(format!("invalid time of day '{raw}' (expected HH:MM)")))
}

fn de_people<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Entity>, D::Error> {
    let map = serde_yaml::Mapping::deserialize(d)?;
    map.into_iter()
        .map(|(k, v)| {
            let name = k
                .as_str()
                .ok_or_else(|| D::Error::custom("person names must be strings"))?;
            let address = v
                .as_str()
                .ok_or_else(|| D::Error::custom(format!("address of {name} must be a string")))?;
            Ok(Entity::new(name, address))
        })
        .collect()
}
