use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

pub const DEFAULT_SHADER: &str = "example";
pub const DEFAULT_DRM_DEVICE: &str = "/dev/dri/card0";
pub const DEFAULT_REPORT_INTERVAL: u64 = 60;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ViewerConfig {
    pub version: u32,
    #[serde(default = "default_shader")]
    pub default_shader: String,
    #[serde(default = "default_shader_dirs")]
    pub shader_dirs: Vec<PathBuf>,
    #[serde(default)]
    pub display: DisplaySection,
    #[serde(default)]
    pub input: InputSection,
    #[serde(default)]
    pub host: HostSection,
    #[serde(default)]
    pub timing: TimingSection,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DisplaySection {
    #[serde(default = "default_drm_device")]
    pub device: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct InputSection {
    #[serde(default)]
    pub device: Option<PathBuf>,
    #[serde(default = "default_scan_limit")]
    pub scan_limit: u32,
    #[serde(default = "default_name_filters")]
    pub name_filters: Vec<String>,
}

/// Where the virtio console port used for host display requests lives.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct HostSection {
    #[serde(default = "default_port_name")]
    pub port_name: String,
    #[serde(default = "default_sysfs_root")]
    pub sysfs_root: PathBuf,
    #[serde(default = "default_device_root")]
    pub device_root: PathBuf,
    #[serde(default = "default_scan_limit")]
    pub scan_limit: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TimingSection {
    #[serde(
        default = "default_retry_delay",
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub retry_delay: Duration,
    #[serde(default = "default_report_interval")]
    pub report_interval: u64,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            version: 1,
            default_shader: default_shader(),
            shader_dirs: default_shader_dirs(),
            display: DisplaySection::default(),
            input: InputSection::default(),
            host: HostSection::default(),
            timing: TimingSection::default(),
        }
    }
}

impl Default for DisplaySection {
    fn default() -> Self {
        Self {
            device: default_drm_device(),
        }
    }
}

impl Default for InputSection {
    fn default() -> Self {
        Self {
            device: None,
            scan_limit: default_scan_limit(),
            name_filters: default_name_filters(),
        }
    }
}

impl Default for HostSection {
    fn default() -> Self {
        Self {
            port_name: default_port_name(),
            sysfs_root: default_sysfs_root(),
            device_root: default_device_root(),
            scan_limit: default_scan_limit(),
        }
    }
}

impl Default for TimingSection {
    fn default() -> Self {
        Self {
            retry_delay: default_retry_delay(),
            report_interval: default_report_interval(),
        }
    }
}

fn default_shader() -> String {
    DEFAULT_SHADER.to_string()
}

fn default_shader_dirs() -> Vec<PathBuf> {
    vec![PathBuf::from("."), PathBuf::from("shaders")]
}

fn default_drm_device() -> PathBuf {
    PathBuf::from(DEFAULT_DRM_DEVICE)
}

fn default_scan_limit() -> u32 {
    10
}

fn default_name_filters() -> Vec<String> {
    vec!["keyboard".to_string(), "input".to_string()]
}

fn default_port_name() -> String {
    "org.qemu.display".to_string()
}

fn default_sysfs_root() -> PathBuf {
    PathBuf::from("/sys/class/virtio-ports")
}

fn default_device_root() -> PathBuf {
    PathBuf::from("/dev")
}

fn default_retry_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_report_interval() -> u64 {
    DEFAULT_REPORT_INTERVAL
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Duration::try_from_secs_f64(v).map_err(E::custom)
        }
    }

    deserializer.deserialize_any(Visitor)
}

fn serialize_duration<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*duration).to_string())
}

impl ViewerConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: ViewerConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if self.default_shader.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "default_shader may not be empty".into(),
            ));
        }

        if self.shader_dirs.iter().any(|dir| dir.as_os_str().is_empty()) {
            return Err(ConfigError::Invalid(
                "shader_dirs may not contain empty paths".into(),
            ));
        }

        if self.input.name_filters.iter().any(|f| f.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "input.name_filters may not contain empty entries".into(),
            ));
        }

        if self.host.port_name.trim().is_empty() {
            return Err(ConfigError::Invalid("host.port_name may not be empty".into()));
        }

        if self.timing.report_interval == 0 {
            return Err(ConfigError::Invalid(
                "timing.report_interval must be greater than zero".into(),
            ));
        }

        Ok(())
    }

    /// Name filters lowercased for case-insensitive device matching.
    pub fn keyboard_filters(&self) -> Vec<String> {
        self.input
            .name_filters
            .iter()
            .map(|filter| filter.to_ascii_lowercase())
            .collect()
    }
}
