//! Immutable runtime configuration. An external loader (TOML file + env
//! overrides, out of core scope) builds one of these and hands it to the
//! supervisor; the core never touches the filesystem or environment itself.

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VendorCompat {
    None,
    Samsung,
}

impl Default for VendorCompat {
    fn default() -> Self {
        VendorCompat::None
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Target {
    pub address: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_base_path")]
    pub base_path: String,
    #[serde(default = "default_discover_timeout_s")]
    pub discover_timeout_s: f64,
    pub index: Option<usize>,
}

impl Default for Target {
    fn default() -> Self {
        Target {
            address: None,
            port: default_port(),
            base_path: default_base_path(),
            discover_timeout_s: default_discover_timeout_s(),
            index: None,
        }
    }
}

fn default_port() -> u16 {
    80
}

fn default_base_path() -> String {
    String::from("/ipcontrol/v1")
}

fn default_discover_timeout_s() -> f64 {
    5.0
}

fn default_dedupe_window_s() -> f64 {
    0.08
}

fn default_min_interval_s() -> f64 {
    0.12
}

fn default_reconnect_delay_s() -> f64 {
    2.0
}

fn default_cec_device_path() -> String {
    String::from("/dev/cec0")
}

fn default_cec_osd_name() -> String {
    String::from("Audio")
}

fn default_log_level() -> log::LevelFilter {
    log::LevelFilter::Info
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    #[serde(default)]
    pub target: Target,
    #[serde(default = "default_dedupe_window_s")]
    pub dedupe_window_s: f64,
    #[serde(default = "default_min_interval_s")]
    pub min_interval_s: f64,
    #[serde(default = "default_reconnect_delay_s")]
    pub reconnect_delay_s: f64,
    #[serde(default = "default_cec_device_path")]
    pub cec_device_path: String,
    #[serde(default = "default_cec_osd_name")]
    pub cec_osd_name: String,
    #[serde(default)]
    pub cec_vendor_compat: VendorCompat,
    #[serde(
        default = "default_log_level",
        deserialize_with = "deserialize_level"
    )]
    pub log_level: log::LevelFilter,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            target: Target::default(),
            dedupe_window_s: default_dedupe_window_s(),
            min_interval_s: default_min_interval_s(),
            reconnect_delay_s: default_reconnect_delay_s(),
            cec_device_path: default_cec_device_path(),
            cec_osd_name: default_cec_osd_name(),
            cec_vendor_compat: VendorCompat::default(),
            log_level: default_log_level(),
        }
    }
}

impl<'de> Deserialize<'de> for VendorCompat {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        match raw.as_str() {
            "none" => Ok(VendorCompat::None),
            "samsung" => Ok(VendorCompat::Samsung),
            other => Err(serde::de::Error::custom(format!(
                "invalid cec_vendor_compat '{other}', expected 'none' or 'samsung'"
            ))),
        }
    }
}

fn deserialize_level<'de, D>(deserializer: D) -> Result<log::LevelFilter, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    raw.parse()
        .map_err(|_| serde::de::Error::custom(format!("invalid log_level '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = Config::default();
        assert_eq!(config.target.port, 80);
        assert_eq!(config.target.base_path, "/ipcontrol/v1");
        assert_eq!(config.cec_osd_name, "Audio");
        assert_eq!(config.cec_vendor_compat, VendorCompat::None);
        assert_eq!(config.reconnect_delay_s, 2.0);
        assert_eq!(config.dedupe_window_s, 0.08);
        assert_eq!(config.min_interval_s, 0.12);
    }

    #[test]
    fn parses_minimal_json() {
        let config: Config = serde_json::from_str(
            r#"{"target": {"address": "192.168.1.50"}, "cec_vendor_compat": "samsung"}"#,
        )
        .unwrap();
        assert_eq!(config.target.address.as_deref(), Some("192.168.1.50"));
        assert_eq!(config.cec_vendor_compat, VendorCompat::Samsung);
    }

    #[test]
    fn rejects_invalid_vendor_compat() {
        let result: Result<Config, _> =
            serde_json::from_str(r#"{"cec_vendor_compat": "lg"}"#);
        assert!(result.is_err());
    }
}
