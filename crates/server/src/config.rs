use std::{collections::HashMap, fs, time::Duration};

use anyhow::Context;
use serde::Deserialize;
use shared::domain::Namespace;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub server_bind: String,
    pub namespace: Namespace,
    /// Seconds between `status_report` heartbeats; `0` disables them.
    pub heartbeat_interval_secs: u64,
    pub event_buffer: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_bind: "127.0.0.1:5000".into(),
            namespace: Namespace::default(),
            heartbeat_interval_secs: 5,
            event_buffer: 256,
        }
    }
}

impl Settings {
    pub fn heartbeat_interval(&self) -> Option<Duration> {
        (self.heartbeat_interval_secs > 0).then(|| Duration::from_secs(self.heartbeat_interval_secs))
    }
}

pub fn load_settings() -> anyhow::Result<Settings> {
    let file = fs::read_to_string("server.toml").ok();
    settings_from_sources(file.as_deref(), |key| std::env::var(key).ok())
}

pub(crate) fn settings_from_sources(
    file: Option<&str>,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<Settings> {
    let mut settings = Settings::default();

    if let Some(raw) = file {
        let file_cfg = toml::from_str::<HashMap<String, toml::Value>>(raw)
            .context("failed to parse server.toml")?;
        if let Some(v) = file_cfg.get("bind_addr").and_then(toml::Value::as_str) {
            settings.server_bind = v.to_string();
        }
        if let Some(v) = file_cfg.get("namespace").and_then(toml::Value::as_str) {
            settings.namespace =
                Namespace::parse(v).context("server.toml namespace is invalid")?;
        }
        if let Some(v) = file_cfg
            .get("heartbeat_interval_secs")
            .and_then(toml::Value::as_integer)
        {
            settings.heartbeat_interval_secs = u64::try_from(v).unwrap_or_default();
        }
        if let Some(v) = file_cfg.get("event_buffer").and_then(toml::Value::as_integer) {
            if let Ok(v) = usize::try_from(v) {
                settings.event_buffer = v.max(1);
            }
        }
    }

    if let Some(v) = lookup("SERVER_BIND") {
        settings.server_bind = v;
    }
    if let Some(v) = lookup("APP__BIND_ADDR") {
        settings.server_bind = v;
    }

    if let Some(v) = lookup("APP__NAMESPACE") {
        settings.namespace = Namespace::parse(v).context("APP__NAMESPACE is invalid")?;
    }

    if let Some(v) = lookup("APP__HEARTBEAT_INTERVAL_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.heartbeat_interval_secs = parsed;
        }
    }

    Ok(settings)
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
