use std::{fs, path::Path};

use anyhow::Context;
use serde::Deserialize;
use shared::domain::Namespace;

use crate::projection::PlotOptions;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClientSettings {
    pub server_url: String,
    pub namespace: Namespace,
    pub reconnect_initial_delay_ms: u64,
    pub reconnect_max_delay_ms: u64,
    pub update_buffer: usize,
    pub plot: PlotOptions,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:5000".into(),
            namespace: Namespace::default(),
            reconnect_initial_delay_ms: 500,
            reconnect_max_delay_ms: 10_000,
            update_buffer: 256,
            plot: PlotOptions::default(),
        }
    }
}

/// Defaults, then `path` (TOML) when it exists, then `APP__*` environment
/// variables.
pub fn load_settings(path: Option<&Path>) -> anyhow::Result<ClientSettings> {
    let mut settings = match path {
        Some(path) if path.exists() => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str::<ClientSettings>(&raw)
                .with_context(|| format!("failed to parse {}", path.display()))?
        }
        _ => ClientSettings::default(),
    };
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok())?;
    Ok(settings)
}

pub fn apply_env_overrides(
    settings: &mut ClientSettings,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    if let Some(v) = lookup("APP__SERVER_URL") {
        settings.server_url = v;
    }
    if let Some(v) = lookup("APP__NAMESPACE") {
        settings.namespace =
            Namespace::parse(v).context("APP__NAMESPACE is not a valid namespace")?;
    }
    if let Some(v) = lookup("APP__RECONNECT_INITIAL_DELAY_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.reconnect_initial_delay_ms = parsed;
        }
    }
    if let Some(v) = lookup("APP__RECONNECT_MAX_DELAY_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.reconnect_max_delay_ms = parsed;
        }
    }
    if let Some(v) = lookup("APP__RENDER_PLACEHOLDER_SEED") {
        if let Ok(parsed) = v.parse::<bool>() {
            settings.plot.render_placeholder_seed = parsed;
        }
    }
    if let Some(v) = lookup("APP__PLOT_MAX_POINTS") {
        if let Ok(parsed) = v.parse::<usize>() {
            settings.plot.max_points = Some(parsed);
        }
    }
    Ok(())
}
